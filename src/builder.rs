//! Token Builder
//!
//! Produces one globally unique token per call. Each layer is drawn
//! independently with redraws on ineligible or exhausted values; a token
//! whose signature was already accepted is discarded whole and rebuilt
//! for the same id.

use std::sync::Arc;

use log::{debug, warn};

use crate::catalog::TraitCatalog;
use crate::error::{GenError, Result};
use crate::registry::{AttrCounts, DedupRegistry};
use crate::sampler::Sampler;
use crate::token::{render_template, Attribute, Token};

/// Whole-token attempts before giving up on an id
pub const MAX_TOKEN_ATTEMPTS: u32 = 100;

/// Draws per layer before the layer is left empty
pub const MAX_DRAW_ATTEMPTS: u32 = 10_000;

/// Naming applied to every accepted token
#[derive(Debug, Clone, Default)]
pub struct TokenTemplates {
    pub name: String,
    pub external_url: Option<String>,
    pub description: Option<String>,
}

/// Counters describing how hard acceptance was
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Whole tokens discarded as duplicates
    pub collisions: u64,
    /// Draws rejected by id window or budget
    pub rejected_draws: u64,
    /// Layers left without a trait after exhausting their draws
    pub starved_layers: u64,
}

pub struct TokenBuilder {
    catalog: Arc<TraitCatalog>,
    sampler: Sampler,
    registry: DedupRegistry,
    counts: AttrCounts,
    templates: TokenTemplates,
    stats: BuildStats,
    max_token_attempts: u32,
    max_draw_attempts: u32,
}

impl TokenBuilder {
    pub fn new(catalog: Arc<TraitCatalog>, sampler: Sampler, templates: TokenTemplates) -> Self {
        Self {
            catalog,
            sampler,
            registry: DedupRegistry::new(),
            counts: AttrCounts::new(),
            templates,
            stats: BuildStats::default(),
            max_token_attempts: MAX_TOKEN_ATTEMPTS,
            max_draw_attempts: MAX_DRAW_ATTEMPTS,
        }
    }

    /// Override the retry limits.
    pub fn with_limits(mut self, token_attempts: u32, draw_attempts: u32) -> Self {
        self.max_token_attempts = token_attempts;
        self.max_draw_attempts = draw_attempts;
        self
    }

    /// Build and accept the next token.
    ///
    /// # Errors
    /// `GenerationExhausted` if every attempt collided with an accepted token.
    pub fn next_token(&mut self) -> Result<Token> {
        let id = self.registry.len() as u32;

        for attempt in 1..=self.max_token_attempts {
            let attributes = self.draw_attributes(id);
            let token = Token::new(id, attributes);
            let signature = token.signature();

            if self.registry.contains(&signature) {
                self.stats.collisions += 1;
                debug!(
                    "Token with the same signature exists, retrying (id: {}, attempt: {})",
                    id, attempt
                );
                continue;
            }

            self.registry.insert(signature);
            self.counts.record(&token.attributes);
            return Ok(self.finish(token));
        }

        Err(GenError::GenerationExhausted {
            id,
            attempts: self.max_token_attempts,
        })
    }

    /// Number of tokens accepted so far
    pub fn accepted(&self) -> u32 {
        self.registry.len() as u32
    }

    pub fn counts(&self) -> &AttrCounts {
        &self.counts
    }

    pub fn stats(&self) -> BuildStats {
        self.stats
    }

    pub fn catalog(&self) -> &Arc<TraitCatalog> {
        &self.catalog
    }

    /// One attribute per eligible layer, in layer order.
    fn draw_attributes(&mut self, id: u32) -> Vec<Attribute> {
        let catalog = Arc::clone(&self.catalog);
        let mut attributes = Vec::with_capacity(catalog.layers().len());

        for (li, layer) in catalog.layers().iter().enumerate() {
            if !layer.window.contains(id) {
                debug!("Skipping layer {} for token {}", layer.name, id);
                continue;
            }

            let mut chosen = None;
            for _ in 0..self.max_draw_attempts {
                let vi = self.sampler.draw(li);
                let value = &layer.values[vi];
                let attribute = layer.attribute(vi);

                if !value.window.contains(id) || self.counts.get(&attribute) + 1 > value.budget {
                    self.stats.rejected_draws += 1;
                    continue;
                }

                chosen = Some(attribute);
                break;
            }

            match chosen {
                Some(attribute) => attributes.push(attribute),
                None => {
                    self.stats.starved_layers += 1;
                    warn!(
                        "Layer {} left without a trait for token {} after {} draws",
                        layer.name, id, self.max_draw_attempts
                    );
                }
            }
        }

        attributes
    }

    fn finish(&self, mut token: Token) -> Token {
        let id = token.id();
        token.name = render_template(&self.templates.name, id);
        token.external_url = self
            .templates
            .external_url
            .as_deref()
            .map(|t| render_template(t, id));
        token.description = self.templates.description.clone();
        token
    }
}
