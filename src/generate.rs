//! Batch generation
//!
//! One producer builds tokens in id order and hands them to the persistence
//! dispatcher through a one-slot queue; a reporter task prints progress.
//! Acceptance state lives only in the producer.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::builder::{BuildStats, TokenBuilder, TokenTemplates};
use crate::catalog::TraitCatalog;
use crate::compose::{Compositor, OverlayCompositor};
use crate::config::Config;
use crate::error::{GenError, Result};
use crate::output::OutputLayout;
use crate::pipeline::{PostProcessor, TokenWriter};
use crate::progress::ProgressReporter;
use crate::rarity::{compute_rarities, write_rarities, Rarities};
use crate::sampler::Sampler;

/// Tokens waiting between producer and dispatcher
const HANDOFF_CAPACITY: usize = 1;

/// Progress events waiting for the reporter
const PROGRESS_CAPACITY: usize = 20;

/// Outcome of one `generate` call
#[derive(Debug)]
pub struct BatchReport {
    pub requested: u32,
    /// Tokens accepted by the builder
    pub generated: u32,
    /// Tokens whose image and metadata were written
    pub persisted: u32,
    /// Tokens whose persistence failed
    pub failed: u32,
    /// Tokens accepted but abandoned on cancellation
    pub dropped: u32,
    pub peak_in_flight: usize,
    pub stats: BuildStats,
    /// Set when generation stopped because no unique token could be built
    pub exhausted: Option<GenError>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.exhausted.is_none() && self.generated == self.requested
    }
}

pub struct Generator {
    config: Config,
    catalog: Arc<TraitCatalog>,
    builder: TokenBuilder,
    layout: OutputLayout,
    compositor: Arc<dyn Compositor>,
    progress_out: Option<Box<dyn Write + Send>>,
}

impl Generator {
    /// Resolve the catalog and prepare the output directory.
    ///
    /// # Errors
    /// Any configuration error; nothing is generated in that case.
    pub fn new(config: Config) -> Result<Self> {
        let catalog = Arc::new(TraitCatalog::resolve(&config)?);
        let sampler = Sampler::new(&catalog, config.seed)?;
        let templates = TokenTemplates {
            name: config.name_template.clone(),
            external_url: config.external_url_template.clone(),
            description: config.description.clone(),
        };
        let builder = TokenBuilder::new(Arc::clone(&catalog), sampler, templates);

        let layout = OutputLayout::new(&config.output_dir);
        layout.prepare()?;

        Ok(Self {
            config,
            catalog,
            builder,
            layout,
            compositor: Arc::new(OverlayCompositor::new()),
            progress_out: None,
        })
    }

    /// Replace the image compositor.
    pub fn with_compositor(mut self, compositor: Arc<dyn Compositor>) -> Self {
        self.compositor = compositor;
        self
    }

    /// Send the progress line somewhere other than stdout.
    pub fn with_progress_output(mut self, out: Box<dyn Write + Send>) -> Self {
        self.progress_out = Some(out);
        self
    }

    pub fn catalog(&self) -> &TraitCatalog {
        &self.catalog
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Number of tokens accepted so far
    pub fn token_count(&self) -> u32 {
        self.builder.accepted()
    }

    /// Generate and persist `config.n` tokens.
    ///
    /// Returns once every dispatched token has been persisted or has failed.
    /// Running out of unique combinations ends generation early and is
    /// reported in `BatchReport::exhausted`.
    pub async fn generate(&mut self, cancel: CancellationToken) -> Result<BatchReport> {
        let requested = self.config.n;
        let (token_tx, token_rx) = mpsc::channel(HANDOFF_CAPACITY);
        let (progress_tx, progress_rx) = mpsc::channel(PROGRESS_CAPACITY);

        let writer = TokenWriter::new(
            Arc::clone(&self.catalog),
            Arc::clone(&self.compositor),
            self.layout.clone(),
        );
        let dispatcher = tokio::spawn(
            PostProcessor::new(writer, self.config.concurrency).run(
                token_rx,
                progress_tx,
                cancel.clone(),
            ),
        );

        // Stopped once the dispatcher is done, so events from tasks still
        // running at cancellation are counted.
        let reporter_stop = CancellationToken::new();
        let out = self
            .progress_out
            .take()
            .unwrap_or_else(|| -> Box<dyn Write + Send> { Box::new(std::io::stdout()) });
        let reporter = tokio::spawn(
            ProgressReporter::new(requested, out).run(progress_rx, reporter_stop.clone()),
        );

        let start = self.builder.accepted();
        let mut exhausted = None;
        let mut unsent = 0;
        while self.builder.accepted() - start < requested {
            if cancel.is_cancelled() {
                warn!("Generation cancelled after {} tokens", self.builder.accepted() - start);
                break;
            }

            match self.builder.next_token() {
                Ok(token) => {
                    if let Err(rejected) = token_tx.send(token).await {
                        warn!(
                            "Persistence pipeline closed, token {} not persisted",
                            rejected.0.id()
                        );
                        unsent += 1;
                        break;
                    }
                }
                Err(e) => {
                    error!("Token {} failed: {}", self.builder.accepted(), e);
                    error!("Stopping");
                    exhausted = Some(e);
                    break;
                }
            }
        }
        drop(token_tx);

        debug!("Waiting for processing to finish");
        let dispatch = dispatcher
            .await
            .map_err(|e| GenError::Internal(format!("dispatcher failed: {}", e)))?;
        reporter_stop.cancel();
        let progress = reporter
            .await
            .map_err(|e| GenError::Internal(format!("progress reporter failed: {}", e)))?;

        let stats = self.builder.stats();
        info!(
            "Generated {} tokens ({} collisions, {} rejected draws, {} starved layers)",
            self.builder.accepted() - start,
            stats.collisions,
            stats.rejected_draws,
            stats.starved_layers
        );
        if stats.starved_layers > 0 {
            warn!(
                "{} layers were left empty after exhausting their draws",
                stats.starved_layers
            );
        }
        let dropped = dispatch.dropped + unsent;
        if dropped > 0 {
            warn!("{} accepted tokens were not persisted after cancellation", dropped);
        }
        if progress.failed > 0 {
            warn!("{} tokens failed to persist", progress.failed);
        }

        Ok(BatchReport {
            requested,
            generated: self.builder.accepted() - start,
            persisted: progress.processed - progress.failed,
            failed: progress.failed,
            dropped,
            peak_in_flight: dispatch.peak_in_flight,
            stats,
            exhausted,
        })
    }

    /// Rarity of every declared attribute over the accepted tokens.
    pub fn rarities(&self) -> Rarities {
        compute_rarities(&self.catalog, self.builder.counts(), self.builder.accepted())
    }

    /// Write `rarities.json` and return its path.
    pub fn write_rarities(&self) -> Result<PathBuf> {
        let path = self.layout.rarities_path();
        write_rarities(&path, &self.rarities())?;
        info!("Rarities written to {}", path.display());
        Ok(path)
    }
}
