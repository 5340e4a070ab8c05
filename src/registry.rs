//! Acceptance bookkeeping
//!
//! Both structures only grow during a run and are owned by the single
//! token producer, so neither needs interior locking.

use std::collections::{HashMap, HashSet};

use crate::token::{Attribute, Signature};

/// Signatures of every accepted token
#[derive(Debug, Default)]
pub struct DedupRegistry {
    signatures: HashSet<Signature>,
}

impl DedupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, signature: &Signature) -> bool {
        self.signatures.contains(signature)
    }

    /// Record a signature, returning false if it was already present.
    pub fn insert(&mut self, signature: Signature) -> bool {
        self.signatures.insert(signature)
    }

    /// Number of accepted tokens
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

/// Accepted-token count per attribute
#[derive(Debug, Default, Clone)]
pub struct AttrCounts {
    counts: HashMap<Attribute, u32>,
}

impl AttrCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, attribute: &Attribute) -> u32 {
        self.counts.get(attribute).copied().unwrap_or(0)
    }

    /// Count one more token carrying each of `attributes`.
    pub fn record<'a>(&mut self, attributes: impl IntoIterator<Item = &'a Attribute>) {
        for attribute in attributes {
            *self.counts.entry(attribute.clone()).or_insert(0) += 1;
        }
    }

    /// Sum of counts over every attribute of `layer`
    pub fn layer_total(&self, layer: &str) -> u64 {
        self.counts
            .iter()
            .filter(|(a, _)| a.layer == layer)
            .map(|(_, c)| *c as u64)
            .sum()
    }
}
