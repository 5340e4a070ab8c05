//! Trait rarity statistics
//!
//! Computed once the batch is done, over every declared attribute (drawn or
//! not). Percentages with a zero denominator are reported as 0.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::TraitCatalog;
use crate::error::{GenError, Result};
use crate::registry::AttrCounts;

/// Rarity of one attribute
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttributeRarity {
    /// Share of all accepted tokens carrying the attribute
    #[serde(rename = "PercentTotal")]
    pub percent_total: f64,
    /// Share among the attribute's layer
    #[serde(rename = "Percent")]
    pub percent: f64,
    #[serde(rename = "Count")]
    pub count: u32,
}

/// layer name -> value name -> rarity
pub type Rarities = BTreeMap<String, BTreeMap<String, AttributeRarity>>;

/// Rarity of every attribute in `catalog` given the accepted-token counts.
pub fn compute_rarities(catalog: &TraitCatalog, counts: &AttrCounts, accepted: u32) -> Rarities {
    let mut rarities = Rarities::new();

    for layer in catalog.layers() {
        let layer_total = counts.layer_total(&layer.name);

        let values = rarities.entry(layer.name.clone()).or_default();
        for vi in 0..layer.values.len() {
            let count = counts.get(&layer.attribute(vi));
            values.insert(
                layer.values[vi].name.clone(),
                AttributeRarity {
                    percent_total: percent(count as u64, accepted as u64),
                    percent: percent(count as u64, layer_total),
                    count,
                },
            );
        }
    }

    rarities
}

/// Write rarities as 2-space indented JSON.
pub fn write_rarities(path: &Path, rarities: &Rarities) -> Result<()> {
    let data = serde_json::to_string_pretty(rarities)?;
    fs::write(path, data).map_err(|e| GenError::RaritiesWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}
