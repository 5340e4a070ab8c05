//! Trait Catalog
//!
//! Resolves the configured layers into their final value lists, weights,
//! eligibility windows and per-attribute budgets. Built once at startup and
//! read-only afterwards.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use walkdir::WalkDir;

use crate::config::{Config, LayerConfig};
use crate::error::{GenError, Result};
use crate::token::Attribute;

/// Extension of layer source images
const IMAGE_EXTENSION: &str = "png";

/// Allowed drift of an explicit weight sum from 100
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Inclusive token id range, either bound optional
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdWindow {
    pub min: Option<u32>,
    pub max: Option<u32>,
}

impl IdWindow {
    pub fn new(min: Option<u32>, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Window accepting every id
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.min.map_or(true, |min| id >= min) && self.max.map_or(true, |max| id <= max)
    }
}

/// One resolved value of a layer
#[derive(Debug, Clone, PartialEq)]
pub struct TraitValue {
    pub name: String,
    /// Image file stem under the layer's base path
    pub image: String,
    /// Percentage weight
    pub weight: f64,
    /// Maximum number of tokens that may carry this value
    pub budget: u32,
    pub window: IdWindow,
}

/// One resolved layer
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub name: String,
    pub base_path: PathBuf,
    pub window: IdWindow,
    pub values: Vec<TraitValue>,
}

impl LayerSpec {
    pub fn attribute(&self, index: usize) -> Attribute {
        Attribute::new(self.name.clone(), self.values[index].name.clone())
    }
}

/// Resolved layers and attribute budgets for one collection
#[derive(Debug, Clone)]
pub struct TraitCatalog {
    layers: Vec<LayerSpec>,
    index: HashMap<Attribute, (usize, usize)>,
}

impl TraitCatalog {
    /// Resolve every configured layer for a collection of `config.n` tokens.
    pub fn resolve(config: &Config) -> Result<Self> {
        let layers = config
            .layers
            .iter()
            .map(|layer| resolve_layer(layer, config.n))
            .collect::<Result<Vec<_>>>()?;

        let mut index = HashMap::new();
        for (li, layer) in layers.iter().enumerate() {
            for vi in 0..layer.values.len() {
                if index.insert(layer.attribute(vi), (li, vi)).is_some() {
                    return Err(GenError::InvalidLayer {
                        layer: layer.name.clone(),
                        reason: format!("duplicate value '{}'", layer.values[vi].name),
                    });
                }
            }
        }

        let catalog = Self {
            layers,
            index,
        };

        let combinations = catalog.max_combinations();
        if (config.n as u128) > combinations {
            warn!(
                "Requested {} tokens but only {} unique trait combinations exist",
                config.n, combinations
            );
        }

        Ok(catalog)
    }

    pub fn layers(&self) -> &[LayerSpec] {
        &self.layers
    }

    /// Budget of an attribute, zero for attributes not in the catalog
    pub fn budget(&self, attribute: &Attribute) -> u32 {
        self.lookup(attribute).map_or(0, |v| v.budget)
    }

    /// Source image of an attribute
    pub fn image_path(&self, attribute: &Attribute) -> Option<PathBuf> {
        let (li, vi) = *self.index.get(attribute)?;
        let layer = &self.layers[li];
        Some(
            layer
                .base_path
                .join(format!("{}.{}", layer.values[vi].image, IMAGE_EXTENSION)),
        )
    }

    /// Every declared attribute, in layer then value order
    pub fn attributes(&self) -> impl Iterator<Item = Attribute> + '_ {
        self.layers
            .iter()
            .flat_map(|layer| (0..layer.values.len()).map(move |vi| layer.attribute(vi)))
    }

    /// Number of distinct full trait combinations
    pub fn max_combinations(&self) -> u128 {
        self.layers
            .iter()
            .fold(1u128, |acc, l| acc.saturating_mul(l.values.len() as u128))
    }

    fn lookup(&self, attribute: &Attribute) -> Option<&TraitValue> {
        let (li, vi) = *self.index.get(attribute)?;
        Some(&self.layers[li].values[vi])
    }
}

/// Budget of a value with `weight` percent in a collection of `total` tokens.
///
/// Never zero for a positive weight.
pub fn attribute_budget(total: u32, weight: f64) -> u32 {
    let budget = (total as f64 * weight / 100.0).round() as u32;
    if budget == 0 && weight > 0.0 {
        1
    } else {
        budget
    }
}

/// Budgets of one layer's values.
///
/// Rounded shares can add up to less than `total`; the shortfall goes one
/// token at a time to the heaviest values so every token can still get a
/// value from this layer.
pub fn layer_budgets(total: u32, weights: &[f64]) -> Vec<u32> {
    let mut budgets: Vec<u32> = weights.iter().map(|w| attribute_budget(total, *w)).collect();

    let mut heaviest: Vec<usize> = (0..weights.len()).filter(|i| weights[*i] > 0.0).collect();
    heaviest.sort_by(|a, b| weights[*b].total_cmp(&weights[*a]));
    if heaviest.is_empty() {
        return budgets;
    }

    let assigned: u64 = budgets.iter().map(|b| *b as u64).sum();
    let shortfall = (total as u64).saturating_sub(assigned);
    for i in 0..shortfall as usize {
        budgets[heaviest[i % heaviest.len()]] += 1;
    }

    budgets
}

fn resolve_layer(layer: &LayerConfig, total: u32) -> Result<LayerSpec> {
    let invalid = |reason: String| GenError::InvalidLayer {
        layer: layer.name.clone(),
        reason,
    };

    let (values, images) = match (layer.values.is_empty(), layer.images.is_empty()) {
        (true, true) => {
            debug!(
                "No images defined for {}, loading from dir {}",
                layer.name,
                layer.base_path.display()
            );
            let images = list_layer_images(&layer.base_path)?;
            (images.clone(), images)
        }
        (true, false) => {
            debug!("No values specified for {}, using image names", layer.name);
            (layer.images.clone(), layer.images.clone())
        }
        (false, true) => (layer.values.clone(), layer.values.clone()),
        (false, false) => (layer.values.clone(), layer.images.clone()),
    };

    if values.is_empty() {
        return Err(invalid("no values".to_string()));
    }
    if images.len() != values.len() {
        return Err(invalid(format!(
            "{} images for {} values",
            images.len(),
            values.len()
        )));
    }

    let weights = resolve_weights(layer, values.len())?;
    let min_ids = resolve_bounds(layer, layer.min_ids.as_ref(), values.len(), "min_ids")?;
    let max_ids = resolve_bounds(layer, layer.max_ids.as_ref(), values.len(), "max_ids")?;
    let budgets = layer_budgets(total, &weights);

    let values = values
        .into_iter()
        .zip(images)
        .enumerate()
        .map(|(i, (name, image))| TraitValue {
            name,
            image,
            weight: weights[i],
            budget: budgets[i],
            window: IdWindow::new(min_ids[i], max_ids[i]),
        })
        .collect();

    Ok(LayerSpec {
        name: layer.name.clone(),
        base_path: layer.base_path.clone(),
        window: layer_window(layer),
        values,
    })
}

/// Layer-level bounds of 0 mean "no bound", matching configs that use 0
/// for unset. Per-value bounds keep 0 as a real bound.
fn layer_window(layer: &LayerConfig) -> IdWindow {
    IdWindow::new(
        layer.min_id.filter(|id| *id > 0),
        layer.max_id.filter(|id| *id > 0),
    )
}

fn resolve_weights(layer: &LayerConfig, count: usize) -> Result<Vec<f64>> {
    if layer.weights.is_empty() {
        let weight = 100.0 / count as f64;
        debug!(
            "No weights specified for {}, using equal weights of {}",
            layer.name, weight
        );
        return Ok(vec![weight; count]);
    }

    if layer.weights.len() != count {
        return Err(GenError::InvalidLayer {
            layer: layer.name.clone(),
            reason: format!("{} weights for {} values", layer.weights.len(), count),
        });
    }
    if layer.weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(GenError::InvalidLayer {
            layer: layer.name.clone(),
            reason: "weights must be non-negative numbers".to_string(),
        });
    }

    let sum: f64 = layer.weights.iter().sum();
    if (sum - 100.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(GenError::WeightSum {
            layer: layer.name.clone(),
            sum,
        });
    }

    Ok(layer.weights.clone())
}

fn resolve_bounds(
    layer: &LayerConfig,
    bounds: Option<&Vec<Option<u32>>>,
    count: usize,
    field: &str,
) -> Result<Vec<Option<u32>>> {
    match bounds {
        None => Ok(vec![None; count]),
        Some(bounds) if bounds.len() == count => Ok(bounds.clone()),
        Some(bounds) => Err(GenError::InvalidLayer {
            layer: layer.name.clone(),
            reason: format!("{} has {} entries for {} values", field, bounds.len(), count),
        }),
    }
}

/// Stems of the `.png` files directly under `dir`, lexically sorted.
fn list_layer_images(dir: &Path) -> Result<Vec<String>> {
    let mut images = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| GenError::LayerDirectory {
            path: dir.to_path_buf(),
            source: e,
        })?;

        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(IMAGE_EXTENSION) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            images.push(stem.to_string());
        }
    }

    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use test_case::test_case;

    fn layer(name: &str, values: &[&str], weights: &[f64]) -> LayerConfig {
        LayerConfig {
            name: name.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
            weights: weights.to_vec(),
            ..Default::default()
        }
    }

    fn config(n: u32, layers: Vec<LayerConfig>) -> Config {
        Config {
            n,
            layers,
            ..Default::default()
        }
    }

    #[test_case(&[50.0, 49.0], 99.0 ; "sum below 100")]
    #[test_case(&[50.0, 51.0], 101.0 ; "sum above 100")]
    fn test_weight_sum_rejected(weights: &[f64], expected: f64) {
        let cfg = config(10, vec![layer("eyes", &["a", "b"], weights)]);

        match TraitCatalog::resolve(&cfg) {
            Err(GenError::WeightSum { layer, sum }) => {
                assert_eq!(layer, "eyes");
                assert!((sum - expected).abs() < 1e-9);
            }
            other => panic!("expected WeightSum error, got {:?}", other),
        }
    }

    #[test]
    fn test_fractional_weights_accepted() {
        let cfg = config(10, vec![layer("eyes", &["a", "b", "c"], &[33.3, 33.3, 33.4])]);
        assert!(TraitCatalog::resolve(&cfg).is_ok());
    }

    #[test]
    fn test_equal_weights_when_missing() {
        let cfg = config(8, vec![layer("eyes", &["a", "b", "c", "d"], &[])]);
        let catalog = TraitCatalog::resolve(&cfg).unwrap();

        let values = &catalog.layers()[0].values;
        assert!(values.iter().all(|v| (v.weight - 25.0).abs() < 1e-9));
        assert!(values.iter().all(|v| v.budget == 2));
    }

    #[test]
    fn test_budget_rounding_and_floor() {
        assert_eq!(attribute_budget(1000, 12.5), 125);
        assert_eq!(attribute_budget(5, 50.0), 3);
        assert_eq!(attribute_budget(10, 0.1), 1);
        assert_eq!(attribute_budget(10, 0.0), 0);
        assert_eq!(attribute_budget(0, 100.0), 1);
    }

    #[test]
    fn test_budgets_sum_close_to_collection_size() {
        let cfg = config(
            997,
            vec![layer("bg", &["a", "b", "c", "d"], &[10.0, 20.0, 30.5, 39.5])],
        );
        let catalog = TraitCatalog::resolve(&cfg).unwrap();
        let total: i64 = catalog.layers()[0].values.iter().map(|v| v.budget as i64).sum();
        assert!((0..=4).contains(&(total - 997)));
    }

    #[test_case(10, &[100.0 / 3.0; 3], &[4, 3, 3] ; "thirds of ten")]
    #[test_case(7, &[25.0; 4], &[2, 2, 2, 2] ; "quarters of seven")]
    #[test_case(10, &[10.0, 60.0, 30.0], &[1, 6, 3] ; "exact split")]
    #[test_case(2, &[0.0, 50.0, 50.0], &[0, 1, 1] ; "zero weight stays empty")]
    fn test_layer_budgets(total: u32, weights: &[f64], expected: &[u32]) {
        assert_eq!(layer_budgets(total, weights), expected.to_vec());
    }

    #[test]
    fn test_layer_budgets_cover_collection() {
        for total in [1, 5, 10, 11, 97, 1000] {
            for count in 1..8 {
                let weights = vec![100.0 / count as f64; count];
                let sum: u32 = layer_budgets(total, &weights).iter().sum();
                assert!(sum >= total, "{} values, {} tokens: {}", count, total, sum);
            }
        }
    }

    #[test]
    fn test_zero_layer_bounds_are_unbounded() {
        let mut hat = layer("hat", &["cap", "crown"], &[]);
        hat.min_id = Some(0);
        hat.max_id = Some(0);
        hat.max_ids = Some(vec![Some(0), None]);
        let catalog = TraitCatalog::resolve(&config(4, vec![hat])).unwrap();

        let layer = &catalog.layers()[0];
        assert_eq!(layer.window, IdWindow::unbounded());
        assert!(layer.window.contains(3));
        assert_eq!(layer.values[0].window, IdWindow::new(None, Some(0)));
    }

    #[test]
    fn test_values_listed_from_directory_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["zebra.png", "apple.png", "mango.png", "notes.txt"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("nested.png")).unwrap();

        let mut bg = layer("bg", &[], &[]);
        bg.base_path = dir.path().to_path_buf();
        let catalog = TraitCatalog::resolve(&config(3, vec![bg])).unwrap();

        let names: Vec<_> = catalog.layers()[0]
            .values
            .iter()
            .map(|v| v.name.as_str())
            .collect();
        assert_eq!(names, vec!["apple", "mango", "zebra"]);
    }

    #[test]
    fn test_unreadable_directory() {
        let mut bg = layer("bg", &[], &[]);
        bg.base_path = PathBuf::from("/nonexistent/layer/dir");
        let err = TraitCatalog::resolve(&config(3, vec![bg])).unwrap_err();
        assert_eq!(err.error_code(), "LAYER_DIRECTORY");
    }

    #[test]
    fn test_image_path_uses_image_stem() {
        let mut eyes = layer("eyes", &["Blue", "Green"], &[50.0, 50.0]);
        eyes.base_path = PathBuf::from("layers/eyes");
        eyes.images = vec!["eyes_01".to_string(), "eyes_02".to_string()];
        let catalog = TraitCatalog::resolve(&config(2, vec![eyes])).unwrap();

        assert_eq!(
            catalog.image_path(&Attribute::new("eyes", "Green")),
            Some(PathBuf::from("layers/eyes/eyes_02.png"))
        );
        assert_eq!(catalog.image_path(&Attribute::new("eyes", "Red")), None);
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let mut eyes = layer("eyes", &["a", "b"], &[]);
        eyes.max_ids = Some(vec![Some(1)]);
        assert!(TraitCatalog::resolve(&config(2, vec![eyes])).is_err());

        let eyes = layer("eyes", &["a", "b"], &[100.0]);
        assert!(TraitCatalog::resolve(&config(2, vec![eyes])).is_err());
    }

    #[test]
    fn test_duplicate_values_rejected() {
        let cfg = config(2, vec![layer("eyes", &["a", "a"], &[])]);
        assert!(matches!(
            TraitCatalog::resolve(&cfg),
            Err(GenError::InvalidLayer { .. })
        ));
    }

    #[test]
    fn test_id_window() {
        let window = IdWindow::new(Some(2), Some(4));
        assert!(!window.contains(1));
        assert!(window.contains(2));
        assert!(window.contains(4));
        assert!(!window.contains(5));
        assert!(IdWindow::unbounded().contains(u32::MAX));
        assert!(IdWindow::new(None, Some(0)).contains(0));
        assert!(!IdWindow::new(None, Some(0)).contains(1));
    }

    #[test]
    fn test_attributes_in_declaration_order() {
        let cfg = config(
            4,
            vec![layer("bg", &["b", "a"], &[]), layer("eyes", &["x"], &[])],
        );
        let catalog = TraitCatalog::resolve(&cfg).unwrap();
        let attrs: Vec<_> = catalog.attributes().collect();
        assert_eq!(
            attrs,
            vec![
                Attribute::new("bg", "b"),
                Attribute::new("bg", "a"),
                Attribute::new("eyes", "x"),
            ]
        );
        assert_eq!(catalog.max_combinations(), 2);
    }
}
