//! Weighted trait sampler
//!
//! One static chooser per layer, weighted by the initial attribute budgets.
//! Budget depletion is not fed back into the choosers; callers detect
//! exhausted values after the draw.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::catalog::TraitCatalog;
use crate::error::{GenError, Result};

pub struct Sampler {
    choosers: Vec<WeightedIndex<u32>>,
    rng: StdRng,
}

impl Sampler {
    /// Build one chooser per catalog layer. A seed makes draws reproducible.
    pub fn new(catalog: &TraitCatalog, seed: Option<u64>) -> Result<Self> {
        let choosers = catalog
            .layers()
            .iter()
            .map(|layer| {
                WeightedIndex::new(layer.values.iter().map(|v| v.budget)).map_err(|e| {
                    GenError::InvalidLayer {
                        layer: layer.name.clone(),
                        reason: format!("cannot build weighted chooser: {}", e),
                    }
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self { choosers, rng })
    }

    /// Draw a value index for `layer`, independent of earlier draws.
    pub fn draw(&mut self, layer: usize) -> usize {
        self.choosers[layer].sample(&mut self.rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, LayerConfig};

    fn catalog(weights: &[f64]) -> TraitCatalog {
        let values = (0..weights.len()).map(|i| format!("v{}", i)).collect();
        let config = Config {
            n: 100,
            layers: vec![LayerConfig {
                name: "bg".to_string(),
                values,
                weights: weights.to_vec(),
                ..Default::default()
            }],
            ..Default::default()
        };
        TraitCatalog::resolve(&config).unwrap()
    }

    #[test]
    fn test_zero_weight_never_drawn() {
        let mut sampler = Sampler::new(&catalog(&[0.0, 100.0, 0.0]), Some(7)).unwrap();
        for _ in 0..500 {
            assert_eq!(sampler.draw(0), 1);
        }
    }

    #[test]
    fn test_draws_follow_weights() {
        let mut sampler = Sampler::new(&catalog(&[90.0, 10.0]), Some(42)).unwrap();
        let draws = 10_000;
        let heavy = (0..draws).filter(|_| sampler.draw(0) == 0).count();
        let share = heavy as f64 / draws as f64;
        assert!(share > 0.85 && share < 0.95, "share was {}", share);
    }

    #[test]
    fn test_seeded_draws_reproducible() {
        let cat = catalog(&[25.0, 25.0, 25.0, 25.0]);
        let mut a = Sampler::new(&cat, Some(3)).unwrap();
        let mut b = Sampler::new(&cat, Some(3)).unwrap();
        let left: Vec<_> = (0..50).map(|_| a.draw(0)).collect();
        let right: Vec<_> = (0..50).map(|_| b.draw(0)).collect();
        assert_eq!(left, right);
    }
}
