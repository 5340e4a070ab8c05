//! Generator configuration
//!
//! Loaded from a JSON file. Missing values, images and weights are filled in
//! later by the trait catalog; this module only applies the global defaults.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{GenError, Result};

/// Default output directory
pub const DEFAULT_OUTPUT_DIR: &str = "./output";

/// Default token name template
pub const DEFAULT_NAME_TEMPLATE: &str = "NFT #%d";

/// Top-level generator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Collection size
    #[serde(default)]
    pub n: u32,

    /// Layers in overlay order
    pub layers: Vec<LayerConfig>,

    #[serde(default)]
    pub output_dir: PathBuf,

    /// Token name template, the first `%d` is replaced by the token id
    #[serde(default, rename = "name_format_template")]
    pub name_template: String,

    #[serde(default)]
    pub external_url_template: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub ipfs: Option<IpfsConfig>,

    /// Maximum simultaneous persistence tasks, 0 means one per CPU
    #[serde(default)]
    pub concurrency: usize,

    /// Seed for reproducible trait draws
    #[serde(default)]
    pub seed: Option<u64>,
}

/// One trait layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerConfig {
    pub name: String,

    #[serde(default)]
    pub base_path: PathBuf,

    /// Inclusive lower bound of token ids that receive this layer.
    /// 0 is the same as unset.
    #[serde(default)]
    pub min_id: Option<u32>,

    /// Inclusive upper bound of token ids that receive this layer.
    /// 0 is treated as unset, not as "token 0 only"; use `max_ids` to pin a
    /// single value to token 0.
    #[serde(default)]
    pub max_id: Option<u32>,

    /// Image file stems under `base_path` (".png" is appended)
    #[serde(default)]
    pub images: Vec<String>,

    #[serde(default)]
    pub values: Vec<String>,

    /// Percentages, one per value
    #[serde(default)]
    pub weights: Vec<f64>,

    /// Per-value inclusive lower bounds, `null` for none
    #[serde(default)]
    pub min_ids: Option<Vec<Option<u32>>>,

    /// Per-value inclusive upper bounds, `null` for none. Unlike `max_id`,
    /// 0 is a real bound.
    #[serde(default)]
    pub max_ids: Option<Vec<Option<u32>>>,
}

/// IPFS HTTP API settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IpfsConfig {
    pub endpoint: String,

    #[serde(default)]
    pub project_id: String,

    #[serde(default)]
    pub project_secret: String,
}

impl Config {
    /// Load a configuration file and apply defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| GenError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut config: Config =
            serde_json::from_str(&content).map_err(|e| GenError::InvalidConfig {
                reason: format!("{}: {}", path.display(), e),
            })?;

        config.apply_defaults();
        config.validate()?;
        Ok(config)
    }

    /// Fill in unset global options.
    pub fn apply_defaults(&mut self) {
        if self.name_template.is_empty() {
            debug!(
                "No name template specified, using default template '{}'",
                DEFAULT_NAME_TEMPLATE
            );
            self.name_template = DEFAULT_NAME_TEMPLATE.to_string();
        }

        if self.output_dir.as_os_str().is_empty() {
            debug!(
                "No output dir specified, using default output dir {}",
                DEFAULT_OUTPUT_DIR
            );
            self.output_dir = PathBuf::from(DEFAULT_OUTPUT_DIR);
        }

        if self.concurrency == 0 {
            let cpus = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1);
            debug!("No concurrency specified, using number of CPUs {}", cpus);
            self.concurrency = cpus;
        }

        if self.description.as_deref().is_some_and(str::is_empty) {
            self.description = None;
        }
        if self
            .external_url_template
            .as_deref()
            .is_some_and(str::is_empty)
        {
            self.external_url_template = None;
        }
    }

    /// Check the global shape of the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.layers.is_empty() {
            return Err(GenError::InvalidConfig {
                reason: "no layers configured".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for layer in &self.layers {
            if layer.name.is_empty() {
                return Err(GenError::InvalidConfig {
                    reason: "layer without a name".to_string(),
                });
            }
            if !seen.insert(layer.name.as_str()) {
                return Err(GenError::InvalidLayer {
                    layer: layer.name.clone(),
                    reason: "duplicate layer name".to_string(),
                });
            }
        }

        if self.concurrency == 0 {
            return Err(GenError::InvalidConfig {
                reason: "concurrency must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_applies_defaults() {
        let file = write_config(
            r#"{
                "n": 10,
                "description": "",
                "layers": [{"name": "background", "base_path": "layers/bg"}]
            }"#,
        );

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.n, 10);
        assert_eq!(config.name_template, DEFAULT_NAME_TEMPLATE);
        assert_eq!(config.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert!(config.concurrency >= 1);
        assert!(config.description.is_none());
        assert!(config.external_url_template.is_none());
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_load_keeps_explicit_values() {
        let file = write_config(
            r#"{
                "n": 3,
                "output_dir": "out",
                "name_format_template": "Punk %d",
                "external_url_template": "https://example.com/%d",
                "description": "A collection",
                "concurrency": 2,
                "layers": [{
                    "name": "eyes",
                    "values": ["blue", "green"],
                    "weights": [60, 40],
                    "max_ids": [0, null]
                }]
            }"#,
        );

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.name_template, "Punk %d");
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.description.as_deref(), Some("A collection"));
        assert_eq!(config.layers[0].weights, vec![60.0, 40.0]);
        assert_eq!(config.layers[0].max_ids, Some(vec![Some(0), None]));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load(Path::new("/nonexistent/config.json")).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_READ");
    }

    #[test]
    fn test_malformed_file() {
        let file = write_config("{ not json");
        let err = Config::load(file.path()).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_duplicate_layer_names() {
        let file = write_config(r#"{"layers": [{"name": "a"}, {"name": "a"}]}"#);
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, GenError::InvalidLayer { .. }));
    }

    #[test]
    fn test_no_layers() {
        let file = write_config(r#"{"layers": []}"#);
        assert!(Config::load(file.path()).is_err());
    }
}
