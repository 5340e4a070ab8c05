//! Output directory layout
//!
//! ```text
//! <output_dir>/
//!   images/<id>.png
//!   metadata/<id>.json
//!   rarities.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{GenError, Result};

pub const IMAGE_DIR: &str = "images";
pub const METADATA_DIR: &str = "metadata";
pub const RARITIES_FILE: &str = "rarities.json";

/// Paths of every generated artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
    images_dir: PathBuf,
    metadata_dir: PathBuf,
}

impl OutputLayout {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            images_dir: root.join(IMAGE_DIR),
            metadata_dir: root.join(METADATA_DIR),
        }
    }

    /// Create the image and metadata directories if missing.
    pub fn prepare(&self) -> Result<()> {
        for dir in [&self.images_dir, &self.metadata_dir] {
            fs::create_dir_all(dir).map_err(|e| GenError::OutputDirectory {
                path: dir.clone(),
                source: e,
            })?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn metadata_dir(&self) -> &Path {
        &self.metadata_dir
    }

    pub fn image_path(&self, id: u32) -> PathBuf {
        self.images_dir.join(format!("{}.png", id))
    }

    pub fn metadata_path(&self, id: u32) -> PathBuf {
        self.metadata_dir.join(format!("{}.json", id))
    }

    pub fn rarities_path(&self) -> PathBuf {
        self.root.join(RARITIES_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = OutputLayout::new(Path::new("out"));

        assert_eq!(layout.image_path(3), PathBuf::from("out/images/3.png"));
        assert_eq!(layout.metadata_path(3), PathBuf::from("out/metadata/3.json"));
        assert_eq!(layout.rarities_path(), PathBuf::from("out/rarities.json"));
        assert_eq!(layout.root(), Path::new("out"));
    }

    #[test]
    fn test_prepare_creates_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(&temp_dir.path().join("nested").join("out"));

        layout.prepare().unwrap();
        // Idempotent
        layout.prepare().unwrap();

        assert!(layout.images_dir().is_dir());
        assert!(layout.metadata_dir().is_dir());
    }

    #[test]
    fn test_prepare_fails_on_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let blocker = temp_dir.path().join("out");
        fs::write(&blocker, b"not a directory").unwrap();

        let err = OutputLayout::new(&blocker).prepare().unwrap_err();
        assert_eq!(err.error_code(), "OUTPUT_DIRECTORY");
    }
}
