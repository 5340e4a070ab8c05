//! Error handling for nftgen
//!
//! Errors fall into four families: configuration problems found at startup,
//! generation exhaustion during a batch, per-token persistence failures and
//! upload failures. Only the first two are fatal.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for nftgen operations
pub type Result<T> = std::result::Result<T, GenError>;

/// Broad error family, used to decide whether a batch can continue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Generation,
    Persistence,
    Upload,
    Internal,
}

/// Main error type for nftgen operations
#[derive(Error, Debug)]
pub enum GenError {
    // Configuration Errors
    #[error("Weights in layer {layer} sum to {sum}, expected 100")]
    WeightSum { layer: String, sum: f64 },

    #[error("Invalid layer {layer}: {reason}")]
    InvalidLayer { layer: String, reason: String },

    #[error("Cannot read layer directory {path}: {source}")]
    LayerDirectory {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to prepare output directory {path}: {source}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Generation Errors
    #[error("Failed to produce a unique token for id {id} after {attempts} attempts")]
    GenerationExhausted { id: u32, attempts: u32 },

    // Persistence Errors
    #[error("Failed to compose {path}: {source}")]
    Composite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to save image {path}: {source}")]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to write metadata {path}: {source}")]
    MetadataWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write rarities {path}: {source}")]
    RaritiesWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No source image for trait {layer}={value}")]
    MissingTraitImage { layer: String, value: String },

    // Upload Errors
    #[error("Upload failed: {reason}")]
    Upload { reason: String },

    #[error("Upload unavailable: {reason}")]
    UploadUnavailable { reason: String },

    // Generic Errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GenError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            GenError::WeightSum { .. } => "WEIGHT_SUM",
            GenError::InvalidLayer { .. } => "INVALID_LAYER",
            GenError::LayerDirectory { .. } => "LAYER_DIRECTORY",
            GenError::InvalidConfig { .. } => "INVALID_CONFIG",
            GenError::ConfigRead { .. } => "CONFIG_READ",
            GenError::OutputDirectory { .. } => "OUTPUT_DIRECTORY",
            GenError::GenerationExhausted { .. } => "GENERATION_EXHAUSTED",
            GenError::Composite { .. } => "COMPOSITE_FAILED",
            GenError::ImageWrite { .. } => "IMAGE_WRITE",
            GenError::MetadataWrite { .. } => "METADATA_WRITE",
            GenError::RaritiesWrite { .. } => "RARITIES_WRITE",
            GenError::MissingTraitImage { .. } => "MISSING_TRAIT_IMAGE",
            GenError::Upload { .. } => "UPLOAD_FAILED",
            GenError::UploadUnavailable { .. } => "UPLOAD_UNAVAILABLE",
            GenError::Internal(_) => "INTERNAL_ERROR",
            GenError::Io(_) => "IO_ERROR",
            GenError::Json(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Get the error family
    pub fn kind(&self) -> ErrorKind {
        match self {
            GenError::WeightSum { .. }
            | GenError::InvalidLayer { .. }
            | GenError::LayerDirectory { .. }
            | GenError::InvalidConfig { .. }
            | GenError::ConfigRead { .. }
            | GenError::OutputDirectory { .. } => ErrorKind::Config,
            GenError::GenerationExhausted { .. } => ErrorKind::Generation,
            GenError::Composite { .. }
            | GenError::ImageWrite { .. }
            | GenError::MetadataWrite { .. }
            | GenError::RaritiesWrite { .. }
            | GenError::MissingTraitImage { .. }
            | GenError::Json(_) => ErrorKind::Persistence,
            GenError::Upload { .. } | GenError::UploadUnavailable { .. } => ErrorKind::Upload,
            GenError::Internal(_) | GenError::Io(_) => ErrorKind::Internal,
        }
    }

    /// Fatal errors abort the run; persistence errors only lose one token
    pub fn is_fatal(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Persistence | ErrorKind::Upload)
    }
}
