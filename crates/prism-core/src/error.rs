//! Error types for the Prism effect pipeline.
//!
//! Errors are split by where they are recovered: batch-level rejections
//! (bad keys, bad operations, unknown effects) and backend failures raised
//! while an effect runs. Both are reported, never raised past `process`,
//! except for a wholesale-invalid batch.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Prism operations.
#[derive(Error, Debug)]
pub enum PrismError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Batch input errors
    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    /// Effect registry construction errors
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Rejections raised while admitting and mutating batch records.
///
/// Each variant names the unit that gets skipped: one operation
/// (`InvalidEffectId`, `InvalidOperationKind`), one entry (`InvalidImageId`,
/// `DuplicateImageId`, `MalformedEntry`) or the whole batch (`InvalidBatch`).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("Invalid effect specified: {0}")]
    InvalidEffectId(String),

    #[error("Invalid operation passed: {0}")]
    InvalidOperationKind(String),

    #[error("Invalid image id: {0:?}")]
    InvalidImageId(String),

    #[error("Already processed data for image with id: {0}")]
    DuplicateImageId(u64),

    #[error("Invalid operation list: {0}")]
    MalformedEntry(String),

    #[error("Invalid batch: {0}")]
    InvalidBatch(String),
}

/// Failures reported by an image backend while running one effect.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// No working backend is configured
    #[error("Image backend unavailable: {0}")]
    Unavailable(String),

    /// The record has no resolved source image
    #[error("No source image for image {0}")]
    MissingSource(u64),

    /// Source file does not exist
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// File exceeds size limit
    #[error("File too large: {path} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        path: PathBuf,
        size_mb: u64,
        max_mb: u64,
    },

    /// Image dimensions exceed limit
    #[error("Image too large: {path} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Image decoding failed
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Writing the result failed
    #[error("Encode error for {path}: {message}")]
    Encode { path: PathBuf, message: String },

    /// Convert filter not implemented by this backend
    #[error("Unsupported filter type: {0}")]
    UnsupportedFilter(String),

    /// Effect parameter value has the wrong shape
    #[error("Invalid parameters for {effect}: {message}")]
    InvalidParams { effect: String, message: String },
}

/// Errors raised while building a custom effect registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Registry must contain at least one effect")]
    Empty,

    #[error("Duplicate effect id: {0}")]
    DuplicateId(String),

    #[error("Duplicate effect name: {0}")]
    DuplicateName(String),
}

/// Convenience type alias for Prism results.
pub type Result<T> = std::result::Result<T, PrismError>;

/// Convenience type alias for backend results.
pub type BackendResult<T> = std::result::Result<T, BackendError>;
