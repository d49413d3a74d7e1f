//! Image backends: the only place pixels are touched.
//!
//! Effect handlers translate a record's parameter value into a
//! [`BackendRequest`] and hand it to an [`ImageBackend`]. Two backends ship:
//! - **raster**: decodes, transforms and re-encodes files with the `image` crate
//! - **null**: reports itself unavailable for every request
//!
//! # Thread safety
//!
//! Backends are shared across concurrently processed records, so
//! implementations must be `Send + Sync`. A backend wrapping a native library
//! that is not thread-safe has to serialise calls itself (e.g. behind a
//! `Mutex`); the pipeline does not do it for you.

mod null;
mod ops;
mod raster;

pub use null::NullBackend;
pub use ops::{BackendOp, ConvertFilter, Dimensions, ResampleFilter, ResizeTarget};
pub use raster::RasterBackend;

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{BackendKind, Config};
use crate::error::BackendResult;

/// One operation against one image file.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendRequest {
    /// Image the request belongs to (for logging)
    pub image_id: u64,
    /// File to read
    pub input: PathBuf,
    /// File to write (may equal `input`)
    pub output: PathBuf,
    /// What to do
    pub op: BackendOp,
}

/// An external image-processing implementation.
pub trait ImageBackend: Send + Sync {
    /// Backend name for logging (e.g., "raster", "null").
    fn name(&self) -> &str;

    /// Whether the backend can execute requests at all.
    fn is_available(&self) -> bool;

    /// Execute a request. Blocking; the pipeline calls this off the async
    /// runtime.
    fn execute(&self, request: &BackendRequest) -> BackendResult<()>;
}

/// Build the backend selected in configuration.
pub fn from_config(config: &Config) -> Arc<dyn ImageBackend> {
    match config.backend.kind {
        BackendKind::Raster => Arc::new(RasterBackend::new(config.limits.clone())),
        BackendKind::None => Arc::new(NullBackend),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_selects_backend() {
        let mut config = Config::default();
        assert_eq!(from_config(&config).name(), "raster");

        config.backend.kind = BackendKind::None;
        let backend = from_config(&config);
        assert_eq!(backend.name(), "null");
        assert!(!backend.is_available());
    }
}
