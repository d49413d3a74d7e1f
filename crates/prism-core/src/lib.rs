//! Prism Core - batch image effect pipeline.
//!
//! Prism takes a batch of per-image add/remove effect instructions, folds
//! them into each image's active effect set, and applies the result through
//! a pluggable image backend.
//!
//! # Architecture
//!
//! ```text
//! Batch JSON → Admit → Mutate records → Apply (registry order) → Backend → Report
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use prism_core::{BatchProcessor, BatchRequest, Config};
//!
//! #[tokio::main]
//! async fn main() -> prism_core::Result<()> {
//!     let config = Config::load()?;
//!     let processor = BatchProcessor::new(&config);
//!
//!     let batch = BatchRequest::from_json(r#"{"0": [{"kind": 1, "effectId": "effect1", "value": 5}]}"#)?;
//!     let report = processor.process(&batch).await?;
//!     println!("Applied: {}", report.stats.effects_applied);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod backend;
pub mod config;
pub mod effect;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod types;

// Re-exports for convenient access
pub use backend::{BackendRequest, ImageBackend, NullBackend, RasterBackend};
pub use config::Config;
pub use effect::{EffectFactory, EffectHandler, EffectRegistry};
pub use error::{BackendError, BatchError, ConfigError, PrismError, RegistryError, Result};
pub use output::{OutputFormat, OutputWriter};
pub use pipeline::{BatchProcessor, BatchRequest, ImageRecord, Operation, OperationKind, SourceIndex};
pub use types::{
    BatchProgress, BatchReport, BatchStats, EffectOutcome, EffectReport, RecordReport, RecordSnapshot,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
