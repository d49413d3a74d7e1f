//! Batch processing pipeline.
//!
//! - **request**: batch decoding, order- and duplicate-preserving
//! - **source**: image id to source file resolution
//! - **record**: per-image active effect set
//! - **runner**: effect execution with timeouts
//! - **processor**: admission and orchestration

pub mod processor;
pub mod record;
pub mod request;
pub mod runner;
pub mod source;

pub use processor::BatchProcessor;
pub use record::ImageRecord;
pub use request::{BatchEntry, BatchRequest, Operation, OperationKind, ADD_EFFECT, REMOVE_EFFECT};
pub use runner::EffectRunner;
pub use source::SourceIndex;
