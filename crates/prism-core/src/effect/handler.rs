//! Effect handlers: thin adapters from a stored value to a backend call.

use serde_json::Value;
use std::path::PathBuf;

use crate::backend::{BackendOp, BackendRequest, ImageBackend};
use crate::error::{BackendError, BackendResult};

use super::params;
use super::registry::{BLUR, CONVERT, RESIZE};

/// Everything a handler needs to run one effect on one image.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectContext {
    /// Image the effect belongs to
    pub image_id: u64,
    /// Current file to read; `None` if the record has no source
    pub input: Option<PathBuf>,
    /// File to write; `None` writes back over `input`
    pub output: Option<PathBuf>,
    /// The effect's parameter value from the batch
    pub value: Value,
}

/// Executable adapter for one effect.
///
/// Implementors only translate parameters; the default [`apply`] performs
/// the backend call. Handlers hold no state and never touch the registry
/// or factory.
///
/// [`apply`]: EffectHandler::apply
pub trait EffectHandler: Send + Sync {
    /// Canonical effect name this handler implements.
    fn name(&self) -> &'static str;

    /// Translate a parameter value into a backend operation.
    fn operation(&self, value: &Value) -> BackendResult<BackendOp>;

    /// Run the effect.
    ///
    /// Parameters are checked before the backend, so a malformed value is
    /// reported as such even when no backend is available.
    fn apply(&self, backend: &dyn ImageBackend, ctx: &EffectContext) -> BackendResult<()> {
        let op = self.operation(&ctx.value)?;

        if !backend.is_available() {
            return Err(BackendError::Unavailable(format!(
                "{} backend is not available",
                backend.name()
            )));
        }

        let input = ctx
            .input
            .clone()
            .ok_or(BackendError::MissingSource(ctx.image_id))?;
        let output = ctx.output.clone().unwrap_or_else(|| input.clone());

        backend.execute(&BackendRequest {
            image_id: ctx.image_id,
            input,
            output,
            op,
        })
    }
}

/// Gaussian blur, optionally after a resample.
#[derive(Debug, Default)]
pub struct BlurHandler;

impl EffectHandler for BlurHandler {
    fn name(&self) -> &'static str {
        BLUR
    }

    fn operation(&self, value: &Value) -> BackendResult<BackendOp> {
        params::blur_op(value)
    }
}

/// Colour/convolution filter.
#[derive(Debug, Default)]
pub struct ConvertHandler;

impl EffectHandler for ConvertHandler {
    fn name(&self) -> &'static str {
        CONVERT
    }

    fn operation(&self, value: &Value) -> BackendResult<BackendOp> {
        params::convert_op(value)
    }
}

/// Resample to a new size.
#[derive(Debug, Default)]
pub struct ResizeHandler;

impl EffectHandler for ResizeHandler {
    fn name(&self) -> &'static str {
        RESIZE
    }

    fn operation(&self, value: &Value) -> BackendResult<BackendOp> {
        params::resize_op(value)
    }
}
