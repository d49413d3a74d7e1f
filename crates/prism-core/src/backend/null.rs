//! Backend that is never available.

use super::{BackendRequest, ImageBackend};
use crate::error::{BackendError, BackendResult};

/// Stand-in when no image library is configured.
///
/// Every request fails with [`BackendError::Unavailable`] without touching
/// the filesystem, so a batch can be dry-run end to end.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackend;

impl ImageBackend for NullBackend {
    fn name(&self) -> &str {
        "null"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn execute(&self, request: &BackendRequest) -> BackendResult<()> {
        tracing::trace!(
            "Null backend skipping {} for image {}",
            request.op,
            request.image_id
        );
        Err(BackendError::Unavailable(
            "no image backend configured".to_string(),
        ))
    }
}
