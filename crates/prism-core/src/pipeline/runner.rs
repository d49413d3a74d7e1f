//! Effect execution with timeout and outcome classification.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::backend::ImageBackend;
use crate::effect::{EffectContext, EffectFactory, EffectHandler};
use crate::error::BackendError;
use crate::types::{EffectOutcome, EffectReport};

/// Runs effect handlers against a backend.
///
/// Each call goes to tokio's blocking pool under a per-call timeout. A call
/// that times out is reported as such but cannot be cancelled: the blocking
/// task runs to completion in the background.
#[derive(Clone)]
pub struct EffectRunner {
    factory: Arc<EffectFactory>,
    backend: Arc<dyn ImageBackend>,
    timeout: Duration,
    output_dir: Option<PathBuf>,
}

impl EffectRunner {
    pub fn new(
        factory: Arc<EffectFactory>,
        backend: Arc<dyn ImageBackend>,
        timeout: Duration,
        output_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            factory,
            backend,
            timeout,
            output_dir,
        }
    }

    /// Where effects on `source` are written; `None` means in place.
    pub fn output_path(&self, source: &Path) -> Option<PathBuf> {
        let dir = self.output_dir.as_ref()?;
        Some(match source.file_name() {
            Some(name) => dir.join(name),
            None => dir.join(source),
        })
    }

    /// Run one effect. A factory miss is reported as `NoHandler`.
    pub async fn run(&self, name: &str, ctx: EffectContext) -> EffectReport {
        let start = Instant::now();
        let outcome = match self.factory.create(name) {
            Some(handler) => self.execute(handler, ctx).await,
            None => {
                tracing::debug!("No handler for effect {:?} on image {}", name, ctx.image_id);
                EffectOutcome::NoHandler
            }
        };

        EffectReport {
            effect: name.to_string(),
            outcome,
            elapsed_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn execute(&self, handler: Box<dyn EffectHandler>, ctx: EffectContext) -> EffectOutcome {
        let image_id = ctx.image_id;
        let name = handler.name();
        let backend = Arc::clone(&self.backend);

        let result = timeout(
            self.timeout,
            tokio::task::spawn_blocking(move || handler.apply(backend.as_ref(), &ctx)),
        )
        .await;

        match result {
            Ok(Ok(Ok(()))) => {
                tracing::debug!("Applied {} to image {}", name, image_id);
                EffectOutcome::Applied
            }
            Ok(Ok(Err(BackendError::Unavailable(reason)))) => {
                tracing::debug!("Skipped {} on image {}: {}", name, image_id, reason);
                EffectOutcome::BackendUnavailable { reason }
            }
            Ok(Ok(Err(e))) => {
                tracing::warn!("Failed to apply {} to image {}: {}", name, image_id, e);
                EffectOutcome::Failed {
                    reason: e.to_string(),
                }
            }
            Ok(Err(e)) => {
                tracing::error!("Effect task for image {} panicked: {}", image_id, e);
                EffectOutcome::Failed {
                    reason: format!("Task join error: {}", e),
                }
            }
            Err(_) => {
                let timeout_ms = self.timeout.as_millis() as u64;
                tracing::warn!(
                    "Timeout applying {} to image {} after {}ms",
                    name,
                    image_id,
                    timeout_ms
                );
                EffectOutcome::TimedOut { timeout_ms }
            }
        }
    }
}
