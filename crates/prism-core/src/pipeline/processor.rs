//! Batch orchestration: admission, per-record mutation, effect application.

use futures_util::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::backend::{self, ImageBackend};
use crate::config::Config;
use crate::effect::{EffectFactory, EffectRegistry};
use crate::error::BatchError;
use crate::types::{BatchProgress, BatchReport, BatchStats, RecordReport, RejectedEntry};

use super::record::ImageRecord;
use super::request::{BatchEntry, BatchRequest, OperationKind};
use super::runner::EffectRunner;
use super::source::SourceIndex;

/// Processes batch requests against a registry, a factory and a backend.
///
/// Entries are admitted one by one in batch order. Admitted records are then
/// processed with up to `parallel_workers` in flight; the report keeps batch
/// order regardless.
pub struct BatchProcessor {
    registry: Arc<EffectRegistry>,
    factory: Arc<EffectFactory>,
    backend: Arc<dyn ImageBackend>,
    sources: Arc<SourceIndex>,
    output_dir: Option<PathBuf>,
    timeout: Duration,
    parallel: usize,
}

impl BatchProcessor {
    /// Create a processor from configuration.
    ///
    /// Uses the built-in registry and factory, the configured backend, and
    /// indexes source images under `general.images_dir`.
    pub fn new(config: &Config) -> Self {
        Self {
            registry: EffectRegistry::builtin(),
            factory: Arc::new(EffectFactory::builtin()),
            backend: backend::from_config(config),
            sources: Arc::new(SourceIndex::scan(&config.images_dir(), &config.processing)),
            output_dir: config.output_dir(),
            timeout: Duration::from_millis(config.limits.backend_timeout_ms),
            parallel: config.processing.parallel_workers.max(1),
        }
    }

    pub fn with_registry(mut self, registry: Arc<EffectRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_factory(mut self, factory: EffectFactory) -> Self {
        self.factory = Arc::new(factory);
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn ImageBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_sources(mut self, sources: SourceIndex) -> Self {
        self.sources = Arc::new(sources);
        self
    }

    pub fn with_output_dir(mut self, output_dir: Option<PathBuf>) -> Self {
        self.output_dir = output_dir;
        self
    }

    pub fn with_parallel(mut self, parallel: usize) -> Self {
        self.parallel = parallel.max(1);
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Process one batch.
    ///
    /// Only a batch with no entries is an error. Bad keys, duplicate ids,
    /// unknown effects and backend failures are recorded in the report.
    pub async fn process(&self, batch: &BatchRequest) -> Result<BatchReport, BatchError> {
        self.process_with_progress(batch, |_| {}).await
    }

    /// Process one batch, reporting progress to `on_progress`.
    ///
    /// The callback first sees [`BatchProgress::Started`] with the number of
    /// admitted records, then one [`BatchProgress::Record`] per record in
    /// batch order.
    pub async fn process_with_progress<F>(
        &self,
        batch: &BatchRequest,
        on_progress: F,
    ) -> Result<BatchReport, BatchError>
    where
        F: Fn(BatchProgress<'_>),
    {
        if batch.is_empty() {
            let err = BatchError::InvalidBatch("batch contains no entries".to_string());
            tracing::error!("{}", err);
            return Err(err);
        }

        let start = Instant::now();
        let (admitted, rejected) = self.admit(batch);
        tracing::info!(
            "Processing {} record(s) with {} backend ({} rejected at admission)",
            admitted.len(),
            self.backend.name(),
            rejected.len()
        );
        on_progress(BatchProgress::Started {
            records: admitted.len(),
            rejected: rejected.len(),
        });

        let runner = EffectRunner::new(
            Arc::clone(&self.factory),
            Arc::clone(&self.backend),
            self.timeout,
            self.output_dir.clone(),
        );

        let records: Vec<RecordReport> = stream::iter(admitted)
            .map(|(id, entry)| self.process_record(id, entry, &runner))
            .buffered(self.parallel)
            .inspect(|record| on_progress(BatchProgress::Record(record)))
            .collect()
            .await;

        let mut stats = BatchStats {
            records: records.len(),
            rejected_entries: rejected.len(),
            total_seconds: start.elapsed().as_secs_f64(),
            ..Default::default()
        };
        for record in &records {
            stats.rejected_operations += record.operations_rejected.len();
            for effect in &record.effects {
                if effect.outcome.is_applied() {
                    stats.effects_applied += 1;
                } else {
                    stats.effects_failed += 1;
                }
            }
        }

        tracing::info!(
            "Batch done: {} record(s), {} effect(s) applied, {} not applied in {:.2}s",
            stats.records,
            stats.effects_applied,
            stats.effects_failed,
            stats.total_seconds
        );

        Ok(BatchReport {
            records,
            rejected,
            stats,
        })
    }

    /// Split entries into admitted records and rejections, in batch order.
    ///
    /// The first entry for an id wins; later ones are rejected without
    /// touching the first. A malformed entry is rejected without claiming
    /// its id, so a later well-formed entry for the same id is still admitted.
    fn admit<'a>(&self, batch: &'a BatchRequest) -> (Vec<(u64, &'a BatchEntry)>, Vec<RejectedEntry>) {
        let mut seen = HashSet::new();
        let mut admitted = Vec::new();
        let mut rejected = Vec::new();

        for entry in batch.entries() {
            let result = parse_image_id(&entry.key).and_then(|id| {
                if let Some(err) = entry.error() {
                    Err(err)
                } else if seen.insert(id) {
                    Ok(id)
                } else {
                    Err(BatchError::DuplicateImageId(id))
                }
            });

            match result {
                Ok(id) => admitted.push((id, entry)),
                Err(e) => {
                    tracing::warn!("Skipping entry {:?}: {}", entry.key, e);
                    rejected.push(RejectedEntry {
                        key: entry.key.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        (admitted, rejected)
    }

    async fn process_record(&self, id: u64, entry: &BatchEntry, runner: &EffectRunner) -> RecordReport {
        let source = self.sources.get(id).map(Path::to_path_buf);
        if source.is_none() {
            tracing::debug!("Image {}: no source file found", id);
        }
        let mut record = ImageRecord::new(id, Arc::clone(&self.registry)).with_source(source);

        let mut operations_applied = 0;
        let mut operations_rejected = Vec::new();
        for op in &entry.operations {
            let result = match &op.kind {
                OperationKind::Add => record.add_effect(&op.effect_id, op.value.clone()),
                OperationKind::Remove => record.remove_effect(&op.effect_id),
                OperationKind::Unknown(kind) => {
                    let err = BatchError::InvalidOperationKind(kind.clone());
                    tracing::warn!("Image {}: {}", id, err);
                    Err(err)
                }
            };
            match result {
                Ok(()) => operations_applied += 1,
                Err(e) => operations_rejected.push(e.to_string()),
            }
        }

        let effects = record.apply_effects(runner).await;

        RecordReport {
            id: record.id(),
            source: record.source().map(Path::to_path_buf),
            operations_applied,
            operations_rejected,
            active: record.snapshot().effects,
            effects,
        }
    }
}

/// Image ids are non-negative integers; surrounding whitespace is ignored.
fn parse_image_id(key: &str) -> Result<u64, BatchError> {
    key.trim()
        .parse()
        .map_err(|_| BatchError::InvalidImageId(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NullBackend;
    use crate::pipeline::request::Operation;

    fn processor() -> BatchProcessor {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.general.images_dir = dir.path().to_string_lossy().to_string();
        BatchProcessor::new(&config).with_backend(Arc::new(NullBackend))
    }

    #[test]
    fn test_parse_image_id() {
        assert_eq!(parse_image_id("0"), Ok(0));
        assert_eq!(parse_image_id(" 42 "), Ok(42));
        assert_eq!(parse_image_id("007"), Ok(7));
        assert!(parse_image_id("-1").is_err());
        assert!(parse_image_id("1.5").is_err());
        assert!(parse_image_id("abc").is_err());
        assert!(parse_image_id("").is_err());
    }

    #[tokio::test]
    async fn test_empty_batch_is_error() {
        let err = processor().process(&BatchRequest::new()).await.unwrap_err();
        assert!(matches!(err, BatchError::InvalidBatch(_)));
    }

    #[tokio::test]
    async fn test_admission_rejects_bad_and_duplicate_keys() {
        let batch = BatchRequest::new()
            .with("1", vec![Operation::add("effect1", 2)])
            .with("abc", vec![Operation::add("effect1", 2)])
            .with("01", vec![Operation::add("effect3", 50)])
            .with("2", vec![]);

        let report = processor().process(&batch).await.unwrap();
        let ids: Vec<u64> = report.records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);

        assert_eq!(report.rejected.len(), 2);
        assert_eq!(report.rejected[0].key, "abc");
        assert_eq!(report.rejected[1].key, "01");
        assert_eq!(
            report.rejected[1].reason,
            "Already processed data for image with id: 1"
        );

        // First occurrence wins
        let first = report.record(1).unwrap();
        assert!(first.active.contains_key("blur"));
        assert!(!first.active.contains_key("resize"));
    }

    #[tokio::test]
    async fn test_rejected_operations_are_counted() {
        let batch = BatchRequest::new().with(
            "3",
            vec![
                Operation::add("bogus", 1),
                Operation {
                    kind: OperationKind::Unknown("7".to_string()),
                    effect_id: "effect1".to_string(),
                    value: serde_json::Value::Null,
                },
                Operation::add("effect2", 1),
            ],
        );

        let report = processor().process(&batch).await.unwrap();
        let record = report.record(3).unwrap();
        assert_eq!(record.operations_applied, 1);
        assert_eq!(
            record.operations_rejected,
            vec![
                "Invalid effect specified: bogus".to_string(),
                "Invalid operation passed: 7".to_string()
            ]
        );
        assert_eq!(report.stats.rejected_operations, 2);
        assert_eq!(record.active.len(), 1);
    }

    #[tokio::test]
    async fn test_progress_callback_sees_each_record() {
        let batch = BatchRequest::new()
            .with("4", vec![Operation::add("effect1", 2)])
            .with("x", vec![])
            .with("2", vec![]);

        let started = std::sync::Mutex::new(None);
        let seen = std::sync::Mutex::new(Vec::new());
        processor()
            .process_with_progress(&batch, |event| match event {
                BatchProgress::Started { records, rejected } => {
                    *started.lock().unwrap() = Some((records, rejected));
                }
                BatchProgress::Record(r) => seen.lock().unwrap().push(r.id),
            })
            .await
            .unwrap();
        // The total excludes the rejected "x" entry
        assert_eq!(*started.lock().unwrap(), Some((2, 1)));
        assert_eq!(*seen.lock().unwrap(), vec![4, 2]);
    }

    #[tokio::test]
    async fn test_stats_count_unapplied_effects() {
        let batch = BatchRequest::new().with(
            "5",
            vec![Operation::add("effect1", 2), Operation::add("effect3", 50)],
        );

        let report = processor().process(&batch).await.unwrap();
        assert_eq!(report.stats.records, 1);
        assert_eq!(report.stats.effects_applied, 0);
        assert_eq!(report.stats.effects_failed, 2);
    }

    #[tokio::test]
    async fn test_malformed_entry_does_not_claim_its_id() {
        let batch = BatchRequest::from_json(
            r#"{"1": 7,
                "1": [{"kind": 1, "effectId": "effect1", "value": 2}],
                "2": [{"kind": 2.5, "effectId": "effect1"}, {"kind": 1, "effectId": 9},
                      {"kind": 1, "effectId": "effect3", "value": 50}]}"#,
        )
        .unwrap();

        let report = processor().process(&batch).await.unwrap();
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].key, "1");
        assert!(report.rejected[0].reason.starts_with("Invalid operation list:"));
        assert!(report.record(1).unwrap().active.contains_key("blur"));

        let record = report.record(2).unwrap();
        assert_eq!(record.operations_applied, 1);
        assert_eq!(
            record.operations_rejected,
            vec![
                "Invalid operation passed: 2.5".to_string(),
                "Invalid effect specified: 9".to_string()
            ]
        );
        assert!(record.active.contains_key("resize"));
    }
}
