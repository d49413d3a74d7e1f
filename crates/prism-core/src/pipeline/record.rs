//! Per-image effect state.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::effect::{EffectContext, EffectRegistry};
use crate::error::BatchError;
use crate::pipeline::runner::EffectRunner;
use crate::types::{EffectOutcome, EffectReport, RecordSnapshot};

/// One image and the set of effects currently active on it.
///
/// Effects are keyed by canonical name, so adding the same effect twice
/// keeps only the latest value. Effect ids are validated against the
/// registry the record was created with.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    id: u64,
    source: Option<PathBuf>,
    registry: Arc<EffectRegistry>,
    active: HashMap<String, Value>,
}

impl ImageRecord {
    pub fn new(id: u64, registry: Arc<EffectRegistry>) -> Self {
        Self {
            id,
            source: None,
            registry,
            active: HashMap::new(),
        }
    }

    /// Attach the source file effects are read from.
    pub fn with_source(mut self, source: Option<PathBuf>) -> Self {
        self.source = source;
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Activate an effect, replacing any previous value for it.
    pub fn add_effect(&mut self, effect_id: &str, value: Value) -> Result<(), BatchError> {
        let name = self.resolve(effect_id)?.to_string();
        tracing::debug!("Image {}: add {} = {}", self.id, name, value);
        self.active.insert(name, value);
        Ok(())
    }

    /// Deactivate an effect. Removing an inactive effect is a no-op.
    pub fn remove_effect(&mut self, effect_id: &str) -> Result<(), BatchError> {
        let name = self.resolve(effect_id)?.to_string();
        if self.active.remove(&name).is_some() {
            tracing::debug!("Image {}: remove {}", self.id, name);
        }
        Ok(())
    }

    /// Whether an effect (by canonical name) is active.
    pub fn is_active(&self, name: &str) -> bool {
        self.active.contains_key(name)
    }

    /// Parameter value of an active effect.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.active.get(name)
    }

    /// Active effect names in registry order.
    pub fn active_effects(&self) -> Vec<&str> {
        self.registry
            .all_names()
            .filter(|name| self.active.contains_key(*name))
            .collect()
    }

    pub fn snapshot(&self) -> RecordSnapshot {
        RecordSnapshot {
            id: self.id,
            source: self.source.clone(),
            effects: self
                .active
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    /// Apply every active effect, one at a time, in registry order.
    ///
    /// Once an effect has written to a separate output file, later effects
    /// read from that file so results accumulate. A timed-out call keeps
    /// running in the background, so the effects after it are reported as
    /// skipped instead of racing it on the same file.
    pub async fn apply_effects(&self, runner: &EffectRunner) -> Vec<EffectReport> {
        let names = self.active_effects();
        if names.is_empty() {
            tracing::debug!("Image {}: no active effects", self.id);
            return Vec::new();
        }

        let output = self.source.as_deref().and_then(|s| runner.output_path(s));
        let mut input = self.source.clone();
        let mut reports = Vec::with_capacity(names.len());

        let mut stalled: Option<&str> = None;
        for name in names {
            if let Some(previous) = stalled {
                reports.push(EffectReport {
                    effect: name.to_string(),
                    outcome: EffectOutcome::Skipped {
                        reason: format!("{} timed out on this image", previous),
                    },
                    elapsed_ms: 0,
                });
                continue;
            }

            let ctx = EffectContext {
                image_id: self.id,
                input: input.clone(),
                output: output.clone(),
                value: self.active[name].clone(),
            };
            let report = runner.run(name, ctx).await;
            match report.outcome {
                EffectOutcome::Applied if output.is_some() => input.clone_from(&output),
                EffectOutcome::TimedOut { .. } => {
                    tracing::warn!("Image {}: skipping effects after {} timed out", self.id, name);
                    stalled = Some(name);
                }
                _ => {}
            }
            reports.push(report);
        }

        reports
    }

    fn resolve(&self, effect_id: &str) -> Result<&str, BatchError> {
        self.registry.canonical_name(effect_id).ok_or_else(|| {
            let err = BatchError::InvalidEffectId(effect_id.to_string());
            tracing::warn!("Image {}: {}", self.id, err);
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendRequest, ImageBackend};
    use crate::effect::EffectFactory;
    use crate::error::BackendResult;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingBackend {
        calls: Mutex<Vec<BackendRequest>>,
    }

    impl ImageBackend for RecordingBackend {
        fn name(&self) -> &str {
            "recording"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn execute(&self, request: &BackendRequest) -> BackendResult<()> {
            self.calls.lock().unwrap().push(request.clone());
            Ok(())
        }
    }

    fn record(id: u64) -> ImageRecord {
        ImageRecord::new(id, EffectRegistry::builtin())
    }

    fn runner(backend: Arc<RecordingBackend>, output_dir: Option<PathBuf>) -> EffectRunner {
        EffectRunner::new(
            Arc::new(EffectFactory::builtin()),
            backend,
            Duration::from_secs(5),
            output_dir,
        )
    }

    #[test]
    fn test_add_and_remove() {
        let mut r = record(1);
        r.add_effect("effect1", json!(5)).unwrap();
        assert!(r.is_active("blur"));
        assert_eq!(r.value("blur"), Some(&json!(5)));

        r.remove_effect("effect1").unwrap();
        assert!(!r.is_active("blur"));
        assert!(r.active_effects().is_empty());
    }

    #[test]
    fn test_add_twice_keeps_latest_value() {
        let mut r = record(1);
        r.add_effect("effect3", json!(50)).unwrap();
        r.add_effect("effect3", json!(25)).unwrap();
        assert_eq!(r.active_effects(), vec!["resize"]);
        assert_eq!(r.value("resize"), Some(&json!(25)));
    }

    #[test]
    fn test_remove_inactive_is_noop() {
        let mut r = record(1);
        assert!(r.remove_effect("effect2").is_ok());
        assert!(r.snapshot().effects.is_empty());
    }

    #[test]
    fn test_unknown_effect_leaves_state_unchanged() {
        let mut r = record(1);
        r.add_effect("effect1", json!(1)).unwrap();
        let before = r.snapshot();

        assert_eq!(
            r.add_effect("bogus", json!(1)),
            Err(BatchError::InvalidEffectId("bogus".to_string()))
        );
        assert_eq!(
            r.remove_effect("blur"),
            Err(BatchError::InvalidEffectId("blur".to_string()))
        );
        assert_eq!(r.snapshot(), before);
    }

    #[test]
    fn test_active_effects_follow_registry_order() {
        let mut r = record(1);
        r.add_effect("effect3", json!(50)).unwrap();
        r.add_effect("effect1", json!(2)).unwrap();
        r.add_effect("effect2", json!(1)).unwrap();
        assert_eq!(r.active_effects(), vec!["blur", "convert", "resize"]);
    }

    #[tokio::test]
    async fn test_apply_without_effects_makes_no_calls() {
        let backend = Arc::new(RecordingBackend::default());
        let r = record(1).with_source(Some(PathBuf::from("/img/1.png")));
        let reports = r.apply_effects(&runner(backend.clone(), None)).await;
        assert!(reports.is_empty());
        assert!(backend.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_apply_in_place() {
        let backend = Arc::new(RecordingBackend::default());
        let mut r = record(4).with_source(Some(PathBuf::from("/img/4.png")));
        r.add_effect("effect3", json!(50)).unwrap();
        r.add_effect("effect1", json!(2)).unwrap();

        let reports = r.apply_effects(&runner(backend.clone(), None)).await;
        let effects: Vec<&str> = reports.iter().map(|r| r.effect.as_str()).collect();
        assert_eq!(effects, vec!["blur", "resize"]);
        assert!(reports.iter().all(|r| r.outcome == EffectOutcome::Applied));

        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        for call in calls.iter() {
            assert_eq!(call.image_id, 4);
            assert_eq!(call.input, PathBuf::from("/img/4.png"));
            assert_eq!(call.output, PathBuf::from("/img/4.png"));
        }
    }

    #[tokio::test]
    async fn test_apply_chains_through_output_dir() {
        let backend = Arc::new(RecordingBackend::default());
        let mut r = record(4).with_source(Some(PathBuf::from("/img/4.png")));
        r.add_effect("effect1", json!(2)).unwrap();
        r.add_effect("effect3", json!(50)).unwrap();

        r.apply_effects(&runner(backend.clone(), Some(PathBuf::from("/out")))).await;

        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls[0].input, PathBuf::from("/img/4.png"));
        assert_eq!(calls[0].output, PathBuf::from("/out/4.png"));
        assert_eq!(calls[1].input, PathBuf::from("/out/4.png"));
        assert_eq!(calls[1].output, PathBuf::from("/out/4.png"));
    }

    #[tokio::test]
    async fn test_apply_without_source_fails_each_effect() {
        let backend = Arc::new(RecordingBackend::default());
        let mut r = record(9);
        r.add_effect("effect2", json!(1)).unwrap();

        let reports = r.apply_effects(&runner(backend.clone(), None)).await;
        assert_eq!(reports.len(), 1);
        assert!(matches!(reports[0].outcome, EffectOutcome::Failed { .. }));
        assert!(backend.calls.lock().unwrap().is_empty());
    }

    /// Backend that sleeps on every call and tracks overlapping calls.
    #[derive(Default)]
    struct StallingBackend {
        started: AtomicUsize,
        running: AtomicUsize,
        max_running: AtomicUsize,
    }

    impl ImageBackend for StallingBackend {
        fn name(&self) -> &str {
            "stalling"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn execute(&self, _request: &BackendRequest) -> BackendResult<()> {
            self.started.fetch_add(1, Ordering::SeqCst);
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(200));
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_timeout_skips_remaining_effects() {
        let backend = Arc::new(StallingBackend::default());
        let runner = EffectRunner::new(
            Arc::new(EffectFactory::builtin()),
            backend.clone(),
            Duration::from_millis(20),
            None,
        );
        let mut r = record(1).with_source(Some(PathBuf::from("/img/1.png")));
        r.add_effect("effect1", json!(2)).unwrap();
        r.add_effect("effect2", json!(1)).unwrap();
        r.add_effect("effect3", json!(50)).unwrap();

        let reports = r.apply_effects(&runner).await;
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].outcome, EffectOutcome::TimedOut { timeout_ms: 20 });
        assert!(matches!(reports[1].outcome, EffectOutcome::Skipped { .. }));
        assert!(matches!(reports[2].outcome, EffectOutcome::Skipped { .. }));
        assert_eq!(reports[2].effect, "resize");

        // Let the timed-out call finish before checking for overlap
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(backend.started.load(Ordering::SeqCst), 1);
        assert_eq!(backend.max_running.load(Ordering::SeqCst), 1);
    }
}
