//! End-to-end batch processing tests.

use prism_core::backend::{BackendOp, BackendRequest, ImageBackend, ResizeTarget};
use prism_core::config::Config;
use prism_core::effect::{EffectDescriptor, EffectFactory, EffectRegistry};
use prism_core::error::BackendResult;
use prism_core::pipeline::{BatchProcessor, BatchRequest, Operation, SourceIndex};
use prism_core::types::EffectOutcome;
use prism_core::BatchError;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Backend that records requests and never touches the filesystem.
#[derive(Default)]
struct CountingBackend {
    requests: Mutex<Vec<BackendRequest>>,
}

impl CountingBackend {
    fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn ops(&self) -> Vec<(u64, String)> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| (r.image_id, r.op.label().to_string()))
            .collect()
    }
}

impl ImageBackend for CountingBackend {
    fn name(&self) -> &str {
        "counting"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn execute(&self, request: &BackendRequest) -> BackendResult<()> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(())
    }
}

fn sources(ids: &[u64]) -> SourceIndex {
    let mut index = SourceIndex::empty();
    for id in ids {
        index.insert(*id, format!("/images/{id}.png"));
    }
    index
}

fn processor(backend: Arc<CountingBackend>, ids: &[u64]) -> BatchProcessor {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.general.images_dir = dir.path().to_string_lossy().to_string();
    BatchProcessor::new(&config)
        .with_backend(backend)
        .with_sources(sources(ids))
}

#[tokio::test]
async fn blur_is_applied_once() {
    let backend = Arc::new(CountingBackend::default());
    let batch = BatchRequest::from_json(r#"{"0": [{"kind": 1, "effectId": "effect1", "value": 5}]}"#).unwrap();

    let report = processor(backend.clone(), &[0]).process(&batch).await.unwrap();

    let record = report.record(0).unwrap();
    assert_eq!(record.active.get("blur"), Some(&serde_json::json!(5)));
    assert_eq!(record.effects.len(), 1);
    assert_eq!(record.effects[0].outcome, EffectOutcome::Applied);
    assert_eq!(backend.ops(), vec![(0, "blur".to_string())]);
}

#[tokio::test]
async fn resize_is_applied_once() {
    let backend = Arc::new(CountingBackend::default());
    let batch = BatchRequest::from_json(r#"{"1": [{"kind": 1, "effectId": "effect3", "value": 50}]}"#).unwrap();

    let report = processor(backend.clone(), &[1]).process(&batch).await.unwrap();

    assert_eq!(report.stats.effects_applied, 1);
    let requests = backend.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    match &requests[0].op {
        BackendOp::Resize { target, .. } => assert_eq!(*target, ResizeTarget::Percent(50.0)),
        other => panic!("expected resize, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_effect_is_skipped_and_record_still_processed() {
    let backend = Arc::new(CountingBackend::default());
    let batch = BatchRequest::from_json(r#"{"2": [{"kind": 1, "effectId": "bogus", "value": 1}]}"#).unwrap();

    let report = processor(backend.clone(), &[2]).process(&batch).await.unwrap();

    let record = report.record(2).unwrap();
    assert!(record.active.is_empty());
    assert!(record.effects.is_empty());
    assert_eq!(record.operations_rejected, vec!["Invalid effect specified: bogus".to_string()]);
    assert_eq!(backend.count(), 0);
}

#[tokio::test]
async fn empty_batch_is_rejected() {
    let backend = Arc::new(CountingBackend::default());
    let batch = BatchRequest::from_json("{}").unwrap();

    let err = processor(backend.clone(), &[]).process(&batch).await.unwrap_err();
    assert!(matches!(err, BatchError::InvalidBatch(_)));
    assert_eq!(backend.count(), 0);
}

#[tokio::test]
async fn duplicate_id_keeps_first_entry() {
    let backend = Arc::new(CountingBackend::default());
    let batch = BatchRequest::from_json(
        r#"{
            "7": [{"kind": 1, "effectId": "effect1", "value": 2}],
            "7": [{"kind": 1, "effectId": "effect3", "value": 50}]
        }"#,
    )
    .unwrap();

    let report = processor(backend.clone(), &[7]).process(&batch).await.unwrap();

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].reason, "Already processed data for image with id: 7");
    assert_eq!(backend.ops(), vec![(7, "blur".to_string())]);
}

#[tokio::test]
async fn effects_apply_in_registry_order() {
    let backend = Arc::new(CountingBackend::default());
    let batch = BatchRequest::new().with(
        3,
        vec![
            Operation::add("effect3", 50),
            Operation::add("effect2", 1),
            Operation::add("effect1", 2),
        ],
    );

    processor(backend.clone(), &[3]).process(&batch).await.unwrap();

    let labels: Vec<String> = backend.ops().into_iter().map(|(_, l)| l).collect();
    assert_eq!(labels, vec!["blur", "convert", "resize"]);
}

#[tokio::test]
async fn add_then_remove_invokes_nothing() {
    let backend = Arc::new(CountingBackend::default());
    let batch = BatchRequest::new().with(
        4,
        vec![Operation::add("effect1", 5), Operation::remove("effect1")],
    );

    let report = processor(backend.clone(), &[4]).process(&batch).await.unwrap();

    let record = report.record(4).unwrap();
    assert_eq!(record.operations_applied, 2);
    assert!(record.active.is_empty());
    assert!(record.effects.is_empty());
    assert_eq!(backend.count(), 0);
}

#[tokio::test]
async fn records_are_reported_in_batch_order_with_parallel_workers() {
    let backend = Arc::new(CountingBackend::default());
    let mut batch = BatchRequest::new();
    for id in [9u64, 2, 5, 0, 7] {
        batch.push(id, vec![Operation::add("effect2", 1)]);
    }

    let report = processor(backend.clone(), &[0, 2, 5, 7, 9])
        .with_parallel(4)
        .process(&batch)
        .await
        .unwrap();

    let ids: Vec<u64> = report.records.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![9, 2, 5, 0, 7]);
    assert_eq!(backend.count(), 5);
}

#[tokio::test]
async fn custom_registry_without_handler_reports_no_handler() {
    let backend = Arc::new(CountingBackend::default());
    let registry = EffectRegistry::new(vec![
        EffectDescriptor::new("fx-sharpen", "sharpen"),
        EffectDescriptor::new("fx-blur", "blur"),
    ])
    .unwrap();
    let batch = BatchRequest::new().with(
        1,
        vec![Operation::add("fx-blur", 1), Operation::add("fx-sharpen", 1)],
    );

    let report = processor(backend.clone(), &[1])
        .with_registry(Arc::new(registry))
        .with_factory(EffectFactory::builtin())
        .process(&batch)
        .await
        .unwrap();

    let outcomes: Vec<(&str, &EffectOutcome)> = report.records[0]
        .effects
        .iter()
        .map(|e| (e.effect.as_str(), &e.outcome))
        .collect();
    assert_eq!(
        outcomes,
        vec![("sharpen", &EffectOutcome::NoHandler), ("blur", &EffectOutcome::Applied)]
    );
    assert_eq!(backend.count(), 1);
}

#[tokio::test]
async fn missing_source_fails_without_backend_call() {
    let backend = Arc::new(CountingBackend::default());
    let batch = BatchRequest::new().with(12, vec![Operation::add("effect1", 2)]);

    let report = processor(backend.clone(), &[]).process(&batch).await.unwrap();

    let record = report.record(12).unwrap();
    assert!(matches!(record.effects[0].outcome, EffectOutcome::Failed { .. }));
    assert_eq!(report.stats.effects_failed, 1);
    assert_eq!(backend.count(), 0);
}

#[tokio::test]
async fn malformed_entries_do_not_block_good_ones() {
    let backend = Arc::new(CountingBackend::default());
    let batch = BatchRequest::from_json(
        r#"{
            "1": 7,
            "2": [
                {"kind": 2.5, "effectId": "effect2"},
                {"kind": null, "effectId": "effect2"},
                {"kind": true, "effectId": "effect2"},
                {"kind": 1, "effectId": 5, "value": 1},
                {"kind": 1, "effectId": "effect1", "value": 2}
            ],
            "3": [{"kind": 1, "effectId": "effect3", "value": 50}]
        }"#,
    )
    .unwrap();

    let report = processor(backend.clone(), &[1, 2, 3]).process(&batch).await.unwrap();

    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].key, "1");
    assert_eq!(report.stats.rejected_entries, 1);

    let record = report.record(2).unwrap();
    assert_eq!(
        record.operations_rejected,
        vec![
            "Invalid operation passed: 2.5".to_string(),
            "Invalid operation passed: null".to_string(),
            "Invalid operation passed: true".to_string(),
            "Invalid effect specified: 5".to_string(),
        ]
    );
    assert_eq!(report.stats.rejected_operations, 4);
    assert_eq!(
        backend.ops(),
        vec![(2, "blur".to_string()), (3, "resize".to_string())]
    );
}

#[tokio::test]
async fn timed_out_effect_stops_later_effects_on_that_image() {
    let batch = BatchRequest::new()
        .with(1, vec![Operation::add("effect1", 2), Operation::add("effect3", 50)])
        .with(2, vec![Operation::add("effect2", 1)]);

    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.general.images_dir = dir.path().to_string_lossy().to_string();
    config.limits.backend_timeout_ms = 20;
    let slow = Arc::new(SlowBlurBackend {
        inner: CountingBackend::default(),
    });
    let report = BatchProcessor::new(&config)
        .with_backend(slow.clone())
        .with_sources(sources(&[1, 2]))
        .process(&batch)
        .await
        .unwrap();

    let outcomes: Vec<&EffectOutcome> = report
        .record(1)
        .unwrap()
        .effects
        .iter()
        .map(|e| &e.outcome)
        .collect();
    assert_eq!(outcomes[0], &EffectOutcome::TimedOut { timeout_ms: 20 });
    assert!(matches!(outcomes[1], EffectOutcome::Skipped { .. }));
    assert_eq!(report.record(2).unwrap().effects[0].outcome, EffectOutcome::Applied);
    assert_eq!(report.stats.effects_applied, 1);
    assert_eq!(report.stats.effects_failed, 2);

    // Resize never reached the backend for image 1
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    let labels = slow.inner.ops();
    assert!(!labels.contains(&(1, "resize".to_string())), "{labels:?}");
}

/// Backend whose blur takes far longer than the test timeout.
struct SlowBlurBackend {
    inner: CountingBackend,
}

impl ImageBackend for SlowBlurBackend {
    fn name(&self) -> &str {
        "slow-blur"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn execute(&self, request: &BackendRequest) -> BackendResult<()> {
        if request.op.label() == "blur" {
            std::thread::sleep(std::time::Duration::from_millis(200));
        }
        self.inner.execute(request)
    }
}

#[tokio::test]
async fn raster_backend_resizes_files_on_disk() {
    let images = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let source = images.path().join("0.png");
    image::RgbImage::from_pixel(40, 20, image::Rgb([200, 30, 30]))
        .save(&source)
        .unwrap();

    let mut config = Config::default();
    config.general.images_dir = images.path().to_string_lossy().to_string();
    config.general.output_dir = Some(output.path().to_string_lossy().to_string());

    let batch = BatchRequest::new().with(
        0,
        vec![Operation::add("effect2", 1), Operation::add("effect3", 50)],
    );
    let report = BatchProcessor::new(&config).process(&batch).await.unwrap();

    assert_eq!(report.stats.effects_applied, 2, "{:?}", report.records[0].effects);
    let written: PathBuf = output.path().join("0.png");
    let result = image::open(&written).unwrap();
    assert_eq!((result.width(), result.height()), (20, 10));

    // Source is untouched when an output directory is set
    let original = image::open(&source).unwrap();
    assert_eq!((original.width(), original.height()), (40, 20));
}
