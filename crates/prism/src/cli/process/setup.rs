//! Config overrides and batch loading.

use prism_core::config::BackendKind;
use prism_core::{BatchRequest, Config};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::ProcessArgs;

/// Fold command-line flags into the loaded config and re-validate.
pub fn apply_overrides(config: &mut Config, args: &ProcessArgs) -> anyhow::Result<()> {
    if let Some(images) = &args.images {
        config.general.images_dir = images.clone();
    }
    if let Some(output_dir) = &args.output_dir {
        config.general.output_dir = Some(output_dir.clone());
    }
    if let Some(parallel) = args.parallel {
        config.processing.parallel_workers = parallel;
    }
    if args.dry_run {
        config.backend.kind = BackendKind::None;
    }
    config.validate()?;

    let images_dir = config.images_dir();
    if !images_dir.is_dir() {
        anyhow::bail!(
            "Images directory does not exist: {:?}\n\n  Hint: Pass --images or set general.images_dir.",
            images_dir
        );
    }
    Ok(())
}

/// Read a batch from a file, or from stdin for `-`.
pub fn read_batch(path: &Path) -> anyhow::Result<BatchRequest> {
    if path == Path::new("-") {
        return Ok(BatchRequest::from_reader(std::io::stdin().lock())?);
    }
    if !path.exists() {
        anyhow::bail!(
            "Batch file does not exist: {:?}\n\n  Hint: Check the file path and try again.",
            path
        );
    }
    Ok(BatchRequest::from_reader(BufReader::new(File::open(path)?))?)
}
