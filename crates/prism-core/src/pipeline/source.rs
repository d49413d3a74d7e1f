//! Resolution of image ids to source files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::ProcessingConfig;

/// Index of source images keyed by numeric id.
///
/// A file belongs to id `n` when its stem parses as `n` (`7.png`,
/// `0007.jpg`) and its extension is a supported format.
#[derive(Debug, Clone, Default)]
pub struct SourceIndex {
    files: BTreeMap<u64, PathBuf>,
}

impl SourceIndex {
    /// An index with no files; every lookup misses.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Recursively scan a directory.
    ///
    /// When several files map to the same id the first in path order wins
    /// and the rest are logged.
    pub fn scan(dir: &Path, config: &ProcessingConfig) -> Self {
        let mut paths: Vec<PathBuf> = WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| is_supported(p, config))
            .collect();
        // Sort by path for deterministic ordering
        paths.sort();

        let mut files = BTreeMap::new();
        for path in paths {
            let Some(id) = image_id(&path) else {
                continue;
            };
            if let Some(existing) = files.get(&id) {
                tracing::warn!(
                    "Ignoring {:?}: image {} already resolved to {:?}",
                    path,
                    id,
                    existing
                );
                continue;
            }
            files.insert(id, path);
        }

        tracing::debug!("Indexed {} source image(s) under {:?}", files.len(), dir);
        Self { files }
    }

    /// Register a file for an id, replacing any previous one.
    pub fn insert(&mut self, id: u64, path: impl Into<PathBuf>) {
        self.files.insert(id, path.into());
    }

    /// Source file for an id.
    pub fn get(&self, id: u64) -> Option<&Path> {
        self.files.get(&id).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn image_id(path: &Path) -> Option<u64> {
    path.file_stem()?.to_str()?.parse().ok()
}

/// Check if a file has a supported extension.
fn is_supported(path: &Path, config: &ProcessingConfig) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            config
                .supported_formats
                .iter()
                .any(|fmt| fmt.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}
