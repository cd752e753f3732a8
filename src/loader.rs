//! One-shot acquisition of export files.
//!
//! Sources are files or directories (walked for `*.json`). Each file is
//! read and normalized independently, so one bad file never sinks the
//! others. Progress and failures are reported through a status callback.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use thiserror::Error;
use walkdir::WalkDir;

use crate::records::{self, ListeningEvent, Normalized};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Outcome of loading a set of sources. Always usable, even when every
/// source failed.
#[derive(Debug, Default)]
pub struct LoadResult {
    pub events: Vec<ListeningEvent>,
    pub files_loaded: usize,
    pub files_failed: usize,
    /// Records present in the files but unusable.
    pub dropped: usize,
}

/// Expand `paths` into the list of files to read.
///
/// Files are taken as given; directories contribute every `.json` file
/// below them, sorted by path. Paths that don't exist are kept so that the
/// load reports them.
pub fn collect_sources(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }

        let mut found: Vec<PathBuf> = WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
            })
            .map(|e| e.into_path())
            .collect();
        found.sort();
        log::debug!("{}: {} JSON files", path.display(), found.len());
        files.extend(found);
    }

    files
}

/// Load and normalize every source, reporting through `status`.
///
/// Files are parsed on a `workers`-thread pool; status lines are emitted
/// afterwards in source order.
pub fn load_sources(paths: &[PathBuf], workers: usize, status: &mut dyn FnMut(&str)) -> LoadResult {
    let files = collect_sources(paths);
    let mut result = LoadResult::default();

    if files.is_empty() {
        status("No data files found.");
        return result;
    }

    status(&format!("Loading {} files...", files.len()));

    let outcomes: Vec<Result<Normalized, LoadError>> = match rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
    {
        Ok(pool) => pool.install(|| files.par_iter().map(|f| load_file(f)).collect()),
        Err(e) => {
            log::warn!("Could not build thread pool ({}), loading sequentially", e);
            files.iter().map(|f| load_file(f)).collect()
        }
    };

    for (path, outcome) in files.iter().zip(outcomes) {
        match outcome {
            Ok(normalized) => {
                log::info!(
                    "{}: {} records ({} dropped)",
                    path.display(),
                    normalized.events.len(),
                    normalized.dropped
                );
                result.files_loaded += 1;
                result.dropped += normalized.dropped;
                result.events.extend(normalized.events);
            }
            Err(e) => {
                log::warn!("Failed to load {}: {}", path.display(), e);
                status(&format!("Failed to load {}", path.display()));
                result.files_failed += 1;
            }
        }
    }

    if result.files_loaded == 0 {
        status("Error loading data.");
    } else {
        status(&format!("Loaded {} records", result.events.len()));
    }

    result
}

/// Read and normalize a single export file.
pub fn load_file(path: &Path) -> Result<Normalized, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    records::normalize_str(&text).map_err(|source| LoadError::Json {
        path: path.display().to_string(),
        source,
    })
}
