//! Directory ingestion.
//!
//! Walks a folder tree for media files, reads their tags in parallel and
//! upserts the results one at a time. A single unreadable file is recorded
//! and skipped; the batch always runs to the end unless cancelled.

use log::{debug, info, warn};
use path_absolutize::Absolutize;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::db::{Catalog, UpsertOutcome};
use crate::error::{Error, Result};
use crate::tags::TagReader;

/// Extensions picked up when the settings do not say otherwise.
pub const DEFAULT_EXTENSIONS: [&str; 7] = ["mp3", "flac", "ogg", "wav", "m4a", "aac", "opus"];

/// Files whose tags are read in parallel before the next cancellation check.
const CHUNK_SIZE: usize = 64;

/// Shared flag that stops a running scan between files.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of [`scan_directory`].
#[derive(Debug, Default, Serialize)]
pub struct IngestReport {
    pub inserted: usize,
    pub updated: usize,
    /// Path and reason of every file that was skipped.
    pub failed: Vec<(PathBuf, String)>,
    pub cancelled: bool,
}

impl IngestReport {
    /// Files that made it into the catalog.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.inserted + self.updated
    }

    fn record_failure(&mut self, path: &Path, reason: String) {
        warn!("Skipping {}: {reason}", path.display());
        self.failed.push((path.to_path_buf(), reason));
    }
}

#[must_use]
pub fn is_supported(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|wanted| ext.eq_ignore_ascii_case(wanted)))
}

/// Every file under `root` with one of `extensions`, sorted by path.
///
/// Unreadable directories and entries are logged and skipped.
#[must_use]
pub fn collect_audio_files(root: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut pending = vec![root.to_path_buf()];
    let mut files = Vec::new();

    while let Some(directory) = pending.pop() {
        let entries = match std::fs::read_dir(&directory) {
            Ok(entries) => entries,
            Err(err) => {
                debug!("Cannot read directory {}: {err}", directory.display());
                continue;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!("Bad directory entry in {}: {err}", directory.display());
                    continue;
                }
            };

            let path = entry.path();
            match entry.file_type() {
                Ok(kind) if kind.is_dir() => pending.push(path),
                Ok(kind) if kind.is_file() && is_supported(&path, extensions) => files.push(path),
                Ok(_) => {}
                Err(err) => debug!("Cannot inspect {}: {err}", path.display()),
            }
        }
    }

    files.sort_unstable();
    files
}

/// Ingest every supported file under `root` into `catalog`.
///
/// Re-scanning a folder refreshes tags and keeps ratings. The returned report
/// counts inserts and updates separately from failures.
pub fn scan_directory(
    catalog: &Catalog,
    root: &Path,
    reader: &dyn TagReader,
    cancel: &CancelToken,
    extensions: &[String],
) -> Result<IngestReport> {
    let root = root.absolutize()?.into_owned();
    if !root.is_dir() {
        return Err(Error::ingest(&root, "not a directory"));
    }

    let files = collect_audio_files(&root, extensions);
    info!("Scanning {} ({} candidate files)", root.display(), files.len());

    let mut report = IngestReport::default();
    for chunk in files.chunks(CHUNK_SIZE) {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }

        let reads: Vec<(&PathBuf, Result<_>)> = chunk
            .par_iter()
            .map(|path| (path, reader.read(path)))
            .collect();

        for (path, read) in reads {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let mut track = match read {
                Ok(track) => track,
                Err(err) => {
                    report.record_failure(path, err.to_string());
                    continue;
                }
            };
            track.path = path.to_string_lossy().into_owned();

            match catalog.upsert(track) {
                Ok(UpsertOutcome::Inserted) => report.inserted += 1,
                Ok(UpsertOutcome::Updated) => report.updated += 1,
                Err(err @ (Error::Ingest { .. } | Error::Database(_))) => {
                    report.record_failure(path, err.to_string());
                }
                Err(err) => return Err(err),
            }
        }

        if report.cancelled {
            break;
        }
    }

    info!(
        "Scan of {} finished: {} inserted, {} updated, {} failed{}",
        root.display(),
        report.inserted,
        report.updated,
        report.failed.len(),
        if report.cancelled { " (cancelled)" } else { "" }
    );
    Ok(report)
}
