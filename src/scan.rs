//! Directory scanning for settled, displayable photos.

use std::ffi::OsStr;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use crate::config::Configuration;
use crate::error::Error;

/// One photo visible to the display client at scan time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoRecord {
    /// File base name, unique within the directory.
    pub name: String,
    /// Public URL derived from `name`.
    pub url: String,
    pub modified_at: SystemTime,
    /// Birth time, or `modified_at` where the platform does not report one.
    pub created_at: SystemTime,
}

/// Return `true` if `path` has one of the `exts` (lowercase, without dot).
#[must_use]
pub fn is_supported_image(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            exts.iter().any(|e| *e == ext)
        })
}

/// Scan the configured photo directory.
///
/// Entries are filtered by extension before any metadata is read; the
/// remaining entries are stated concurrently and joined before the settle
/// filter runs. The result is in completion order, so callers must sort.
///
/// # Errors
/// Returns [`Error::BadDir`] if the directory is missing or not a directory,
/// and [`Error::Io`] if it cannot be listed or an entry cannot be stated.
#[instrument(skip(cfg, now), fields(root = %cfg.photo_library_path.display()))]
pub async fn scan_directory(
    cfg: &Configuration,
    now: SystemTime,
) -> Result<Vec<PhotoRecord>, Error> {
    let root = cfg.photo_library_path.clone();
    let entries = tokio::task::spawn_blocking(move || list_entries(&root)).await??;

    let exts = cfg.extension_refs();
    let mut pending = entries.into_iter().filter_map(|path| {
        if !is_supported_image(&path, &exts) {
            return None;
        }
        match path.file_name().and_then(OsStr::to_str) {
            Some(name) => Some((name.to_owned(), path)),
            None => {
                debug!(path = %path.display(), "skipping non UTF-8 file name");
                None
            }
        }
    });

    let mut stats: JoinSet<(String, PathBuf, io::Result<Metadata>)> = JoinSet::new();
    let mut records = Vec::new();
    let mut stated = 0usize;
    loop {
        while stats.len() < cfg.scan_max_concurrent_stats {
            let Some((name, path)) = pending.next() else {
                break;
            };
            stats.spawn(async move {
                let meta = tokio::fs::metadata(&path).await;
                (name, path, meta)
            });
        }

        let Some(joined) = stats.join_next().await else {
            break;
        };
        let (name, path, meta) = joined?;
        stated += 1;
        match meta {
            Ok(meta) => {
                if let Some(record) = settled_record(cfg, name, &meta, now) {
                    records.push(record);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "entry vanished before stat; skipping");
            }
            Err(e) => return Err(e.into()),
        }
    }

    debug!(
        candidates = stated,
        settled = records.len(),
        "photo scan complete"
    );
    Ok(records)
}

/// Scan, treating any failure as an empty directory.
///
/// The display client cannot act on an error other than to keep polling,
/// so failures are logged here and reported as zero photos.
pub async fn scan_or_empty(cfg: &Configuration, now: SystemTime) -> Vec<PhotoRecord> {
    match scan_directory(cfg, now).await {
        Ok(records) => records,
        Err(err) => {
            warn!(
                error = %err,
                root = %cfg.photo_library_path.display(),
                "photo scan failed; reporting zero photos"
            );
            Vec::new()
        }
    }
}

fn list_entries(root: &Path) -> Result<Vec<PathBuf>, Error> {
    if !root.is_dir() {
        return Err(Error::BadDir(root.display().to_string()));
    }
    let mut out = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
        out.push(entry?.into_path());
    }
    Ok(out)
}

fn settled_record(
    cfg: &Configuration,
    name: String,
    meta: &Metadata,
    now: SystemTime,
) -> Option<PhotoRecord> {
    if !meta.is_file() {
        return None;
    }
    let modified_at = meta.modified().ok()?;
    // A write stamped in the future counts as age zero.
    let age = now.duration_since(modified_at).unwrap_or_default();
    if age < cfg.settle_threshold {
        debug!(name = %name, age_ms = age.as_millis() as u64, "photo not settled yet");
        return None;
    }
    let created_at = meta.created().unwrap_or(modified_at);
    Some(PhotoRecord {
        url: cfg.photo_url(&name),
        name,
        modified_at,
        created_at,
    })
}
