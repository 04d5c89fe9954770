//! File discovery and scanning

use crate::error::{Result, ShelfError};
use crate::types::SourceFile;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Name prefix of per-run backup directories; never scanned
pub const BACKUP_DIR_PREFIX: &str = "shelfsort_backup_";

/// How far and how to walk
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// 1 = only the root's own entries
    pub max_depth: usize,
    /// Follow symbolic links (off by default)
    pub follow_links: bool,
    /// Extra directory to leave out, e.g. the active backup set
    pub exclude: Option<PathBuf>,
}

impl ScanOptions {
    /// Only the root directory itself
    pub fn flat() -> Self {
        Self::with_depth(1)
    }

    pub fn with_depth(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
            follow_links: false,
            exclude: None,
        }
    }
}

/// Scan a directory for files whose lowercase extension passes `accept`
///
/// Results are in file-name order per directory and free of duplicates (two
/// symlinks resolving to the same file count once). A directory with no
/// matches yields an empty list, not an error.
pub fn scan<F>(root: &Path, options: &ScanOptions, accept: F) -> Result<Vec<SourceFile>>
where
    F: Fn(&str) -> bool,
{
    if !root.exists() {
        return Err(ShelfError::FileNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(ShelfError::Config(format!(
            "'{}' is not a directory",
            root.display()
        )));
    }

    let walker = WalkDir::new(root)
        .max_depth(options.max_depth)
        .follow_links(options.follow_links)
        .sort_by_file_name();

    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for entry in walker
        .into_iter()
        .filter_entry(|e| !is_excluded(e, options.exclude.as_deref()))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        // Without follow_links a symlinked file reports as a symlink and is left out
        if !entry.file_type().is_file() {
            continue;
        }

        let ext = entry
            .path()
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if ext.is_empty() || !accept(&ext) {
            continue;
        }

        let identity =
            std::fs::canonicalize(entry.path()).unwrap_or_else(|_| entry.path().to_path_buf());
        if !seen.insert(identity) {
            debug!("Already discovered: {}", entry.path().display());
            continue;
        }

        debug!("Discovered: {}", entry.path().display());
        files.push(SourceFile::new(entry.into_path()));
    }

    info!("Discovered {} audio files", files.len());

    if files.is_empty() {
        warn!("No supported audio files found in {}", root.display());
    }

    Ok(files)
}

/// Backup directories (ours from any run, plus an explicit exclude) are pruned
fn is_excluded(entry: &DirEntry, exclude: Option<&Path>) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    if exclude.is_some_and(|ex| entry.path() == ex) {
        return true;
    }
    entry
        .file_name()
        .to_string_lossy()
        .starts_with(BACKUP_DIR_PREFIX)
}
