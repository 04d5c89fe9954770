//! Backing up existing conversions before they are replaced
//!
//! The backup directory is created on first use only, at most once per run,
//! and its name carries the run's start time so repeated runs never share one.

use super::relocate::move_file;
use crate::discovery::BACKUP_DIR_PREFIX;
use crate::error::{Result, ShelfError};
use crate::types::{ConversionJob, ConversionOutcome};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Lazily created per-run backup directory
#[derive(Debug)]
pub struct BackupSet {
    root: PathBuf,
    stamp: String,
    dir: Option<PathBuf>,
}

impl BackupSet {
    pub fn new(root: impl Into<PathBuf>, started: DateTime<Local>) -> Self {
        Self {
            root: root.into(),
            stamp: started.format("%Y%m%d_%H%M%S").to_string(),
            dir: None,
        }
    }

    /// The backup directory, if anything has been backed up
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    fn ensure_dir(&mut self) -> Result<PathBuf> {
        if let Some(dir) = &self.dir {
            return Ok(dir.clone());
        }

        let base = format!("{}{}", BACKUP_DIR_PREFIX, self.stamp);
        let mut candidate = self.root.join(&base);
        let mut n = 1;
        while candidate.exists() {
            candidate = self.root.join(format!("{}_{}", base, n));
            n += 1;
        }

        fs::create_dir_all(&candidate).map_err(|e| ShelfError::Backup {
            path: candidate.clone(),
            reason: format!("cannot create backup directory: {}", e),
        })?;
        info!("Created backup directory {}", candidate.display());

        self.dir = Some(candidate.clone());
        Ok(candidate)
    }

    /// Move `file` into the backup set, keeping its path relative to the root
    pub fn stash(&mut self, file: &Path) -> Result<PathBuf> {
        let dir = self.ensure_dir()?;
        let relative = file
            .strip_prefix(&self.root)
            .ok()
            .filter(|rel| !rel.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .or_else(|| file.file_name().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("unnamed"));
        let dest = dir.join(relative);

        move_file(file, &dest).map_err(|e| ShelfError::Backup {
            path: file.to_path_buf(),
            reason: e.to_string(),
        })?;
        debug!("Backed up {} -> {}", file.display(), dest.display());
        Ok(dest)
    }
}

/// Move aside every valid prior output before anything is encoded
///
/// Skipped jobs are left alone. A non-empty target is moved into the backup
/// set and the job marked `AlreadyBackedUp`; an empty target is deleted so the
/// encoder can write a fresh one. A job whose output cannot be secured fails
/// here instead of risking an overwrite.
pub fn prepare_backups(jobs: &mut [ConversionJob], backups: &mut BackupSet) {
    for job in jobs.iter_mut() {
        if job.outcome != ConversionOutcome::Pending {
            continue;
        }
        let size = match fs::metadata(&job.target) {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => continue,
        };

        if size == 0 {
            if job.converts_in_place() {
                job.outcome = ConversionOutcome::Failed;
                job.diagnostic = Some("source file is empty".to_string());
                continue;
            }
            debug!("Removing empty prior output {}", job.target.display());
            if let Err(e) = fs::remove_file(&job.target) {
                warn!("Could not remove empty {}: {}", job.target.display(), e);
            }
            continue;
        }

        match backups.stash(&job.target) {
            Ok(dest) => {
                job.backed_up = Some(dest);
                job.outcome = ConversionOutcome::AlreadyBackedUp;
            }
            Err(e) => {
                warn!("{}", e);
                job.outcome = ConversionOutcome::Failed;
                job.diagnostic = Some(e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceFile;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_backup_dir_created_lazily_once() {
        let dir = TempDir::new().unwrap();
        let mut backups = BackupSet::new(dir.path(), fixed_time());
        assert!(backups.dir().is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

        fs::write(dir.path().join("a.m4a"), b"aac").unwrap();
        fs::write(dir.path().join("b.m4a"), b"aac").unwrap();
        backups.stash(&dir.path().join("a.m4a")).unwrap();
        backups.stash(&dir.path().join("b.m4a")).unwrap();

        let backup_dir = backups.dir().unwrap();
        assert_eq!(
            backup_dir.file_name().unwrap(),
            "shelfsort_backup_20240309_140507"
        );
        assert!(backup_dir.join("a.m4a").exists());
        assert!(backup_dir.join("b.m4a").exists());
    }

    #[test]
    fn test_backup_name_unique_when_taken() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("shelfsort_backup_20240309_140507")).unwrap();
        fs::write(dir.path().join("a.m4a"), b"aac").unwrap();

        let mut backups = BackupSet::new(dir.path(), fixed_time());
        backups.stash(&dir.path().join("a.m4a")).unwrap();
        assert_eq!(
            backups.dir().unwrap().file_name().unwrap(),
            "shelfsort_backup_20240309_140507_1"
        );
    }

    #[test]
    fn test_stash_keeps_relative_layout() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("disc1")).unwrap();
        fs::write(dir.path().join("disc1/a.m4a"), b"aac").unwrap();

        let mut backups = BackupSet::new(dir.path(), fixed_time());
        let dest = backups.stash(&dir.path().join("disc1/a.m4a")).unwrap();
        assert!(dest.ends_with("disc1/a.m4a"));
        assert!(dest.exists());
    }

    #[test]
    fn test_prepare_backups_rules() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("valid.flac"), b"src").unwrap();
        fs::write(root.join("valid.m4a"), b"old conversion").unwrap();
        fs::write(root.join("empty.flac"), b"src").unwrap();
        fs::write(root.join("empty.m4a"), b"").unwrap();
        fs::write(root.join("fresh.flac"), b"src").unwrap();

        let mut jobs: Vec<ConversionJob> = ["valid.flac", "empty.flac", "fresh.flac"]
            .iter()
            .enumerate()
            .map(|(i, name)| ConversionJob::new(i, SourceFile::new(root.join(name))))
            .collect();

        let mut backups = BackupSet::new(root, fixed_time());
        prepare_backups(&mut jobs, &mut backups);

        assert_eq!(jobs[0].outcome, ConversionOutcome::AlreadyBackedUp);
        assert!(!root.join("valid.m4a").exists());
        let stashed = jobs[0].backed_up.as_ref().unwrap();
        assert_eq!(fs::read(stashed).unwrap(), b"old conversion");

        assert_eq!(jobs[1].outcome, ConversionOutcome::Pending);
        assert!(jobs[1].backed_up.is_none());
        assert!(!root.join("empty.m4a").exists());

        assert_eq!(jobs[2].outcome, ConversionOutcome::Pending);
    }

    #[test]
    fn test_no_backup_dir_without_prior_outputs() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.flac"), b"src").unwrap();
        let mut jobs = vec![ConversionJob::new(0, SourceFile::new(dir.path().join("a.flac")))];

        let mut backups = BackupSet::new(dir.path(), fixed_time());
        prepare_backups(&mut jobs, &mut backups);
        assert!(backups.dir().is_none());
    }

    #[test]
    fn test_skipped_jobs_not_backed_up() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.m4a"), b"aac").unwrap();
        let mut jobs = vec![ConversionJob::new(0, SourceFile::new(dir.path().join("a.m4a")))];
        jobs[0].outcome = ConversionOutcome::SkippedOptimal;

        let mut backups = BackupSet::new(dir.path(), fixed_time());
        prepare_backups(&mut jobs, &mut backups);
        assert!(dir.path().join("a.m4a").exists());
        assert!(backups.dir().is_none());
    }
}
