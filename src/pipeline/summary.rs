//! Run summaries and the end-of-run report

use crate::command::last_line;
use crate::types::{ConversionJob, ConversionOutcome, OrganizeJob, OrganizeOutcome};
use std::path::PathBuf;

/// A job that did not make it, with the last thing its tool said
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedJob {
    pub path: PathBuf,
    pub diagnostic: String,
}

impl FailedJob {
    fn new(path: PathBuf, diagnostic: Option<&str>) -> Self {
        let diagnostic = diagnostic
            .and_then(last_line)
            .unwrap_or("no diagnostic output")
            .to_string();
        Self { path, diagnostic }
    }
}

// =============================================================================
// Conversion
// =============================================================================

/// Counters for one conversion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub found: usize,
    pub skipped: usize,
    pub backed_up: usize,
    pub succeeded_primary: usize,
    pub succeeded_fallback: usize,
    pub failed: usize,
    /// Failed jobs in discovery order
    pub failures: Vec<FailedJob>,
}

impl RunSummary {
    /// Summarize jobs; `jobs` must be in discovery order
    pub fn from_jobs(jobs: &[ConversionJob]) -> Self {
        let mut summary = Self::default();
        for job in jobs {
            summary.record(job);
        }
        summary
    }

    /// Fold one finished job into the counters
    pub fn record(&mut self, job: &ConversionJob) {
        self.found += 1;
        if job.backed_up.is_some() {
            self.backed_up += 1;
        }
        match job.outcome {
            ConversionOutcome::SkippedOptimal => self.skipped += 1,
            ConversionOutcome::SucceededPrimary => self.succeeded_primary += 1,
            ConversionOutcome::SucceededFallback => self.succeeded_fallback += 1,
            ConversionOutcome::Failed => {
                self.failed += 1;
                self.failures.push(FailedJob::new(
                    job.source.path().to_path_buf(),
                    job.diagnostic.as_deref(),
                ));
            }
            ConversionOutcome::Pending | ConversionOutcome::AlreadyBackedUp => {}
        }
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded_primary + self.succeeded_fallback
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Print the report to stdout
    pub fn print_report(&self) {
        println!();
        println!(
            "Summary: {} found, {} skipped (near target), {} backed up, {} converted ({} primary, {} fallback), {} failed",
            self.found,
            self.skipped,
            self.backed_up,
            self.succeeded(),
            self.succeeded_primary,
            self.succeeded_fallback,
            self.failed
        );
        print_failures(&self.failures);
    }
}

// =============================================================================
// Organizer
// =============================================================================

/// Counters for one organizer run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizeSummary {
    pub found: usize,
    pub moved: usize,
    pub copied: usize,
    pub in_place: usize,
    /// Dry run only: moves that would have happened
    pub planned: usize,
    pub failed: usize,
    pub failures: Vec<FailedJob>,
    /// Copies whose source could not be removed
    pub warnings: Vec<String>,
}

impl OrganizeSummary {
    pub fn from_jobs(jobs: &[OrganizeJob]) -> Self {
        let mut summary = Self::default();
        for job in jobs {
            summary.record(job);
        }
        summary
    }

    pub fn record(&mut self, job: &OrganizeJob) {
        self.found += 1;
        match job.outcome {
            OrganizeOutcome::Moved => self.moved += 1,
            OrganizeOutcome::Copied => self.copied += 1,
            OrganizeOutcome::SkippedSameLocation => self.in_place += 1,
            OrganizeOutcome::Pending => self.planned += 1,
            OrganizeOutcome::Failed => {
                self.failed += 1;
                self.failures.push(FailedJob::new(
                    job.source.path().to_path_buf(),
                    job.diagnostic.as_deref(),
                ));
            }
        }
        if let Some(warning) = &job.warning {
            self.warnings.push(warning.clone());
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn print_report(&self) {
        println!();
        if self.planned > 0 {
            println!(
                "Summary: {} found, {} would move, {} already in place",
                self.found, self.planned, self.in_place
            );
        } else {
            println!(
                "Summary: {} found, {} moved, {} copied, {} already in place, {} failed",
                self.found, self.moved, self.copied, self.in_place, self.failed
            );
        }
        print_failures(&self.failures);
        if !self.warnings.is_empty() {
            println!();
            println!("Warnings:");
            for warning in &self.warnings {
                println!("  {}", warning);
            }
        }
    }
}

fn print_failures(failures: &[FailedJob]) {
    if failures.is_empty() {
        return;
    }
    println!();
    println!("Failed:");
    for failure in failures {
        println!("  {}: {}", failure.path.display(), failure.diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceFile;

    fn job(id: usize, name: &str, outcome: ConversionOutcome) -> ConversionJob {
        let mut job = ConversionJob::new(id, SourceFile::new(name));
        job.outcome = outcome;
        job
    }

    #[test]
    fn test_counts_by_outcome() {
        let mut failed = job(3, "/m/d.wav", ConversionOutcome::Failed);
        failed.diagnostic = Some("Input #0\nInvalid data found when processing input\n".into());
        let mut backed = job(2, "/m/c.m4a", ConversionOutcome::SucceededFallback);
        backed.backed_up = Some(PathBuf::from("/m/backup/c.m4a"));

        let jobs = vec![
            job(0, "/m/a.flac", ConversionOutcome::SucceededPrimary),
            job(1, "/m/b.m4a", ConversionOutcome::SkippedOptimal),
            backed,
            failed,
        ];
        let summary = RunSummary::from_jobs(&jobs);

        assert_eq!(summary.found, 4);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.backed_up, 1);
        assert_eq!(summary.succeeded_primary, 1);
        assert_eq!(summary.succeeded_fallback, 1);
        assert_eq!(summary.failed, 1);
        assert!(summary.has_failures());
        assert_eq!(
            summary.failures,
            vec![FailedJob {
                path: PathBuf::from("/m/d.wav"),
                diagnostic: "Invalid data found when processing input".into(),
            }]
        );
    }

    #[test]
    fn test_failure_without_output() {
        let jobs = vec![job(0, "/m/a.flac", ConversionOutcome::Failed)];
        let summary = RunSummary::from_jobs(&jobs);
        assert_eq!(summary.failures[0].diagnostic, "no diagnostic output");
    }

    #[test]
    fn test_organize_summary_collects_warnings() {
        let mut copied = OrganizeJob::new(
            0,
            SourceFile::new("/m/a.mp3"),
            Default::default(),
            PathBuf::from("/m/Unknown Artist/Unknown Album/a.mp3"),
        );
        copied.outcome = OrganizeOutcome::Copied;
        copied.warning = Some("duplicate left at /m/a.mp3".into());

        let summary = OrganizeSummary::from_jobs(&[copied]);
        assert_eq!(summary.copied, 1);
        assert_eq!(summary.warnings.len(), 1);
        assert!(!summary.has_failures());
    }
}
