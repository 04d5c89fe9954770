//! Conversion pipeline orchestration
//!
//! Discovery, bitrate inspection and the skip decision, backup of prior
//! outputs, then two encode tiers on a bounded worker pool. The fallback tier
//! only starts once the primary tier's pool has fully drained, because its
//! input is exactly the primary tier's failures.

use super::backup::{prepare_backups, BackupSet};
use super::cancel::CancelFlag;
use super::summary::RunSummary;
use crate::command::last_line;
use crate::config::ConvertSettings;
use crate::discovery::{self, ScanOptions};
use crate::encode::{AfconvertEncoder, EncodeRequest, Encoder, FfmpegEncoder};
use crate::error::{Result, ShelfError};
use crate::naming::with_extension;
use crate::probe::{self, FfprobeProber, Prober};
use crate::tools::ConvertTools;
use crate::types::{
    extension_in, ConversionJob, ConversionOutcome, SourceFile, Tier, CONVERT_EXTENSIONS,
    TARGET_EXTENSION,
};
use crossbeam_channel::unbounded;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Everything a finished conversion run produced
#[derive(Debug)]
pub struct ConvertReport {
    /// Jobs in discovery order, each in a terminal state (or `Pending` on a dry run)
    pub jobs: Vec<ConversionJob>,
    pub summary: RunSummary,
    /// Backup directory, if any prior output was moved aside
    pub backup_dir: Option<PathBuf>,
    /// Diagnostic logs, kept only when something failed
    pub log_dir: Option<PathBuf>,
}

/// One unit of work for an encode worker
#[derive(Debug, Clone)]
struct EncodeTask {
    job_id: usize,
    source: PathBuf,
    target: PathBuf,
    bitrate_kbps: u32,
}

#[derive(Debug)]
enum TaskOutcome {
    Succeeded,
    Failed(String),
    Cancelled,
}

#[derive(Debug)]
struct TaskResult {
    job_id: usize,
    outcome: TaskOutcome,
}

/// The conversion pipeline with its collaborators
pub struct Converter {
    settings: ConvertSettings,
    prober: Arc<dyn Prober>,
    primary: Option<Arc<dyn Encoder>>,
    fallback: Arc<dyn Encoder>,
    cancel: CancelFlag,
}

impl Converter {
    pub fn new(
        settings: ConvertSettings,
        prober: Arc<dyn Prober>,
        fallback: Arc<dyn Encoder>,
    ) -> Self {
        Self {
            settings,
            prober,
            primary: None,
            fallback,
            cancel: CancelFlag::new(),
        }
    }

    /// Converter wired to ffprobe, afconvert (when present) and ffmpeg
    pub fn with_system_tools(settings: ConvertSettings) -> Result<Self> {
        let tools = ConvertTools::discover()?;
        let prober = Arc::new(FfprobeProber::new(tools.ffprobe, settings.probe_timeout));
        let fallback = Arc::new(FfmpegEncoder::new(tools.ffmpeg));
        let mut converter = Self::new(settings, prober, fallback);
        if let Some(afconvert) = tools.afconvert {
            converter = converter.with_primary(Arc::new(AfconvertEncoder::new(afconvert)));
        }
        Ok(converter)
    }

    pub fn with_primary(mut self, primary: Arc<dyn Encoder>) -> Self {
        self.primary = Some(primary);
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the whole pipeline
    ///
    /// Per-file failures end up in the report; only configuration problems,
    /// an empty input set and interrupts are errors.
    pub fn run(&self) -> Result<ConvertReport> {
        let pipeline_start = Instant::now();
        let settings = &self.settings;
        let pool = build_pool(settings.workers)?;

        // Phase 1: Discovery
        info!("Scanning {} (depth {})...", settings.root.display(), settings.max_depth);
        let options = ScanOptions {
            max_depth: settings.max_depth,
            follow_links: settings.follow_links,
            exclude: None,
        };
        let files = discovery::scan(&settings.root, &options, |ext| {
            extension_in(ext, CONVERT_EXTENSIONS)
        })?;
        if files.is_empty() {
            return Err(ShelfError::NoInputFiles(settings.root.clone()));
        }
        let files = drop_prior_outputs(files);

        let mut jobs: Vec<ConversionJob> = files
            .into_iter()
            .enumerate()
            .map(|(id, file)| ConversionJob::new(id, file))
            .collect();
        claim_targets(&mut jobs);

        // Phase 2: Bitrate inspection and skip decision
        self.decide(&pool, &mut jobs);
        self.cancel.check()?;

        if settings.dry_run {
            print_plan(&jobs, self.primary.as_deref(), self.fallback.as_ref());
            let summary = RunSummary::from_jobs(&jobs);
            return Ok(ConvertReport {
                jobs,
                summary,
                backup_dir: None,
                log_dir: None,
            });
        }

        // Phase 3: Move prior outputs aside
        let mut backups = BackupSet::new(&settings.root, chrono::Local::now());
        prepare_backups(&mut jobs, &mut backups);
        if let Some(dir) = backups.dir() {
            info!("Existing conversions backed up to {}", dir.display());
        }

        let log_dir = tempfile::Builder::new()
            .prefix("shelfsort-logs-")
            .tempdir()?;

        // Phase 4: Primary tier
        if let Some(primary) = &self.primary {
            let tasks = tasks_for(&jobs, settings.bitrate_kbps, |job| {
                primary.supports(job.source.extension())
            });
            if !tasks.is_empty() {
                info!("Encoding {} files with {}", tasks.len(), primary.name());
                let results = self.run_tier(
                    &pool,
                    Tier::Primary,
                    primary.as_ref(),
                    tasks,
                    log_dir.path(),
                );
                apply_results(&mut jobs, Tier::Primary, results);
            }
        } else {
            debug!("No primary encoder, every file goes to the fallback tier");
        }
        self.cancel.check()?;

        // Phase 5: Fallback tier for everything the primary tier did not finish
        let tasks = tasks_for(&jobs, settings.bitrate_kbps, |_| true);
        if !tasks.is_empty() {
            info!("Encoding {} files with {}", tasks.len(), self.fallback.name());
            let results = self.run_tier(
                &pool,
                Tier::Fallback,
                self.fallback.as_ref(),
                tasks,
                log_dir.path(),
            );
            apply_results(&mut jobs, Tier::Fallback, results);
        }
        self.cancel.check()?;

        let summary = RunSummary::from_jobs(&jobs);
        let log_dir = if summary.has_failures() {
            let kept = log_dir.keep();
            info!("Encoder logs kept in {}", kept.display());
            Some(kept)
        } else {
            None
        };

        info!(
            "Total pipeline time: {:.2}s",
            pipeline_start.elapsed().as_secs_f64()
        );

        Ok(ConvertReport {
            jobs,
            summary,
            backup_dir: backups.dir().map(Path::to_path_buf),
            log_dir,
        })
    }

    /// Inspect every open job's bitrate and mark near-target files as skipped
    fn decide(&self, pool: &rayon::ThreadPool, jobs: &mut [ConversionJob]) {
        let prober = self.prober.as_ref();
        let target = self.settings.bitrate_kbps;
        let policy = self.settings.skip_policy;
        let cancel = &self.cancel;

        pool.install(|| {
            jobs.par_iter_mut().for_each(|job| {
                if cancel.is_cancelled() || job.outcome.is_terminal() {
                    return;
                }
                job.bitrate_kbps = probe::inspect(prober, &job.source);
                if probe::should_skip(&job.source, job.bitrate_kbps, target, policy) {
                    info!(
                        "Skipping {} ({} kbps is within range of {} kbps)",
                        job.source.display_name(),
                        job.bitrate_kbps,
                        target
                    );
                    job.outcome = ConversionOutcome::SkippedOptimal;
                }
            });
        });
    }

    /// Run one tier's tasks on the pool and collect results in job order
    fn run_tier(
        &self,
        pool: &rayon::ThreadPool,
        tier: Tier,
        encoder: &dyn Encoder,
        tasks: Vec<EncodeTask>,
        log_dir: &Path,
    ) -> Vec<TaskResult> {
        let progress = self.progress_bar(tasks.len(), tier);
        let (tx, rx) = unbounded::<TaskResult>();

        pool.install(|| {
            tasks.par_iter().for_each_with(tx, |tx, task| {
                let result = self.execute_task(encoder, tier, task, log_dir);
                if let Some(pb) = &progress {
                    pb.inc(1);
                    pb.set_message(file_label(&task.source));
                }
                let _ = tx.send(result);
            });
        });

        if let Some(pb) = progress {
            pb.finish_with_message(format!("{} tier complete", tier.label()));
        }

        let mut results: Vec<TaskResult> = rx.iter().collect();
        results.sort_by_key(|r| r.job_id);
        results
    }

    /// Encode one file and hold the output to the success rule
    ///
    /// Success needs a zero exit status and a non-empty output file. On any
    /// failure the output path is removed so nothing partial is left behind.
    fn execute_task(
        &self,
        encoder: &dyn Encoder,
        tier: Tier,
        task: &EncodeTask,
        log_dir: &Path,
    ) -> TaskResult {
        if self.cancel.is_cancelled() {
            return TaskResult {
                job_id: task.job_id,
                outcome: TaskOutcome::Cancelled,
            };
        }

        debug!(
            "[{}] {} -> {}",
            tier.label(),
            task.source.display(),
            task.target.display()
        );
        let request = EncodeRequest {
            input: &task.source,
            output: &task.target,
            bitrate_kbps: task.bitrate_kbps,
        };
        let result = encoder.encode(&request);

        let transcript = match &result {
            Ok(text) => text.clone(),
            Err(e) => e.to_string(),
        };
        write_log(log_dir, task.job_id, tier, &task.source, &transcript);

        let outcome = match result {
            Ok(_) if output_size(&task.target) > 0 => TaskOutcome::Succeeded,
            Ok(_) => {
                remove_partial(&task.target);
                TaskOutcome::Failed(format!(
                    "{} exited cleanly but wrote no output",
                    encoder.name()
                ))
            }
            Err(e) => {
                remove_partial(&task.target);
                let text = e.to_string();
                let line = last_line(&text).unwrap_or("encode failed").to_string();
                warn!("{} failed for {}: {}", encoder.name(), task.source.display(), line);
                TaskOutcome::Failed(text)
            }
        };

        TaskResult {
            job_id: task.job_id,
            outcome,
        }
    }

    fn progress_bar(&self, len: usize, tier: Tier) -> Option<ProgressBar> {
        if !self.settings.show_progress {
            return None;
        }
        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_prefix(tier.label());
        Some(pb)
    }
}

/// Run a conversion with the system's tools, honouring Ctrl-C via `cancel`
pub fn run(settings: &ConvertSettings, cancel: CancelFlag) -> Result<ConvertReport> {
    Converter::with_system_tools(settings.clone())?
        .with_cancel_flag(cancel)
        .run()
}

fn build_pool(workers: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("shelfsort-encode-{}", i))
        .build()
        .map_err(|e| ShelfError::Config(format!("Failed to configure thread pool: {}", e)))
}

/// Output path with the extension case folded, so `a.M4A` and `a.m4a` compare equal
fn output_key(path: &Path) -> PathBuf {
    with_extension(path, TARGET_EXTENSION)
}

/// Leave out `.m4a` files that are the conversion target of another source
///
/// Such a file is a previous run's output: it is handled by the backup step
/// of the source it came from, not converted on its own.
fn drop_prior_outputs(files: Vec<SourceFile>) -> Vec<SourceFile> {
    let targets: HashSet<PathBuf> = files
        .iter()
        .filter(|file| file.extension() != TARGET_EXTENSION)
        .map(|file| output_key(file.path()))
        .collect();

    files
        .into_iter()
        .filter(|file| {
            let prior =
                file.extension() == TARGET_EXTENSION && targets.contains(&output_key(file.path()));
            if prior {
                debug!("{} is a prior output, not a source", file.path().display());
            }
            !prior
        })
        .collect()
}

/// Give each output path to the first job, in discovery order, that derives it
///
/// `song.flac` and `song.wav` both map to `song.m4a`; the later job fails
/// instead of racing the earlier one for the same file.
fn claim_targets(jobs: &mut [ConversionJob]) {
    let mut owners: HashMap<PathBuf, PathBuf> = HashMap::new();
    for job in jobs.iter_mut() {
        let key = output_key(&job.target);
        if let Some(owner) = owners.get(&key) {
            warn!(
                "{} would overwrite the output of {}, not converting it",
                job.source.path().display(),
                owner.display()
            );
            job.diagnostic = Some(format!(
                "output {} already produced by {}",
                job.target.display(),
                owner.display()
            ));
            job.outcome = ConversionOutcome::Failed;
        } else {
            owners.insert(key, job.source.path().to_path_buf());
        }
    }
}

/// Tasks for every job still in flight that `eligible` accepts
fn tasks_for<F>(jobs: &[ConversionJob], bitrate_kbps: u32, eligible: F) -> Vec<EncodeTask>
where
    F: Fn(&ConversionJob) -> bool,
{
    jobs.iter()
        .filter(|job| !job.outcome.is_terminal())
        .filter(|job| eligible(job))
        .map(|job| EncodeTask {
            job_id: job.id,
            source: job.encode_input().to_path_buf(),
            target: job.target.clone(),
            bitrate_kbps,
        })
        .collect()
}

/// Record a tier's results on the jobs
///
/// A primary failure leaves the job open for the fallback tier; a fallback
/// failure is final. Cancelled tasks leave their job untouched.
fn apply_results(jobs: &mut [ConversionJob], tier: Tier, results: Vec<TaskResult>) {
    for result in results {
        let Some(job) = jobs.get_mut(result.job_id) else {
            error!("Result for unknown job {}", result.job_id);
            continue;
        };
        match (result.outcome, tier) {
            (TaskOutcome::Succeeded, Tier::Primary) => {
                job.outcome = ConversionOutcome::SucceededPrimary;
            }
            (TaskOutcome::Succeeded, Tier::Fallback) => {
                job.outcome = ConversionOutcome::SucceededFallback;
            }
            (TaskOutcome::Failed(text), Tier::Primary) => {
                job.diagnostic = Some(text);
            }
            (TaskOutcome::Failed(text), Tier::Fallback) => {
                job.diagnostic = Some(text);
                job.outcome = ConversionOutcome::Failed;
            }
            (TaskOutcome::Cancelled, _) => {}
        }
    }
}

fn output_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

fn remove_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed partial output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove partial output {}: {}", path.display(), e),
    }
}

fn write_log(log_dir: &Path, job_id: usize, tier: Tier, source: &Path, transcript: &str) {
    let path = log_dir.join(format!("{:05}-{}.log", job_id, tier.label()));
    let contents = format!("source: {}\n\n{}\n", source.display(), transcript);
    if let Err(e) = fs::write(&path, contents) {
        debug!("Could not write log {}: {}", path.display(), e);
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned()
}

/// Dry run: show the plan grouped by decision
fn print_plan(jobs: &[ConversionJob], primary: Option<&dyn Encoder>, fallback: &dyn Encoder) {
    let (skipped, rest): (Vec<&ConversionJob>, Vec<&ConversionJob>) = jobs
        .iter()
        .partition(|job| job.outcome == ConversionOutcome::SkippedOptimal);
    let (rejected, converted): (Vec<&ConversionJob>, Vec<&ConversionJob>) = rest
        .into_iter()
        .partition(|job| job.outcome == ConversionOutcome::Failed);

    println!();
    println!("=== DRY RUN MODE ===");

    println!();
    println!("Would skip ({} near target):", skipped.len());
    for job in &skipped {
        println!("  {} [{} kbps]", job.source.path().display(), job.bitrate_kbps);
    }

    println!();
    println!("Would convert ({}):", converted.len());
    for job in &converted {
        let bitrate = if job.bitrate_kbps == 0 {
            "unknown".to_string()
        } else {
            format!("{} kbps", job.bitrate_kbps)
        };
        let tier = match primary {
            Some(p) if p.supports(job.source.extension()) => p.name(),
            _ => fallback.name(),
        };
        let backup = if output_size(&job.target) > 0 {
            ", back up existing output"
        } else {
            ""
        };
        println!(
            "  {} [{}] via {}{}",
            job.source.path().display(),
            bitrate,
            tier,
            backup
        );
    }

    if !rejected.is_empty() {
        println!();
        println!("Would not convert ({}):", rejected.len());
        for job in &rejected {
            println!(
                "  {} ({})",
                job.source.path().display(),
                job.diagnostic.as_deref().unwrap_or("output already claimed")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: usize, name: &str) -> ConversionJob {
        ConversionJob::new(id, SourceFile::new(name))
    }

    #[test]
    fn test_prior_outputs_dropped() {
        let files = vec![
            SourceFile::new("/m/a.flac"),
            SourceFile::new("/m/a.m4a"),
            SourceFile::new("/m/b.m4a"),
        ];
        let kept: Vec<PathBuf> = drop_prior_outputs(files)
            .iter()
            .map(|f| f.path().to_path_buf())
            .collect();
        assert_eq!(kept, vec![PathBuf::from("/m/a.flac"), PathBuf::from("/m/b.m4a")]);
    }

    #[test]
    fn test_uppercase_prior_output_dropped() {
        let files = vec![
            SourceFile::new("/m/a.flac"),
            SourceFile::new("/m/a.M4A"),
            SourceFile::new("/m/b.M4A"),
        ];
        let kept: Vec<PathBuf> = drop_prior_outputs(files)
            .iter()
            .map(|f| f.path().to_path_buf())
            .collect();
        assert_eq!(kept, vec![PathBuf::from("/m/a.flac"), PathBuf::from("/m/b.M4A")]);
    }

    #[test]
    fn test_first_source_claims_shared_output() {
        let mut jobs = vec![
            job(0, "/m/song.flac"),
            job(1, "/m/song.wav"),
            job(2, "/m/other.wav"),
            job(3, "/m/song.aiff"),
        ];
        claim_targets(&mut jobs);

        assert_eq!(jobs[0].outcome, ConversionOutcome::Pending);
        assert_eq!(jobs[2].outcome, ConversionOutcome::Pending);
        for loser in [&jobs[1], &jobs[3]] {
            assert_eq!(loser.outcome, ConversionOutcome::Failed);
            let diagnostic = loser.diagnostic.as_deref().unwrap_or_default();
            assert!(diagnostic.contains("already produced by /m/song.flac"), "{}", diagnostic);
        }

        let ids: Vec<usize> = tasks_for(&jobs, 256, |_| true).iter().map(|t| t.job_id).collect();
        assert_eq!(ids, vec![0, 2]);
    }

    #[test]
    fn test_tasks_skip_terminal_jobs() {
        let mut jobs = vec![job(0, "/m/a.flac"), job(1, "/m/b.mp3"), job(2, "/m/c.wav")];
        jobs[1].outcome = ConversionOutcome::SkippedOptimal;
        jobs[2].outcome = ConversionOutcome::AlreadyBackedUp;

        let tasks = tasks_for(&jobs, 192, |_| true);
        let ids: Vec<usize> = tasks.iter().map(|t| t.job_id).collect();
        assert_eq!(ids, vec![0, 2]);
        assert!(tasks.iter().all(|t| t.bitrate_kbps == 192));
        assert_eq!(tasks[0].target, PathBuf::from("/m/a.m4a"));
    }

    #[test]
    fn test_primary_failure_stays_open() {
        let mut jobs = vec![job(0, "/m/a.flac"), job(1, "/m/b.flac")];
        apply_results(
            &mut jobs,
            Tier::Primary,
            vec![
                TaskResult {
                    job_id: 0,
                    outcome: TaskOutcome::Succeeded,
                },
                TaskResult {
                    job_id: 1,
                    outcome: TaskOutcome::Failed("afconvert: bad header".into()),
                },
            ],
        );
        assert_eq!(jobs[0].outcome, ConversionOutcome::SucceededPrimary);
        assert_eq!(jobs[1].outcome, ConversionOutcome::Pending);
        assert!(jobs[1].diagnostic.is_some());

        apply_results(
            &mut jobs,
            Tier::Fallback,
            vec![TaskResult {
                job_id: 1,
                outcome: TaskOutcome::Failed("ffmpeg: Conversion failed!".into()),
            }],
        );
        assert_eq!(jobs[1].outcome, ConversionOutcome::Failed);
        assert_eq!(jobs[1].diagnostic.as_deref(), Some("ffmpeg: Conversion failed!"));
    }

    #[test]
    fn test_cancelled_task_leaves_job_alone() {
        let mut jobs = vec![job(0, "/m/a.flac")];
        apply_results(
            &mut jobs,
            Tier::Fallback,
            vec![TaskResult {
                job_id: 0,
                outcome: TaskOutcome::Cancelled,
            }],
        );
        assert_eq!(jobs[0].outcome, ConversionOutcome::Pending);
    }
}
