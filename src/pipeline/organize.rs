//! Organizer pipeline: place audio files under `artist/album/`
//!
//! Files are handled one at a time. Each is probed for tags, given a
//! sanitized target path, and moved unless it is already there.

use super::cancel::CancelFlag;
use super::relocate::{move_file, same_location, unique_target, Relocation};
use super::summary::OrganizeSummary;
use crate::config::{ExtensionSelection, OrganizeSettings};
use crate::discovery::{self, ScanOptions};
use crate::error::{Result, ShelfError};
use crate::naming::organized_path;
use crate::probe::{self, FfprobeProber, Prober};
use crate::tools::{require, FFPROBE};
use crate::types::{extension_in, OrganizeJob, OrganizeOutcome, SourceFile, ORGANIZE_EXTENSIONS};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything an organizer run produced
#[derive(Debug, Default)]
pub struct OrganizeReport {
    /// Jobs in discovery order
    pub jobs: Vec<OrganizeJob>,
    pub summary: OrganizeSummary,
}

pub struct Organizer {
    settings: OrganizeSettings,
    prober: Arc<dyn Prober>,
    cancel: CancelFlag,
}

impl Organizer {
    pub fn new(settings: OrganizeSettings, prober: Arc<dyn Prober>) -> Self {
        Self {
            settings,
            prober,
            cancel: CancelFlag::new(),
        }
    }

    /// Organizer wired to ffprobe
    pub fn with_system_tools(settings: OrganizeSettings) -> Result<Self> {
        let ffprobe = require(&[FFPROBE])?.into_iter().next();
        let Some(ffprobe) = ffprobe else {
            return Err(ShelfError::MissingTools {
                tools: vec![FFPROBE.name.to_string()],
            });
        };
        let prober = Arc::new(FfprobeProber::new(ffprobe, settings.probe_timeout));
        Ok(Self::new(settings, prober))
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Every supported file under the root
    pub fn discover(&self) -> Result<Vec<SourceFile>> {
        let mut options = if self.settings.recursive {
            ScanOptions::with_depth(usize::MAX)
        } else {
            ScanOptions::flat()
        };
        options.follow_links = self.settings.follow_links;

        info!("Scanning {}...", self.settings.root.display());
        discovery::scan(&self.settings.root, &options, |ext| {
            extension_in(ext, ORGANIZE_EXTENSIONS)
        })
    }

    /// Run with stdin/stdout for the interactive prompt
    pub fn run(&self) -> Result<OrganizeReport> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        self.run_with_prompt(stdin.lock(), stdout.lock())
    }

    /// Run, asking `input`/`output` when the selection is interactive
    pub fn run_with_prompt<R: BufRead, W: Write>(&self, input: R, output: W) -> Result<OrganizeReport> {
        let files = self.discover()?;
        if files.is_empty() {
            return Ok(OrganizeReport::default());
        }

        let selection = match &self.settings.selection {
            ExtensionSelection::Interactive => {
                resolve_selection(&extension_counts(&files), input, output)?
            }
            other => other.clone(),
        };

        let selected: Vec<SourceFile> = files
            .into_iter()
            .filter(|file| selection.allows(file.extension()))
            .collect();
        debug!("{} files selected", selected.len());

        self.organize(selected)
    }

    /// Organize an already discovered set of files, in order
    pub fn organize(&self, files: Vec<SourceFile>) -> Result<OrganizeReport> {
        let progress = self.progress_bar(files.len());
        let mut jobs = Vec::with_capacity(files.len());

        for (id, file) in files.into_iter().enumerate() {
            self.cancel.check()?;
            let job = self.organize_one(id, file);
            if let Some(pb) = &progress {
                pb.inc(1);
                pb.set_message(job.source.display_name());
            }
            jobs.push(job);
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        let summary = OrganizeSummary::from_jobs(&jobs);
        Ok(OrganizeReport { jobs, summary })
    }

    fn organize_one(&self, id: usize, file: SourceFile) -> OrganizeJob {
        let tags = probe::extract(self.prober.as_ref(), file.path());
        let target = organized_path(&self.settings.root, &tags.artist, &tags.album, file.path());

        if same_location(file.path(), &target) {
            debug!("{} already in place", file.path().display());
            let mut job = OrganizeJob::new(id, file, tags, target);
            job.outcome = OrganizeOutcome::SkippedSameLocation;
            return job;
        }

        let target = unique_target(&target, file.path());
        let mut job = OrganizeJob::new(id, file, tags, target);

        if self.settings.dry_run {
            println!(
                "  {} -> {}",
                job.source.path().display(),
                job.target.display()
            );
            return job;
        }

        match move_file(job.source.path(), &job.target) {
            Ok(Relocation::Moved) => {
                info!("Moved {} -> {}", job.source.display_name(), job.target.display());
                job.outcome = OrganizeOutcome::Moved;
            }
            Ok(Relocation::Copied { warning }) => {
                info!("Copied {} -> {}", job.source.display_name(), job.target.display());
                job.outcome = OrganizeOutcome::Copied;
                job.warning = warning;
            }
            Err(e) => {
                warn!("{}", e);
                job.outcome = OrganizeOutcome::Failed;
                job.diagnostic = Some(e.to_string());
            }
        }
        job
    }

    fn progress_bar(&self, len: usize) -> Option<ProgressBar> {
        if !self.settings.show_progress || self.settings.dry_run {
            return None;
        }
        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Some(pb)
    }
}

/// Organize with the system's ffprobe
pub fn run(settings: &OrganizeSettings, cancel: CancelFlag) -> Result<OrganizeReport> {
    Organizer::with_system_tools(settings.clone())?
        .with_cancel_flag(cancel)
        .run()
}

/// Extensions present in `files` with their counts, sorted by extension
pub fn extension_counts(files: &[SourceFile]) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for file in files {
        *counts.entry(file.extension().to_string()).or_default() += 1;
    }
    counts.into_iter().collect()
}

/// Ask which of the present extensions to organize
///
/// Answers are numbers from the list or extension names, separated by commas
/// or spaces. An empty answer (or end of input) selects everything listed.
/// Tokens that match nothing are reported and ignored.
pub fn resolve_selection<R: BufRead, W: Write>(
    counts: &[(String, usize)],
    mut input: R,
    mut output: W,
) -> Result<ExtensionSelection> {
    writeln!(output, "Formats found:")?;
    for (i, (ext, count)) in counts.iter().enumerate() {
        let noun = if *count == 1 { "file" } else { "files" };
        writeln!(output, "  {}) {} ({} {})", i + 1, ext, count, noun)?;
    }
    write!(
        output,
        "Select formats by number or name (comma or space separated, empty for all): "
    )?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    let answer = answer.trim();

    let all = || counts.iter().map(|(ext, _)| ext.clone()).collect::<Vec<_>>();
    if answer.is_empty() {
        return Ok(ExtensionSelection::Only(all()));
    }

    let mut chosen: Vec<String> = Vec::new();
    for token in answer
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        let picked = match token.parse::<usize>() {
            Ok(n) if (1..=counts.len()).contains(&n) => Some(counts[n - 1].0.clone()),
            Ok(_) => None,
            Err(_) => {
                let name = token.trim_start_matches('.').to_lowercase();
                counts
                    .iter()
                    .find(|(ext, _)| *ext == name)
                    .map(|(ext, _)| ext.clone())
            }
        };
        match picked {
            Some(ext) if !chosen.contains(&ext) => chosen.push(ext),
            Some(_) => {}
            None => warn!("Ignoring selection '{}'", token),
        }
    }

    Ok(ExtensionSelection::Only(chosen))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::TagMap;
    use std::fs;
    use std::io::Cursor;
    use std::path::Path;
    use tempfile::TempDir;

    /// Prober that tags every file with the artist/album encoded in its name
    /// as `artist - album - title.ext`
    struct NameProber;

    impl Prober for NameProber {
        fn bitrate(&self, _path: &Path) -> Result<u64> {
            Ok(0)
        }

        fn format_tags(&self, path: &Path) -> Result<TagMap> {
            let stem = crate::naming::stem_of(path);
            let parts: Vec<&str> = stem.split(" - ").collect();
            let mut tags = TagMap::new();
            if parts.len() == 3 {
                tags.insert("artist", parts[0]);
                tags.insert("album", parts[1]);
            }
            Ok(tags)
        }

        fn stream_tags(&self, _path: &Path) -> Result<Vec<TagMap>> {
            Ok(Vec::new())
        }

        fn name(&self) -> &'static str {
            "names"
        }
    }

    fn organizer(root: &Path) -> Organizer {
        let settings = OrganizeSettings {
            root: root.to_path_buf(),
            show_progress: false,
            ..Default::default()
        };
        Organizer::new(settings, Arc::new(NameProber))
    }

    #[test]
    fn test_extension_counts_sorted() {
        let files = vec![
            SourceFile::new("/m/a.mp3"),
            SourceFile::new("/m/b.FLAC"),
            SourceFile::new("/m/c.mp3"),
        ];
        assert_eq!(
            extension_counts(&files),
            vec![("flac".to_string(), 1), ("mp3".to_string(), 2)]
        );
    }

    #[test]
    fn test_resolve_selection_numbers_and_names() {
        let counts = vec![
            ("flac".to_string(), 2),
            ("m4a".to_string(), 1),
            ("mp3".to_string(), 5),
        ];
        let mut out = Vec::new();
        let selection =
            resolve_selection(&counts, Cursor::new("1, .MP3 9 ogg\n"), &mut out).unwrap();
        assert_eq!(
            selection,
            ExtensionSelection::Only(vec!["flac".into(), "mp3".into()])
        );

        let listing = String::from_utf8(out).unwrap();
        assert!(listing.contains("1) flac (2 files)"));
        assert!(listing.contains("2) m4a (1 file)"));
    }

    #[test]
    fn test_resolve_selection_empty_means_all() {
        let counts = vec![("flac".to_string(), 2), ("mp3".to_string(), 1)];
        let selection = resolve_selection(&counts, Cursor::new(""), Vec::new()).unwrap();
        assert_eq!(
            selection,
            ExtensionSelection::Only(vec!["flac".into(), "mp3".into()])
        );
    }

    #[test]
    fn test_files_moved_into_artist_album() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Band - Record - one.mp3"), b"1").unwrap();
        fs::write(dir.path().join("loose.flac"), b"2").unwrap();

        let report = organizer(dir.path()).run_with_prompt(Cursor::new(""), Vec::new()).unwrap();

        assert_eq!(report.summary.moved, 2);
        assert!(dir.path().join("Band/Record/Band - Record - one.mp3").exists());
        assert!(dir
            .path()
            .join("Unknown Artist/Unknown Album/loose.flac")
            .exists());
    }

    #[test]
    fn test_collision_gets_numbered_name() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("Unknown Artist/Unknown Album")).unwrap();
        fs::write(dir.path().join("Unknown Artist/Unknown Album/song.mp3"), b"old").unwrap();
        fs::write(dir.path().join("song.mp3"), b"new").unwrap();

        let report = organizer(dir.path()).run_with_prompt(Cursor::new(""), Vec::new()).unwrap();

        assert_eq!(report.jobs[0].outcome, OrganizeOutcome::Moved);
        let moved = dir.path().join("Unknown Artist/Unknown Album/song (1).mp3");
        assert_eq!(report.jobs[0].target, moved);
        assert_eq!(fs::read(moved).unwrap(), b"new");
        assert_eq!(
            fs::read(dir.path().join("Unknown Artist/Unknown Album/song.mp3")).unwrap(),
            b"old"
        );
    }

    #[test]
    fn test_format_filter() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.mp3"), b"1").unwrap();
        fs::write(dir.path().join("b.flac"), b"2").unwrap();

        let settings = OrganizeSettings {
            root: dir.path().to_path_buf(),
            selection: ExtensionSelection::Only(vec!["flac".into()]),
            show_progress: false,
            ..Default::default()
        };
        let report = Organizer::new(settings, Arc::new(NameProber))
            .run_with_prompt(Cursor::new(""), Vec::new())
            .unwrap();

        assert_eq!(report.summary.found, 1);
        assert!(dir.path().join("a.mp3").exists());
        assert!(!dir.path().join("b.flac").exists());
    }

    #[test]
    fn test_dry_run_moves_nothing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.mp3"), b"1").unwrap();

        let settings = OrganizeSettings {
            root: dir.path().to_path_buf(),
            dry_run: true,
            show_progress: false,
            ..Default::default()
        };
        let report = Organizer::new(settings, Arc::new(NameProber))
            .run_with_prompt(Cursor::new(""), Vec::new())
            .unwrap();

        assert_eq!(report.summary.planned, 1);
        assert!(dir.path().join("a.mp3").exists());
        assert!(!dir.path().join("Unknown Artist").exists());
    }

    #[test]
    fn test_cancelled_run_stops() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.mp3"), b"1").unwrap();

        let cancel = CancelFlag::new();
        cancel.cancel();
        let result = organizer(dir.path())
            .with_cancel_flag(cancel)
            .run_with_prompt(Cursor::new(""), Vec::new());

        assert!(matches!(result, Err(ShelfError::Interrupted)));
        assert!(dir.path().join("a.mp3").exists());
    }
}
