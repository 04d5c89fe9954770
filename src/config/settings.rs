//! Runtime configuration settings

use crate::types::{extension_in, ORGANIZE_EXTENSIONS, SKIP_EXTENDED, SKIP_STANDARD};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Upper bound on a single metadata/bitrate probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default target bitrate in kbps
pub const DEFAULT_BITRATE_KBPS: u32 = 256;

/// Which extensions the near-target skip heuristic applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkipPolicy {
    /// Only M4A
    #[default]
    Standard,
    /// M4A, FLAC, WAV and ALAC
    Extended,
}

impl SkipPolicy {
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            SkipPolicy::Standard => SKIP_STANDARD,
            SkipPolicy::Extended => SKIP_EXTENDED,
        }
    }
}

/// Runtime settings for the conversion pipeline
#[derive(Debug, Clone)]
pub struct ConvertSettings {
    /// Directory to scan
    pub root: PathBuf,
    /// Target bitrate in kbps
    pub bitrate_kbps: u32,
    /// Maximum scan depth (1 = root only)
    pub max_depth: usize,
    /// Number of parallel encodes
    pub workers: usize,
    /// Skip heuristic extension set
    pub skip_policy: SkipPolicy,
    /// Follow symlinks during discovery
    pub follow_links: bool,
    /// Plan only, touch nothing
    pub dry_run: bool,
    /// Show progress bars
    pub show_progress: bool,
    /// Bound on each bitrate probe
    pub probe_timeout: Duration,
}

impl ConvertSettings {
    /// Create settings from CLI arguments
    pub fn from_cli(cli: &super::cli::ConvertCli) -> Self {
        let workers = cli
            .jobs
            .map(|j| j as usize)
            .unwrap_or_else(default_workers);

        Self {
            root: cli.directory.clone(),
            bitrate_kbps: cli.bitrate,
            max_depth: cli.depth as usize,
            workers,
            skip_policy: if cli.extended_skip {
                SkipPolicy::Extended
            } else {
                SkipPolicy::Standard
            },
            follow_links: cli.follow_links,
            dry_run: cli.dry_run,
            show_progress: !cli.quiet,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

impl Default for ConvertSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            bitrate_kbps: DEFAULT_BITRATE_KBPS,
            max_depth: 1,
            workers: default_workers(),
            skip_policy: SkipPolicy::Standard,
            follow_links: false,
            dry_run: false,
            show_progress: true,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

/// Which extensions the organizer processes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExtensionSelection {
    /// Every supported extension
    #[default]
    All,
    /// Ask the user which of the extensions present to process
    Interactive,
    /// Only these (lowercase, known) extensions
    Only(Vec<String>),
}

impl ExtensionSelection {
    /// Whether a lowercase extension passes the selection
    ///
    /// `Interactive` behaves like `All` until it has been resolved.
    pub fn allows(&self, ext: &str) -> bool {
        match self {
            ExtensionSelection::All | ExtensionSelection::Interactive => {
                extension_in(ext, ORGANIZE_EXTENSIONS)
            }
            ExtensionSelection::Only(list) => list.iter().any(|e| e.eq_ignore_ascii_case(ext)),
        }
    }
}

/// Runtime settings for the organizer
#[derive(Debug, Clone)]
pub struct OrganizeSettings {
    /// Directory to organize; the artist/album tree is created inside it
    pub root: PathBuf,
    pub selection: ExtensionSelection,
    /// Descend into subdirectories
    pub recursive: bool,
    pub follow_links: bool,
    pub dry_run: bool,
    pub show_progress: bool,
    /// Bound on each metadata probe
    pub probe_timeout: Duration,
}

impl OrganizeSettings {
    /// Create settings from CLI arguments
    ///
    /// Unknown `--format` values are reported and dropped.
    pub fn from_cli(cli: &super::cli::OrganizeCli) -> Self {
        let selection = if cli.interactive {
            ExtensionSelection::Interactive
        } else if !cli.formats.is_empty() {
            let (known, unknown) = split_formats(&cli.formats);
            for ext in &unknown {
                warn!(
                    "Ignoring unsupported format '{}' (supported: {})",
                    ext,
                    ORGANIZE_EXTENSIONS.join(", ")
                );
            }
            ExtensionSelection::Only(known)
        } else {
            ExtensionSelection::All
        };

        Self {
            root: cli.directory.clone(),
            selection,
            recursive: cli.recursive,
            follow_links: false,
            dry_run: cli.dry_run,
            show_progress: !cli.quiet,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

impl Default for OrganizeSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            selection: ExtensionSelection::All,
            recursive: false,
            follow_links: false,
            dry_run: false,
            show_progress: true,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

/// Split requested formats into (known, unknown), lowercased and deduplicated
pub fn split_formats(requested: &[String]) -> (Vec<String>, Vec<String>) {
    let mut known: Vec<String> = Vec::new();
    let mut unknown: Vec<String> = Vec::new();

    for raw in requested {
        let ext = raw.trim().trim_start_matches('.').to_lowercase();
        if ext.is_empty() {
            continue;
        }
        let bucket = if extension_in(&ext, ORGANIZE_EXTENSIONS) {
            &mut known
        } else {
            &mut unknown
        };
        if !bucket.contains(&ext) {
            bucket.push(ext);
        }
    }

    (known, unknown)
}

fn default_workers() -> usize {
    num_cpus::get().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_formats() {
        let requested = vec![
            "FLAC".to_string(),
            ".mp3".to_string(),
            "xyz".to_string(),
            "flac".to_string(),
        ];
        let (known, unknown) = split_formats(&requested);
        assert_eq!(known, vec!["flac", "mp3"]);
        assert_eq!(unknown, vec!["xyz"]);
    }

    #[test]
    fn test_selection_allows() {
        assert!(ExtensionSelection::All.allows("mp3"));
        assert!(!ExtensionSelection::All.allows("txt"));
        let only = ExtensionSelection::Only(vec!["flac".into()]);
        assert!(only.allows("FLAC"));
        assert!(!only.allows("mp3"));
    }

    #[test]
    fn test_skip_policy_sets() {
        assert_eq!(SkipPolicy::Standard.extensions(), &["m4a"]);
        assert!(SkipPolicy::Extended.extensions().contains(&"alac"));
    }

    #[test]
    fn test_default_workers_positive() {
        assert!(ConvertSettings::default().workers >= 1);
    }
}
