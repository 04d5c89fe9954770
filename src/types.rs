//! Core data types for shelfsort
//!
//! These types represent the domain model and flow through both pipelines.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// =============================================================================
// Extension tables
// =============================================================================

/// Extension of the converted output (AAC in an MPEG-4 container)
pub const TARGET_EXTENSION: &str = "m4a";

/// Extensions picked up by the conversion pipeline
pub const CONVERT_EXTENSIONS: &[&str] = &[
    "flac", "wav", "aiff", "aif", "alac", "ape", "wv", "mp3", "ogg", "opus", "wma", "m4a", "aac",
];

/// Lossless sources the primary encoder handles well
pub const PRIMARY_EXTENSIONS: &[&str] = &["flac", "wav", "aiff", "aif", "alac", "caf"];

/// Extensions picked up by the organizer
pub const ORGANIZE_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "m4a", "aac", "ogg", "opus", "wav", "aiff", "aif", "wma", "alac", "ape", "wv",
];

/// Skip-eligible extensions under the standard policy
pub const SKIP_STANDARD: &[&str] = &["m4a"];

/// Skip-eligible extensions under the extended policy
pub const SKIP_EXTENDED: &[&str] = &["m4a", "flac", "wav", "alac"];

/// Fallback names used when tags are missing
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Check a lowercase extension against a table
pub fn extension_in(ext: &str, table: &[&str]) -> bool {
    table.iter().any(|candidate| candidate.eq_ignore_ascii_case(ext))
}

// =============================================================================
// Source files
// =============================================================================

/// A discovered audio file
///
/// Identity is the path at discovery time. The extension is resolved on first
/// use and cached.
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: PathBuf,
    extension: OnceLock<String>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            extension: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lowercased extension, empty if the file has none
    pub fn extension(&self) -> &str {
        self.extension
            .get_or_init(|| crate::naming::extension_of(&self.path).to_lowercase())
    }

    /// File name for display
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

impl PartialEq for SourceFile {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for SourceFile {}

// =============================================================================
// Conversion jobs
// =============================================================================

/// Encoding tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Primary,
    Fallback,
}

impl Tier {
    pub fn label(self) -> &'static str {
        match self {
            Tier::Primary => "primary",
            Tier::Fallback => "fallback",
        }
    }
}

/// Where a conversion job stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionOutcome {
    Pending,
    /// Bitrate already near target; file left untouched
    SkippedOptimal,
    /// Prior output moved to the backup set; job still to be encoded
    AlreadyBackedUp,
    SucceededPrimary,
    SucceededFallback,
    Failed,
}

impl ConversionOutcome {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConversionOutcome::SkippedOptimal
                | ConversionOutcome::SucceededPrimary
                | ConversionOutcome::SucceededFallback
                | ConversionOutcome::Failed
        )
    }
}

/// One source file through the conversion pipeline
#[derive(Debug, Clone)]
pub struct ConversionJob {
    /// Position in discovery order
    pub id: usize,
    pub source: SourceFile,
    pub target: PathBuf,
    /// Inspected bitrate in kbps, 0 when unknown
    pub bitrate_kbps: u32,
    /// Where a prior output was moved, if one existed
    pub backed_up: Option<PathBuf>,
    pub outcome: ConversionOutcome,
    /// Last diagnostic from an encoder, if any
    pub diagnostic: Option<String>,
}

impl ConversionJob {
    pub fn new(id: usize, source: SourceFile) -> Self {
        // An `.m4a` source of any case is its own target
        let target = if source.extension() == TARGET_EXTENSION {
            source.path().to_path_buf()
        } else {
            crate::naming::with_extension(source.path(), TARGET_EXTENSION)
        };
        Self {
            id,
            source,
            target,
            bitrate_kbps: 0,
            backed_up: None,
            outcome: ConversionOutcome::Pending,
            diagnostic: None,
        }
    }

    /// True when the source already carries the target extension
    pub fn converts_in_place(&self) -> bool {
        self.source.path() == self.target
    }

    /// Path the encoders read from
    ///
    /// An in-place job reads from its backed-up copy so the original is never
    /// overwritten while it is being read.
    pub fn encode_input(&self) -> &Path {
        match &self.backed_up {
            Some(backup) if self.converts_in_place() => backup,
            _ => self.source.path(),
        }
    }
}

// =============================================================================
// Organize jobs
// =============================================================================

/// Artist and album resolved for a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackTags {
    pub artist: String,
    pub album: String,
}

impl Default for TrackTags {
    fn default() -> Self {
        Self {
            artist: UNKNOWN_ARTIST.to_string(),
            album: UNKNOWN_ALBUM.to_string(),
        }
    }
}

/// Where an organize job stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganizeOutcome {
    Pending,
    Moved,
    /// Moved by copy-then-delete
    Copied,
    SkippedSameLocation,
    Failed,
}

/// One source file through the organizer
#[derive(Debug, Clone)]
pub struct OrganizeJob {
    pub id: usize,
    pub source: SourceFile,
    pub artist: String,
    pub album: String,
    pub target: PathBuf,
    pub outcome: OrganizeOutcome,
    pub diagnostic: Option<String>,
    /// Set when the file was copied but the source could not be removed
    pub warning: Option<String>,
}

impl OrganizeJob {
    pub fn new(id: usize, source: SourceFile, tags: TrackTags, target: PathBuf) -> Self {
        Self {
            id,
            source,
            artist: tags.artist,
            album: tags.album,
            target,
            outcome: OrganizeOutcome::Pending,
            diagnostic: None,
            warning: None,
        }
    }
}
