//! CLI argument parsing for both tools

use clap::{ArgGroup, Parser};
use std::path::PathBuf;

/// shelfsort-convert - batch-convert audio files to AAC (.m4a)
///
/// Files whose bitrate is already close to the target are skipped, existing
/// conversions are backed up before being replaced, and every file gets a
/// second attempt with ffmpeg if the primary encoder fails.
#[derive(Parser, Debug)]
#[command(name = "shelfsort-convert")]
#[command(author, version, about, long_about = None)]
pub struct ConvertCli {
    /// Directory to scan
    #[arg(value_name = "DIR", default_value = ".")]
    pub directory: PathBuf,

    /// Target bitrate in kbps
    #[arg(short = 'b', long, value_name = "KBPS", default_value_t = 256)]
    #[arg(value_parser = clap::value_parser!(u32).range(32..=512))]
    pub bitrate: u32,

    /// Maximum directory depth to scan (1 = only the given directory)
    #[arg(short = 'd', long, value_name = "N", default_value_t = 1)]
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    pub depth: u32,

    /// Number of parallel encodes (defaults to CPU count)
    #[arg(short = 'j', long, value_name = "N")]
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    pub jobs: Option<u32>,

    /// Also skip near-target FLAC, WAV and ALAC files, not just M4A
    #[arg(long, default_value = "false")]
    pub extended_skip: bool,

    /// Follow symbolic links while scanning
    #[arg(long, default_value = "false")]
    pub follow_links: bool,

    /// Show what would be converted without touching any file
    #[arg(long, default_value = "false")]
    pub dry_run: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only, no progress bars)
    #[arg(short, long, default_value = "false")]
    pub quiet: bool,
}

/// shelfsort-organize - sort audio files into Artist/Album folders
///
/// Artist and album come from the files' tags; files without tags land in
/// "Unknown Artist/Unknown Album".
#[derive(Parser, Debug)]
#[command(name = "shelfsort-organize")]
#[command(author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("selection")
        .args(["all", "interactive", "formats"])
        .multiple(false)
))]
pub struct OrganizeCli {
    /// Directory containing the files to organize
    #[arg(value_name = "DIRECTORY_PATH")]
    pub directory: PathBuf,

    /// Process every supported extension (default)
    #[arg(short, long)]
    pub all: bool,

    /// Choose which of the extensions present to process
    #[arg(short, long)]
    pub interactive: bool,

    /// Only process this extension (repeatable, or comma separated)
    #[arg(short = 'f', long = "format", value_name = "EXT", value_delimiter = ',')]
    #[arg(action = clap::ArgAction::Append)]
    pub formats: Vec<String>,

    /// Also organize files found in subdirectories
    #[arg(short, long, default_value = "false")]
    pub recursive: bool,

    /// Show planned moves without touching any file
    #[arg(long, default_value = "false")]
    pub dry_run: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only, no progress bars)
    #[arg(short, long, default_value = "false")]
    pub quiet: bool,
}

/// Log filter directive for a verbosity count
pub fn log_filter(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
