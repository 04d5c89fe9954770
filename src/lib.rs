//! shelfsort - Batch audio conversion and Artist/Album library organization
//!
//! Two command-line tools share this library:
//!
//! - `shelfsort-convert` converts a directory of audio files to AAC (`.m4a`),
//!   skipping files already near the target bitrate, backing up existing
//!   conversions, and retrying every primary-encoder failure with ffmpeg.
//! - `shelfsort-organize` moves audio files into `Artist/Album/` folders based
//!   on their tags, with collision-safe renaming.
//!
//! # Architecture
//!
//! - `config`: CLI argument parsing and runtime settings
//! - `discovery`: File scanning
//! - `probe`: Bitrate and tag inspection behind the [`probe::Prober`] trait
//! - `encode`: Primary and fallback encoders behind the [`encode::Encoder`] trait
//! - `command` / `tools`: External tool execution and lookup
//! - `pipeline`: Conversion and organizer orchestration, backups, reports
//!
//! # Example
//!
//! ```no_run
//! use shelfsort::config::ConvertSettings;
//! use shelfsort::pipeline::{convert, CancelFlag};
//!
//! let settings = ConvertSettings::default();
//! let report = convert::run(&settings, CancelFlag::new()).expect("Conversion failed");
//! println!("Converted {} files", report.summary.succeeded());
//! ```

pub mod command;
pub mod config;
pub mod discovery;
pub mod encode;
pub mod error;
pub mod naming;
pub mod pipeline;
pub mod probe;
pub mod tools;
pub mod types;

// Re-export key types at crate root
pub use error::{Result, ShelfError};
pub use types::{ConversionJob, ConversionOutcome, OrganizeJob, OrganizeOutcome, SourceFile};
