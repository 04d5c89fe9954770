//! Encoding collaborators
//!
//! An [`Encoder`] turns one source file into one `.m4a` output. It reports only
//! whether the tool exited cleanly plus what the tool printed; checking that a
//! usable output exists, and cleaning up when it does not, is the pipeline's
//! job so that every encoder gets the same treatment.

pub mod afconvert;
pub mod ffmpeg;

use crate::command::ToolCommand;
use crate::error::{Result, ShelfError};
use std::path::Path;

pub use afconvert::AfconvertEncoder;
pub use ffmpeg::FfmpegEncoder;

/// One encode invocation
#[derive(Debug, Clone, Copy)]
pub struct EncodeRequest<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub bitrate_kbps: u32,
}

/// Encoding backend
pub trait Encoder: Send + Sync {
    /// Encode `request.input` into `request.output`
    ///
    /// Returns the tool's transcript on a zero exit status, or
    /// [`ShelfError::Encode`] carrying the transcript otherwise.
    fn encode(&self, request: &EncodeRequest<'_>) -> Result<String>;

    /// Whether this encoder should be tried for a lowercase source extension
    fn supports(&self, extension: &str) -> bool;

    /// Get the name of this encoder (for logging)
    fn name(&self) -> &'static str;
}

/// Run an encoder command and translate its exit status
///
/// No timeout is applied: an encode runs as long as the tool needs.
pub(crate) fn run_encoder(name: &'static str, cmd: &ToolCommand, input: &Path) -> Result<String> {
    let output = cmd
        .execute()
        .map_err(|e| ShelfError::encode_error(name, input, format!("failed to start: {}", e)))?;

    let transcript = output.transcript();
    if output.status.success() {
        return Ok(transcript);
    }

    let reason = if transcript.is_empty() {
        format!("exited with {}", output.status)
    } else {
        transcript
    };
    Err(ShelfError::encode_error(name, input, reason))
}
