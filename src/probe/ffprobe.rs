//! FFprobe-based [`Prober`] implementation
//!
//! Every query is a separate `ffprobe -of json` call bounded by a timeout, so
//! one corrupted file cannot stall a whole run.

use super::{parse_bitrate, Prober, TagMap};
use crate::command::{last_line, ToolCommand, ToolOutput};
use crate::error::{Result, ShelfError};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// A prober backed by the `ffprobe` CLI
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl FfprobeProber {
    pub fn new(ffprobe_path: PathBuf, timeout: Duration) -> Self {
        Self {
            ffprobe_path,
            timeout,
        }
    }

    fn query(&self, path: &Path, entries: &[&str]) -> Result<String> {
        let mut cmd = ToolCommand::new(&self.ffprobe_path);
        cmd.args(["-v", "error"]);
        cmd.args(entries);
        cmd.args(["-of", "json"]);
        cmd.arg(path);
        cmd.timeout(self.timeout);

        let output = cmd.execute().map_err(|e| match e.kind() {
            std::io::ErrorKind::TimedOut => ShelfError::ProbeTimeout {
                path: path.to_path_buf(),
                timeout: self.timeout,
            },
            _ => ShelfError::probe_error(path, format!("failed to run ffprobe: {}", e)),
        })?;

        check_status(path, &output)?;
        Ok(output.stdout)
    }
}

fn check_status(path: &Path, output: &ToolOutput) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let transcript = output.transcript();
    let reason = last_line(&transcript)
        .map(str::to_string)
        .unwrap_or_else(|| format!("ffprobe exited with {}", output.status));
    Err(ShelfError::probe_error(path, reason))
}

impl Prober for FfprobeProber {
    fn bitrate(&self, path: &Path) -> Result<u64> {
        let json = self.query(
            path,
            &[
                "-select_streams",
                "a:0",
                "-show_entries",
                "stream=bit_rate:format=bit_rate",
            ],
        )?;
        parse_bitrate_json(&json).map_err(|e| ShelfError::probe_error(path, e.to_string()))
    }

    fn format_tags(&self, path: &Path) -> Result<TagMap> {
        let json = self.query(path, &["-show_entries", "format_tags"])?;
        parse_format_tags(&json).map_err(|e| ShelfError::probe_error(path, e.to_string()))
    }

    fn stream_tags(&self, path: &Path) -> Result<Vec<TagMap>> {
        let json = self.query(path, &["-show_entries", "stream_tags"])?;
        parse_stream_tags(&json).map_err(|e| ShelfError::probe_error(path, e.to_string()))
    }

    fn name(&self) -> &'static str {
        "ffprobe"
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeSection>,
    #[serde(default)]
    format: Option<FfprobeSection>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeSection {
    bit_rate: Option<String>,
    #[serde(default)]
    tags: BTreeMap<String, Value>,
}

fn to_tag_map(tags: BTreeMap<String, Value>) -> TagMap {
    tags.into_iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (key, text)
        })
        .collect()
}

/// Raw bitrate: first audio stream's value, else the container's, else 0
fn parse_bitrate_json(json: &str) -> serde_json::Result<u64> {
    let out: FfprobeOutput = serde_json::from_str(json)?;

    let stream = out
        .streams
        .first()
        .and_then(|s| s.bit_rate.as_deref())
        .map(parse_bitrate)
        .unwrap_or(0);
    if stream > 0 {
        return Ok(stream);
    }

    let format = out
        .format
        .as_ref()
        .and_then(|f| f.bit_rate.as_deref())
        .map(parse_bitrate)
        .unwrap_or(0);
    if format > 0 {
        debug!("No stream bitrate, using container bitrate {}", format);
    }
    Ok(format)
}

fn parse_format_tags(json: &str) -> serde_json::Result<TagMap> {
    let out: FfprobeOutput = serde_json::from_str(json)?;
    Ok(out.format.map(|f| to_tag_map(f.tags)).unwrap_or_default())
}

fn parse_stream_tags(json: &str) -> serde_json::Result<Vec<TagMap>> {
    let out: FfprobeOutput = serde_json::from_str(json)?;
    Ok(out.streams.into_iter().map(|s| to_tag_map(s.tags)).collect())
}
