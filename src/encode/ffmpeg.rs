//! Fallback encoder: ffmpeg's AAC encoder in constant-quality VBR mode
//!
//! Accepts anything ffmpeg can decode, so it handles every job the primary
//! encoder refused or failed.

use super::{run_encoder, EncodeRequest, Encoder};
use crate::command::ToolCommand;
use crate::error::Result;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg_path: PathBuf,
}

/// VBR quality for the native AAC encoder that lands near a target bitrate
///
/// Approximate stereo figures; ffmpeg accepts 0.1 to 2.0.
pub fn vbr_quality(bitrate_kbps: u32) -> &'static str {
    match bitrate_kbps {
        0..=64 => "0.4",
        65..=96 => "0.6",
        97..=128 => "0.9",
        129..=160 => "1.1",
        161..=192 => "1.3",
        193..=256 => "1.7",
        _ => "2.0",
    }
}

impl FfmpegEncoder {
    pub fn new(ffmpeg_path: PathBuf) -> Self {
        Self { ffmpeg_path }
    }

    fn build_command(&self, request: &EncodeRequest<'_>) -> ToolCommand {
        let mut cmd = ToolCommand::new(&self.ffmpeg_path);
        cmd.args(["-nostdin", "-hide_banner", "-loglevel", "error", "-y"]);
        cmd.arg("-i").arg(request.input);
        cmd.args(["-map", "0:a:0", "-map_metadata", "0", "-vn"]);
        cmd.args(["-c:a", "aac", "-q:a", vbr_quality(request.bitrate_kbps)]);
        cmd.arg("-b:a").arg(format!("{}k", request.bitrate_kbps));
        cmd.arg(request.output);
        cmd
    }
}

impl Encoder for FfmpegEncoder {
    fn encode(&self, request: &EncodeRequest<'_>) -> Result<String> {
        run_encoder(self.name(), &self.build_command(request), request.input)
    }

    fn supports(&self, _extension: &str) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShelfError;
    use std::path::Path;

    #[test]
    fn test_arguments_carry_quality_and_bitrate() {
        let encoder = FfmpegEncoder::new(PathBuf::from("ffmpeg"));
        let request = EncodeRequest {
            input: Path::new("/m/a.wma"),
            output: Path::new("/m/a.m4a"),
            bitrate_kbps: 192,
        };
        let args: Vec<String> = encoder
            .build_command(&request)
            .get_args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert_eq!(args[pos("-i") + 1], "/m/a.wma");
        assert_eq!(args[pos("-q:a") + 1], "1.3");
        assert_eq!(args[pos("-b:a") + 1], "192k");
        assert_eq!(args.last().map(String::as_str), Some("/m/a.m4a"));
    }

    #[test]
    fn test_vbr_quality_monotonic() {
        let rates = [32, 64, 96, 128, 160, 192, 256, 320, 512];
        let qualities: Vec<f64> = rates
            .iter()
            .map(|r| vbr_quality(*r).parse().unwrap())
            .collect();
        assert!(qualities.windows(2).all(|w| w[0] <= w[1]));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_tool_yields_encode_error() {
        let encoder = FfmpegEncoder::new(PathBuf::from("false"));
        let request = EncodeRequest {
            input: Path::new("/m/a.wav"),
            output: Path::new("/m/a.m4a"),
            bitrate_kbps: 256,
        };
        let err = encoder.encode(&request).unwrap_err();
        assert!(matches!(err, ShelfError::Encode { encoder: "ffmpeg", .. }));
    }
}
