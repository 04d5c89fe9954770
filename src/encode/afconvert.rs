//! Primary encoder: Apple's `afconvert`
//!
//! Produces the best AAC for lossless sources, so it is only offered those.

use super::{run_encoder, EncodeRequest, Encoder};
use crate::command::ToolCommand;
use crate::error::Result;
use crate::types::{extension_in, PRIMARY_EXTENSIONS};
use std::path::PathBuf;

/// afconvert bitrate allocation strategy: constrained VBR
const STRATEGY_CONSTRAINED_VBR: &str = "2";

/// afconvert codec quality, 0-127
const MAX_QUALITY: &str = "127";

#[derive(Debug, Clone)]
pub struct AfconvertEncoder {
    afconvert_path: PathBuf,
}

impl AfconvertEncoder {
    pub fn new(afconvert_path: PathBuf) -> Self {
        Self { afconvert_path }
    }

    fn build_command(&self, request: &EncodeRequest<'_>) -> ToolCommand {
        let bits_per_second = u64::from(request.bitrate_kbps) * 1000;

        let mut cmd = ToolCommand::new(&self.afconvert_path);
        cmd.arg(request.input);
        cmd.arg("-o").arg(request.output);
        cmd.args(["-f", "m4af", "-d", "aac"]);
        cmd.arg("-b").arg(bits_per_second.to_string());
        cmd.args(["-s", STRATEGY_CONSTRAINED_VBR, "-q", MAX_QUALITY]);
        cmd
    }
}

impl Encoder for AfconvertEncoder {
    fn encode(&self, request: &EncodeRequest<'_>) -> Result<String> {
        run_encoder(self.name(), &self.build_command(request), request.input)
    }

    fn supports(&self, extension: &str) -> bool {
        extension_in(extension, PRIMARY_EXTENSIONS)
    }

    fn name(&self) -> &'static str {
        "afconvert"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::path::Path;

    #[test]
    fn test_arguments() {
        let encoder = AfconvertEncoder::new(PathBuf::from("afconvert"));
        let request = EncodeRequest {
            input: Path::new("/m/in put.flac"),
            output: Path::new("/m/in put.m4a"),
            bitrate_kbps: 256,
        };
        let cmd = encoder.build_command(&request);
        let args: Vec<OsString> = [
            "/m/in put.flac", "-o", "/m/in put.m4a", "-f", "m4af", "-d", "aac", "-b", "256000",
            "-s", "2", "-q", "127",
        ]
        .iter()
        .map(OsString::from)
        .collect();
        assert_eq!(cmd.get_args(), args.as_slice());
    }

    #[test]
    fn test_supports_lossless_only() {
        let encoder = AfconvertEncoder::new(PathBuf::from("afconvert"));
        assert!(encoder.supports("flac"));
        assert!(encoder.supports("wav"));
        assert!(encoder.supports("aiff"));
        assert!(!encoder.supports("mp3"));
        assert!(!encoder.supports("m4a"));
    }
}
