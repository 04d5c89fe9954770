//! External tool detection
//!
//! Each tool is looked up through an environment override first, then on
//! `PATH`. Required tools are checked together so a user sees every missing
//! tool in one message.

use crate::error::{Result, ShelfError};
use std::path::PathBuf;
use tracing::{debug, warn};

/// An external tool and the environment variable that can point at it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tool {
    pub name: &'static str,
    pub env_var: &'static str,
}

pub const FFPROBE: Tool = Tool {
    name: "ffprobe",
    env_var: "SHELFSORT_FFPROBE",
};

pub const FFMPEG: Tool = Tool {
    name: "ffmpeg",
    env_var: "SHELFSORT_FFMPEG",
};

pub const AFCONVERT: Tool = Tool {
    name: "afconvert",
    env_var: "SHELFSORT_AFCONVERT",
};

impl Tool {
    /// Resolve the tool's executable
    ///
    /// An override that does not exist is reported and the `PATH` lookup is
    /// used instead.
    pub fn locate(&self) -> Option<PathBuf> {
        if let Some(custom) = std::env::var_os(self.env_var) {
            let custom = PathBuf::from(custom);
            if custom.exists() {
                debug!("{}: using {} from {}", self.name, custom.display(), self.env_var);
                return Some(custom);
            }
            warn!(
                "{} points at {}, which does not exist; searching PATH",
                self.env_var,
                custom.display()
            );
        }
        which::which(self.name).ok()
    }
}

/// Resolve every tool in `tools`, failing with all missing names at once
pub fn require(tools: &[Tool]) -> Result<Vec<PathBuf>> {
    let mut found = Vec::with_capacity(tools.len());
    let mut missing = Vec::new();

    for tool in tools {
        match tool.locate() {
            Some(path) => found.push(path),
            None => missing.push(tool.name.to_string()),
        }
    }

    if missing.is_empty() {
        Ok(found)
    } else {
        Err(ShelfError::MissingTools { tools: missing })
    }
}

/// Tools used by the conversion pipeline
#[derive(Debug, Clone)]
pub struct ConvertTools {
    pub ffprobe: PathBuf,
    pub ffmpeg: PathBuf,
    /// Primary encoder; without it every job goes to ffmpeg
    pub afconvert: Option<PathBuf>,
}

impl ConvertTools {
    pub fn discover() -> Result<Self> {
        let mut found = require(&[FFPROBE, FFMPEG])?.into_iter();
        let (Some(ffprobe), Some(ffmpeg)) = (found.next(), found.next()) else {
            return Err(ShelfError::MissingTools {
                tools: vec![FFPROBE.name.to_string(), FFMPEG.name.to_string()],
            });
        };

        let afconvert = AFCONVERT.locate();
        if afconvert.is_none() {
            warn!("afconvert not found; all files will be encoded with ffmpeg");
        }

        Ok(Self {
            ffprobe,
            ffmpeg,
            afconvert,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MISSING_A: Tool = Tool {
        name: "shelfsort_missing_tool_a",
        env_var: "SHELFSORT_TEST_UNSET_A",
    };
    const MISSING_B: Tool = Tool {
        name: "shelfsort_missing_tool_b",
        env_var: "SHELFSORT_TEST_UNSET_B",
    };

    #[test]
    fn test_all_missing_tools_reported_together() {
        let err = require(&[MISSING_A, MISSING_B]).unwrap_err();
        match err {
            ShelfError::MissingTools { tools } => {
                assert_eq!(tools, vec!["shelfsort_missing_tool_a", "shelfsort_missing_tool_b"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_present_tool_found_on_path() {
        let sh = Tool {
            name: "sh",
            env_var: "SHELFSORT_TEST_UNSET_SH",
        };
        let found = require(&[sh]).unwrap();
        assert_eq!(found.len(), 1);
    }
}
