//! Probing collaborator: bitrate and tag inspection
//!
//! The [`Prober`] trait keeps the pipelines independent of the tool doing the
//! inspection. The shipped implementation shells out to ffprobe.

pub mod bitrate;
pub mod ffprobe;
pub mod metadata;

use crate::error::Result;
use std::collections::BTreeMap;
use std::path::Path;

pub use bitrate::{inspect, normalize_kbps, parse_bitrate, should_skip, SKIP_TOLERANCE_KBPS};
pub use ffprobe::FfprobeProber;
pub use metadata::extract;

/// Tag map with case-insensitive keys
///
/// Keys are stored lowercased; `Artist`, `ARTIST` and `artist` are the same key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagMap(BTreeMap<String, String>);

impl TagMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tag; on a case-insensitive key clash the first value is kept
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.0.entry(key.to_lowercase()).or_insert_with(|| value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(&key.to_lowercase()).map(String::as_str)
    }

    /// Value for `key` if present and not blank
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for TagMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = TagMap::new();
        for (k, v) in iter {
            map.insert(k.as_ref(), v);
        }
        map
    }
}

/// Bitrate and tag inspection backend
pub trait Prober: Send + Sync {
    /// Encoded bitrate of the first audio stream as the tool reports it
    ///
    /// The unit is ambiguous (bits/s or kbps); see [`normalize_kbps`].
    /// Returns 0 when the value is absent.
    fn bitrate(&self, path: &Path) -> Result<u64>;

    /// Container-level tags
    fn format_tags(&self, path: &Path) -> Result<TagMap>;

    /// Stream-level tags, one map per stream in stream order
    fn stream_tags(&self, path: &Path) -> Result<Vec<TagMap>>;

    /// Get the name of this prober (for logging)
    fn name(&self) -> &'static str;
}
