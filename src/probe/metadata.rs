//! Artist/album extraction from container and stream tags
//!
//! Tag placement differs between encoders and containers, so both levels are
//! consulted: a non-empty container tag wins, then the first non-empty stream
//! tag, then the "Unknown ..." placeholders.

use super::{Prober, TagMap};
use crate::types::{TrackTags, UNKNOWN_ALBUM, UNKNOWN_ARTIST};
use std::path::Path;
use tracing::{debug, warn};

/// Resolve artist and album for a file
///
/// Probe failures (including timeouts) are logged and treated as "no tags",
/// so the file still gets a placeholder location.
pub fn extract(prober: &dyn Prober, path: &Path) -> TrackTags {
    let format = prober.format_tags(path).unwrap_or_else(|e| {
        warn!("Failed to read container tags from {}: {}", path.display(), e);
        TagMap::new()
    });

    // Stream tags are only needed when the container is missing something
    let complete = format.non_empty("artist").is_some() && format.non_empty("album").is_some();
    let streams = if complete {
        Vec::new()
    } else {
        prober.stream_tags(path).unwrap_or_else(|e| {
            warn!("Failed to read stream tags from {}: {}", path.display(), e);
            Vec::new()
        })
    };

    let tags = TrackTags {
        artist: resolve_tag(&format, &streams, "artist")
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
        album: resolve_tag(&format, &streams, "album")
            .unwrap_or_else(|| UNKNOWN_ALBUM.to_string()),
    };

    debug!(
        "{}: artist='{}' album='{}'",
        path.display(),
        tags.artist,
        tags.album
    );
    tags
}

/// Container value if non-empty, otherwise the first non-empty stream value
pub fn resolve_tag(format: &TagMap, streams: &[TagMap], key: &str) -> Option<String> {
    format
        .non_empty(key)
        .or_else(|| streams.iter().find_map(|s| s.non_empty(key)))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, ShelfError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TagProber {
        format: Option<TagMap>,
        streams: Vec<TagMap>,
        stream_calls: AtomicUsize,
    }

    impl TagProber {
        fn new(format: Option<TagMap>, streams: Vec<TagMap>) -> Self {
            Self {
                format,
                streams,
                stream_calls: AtomicUsize::new(0),
            }
        }
    }

    impl Prober for TagProber {
        fn bitrate(&self, _path: &Path) -> Result<u64> {
            Ok(0)
        }
        fn format_tags(&self, path: &Path) -> Result<TagMap> {
            self.format
                .clone()
                .ok_or_else(|| ShelfError::ProbeTimeout {
                    path: path.to_path_buf(),
                    timeout: std::time::Duration::from_secs(10),
                })
        }
        fn stream_tags(&self, _path: &Path) -> Result<Vec<TagMap>> {
            self.stream_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.streams.clone())
        }
        fn name(&self) -> &'static str {
            "tags"
        }
    }

    fn tags(pairs: &[(&str, &str)]) -> TagMap {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_container_tags_win() {
        let prober = TagProber::new(
            Some(tags(&[("Artist", "Portishead"), ("ALBUM", "Dummy")])),
            vec![tags(&[("artist", "Wrong")])],
        );
        let result = extract(&prober, Path::new("/m/a.flac"));
        assert_eq!(result.artist, "Portishead");
        assert_eq!(result.album, "Dummy");
        assert_eq!(prober.stream_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stream_tags_fill_gaps() {
        let prober = TagProber::new(
            Some(tags(&[("artist", "Massive Attack"), ("album", "  ")])),
            vec![tags(&[]), tags(&[("album", "Mezzanine")]), tags(&[("album", "Later")])],
        );
        let result = extract(&prober, Path::new("/m/a.m4a"));
        assert_eq!(result.artist, "Massive Attack");
        assert_eq!(result.album, "Mezzanine");
    }

    #[test]
    fn test_no_tags_fall_back_to_unknown() {
        let prober = TagProber::new(Some(TagMap::new()), vec![]);
        let result = extract(&prober, Path::new("/m/a.mp3"));
        assert_eq!(result, TrackTags::default());
        assert_eq!(result.artist, "Unknown Artist");
        assert_eq!(result.album, "Unknown Album");
    }

    #[test]
    fn test_probe_timeout_is_not_fatal() {
        let prober = TagProber::new(None, vec![tags(&[("artist", "Tricky")])]);
        let result = extract(&prober, Path::new("/m/a.mp3"));
        assert_eq!(result.artist, "Tricky");
        assert_eq!(result.album, "Unknown Album");
    }
}
