//! Path and name utilities shared by both pipelines
//!
//! All functions work on owned `String`s and treat names as opaque Unicode.
//! Non-UTF-8 bytes in file names are replaced with U+FFFD only where a name is
//! turned into a new directory or file name; discovered paths themselves are
//! never rewritten.

use std::path::{Path, PathBuf};

/// Placeholder for a name that sanitizes to nothing
pub const UNKNOWN: &str = "Unknown";

/// Characters stripped outright (filesystem-reserved on at least one platform)
const RESERVED: &[char] = &['<', '>', ':', '"', '|', '?', '*', '\\'];

/// Make a tag value safe to use as a single path component
///
/// Control whitespace is dropped, `/` becomes `-` so distinct names never
/// merge into one folder, reserved characters are removed, inner whitespace
/// is collapsed and the ends trimmed. Anything left empty (or made only of
/// dots) becomes [`UNKNOWN`].
pub fn sanitize(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '\r' | '\n' | '\t'))
        .map(|c| if c == '/' { '-' } else { c })
        .filter(|c| !RESERVED.contains(c))
        .collect();

    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.is_empty() || collapsed.chars().all(|c| c == '.') {
        UNKNOWN.to_string()
    } else {
        collapsed
    }
}

/// Extension of a path exactly as found on disk, without the dot
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// File name without its final extension
pub fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Replace the final extension of a path
pub fn with_extension(path: &Path, extension: &str) -> PathBuf {
    path.with_extension(extension)
}

/// Organizer target: `root/artist/album/stem.ext`
///
/// Artist, album and stem are sanitized; the extension is kept verbatim.
pub fn organized_path(root: &Path, artist: &str, album: &str, source: &Path) -> PathBuf {
    let mut file_name = sanitize(&stem_of(source));
    let extension = extension_of(source);
    if !extension.is_empty() {
        file_name.push('.');
        file_name.push_str(&extension);
    }

    root.join(sanitize(artist))
        .join(sanitize(album))
        .join(file_name)
}
