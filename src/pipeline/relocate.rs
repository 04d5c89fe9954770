//! Moving files with a copy-then-delete fallback

use crate::error::{Result, ShelfError};
use crate::naming::{extension_of, stem_of};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// How a file reached its destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relocation {
    /// Atomic rename
    Moved,
    /// Copied then deleted; `warning` is set when the delete failed and the
    /// source is still there
    Copied { warning: Option<String> },
}

/// Whether two paths name the same file
pub fn same_location(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// First free variant of `target`: `name.ext`, `name (1).ext`, `name (2).ext`...
///
/// `source` itself never counts as a collision.
pub fn unique_target(target: &Path, source: &Path) -> PathBuf {
    if !target.exists() || same_location(target, source) {
        return target.to_path_buf();
    }

    let parent = target.parent().unwrap_or_else(|| Path::new(""));
    let stem = stem_of(target);
    let extension = extension_of(target);

    (1u32..)
        .map(|n| {
            let name = if extension.is_empty() {
                format!("{} ({})", stem, n)
            } else {
                format!("{} ({}).{}", stem, n, extension)
            };
            parent.join(name)
        })
        .find(|candidate| !candidate.exists() || same_location(candidate, source))
        .unwrap_or_else(|| target.to_path_buf())
}

/// Move `from` to `to`, creating parent directories as needed
///
/// Rename is tried first; if it fails (for example across filesystems) the
/// file is copied and the source removed. A failed copy leaves no partial
/// file behind.
pub fn move_file(from: &Path, to: &Path) -> Result<Relocation> {
    if let Some(parent) = to.parent() {
        // Succeeds when the tree already exists, so concurrent callers are fine
        fs::create_dir_all(parent).map_err(|e| ShelfError::relocate_error(from, to, &e))?;
    }

    let rename_err = match fs::rename(from, to) {
        Ok(()) => return Ok(Relocation::Moved),
        Err(e) => e,
    };
    debug!(
        "rename {} -> {} failed ({}), copying instead",
        from.display(),
        to.display(),
        rename_err
    );

    if let Err(copy_err) = fs::copy(from, to) {
        let _ = fs::remove_file(to);
        return Err(ShelfError::Relocate {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            reason: format!("rename failed ({}), copy failed ({})", rename_err, copy_err),
        });
    }

    match fs::remove_file(from) {
        Ok(()) => Ok(Relocation::Copied { warning: None }),
        Err(e) => {
            let warning = format!(
                "Copied to {} but could not remove {} ({}); a duplicate remains",
                to.display(),
                from.display(),
                e
            );
            warn!("{}", warning);
            Ok(Relocation::Copied {
                warning: Some(warning),
            })
        }
    }
}
