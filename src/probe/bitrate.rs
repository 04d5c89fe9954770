//! Bitrate normalization and the near-target skip decision

use super::Prober;
use crate::config::SkipPolicy;
use crate::types::{extension_in, SourceFile};
use tracing::{debug, warn};

/// A file within this many kbps of the target is not worth re-encoding
pub const SKIP_TOLERANCE_KBPS: u32 = 20;

/// Largest raw value still taken to be kbps rather than bits/s
const KBPS_CEILING: u64 = 1000;

/// Parse a bitrate as printed by a prober
///
/// "N/A", blanks and garbage all mean unknown (0). Fractional values are
/// truncated.
pub fn parse_bitrate(text: &str) -> u64 {
    let text = text.trim();
    if let Ok(value) = text.parse::<u64>() {
        return value;
    }
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => value as u64,
        _ => 0,
    }
}

/// Convert a raw bitrate of ambiguous unit to kbps
///
/// Values up to 1000 are already kbps; anything larger is bits/s.
pub fn normalize_kbps(raw: u64) -> u32 {
    let kbps = if raw <= KBPS_CEILING { raw } else { raw / 1000 };
    u32::try_from(kbps).unwrap_or(u32::MAX)
}

/// Bitrate of a file in kbps, 0 when it cannot be determined
///
/// Probe failures are logged and reported as unknown.
pub fn inspect(prober: &dyn Prober, file: &SourceFile) -> u32 {
    match prober.bitrate(file.path()) {
        Ok(raw) => {
            let kbps = normalize_kbps(raw);
            debug!("{}: {} kbps (raw {})", file.display_name(), kbps, raw);
            kbps
        }
        Err(e) => {
            warn!("Could not read bitrate of {}: {}", file.path().display(), e);
            0
        }
    }
}

/// Whether a file is close enough to the target bitrate to leave alone
///
/// Only skip-eligible extensions qualify, and an unknown bitrate (0) never
/// does.
pub fn should_skip(
    file: &SourceFile,
    bitrate_kbps: u32,
    target_kbps: u32,
    policy: SkipPolicy,
) -> bool {
    if bitrate_kbps == 0 || !extension_in(file.extension(), policy.extensions()) {
        return false;
    }
    bitrate_kbps.abs_diff(target_kbps) <= SKIP_TOLERANCE_KBPS
}
