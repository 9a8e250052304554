//! Numeric policies of loop assembly. Pure functions, no engine access.

use crate::config::OutputConfig;
use crate::source::SourceVideo;

/// Ratios this close to an integer count as that integer
const RATIO_TOLERANCE: f64 = 1e-9;

/// Whether the output must be encoded with the compressed profile.
///
/// Projects the output size from the source's average bitrate; compression is
/// needed when that exceeds the size ceiling or the target itself exceeds the
/// duration threshold. Both comparisons are strict.
pub fn estimate_compression_need(source: &SourceVideo, target_minutes: f64, config: &OutputConfig) -> bool {
    let projected_bytes = source.estimated_bitrate() * target_minutes * 60.0;
    projected_bytes > config.size_ceiling_bytes as f64 || target_minutes > config.compression_threshold_minutes
}

/// Additional plays of the loop unit needed to cover the target.
///
/// The repeat primitive plays the unit once before repeating, so this is
/// `ceil(target / unit) - 1`, never negative.
pub fn compute_repeat_count(unit_duration_secs: f64, target_minutes: f64) -> u32 {
    let target_secs = target_minutes * 60.0;
    if !(unit_duration_secs > 0.0 && target_secs > 0.0) {
        return 0;
    }

    let ratio = target_secs / unit_duration_secs;
    let nearest = ratio.round();
    let plays = if (ratio - nearest).abs() < RATIO_TOLERANCE {
        nearest
    } else {
        ratio.ceil()
    };

    (plays as u32).saturating_sub(1)
}
