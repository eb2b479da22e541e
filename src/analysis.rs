//! Content analysis over probe data.
//!
//! [`FrameAnalysis`] derives two packet-domain signals from a
//! [`ProbeResult`](crate::ProbeResult) without decoding:
//!
//! - **Complexity**: each packet's size normalised into `[0, 1]` against
//!   the smallest and largest packet in the stream. Big packets mean more
//!   residual data, a cheap proxy for visual complexity.
//! - **Scene cuts**: keyframes where the mean packet size over a small
//!   window changes sharply, suggesting a shot boundary. Only keyframes can
//!   be scene cuts, since only keyframes are valid cut points anyway.
//!
//! The analysis is a separate view: the probe result passed in is never
//! modified. The planner consumes it to bias cut selection toward scene
//! boundaries and complexity-balanced chunks.
//!
//! # Example
//!
//! ```no_run
//! use chunkmux::{ChunkmuxError, FrameAnalysis, PacketProbe};
//!
//! let probe = PacketProbe::scan("input.mp4")?;
//! let analysis = FrameAnalysis::compute(&probe, 0.35, true);
//! let cuts = analysis.scene_cuts.iter().filter(|&&cut| cut).count();
//! println!("{cuts} likely scene boundaries");
//! # Ok::<(), ChunkmuxError>(())
//! ```

use crate::probe::ProbeResult;

/// Window size (in packets) for the scene-cut size comparison.
const SCENE_WINDOW: usize = 5;

/// Default scene-cut sensitivity when the caller passes a non-positive
/// threshold.
pub(crate) const DEFAULT_SCENE_THRESHOLD: f64 = 0.35;

/// Per-frame analytic annotations, parallel to `ProbeResult::frames`.
#[derive(Debug, Clone, Default)]
pub struct FrameAnalysis {
    /// Normalised packet-size complexity in `[0, 1]`, one entry per frame.
    pub complexity: Vec<f64>,
    /// Scene-cut flags, one entry per frame. Always `false` for
    /// non-keyframe packets.
    pub scene_cuts: Vec<bool>,
}

impl FrameAnalysis {
    /// Compute complexity scores and (optionally) scene-cut flags for a
    /// probe result.
    ///
    /// `scene_threshold` is the relative packet-size change that marks a
    /// keyframe as a scene cut; values `<= 0` fall back to the default of
    /// `0.35`. When `detect_scenes` is `false` the scene-cut vector is all
    /// `false` and only complexity is computed.
    pub fn compute(probe: &ProbeResult, scene_threshold: f64, detect_scenes: bool) -> Self {
        let complexity = compute_complexity(probe);
        let scene_cuts = if detect_scenes {
            detect_scene_changes(probe, scene_threshold)
        } else {
            vec![false; probe.frames.len()]
        };

        log::debug!(
            "Analyzed {} frames ({} scene cuts)",
            probe.frames.len(),
            scene_cuts.iter().filter(|&&cut| cut).count(),
        );

        Self {
            complexity,
            scene_cuts,
        }
    }
}

/// Normalise packet sizes into `[0, 1]` complexity scores.
fn compute_complexity(probe: &ProbeResult) -> Vec<f64> {
    if probe.frames.is_empty() {
        return Vec::new();
    }

    let mut min_size = probe.frames[0].packet_size;
    let mut max_size = probe.frames[0].packet_size;
    for frame in &probe.frames[1..] {
        min_size = min_size.min(frame.packet_size);
        max_size = max_size.max(frame.packet_size);
    }

    // Floor the range at 1 so a constant-size stream maps to all zeros.
    let range = ((max_size - min_size) as f64).max(1.0);

    probe
        .frames
        .iter()
        .map(|frame| (frame.packet_size - min_size) as f64 / range)
        .collect()
}

/// Flag keyframes where the mean packet size over the surrounding windows
/// changes by more than `threshold`, relative to the preceding window.
fn detect_scene_changes(probe: &ProbeResult, threshold: f64) -> Vec<bool> {
    let count = probe.frames.len();
    let mut scene_cuts = vec![false; count];
    if count < 2 {
        return scene_cuts;
    }

    let threshold = if threshold > 0.0 {
        threshold
    } else {
        DEFAULT_SCENE_THRESHOLD
    };

    for i in SCENE_WINDOW..count.saturating_sub(SCENE_WINDOW) {
        if !probe.frames[i].is_keyframe {
            continue;
        }

        let avg_before: f64 = probe.frames[i - SCENE_WINDOW..i]
            .iter()
            .map(|frame| frame.packet_size as f64)
            .sum::<f64>()
            / SCENE_WINDOW as f64;

        let after = &probe.frames[i..(i + SCENE_WINDOW).min(count)];
        let avg_after: f64 =
            after.iter().map(|frame| frame.packet_size as f64).sum::<f64>() / SCENE_WINDOW as f64;

        if avg_before > 0.0 && ((avg_after - avg_before).abs() / avg_before) > threshold {
            scene_cuts[i] = true;
        }
    }

    scene_cuts
}
