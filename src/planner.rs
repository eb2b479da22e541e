//! Keyframe-aligned chunk planning.
//!
//! [`ChunkPlanner`] turns a [`ProbeResult`](crate::ProbeResult) into a
//! [`ChunkPlan`]: an ordered, gap-free partition of `[0, duration]` whose
//! interior boundaries sit on keyframe timestamps, so every chunk can later
//! be materialised by stream copy alone.
//!
//! Selection is constraint-driven (a preferred target length bounded by a
//! minimum and maximum) with two optional content-aware refinements
//! computed from packet sizes (see [`FrameAnalysis`]): scene-cut bias and
//! complexity weighting. With both refinements disabled the planner reduces
//! to plain nearest-to-target keyframe selection.
//!
//! # Example
//!
//! ```no_run
//! use chunkmux::{ChunkmuxError, ChunkPlanner, PacketProbe, PlanConfig};
//!
//! let probe = PacketProbe::scan("input.mp4")?;
//! let config = PlanConfig::new()
//!     .with_target_duration(20.0)
//!     .with_scene_detection(true);
//! let plan = ChunkPlanner::new(config).plan(&probe)?;
//! for chunk in &plan.chunks {
//!     println!("#{:04} {:.3} -> {:.3}", chunk.index, chunk.start, chunk.end);
//! }
//! # Ok::<(), ChunkmuxError>(())
//! ```

use crate::analysis::{FrameAnalysis, DEFAULT_SCENE_THRESHOLD};
use crate::error::ChunkmuxError;
use crate::probe::ProbeResult;

/// Timestamp comparison tolerance, in seconds.
const EPS: f64 = 1e-6;

/// Planner fallback target when neither a target duration nor a parallelism
/// goal is configured.
const DEFAULT_TARGET: f64 = 10.0;

/// Default weight given to content signals over pure duration fit.
const DEFAULT_COMPLEXITY_WEIGHT: f64 = 0.3;

/// A single planned segment of the source timeline.
///
/// The interval is half-open `[start, end)`, except for the final chunk of a
/// plan, which is closed at the asset duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chunk {
    /// Position of this chunk in the plan (`0..N-1`, dense).
    pub index: usize,
    /// Start of the interval, in seconds.
    pub start: f64,
    /// End of the interval, in seconds. Always greater than `start`.
    pub end: f64,
}

impl Chunk {
    /// Length of the chunk in seconds.
    pub fn length(&self) -> f64 {
        self.end - self.start
    }
}

/// An ordered sequence of chunks covering `[0, duration]` contiguously.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkPlan {
    /// The planned chunks, in ascending start order with dense indices.
    pub chunks: Vec<Chunk>,
}

impl ChunkPlan {
    /// Number of chunks in the plan.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns `true` if the plan holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Sum of all chunk lengths, in seconds.
    pub fn total_duration(&self) -> f64 {
        self.chunks.iter().map(Chunk::length).sum()
    }
}

/// Chunk planning options.
///
/// A builder carrying duration constraints, chunk-count caps, and the
/// content-aware scoring switches. All values have defaults; a
/// default-constructed config plans plain 60-second-target chunks.
#[derive(Debug, Clone)]
pub struct PlanConfig {
    /// Preferred chunk length in seconds. `<= 0` falls back to 10 s.
    target_duration: f64,
    /// Minimum chunk length. `<= 0` derives `0.5 × target`.
    min_duration: f64,
    /// Maximum chunk length. `<= 0` derives `2.0 × target`.
    max_duration: f64,
    /// Merge a trailing chunk shorter than half the minimum into its
    /// predecessor.
    avoid_tiny_last: bool,
    /// Lower bound on the chunk count (0 = none). Best effort.
    min_chunks: usize,
    /// Upper bound on the chunk count (0 = none).
    max_chunks: usize,
    /// When > 0, overrides the target with `duration / ideal_parallel`.
    ideal_parallel: usize,
    /// Bias cuts toward packet-size scene boundaries.
    scene_detection: bool,
    /// Weight duration fit against content signals.
    complexity_adapt: bool,
    /// Scene-cut sensitivity in `[0, 1]`.
    scene_threshold: f64,
    /// Content-signal weight in `[0, 1]`.
    complexity_weight: f64,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanConfig {
    /// Create a configuration with default settings: 60 s target, derived
    /// min/max, tiny-tail merging on, no count caps, content scoring off.
    pub fn new() -> Self {
        Self {
            target_duration: 60.0,
            min_duration: 0.0,
            max_duration: 0.0,
            avoid_tiny_last: true,
            min_chunks: 0,
            max_chunks: 0,
            ideal_parallel: 0,
            scene_detection: false,
            complexity_adapt: false,
            scene_threshold: DEFAULT_SCENE_THRESHOLD,
            complexity_weight: DEFAULT_COMPLEXITY_WEIGHT,
        }
    }

    /// Set the preferred chunk length in seconds.
    #[must_use]
    pub fn with_target_duration(mut self, seconds: f64) -> Self {
        self.target_duration = seconds;
        self
    }

    /// Set the minimum chunk length in seconds. `<= 0` derives half the
    /// target.
    #[must_use]
    pub fn with_min_duration(mut self, seconds: f64) -> Self {
        self.min_duration = seconds;
        self
    }

    /// Set the maximum chunk length in seconds. `<= 0` derives twice the
    /// target. Normalised up to the minimum when it falls below it.
    #[must_use]
    pub fn with_max_duration(mut self, seconds: f64) -> Self {
        self.max_duration = seconds;
        self
    }

    /// Control merging of a sub-half-minimum trailing chunk into its
    /// predecessor. Defaults to `true`.
    #[must_use]
    pub fn with_avoid_tiny_last(mut self, avoid: bool) -> Self {
        self.avoid_tiny_last = avoid;
        self
    }

    /// Require at least this many chunks (best effort; 0 disables).
    #[must_use]
    pub fn with_min_chunks(mut self, count: usize) -> Self {
        self.min_chunks = count;
        self
    }

    /// Allow at most this many chunks (0 disables). Enforced by merging
    /// the shortest adjacent pairs.
    #[must_use]
    pub fn with_max_chunks(mut self, count: usize) -> Self {
        self.max_chunks = count;
        self
    }

    /// Plan for this many parallel workers: overrides the target duration
    /// with `duration / ideal_parallel`. 0 disables.
    #[must_use]
    pub fn with_ideal_parallel(mut self, workers: usize) -> Self {
        self.ideal_parallel = workers;
        self
    }

    /// Enable scene-cut scoring: keyframes at packet-size discontinuities
    /// are preferred as cut points.
    #[must_use]
    pub fn with_scene_detection(mut self, enable: bool) -> Self {
        self.scene_detection = enable;
        self
    }

    /// Enable complexity weighting of the duration-fit score.
    #[must_use]
    pub fn with_complexity_adapt(mut self, enable: bool) -> Self {
        self.complexity_adapt = enable;
        self
    }

    /// Set the scene-cut sensitivity (relative packet-size change,
    /// `[0, 1]`). Non-positive values fall back to 0.35.
    #[must_use]
    pub fn with_scene_threshold(mut self, threshold: f64) -> Self {
        self.scene_threshold = threshold;
        self
    }

    /// Set the weight of content signals against duration fit (`[0, 1]`,
    /// default 0.3). Non-positive values fall back to the default.
    #[must_use]
    pub fn with_complexity_weight(mut self, weight: f64) -> Self {
        self.complexity_weight = weight;
        self
    }
}

/// A candidate cut point collected from the probe's keyframes.
#[derive(Debug, Clone, Copy)]
struct CutCandidate {
    /// Keyframe timestamp in seconds.
    time: f64,
    /// Whether the analysis flagged this keyframe as a scene boundary.
    is_scene_cut: bool,
    /// Cut desirability; keyframes start at 100, scene cuts add 50.
    quality_score: i32,
}

/// How candidate cuts are ranked within the feasible window.
#[derive(Debug, Clone, Copy)]
enum Scoring {
    /// Absolute distance from the target duration.
    Basic,
    /// Normalised duration fit blended with scene and quality bonuses.
    Smart { complexity_weight: f64 },
}

/// Plans keyframe-aligned chunks from probe data.
///
/// The planner never touches the media file itself; it works entirely on
/// the probe's frame records. Planning is deterministic: the same probe and
/// configuration always produce the same plan.
pub struct ChunkPlanner {
    config: PlanConfig,
}

impl ChunkPlanner {
    /// Create a planner with the given configuration.
    pub fn new(config: PlanConfig) -> Self {
        Self { config }
    }

    /// Produce a chunk plan for the probed asset.
    ///
    /// The returned plan covers `[0, duration]` contiguously with dense
    /// indices. Interior boundaries are keyframe timestamps except where no
    /// keyframe exists inside the feasible window, in which case the nearest
    /// keyframe past the window (or the asset end) is used.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkmuxError::InvalidInput`] when the probe recorded no
    /// frames or a non-positive duration.
    pub fn plan(&self, probe: &ProbeResult) -> Result<ChunkPlan, ChunkmuxError> {
        if probe.frames.is_empty() {
            return Err(ChunkmuxError::InvalidInput(
                "probe result contains no frames".to_string(),
            ));
        }
        if probe.duration <= 0.0 {
            return Err(ChunkmuxError::InvalidInput(format!(
                "non-positive asset duration ({:.3})",
                probe.duration
            )));
        }

        let use_smart = self.config.scene_detection || self.config.complexity_adapt;
        let analysis = if use_smart {
            Some(FrameAnalysis::compute(
                probe,
                self.config.scene_threshold,
                self.config.scene_detection,
            ))
        } else {
            None
        };

        let candidates = self.collect_candidates(probe, analysis.as_ref());
        let mut plan = self.plan_with_target(probe.duration, &candidates, None)?;

        if self.config.min_chunks > 0 && plan.chunks.len() < self.config.min_chunks {
            let forced_target = probe.duration / self.config.min_chunks as f64;
            log::debug!(
                "Plan has {} chunks, below the floor of {}; re-planning with target {:.3}s",
                plan.chunks.len(),
                self.config.min_chunks,
                forced_target,
            );
            plan = self.plan_with_target(probe.duration, &candidates, Some(forced_target))?;
        }

        if self.config.max_chunks > 0 && plan.chunks.len() > self.config.max_chunks {
            merge_to_cap(&mut plan.chunks, self.config.max_chunks);
            renumber(&mut plan.chunks);
        }

        log::info!(
            "Planned {} chunks over {:.3}s (target {:.3}s)",
            plan.chunks.len(),
            probe.duration,
            self.resolve_params(probe.duration, None).0,
        );

        Ok(plan)
    }

    /// Resolve the effective (target, min, max) durations.
    fn resolve_params(&self, duration: f64, target_override: Option<f64>) -> (f64, f64, f64) {
        let mut target = self.config.target_duration;
        if self.config.ideal_parallel > 0 {
            target = duration / self.config.ideal_parallel as f64;
        }
        if let Some(forced) = target_override {
            target = forced;
        }
        if target <= 0.0 {
            target = DEFAULT_TARGET;
        }

        let min = if self.config.min_duration > 0.0 {
            self.config.min_duration
        } else {
            target * 0.5
        };
        let mut max = if self.config.max_duration > 0.0 {
            self.config.max_duration
        } else {
            target * 2.0
        };
        if max < min {
            max = min;
        }

        (target, min, max)
    }

    /// Collect cut candidates from the probe's keyframes.
    fn collect_candidates(
        &self,
        probe: &ProbeResult,
        analysis: Option<&FrameAnalysis>,
    ) -> Vec<CutCandidate> {
        probe
            .frames
            .iter()
            .enumerate()
            .filter(|(_, frame)| frame.is_keyframe)
            .map(|(i, frame)| {
                let is_scene_cut = analysis.is_some_and(|a| a.scene_cuts[i]);
                let mut quality_score = 100;
                if is_scene_cut && self.config.scene_detection {
                    quality_score += 50;
                }
                CutCandidate {
                    time: frame.pts_time,
                    is_scene_cut,
                    quality_score,
                }
            })
            .collect()
    }

    /// Run one full planning pass and post-process the result.
    fn plan_with_target(
        &self,
        duration: f64,
        candidates: &[CutCandidate],
        target_override: Option<f64>,
    ) -> Result<ChunkPlan, ChunkmuxError> {
        let (target, min_dur, max_dur) = self.resolve_params(duration, target_override);

        let scoring = if self.config.scene_detection || self.config.complexity_adapt {
            let weight = if self.config.complexity_weight > 0.0 {
                self.config.complexity_weight
            } else {
                DEFAULT_COMPLEXITY_WEIGHT
            };
            Scoring::Smart {
                complexity_weight: weight,
            }
        } else {
            Scoring::Basic
        };

        let mut chunks: Vec<Chunk> = Vec::new();

        if candidates.is_empty() {
            // No keyframes at all: the whole asset is one chunk.
            push_chunk(&mut chunks, 0, 0.0, duration);
        } else {
            let mut start = 0.0_f64;
            let mut cursor = 0usize;
            let mut index = 0usize;

            while start < duration - EPS {
                let mut cut = choose_cut(
                    start, duration, target, min_dur, max_dur, candidates, &mut cursor, scoring,
                );
                if cut <= start + EPS {
                    cut = (start + max_dur).min(duration);
                }

                push_chunk(&mut chunks, index, start, cut);
                index += 1;
                start = cut;
            }
        }

        if chunks.is_empty() {
            return Err(ChunkmuxError::InvalidInput(
                "planning produced no chunks".to_string(),
            ));
        }

        // Snap the tail to the asset end before any merging.
        if let Some(last) = chunks.last_mut() {
            last.end = duration;
        }

        if self.config.avoid_tiny_last {
            merge_tiny_tail(&mut chunks, min_dur, duration);
        }

        normalize_boundaries(&mut chunks, duration);
        renumber(&mut chunks);

        Ok(ChunkPlan { chunks })
    }
}

/// Append a chunk, ignoring zero-length pieces.
fn push_chunk(chunks: &mut Vec<Chunk>, index: usize, start: f64, end: f64) {
    if end < start + EPS {
        return;
    }
    chunks.push(Chunk { index, start, end });
}

/// Pick the next cut after `start` from the ordered candidate list.
///
/// Candidates closer than `min_dur` are skipped; a candidate at or past the
/// asset end selects the end itself; the first candidate past `max_dur` is
/// remembered as an oversize fallback. Within the feasible window the
/// lowest-scoring candidate wins, earliest on ties. The cursor is advanced
/// past the chosen cut so later calls never revisit it.
#[allow(clippy::too_many_arguments)]
fn choose_cut(
    start: f64,
    duration: f64,
    target: f64,
    min_dur: f64,
    max_dur: f64,
    candidates: &[CutCandidate],
    cursor: &mut usize,
    scoring: Scoring,
) -> f64 {
    let mut best_cut = -1.0_f64;
    let mut best_score = f64::MAX;
    let mut fallback = -1.0_f64;

    let mut idx = *cursor;
    while idx < candidates.len() && candidates[idx].time <= start + EPS {
        idx += 1;
    }

    while idx < candidates.len() {
        let candidate = candidates[idx];
        let t = candidate.time;

        if t >= duration - EPS {
            best_cut = duration;
            break;
        }

        let span = t - start;
        if span < min_dur - EPS {
            idx += 1;
            continue;
        }
        if span > max_dur + EPS {
            fallback = t;
            break;
        }

        let score = match scoring {
            Scoring::Basic => (span - target).abs(),
            Scoring::Smart { complexity_weight } => {
                let duration_score = (span - target).abs() / target;
                let scene_bonus = if candidate.is_scene_cut { -0.3 } else { 0.0 };
                let quality_bonus = -(candidate.quality_score as f64 / 200.0);
                duration_score * (1.0 - complexity_weight) + scene_bonus + quality_bonus
            }
        };

        if score < best_score {
            best_score = score;
            best_cut = t;
        }

        idx += 1;
    }

    if best_cut < 0.0 {
        best_cut = if fallback > 0.0 { fallback } else { duration };
    }

    if best_cut > duration {
        best_cut = duration;
    }
    if best_cut < start + min_dur {
        best_cut = (start + min_dur).min(duration);
    }

    while *cursor < candidates.len() && candidates[*cursor].time <= best_cut + EPS {
        *cursor += 1;
    }

    best_cut
}

/// Merge a trailing chunk shorter than half the minimum into its
/// predecessor.
fn merge_tiny_tail(chunks: &mut Vec<Chunk>, min_dur: f64, duration: f64) {
    if chunks.len() < 2 {
        return;
    }

    let last = chunks[chunks.len() - 1];
    if last.length() < min_dur * 0.5 {
        chunks.pop();
        if let Some(prev) = chunks.last_mut() {
            prev.end = duration;
        }
    }
}

/// Force adjacency, clamp inverted intervals, and correct cumulative drift
/// against the asset duration.
fn normalize_boundaries(chunks: &mut [Chunk], duration: f64) {
    let mut total = 0.0_f64;
    for i in 0..chunks.len() {
        if i > 0 {
            chunks[i].start = chunks[i - 1].end;
        }
        if chunks[i].end < chunks[i].start {
            chunks[i].end = chunks[i].start;
        }
        total += chunks[i].length();
    }

    if (total - duration).abs() > 0.001 {
        let last = chunks.len() - 1;
        chunks[last].end += duration - total;
    }
}

/// Reassign dense indices after structural edits.
fn renumber(chunks: &mut [Chunk]) {
    for (i, chunk) in chunks.iter_mut().enumerate() {
        chunk.index = i;
    }
}

/// Merge the adjacent pair with the smallest summed duration until the plan
/// fits under `cap`.
fn merge_to_cap(chunks: &mut Vec<Chunk>, cap: usize) {
    while chunks.len() > cap && chunks.len() > 1 {
        let mut best_pair = 0;
        let mut best_length = f64::MAX;
        for i in 0..chunks.len() - 1 {
            let combined = chunks[i].length() + chunks[i + 1].length();
            if combined < best_length {
                best_length = combined;
                best_pair = i;
            }
        }

        chunks[best_pair].end = chunks[best_pair + 1].end;
        chunks.remove(best_pair + 1);
    }
}
