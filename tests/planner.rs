//! Chunk planner tests.
//!
//! All tests run on synthetic probe data; no media files are required.

use chunkmux::{ChunkmuxError, ChunkPlan, ChunkPlanner, FrameRecord, PlanConfig, ProbeResult};

/// Build a probe with keyframes at the given timestamps and nothing else.
fn probe_with_keyframes(duration: f64, keyframe_times: &[f64]) -> ProbeResult {
    ProbeResult {
        frames: keyframe_times
            .iter()
            .map(|&pts_time| FrameRecord {
                pts_time,
                is_keyframe: true,
                packet_size: 4096,
            })
            .collect(),
        duration,
    }
}

/// Keyframes at every multiple of `step` in `[0, duration]`.
fn evenly_spaced(duration: f64, step: f64) -> Vec<f64> {
    let mut times = Vec::new();
    let mut t = 0.0;
    while t <= duration {
        times.push(t);
        t += step;
    }
    times
}

fn assert_plan_invariants(plan: &ChunkPlan, duration: f64) {
    assert!(!plan.is_empty(), "plan must hold at least one chunk");
    assert_eq!(plan.chunks[0].start, 0.0, "plan must start at zero");
    assert!(
        (plan.chunks[plan.len() - 1].end - duration).abs() < 1e-9,
        "plan must end at the asset duration",
    );
    for (i, chunk) in plan.chunks.iter().enumerate() {
        assert_eq!(chunk.index, i, "indices must be dense");
        assert!(chunk.end > chunk.start, "chunks must have positive length");
        if i > 0 {
            assert_eq!(
                chunk.start,
                plan.chunks[i - 1].end,
                "chunks must be adjacent",
            );
        }
    }
}

#[test]
fn plans_even_cuts_with_dense_keyframes() {
    let probe = probe_with_keyframes(100.0, &evenly_spaced(100.0, 5.0));
    let config = PlanConfig::new()
        .with_target_duration(20.0)
        .with_min_duration(0.0)
        .with_max_duration(40.0);

    let plan = ChunkPlanner::new(config).plan(&probe).expect("plan");

    assert_plan_invariants(&plan, 100.0);
    let bounds: Vec<(usize, f64, f64)> = plan
        .chunks
        .iter()
        .map(|c| (c.index, c.start, c.end))
        .collect();
    assert_eq!(
        bounds,
        vec![
            (0, 0.0, 20.0),
            (1, 20.0, 40.0),
            (2, 40.0, 60.0),
            (3, 60.0, 80.0),
            (4, 80.0, 100.0),
        ],
    );
}

#[test]
fn oversize_fallback_when_no_feasible_keyframe() {
    let probe = probe_with_keyframes(100.0, &[0.0, 55.0, 100.0]);
    let config = PlanConfig::new()
        .with_target_duration(20.0)
        .with_min_duration(0.0)
        .with_max_duration(40.0);

    let plan = ChunkPlanner::new(config).plan(&probe).expect("plan");

    assert_plan_invariants(&plan, 100.0);
    let bounds: Vec<(usize, f64, f64)> = plan
        .chunks
        .iter()
        .map(|c| (c.index, c.start, c.end))
        .collect();
    assert_eq!(bounds, vec![(0, 0.0, 55.0), (1, 55.0, 100.0)]);
}

#[test]
fn ideal_parallel_overrides_target() {
    let probe = probe_with_keyframes(100.0, &evenly_spaced(100.0, 5.0));
    let config = PlanConfig::new()
        .with_target_duration(20.0)
        .with_ideal_parallel(4);

    let plan = ChunkPlanner::new(config).plan(&probe).expect("plan");

    assert_plan_invariants(&plan, 100.0);
    let bounds: Vec<(f64, f64)> = plan.chunks.iter().map(|c| (c.start, c.end)).collect();
    assert_eq!(
        bounds,
        vec![(0.0, 25.0), (25.0, 50.0), (50.0, 75.0), (75.0, 100.0)],
    );
}

#[test]
fn max_chunks_merges_down_to_cap() {
    let probe = probe_with_keyframes(100.0, &evenly_spaced(100.0, 10.0));
    let config = PlanConfig::new()
        .with_target_duration(10.0)
        .with_max_chunks(3);

    let plan = ChunkPlanner::new(config).plan(&probe).expect("plan");

    assert_eq!(plan.len(), 3);
    assert_plan_invariants(&plan, 100.0);
}

#[test]
fn min_chunks_replans_with_smaller_target() {
    let probe = probe_with_keyframes(100.0, &evenly_spaced(100.0, 5.0));
    let config = PlanConfig::new()
        .with_target_duration(60.0)
        .with_min_chunks(5);

    let plan = ChunkPlanner::new(config).plan(&probe).expect("plan");

    assert!(plan.len() >= 5, "expected at least 5 chunks, got {}", plan.len());
    assert_plan_invariants(&plan, 100.0);
}

#[test]
fn scene_cut_attracts_the_cut_point() {
    // Packet sizes triple at t=30; both t=20 (nearest target) and t=30 sit
    // inside the feasible window.
    let frames: Vec<FrameRecord> = (0..=100)
        .map(|i| FrameRecord {
            pts_time: i as f64,
            is_keyframe: i % 10 == 0,
            packet_size: if i < 30 { 1_000 } else { 3_000 },
        })
        .collect();
    let probe = ProbeResult {
        frames,
        duration: 100.0,
    };

    let config = PlanConfig::new()
        .with_target_duration(20.0)
        .with_scene_detection(true)
        .with_scene_threshold(0.5);

    let plan = ChunkPlanner::new(config).plan(&probe).expect("plan");

    assert_plan_invariants(&plan, 100.0);
    assert_eq!(
        plan.chunks[0].end, 30.0,
        "cut should prefer the scene boundary over the nominally closer keyframe",
    );
}

#[test]
fn empty_probe_is_rejected() {
    let probe = ProbeResult {
        frames: Vec::new(),
        duration: 100.0,
    };
    let result = ChunkPlanner::new(PlanConfig::new()).plan(&probe);
    assert!(matches!(result, Err(ChunkmuxError::InvalidInput(_))));
}

#[test]
fn non_positive_duration_is_rejected() {
    let probe = probe_with_keyframes(0.0, &[0.0]);
    let result = ChunkPlanner::new(PlanConfig::new()).plan(&probe);
    assert!(matches!(result, Err(ChunkmuxError::InvalidInput(_))));
}

#[test]
fn zero_keyframes_yield_a_single_chunk() {
    let frames: Vec<FrameRecord> = (0..100)
        .map(|i| FrameRecord {
            pts_time: i as f64,
            is_keyframe: false,
            packet_size: 2_000,
        })
        .collect();
    let probe = ProbeResult {
        frames,
        duration: 100.0,
    };

    let plan = ChunkPlanner::new(PlanConfig::new()).plan(&probe).expect("plan");

    assert_eq!(plan.len(), 1);
    assert_eq!(plan.chunks[0].start, 0.0);
    assert_eq!(plan.chunks[0].end, 100.0);
}

#[test]
fn zero_target_defaults_to_ten_seconds() {
    let probe = probe_with_keyframes(100.0, &evenly_spaced(100.0, 5.0));
    let config = PlanConfig::new().with_target_duration(0.0);

    let plan = ChunkPlanner::new(config).plan(&probe).expect("plan");

    assert_plan_invariants(&plan, 100.0);
    assert_eq!(plan.chunks[0].end, 10.0);
}

#[test]
fn tiny_tail_is_merged_into_predecessor() {
    let keyframes = [0.0, 30.0, 58.0];
    let base = PlanConfig::new()
        .with_target_duration(30.0)
        .with_min_duration(20.0)
        .with_max_duration(40.0);

    let merged = ChunkPlanner::new(base.clone().with_avoid_tiny_last(true))
        .plan(&probe_with_keyframes(60.0, &keyframes))
        .expect("plan");
    assert_eq!(merged.len(), 2);
    assert_eq!(merged.chunks[1].end, 60.0);

    let kept = ChunkPlanner::new(base.with_avoid_tiny_last(false))
        .plan(&probe_with_keyframes(60.0, &keyframes))
        .expect("plan");
    assert_eq!(kept.len(), 3);
    assert!(kept.chunks[2].length() < 10.0);
}

#[test]
fn planning_is_deterministic() {
    let probe = probe_with_keyframes(300.0, &evenly_spaced(300.0, 7.5));
    let config = PlanConfig::new()
        .with_target_duration(42.0)
        .with_scene_detection(true)
        .with_complexity_adapt(true);

    let first = ChunkPlanner::new(config.clone()).plan(&probe).expect("plan");
    let second = ChunkPlanner::new(config).plan(&probe).expect("plan");

    assert_eq!(first, second);
}

#[test]
fn interior_cuts_land_on_keyframes() {
    let keyframes = evenly_spaced(240.0, 3.0);
    let probe = probe_with_keyframes(240.0, &keyframes);
    let config = PlanConfig::new().with_target_duration(25.0);

    let plan = ChunkPlanner::new(config).plan(&probe).expect("plan");

    assert_plan_invariants(&plan, 240.0);
    for chunk in &plan.chunks[1..] {
        assert!(
            keyframes.iter().any(|&k| (k - chunk.start).abs() < 1e-9),
            "interior boundary {} is not a keyframe timestamp",
            chunk.start,
        );
    }
}

#[test]
fn durations_stay_within_bounds_when_feasible() {
    let probe = probe_with_keyframes(600.0, &evenly_spaced(600.0, 2.0));
    let config = PlanConfig::new()
        .with_target_duration(30.0)
        .with_min_duration(15.0)
        .with_max_duration(45.0);

    let plan = ChunkPlanner::new(config).plan(&probe).expect("plan");

    assert_plan_invariants(&plan, 600.0);
    for chunk in &plan.chunks[..plan.len() - 1] {
        assert!(chunk.length() >= 15.0 - 1e-9);
        assert!(chunk.length() <= 45.0 + 1e-9);
    }
}

#[test]
fn replanning_boundaries_as_keyframes_reproduces_the_plan() {
    let probe = probe_with_keyframes(180.0, &evenly_spaced(180.0, 4.0));
    let config = PlanConfig::new().with_target_duration(20.0);

    let plan = ChunkPlanner::new(config.clone()).plan(&probe).expect("plan");

    // Re-plan using only the plan's own boundaries as keyframes.
    let boundary_times: Vec<f64> = plan.chunks.iter().map(|c| c.start).collect();
    let synthetic = probe_with_keyframes(180.0, &boundary_times);
    let replanned = ChunkPlanner::new(config).plan(&synthetic).expect("plan");

    assert_eq!(plan, replanned);
}

#[test]
fn total_duration_matches_asset_duration() {
    let probe = probe_with_keyframes(100.0, &evenly_spaced(100.0, 5.0));
    let plan = ChunkPlanner::new(PlanConfig::new().with_target_duration(15.0))
        .plan(&probe)
        .expect("plan");

    assert!((plan.total_duration() - 100.0).abs() < 0.001);
}
