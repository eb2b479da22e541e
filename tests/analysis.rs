//! Frame analysis tests (complexity and scene-cut annotation).

use chunkmux::{FrameAnalysis, FrameRecord, ProbeResult};

fn probe_from_sizes(sizes: &[(usize, bool)]) -> ProbeResult {
    ProbeResult {
        frames: sizes
            .iter()
            .enumerate()
            .map(|(i, &(packet_size, is_keyframe))| FrameRecord {
                pts_time: i as f64,
                is_keyframe,
                packet_size,
            })
            .collect(),
        duration: sizes.len() as f64,
    }
}

#[test]
fn complexity_is_normalised_to_unit_range() {
    let sizes: Vec<(usize, bool)> = (0..=10).map(|i| (1_000 + i * 100, i == 0)).collect();
    let probe = probe_from_sizes(&sizes);

    let analysis = FrameAnalysis::compute(&probe, 0.35, false);

    assert_eq!(analysis.complexity.len(), probe.frames.len());
    assert_eq!(analysis.complexity[0], 0.0);
    assert_eq!(analysis.complexity[10], 1.0);
    for value in &analysis.complexity {
        assert!((0.0..=1.0).contains(value));
    }
}

#[test]
fn constant_sizes_give_zero_complexity() {
    let sizes = vec![(2_048, true); 20];
    let probe = probe_from_sizes(&sizes);

    let analysis = FrameAnalysis::compute(&probe, 0.35, false);

    assert!(analysis.complexity.iter().all(|&value| value == 0.0));
}

#[test]
fn size_discontinuity_at_a_keyframe_is_a_scene_cut() {
    // 1 KiB packets, jumping to 4 KiB at the keyframe in the middle.
    let mut sizes = vec![(1_024, false); 20];
    for entry in sizes.iter_mut().skip(10) {
        entry.0 = 4_096;
    }
    sizes[0].1 = true;
    sizes[10].1 = true;
    let probe = probe_from_sizes(&sizes);

    let analysis = FrameAnalysis::compute(&probe, 0.35, true);

    assert!(analysis.scene_cuts[10], "expected a scene cut at the jump");
    assert_eq!(analysis.scene_cuts.iter().filter(|&&cut| cut).count(), 1);
}

#[test]
fn non_keyframes_are_never_scene_cuts() {
    let mut sizes = vec![(1_024, false); 20];
    for entry in sizes.iter_mut().skip(10) {
        entry.0 = 4_096;
    }
    // The discontinuity is at index 10, but index 10 is not a keyframe.
    sizes[0].1 = true;
    let probe = probe_from_sizes(&sizes);

    let analysis = FrameAnalysis::compute(&probe, 0.35, true);

    assert!(analysis.scene_cuts.iter().all(|&cut| !cut));
}

#[test]
fn scene_detection_respects_the_window_margin() {
    // A jump too close to the end of the sequence cannot be flagged.
    let mut sizes = vec![(1_024, true); 8];
    sizes[6].0 = 8_192;
    let probe = probe_from_sizes(&sizes);

    let analysis = FrameAnalysis::compute(&probe, 0.35, true);

    assert!(analysis.scene_cuts.iter().all(|&cut| !cut));
}

#[test]
fn disabled_scene_detection_leaves_flags_clear() {
    let mut sizes = vec![(1_024, true); 20];
    for entry in sizes.iter_mut().skip(10) {
        entry.0 = 8_192;
    }
    let probe = probe_from_sizes(&sizes);

    let analysis = FrameAnalysis::compute(&probe, 0.35, false);

    assert!(analysis.scene_cuts.iter().all(|&cut| !cut));
}

#[test]
fn non_positive_threshold_falls_back_to_default() {
    // A 50% size jump clears the 0.35 default.
    let mut sizes = vec![(2_000, false); 20];
    for entry in sizes.iter_mut().skip(10) {
        entry.0 = 3_000;
    }
    sizes[10].1 = true;
    let probe = probe_from_sizes(&sizes);

    let analysis = FrameAnalysis::compute(&probe, 0.0, true);

    assert!(analysis.scene_cuts[10]);
}

#[test]
fn analysis_does_not_touch_the_probe() {
    let sizes: Vec<(usize, bool)> = (0..30).map(|i| (500 + i * 37, i % 5 == 0)).collect();
    let probe = probe_from_sizes(&sizes);
    let snapshot = probe.clone();

    let _ = FrameAnalysis::compute(&probe, 0.35, true);

    assert_eq!(probe.frames, snapshot.frames);
    assert_eq!(probe.duration, snapshot.duration);
}
