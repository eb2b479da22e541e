//! Packet probe integration tests.
//!
//! Media-backed tests require fixture files under `tests/fixtures/` and
//! return early when they are absent.

use std::path::Path;

use chunkmux::{ChunkmuxError, PacketProbe};

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

fn sample_audio_only_path() -> &'static str {
    "tests/fixtures/sample_audio_only.mp4"
}

#[test]
fn missing_file_reports_file_open() {
    let result = PacketProbe::scan("tests/fixtures/definitely_not_here.mp4");
    assert!(matches!(result, Err(ChunkmuxError::FileOpen { .. })));
}

#[test]
fn probe_records_frames_and_duration() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let probe = PacketProbe::scan(path).expect("probe");

    assert!(!probe.is_empty(), "expected at least one video packet");
    assert!(probe.duration > 0.0, "expected a positive duration");
    assert!(probe.has_keyframes(), "expected at least one keyframe");

    for frame in &probe.frames {
        assert!(frame.packet_size > 0, "packet sizes should be positive");
        assert!(frame.pts_time >= 0.0, "timestamps should not be negative");
        assert!(
            frame.pts_time <= probe.duration + 1.0,
            "timestamps should not exceed the duration",
        );
    }
}

#[test]
fn keyframe_times_are_sorted_and_start_near_zero() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let probe = PacketProbe::scan(path).expect("probe");
    let keyframes = probe.keyframe_times();

    assert!(!keyframes.is_empty());
    assert!(
        keyframes[0] < 1.0,
        "the first keyframe should open the stream",
    );
    for pair in keyframes.windows(2) {
        assert!(pair[0] <= pair[1], "keyframe times should be ordered");
    }
}

#[test]
fn audio_only_file_has_no_video_stream() {
    let path = sample_audio_only_path();
    if !Path::new(path).exists() {
        return;
    }

    let result = PacketProbe::scan(path);
    assert!(matches!(result, Err(ChunkmuxError::NoVideoStream)));
}
