//! Split/stitch round-trip integration tests.
//!
//! These exercise the full pipeline (probe, plan, split, stitch) against
//! the media fixture and verify that per-stream packet payloads survive the
//! round trip bit for bit. Tests return early when the fixture is absent.

use std::path::Path;

use chunkmux::{
    verify::stream_digests, ChunkmuxError, ChunkPlanner, PacketProbe, PlanConfig, Splitter,
    Stitcher,
};

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

/// Plan the fixture into a handful of small chunks.
fn plan_fixture(path: &str) -> chunkmux::ChunkPlan {
    let probe = PacketProbe::scan(path).expect("probe");
    let config = PlanConfig::new()
        .with_target_duration(probe.duration / 3.0)
        .with_min_duration(probe.duration / 10.0);
    ChunkPlanner::new(config).plan(&probe).expect("plan")
}

#[test]
fn split_writes_one_file_per_chunk() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let plan = plan_fixture(path);
    let scratch = tempfile::tempdir().expect("tempdir");

    let written = Splitter::new(path)
        .expect("splitter")
        .split_all(&plan, scratch.path())
        .expect("split_all");

    assert_eq!(written.len(), plan.len());
    for (chunk, file) in plan.chunks.iter().zip(&written) {
        assert!(file.exists(), "chunk file {} was not written", file.display());
        let name = file.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        assert_eq!(name, format!("chunk_{:04}.mp4", chunk.index));
    }
}

#[test]
fn split_then_stitch_preserves_packet_payloads() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let plan = plan_fixture(path);
    assert!(plan.len() >= 2, "fixture should produce multiple chunks");

    let scratch = tempfile::tempdir().expect("tempdir");
    let chunks_dir = scratch.path().join("chunks");
    let rejoined = scratch.path().join("rejoined.mp4");

    Splitter::new(path)
        .expect("splitter")
        .split_all(&plan, &chunks_dir)
        .expect("split_all");
    Stitcher::new(&rejoined)
        .expect("stitcher")
        .stitch(&plan, &chunks_dir)
        .expect("stitch");

    let source_digests = stream_digests(path).expect("source digests");
    let rejoined_digests = stream_digests(&rejoined).expect("rejoined digests");

    assert_eq!(source_digests.len(), rejoined_digests.len());
    for (source, output) in source_digests.iter().zip(&rejoined_digests) {
        assert_eq!(source.media_type, output.media_type);
        assert_eq!(
            source.packets, output.packets,
            "stream {} packet count changed",
            source.stream_index,
        );
        assert_eq!(
            source.digest, output.digest,
            "stream {} payload bytes changed",
            source.stream_index,
        );
    }
}

#[test]
fn stitched_duration_matches_the_source() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let plan = plan_fixture(path);
    let scratch = tempfile::tempdir().expect("tempdir");
    let chunks_dir = scratch.path().join("chunks");
    let rejoined = scratch.path().join("rejoined.mp4");

    Splitter::new(path)
        .expect("splitter")
        .split_all(&plan, &chunks_dir)
        .expect("split_all");
    Stitcher::new(&rejoined)
        .expect("stitcher")
        .stitch(&plan, &chunks_dir)
        .expect("stitch");

    let source = PacketProbe::scan(path).expect("source probe");
    let output = PacketProbe::scan(&rejoined).expect("rejoined probe");

    // Allow one frame of slack at a generous 24 fps.
    assert!(
        (source.duration - output.duration).abs() <= 1.0 / 24.0 + 1e-3,
        "duration drifted: {:.3}s -> {:.3}s",
        source.duration,
        output.duration,
    );
}

#[test]
fn stitch_reports_missing_chunks() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let plan = plan_fixture(path);
    if plan.len() < 2 {
        return;
    }

    let scratch = tempfile::tempdir().expect("tempdir");
    let chunks_dir = scratch.path().join("chunks");
    let written = Splitter::new(path)
        .expect("splitter")
        .split_all(&plan, &chunks_dir)
        .expect("split_all");

    // Remove the last chunk file and expect the stitcher to notice.
    std::fs::remove_file(written.last().expect("written files")).expect("remove");

    let result = Stitcher::new(scratch.path().join("rejoined.mp4"))
        .expect("stitcher")
        .stitch(&plan, &chunks_dir);

    assert!(matches!(result, Err(ChunkmuxError::MissingChunk { .. })));
}

#[cfg(feature = "rayon")]
#[test]
fn parallel_split_matches_sequential_split() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let plan = plan_fixture(path);
    let scratch = tempfile::tempdir().expect("tempdir");
    let sequential_dir = scratch.path().join("sequential");
    let parallel_dir = scratch.path().join("parallel");

    let splitter = Splitter::new(path).expect("splitter");
    let sequential = splitter
        .split_all(&plan, &sequential_dir)
        .expect("sequential split");
    let parallel = splitter
        .split_all_parallel(&plan, &parallel_dir)
        .expect("parallel split");

    assert_eq!(sequential.len(), parallel.len());
    for (a, b) in sequential.iter().zip(&parallel) {
        let left = stream_digests(a).expect("sequential digests");
        let right = stream_digests(b).expect("parallel digests");
        assert_eq!(left.len(), right.len());
        for (x, y) in left.iter().zip(&right) {
            assert_eq!(x.digest, y.digest);
        }
    }
}
