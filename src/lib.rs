//! # chunkmux
//!
//! Keyframe-aligned, lossless video segmentation and bit-faithful
//! reassembly, powered by FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! `chunkmux` targets parallel-transcode and VOD-ingest pipelines that need
//! fast, deterministic cut planning without decoding video, followed by
//! stream-copy remuxing that preserves the original coded frames and
//! timestamps. Everything happens in the packet domain: no decoder is ever
//! opened.
//!
//! The pipeline has four stages:
//!
//! 1. [`PacketProbe`] scans the best video stream's packets and records
//!    timestamps, keyframe flags, and packet sizes.
//! 2. [`ChunkPlanner`] selects keyframe-aligned cut points under
//!    target/min/max duration constraints, optionally biased by
//!    packet-size scene detection and complexity weighting.
//! 3. [`Splitter`] materialises each planned chunk as an independent
//!    container by seek-and-copy, without re-encoding.
//! 4. [`Stitcher`] concatenates the chunk files back into a single
//!    container with one monotonic timeline per stream.
//!
//! ## Quick Start
//!
//! ```no_run
//! use chunkmux::{
//!     ChunkmuxError, ChunkPlanner, PacketProbe, PlanConfig, Splitter, Stitcher,
//! };
//!
//! // Scan packets and plan ~30-second keyframe-aligned chunks.
//! let probe = PacketProbe::scan("input.mp4")?;
//! let plan = ChunkPlanner::new(PlanConfig::new().with_target_duration(30.0)).plan(&probe)?;
//!
//! // Materialise the chunks, then rebuild the asset.
//! Splitter::new("input.mp4")?.split_all(&plan, "chunks")?;
//! Stitcher::new("rejoined.mp4")?.stitch(&plan, "chunks")?;
//! # Ok::<(), ChunkmuxError>(())
//! ```
//!
//! ## Content-aware planning
//!
//! ```no_run
//! use chunkmux::{ChunkmuxError, ChunkPlanner, PacketProbe, PlanConfig};
//!
//! let probe = PacketProbe::scan("input.mp4")?;
//! let config = PlanConfig::new()
//!     .with_ideal_parallel(8)
//!     .with_scene_detection(true)
//!     .with_complexity_adapt(true);
//! let plan = ChunkPlanner::new(config).plan(&probe)?;
//! # let _ = plan;
//! # Ok::<(), ChunkmuxError>(())
//! ```
//!
//! ## Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `rayon` | [`Splitter::split_all_parallel`] materialises chunks across a thread pool |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system; the crate
//! links against them through `ffmpeg-next`.

pub mod analysis;
mod conversion;
pub mod error;
pub mod output;
pub mod planner;
pub mod probe;
pub mod splitter;
pub mod stitcher;
pub mod verify;

pub use analysis::FrameAnalysis;
pub use error::ChunkmuxError;
pub use output::{ContainerFormat, OutputOptions};
pub use planner::{Chunk, ChunkPlan, ChunkPlanner, PlanConfig};
pub use probe::{FrameRecord, PacketProbe, ProbeResult};
pub use splitter::Splitter;
pub use stitcher::Stitcher;
pub use verify::StreamDigest;
