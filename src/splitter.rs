//! Chunk materialisation by stream copy.
//!
//! [`Splitter`] turns the entries of a [`ChunkPlan`](crate::ChunkPlan) into
//! independent container files without re-encoding: for each chunk it opens
//! the source fresh, seeks backward to a keyframe at or before the chunk
//! start, and copies packets through until every stream has passed the
//! chunk boundary. Coded sample data and source timestamps are preserved
//! byte for byte; chunks are *not* rebased to start at zero, which is what
//! allows the stitcher to reassemble a timeline identical to the source.
//!
//! # Example
//!
//! ```no_run
//! use chunkmux::{ChunkmuxError, ChunkPlanner, PacketProbe, PlanConfig, Splitter};
//!
//! let probe = PacketProbe::scan("input.mp4")?;
//! let plan = ChunkPlanner::new(PlanConfig::new()).plan(&probe)?;
//! let written = Splitter::new("input.mp4")?.split_all(&plan, "chunks")?;
//! println!("{} chunk files", written.len());
//! # Ok::<(), ChunkmuxError>(())
//! ```

use std::path::{Path, PathBuf};

use ffmpeg_next::{codec::Id, media::Type, Error as FfmpegError, Packet, Rational};

#[cfg(feature = "rayon")]
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::conversion;
use crate::error::ChunkmuxError;
use crate::output::{chunk_file_name, OutputOptions};
use crate::planner::{Chunk, ChunkPlan};

/// Timestamp comparison tolerance, in seconds.
const TOL: f64 = 1e-6;

/// Per-stream copy state for one chunk extraction.
struct StreamLane {
    /// Output stream position for this input stream.
    out_index: usize,
    /// The input stream's time base.
    time_base: Rational,
    /// Whether this is a video stream (video gets keyframe-aware
    /// end-of-range handling).
    is_video: bool,
    /// Set once every packet of this stream has passed the chunk boundary.
    done: bool,
}

/// Stream-copy chunk extractor.
///
/// Each call to [`split_chunk`](Splitter::split_chunk) opens its own source
/// handle, so independent chunks can be materialised concurrently; see
/// [`split_all_parallel`](Splitter::split_all_parallel) (requires the
/// `rayon` feature).
pub struct Splitter {
    source: PathBuf,
    options: OutputOptions,
}

impl Splitter {
    /// Create a splitter for the given source file.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkmuxError::FileOpen`] if the source does not exist or
    /// FFmpeg cannot be initialised.
    pub fn new<P: AsRef<Path>>(source: P) -> Result<Self, ChunkmuxError> {
        let source = source.as_ref().to_path_buf();

        ffmpeg_next::init().map_err(|error| ChunkmuxError::FileOpen {
            path: source.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        if !source.exists() {
            return Err(ChunkmuxError::FileOpen {
                path: source,
                reason: "File does not exist".to_string(),
            });
        }

        Ok(Self {
            source,
            options: OutputOptions::new(),
        })
    }

    /// Set the output options (container format, fragmentation).
    #[must_use]
    pub fn with_options(mut self, options: OutputOptions) -> Self {
        self.options = options;
        self
    }

    /// Materialise a single chunk as an independent container file.
    ///
    /// Seeks the source backward to a keyframe at or before `chunk.start`,
    /// then copies packets: video packets with timestamps in
    /// `[start, end)` are kept and the video stream finishes at the first
    /// keyframe at or past `end`; other streams are cut at the boundary.
    /// Timestamps are carried over unchanged.
    ///
    /// The interval is treated as half-open at `end`. When materialising a
    /// whole plan, use [`split_all`](Splitter::split_all), which instead
    /// closes the plan's final chunk at the asset end (copies to EOF).
    ///
    /// # Errors
    ///
    /// Returns [`ChunkmuxError::InvalidInput`] for an inverted chunk
    /// interval, and [`ChunkmuxError::FileOpen`] /
    /// [`ChunkmuxError::Seek`] / [`ChunkmuxError::StreamSetup`] /
    /// [`ChunkmuxError::Write`] for provider failures.
    pub fn split_chunk<P: AsRef<Path>>(
        &self,
        chunk: &Chunk,
        output_path: P,
    ) -> Result<(), ChunkmuxError> {
        self.copy_chunk(chunk, output_path.as_ref(), false)
    }

    /// Copy one chunk's packet range into `output_path`.
    ///
    /// `closed_end` marks the plan's final chunk: its range is closed at
    /// the asset end, so it owns everything from its start to EOF instead
    /// of stopping at the boundary.
    fn copy_chunk(
        &self,
        chunk: &Chunk,
        output_path: &Path,
        closed_end: bool,
    ) -> Result<(), ChunkmuxError> {
        if chunk.end <= chunk.start {
            return Err(ChunkmuxError::InvalidInput(format!(
                "chunk {} has an empty interval ({:.3} -> {:.3})",
                chunk.index, chunk.start, chunk.end
            )));
        }

        log::debug!(
            "Splitting chunk {} ({:.3}s -> {:.3}s) to {}",
            chunk.index,
            chunk.start,
            chunk.end,
            output_path.display(),
        );

        let format = self.options.resolve_format(&self.source);

        let mut input =
            ffmpeg_next::format::input(&self.source).map_err(|error| ChunkmuxError::FileOpen {
                path: self.source.clone(),
                reason: error.to_string(),
            })?;

        let mut output = ffmpeg_next::format::output_as(&output_path, format.muxer_name())
            .map_err(|error| ChunkmuxError::FileOpen {
                path: output_path.to_path_buf(),
                reason: format!("Failed to create output: {error}"),
            })?;

        // Mirror every non-attachment input stream onto the output,
        // preserving codec parameters and the input time base.
        let mut lanes: Vec<Option<StreamLane>> = Vec::new();
        for stream in input.streams() {
            let medium = stream.parameters().medium();
            if medium == Type::Attachment {
                lanes.push(None);
                continue;
            }

            let mut out_stream = output
                .add_stream(ffmpeg_next::encoder::find(Id::None))
                .map_err(|error| {
                    ChunkmuxError::StreamSetup(format!(
                        "failed to create output stream for input stream {}: {error}",
                        stream.index()
                    ))
                })?;
            out_stream.set_parameters(stream.parameters());
            // Let the muxer pick a tag appropriate for the container.
            unsafe {
                (*out_stream.parameters().as_mut_ptr()).codec_tag = 0;
            }
            out_stream.set_time_base(stream.time_base());

            lanes.push(Some(StreamLane {
                out_index: out_stream.index(),
                time_base: stream.time_base(),
                is_video: medium == Type::Video,
                done: false,
            }));
        }

        if lanes.iter().all(Option::is_none) {
            return Err(ChunkmuxError::StreamSetup(
                "source has no copyable streams".to_string(),
            ));
        }

        output
            .write_header_with(self.options.chunk_muxer_options(format))
            .map_err(|error| ChunkmuxError::Write(format!("container header: {error}")))?;

        // The muxer may adjust stream time bases while writing the header;
        // rescale against what it actually chose.
        let out_time_bases: Vec<Rational> = output.streams().map(|s| s.time_base()).collect();

        let seek_target = conversion::seconds_to_avtime(chunk.start);
        input
            .seek(seek_target, ..seek_target)
            .map_err(|error| ChunkmuxError::Seek {
                path: self.source.clone(),
                position: chunk.start,
                reason: error.to_string(),
            })?;

        let mut remaining = lanes.iter().flatten().count();
        let mut last_ts = chunk.start;
        let mut packet = Packet::empty();

        while remaining > 0 {
            match packet.read(&mut input) {
                Ok(()) => {}
                Err(FfmpegError::Eof) => break,
                Err(error) => return Err(ChunkmuxError::from(error)),
            }

            let stream_index = packet.stream();
            let Some(lane) = lanes.get_mut(stream_index).and_then(Option::as_mut) else {
                continue;
            };
            if lane.done {
                continue;
            }

            let ts = conversion::packet_time(&packet, lane.time_base, last_ts);

            // Lead-in from the backward seek. The first chunk keeps
            // everything from the head of the file, so leading negative
            // timestamps (encoder priming) survive the round trip.
            if chunk.start > 0.0 && ts + TOL < chunk.start {
                continue;
            }

            if !closed_end {
                if lane.is_video {
                    // The video range is half-open at the boundary, and the
                    // stream runs until the first keyframe at or past it, so
                    // trailing reordered frames of the last GOP still make
                    // it in.
                    if ts + TOL >= chunk.end {
                        if packet.is_key() {
                            lane.done = true;
                            remaining -= 1;
                        }
                        continue;
                    }
                } else if ts + TOL >= chunk.end {
                    lane.done = true;
                    remaining -= 1;
                    continue;
                }
            }

            last_ts = ts;

            packet.rescale_ts(lane.time_base, out_time_bases[lane.out_index]);
            packet.set_stream(lane.out_index);
            packet.set_position(-1);
            packet
                .write_interleaved(&mut output)
                .map_err(|error| ChunkmuxError::Write(format!("packet write: {error}")))?;
        }

        output
            .write_trailer()
            .map_err(|error| ChunkmuxError::Write(format!("container trailer: {error}")))?;

        Ok(())
    }

    /// Materialise every chunk of a plan into `out_dir`, in index order.
    ///
    /// The directory is created if absent. Files are named
    /// `chunk_NNNN.EXT` after the chunk index and the resolved container
    /// format. The plan's final chunk is closed at the asset end (it copies
    /// to EOF). The first failing chunk aborts the batch.
    ///
    /// Returns the written file paths in plan order.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkmuxError::InvalidInput`] for an empty plan, plus
    /// everything [`split_chunk`](Splitter::split_chunk) can return.
    pub fn split_all<P: AsRef<Path>>(
        &self,
        plan: &ChunkPlan,
        out_dir: P,
    ) -> Result<Vec<PathBuf>, ChunkmuxError> {
        let out_dir = out_dir.as_ref();
        let paths = self.prepare_batch(plan, out_dir)?;
        let last = plan.len() - 1;

        for (position, (chunk, path)) in plan.chunks.iter().zip(&paths).enumerate() {
            log::info!(
                "[split] {} ({:.3} -> {:.3})",
                path.display(),
                chunk.start,
                chunk.end,
            );
            self.copy_chunk(chunk, path, position == last)?;
        }

        Ok(paths)
    }

    /// Materialise every chunk of a plan concurrently.
    ///
    /// Each worker opens its own source handle and writes a distinct output
    /// file, so chunks share no mutable state; the thread pool never uses
    /// more workers than there are chunks. Output paths are returned in
    /// plan order regardless of completion order, and the first error (in
    /// plan order) wins.
    ///
    /// Available with the `rayon` feature.
    ///
    /// # Errors
    ///
    /// Same as [`split_all`](Splitter::split_all).
    #[cfg(feature = "rayon")]
    pub fn split_all_parallel<P: AsRef<Path>>(
        &self,
        plan: &ChunkPlan,
        out_dir: P,
    ) -> Result<Vec<PathBuf>, ChunkmuxError> {
        let out_dir = out_dir.as_ref();
        let paths = self.prepare_batch(plan, out_dir)?;
        let last = plan.len() - 1;

        let jobs: Vec<(usize, &Chunk, &PathBuf)> = plan
            .chunks
            .iter()
            .zip(&paths)
            .enumerate()
            .map(|(position, (chunk, path))| (position, chunk, path))
            .collect();
        let results: Vec<Result<(), ChunkmuxError>> = jobs
            .par_iter()
            .map(|(position, chunk, path)| {
                log::info!(
                    "[split] {} ({:.3} -> {:.3})",
                    path.display(),
                    chunk.start,
                    chunk.end,
                );
                self.copy_chunk(chunk, path, *position == last)
            })
            .collect();

        for result in results {
            result?;
        }

        Ok(paths)
    }

    /// Validate the plan, create the output directory, and compute the
    /// per-chunk output paths.
    fn prepare_batch(
        &self,
        plan: &ChunkPlan,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, ChunkmuxError> {
        if plan.is_empty() {
            return Err(ChunkmuxError::InvalidInput(
                "chunk plan is empty".to_string(),
            ));
        }

        std::fs::create_dir_all(out_dir)?;

        let format = self.options.resolve_format(&self.source);
        Ok(plan
            .chunks
            .iter()
            .map(|chunk| out_dir.join(chunk_file_name(chunk.index, format)))
            .collect())
    }
}
