//! Chunk concatenation by stream copy.
//!
//! [`Stitcher`] reassembles the files produced by the
//! [`Splitter`](crate::Splitter) into a single container whose per-stream
//! timelines are monotonic and gap-free. The first chunk's packets pass
//! through with their original timestamps; every later chunk is rebased by
//! its first observed timestamp plus an accumulated per-stream offset, so
//! the output timeline continues exactly where the previous chunk left off.
//! Packet payloads are copied untouched.
//!
//! Chunks must be consumed in plan order, and every chunk must present the
//! same stream layout (count and time bases) as the first one.
//!
//! # Example
//!
//! ```no_run
//! use chunkmux::{ChunkmuxError, ChunkPlanner, PacketProbe, PlanConfig, Stitcher};
//!
//! let probe = PacketProbe::scan("input.mp4")?;
//! let plan = ChunkPlanner::new(PlanConfig::new()).plan(&probe)?;
//! Stitcher::new("rejoined.mp4")?.stitch(&plan, "chunks")?;
//! # Ok::<(), ChunkmuxError>(())
//! ```

use std::path::{Path, PathBuf};

use ffmpeg_next::{codec::Id, media::Type, Error as FfmpegError, Packet, Rational, Rescale};

use crate::error::ChunkmuxError;
use crate::output::{chunk_file_name, OutputOptions};
use crate::planner::ChunkPlan;

/// Timeline state for one output stream, kept across chunks.
struct OutputLane {
    /// Position of the stream in the output container.
    out_index: usize,
    /// Shared time base; every chunk must agree on it.
    time_base: Rational,
    /// Media type, for diagnostics.
    media_type: Type,
    /// Accumulated timestamp offset for the next chunk, in `time_base`
    /// units.
    offset: i64,
    /// Last written PTS, in `time_base` units.
    last_pts: Option<i64>,
    /// Last written DTS, in `time_base` units.
    last_dts: Option<i64>,
}

/// Per-input-stream info collected when a chunk is opened.
struct ChunkStream {
    /// Lane position, or `None` for skipped (attachment) streams.
    lane: Option<usize>,
    /// The stream's declared average frame rate, for offset advancement.
    avg_frame_rate: Rational,
}

/// Concatenating stream-copy remuxer.
pub struct Stitcher {
    output_path: PathBuf,
    options: OutputOptions,
}

impl Stitcher {
    /// Create a stitcher writing to the given output path.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkmuxError::FileOpen`] if FFmpeg cannot be initialised.
    pub fn new<P: AsRef<Path>>(output_path: P) -> Result<Self, ChunkmuxError> {
        let output_path = output_path.as_ref().to_path_buf();

        ffmpeg_next::init().map_err(|error| ChunkmuxError::FileOpen {
            path: output_path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        Ok(Self {
            output_path,
            options: OutputOptions::new(),
        })
    }

    /// Set the output options (container format, fragmentation, faststart).
    #[must_use]
    pub fn with_options(mut self, options: OutputOptions) -> Self {
        self.options = options;
        self
    }

    /// Concatenate the plan's chunk files from `chunks_dir` into the output.
    ///
    /// Chunk paths are resolved as `chunks_dir/chunk_NNNN.EXT` and
    /// canonicalised before opening. Negative DTS values from the chunks
    /// are preserved in the output.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkmuxError::InvalidInput`] for an empty plan,
    /// [`ChunkmuxError::MissingChunk`] when a chunk file is absent,
    /// [`ChunkmuxError::LayoutMismatch`] when a chunk disagrees with the
    /// established stream layout, and [`ChunkmuxError::FileOpen`] /
    /// [`ChunkmuxError::StreamSetup`] / [`ChunkmuxError::Write`] for
    /// provider failures.
    pub fn stitch<P: AsRef<Path>>(
        &self,
        plan: &ChunkPlan,
        chunks_dir: P,
    ) -> Result<(), ChunkmuxError> {
        if plan.is_empty() {
            return Err(ChunkmuxError::InvalidInput(
                "chunk plan is empty".to_string(),
            ));
        }

        let chunks_dir = chunks_dir.as_ref();
        let format = self.options.resolve_format(&self.output_path);

        let mut output = ffmpeg_next::format::output_as(&self.output_path, format.muxer_name())
            .map_err(|error| ChunkmuxError::FileOpen {
                path: self.output_path.clone(),
                reason: format!("Failed to create output: {error}"),
            })?;

        let mut lanes: Vec<OutputLane> = Vec::new();
        let mut out_time_bases: Vec<Rational> = Vec::new();

        for (position, chunk) in plan.chunks.iter().enumerate() {
            let nominal = chunks_dir.join(chunk_file_name(chunk.index, format));
            let chunk_path = nominal
                .canonicalize()
                .map_err(|_| ChunkmuxError::MissingChunk {
                    path: nominal.clone(),
                })?;

            log::debug!(
                "Stitching chunk {} from {}",
                chunk.index,
                chunk_path.display(),
            );

            let mut input =
                ffmpeg_next::format::input(&chunk_path).map_err(|error| {
                    ChunkmuxError::FileOpen {
                        path: chunk_path.clone(),
                        reason: error.to_string(),
                    }
                })?;

            let streams = if position == 0 {
                let streams = self.create_output_streams(&input, &mut output, &mut lanes)?;
                output
                    .write_header_with(self.options.stitch_muxer_options(format))
                    .map_err(|error| ChunkmuxError::Write(format!("container header: {error}")))?;
                out_time_bases = output.streams().map(|s| s.time_base()).collect();
                streams
            } else {
                map_chunk_streams(&input, &lanes, &chunk_path)?
            };

            let tails = self.copy_chunk_packets(
                &mut input,
                &mut output,
                &streams,
                &mut lanes,
                &out_time_bases,
                position == 0,
            )?;

            advance_offsets(&streams, &tails, &mut lanes);
        }

        for lane in &lanes {
            log::debug!(
                "Stream {} ({:?}): last pts {:?}, last dts {:?} (time base {}/{})",
                lane.out_index,
                lane.media_type,
                lane.last_pts,
                lane.last_dts,
                lane.time_base.numerator(),
                lane.time_base.denominator(),
            );
        }

        output
            .write_trailer()
            .map_err(|error| ChunkmuxError::Write(format!("container trailer: {error}")))?;

        log::info!(
            "Stitched {} chunks into {}",
            plan.chunks.len(),
            self.output_path.display(),
        );

        Ok(())
    }

    /// Mirror the first chunk's non-attachment streams onto the output and
    /// initialise the per-stream timeline state.
    fn create_output_streams(
        &self,
        input: &ffmpeg_next::format::context::Input,
        output: &mut ffmpeg_next::format::context::Output,
        lanes: &mut Vec<OutputLane>,
    ) -> Result<Vec<ChunkStream>, ChunkmuxError> {
        let mut streams = Vec::new();

        for stream in input.streams() {
            let medium = stream.parameters().medium();
            if medium == Type::Attachment {
                streams.push(ChunkStream {
                    lane: None,
                    avg_frame_rate: stream.avg_frame_rate(),
                });
                continue;
            }

            let mut out_stream = output
                .add_stream(ffmpeg_next::encoder::find(Id::None))
                .map_err(|error| {
                    ChunkmuxError::StreamSetup(format!(
                        "failed to create output stream for chunk stream {}: {error}",
                        stream.index()
                    ))
                })?;
            out_stream.set_parameters(stream.parameters());
            unsafe {
                (*out_stream.parameters().as_mut_ptr()).codec_tag = 0;
            }
            out_stream.set_time_base(stream.time_base());
            out_stream.set_metadata(stream.metadata().to_owned());

            // Frame rate and aspect ratio live on the stream itself and have
            // no safe setters.
            unsafe {
                let ist = stream.as_ptr();
                let ost = out_stream.as_mut_ptr();
                (*ost).avg_frame_rate = (*ist).avg_frame_rate;
                (*ost).r_frame_rate = (*ist).r_frame_rate;
                (*ost).sample_aspect_ratio = (*ist).sample_aspect_ratio;
            }

            log::debug!(
                "Output stream {}: {:?}, time base {}/{}",
                out_stream.index(),
                medium,
                stream.time_base().numerator(),
                stream.time_base().denominator(),
            );

            streams.push(ChunkStream {
                lane: Some(lanes.len()),
                avg_frame_rate: stream.avg_frame_rate(),
            });
            lanes.push(OutputLane {
                out_index: out_stream.index(),
                time_base: stream.time_base(),
                media_type: medium,
                offset: 0,
                last_pts: None,
                last_dts: None,
            });
        }

        if lanes.is_empty() {
            return Err(ChunkmuxError::StreamSetup(
                "first chunk has no copyable streams".to_string(),
            ));
        }

        Ok(streams)
    }

    /// Copy one chunk's packets into the output, rebasing timestamps for
    /// every chunk after the first.
    ///
    /// Returns the highest `(pts, dts)` written per lane for this chunk, in
    /// the input time base; the caller uses them to advance the offsets.
    fn copy_chunk_packets(
        &self,
        input: &mut ffmpeg_next::format::context::Input,
        output: &mut ffmpeg_next::format::context::Output,
        streams: &[ChunkStream],
        lanes: &mut [OutputLane],
        out_time_bases: &[Rational],
        first_chunk: bool,
    ) -> Result<Vec<(Option<i64>, Option<i64>)>, ChunkmuxError> {
        // Rebase anchor per input stream: the first timestamp seen in this
        // chunk.
        let mut bases: Vec<Option<i64>> = vec![None; streams.len()];
        let mut tails: Vec<(Option<i64>, Option<i64>)> = vec![(None, None); lanes.len()];

        let mut packet = Packet::empty();
        loop {
            match packet.read(input) {
                Ok(()) => {}
                Err(FfmpegError::Eof) => break,
                Err(error) => return Err(ChunkmuxError::from(error)),
            }

            let stream_index = packet.stream();
            let Some(lane_index) = streams.get(stream_index).and_then(|s| s.lane) else {
                continue;
            };
            let lane = &mut lanes[lane_index];

            let mut pts = packet.pts();
            let mut dts = packet.dts();

            if !first_chunk {
                let base = *bases[stream_index]
                    .get_or_insert_with(|| pts.or(dts).unwrap_or(0));
                pts = pts.map(|value| value - base + lane.offset);
                dts = dts.map(|value| value - base + lane.offset);

                // A one-sided timestamp inherits the other; decode order
                // must never run ahead of presentation.
                if pts.is_none() {
                    pts = dts;
                }
                if dts.is_none() {
                    dts = pts;
                }
                if let (Some(p), Some(d)) = (pts, dts) {
                    if d > p {
                        pts = Some(d);
                    }
                }

                packet.set_pts(pts);
                packet.set_dts(dts);
            }

            let tail = &mut tails[lane_index];
            if let Some(value) = pts {
                tail.0 = Some(tail.0.map_or(value, |max| max.max(value)));
                lane.last_pts = Some(value);
            }
            if let Some(value) = dts {
                tail.1 = Some(tail.1.map_or(value, |max| max.max(value)));
                lane.last_dts = Some(value);
            }

            packet.rescale_ts(lane.time_base, out_time_bases[lane.out_index]);
            packet.set_stream(lane.out_index);
            packet.set_position(-1);
            packet
                .write_interleaved(output)
                .map_err(|error| ChunkmuxError::Write(format!("packet write: {error}")))?;
        }

        Ok(tails)
    }
}

/// Check a later chunk against the established layout and build its
/// stream mapping.
fn map_chunk_streams(
    input: &ffmpeg_next::format::context::Input,
    lanes: &[OutputLane],
    chunk_path: &Path,
) -> Result<Vec<ChunkStream>, ChunkmuxError> {
    let mut streams = Vec::new();
    let mut mapped = 0usize;

    for stream in input.streams() {
        if stream.parameters().medium() == Type::Attachment {
            streams.push(ChunkStream {
                lane: None,
                avg_frame_rate: stream.avg_frame_rate(),
            });
            continue;
        }

        let Some(lane) = lanes.get(mapped) else {
            return Err(ChunkmuxError::LayoutMismatch {
                path: chunk_path.to_path_buf(),
                reason: format!("more than {} media streams", lanes.len()),
            });
        };

        if stream.time_base() != lane.time_base {
            return Err(ChunkmuxError::LayoutMismatch {
                path: chunk_path.to_path_buf(),
                reason: format!(
                    "stream {} ({:?}) time base {}/{} differs from {}/{}",
                    mapped,
                    lane.media_type,
                    stream.time_base().numerator(),
                    stream.time_base().denominator(),
                    lane.time_base.numerator(),
                    lane.time_base.denominator(),
                ),
            });
        }

        streams.push(ChunkStream {
            lane: Some(mapped),
            avg_frame_rate: stream.avg_frame_rate(),
        });
        mapped += 1;
    }

    if mapped != lanes.len() {
        return Err(ChunkmuxError::LayoutMismatch {
            path: chunk_path.to_path_buf(),
            reason: format!("{} media streams, expected {}", mapped, lanes.len()),
        });
    }

    Ok(streams)
}

/// Advance each lane's offset past the chunk that was just written.
///
/// The next chunk starts one nominal frame after the highest timestamp
/// written for the stream in this chunk; streams without a usable frame
/// rate advance by a single tick.
fn advance_offsets(
    streams: &[ChunkStream],
    tails: &[(Option<i64>, Option<i64>)],
    lanes: &mut [OutputLane],
) {
    for chunk_stream in streams {
        let Some(lane_index) = chunk_stream.lane else {
            continue;
        };
        let lane = &mut lanes[lane_index];

        let (max_pts, max_dts) = tails[lane_index];
        let tail = max_pts.or(max_dts);

        if let Some(tail) = tail {
            let one_frame = if chunk_stream.avg_frame_rate.numerator() > 0 {
                1i64.rescale(chunk_stream.avg_frame_rate.invert(), lane.time_base)
            } else {
                1
            };
            lane.offset = tail + one_frame;
        }
    }
}
