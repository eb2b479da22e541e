//! Packet-level video probing.
//!
//! [`PacketProbe`] scans every packet of a file's best video stream without
//! decoding and returns a [`ProbeResult`]: one [`FrameRecord`] per video
//! packet (timestamp, keyframe flag, compressed size) plus a trustworthy
//! total duration. The scan never touches a codec, so it is fast, and the
//! result is an owned value, fully independent of any file handle.
//!
//! The probe is the input to the chunk planner: cut points are chosen from
//! the keyframe timestamps it records.
//!
//! # Example
//!
//! ```no_run
//! use chunkmux::{ChunkmuxError, PacketProbe};
//!
//! let probe = PacketProbe::scan("input.mp4")?;
//! println!(
//!     "{} video packets, {} keyframes, {:.2}s",
//!     probe.frames.len(),
//!     probe.keyframe_times().len(),
//!     probe.duration,
//! );
//! # Ok::<(), ChunkmuxError>(())
//! ```

use std::path::Path;

use ffmpeg_next::{media::Type, Error as FfmpegError, Packet};

use crate::conversion;
use crate::error::ChunkmuxError;

/// Metadata for a single video packet, recorded during the probe scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRecord {
    /// Best-effort presentation timestamp in seconds.
    ///
    /// Resolved as PTS when present, else DTS, else the last known
    /// timestamp of the stream.
    pub pts_time: f64,
    /// Whether the demuxer flagged this packet as a random-access point.
    pub is_keyframe: bool,
    /// Compressed payload size in bytes. Used downstream as a cheap
    /// complexity proxy.
    pub packet_size: usize,
}

/// The result of a packet-level probe: per-frame metadata in container
/// order, plus the asset duration in seconds.
#[derive(Debug, Clone, Default)]
pub struct ProbeResult {
    /// One record per video packet, in the order the demuxer emitted them.
    pub frames: Vec<FrameRecord>,
    /// Total duration in seconds.
    ///
    /// The maximum of the largest observed packet end time, the video
    /// stream's declared duration, and the container's declared duration.
    pub duration: f64,
}

impl ProbeResult {
    /// Returns `true` if the scan recorded no video packets.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Returns `true` if at least one packet carries the keyframe flag.
    pub fn has_keyframes(&self) -> bool {
        self.frames.iter().any(|frame| frame.is_keyframe)
    }

    /// Timestamps (seconds) of all keyframe-flagged packets, in stream order.
    pub fn keyframe_times(&self) -> Vec<f64> {
        self.frames
            .iter()
            .filter(|frame| frame.is_keyframe)
            .map(|frame| frame.pts_time)
            .collect()
    }
}

/// Packet-only video stream scanner.
///
/// Opens the file, walks every packet of the best video stream, and closes
/// the demuxer before returning. No decoder is ever created.
pub struct PacketProbe;

impl PacketProbe {
    /// Probe a media file and return its per-frame metadata and duration.
    ///
    /// Packets belonging to streams other than the best video stream are
    /// skipped. Any demuxer error aborts the scan; partial results are
    /// discarded.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkmuxError::FileOpen`] if the file cannot be opened or
    /// recognised, [`ChunkmuxError::NoVideoStream`] if it has no video
    /// stream, or [`ChunkmuxError::Ffmpeg`] if the packet walk fails.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use chunkmux::{ChunkmuxError, PacketProbe};
    ///
    /// let probe = PacketProbe::scan("input.mkv")?;
    /// assert!(probe.duration > 0.0);
    /// # Ok::<(), ChunkmuxError>(())
    /// ```
    pub fn scan<P: AsRef<Path>>(path: P) -> Result<ProbeResult, ChunkmuxError> {
        let path = path.as_ref();
        log::debug!("Probing video packets: {}", path.display());

        ffmpeg_next::init().map_err(|error| ChunkmuxError::FileOpen {
            path: path.to_path_buf(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let mut input =
            ffmpeg_next::format::input(&path).map_err(|error| ChunkmuxError::FileOpen {
                path: path.to_path_buf(),
                reason: error.to_string(),
            })?;

        let video_stream = input
            .streams()
            .best(Type::Video)
            .ok_or(ChunkmuxError::NoVideoStream)?;
        let video_stream_index = video_stream.index();
        let time_base = video_stream.time_base();
        let declared_stream_duration = video_stream.duration();

        let mut frames: Vec<FrameRecord> = Vec::with_capacity(2048);
        let mut best_end = 0.0_f64;

        let mut packet = Packet::empty();
        loop {
            match packet.read(&mut input) {
                Ok(()) => {
                    if packet.stream() != video_stream_index {
                        continue;
                    }

                    let pts_time = conversion::packet_time(&packet, time_base, best_end);
                    let end = conversion::packet_end_time(&packet, time_base, pts_time);

                    frames.push(FrameRecord {
                        pts_time,
                        is_keyframe: packet.is_key(),
                        packet_size: packet.size(),
                    });

                    if end > best_end {
                        best_end = end;
                    }
                }
                Err(FfmpegError::Eof) => break,
                Err(error) => return Err(ChunkmuxError::from(error)),
            }
        }

        // The observed packet tail can undershoot when the last packets carry
        // no duration; trust whichever of the three sources reaches furthest.
        let mut duration = best_end;
        if declared_stream_duration > 0 {
            duration = duration.max(conversion::ts_to_seconds(
                declared_stream_duration,
                time_base,
            ));
        }
        let container_duration = input.duration();
        if container_duration > 0 {
            duration = duration.max(container_duration as f64 / conversion::AV_TIME_BASE);
        }

        log::info!(
            "Probed {}: {} video packets, duration {:.3}s",
            path.display(),
            frames.len(),
            duration,
        );

        Ok(ProbeResult { frames, duration })
    }
}
