//! Internal timestamp arithmetic.
//!
//! Helpers for converting between integer stream timestamps, seconds, and
//! FFmpeg's microsecond seek scale. Shared by the probe, splitter, and
//! stitcher so the fallback chains behave identically across stages.

use ffmpeg_next::{Packet, Rational};

/// One second in FFmpeg's default time base (`AV_TIME_BASE`).
pub(crate) const AV_TIME_BASE: f64 = 1_000_000.0;

/// Convert an integer timestamp in the given time base to seconds.
pub(crate) fn ts_to_seconds(ts: i64, time_base: Rational) -> f64 {
    ts as f64 * time_base.numerator() as f64 / time_base.denominator().max(1) as f64
}

/// Best-effort presentation time of a packet, in seconds.
///
/// Falls back from PTS to DTS to the supplied last-known timestamp, so a
/// packet without any timestamp inherits its predecessor's position.
pub(crate) fn packet_time(packet: &Packet, time_base: Rational, fallback: f64) -> f64 {
    if let Some(pts) = packet.pts() {
        return ts_to_seconds(pts, time_base);
    }
    if let Some(dts) = packet.dts() {
        return ts_to_seconds(dts, time_base);
    }
    fallback
}

/// End time of a packet, in seconds.
///
/// When the demuxer reports a packet duration the end is `start + duration`;
/// otherwise the packet is treated as instantaneous.
pub(crate) fn packet_end_time(packet: &Packet, time_base: Rational, start: f64) -> f64 {
    let duration = packet.duration();
    if duration > 0 {
        start + ts_to_seconds(duration, time_base)
    } else {
        start
    }
}

/// Convert seconds to FFmpeg's microsecond seek scale.
pub(crate) fn seconds_to_avtime(seconds: f64) -> i64 {
    (seconds * AV_TIME_BASE) as i64
}
