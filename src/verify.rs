//! Round-trip verification via per-stream packet digests.
//!
//! A split-then-stitch cycle is supposed to reproduce the source's coded
//! packets exactly. [`stream_digests`] makes that checkable: it walks every
//! packet of a file without decoding and folds each non-attachment stream's
//! payload bytes into a SHA-256 digest. Two files whose streams carry
//! identical digests contain identical coded sample data, regardless of
//! container-level differences.
//!
//! # Example
//!
//! ```no_run
//! use chunkmux::{verify::stream_digests, ChunkmuxError};
//!
//! let source = stream_digests("input.mp4")?;
//! let rejoined = stream_digests("rejoined.mp4")?;
//! for (a, b) in source.iter().zip(&rejoined) {
//!     assert_eq!(a.digest, b.digest, "stream {} diverged", a.stream_index);
//! }
//! # Ok::<(), ChunkmuxError>(())
//! ```

use std::path::Path;

use ffmpeg_next::{media::Type, Error as FfmpegError, Packet};
use sha2::{Digest, Sha256};

use crate::error::ChunkmuxError;

/// Digest of one stream's coded packet payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDigest {
    /// Index of the stream in its container.
    pub stream_index: usize,
    /// Media type of the stream.
    pub media_type: Type,
    /// Number of packets folded into the digest.
    pub packets: u64,
    /// Total payload bytes folded into the digest.
    pub bytes: u64,
    /// SHA-256 over the concatenated packet payloads, in packet order.
    pub digest: [u8; 32],
}

impl StreamDigest {
    /// The digest as a lowercase hex string.
    pub fn hex(&self) -> String {
        self.digest.iter().map(|byte| format!("{byte:02x}")).collect()
    }
}

/// Compute per-stream packet digests for a media file.
///
/// Attachment streams are skipped; everything else (video, audio,
/// subtitles, data) is digested in container packet order. No decoding is
/// performed.
///
/// # Errors
///
/// Returns [`ChunkmuxError::FileOpen`] if the file cannot be opened, or
/// [`ChunkmuxError::Ffmpeg`] if the packet walk fails.
pub fn stream_digests<P: AsRef<Path>>(path: P) -> Result<Vec<StreamDigest>, ChunkmuxError> {
    let path = path.as_ref();
    log::debug!("Digesting packet payloads: {}", path.display());

    ffmpeg_next::init().map_err(|error| ChunkmuxError::FileOpen {
        path: path.to_path_buf(),
        reason: format!("FFmpeg initialisation failed: {error}"),
    })?;

    let mut input = ffmpeg_next::format::input(&path).map_err(|error| ChunkmuxError::FileOpen {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })?;

    struct Accumulator {
        stream_index: usize,
        media_type: Type,
        packets: u64,
        bytes: u64,
        hasher: Sha256,
    }

    let mut accumulators: Vec<Option<Accumulator>> = input
        .streams()
        .map(|stream| {
            let media_type = stream.parameters().medium();
            if media_type == Type::Attachment {
                None
            } else {
                Some(Accumulator {
                    stream_index: stream.index(),
                    media_type,
                    packets: 0,
                    bytes: 0,
                    hasher: Sha256::new(),
                })
            }
        })
        .collect();

    let mut packet = Packet::empty();
    loop {
        match packet.read(&mut input) {
            Ok(()) => {
                let Some(acc) = accumulators
                    .get_mut(packet.stream())
                    .and_then(Option::as_mut)
                else {
                    continue;
                };

                if let Some(data) = packet.data() {
                    acc.hasher.update(data);
                    acc.bytes += data.len() as u64;
                }
                acc.packets += 1;
            }
            Err(FfmpegError::Eof) => break,
            Err(error) => return Err(ChunkmuxError::from(error)),
        }
    }

    Ok(accumulators
        .into_iter()
        .flatten()
        .map(|acc| StreamDigest {
            stream_index: acc.stream_index,
            media_type: acc.media_type,
            packets: acc.packets,
            bytes: acc.bytes,
            digest: acc.hasher.finalize().into(),
        })
        .collect())
}
