//! Error types for the `chunkmux` crate.
//!
//! This module defines [`ChunkmuxError`], the unified error type returned by
//! all fallible operations in the crate. Errors carry rich context to aid
//! debugging, including file paths, seek targets, and upstream error
//! messages.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

/// The unified error type for all `chunkmux` operations.
///
/// Every public method that can fail returns `Result<T, ChunkmuxError>`.
/// Variants carry enough context to diagnose the problem without needing
/// additional logging at the call site.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChunkmuxError {
    /// A media file could not be opened (input or output).
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that failed to open.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The source does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// A caller-supplied argument violated the contract of the operation
    /// (empty probe, non-positive duration, inverted chunk bounds, ...).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A backward-to-keyframe seek on the source failed.
    #[error("Failed to seek {path} to {position:.3}s: {reason}")]
    Seek {
        /// The file being seeked.
        path: PathBuf,
        /// Seek target in seconds.
        position: f64,
        /// Underlying reason the seek failed.
        reason: String,
    },

    /// An output stream could not be created or its codec parameters could
    /// not be copied from the source.
    #[error("Failed to set up output stream: {0}")]
    StreamSetup(String),

    /// Writing the container header, a packet, or the trailer failed.
    #[error("Failed to write output: {0}")]
    Write(String),

    /// A chunk file disagrees with the established output layout
    /// (stream count or per-stream time base).
    #[error("Chunk {path} does not match the output layout: {reason}")]
    LayoutMismatch {
        /// The offending chunk file.
        path: PathBuf,
        /// What differed.
        reason: String,
    },

    /// An expected chunk file is absent from the chunks directory.
    #[error("Missing chunk file: {path}")]
    MissingChunk {
        /// The path that failed to resolve.
        path: PathBuf,
    },

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

impl From<FfmpegError> for ChunkmuxError {
    fn from(error: FfmpegError) -> Self {
        ChunkmuxError::Ffmpeg(error.to_string())
    }
}
