//! Output container selection and muxer options.
//!
//! [`OutputOptions`] carries everything the splitter and stitcher need to
//! decide *how* to write: which container format to use (auto-detected from
//! a file extension or forced by the caller), whether mp4 output should be
//! fragmented, and whether a final mp4 should be laid out for fast playback
//! start. The same option surface is shared by both remuxing stages so a
//! split/stitch round trip agrees on the container.

use std::path::Path;

use ffmpeg_next::Dictionary;

/// A supported output container format.
///
/// The set mirrors the containers whose extensions the auto-detection
/// recognises; anything else falls back to [`ContainerFormat::Mp4`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContainerFormat {
    /// ISO BMFF `.mp4`. The default.
    #[default]
    Mp4,
    /// QuickTime `.mov`.
    Mov,
    /// Matroska `.mkv`.
    Matroska,
    /// WebM `.webm`.
    WebM,
}

impl ContainerFormat {
    /// The muxer short name understood by the media library.
    pub fn muxer_name(self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "mp4",
            ContainerFormat::Mov => "mov",
            ContainerFormat::Matroska => "matroska",
            ContainerFormat::WebM => "webm",
        }
    }

    /// The file extension used for chunk files in this format.
    pub fn extension(self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "mp4",
            ContainerFormat::Mov => "mov",
            ContainerFormat::Matroska => "mkv",
            ContainerFormat::WebM => "webm",
        }
    }

    /// Detect the format from a path's extension, defaulting to mp4.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("mp4") => ContainerFormat::Mp4,
            Some("mov") => ContainerFormat::Mov,
            Some("mkv") => ContainerFormat::Matroska,
            Some("webm") => ContainerFormat::WebM,
            _ => ContainerFormat::Mp4,
        }
    }

    /// Parse a muxer short name as given on a command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "mp4" => Some(ContainerFormat::Mp4),
            "mov" => Some(ContainerFormat::Mov),
            "mkv" | "matroska" => Some(ContainerFormat::Matroska),
            "webm" => Some(ContainerFormat::WebM),
            _ => None,
        }
    }
}

/// Options controlling how remuxed output containers are written.
///
/// # Example
///
/// ```
/// use chunkmux::{ContainerFormat, OutputOptions};
///
/// // Auto-detect the container from the source extension, fragmented mp4.
/// let options = OutputOptions::new().with_fragmented(true);
///
/// // Force Matroska regardless of the source.
/// let forced = OutputOptions::new().with_format(ContainerFormat::Matroska);
/// assert_eq!(forced.resolve_format("ignored.mp4").extension(), "mkv");
/// # let _ = options;
/// ```
#[derive(Debug, Clone, Default)]
pub struct OutputOptions {
    /// Forced container format; `None` auto-detects from the reference path.
    format: Option<ContainerFormat>,
    /// Emit fragmented mp4 (self-indexed fragments instead of one moov+mdat).
    fragmented: bool,
    /// Lay a final, non-fragmented mp4 out for fast playback start.
    faststart: bool,
}

impl OutputOptions {
    /// Create options with auto-detected format and no mp4 layout flags.
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a specific container format instead of auto-detecting it.
    #[must_use]
    pub fn with_format(mut self, format: ContainerFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Enable fragmented output (mp4 only; ignored for other containers).
    #[must_use]
    pub fn with_fragmented(mut self, fragmented: bool) -> Self {
        self.fragmented = fragmented;
        self
    }

    /// Enable mp4 faststart layout (ignored when fragmented).
    #[must_use]
    pub fn with_faststart(mut self, faststart: bool) -> Self {
        self.faststart = faststart;
        self
    }

    /// Whether fragmented output was requested.
    pub fn fragmented(&self) -> bool {
        self.fragmented
    }

    /// Resolve the effective format: the forced one, else the one detected
    /// from `reference` (typically the source or output path).
    pub fn resolve_format<P: AsRef<Path>>(&self, reference: P) -> ContainerFormat {
        self.format
            .unwrap_or_else(|| ContainerFormat::from_path(reference))
    }

    /// Build the muxer option dictionary for a chunk written by the
    /// splitter.
    pub(crate) fn chunk_muxer_options(&self, format: ContainerFormat) -> Dictionary<'static> {
        let mut options = Dictionary::new();
        if self.fragmented && format == ContainerFormat::Mp4 {
            options.set("movflags", "frag_keyframe+empty_moov+omit_tfhd_offset");
        }
        options
    }

    /// Build the muxer option dictionary for the stitched output.
    ///
    /// Timestamp shifting is always disabled so negative DTS values from
    /// the source survive the round trip.
    pub(crate) fn stitch_muxer_options(&self, format: ContainerFormat) -> Dictionary<'static> {
        let mut options = Dictionary::new();
        if self.fragmented && format == ContainerFormat::Mp4 {
            options.set("movflags", "frag_keyframe+empty_moov+omit_tfhd_offset");
        }
        if self.faststart && !self.fragmented && format == ContainerFormat::Mp4 {
            options.set("movflags", "faststart");
        }
        options.set("avoid_negative_ts", "disabled");
        options
    }
}

/// File name of the chunk at `index` in the given container format.
pub(crate) fn chunk_file_name(index: usize, format: ContainerFormat) -> String {
    format!("chunk_{index:04}.{}", format.extension())
}
