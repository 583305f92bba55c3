//! Stream descriptors.
//!
//! GStreamer describes every stream with *caps*. The policies in this crate
//! only ever look at the media type of the first caps structure
//! (`audio/x-raw`, `video/mpegts`, ...), so [`StreamDescriptor`] keeps that
//! name plus the full caps string for log output.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Media type of an MPEG transport stream container.
pub const MPEGTS_MEDIA_TYPE: &str = "video/mpegts";

/// Media type of decoded, uncompressed audio.
pub const RAW_AUDIO_MEDIA_TYPE: &str = "audio/x-raw";

/// Coarse classification of a stream, derived from its media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaClass {
    /// An MPEG transport stream container (`video/mpegts`).
    TransportStream,
    /// Uncompressed audio (`audio/x-raw`).
    RawAudio,
    /// Any other `audio/*` type, typically still encoded.
    Audio,
    /// Any `video/*` type other than a transport stream.
    Video,
    /// Everything else (subtitles, metadata, application data, ...).
    Other,
}

/// Read-only description of a stream, built from engine caps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    media_type: String,
    details: Option<String>,
}

impl StreamDescriptor {
    /// Create a descriptor from the name of the first caps structure.
    pub fn new(media_type: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            details: None,
        }
    }

    /// Attach the full serialized caps, used only for diagnostics.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// The media type, e.g. `audio/x-raw`.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// The full serialized caps, if known.
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Classify the stream. Transport streams are checked before the
    /// generic `video/` prefix since their media type starts with it.
    pub fn class(&self) -> MediaClass {
        let media_type = self.media_type.as_str();
        if media_type == MPEGTS_MEDIA_TYPE {
            MediaClass::TransportStream
        } else if media_type == RAW_AUDIO_MEDIA_TYPE {
            MediaClass::RawAudio
        } else if media_type.starts_with("audio/") {
            MediaClass::Audio
        } else if media_type.starts_with("video/") {
            MediaClass::Video
        } else {
            MediaClass::Other
        }
    }

    /// `true` for `video/mpegts`.
    pub fn is_mpegts(&self) -> bool {
        self.class() == MediaClass::TransportStream
    }

    /// `true` for uncompressed audio only.
    pub fn is_raw_audio(&self) -> bool {
        self.class() == MediaClass::RawAudio
    }

    /// `true` for any `audio/*` type, raw or encoded.
    pub fn is_audio(&self) -> bool {
        matches!(self.class(), MediaClass::RawAudio | MediaClass::Audio)
    }

    /// `true` for any `video/*` type, transport streams included.
    pub fn is_video(&self) -> bool {
        matches!(self.class(), MediaClass::Video | MediaClass::TransportStream)
    }
}

impl Display for StreamDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.details {
            Some(details) => write!(f, "{details}"),
            None => write!(f, "{}", self.media_type),
        }
    }
}
