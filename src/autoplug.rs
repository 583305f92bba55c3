//! Autoplug filtering.
//!
//! `uridecodebin` asks, for every stream it discovers, whether it should keep
//! plugging decoders for it. Answering "no" for video saves the whole cost
//! of video decoding; the stream is then exposed still encoded and ends up
//! in a discard sink.

use crate::caps::{MediaClass, StreamDescriptor};

/// Decide whether the decoder should keep decoding a stream.
///
/// Evaluated in order, first match wins:
///
/// 1. `video/mpegts` continues, the container must still be demuxed;
/// 2. any other `video/*` stops;
/// 3. `audio/*` continues down to raw audio;
/// 4. anything else stops.
///
/// # Example
///
/// ```
/// use audiosieve::{StreamDescriptor, autoplug_continue};
///
/// assert!(autoplug_continue(&StreamDescriptor::new("video/mpegts")));
/// assert!(!autoplug_continue(&StreamDescriptor::new("video/x-h264")));
/// assert!(autoplug_continue(&StreamDescriptor::new("audio/mpeg")));
/// assert!(!autoplug_continue(&StreamDescriptor::new("subpicture/x-dvb")));
/// ```
pub fn autoplug_continue(caps: &StreamDescriptor) -> bool {
    match caps.class() {
        MediaClass::TransportStream => true,
        MediaClass::Video => false,
        MediaClass::RawAudio | MediaClass::Audio => true,
        MediaClass::Other => false,
    }
}
