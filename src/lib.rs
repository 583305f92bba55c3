//! # audiosieve
//!
//! Sieve the audio out of a media file or stream: video is never decoded,
//! every audio track is transcoded to FLAC, and the encoded buffers are
//! handed to the application.
//!
//! `audiosieve` drives a GStreamer `uridecodebin`. The policies that decide
//! what to decode, how to tune MPEG-TS demuxers, where each pad goes and how
//! the run ends live in plain Rust modules behind the [`MediaGraph`] seam,
//! so they can be exercised without GStreamer installed.
//!
//! ## Quick Start
//!
//! ```no_run
//! # #[cfg(feature = "gstreamer")]
//! # fn main() -> Result<(), audiosieve::SieveError> {
//! use std::sync::Arc;
//!
//! use audiosieve::{DiagnosticSink, DiagnosticStyle, SieveOptions, SievePipeline};
//!
//! let sink = Arc::new(DiagnosticSink::stdout(DiagnosticStyle::Text));
//! let pipeline = SievePipeline::new("broadcast.ts", SieveOptions::new(), sink)?;
//! println!("{}", pipeline.run()?);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "gstreamer"))]
//! # fn main() {}
//! ```
//!
//! ## How a pipeline is wired
//!
//! - **Autoplugging** stops at encoded video and unknown streams, and keeps
//!   going for transport streams and audio ([`autoplug_continue`]).
//! - **Interception** sets `preserve-mpegts-timestamps` on every MPEG-TS
//!   demuxer and follows nested decode bins ([`intercept`]).
//! - **Routing** sends raw audio pads to a new transcode chain and every
//!   other pad to a discard sink ([`route_for`]).
//! - **Transcoding** runs `queue ! audioconvert ! audiorate ! audioresample !
//!   flacenc ! queue ! appsink` per branch ([`build_transcode_chain`]).
//! - **Delivery** hands each FLAC buffer to a [`BufferSink`].
//! - **Termination** takes the first end-of-stream or error from the bus
//!   ([`BusMonitor`]).
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `gstreamer` | [`SievePipeline`] and the `audiosieve` binary (needs GStreamer 1.x) |
//! | `full` | Enables all of the above |

pub mod autoplug;
pub mod bus;
pub mod caps;
pub mod chain;
pub mod config;
#[cfg(feature = "gstreamer")]
pub mod engine;
pub mod error;
pub mod graph;
pub mod interceptor;
pub mod router;
pub mod session;
pub mod sink;
pub mod uri;

pub use autoplug::autoplug_continue;
pub use bus::{BusAction, BusEvent, BusMonitor, RunOutcome};
pub use caps::{MediaClass, StreamDescriptor};
pub use chain::{ChainStage, TranscodeChain, build_transcode_chain};
pub use config::{LinkPolicy, SieveOptions};
#[cfg(feature = "gstreamer")]
pub use engine::{GstGraph, SievePipeline};
pub use error::SieveError;
pub use graph::MediaGraph;
pub use interceptor::{ElementKind, InterceptAction, InterceptedElement, intercept};
pub use router::{PadRoute, connect_to_discard, route_for};
pub use session::{SessionStats, SieveSession};
pub use sink::{
    BufferFlags, BufferSink, CaptureDispatch, DiagnosticSink, DiagnosticStyle, EncodedBuffer,
    FlacFileSink, SinkFlow, TeeSink, format_timestamp,
};
pub use uri::{is_uri, resolve_input};
