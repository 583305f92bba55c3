//! Delivery of encoded audio to the application.
//!
//! Every transcode branch ends in a capture sink. For each encoded buffer the
//! engine maps the memory read-only, wraps it in an [`EncodedBuffer`] that
//! borrows the mapping, and hands it to the branch's [`CaptureDispatch`],
//! which forwards it to the application's [`BufferSink`]. The mapping is
//! released when that borrow ends, whatever the sink returns.
//!
//! # Example
//!
//! ```
//! use audiosieve::{BufferSink, EncodedBuffer, SinkFlow};
//!
//! struct CountBytes(std::sync::atomic::AtomicUsize);
//!
//! impl BufferSink for CountBytes {
//!     fn on_buffer(&self, _branch: usize, buffer: &EncodedBuffer<'_>) -> SinkFlow {
//!         self.0.fetch_add(buffer.data.len(), std::sync::atomic::Ordering::Relaxed);
//!         SinkFlow::Continue
//!     }
//! }
//! ```

use std::{
    collections::HashMap,
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use serde_json::json;

use crate::bus::BusMonitor;
use crate::error::SieveError;
use crate::session::SessionStats;

/// Flag bits carried by an encoded buffer.
///
/// The values match `GstBufferFlags`, so the raw bits from the engine can be
/// wrapped as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufferFlags(u32);

impl BufferFlags {
    /// Buffer comes from a live source.
    pub const LIVE: BufferFlags = BufferFlags(1 << 4);
    /// Buffer should be decoded but not rendered.
    pub const DECODE_ONLY: BufferFlags = BufferFlags(1 << 5);
    /// Discontinuity in the stream.
    pub const DISCONT: BufferFlags = BufferFlags(1 << 6);
    /// Timestamps might have a discontinuity.
    pub const RESYNC: BufferFlags = BufferFlags(1 << 7);
    /// Data might be corrupted.
    pub const CORRUPTED: BufferFlags = BufferFlags(1 << 8);
    /// Media specific marker.
    pub const MARKER: BufferFlags = BufferFlags(1 << 9);
    /// Stream header, e.g. the FLAC `STREAMINFO` block.
    pub const HEADER: BufferFlags = BufferFlags(1 << 10);
    /// Gap in the stream, data is silence.
    pub const GAP: BufferFlags = BufferFlags(1 << 11);
    /// Buffer can be dropped without breaking the stream.
    pub const DROPPABLE: BufferFlags = BufferFlags(1 << 12);
    /// Buffer cannot be decoded independently.
    pub const DELTA_UNIT: BufferFlags = BufferFlags(1 << 13);

    const NAMED: [(BufferFlags, &'static str); 10] = [
        (Self::LIVE, "live"),
        (Self::DECODE_ONLY, "decode-only"),
        (Self::DISCONT, "discont"),
        (Self::RESYNC, "resync"),
        (Self::CORRUPTED, "corrupted"),
        (Self::MARKER, "marker"),
        (Self::HEADER, "header"),
        (Self::GAP, "gap"),
        (Self::DROPPABLE, "droppable"),
        (Self::DELTA_UNIT, "delta-unit"),
    ];

    /// Wrap raw flag bits.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw flag bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// `true` if every bit of `other` is set.
    pub const fn contains(self, other: BufferFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Names of the known flags that are set, in bit order.
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMED
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl Display for BufferFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let names = self.names();
        if names.is_empty() {
            write!(f, "0x{:04x}", self.0)
        } else {
            write!(f, "0x{:04x} [{}]", self.0, names.join("|"))
        }
    }
}

/// One encoded buffer, valid only for the duration of the callback.
#[derive(Debug, Clone, Copy)]
pub struct EncodedBuffer<'a> {
    /// Presentation timestamp, if the buffer carries one.
    pub pts: Option<Duration>,
    /// Encoded payload, borrowed from the engine's read-only mapping.
    pub data: &'a [u8],
    /// Buffer flags.
    pub flags: BufferFlags,
}

impl EncodedBuffer<'_> {
    /// First payload byte, `None` for an empty buffer.
    pub fn first_byte(&self) -> Option<u8> {
        self.data.first().copied()
    }
}

/// Tells the engine whether to keep feeding a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkFlow {
    /// Deliver the next buffer.
    Continue,
    /// Stop this branch.
    Halt,
}

/// Application-facing consumer of encoded audio.
///
/// Implementations must be [`Send`] and [`Sync`]: each branch delivers on
/// its own engine streaming thread, so calls for different branches may
/// overlap.
pub trait BufferSink: Send + Sync {
    /// Called once per encoded buffer of `branch`.
    fn on_buffer(&self, branch: usize, buffer: &EncodedBuffer<'_>) -> SinkFlow;

    /// Called once when `branch` reaches end-of-stream.
    fn on_eos(&self, _branch: usize) {}
}

/// Per-branch glue between the capture sink and a [`BufferSink`].
///
/// Buffers arriving after the run reached its terminal outcome are dropped
/// and halt the branch, and end-of-stream is forwarded at most once.
pub struct CaptureDispatch {
    branch: usize,
    sink: Arc<dyn BufferSink>,
    monitor: Arc<BusMonitor>,
    stats: Arc<SessionStats>,
    eos_forwarded: AtomicBool,
}

impl CaptureDispatch {
    /// Create the dispatch for one branch.
    pub fn new(
        branch: usize,
        sink: Arc<dyn BufferSink>,
        monitor: Arc<BusMonitor>,
        stats: Arc<SessionStats>,
    ) -> Self {
        Self {
            branch,
            sink,
            monitor,
            stats,
            eos_forwarded: AtomicBool::new(false),
        }
    }

    /// The branch index this dispatch serves.
    pub fn branch(&self) -> usize {
        self.branch
    }

    /// Forward one mapped buffer.
    pub fn deliver(&self, buffer: &EncodedBuffer<'_>) -> SinkFlow {
        if self.monitor.is_finished() {
            return SinkFlow::Halt;
        }
        self.stats.record_buffer();
        self.sink.on_buffer(self.branch, buffer)
    }

    /// Forward end-of-stream for this branch, once.
    pub fn end_of_stream(&self) {
        if self.eos_forwarded.swap(true, Ordering::AcqRel) {
            return;
        }
        log::debug!("Branch {} reached end-of-stream", self.branch);
        self.stats.record_branch_eos();
        self.sink.on_eos(self.branch);
    }
}

/// Output style of [`DiagnosticSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiagnosticStyle {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Prints one line per buffer and per end-of-stream.
pub struct DiagnosticSink<W: Write + Send> {
    writer: Mutex<W>,
    style: DiagnosticStyle,
}

impl DiagnosticSink<std::io::Stdout> {
    /// A diagnostic sink writing to standard output.
    pub fn stdout(style: DiagnosticStyle) -> Self {
        Self::new(std::io::stdout(), style)
    }
}

impl<W: Write + Send> DiagnosticSink<W> {
    /// A diagnostic sink writing to `writer`.
    pub fn new(writer: W, style: DiagnosticStyle) -> Self {
        Self {
            writer: Mutex::new(writer),
            style,
        }
    }

    /// Recover the writer, e.g. to inspect captured output.
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_line(&self, line: &str) -> SinkFlow {
        let mut writer = match self.writer.lock() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        };
        match writeln!(writer, "{line}") {
            Ok(()) => SinkFlow::Continue,
            Err(error) => {
                log::error!("Diagnostic output failed: {error}");
                SinkFlow::Halt
            }
        }
    }
}

impl<W: Write + Send> BufferSink for DiagnosticSink<W> {
    fn on_buffer(&self, branch: usize, buffer: &EncodedBuffer<'_>) -> SinkFlow {
        let line = match self.style {
            DiagnosticStyle::Text => format!(
                "[branch {branch}] pts={} size={} first-byte={} flags={}",
                format_timestamp(buffer.pts),
                buffer.data.len(),
                buffer
                    .first_byte()
                    .map_or_else(|| "-".to_string(), |byte| byte.to_string()),
                buffer.flags,
            ),
            DiagnosticStyle::Json => json!({
                "branch": branch,
                "event": "buffer",
                "pts_ns": buffer.pts.map(|pts| pts.as_nanos() as u64),
                "size": buffer.data.len(),
                "first_byte": buffer.first_byte(),
                "flags": buffer.flags.bits(),
                "flag_names": buffer.flags.names(),
            })
            .to_string(),
        };
        self.write_line(&line)
    }

    fn on_eos(&self, branch: usize) {
        let line = match self.style {
            DiagnosticStyle::Text => format!("[branch {branch}] end-of-stream"),
            DiagnosticStyle::Json => json!({ "branch": branch, "event": "eos" }).to_string(),
        };
        self.write_line(&line);
    }
}

/// Writes every branch's encoded stream to `<dir>/branch-<n>.flac`.
///
/// Files are created on the first buffer of a branch and flushed on its
/// end-of-stream. A write error halts that branch only.
pub struct FlacFileSink {
    directory: PathBuf,
    writers: Mutex<HashMap<usize, BufWriter<File>>>,
}

impl FlacFileSink {
    /// Create the sink, creating `directory` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`SieveError::Io`] if the directory cannot be created.
    pub fn new<P: AsRef<Path>>(directory: P) -> Result<Self, SieveError> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            writers: Mutex::new(HashMap::new()),
        })
    }

    /// Path of the file a branch is written to.
    pub fn branch_path(&self, branch: usize) -> PathBuf {
        self.directory.join(format!("branch-{branch}.flac"))
    }

    fn write_branch(&self, branch: usize, data: &[u8]) -> Result<(), SieveError> {
        let mut writers = match self.writers.lock() {
            Ok(writers) => writers,
            Err(poisoned) => poisoned.into_inner(),
        };
        let writer = match writers.entry(branch) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let path = self.branch_path(branch);
                log::info!("Writing branch {branch} to {}", path.display());
                entry.insert(BufWriter::new(File::create(path)?))
            }
        };
        writer.write_all(data)?;
        Ok(())
    }
}

impl BufferSink for FlacFileSink {
    fn on_buffer(&self, branch: usize, buffer: &EncodedBuffer<'_>) -> SinkFlow {
        match self.write_branch(branch, buffer.data) {
            Ok(()) => SinkFlow::Continue,
            Err(error) => {
                log::error!("Failed to write branch {branch}: {error}");
                SinkFlow::Halt
            }
        }
    }

    fn on_eos(&self, branch: usize) {
        let mut writers = match self.writers.lock() {
            Ok(writers) => writers,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(mut writer) = writers.remove(&branch)
            && let Err(error) = writer.flush()
        {
            log::error!("Failed to flush branch {branch}: {error}");
        }
    }
}

/// Fans every event out to several sinks.
///
/// A buffer halts the branch if any sink asks to halt; every sink still sees
/// the buffer.
#[derive(Default)]
pub struct TeeSink {
    sinks: Vec<Arc<dyn BufferSink>>,
}

impl TeeSink {
    /// An empty tee.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink to the fan-out.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn BufferSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl BufferSink for TeeSink {
    fn on_buffer(&self, branch: usize, buffer: &EncodedBuffer<'_>) -> SinkFlow {
        self.sinks
            .iter()
            .map(|sink| sink.on_buffer(branch, buffer))
            .fold(SinkFlow::Continue, |flow, next| match (flow, next) {
                (SinkFlow::Continue, SinkFlow::Continue) => SinkFlow::Continue,
                _ => SinkFlow::Halt,
            })
    }

    fn on_eos(&self, branch: usize) {
        for sink in &self.sinks {
            sink.on_eos(branch);
        }
    }
}

/// Format a timestamp the way GStreamer prints clock times
/// (`h:mm:ss.nnnnnnnnn`), or `none`.
pub fn format_timestamp(timestamp: Option<Duration>) -> String {
    match timestamp {
        Some(timestamp) => {
            let seconds = timestamp.as_secs();
            format!(
                "{}:{:02}:{:02}.{:09}",
                seconds / 3600,
                (seconds / 60) % 60,
                seconds % 60,
                timestamp.subsec_nanos()
            )
        }
        None => "none".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_display_names() {
        let flags = BufferFlags::from_bits(BufferFlags::HEADER.bits() | BufferFlags::DISCONT.bits());
        assert_eq!(flags.names(), vec!["discont", "header"]);
        assert_eq!(flags.to_string(), "0x0440 [discont|header]");
        assert_eq!(BufferFlags::default().to_string(), "0x0000");
    }

    #[test]
    fn timestamp_formatting() {
        assert_eq!(format_timestamp(None), "none");
        assert_eq!(
            format_timestamp(Some(Duration::new(3723, 5))),
            "1:02:03.000000005"
        );
    }

    #[test]
    fn text_diagnostics() {
        let sink = DiagnosticSink::new(Vec::new(), DiagnosticStyle::Text);
        let buffer = EncodedBuffer {
            pts: Some(Duration::from_millis(1500)),
            data: b"fLaC",
            flags: BufferFlags::HEADER,
        };
        assert_eq!(sink.on_buffer(2, &buffer), SinkFlow::Continue);
        sink.on_eos(2);

        let output = String::from_utf8(sink.into_inner()).expect("utf8");
        assert_eq!(
            output,
            "[branch 2] pts=0:00:01.500000000 size=4 first-byte=102 flags=0x0400 [header]\n\
             [branch 2] end-of-stream\n"
        );
    }

    #[test]
    fn json_diagnostics() {
        let sink = DiagnosticSink::new(Vec::new(), DiagnosticStyle::Json);
        let buffer = EncodedBuffer {
            pts: None,
            data: &[],
            flags: BufferFlags::default(),
        };
        sink.on_buffer(0, &buffer);

        let output = String::from_utf8(sink.into_inner()).expect("utf8");
        let value: serde_json::Value = serde_json::from_str(output.trim()).expect("json");
        assert_eq!(value["event"], "buffer");
        assert_eq!(value["size"], 0);
        assert!(value["pts_ns"].is_null());
        assert!(value["first_byte"].is_null());
    }
}
