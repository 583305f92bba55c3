//! Pipeline configuration.
//!
//! [`SieveOptions`] is a builder that carries the few knobs the pipeline
//! exposes without threading them through every constructor.
//!
//! # Example
//!
//! ```
//! use audiosieve::{LinkPolicy, SieveOptions};
//!
//! let options = SieveOptions::new()
//!     .with_link_policy(LinkPolicy::Permissive)
//!     .with_realtime(true);
//! assert!(options.preserve_mpegts_timestamps());
//! ```

/// What to do when two pipeline nodes refuse to link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkPolicy {
    /// Abort the branch and end the run with an error. This is the default.
    #[default]
    FailFast,
    /// Log a warning and keep building. Data on the unlinked path is lost.
    Permissive,
}

/// Configuration for a sieve pipeline.
///
/// A default-constructed value preserves transport stream timestamps,
/// fails fast on link errors and lets the capture sink run as fast as the
/// encoder produces data.
#[derive(Debug, Clone)]
pub struct SieveOptions {
    /// Ask `tsdemux` to keep the original MPEG-TS timestamps.
    pub(crate) preserve_mpegts_timestamps: bool,
    /// Behaviour on link failures while building branches.
    pub(crate) link_policy: LinkPolicy,
    /// Synchronise the capture sink against the pipeline clock.
    pub(crate) realtime: bool,
}

impl Default for SieveOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl SieveOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            preserve_mpegts_timestamps: true,
            link_policy: LinkPolicy::FailFast,
            realtime: false,
        }
    }

    /// Enable or disable `preserve-mpegts-timestamps` on transport stream
    /// demuxers. Defaults to `true`.
    #[must_use]
    pub fn with_preserve_mpegts_timestamps(mut self, preserve: bool) -> Self {
        self.preserve_mpegts_timestamps = preserve;
        self
    }

    /// Set the link failure policy. Defaults to [`LinkPolicy::FailFast`].
    #[must_use]
    pub fn with_link_policy(mut self, policy: LinkPolicy) -> Self {
        self.link_policy = policy;
        self
    }

    /// Deliver encoded buffers in real time instead of as fast as possible.
    #[must_use]
    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// Whether transport stream demuxers keep their original timestamps.
    pub fn preserve_mpegts_timestamps(&self) -> bool {
        self.preserve_mpegts_timestamps
    }

    /// The configured link failure policy.
    pub fn link_policy(&self) -> LinkPolicy {
        self.link_policy
    }

    /// Whether the capture sink is clock-synchronised.
    pub fn realtime(&self) -> bool {
        self.realtime
    }
}
