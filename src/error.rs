//! Error types for the `audiosieve` crate.
//!
//! This module defines [`SieveError`], the unified error type returned by all
//! fallible operations in the crate. Errors carry enough context (factory
//! names, element names, the offending input) to diagnose a failure without
//! extra logging at the call site.
//!
//! Errors that GStreamer reports *while the pipeline is running* are not
//! `SieveError`s: they arrive on the bus and end the run as
//! [`RunOutcome::Failed`](crate::RunOutcome::Failed).

use std::io::Error as IoError;

use thiserror::Error;

/// The unified error type for all `audiosieve` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SieveError {
    /// A required GStreamer element (plugin) is not installed.
    ///
    /// This is an environment error: nothing can be done at runtime to
    /// recover from it.
    #[error("'{factory}' gstreamer plugin missing")]
    ElementMissing {
        /// Factory name that could not be instantiated.
        factory: String,
    },

    /// The input is neither a valid URI nor an existing local path.
    #[error("Invalid input {input:?}: {reason}")]
    InvalidInput {
        /// The argument as given by the caller.
        input: String,
        /// Why it could not be turned into a URI.
        reason: String,
    },

    /// Two pipeline nodes could not be linked.
    #[error("Failed to link {upstream} to {downstream}: {reason}")]
    PipelineLink {
        /// Name of the upstream element or pad.
        upstream: String,
        /// Name of the downstream element.
        downstream: String,
        /// Reason reported by the engine.
        reason: String,
    },

    /// An element does not expose the static pad the chain needs.
    #[error("Element {element} has no {pad} pad")]
    MissingPad {
        /// Element name.
        element: String,
        /// Pad template name that was requested.
        pad: String,
    },

    /// An element or the pipeline refused a state change.
    #[error("State change failed: {0}")]
    StateChange(String),

    /// Any other failure reported by the media engine.
    #[error("GStreamer error: {0}")]
    Engine(String),

    /// An I/O error occurred while writing captured audio.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

#[cfg(feature = "gstreamer")]
impl From<gstreamer::glib::BoolError> for SieveError {
    fn from(error: gstreamer::glib::BoolError) -> Self {
        SieveError::Engine(error.to_string())
    }
}

#[cfg(feature = "gstreamer")]
impl From<gstreamer::glib::Error> for SieveError {
    fn from(error: gstreamer::glib::Error) -> Self {
        SieveError::Engine(error.to_string())
    }
}

#[cfg(feature = "gstreamer")]
impl From<gstreamer::StateChangeError> for SieveError {
    fn from(error: gstreamer::StateChangeError) -> Self {
        SieveError::StateChange(error.to_string())
    }
}
