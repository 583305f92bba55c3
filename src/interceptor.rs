//! Element interception.
//!
//! Every element that the decoding machinery instantiates passes through
//! [`intercept`]. Nested decode bins are reported back as
//! [`InterceptAction::Subscribe`] so the caller attaches the same hook to
//! them, which is how arbitrarily deep demuxing stays observable.

use crate::config::SieveOptions;
use crate::error::SieveError;

/// Property that makes `tsdemux` keep the timestamps found in the stream.
pub const PRESERVE_TIMESTAMPS_PROPERTY: &str = "preserve-mpegts-timestamps";

/// What kind of element the engine just created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// A nested decode bin (`GstDecodeBin`, `GstDecodeBin3`).
    DecodeBin,
    /// The MPEG transport stream demuxer (`GstTSDemux`).
    TransportStreamDemuxer,
    /// Anything else.
    Other,
}

impl ElementKind {
    /// Classify an element by its GObject type name.
    pub fn from_type_name(type_name: &str) -> Self {
        match type_name {
            "GstDecodeBin" | "GstDecodeBin3" => ElementKind::DecodeBin,
            "GstTSDemux" => ElementKind::TransportStreamDemuxer,
            _ => ElementKind::Other,
        }
    }
}

/// Result of intercepting one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptAction {
    /// The element is itself a decoder: subscribe this hook to it.
    Subscribe,
    /// A property was tuned on the element.
    Tuned,
    /// Nothing to do.
    Ignore,
}

/// The view of a freshly created element that the interceptor needs.
///
/// Implemented for `gst::Element` by the GStreamer backend and by mock
/// elements in tests. Implementations are called from engine threads and
/// must not block.
pub trait InterceptedElement {
    /// GObject type name, e.g. `GstTSDemux`.
    fn type_name(&self) -> String;

    /// Instance name, used only for log output.
    fn element_name(&self) -> String;

    /// Set a boolean property on the element.
    fn set_bool_property(&self, property: &str, value: bool) -> Result<(), SieveError>;
}

/// Inspect a new element and tune it if needed.
///
/// A `tsdemux` that lacks the timestamp property is logged and treated as
/// [`InterceptAction::Ignore`]; interception never fails the pipeline.
pub fn intercept<E: InterceptedElement + ?Sized>(
    element: &E,
    options: &SieveOptions,
) -> InterceptAction {
    match ElementKind::from_type_name(&element.type_name()) {
        ElementKind::DecodeBin => {
            log::debug!("Subscribing to nested decoder {}", element.element_name());
            InterceptAction::Subscribe
        }
        ElementKind::TransportStreamDemuxer if options.preserve_mpegts_timestamps => {
            match element.set_bool_property(PRESERVE_TIMESTAMPS_PROPERTY, true) {
                Ok(()) => {
                    log::debug!(
                        "Enabled {PRESERVE_TIMESTAMPS_PROPERTY} on {}",
                        element.element_name()
                    );
                    InterceptAction::Tuned
                }
                Err(error) => {
                    log::warn!("Could not tune {}: {error}", element.element_name());
                    InterceptAction::Ignore
                }
            }
        }
        ElementKind::TransportStreamDemuxer | ElementKind::Other => InterceptAction::Ignore,
    }
}
