//! The engine seam.
//!
//! Branch construction only needs a handful of graph operations: create an
//! element by factory name, add it, link it, sync its state, and hook a
//! capture sink up to a [`CaptureDispatch`]. [`MediaGraph`] names exactly
//! those, so the routing and chain-building policies can run against the
//! GStreamer pipeline in production and against a recording mock in tests.

use std::sync::Arc;

use crate::error::SieveError;
use crate::sink::CaptureDispatch;

/// Graph operations used while the pipeline is being wired.
///
/// Every method may be called from an engine streaming thread while the
/// pipeline is already playing, hence the `Send + Sync` bounds.
pub trait MediaGraph: Send + Sync {
    /// Handle to an element in the graph.
    type Element: Send + Sync;
    /// Handle to a dynamically exposed output pad.
    type Pad: Send + Sync;

    /// Instantiate an element from its factory name.
    ///
    /// # Errors
    ///
    /// [`SieveError::ElementMissing`] when the factory is not installed.
    fn make_element(&self, factory: &str) -> Result<Self::Element, SieveError>;

    /// Add an element to the pipeline.
    fn add(&self, element: &Self::Element) -> Result<(), SieveError>;

    /// Link `upstream`'s source to `downstream`'s sink.
    fn link(&self, upstream: &Self::Element, downstream: &Self::Element) -> Result<(), SieveError>;

    /// Link an output pad to `downstream`'s sink pad.
    fn link_pad(&self, pad: &Self::Pad, downstream: &Self::Element) -> Result<(), SieveError>;

    /// Bring an element to the pipeline's current state.
    fn sync_state(&self, element: &Self::Element) -> Result<(), SieveError>;

    /// Route a capture sink's buffers and end-of-stream to `dispatch`.
    ///
    /// `sync` selects whether the sink renders against the pipeline clock.
    fn attach_capture(
        &self,
        sink: &Self::Element,
        sync: bool,
        dispatch: Arc<CaptureDispatch>,
    ) -> Result<(), SieveError>;

    /// Surface an error raised inside a callback as a pipeline error, so it
    /// is handled centrally by the bus monitor.
    fn report_error(&self, error: &SieveError);
}
