//! GStreamer backend.
//!
//! [`SievePipeline`] owns a `gst::Pipeline` holding one `uridecodebin` and
//! forwards the decoder's signals to a [`SieveSession`]:
//!
//! | Signal | Session method |
//! |--------|----------------|
//! | `autoplug-continue` | [`SieveSession::autoplug_continue`] |
//! | `element-added` (recursive) | [`SieveSession::element_added`] |
//! | `pad-added` | [`SieveSession::pad_added`] |
//! | bus messages | [`SieveSession::bus_event`] |
//!
//! [`GstGraph`] implements [`MediaGraph`] on the pipeline, so branches built
//! by the session are real GStreamer elements.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use audiosieve::{DiagnosticSink, DiagnosticStyle, SieveOptions, SievePipeline};
//!
//! let sink = Arc::new(DiagnosticSink::stdout(DiagnosticStyle::Text));
//! let pipeline = SievePipeline::new("recording.ts", SieveOptions::new(), sink)?;
//! let outcome = pipeline.run()?;
//! println!("{outcome}");
//! pipeline.shutdown()?;
//! # Ok::<(), audiosieve::SieveError>(())
//! ```

use std::sync::Arc;
use std::time::Duration;

use gstreamer as gst;
use gstreamer::glib;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;

use crate::bus::{BusAction, BusEvent, RunOutcome};
use crate::caps::StreamDescriptor;
use crate::config::SieveOptions;
use crate::error::SieveError;
use crate::graph::MediaGraph;
use crate::interceptor::{InterceptAction, InterceptedElement};
use crate::session::{SessionStats, SieveSession};
use crate::sink::{BufferFlags, BufferSink, CaptureDispatch, EncodedBuffer, SinkFlow};
use crate::uri::resolve_input;

/// The universal decoding element every pipeline starts from.
pub const DECODER_FACTORY: &str = "uridecodebin";

/// [`MediaGraph`] over a live `gst::Pipeline`.
///
/// Holds a weak reference: the graph lives inside signal handlers owned by
/// the pipeline itself.
#[derive(Debug, Clone)]
pub struct GstGraph {
    pipeline: glib::WeakRef<gst::Pipeline>,
}

impl GstGraph {
    /// Wrap a pipeline.
    pub fn new(pipeline: &gst::Pipeline) -> Self {
        Self {
            pipeline: pipeline.downgrade(),
        }
    }

    fn pipeline(&self) -> Result<gst::Pipeline, SieveError> {
        self.pipeline
            .upgrade()
            .ok_or_else(|| SieveError::Engine("pipeline already released".to_string()))
    }
}

impl MediaGraph for GstGraph {
    type Element = gst::Element;
    type Pad = gst::Pad;

    fn make_element(&self, factory: &str) -> Result<gst::Element, SieveError> {
        make_element(factory)
    }

    fn add(&self, element: &gst::Element) -> Result<(), SieveError> {
        self.pipeline()?.add(element)?;
        Ok(())
    }

    fn link(&self, upstream: &gst::Element, downstream: &gst::Element) -> Result<(), SieveError> {
        upstream
            .link(downstream)
            .map_err(|error| SieveError::PipelineLink {
                upstream: upstream.name().to_string(),
                downstream: downstream.name().to_string(),
                reason: error.to_string(),
            })
    }

    fn link_pad(&self, pad: &gst::Pad, downstream: &gst::Element) -> Result<(), SieveError> {
        let sink_pad = downstream
            .static_pad("sink")
            .ok_or_else(|| SieveError::MissingPad {
                element: downstream.name().to_string(),
                pad: "sink".to_string(),
            })?;
        pad.link(&sink_pad)
            .map(|_| ())
            .map_err(|error| SieveError::PipelineLink {
                upstream: pad.name().to_string(),
                downstream: downstream.name().to_string(),
                reason: format!("{error:?}"),
            })
    }

    fn sync_state(&self, element: &gst::Element) -> Result<(), SieveError> {
        element
            .sync_state_with_parent()
            .map_err(|error| SieveError::StateChange(format!("{}: {error}", element.name())))
    }

    fn attach_capture(
        &self,
        sink: &gst::Element,
        sync: bool,
        dispatch: Arc<CaptureDispatch>,
    ) -> Result<(), SieveError> {
        let appsink = sink
            .clone()
            .downcast::<gst_app::AppSink>()
            .map_err(|element| SieveError::Engine(format!("{} is not an appsink", element.name())))?;
        appsink.set_property("sync", sync);

        let eos_dispatch = Arc::clone(&dispatch);
        appsink.set_callbacks(
            gst_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| deliver_sample(appsink, &dispatch))
                .eos(move |_appsink| eos_dispatch.end_of_stream())
                .build(),
        );
        Ok(())
    }

    fn report_error(&self, error: &SieveError) {
        let Some(pipeline) = self.pipeline.upgrade() else {
            log::error!("Pipeline gone, dropping error: {error}");
            return;
        };
        let message = gst::message::Error::builder(gst::CoreError::Pad, &error.to_string())
            .src(&pipeline)
            .build();
        if pipeline.post_message(message).is_err() {
            log::error!("Could not post error to the bus: {error}");
        }
    }
}

impl InterceptedElement for gst::Element {
    fn type_name(&self) -> String {
        self.type_().name().to_string()
    }

    fn element_name(&self) -> String {
        self.name().to_string()
    }

    fn set_bool_property(&self, property: &str, value: bool) -> Result<(), SieveError> {
        match self.find_property(property) {
            Some(spec) if spec.value_type() == bool::static_type() => {
                self.set_property(property, value);
                Ok(())
            }
            Some(_) => Err(SieveError::Engine(format!(
                "property {property} of {} is not a boolean",
                self.name()
            ))),
            None => Err(SieveError::Engine(format!(
                "{} has no property {property}",
                self.name()
            ))),
        }
    }
}

/// A running sieve: pipeline, decoder and session.
pub struct SievePipeline {
    pipeline: gst::Pipeline,
    session: Arc<SieveSession<GstGraph>>,
    uri: String,
}

impl SievePipeline {
    /// Build the pipeline for `input` (a path or URI).
    ///
    /// GStreamer is initialised (idempotent) and the decoder is created
    /// before the input is looked at, so a broken installation is reported
    /// first.
    ///
    /// # Errors
    ///
    /// - [`SieveError::ElementMissing`] if `uridecodebin` is not installed;
    /// - [`SieveError::InvalidInput`] if `input` is neither a URI nor an
    ///   existing path;
    /// - [`SieveError::Engine`] if GStreamer cannot be initialised.
    pub fn new(
        input: &str,
        options: SieveOptions,
        sink: Arc<dyn BufferSink>,
    ) -> Result<Self, SieveError> {
        Self::with_decoder(DECODER_FACTORY, input, options, sink)
    }

    fn with_decoder(
        decoder_factory: &str,
        input: &str,
        options: SieveOptions,
        sink: Arc<dyn BufferSink>,
    ) -> Result<Self, SieveError> {
        gst::init()?;

        let decoder = make_element(decoder_factory)?;
        let uri = resolve_input(input)?;

        let pipeline = gst::Pipeline::new();
        pipeline.add(&decoder)?;
        decoder.set_property("uri", uri.as_str());

        let session = Arc::new(SieveSession::new(
            GstGraph::new(&pipeline),
            options,
            sink,
        ));
        connect_decoder(&decoder, &session)?;

        log::debug!("Pipeline ready for {uri}");
        Ok(Self {
            pipeline,
            session,
            uri,
        })
    }

    /// The URI being decoded.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Counters for the current run.
    pub fn stats(&self) -> &SessionStats {
        self.session.stats()
    }

    /// Play the pipeline and block until end-of-stream, an error, or
    /// Ctrl-C (on unix).
    ///
    /// Pipeline errors are not `Err`: they come back as
    /// [`RunOutcome::Failed`]. That includes a pipeline that refuses to
    /// start (unknown URI scheme, unreadable file): the error its elements
    /// posted on the bus becomes the outcome.
    ///
    /// # Errors
    ///
    /// [`SieveError::Engine`] if the bus cannot be watched.
    pub fn run(&self) -> Result<RunOutcome, SieveError> {
        let bus = self
            .pipeline
            .bus()
            .ok_or_else(|| SieveError::Engine("pipeline has no bus".to_string()))?;
        let main_loop = glib::MainLoop::new(None, false);

        log::info!("Playing {}", self.uri);
        if let Err(error) = self.pipeline.set_state(gst::State::Playing) {
            log::debug!("Pipeline refused to start: {error}");
            return Ok(self.start_failure(&bus, &error));
        }

        let watch_session = Arc::clone(&self.session);
        let watch_loop = main_loop.clone();
        let _watch = bus.add_watch(move |_bus, message| {
            if watch_session.bus_event(&bus_event_from(message)) == BusAction::Quit {
                watch_loop.quit();
            }
            glib::ControlFlow::Continue
        })?;

        #[cfg(unix)]
        let interrupt = {
            let signal_session = Arc::clone(&self.session);
            let signal_loop = main_loop.clone();
            glib::unix_signal_add_local(libc::SIGINT, move || {
                log::info!("Interrupted, stopping");
                signal_session.interrupt();
                signal_loop.quit();
                glib::ControlFlow::Continue
            })
        };

        main_loop.run();

        #[cfg(unix)]
        interrupt.remove();

        let stats = self.session.stats();
        log::info!(
            "Run finished: {} chain(s), {} discarded pad(s), {} buffer(s)",
            stats.transcode_chains(),
            stats.discard_sinks(),
            stats.buffers()
        );
        Ok(self.session.outcome().unwrap_or(RunOutcome::Interrupted))
    }

    /// Feed whatever the failed start left on the bus to the monitor. An
    /// element that failed without posting an error still yields
    /// [`RunOutcome::Failed`].
    fn start_failure(&self, bus: &gst::Bus, error: &gst::StateChangeError) -> RunOutcome {
        while let Some(message) = bus.pop() {
            if self.session.bus_event(&bus_event_from(&message)) == BusAction::Quit {
                break;
            }
        }

        if self.session.outcome().is_none() {
            self.session.bus_event(&BusEvent::Error {
                source: None,
                message: error.to_string(),
                debug: Some(format!("{} could not be started", self.uri)),
            });
        }
        self.session.outcome().unwrap_or_else(|| RunOutcome::Failed {
            source: None,
            message: error.to_string(),
            debug: None,
        })
    }

    /// Stop the pipeline and release its resources.
    ///
    /// # Errors
    ///
    /// [`SieveError::StateChange`] if the pipeline cannot reach `NULL`.
    pub fn shutdown(&self) -> Result<(), SieveError> {
        self.pipeline.set_state(gst::State::Null)?;
        Ok(())
    }
}

impl Drop for SievePipeline {
    fn drop(&mut self) {
        if let Err(error) = self.shutdown() {
            log::warn!("Failed to stop pipeline for {}: {error}", self.uri);
        }
    }
}

fn make_element(factory: &str) -> Result<gst::Element, SieveError> {
    gst::ElementFactory::make(factory)
        .build()
        .map_err(|_| SieveError::ElementMissing {
            factory: factory.to_string(),
        })
}

fn connect_decoder(
    decoder: &gst::Element,
    session: &Arc<SieveSession<GstGraph>>,
) -> Result<(), SieveError> {
    let pad_session = Arc::clone(session);
    decoder.connect_pad_added(move |_decoder, pad| {
        let caps = pad.current_caps();
        let descriptor = caps.as_ref().and_then(|caps| descriptor_from_caps(caps));
        if let Err(error) = pad_session.pad_added(pad, descriptor.as_ref()) {
            log::debug!("Pad {} left unrouted: {error}", pad.name());
        }
    });

    let autoplug_session = Arc::clone(session);
    decoder.connect("autoplug-continue", false, move |values| {
        let caps = values.get(2).and_then(|value| value.get::<gst::Caps>().ok());
        let descriptor = caps.as_ref().and_then(|caps| descriptor_from_caps(caps));
        Some(autoplug_session.autoplug_continue(descriptor.as_ref()).to_value())
    });

    let bin = decoder
        .downcast_ref::<gst::Bin>()
        .ok_or_else(|| SieveError::Engine(format!("{DECODER_FACTORY} is not a bin")))?;
    watch_element_added(bin, Arc::clone(session));
    Ok(())
}

fn watch_element_added(bin: &gst::Bin, session: Arc<SieveSession<GstGraph>>) {
    bin.connect_element_added(move |_bin, element| {
        if session.element_added(element) == InterceptAction::Subscribe
            && let Some(nested) = element.downcast_ref::<gst::Bin>()
        {
            watch_element_added(nested, Arc::clone(&session));
        }
    });
}

fn descriptor_from_caps(caps: &gst::CapsRef) -> Option<StreamDescriptor> {
    let structure = caps.structure(0)?;
    Some(StreamDescriptor::new(structure.name().as_str()).with_details(caps.to_string()))
}

fn deliver_sample(
    appsink: &gst_app::AppSink,
    dispatch: &CaptureDispatch,
) -> Result<gst::FlowSuccess, gst::FlowError> {
    let sample = appsink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
    let buffer = sample.buffer().ok_or_else(|| {
        log::error!("Sample on branch {} has no buffer", dispatch.branch());
        gst::FlowError::Error
    })?;

    // The mapping is released when `map` drops, on every return path.
    let map = buffer.map_readable().map_err(|error| {
        log::error!("Failed to map buffer on branch {}: {error}", dispatch.branch());
        gst::FlowError::Error
    })?;
    let encoded = EncodedBuffer {
        pts: buffer.pts().map(|pts| Duration::from_nanos(pts.nseconds())),
        data: map.as_slice(),
        flags: BufferFlags::from_bits(buffer.flags().bits()),
    };

    match dispatch.deliver(&encoded) {
        SinkFlow::Continue => Ok(gst::FlowSuccess::Ok),
        SinkFlow::Halt => Err(gst::FlowError::Eos),
    }
}

fn bus_event_from(message: &gst::Message) -> BusEvent {
    use gst::MessageView;

    let source = message.src().map(|src| src.path_string().to_string());
    match message.view() {
        MessageView::Eos(..) => BusEvent::EndOfStream,
        MessageView::Error(error) => BusEvent::Error {
            source,
            message: error.error().to_string(),
            debug: error.debug().map(|debug| debug.to_string()),
        },
        MessageView::Warning(warning) => BusEvent::Warning {
            source,
            message: warning.error().to_string(),
            debug: warning.debug().map(|debug| debug.to_string()),
        },
        _ => BusEvent::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::PRESERVE_TIMESTAMPS_PROPERTY;
    use crate::sink::{DiagnosticSink, DiagnosticStyle};

    #[test]
    fn missing_factory_is_environment_error() {
        gst::init().expect("gstreamer init");
        let error = make_element("audiosieve-no-such-decoder").unwrap_err();
        assert!(matches!(error, SieveError::ElementMissing { .. }));
        assert_eq!(
            error.to_string(),
            "'audiosieve-no-such-decoder' gstreamer plugin missing"
        );
    }

    #[test]
    fn caps_become_descriptors() {
        gst::init().expect("gstreamer init");
        let caps = gst::Caps::builder("audio/x-raw")
            .field("rate", 44_100i32)
            .build();
        let descriptor = descriptor_from_caps(&caps).expect("descriptor");
        assert_eq!(descriptor.media_type(), "audio/x-raw");
        assert!(descriptor.is_raw_audio());
        assert!(descriptor.details().is_some_and(|details| details.contains("44100")));

        assert!(descriptor_from_caps(&gst::Caps::new_empty()).is_none());
    }

    #[test]
    fn tsdemux_property_is_checked() {
        gst::init().expect("gstreamer init");
        let queue = make_element("queue").expect("coreelements installed");
        assert!(queue.set_bool_property("preserve-mpegts-timestamps", true).is_err());
        assert!(queue.set_bool_property("leaky", true).is_err());
        assert!(queue.set_bool_property("flush-on-eos", true).is_ok());
    }

    fn test_sink() -> Arc<dyn BufferSink> {
        Arc::new(DiagnosticSink::new(Vec::new(), DiagnosticStyle::Text))
    }

    #[test]
    fn decoder_is_checked_before_input() {
        let result = SievePipeline::with_decoder(
            "audiosieve-no-such-decoder",
            "no/such/dir/recording.ts",
            SieveOptions::new(),
            test_sink(),
        );
        assert!(matches!(result, Err(SieveError::ElementMissing { .. })));
    }

    #[test]
    fn nested_demuxers_are_tuned() {
        gst::init().expect("gstreamer init");
        let (Ok(outer), Ok(inner), Ok(demux), Ok(hidden)) = (
            make_element("decodebin"),
            make_element("decodebin"),
            make_element("tsdemux"),
            make_element("tsdemux"),
        ) else {
            return;
        };

        let pipeline = gst::Pipeline::new();
        let session = Arc::new(SieveSession::new(
            GstGraph::new(&pipeline),
            SieveOptions::new(),
            test_sink(),
        ));
        pipeline.add(&outer).expect("add decodebin");
        let outer_bin = outer.downcast_ref::<gst::Bin>().expect("decodebin is a bin");
        watch_element_added(outer_bin, Arc::clone(&session));

        // decodebin > decodebin > tsdemux
        let inner_bin = inner.downcast_ref::<gst::Bin>().expect("decodebin is a bin");
        outer_bin.add(&inner).expect("add nested decodebin");
        inner_bin.add(&demux).expect("add tsdemux");
        assert!(demux.property::<bool>(PRESERVE_TIMESTAMPS_PROPERTY));

        // decodebin > bin > tsdemux: plain bins are not followed
        let plain = gst::Bin::new();
        outer_bin.add(&plain).expect("add plain bin");
        plain.add(&hidden).expect("add tsdemux");
        assert!(!hidden.property::<bool>(PRESERVE_TIMESTAMPS_PROPERTY));
    }
}
