//! The typed listener the engine calls into.
//!
//! [`SieveSession`] binds the autoplug, interception, routing and bus
//! policies to one [`MediaGraph`]. The GStreamer backend forwards each
//! signal to the matching method; tests call the same methods directly.
//!
//! All methods take `&self` and may run concurrently on engine threads.
//! Shared state is limited to atomics and the monitor's write-once outcome.

use std::sync::{
    Arc,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

use crate::autoplug::autoplug_continue;
use crate::bus::{BusAction, BusEvent, BusMonitor, RunOutcome};
use crate::caps::StreamDescriptor;
use crate::chain::build_transcode_chain;
use crate::config::SieveOptions;
use crate::error::SieveError;
use crate::graph::MediaGraph;
use crate::interceptor::{InterceptAction, InterceptedElement, intercept};
use crate::router::{PadRoute, connect_to_discard, route_for};
use crate::sink::{BufferSink, CaptureDispatch};

/// Counters describing what a session has done so far.
#[derive(Debug, Default)]
pub struct SessionStats {
    transcode_chains: AtomicUsize,
    discard_sinks: AtomicUsize,
    buffers: AtomicU64,
    finished_branches: AtomicUsize,
}

impl SessionStats {
    /// Transcode chains built.
    pub fn transcode_chains(&self) -> usize {
        self.transcode_chains.load(Ordering::Acquire)
    }

    /// Discard sinks connected.
    pub fn discard_sinks(&self) -> usize {
        self.discard_sinks.load(Ordering::Acquire)
    }

    /// Encoded buffers handed to the application.
    pub fn buffers(&self) -> u64 {
        self.buffers.load(Ordering::Acquire)
    }

    /// Branches that reached end-of-stream.
    pub fn finished_branches(&self) -> usize {
        self.finished_branches.load(Ordering::Acquire)
    }

    pub(crate) fn record_buffer(&self) {
        self.buffers.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_branch_eos(&self) {
        self.finished_branches.fetch_add(1, Ordering::AcqRel);
    }
}

/// Orchestration state for one pipeline run.
pub struct SieveSession<G: MediaGraph> {
    graph: G,
    options: SieveOptions,
    sink: Arc<dyn BufferSink>,
    monitor: Arc<BusMonitor>,
    stats: Arc<SessionStats>,
    next_branch: AtomicUsize,
}

impl<G: MediaGraph> SieveSession<G> {
    /// Create a session wiring branches into `graph` and delivering encoded
    /// audio to `sink`.
    pub fn new(graph: G, options: SieveOptions, sink: Arc<dyn BufferSink>) -> Self {
        Self {
            graph,
            options,
            sink,
            monitor: Arc::new(BusMonitor::new()),
            stats: Arc::new(SessionStats::default()),
            next_branch: AtomicUsize::new(0),
        }
    }

    /// The graph branches are built into.
    pub fn graph(&self) -> &G {
        &self.graph
    }

    /// The session options.
    pub fn options(&self) -> &SieveOptions {
        &self.options
    }

    /// Counters for this session.
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// The bus monitor deciding the run outcome.
    pub fn monitor(&self) -> &BusMonitor {
        &self.monitor
    }

    /// `autoplug-continue`: should the decoder keep decoding this stream?
    pub fn autoplug_continue(&self, caps: Option<&StreamDescriptor>) -> bool {
        let decision = caps.is_some_and(autoplug_continue);
        match caps {
            Some(caps) => log::debug!("Autoplug {caps}: continue={decision}"),
            None => log::debug!("Autoplug without caps: continue={decision}"),
        }
        decision
    }

    /// `element-added`: tune the element, or ask the caller to subscribe.
    pub fn element_added<E: InterceptedElement + ?Sized>(&self, element: &E) -> InterceptAction {
        intercept(element, &self.options)
    }

    /// `pad-added`: route the pad to exactly one consumer.
    ///
    /// Wiring errors are reported through [`MediaGraph::report_error`]
    /// before being returned, so the run ends through the bus monitor.
    pub fn pad_added(
        &self,
        pad: &G::Pad,
        caps: Option<&StreamDescriptor>,
    ) -> Result<PadRoute, SieveError> {
        let route = route_for(caps);
        let result = match route {
            PadRoute::Transcode => self.connect_to_transcoding(pad),
            PadRoute::Discard => self.connect_to_discard(pad),
        };

        match result {
            Ok(()) => Ok(route),
            Err(error) => {
                log::error!("Failed to route pad ({route:?}): {error}");
                self.graph.report_error(&error);
                Err(error)
            }
        }
    }

    /// Feed one bus message to the monitor.
    pub fn bus_event(&self, event: &BusEvent) -> BusAction {
        self.monitor.handle(event)
    }

    /// Record an external interruption. Returns `true` if it ended the run.
    pub fn interrupt(&self) -> bool {
        self.monitor.interrupt()
    }

    /// The run outcome, once decided.
    pub fn outcome(&self) -> Option<RunOutcome> {
        self.monitor.outcome().cloned()
    }

    fn connect_to_transcoding(&self, pad: &G::Pad) -> Result<(), SieveError> {
        let branch = self.next_branch.fetch_add(1, Ordering::AcqRel);
        let dispatch = Arc::new(CaptureDispatch::new(
            branch,
            Arc::clone(&self.sink),
            Arc::clone(&self.monitor),
            Arc::clone(&self.stats),
        ));
        build_transcode_chain(&self.graph, pad, dispatch, &self.options)?;
        self.stats.transcode_chains.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn connect_to_discard(&self, pad: &G::Pad) -> Result<(), SieveError> {
        connect_to_discard(&self.graph, pad, &self.options)?;
        self.stats.discard_sinks.fetch_add(1, Ordering::AcqRel);
        log::debug!("Discarding non-audio pad");
        Ok(())
    }
}
