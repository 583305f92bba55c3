//! Shared fixtures: a recording [`MediaGraph`], mock elements for the
//! interceptor and a recording [`BufferSink`].

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use audiosieve::{
    BufferSink, CaptureDispatch, EncodedBuffer, InterceptedElement, MediaGraph, SieveError,
    SieveOptions, SieveSession, SinkFlow,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MockElement {
    pub id: usize,
    pub factory: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockPad {
    pub name: String,
}

impl MockPad {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[derive(Default)]
pub struct GraphLog {
    pub added: Vec<MockElement>,
    pub links: Vec<(MockElement, MockElement)>,
    pub pad_links: Vec<(String, MockElement)>,
    pub synced: Vec<MockElement>,
    pub captures: Vec<(MockElement, bool, Arc<CaptureDispatch>)>,
    pub errors: Vec<String>,
}

/// Records every graph operation. Factories listed in `missing` cannot be
/// created; links into factories listed in `failing_links` fail.
#[derive(Default)]
pub struct MockGraph {
    next_id: AtomicUsize,
    missing: HashSet<String>,
    failing_links: HashSet<String>,
    log: Mutex<GraphLog>,
}

impl MockGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_factory(mut self, factory: &str) -> Self {
        self.missing.insert(factory.to_string());
        self
    }

    pub fn failing_link_into(mut self, factory: &str) -> Self {
        self.failing_links.insert(factory.to_string());
        self
    }

    pub fn log(&self) -> std::sync::MutexGuard<'_, GraphLog> {
        self.log.lock().expect("graph log poisoned")
    }

    pub fn added_factories(&self) -> Vec<String> {
        self.log()
            .added
            .iter()
            .map(|element| element.factory.clone())
            .collect()
    }

    pub fn count_added(&self, factory: &str) -> usize {
        self.log()
            .added
            .iter()
            .filter(|element| element.factory == factory)
            .count()
    }

    pub fn dispatch(&self, index: usize) -> Arc<CaptureDispatch> {
        Arc::clone(&self.log().captures[index].2)
    }

    fn link_result(&self, upstream: String, downstream: &MockElement) -> Result<(), SieveError> {
        if self.failing_links.contains(&downstream.factory) {
            return Err(SieveError::PipelineLink {
                upstream,
                downstream: downstream.factory.clone(),
                reason: "incompatible caps".to_string(),
            });
        }
        Ok(())
    }
}

impl MediaGraph for MockGraph {
    type Element = MockElement;
    type Pad = MockPad;

    fn make_element(&self, factory: &str) -> Result<MockElement, SieveError> {
        if self.missing.contains(factory) {
            return Err(SieveError::ElementMissing {
                factory: factory.to_string(),
            });
        }
        Ok(MockElement {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            factory: factory.to_string(),
        })
    }

    fn add(&self, element: &MockElement) -> Result<(), SieveError> {
        self.log().added.push(element.clone());
        Ok(())
    }

    fn link(&self, upstream: &MockElement, downstream: &MockElement) -> Result<(), SieveError> {
        self.link_result(upstream.factory.clone(), downstream)?;
        self.log().links.push((upstream.clone(), downstream.clone()));
        Ok(())
    }

    fn link_pad(&self, pad: &MockPad, downstream: &MockElement) -> Result<(), SieveError> {
        self.link_result(pad.name.clone(), downstream)?;
        self.log()
            .pad_links
            .push((pad.name.clone(), downstream.clone()));
        Ok(())
    }

    fn sync_state(&self, element: &MockElement) -> Result<(), SieveError> {
        self.log().synced.push(element.clone());
        Ok(())
    }

    fn attach_capture(
        &self,
        sink: &MockElement,
        sync: bool,
        dispatch: Arc<CaptureDispatch>,
    ) -> Result<(), SieveError> {
        self.log().captures.push((sink.clone(), sync, dispatch));
        Ok(())
    }

    fn report_error(&self, error: &SieveError) {
        self.log().errors.push(error.to_string());
    }
}

/// An element in a mock decoder tree.
pub struct MockNode {
    pub type_name: String,
    pub name: String,
    pub bool_properties: Mutex<HashMap<String, bool>>,
    pub children: Vec<MockNode>,
}

impl MockNode {
    pub fn new(type_name: &str, name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            name: name.to_string(),
            bool_properties: Mutex::new(HashMap::new()),
            children: Vec::new(),
        }
    }

    /// A `tsdemux` exposing the timestamp property, initially off.
    pub fn tsdemux(name: &str) -> Self {
        let node = Self::new("GstTSDemux", name);
        node.bool_properties
            .lock()
            .expect("properties poisoned")
            .insert("preserve-mpegts-timestamps".to_string(), false);
        node
    }

    pub fn with_child(mut self, child: MockNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn property(&self, name: &str) -> Option<bool> {
        self.bool_properties
            .lock()
            .expect("properties poisoned")
            .get(name)
            .copied()
    }
}

impl InterceptedElement for MockNode {
    fn type_name(&self) -> String {
        self.type_name.clone()
    }

    fn element_name(&self) -> String {
        self.name.clone()
    }

    fn set_bool_property(&self, property: &str, value: bool) -> Result<(), SieveError> {
        let mut properties = self.bool_properties.lock().expect("properties poisoned");
        match properties.get_mut(property) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(SieveError::Engine(format!(
                "{} has no property {property}",
                self.name
            ))),
        }
    }
}

/// Replay element-added signals for `bin`'s children the way the backend
/// does: only bins that were subscribed to report their own children.
/// Returns the names of every element the session saw.
pub fn replay_element_added<G: MediaGraph>(session: &SieveSession<G>, bin: &MockNode) -> Vec<String> {
    let mut seen = Vec::new();
    for child in &bin.children {
        seen.push(child.name.clone());
        if session.element_added(child) == audiosieve::InterceptAction::Subscribe {
            seen.extend(replay_element_added(session, child));
        }
    }
    seen
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedBuffer {
    pub branch: usize,
    pub pts: Option<Duration>,
    pub size: usize,
    pub first_byte: Option<u8>,
}

/// Records everything it receives. Halts after `halt_after` buffers when
/// set.
#[derive(Default)]
pub struct RecordingSink {
    pub buffers: Mutex<Vec<RecordedBuffer>>,
    pub eos: Mutex<Vec<usize>>,
    pub halt_after: Option<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffers(&self) -> Vec<RecordedBuffer> {
        self.buffers.lock().expect("buffers poisoned").clone()
    }

    pub fn eos(&self) -> Vec<usize> {
        self.eos.lock().expect("eos poisoned").clone()
    }
}

impl BufferSink for RecordingSink {
    fn on_buffer(&self, branch: usize, buffer: &EncodedBuffer<'_>) -> SinkFlow {
        let mut buffers = self.buffers.lock().expect("buffers poisoned");
        buffers.push(RecordedBuffer {
            branch,
            pts: buffer.pts,
            size: buffer.data.len(),
            first_byte: buffer.first_byte(),
        });
        match self.halt_after {
            Some(limit) if buffers.len() >= limit => SinkFlow::Halt,
            _ => SinkFlow::Continue,
        }
    }

    fn on_eos(&self, branch: usize) {
        self.eos.lock().expect("eos poisoned").push(branch);
    }
}

pub fn session_with(
    graph: MockGraph,
    options: SieveOptions,
) -> (SieveSession<MockGraph>, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let session = SieveSession::new(graph, options, Arc::clone(&sink) as Arc<dyn BufferSink>);
    (session, sink)
}
