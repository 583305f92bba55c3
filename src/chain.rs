//! Transcode chain construction.
//!
//! Each raw-audio pad gets its own branch:
//!
//! ```text
//! pad ! queue ! audioconvert ! audiorate ! audioresample ! flacenc ! queue ! appsink
//! ```
//!
//! The three converters pass data through untouched when the decoded audio
//! already suits `flacenc`, and convert it otherwise. The queues decouple
//! the decoder, the encoder and the application on separate threads.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::config::{LinkPolicy, SieveOptions};
use crate::error::SieveError;
use crate::graph::MediaGraph;
use crate::sink::CaptureDispatch;

/// One position in the transcode chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainStage {
    /// Queue decoupling the decoder thread.
    InputQueue,
    /// Sample format and channel conversion.
    Convert,
    /// Fills gaps and drops overlaps so timestamps stay contiguous.
    Rate,
    /// Sample-rate conversion.
    Resample,
    /// Lossless FLAC encoder.
    Encode,
    /// Queue decoupling the application thread.
    OutputQueue,
    /// Application-facing capture sink.
    Capture,
}

impl ChainStage {
    /// Every stage, in link order.
    pub const ORDER: [ChainStage; 7] = [
        ChainStage::InputQueue,
        ChainStage::Convert,
        ChainStage::Rate,
        ChainStage::Resample,
        ChainStage::Encode,
        ChainStage::OutputQueue,
        ChainStage::Capture,
    ];

    /// GStreamer factory that implements the stage.
    pub fn factory_name(self) -> &'static str {
        match self {
            ChainStage::InputQueue | ChainStage::OutputQueue => "queue",
            ChainStage::Convert => "audioconvert",
            ChainStage::Rate => "audiorate",
            ChainStage::Resample => "audioresample",
            ChainStage::Encode => "flacenc",
            ChainStage::Capture => "appsink",
        }
    }
}

impl Display for ChainStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.factory_name())
    }
}

/// A fully wired branch.
#[derive(Debug)]
pub struct TranscodeChain<E> {
    branch: usize,
    elements: Vec<(ChainStage, E)>,
}

impl<E> TranscodeChain<E> {
    /// Branch index, also passed to the [`BufferSink`](crate::BufferSink).
    pub fn branch(&self) -> usize {
        self.branch
    }

    /// Stages in link order.
    pub fn stages(&self) -> Vec<ChainStage> {
        self.elements.iter().map(|(stage, _)| *stage).collect()
    }

    /// The element that implements `stage`.
    pub fn element(&self, stage: ChainStage) -> Option<&E> {
        self.elements
            .iter()
            .find(|(candidate, _)| *candidate == stage)
            .map(|(_, element)| element)
    }
}

/// Build, add, link and start one transcode branch behind `pad`.
///
/// Elements are created and added first, then linked in
/// [`ChainStage::ORDER`], then the pad is linked to the input queue and the
/// capture sink is attached. Finally every element is synced with the
/// pipeline state, capture sink first, so data never reaches an element that
/// is not running yet.
///
/// # Errors
///
/// - [`SieveError::ElementMissing`] if a stage's plugin is not installed;
/// - [`SieveError::PipelineLink`] on the first link failure when the
///   policy is [`LinkPolicy::FailFast`];
/// - [`SieveError::StateChange`] if an element cannot follow the pipeline
///   state, under the same policy.
pub fn build_transcode_chain<G: MediaGraph>(
    graph: &G,
    pad: &G::Pad,
    dispatch: Arc<CaptureDispatch>,
    options: &SieveOptions,
) -> Result<TranscodeChain<G::Element>, SieveError> {
    let branch = dispatch.branch();
    log::debug!("Building transcode chain for branch {branch}");

    let mut elements = Vec::with_capacity(ChainStage::ORDER.len());
    for stage in ChainStage::ORDER {
        let element = graph.make_element(stage.factory_name())?;
        graph.add(&element)?;
        elements.push((stage, element));
    }

    for pair in elements.windows(2) {
        let (upstream, downstream) = (&pair[0], &pair[1]);
        checked(
            options.link_policy,
            graph.link(&upstream.1, &downstream.1),
        )?;
    }

    let (_, input_queue) = &elements[0];
    checked(options.link_policy, graph.link_pad(pad, input_queue))?;

    let (_, capture) = &elements[elements.len() - 1];
    graph.attach_capture(capture, options.realtime, dispatch)?;

    for (_, element) in elements.iter().rev() {
        checked(options.link_policy, graph.sync_state(element))?;
    }

    log::info!("Transcode chain for branch {branch} is running");
    Ok(TranscodeChain { branch, elements })
}

/// Apply the link policy to one wiring step.
pub(crate) fn checked(policy: LinkPolicy, result: Result<(), SieveError>) -> Result<(), SieveError> {
    match (result, policy) {
        (Ok(()), _) => Ok(()),
        (Err(error), LinkPolicy::FailFast) => Err(error),
        (Err(error), LinkPolicy::Permissive) => {
            log::warn!("Ignoring wiring failure: {error}");
            Ok(())
        }
    }
}
