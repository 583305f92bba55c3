//! Pad routing.
//!
//! Every pad the decoder exposes goes to exactly one consumer: raw audio to
//! a transcode chain, everything else (encoded video that autoplugging left
//! alone, subtitles, ...) to a fresh discard sink.

use crate::caps::StreamDescriptor;
use crate::chain::checked;
use crate::config::SieveOptions;
use crate::error::SieveError;
use crate::graph::MediaGraph;

/// Factory used to swallow unwanted streams.
pub const DISCARD_SINK_FACTORY: &str = "fakesink";

/// Where a pad is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PadRoute {
    /// Into a new transcode chain.
    Transcode,
    /// Into a new discard sink.
    Discard,
}

/// Pick the route for a pad from its current caps.
///
/// A pad without caps cannot be transcoded and is discarded.
pub fn route_for(caps: Option<&StreamDescriptor>) -> PadRoute {
    match caps {
        Some(caps) if caps.is_raw_audio() => PadRoute::Transcode,
        _ => PadRoute::Discard,
    }
}

/// Connect `pad` to a new discard sink that follows the pipeline state.
///
/// # Errors
///
/// [`SieveError::ElementMissing`] without `fakesink`, and link or state
/// errors under [`LinkPolicy::FailFast`](crate::LinkPolicy::FailFast).
pub fn connect_to_discard<G: MediaGraph>(
    graph: &G,
    pad: &G::Pad,
    options: &SieveOptions,
) -> Result<G::Element, SieveError> {
    let discard = graph.make_element(DISCARD_SINK_FACTORY)?;
    graph.add(&discard)?;
    checked(options.link_policy, graph.link_pad(pad, &discard))?;
    checked(options.link_policy, graph.sync_state(&discard))?;
    Ok(discard)
}
