//! Bus monitoring.
//!
//! The pipeline bus carries end-of-stream, error and status messages from
//! every element. [`BusMonitor`] reduces that stream to a single terminal
//! [`RunOutcome`] and tells the run loop when to quit. It records only the
//! first terminal event, so a burst of errors from several elements still
//! ends the run exactly once.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::OnceLock;

/// A pipeline-wide message, detached from the engine's message type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// Every sink reached end-of-stream.
    EndOfStream,
    /// An element reported a fatal error.
    Error {
        /// Path of the element that posted the error, if known.
        source: Option<String>,
        /// Human-readable message.
        message: String,
        /// Extended debug text.
        debug: Option<String>,
    },
    /// An element reported a non-fatal problem.
    Warning {
        /// Path of the element that posted the warning, if known.
        source: Option<String>,
        /// Human-readable message.
        message: String,
        /// Extended debug text.
        debug: Option<String>,
    },
    /// Any message the monitor does not act on.
    Other,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// End-of-stream reached the pipeline.
    Completed,
    /// The engine reported an error.
    Failed {
        /// Path of the element that posted the error, if known.
        source: Option<String>,
        /// Human-readable message.
        message: String,
        /// Extended debug text.
        debug: Option<String>,
    },
    /// The run was interrupted from outside (e.g. Ctrl-C).
    Interrupted,
}

impl RunOutcome {
    /// `true` unless the engine reported an error.
    pub fn is_success(&self) -> bool {
        !matches!(self, RunOutcome::Failed { .. })
    }
}

impl Display for RunOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            RunOutcome::Completed => write!(f, "End-of-stream"),
            RunOutcome::Failed { message, debug, .. } => {
                write!(f, "Error: {message}: {}", debug.as_deref().unwrap_or("no debug info"))
            }
            RunOutcome::Interrupted => write!(f, "Interrupted"),
        }
    }
}

/// What the run loop should do after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusAction {
    /// Keep watching the bus.
    Continue,
    /// Exit the run loop.
    Quit,
}

/// Reduces bus messages to one terminal outcome.
#[derive(Debug, Default)]
pub struct BusMonitor {
    outcome: OnceLock<RunOutcome>,
}

impl BusMonitor {
    /// A monitor with no outcome yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle one bus message.
    ///
    /// Returns [`BusAction::Quit`] for the first end-of-stream or error and
    /// [`BusAction::Continue`] for everything else, including terminal
    /// messages that arrive after the outcome was decided.
    pub fn handle(&self, event: &BusEvent) -> BusAction {
        match event {
            BusEvent::EndOfStream => self.finish(RunOutcome::Completed),
            BusEvent::Error {
                source,
                message,
                debug,
            } => {
                log::debug!(
                    "Error from {}: {message}",
                    source.as_deref().unwrap_or("pipeline")
                );
                self.finish(RunOutcome::Failed {
                    source: source.clone(),
                    message: message.clone(),
                    debug: debug.clone(),
                })
            }
            BusEvent::Warning {
                source,
                message,
                debug,
            } => {
                log::warn!(
                    "Warning from {}: {message} ({})",
                    source.as_deref().unwrap_or("pipeline"),
                    debug.as_deref().unwrap_or("no debug info")
                );
                BusAction::Continue
            }
            BusEvent::Other => BusAction::Continue,
        }
    }

    /// Record an external interruption.
    ///
    /// Returns `true` if this call decided the outcome.
    pub fn interrupt(&self) -> bool {
        self.finish(RunOutcome::Interrupted) == BusAction::Quit
    }

    /// `true` once a terminal outcome is recorded.
    pub fn is_finished(&self) -> bool {
        self.outcome.get().is_some()
    }

    /// The recorded outcome, if any.
    pub fn outcome(&self) -> Option<&RunOutcome> {
        self.outcome.get()
    }

    fn finish(&self, outcome: RunOutcome) -> BusAction {
        match self.outcome.set(outcome) {
            Ok(()) => BusAction::Quit,
            Err(ignored) => {
                log::debug!("Run already finished, ignoring {ignored:?}");
                BusAction::Continue
            }
        }
    }
}
