//! Structured crawl events.
//!
//! The engine never logs directly: it emits [`CrawlEvent`]s into an
//! injected [`EventSink`]. [`TracingSink`] forwards them to `tracing`;
//! [`RecordingSink`] keeps them for inspection.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crawlmap_model::StateId;

use crate::backtrack::{BacktrackOutcome, Tactic};
use crate::crawler::TraceEnd;
use crate::strategy::Divergence;

#[derive(Debug, Clone, PartialEq)]
pub enum CrawlEvent {
    TraceStarted {
        trace: usize,
        initial: StateId,
    },
    TraceFinished {
        trace: usize,
        actions: usize,
        end: TraceEnd,
    },
    /// An element was fired from `source`.
    ActionFired {
        source: StateId,
        element: String,
        frame: String,
    },
    StateAdded {
        state: StateId,
        url: String,
        depth: usize,
    },
    StateRevisited {
        state: StateId,
        depth: usize,
    },
    SameState {
        state: StateId,
    },
    OutOfDomain {
        source: StateId,
        url: String,
    },
    TacticTried {
        target: StateId,
        tactic: Tactic,
        restored: bool,
    },
    Backtracked {
        target: StateId,
        outcome: BacktrackOutcome,
    },
    /// A restart replay reached a different state than the recorded edge.
    ReplayMismatch {
        target: StateId,
        step: usize,
        expected: StateId,
    },
    /// The current state could not be identified after a failed backtrack.
    Desynchronized {
        url: String,
    },
    Divergence(Divergence),
    /// A driver call failed and was skipped.
    DriverFault {
        session: usize,
        operation: &'static str,
        message: String,
    },
    ArchiveFault {
        state: StateId,
        message: String,
    },
    BudgetExhausted {
        elapsed_secs: u64,
    },
}

/// Receiver of crawl events.
pub trait EventSink {
    fn emit(&mut self, event: CrawlEvent);
}

/// Forwards events to `tracing` with structured fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: CrawlEvent) {
        match event {
            CrawlEvent::TraceStarted { trace, initial } => {
                info!(trace, initial, "trace started");
            }
            CrawlEvent::TraceFinished { trace, actions, end } => {
                info!(trace, actions, end = ?end, "trace finished");
            }
            CrawlEvent::ActionFired {
                source,
                element,
                frame,
            } => {
                debug!(source, %element, %frame, "fire");
            }
            CrawlEvent::StateAdded { state, url, depth } => {
                info!(state, %url, depth, "new state");
            }
            CrawlEvent::StateRevisited { state, depth } => {
                debug!(state, depth, "revisited state");
            }
            CrawlEvent::SameState { state } => {
                debug!(state, "same state");
            }
            CrawlEvent::OutOfDomain { source, url } => {
                info!(source, %url, "left the domain");
            }
            CrawlEvent::TacticTried {
                target,
                tactic,
                restored,
            } => {
                debug!(target, tactic = ?tactic, restored, "backtrack tactic");
            }
            CrawlEvent::Backtracked { target, outcome } => match outcome {
                BacktrackOutcome::Restored(tactic) => {
                    debug!(target, tactic = ?tactic, "backtrack restored")
                }
                BacktrackOutcome::Exhausted => warn!(target, "backtrack exhausted"),
                BacktrackOutcome::TimedOut => warn!(target, "backtrack timed out"),
            },
            CrawlEvent::ReplayMismatch {
                target,
                step,
                expected,
            } => {
                warn!(target, step, expected, "restart replay mismatch");
            }
            CrawlEvent::Desynchronized { url } => {
                warn!(%url, "current page matches no known state");
            }
            CrawlEvent::Divergence(d) => {
                warn!(
                    state = d.state,
                    primary_url = %d.primary_url,
                    secondary_url = %d.secondary_url,
                    only_primary = d.only_primary.len(),
                    only_secondary = d.only_secondary.len(),
                    "sessions diverged"
                );
            }
            CrawlEvent::DriverFault {
                session,
                operation,
                message,
            } => {
                warn!(session, operation, "driver call failed: {message}");
            }
            CrawlEvent::ArchiveFault { state, message } => {
                warn!(state, "archiving failed: {message}");
            }
            CrawlEvent::BudgetExhausted { elapsed_secs } => {
                info!(elapsed_secs, "time budget exhausted");
            }
        }
    }
}

/// Keeps every event. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<CrawlEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CrawlEvent> {
        self.events
            .lock()
            .map(|e| e.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: CrawlEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Forward to several sinks.
impl EventSink for Vec<Box<dyn EventSink>> {
    fn emit(&mut self, event: CrawlEvent) {
        for sink in self.iter_mut() {
            sink.emit(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_clones_share_buffer() {
        let sink = RecordingSink::new();
        let mut handle = sink.clone();
        handle.emit(CrawlEvent::SameState { state: 3 });
        assert_eq!(sink.events(), vec![CrawlEvent::SameState { state: 3 }]);
    }

    #[test]
    fn test_fan_out() {
        let recorder = RecordingSink::new();
        let mut sinks: Vec<Box<dyn EventSink>> =
            vec![Box::new(recorder.clone()), Box::new(TracingSink)];
        sinks.emit(CrawlEvent::BudgetExhausted { elapsed_secs: 1 });
        assert_eq!(recorder.events().len(), 1);
    }
}
