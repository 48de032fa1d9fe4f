//! The state/edge graph of an explored application.
//!
//! States and edges live in arenas indexed by dense ids; the
//! [`FingerprintIndex`] decides whether an observation is a new state.

pub mod edge;
pub mod graph;
pub mod index;
pub mod record;
pub mod state;

pub use edge::{Edge, EdgeDraft, EdgeId, Excursion};
pub use graph::{GraphError, StateGraph, Trace, TraceLimits};
pub use index::{FingerprintIndex, DEFAULT_BUCKET_COUNT};
pub use record::{
    AutomataRecord, EdgeRecord, ExcursionRecord, Framed, RecordLayout, StateRecord, StateSummary,
    TraceRecord, TracesRecord,
};
pub use state::{MarkupFragment, Observation, State, StateId};
