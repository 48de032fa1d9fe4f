//! Exploration engine.
//!
//! A [`Crawler`] drives one or more browser sessions through a pluggable
//! [`Strategy`]: pick an action, apply it, observe the page, classify it
//! against the [`StateGraph`](crawlmap_model::StateGraph), react. When a
//! session has to return to a known state the [`backtrack`] protocol runs
//! its ordered recovery tactics.

pub mod archive;
pub mod backtrack;
pub mod budget;
pub mod config;
pub mod context;
pub mod crawler;
pub mod domain;
pub mod error;
pub mod event;
pub mod mutation;
pub mod rng;
pub mod strategy;
pub mod values;

pub use archive::{ArchiveLog, MemoryArchive, NullArchive, StateArchive};
pub use backtrack::{backtrack, BacktrackOutcome, Tactic};
pub use budget::TimeBudget;
pub use config::CrawlConfig;
pub use context::{Action, CrawlContext};
pub use crawler::{CrawlReport, Crawler, TraceEnd};
pub use domain::DomainFilter;
pub use error::CrawlError;
pub use event::{CrawlEvent, EventSink, RecordingSink, TracingSink};
pub use mutation::{MutationPlan, MutationTraceRecord, MutationTracesRecord};
pub use strategy::{
    Differential, Divergence, Monkey, Strategy, StrategyExport, StrategyKind, Systematic,
};
pub use values::{DataBank, MemoryDataBank, MutationValue, ValueSynthesizer};
