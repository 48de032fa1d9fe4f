use crawlmap_markup::{Clickable, FormControls, FramePath};

use crate::state::StateId;

pub type EdgeId = u32;

/// An action not yet inserted into the graph: no id, no destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeDraft {
    pub source: StateId,
    pub clickable: Clickable,
    /// Controls filled before firing, carrying their chosen values.
    pub controls: FormControls,
    pub frame: FramePath,
}

impl EdgeDraft {
    pub fn new(source: StateId, clickable: Clickable, frame: FramePath) -> Self {
        Self {
            source,
            clickable,
            controls: FormControls::default(),
            frame,
        }
    }

    pub fn with_controls(mut self, controls: FormControls) -> Self {
        self.controls = controls;
        self
    }
}

/// An applied action between two states. Immutable once inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub id: EdgeId,
    pub source: StateId,
    pub destination: StateId,
    pub clickable: Clickable,
    pub controls: FormControls,
    pub frame: FramePath,
}

impl Edge {
    /// A draft replaying this edge's action and values from `source`.
    pub fn replay_from(&self, source: StateId) -> EdgeDraft {
        EdgeDraft {
            source,
            clickable: self.clickable.clone(),
            controls: self.controls.clone(),
            frame: self.frame.clone(),
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.destination
    }
}

/// An action that left the target site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Excursion {
    pub source: StateId,
    pub clickable: Clickable,
    pub controls: FormControls,
    pub frame: FramePath,
    /// The out-of-domain URL the action led to.
    pub url: String,
}
