//! Serializable forms of the graph: `automata.json` and `traces.json`.
//!
//! Records read back as well as they write, so a later run can replay an
//! earlier run's traces.

use serde::{Deserialize, Serialize};

use crawlmap_markup::{
    CheckboxGroup, Clickable, FormControls, FramePath, InputField, RadioGroup, SelectField,
};

use crate::edge::{Edge, EdgeDraft, EdgeId};
use crate::graph::{GraphError, StateGraph, Trace};
use crate::state::{State, StateId};

/// Where per-state artifacts live, relative to the run directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordLayout {
    pub dom_dir: String,
    pub state_screenshot_dir: String,
}

impl Default for RecordLayout {
    fn default() -> Self {
        Self {
            dom_dir: "dom".to_string(),
            state_screenshot_dir: "screenshot/state".to_string(),
        }
    }
}

impl RecordLayout {
    pub fn dom_path(&self, id: StateId) -> String {
        format!("{}/{id}/{id}.txt", self.dom_dir)
    }

    pub fn img_path(&self, id: StateId) -> String {
        format!("{}/{id}.png", self.state_screenshot_dir)
    }
}

/// Items found in one frame; `iframe_list` is null for the top document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Framed<T> {
    pub iframe_list: Option<FramePath>,
    pub items: Vec<T>,
}

impl<T> Framed<T> {
    fn new(frame: &FramePath, items: Vec<T>) -> Self {
        Self {
            iframe_list: (!frame.is_top()).then(|| frame.clone()),
            items,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    pub id: StateId,
    pub url: String,
    pub depth: usize,
    pub dom_path: String,
    pub img_path: String,
    /// Elements fired from the state.
    pub clickable: Vec<Framed<Clickable>>,
    pub inputs: Vec<Framed<InputField>>,
    pub selects: Vec<Framed<SelectField>>,
    pub radios: Vec<Framed<RadioGroup>>,
    pub checkboxes: Vec<Framed<CheckboxGroup>>,
}

impl StateRecord {
    pub fn from_state(state: &State, layout: &RecordLayout) -> Self {
        let controls = state.all_controls();
        Self {
            id: state.id,
            url: state.url().to_string(),
            depth: state.depth(),
            dom_path: layout.dom_path(state.id),
            img_path: layout.img_path(state.id),
            clickable: state
                .fired()
                .iter()
                .map(|(frame, list)| Framed::new(frame, list.clone()))
                .collect(),
            inputs: controls
                .iter()
                .map(|(frame, c)| Framed::new(frame, c.inputs.clone()))
                .collect(),
            selects: controls
                .iter()
                .map(|(frame, c)| Framed::new(frame, c.selects.clone()))
                .collect(),
            radios: controls
                .iter()
                .map(|(frame, c)| Framed::new(frame, c.radios.clone()))
                .collect(),
            checkboxes: controls
                .iter()
                .map(|(frame, c)| Framed::new(frame, c.checkboxes.clone()))
                .collect(),
        }
    }
}

/// The short state form used inside traces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSummary {
    pub id: StateId,
    pub url: String,
    pub depth: usize,
    pub dom_path: String,
    pub img_path: String,
}

impl StateSummary {
    pub fn from_state(state: &State, layout: &RecordLayout) -> Self {
        Self {
            id: state.id,
            url: state.url().to_string(),
            depth: state.depth(),
            dom_path: layout.dom_path(state.id),
            img_path: layout.img_path(state.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: EdgeId,
    pub from: StateId,
    pub to: StateId,
    pub clickable: Clickable,
    pub inputs: Vec<InputField>,
    pub selects: Vec<SelectField>,
    pub checkboxes: Vec<CheckboxGroup>,
    pub radios: Vec<RadioGroup>,
    pub iframe_list: Option<FramePath>,
}

impl EdgeRecord {
    pub fn from_edge(edge: &Edge) -> Self {
        Self {
            id: edge.id,
            from: edge.source,
            to: edge.destination,
            clickable: edge.clickable.clone(),
            inputs: edge.controls.inputs.clone(),
            selects: edge.controls.selects.clone(),
            checkboxes: edge.controls.checkboxes.clone(),
            radios: edge.controls.radios.clone(),
            iframe_list: (!edge.frame.is_top()).then(|| edge.frame.clone()),
        }
    }

    pub fn controls(&self) -> FormControls {
        FormControls {
            inputs: self.inputs.clone(),
            selects: self.selects.clone(),
            checkboxes: self.checkboxes.clone(),
            radios: self.radios.clone(),
        }
    }

    /// A draft re-applying this recorded action from `source`.
    pub fn to_draft(&self, source: StateId) -> EdgeDraft {
        EdgeDraft::new(
            source,
            self.clickable.clone(),
            self.iframe_list.clone().unwrap_or_default(),
        )
        .with_controls(self.controls())
    }
}

/// An out-of-domain action in `automata.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcursionRecord {
    pub from: StateId,
    pub url: String,
    pub clickable: Clickable,
    pub iframe_list: Option<FramePath>,
}

/// `automata.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomataRecord {
    pub state: Vec<StateRecord>,
    pub edge: Vec<EdgeRecord>,
    #[serde(default)]
    pub excursion: Vec<ExcursionRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub states: Vec<StateSummary>,
    pub edges: Vec<EdgeRecord>,
}

/// `traces.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracesRecord {
    pub traces: Vec<TraceRecord>,
}

impl StateGraph {
    pub fn automata_record(&self, layout: &RecordLayout) -> AutomataRecord {
        AutomataRecord {
            state: self
                .states()
                .iter()
                .map(|s| StateRecord::from_state(s, layout))
                .collect(),
            edge: self.edges().iter().map(EdgeRecord::from_edge).collect(),
            excursion: self
                .excursions()
                .iter()
                .map(|x| ExcursionRecord {
                    from: x.source,
                    url: x.url.clone(),
                    clickable: x.clickable.clone(),
                    iframe_list: (!x.frame.is_top()).then(|| x.frame.clone()),
                })
                .collect(),
        }
    }

    pub fn trace_record(&self, trace: &Trace, layout: &RecordLayout) -> Result<TraceRecord, GraphError> {
        let states = trace
            .states
            .iter()
            .map(|id| {
                self.state(*id)
                    .map(|s| StateSummary::from_state(s, layout))
                    .ok_or(GraphError::UnknownState(*id))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let edges = trace
            .edges
            .iter()
            .map(|id| {
                self.edge(*id)
                    .map(EdgeRecord::from_edge)
                    .ok_or(GraphError::UnknownEdge(*id))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TraceRecord { states, edges })
    }

    pub fn traces_record(&self, traces: &[Trace], layout: &RecordLayout) -> Result<TracesRecord, GraphError> {
        let traces = traces
            .iter()
            .map(|t| self.trace_record(t, layout))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TracesRecord { traces })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = RecordLayout::default();
        assert_eq!(layout.dom_path(4), "dom/4/4.txt");
        assert_eq!(layout.img_path(4), "screenshot/state/4.png");
    }

    #[test]
    fn test_edge_record_field_names() {
        let record = EdgeRecord {
            id: 0,
            from: 0,
            to: 1,
            clickable: Clickable {
                id: Some("go".to_string()),
                name: None,
                xpath: "/html[1]/body[1]/a[1]".to_string(),
                tag: "a".to_string(),
            },
            inputs: vec![],
            selects: vec![],
            checkboxes: vec![],
            radios: vec![],
            iframe_list: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["from"], 0);
        assert_eq!(json["to"], 1);
        assert!(json["iframe_list"].is_null());
        assert_eq!(json["clickable"]["tag"], "a");

        let draft = record.to_draft(5);
        assert_eq!(draft.source, 5);
        assert!(draft.frame.is_top());
    }
}
