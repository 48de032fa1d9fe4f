//! Mutation replay.
//!
//! A recorded trace is replayed once as recorded (the baseline) and once
//! per mutation value, each run in a fresh session, with the value typed
//! into every input field along the trace. Runs that reach the same
//! sequence of states form a cluster.

use serde::{Deserialize, Serialize};

use crawlmap_model::{EdgeId, EdgeRecord, RecordLayout, StateId, StateSummary, TracesRecord};

use crate::context::CrawlContext;
use crate::crawler::{classify, Transition};
use crate::error::CrawlError;
use crate::values::{DataBank, MutationValue};

/// Which trace to mutate, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationPlan {
    pub method: u32,
    pub modes: Vec<u32>,
    pub edges: Vec<EdgeRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationTraceRecord {
    pub edges: Vec<EdgeRecord>,
    pub states: Vec<StateSummary>,
    /// State ids reached, joined by `-`. Equal values share a cluster.
    pub cluster_value: String,
    pub baseline: bool,
    /// Label of the mutation value; `None` for the baseline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

/// `mutation_traces.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationTracesRecord {
    pub method: u32,
    pub traces: Vec<MutationTraceRecord>,
}

/// States and edges reached by one replay.
struct Replay {
    mutation: Option<MutationValue>,
    states: Vec<StateId>,
    edges: Vec<EdgeId>,
}

impl Replay {
    fn cluster_value(&self) -> String {
        self.states
            .iter()
            .map(StateId::to_string)
            .collect::<Vec<_>>()
            .join("-")
    }
}

impl MutationPlan {
    /// Plan the mutation of trace `trace_id` of a prior run.
    pub fn from_traces(
        traces: &TracesRecord,
        trace_id: usize,
        method: u32,
        modes: Vec<u32>,
    ) -> Result<Self, CrawlError> {
        let trace = traces.traces.get(trace_id).ok_or_else(|| {
            CrawlError::Mutation(format!(
                "trace {trace_id} not found ({} traces recorded)",
                traces.traces.len()
            ))
        })?;
        Ok(Self {
            method,
            modes,
            edges: trace.edges.clone(),
        })
    }

    /// Values to replay the trace with, one run each.
    pub fn mutation_values(&self, bank: &dyn DataBank) -> Vec<MutationValue> {
        bank.mutation_values(self.method, &self.modes)
    }

    /// The trace's edges with `mutation` typed into every input field.
    pub fn mutate(&self, mutation: &MutationValue) -> Vec<EdgeRecord> {
        self.edges
            .iter()
            .cloned()
            .map(|mut edge| {
                for input in &mut edge.inputs {
                    input.value = Some(mutation.value.clone());
                    input.info = Some(mutation.info.clone());
                }
                edge
            })
            .collect()
    }

    /// Replay the baseline and every mutant, recording into `ctx.graph`.
    pub fn run(
        &self,
        ctx: &mut CrawlContext,
        layout: &RecordLayout,
    ) -> Result<MutationTracesRecord, CrawlError> {
        let mutations = self.mutation_values(ctx.values.bank());
        if mutations.is_empty() {
            return Err(CrawlError::Mutation(format!(
                "no mutation values for method {} and modes {:?}",
                self.method, self.modes
            )));
        }

        let mut replays = Vec::with_capacity(mutations.len() + 1);
        replays.push(replay_in_fresh_session(ctx, &self.edges, None)?);
        for mutation in mutations {
            let edges = self.mutate(&mutation);
            replays.push(replay_in_fresh_session(ctx, &edges, Some(mutation))?);
        }

        let mut clusters: Vec<(String, Vec<&Replay>)> = Vec::new();
        for replay in &replays {
            let value = replay.cluster_value();
            match clusters.iter_mut().find(|(v, _)| *v == value) {
                Some((_, members)) => members.push(replay),
                None => clusters.push((value, vec![replay])),
            }
        }

        let mut traces = Vec::with_capacity(replays.len());
        for (value, members) in &clusters {
            for replay in members {
                let record = MutationTraceRecord {
                    edges: replay
                        .edges
                        .iter()
                        .filter_map(|id| ctx.graph.edge(*id))
                        .map(EdgeRecord::from_edge)
                        .collect(),
                    states: replay
                        .states
                        .iter()
                        .filter_map(|id| ctx.graph.state(*id))
                        .map(|s| StateSummary::from_state(s, layout))
                        .collect(),
                    cluster_value: value.clone(),
                    baseline: replay.mutation.is_none(),
                    info: replay.mutation.as_ref().map(|m| m.info.clone()),
                };
                if record.baseline {
                    traces.insert(0, record);
                } else {
                    traces.push(record);
                }
            }
        }

        Ok(MutationTracesRecord {
            method: self.method,
            traces,
        })
    }
}

fn replay_in_fresh_session(
    ctx: &mut CrawlContext,
    edges: &[EdgeRecord],
    mutation: Option<MutationValue>,
) -> Result<Replay, CrawlError> {
    let result = replay_edges(ctx, edges, mutation);
    ctx.close_sessions();
    result
}

fn replay_edges(
    ctx: &mut CrawlContext,
    edges: &[EdgeRecord],
    mutation: Option<MutationValue>,
) -> Result<Replay, CrawlError> {
    ctx.start_sessions()?;
    let seen = ctx.observe(0)?;
    let (initial, is_new) = ctx.graph.set_initial(seen, ctx.analyzer.as_ref());
    if is_new {
        ctx.archive_state(initial);
    }

    let mut replay = Replay {
        mutation,
        states: vec![initial],
        edges: Vec::new(),
    };
    let mut at = initial;
    for (depth, record) in edges.iter().enumerate() {
        let Some(before) = ctx.graph.state(at).map(|s| s.observation().clone()) else {
            break;
        };
        let draft = record.to_draft(at);
        ctx.fire(&draft);
        ctx.graph.record_fired(at, &draft.frame, &draft.clickable)?;
        let Some(after) = ctx.observe_primary() else {
            break;
        };
        match classify(ctx, draft, &before, after, depth + 1)? {
            Transition::Same(edge) => replay.edges.push(edge),
            Transition::New(state, edge) | Transition::Revisited(state, edge) => {
                replay.edges.push(edge);
                at = state;
            }
            Transition::OutOfDomain(_) => break,
        }
        replay.states.push(at);
    }
    Ok(replay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crawlmap_markup::{Clickable, InputField};
    use crawlmap_model::TraceRecord;

    fn edge_with_input(id: u32) -> EdgeRecord {
        EdgeRecord {
            id,
            from: id,
            to: id + 1,
            clickable: Clickable {
                id: Some("go".to_string()),
                name: None,
                xpath: "/html[1]/body[1]/button[1]".to_string(),
                tag: "button".to_string(),
            },
            inputs: vec![InputField {
                id: Some("q".to_string()),
                name: Some("q".to_string()),
                xpath: "/html[1]/body[1]/input[1]".to_string(),
                input_type: "text".to_string(),
                value: Some("recorded".to_string()),
                info: None,
            }],
            selects: vec![],
            checkboxes: vec![],
            radios: vec![],
            iframe_list: None,
        }
    }

    #[test]
    fn test_unknown_trace_id_is_rejected() {
        let traces = TracesRecord::default();
        let err = MutationPlan::from_traces(&traces, 2, 1, vec![0]).unwrap_err();
        assert!(matches!(err, CrawlError::Mutation(_)));
    }

    #[test]
    fn test_mutate_rewrites_every_input() {
        let traces = TracesRecord {
            traces: vec![TraceRecord {
                states: vec![],
                edges: vec![edge_with_input(0), edge_with_input(1)],
            }],
        };
        let plan = MutationPlan::from_traces(&traces, 0, 1, vec![0]).unwrap();
        let mutated = plan.mutate(&MutationValue {
            info: "quote".to_string(),
            value: "'".to_string(),
        });
        assert_eq!(mutated.len(), 2);
        for edge in &mutated {
            assert_eq!(edge.inputs[0].value.as_deref(), Some("'"));
            assert_eq!(edge.inputs[0].info.as_deref(), Some("quote"));
        }
        // The plan itself keeps the recorded values.
        assert_eq!(plan.edges[0].inputs[0].value.as_deref(), Some("recorded"));
    }
}
