//! Arena graph of states and edges.
//!
//! Each inserted edge contributes exactly one arc to the adjacency lists, so
//! arcs and edges stay in bijection. Out-of-domain actions are kept apart as
//! excursions and never produce an arc.

use std::collections::{HashSet, VecDeque};

use crawlmap_markup::{Clickable, FramePath, MarkupAnalyzer};

use crate::edge::{Edge, EdgeDraft, EdgeId, Excursion};
use crate::index::FingerprintIndex;
use crate::state::{Observation, State, StateId};

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Unknown state: {0}")]
    UnknownState(StateId),

    #[error("Unknown edge: {0}")]
    UnknownEdge(EdgeId),

    #[error("Graph has no initial state")]
    NoInitialState,
}

/// Bounds on terminal-trace enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TraceLimits {
    /// Stop after this many traces.
    pub max_traces: usize,
    /// Longest trace, in edges.
    pub max_length: usize,
}

impl Default for TraceLimits {
    fn default() -> Self {
        Self {
            max_traces: 1_000,
            max_length: 50,
        }
    }
}

/// States and edges, in order, from the initial state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace {
    pub states: Vec<StateId>,
    pub edges: Vec<EdgeId>,
}

impl Trace {
    pub fn starting_at(state: StateId) -> Self {
        Self {
            states: vec![state],
            edges: Vec::new(),
        }
    }

    pub fn push(&mut self, edge: EdgeId, destination: StateId) {
        self.edges.push(edge);
        self.states.push(destination);
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct StateGraph {
    states: Vec<State>,
    edges: Vec<Edge>,
    excursions: Vec<Excursion>,
    /// Outgoing edge ids per state, in insertion order.
    outgoing: Vec<Vec<EdgeId>>,
    index: FingerprintIndex,
    initial: Option<StateId>,
    current: Option<StateId>,
}

impl StateGraph {
    pub fn new(bucket_count: usize) -> Self {
        Self {
            states: Vec::new(),
            edges: Vec::new(),
            excursions: Vec::new(),
            outgoing: Vec::new(),
            index: FingerprintIndex::new(bucket_count),
            initial: None,
            current: None,
        }
    }

    /// Record the root page. It becomes both initial and current.
    pub fn set_initial(
        &mut self,
        observation: Observation,
        analyzer: &dyn MarkupAnalyzer,
    ) -> (StateId, bool) {
        let (id, is_new) = self.add_state(observation, 0, analyzer);
        self.initial = Some(id);
        self.current = Some(id);
        (id, is_new)
    }

    /// Promote `observation` at `depth` unless an equal state exists.
    /// Returns the canonical id and whether it was newly added.
    pub fn add_state(
        &mut self,
        observation: Observation,
        depth: usize,
        analyzer: &dyn MarkupAnalyzer,
    ) -> (StateId, bool) {
        let next_id = self.states.len() as StateId;
        let (is_new, id) = self
            .index
            .insert_or_find(&observation, next_id, &self.states, analyzer);
        if is_new {
            self.states
                .push(State::promote(id, observation, depth, analyzer));
            self.outgoing.push(Vec::new());
        }
        (id, is_new)
    }

    /// Id of an existing state equal to `observation`.
    pub fn find(&self, observation: &Observation, analyzer: &dyn MarkupAnalyzer) -> Option<StateId> {
        self.index.find(observation, &self.states, analyzer)
    }

    /// Insert an action leading to `destination`.
    pub fn add_edge(&mut self, draft: EdgeDraft, destination: StateId) -> Result<EdgeId, GraphError> {
        self.check_state(draft.source)?;
        self.check_state(destination)?;
        let id = self.edges.len() as EdgeId;
        self.outgoing[draft.source as usize].push(id);
        self.edges.push(Edge {
            id,
            source: draft.source,
            destination,
            clickable: draft.clickable,
            controls: draft.controls,
            frame: draft.frame,
        });
        Ok(id)
    }

    /// Record an action that led to the out-of-domain `url`.
    pub fn add_excursion(&mut self, draft: EdgeDraft, url: &str) -> Result<(), GraphError> {
        self.check_state(draft.source)?;
        self.excursions.push(Excursion {
            source: draft.source,
            clickable: draft.clickable,
            controls: draft.controls,
            frame: draft.frame,
            url: url.to_string(),
        });
        Ok(())
    }

    fn check_state(&self, id: StateId) -> Result<(), GraphError> {
        if (id as usize) < self.states.len() {
            Ok(())
        } else {
            Err(GraphError::UnknownState(id))
        }
    }

    pub fn initial(&self) -> Option<StateId> {
        self.initial
    }

    pub fn current(&self) -> Option<StateId> {
        self.current
    }

    pub fn set_current(&mut self, id: StateId) -> Result<(), GraphError> {
        self.check_state(id)?;
        self.current = Some(id);
        Ok(())
    }

    /// Forget where the session is. The next action from any state then
    /// has to restore that state first.
    pub fn clear_current(&mut self) {
        self.current = None;
    }

    pub fn state(&self, id: StateId) -> Option<&State> {
        self.states.get(id as usize)
    }

    pub fn state_mut(&mut self, id: StateId) -> Option<&mut State> {
        self.states.get_mut(id as usize)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id as usize)
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn excursions(&self) -> &[Excursion] {
        &self.excursions
    }

    pub fn outgoing(&self, id: StateId) -> &[EdgeId] {
        self.outgoing
            .get(id as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of arcs across all adjacency lists.
    pub fn arc_count(&self) -> usize {
        self.outgoing.iter().map(Vec::len).sum()
    }

    pub fn record_fired(
        &mut self,
        id: StateId,
        frame: &FramePath,
        clickable: &Clickable,
    ) -> Result<(), GraphError> {
        let state = self
            .states
            .get_mut(id as usize)
            .ok_or(GraphError::UnknownState(id))?;
        state.record_fired(frame, clickable);
        Ok(())
    }

    /// Lower the recorded depth of a state. Returns false, leaving the
    /// state untouched, if `depth` is not strictly smaller.
    pub fn lower_depth(&mut self, id: StateId, depth: usize) -> Result<bool, GraphError> {
        let state = self
            .states
            .get_mut(id as usize)
            .ok_or(GraphError::UnknownState(id))?;
        if depth < state.depth() {
            state.set_depth(depth);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// First edge from `from` to `to`, in insertion order.
    pub fn edge_between(&self, from: StateId, to: StateId) -> Option<EdgeId> {
        self.outgoing(from)
            .iter()
            .copied()
            .find(|e| self.edges[*e as usize].destination == to)
    }

    /// Fewest-edges path from the initial state to `target`.
    ///
    /// `Some(vec![])` for the initial state itself, `None` if unreachable.
    pub fn shortest_path(&self, target: StateId) -> Result<Option<Vec<EdgeId>>, GraphError> {
        let start = self.initial.ok_or(GraphError::NoInitialState)?;
        self.check_state(target)?;
        if start == target {
            return Ok(Some(Vec::new()));
        }

        let mut reached_by: Vec<Option<EdgeId>> = vec![None; self.states.len()];
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(start);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            for &edge_id in self.outgoing(current) {
                let next = self.edges[edge_id as usize].destination;
                if visited.insert(next) {
                    reached_by[next as usize] = Some(edge_id);
                    if next == target {
                        return Ok(Some(self.unwind(&reached_by, target)));
                    }
                    queue.push_back(next);
                }
            }
        }
        Ok(None)
    }

    fn unwind(&self, reached_by: &[Option<EdgeId>], target: StateId) -> Vec<EdgeId> {
        let mut path = Vec::new();
        let mut at = target;
        while let Some(edge_id) = reached_by[at as usize] {
            path.push(edge_id);
            at = self.edges[edge_id as usize].source;
        }
        path.reverse();
        path
    }

    /// Every simple path from the initial state to each terminal state.
    ///
    /// Between two states only their first edge is followed. Enumeration
    /// stops at `limits.max_traces` traces and never extends a path past
    /// `limits.max_length` edges.
    pub fn all_terminal_traces(&self, limits: TraceLimits) -> Result<Vec<Trace>, GraphError> {
        let start = self.initial.ok_or(GraphError::NoInitialState)?;
        let mut traces = Vec::new();
        for target in self.states.iter().filter(|s| s.is_terminal() && s.id != start) {
            if traces.len() >= limits.max_traces {
                break;
            }
            let mut on_path = HashSet::from([start]);
            let mut trace = Trace::starting_at(start);
            self.collect_paths(start, target.id, limits, &mut on_path, &mut trace, &mut traces);
        }
        Ok(traces)
    }

    fn collect_paths(
        &self,
        at: StateId,
        target: StateId,
        limits: TraceLimits,
        on_path: &mut HashSet<StateId>,
        trace: &mut Trace,
        out: &mut Vec<Trace>,
    ) {
        if at == target {
            out.push(trace.clone());
            return;
        }
        if trace.edges.len() >= limits.max_length {
            return;
        }
        let mut successors = HashSet::new();
        for &edge_id in self.outgoing(at) {
            if out.len() >= limits.max_traces {
                return;
            }
            let next = self.edges[edge_id as usize].destination;
            if !successors.insert(next) || on_path.contains(&next) {
                continue;
            }
            on_path.insert(next);
            trace.push(edge_id, next);
            self.collect_paths(next, target, limits, on_path, trace, out);
            trace.edges.pop();
            trace.states.pop();
            on_path.remove(&next);
        }
    }
}

impl Default for StateGraph {
    fn default() -> Self {
        Self::new(crate::index::DEFAULT_BUCKET_COUNT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crawlmap_markup::HtmlAnalyzer;

    use crate::state::MarkupFragment;

    fn observe(analyzer: &HtmlAnalyzer, body: &str) -> Observation {
        let markup = format!("<html><body>{body}</body></html>");
        Observation::new("http://x.test/", vec![MarkupFragment::top("http://x.test/", &markup)], analyzer)
    }

    fn link(id: &str) -> Clickable {
        Clickable {
            id: Some(id.to_string()),
            name: None,
            xpath: format!("//a[@id='{id}']"),
            tag: "a".to_string(),
        }
    }

    fn connect(graph: &mut StateGraph, from: StateId, to: StateId, via: &str) -> EdgeId {
        let clickable = link(via);
        graph.record_fired(from, &FramePath::top(), &clickable).unwrap();
        graph
            .add_edge(EdgeDraft::new(from, clickable, FramePath::top()), to)
            .unwrap()
    }

    #[test]
    fn test_add_edge_rejects_unknown_states() {
        let analyzer = HtmlAnalyzer::default();
        let mut graph = StateGraph::default();
        let (root, _) = graph.set_initial(observe(&analyzer, "root"), &analyzer);
        let err = graph
            .add_edge(EdgeDraft::new(root, link("x"), FramePath::top()), 7)
            .unwrap_err();
        assert!(matches!(err, GraphError::UnknownState(7)));
        assert_eq!(graph.arc_count(), 0);
    }

    #[test]
    fn test_cleared_current_is_unknown_until_set() {
        let analyzer = HtmlAnalyzer::default();
        let mut graph = StateGraph::default();
        let (root, _) = graph.set_initial(observe(&analyzer, "root"), &analyzer);
        graph.clear_current();
        assert_eq!(graph.current(), None);
        assert_eq!(graph.initial(), Some(root));
        graph.set_current(root).unwrap();
        assert_eq!(graph.current(), Some(root));
    }

    #[test]
    fn test_lower_depth_rejects_increase() {
        let analyzer = HtmlAnalyzer::default();
        let mut graph = StateGraph::default();
        graph.set_initial(observe(&analyzer, "root"), &analyzer);
        let (s, _) = graph.add_state(observe(&analyzer, "deep"), 3, &analyzer);

        assert!(!graph.lower_depth(s, 4).unwrap());
        assert!(!graph.lower_depth(s, 3).unwrap());
        assert!(graph.lower_depth(s, 1).unwrap());
        assert_eq!(graph.state(s).unwrap().depth(), 1);
    }

    #[test]
    fn test_shortest_path_prefers_fewer_edges() {
        let analyzer = HtmlAnalyzer::default();
        let mut graph = StateGraph::default();
        let (a, _) = graph.set_initial(observe(&analyzer, "a"), &analyzer);
        let (b, _) = graph.add_state(observe(&analyzer, "b"), 1, &analyzer);
        let (c, _) = graph.add_state(observe(&analyzer, "c"), 2, &analyzer);
        connect(&mut graph, a, b, "ab");
        connect(&mut graph, b, c, "bc");
        let direct = connect(&mut graph, a, c, "ac");

        assert_eq!(graph.shortest_path(c).unwrap(), Some(vec![direct]));
        assert_eq!(graph.shortest_path(a).unwrap(), Some(vec![]));
    }

    #[test]
    fn test_shortest_path_unreachable() {
        let analyzer = HtmlAnalyzer::default();
        let mut graph = StateGraph::default();
        graph.set_initial(observe(&analyzer, "a"), &analyzer);
        let (island, _) = graph.add_state(observe(&analyzer, "island"), 1, &analyzer);
        assert_eq!(graph.shortest_path(island).unwrap(), None);
    }

    #[test]
    fn test_shortest_path_without_initial() {
        let graph = StateGraph::default();
        assert!(matches!(graph.shortest_path(0), Err(GraphError::NoInitialState)));
    }

    #[test]
    fn test_terminal_traces_respect_limits() {
        let analyzer = HtmlAnalyzer::default();
        let mut graph = StateGraph::default();
        // a -> b -> d, a -> c -> d, a -> d
        let (a, _) = graph.set_initial(observe(&analyzer, "a"), &analyzer);
        let (b, _) = graph.add_state(observe(&analyzer, "b"), 1, &analyzer);
        let (c, _) = graph.add_state(observe(&analyzer, "c"), 1, &analyzer);
        let (d, _) = graph.add_state(observe(&analyzer, "d"), 1, &analyzer);
        connect(&mut graph, a, b, "ab");
        connect(&mut graph, a, c, "ac");
        connect(&mut graph, a, d, "ad");
        connect(&mut graph, b, d, "bd");
        connect(&mut graph, c, d, "cd");

        let all = graph.all_terminal_traces(TraceLimits::default()).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|t| t.states.first() == Some(&a) && t.states.last() == Some(&d)));

        let short = graph
            .all_terminal_traces(TraceLimits { max_traces: 10, max_length: 1 })
            .unwrap();
        assert_eq!(short.len(), 1);
        assert_eq!(short[0].states, vec![a, d]);

        let capped = graph
            .all_terminal_traces(TraceLimits { max_traces: 2, max_length: 10 })
            .unwrap();
        assert_eq!(capped.len(), 2);
    }

    #[test]
    fn test_terminal_traces_skip_cycles() {
        let analyzer = HtmlAnalyzer::default();
        let mut graph = StateGraph::default();
        let (a, _) = graph.set_initial(observe(&analyzer, "a"), &analyzer);
        let (b, _) = graph.add_state(observe(&analyzer, "b"), 1, &analyzer);
        let (c, _) = graph.add_state(observe(&analyzer, "c"), 2, &analyzer);
        connect(&mut graph, a, b, "ab");
        connect(&mut graph, b, a, "ba");
        connect(&mut graph, b, b, "bb");
        connect(&mut graph, b, c, "bc");

        let traces = graph.all_terminal_traces(TraceLimits::default()).unwrap();
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].states, vec![a, b, c]);
    }
}
