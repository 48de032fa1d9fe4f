use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crawlmap_model::{EdgeId, StateId, Trace};

use super::{Strategy, StrategyExport};
use crate::context::{Action, CrawlContext};
use crate::rng::{stream_rng, PICK_STREAM};

/// Random walk of bounded length.
///
/// Each reached state offers one uniformly chosen action. A trace ends
/// after `max_length` triggers or at a state with nothing to click, and
/// the walked path is kept as one trace.
pub struct Monkey {
    rng: ChaCha8Rng,
    pending: Option<Action>,
    triggers: usize,
    history: Trace,
    traces: Vec<Trace>,
}

impl Monkey {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: stream_rng(seed, PICK_STREAM),
            pending: None,
            triggers: 0,
            history: Trace::default(),
            traces: Vec::new(),
        }
    }

    /// Actions triggered in the current trace.
    pub fn triggers(&self) -> usize {
        self.triggers
    }

    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }
}

impl Strategy for Monkey {
    fn name(&self) -> &str {
        "monkey"
    }

    fn prepare(&mut self, ctx: &mut CrawlContext) {
        self.pending = None;
        self.triggers = 0;
        self.history = ctx.graph.current().map(Trace::starting_at).unwrap_or_default();
    }

    fn enqueue(
        &mut self,
        ctx: &mut CrawlContext,
        state: StateId,
        depth: usize,
        _prior: Option<StateId>,
    ) {
        let mut candidates = ctx.candidates(state, None);
        self.pending = if candidates.is_empty() {
            None
        } else {
            let (frame, clickable) = candidates.swap_remove(self.rng.gen_range(0..candidates.len()));
            Some(Action {
                state,
                clickable,
                frame,
                depth,
            })
        };
    }

    fn pick_next(&mut self, ctx: &mut CrawlContext) -> Option<Action> {
        if self.triggers >= ctx.config.max_length {
            return None;
        }
        self.pending.take()
    }

    fn trigger(&mut self, ctx: &mut CrawlContext, action: &Action) -> crawlmap_model::EdgeDraft {
        self.triggers += 1;
        super::fire_action(ctx, action)
    }

    fn on_same_state(&mut self, ctx: &mut CrawlContext, action: &Action, edge: EdgeId) {
        self.history.push(edge, action.state);
        self.enqueue(ctx, action.state, action.depth, None);
    }

    fn on_out_of_domain(&mut self, ctx: &mut CrawlContext, action: &Action, _url: &str) {
        self.change_state(ctx, action.state);
        let at = ctx.graph.current().unwrap_or(action.state);
        self.enqueue(ctx, at, action.depth, None);
    }

    fn on_new_state(&mut self, ctx: &mut CrawlContext, action: &Action, state: StateId, edge: EdgeId) {
        self.history.push(edge, state);
        self.enqueue(ctx, state, action.depth + 1, None);
    }

    fn on_old_state(&mut self, ctx: &mut CrawlContext, action: &Action, state: StateId, edge: EdgeId) {
        self.history.push(edge, state);
        // The walk's depth only; the recorded depth of the state is kept.
        let recorded = ctx.graph.state(state).map(|s| s.depth()).unwrap_or(usize::MAX);
        self.enqueue(ctx, state, recorded.min(action.depth + 1), None);
    }

    fn finalize_trace(&mut self, _ctx: &mut CrawlContext) {
        let walked = std::mem::take(&mut self.history);
        if !walked.is_empty() {
            self.traces.push(walked);
        }
        self.pending = None;
        self.triggers = 0;
    }

    fn export(&self, _ctx: &CrawlContext) -> StrategyExport {
        StrategyExport {
            traces: self.traces.clone(),
            divergences: Vec::new(),
        }
    }
}
