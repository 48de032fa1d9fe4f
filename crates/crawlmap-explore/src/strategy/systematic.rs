use crawlmap_model::{EdgeId, StateId};

use super::{Strategy, StrategyExport};
use crate::context::{Action, CrawlContext};

/// Depth-bounded exhaustive exploration.
///
/// Every clickable of a state is pushed on a stack; the most recently
/// pushed action fires first. States at `max_depth` or deeper are recorded
/// but not expanded.
#[derive(Debug, Default)]
pub struct Systematic {
    pending: Vec<Action>,
}

impl Systematic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> &[Action] {
        &self.pending
    }
}

impl Strategy for Systematic {
    fn name(&self) -> &str {
        "systematic"
    }

    fn prepare(&mut self, _ctx: &mut CrawlContext) {
        self.pending.clear();
    }

    fn enqueue(
        &mut self,
        ctx: &mut CrawlContext,
        state: StateId,
        depth: usize,
        prior: Option<StateId>,
    ) {
        self.pending.extend(
            ctx.candidates(state, prior)
                .into_iter()
                .map(|(frame, clickable)| Action {
                    state,
                    clickable,
                    frame,
                    depth,
                }),
        );
    }

    fn pick_next(&mut self, _ctx: &mut CrawlContext) -> Option<Action> {
        self.pending.pop()
    }

    fn on_same_state(&mut self, _ctx: &mut CrawlContext, _action: &Action, _edge: EdgeId) {}

    fn on_out_of_domain(&mut self, ctx: &mut CrawlContext, action: &Action, _url: &str) {
        self.change_state(ctx, action.state);
    }

    fn on_new_state(&mut self, ctx: &mut CrawlContext, action: &Action, state: StateId, _edge: EdgeId) {
        let depth = action.depth + 1;
        if depth < ctx.config.max_depth {
            self.enqueue(ctx, state, depth, Some(action.state));
        }
    }

    fn on_old_state(&mut self, ctx: &mut CrawlContext, action: &Action, state: StateId, _edge: EdgeId) {
        let depth = action.depth + 1;
        let lowered = ctx.graph.lower_depth(state, depth).unwrap_or(false);
        if lowered && depth < ctx.config.max_depth {
            self.enqueue(ctx, state, depth, Some(action.state));
        }
    }

    fn export(&self, ctx: &CrawlContext) -> StrategyExport {
        StrategyExport {
            traces: ctx
                .graph
                .all_terminal_traces(ctx.config.trace_limits)
                .unwrap_or_default(),
            divergences: Vec::new(),
        }
    }
}
