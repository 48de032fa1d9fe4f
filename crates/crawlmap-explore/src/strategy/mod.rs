//! Exploration strategies.
//!
//! A strategy owns the pending actions and decides what to fire next and
//! how to react to each classified transition. The crawl loop calls it
//! through the flat [`Strategy`] trait.

mod differential;
mod monkey;
mod systematic;

pub use differential::{Differential, Divergence};
pub use monkey::Monkey;
pub use systematic::Systematic;

use serde::{Deserialize, Serialize};

use crawlmap_model::{EdgeDraft, EdgeId, StateId, Trace};

use crate::backtrack::{backtrack, BacktrackOutcome};
use crate::config::CrawlConfig;
use crate::context::{Action, CrawlContext};

/// What a strategy wants persisted at the end of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyExport {
    pub traces: Vec<Trace>,
    pub divergences: Vec<Divergence>,
}

pub trait Strategy {
    fn name(&self) -> &str;

    /// Browser sessions the strategy drives in lockstep.
    fn session_count(&self) -> usize {
        1
    }

    /// Reset per-trace state. Called once the initial state is known.
    fn prepare(&mut self, ctx: &mut CrawlContext);

    /// Offer the actions of `state`, reached at `depth` from `prior`.
    fn enqueue(
        &mut self,
        ctx: &mut CrawlContext,
        state: StateId,
        depth: usize,
        prior: Option<StateId>,
    );

    fn pick_next(&mut self, ctx: &mut CrawlContext) -> Option<Action>;

    /// Bring the sessions to `target` before firing one of its actions.
    fn change_state(&mut self, ctx: &mut CrawlContext, target: StateId) -> BacktrackOutcome {
        return_to(ctx, target)
    }

    /// Synthesize control values and fire the action on every session.
    fn trigger(&mut self, ctx: &mut CrawlContext, action: &Action) -> EdgeDraft {
        fire_action(ctx, action)
    }

    /// The action left the page unchanged; `edge` is the recorded self-loop.
    fn on_same_state(&mut self, ctx: &mut CrawlContext, action: &Action, edge: EdgeId);

    /// The action led outside the allowed domain to `url`.
    fn on_out_of_domain(&mut self, ctx: &mut CrawlContext, action: &Action, url: &str);

    fn on_new_state(&mut self, ctx: &mut CrawlContext, action: &Action, state: StateId, edge: EdgeId);

    fn on_old_state(&mut self, ctx: &mut CrawlContext, action: &Action, state: StateId, edge: EdgeId);

    fn finalize_trace(&mut self, _ctx: &mut CrawlContext) {}

    fn export(&self, ctx: &CrawlContext) -> StrategyExport;
}

/// Default action application: fill the controls of the action's frame,
/// then click.
pub fn fire_action(ctx: &mut CrawlContext, action: &Action) -> EdgeDraft {
    let draft = ctx.draft(action);
    ctx.fire(&draft);
    draft
}

/// Backtrack to `target`; if that fails, re-identify where the primary
/// session actually is.
pub fn return_to(ctx: &mut CrawlContext, target: StateId) -> BacktrackOutcome {
    let outcome = backtrack(ctx, target);
    if outcome == BacktrackOutcome::Exhausted {
        ctx.resync_current();
    }
    outcome
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Systematic,
    Monkey,
    Differential,
}

impl StrategyKind {
    pub fn build(self, config: &CrawlConfig) -> Box<dyn Strategy> {
        match self {
            StrategyKind::Systematic => Box::new(Systematic::new()),
            StrategyKind::Monkey => Box::new(Monkey::new(config.seed)),
            StrategyKind::Differential => Box::new(Differential::new(config.seed)),
        }
    }
}
