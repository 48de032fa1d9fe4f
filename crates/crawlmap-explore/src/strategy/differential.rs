use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crawlmap_model::{EdgeDraft, EdgeId, Observation, StateId};

use super::{Monkey, Strategy, StrategyExport};
use crate::backtrack::BacktrackOutcome;
use crate::context::{Action, CrawlContext};
use crate::event::CrawlEvent;

/// Two sessions disagreeing after the same actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Divergence {
    pub state: StateId,
    pub primary_url: String,
    pub secondary_url: String,
    /// Element locators (prefixed by frame) only the primary session shows.
    pub only_primary: Vec<String>,
    pub only_secondary: Vec<String>,
}

/// A random walk driven on two sessions in lockstep.
///
/// Every action and every backtrack tactic reaches both sessions before
/// either is observed. After each new state both sessions are compared by
/// URL and by the set of clickable elements they expose.
pub struct Differential {
    walk: Monkey,
    divergences: Vec<Divergence>,
}

impl Differential {
    pub fn new(seed: u64) -> Self {
        Self {
            walk: Monkey::new(seed),
            divergences: Vec::new(),
        }
    }

    pub fn divergences(&self) -> &[Divergence] {
        &self.divergences
    }

    fn compare(&mut self, ctx: &mut CrawlContext, state: StateId) {
        let (Ok(primary), Ok(secondary)) = (ctx.observe(0), ctx.observe(1)) else {
            return;
        };
        let a = locators(ctx, &primary);
        let b = locators(ctx, &secondary);
        if primary.url == secondary.url && a == b {
            return;
        }
        let divergence = Divergence {
            state,
            primary_url: primary.url,
            secondary_url: secondary.url,
            only_primary: a.difference(&b).cloned().collect(),
            only_secondary: b.difference(&a).cloned().collect(),
        };
        ctx.emit(CrawlEvent::Divergence(divergence.clone()));
        self.divergences.push(divergence);
    }
}

fn locators(ctx: &CrawlContext, observation: &Observation) -> BTreeSet<String> {
    observation
        .fragments()
        .iter()
        .flat_map(|fragment| {
            ctx.analyzer
                .extract_clickables(&fragment.markup, None)
                .into_iter()
                .map(move |c| format!("{} {}", fragment.frame, c.locator()))
        })
        .collect()
}

impl Strategy for Differential {
    fn name(&self) -> &str {
        "differential"
    }

    fn session_count(&self) -> usize {
        2
    }

    fn prepare(&mut self, ctx: &mut CrawlContext) {
        self.walk.prepare(ctx);
    }

    fn enqueue(
        &mut self,
        ctx: &mut CrawlContext,
        state: StateId,
        depth: usize,
        prior: Option<StateId>,
    ) {
        self.walk.enqueue(ctx, state, depth, prior);
    }

    fn pick_next(&mut self, ctx: &mut CrawlContext) -> Option<Action> {
        self.walk.pick_next(ctx)
    }

    fn change_state(&mut self, ctx: &mut CrawlContext, target: StateId) -> BacktrackOutcome {
        self.walk.change_state(ctx, target)
    }

    fn trigger(&mut self, ctx: &mut CrawlContext, action: &Action) -> EdgeDraft {
        self.walk.trigger(ctx, action)
    }

    fn on_same_state(&mut self, ctx: &mut CrawlContext, action: &Action, edge: EdgeId) {
        self.walk.on_same_state(ctx, action, edge);
    }

    fn on_out_of_domain(&mut self, ctx: &mut CrawlContext, action: &Action, url: &str) {
        self.walk.on_out_of_domain(ctx, action, url);
    }

    fn on_new_state(&mut self, ctx: &mut CrawlContext, action: &Action, state: StateId, edge: EdgeId) {
        self.compare(ctx, state);
        self.walk.on_new_state(ctx, action, state, edge);
    }

    fn on_old_state(&mut self, ctx: &mut CrawlContext, action: &Action, state: StateId, edge: EdgeId) {
        self.walk.on_old_state(ctx, action, state, edge);
    }

    fn finalize_trace(&mut self, ctx: &mut CrawlContext) {
        self.walk.finalize_trace(ctx);
    }

    fn export(&self, ctx: &CrawlContext) -> StrategyExport {
        StrategyExport {
            traces: self.walk.export(ctx).traces,
            divergences: self.divergences.clone(),
        }
    }
}
