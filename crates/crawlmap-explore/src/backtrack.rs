//! Returning the sessions to a known state.
//!
//! Tactics run cheapest first and stop at the first one after which the
//! primary session shows the target page (same URL, structurally equal
//! markup). The time budget is checked before every tactic.

use crawlmap_model::{EdgeId, StateId};

use crate::context::CrawlContext;
use crate::event::CrawlEvent;

/// Recovery tactics, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tactic {
    /// Reload, only when the URL already matches the target.
    Refresh,
    HistoryBack,
    /// `history.back()` run as a page script.
    ScriptBack,
    /// Forward in history, then replay the last edge taken.
    ForwardReplay,
    /// Load the base URL and replay the shortest path to the target.
    ReplayFromBase,
    /// Restart every session, then replay the shortest path with checks.
    RestartReplay,
}

impl Tactic {
    pub const ALL: [Tactic; 6] = [
        Tactic::Refresh,
        Tactic::HistoryBack,
        Tactic::ScriptBack,
        Tactic::ForwardReplay,
        Tactic::ReplayFromBase,
        Tactic::RestartReplay,
    ];

    /// 1-based position in the protocol.
    pub fn number(self) -> usize {
        match self {
            Tactic::Refresh => 1,
            Tactic::HistoryBack => 2,
            Tactic::ScriptBack => 3,
            Tactic::ForwardReplay => 4,
            Tactic::ReplayFromBase => 5,
            Tactic::RestartReplay => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacktrackOutcome {
    Restored(Tactic),
    /// Every tactic ran and none restored the target.
    Exhausted,
    /// The time budget ran out before a tactic could restore the target.
    TimedOut,
}

impl BacktrackOutcome {
    pub fn is_restored(self) -> bool {
        matches!(self, BacktrackOutcome::Restored(_))
    }
}

/// Bring every session back to `target`.
///
/// On success the graph's current state becomes `target`. Driver failures
/// are reported as events and count as a failed tactic.
pub fn backtrack(ctx: &mut CrawlContext, target: StateId) -> BacktrackOutcome {
    let outcome = run_tactics(ctx, target);
    if outcome.is_restored() {
        ctx.graph.set_current(target).ok();
    }
    ctx.emit(CrawlEvent::Backtracked { target, outcome });
    outcome
}

fn run_tactics(ctx: &mut CrawlContext, target: StateId) -> BacktrackOutcome {
    let Some(expected) = ctx.graph.state(target).map(|s| s.observation().clone()) else {
        return BacktrackOutcome::Exhausted;
    };

    for tactic in Tactic::ALL {
        if ctx.budget.exceeded() {
            return BacktrackOutcome::TimedOut;
        }
        let Some(restored) = attempt(ctx, tactic, target, &expected) else {
            continue;
        };
        ctx.emit(CrawlEvent::TacticTried {
            target,
            tactic,
            restored,
        });
        if restored {
            return BacktrackOutcome::Restored(tactic);
        }
    }
    BacktrackOutcome::Exhausted
}

/// Run one tactic. `None` when its precondition does not hold.
fn attempt(
    ctx: &mut CrawlContext,
    tactic: Tactic,
    target: StateId,
    expected: &crawlmap_model::Observation,
) -> Option<bool> {
    match tactic {
        Tactic::Refresh => {
            let seen = ctx.observe_primary()?;
            if seen.url != expected.url {
                return None;
            }
            ctx.on_all_sessions("refresh", |s| s.refresh());
        }
        Tactic::HistoryBack => ctx.on_all_sessions("history_back", |s| s.history_back()),
        Tactic::ScriptBack => ctx.on_all_sessions("script_back", |s| s.script_back()),
        Tactic::ForwardReplay => {
            let last = *ctx.history.last()?;
            ctx.on_all_sessions("history_forward", |s| s.history_forward());
            replay(ctx, last);
        }
        Tactic::ReplayFromBase => {
            let path = path_to(ctx, target)?;
            navigate_base(ctx);
            if ctx.shows(expected) {
                return Some(true);
            }
            for edge_id in path {
                replay(ctx, edge_id);
                if ctx.shows(expected) {
                    return Some(true);
                }
            }
            return Some(false);
        }
        Tactic::RestartReplay => {
            let path = path_to(ctx, target)?;
            ctx.on_all_sessions("restart", |s| s.restart());
            navigate_base(ctx);
            if ctx.shows(expected) {
                return Some(true);
            }
            for (step, edge_id) in path.into_iter().enumerate() {
                let Some(destination) = replay(ctx, edge_id) else {
                    continue;
                };
                check_replay_step(ctx, target, step, destination);
            }
        }
    }
    Some(ctx.shows(expected))
}

fn path_to(ctx: &CrawlContext, target: StateId) -> Option<Vec<EdgeId>> {
    ctx.graph.shortest_path(target).ok().flatten()
}

fn navigate_base(ctx: &mut CrawlContext) {
    let base = ctx.config.base_url.clone();
    ctx.on_all_sessions("navigate_to", |s| s.navigate_to(&base));
}

/// Fire a recorded edge again. Returns its recorded destination.
fn replay(ctx: &mut CrawlContext, edge_id: EdgeId) -> Option<StateId> {
    let edge = ctx.graph.edge(edge_id)?;
    let destination = edge.destination;
    let draft = edge.replay_from(edge.source);
    ctx.fire(&draft);
    Some(destination)
}

/// Compare the page reached by a restart replay step with the edge's
/// recorded destination and archive both pages on mismatch.
fn check_replay_step(ctx: &mut CrawlContext, target: StateId, step: usize, destination: StateId) {
    let Some(expected) = ctx
        .graph
        .state(destination)
        .map(|s| s.observation().clone())
    else {
        return;
    };
    let Some(actual) = ctx.observe_primary() else {
        return;
    };
    if actual.same_page(&expected, ctx.analyzer.as_ref()) {
        return;
    }
    if let Err(e) = ctx.archive.save_mismatch(target, step, &expected, &actual) {
        ctx.emit(CrawlEvent::ArchiveFault {
            state: target,
            message: e.to_string(),
        });
    }
    ctx.emit(CrawlEvent::ReplayMismatch {
        target,
        step,
        expected: destination,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tactics_are_numbered_in_order() {
        let numbers: Vec<usize> = Tactic::ALL.iter().map(|t| t.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_only_restored_counts_as_restored() {
        assert!(BacktrackOutcome::Restored(Tactic::Refresh).is_restored());
        assert!(!BacktrackOutcome::Exhausted.is_restored());
        assert!(!BacktrackOutcome::TimedOut.is_restored());
    }
}
