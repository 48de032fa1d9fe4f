//! The crawl loop.
//!
//! Per trace: start the sessions, record the initial state, run the
//! before-script, then select, apply, classify and react until the
//! strategy has nothing left or the time budget runs out.

use crawlmap_model::{EdgeDraft, EdgeId, Observation, StateId};

use crate::backtrack::BacktrackOutcome;
use crate::context::{Action, CrawlContext};
use crate::error::CrawlError;
use crate::event::CrawlEvent;
use crate::strategy::{Strategy, StrategyExport};

/// Why a trace stopped. Both are clean ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEnd {
    /// The strategy had no action left.
    Exhausted,
    TimedOut,
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub traces_run: usize,
    pub states: usize,
    pub edges: usize,
    pub excursions: usize,
    /// Actions fired across all traces, before-script steps excluded.
    pub actions: usize,
    pub export: StrategyExport,
}

/// How the page reached by an action relates to the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Transition {
    Same(EdgeId),
    OutOfDomain(String),
    New(StateId, EdgeId),
    Revisited(StateId, EdgeId),
}

pub struct Crawler {
    ctx: CrawlContext,
    strategy: Box<dyn Strategy>,
}

impl Crawler {
    pub fn new(ctx: CrawlContext, strategy: Box<dyn Strategy>) -> Result<Self, CrawlError> {
        let needed = strategy.session_count();
        if ctx.sessions.len() < needed {
            return Err(CrawlError::SessionCount {
                strategy: strategy.name().to_string(),
                needed,
                got: ctx.sessions.len(),
            });
        }
        Ok(Self { ctx, strategy })
    }

    pub fn context(&self) -> &CrawlContext {
        &self.ctx
    }

    pub fn strategy(&self) -> &dyn Strategy {
        self.strategy.as_ref()
    }

    pub fn into_context(self) -> CrawlContext {
        self.ctx
    }

    /// Run every trace, each with a fresh time budget. Sessions are closed
    /// after each trace, whatever its outcome.
    pub fn run(&mut self) -> Result<CrawlReport, CrawlError> {
        let mut traces_run = 0;
        let mut actions = 0;
        for trace in 0..self.ctx.config.trace_amount {
            let result = self.run_trace(trace);
            self.ctx.close_sessions();
            let (end, fired) = result?;
            traces_run += 1;
            actions += fired;
            self.ctx.emit(CrawlEvent::TraceFinished {
                trace,
                actions: fired,
                end,
            });
        }
        Ok(CrawlReport {
            traces_run,
            states: self.ctx.graph.states().len(),
            edges: self.ctx.graph.edges().len(),
            excursions: self.ctx.graph.excursions().len(),
            actions,
            export: self.strategy.export(&self.ctx),
        })
    }

    fn run_trace(&mut self, trace: usize) -> Result<(TraceEnd, usize), CrawlError> {
        let ctx = &mut self.ctx;
        ctx.budget.restart();
        ctx.start_sessions()?;
        let seen = ctx.observe(0)?;
        let (initial, is_new) = ctx.graph.set_initial(seen, ctx.analyzer.as_ref());
        if is_new {
            ctx.archive_state(initial);
        }
        ctx.emit(CrawlEvent::TraceStarted { trace, initial });

        run_before_script(ctx)?;

        self.strategy.prepare(ctx);
        let root = ctx.graph.current().unwrap_or(initial);
        self.strategy.enqueue(ctx, root, 0, None);

        let mut fired = 0;
        let end = loop {
            if self.ctx.budget.exceeded() {
                let elapsed_secs = self.ctx.budget.elapsed().as_secs();
                self.ctx.emit(CrawlEvent::BudgetExhausted { elapsed_secs });
                break TraceEnd::TimedOut;
            }
            let Some(action) = self.strategy.pick_next(&mut self.ctx) else {
                break TraceEnd::Exhausted;
            };
            if self.step(action)? {
                fired += 1;
            }
        };
        self.strategy.finalize_trace(&mut self.ctx);
        Ok((end, fired))
    }

    /// Apply one action and dispatch the reaction. Returns whether the
    /// action was fired.
    fn step(&mut self, action: Action) -> Result<bool, CrawlError> {
        let ctx = &mut self.ctx;
        if ctx.graph.current() != Some(action.state) {
            match self.strategy.change_state(ctx, action.state) {
                BacktrackOutcome::Restored(_) => {}
                BacktrackOutcome::Exhausted | BacktrackOutcome::TimedOut => return Ok(false),
            }
        }
        let Some(before) = ctx.graph.state(action.state).map(|s| s.observation().clone()) else {
            return Ok(false);
        };

        let draft = self.strategy.trigger(ctx, &action);
        ctx.graph
            .record_fired(action.state, &action.frame, &action.clickable)?;
        let Some(after) = ctx.observe_primary() else {
            return Ok(true);
        };

        match classify(ctx, draft, &before, after, action.depth + 1)? {
            Transition::Same(edge) => self.strategy.on_same_state(ctx, &action, edge),
            Transition::OutOfDomain(url) => self.strategy.on_out_of_domain(ctx, &action, &url),
            Transition::New(state, edge) => self.strategy.on_new_state(ctx, &action, state, edge),
            Transition::Revisited(state, edge) => {
                self.strategy.on_old_state(ctx, &action, state, edge)
            }
        }
        Ok(true)
    }
}

/// Record the transition `draft` caused from `before` to `after`.
///
/// Same page first, then out of domain, else a new or revisited state at
/// `depth`. In-domain edges go to the action history and the reached
/// state becomes current; new states are archived.
pub(crate) fn classify(
    ctx: &mut CrawlContext,
    draft: EdgeDraft,
    before: &Observation,
    after: Observation,
    depth: usize,
) -> Result<Transition, CrawlError> {
    let source = draft.source;
    if after.same_page(before, ctx.analyzer.as_ref()) {
        let edge = ctx.graph.add_edge(draft, source)?;
        ctx.history.push(edge);
        ctx.emit(CrawlEvent::SameState { state: source });
        return Ok(Transition::Same(edge));
    }

    if !ctx.domain.contains(&after.url) {
        let url = after.url;
        ctx.graph.add_excursion(draft, &url)?;
        ctx.emit(CrawlEvent::OutOfDomain {
            source,
            url: url.clone(),
        });
        return Ok(Transition::OutOfDomain(url));
    }

    let url = after.url.clone();
    let (state, is_new) = ctx.graph.add_state(after, depth, ctx.analyzer.as_ref());
    let edge = ctx.graph.add_edge(draft, state)?;
    ctx.history.push(edge);
    ctx.graph.set_current(state)?;
    if is_new {
        ctx.archive_state(state);
        ctx.emit(CrawlEvent::StateAdded { state, url, depth });
        Ok(Transition::New(state, edge))
    } else {
        ctx.emit(CrawlEvent::StateRevisited { state, depth });
        Ok(Transition::Revisited(state, edge))
    }
}

/// Replay the configured before-script from the current state. Results are
/// recorded like any transition but no strategy reacts; states it reaches
/// are roots of the exploration and get depth 0. An out-of-domain step ends
/// the script.
fn run_before_script(ctx: &mut CrawlContext) -> Result<(), CrawlError> {
    let script = ctx.config.before_script.clone();
    for record in &script {
        let Some(source) = ctx.graph.current() else {
            break;
        };
        let Some(before) = ctx.graph.state(source).map(|s| s.observation().clone()) else {
            break;
        };
        let draft = record.to_draft(source);
        ctx.fire(&draft);
        ctx.graph.record_fired(source, &draft.frame, &draft.clickable)?;
        let Some(after) = ctx.observe_primary() else {
            break;
        };
        if let Transition::OutOfDomain(_) = classify(ctx, draft, &before, after, 0)? {
            break;
        }
    }
    Ok(())
}
