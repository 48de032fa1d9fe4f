//! Run-wide state shared by the crawl loop, the strategies and the
//! backtrack protocol.

use crawlmap_driver::{Driver, DriverError};
use crawlmap_markup::{Clickable, FramePath, MarkupAnalyzer};
use crawlmap_model::{EdgeDraft, EdgeId, MarkupFragment, Observation, StateGraph, StateId};

use crate::archive::{NullArchive, StateArchive};
use crate::budget::TimeBudget;
use crate::config::CrawlConfig;
use crate::domain::DomainFilter;
use crate::error::CrawlError;
use crate::event::{CrawlEvent, EventSink, TracingSink};
use crate::rng::{stream_rng, VALUE_STREAM};
use crate::values::{DataBank, ValueSynthesizer};

/// A pending action: fire `clickable` (in `frame`) from `state`, reached at `depth`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub state: StateId,
    pub clickable: Clickable,
    pub frame: FramePath,
    pub depth: usize,
}

pub struct CrawlContext {
    pub config: CrawlConfig,
    pub graph: StateGraph,
    /// Session 0 is the primary session: all observations that drive the
    /// crawl are taken from it.
    pub sessions: Vec<Box<dyn Driver>>,
    pub analyzer: Box<dyn MarkupAnalyzer>,
    pub values: ValueSynthesizer,
    pub sink: Box<dyn EventSink>,
    pub archive: Box<dyn StateArchive>,
    /// Every in-domain edge taken, in order.
    pub history: Vec<EdgeId>,
    pub budget: TimeBudget,
    pub domain: DomainFilter,
}

impl CrawlContext {
    pub fn new(
        config: CrawlConfig,
        sessions: Vec<Box<dyn Driver>>,
        analyzer: Box<dyn MarkupAnalyzer>,
        bank: Box<dyn DataBank>,
    ) -> Result<Self, CrawlError> {
        let domain = DomainFilter::new(&config.base_url, &config.domains)?;
        Ok(Self {
            graph: StateGraph::new(config.bucket_count),
            values: ValueSynthesizer::new(stream_rng(config.seed, VALUE_STREAM), bank),
            budget: TimeBudget::from_secs(config.max_time_secs),
            sessions,
            analyzer,
            sink: Box::new(TracingSink),
            archive: Box::new(NullArchive),
            history: Vec::new(),
            domain,
            config,
        })
    }

    pub fn with_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_archive(mut self, archive: Box<dyn StateArchive>) -> Self {
        self.archive = archive;
        self
    }

    pub fn with_budget(mut self, budget: TimeBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn emit(&mut self, event: CrawlEvent) {
        self.sink.emit(event);
    }

    fn fault(&mut self, session: usize, operation: &'static str, error: DriverError) {
        self.sink.emit(CrawlEvent::DriverFault {
            session,
            operation,
            message: error.to_string(),
        });
    }

    /// Start every session and load the base URL.
    pub fn start_sessions(&mut self) -> Result<(), CrawlError> {
        let base = self.config.base_url.clone();
        for session in &mut self.sessions {
            session.start()?;
            session.navigate_to(&base)?;
            session.dismiss_interference()?;
        }
        Ok(())
    }

    /// Close every session, reporting failures.
    pub fn close_sessions(&mut self) {
        for i in 0..self.sessions.len() {
            if let Err(e) = self.sessions[i].close() {
                self.fault(i, "close", e);
            }
        }
    }

    /// Run `op` on every session, reporting failures.
    pub fn on_all_sessions(
        &mut self,
        operation: &'static str,
        mut op: impl FnMut(&mut dyn Driver) -> Result<(), DriverError>,
    ) {
        for i in 0..self.sessions.len() {
            let result = op(self.sessions[i].as_mut())
                .and_then(|_| self.sessions[i].dismiss_interference());
            if let Err(e) = result {
                self.fault(i, operation, e);
            }
        }
    }

    /// Fill the draft's controls and fire its element on every session.
    pub fn fire(&mut self, draft: &EdgeDraft) {
        self.emit(CrawlEvent::ActionFired {
            source: draft.source,
            element: draft.clickable.locator().to_string(),
            frame: draft.frame.to_string(),
        });
        for i in 0..self.sessions.len() {
            let session = self.sessions[i].as_mut();
            let mut faults = Vec::new();
            let frame = &draft.frame;
            for input in &draft.controls.inputs {
                if let Some(value) = &input.value {
                    if let Err(e) = session.set_value(frame, &input.locator(), value) {
                        faults.push(("set_value", e));
                    }
                }
            }
            for select in &draft.controls.selects {
                if let Some(index) = select.selected {
                    if let Err(e) = session.select_index(frame, &select.locator(), index) {
                        faults.push(("select_index", e));
                    }
                }
            }
            for group in &draft.controls.checkboxes {
                for (index, choice) in group.choices.iter().enumerate() {
                    let checked = group.selected.contains(&index);
                    if let Err(e) = session.set_checked(frame, &choice.locator(), checked) {
                        faults.push(("set_checked", e));
                    }
                }
            }
            for group in &draft.controls.radios {
                if let Some(choice) = group.selected.and_then(|i| group.choices.get(i)) {
                    if let Err(e) = session.set_checked(frame, &choice.locator(), true) {
                        faults.push(("set_checked", e));
                    }
                }
            }
            if let Err(e) = session.click(frame, &draft.clickable.locator()) {
                faults.push(("click", e));
            }
            if let Err(e) = session.dismiss_interference() {
                faults.push(("dismiss_interference", e));
            }
            for (operation, e) in faults {
                self.fault(i, operation, e);
            }
        }
    }

    /// Observe the page shown by session `index`.
    pub fn observe(&mut self, index: usize) -> Result<Observation, DriverError> {
        let session = self
            .sessions
            .get_mut(index)
            .ok_or(DriverError::NotStarted)?
            .as_mut();
        let url = session.current_url()?;
        let mut fragments = Vec::new();
        let mut skipped = Vec::new();
        let max_depth = if self.config.descend_frames {
            self.config.max_frame_depth
        } else {
            0
        };
        collect_fragments(
            session,
            self.analyzer.as_ref(),
            FramePath::top(),
            &url,
            max_depth,
            &mut fragments,
            &mut skipped,
        )?;
        for e in skipped {
            self.fault(index, "get_markup", e);
        }
        Ok(Observation::new(&url, fragments, self.analyzer.as_ref()))
    }

    /// Observe the primary session, reporting a failure as a fault.
    pub fn observe_primary(&mut self) -> Option<Observation> {
        match self.observe(0) {
            Ok(observation) => Some(observation),
            Err(e) => {
                self.fault(0, "observe", e);
                None
            }
        }
    }

    /// Whether the primary session shows `target`'s page.
    pub fn shows(&mut self, target: &Observation) -> bool {
        self.observe_primary()
            .map(|seen| seen.same_page(target, self.analyzer.as_ref()))
            .unwrap_or(false)
    }

    /// Re-identify the current state from the primary session after it was
    /// lost. If the page matches no state, or cannot be observed, the
    /// current state becomes unknown.
    pub fn resync_current(&mut self) -> Option<StateId> {
        let Some(seen) = self.observe_primary() else {
            self.graph.clear_current();
            return None;
        };
        match self.graph.find(&seen, self.analyzer.as_ref()) {
            Some(id) if self.graph.set_current(id).is_ok() => Some(id),
            _ => {
                self.graph.clear_current();
                self.emit(CrawlEvent::Desynchronized { url: seen.url });
                None
            }
        }
    }

    /// Candidate actions of `state`, in every frame.
    ///
    /// With a `prior` state, the analyzer may drop elements inherited
    /// unchanged from it.
    pub fn candidates(&self, state: StateId, prior: Option<StateId>) -> Vec<(FramePath, Clickable)> {
        let Some(current) = self.graph.state(state) else {
            return Vec::new();
        };
        let Some(prior) = prior.and_then(|p| self.graph.state(p)) else {
            return current
                .all_clickables()
                .map(|(frame, c)| (frame.clone(), c.clone()))
                .collect();
        };
        current
            .fragments()
            .iter()
            .flat_map(|fragment| {
                let inherited = prior
                    .observation()
                    .fragment(&fragment.frame)
                    .map(|f| f.markup.as_str());
                self.analyzer
                    .extract_clickables(&fragment.markup, inherited)
                    .into_iter()
                    .map(|c| (fragment.frame.clone(), c))
            })
            .collect()
    }

    /// Draft for `action` with freshly synthesized control values.
    pub fn draft(&mut self, action: &Action) -> EdgeDraft {
        let controls = self
            .graph
            .state(action.state)
            .and_then(|s| s.controls(&action.frame))
            .cloned()
            .unwrap_or_default();
        let filled = self.values.fill(&controls);
        EdgeDraft::new(action.state, action.clickable.clone(), action.frame.clone())
            .with_controls(filled)
    }

    /// Persist a new state and its screenshot.
    pub fn archive_state(&mut self, id: StateId) {
        let Some(state) = self.graph.state(id) else {
            return;
        };
        if let Err(e) = self.archive.save_state(state) {
            self.emit(CrawlEvent::ArchiveFault {
                state: id,
                message: e.to_string(),
            });
        }
        match self.archive.screenshot_path(id) {
            Ok(Some(path)) => {
                if let Some(primary) = self.sessions.first_mut() {
                    if let Err(e) = primary.screenshot(&path) {
                        self.fault(0, "screenshot", e);
                    }
                }
            }
            Ok(None) => {}
            Err(e) => self.emit(CrawlEvent::ArchiveFault {
                state: id,
                message: e.to_string(),
            }),
        }
    }
}

/// Depth-first over frame documents; each document is pushed after its
/// frames. A frame that cannot be read is skipped and reported.
fn collect_fragments(
    session: &mut dyn Driver,
    analyzer: &dyn MarkupAnalyzer,
    frame: FramePath,
    url: &str,
    max_depth: usize,
    fragments: &mut Vec<MarkupFragment>,
    skipped: &mut Vec<DriverError>,
) -> Result<(), DriverError> {
    let markup = session.get_markup(&frame)?;
    if frame.depth() < max_depth {
        for xpath in analyzer.extract_frames(&markup) {
            let child = frame.child(&xpath);
            if let Err(e) = collect_fragments(session, analyzer, child, url, max_depth, fragments, skipped) {
                skipped.push(e);
            }
        }
    }
    fragments.push(MarkupFragment {
        frame,
        url: url.to_string(),
        markup,
    });
    Ok(())
}
