use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crawlmap_markup::{Clickable, FormControls, FramePath, MarkupAnalyzer};

pub type StateId = u32;

/// Markup of one document of a page, tagged with the frame it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkupFragment {
    pub frame: FramePath,
    /// URL of the page, or the `src` of the frame document.
    pub url: String,
    pub markup: String,
}

impl MarkupFragment {
    pub fn top(url: &str, markup: &str) -> Self {
        Self {
            frame: FramePath::top(),
            url: url.to_string(),
            markup: markup.to_string(),
        }
    }
}

/// One observed page: its URL and the markup of every document in it.
///
/// Fragments are kept in frame-path order (top document first) and
/// normalized once, at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub url: String,
    fragments: Vec<MarkupFragment>,
    normalized: Vec<String>,
}

impl Observation {
    pub fn new(url: &str, mut fragments: Vec<MarkupFragment>, analyzer: &dyn MarkupAnalyzer) -> Self {
        fragments.sort_by(|a, b| a.frame.cmp(&b.frame));
        let normalized = fragments
            .iter()
            .map(|f| analyzer.normalize(&f.markup))
            .collect();
        Self {
            url: url.to_string(),
            fragments,
            normalized,
        }
    }

    pub fn fragments(&self) -> &[MarkupFragment] {
        &self.fragments
    }

    pub fn normalized(&self) -> &[String] {
        &self.normalized
    }

    pub fn fragment(&self, frame: &FramePath) -> Option<&MarkupFragment> {
        self.fragments.iter().find(|f| &f.frame == frame)
    }

    /// Normalized markup of all fragments, concatenated in frame order.
    pub fn fingerprint_text(&self) -> String {
        self.normalized.join("\n")
    }

    /// Same fragment count and every fragment structurally equal.
    pub fn same_markup(&self, other: &Observation, analyzer: &dyn MarkupAnalyzer) -> bool {
        self.normalized.len() == other.normalized.len()
            && self
                .normalized
                .iter()
                .zip(&other.normalized)
                .all(|(a, b)| analyzer.structural_equal(a, b))
    }

    /// [`Self::same_markup`] plus an identical URL.
    pub fn same_page(&self, other: &Observation, analyzer: &dyn MarkupAnalyzer) -> bool {
        self.url == other.url && self.same_markup(other, analyzer)
    }
}

/// A promoted state of the graph.
#[derive(Debug, Clone)]
pub struct State {
    pub id: StateId,
    observation: Observation,
    clickables: BTreeMap<FramePath, Vec<Clickable>>,
    controls: BTreeMap<FramePath, FormControls>,
    /// Elements actually fired from this state.
    fired: BTreeMap<FramePath, Vec<Clickable>>,
    depth: usize,
}

impl State {
    /// Promote an observation, extracting its elements and controls per frame.
    pub(crate) fn promote(
        id: StateId,
        observation: Observation,
        depth: usize,
        analyzer: &dyn MarkupAnalyzer,
    ) -> Self {
        let mut clickables = BTreeMap::new();
        let mut controls = BTreeMap::new();
        for fragment in observation.fragments() {
            clickables.insert(
                fragment.frame.clone(),
                analyzer.extract_clickables(&fragment.markup, None),
            );
            controls.insert(fragment.frame.clone(), analyzer.extract_controls(&fragment.markup));
        }
        Self {
            id,
            observation,
            clickables,
            controls,
            fired: BTreeMap::new(),
            depth,
        }
    }

    pub fn url(&self) -> &str {
        &self.observation.url
    }

    pub fn observation(&self) -> &Observation {
        &self.observation
    }

    pub fn fragments(&self) -> &[MarkupFragment] {
        self.observation.fragments()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn set_depth(&mut self, depth: usize) {
        self.depth = depth;
    }

    pub fn clickables(&self) -> &BTreeMap<FramePath, Vec<Clickable>> {
        &self.clickables
    }

    /// Every candidate clickable with the frame it lives in.
    pub fn all_clickables(&self) -> impl Iterator<Item = (&FramePath, &Clickable)> {
        self.clickables
            .iter()
            .flat_map(|(frame, list)| list.iter().map(move |c| (frame, c)))
    }

    pub fn controls(&self, frame: &FramePath) -> Option<&FormControls> {
        self.controls.get(frame)
    }

    pub fn all_controls(&self) -> &BTreeMap<FramePath, FormControls> {
        &self.controls
    }

    pub fn fired(&self) -> &BTreeMap<FramePath, Vec<Clickable>> {
        &self.fired
    }

    pub(crate) fn record_fired(&mut self, frame: &FramePath, clickable: &Clickable) {
        let list = self.fired.entry(frame.clone()).or_default();
        if !list.iter().any(|c| c.same_element(clickable)) {
            list.push(clickable.clone());
        }
    }

    /// A state nothing has been fired from ends every trace through it.
    pub fn is_terminal(&self) -> bool {
        self.fired.values().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crawlmap_markup::HtmlAnalyzer;

    #[test]
    fn test_fragments_are_ordered_top_first() {
        let analyzer = HtmlAnalyzer::default();
        let inner = MarkupFragment {
            frame: FramePath::top().child("/html[1]/body[1]/iframe[1]"),
            url: "http://x.test/inner".to_string(),
            markup: "<html><body>inner</body></html>".to_string(),
        };
        let top = MarkupFragment::top("http://x.test/", "<html><body>top</body></html>");
        let obs = Observation::new("http://x.test/", vec![inner, top], &analyzer);
        assert!(obs.fragments()[0].frame.is_top());
        assert!(obs.normalized()[1].contains("inner"));
    }

    #[test]
    fn test_same_page_requires_same_url() {
        let analyzer = HtmlAnalyzer::default();
        let markup = "<html><body><p>x</p></body></html>";
        let a = Observation::new("http://x.test/a", vec![MarkupFragment::top("http://x.test/a", markup)], &analyzer);
        let b = Observation::new("http://x.test/b", vec![MarkupFragment::top("http://x.test/b", markup)], &analyzer);
        assert!(a.same_markup(&b, &analyzer));
        assert!(!a.same_page(&b, &analyzer));
    }

    #[test]
    fn test_promoted_state_extracts_per_frame() {
        let analyzer = HtmlAnalyzer::default();
        let markup = r#"<html><body><a id="a">A</a><input name="q"></body></html>"#;
        let obs = Observation::new("http://x.test/", vec![MarkupFragment::top("http://x.test/", markup)], &analyzer);
        let mut state = State::promote(0, obs, 0, &analyzer);

        assert_eq!(state.all_clickables().count(), 1);
        assert_eq!(state.controls(&FramePath::top()).map(|c| c.inputs.len()), Some(1));
        assert!(state.is_terminal());

        let (frame, clickable) = {
            let (f, c) = state.all_clickables().next().unwrap();
            (f.clone(), c.clone())
        };
        state.record_fired(&frame, &clickable);
        state.record_fired(&frame, &clickable);
        assert!(!state.is_terminal());
        assert_eq!(state.fired()[&frame].len(), 1);
    }
}
