//! In-memory scripted site.
//!
//! A [`ScriptedSite`] is a set of named pages, each with a URL, markup, the
//! effect of clicking each of its elements, and optional frame documents.
//! [`ScriptedSite::session`] hands out [`ScriptedSession`]s implementing
//! [`Driver`]; sessions share a [`SiteStats`] counter block the test can
//! inspect after the crawl has consumed them.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crawlmap_markup::{FramePath, Locator};

use crate::driver::{Driver, DriverError};

const BLANK_URL: &str = "about:blank";
const BLANK_MARKUP: &str = "<html><head></head><body></body></html>";

/// What clicking an element does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickEffect {
    /// Load another page, adding a history entry.
    Navigate(String),
    /// Swap the document in place from script, without a history entry.
    Rewrite(String),
    /// Nothing observable happens.
    Stay,
    /// Navigate to `on_match` if the text control `field` (id or XPath)
    /// currently holds `expected`, to `otherwise` if not.
    Submit {
        field: String,
        expected: String,
        on_match: String,
        otherwise: String,
    },
}

#[derive(Debug, Clone)]
struct ScriptedPage {
    url: String,
    markup: String,
    clicks: HashMap<String, ClickEffect>,
    /// Frame element XPath -> page key of the framed document.
    frames: HashMap<String, String>,
}

/// Counters shared by all sessions of one site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteStats {
    pub starts: usize,
    pub closes: usize,
    pub restarts: usize,
    pub navigations: usize,
    pub clicks: usize,
    pub refreshes: usize,
    pub history_backs: usize,
    pub script_backs: usize,
    pub forwards: usize,
    pub screenshots: usize,
    /// `(locator, value)` for every value written into a control.
    pub values: Vec<(String, String)>,
}

/// Definition of an in-memory site.
#[derive(Debug, Clone)]
pub struct ScriptedSite {
    pages: HashMap<String, ScriptedPage>,
    /// Page keys in insertion order.
    landing_order: Vec<String>,
    history_back_works: bool,
    script_back_works: bool,
    restart_works: bool,
    /// Loads by `navigate_to` allowed before it starts failing.
    navigation_limit: Option<usize>,
    stats: Arc<Mutex<SiteStats>>,
}

impl ScriptedSite {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            landing_order: Vec::new(),
            history_back_works: true,
            script_back_works: true,
            restart_works: true,
            navigation_limit: None,
            stats: Arc::default(),
        }
    }

    /// Add a page. The first page added for a URL is the one loaded when
    /// navigating to that URL.
    pub fn page(mut self, key: &str, url: &str, markup: &str) -> Self {
        self.pages.insert(
            key.to_string(),
            ScriptedPage {
                url: url.to_string(),
                markup: markup.to_string(),
                clicks: HashMap::new(),
                frames: HashMap::new(),
            },
        );
        self.landing_order.push(key.to_string());
        self
    }

    /// Set what clicking the element with id or XPath `element` on `page` does.
    pub fn on_click(mut self, page: &str, element: &str, effect: ClickEffect) -> Self {
        if let Some(p) = self.pages.get_mut(page) {
            p.clicks.insert(element.to_string(), effect);
        }
        self
    }

    /// Embed page `framed` into `page` at the frame element `frame_xpath`.
    pub fn frame(mut self, page: &str, frame_xpath: &str, framed: &str) -> Self {
        if let Some(p) = self.pages.get_mut(page) {
            p.frames.insert(frame_xpath.to_string(), framed.to_string());
        }
        self
    }

    /// Make browser history back a silent no-op.
    pub fn without_history_back(mut self) -> Self {
        self.history_back_works = false;
        self
    }

    /// Make script history back a silent no-op.
    pub fn without_script_back(mut self) -> Self {
        self.script_back_works = false;
        self
    }

    /// Make `restart` fail, leaving the session as it was.
    pub fn without_restart(mut self) -> Self {
        self.restart_works = false;
        self
    }

    /// Make `navigate_to` fail once `limit` loads have happened on any
    /// session of the site.
    pub fn with_navigation_limit(mut self, limit: usize) -> Self {
        self.navigation_limit = Some(limit);
        self
    }

    /// A fresh, not yet started session on this site.
    pub fn session(&self) -> ScriptedSession {
        ScriptedSession {
            site: Arc::new(self.clone()),
            current: None,
            back: Vec::new(),
            forward: Vec::new(),
            started: false,
            text: HashMap::new(),
        }
    }

    pub fn stats(&self) -> SiteStats {
        lock(&self.stats).clone()
    }

    fn landing(&self, url: &str) -> Option<&str> {
        self.landing_order
            .iter()
            .find(|key| self.pages.get(key.as_str()).map(|p| p.url == url).unwrap_or(false))
            .map(String::as_str)
    }
}

impl Default for ScriptedSite {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(stats: &Mutex<SiteStats>) -> MutexGuard<'_, SiteStats> {
    stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One session on a [`ScriptedSite`].
#[derive(Debug)]
pub struct ScriptedSession {
    site: Arc<ScriptedSite>,
    current: Option<String>,
    back: Vec<String>,
    forward: Vec<String>,
    started: bool,
    /// Text control values of the current document, keyed by id or XPath.
    text: HashMap<String, String>,
}

impl ScriptedSession {
    /// Key of the page currently shown, if any.
    pub fn current_page(&self) -> Option<&str> {
        self.current.as_deref()
    }

    fn ensure_started(&self) -> Result<(), DriverError> {
        if self.started {
            Ok(())
        } else {
            Err(DriverError::NotStarted)
        }
    }

    fn page(&self) -> Option<&ScriptedPage> {
        self.current.as_ref().and_then(|key| self.site.pages.get(key))
    }

    fn document(&self, frame: &FramePath) -> Result<Option<&ScriptedPage>, DriverError> {
        let mut page = self.page();
        for xpath in frame.xpaths() {
            let framed = page
                .and_then(|p| p.frames.get(xpath))
                .and_then(|key| self.site.pages.get(key))
                .ok_or_else(|| DriverError::FrameNotFound {
                    frame: frame.to_string(),
                })?;
            page = Some(framed);
        }
        Ok(page)
    }

    fn show(&mut self, key: String, with_history: bool) {
        if with_history {
            if let Some(previous) = self.current.take() {
                self.back.push(previous);
            }
            self.forward.clear();
        }
        self.current = Some(key);
        self.text.clear();
    }

    fn go_back(&mut self) {
        if let Some(previous) = self.back.pop() {
            if let Some(current) = self.current.take() {
                self.forward.push(current);
            }
            self.current = Some(previous);
            self.text.clear();
        }
    }

    fn field_value(&self, field: &str) -> Option<&str> {
        self.text.get(field).map(String::as_str)
    }
}

fn effect_for<'a>(page: &'a ScriptedPage, locator: &Locator) -> Option<&'a ClickEffect> {
    locator
        .id
        .as_ref()
        .and_then(|id| page.clicks.get(id))
        .or_else(|| page.clicks.get(&locator.xpath))
}

impl Driver for ScriptedSession {
    fn start(&mut self) -> Result<(), DriverError> {
        if !self.started {
            self.started = true;
            lock(&self.site.stats).starts += 1;
        }
        Ok(())
    }

    fn navigate_to(&mut self, url: &str) -> Result<(), DriverError> {
        self.ensure_started()?;
        let key = self
            .site
            .landing(url)
            .ok_or_else(|| DriverError::Navigation {
                url: url.to_string(),
                reason: "no such page".to_string(),
            })?
            .to_string();
        {
            let mut stats = lock(&self.site.stats);
            if self.site.navigation_limit.is_some_and(|limit| stats.navigations >= limit) {
                return Err(DriverError::Navigation {
                    url: url.to_string(),
                    reason: "navigation refused".to_string(),
                });
            }
            stats.navigations += 1;
        }
        self.show(key, true);
        Ok(())
    }

    fn current_url(&mut self) -> Result<String, DriverError> {
        self.ensure_started()?;
        Ok(self
            .page()
            .map(|p| p.url.clone())
            .unwrap_or_else(|| BLANK_URL.to_string()))
    }

    fn get_markup(&mut self, frame: &FramePath) -> Result<String, DriverError> {
        self.ensure_started()?;
        Ok(self
            .document(frame)?
            .map(|p| p.markup.clone())
            .unwrap_or_else(|| BLANK_MARKUP.to_string()))
    }

    fn click(&mut self, frame: &FramePath, locator: &Locator) -> Result<(), DriverError> {
        self.ensure_started()?;
        let effect = self
            .document(frame)?
            .and_then(|page| effect_for(page, locator))
            .cloned()
            .ok_or_else(|| DriverError::ElementNotFound {
                locator: locator.to_string(),
            })?;
        lock(&self.site.stats).clicks += 1;
        match effect {
            ClickEffect::Navigate(key) => self.show(key, true),
            ClickEffect::Rewrite(key) => self.show(key, false),
            ClickEffect::Stay => {}
            ClickEffect::Submit {
                field,
                expected,
                on_match,
                otherwise,
            } => {
                let target = if self.field_value(&field) == Some(expected.as_str()) {
                    on_match
                } else {
                    otherwise
                };
                self.show(target, true);
            }
        }
        Ok(())
    }

    fn set_value(
        &mut self,
        _frame: &FramePath,
        locator: &Locator,
        value: &str,
    ) -> Result<(), DriverError> {
        self.ensure_started()?;
        if let Some(id) = &locator.id {
            self.text.insert(id.clone(), value.to_string());
        }
        self.text.insert(locator.xpath.clone(), value.to_string());
        lock(&self.site.stats)
            .values
            .push((locator.to_string(), value.to_string()));
        Ok(())
    }

    fn select_index(
        &mut self,
        _frame: &FramePath,
        locator: &Locator,
        index: usize,
    ) -> Result<(), DriverError> {
        self.ensure_started()?;
        lock(&self.site.stats)
            .values
            .push((locator.to_string(), index.to_string()));
        Ok(())
    }

    fn set_checked(
        &mut self,
        _frame: &FramePath,
        locator: &Locator,
        checked: bool,
    ) -> Result<(), DriverError> {
        self.ensure_started()?;
        lock(&self.site.stats)
            .values
            .push((locator.to_string(), checked.to_string()));
        Ok(())
    }

    fn history_back(&mut self) -> Result<(), DriverError> {
        self.ensure_started()?;
        lock(&self.site.stats).history_backs += 1;
        if self.site.history_back_works {
            self.go_back();
        }
        Ok(())
    }

    fn history_forward(&mut self) -> Result<(), DriverError> {
        self.ensure_started()?;
        lock(&self.site.stats).forwards += 1;
        if let Some(next) = self.forward.pop() {
            if let Some(current) = self.current.take() {
                self.back.push(current);
            }
            self.current = Some(next);
            self.text.clear();
        }
        Ok(())
    }

    fn script_back(&mut self) -> Result<(), DriverError> {
        self.ensure_started()?;
        lock(&self.site.stats).script_backs += 1;
        if self.site.script_back_works {
            self.go_back();
        }
        Ok(())
    }

    fn refresh(&mut self) -> Result<(), DriverError> {
        self.ensure_started()?;
        lock(&self.site.stats).refreshes += 1;
        // A reload drops script rewrites: the URL's landing page comes back.
        let landing = self
            .page()
            .and_then(|p| self.site.landing(&p.url))
            .map(str::to_string);
        if let Some(key) = landing {
            self.current = Some(key);
            self.text.clear();
        }
        Ok(())
    }

    fn screenshot(&mut self, path: &Path) -> Result<(), DriverError> {
        self.ensure_started()?;
        lock(&self.site.stats).screenshots += 1;
        let label = self.current.clone().unwrap_or_else(|| BLANK_URL.to_string());
        std::fs::write(path, label.as_bytes())?;
        Ok(())
    }

    fn restart(&mut self) -> Result<(), DriverError> {
        if !self.site.restart_works {
            return Err(DriverError::WebDriver {
                error: "session not created".to_string(),
                message: "restart refused".to_string(),
            });
        }
        self.close()?;
        self.start()?;
        lock(&self.site.stats).restarts += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DriverError> {
        if self.started {
            self.started = false;
            lock(&self.site.stats).closes += 1;
        }
        self.current = None;
        self.back.clear();
        self.forward.clear();
        self.text.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> ScriptedSite {
        ScriptedSite::new()
            .page("home", "http://site.test/", "<html><body><a id=\"go\">Go</a></body></html>")
            .page("next", "http://site.test/next", "<html><body>next</body></html>")
            .page("popup", "http://site.test/", "<html><body>popup</body></html>")
            .on_click("home", "go", ClickEffect::Navigate("next".to_string()))
            .on_click("home", "/html[1]/body[1]/button[1]", ClickEffect::Rewrite("popup".to_string()))
    }

    #[test]
    fn test_calls_before_start_fail() {
        let mut session = site().session();
        assert!(matches!(session.current_url(), Err(DriverError::NotStarted)));
        session.start().unwrap();
        assert_eq!(session.current_url().unwrap(), BLANK_URL);
    }

    #[test]
    fn test_click_navigates_and_back_returns() {
        let site = site();
        let mut session = site.session();
        session.start().unwrap();
        session.navigate_to("http://site.test/").unwrap();
        session
            .click(&FramePath::top(), &Locator::by_id("go", "/html[1]/body[1]/a[1]"))
            .unwrap();
        assert_eq!(session.current_url().unwrap(), "http://site.test/next");

        session.history_back().unwrap();
        assert_eq!(session.current_page(), Some("home"));
        session.history_forward().unwrap();
        assert_eq!(session.current_page(), Some("next"));
        assert_eq!(site.stats().clicks, 1);
    }

    #[test]
    fn test_unknown_element_is_not_found() {
        let mut session = site().session();
        session.start().unwrap();
        session.navigate_to("http://site.test/").unwrap();
        let err = session
            .click(&FramePath::top(), &Locator::by_xpath("/html[1]/body[1]/p[1]"))
            .unwrap_err();
        assert!(matches!(err, DriverError::ElementNotFound { .. }));
    }

    #[test]
    fn test_rewrite_is_undone_by_refresh_not_by_back() {
        let mut session = site().session();
        session.start().unwrap();
        session.navigate_to("http://site.test/").unwrap();
        session
            .click(&FramePath::top(), &Locator::by_xpath("/html[1]/body[1]/button[1]"))
            .unwrap();
        assert_eq!(session.current_page(), Some("popup"));
        assert_eq!(session.current_url().unwrap(), "http://site.test/");

        session.refresh().unwrap();
        assert_eq!(session.current_page(), Some("home"));
    }

    #[test]
    fn test_disabled_history_back_is_silent() {
        let site = site().without_history_back();
        let mut session = site.session();
        session.start().unwrap();
        session.navigate_to("http://site.test/").unwrap();
        session
            .click(&FramePath::top(), &Locator::by_id("go", "/html[1]/body[1]/a[1]"))
            .unwrap();
        session.history_back().unwrap();
        assert_eq!(session.current_page(), Some("next"));
        session.script_back().unwrap();
        assert_eq!(session.current_page(), Some("home"));
        assert_eq!(site.stats().history_backs, 1);
        assert_eq!(site.stats().script_backs, 1);
    }

    #[test]
    fn test_refused_navigation_and_restart() {
        let site = site().with_navigation_limit(1).without_restart();
        let mut session = site.session();
        session.start().unwrap();
        session.navigate_to("http://site.test/").unwrap();
        assert!(matches!(
            session.navigate_to("http://site.test/next"),
            Err(DriverError::Navigation { .. })
        ));
        assert!(session.restart().is_err());
        assert_eq!(session.current_page(), Some("home"));
        assert_eq!(site.stats().navigations, 1);
        assert_eq!(site.stats().restarts, 0);
    }

    #[test]
    fn test_restart_clears_state_and_counts() {
        let site = site();
        let mut session = site.session();
        session.start().unwrap();
        session.navigate_to("http://site.test/").unwrap();
        session.restart().unwrap();
        assert_eq!(session.current_url().unwrap(), BLANK_URL);
        let stats = site.stats();
        assert_eq!((stats.starts, stats.closes, stats.restarts), (2, 1, 1));
    }
}
