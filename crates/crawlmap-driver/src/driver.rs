use std::path::Path;

use crawlmap_markup::{FramePath, Locator};

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("Session not started")]
    NotStarted,

    #[error("Element not found: {locator}")]
    ElementNotFound { locator: String },

    #[error("Frame not found: {frame}")]
    FrameNotFound { frame: String },

    #[error("Navigation to '{url}' failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("WebDriver error '{error}': {message}")]
    WebDriver { error: String, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Screenshot decode error: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait abstracting one browser session.
///
/// Every call blocks until the browser has settled. Element calls take the
/// frame path of the document the element lives in; the top document is
/// [`FramePath::top`]. Callers treat most errors as transient: they are
/// reported and the crawl carries on.
pub trait Driver {
    /// Open the session. Calling `start` on a running session is a no-op.
    fn start(&mut self) -> Result<(), DriverError>;

    fn navigate_to(&mut self, url: &str) -> Result<(), DriverError>;

    fn current_url(&mut self) -> Result<String, DriverError>;

    /// Markup of the document at `frame`.
    fn get_markup(&mut self, frame: &FramePath) -> Result<String, DriverError>;

    fn click(&mut self, frame: &FramePath, locator: &Locator) -> Result<(), DriverError>;

    /// Clear a text control and type `value` into it.
    fn set_value(
        &mut self,
        frame: &FramePath,
        locator: &Locator,
        value: &str,
    ) -> Result<(), DriverError>;

    /// Choose the option at `index` of a `<select>`.
    fn select_index(
        &mut self,
        frame: &FramePath,
        locator: &Locator,
        index: usize,
    ) -> Result<(), DriverError>;

    /// Bring a checkbox or radio button to the `checked` state.
    fn set_checked(
        &mut self,
        frame: &FramePath,
        locator: &Locator,
        checked: bool,
    ) -> Result<(), DriverError>;

    fn history_back(&mut self) -> Result<(), DriverError>;

    fn history_forward(&mut self) -> Result<(), DriverError>;

    /// History back issued from page script (`window.history.go(-1)`).
    fn script_back(&mut self) -> Result<(), DriverError>;

    fn refresh(&mut self) -> Result<(), DriverError>;

    /// Write a PNG screenshot of the viewport to `path`.
    fn screenshot(&mut self, path: &Path) -> Result<(), DriverError>;

    /// Close and reopen the session, dropping all browser state.
    fn restart(&mut self) -> Result<(), DriverError> {
        self.close()?;
        self.start()
    }

    fn close(&mut self) -> Result<(), DriverError>;

    /// Dismiss alerts and close windows other than the main one.
    fn dismiss_interference(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
}
