//! W3C WebDriver client.
//!
//! Talks to a WebDriver endpoint (geckodriver, chromedriver, a Selenium grid)
//! with reqwest. The [`Driver`] trait is synchronous, so each session owns a
//! current-thread tokio runtime and blocks on every command.

use std::path::Path;
use std::time::Duration;

use base64::Engine as _;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crawlmap_markup::{FramePath, Locator};

use crate::driver::{Driver, DriverError};

/// W3C key under which element references are returned.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Alerts dismissed per interference check before giving up.
const MAX_ALERTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    Firefox,
    Chrome,
}

impl Browser {
    fn capabilities(self, headless: bool) -> Value {
        let args: Vec<&str> = if headless { vec!["-headless"] } else { vec![] };
        match self {
            Browser::Firefox => json!({
                "browserName": "firefox",
                "acceptInsecureCerts": true,
                "moz:firefoxOptions": { "args": args },
            }),
            Browser::Chrome => {
                let args: Vec<&str> = if headless { vec!["--headless=new"] } else { vec![] };
                json!({
                    "browserName": "chrome",
                    "acceptInsecureCerts": true,
                    "goog:chromeOptions": { "args": args },
                })
            }
        }
    }
}

/// Connection and timing settings for a WebDriver session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDriverConfig {
    /// Base URL of the WebDriver server.
    pub endpoint: String,
    pub browser: Browser,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// Page-load timeout in milliseconds.
    pub page_load_timeout_ms: u64,
    /// Implicit element-lookup wait in milliseconds.
    pub implicit_wait_ms: u64,
    /// Pause after every interaction so page scripts can settle.
    pub settle_delay_ms: u64,
    /// Timeout of a single HTTP command in seconds.
    pub request_timeout_secs: u64,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:4444".to_string(),
            browser: Browser::Firefox,
            headless: true,
            window_width: 1280,
            window_height: 960,
            page_load_timeout_ms: 30_000,
            implicit_wait_ms: 5_000,
            settle_delay_ms: 1_000,
            request_timeout_secs: 60,
        }
    }
}

/// One browser session behind a WebDriver server.
pub struct WebDriverSession {
    config: WebDriverConfig,
    client: Client,
    runtime: tokio::runtime::Runtime,
    session_id: Option<String>,
    main_window: Option<String>,
}

impl WebDriverSession {
    pub fn new(config: WebDriverConfig) -> Result<Self, DriverError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            config,
            client,
            runtime,
            session_id: None,
            main_window: None,
        })
    }

    pub fn config(&self) -> &WebDriverConfig {
        &self.config
    }

    fn endpoint(&self) -> &str {
        self.config.endpoint.trim_end_matches('/')
    }

    fn session_url(&self, path: &str) -> Result<String, DriverError> {
        let id = self.session_id.as_deref().ok_or(DriverError::NotStarted)?;
        Ok(format!("{}/session/{id}{path}", self.endpoint()))
    }

    /// Issue one command against the current session and return its `value`.
    fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, DriverError> {
        let url = self.session_url(path)?;
        self.runtime.block_on(send(&self.client, method, url, body))
    }

    fn settle(&self) {
        if self.config.settle_delay_ms > 0 {
            self.runtime
                .block_on(tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)));
        }
    }

    /// Switch the browsing context to the document at `frame`.
    fn enter_frame(&self, frame: &FramePath) -> Result<(), DriverError> {
        self.command(Method::POST, "/frame", Some(json!({ "id": Value::Null })))?;
        for xpath in frame.xpaths() {
            let element = self
                .find(&Locator::by_xpath(xpath))
                .map_err(|_| DriverError::FrameNotFound {
                    frame: frame.to_string(),
                })?;
            self.command(
                Method::POST,
                "/frame",
                Some(json!({ "id": { ELEMENT_KEY: element } })),
            )?;
        }
        Ok(())
    }

    /// Resolve a locator to an element reference, by id first and XPath second.
    fn find(&self, locator: &Locator) -> Result<String, DriverError> {
        if let Some(id) = &locator.id {
            let by_id = json!({ "using": "css selector", "value": format!("[id=\"{id}\"]") });
            if let Ok(value) = self.command(Method::POST, "/element", Some(by_id)) {
                if let Some(element) = element_ref(&value) {
                    return Ok(element);
                }
            }
        }
        let by_xpath = json!({ "using": "xpath", "value": locator.xpath });
        let value = self
            .command(Method::POST, "/element", Some(by_xpath))
            .map_err(|_| DriverError::ElementNotFound {
                locator: locator.to_string(),
            })?;
        element_ref(&value).ok_or_else(|| DriverError::ElementNotFound {
            locator: locator.to_string(),
        })
    }

    fn find_in(&self, frame: &FramePath, locator: &Locator) -> Result<String, DriverError> {
        self.enter_frame(frame)?;
        self.find(locator)
    }

    fn is_selected(&self, element: &str) -> Result<bool, DriverError> {
        let value = self.command(Method::GET, &format!("/element/{element}/selected"), None)?;
        Ok(value.as_bool().unwrap_or(false))
    }

    fn click_element(&self, element: &str) -> Result<(), DriverError> {
        self.command(Method::POST, &format!("/element/{element}/click"), Some(json!({})))?;
        Ok(())
    }

    fn configure(&self) -> Result<(), DriverError> {
        self.command(
            Method::POST,
            "/timeouts",
            Some(json!({
                "implicit": self.config.implicit_wait_ms,
                "pageLoad": self.config.page_load_timeout_ms,
            })),
        )?;
        self.command(
            Method::POST,
            "/window/rect",
            Some(json!({
                "width": self.config.window_width,
                "height": self.config.window_height,
            })),
        )?;
        Ok(())
    }
}

impl Driver for WebDriverSession {
    fn start(&mut self) -> Result<(), DriverError> {
        if self.session_id.is_some() {
            return Ok(());
        }
        let body = json!({
            "capabilities": {
                "alwaysMatch": self.config.browser.capabilities(self.config.headless),
            }
        });
        let url = format!("{}/session", self.endpoint());
        let value = self
            .runtime
            .block_on(send(&self.client, Method::POST, url, Some(body)))?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::WebDriver {
                error: "session not created".to_string(),
                message: value.to_string(),
            })?
            .to_string();
        info!(session = %session_id, browser = ?self.config.browser, "WebDriver session started");
        self.session_id = Some(session_id);

        if let Err(e) = self.configure() {
            warn!("session configuration failed: {e}");
        }
        let handle = self.command(Method::GET, "/window", None)?;
        self.main_window = handle.as_str().map(str::to_string);
        Ok(())
    }

    fn navigate_to(&mut self, url: &str) -> Result<(), DriverError> {
        debug!("navigate to {url}");
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .map_err(|e| DriverError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    fn current_url(&mut self) -> Result<String, DriverError> {
        let value = self.command(Method::GET, "/url", None)?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    fn get_markup(&mut self, frame: &FramePath) -> Result<String, DriverError> {
        self.enter_frame(frame)?;
        let value = self.command(Method::GET, "/source", None)?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    fn click(&mut self, frame: &FramePath, locator: &Locator) -> Result<(), DriverError> {
        debug!("click {locator} in {frame}");
        let element = self.find_in(frame, locator)?;
        self.click_element(&element)?;
        self.settle();
        Ok(())
    }

    fn set_value(
        &mut self,
        frame: &FramePath,
        locator: &Locator,
        value: &str,
    ) -> Result<(), DriverError> {
        debug!("set {locator} = {value:?}");
        let element = self.find_in(frame, locator)?;
        self.command(Method::POST, &format!("/element/{element}/clear"), Some(json!({})))?;
        self.command(
            Method::POST,
            &format!("/element/{element}/value"),
            Some(json!({ "text": value })),
        )?;
        Ok(())
    }

    fn select_index(
        &mut self,
        frame: &FramePath,
        locator: &Locator,
        index: usize,
    ) -> Result<(), DriverError> {
        debug!("select option {index} of {locator}");
        let select = self.find_in(frame, locator)?;
        let option = self.command(
            Method::POST,
            &format!("/element/{select}/element"),
            Some(json!({ "using": "xpath", "value": format!("(.//option)[{}]", index + 1) })),
        )?;
        let option = element_ref(&option).ok_or_else(|| DriverError::ElementNotFound {
            locator: format!("{locator} option {index}"),
        })?;
        self.click_element(&option)
    }

    fn set_checked(
        &mut self,
        frame: &FramePath,
        locator: &Locator,
        checked: bool,
    ) -> Result<(), DriverError> {
        let element = self.find_in(frame, locator)?;
        if self.is_selected(&element)? != checked {
            debug!("toggle {locator} to {checked}");
            self.click_element(&element)?;
        }
        Ok(())
    }

    fn history_back(&mut self) -> Result<(), DriverError> {
        self.command(Method::POST, "/back", Some(json!({})))?;
        self.settle();
        Ok(())
    }

    fn history_forward(&mut self) -> Result<(), DriverError> {
        self.command(Method::POST, "/forward", Some(json!({})))?;
        self.settle();
        Ok(())
    }

    fn script_back(&mut self) -> Result<(), DriverError> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": "window.history.go(-1);", "args": [] })),
        )?;
        self.settle();
        Ok(())
    }

    fn refresh(&mut self) -> Result<(), DriverError> {
        self.command(Method::POST, "/refresh", Some(json!({})))?;
        self.settle();
        Ok(())
    }

    fn screenshot(&mut self, path: &Path) -> Result<(), DriverError> {
        self.command(Method::POST, "/frame", Some(json!({ "id": Value::Null })))?;
        let value = self.command(Method::GET, "/screenshot", None)?;
        let encoded = value.as_str().unwrap_or_default();
        let bytes = base64::engine::general_purpose::STANDARD.decode(encoded)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DriverError> {
        if self.session_id.is_none() {
            return Ok(());
        }
        let result = self.command(Method::DELETE, "", None);
        self.session_id = None;
        self.main_window = None;
        result.map(|_| ())
    }

    fn dismiss_interference(&mut self) -> Result<(), DriverError> {
        for _ in 0..MAX_ALERTS {
            match self.command(Method::GET, "/alert/text", None) {
                Ok(text) => {
                    info!("dismissing alert: {}", text.as_str().unwrap_or_default());
                    self.command(Method::POST, "/alert/dismiss", Some(json!({})))?;
                }
                Err(_) => break,
            }
        }

        let Some(main) = self.main_window.clone() else {
            return Ok(());
        };
        let handles = self.command(Method::GET, "/window/handles", None)?;
        let handles: Vec<String> = serde_json::from_value(handles)?;
        if handles.len() > 1 {
            info!("closing {} extra window(s)", handles.len() - 1);
            for handle in handles.iter().filter(|h| **h != main) {
                self.command(Method::POST, "/window", Some(json!({ "handle": handle })))?;
                self.command(Method::DELETE, "/window", None)?;
            }
            self.command(Method::POST, "/window", Some(json!({ "handle": main })))?;
        }
        Ok(())
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        if self.session_id.is_some() {
            if let Err(e) = self.close() {
                warn!("closing WebDriver session on drop failed: {e}");
            }
        }
    }
}

fn element_ref(value: &Value) -> Option<String> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(str::to_string)
}

async fn send(
    client: &Client,
    method: Method,
    url: String,
    body: Option<Value>,
) -> Result<Value, DriverError> {
    let mut request = client.request(method, &url);
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request.send().await?;
    let status = response.status();
    let payload: Value = response.json().await?;
    let value = payload.get("value").cloned().unwrap_or(Value::Null);
    if status.is_success() {
        return Ok(value);
    }
    let error = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if error == "no such element" {
        return Err(DriverError::ElementNotFound { locator: message });
    }
    Err(DriverError::WebDriver { error, message })
}
