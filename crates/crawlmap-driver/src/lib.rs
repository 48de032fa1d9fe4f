//! Browser-control drivers.
//!
//! [`Driver`] is the seam between the exploration engine and a browser.
//! [`WebDriverSession`] speaks the W3C WebDriver protocol over HTTP;
//! [`ScriptedSite`] is an in-memory site used to exercise the engine without
//! a browser.

pub mod driver;
pub mod scripted;
pub mod webdriver;

pub use driver::{Driver, DriverError};
pub use scripted::{ClickEffect, ScriptedSession, ScriptedSite, SiteStats};
pub use webdriver::{Browser, WebDriverConfig, WebDriverSession};
