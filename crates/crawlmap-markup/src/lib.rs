//! Markup analysis for the crawler.
//!
//! Defines the element and form-control records the crawler works with,
//! the [`MarkupAnalyzer`] seam the exploration engine calls through, and
//! [`HtmlAnalyzer`], the html5ever-backed implementation.

pub mod analyzer;
pub mod element;
pub mod frame;
pub mod html;

pub use analyzer::MarkupAnalyzer;
pub use element::{
    CheckboxGroup, Choice, Clickable, FormControls, InputField, Locator, RadioGroup, SelectField,
};
pub use frame::FramePath;
pub use html::{AnalyzerConfig, ClickableRule, HtmlAnalyzer};
