//! HTML analyzer built on html5ever.
//!
//! Documents are parsed with html5ever's browser-compatible tree builder into
//! an `RcDom`, converted to a small owned element tree, and every query runs
//! over that tree. XPaths are absolute and positional per tag
//! (`/html[1]/body[1]/div[2]/a[1]`), which is what the driver resolves.

use std::collections::HashMap;
use std::fmt::Write as _;

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use serde::{Deserialize, Serialize};

use crate::analyzer::MarkupAnalyzer;
use crate::element::{CheckboxGroup, Choice, Clickable, InputField, RadioGroup, SelectField};

/// Tag (and optional attribute constraint) that marks an element as clickable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickableRule {
    pub tag: String,
    pub attr: Option<String>,
    pub value: Option<String>,
}

impl ClickableRule {
    pub fn tag(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attr: None,
            value: None,
        }
    }

    pub fn with_attr(tag: &str, attr: &str, value: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attr: Some(attr.to_string()),
            value: Some(value.to_string()),
        }
    }

    fn matches(&self, element: &ElementNode) -> bool {
        if element.tag != self.tag {
            return false;
        }
        match (&self.attr, &self.value) {
            (None, _) => true,
            (Some(attr), None) => element.attr(attr).is_some(),
            (Some(attr), Some(value)) => element
                .attr(attr)
                .map(|v| v.eq_ignore_ascii_case(value))
                .unwrap_or(false),
        }
    }
}

/// Analyzer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Rules selecting candidate clickables.
    pub clickable_rules: Vec<ClickableRule>,
    /// `<input type=...>` values treated as free-text inputs.
    pub text_input_types: Vec<String>,
    /// Tags whose documents are observed as nested frames.
    pub frame_tags: Vec<String>,
    /// Tags dropped entirely from normalized markup.
    pub ignored_tags: Vec<String>,
    /// Attributes dropped from normalized markup.
    pub ignored_attributes: Vec<String>,
    /// Id prefixes produced by client-side frameworks. Such ids are dropped
    /// from normalized markup and never used as locators.
    pub volatile_id_prefixes: Vec<String>,
    /// Keep text content in normalized markup.
    pub keep_text: bool,
    /// Skip clickables already present in the markup of the prior state.
    pub skip_inherited_clickables: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            clickable_rules: vec![
                ClickableRule::tag("a"),
                ClickableRule::tag("button"),
                ClickableRule::with_attr("input", "type", "submit"),
                ClickableRule::with_attr("input", "type", "button"),
            ],
            text_input_types: ["text", "email", "password", "search", "tel", "url", "number"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            frame_tags: vec!["iframe".to_string(), "frame".to_string()],
            ignored_tags: ["script", "style", "noscript", "link", "meta"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ignored_attributes: vec!["style".to_string(), "nonce".to_string()],
            volatile_id_prefixes: ["ember", "react-", "yui_", "ext-gen", "gwt-uid-", "ui-id-"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            keep_text: true,
            skip_inherited_clickables: true,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Element(ElementNode),
    Text(String),
}

#[derive(Debug, Clone)]
struct ElementNode {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
}

impl ElementNode {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(t) => {
                    out.push_str(t);
                    out.push(' ');
                }
                Node::Element(e) => e.collect_text(out),
            }
        }
    }
}

fn convert(handle: &Handle) -> Option<Node> {
    match &handle.data {
        NodeData::Element { name, attrs, .. } => {
            let attrs = attrs
                .borrow()
                .iter()
                .map(|a| (a.name.local.to_string(), a.value.to_string()))
                .collect();
            let children = handle.children.borrow().iter().filter_map(convert).collect();
            Some(Node::Element(ElementNode {
                tag: name.local.to_string(),
                attrs,
                children,
            }))
        }
        NodeData::Text { contents } => Some(Node::Text(contents.borrow().to_string())),
        _ => None,
    }
}

/// Parse a document and return its root (`<html>`) element.
fn parse_root(markup: &str) -> Option<ElementNode> {
    let dom = parse_document(RcDom::default(), Default::default()).one(markup);
    let children = dom.document.children.borrow();
    children.iter().find_map(|child| match convert(child) {
        Some(Node::Element(el)) => Some(el),
        _ => None,
    })
}

/// Visit every element with its absolute XPath, parents before children.
fn walk<'a, F>(element: &'a ElementNode, xpath: &str, visit: &mut F)
where
    F: FnMut(&'a ElementNode, &str),
{
    visit(element, xpath);
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for child in &element.children {
        if let Node::Element(c) = child {
            let position = positions.entry(c.tag.as_str()).or_insert(0);
            *position += 1;
            let child_xpath = format!("{xpath}/{}[{}]", c.tag, position);
            walk(c, &child_xpath, visit);
        }
    }
}

/// Markup analyzer over html5ever.
#[derive(Debug, Clone, Default)]
pub struct HtmlAnalyzer {
    config: AnalyzerConfig,
}

impl HtmlAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    fn is_volatile_id(&self, id: &str) -> bool {
        self.config
            .volatile_id_prefixes
            .iter()
            .any(|prefix| id.starts_with(prefix.as_str()))
    }

    fn stable_id(&self, element: &ElementNode) -> Option<String> {
        element
            .attr("id")
            .filter(|id| !id.is_empty() && !self.is_volatile_id(id))
            .map(str::to_string)
    }

    fn input_type(element: &ElementNode) -> String {
        element
            .attr("type")
            .map(|t| t.to_ascii_lowercase())
            .unwrap_or_else(|| "text".to_string())
    }

    /// Run `visit` over every element of `markup`.
    fn for_each_element<F>(&self, markup: &str, mut visit: F)
    where
        F: FnMut(&ElementNode, &str),
    {
        if let Some(root) = parse_root(markup) {
            let root_xpath = format!("/{}[1]", root.tag);
            walk(&root, &root_xpath, &mut |el, xpath| visit(el, xpath));
        }
    }

    fn all_clickables(&self, markup: &str) -> Vec<Clickable> {
        let mut found = Vec::new();
        self.for_each_element(markup, |el, xpath| {
            if self.config.clickable_rules.iter().any(|r| r.matches(el)) {
                found.push(Clickable {
                    id: self.stable_id(el),
                    name: el.attr("name").map(str::to_string),
                    xpath: xpath.to_string(),
                    tag: el.tag.clone(),
                });
            }
        });
        found
    }

    fn choice_groups(&self, markup: &str, input_type: &str) -> Vec<(String, Vec<Choice>)> {
        let mut groups: Vec<(String, Vec<Choice>)> = Vec::new();
        self.for_each_element(markup, |el, xpath| {
            if el.tag != "input" || Self::input_type(el) != input_type {
                return;
            }
            let group_name = el
                .attr("name")
                .map(str::to_string)
                .unwrap_or_else(|| xpath.to_string());
            let choice = Choice {
                id: self.stable_id(el),
                name: el.attr("name").map(str::to_string),
                xpath: xpath.to_string(),
                value: el.attr("value").map(str::to_string),
            };
            match groups.iter_mut().find(|(name, _)| *name == group_name) {
                Some((_, choices)) => choices.push(choice),
                None => groups.push((group_name, vec![choice])),
            }
        });
        groups
    }

    fn write_normalized(&self, element: &ElementNode, out: &mut String) {
        if self.config.ignored_tags.iter().any(|t| *t == element.tag) {
            return;
        }
        let mut attrs: Vec<(&str, &str)> = element
            .attrs
            .iter()
            .filter(|(k, v)| {
                !self.config.ignored_attributes.iter().any(|a| a == k)
                    && !(k == "id" && self.is_volatile_id(v))
            })
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        attrs.sort_unstable();

        out.push('<');
        out.push_str(&element.tag);
        for (k, v) in attrs {
            let _ = write!(out, " {k}=\"{v}\"");
        }
        out.push('>');

        // Frame documents are observed as their own fragments.
        if !self.config.frame_tags.iter().any(|t| *t == element.tag) {
            for child in &element.children {
                match child {
                    Node::Element(c) => self.write_normalized(c, out),
                    Node::Text(t) if self.config.keep_text => {
                        let collapsed = t.split_whitespace().collect::<Vec<_>>().join(" ");
                        out.push_str(&collapsed);
                    }
                    Node::Text(_) => {}
                }
            }
        }

        out.push_str("</");
        out.push_str(&element.tag);
        out.push('>');
    }
}

impl MarkupAnalyzer for HtmlAnalyzer {
    fn extract_clickables(&self, markup: &str, prior: Option<&str>) -> Vec<Clickable> {
        let clickables = self.all_clickables(markup);
        match prior {
            Some(prior) if self.config.skip_inherited_clickables => {
                let inherited = self.all_clickables(prior);
                clickables
                    .into_iter()
                    .filter(|c| !inherited.iter().any(|p| p.same_element(c)))
                    .collect()
            }
            _ => clickables,
        }
    }

    fn extract_inputs(&self, markup: &str) -> Vec<InputField> {
        let mut inputs = Vec::new();
        self.for_each_element(markup, |el, xpath| {
            let input_type = match el.tag.as_str() {
                "textarea" => "textarea".to_string(),
                "input" => Self::input_type(el),
                _ => return,
            };
            if input_type != "textarea" && !self.config.text_input_types.contains(&input_type) {
                return;
            }
            inputs.push(InputField {
                id: self.stable_id(el),
                name: el.attr("name").map(str::to_string),
                xpath: xpath.to_string(),
                input_type,
                value: None,
                info: None,
            });
        });
        inputs
    }

    fn extract_selects(&self, markup: &str) -> Vec<SelectField> {
        let mut selects = Vec::new();
        self.for_each_element(markup, |el, xpath| {
            if el.tag != "select" {
                return;
            }
            let mut options = Vec::new();
            walk(el, xpath, &mut |option, _| {
                if option.tag == "option" {
                    options.push(
                        option
                            .attr("value")
                            .map(str::to_string)
                            .unwrap_or_else(|| option.text()),
                    );
                }
            });
            selects.push(SelectField {
                id: self.stable_id(el),
                name: el.attr("name").map(str::to_string),
                xpath: xpath.to_string(),
                options,
                selected: None,
            });
        });
        selects
    }

    fn extract_checkboxes(&self, markup: &str) -> Vec<CheckboxGroup> {
        self.choice_groups(markup, "checkbox")
            .into_iter()
            .map(|(name, choices)| CheckboxGroup {
                name,
                choices,
                selected: Vec::new(),
            })
            .collect()
    }

    fn extract_radios(&self, markup: &str) -> Vec<RadioGroup> {
        self.choice_groups(markup, "radio")
            .into_iter()
            .map(|(name, choices)| RadioGroup {
                name,
                choices,
                selected: None,
            })
            .collect()
    }

    fn extract_frames(&self, markup: &str) -> Vec<String> {
        let mut frames = Vec::new();
        self.for_each_element(markup, |el, xpath| {
            if self.config.frame_tags.iter().any(|t| *t == el.tag) {
                frames.push(xpath.to_string());
            }
        });
        frames
    }

    fn normalize(&self, markup: &str) -> String {
        match parse_root(markup) {
            Some(root) => {
                let mut out = String::with_capacity(markup.len());
                self.write_normalized(&root, &mut out);
                out
            }
            None => markup.split_whitespace().collect::<Vec<_>>().join(" "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> HtmlAnalyzer {
        HtmlAnalyzer::default()
    }

    #[test]
    fn test_normalize_ignores_attribute_order() {
        let a = analyzer();
        let left = a.normalize(r#"<html><body><div class="x" title="t">hi</div></body></html>"#);
        let right = a.normalize(r#"<html><body><div title="t" class="x">hi</div></body></html>"#);
        assert!(a.structural_equal(&left, &right));
        assert_eq!(a.fingerprint(&left), a.fingerprint(&right));
    }

    #[test]
    fn test_normalize_drops_volatile_ids_and_scripts() {
        let a = analyzer();
        let left = a.normalize(
            r#"<html><body><a id="ember12" href="/x">x</a><script>var t = 1;</script></body></html>"#,
        );
        let right = a.normalize(
            r#"<html><body><a id="ember977" href="/x">x</a><script>var t = 2;</script></body></html>"#,
        );
        assert_eq!(left, right);
        assert!(!left.contains("script"));
    }

    #[test]
    fn test_normalize_keeps_text_differences() {
        let a = analyzer();
        let left = a.normalize("<html><body><p>Welcome</p></body></html>");
        let right = a.normalize("<html><body><p>Goodbye</p></body></html>");
        assert!(!a.structural_equal(&left, &right));
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        let a = analyzer();
        let left = a.normalize("<html><body>\n  <p>  two   words </p>\n</body></html>");
        let right = a.normalize("<html><body><p>two words</p></body></html>");
        assert_eq!(left, right);
    }

    #[test]
    fn test_extract_clickables_with_xpaths() {
        let a = analyzer();
        let clickables = a.extract_clickables(
            r#"<html><body><a id="home" href="/">Home</a><div><a href="/a">A</a><button>B</button></div></body></html>"#,
            None,
        );
        assert_eq!(clickables.len(), 3);
        assert_eq!(clickables[0].id.as_deref(), Some("home"));
        assert_eq!(clickables[0].xpath, "/html[1]/body[1]/a[1]");
        assert_eq!(clickables[1].xpath, "/html[1]/body[1]/div[1]/a[1]");
        assert_eq!(clickables[2].tag, "button");
    }

    #[test]
    fn test_volatile_id_is_not_a_locator() {
        let a = analyzer();
        let clickables =
            a.extract_clickables(r#"<html><body><a id="ember5">x</a></body></html>"#, None);
        assert_eq!(clickables[0].id, None);
        assert_eq!(clickables[0].locator().xpath, "/html[1]/body[1]/a[1]");
    }

    #[test]
    fn test_inherited_clickables_are_skipped() {
        let a = analyzer();
        let prior = r#"<html><body><a id="nav">Nav</a></body></html>"#;
        let next = r#"<html><body><a id="nav">Nav</a><a id="more">More</a></body></html>"#;
        let clickables = a.extract_clickables(next, Some(prior));
        assert_eq!(clickables.len(), 1);
        assert_eq!(clickables[0].id.as_deref(), Some("more"));

        let all = HtmlAnalyzer::new(AnalyzerConfig {
            skip_inherited_clickables: false,
            ..AnalyzerConfig::default()
        })
        .extract_clickables(next, Some(prior));
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_submit_input_is_clickable_but_text_input_is_not() {
        let a = analyzer();
        let clickables = a.extract_clickables(
            r#"<html><body><form><input type="text" name="q"><input type="submit" id="go"></form></body></html>"#,
            None,
        );
        assert_eq!(clickables.len(), 1);
        assert_eq!(clickables[0].id.as_deref(), Some("go"));
    }

    #[test]
    fn test_extract_controls() {
        let a = analyzer();
        let markup = r#"<html><body><form>
            <input name="user">
            <input type="password" name="pass">
            <textarea name="bio"></textarea>
            <select name="color"><option value="r">Red</option><option>Green</option></select>
            <input type="checkbox" name="tags" value="a">
            <input type="checkbox" name="tags" value="b">
            <input type="radio" name="size" value="s">
            <input type="radio" name="size" value="l">
            <input type="hidden" name="token" value="zzz">
        </form></body></html>"#;
        let controls = a.extract_controls(markup);

        assert_eq!(controls.inputs.len(), 3);
        assert_eq!(controls.inputs[0].input_type, "text");
        assert_eq!(controls.inputs[2].input_type, "textarea");

        assert_eq!(controls.selects.len(), 1);
        assert_eq!(controls.selects[0].options, vec!["r", "Green"]);

        assert_eq!(controls.checkboxes.len(), 1);
        assert_eq!(controls.checkboxes[0].name, "tags");
        assert_eq!(controls.checkboxes[0].choices.len(), 2);

        assert_eq!(controls.radios.len(), 1);
        assert_eq!(controls.radios[0].choices.len(), 2);
    }

    #[test]
    fn test_extract_frames_and_frame_content_not_normalized() {
        let a = analyzer();
        let markup = r#"<html><body><iframe src="/inner"></iframe><p>x</p></body></html>"#;
        let frames = a.extract_frames(markup);
        assert_eq!(frames, vec!["/html[1]/body[1]/iframe[1]"]);
        assert!(a.normalize(markup).contains(r#"<iframe src="/inner"></iframe>"#));
    }
}
