//! Interactive elements and form controls extracted from markup.
//!
//! Field names follow the persisted artifact format (`automata.json`,
//! `traces.json`), so these records serialize directly into it.

use serde::{Deserialize, Serialize};

/// How a driver finds an element: by stable id when one exists, by XPath otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    pub id: Option<String>,
    pub xpath: String,
}

impl Locator {
    pub fn by_id(id: &str, xpath: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            xpath: xpath.to_string(),
        }
    }

    pub fn by_xpath(xpath: &str) -> Self {
        Self {
            id: None,
            xpath: xpath.to_string(),
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.id {
            Some(id) => write!(f, "#{id}"),
            None => write!(f, "{}", self.xpath),
        }
    }
}

/// A candidate interactive element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Clickable {
    pub id: Option<String>,
    pub name: Option<String>,
    pub xpath: String,
    pub tag: String,
}

impl Clickable {
    pub fn locator(&self) -> Locator {
        Locator {
            id: self.id.clone(),
            xpath: self.xpath.clone(),
        }
    }

    /// Two clickables denote the same element if their ids match, or, when
    /// neither has an id, their XPaths match.
    pub fn same_element(&self, other: &Clickable) -> bool {
        match (&self.id, &other.id) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.xpath == other.xpath,
            _ => false,
        }
    }
}

/// A free-text input (`<input type=text>`, `<textarea>`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputField {
    pub id: Option<String>,
    pub name: Option<String>,
    pub xpath: String,
    #[serde(rename = "type")]
    pub input_type: String,
    /// Value assigned when the field is part of an edge.
    pub value: Option<String>,
    /// Label of the mutation that produced `value`, in mutation replays.
    #[serde(default)]
    pub info: Option<String>,
}

impl InputField {
    pub fn locator(&self) -> Locator {
        Locator {
            id: self.id.clone(),
            xpath: self.xpath.clone(),
        }
    }

    /// Key used to look up seed values for this field.
    pub fn data_key(&self) -> &str {
        self.name
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or(&self.xpath)
    }
}

/// A `<select>` element and its option values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectField {
    pub id: Option<String>,
    pub name: Option<String>,
    pub xpath: String,
    #[serde(rename = "value")]
    pub options: Vec<String>,
    /// Index of the option chosen for an edge.
    pub selected: Option<usize>,
}

impl SelectField {
    pub fn locator(&self) -> Locator {
        Locator {
            id: self.id.clone(),
            xpath: self.xpath.clone(),
        }
    }

    pub fn data_key(&self) -> &str {
        self.name
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or(&self.xpath)
    }
}

/// One checkbox or radio button inside a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub id: Option<String>,
    pub name: Option<String>,
    pub xpath: String,
    pub value: Option<String>,
}

impl Choice {
    pub fn locator(&self) -> Locator {
        Locator {
            id: self.id.clone(),
            xpath: self.xpath.clone(),
        }
    }
}

/// Checkboxes sharing a `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckboxGroup {
    #[serde(rename = "checkbox_name")]
    pub name: String,
    #[serde(rename = "checkbox_list")]
    pub choices: Vec<Choice>,
    /// Indices into `choices` to leave checked.
    #[serde(rename = "checkbox_selected_list", default)]
    pub selected: Vec<usize>,
}

/// Radio buttons sharing a `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioGroup {
    #[serde(rename = "radio_name")]
    pub name: String,
    #[serde(rename = "radio_list")]
    pub choices: Vec<Choice>,
    #[serde(rename = "radio_selected", default)]
    pub selected: Option<usize>,
}

/// All form controls found in one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormControls {
    pub inputs: Vec<InputField>,
    pub selects: Vec<SelectField>,
    pub checkboxes: Vec<CheckboxGroup>,
    pub radios: Vec<RadioGroup>,
}

impl FormControls {
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
            && self.selects.is_empty()
            && self.checkboxes.is_empty()
            && self.radios.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inputs.len() + self.selects.len() + self.checkboxes.len() + self.radios.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clickable(id: Option<&str>, xpath: &str) -> Clickable {
        Clickable {
            id: id.map(str::to_string),
            name: None,
            xpath: xpath.to_string(),
            tag: "a".to_string(),
        }
    }

    #[test]
    fn test_same_element_prefers_id() {
        let a = clickable(Some("go"), "/html[1]/body[1]/a[1]");
        let b = clickable(Some("go"), "/html[1]/body[1]/div[1]/a[1]");
        assert!(a.same_element(&b));

        let c = clickable(None, "/html[1]/body[1]/a[1]");
        assert!(!a.same_element(&c));
        assert!(c.same_element(&clickable(None, "/html[1]/body[1]/a[1]")));
    }

    #[test]
    fn test_data_key_falls_back_to_xpath() {
        let field = InputField {
            id: None,
            name: None,
            xpath: "/html[1]/body[1]/input[1]".to_string(),
            input_type: "text".to_string(),
            value: None,
            info: None,
        };
        assert_eq!(field.data_key(), "/html[1]/body[1]/input[1]");
    }

    #[test]
    fn test_checkbox_group_uses_artifact_field_names() {
        let group = CheckboxGroup {
            name: "topics".to_string(),
            choices: vec![],
            selected: vec![0, 2],
        };
        let json = serde_json::to_value(&group).unwrap();
        assert_eq!(json["checkbox_name"], "topics");
        assert_eq!(json["checkbox_selected_list"], serde_json::json!([0, 2]));
    }
}
