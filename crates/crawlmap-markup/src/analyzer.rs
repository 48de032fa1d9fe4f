use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::element::{CheckboxGroup, Clickable, FormControls, InputField, RadioGroup, SelectField};

/// Trait abstracting markup analysis.
///
/// The exploration engine never parses markup itself; it extracts elements,
/// normalizes and compares documents through this seam. Tests plug in
/// [`crate::HtmlAnalyzer`] over small literal documents.
pub trait MarkupAnalyzer {
    /// Candidate interactive elements of one document.
    ///
    /// `prior` is the markup of the state the document was reached from, if
    /// any. Implementations may use it to skip elements inherited unchanged
    /// from that state.
    fn extract_clickables(&self, markup: &str, prior: Option<&str>) -> Vec<Clickable>;

    fn extract_inputs(&self, markup: &str) -> Vec<InputField>;

    fn extract_selects(&self, markup: &str) -> Vec<SelectField>;

    fn extract_checkboxes(&self, markup: &str) -> Vec<CheckboxGroup>;

    fn extract_radios(&self, markup: &str) -> Vec<RadioGroup>;

    /// XPaths of the nested frame elements of one document.
    fn extract_frames(&self, _markup: &str) -> Vec<String> {
        Vec::new()
    }

    /// Canonical text form of a document with immaterial churn removed.
    fn normalize(&self, markup: &str) -> String;

    /// Equality over normalized markup.
    fn structural_equal(&self, a: &str, b: &str) -> bool {
        a == b
    }

    /// Bucketing hash over normalized markup.
    ///
    /// Invariant: `structural_equal(a, b)` implies `fingerprint(a) == fingerprint(b)`.
    fn fingerprint(&self, normalized: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        normalized.hash(&mut hasher);
        hasher.finish()
    }

    /// All four control kinds of one document.
    fn extract_controls(&self, markup: &str) -> FormControls {
        FormControls {
            inputs: self.extract_inputs(markup),
            selects: self.extract_selects(markup),
            checkboxes: self.extract_checkboxes(markup),
            radios: self.extract_radios(markup),
        }
    }
}
