use serde::{Deserialize, Serialize};

/// Path of nested frame elements leading to a document.
///
/// Each entry is the XPath of a frame element inside the previous document.
/// The empty path is the top-level document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FramePath(Vec<String>);

impl FramePath {
    /// The top-level document.
    pub fn top() -> Self {
        Self(Vec::new())
    }

    pub fn from_xpaths(xpaths: Vec<String>) -> Self {
        Self(xpaths)
    }

    pub fn is_top(&self) -> bool {
        self.0.is_empty()
    }

    /// Path of a frame nested one level below this one.
    pub fn child(&self, frame_xpath: &str) -> Self {
        let mut path = self.0.clone();
        path.push(frame_xpath.to_string());
        Self(path)
    }

    pub fn xpaths(&self) -> &[String] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// `;`-joined key used to partition per-frame data. `None` for the top document.
    pub fn key(&self) -> Option<String> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.join(";"))
        }
    }
}

impl std::fmt::Display for FramePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.key() {
            Some(key) => write!(f, "{key}"),
            None => write!(f, "<top>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_has_no_key() {
        let top = FramePath::top();
        assert!(top.is_top());
        assert_eq!(top.key(), None);
        assert_eq!(top.to_string(), "<top>");
    }

    #[test]
    fn test_nested_key_joins_xpaths() {
        let path = FramePath::top()
            .child("/html[1]/body[1]/iframe[1]")
            .child("/html[1]/body[1]/iframe[2]");
        assert_eq!(path.depth(), 2);
        assert_eq!(
            path.key().as_deref(),
            Some("/html[1]/body[1]/iframe[1];/html[1]/body[1]/iframe[2]")
        );
    }

    #[test]
    fn test_serializes_as_plain_list() {
        let path = FramePath::top().child("/html[1]/body[1]/iframe[1]");
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, r#"["/html[1]/body[1]/iframe[1]"]"#);
        let back: FramePath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }
}
