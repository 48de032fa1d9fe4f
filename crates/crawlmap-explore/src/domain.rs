//! In/out-of-domain classification by network location.

use url::Url;

use crate::error::CrawlError;

/// Network locations the crawl stays within: the base URL's plus an allow-list.
#[derive(Debug, Clone)]
pub struct DomainFilter {
    base: String,
    allowed: Vec<String>,
}

/// `host` or `host:port` when the port is explicit.
fn netloc(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

impl DomainFilter {
    pub fn new(base_url: &str, allowed: &[String]) -> Result<Self, CrawlError> {
        let parsed = Url::parse(base_url).map_err(|e| CrawlError::BaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        let base = netloc(&parsed).ok_or_else(|| CrawlError::BaseUrl {
            url: base_url.to_string(),
            reason: "URL has no host".to_string(),
        })?;
        Ok(Self {
            base,
            allowed: allowed.iter().map(|d| d.to_ascii_lowercase()).collect(),
        })
    }

    /// Whether `url` stays inside the crawled site. Unparsable URLs do not.
    pub fn contains(&self, url: &str) -> bool {
        let Some(loc) = Url::parse(url).ok().as_ref().and_then(netloc) else {
            return false;
        };
        if loc == self.base {
            return true;
        }
        let host = loc.split(':').next().unwrap_or_default();
        self.allowed.iter().any(|d| *d == loc || d == host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_netloc_is_in_domain() {
        let filter = DomainFilter::new("http://app.test:8080/start", &[]).unwrap();
        assert!(filter.contains("http://app.test:8080/other?x=1"));
        assert!(!filter.contains("http://app.test/other"));
        assert!(!filter.contains("http://elsewhere.test:8080/"));
    }

    #[test]
    fn test_allow_list() {
        let filter =
            DomainFilter::new("http://app.test/", &["cdn.app.test".to_string(), "auth.test:9000".to_string()])
                .unwrap();
        assert!(filter.contains("https://cdn.app.test/img"));
        assert!(filter.contains("http://auth.test:9000/login"));
        assert!(!filter.contains("http://auth.test/login"));
    }

    #[test]
    fn test_unparsable_url_is_out_of_domain() {
        let filter = DomainFilter::new("http://app.test/", &[]).unwrap();
        assert!(!filter.contains("about:blank"));
        assert!(!filter.contains("not a url"));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            DomainFilter::new("nope", &[]),
            Err(CrawlError::BaseUrl { .. })
        ));
    }
}
