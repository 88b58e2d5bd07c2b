//! Render request context.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Unique request identifier for tracing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(1);

impl RequestId {
    /// Generate the next request ID for this process.
    ///
    /// IDs are `{pid}-{sequence}` so log lines from concurrently running
    /// workers stay distinguishable.
    pub fn generate() -> Self {
        let seq = REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Self(format!("{:x}-{}", std::process::id(), seq))
    }

    /// Create from an existing ID string.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dynamic route parameters resolved by the host router.
pub type RouteParams = BTreeMap<String, String>;

/// Query string parameters.
pub type QueryParams = BTreeMap<String, String>;

/// HTTP request headers.
pub type Headers = HashMap<String, String>;

/// A single render request, as decoded from a `headers` message.
///
/// The pathname has already been matched by the host; the worker never
/// routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderRequest {
    /// Page pathname (e.g. `/blog/[slug]`, `/404`).
    pub path: String,
    /// Original request URL, including the query string.
    pub url: String,
    /// Request headers.
    #[serde(default)]
    pub headers: Headers,
    /// Query string parameters.
    #[serde(default)]
    pub query: QueryParams,
    /// Dynamic route parameters.
    #[serde(default)]
    pub params: RouteParams,
}

impl RenderRequest {
    /// Create a request for a path, using the path as URL.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            url: path.clone(),
            path,
            headers: HashMap::new(),
            query: BTreeMap::new(),
            params: BTreeMap::new(),
        }
    }

    /// Set the request URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Add a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Add a route parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Query parameters merged with route parameters.
    ///
    /// Route parameters win over query parameters with the same name.
    pub fn merged_query(&self) -> QueryParams {
        let mut merged = self.query.clone();
        merged.extend(self.params.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    /// Get a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_is_unique() {
        let a = RequestId::generate();
        let b = RequestId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_merged_query_params_override() {
        let req = RenderRequest::new("/blog/[slug]")
            .with_query("slug", "from-query")
            .with_query("page", "2")
            .with_param("slug", "hello");

        let merged = req.merged_query();
        assert_eq!(merged.get("slug").map(String::as_str), Some("hello"));
        assert_eq!(merged.get("page").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_header_case_insensitive() {
        let req = RenderRequest::new("/").with_header("Accept-Language", "en");
        assert_eq!(req.header("accept-language"), Some("en"));
        assert_eq!(req.header("x-missing"), None);
    }

    #[test]
    fn test_deserialize_defaults_missing_maps() {
        let req: RenderRequest =
            serde_json::from_str(r#"{"path":"/about","url":"/about?x=1"}"#).unwrap();
        assert_eq!(req.path, "/about");
        assert!(req.headers.is_empty());
        assert!(req.query.is_empty());
        assert!(req.params.is_empty());
    }
}
