//! The dispatched request model.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::auth::RequestAuthInfo;
use crate::http::AcceptEntry;

/// One request as the dispatch pipeline sees it.
#[derive(Debug, Clone)]
pub struct WebRequest {
    /// The request target as received (path plus query).
    pub uri: String,
    /// The resource location (`scheme://host/path`, no query).
    pub loc: String,
    /// The request path.
    pub path: String,
    /// The raw query string.
    pub query: String,
    /// The HTTP method as received, uppercase.
    pub http_method: String,
    /// The resolved web method name.
    pub webmethod: String,
    /// Acceptable response media ranges, best first.
    pub acceptable_mediaranges: Vec<AcceptEntry>,
    /// Pathparts and embedded pathpart args.
    pub resource_args: Map<String, Value>,
    /// Query and body arguments, merged.
    pub method_args: Map<String, Value>,
    /// Authentication state, unverified until a supplicant rules.
    pub auth_info: RequestAuthInfo,
    /// When dispatch began.
    pub timestamp: DateTime<Utc>,
}

impl WebRequest {
    /// One-line request description for logs.
    pub fn summary(&self) -> String {
        format!("{} {}", self.http_method, self.uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_summary() {
        let request = WebRequest {
            uri: "/helloworld?who=world".to_string(),
            loc: "http://localhost:8080/helloworld".to_string(),
            path: "/helloworld".to_string(),
            query: "who=world".to_string(),
            http_method: "GET".to_string(),
            webmethod: "get".to_string(),
            acceptable_mediaranges: vec![AcceptEntry::any()],
            resource_args: Map::new(),
            method_args: Map::new(),
            auth_info: RequestAuthInfo::new(),
            timestamp: Utc::now(),
        };
        assert_eq!(request.summary(), "GET /helloworld?who=world");
    }
}
