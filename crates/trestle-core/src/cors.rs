//! Cross-origin request affordances and enforcement.
//!
//! A `CorsAffordanceSet` declares which origins, methods, and headers a
//! subtree of paths affords to cross-origin clients; sets are mapped
//! hereditarily by path pattern. Enforcement runs before dispatch and
//! yields the response headers to attach, or the rejection to report.

use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use trestle_types::error::WebError;

use crate::auth::SpaceMap;
use crate::mappings::HereditaryWebResourcePathMap;

/// A set that is either universal or a finite collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniversalizableSet<T: Ord> {
    Universal,
    Finite(BTreeSet<T>),
}

impl<T: Ord> UniversalizableSet<T> {
    pub fn empty() -> Self {
        Self::Finite(BTreeSet::new())
    }

    pub fn is_universal(&self) -> bool {
        matches!(self, Self::Universal)
    }

    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: std::borrow::Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match self {
            Self::Universal => true,
            Self::Finite(items) => items.contains(value),
        }
    }

    /// The finite members, in order; empty for a universal set.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        match self {
            Self::Universal => None.into_iter().flatten(),
            Self::Finite(items) => Some(items.iter()).into_iter().flatten(),
        }
    }
}

impl<T: Ord> FromIterator<T> for UniversalizableSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::Finite(iter.into_iter().collect())
    }
}

impl<T: Ord + Serialize> Serialize for UniversalizableSet<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Universal => serializer.serialize_str("*"),
            Self::Finite(items) => items.serialize(serializer),
        }
    }
}

impl<'de, T: Ord + Deserialize<'de>> Deserialize<'de> for UniversalizableSet<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr<T: Ord> {
            Star(String),
            Items(Vec<T>),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Star(s) if s == "*" => Ok(Self::Universal),
            Repr::Star(s) => Err(D::Error::custom(format!(
                "expected '*' or a list, got '{s}'"
            ))),
            Repr::Items(items) => Ok(Self::Finite(items.into_iter().collect())),
        }
    }
}

/// What a subtree of paths affords to cross-origin clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorsAffordanceSet {
    /// Origins allowed to make cross-origin requests.
    pub origins: UniversalizableSet<String>,
    /// Web method names afforded cross-origin (lowercase).
    pub methods: UniversalizableSet<String>,
    /// Request header names afforded cross-origin (lowercase).
    pub request_headers: UniversalizableSet<String>,
    /// Response headers exposed to cross-origin scripts.
    pub exposed_response_headers: UniversalizableSet<String>,
    /// How long clients may cache a preflight verdict.
    pub client_preflight_cache_lifespan: Option<Duration>,
}

impl CorsAffordanceSet {
    /// Afford everything to everyone.
    pub fn max() -> Self {
        Self {
            origins: UniversalizableSet::Universal,
            methods: UniversalizableSet::Universal,
            request_headers: UniversalizableSet::Universal,
            exposed_response_headers: UniversalizableSet::Universal,
            client_preflight_cache_lifespan: None,
        }
    }

    /// Afford nothing to anyone.
    pub fn min() -> Self {
        Self {
            origins: UniversalizableSet::empty(),
            methods: UniversalizableSet::empty(),
            request_headers: UniversalizableSet::empty(),
            exposed_response_headers: UniversalizableSet::empty(),
            client_preflight_cache_lifespan: None,
        }
    }
}

/// Hereditary map from path patterns to cross-origin affordances.
pub type CorsAffordanceMap = HereditaryWebResourcePathMap<CorsAffordanceSet>;

/// The kind of cross-origin request being enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorsRequestType {
    Actual,
    Preflight,
}

impl CorsRequestType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Actual => "actual",
            Self::Preflight => "preflight",
        }
    }
}

/// The request facts cross-origin enforcement inspects.
#[derive(Debug, Clone)]
pub struct CorsFacts<'a> {
    pub path: &'a str,
    pub http_method: &'a str,
    pub scheme: &'a str,
    pub host: Option<&'a str>,
    pub origin: Option<&'a str>,
    /// The `Access-Control-Request-Method` header.
    pub request_method: Option<&'a str>,
    /// The `Access-Control-Request-Headers` header.
    pub request_headers: Option<&'a str>,
    /// Lowercased names of the headers actually sent.
    pub header_names: Vec<String>,
}

/// An allowed cross-origin request: headers to attach to the response.
#[derive(Debug, Clone)]
pub struct CorsOutcome {
    pub request_type: CorsRequestType,
    pub headers: Vec<(String, String)>,
    /// Expose every response header at send time (universal exposure).
    pub expose_all: bool,
}

/// Whether an `Origin` header names somewhere other than this host.
fn is_cross_origin(origin: &str, scheme: &str, host: Option<&str>) -> bool {
    match host {
        Some(host) => origin != format!("{scheme}://{host}"),
        None => true,
    }
}

/// Enforce cross-origin policy for a request.
///
/// `Ok(None)` means the request is same-origin and no policy applies.
/// An allowed cross-origin request yields the headers to attach; a
/// disallowed one yields the rejection error.
pub fn enforce(
    affordances: &CorsAffordanceMap,
    auth_spaces: &SpaceMap,
    facts: &CorsFacts<'_>,
    supported_methods: &BTreeSet<String>,
) -> Result<Option<CorsOutcome>, WebError> {
    let Some(origin) = facts.origin else {
        return Ok(None);
    };
    let preflight = facts.http_method.eq_ignore_ascii_case("OPTIONS")
        && facts.request_method.is_some();
    let request_type = if preflight {
        CorsRequestType::Preflight
    } else if is_cross_origin(origin, facts.scheme, facts.host) {
        CorsRequestType::Actual
    } else {
        return Ok(None);
    };

    let mut expose_all = false;
    let reject_type = Some(request_type.as_str().to_string());
    let Some(afforded) = affordances.resolve(facts.path) else {
        return Err(WebError::CorsPolicyUndefined {
            resource: facts.path.to_string(),
            origin: origin.to_string(),
            request_type: reject_type,
        });
    };

    if !afforded.origins.contains(origin) {
        return Err(WebError::CorsOriginForbidden {
            resource: facts.path.to_string(),
            origin: origin.to_string(),
            request_type: reject_type,
        });
    }

    let mut headers = vec![("Access-Control-Allow-Origin".to_string(), origin.to_string())];
    if auth_spaces.covers(facts.path) {
        headers.push(("Access-Control-Allow-Credentials".to_string(), "true".to_string()));
    }

    match request_type {
        CorsRequestType::Actual => {
            let method = facts.http_method.to_ascii_lowercase();
            if !afforded.methods.contains(method.as_str()) {
                return Err(WebError::CorsMethodForbidden {
                    resource: facts.path.to_string(),
                    origin: origin.to_string(),
                    method: facts.http_method.to_string(),
                    request_type: reject_type,
                });
            }
            let forbidden: Vec<String> = facts
                .header_names
                .iter()
                .filter(|name| !afforded.request_headers.contains(name.as_str()))
                .cloned()
                .collect();
            if !forbidden.is_empty() {
                return Err(WebError::CorsHeadersForbidden {
                    resource: facts.path.to_string(),
                    origin: origin.to_string(),
                    headers: forbidden,
                    request_type: reject_type,
                });
            }
            match &afforded.exposed_response_headers {
                UniversalizableSet::Universal => expose_all = true,
                UniversalizableSet::Finite(exposed) if !exposed.is_empty() => {
                    let joined = exposed.iter().cloned().collect::<Vec<_>>().join(", ");
                    headers.push(("Access-Control-Expose-Headers".to_string(), joined));
                }
                UniversalizableSet::Finite(_) => {}
            }
        }
        CorsRequestType::Preflight => {
            let requested_method = facts
                .request_method
                .unwrap_or_default()
                .trim()
                .to_string();
            let lowered = requested_method.to_ascii_lowercase();
            if !afforded.methods.contains(lowered.as_str())
                || !supported_methods.contains(&requested_method.to_ascii_uppercase())
            {
                return Err(WebError::CorsMethodForbidden {
                    resource: facts.path.to_string(),
                    origin: origin.to_string(),
                    method: requested_method,
                    request_type: reject_type,
                });
            }
            let requested_headers: Vec<String> = facts
                .request_headers
                .unwrap_or_default()
                .split(',')
                .map(|h| h.trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect();
            let forbidden: Vec<String> = requested_headers
                .iter()
                .filter(|name| !afforded.request_headers.contains(name.as_str()))
                .cloned()
                .collect();
            if !forbidden.is_empty() {
                return Err(WebError::CorsHeadersForbidden {
                    resource: facts.path.to_string(),
                    origin: origin.to_string(),
                    headers: forbidden,
                    request_type: reject_type,
                });
            }

            let allowed_methods = allow_methods(afforded, supported_methods);
            if !allowed_methods.is_empty() {
                headers.push(("Access-Control-Allow-Methods".to_string(), allowed_methods));
            }
            if !requested_headers.is_empty() {
                headers.push((
                    "Access-Control-Allow-Headers".to_string(),
                    requested_headers.join(", "),
                ));
            }
            if let Some(lifespan) = afforded.client_preflight_cache_lifespan {
                headers.push((
                    "Access-Control-Max-Age".to_string(),
                    lifespan.as_secs().to_string(),
                ));
            }
        }
    }

    Ok(Some(CorsOutcome {
        request_type,
        headers,
        expose_all,
    }))
}

/// The afforded methods intersected with what the resource supports, as
/// HTTP method names.
fn allow_methods(afforded: &CorsAffordanceSet, supported: &BTreeSet<String>) -> String {
    match &afforded.methods {
        UniversalizableSet::Universal => {
            supported.iter().cloned().collect::<Vec<_>>().join(", ")
        }
        UniversalizableSet::Finite(methods) => {
            let afforded_http: HashSet<String> =
                methods.iter().map(|m| m.to_ascii_uppercase()).collect();
            supported
                .iter()
                .filter(|m| afforded_http.contains(*m))
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::supported_http_methods;

    fn facts<'a>(
        path: &'a str,
        method: &'a str,
        origin: Option<&'a str>,
        request_method: Option<&'a str>,
    ) -> CorsFacts<'a> {
        CorsFacts {
            path,
            http_method: method,
            scheme: "http",
            host: Some("localhost:8080"),
            origin,
            request_method,
            request_headers: None,
            header_names: vec!["accept".to_string()],
        }
    }

    fn open_map(pattern: &str) -> CorsAffordanceMap {
        let mut map = CorsAffordanceMap::new();
        map.insert(pattern, CorsAffordanceSet::max()).unwrap();
        map
    }

    #[test]
    fn test_same_origin_request_skips_enforcement() {
        let map = open_map("/");
        let spaces = SpaceMap::new();
        let supported = supported_http_methods(["get", "options"]);
        let outcome = enforce(
            &map,
            &spaces,
            &facts("/helloworld", "GET", Some("http://localhost:8080"), None),
            &supported,
        )
        .unwrap();
        assert!(outcome.is_none());

        let no_origin = enforce(&map, &spaces, &facts("/helloworld", "GET", None, None), &supported)
            .unwrap();
        assert!(no_origin.is_none());
    }

    #[test]
    fn test_actual_request_allowed_echoes_origin() {
        let map = open_map("/");
        let spaces = SpaceMap::new();
        let supported = supported_http_methods(["get", "options"]);
        let outcome = enforce(
            &map,
            &spaces,
            &facts("/helloworld", "GET", Some("http://elsewhere.example"), None),
            &supported,
        )
        .unwrap()
        .unwrap();
        assert_eq!(outcome.request_type, CorsRequestType::Actual);
        assert!(outcome.headers.contains(&(
            "Access-Control-Allow-Origin".to_string(),
            "http://elsewhere.example".to_string()
        )));
        assert!(outcome.expose_all);
    }

    #[test]
    fn test_no_policy_is_rejected() {
        let map = CorsAffordanceMap::new();
        let spaces = SpaceMap::new();
        let supported = supported_http_methods(["get"]);
        let err = enforce(
            &map,
            &spaces,
            &facts("/helloworld", "GET", Some("http://elsewhere.example"), None),
            &supported,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "cross-origin actual request rejected by /helloworld from origin \
             'http://elsewhere.example': no cross-origin sharing policy is defined \
             for this resource"
        );
    }

    #[test]
    fn test_forbidden_origin_is_rejected() {
        let mut map = CorsAffordanceMap::new();
        let mut afforded = CorsAffordanceSet::max();
        afforded.origins = ["http://friend.example".to_string()].into_iter().collect();
        map.insert("/", afforded).unwrap();
        let spaces = SpaceMap::new();
        let supported = supported_http_methods(["get"]);
        let err = enforce(
            &map,
            &spaces,
            &facts("/helloworld", "GET", Some("http://evil.example"), None),
            &supported,
        )
        .unwrap_err();
        assert!(err.to_string().ends_with("origin forbidden"));
    }

    #[test]
    fn test_preflight_lists_allowed_methods() {
        let map = open_map("/");
        let spaces = SpaceMap::new();
        let supported = supported_http_methods(["get", "options"]);
        let outcome = enforce(
            &map,
            &spaces,
            &facts(
                "/helloworld",
                "OPTIONS",
                Some("http://elsewhere.example"),
                Some("GET"),
            ),
            &supported,
        )
        .unwrap()
        .unwrap();
        assert_eq!(outcome.request_type, CorsRequestType::Preflight);
        let methods = outcome
            .headers
            .iter()
            .find(|(name, _)| name == "Access-Control-Allow-Methods")
            .map(|(_, value)| value.as_str());
        assert_eq!(methods, Some("GET, HEAD, OPTIONS, POST"));
    }

    #[test]
    fn test_preflight_unsupported_method_is_rejected() {
        let map = open_map("/");
        let spaces = SpaceMap::new();
        let supported = supported_http_methods(["get", "options"]);
        let err = enforce(
            &map,
            &spaces,
            &facts(
                "/helloworld",
                "OPTIONS",
                Some("http://elsewhere.example"),
                Some("DELETE"),
            ),
            &supported,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "cross-origin preflight request rejected by /helloworld from origin \
             'http://elsewhere.example': method 'DELETE' forbidden"
        );
    }

    #[test]
    fn test_credentials_header_inside_auth_space() {
        let map = open_map("/");
        let mut spaces = SpaceMap::new();
        spaces
            .insert("/secrets", crate::auth::Space::basic_realm("trestle"))
            .unwrap();
        let supported = supported_http_methods(["get", "options"]);
        let outcome = enforce(
            &map,
            &spaces,
            &facts("/secrets", "GET", Some("http://elsewhere.example"), None),
            &supported,
        )
        .unwrap()
        .unwrap();
        assert!(outcome.headers.contains(&(
            "Access-Control-Allow-Credentials".to_string(),
            "true".to_string()
        )));
    }

    #[test]
    fn test_universalizable_set_serde() {
        let universal: UniversalizableSet<String> = UniversalizableSet::Universal;
        assert_eq!(serde_json::to_string(&universal).unwrap(), "\"*\"");
        let parsed: UniversalizableSet<String> = serde_json::from_str("\"*\"").unwrap();
        assert!(parsed.is_universal());

        let finite: UniversalizableSet<String> = serde_json::from_str(r#"["a", "b"]"#).unwrap();
        assert!(finite.contains("a"));
        assert!(!finite.contains("c"));
    }
}
