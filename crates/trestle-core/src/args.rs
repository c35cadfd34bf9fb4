//! Request argument extraction.
//!
//! Method arguments arrive three ways: query string pairs, `;name=value`
//! or `&name=value` segments embedded in the path (pathpart args), and
//! the request body for verbs that carry one. Every extracted value is
//! percent-decoded and then read as JSON, with a plain-string fallback
//! for values that are not valid JSON.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use trestle_types::error::WebError;

use crate::http::percent_plus_decode;

/// Body media types the framework knows how to read arguments from.
pub const SUPPORTED_BODY_MEDIA_TYPES: [&str; 2] =
    ["application/json", "application/x-www-form-urlencoded"];

static PATHPART_ARGS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[;&](?P<name>[a-zA-Z_]\w*)=(?P<value>[^/;&]*)")
        .expect("valid pathpart args regex")
});

/// Read a decoded argument value as JSON, falling back to the raw string.
pub fn json_or_string(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Arguments from the raw query string.
///
/// Pairs split on `&` and `;`; pieces without `=` (such as a tunneled
/// method name) are not arguments. A repeated name keeps the last value.
pub fn query_args(raw_query: &str) -> Map<String, Value> {
    let mut args = Map::new();
    for piece in raw_query.split('&').flat_map(|p| p.split(';')) {
        let Some((name, value)) = piece.split_once('=') else {
            continue;
        };
        args.insert(
            name.to_string(),
            json_or_string(&percent_plus_decode(value)),
        );
    }
    args
}

/// Arguments embedded in the path as `;name=value` or `&name=value`
/// segments.
pub fn pathpart_args(path: &str) -> Map<String, Value> {
    let mut args = Map::new();
    for caps in PATHPART_ARGS_RE.captures_iter(path) {
        if let (Some(name), Some(value)) = (caps.name("name"), caps.name("value")) {
            args.insert(
                name.as_str().to_string(),
                json_or_string(&percent_plus_decode(value.as_str())),
            );
        }
    }
    args
}

/// Resource arguments: route pathparts overlaid by embedded pathpart
/// args, which win on collision.
pub fn resource_args(
    route_pathparts: &BTreeMap<String, String>,
    path: &str,
) -> Map<String, Value> {
    let mut args: Map<String, Value> = route_pathparts
        .iter()
        .map(|(name, value)| (name.clone(), json_or_string(&percent_plus_decode(value))))
        .collect();
    for (name, value) in pathpart_args(path) {
        args.insert(name, value);
    }
    args
}

/// Arguments from a request body.
///
/// An absent content type or empty body contributes nothing. JSON bodies
/// must be objects whose fields are the arguments; form bodies keep the
/// first value per name.
pub fn body_args(content_type: Option<&str>, body: &[u8]) -> Result<Map<String, Value>, WebError> {
    let Some(content_type) = content_type else {
        return Ok(Map::new());
    };
    let mediatype = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    if mediatype.is_empty() || body.is_empty() {
        return Ok(Map::new());
    }
    match mediatype.as_str() {
        "application/json" => {
            let text = std::str::from_utf8(body).map_err(|_| invalid_body())?;
            match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(fields)) => Ok(fields),
                _ => Err(invalid_body()),
            }
        }
        "application/x-www-form-urlencoded" => {
            let text = std::str::from_utf8(body).map_err(|_| invalid_body())?;
            let mut args = Map::new();
            for piece in text.split('&') {
                let Some((name, value)) = piece.split_once('=') else {
                    continue;
                };
                let name = percent_plus_decode(name);
                if !args.contains_key(&name) {
                    args.insert(name, json_or_string(&percent_plus_decode(value)));
                }
            }
            Ok(args)
        }
        other => Err(WebError::BadRequest {
            message: Some(format!(
                "unsupported body media type '{other}'; expecting one of \
                 ['application/json', 'application/x-www-form-urlencoded']"
            )),
        }),
    }
}

fn invalid_body() -> WebError {
    WebError::BadRequest {
        message: Some(
            "invalid request body; expecting a JSON object whose fields are request arguments"
                .to_string(),
        ),
    }
}

/// Merged method arguments: query args overlaid by body args, which win
/// on collision. `body` is `None` for verbs without request-body
/// semantics.
pub fn method_args(
    raw_query: &str,
    content_type: Option<&str>,
    body: Option<&[u8]>,
) -> Result<Map<String, Value>, WebError> {
    let mut args = query_args(raw_query);
    if let Some(body) = body {
        for (name, value) in body_args(content_type, body)? {
            args.insert(name, value);
        }
    }
    Ok(args)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
