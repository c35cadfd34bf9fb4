//! HTTP vocabulary shared by the dispatch pipeline and backends.
//!
//! Status mapping for the web error taxonomy, `Accept` header parsing and
//! media range matching, web method name resolution, and URL decoding.

use std::collections::BTreeSet;

use trestle_types::error::WebError;

/// Web method names whose HTTP requests carry no body.
///
/// These are the methods that may be tunneled through a `POST` by naming
/// them as the first query component.
pub const BODYLESS_WEBMETHODS: [&str; 4] = ["delete", "get", "head", "options"];

/// The HTTP status code with which an error is reported.
pub fn status_for(error: &WebError) -> u16 {
    match error {
        WebError::EntityChoiceRedirection { .. } => 300,
        WebError::EntityUnchanged { .. } => 304,
        WebError::PermanentRedirection { .. } => 308,
        WebError::ProxyRedirection { .. } => 305,
        WebError::ResponseRedirection { .. } => 303,
        WebError::TemporaryRedirection { .. } => 307,
        WebError::BadRequest { .. }
        | WebError::ArgJsonValue { .. }
        | WebError::ArgPrimType { .. }
        | WebError::ArgPrimValue { .. }
        | WebError::MissingRequiredArgs { .. }
        | WebError::UnexpectedArgs { .. } => 400,
        WebError::Unauthenticated { .. }
        | WebError::AuthTokensNotAccepted { .. }
        | WebError::AuthTokensNotGiven { .. } => 401,
        WebError::AccessForbidden { .. }
        | WebError::CorsOriginForbidden { .. }
        | WebError::CorsMethodForbidden { .. }
        | WebError::CorsHeadersForbidden { .. }
        | WebError::CorsPolicyUndefined { .. } => 403,
        WebError::ResourceNotFound { .. } => 404,
        WebError::HttpMethodNotAllowed { .. } => 405,
        WebError::NoAcceptableMediaType { .. } => 406,
        WebError::ResourceConflict { .. } => 409,
        WebError::Unhandled { .. } => 500,
        WebError::WebMethodNotImplemented { .. } => 501,
    }
}

/// Percent-decode a URL component, folding `+` into a space.
///
/// Invalid percent escapes pass through literally; decoded bytes that are
/// not valid UTF-8 are replaced.
pub fn percent_plus_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                match (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi << 4) | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

// --- Accept negotiation ---

/// One media range from an `Accept` header, with its quality value.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptEntry {
    /// The media range, with any non-quality parameters retained.
    pub range: String,
    /// The quality value, 1.0 when unspecified.
    pub qvalue: f32,
}

impl AcceptEntry {
    /// An entry accepting anything at full quality.
    pub fn any() -> Self {
        Self {
            range: "*".to_string(),
            qvalue: 1.0,
        }
    }
}

/// Parse an `Accept` header into media ranges ordered by descending
/// quality.
///
/// A missing or empty header yields a single `*` entry. Entries with
/// equal quality keep their header order.
pub fn parse_accept(header: Option<&str>) -> Vec<AcceptEntry> {
    let mut entries: Vec<AcceptEntry> = Vec::new();
    if let Some(header) = header {
        for pattern in header.split(',') {
            let pattern = pattern.trim();
            if pattern.is_empty() {
                continue;
            }
            let mut parts = pattern.split(';');
            let mut range = parts.next().unwrap_or("").trim().to_string();
            let mut qvalue = 1.0f32;
            for param in parts {
                let param = param.trim();
                if let Some(q) = param.strip_prefix("q=") {
                    if let Ok(parsed) = q.trim().parse::<f32>() {
                        qvalue = parsed;
                    }
                    break;
                }
                range.push(';');
                range.push_str(param);
            }
            let pos = entries
                .iter()
                .position(|entry| entry.qvalue < qvalue)
                .unwrap_or(entries.len());
            entries.insert(pos, AcceptEntry { range, qvalue });
        }
    }
    if entries.is_empty() {
        entries.push(AcceptEntry::any());
    }
    entries
}

/// Whether a media range covers a concrete media type.
///
/// Parameters on the range are ignored for matching. A range with no
/// slash is treated as a major type with a wildcard subtype.
pub fn mediarange_matches(range: &str, mediatype: &str) -> bool {
    let range = range.split(';').next().unwrap_or("").trim();
    let (range_major, range_minor) = match range.split_once('/') {
        Some((major, minor)) => (major.trim(), minor.trim()),
        None => (range, "*"),
    };
    let (major, minor) = match mediatype.split_once('/') {
        Some((major, minor)) => (major.trim(), minor.trim()),
        None => (mediatype.trim(), ""),
    };
    (range_major == "*" || range_major.eq_ignore_ascii_case(major))
        && (range_minor == "*" || range_minor.eq_ignore_ascii_case(minor))
}

/// The first supported media type matched by the acceptable ranges, in
/// quality order.
pub fn best_mediatype<'a>(
    acceptable: &[AcceptEntry],
    supported: &[&'a str],
) -> Option<&'a str> {
    for entry in acceptable {
        for mediatype in supported {
            if mediarange_matches(&entry.range, mediatype) {
                return Some(mediatype);
            }
        }
    }
    None
}

// --- Web method resolution ---

/// Resolve the web method name addressed by an HTTP request.
///
/// `HEAD` resolves to `get`. A `POST` whose query string starts with the
/// name of a bodyless method (terminated by `&` or the end of the query)
/// resolves to that tunneled method. Everything else resolves to the
/// lowercased HTTP method.
pub fn webmethod_name(http_method: &str, query: &str) -> String {
    let method = http_method.to_ascii_uppercase();
    if method == "HEAD" {
        return "get".to_string();
    }
    if method == "POST" {
        let tunneled = query.split('&').next().unwrap_or("");
        if BODYLESS_WEBMETHODS.contains(&tunneled) {
            return tunneled.to_string();
        }
    }
    method.to_ascii_lowercase()
}

/// The HTTP methods a resource supports, given its web method names.
///
/// `HEAD` rides along with `GET`, and `POST` is supported whenever any
/// bodyless method can be tunneled through it.
pub fn supported_http_methods<I, S>(webmethods: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut methods = BTreeSet::new();
    let mut any_bodyless = false;
    for name in webmethods {
        let name = name.as_ref().to_ascii_lowercase();
        if BODYLESS_WEBMETHODS.contains(&name.as_str()) {
            any_bodyless = true;
        }
        methods.insert(name.to_ascii_uppercase());
    }
    if methods.contains("GET") {
        methods.insert("HEAD".to_string());
    }
    if any_bodyless {
        methods.insert("POST".to_string());
    }
    methods
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
