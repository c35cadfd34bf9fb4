//! The web error taxonomy.
//!
//! Every error the framework reports to clients is a [`WebError`]. Each
//! variant knows its wire name, its lowercase displayname, and its
//! construction args, which exception responses reveal subject to the
//! service's debug flags.

use serde_json::{Value, json};
use thiserror::Error;

use crate::class_def::{ClassDefInfo, ExceptionInfo};

/// An error reported to a web client.
#[derive(Debug, Clone, Error)]
pub enum WebError {
    // redirections ---------------------------------------------------------
    #[error("{}", entity_choice_message(.locs, .preferred_loc, .message))]
    EntityChoiceRedirection {
        locs: Vec<String>,
        preferred_loc: Option<String>,
        message: Option<String>,
    },

    #[error("entity unchanged from specified state{}", sfx(.message))]
    EntityUnchanged { message: Option<String> },

    #[error("resource moved permanently to {loc}{}", sfx(.message))]
    PermanentRedirection { loc: String, message: Option<String> },

    #[error("repeat request through proxy at {loc}{}", sfx(.message))]
    ProxyRedirection { loc: String, message: Option<String> },

    #[error("response can be found at {loc}{}", sfx(.message))]
    ResponseRedirection { loc: String, message: Option<String> },

    #[error("resource moved temporarily to {loc}{}", sfx(.message))]
    TemporaryRedirection { loc: String, message: Option<String> },

    // client errors --------------------------------------------------------
    #[error("cannot {action} {resource}: access forbidden{}", sfx(.message))]
    AccessForbidden {
        resource: String,
        action: String,
        message: Option<String>,
    },

    #[error("invalid '{name}' JSON '{value}'{}", sfx(.message))]
    ArgJsonValue {
        name: String,
        value: String,
        message: Option<String>,
    },

    #[error("invalid '{name}' primitive type '{type_name}'{}{}", sfx(.message), expecting(.expected_type))]
    ArgPrimType {
        name: String,
        type_name: String,
        message: Option<String>,
        expected_type: Option<String>,
    },

    #[error("invalid '{name}' primitive {value}{}{}", sfx(.message), expecting(.expected_value))]
    ArgPrimValue {
        name: String,
        value: Value,
        message: Option<String>,
        expected_value: Option<String>,
    },

    #[error("bad request{}", sfx(.message))]
    BadRequest { message: Option<String> },

    #[error("HTTP method '{method}' is not allowed{}; allowed HTTP methods are {}", sfx(.message), sorted_quoted_list(.allowed))]
    HttpMethodNotAllowed {
        method: String,
        allowed: Vec<String>,
        message: Option<String>,
    },

    #[error("missing required {} in method {method}", args_clause(.names))]
    MissingRequiredArgs { names: Vec<String>, method: String },

    #[error("content representation of {webmethod} {response_displayname} is not implemented for any of the requested media type ranges{}", media_extras(.acceptable, .supported))]
    NoAcceptableMediaType {
        webmethod: String,
        response_displayname: String,
        acceptable: Vec<String>,
        supported: Vec<String>,
    },

    #[error("cannot {action} {resource}: resource state conflict{}", sfx(.message))]
    ResourceConflict {
        resource: String,
        action: String,
        message: Option<String>,
    },

    #[error("resource not found{}", sfx(.message))]
    ResourceNotFound { message: Option<String> },

    #[error("unexpected {} in method {method}", args_clause(.names))]
    UnexpectedArgs { names: Vec<String>, method: String },

    // authentication -------------------------------------------------------
    #[error("{}", unauthenticated_message(None, .message, .realms, .redirection))]
    Unauthenticated {
        message: Option<String>,
        realms: Vec<String>,
        redirection: Option<Box<WebError>>,
    },

    #[error("{}", unauthenticated_message(Some("tokens not accepted"), .message, .realms, .redirection))]
    AuthTokensNotAccepted {
        message: Option<String>,
        realms: Vec<String>,
        redirection: Option<Box<WebError>>,
    },

    #[error("{}", unauthenticated_message(Some("no tokens given"), .message, .realms, .redirection))]
    AuthTokensNotGiven {
        message: Option<String>,
        realms: Vec<String>,
        redirection: Option<Box<WebError>>,
    },

    // cross-origin resource sharing ----------------------------------------
    #[error("{}", cors_rejected(.request_type, .resource, .origin, "origin forbidden"))]
    CorsOriginForbidden {
        resource: String,
        origin: String,
        request_type: Option<String>,
    },

    #[error("{}", cors_rejected(.request_type, .resource, .origin, &format!("method '{}' forbidden", .method)))]
    CorsMethodForbidden {
        resource: String,
        origin: String,
        method: String,
        request_type: Option<String>,
    },

    #[error("{}", cors_rejected(.request_type, .resource, .origin, &format!("headers {} forbidden", quoted_list(.headers))))]
    CorsHeadersForbidden {
        resource: String,
        origin: String,
        headers: Vec<String>,
        request_type: Option<String>,
    },

    #[error("{}", cors_rejected(.request_type, .resource, .origin, "no cross-origin sharing policy is defined for this resource"))]
    CorsPolicyUndefined {
        resource: String,
        origin: String,
        request_type: Option<String>,
    },

    // server errors --------------------------------------------------------
    #[error("web method '{method}' is not implemented; allowed web methods are {}", sorted_quoted_list(.allowed))]
    WebMethodNotImplemented { method: String, allowed: Vec<String> },

    #[error("unhandled exception: {message}")]
    Unhandled {
        message: String,
        traceback: Option<String>,
    },
}

impl WebError {
    /// The wire name of this error's type.
    pub fn name(&self) -> &'static str {
        match self {
            WebError::EntityChoiceRedirection { .. } => "EntityChoiceRedirection",
            WebError::EntityUnchanged { .. } => "EntityUnchanged",
            WebError::PermanentRedirection { .. } => "PermanentRedirection",
            WebError::ProxyRedirection { .. } => "ProxyRedirection",
            WebError::ResponseRedirection { .. } => "ResponseRedirection",
            WebError::TemporaryRedirection { .. } => "TemporaryRedirection",
            WebError::AccessForbidden { .. } => "AccessForbidden",
            WebError::ArgJsonValue { .. } => "ArgJsonValue",
            WebError::ArgPrimType { .. } => "ArgPrimType",
            WebError::ArgPrimValue { .. } => "ArgPrimValue",
            WebError::BadRequest { .. } => "BadRequest",
            WebError::HttpMethodNotAllowed { .. } => "HttpMethodNotAllowed",
            WebError::MissingRequiredArgs { .. } => "MissingRequiredArgs",
            WebError::NoAcceptableMediaType { .. } => "NoAcceptableMediaType",
            WebError::ResourceConflict { .. } => "ResourceConflict",
            WebError::ResourceNotFound { .. } => "ResourceNotFound",
            WebError::UnexpectedArgs { .. } => "UnexpectedArgs",
            WebError::Unauthenticated { .. } => "Unauthenticated",
            WebError::AuthTokensNotAccepted { .. } => "AuthTokensNotAccepted",
            WebError::AuthTokensNotGiven { .. } => "AuthTokensNotGiven",
            WebError::CorsOriginForbidden { .. } => "CorsOriginForbidden",
            WebError::CorsMethodForbidden { .. } => "CorsMethodForbidden",
            WebError::CorsHeadersForbidden { .. } => "CorsHeadersForbidden",
            WebError::CorsPolicyUndefined { .. } => "CorsPolicyUndefined",
            WebError::WebMethodNotImplemented { .. } => "WebMethodNotImplemented",
            WebError::Unhandled { .. } => "UnhandledException",
        }
    }

    /// Lowercase human-readable name of this error's type.
    pub fn displayname(&self) -> String {
        match self {
            WebError::EntityChoiceRedirection { .. } => "entity choice redirection".into(),
            WebError::EntityUnchanged { .. } => "entity unchanged".into(),
            WebError::PermanentRedirection { .. } => "permanent redirection".into(),
            WebError::ProxyRedirection { .. } => "proxy redirection".into(),
            WebError::ResponseRedirection { .. } => "response redirection".into(),
            WebError::TemporaryRedirection { .. } => "temporary redirection".into(),
            WebError::AccessForbidden { .. } => "access forbidden".into(),
            WebError::ArgJsonValue { .. } => "argument JSON value error".into(),
            WebError::ArgPrimType { .. } => "argument type error".into(),
            WebError::ArgPrimValue { .. } => "argument value error".into(),
            WebError::BadRequest { .. } => "bad request".into(),
            WebError::HttpMethodNotAllowed { .. } => "HTTP method not allowed".into(),
            WebError::MissingRequiredArgs { names, .. } => {
                plural_clause("missing required argument", names)
            }
            WebError::NoAcceptableMediaType { .. } => "no acceptable media type".into(),
            WebError::ResourceConflict { .. } => "resource conflict".into(),
            WebError::ResourceNotFound { .. } => "resource not found".into(),
            WebError::UnexpectedArgs { names, .. } => plural_clause("unexpected argument", names),
            WebError::Unauthenticated { .. } => "unauthenticated".into(),
            WebError::AuthTokensNotAccepted { .. } => "authentication tokens not accepted".into(),
            WebError::AuthTokensNotGiven { .. } => "authentication tokens not given".into(),
            WebError::CorsOriginForbidden { .. } => "cross-origin request origin forbidden".into(),
            WebError::CorsMethodForbidden { .. } => "cross-origin request method forbidden".into(),
            WebError::CorsHeadersForbidden { .. } => {
                "cross-origin request headers forbidden".into()
            }
            WebError::CorsPolicyUndefined { .. } => {
                "cross-origin resource sharing policy undefined".into()
            }
            WebError::WebMethodNotImplemented { .. } => "web method not implemented".into(),
            WebError::Unhandled { .. } => "unhandled exception".into(),
        }
    }

    /// Where this error's type is defined, for instance-info debug output.
    pub fn class_def(&self) -> ClassDefInfo {
        ClassDefInfo::new("trestle_types::error", self.name())
    }

    /// Construction arguments in declaration order, as JSON values.
    pub fn args(&self) -> Vec<Value> {
        match self {
            WebError::EntityChoiceRedirection {
                locs,
                preferred_loc,
                message,
            } => vec![json!(locs), json!(preferred_loc), json!(message)],
            WebError::EntityUnchanged { message } => vec![json!(message)],
            WebError::PermanentRedirection { loc, message }
            | WebError::ProxyRedirection { loc, message }
            | WebError::ResponseRedirection { loc, message }
            | WebError::TemporaryRedirection { loc, message } => {
                vec![json!(loc), json!(message)]
            }
            WebError::AccessForbidden {
                resource,
                action,
                message,
            }
            | WebError::ResourceConflict {
                resource,
                action,
                message,
            } => vec![json!(resource), json!(action), json!(message)],
            WebError::ArgJsonValue {
                name,
                value,
                message,
            } => vec![json!(name), json!(value), json!(message)],
            WebError::ArgPrimType {
                name,
                type_name,
                message,
                expected_type,
            } => vec![
                json!(name),
                json!(type_name),
                json!(message),
                json!(expected_type),
            ],
            WebError::ArgPrimValue {
                name,
                value,
                message,
                expected_value,
            } => vec![
                json!(name),
                value.clone(),
                json!(message),
                json!(expected_value),
            ],
            WebError::BadRequest { message } => vec![json!(message)],
            WebError::HttpMethodNotAllowed {
                method,
                allowed,
                message,
            } => vec![json!(method), json!(allowed), json!(message)],
            WebError::MissingRequiredArgs { names, method }
            | WebError::UnexpectedArgs { names, method } => {
                vec![json!(names), json!(method)]
            }
            WebError::NoAcceptableMediaType {
                webmethod,
                response_displayname,
                acceptable,
                supported,
            } => vec![
                json!(webmethod),
                json!(response_displayname),
                json!(acceptable),
                json!(supported),
            ],
            WebError::ResourceNotFound { message } => vec![json!(message)],
            WebError::Unauthenticated {
                message, realms, ..
            }
            | WebError::AuthTokensNotAccepted {
                message, realms, ..
            }
            | WebError::AuthTokensNotGiven {
                message, realms, ..
            } => vec![json!(message), json!(realms)],
            WebError::CorsOriginForbidden {
                resource,
                origin,
                request_type,
            }
            | WebError::CorsPolicyUndefined {
                resource,
                origin,
                request_type,
            } => vec![json!(resource), json!(origin), json!(request_type)],
            WebError::CorsMethodForbidden {
                resource,
                origin,
                method,
                request_type,
            } => vec![
                json!(resource),
                json!(origin),
                json!(method),
                json!(request_type),
            ],
            WebError::CorsHeadersForbidden {
                resource,
                origin,
                headers,
                request_type,
            } => vec![
                json!(resource),
                json!(origin),
                json!(headers),
                json!(request_type),
            ],
            WebError::WebMethodNotImplemented { method, allowed } => {
                vec![json!(method), json!(allowed)]
            }
            WebError::Unhandled { message, .. } => vec![json!(message)],
        }
    }

    /// The error a response reports. Auth-token errors carrying a
    /// redirection defer to it; everything else reports itself.
    pub fn effective(&self) -> &WebError {
        match self {
            WebError::Unauthenticated {
                redirection: Some(inner),
                ..
            }
            | WebError::AuthTokensNotAccepted {
                redirection: Some(inner),
                ..
            }
            | WebError::AuthTokensNotGiven {
                redirection: Some(inner),
                ..
            } => inner,
            _ => self,
        }
    }

    /// The redirection target, for errors that carry one.
    pub fn redirect_loc(&self) -> Option<&str> {
        match self {
            WebError::PermanentRedirection { loc, .. }
            | WebError::ProxyRedirection { loc, .. }
            | WebError::ResponseRedirection { loc, .. }
            | WebError::TemporaryRedirection { loc, .. } => Some(loc),
            WebError::Unauthenticated { redirection, .. }
            | WebError::AuthTokensNotAccepted { redirection, .. }
            | WebError::AuthTokensNotGiven { redirection, .. } => {
                redirection.as_deref().and_then(WebError::redirect_loc)
            }
            _ => None,
        }
    }

    /// The message attached to the redirection target, when there is one.
    pub fn redirect_message(&self) -> Option<&str> {
        match self {
            WebError::PermanentRedirection { message, .. }
            | WebError::ProxyRedirection { message, .. }
            | WebError::ResponseRedirection { message, .. }
            | WebError::TemporaryRedirection { message, .. } => message.as_deref(),
            WebError::Unauthenticated { redirection, .. }
            | WebError::AuthTokensNotAccepted { redirection, .. }
            | WebError::AuthTokensNotGiven { redirection, .. } => {
                redirection.as_deref().and_then(WebError::redirect_message)
            }
            _ => None,
        }
    }

    /// Captured backtrace text, present only on unhandled errors.
    pub fn traceback(&self) -> Option<&str> {
        match self {
            WebError::Unhandled { traceback, .. } => traceback.as_deref(),
            _ => None,
        }
    }

    /// Snapshot this error for an exception response.
    pub fn exception_info(&self) -> ExceptionInfo {
        ExceptionInfo {
            class_def: self.class_def(),
            displayname: self.displayname(),
            message: self.to_string(),
            args: self.args(),
            traceback: self.traceback().map(str::to_string),
        }
    }
}

// display helpers -----------------------------------------------------------

fn sfx(message: &Option<String>) -> String {
    match message {
        Some(m) => format!(": {m}"),
        None => String::new(),
    }
}

fn expecting(expected: &Option<String>) -> String {
    match expected {
        Some(e) => format!("; expecting {e}"),
        None => String::new(),
    }
}

fn quoted_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|i| format!("'{i}'")).collect();
    format!("[{}]", quoted.join(", "))
}

fn sorted_quoted_list(items: &[String]) -> String {
    let mut sorted = items.to_vec();
    sorted.sort();
    quoted_list(&sorted)
}

fn quoted_group(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|i| format!("'{i}'")).collect();
    format!("({})", quoted.join(", "))
}

fn args_clause(names: &[String]) -> String {
    if names.len() == 1 {
        format!("argument '{}'", names[0])
    } else {
        format!("arguments {}", quoted_list(names))
    }
}

fn plural_clause(stem: &str, names: &[String]) -> String {
    if names.len() > 1 {
        format!("{stem}s")
    } else {
        stem.to_string()
    }
}

fn entity_choice_message(
    locs: &[String],
    preferred_loc: &Option<String>,
    message: &Option<String>,
) -> String {
    let mut out = format!("choose among entities {}", quoted_group(locs));
    if let Some(preferred) = preferred_loc {
        out.push_str(&format!(" (preferred: {preferred})"));
    }
    out.push_str(&sfx(message));
    out
}

fn media_extras(acceptable: &[String], supported: &[String]) -> String {
    let mut extras = Vec::new();
    if !acceptable.is_empty() {
        extras.push(format!("requested {}", quoted_list(acceptable)));
    }
    if !supported.is_empty() {
        extras.push(format!("supported {}", quoted_list(supported)));
    }
    if extras.is_empty() {
        String::new()
    } else {
        format!("; {}", extras.join(", "))
    }
}

fn unauthenticated_message(
    inner: Option<&str>,
    message: &Option<String>,
    realms: &[String],
    redirection: &Option<Box<WebError>>,
) -> String {
    let mut out = String::from("request is unauthenticated");
    match (inner, message) {
        (Some(kind), Some(m)) => out.push_str(&format!(": {kind}: {m}")),
        (Some(kind), None) => out.push_str(&format!(": {kind}")),
        (None, Some(m)) => out.push_str(&format!(": {m}")),
        (None, None) => {}
    }
    out.push_str("; authentication is required");
    if !realms.is_empty() {
        out.push_str(&format!(" with realms {}", quoted_list(realms)));
    }
    if let Some(redirection) = redirection {
        if let Some(loc) = redirection.redirect_loc() {
            out.push_str(&format!("; authenticate at {loc}"));
            if let Some(m) = redirection.redirect_message() {
                out.push_str(&format!(" ({m})"));
            }
        }
    }
    out
}

fn cors_rejected(
    request_type: &Option<String>,
    resource: &str,
    origin: &str,
    reason: &str,
) -> String {
    let mut base = String::from("cross-origin");
    if let Some(request_type) = request_type {
        base.push_str(&format!(" {request_type}"));
    }
    base.push_str(" request rejected");
    format!("{base} by {resource} from origin '{origin}': {reason}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
