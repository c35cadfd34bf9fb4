//! Response envelopes.
//!
//! Three envelope shapes share the wire: returns, exceptions, and
//! redirections. Field order is part of the contract, so envelopes are
//! assembled as ordered maps and serialized in insertion order.

use serde_json::{Map, Value, json};

use trestle_types::class_def::ClassDefInfo;
use trestle_types::debug::{
    DEBUG_EXC_INSTANCE_INFO, DEBUG_EXC_MESSAGE, DEBUG_EXC_NAME, DEBUG_EXC_TRACEBACK, DebugFlags,
};
use trestle_types::error::WebError;

use crate::auth::RequestAuthInfo;

/// The media type every resource supports out of the box.
pub const DEFAULT_MEDIA_TYPE: &str = "application/json";

const RESPONSE_MODULE: &str = "trestle_core::response";

/// Marker for responses that carry a web method's return value.
pub struct ReturnResponse;

impl ReturnResponse {
    pub fn class_def() -> ClassDefInfo {
        ClassDefInfo::new(RESPONSE_MODULE, "ReturnResponse")
    }

    pub fn displayname() -> &'static str {
        "return response"
    }
}

/// Marker for responses that report a raised error.
pub struct ExceptionResponse;

impl ExceptionResponse {
    pub fn class_def() -> ClassDefInfo {
        ClassDefInfo::new(RESPONSE_MODULE, "ExceptionResponse")
    }

    pub fn displayname() -> &'static str {
        "exception response"
    }
}

/// Marker for responses that send the client somewhere else.
pub struct RedirectionResponse;

impl RedirectionResponse {
    pub fn class_def() -> ClassDefInfo {
        ClassDefInfo::new(RESPONSE_MODULE, "RedirectionResponse")
    }

    pub fn displayname() -> &'static str {
        "redirection response"
    }
}

/// What a successful web method invocation produces.
#[derive(Debug, Clone)]
pub struct ReturnResponseData {
    /// The return value, coerced by the method's declared return type.
    pub value: Value,
    /// The negotiated response media type.
    pub mediatype: String,
    /// Auth info attached to the request, if the request got that far.
    pub auth_info: Option<RequestAuthInfo>,
}

/// What a raised error produces.
#[derive(Debug, Clone)]
pub struct ExceptionResponseData {
    pub error: WebError,
    pub debug_flags: DebugFlags,
    pub mediatype: String,
    pub auth_info: Option<RequestAuthInfo>,
}

/// The `auth_info` object attached to envelopes.
///
/// A request that never reached authentication reports all-null fields
/// except `accepted`, which is `false`; a request outside every auth space
/// carries a fresh unverified info and reports `accepted: null`.
pub fn auth_info_envelope(auth_info: Option<&RequestAuthInfo>) -> Value {
    match auth_info {
        Some(info) => json!({
            "realm": &info.realm,
            "user": info.user(),
            "accepted": info.accepted,
        }),
        None => json!({"realm": null, "user": null, "accepted": false}),
    }
}

/// Build the return envelope for a successful invocation.
pub fn return_envelope(data: &ReturnResponseData) -> Value {
    let mut envelope = Map::new();
    envelope.insert(
        "type".to_string(),
        Value::String(ReturnResponse::class_def().prim()),
    );
    envelope.insert("retval".to_string(), data.value.clone());
    envelope.insert(
        "auth_info".to_string(),
        auth_info_envelope(data.auth_info.as_ref()),
    );
    Value::Object(envelope)
}

/// Build the envelope for an error.
///
/// The effective error decides the shape: one that redirects gets a
/// redirection envelope, everything else an exception envelope.
pub fn error_envelope(data: &ExceptionResponseData) -> Value {
    let effective = data.error.effective();
    if effective.redirect_loc().is_some() {
        redirection_envelope(effective, data)
    } else {
        exception_envelope(effective, data)
    }
}

fn exception_envelope(effective: &WebError, data: &ExceptionResponseData) -> Value {
    let info = effective.exception_info();
    let mut envelope = Map::new();
    envelope.insert(
        "type".to_string(),
        Value::String(ExceptionResponse::class_def().prim()),
    );
    if data.debug_flags.contains(DEBUG_EXC_NAME) {
        envelope.insert("name".to_string(), json!(info.class_def.name));
        envelope.insert("displayname".to_string(), json!(info.displayname));
    }
    if data.debug_flags.contains(DEBUG_EXC_MESSAGE) {
        envelope.insert("message".to_string(), json!(info.message));
    }
    if data.debug_flags.contains(DEBUG_EXC_INSTANCE_INFO) {
        envelope.insert(
            "class_def_module".to_string(),
            json!(info.class_def.module),
        );
        envelope.insert("args".to_string(), Value::Array(info.args.clone()));
    }
    if let Some(traceback) = &info.traceback {
        if data.debug_flags.contains(DEBUG_EXC_TRACEBACK) {
            envelope.insert("traceback".to_string(), json!(traceback));
        }
    }
    if let Some(auth_info) = &data.auth_info {
        envelope.insert(
            "auth_info".to_string(),
            auth_info_envelope(Some(auth_info)),
        );
    }
    Value::Object(envelope)
}

fn redirection_envelope(effective: &WebError, data: &ExceptionResponseData) -> Value {
    let info = effective.exception_info();
    let mut envelope = Map::new();
    envelope.insert(
        "type".to_string(),
        Value::String(RedirectionResponse::class_def().prim()),
    );
    envelope.insert("loc".to_string(), json!(effective.redirect_loc()));
    envelope.insert("message".to_string(), json!(effective.redirect_message()));
    if data.debug_flags.contains(DEBUG_EXC_NAME) {
        envelope.insert("exc_name".to_string(), json!(info.class_def.name));
        envelope.insert("exc_displayname".to_string(), json!(info.displayname));
    }
    if data.debug_flags.contains(DEBUG_EXC_MESSAGE) {
        envelope.insert("exc_message".to_string(), json!(info.message));
    }
    if data.debug_flags.contains(DEBUG_EXC_INSTANCE_INFO) {
        envelope.insert(
            "exc_class_def_module".to_string(),
            json!(info.class_def.module),
        );
        envelope.insert("exc_args".to_string(), Value::Array(info.args.clone()));
    }
    if let Some(traceback) = &info.traceback {
        if data.debug_flags.contains(DEBUG_EXC_TRACEBACK) {
            envelope.insert("exc_traceback".to_string(), json!(traceback));
        }
    }
    if let Some(auth_info) = &data.auth_info {
        envelope.insert(
            "auth_info".to_string(),
            auth_info_envelope(Some(auth_info)),
        );
    }
    Value::Object(envelope)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use trestle_types::debug::{DEBUG_DEFAULT, DEBUG_SECURE};

    #[test]
    fn test_return_envelope_field_order_and_null_auth() {
        let data = ReturnResponseData {
            value: json!("Hello, world!"),
            mediatype: DEFAULT_MEDIA_TYPE.to_string(),
            auth_info: Some(RequestAuthInfo::default()),
        };
        let envelope = return_envelope(&data);
        assert_eq!(
            serde_json::to_string(&envelope).unwrap(),
            "{\"type\":\"trestle_core::response:ReturnResponse\",\
             \"retval\":\"Hello, world!\",\
             \"auth_info\":{\"realm\":null,\"user\":null,\"accepted\":null}}"
        );
    }

    #[test]
    fn test_return_envelope_without_auth_info_reports_unaccepted() {
        let data = ReturnResponseData {
            value: json!(null),
            mediatype: DEFAULT_MEDIA_TYPE.to_string(),
            auth_info: None,
        };
        let envelope = return_envelope(&data);
        assert_eq!(
            envelope["auth_info"],
            json!({"realm": null, "user": null, "accepted": false})
        );
    }

    #[test]
    fn test_return_envelope_with_accepted_auth() {
        let mut info = RequestAuthInfo::default();
        info.realm = Some("trestle".to_string());
        info.tokens.insert("user", "alice");
        info.accept();
        let data = ReturnResponseData {
            value: json!(1),
            mediatype: DEFAULT_MEDIA_TYPE.to_string(),
            auth_info: Some(info),
        };
        let envelope = return_envelope(&data);
        assert_eq!(
            envelope["auth_info"],
            json!({"realm": "trestle", "user": "alice", "accepted": true})
        );
    }

    #[test]
    fn test_exception_envelope_default_flags() {
        let data = ExceptionResponseData {
            error: WebError::ResourceNotFound { message: None },
            debug_flags: DEBUG_DEFAULT,
            mediatype: DEFAULT_MEDIA_TYPE.to_string(),
            auth_info: None,
        };
        let envelope = error_envelope(&data);
        assert_eq!(
            envelope["type"],
            json!("trestle_core::response:ExceptionResponse")
        );
        assert_eq!(envelope["name"], json!("ResourceNotFound"));
        assert_eq!(envelope["displayname"], json!("resource not found"));
        assert_eq!(envelope["message"], json!("resource not found"));
        assert_eq!(
            envelope["class_def_module"],
            json!("trestle_types::error")
        );
        assert_eq!(envelope["args"], json!([null]));
        // no traceback was captured and no auth info was attached
        assert!(envelope.get("traceback").is_none());
        assert!(envelope.get("auth_info").is_none());
    }

    #[test]
    fn test_exception_envelope_no_flags_is_type_only() {
        let data = ExceptionResponseData {
            error: WebError::BadRequest {
                message: Some("broken".to_string()),
            },
            debug_flags: DebugFlags::NONE,
            mediatype: DEFAULT_MEDIA_TYPE.to_string(),
            auth_info: None,
        };
        let envelope = error_envelope(&data);
        let fields = envelope.as_object().unwrap();
        assert_eq!(fields.len(), 1);
        assert!(fields.contains_key("type"));
    }

    #[test]
    fn test_traceback_gated_by_flags() {
        let error = WebError::Unhandled {
            message: "worker panicked".to_string(),
            traceback: Some("thread 'main' panicked".to_string()),
        };
        let data = ExceptionResponseData {
            error: error.clone(),
            debug_flags: DEBUG_DEFAULT,
            mediatype: DEFAULT_MEDIA_TYPE.to_string(),
            auth_info: None,
        };
        assert_eq!(
            error_envelope(&data)["traceback"],
            json!("thread 'main' panicked")
        );

        let data = ExceptionResponseData {
            debug_flags: DEBUG_SECURE,
            ..data
        };
        assert!(error_envelope(&data).get("traceback").is_none());
    }

    #[test]
    fn test_auth_error_with_redirection_renders_redirection_envelope() {
        let error = WebError::AuthTokensNotGiven {
            message: None,
            realms: vec!["trestle".to_string()],
            redirection: Some(Box::new(WebError::ResponseRedirection {
                loc: "/login".to_string(),
                message: Some("login is required to proceed".to_string()),
            })),
        };
        let data = ExceptionResponseData {
            error,
            debug_flags: DEBUG_DEFAULT,
            mediatype: DEFAULT_MEDIA_TYPE.to_string(),
            auth_info: Some(RequestAuthInfo::default()),
        };
        let envelope = error_envelope(&data);
        assert_eq!(
            envelope["type"],
            json!("trestle_core::response:RedirectionResponse")
        );
        assert_eq!(envelope["loc"], json!("/login"));
        assert_eq!(envelope["message"], json!("login is required to proceed"));
        assert_eq!(envelope["exc_name"], json!("ResponseRedirection"));
        assert_eq!(
            envelope["auth_info"],
            json!({"realm": null, "user": null, "accepted": null})
        );
    }

    #[test]
    fn test_direct_redirection_renders_redirection_envelope() {
        let data = ExceptionResponseData {
            error: WebError::TemporaryRedirection {
                loc: "/elsewhere".to_string(),
                message: None,
            },
            debug_flags: DebugFlags::NONE,
            mediatype: DEFAULT_MEDIA_TYPE.to_string(),
            auth_info: None,
        };
        let envelope = error_envelope(&data);
        assert_eq!(
            envelope["type"],
            json!("trestle_core::response:RedirectionResponse")
        );
        assert_eq!(envelope["loc"], json!("/elsewhere"));
        assert_eq!(envelope["message"], json!(null));
    }
}
