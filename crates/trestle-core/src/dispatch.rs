//! The transport-neutral dispatch pipeline.
//!
//! Backends convert their inbound requests into [`RequestFacts`], run
//! [`dispatch`], and put the resulting [`WireResponse`] on the wire.
//! The pipeline resolves the resource and web method, enforces
//! cross-origin policy, authenticates where a space covers the path,
//! marshals arguments, invokes the method, and renders the envelope.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tracing::{error, info, warn};

use trestle_types::error::WebError;

use crate::args::{method_args, resource_args};
use crate::auth::{AuthRequestInfo, ClerkDirectives, RequestAuthInfo};
use crate::cors::{self, CorsFacts, CorsRequestType};
use crate::http::{
    AcceptEntry, BODYLESS_WEBMETHODS, best_mediatype, parse_accept, status_for,
    supported_http_methods, webmethod_name,
};
use crate::request::WebRequest;
use crate::resource::{invoke_webmethod, unimplemented_webmethod, webmethod_names};
use crate::response::{
    DEFAULT_MEDIA_TYPE, ExceptionResponseData, ReturnResponseData, error_envelope,
    return_envelope,
};
use crate::service::ServiceContext;

// --- Wire models ---

/// One inbound HTTP request, as a backend hands it to the pipeline.
#[derive(Debug, Clone)]
pub struct RequestFacts {
    /// The HTTP method as received.
    pub http_method: String,
    /// The request target: path plus optional query string.
    pub uri: String,
    /// The URL scheme the request arrived over.
    pub scheme: String,
    /// The `Host` header field, when present.
    pub host: Option<String>,
    /// Header fields as received.
    pub headers: Vec<(String, String)>,
    /// The request body.
    pub body: Vec<u8>,
}

impl RequestFacts {
    /// The first value of a header field, by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Lowercased names of the header fields sent.
    pub fn header_names(&self) -> Vec<String> {
        self.headers
            .iter()
            .map(|(field, _)| field.to_ascii_lowercase())
            .collect()
    }

    /// Cookies from the `Cookie` header fields.
    pub fn cookies(&self) -> BTreeMap<String, String> {
        let mut cookies = BTreeMap::new();
        for (field, value) in &self.headers {
            if !field.eq_ignore_ascii_case("cookie") {
                continue;
            }
            for piece in value.split(';') {
                if let Some((name, value)) = piece.split_once('=') {
                    cookies.insert(name.trim().to_string(), value.trim().to_string());
                }
            }
        }
        cookies
    }

    fn path(&self) -> &str {
        match self.uri.split_once('?') {
            Some((path, _)) => path,
            None => &self.uri,
        }
    }

    fn query(&self) -> &str {
        match self.uri.split_once('?') {
            Some((_, query)) => query,
            None => "",
        }
    }
}

/// One outbound HTTP response, ready for a backend to send.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    pub content_type: String,
    pub body: String,
    /// The `Location` header for redirections.
    pub location: Option<String>,
    /// Clerk directives and cross-origin grants.
    pub headers: Vec<(String, String)>,
    /// Expose every response header cross-origin; the backend fills the
    /// header at send time, when the full header set is known.
    pub expose_all: bool,
    /// Send headers only (`HEAD`).
    pub suppress_body: bool,
}

// --- The pipeline ---

/// Run one request through the pipeline and render its response.
///
/// Never fails: every error renders as an exception or redirection
/// envelope. One log event is emitted per request at completion.
pub async fn dispatch(context: &ServiceContext, facts: &RequestFacts) -> WireResponse {
    let started = Instant::now();
    let summary = format!("{} {}", facts.http_method.to_ascii_uppercase(), facts.uri);
    let response = respond(context, facts).await;
    let status = response.status;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    if status < 400 {
        info!("{status} {summary}   {elapsed_ms:.2} ms");
    } else if status < 500 {
        warn!("{status} {summary}   {elapsed_ms:.2} ms");
    } else {
        error!("{status} {summary}   {elapsed_ms:.2} ms");
    }
    response
}

async fn respond(context: &ServiceContext, facts: &RequestFacts) -> WireResponse {
    let http_method = facts.http_method.to_ascii_uppercase();
    let path = facts.path();
    let query = facts.query();
    let acceptable = parse_accept(facts.header("accept"));
    let suppress_body = http_method == "HEAD";

    let mut headers: Vec<(String, String)> = Vec::new();
    let mut expose_all = false;

    // resource resolution
    let Some((resource, pathparts)) = context.resources.resolve(path) else {
        return error_response(
            context,
            WebError::ResourceNotFound { message: None },
            None,
            &acceptable,
            headers,
            expose_all,
            suppress_body,
        );
    };

    // web method resolution; a verb no resource anywhere speaks is not
    // implemented, one this resource lacks is not allowed
    let webmethod = webmethod_name(&http_method, query);
    let specs = resource.webmethods();
    let names = webmethod_names(&specs);
    if !names.iter().any(|name| name == &webmethod) {
        let err = if context.all_supported_http_methods().contains(&http_method) {
            WebError::HttpMethodNotAllowed {
                method: http_method.clone(),
                allowed: supported_http_methods(&names).into_iter().collect(),
                message: None,
            }
        } else {
            unimplemented_webmethod(&specs, &webmethod)
        };
        return error_response(
            context,
            err,
            None,
            &acceptable,
            headers,
            expose_all,
            suppress_body,
        );
    }

    // cross-origin enforcement
    let cors_facts = CorsFacts {
        path,
        http_method: &http_method,
        scheme: &facts.scheme,
        host: facts.host.as_deref(),
        origin: facts.header("origin"),
        request_method: facts.header("access-control-request-method"),
        request_headers: facts.header("access-control-request-headers"),
        header_names: facts.header_names(),
    };
    let resource_methods = supported_http_methods(&names);
    match cors::enforce(
        &context.cors_affordances,
        &context.auth_spaces,
        &cors_facts,
        &resource_methods,
    ) {
        Ok(None) => {}
        Ok(Some(outcome)) => {
            headers.extend(outcome.headers);
            expose_all = outcome.expose_all;
            if outcome.request_type == CorsRequestType::Preflight {
                let data = ReturnResponseData {
                    value: Value::Null,
                    mediatype: DEFAULT_MEDIA_TYPE.to_string(),
                    auth_info: Some(RequestAuthInfo::new()),
                };
                return success_response(
                    context,
                    &data,
                    &acceptable,
                    headers,
                    expose_all,
                    suppress_body,
                );
            }
        }
        Err(err) => {
            return error_response(
                context,
                err,
                None,
                &acceptable,
                headers,
                expose_all,
                suppress_body,
            );
        }
    }

    // argument extraction; the body only counts for verbs that carry one
    let res_args = resource_args(&pathparts, path);
    let body = if BODYLESS_WEBMETHODS.contains(&webmethod.as_str()) {
        None
    } else {
        Some(facts.body.as_slice())
    };
    let m_args = match method_args(query, facts.header("content-type"), body) {
        Ok(args) => args,
        Err(err) => {
            return error_response(
                context,
                err,
                None,
                &acceptable,
                headers,
                expose_all,
                suppress_body,
            );
        }
    };

    // authentication where a space covers the path
    let auth_info = match context.auth_spaces.resolve(path) {
        Some(space) => {
            let req_info = AuthRequestInfo {
                authorization: facts.header("authorization").map(str::to_string),
                cookies: facts.cookies(),
                method_args: m_args.clone(),
            };
            let outcome = context.authenticator.authenticate(space, &req_info).await;
            headers.extend(directive_headers(&outcome.directives));
            if let Some(err) = outcome.error {
                return error_response(
                    context,
                    err,
                    Some(outcome.auth_info),
                    &acceptable,
                    headers,
                    expose_all,
                    suppress_body,
                );
            }
            outcome.auth_info
        }
        None => RequestAuthInfo::new(),
    };

    // invocation
    let request = WebRequest {
        uri: facts.uri.clone(),
        loc: match &facts.host {
            Some(host) => format!("{}://{}{}", facts.scheme, host, path),
            None => path.to_string(),
        },
        path: path.to_string(),
        query: query.to_string(),
        http_method,
        webmethod,
        acceptable_mediaranges: acceptable.clone(),
        resource_args: res_args,
        method_args: m_args,
        auth_info,
        timestamp: Utc::now(),
    };
    match invoke_webmethod(resource, &request).await {
        Ok(data) => success_response(context, &data, &acceptable, headers, expose_all, suppress_body),
        Err(err) => error_response(
            context,
            err,
            Some(request.auth_info),
            &acceptable,
            headers,
            expose_all,
            suppress_body,
        ),
    }
}

// --- Rendering ---

/// Clerk directives as response header fields.
fn directive_headers(directives: &ClerkDirectives) -> Vec<(String, String)> {
    let mut headers = Vec::new();
    for challenge in &directives.challenges {
        headers.push(("WWW-Authenticate".to_string(), challenge.clone()));
    }
    for (name, value) in &directives.set_cookies {
        headers.push(("Set-Cookie".to_string(), format!("{name}={value}; Path=/")));
    }
    for name in &directives.clear_cookies {
        headers.push(("Set-Cookie".to_string(), format!("{name}=; Path=/; Max-Age=0")));
    }
    headers
}

fn success_response(
    context: &ServiceContext,
    data: &ReturnResponseData,
    acceptable: &[AcceptEntry],
    headers: Vec<(String, String)>,
    expose_all: bool,
    suppress_body: bool,
) -> WireResponse {
    let envelope = return_envelope(data);
    match serde_json::to_string(&envelope) {
        Ok(body) => WireResponse {
            status: 200,
            content_type: data.mediatype.clone(),
            body,
            location: None,
            headers,
            expose_all,
            suppress_body,
        },
        Err(err) => error_response(
            context,
            WebError::Unhandled {
                message: format!("cannot render return envelope: {err}"),
                traceback: Some(std::backtrace::Backtrace::force_capture().to_string()),
            },
            data.auth_info.clone(),
            acceptable,
            headers,
            expose_all,
            suppress_body,
        ),
    }
}

fn error_response(
    context: &ServiceContext,
    error: WebError,
    auth_info: Option<RequestAuthInfo>,
    acceptable: &[AcceptEntry],
    headers: Vec<(String, String)>,
    expose_all: bool,
    suppress_body: bool,
) -> WireResponse {
    let status = status_for(error.effective());
    let location = error.effective().redirect_loc().map(str::to_string);
    let data = ExceptionResponseData {
        error,
        debug_flags: context.debug_flags,
        mediatype: DEFAULT_MEDIA_TYPE.to_string(),
        auth_info,
    };
    let envelope = error_envelope(&data);
    match serde_json::to_string(&envelope) {
        Ok(body) => WireResponse {
            status,
            content_type: data.mediatype,
            body,
            location,
            headers,
            expose_all,
            suppress_body,
        },
        Err(_) => text_fallback(
            status,
            &data.error,
            acceptable,
            location,
            headers,
            expose_all,
            suppress_body,
        ),
    }
}

/// Last resort when an error envelope cannot be rendered: plain text if
/// the client accepts it, an empty body otherwise.
fn text_fallback(
    status: u16,
    error: &WebError,
    acceptable: &[AcceptEntry],
    location: Option<String>,
    headers: Vec<(String, String)>,
    expose_all: bool,
    suppress_body: bool,
) -> WireResponse {
    let (content_type, body) = if best_mediatype(acceptable, &["text/plain"]).is_some() {
        let text = format!(
            "{}: {}\n{}",
            error.name(),
            error,
            error.traceback().unwrap_or_default(),
        );
        ("text/plain".to_string(), text)
    } else {
        (DEFAULT_MEDIA_TYPE.to_string(), String::new())
    };
    WireResponse {
        status,
        content_type,
        body,
        location,
        headers,
        expose_all,
        suppress_body,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use trestle_types::class_def::ClassDefInfo;
    use trestle_types::webtype::WebTypeDef;

    use crate::auth::Space;
    use crate::cors::{CorsAffordanceMap, CorsAffordanceSet};
    use crate::mappings::WebResourcePathMap;
    use crate::resource::{BoxWebResource, WebArgs, WebMethodSpec, WebResource};

    struct Greeter;

    impl WebResource for Greeter {
        fn class_def(&self) -> ClassDefInfo {
            ClassDefInfo::new("trestle_core::dispatch::tests", "Greeter")
        }

        fn webmethods(&self) -> Vec<WebMethodSpec> {
            vec![
                WebMethodSpec::new("get", WebTypeDef::Unicode).optional_arg(
                    "who",
                    WebTypeDef::Unicode,
                    json!("world"),
                ),
            ]
        }

        async fn call(
            &self,
            method: &str,
            _request: &WebRequest,
            args: WebArgs,
        ) -> Result<Value, WebError> {
            match method {
                "get" => Ok(json!(format!("Hello, {}!", args.unicode("who")?))),
                other => Err(unimplemented_webmethod(&self.webmethods(), other)),
            }
        }
    }

    struct Dropper;

    impl WebResource for Dropper {
        fn class_def(&self) -> ClassDefInfo {
            ClassDefInfo::new("trestle_core::dispatch::tests", "Dropper")
        }

        fn webmethods(&self) -> Vec<WebMethodSpec> {
            vec![WebMethodSpec::new("delete", WebTypeDef::Null)]
        }

        async fn call(
            &self,
            _method: &str,
            _request: &WebRequest,
            _args: WebArgs,
        ) -> Result<Value, WebError> {
            Ok(Value::Null)
        }
    }

    struct Bouncer;

    impl WebResource for Bouncer {
        fn class_def(&self) -> ClassDefInfo {
            ClassDefInfo::new("trestle_core::dispatch::tests", "Bouncer")
        }

        fn webmethods(&self) -> Vec<WebMethodSpec> {
            vec![WebMethodSpec::new("get", WebTypeDef::Unicode)]
        }

        async fn call(
            &self,
            _method: &str,
            _request: &WebRequest,
            _args: WebArgs,
        ) -> Result<Value, WebError> {
            Err(WebError::ResponseRedirection {
                loc: "/elsewhere".to_string(),
                message: None,
            })
        }
    }

    struct Echo;

    impl WebResource for Echo {
        fn class_def(&self) -> ClassDefInfo {
            ClassDefInfo::new("trestle_core::dispatch::tests", "Echo")
        }

        fn webmethods(&self) -> Vec<WebMethodSpec> {
            vec![WebMethodSpec::new("post", WebTypeDef::Unicode).arg("text", WebTypeDef::Unicode)]
        }

        async fn call(
            &self,
            _method: &str,
            _request: &WebRequest,
            args: WebArgs,
        ) -> Result<Value, WebError> {
            Ok(json!(args.unicode("text")?))
        }
    }

    fn context() -> ServiceContext {
        let mut resources = WebResourcePathMap::new();
        resources
            .insert("/helloworld", BoxWebResource::new(Greeter))
            .unwrap();
        resources
            .insert("/items", BoxWebResource::new(Dropper))
            .unwrap();
        resources
            .insert("/bounce", BoxWebResource::new(Bouncer))
            .unwrap();
        resources.insert("/echo", BoxWebResource::new(Echo)).unwrap();
        let mut cors_affordances = CorsAffordanceMap::new();
        cors_affordances.insert("/", CorsAffordanceSet::max()).unwrap();
        ServiceContext {
            resources,
            cors_affordances,
            ..ServiceContext::default()
        }
    }

    fn facts(method: &str, uri: &str) -> RequestFacts {
        RequestFacts {
            http_method: method.to_string(),
            uri: uri.to_string(),
            scheme: "http".to_string(),
            host: Some("localhost:8080".to_string()),
            headers: vec![("Accept".to_string(), "application/json".to_string())],
            body: Vec::new(),
        }
    }

    fn body_json(response: &WireResponse) -> Value {
        serde_json::from_str(&response.body).unwrap()
    }

    #[tokio::test]
    async fn test_helloworld_return_envelope() {
        let context = context();
        let response = dispatch(&context, &facts("GET", "/helloworld")).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, "application/json");
        assert!(!response.suppress_body);
        assert_eq!(
            response.body,
            "{\"type\":\"trestle_core::response:ReturnResponse\",\
             \"retval\":\"Hello, world!\",\
             \"auth_info\":{\"realm\":null,\"user\":null,\"accepted\":null}}"
        );
    }

    #[tokio::test]
    async fn test_query_arg_reaches_the_method() {
        let context = context();
        let response = dispatch(&context, &facts("GET", "/helloworld?who=crowd")).await;
        assert_eq!(response.status, 200);
        assert_eq!(body_json(&response)["retval"], json!("Hello, crowd!"));
    }

    #[tokio::test]
    async fn test_tunneled_get_through_post() {
        let context = context();
        let response = dispatch(&context, &facts("POST", "/helloworld?get&who=crowd")).await;
        assert_eq!(response.status, 200);
        assert_eq!(body_json(&response)["retval"], json!("Hello, crowd!"));
    }

    #[tokio::test]
    async fn test_unrouted_path_is_not_found() {
        let context = context();
        let response = dispatch(&context, &facts("GET", "/nowhere")).await;
        assert_eq!(response.status, 404);
        let envelope = body_json(&response);
        assert_eq!(envelope["type"], json!("trestle_core::response:ExceptionResponse"));
        assert_eq!(envelope["name"], json!("ResourceNotFound"));
        // no auth info before a request exists
        assert!(envelope.get("auth_info").is_none());
    }

    #[tokio::test]
    async fn test_unallowed_verb_vs_unimplemented_verb() {
        let context = context();

        // some resource speaks DELETE, this one does not
        let not_allowed = dispatch(&context, &facts("DELETE", "/helloworld")).await;
        assert_eq!(not_allowed.status, 405);
        assert_eq!(body_json(&not_allowed)["name"], json!("HttpMethodNotAllowed"));

        // no resource anywhere speaks PATCH
        let unimplemented = dispatch(&context, &facts("PATCH", "/helloworld")).await;
        assert_eq!(unimplemented.status, 501);
        assert_eq!(
            body_json(&unimplemented)["name"],
            json!("WebMethodNotImplemented")
        );
    }

    #[tokio::test]
    async fn test_head_suppresses_the_body() {
        let context = context();
        let response = dispatch(&context, &facts("HEAD", "/helloworld")).await;
        assert_eq!(response.status, 200);
        assert!(response.suppress_body);
        assert!(!response.body.is_empty());
    }

    #[tokio::test]
    async fn test_redirection_sets_location() {
        let context = context();
        let response = dispatch(&context, &facts("GET", "/bounce")).await;
        assert_eq!(response.status, 303);
        assert_eq!(response.location.as_deref(), Some("/elsewhere"));
        let envelope = body_json(&response);
        assert_eq!(
            envelope["type"],
            json!("trestle_core::response:RedirectionResponse")
        );
        assert_eq!(envelope["loc"], json!("/elsewhere"));
    }

    #[tokio::test]
    async fn test_json_body_args() {
        let context = context();
        let mut facts = facts("POST", "/echo");
        facts
            .headers
            .push(("Content-Type".to_string(), "application/json".to_string()));
        facts.body = br#"{"text": "hi"}"#.to_vec();
        let response = dispatch(&context, &facts).await;
        assert_eq!(response.status, 200);
        assert_eq!(body_json(&response)["retval"], json!("hi"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let context = context();
        let mut facts = facts("POST", "/echo");
        facts
            .headers
            .push(("Content-Type".to_string(), "application/json".to_string()));
        facts.body = b"[1, 2]".to_vec();
        let response = dispatch(&context, &facts).await;
        assert_eq!(response.status, 400);
        assert_eq!(body_json(&response)["name"], json!("BadRequest"));
    }

    #[tokio::test]
    async fn test_preflight_short_circuits_with_null_envelope() {
        let context = context();
        let mut facts = facts("OPTIONS", "/helloworld");
        facts.headers.push((
            "Origin".to_string(),
            "http://elsewhere.example".to_string(),
        ));
        facts.headers.push((
            "Access-Control-Request-Method".to_string(),
            "GET".to_string(),
        ));
        let response = dispatch(&context, &facts).await;
        assert_eq!(response.status, 200);
        assert_eq!(body_json(&response)["retval"], Value::Null);
        assert!(response.headers.contains(&(
            "Access-Control-Allow-Origin".to_string(),
            "http://elsewhere.example".to_string()
        )));
        let methods = response
            .headers
            .iter()
            .find(|(name, _)| name == "Access-Control-Allow-Methods")
            .map(|(_, value)| value.as_str());
        assert_eq!(methods, Some("GET, HEAD, OPTIONS, POST"));
    }

    #[tokio::test]
    async fn test_cross_origin_actual_request_gets_grants() {
        let context = context();
        let mut facts = facts("GET", "/helloworld");
        facts.headers.push((
            "Origin".to_string(),
            "http://elsewhere.example".to_string(),
        ));
        let response = dispatch(&context, &facts).await;
        assert_eq!(response.status, 200);
        assert!(response.expose_all);
        assert!(response.headers.contains(&(
            "Access-Control-Allow-Origin".to_string(),
            "http://elsewhere.example".to_string()
        )));
    }

    #[tokio::test]
    async fn test_cross_origin_without_policy_is_rejected() {
        let mut context = context();
        context.cors_affordances = CorsAffordanceMap::new();
        let mut facts = facts("GET", "/helloworld");
        facts.headers.push((
            "Origin".to_string(),
            "http://elsewhere.example".to_string(),
        ));
        let response = dispatch(&context, &facts).await;
        assert_eq!(response.status, 403);
        assert_eq!(body_json(&response)["name"], json!("CorsPolicyUndefined"));
    }

    #[tokio::test]
    async fn test_auth_space_without_tokens_is_unauthenticated() {
        let mut context = context();
        context
            .auth_spaces
            .insert("/helloworld", Space::basic_realm("trestle"))
            .unwrap();
        let response = dispatch(&context, &facts("GET", "/helloworld")).await;
        assert_eq!(response.status, 401);
        let envelope = body_json(&response);
        assert_eq!(envelope["name"], json!("AuthTokensNotGiven"));
        assert_eq!(envelope["auth_info"]["accepted"], Value::Null);
    }
}
