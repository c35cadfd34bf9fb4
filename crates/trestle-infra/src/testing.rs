//! In-process test client.
//!
//! [`TestClient`] drives a service's router directly through
//! `tower::ServiceExt::oneshot`, so tests exercise the whole request
//! pipeline, backend adapter included, without binding a socket.
//!
//! Requests default to `Accept: application/json`; override the header
//! to test content negotiation. The client panics on transport-level
//! failures (unreadable bodies, malformed test requests) so test code
//! can stay on the happy path.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::Request;
use serde_json::Value;
use tower::ServiceExt as _;

use trestle_core::service::ServiceContext;

use crate::backend::tower_router::service_router;

/// Drives a [`ServiceContext`]'s router in process.
pub struct TestClient {
    router: Router,
}

impl TestClient {
    pub fn new(context: Arc<ServiceContext>) -> Self {
        Self {
            router: service_router(context),
        }
    }

    pub fn get(&self, uri: &str) -> TestRequest<'_> {
        self.request("GET", uri)
    }

    pub fn head(&self, uri: &str) -> TestRequest<'_> {
        self.request("HEAD", uri)
    }

    pub fn post(&self, uri: &str) -> TestRequest<'_> {
        self.request("POST", uri)
    }

    pub fn put(&self, uri: &str) -> TestRequest<'_> {
        self.request("PUT", uri)
    }

    pub fn delete(&self, uri: &str) -> TestRequest<'_> {
        self.request("DELETE", uri)
    }

    pub fn options(&self, uri: &str) -> TestRequest<'_> {
        self.request("OPTIONS", uri)
    }

    fn request(&self, method: &'static str, uri: &str) -> TestRequest<'_> {
        TestRequest {
            client: self,
            method,
            uri: uri.to_string(),
            headers: vec![("Accept".to_string(), "application/json".to_string())],
            body: Vec::new(),
        }
    }
}

/// A request under construction; finish it with [`TestRequest::send`].
pub struct TestRequest<'a> {
    client: &'a TestClient,
    method: &'static str,
    uri: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl TestRequest<'_> {
    /// Set a header, replacing any previous value for the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Attach a JSON object body whose fields are method arguments.
    pub fn json(mut self, value: &Value) -> Self {
        self.body = value.to_string().into_bytes();
        self.header("Content-Type", "application/json")
    }

    /// Attach a raw body with an explicit media type.
    pub fn body(mut self, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self.header("Content-Type", content_type.to_string())
    }

    pub async fn send(self) -> TestResponse {
        let mut builder = Request::builder().method(self.method).uri(&self.uri);
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        let request = builder
            .body(Body::from(self.body))
            .expect("valid test request");
        let response = self
            .client
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible router");
        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX)
            .await
            .expect("readable test response body")
            .to_vec();
        TestResponse {
            status: parts.status.as_u16(),
            headers: parts
                .headers
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_string(),
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    )
                })
                .collect(),
            body,
        }
    }
}

/// A finished response, with the body buffered.
pub struct TestResponse {
    pub status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl TestResponse {
    /// The first value of a header, by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Every value of a header, in response order.
    pub fn headers(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .collect()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the body as JSON. Panics when the body is not JSON.
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("JSON response body")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use trestle_types::class_def::ClassDefInfo;
    use trestle_types::webtype::WebTypeDef;

    use trestle_core::mappings::WebResourcePathMap;
    use trestle_core::request::WebRequest;
    use trestle_core::resource::{
        BoxWebResource, WebArgs, WebMethodSpec, WebResource, unimplemented_webmethod,
    };
    use trestle_types::error::WebError;

    struct Greeter;

    impl WebResource for Greeter {
        fn class_def(&self) -> ClassDefInfo {
            ClassDefInfo::new("trestle_infra::testing::tests", "Greeter")
        }

        fn webmethods(&self) -> Vec<WebMethodSpec> {
            vec![
                WebMethodSpec::new("get", WebTypeDef::Unicode).optional_arg(
                    "who",
                    WebTypeDef::Unicode,
                    json!("world"),
                ),
                WebMethodSpec::new("post", WebTypeDef::Unicode).arg("who", WebTypeDef::Unicode),
            ]
        }

        async fn call(
            &self,
            method: &str,
            _request: &WebRequest,
            args: WebArgs,
        ) -> Result<Value, WebError> {
            match method {
                "get" | "post" => Ok(json!(format!("Hello, {}!", args.unicode("who")?))),
                other => Err(unimplemented_webmethod(&self.webmethods(), other)),
            }
        }
    }

    fn client() -> TestClient {
        let mut resources = WebResourcePathMap::new();
        resources
            .insert("/helloworld", BoxWebResource::new(Greeter))
            .unwrap();
        let context = ServiceContext {
            resources,
            ..ServiceContext::default()
        };
        TestClient::new(Arc::new(context))
    }

    #[tokio::test]
    async fn test_get_returns_envelope() {
        let response = client().get("/helloworld").send().await;
        assert_eq!(response.status, 200);
        assert_eq!(
            response.header("content-type"),
            Some("application/json; charset=utf-8")
        );
        let body = response.json();
        assert_eq!(body["retval"], json!("Hello, world!"));
    }

    #[tokio::test]
    async fn test_query_args_reach_the_method() {
        let response = client().get("/helloworld?who=tester").send().await;
        assert_eq!(response.json()["retval"], json!("Hello, tester!"));
    }

    #[tokio::test]
    async fn test_json_body_posts_method_args() {
        let response = client()
            .post("/helloworld")
            .json(&json!({"who": "poster"}))
            .send()
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(response.json()["retval"], json!("Hello, poster!"));
    }

    #[tokio::test]
    async fn test_header_replaces_previous_value() {
        let response = client()
            .get("/helloworld")
            .header("Accept", "application/xml")
            .header("accept", "application/json")
            .send()
            .await;
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_not_found_reports_exception_envelope() {
        let response = client().get("/nowhere").send().await;
        assert_eq!(response.status, 404);
        assert_eq!(response.json()["name"], json!("ResourceNotFound"));
    }
}
