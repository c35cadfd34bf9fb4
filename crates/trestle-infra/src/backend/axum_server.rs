//! The embedded axum HTTP server backend.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use anyhow::{Context, anyhow, bail};
use tracing::{error, info, warn};

use trestle_core::dispatch::{RequestFacts, WireResponse, dispatch};
use trestle_core::service::{BackendHandle, ServiceBackend, ServiceContext};

/// Largest request body the backend will buffer.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// The embedded HTTP server backend, registered as impl `"axum"`.
pub struct AxumServerBackend;

impl ServiceBackend for AxumServerBackend {
    fn name(&self) -> &str {
        "axum"
    }

    async fn start(&self, context: Arc<ServiceContext>) -> anyhow::Result<BackendHandle> {
        let addr = bind_addr(&context.uris)?;
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("cannot bind '{addr}'"))?;
        let local_addr = listener.local_addr()?;
        let router = router(context);
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let finished = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(err) = served {
                error!(error = %err, "HTTP server ended abnormally");
            }
        });
        info!(addr = %local_addr, "Serving HTTP");
        Ok(BackendHandle { shutdown, finished })
    }
}

/// The service as an axum router: every path and method funnels through
/// the dispatch pipeline via the fallback handler.
pub fn router(context: Arc<ServiceContext>) -> Router {
    Router::new()
        .fallback(handle)
        .layer(TraceLayer::new_for_http())
        .with_state(context)
}

async fn handle(State(context): State<Arc<ServiceContext>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes.to_vec(),
        Err(err) => {
            warn!(error = %err, "Unreadable request body");
            return (StatusCode::BAD_REQUEST, "unreadable request body").into_response();
        }
    };
    let facts = request_facts(&parts, body);
    let wire = dispatch(&context, &facts).await;
    wire_response(&wire)
}

fn request_facts(parts: &Parts, body: Vec<u8>) -> RequestFacts {
    let uri = match parts.uri.path_and_query() {
        Some(target) => target.as_str().to_string(),
        None => parts.uri.path().to_string(),
    };
    let headers = parts
        .headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    let host = parts
        .headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    RequestFacts {
        http_method: parts.method.as_str().to_string(),
        uri,
        scheme: parts.uri.scheme_str().unwrap_or("http").to_string(),
        host,
        headers,
        body,
    }
}

fn wire_response(wire: &WireResponse) -> Response {
    let mut builder = Response::builder().status(wire.status);
    builder = builder.header(header::CONTENT_TYPE, wire.content_type.as_str());
    if let Some(location) = &wire.location {
        builder = builder.header(header::LOCATION, location.as_str());
    }
    for (name, value) in &wire.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if wire.expose_all {
        // universal exposure names every header in the response
        let exposed = builder
            .headers_ref()
            .map(|headers| {
                headers
                    .keys()
                    .map(|name| name.as_str().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        if !exposed.is_empty() {
            builder = builder.header("access-control-expose-headers", exposed);
        }
    }
    let body = if wire.suppress_body {
        Body::empty()
    } else {
        Body::from(wire.body.clone())
    };
    match builder.body(body) {
        Ok(response) => response,
        Err(err) => {
            error!(error = %err, "Cannot assemble response");
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

/// The bind authority from the first configured listen URI.
fn bind_addr(uris: &[String]) -> anyhow::Result<String> {
    let uri = uris
        .first()
        .ok_or_else(|| anyhow!("no listen URI configured"))?;
    let rest = uri
        .strip_prefix("http://")
        .or_else(|| uri.strip_prefix("https://"))
        .unwrap_or(uri);
    let authority = rest.split('/').next().unwrap_or(rest);
    if authority.is_empty() {
        bail!("invalid listen URI '{uri}'");
    }
    Ok(authority.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
