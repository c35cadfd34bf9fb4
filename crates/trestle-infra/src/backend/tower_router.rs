//! The tower router adapter backend.
//!
//! Exposes the dispatch core as a plain tower service for embedding into
//! a host server; nothing is bound. The in-process test client drives
//! this router directly.

use std::sync::Arc;

use axum::Router;
use tokio_util::sync::CancellationToken;

use trestle_core::service::{BackendHandle, ServiceBackend, ServiceContext};

use crate::backend::axum_server::router;

/// The router adapter backend, registered as impl `"tower"`.
pub struct TowerRouterBackend;

impl ServiceBackend for TowerRouterBackend {
    fn name(&self) -> &str {
        "tower"
    }

    async fn start(&self, _context: Arc<ServiceContext>) -> anyhow::Result<BackendHandle> {
        // nothing to bind; the host drives the router
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let finished = tokio::spawn(async move { token.cancelled().await });
        Ok(BackendHandle { shutdown, finished })
    }
}

/// The service as a tower-compatible router, for a host server to drive.
pub fn service_router(context: Arc<ServiceContext>) -> Router {
    router(context)
}
