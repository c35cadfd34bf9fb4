//! Infrastructure layer for Trestle.
//!
//! Contains implementations of the seams defined in `trestle-core`:
//! HTTP service backends (embedded axum server, tower router adapter),
//! authentication connectors (HTTP Basic, cookie sessions) with an
//! in-memory credential backend, the config file loader, and an
//! in-process test client.

pub mod auth;
pub mod backend;
pub mod config;
pub mod testing;

use trestle_core::service::{BoxServiceBackend, register_impl};

/// Register the backends this crate ships under their impl names.
///
/// Safe to call more than once.
pub fn register_builtin_impls() {
    register_impl("axum", || {
        BoxServiceBackend::new(backend::axum_server::AxumServerBackend)
    });
    register_impl("tower", || {
        BoxServiceBackend::new(backend::tower_router::TowerRouterBackend)
    });
}
