//! HTTP service backends.
//!
//! Both backends funnel every request through the dispatch pipeline in
//! `trestle-core`. The axum backend binds a listener and serves; the
//! tower backend hands the router to a host server instead.

pub mod axum_server;
pub mod tower_router;
