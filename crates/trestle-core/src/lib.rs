//! Framework logic for Trestle.
//!
//! This crate defines the resource and web-method model, the request and
//! response envelopes, argument marshaling, path mappings, cross-origin
//! policy, the authentication framework, and the transport-neutral
//! dispatch pipeline. It never depends on a concrete web server;
//! backends plug in through the `service` registry.

pub mod args;
pub mod auth;
pub mod cors;
pub mod dispatch;
pub mod http;
pub mod mappings;
pub mod request;
pub mod resource;
pub mod response;
pub mod service;
