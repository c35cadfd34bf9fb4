//! Shared vocabulary types for Trestle.
//!
//! This crate contains the wire-level vocabulary used across the Trestle
//! framework: web-transmittable type descriptors, class-definition metadata,
//! the debug flag lattice, the web error taxonomy, and service configuration.
//!
//! Zero infrastructure dependencies -- only serde, chrono, regex, thiserror.

pub mod class_def;
pub mod config;
pub mod debug;
pub mod error;
pub mod webtype;
