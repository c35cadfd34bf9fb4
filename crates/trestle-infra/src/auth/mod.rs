//! Authentication connectors and credential backends.
//!
//! `basic` and `session` hold the transport-facing connectors (scanners
//! and clerks); `inmem` holds the in-memory supplicants and the session
//! store that back them in demos and tests.

pub mod basic;
pub mod inmem;
pub mod session;

pub use basic::{HttpBasicClerk, HttpBasicScanner};
pub use inmem::{
    InMemoryPlainSupplicant, SessionManager, SessionRecallSupplicant, SessionStoreSupplicant,
};
pub use session::{
    SESSION_ID_COOKIE, SessionLoginClerk, SessionLoginScanner, SessionRecallClerk,
    SessionRecallScanner,
};
