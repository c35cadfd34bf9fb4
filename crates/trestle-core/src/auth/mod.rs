//! The authentication framework.
//!
//! Declarative `Space`s state what authentication a subtree of paths
//! affords. Each supported scheme is implemented by a connector chain:
//! a scanner extracts tokens from the request, a supplicant verifies
//! them against a credential backend, and a clerk communicates the
//! verdict back to the client. The `Authenticator` runs the chains.

pub mod authenticator;
pub mod connector;
pub mod info;
pub mod spaces;
pub mod tokens;

pub use authenticator::{AuthOutcome, Authenticator};
pub use connector::{
    AuthRequestInfo, BoxSupplicant, Clerk, ClerkDirectives, ConnectorChain, ScanError, Scanner,
    Supplicant, SupplicantError,
};
pub use info::RequestAuthInfo;
pub use spaces::{
    AuthScheme, ProvisionSet, SECPROV_CLIENT_AUTH, SECPROV_CLIENT_ENCRYPTED_SECRET, Space,
    SpaceMap,
};
pub use tokens::TokenMap;
