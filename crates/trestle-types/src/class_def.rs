//! Class definition metadata backing the wire `type` tags.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifies a type on the wire as `"{module}:{name}"`.
///
/// The module part is a Rust module path, so the prim form is parsed by
/// splitting on the last `:`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDefInfo {
    pub module: String,
    pub name: String,
}

impl ClassDefInfo {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }

    /// The wire form, `"{module}:{name}"`.
    pub fn prim(&self) -> String {
        format!("{}:{}", self.module, self.name)
    }

    /// Parse the wire form. Returns `None` when either part is empty or the
    /// separator is missing.
    pub fn from_prim(prim: &str) -> Option<Self> {
        let idx = prim.rfind(':')?;
        let (module, name) = (&prim[..idx], &prim[idx + 1..]);
        if module.is_empty() || module.ends_with(':') || name.is_empty() {
            return None;
        }
        Some(Self::new(module, name))
    }
}

impl fmt::Display for ClassDefInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.name)
    }
}

/// Snapshot of a raised error, as exception responses report it.
#[derive(Debug, Clone)]
pub struct ExceptionInfo {
    /// Where the error type is defined.
    pub class_def: ClassDefInfo,
    /// Lowercase human-readable name of the error type.
    pub displayname: String,
    /// The rendered error message.
    pub message: String,
    /// The error's construction arguments, as JSON values.
    pub args: Vec<Value>,
    /// Captured backtrace text, when one exists.
    pub traceback: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prim_roundtrip_with_rust_module_path() {
        let info = ClassDefInfo::new("trestle_core::response", "ReturnResponse");
        assert_eq!(info.prim(), "trestle_core::response:ReturnResponse");
        assert_eq!(ClassDefInfo::from_prim(&info.prim()).unwrap(), info);
    }

    #[test]
    fn test_from_prim_rejects_malformed() {
        assert!(ClassDefInfo::from_prim("noseparator").is_none());
        assert!(ClassDefInfo::from_prim(":Name").is_none());
        assert!(ClassDefInfo::from_prim("module:").is_none());
        assert!(ClassDefInfo::from_prim("module::").is_none());
    }

    #[test]
    fn test_display_is_prim() {
        let info = ClassDefInfo::new("a::b", "C");
        assert_eq!(info.to_string(), "a::b:C");
    }
}
