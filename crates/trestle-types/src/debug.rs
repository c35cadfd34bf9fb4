//! Debug flags controlling how much detail exception responses expose.

use std::fmt;
use std::ops::{BitAnd, BitOr};

use serde::{Deserialize, Serialize};

/// Which facets of a raised error a response may reveal to the client.
///
/// Each flag's value includes the bits of the flags it implies, so enabling
/// tracebacks also enables the name, message, and instance info.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DebugFlags(pub u32);

/// Reveal the error's name and displayname.
pub const DEBUG_EXC_NAME: DebugFlags = DebugFlags(1);

/// Reveal the error message (implies the name).
pub const DEBUG_EXC_MESSAGE: DebugFlags = DebugFlags(3);

/// Reveal the defining module and construction args (implies the message).
pub const DEBUG_EXC_INSTANCE_INFO: DebugFlags = DebugFlags(7);

/// Reveal a captured traceback (implies instance info).
pub const DEBUG_EXC_TRACEBACK: DebugFlags = DebugFlags(15);

/// Tracebacks may include frames from the service framework itself.
pub const DEBUG_EXC_TRACEBACK_INCLUDING_SERVICE_CODE: DebugFlags = DebugFlags(31);

/// Tracebacks may include frames from resource implementations.
pub const DEBUG_EXC_TRACEBACK_INCLUDING_RESOURCE_CODE: DebugFlags = DebugFlags(47);

/// Production preset: names and messages only.
pub const DEBUG_SECURE: DebugFlags = DebugFlags(3);

/// Development default: instance info plus filtered tracebacks.
pub const DEBUG_DEFAULT: DebugFlags = DebugFlags(15);

/// Everything, including service and resource frames.
pub const DEBUG_FULL: DebugFlags = DebugFlags(63);

impl DebugFlags {
    /// Reveal nothing.
    pub const NONE: DebugFlags = DebugFlags(0);

    /// Whether every bit of `other` is set in `self`.
    pub fn contains(self, other: DebugFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl Default for DebugFlags {
    fn default() -> Self {
        DEBUG_DEFAULT
    }
}

impl BitOr for DebugFlags {
    type Output = DebugFlags;

    fn bitor(self, rhs: DebugFlags) -> DebugFlags {
        DebugFlags(self.0 | rhs.0)
    }
}

impl BitAnd for DebugFlags {
    type Output = DebugFlags;

    fn bitand(self, rhs: DebugFlags) -> DebugFlags {
        DebugFlags(self.0 & rhs.0)
    }
}

impl fmt::Display for DebugFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
