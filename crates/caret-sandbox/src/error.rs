/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for the sandbox boundary.

use thiserror::Error;

/// Errors raised by the sandbox boundary.
///
/// None of these are retried. [`SandboxError::is_internal`] separates
/// contract violations inside the runtime from violations caused by the
/// template being rendered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SandboxError {
    /// The security manager rejected the authorization code.
    #[error("Security violation: sandbox authorization failed")]
    Forbidden,

    /// Generated code references a name the sandbox does not allow.
    #[error("Security violation: access to restricted name `{name}`")]
    RestrictedAccess { name: String },

    /// `leave_current_zone` was called with no zone on the stack.
    #[error("Internal error: sandbox zone stack is empty")]
    EmptyZoneStack,

    /// A sandboxed render returned while zones were still open.
    #[error("Internal error: {depth} sandbox zone(s) still open at the end of the render")]
    UnbalancedZones { depth: usize },
}

impl SandboxError {
    /// True for runtime contract violations, false for user-facing violations.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            SandboxError::EmptyZoneStack | SandboxError::UnbalancedZones { .. }
        )
    }
}

/// Result type for sandbox operations.
pub type SandboxResult<T> = Result<T, SandboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_errors_are_distinct() {
        assert!(SandboxError::EmptyZoneStack.is_internal());
        assert!(SandboxError::UnbalancedZones { depth: 2 }.is_internal());
        assert!(!SandboxError::Forbidden.is_internal());
        assert!(
            !SandboxError::RestrictedAccess {
                name: "System.exit".to_string()
            }
            .is_internal()
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            SandboxError::UnbalancedZones { depth: 1 }.to_string(),
            "Internal error: 1 sandbox zone(s) still open at the end of the render"
        );
        assert_eq!(
            SandboxError::RestrictedAccess {
                name: "Runtime".to_string()
            }
            .to_string(),
            "Security violation: access to restricted name `Runtime`"
        );
    }
}
