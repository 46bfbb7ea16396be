/*
 * security.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Authorization checks consulted by the sandbox.

use crate::error::{SandboxError, SandboxResult};

/// Authorization collaborator for the sandbox.
///
/// Called on every zone transition while a sandboxed render is active
/// and on the global sandbox-off switch.
pub trait SecurityManager: Send + Sync + std::fmt::Debug {
    /// Check `code`; return [`SandboxError::Forbidden`] to abort the caller.
    fn authorize(&self, code: &str) -> SandboxResult<()>;
}

/// Authorizes callers that present a shared secret code.
#[derive(Debug, Clone)]
pub struct CodeSecurityManager {
    code: String,
}

impl CodeSecurityManager {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

impl SecurityManager for CodeSecurityManager {
    fn authorize(&self, code: &str) -> SandboxResult<()> {
        if code == self.code {
            Ok(())
        } else {
            tracing::warn!("sandbox authorization rejected");
            Err(SandboxError::Forbidden)
        }
    }
}

/// Accepts every code. For trusted embeddings and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermitAll;

impl SecurityManager for PermitAll {
    fn authorize(&self, _code: &str) -> SandboxResult<()> {
        Ok(())
    }
}
