/*
 * sandbox.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The sandbox switch and sandboxed render entry point.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{SandboxError, SandboxResult};
use crate::security::SecurityManager;
use crate::zone::SandboxContext;

/// Process-wide sandbox switch plus the security manager it reports to.
///
/// Cloning a `Sandbox` shares the switch: turning one clone off turns
/// every clone off, including contexts already handed to running renders.
#[derive(Debug, Clone)]
pub struct Sandbox {
    live: Arc<AtomicBool>,
    security: Arc<dyn SecurityManager>,
}

impl Sandbox {
    pub fn new(security: Arc<dyn SecurityManager>) -> Self {
        Self {
            live: Arc::new(AtomicBool::new(true)),
            security,
        }
    }

    /// Whether sandboxing is still switched on.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Switch sandboxing off for the whole process.
    ///
    /// Requires authorization. Calling it again once off is a no-op.
    pub fn turn_off(&self, code: &str) -> SandboxResult<()> {
        if !self.is_live() {
            return Ok(());
        }
        self.security.authorize(code)?;
        self.live.store(false, Ordering::SeqCst);
        tracing::info!("sandbox turned off");
        Ok(())
    }

    /// A context with sandbox mode off, for renders outside the sandbox.
    pub fn context(&self) -> SandboxContext {
        SandboxContext::new(self.live.clone(), self.security.clone(), false)
    }

    /// Run `render` with sandbox mode on.
    ///
    /// Any error from `render` is returned as is and the partial result
    /// is dropped. A render that returns with zones still open fails with
    /// [`SandboxError::UnbalancedZones`].
    pub fn render<T, F>(&self, render: F) -> SandboxResult<T>
    where
        F: FnOnce(&mut SandboxContext) -> SandboxResult<T>,
    {
        let mut ctx = self.context();
        ctx.set_sandbox_mode(true);
        let output = render(&mut ctx)?;
        if ctx.zone_depth() > 0 {
            return Err(SandboxError::UnbalancedZones {
                depth: ctx.zone_depth(),
            });
        }
        Ok(output)
    }
}

/// Find the first entry of `names` that `code` references.
///
/// A reference is an occurrence not preceded by an identifier character,
/// so `MySystem.exit` does not match `System.exit`. Names are checked in
/// the order given.
pub fn find_restricted<'a>(code: &str, names: &'a [String]) -> Option<&'a str> {
    names
        .iter()
        .find(|name| !name.is_empty() && references(code, name))
        .map(|name| name.as_str())
}

fn references(code: &str, name: &str) -> bool {
    code.match_indices(name).any(|(start, _)| {
        code[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !(c.is_alphanumeric() || c == '_' || c == '$'))
    })
}
