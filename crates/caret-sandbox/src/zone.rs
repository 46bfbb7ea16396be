/*
 * zone.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Per-render zone stack.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{SandboxError, SandboxResult};
use crate::security::SecurityManager;

/// Sandbox state for one render call chain.
///
/// The context is passed down explicitly instead of living in a
/// thread-local. A helper thread spawned by a render gets its own
/// context from [`SandboxContext::inherit`].
///
/// Zone transitions are no-ops unless sandbox mode is on and the owning
/// [`Sandbox`](crate::Sandbox) is still live.
#[derive(Debug, Clone)]
pub struct SandboxContext {
    live: Arc<AtomicBool>,
    security: Arc<dyn SecurityManager>,
    mode: bool,
    /// true = restricted, false = safe
    zones: Vec<bool>,
}

impl SandboxContext {
    pub(crate) fn new(live: Arc<AtomicBool>, security: Arc<dyn SecurityManager>, mode: bool) -> Self {
        Self {
            live,
            security,
            mode,
            zones: Vec::new(),
        }
    }

    /// Whether this call chain runs in sandbox mode.
    pub fn sandbox_mode(&self) -> bool {
        self.mode
    }

    pub(crate) fn set_sandbox_mode(&mut self, mode: bool) {
        self.mode = mode;
    }

    fn active(&self) -> bool {
        self.mode && self.live.load(Ordering::SeqCst)
    }

    /// Push a restricted zone.
    pub fn enter_restricted_zone(&mut self, code: &str) -> SandboxResult<()> {
        self.enter(code, true)
    }

    /// Push a safe zone.
    pub fn enter_safe_zone(&mut self, code: &str) -> SandboxResult<()> {
        self.enter(code, false)
    }

    fn enter(&mut self, code: &str, restricted: bool) -> SandboxResult<()> {
        if !self.active() {
            return Ok(());
        }
        self.security.authorize(code)?;
        self.zones.push(restricted);
        Ok(())
    }

    /// Pop the current zone.
    ///
    /// Popping an empty stack is an internal contract violation and is
    /// always fatal.
    pub fn leave_current_zone(&mut self, code: &str) -> SandboxResult<()> {
        if !self.active() {
            return Ok(());
        }
        self.security.authorize(code)?;
        match self.zones.pop() {
            Some(_) => Ok(()),
            None => {
                tracing::error!("attempted to leave a sandbox zone with an empty zone stack");
                Err(SandboxError::EmptyZoneStack)
            }
        }
    }

    /// True when the innermost zone is restricted.
    ///
    /// Always false when sandbox mode is off, when sandboxing was turned
    /// off globally, or when no zone has been entered.
    pub fn is_restricted(&self) -> bool {
        if !self.active() {
            return false;
        }
        self.zones.last().copied().unwrap_or(false)
    }

    /// Number of zones currently open.
    pub fn zone_depth(&self) -> usize {
        self.zones.len()
    }

    /// Context for a helper thread spawned from this render.
    ///
    /// Sandbox mode carries over; the zone stack starts empty.
    pub fn inherit(&self) -> SandboxContext {
        SandboxContext::new(self.live.clone(), self.security.clone(), self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::{CodeSecurityManager, PermitAll};

    fn context(mode: bool) -> SandboxContext {
        SandboxContext::new(
            Arc::new(AtomicBool::new(true)),
            Arc::new(CodeSecurityManager::new("code")),
            mode,
        )
    }

    #[test]
    fn test_mode_off_is_never_restricted() {
        let mut ctx = context(false);
        ctx.enter_restricted_zone("code").unwrap();
        assert!(!ctx.is_restricted());
        // transitions are no-ops outside sandbox mode
        assert_eq!(ctx.zone_depth(), 0);
    }

    #[test]
    fn test_empty_stack_is_not_restricted() {
        let ctx = context(true);
        assert!(!ctx.is_restricted());
    }

    #[test]
    fn test_push_then_pop_restores_previous_zone() {
        let mut ctx = context(true);
        ctx.enter_restricted_zone("code").unwrap();
        assert!(ctx.is_restricted());

        ctx.enter_safe_zone("code").unwrap();
        assert!(!ctx.is_restricted());

        ctx.leave_current_zone("code").unwrap();
        assert!(ctx.is_restricted());

        ctx.leave_current_zone("code").unwrap();
        assert!(!ctx.is_restricted());
        assert_eq!(ctx.zone_depth(), 0);
    }

    #[test]
    fn test_leave_empty_stack_is_fatal() {
        let mut ctx = context(true);
        let err = ctx.leave_current_zone("code").unwrap_err();
        assert_eq!(err, SandboxError::EmptyZoneStack);
        assert!(err.is_internal());
    }

    #[test]
    fn test_wrong_code_is_rejected() {
        let mut ctx = context(true);
        assert_eq!(
            ctx.enter_restricted_zone("nope"),
            Err(SandboxError::Forbidden)
        );
        assert_eq!(ctx.zone_depth(), 0);

        ctx.enter_safe_zone("code").unwrap();
        assert_eq!(ctx.leave_current_zone("nope"), Err(SandboxError::Forbidden));
        assert_eq!(ctx.zone_depth(), 1);
    }

    #[test]
    fn test_not_live_disables_zones() {
        let live = Arc::new(AtomicBool::new(true));
        let mut ctx = SandboxContext::new(live.clone(), Arc::new(PermitAll), true);
        ctx.enter_restricted_zone("").unwrap();
        assert!(ctx.is_restricted());

        live.store(false, Ordering::SeqCst);
        assert!(!ctx.is_restricted());
        // leaving is a no-op now, even though a zone is still recorded
        ctx.leave_current_zone("").unwrap();
        assert_eq!(ctx.zone_depth(), 1);
    }

    #[test]
    fn test_inherit_keeps_mode_and_starts_fresh() {
        let mut ctx = context(true);
        ctx.enter_restricted_zone("code").unwrap();

        let child = ctx.inherit();
        assert!(child.sandbox_mode());
        assert_eq!(child.zone_depth(), 0);
        assert!(!child.is_restricted());
    }
}
