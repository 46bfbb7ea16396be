/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Sandbox execution boundary for caret template renders.
//!
//! A render that runs in sandbox mode tracks a LIFO stack of zones. Each
//! zone is either *restricted* (user template code) or *safe* (trusted
//! runtime helpers called from template code). Guarded operations consult
//! [`SandboxContext::is_restricted`] before doing anything sensitive.
//!
//! Every zone transition, and the process-wide switch that turns
//! sandboxing off, goes through a [`SecurityManager`]. A failed check
//! aborts the whole render: callers never get a partial result back.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use caret_sandbox::{CodeSecurityManager, Sandbox};
//!
//! let sandbox = Sandbox::new(Arc::new(CodeSecurityManager::new("s3cret")));
//! let restricted = sandbox
//!     .render(|ctx| {
//!         ctx.enter_restricted_zone("s3cret")?;
//!         let inside = ctx.is_restricted();
//!         ctx.leave_current_zone("s3cret")?;
//!         Ok(inside)
//!     })
//!     .unwrap();
//! assert!(restricted);
//! ```

pub mod error;
pub mod sandbox;
pub mod security;
pub mod zone;

pub use error::{SandboxError, SandboxResult};
pub use sandbox::{Sandbox, find_restricted};
pub use security::{CodeSecurityManager, PermitAll, SecurityManager};
pub use zone::SandboxContext;
