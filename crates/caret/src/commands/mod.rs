//! Command implementations for the caret CLI
//!
//! Each command handles its arguments and delegates to caret-template.

pub mod compile;
pub mod dialects;
