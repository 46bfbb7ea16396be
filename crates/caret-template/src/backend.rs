/*
 * backend.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Contracts with the compilation backend that turns generated source
//! into loadable units.

use thiserror::Error;

/// A compilation failure, reported as the backend produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to compile {unit}: {message}")]
pub struct CompileError {
    pub unit: String,
    pub message: String,
}

impl CompileError {
    pub fn new(unit: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            message: message.into(),
        }
    }
}

/// Answers whether a compiled unit exists.
///
/// Consulted by `@__exitIfNoClass__` while parsing.
pub trait UnitLookup: Send + Sync {
    fn has_unit(&self, name: &str) -> bool;
}

/// Compiles generated source into an opaque unit.
pub trait CompileBackend: UnitLookup {
    fn compile(&self, unit_name: &str, source: &str) -> Result<Vec<u8>, CompileError>;
}

/// Post-compile, pre-cache rewriting of a unit's bytes.
pub trait ByteCodeEnhancer: Send + Sync {
    /// Replacement bytes, or an empty vector for "no enhancement".
    fn enhance(&self, unit_name: &str, bytes: &[u8]) -> Result<Vec<u8>, CompileError>;
}

/// The default enhancer. Never changes anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEnhancement;

impl ByteCodeEnhancer for NoEnhancement {
    fn enhance(&self, _unit_name: &str, _bytes: &[u8]) -> Result<Vec<u8>, CompileError> {
        Ok(Vec::new())
    }
}
