/*
 * dialects.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! `caret dialects`: list the built-in dialects in negotiation order.

use anyhow::{Context, Result};

use caret_template::{DialectFeature, DialectRegistry};

const FEATURES: [(DialectFeature, &str); 4] = [
    (DialectFeature::Scripting, "scripting"),
    (DialectFeature::FreeLoop, "free-loop"),
    (DialectFeature::ComplexExpression, "complex-expression"),
    (DialectFeature::TypeDeclaration, "type-declaration"),
];

pub fn execute() -> Result<()> {
    let registry = DialectRegistry::with_builtin().context("Failed to build the built-in dialects")?;
    for id in registry.ids() {
        let Some(dialect) = registry.get(id) else {
            continue;
        };
        let allowed: Vec<&str> = FEATURES
            .iter()
            .filter(|(feature, _)| dialect.allows(*feature))
            .map(|(_, name)| *name)
            .collect();
        let allowed = if allowed.is_empty() {
            "none".to_string()
        } else {
            allowed.join(", ")
        };
        println!("{id}\tmarker '{}'\tfeatures: {allowed}", dialect.marker());
    }
    Ok(())
}
