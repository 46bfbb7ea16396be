/*
 * common/mod.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Helpers shared by the caret-template integration tests.
 */

#![allow(dead_code)]

use std::sync::Arc;

use caret_template::tokenizer::run_pass;
use caret_template::{
    Dialect, Engine, EngineConfig, ExtensionRegistry, GenerateOptions, Generated, ParseContext,
    ParseEnv, ParseSignal, TemplateError, Token,
};

/// Run one parse pass and return the build sequence.
pub fn tokens_with(
    source: &str,
    config: &EngineConfig,
    dialect: Dialect,
) -> Result<Vec<Token>, ParseSignal> {
    let extensions = ExtensionRegistry::new().unwrap();
    let env = ParseEnv {
        config,
        extensions: &extensions,
        units: None,
    };
    let mut ctx = ParseContext::new(
        "test.html",
        source,
        "caret_test_html",
        Arc::new(dialect),
        env,
    );
    run_pass(&mut ctx)?;
    Ok(ctx.into_builder().tokens().to_vec())
}

/// Concatenated literal text of a build sequence.
pub fn text(tokens: &[Token]) -> String {
    tokens
        .iter()
        .filter_map(|t| match t {
            Token::Literal(l) => Some(l.text.as_str()),
            _ => None,
        })
        .collect()
}

/// Literal output of `source` under the full `@` dialect.
pub fn output(source: &str) -> String {
    output_with(source, &EngineConfig::default())
}

pub fn output_with(source: &str, config: &EngineConfig) -> String {
    text(&tokens_with(source, config, Dialect::rythm().unwrap()).unwrap())
}

pub fn engine() -> Engine {
    Engine::builder().build().unwrap()
}

pub fn try_generate(source: &str) -> Result<Generated, TemplateError> {
    engine()
        .generate("test.html", source, &GenerateOptions::default())
        .map(|outcome| outcome.into_generated().unwrap())
}

pub fn generate(source: &str) -> Generated {
    try_generate(source).unwrap()
}

/// Statements inside `build()`, without indentation or line markers.
pub fn body(generated: &str) -> Vec<String> {
    let open = "protected void build() {\n";
    let start = generated.find(open).unwrap() + open.len();
    let end = generated.rfind("\n    }\n}").unwrap();
    generated
        .get(start..end)
        .unwrap_or("")
        .lines()
        .map(|line| {
            let line = line.trim_start();
            match line.rfind(" //line: ") {
                Some(i) => line[..i].to_string(),
                None => line.to_string(),
            }
        })
        .collect()
}

/// Shorthand: body of the class generated from `source`.
pub fn statements(source: &str) -> Vec<String> {
    body(&generate(source).source)
}
