/*
 * compile.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Compile command implementation
 */

//! `caret compile`: parse one template and emit its generated source.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use caret_template::{BuildOutcome, Engine, EngineConfig, GenerateOptions, TemplateError};

/// Arguments for the compile command
#[derive(Debug)]
pub struct CompileArgs {
    pub file: PathBuf,
    pub dialect: Option<String>,
    pub config: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

pub fn execute(args: CompileArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => EngineConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load engine configuration {}", path.display()))?,
        None => EngineConfig::default(),
    };
    debug!(?config, "engine configuration");
    let engine = Engine::builder()
        .config(config)
        .build()
        .context("Failed to configure the template engine")?;

    let source = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read template {}", args.file.display()))?;
    let template_id = args
        .file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.file.display().to_string());
    let options = GenerateOptions {
        dialect: args.dialect.clone(),
        ..GenerateOptions::default()
    };

    let generated = match engine.generate(&template_id, &source, &options) {
        Ok(BuildOutcome::Generated(generated)) => generated,
        Ok(BuildOutcome::Skipped) => {
            info!(%template_id, "template exited early, nothing generated");
            return Ok(());
        }
        Err(TemplateError::Parse(err)) => {
            eprint!("{}", err.render(&source));
            bail!("Failed to parse {}", args.file.display());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to compile {}", args.file.display()));
        }
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, &generated.source)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(
                class = %generated.class_name,
                dialect = %generated.dialect,
                output = %path.display(),
                "wrote generated source"
            );
        }
        None => print!("{}", generated.source),
    }
    Ok(())
}
