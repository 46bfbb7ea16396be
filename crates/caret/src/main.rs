/*
 * main.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Caret CLI - Main entry point

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "caret")]
#[command(version)]
#[command(about = "Compile directive templates to generated source", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the source for one template
    Compile {
        /// Template file
        file: PathBuf,

        /// Parse with this dialect only (no negotiation)
        #[arg(short = 'd', long)]
        dialect: Option<String>,

        /// Engine configuration (TOML)
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,

        /// Write output to FILE instead of stdout
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// List the registered dialects
    Dialects,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "caret=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            file,
            dialect,
            config,
            output,
        } => commands::compile::execute(commands::compile::CompileArgs {
            file,
            dialect,
            config,
            output,
        }),
        Commands::Dialects => commands::dialects::execute(),
    }
}
