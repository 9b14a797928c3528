#![cfg_attr(not(test), forbid(unsafe_code))]
#![deny(warnings, clippy::pedantic)]
#![allow(clippy::multiple_crate_versions)]

//! Main entry point for the `PromptDesk` server CLI.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use shared::config::server::Config;

/// Main CLI structure for the `PromptDesk` server
#[derive(Parser)]
#[command(name = "PromptDesk CLI")]
#[command(about = "Chat backend for PromptDesk assistants", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for the `PromptDesk` CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind, overriding the file and environment
        #[arg(long, short)]
        port: Option<u16>,

        /// Path to a yaml, json or toml configuration file
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
    /// Print the OpenAPI document as JSON
    Openapi,
}

async fn handle_serve_command(port: Option<u16>, config: Option<PathBuf>) -> anyhow::Result<()> {
    let resolved = Config::load_config(config, port).context("failed to load configuration")?;
    server::server::run(resolved).await
}

fn handle_openapi_command() -> anyhow::Result<()> {
    use utoipa::OpenApi;

    let document = server::openapi::ApiDoc::openapi()
        .to_pretty_json()
        .context("failed to render the OpenAPI document")?;
    println!("{document}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, config } => handle_serve_command(port, config).await,
        Commands::Openapi => handle_openapi_command(),
    }
}
