//! Command-line interface for deckforge.
//!
//! Provides commands for building a deck from a YAML request, clearing a
//! request's checkpoints, and checking that the external tools are
//! available.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::{DotCli, HttpCompletionClient, MarpCli};
use crate::config::DeckConfig;
use crate::core::{deck_pipeline, CheckpointStore, Orchestrator, RunState};
use crate::domain::DeckRequest;

/// deckforge - staged slide-deck generation pipeline
#[derive(Parser, Debug)]
#[command(name = "deckforge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a deck from a YAML request
    Build {
        /// Path to the request YAML
        request: PathBuf,

        /// Path to the application config (defaults apply if omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Remove a request's checkpoints so the next build starts fresh
    Clean {
        /// Path to the request YAML
        request: PathBuf,
    },

    /// Check that the configured external tools are available
    Doctor {
        /// Path to the application config (defaults apply if omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Build { request, config } => build_deck(&request, config.as_deref()).await,
            Commands::Clean { request } => clean_checkpoints(&request).await,
            Commands::Doctor { config } => doctor(config.as_deref()).await,
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<DeckConfig> {
    match path {
        Some(path) => DeckConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display())),
        None => Ok(DeckConfig::default()),
    }
}

fn load_request(path: &std::path::Path) -> Result<DeckRequest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file: {}", path.display()))?;
    DeckRequest::from_yaml(&content)
        .with_context(|| format!("Failed to parse request: {}", path.display()))
}

/// Build a deck end to end
async fn build_deck(request_path: &std::path::Path, config_path: Option<&std::path::Path>) -> Result<()> {
    let config = Arc::new(load_config(config_path)?);
    let request = Arc::new(load_request(request_path)?);

    let tool_timeout = Duration::from_secs(config.tools.tool_timeout_seconds);
    let completion = Arc::new(HttpCompletionClient::from_config(&config.completion));
    let renderer = Arc::new(DotCli::new(&config.tools.dot_binary, tool_timeout));
    let formatter = Arc::new(MarpCli::new(&config.tools.marp_binary, tool_timeout));

    let store = CheckpointStore::new(&request.output_directory);
    let pipeline = deck_pipeline(
        Arc::clone(&request),
        Arc::clone(&config),
        completion,
        renderer,
        formatter,
        store.clone(),
    )?;

    let orchestrator = Orchestrator::new(store);
    let report = orchestrator.run(&pipeline).await;

    println!("Run {}", report.id);
    for record in &report.stages {
        let duration = record
            .duration_ms
            .map(|ms| format!(" ({ms}ms)"))
            .unwrap_or_default();
        println!("  {:<12} {:?}{duration}", record.name, record.status);
    }

    if !report.warnings.is_empty() {
        eprintln!("\nUnexpanded diagram blocks:");
        for warning in &report.warnings {
            eprintln!(
                "  slide {}, block {}: {}",
                warning.slide, warning.block, warning.message
            );
        }
    }

    match &report.state {
        RunState::Completed => {
            if let Some(artifact) = &report.artifact {
                println!("\nDeck created at {}", artifact.display());
            }
            Ok(())
        }
        RunState::Failed { stage, error } => {
            eprintln!("\n[Run failed in stage '{stage}': {error}]");
            std::process::exit(1);
        }
        RunState::Running => {
            // Unreachable: run() always finishes with a terminal state
            anyhow::bail!("run ended in non-terminal state");
        }
    }
}

/// Remove the interim checkpoints for a request
async fn clean_checkpoints(request_path: &std::path::Path) -> Result<()> {
    let request = load_request(request_path)?;
    let store = CheckpointStore::new(&request.output_directory);

    for name in [request.raw_output_file(), request.with_diagrams_output_file()] {
        if store.remove(&name).await? {
            println!("Removed {name}");
        }
    }
    Ok(())
}

/// Check the external tool collaborators
async fn doctor(config_path: Option<&std::path::Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let tool_timeout = Duration::from_secs(config.tools.tool_timeout_seconds);

    let mut healthy = true;

    match DotCli::new(&config.tools.dot_binary, tool_timeout).health_check().await {
        Ok(()) => println!("dot: ok ({})", config.tools.dot_binary),
        Err(e) => {
            healthy = false;
            println!("dot: UNAVAILABLE ({e})");
        }
    }

    match MarpCli::new(&config.tools.marp_binary, tool_timeout).health_check().await {
        Ok(()) => println!("marp: ok ({})", config.tools.marp_binary),
        Err(e) => {
            healthy = false;
            println!("marp: UNAVAILABLE ({e})");
        }
    }

    if std::env::var(&config.completion.api_key_env).is_ok() {
        println!("completion: api key present ({})", config.completion.api_key_env);
    } else {
        println!(
            "completion: {} not set (required unless the endpoint is unauthenticated)",
            config.completion.api_key_env
        );
    }

    if !healthy {
        std::process::exit(1);
    }
    Ok(())
}
