//! deckforge - staged slide-deck generation pipeline
//!
//! Builds a Marp slide deck through a fixed sequence of generative stages:
//! plan research topics, fan research out under a concurrency bound,
//! synthesize the deck, expand embedded Graphviz directive blocks into
//! rendered diagrams, optionally illustrate slides, and convert to HTML.
//!
//! # Architecture
//!
//! The system is built around checkpointed stages:
//! - Each checkpoint-bearing stage persists its output next to the deck
//! - A stage whose checkpoint already exists is skipped on the next run
//! - Fan-out stages run work items concurrently under a configured bound
//!
//! # Modules
//!
//! - `adapters`: External collaborators (completion backend, dot, marp)
//! - `core`: Pipeline engine (checkpoints, fan-out, orchestrator, expansion)
//! - `domain`: Data structures (DeckRequest, SlideDeck, Topic, Report)
//! - `config`: Explicitly threaded application configuration
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Build a deck from a YAML request
//! deckforge build inputs/platform-talk.yml
//!
//! # Drop checkpoints to force full regeneration
//! deckforge clean inputs/platform-talk.yml
//!
//! # Check that external tools are available
//! deckforge doctor
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use crate::core::{
    CheckpointStore, Orchestrator, Pipeline, PipelineError, RunReport, RunState,
};
pub use config::DeckConfig;
pub use domain::{DeckRequest, ReferenceSpec, SlideDeck};
