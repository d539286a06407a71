//! Core pipeline engine.
//!
//! This module contains:
//! - CheckpointStore: atomic file-backed stage artifacts
//! - fanout: bounded-concurrency map with index-aligned results
//! - Pipeline/Stage: declared bindings and construction-time validation
//! - Orchestrator: sequential stage execution with checkpoint skip/resume
//! - expand: directive-block expansion with per-block failure isolation

pub mod checkpoint;
pub mod error;
pub mod expand;
pub mod fanout;
pub mod orchestrator;
pub mod pipeline;
pub mod stages;

// Re-export commonly used types
pub use checkpoint::CheckpointStore;
pub use error::PipelineError;
pub use expand::{expand_deck, RenderWarning};
pub use orchestrator::{Orchestrator, RunReport, RunState, StageStatus};
pub use pipeline::{BindingValue, Bindings, Pipeline, Stage, StageOutcome};
pub use stages::deck_pipeline;
