//! Collaborator interfaces for external systems.
//!
//! The pipeline core treats generation, diagram rendering, and slide
//! formatting as black boxes behind narrow traits. The implementations here
//! talk to an OpenAI-compatible HTTP endpoint and to the `dot` and `marp`
//! command-line tools.

pub mod completion;
pub mod dot;
pub mod marp;

// Re-export the collaborator traits and default implementations
pub use completion::{CompletionClient, CompletionRequest, HttpCompletionClient, RetryPolicy};
pub use dot::{DotCli, DotRenderer};
pub use marp::{MarpCli, SlideFormatter};
