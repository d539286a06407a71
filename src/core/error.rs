//! Error taxonomy for the pipeline core.
//!
//! Stage-level failures abort the run; diagram render failures are recorded
//! as warnings on a still-completed run (see [`crate::core::expand`]).

use thiserror::Error;

/// Errors produced by the pipeline core and its collaborators
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bad run input or application configuration. Fatal before any stage runs.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// A completion call failed or returned undecodable output. Fatal to its stage.
    #[error("generation failed: {0}")]
    Generation(String),

    /// Wraps the first failing fan-out worker. Fatal to the enclosing stage.
    #[error("fan-out worker failed: {0}")]
    FanOut(#[source] Box<PipelineError>),

    /// Checkpoint or file I/O failure. Fatal.
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// One directive block's external render failed. Recorded, non-fatal:
    /// the block is left as literal source.
    #[error("diagram render failed: {0}")]
    Render(String),

    /// Conversion of the finished deck to its delivery format failed.
    #[error("format conversion failed: {0}")]
    Format(String),

    /// Replace-by-identity with no matching slide. Programming error.
    #[error("no slide with number {0}")]
    SlideNotFound(u32),

    /// A stage declared an input no earlier stage binds. Programming error,
    /// caught at pipeline construction.
    #[error("no binding named '{0}' is available")]
    MissingBinding(String),
}
