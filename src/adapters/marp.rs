//! Slide formatter converting finished Marp markdown to HTML.
//!
//! Spawns the `marp` CLI against the persisted markdown file. Treated as an
//! external collaborator: slow or failing conversions surface as
//! [`PipelineError::Format`] and never crash the process.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::error::PipelineError;

/// Trait for delivery-format converters
#[async_trait]
pub trait SlideFormatter: Send + Sync {
    /// Convert the named markdown file inside `directory` to HTML,
    /// returning the HTML file's path.
    async fn to_html(&self, directory: &Path, markdown_file: &str)
        -> Result<PathBuf, PipelineError>;
}

/// Formatter using the Marp CLI
pub struct MarpCli {
    binary_path: String,
    timeout: Duration,
}

impl Default for MarpCli {
    fn default() -> Self {
        Self::new("marp", Duration::from_secs(120))
    }
}

impl MarpCli {
    pub fn new(binary_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary_path: binary_path.into(),
            timeout,
        }
    }

    /// Check that the marp binary is available
    pub async fn health_check(&self) -> Result<(), PipelineError> {
        let output = Command::new(&self.binary_path)
            .arg("--version")
            .output()
            .await
            .map_err(|e| {
                PipelineError::Format(format!(
                    "failed to run '{} --version': {e}",
                    self.binary_path
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Format(format!(
                "marp health check failed: {}",
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SlideFormatter for MarpCli {
    async fn to_html(
        &self,
        directory: &Path,
        markdown_file: &str,
    ) -> Result<PathBuf, PipelineError> {
        let markdown_path = directory.join(markdown_file);
        let html_path = markdown_path.with_extension("html");

        let output = timeout(
            self.timeout,
            Command::new(&self.binary_path)
                .arg(&markdown_path)
                .arg("-o")
                .arg(&html_path)
                .arg("--allow-local-files")
                .output(),
        )
        .await
        .map_err(|_| PipelineError::Format(format!("marp timed out after {:?}", self.timeout)))?
        .map_err(|e| PipelineError::Format(format!("failed to spawn '{}': {e}", self.binary_path)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            return Err(PipelineError::Format(format!(
                "marp exited with code {exit_code}: {}",
                stderr.trim()
            )));
        }

        Ok(html_path)
    }
}
