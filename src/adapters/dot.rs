//! Graphviz renderer for digraph directive blocks.
//!
//! Spawns the `dot` CLI per block, piping the graph source to stdin and
//! writing a PNG into the run's output directory. Output file names are a
//! content hash of the source, so re-rendering the same graph is idempotent.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::error::PipelineError;

/// Trait for diagram renderers
#[async_trait]
pub trait DotRenderer: Send + Sync {
    /// Render graph source into an image file under `output_dir`,
    /// returning the rendered file's path.
    async fn render(&self, source: &str, output_dir: &Path) -> Result<PathBuf, PipelineError>;
}

/// Renderer using the Graphviz `dot` CLI
pub struct DotCli {
    binary_path: String,
    timeout: Duration,
}

impl Default for DotCli {
    fn default() -> Self {
        Self::new("dot", Duration::from_secs(60))
    }
}

impl DotCli {
    pub fn new(binary_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary_path: binary_path.into(),
            timeout,
        }
    }

    /// Check that the dot binary is available
    pub async fn health_check(&self) -> Result<(), PipelineError> {
        let output = Command::new(&self.binary_path)
            .arg("-V")
            .output()
            .await
            .map_err(|e| {
                PipelineError::Render(format!("failed to run '{} -V': {e}", self.binary_path))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Render(format!(
                "dot health check failed: {}",
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DotRenderer for DotCli {
    async fn render(&self, source: &str, output_dir: &Path) -> Result<PathBuf, PipelineError> {
        let target = output_dir.join(format!("diagram-{}.png", content_hash(source)));

        let mut child = Command::new(&self.binary_path)
            .arg("-Tpng")
            .arg("-o")
            .arg(&target)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                PipelineError::Render(format!("failed to spawn '{}': {e}", self.binary_path))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(source.as_bytes())
                .await
                .map_err(|e| PipelineError::Render(format!("failed to write dot stdin: {e}")))?;
            // Drop stdin to signal EOF
        }

        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                PipelineError::Render(format!("dot timed out after {:?}", self.timeout))
            })?
            .map_err(|e| PipelineError::Render(format!("failed to wait for dot: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            return Err(PipelineError::Render(format!(
                "dot exited with code {exit_code}: {}",
                stderr.trim()
            )));
        }

        Ok(target)
    }
}

/// First 16 hex chars of the SHA-256 of the source
pub fn content_hash(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    let digest = hasher.finalize();
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_stable() {
        let a = content_hash("digraph { a -> b }");
        let b = content_hash("digraph { a -> b }");
        let c = content_hash("digraph { b -> a }");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_deterministic_file_name() {
        let dir = Path::new("/out");
        let name = dir.join(format!("diagram-{}.png", content_hash("digraph {}")));
        assert_eq!(name, dir.join(format!("diagram-{}.png", content_hash("digraph {}"))));
    }
}
