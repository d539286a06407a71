//! File-backed checkpoint store.
//!
//! Checkpoints are named artifacts inside a run's output directory. Presence
//! of a checkpoint is authoritative proof that the stage which owns it
//! completed; absence means "not yet computed" and is never an error. Writes
//! go through a temp file in the same directory and are renamed into place,
//! so a reader never observes a partial checkpoint.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tokio::fs;

use super::error::PipelineError;

/// Durable key-value store for a run's output location
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    directory: PathBuf,
}

impl CheckpointStore {
    /// Create a store rooted at the given output directory
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// The directory this store writes into
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the file backing a checkpoint name
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }

    /// Whether a checkpoint with this name exists
    pub fn has(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }

    /// Load a checkpoint's content, or `None` if it was never written
    pub async fn load(&self, name: &str) -> Result<Option<String>, PipelineError> {
        let path = self.path_for(name);
        if !path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).await?;
        Ok(Some(content))
    }

    /// Atomically write a checkpoint.
    ///
    /// The content lands under a unique temp name in the target directory
    /// first and is renamed over the final path, so concurrent writers to
    /// the same name serialize as last-writer-wins and readers never see a
    /// partial file.
    pub async fn save(&self, name: &str, content: &str) -> Result<(), PipelineError> {
        fs::create_dir_all(&self.directory).await?;

        let directory = self.directory.clone();
        let path = self.path_for(name);
        let content = content.to_owned();

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = NamedTempFile::new_in(&directory)?;
            tmp.write_all(content.as_bytes())?;
            tmp.flush()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))??;

        Ok(())
    }

    /// Remove a checkpoint if present. Used to force recomputation.
    pub async fn remove(&self, name: &str) -> Result<bool, PipelineError> {
        let path = self.path_for(name);
        if !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(&path).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_absent_checkpoint_is_none() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp.path());

        assert!(!store.has("deck.raw.md"));
        assert_eq!(store.load("deck.raw.md").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp.path());

        store.save("deck.raw.md", "# Deck").await.unwrap();

        assert!(store.has("deck.raw.md"));
        assert_eq!(
            store.load("deck.raw.md").await.unwrap().as_deref(),
            Some("# Deck")
        );
    }

    #[tokio::test]
    async fn test_save_creates_directory() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp.path().join("nested").join("out"));

        store.save("deck.raw.md", "content").await.unwrap();
        assert!(store.has("deck.raw.md"));
    }

    #[tokio::test]
    async fn test_overwrite_is_last_writer_wins() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp.path());

        store.save("k", "first").await.unwrap();
        store.save("k", "second").await.unwrap();

        assert_eq!(store.load("k").await.unwrap().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_remove() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp.path());

        store.save("k", "content").await.unwrap();
        assert!(store.remove("k").await.unwrap());
        assert!(!store.has("k"));
        assert!(!store.remove("k").await.unwrap());
    }
}
