//! On-disk run snapshot used to resume an interrupted run.
//!
//! The snapshot lives next to the output as `<output>.partial.json`. It is
//! rewritten atomically (temp file + rename) after every chunk and removed
//! once the final document has been written.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use promptline_pipeline::error::PipelineError;
use promptline_pipeline::orchestrator::{GenerationRun, RunCheckpoint};

/// Snapshot path for an output file: `<output>.partial.json`.
pub fn checkpoint_path_for(output: &Path) -> PathBuf {
    let mut name = OsString::from(output.as_os_str());
    name.push(".partial.json");
    PathBuf::from(name)
}

/// JSON-file checkpoint store.
pub struct FileCheckpoint {
    path: PathBuf,
}

impl FileCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store for the snapshot belonging to `output`.
    pub fn for_output(output: &Path) -> Self {
        Self::new(checkpoint_path_for(output))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a previous snapshot, if any.
    ///
    /// An unreadable or corrupt snapshot is logged and ignored so a bad
    /// file never blocks a fresh run.
    pub async fn load(&self) -> Option<GenerationRun> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Cannot read snapshot, ignoring",
                );
                return None;
            }
        };

        match serde_json::from_slice::<GenerationRun>(&bytes) {
            Ok(run) => {
                tracing::info!(
                    path = %self.path.display(),
                    processed_chunks = run.processed_chunks,
                    total_chunks = run.total_chunks,
                    "Found run snapshot",
                );
                Some(run)
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Corrupt snapshot, ignoring",
                );
                None
            }
        }
    }

    /// Delete the snapshot. A missing file is not an error.
    pub async fn clear(&self) -> std::io::Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    async fn write(&self, run: &GenerationRun) -> std::io::Result<()> {
        let json = serde_json::to_vec(run)?;
        let mut tmp = OsString::from(self.path.as_os_str());
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await
    }
}

#[async_trait]
impl RunCheckpoint for FileCheckpoint {
    async fn save(&self, run: &GenerationRun) -> Result<(), PipelineError> {
        self.write(run)
            .await
            .map_err(|e| PipelineError::Checkpoint(format!("{}: {e}", self.path.display())))?;
        tracing::debug!(
            path = %self.path.display(),
            processed_chunks = run.processed_chunks,
            "Snapshot saved",
        );
        Ok(())
    }
}
