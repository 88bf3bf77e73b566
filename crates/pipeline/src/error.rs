use promptline_core::error::CoreError;

use crate::orchestrator::GenerationRun;

/// Errors that end a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The collaborator rejected a chunk in a way retrying cannot fix
    /// (authentication, quota, malformed request). `partial` holds every
    /// chunk completed before the failure so the run can be resumed.
    #[error("Chunk {chunk_index} failed permanently: {message}")]
    CollaboratorPermanent {
        chunk_index: usize,
        message: String,
        partial: Box<GenerationRun>,
    },

    /// Persisting a run snapshot failed.
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),
}
