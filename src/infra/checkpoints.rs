use crate::domain::{Checkpoint, CheckpointPolicy, Message};
use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointStoreError {
    #[error("checkpoint not found: {0}")]
    NotFound(String),

    #[error("checkpoint store i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("checkpoint store failure: {0}")]
    Store(String),
}

/// Narrow contract of the external checkpoint/versioning engine.
///
/// The store is shared; concurrent checkpoint creation for the same session
/// by other actors is tolerated and resolved by the store, never by callers.
pub trait CheckpointStore: Send + Sync {
    fn policy(
        &self,
        session_id: &str,
        project_id: &str,
        project_path: &Path,
    ) -> Result<CheckpointPolicy, CheckpointStoreError>;

    /// Records a snapshot tagged with the prompt that triggered the turn.
    /// The store may decline (deduplicate, throttle) without error.
    fn create_if_due(
        &self,
        session_id: &str,
        project_id: &str,
        project_path: &Path,
        prompt: &str,
    ) -> Result<(), CheckpointStoreError>;

    fn list(
        &self,
        session_id: &str,
        project_id: &str,
    ) -> Result<Vec<Checkpoint>, CheckpointStoreError>;

    /// Seeds a new lineage from a checkpoint. Never mutates the source
    /// lineage.
    #[allow(clippy::too_many_arguments)]
    fn fork(
        &self,
        checkpoint_id: &str,
        source_session_id: &str,
        project_id: &str,
        project_path: &Path,
        new_session_id: &str,
        new_name: &str,
    ) -> Result<(), CheckpointStoreError>;

    /// The checkpoint's recorded message log, for the caller to reinstate.
    fn restore(&self, checkpoint_id: &str) -> Result<Vec<Message>, CheckpointStoreError>;

    /// Releases store-held resources for a session; best-effort.
    fn clear(&self, session_id: &str) -> Result<(), CheckpointStoreError>;
}
