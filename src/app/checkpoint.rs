use crate::domain::{Checkpoint, Message, ProjectContext, Session};
use crate::infra::{CheckpointStore, CheckpointStoreError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint listing failed: {0}")]
    List(#[source] CheckpointStoreError),

    #[error("fork from checkpoint failed: {0}")]
    Fork(#[source] CheckpointStoreError),

    #[error("checkpoint restore failed: {0}")]
    Restore(#[source] CheckpointStoreError),
}

/// Decides after each successful turn whether a checkpoint is recorded, and
/// services explicit fork/restore requests against the shared store.
///
/// Auto-checkpointing is fire-and-forget: each completed turn spawns a
/// one-shot task so the visible end of a turn never waits on the store, and
/// store failures are logged without affecting the conversation.
pub struct CheckpointCoordinator {
    store: Arc<dyn CheckpointStore>,
    tasks: Vec<JoinHandle<()>>,
}

impl CheckpointCoordinator {
    pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            store,
            tasks: Vec::new(),
        }
    }

    /// Evaluates checkpoint policy for a successfully completed turn.
    pub fn on_turn_completed(&mut self, session_id: &str, project: &ProjectContext, prompt: &str) {
        let store = Arc::clone(&self.store);
        let session_id = session_id.to_string();
        let project_id = project.project_id.clone();
        let project_path = project.project_path.clone();
        let prompt = prompt.to_string();

        self.tasks.push(thread::spawn(move || {
            let policy = match store.policy(&session_id, &project_id, &project_path) {
                Ok(policy) => policy,
                Err(error) => {
                    tracing::warn!("failed to read checkpoint policy for {session_id}: {error}");
                    return;
                }
            };
            if !policy.auto_checkpoint_enabled {
                return;
            }
            if let Err(error) =
                store.create_if_due(&session_id, &project_id, &project_path, &prompt)
            {
                tracing::warn!("auto checkpoint failed for {session_id}: {error}");
            }
        }));
    }

    /// Creates a new lineage seeded from `checkpoint_id`. The caller decides
    /// whether to navigate to it; the source lineage is untouched.
    pub fn fork(
        &self,
        checkpoint_id: &str,
        source_session_id: &str,
        project: &ProjectContext,
        new_name: &str,
    ) -> Result<Session, CheckpointError> {
        let new_session = Session::new(Uuid::new_v4().to_string(), project);
        self.store
            .fork(
                checkpoint_id,
                source_session_id,
                &project.project_id,
                &project.project_path,
                &new_session.id,
                new_name,
            )
            .map_err(CheckpointError::Fork)?;
        Ok(new_session)
    }

    pub fn restore(&self, checkpoint_id: &str) -> Result<Vec<Message>, CheckpointError> {
        self.store
            .restore(checkpoint_id)
            .map_err(CheckpointError::Restore)
    }

    pub fn list(
        &self,
        session_id: &str,
        project: &ProjectContext,
    ) -> Result<Vec<Checkpoint>, CheckpointError> {
        self.store
            .list(session_id, &project.project_id)
            .map_err(CheckpointError::List)
    }

    /// Joins all outstanding auto-checkpoint tasks.
    pub fn flush(&mut self) {
        for task in self.tasks.drain(..) {
            if task.join().is_err() {
                tracing::warn!("auto checkpoint task panicked");
            }
        }
    }

    /// Releases coordinator- and store-held resources for a session when its
    /// view is torn down. Best-effort: failures are logged only.
    pub fn clear_session(&mut self, session_id: &str) {
        self.flush();
        if let Err(error) = self.store.clear(session_id) {
            tracing::warn!("failed to clear checkpoint resources for {session_id}: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CheckpointPolicy;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        auto_enabled: bool,
        fail_create: bool,
        created: Mutex<Vec<String>>,
        cleared: Mutex<Vec<String>>,
        forks: Mutex<Vec<(String, String, String)>>,
    }

    impl RecordingStore {
        fn with_auto(auto_enabled: bool) -> Self {
            Self {
                auto_enabled,
                ..Self::default()
            }
        }
    }

    impl CheckpointStore for RecordingStore {
        fn policy(
            &self,
            _session_id: &str,
            _project_id: &str,
            _project_path: &Path,
        ) -> Result<CheckpointPolicy, CheckpointStoreError> {
            Ok(CheckpointPolicy {
                auto_checkpoint_enabled: self.auto_enabled,
            })
        }

        fn create_if_due(
            &self,
            _session_id: &str,
            _project_id: &str,
            _project_path: &Path,
            prompt: &str,
        ) -> Result<(), CheckpointStoreError> {
            if self.fail_create {
                return Err(CheckpointStoreError::Store("disk full".to_string()));
            }
            self.created.lock().unwrap().push(prompt.to_string());
            Ok(())
        }

        fn list(
            &self,
            _session_id: &str,
            _project_id: &str,
        ) -> Result<Vec<Checkpoint>, CheckpointStoreError> {
            Ok(Vec::new())
        }

        fn fork(
            &self,
            checkpoint_id: &str,
            source_session_id: &str,
            _project_id: &str,
            _project_path: &Path,
            new_session_id: &str,
            _new_name: &str,
        ) -> Result<(), CheckpointStoreError> {
            self.forks.lock().unwrap().push((
                checkpoint_id.to_string(),
                source_session_id.to_string(),
                new_session_id.to_string(),
            ));
            Ok(())
        }

        fn restore(&self, checkpoint_id: &str) -> Result<Vec<Message>, CheckpointStoreError> {
            Err(CheckpointStoreError::NotFound(checkpoint_id.to_string()))
        }

        fn clear(&self, session_id: &str) -> Result<(), CheckpointStoreError> {
            self.cleared.lock().unwrap().push(session_id.to_string());
            Ok(())
        }
    }

    fn project() -> ProjectContext {
        ProjectContext {
            project_id: "-tmp-demo".to_string(),
            project_path: PathBuf::from("/tmp/demo"),
        }
    }

    #[test]
    fn auto_checkpoint_runs_when_policy_allows() {
        let store = Arc::new(RecordingStore::with_auto(true));
        let mut coordinator = CheckpointCoordinator::new(store.clone());

        coordinator.on_turn_completed("s1", &project(), "fix the bug");
        coordinator.flush();

        assert_eq!(*store.created.lock().unwrap(), vec!["fix the bug"]);
    }

    #[test]
    fn auto_checkpoint_skipped_when_policy_disables_it() {
        let store = Arc::new(RecordingStore::with_auto(false));
        let mut coordinator = CheckpointCoordinator::new(store.clone());

        coordinator.on_turn_completed("s1", &project(), "fix the bug");
        coordinator.flush();

        assert!(store.created.lock().unwrap().is_empty());
    }

    #[test]
    fn auto_checkpoint_failure_is_swallowed() {
        let store = Arc::new(RecordingStore {
            auto_enabled: true,
            fail_create: true,
            ..RecordingStore::default()
        });
        let mut coordinator = CheckpointCoordinator::new(store.clone());

        coordinator.on_turn_completed("s1", &project(), "fix the bug");
        coordinator.flush();

        assert!(store.created.lock().unwrap().is_empty());
    }

    #[test]
    fn fork_allocates_a_fresh_lineage_id() {
        let store = Arc::new(RecordingStore::with_auto(false));
        let coordinator = CheckpointCoordinator::new(store.clone());

        let forked = coordinator
            .fork("cp-1", "s1", &project(), "experiment")
            .expect("fork");
        assert_ne!(forked.id, "s1");
        assert_eq!(forked.project_id, "-tmp-demo");

        let forks = store.forks.lock().unwrap();
        assert_eq!(forks.len(), 1);
        assert_eq!(forks[0].0, "cp-1");
        assert_eq!(forks[0].1, "s1");
        assert_eq!(forks[0].2, forked.id);
    }

    #[test]
    fn clear_session_flushes_tasks_then_clears_store() {
        let store = Arc::new(RecordingStore::with_auto(true));
        let mut coordinator = CheckpointCoordinator::new(store.clone());

        coordinator.on_turn_completed("s1", &project(), "prompt");
        coordinator.clear_session("s1");

        assert_eq!(*store.created.lock().unwrap(), vec!["prompt"]);
        assert_eq!(*store.cleared.lock().unwrap(), vec!["s1"]);
    }

    #[test]
    fn restore_maps_store_errors() {
        let store = Arc::new(RecordingStore::with_auto(false));
        let coordinator = CheckpointCoordinator::new(store);
        let error = coordinator.restore("missing").expect_err("error");
        assert!(matches!(error, CheckpointError::Restore(_)));
    }
}
