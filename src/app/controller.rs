use crate::app::checkpoint::{CheckpointCoordinator, CheckpointError};
use crate::app::identity::{SessionLineage, TurnDispatch};
use crate::domain::{
    Checkpoint, DisplayPolicy, Message, MessageLog, ProjectContext, Session, displayable,
    parse_stream_message,
};
use crate::infra::{
    AgentBackend, BackendError, CheckpointStore, HistoryError, HistorySource, TurnSignal,
    TurnSubscription,
};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SendPromptError {
    #[error("a turn is already active")]
    TurnActive,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Debug, Error)]
pub enum CancelTurnError {
    #[error("no active turn to cancel")]
    NoActiveTurn,

    /// The stop signal failed. Local state has already transitioned to
    /// inactive by the time this is returned.
    #[error("failed to signal agent to stop: {0}")]
    Signal(#[source] BackendError),
}

#[derive(Debug, Error)]
pub enum RestoreCheckpointError {
    #[error("cannot restore a checkpoint while a turn is active")]
    TurnActive,

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

#[derive(Debug, Error)]
pub enum SwitchSessionError {
    #[error("cannot switch sessions while a turn is active")]
    TurnActive,

    #[error(transparent)]
    History(#[from] HistoryError),
}

#[derive(Debug, Error)]
pub enum CheckpointRequestError {
    #[error("session identity is not resolved yet")]
    UnresolvedSession,

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

struct ActiveTurn {
    events: TurnSubscription,
    prompt: String,
}

/// Owns one session view: the message log, the turn lifecycle, session
/// identity, and checkpoint coordination.
///
/// Single logical owner: every mutation flows through `&mut self`, and turn
/// events only land when the embedding application drains them with
/// [`SessionStreamController::pump`], strictly in arrival order. Actions that
/// would overlap an active turn (`send_prompt`, `restore_checkpoint`, lineage
/// switches) are rejected at the boundary rather than interleaved.
pub struct SessionStreamController {
    backend: Arc<dyn AgentBackend>,
    history: Arc<dyn HistorySource>,
    checkpoints: CheckpointCoordinator,
    project: ProjectContext,
    display_policy: DisplayPolicy,
    log: MessageLog,
    lineage: SessionLineage,
    turn: Option<ActiveTurn>,
    last_turn_error: Option<String>,
}

impl SessionStreamController {
    pub fn new(
        backend: Arc<dyn AgentBackend>,
        history: Arc<dyn HistorySource>,
        checkpoint_store: Arc<dyn CheckpointStore>,
        project: ProjectContext,
    ) -> Self {
        Self {
            backend,
            history,
            checkpoints: CheckpointCoordinator::new(checkpoint_store),
            project,
            display_policy: DisplayPolicy::default(),
            log: MessageLog::new(),
            lineage: SessionLineage::for_new_session(),
            turn: None,
            last_turn_error: None,
        }
    }

    pub fn with_display_policy(mut self, policy: DisplayPolicy) -> Self {
        self.display_policy = policy;
        self
    }

    pub fn project(&self) -> &ProjectContext {
        &self.project
    }

    pub fn session_id(&self) -> Option<&str> {
        self.lineage.session_id()
    }

    pub fn is_turn_active(&self) -> bool {
        self.turn.is_some()
    }

    pub fn last_turn_error(&self) -> Option<&str> {
        self.last_turn_error.as_deref()
    }

    /// The full ordered log; ground truth, including non-displayable entries.
    pub fn messages(&self) -> &[Message] {
        self.log.entries()
    }

    /// The displayable projection of the log. Pure; never mutates the log.
    pub fn displayable(&self) -> Vec<&Message> {
        displayable(self.log.entries(), &self.display_policy)
    }

    /// Dispatches a prompt as the next turn of this lineage.
    ///
    /// Attaches the turn's event subscription first, then issues start-or-
    /// resume according to lineage state. If dispatch fails the subscription
    /// is released and nothing is recorded — no partial state.
    pub fn send_prompt(&mut self, prompt: &str, model: &str) -> Result<(), SendPromptError> {
        if self.turn.is_some() {
            return Err(SendPromptError::TurnActive);
        }

        self.last_turn_error = None;
        self.checkpoints.flush();

        let (events, subscription) = TurnSubscription::channel();
        let dispatched = match self.lineage.dispatch() {
            TurnDispatch::StartNew => self.backend.start_new_turn(
                &self.project.project_path,
                prompt,
                model,
                events,
            ),
            TurnDispatch::Resume(session_id) => self.backend.resume_turn(
                &self.project.project_path,
                &session_id,
                prompt,
                model,
                events,
            ),
        };

        if let Err(error) = dispatched {
            drop(subscription);
            return Err(error.into());
        }

        // The CLI does not echo prompts back on its stream.
        self.log.push(Message::user_prompt(
            prompt,
            self.lineage.session_id().map(|id| id.to_string()),
        ));
        self.turn = Some(ActiveTurn {
            events: subscription,
            prompt: prompt.to_string(),
        });
        Ok(())
    }

    /// Drains pending turn signals in arrival order, returning how many were
    /// handled. Call this from the embedding application's tick.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0usize;

        loop {
            let Some(turn) = self.turn.as_ref() else {
                break;
            };
            let Some(signal) = turn.events.try_next() else {
                break;
            };
            handled = handled.saturating_add(1);

            match signal {
                TurnSignal::Output(payload) => self.on_output(&payload),
                TurnSignal::Error(payload) => {
                    tracing::warn!("turn reported error: {payload}");
                    self.last_turn_error = Some(payload);
                }
                TurnSignal::Complete(success) => self.on_complete(success),
            }
        }

        handled
    }

    fn on_output(&mut self, payload: &str) {
        match parse_stream_message(payload) {
            Ok(message) => {
                if message.is_init() {
                    if let Some(session_id) = &message.session_id {
                        self.lineage.observe_init(session_id);
                    }
                }
                self.log.push(message);
            }
            Err(error) => {
                tracing::warn!("dropping malformed agent event payload: {error}");
            }
        }
    }

    fn on_complete(&mut self, success: bool) {
        // Taking the turn drops its subscription: remaining queued signals
        // are discarded and completion can fire at most once per turn.
        let Some(turn) = self.turn.take() else {
            return;
        };
        self.lineage.note_turn_completed();

        if success {
            if let Some(session_id) = self.lineage.session_id() {
                let session_id = session_id.to_string();
                self.checkpoints
                    .on_turn_completed(&session_id, &self.project, &turn.prompt);
            }
        }
    }

    /// Stops the in-flight turn. Local finalization (listener detached,
    /// terminal system entry appended, turn inactive) happens regardless of
    /// whether the stop signal reached the process.
    pub fn cancel(&mut self) -> Result<(), CancelTurnError> {
        if self.turn.is_none() {
            return Err(CancelTurnError::NoActiveTurn);
        }

        let signal_result = self.backend.cancel_turn(self.lineage.session_id());

        self.turn = None;
        self.log.push(Message::cancelled_notice());
        self.lineage.note_turn_completed();

        signal_result.map_err(CancelTurnError::Signal)
    }

    /// Replaces the current view with an existing session: identity resolves
    /// to the session's id and the log is reloaded from its history.
    pub fn resume_session(&mut self, session: &Session) -> Result<usize, SwitchSessionError> {
        if self.turn.is_some() {
            return Err(SwitchSessionError::TurnActive);
        }

        self.release_current_session();
        self.lineage = SessionLineage::for_resumed(session.id.clone());
        self.log.clear();
        self.last_turn_error = None;

        let messages = self
            .history
            .load_session_history(&session.id, &self.project)?;
        self.log.extend(messages);
        self.lineage.note_history_loaded();
        Ok(self.log.len())
    }

    /// Starts a brand-new lineage with an empty log; identity resolves from
    /// the first turn's init event.
    pub fn start_new_session(&mut self) -> Result<(), SwitchSessionError> {
        if self.turn.is_some() {
            return Err(SwitchSessionError::TurnActive);
        }

        self.release_current_session();
        self.lineage = SessionLineage::for_new_session();
        self.log.clear();
        self.last_turn_error = None;
        Ok(())
    }

    /// Reloads the log from a checkpoint's recorded state, discarding
    /// everything recorded after it. The only operation that truncates the
    /// log, and only on success.
    pub fn restore_checkpoint(
        &mut self,
        checkpoint_id: &str,
    ) -> Result<usize, RestoreCheckpointError> {
        if self.turn.is_some() {
            return Err(RestoreCheckpointError::TurnActive);
        }

        let messages = self.checkpoints.restore(checkpoint_id)?;
        self.log.replace(messages);
        Ok(self.log.len())
    }

    /// Starts a new lineage seeded from a checkpoint and returns it. The
    /// current view is not switched; the caller navigates if it wants to.
    pub fn fork_from_checkpoint(
        &self,
        checkpoint_id: &str,
        new_name: &str,
    ) -> Result<Session, CheckpointRequestError> {
        let Some(session_id) = self.lineage.session_id() else {
            return Err(CheckpointRequestError::UnresolvedSession);
        };
        Ok(self
            .checkpoints
            .fork(checkpoint_id, session_id, &self.project, new_name)?)
    }

    pub fn list_checkpoints(&self) -> Result<Vec<Checkpoint>, CheckpointRequestError> {
        let Some(session_id) = self.lineage.session_id() else {
            return Err(CheckpointRequestError::UnresolvedSession);
        };
        Ok(self.checkpoints.list(session_id, &self.project)?)
    }

    /// Joins outstanding auto-checkpoint tasks. Useful at quiescent points
    /// and before assertions in embedding tests.
    pub fn flush_checkpoint_tasks(&mut self) {
        self.checkpoints.flush();
    }

    /// Tears the view down: stops any in-flight turn and releases checkpoint
    /// resources. Best-effort; safe to call more than once.
    pub fn teardown(&mut self) {
        if self.turn.is_some() {
            if let Err(error) = self.cancel() {
                tracing::warn!("teardown cancel failed: {error}");
            }
        }
        self.release_current_session();
    }

    fn release_current_session(&mut self) {
        if let Some(session_id) = self.lineage.session_id() {
            let session_id = session_id.to_string();
            self.checkpoints.clear_session(&session_id);
        } else {
            self.checkpoints.flush();
        }
    }
}
