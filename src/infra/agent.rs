use std::io;
use std::path::Path;
use std::sync::mpsc::{Receiver, Sender, channel};
use thiserror::Error;

/// One event observed from the external agent process, scoped to a turn.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TurnSignal {
    /// One serialized structured-message record from the agent's output
    /// stream. May be malformed; the reconciler decides.
    Output(String),

    /// The turn's visible error state. Does not terminate the turn —
    /// completion is a separate, authoritative signal.
    Error(String),

    /// Authoritative end of turn; `true` when the agent exited successfully.
    Complete(bool),
}

/// Scoped handle to a turn's event channel.
///
/// Owning the receiving end is what "attached" means: dropping the
/// subscription detaches the listener, so release happens on every exit path
/// of a turn and a listener can never leak into the next one.
#[derive(Debug)]
pub struct TurnSubscription {
    rx: Receiver<TurnSignal>,
}

impl TurnSubscription {
    pub fn channel() -> (Sender<TurnSignal>, TurnSubscription) {
        let (tx, rx) = channel();
        (tx, TurnSubscription { rx })
    }

    /// Next pending signal, in arrival order, without blocking.
    pub fn try_next(&self) -> Option<TurnSignal> {
        self.rx.try_recv().ok()
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to spawn agent process: {0}")]
    Spawn(io::Error),

    #[error("agent process stdio unavailable: {0}")]
    Stdio(&'static str),

    #[error("a turn is already executing")]
    Busy,

    #[error("no agent process is running")]
    NotRunning,

    #[error("failed to signal agent process: {0}")]
    Signal(io::Error),
}

/// Execute/resume/cancel surface of the external agent process.
///
/// Effects of `start_new_turn`/`resume_turn` are observed only through the
/// `events` channel, never through return values.
pub trait AgentBackend: Send + Sync {
    fn start_new_turn(
        &self,
        project_path: &Path,
        prompt: &str,
        model: &str,
        events: Sender<TurnSignal>,
    ) -> Result<(), BackendError>;

    fn resume_turn(
        &self,
        project_path: &Path,
        session_id: &str,
        prompt: &str,
        model: &str,
        events: Sender<TurnSignal>,
    ) -> Result<(), BackendError>;

    /// Best-effort stop of the in-flight turn. `session_id` is passed when
    /// identity has been resolved; a backend may still be able to address the
    /// process by its own handle without it.
    fn cancel_turn(&self, session_id: Option<&str>) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_drains_in_arrival_order() {
        let (tx, subscription) = TurnSubscription::channel();
        tx.send(TurnSignal::Output("a".to_string())).expect("send");
        tx.send(TurnSignal::Error("boom".to_string())).expect("send");
        tx.send(TurnSignal::Complete(true)).expect("send");

        assert_eq!(
            subscription.try_next(),
            Some(TurnSignal::Output("a".to_string()))
        );
        assert_eq!(
            subscription.try_next(),
            Some(TurnSignal::Error("boom".to_string()))
        );
        assert_eq!(subscription.try_next(), Some(TurnSignal::Complete(true)));
        assert_eq!(subscription.try_next(), None);
    }

    #[test]
    fn dropping_subscription_detaches_the_sender() {
        let (tx, subscription) = TurnSubscription::channel();
        drop(subscription);
        assert!(tx.send(TurnSignal::Complete(true)).is_err());
    }
}
