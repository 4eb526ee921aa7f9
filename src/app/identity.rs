/// How the next prompt should be issued against the agent process.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TurnDispatch {
    StartNew,
    Resume(String),
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum LineageState {
    Unresolved,
    Resolved { session_id: String },
}

/// Authoritative session identity for one conversation lineage.
///
/// Replaces the ad-hoc "first prompt?" / "which id?" flag pairs with one
/// state machine: identity resolves at most once per lineage (from resume
/// parameters or the first init event) and the first-prompt property decays
/// monotonically once a turn completes or history loads.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionLineage {
    state: LineageState,
    first_prompt: bool,
}

impl SessionLineage {
    pub fn for_new_session() -> Self {
        Self {
            state: LineageState::Unresolved,
            first_prompt: true,
        }
    }

    /// A lineage resumed from an existing session: identity is known up front
    /// and prior history implies this is not the first prompt.
    pub fn for_resumed(session_id: impl Into<String>) -> Self {
        Self {
            state: LineageState::Resolved {
                session_id: session_id.into(),
            },
            first_prompt: false,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match &self.state {
            LineageState::Unresolved => None,
            LineageState::Resolved { session_id } => Some(session_id),
        }
    }

    pub fn is_first_prompt(&self) -> bool {
        self.first_prompt
    }

    /// Resolves identity from an initialization event. Once resolved, a
    /// differing id for the same lineage is ignored.
    pub fn observe_init(&mut self, session_id: &str) {
        match &self.state {
            LineageState::Unresolved => {
                self.state = LineageState::Resolved {
                    session_id: session_id.to_string(),
                };
            }
            LineageState::Resolved {
                session_id: resolved,
            } => {
                if resolved != session_id {
                    tracing::debug!(
                        "ignoring init session id {session_id} for lineage already resolved to {resolved}"
                    );
                }
            }
        }
    }

    pub fn note_turn_completed(&mut self) {
        self.first_prompt = false;
    }

    pub fn note_history_loaded(&mut self) {
        self.first_prompt = false;
    }

    /// Resume only when identity is resolved and some turn or history already
    /// anchors the lineage; everything else starts fresh.
    pub fn dispatch(&self) -> TurnDispatch {
        match &self.state {
            LineageState::Resolved { session_id } if !self.first_prompt => {
                TurnDispatch::Resume(session_id.clone())
            }
            _ => TurnDispatch::StartNew,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_lineage_starts_new_until_a_turn_completes() {
        let mut lineage = SessionLineage::for_new_session();
        assert_eq!(lineage.dispatch(), TurnDispatch::StartNew);
        assert!(lineage.is_first_prompt());

        lineage.observe_init("abc");
        // Identity alone is not enough; the first turn is still in flight.
        assert_eq!(lineage.dispatch(), TurnDispatch::StartNew);

        lineage.note_turn_completed();
        assert_eq!(lineage.dispatch(), TurnDispatch::Resume("abc".to_string()));
    }

    #[test]
    fn resumed_lineage_resumes_immediately() {
        let lineage = SessionLineage::for_resumed("abc");
        assert_eq!(lineage.dispatch(), TurnDispatch::Resume("abc".to_string()));
        assert!(!lineage.is_first_prompt());
    }

    #[test]
    fn identity_is_monotonic_once_resolved() {
        let mut lineage = SessionLineage::for_new_session();
        lineage.observe_init("abc");
        lineage.observe_init("different");
        assert_eq!(lineage.session_id(), Some("abc"));

        let mut resumed = SessionLineage::for_resumed("xyz");
        resumed.observe_init("other");
        assert_eq!(resumed.session_id(), Some("xyz"));
    }

    #[test]
    fn history_load_anchors_the_lineage() {
        let mut lineage = SessionLineage::for_new_session();
        lineage.observe_init("abc");
        lineage.note_history_loaded();
        assert_eq!(lineage.dispatch(), TurnDispatch::Resume("abc".to_string()));
    }

    #[test]
    fn unresolved_lineage_never_resumes() {
        let mut lineage = SessionLineage::for_new_session();
        lineage.note_turn_completed();
        assert_eq!(lineage.dispatch(), TurnDispatch::StartNew);
        assert_eq!(lineage.session_id(), None);
    }
}
