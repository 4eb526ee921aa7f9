use std::path::PathBuf;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Working-directory context a controller instance is scoped to.
///
/// `project_id` is the agent CLI's directory key for the project (see
/// `infra::history::project_dir_key`); `project_path` is the real path turns
/// run in.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProjectContext {
    pub project_id: String,
    pub project_path: PathBuf,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Session {
    pub id: String,
    pub project_id: String,
    pub project_path: PathBuf,
    pub created_at_rfc3339: String,
}

impl Session {
    pub fn new(id: impl Into<String>, project: &ProjectContext) -> Self {
        Self {
            id: id.into(),
            project_id: project.project_id.clone(),
            project_path: project.project_path.clone(),
            created_at_rfc3339: now_rfc3339(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Checkpoint {
    pub id: String,
    pub session_id: String,
    pub project_id: String,
    pub created_at_rfc3339: String,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CheckpointPolicy {
    pub auto_checkpoint_enabled: bool,
}

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_new_copies_project_context() {
        let project = ProjectContext {
            project_id: "-tmp-demo".to_string(),
            project_path: PathBuf::from("/tmp/demo"),
        };
        let session = Session::new("s1", &project);
        assert_eq!(session.id, "s1");
        assert_eq!(session.project_id, "-tmp-demo");
        assert_eq!(session.project_path, PathBuf::from("/tmp/demo"));
        assert!(!session.created_at_rfc3339.is_empty());
    }

    #[test]
    fn now_rfc3339_is_parseable() {
        let stamp = now_rfc3339();
        assert!(OffsetDateTime::parse(&stamp, &Rfc3339).is_ok());
    }
}
