use crate::domain::{Message, ParseMessageError, ProjectContext, parse_stream_message};
use dirs::home_dir;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveProjectsDirError {
    #[error("home directory not found")]
    HomeDirNotFound,
}

/// Where the agent CLI records session history, honoring the same override
/// the CLI itself understands.
pub fn resolve_projects_dir() -> Result<PathBuf, ResolveProjectsDirError> {
    if let Some(override_dir) = std::env::var_os("CLAUDE_PROJECTS_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let Some(home) = home_dir() else {
        return Err(ResolveProjectsDirError::HomeDirNotFound);
    };

    Ok(home.join(".claude").join("projects"))
}

/// The agent CLI's encoding of a project path into a per-project directory
/// name: every non-alphanumeric byte becomes `-`.
pub fn project_dir_key(project_path: &Path) -> String {
    project_path
        .to_string_lossy()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("session log not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read session log: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    ResolveProjectsDir(#[from] ResolveProjectsDirError),
}

/// Ordered prior messages of an existing session.
pub trait HistorySource: Send + Sync {
    fn load_session_history(
        &self,
        session_id: &str,
        project: &ProjectContext,
    ) -> Result<Vec<Message>, HistoryError>;
}

/// Reads history from the agent CLI's per-project JSONL logs.
pub struct FileHistory {
    projects_dir: PathBuf,
}

impl FileHistory {
    pub fn new(projects_dir: PathBuf) -> Self {
        Self { projects_dir }
    }

    pub fn resolve() -> Result<Self, ResolveProjectsDirError> {
        Ok(Self::new(resolve_projects_dir()?))
    }

    fn session_log_path(&self, session_id: &str, project: &ProjectContext) -> PathBuf {
        self.projects_dir
            .join(&project.project_id)
            .join(format!("{session_id}.jsonl"))
    }
}

impl HistorySource for FileHistory {
    fn load_session_history(
        &self,
        session_id: &str,
        project: &ProjectContext,
    ) -> Result<Vec<Message>, HistoryError> {
        let path = self.session_log_path(session_id, project);
        if !path.is_file() {
            return Err(HistoryError::NotFound(path));
        }

        let file = File::open(&path)?;
        let reader = BufReader::new(file);

        let mut messages = Vec::new();
        let mut warnings = 0usize;

        for (line_no, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }

            match parse_stream_message(&line) {
                Ok(message) => messages.push(message),
                // Histories interleave record kinds this crate does not
                // model (snapshots, progress markers); only malformed JSON
                // counts against the log.
                Err(ParseMessageError::UnknownKind(kind)) => {
                    tracing::debug!(
                        "skipping unmodeled history record `{kind}` at {}:{}",
                        path.display(),
                        line_no + 1
                    );
                }
                Err(error) => {
                    warnings = warnings.saturating_add(1);
                    tracing::warn!(
                        "skipping malformed history line {}:{}: {error}",
                        path.display(),
                        line_no + 1
                    );
                }
            }
        }

        if warnings > 0 {
            tracing::warn!(
                "loaded session {session_id} with {warnings} malformed history lines"
            );
        }

        Ok(messages)
    }
}
