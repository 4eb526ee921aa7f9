use crate::infra::{
    AgentBackend, BackendError, ResolveAgentBinaryError, TurnSignal, add_dir_to_path,
    deduplicate_path, resolve_agent_binary,
};
use std::env;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub const DEFAULT_AGENT_BINARY: &str = "claude";

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Spawns the agent CLI for each turn and feeds its pipes into the turn's
/// event channel.
///
/// stdout is the structured event stream (one serialized record per line),
/// stderr becomes the turn's error state, and process exit is the completion
/// signal. One child is live at a time; the handle is retained so an in-flight
/// turn can be stopped.
pub struct CliAgentBackend {
    binary: PathBuf,
    child_path_var: String,
    active: Arc<Mutex<Option<Child>>>,
}

impl CliAgentBackend {
    /// Resolves the agent binary (env override, then discovery) and prepares
    /// the PATH its children inherit.
    pub fn resolve() -> Result<Self, ResolveAgentBinaryError> {
        Ok(Self::with_binary(resolve_agent_binary(
            DEFAULT_AGENT_BINARY,
        )?))
    }

    pub fn with_binary(binary: PathBuf) -> Self {
        let mut path_var = env::var("PATH").unwrap_or_default();
        if let Some(bin_dir) = binary.parent().and_then(|dir| dir.to_str()) {
            // Node-manager installs resolve sibling tools relative to PATH.
            path_var = add_dir_to_path(&path_var, bin_dir);
        }
        Self {
            binary,
            child_path_var: deduplicate_path(&path_var),
            active: Arc::new(Mutex::new(None)),
        }
    }

    fn dispatch(
        &self,
        project_path: &Path,
        args: Vec<String>,
        events: Sender<TurnSignal>,
    ) -> Result<(), BackendError> {
        let mut active = lock_unpoisoned(&self.active);
        if let Some(previous) = active.as_mut() {
            match previous.try_wait() {
                Ok(Some(_)) => {}
                Ok(None) => return Err(BackendError::Busy),
                Err(error) => return Err(BackendError::Signal(error)),
            }
        }

        let mut child = Command::new(&self.binary)
            .args(&args)
            .current_dir(project_path)
            .env("PATH", &self.child_path_var)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(BackendError::Spawn)?;

        let stdout = child.stdout.take().ok_or(BackendError::Stdio("stdout"))?;
        let stderr = child.stderr.take().ok_or(BackendError::Stdio("stderr"))?;
        let pid = child.id();

        let output_events = events.clone();
        thread::spawn(move || {
            pipe_lines(stdout, |line| {
                output_events.send(TurnSignal::Output(line)).is_ok()
            });
        });

        let error_events = events.clone();
        thread::spawn(move || {
            pipe_lines(stderr, |line| {
                error_events.send(TurnSignal::Error(line)).is_ok()
            });
        });

        *active = Some(child);
        drop(active);

        let active_for_exit = Arc::clone(&self.active);
        thread::spawn(move || {
            watch_exit(&active_for_exit, pid, &events);
        });

        Ok(())
    }
}

impl AgentBackend for CliAgentBackend {
    fn start_new_turn(
        &self,
        project_path: &Path,
        prompt: &str,
        model: &str,
        events: Sender<TurnSignal>,
    ) -> Result<(), BackendError> {
        self.dispatch(project_path, start_args(prompt, model), events)
    }

    fn resume_turn(
        &self,
        project_path: &Path,
        session_id: &str,
        prompt: &str,
        model: &str,
        events: Sender<TurnSignal>,
    ) -> Result<(), BackendError> {
        self.dispatch(project_path, resume_args(session_id, prompt, model), events)
    }

    fn cancel_turn(&self, _session_id: Option<&str>) -> Result<(), BackendError> {
        let mut active = lock_unpoisoned(&self.active);
        let Some(mut child) = active.take() else {
            return Err(BackendError::NotRunning);
        };

        let killed = match child.kill() {
            Ok(()) => Ok(()),
            // Already exited between the completion signal and this call.
            Err(error) if error.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(error) => Err(BackendError::Signal(error)),
        };
        // Reap immediately so the next dispatch never races a dying child.
        let _ = child.wait();
        killed
    }
}

fn start_args(prompt: &str, model: &str) -> Vec<String> {
    vec![
        "-p".to_string(),
        prompt.to_string(),
        "--model".to_string(),
        model.to_string(),
        "--output-format".to_string(),
        "stream-json".to_string(),
        "--verbose".to_string(),
        "--dangerously-skip-permissions".to_string(),
    ]
}

fn resume_args(session_id: &str, prompt: &str, model: &str) -> Vec<String> {
    let mut args = vec!["--resume".to_string(), session_id.to_string()];
    args.extend(start_args(prompt, model));
    args
}

fn pipe_lines(pipe: impl Read, mut forward: impl FnMut(String) -> bool) {
    let mut reader = BufReader::new(pipe);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim_end();
                if trimmed.is_empty() {
                    continue;
                }
                if !forward(trimmed.to_string()) {
                    break;
                }
            }
            Err(_) => break,
        }
    }
}

/// Polls the shared child slot until the turn's process exits, then reports
/// completion exactly once. A slot holding a different pid means a later turn
/// replaced this one; its own watcher reports for it.
fn watch_exit(active: &Arc<Mutex<Option<Child>>>, pid: u32, events: &Sender<TurnSignal>) {
    loop {
        {
            let mut slot = lock_unpoisoned(active);
            let Some(child) = slot.as_mut() else {
                return;
            };
            if child.id() != pid {
                return;
            }
            match child.try_wait() {
                Ok(Some(status)) => {
                    *slot = None;
                    let _ = events.send(TurnSignal::Complete(status.success()));
                    return;
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!("failed to poll agent process exit: {error}");
                    *slot = None;
                    let _ = events.send(TurnSignal::Complete(false));
                    return;
                }
            }
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
