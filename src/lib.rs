//! Session stream controller for CLI coding agents.
//!
//! `ccdrive` drives an interactive, long-lived conversation with an external
//! agent process (the `claude` CLI's `--output-format stream-json` surface)
//! and reconciles its asynchronous output/error/completion events into one
//! ordered message log. It resolves session identity across the first-prompt
//! vs. resume distinction, coordinates point-in-time checkpoints after
//! successful turns, and cancels in-flight turns deterministically.
//!
//! The crate is a library boundary only: rendering, file pickers, and the
//! checkpoint storage engine are external collaborators, consumed through the
//! narrow contracts in [`infra`].
//!
//! ```no_run
//! use ccdrive::app::SessionStreamController;
//! use ccdrive::domain::ProjectContext;
//! use ccdrive::infra::{CliAgentBackend, FileHistory, project_dir_key};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! # fn checkpoint_store() -> Arc<dyn ccdrive::infra::CheckpointStore> { unimplemented!() }
//! let project_path = PathBuf::from("/home/dev/project");
//! let project = ProjectContext {
//!     project_id: project_dir_key(&project_path),
//!     project_path,
//! };
//! let backend = Arc::new(CliAgentBackend::resolve().unwrap());
//! let history = Arc::new(FileHistory::resolve().unwrap());
//! let mut controller =
//!     SessionStreamController::new(backend, history, checkpoint_store(), project);
//!
//! controller.send_prompt("add a regression test", "sonnet").unwrap();
//! loop {
//!     controller.pump();
//!     if !controller.is_turn_active() {
//!         break;
//!     }
//! }
//! for message in controller.displayable() {
//!     println!("{}", message.kind.label());
//! }
//! ```

pub mod app;
pub mod domain;
pub mod infra;

pub use app::{CancelTurnError, SendPromptError, SessionStreamController};
pub use domain::{ContentBlock, DisplayPolicy, Message, MessageKind, ProjectContext, Session};
pub use infra::{AgentBackend, CheckpointStore, HistorySource, TurnSignal};
