mod agent;
mod binary;
mod checkpoints;
mod history;
mod process;

pub use agent::*;
pub use binary::*;
pub use checkpoints::*;
pub use history::*;
pub use process::*;
