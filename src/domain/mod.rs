mod display;
mod log;
mod message;
mod types;

pub use display::*;
pub use log::*;
pub use message::*;
pub use types::*;
