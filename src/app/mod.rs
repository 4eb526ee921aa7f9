mod checkpoint;
mod controller;
mod identity;

pub use checkpoint::*;
pub use controller::*;
pub use identity::*;
