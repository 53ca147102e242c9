//! Session state and logic (UI-agnostic).

mod io;
mod ops;
mod state;

pub use ops::OpCode;
pub use state::{Session, Stats};
