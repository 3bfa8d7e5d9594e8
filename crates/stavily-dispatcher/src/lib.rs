//! Instruction Dispatcher (§4.6): drives one [`Instruction`] through
//! validation, then install/update/execute, to a terminal
//! [`InstructionResult`]. Composes the Plugin Store and Sandbox Executor;
//! never spawns a subprocess for an instruction that fails validation or
//! (for `execute`) was never installed.

mod context;
mod dispatch;
mod error;

pub use context::DispatchContext;
pub use dispatch::dispatch;
pub use error::{DispatchError, DispatchResult};
