//! Flowchart Runtime - Variables and event dispatch for flowchart scripts
//!
//! This crate contains the variable registry, the constant-or-variable
//! parameter slot, the listener table and the invoke command built on them.

pub use flowchart_types;

mod command;
mod dispatch;
mod listeners;
mod registry;
mod scheduler;
mod slot;

pub use command::*;
pub use dispatch::*;
pub use listeners::*;
pub use registry::*;
pub use scheduler::*;
pub use slot::*;
