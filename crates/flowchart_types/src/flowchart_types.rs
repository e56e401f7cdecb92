//! Flowchart Types - Core type definitions for flowchart scripting
//!
//! This crate contains the pure data structures shared by the runtime and the
//! host: typed variable values, variables, invoke modes and listener bindings.
//! Nothing in here owns a clock or calls back into user code.

mod binding;
mod value;
mod variable;

pub use binding::*;
pub use value::*;
pub use variable::*;
