//! Flowchart - host-side container for flowchart scripts
//!
//! Ties together the variable registry, listener table and scheduler from
//! `flowchart_runtime` into a loadable, saveable flowchart.
//!
//! ```text
//! flowchart.toml ──ManifestLoader──► FlowchartManifest ──► Flowchart
//!                                                          ├─ VariableRegistry
//!                                                          └─ DispatchCommand*
//! ```

pub mod flowchart;
pub mod logging;
pub mod manifest;

pub use flowchart::Flowchart;
pub use manifest::{FlowchartManifest, FlowchartSettings, LoggingConfig, ManifestError, ManifestLoader};

pub use flowchart_runtime;
pub use flowchart_types;
