//! Flowchart Manifest
//!
//! Defines the on-disk form of a flowchart (settings, variables, commands) and
//! loads it from TOML or JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use flowchart_runtime::DispatchConfig;
use flowchart_types::Variable;

/// Error type for manifest loading
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Manifest path does not exist: {0}")]
    PathNotFound(std::path::PathBuf),

    #[error("Failed to read file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("Failed to write TOML: {0}")]
    TomlWriteError(#[from] toml::ser::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParseError(#[from] serde_json::Error),

    #[error("Invalid manifest: {0}")]
    Invalid(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Manifest Types
// ─────────────────────────────────────────────────────────────────────────────

/// Flowchart manifest (flowchart.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowchartManifest {
    #[serde(default)]
    pub flowchart: FlowchartSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub commands: Vec<DispatchConfig>,
}

/// Flowchart-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowchartSettings {
    #[serde(default = "default_name")]
    pub name: String,
    /// Minimum time (seconds) to spend on each step
    #[serde(default)]
    pub step_time: f32,
    /// Start running when the scene starts
    #[serde(default)]
    pub start_automatically: bool,
}

fn default_name() -> String {
    "Flowchart".to_string()
}

impl Default for FlowchartSettings {
    fn default() -> Self {
        Self {
            name: default_name(),
            step_time: 0.0,
            start_automatically: false,
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence when set
    pub filter: Option<String>,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl FlowchartManifest {
    /// Reject values no flowchart could run with
    pub fn validate(&self) -> Result<(), ManifestError> {
        let step_time = self.flowchart.step_time;
        if !step_time.is_finite() || step_time < 0.0 {
            return Err(ManifestError::Invalid(format!(
                "step_time must be a non-negative number, got {}",
                step_time
            )));
        }

        for (index, command) in self.commands.iter().enumerate() {
            if !command.delay.is_finite() || command.delay < 0.0 {
                return Err(ManifestError::Invalid(format!(
                    "command {} has invalid delay {}",
                    index, command.delay
                )));
            }
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ManifestError> {
        Ok(toml::to_string(self)?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loader
// ─────────────────────────────────────────────────────────────────────────────

/// Manifest loader
pub struct ManifestLoader;

impl ManifestLoader {
    /// Load a manifest; `.json` files are read as JSON, anything else as TOML
    pub async fn load(path: impl AsRef<Path>) -> Result<FlowchartManifest, ManifestError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ManifestError::PathNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).await?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let manifest = if is_json {
            Self::parse_json(&content)?
        } else {
            Self::parse_toml(&content)?
        };

        info!(
            "Loaded flowchart {} ({} variables, {} commands) from {}",
            manifest.flowchart.name,
            manifest.variables.len(),
            manifest.commands.len(),
            path.display()
        );
        Ok(manifest)
    }

    pub fn parse_toml(content: &str) -> Result<FlowchartManifest, ManifestError> {
        let manifest: FlowchartManifest = toml::from_str(content)?;
        manifest.validate()?;
        debug!("Parsed TOML manifest {}", manifest.flowchart.name);
        Ok(manifest)
    }

    pub fn parse_json(content: &str) -> Result<FlowchartManifest, ManifestError> {
        let manifest: FlowchartManifest = serde_json::from_str(content)?;
        manifest.validate()?;
        debug!("Parsed JSON manifest {}", manifest.flowchart.name);
        Ok(manifest)
    }
}
