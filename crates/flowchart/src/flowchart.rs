//! Flowchart Container
//!
//! A flowchart owns the variables its commands refer to. Variables live and
//! die with the flowchart; commands hold only non-owning references to them.

use std::sync::Arc;

use tracing::{info, warn};

use flowchart_runtime::{
    Command, DispatchCommand, DispatchConfig, ListenerRegistry, Scheduler, VariableRegistry,
};
use flowchart_types::{Variable, VariableType};

use crate::manifest::{FlowchartManifest, FlowchartSettings, LoggingConfig};

/// A script container: settings, variables and invoke commands
pub struct Flowchart {
    settings: FlowchartSettings,
    logging: LoggingConfig,
    variables: VariableRegistry,
    listeners: Arc<ListenerRegistry>,
    scheduler: Arc<dyn Scheduler>,
    commands: Vec<DispatchCommand>,
}

impl Flowchart {
    /// Create an empty flowchart
    pub fn new(
        settings: FlowchartSettings,
        listeners: Arc<ListenerRegistry>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            settings,
            logging: LoggingConfig::default(),
            variables: VariableRegistry::new(),
            listeners,
            scheduler,
            commands: Vec::new(),
        }
    }

    /// Build a flowchart from a loaded manifest, linking command slots to its variables
    pub fn from_manifest(
        manifest: FlowchartManifest,
        listeners: Arc<ListenerRegistry>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        let mut flowchart = Self::new(manifest.flowchart, listeners, scheduler);
        flowchart.logging = manifest.logging;
        flowchart.variables = VariableRegistry::from_variables(manifest.variables);

        for config in manifest.commands {
            flowchart.add_command(config);
        }

        info!(
            "Flowchart {} ready with {} variables and {} commands",
            flowchart.settings.name,
            flowchart.variables.len(),
            flowchart.commands.len()
        );
        flowchart
    }

    pub fn settings(&self) -> &FlowchartSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut FlowchartSettings {
        &mut self.settings
    }

    /// Log settings from the manifest, for `logging::init`
    pub fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    pub fn variables(&self) -> &VariableRegistry {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableRegistry {
        &mut self.variables
    }

    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    /// Add a variable of the given type with a generated key
    pub fn add_variable(&mut self, ty: VariableType) -> String {
        self.variables.register_type(ty)
    }

    /// Remove a variable; commands referring to it fall back to defaults
    pub fn remove_variable(&mut self, key: &str) -> Option<Variable> {
        self.variables.remove(key)
    }

    /// Add an invoke command, returning its index
    pub fn add_command(&mut self, config: DispatchConfig) -> usize {
        let command = DispatchCommand::new(
            config,
            Arc::clone(&self.listeners),
            Arc::clone(&self.scheduler),
        );
        if !command.link(&self.variables) {
            warn!(
                "Command {} in {} refers to missing variables",
                self.commands.len(),
                self.settings.name
            );
        }
        self.commands.push(command);
        self.commands.len() - 1
    }

    /// Remove a command, cancelling its pending dispatches
    pub fn remove_command(&mut self, index: usize) -> Option<DispatchConfig> {
        if index >= self.commands.len() {
            return None;
        }
        let command = self.commands.remove(index);
        Some(command.config())
    }

    pub fn command(&self, index: usize) -> Option<&DispatchCommand> {
        self.commands.get(index)
    }

    pub fn commands(&self) -> &[DispatchCommand] {
        &self.commands
    }

    /// Button titles of every command, in order
    pub fn command_titles(&self) -> Vec<String> {
        self.commands.iter().map(|command| command.title()).collect()
    }

    /// Cancel every pending delayed dispatch, returning how many were cancelled
    pub fn stop(&self) -> usize {
        self.commands
            .iter()
            .map(DispatchCommand::cancel_pending)
            .sum()
    }

    /// Current state as a manifest
    pub fn to_manifest(&self) -> FlowchartManifest {
        FlowchartManifest {
            flowchart: self.settings.clone(),
            logging: self.logging.clone(),
            variables: self.variables.snapshot(),
            commands: self.commands.iter().map(DispatchCommand::config).collect(),
        }
    }
}

impl std::fmt::Debug for Flowchart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flowchart")
            .field("settings", &self.settings)
            .field("variables", &self.variables)
            .field("commands", &self.commands)
            .finish()
    }
}
