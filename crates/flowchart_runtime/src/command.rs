// Command - Metadata and entry point shared by flowchart commands
//
// A sequence runs its commands in order. Entering a command starts it; the
// sequence moves on as soon as `enter` returns.

use serde::{Deserialize, Serialize};

/// Static description of a command type, as listed in the editor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInfo {
    /// Menu category (e.g., "Scripting")
    pub category: &'static str,
    /// Display name
    pub name: &'static str,
    pub description: &'static str,
}

impl CommandInfo {
    /// `"<category>/<name>"`
    pub fn path(&self) -> String {
        format!("{}/{}", self.category, self.name)
    }
}

/// Colour of a command's button in the sequence view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ButtonColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl ButtonColor {
    pub const WHITE: ButtonColor = ButtonColor::rgba(255, 255, 255, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for ButtonColor {
    fn default() -> Self {
        Self::WHITE
    }
}

/// A step in a sequence
pub trait Command: Send + Sync {
    /// Static metadata for this command type
    fn info(&self) -> &'static CommandInfo;

    /// Start the command
    fn enter(&self);

    /// One-line description of the configured command
    fn summary(&self) -> String {
        String::new()
    }

    fn button_color(&self) -> ButtonColor {
        ButtonColor::default()
    }

    /// `"<name>: <summary>"`, or just the name if there is no summary
    fn title(&self) -> String {
        let summary = self.summary();
        if summary.is_empty() {
            self.info().name.to_string()
        } else {
            format!("{}: {}", self.info().name, summary)
        }
    }
}
