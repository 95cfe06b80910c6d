//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and the resolved configuration
//! the front end starts from.

use std::path::PathBuf;

use arrrg_derive::CommandLine;

use crate::config_store::ConfigStore;
use crate::error::Result;

/// Command-line arguments for the chatwindow tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Model to select at start.
    #[arrrg(optional, "Model to select (default: first model in the table)", "MODEL")]
    pub model: Option<String>,

    /// Model table to load instead of the built-in one.
    #[arrrg(optional, "YAML model table to load", "PATH")]
    pub config: Option<String>,

    /// Backend endpoint.
    #[arrrg(optional, "Base URL of the Messages endpoint", "URL")]
    pub base_url: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat front end.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// The model to select at start; `None` selects the table's first model.
    pub model: Option<String>,

    /// A model table on disk; `None` uses the built-in table.
    pub config_path: Option<PathBuf>,

    /// Overrides the backend endpoint.
    pub base_url: Option<String>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values: built-in table, its first model, color on.
    pub fn new() -> Self {
        Self {
            model: None,
            config_path: None,
            base_url: None,
            use_color: true,
        }
    }

    /// Sets the model to select.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the model table to load.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Load the model table this configuration names.
    pub fn load_store(&self) -> Result<ConfigStore> {
        match &self.config_path {
            Some(path) => ConfigStore::from_file(path),
            None => ConfigStore::builtin(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        ChatConfig {
            model: args.model,
            config_path: args.config.map(PathBuf::from),
            base_url: args.base_url,
            use_color: !args.no_color,
        }
    }
}
