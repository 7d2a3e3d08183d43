//! Registry configuration.
//!
//! Configuration is read from a small YAML document:
//!
//! ```yaml
//! max-notification-depth: 64
//! trace: summary
//! instance-separator: ":"
//! ```
//!
//! Every key is optional. `max-notification-depth: null` removes the depth
//! limit.

use crate::error::{Error, Result};
use crate::scheme::DEFAULT_SEPARATOR;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default limit on re-entrant notification nesting
pub const DEFAULT_MAX_NOTIFICATION_DEPTH: usize = 64;

/// Diagnostic verbosity of the registry.
///
/// Only affects what is logged, never behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceLevel {
    /// Only warnings
    #[default]
    Off,

    /// One line per notification and per rejected edge
    Summary,

    /// Every callback and every edge mutation
    Verbose,
}

impl TraceLevel {
    /// Returns `true` if messages at `level` should be emitted.
    #[must_use]
    pub fn enables(self, level: TraceLevel) -> bool {
        self >= level
    }
}

/// Configuration file structure for a registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct RegistryConfig {
    /// Maximum nesting of re-entrant notifications; `None` for no limit
    pub max_notification_depth: Option<usize>,

    /// Initial trace level
    pub trace: TraceLevel,

    /// Separator between class and instance names for the delimited scheme
    pub instance_separator: char,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_notification_depth: Some(DEFAULT_MAX_NOTIFICATION_DEPTH),
            trace: TraceLevel::Off,
            instance_separator: DEFAULT_SEPARATOR,
        }
    }
}

impl RegistryConfig {
    /// Load configuration from a file
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and
    /// [`Error::Config`] if it is not a valid configuration.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on malformed YAML or invalid values.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as YAML
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if serialization fails.
    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::Config(format!("YAML error: {e}")))
    }

    /// Check that values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the depth limit is zero or the separator
    /// is whitespace or a control character.
    pub fn validate(&self) -> Result<()> {
        if self.max_notification_depth == Some(0) {
            return Err(Error::Config(
                "max-notification-depth must be at least 1".to_string(),
            ));
        }

        if self.instance_separator.is_whitespace() || self.instance_separator.is_control() {
            return Err(Error::Config(format!(
                "instance-separator {:?} cannot be whitespace or a control character",
                self.instance_separator
            )));
        }

        Ok(())
    }
}
