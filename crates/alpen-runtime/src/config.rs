#![forbid(unsafe_code)]

//! Runtime configuration.
//!
//! With the `config-file` feature, a [`RuntimeConfig`] can be loaded from
//! TOML or JSON text. Missing fields take their defaults.
//!
//! ```toml
//! prefix = "x-"
//! max_task_reruns = 100
//! diagnostics_capacity = 256
//! observe_mutations = true
//! ```

use std::fmt;

use crate::diagnostics::DEFAULT_CAPACITY;
use crate::scheduler::DEFAULT_MAX_TASK_RERUNS;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a [`crate::Runtime`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config-file", derive(serde::Deserialize))]
#[cfg_attr(feature = "config-file", serde(default, deny_unknown_fields))]
pub struct RuntimeConfig {
    /// Attribute prefix for directives.
    /// Default: `"x-"`
    pub prefix: String,

    /// How often one task may be re-queued within a single flush before it
    /// is dropped and reported.
    /// Default: 100
    pub max_task_reruns: u32,

    /// Size of the diagnostics ring buffer. Zero disables buffering;
    /// subscribers and logging still see every report.
    /// Default: 256
    pub diagnostics_capacity: usize,

    /// Initialize elements inserted after `start()` and dispose removed ones.
    /// Default: true
    pub observe_mutations: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            prefix: "x-".to_string(),
            max_task_reruns: DEFAULT_MAX_TASK_RERUNS,
            diagnostics_capacity: DEFAULT_CAPACITY,
            observe_mutations: true,
        }
    }
}

impl RuntimeConfig {
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_max_task_reruns(mut self, max: u32) -> Self {
        self.max_task_reruns = max;
        self
    }

    #[must_use]
    pub fn with_diagnostics_capacity(mut self, capacity: usize) -> Self {
        self.diagnostics_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_observe_mutations(mut self, observe: bool) -> Self {
        self.observe_mutations = observe;
        self
    }

    /// Check field ranges.
    ///
    /// # Errors
    ///
    /// [`ConfigError::EmptyPrefix`] for an empty or whitespace prefix,
    /// [`ConfigError::ZeroReruns`] when no task could ever run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prefix.trim().is_empty() || self.prefix.contains(char::is_whitespace) {
            return Err(ConfigError::EmptyPrefix);
        }
        if self.max_task_reruns == 0 {
            return Err(ConfigError::ZeroReruns);
        }
        Ok(())
    }

    /// Parse and validate TOML.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] on malformed input, or any validation error.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse {
            format: "toml",
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate JSON.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] on malformed input, or any validation error.
    #[cfg(feature = "config-file")]
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            format: "json",
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }
}

/// Invalid configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptyPrefix,
    ZeroReruns,
    Parse {
        format: &'static str,
        message: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPrefix => write!(f, "directive prefix must be non-empty without whitespace"),
            Self::ZeroReruns => write!(f, "max_task_reruns must be at least 1"),
            Self::Parse { format, message } => write!(f, "invalid {format} config: {message}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RuntimeConfig::default();
        assert_eq!(config.prefix, "x-");
        assert_eq!(config.max_task_reruns, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_and_validation() {
        let config = RuntimeConfig::default()
            .with_prefix("data-x-")
            .with_max_task_reruns(3)
            .with_observe_mutations(false);
        assert!(config.validate().is_ok());
        assert!(!config.observe_mutations);
        assert_eq!(
            RuntimeConfig::default().with_prefix(" ").validate(),
            Err(ConfigError::EmptyPrefix)
        );
        assert_eq!(
            RuntimeConfig::default().with_max_task_reruns(0).validate(),
            Err(ConfigError::ZeroReruns)
        );
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn loads_partial_toml_and_json() {
        let config = RuntimeConfig::from_toml_str("prefix = \"v-\"\nmax_task_reruns = 7").unwrap();
        assert_eq!(config.prefix, "v-");
        assert_eq!(config.max_task_reruns, 7);
        assert_eq!(config.diagnostics_capacity, 256);

        let config = RuntimeConfig::from_json_str(r#"{ "observe_mutations": false }"#).unwrap();
        assert!(!config.observe_mutations);

        assert!(matches!(
            RuntimeConfig::from_toml_str("bogus = 1"),
            Err(ConfigError::Parse { format: "toml", .. })
        ));
        assert_eq!(
            RuntimeConfig::from_json_str(r#"{ "max_task_reruns": 0 }"#),
            Err(ConfigError::ZeroReruns)
        );
    }
}
