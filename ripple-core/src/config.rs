//! Runtime configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Settings for a [`Runtime`](crate::reactive::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Name attached to every log event the runtime emits. Useful when
    /// several runtimes share a process.
    pub label: String,
}

impl RuntimeConfig {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        if config.label.trim().is_empty() {
            return Err(ConfigError::EmptyLabel);
        }
        Ok(config)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new("default")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = RuntimeConfig::from_json("{}").expect("empty object is valid");
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.label, "default");
    }

    #[test]
    fn label_is_read_from_json() {
        let config = RuntimeConfig::from_json(r#"{ "label": "editor" }"#).expect("valid");
        assert_eq!(config.label, "editor");
    }

    #[test]
    fn rejects_unknown_fields_and_blank_labels() {
        assert!(matches!(
            RuntimeConfig::from_json(r#"{ "lable": "typo" }"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_json(r#"{ "label": "  " }"#),
            Err(ConfigError::EmptyLabel)
        ));
    }
}
