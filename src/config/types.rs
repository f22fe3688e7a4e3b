use serde::{Deserialize, Serialize};
use std::fmt;

/// Validated tab name. Cannot be empty or only whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct TabName(String);

impl TabName {
    pub fn new(name: &str) -> Result<Self, ConfigError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::InvalidTabName {
                name: name.to_string(),
                reason: "tab name cannot be empty".to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TabName {
    type Error = ConfigError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl fmt::Display for TabName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validated glob over tab names, e.g. `&clipboard` or `notes/*`.
#[derive(Debug, Clone)]
pub struct TabPattern {
    raw: String,
    pattern: glob::Pattern,
}

impl TabPattern {
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::InvalidTabPattern {
                pattern: pattern.to_string(),
                reason: "tab pattern cannot be empty".to_string(),
            });
        }
        let compiled = glob::Pattern::new(trimmed).map_err(|e| ConfigError::InvalidTabPattern {
            pattern: pattern.to_string(),
            reason: format!("invalid glob syntax: {e}"),
        })?;
        Ok(Self { raw: trimmed.to_string(), pattern: compiled })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, tab: &str) -> bool {
        self.pattern.matches(tab)
    }
}

impl PartialEq for TabPattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for TabPattern {}

impl fmt::Display for TabPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// All config errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid tab name '{name}': {reason}")]
    InvalidTabName { name: String, reason: String },

    #[error("invalid tab pattern '{pattern}': {reason}")]
    InvalidTabPattern { pattern: String, reason: String },

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("config file not found: {path}")]
    NotFound { path: String },
}
