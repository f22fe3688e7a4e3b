use crate::config::types::{ConfigError, TabName, TabPattern};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level archiver configuration.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub database: PathBuf,
    pub copyq: CopyQConfig,
    /// Default save scope. Empty = every tab the source reports.
    pub tabs: Vec<TabName>,
    pub exclude_tabs: Vec<TabPattern>,
}

/// How to reach the CopyQ binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyQConfig {
    /// Executable name or path. Defaults to "copyq".
    pub command: String,
    /// Upper bound for a single CopyQ call.
    pub timeout: Duration,
}

impl Default for CopyQConfig {
    fn default() -> Self {
        Self {
            command: "copyq".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ArchiveConfig {
    /// Defaults rooted at the given config directory.
    pub fn defaults_in(dir: &Path) -> Self {
        Self {
            database: dir.join(DB_NAME),
            copyq: CopyQConfig::default(),
            tabs: Vec::new(),
            exclude_tabs: Vec::new(),
        }
    }
}

const CONFIG_NAME: &str = "config.yml";
const DB_NAME: &str = "history.db";

/// Raw YAML representation of config.yml.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    database: Option<String>,
    #[serde(default)]
    copyq: Option<RawCopyQConfig>,
    #[serde(default)]
    tabs: Vec<String>,
    #[serde(default)]
    exclude_tabs: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCopyQConfig {
    command: Option<String>,
    timeout_secs: Option<u64>,
}

/// Load and validate the archiver config.
/// With no path, reads `<config_dir>/config.yml` and falls back to defaults if it is absent.
pub fn load(path: Option<&Path>) -> Result<ArchiveConfig, ConfigError> {
    let dir = config_dir();
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::NotFound { path: p.display().to_string() });
            }
            p.to_path_buf()
        }
        None => {
            let default_path = dir.join(CONFIG_NAME);
            if !default_path.exists() {
                return Ok(ArchiveConfig::defaults_in(&dir));
            }
            default_path
        }
    };

    let contents = std::fs::read_to_string(&config_path)?;
    parse(&contents, &dir)
}

fn parse(contents: &str, dir: &Path) -> Result<ArchiveConfig, ConfigError> {
    // An empty file deserializes to unit, not to a map
    let raw: RawConfig = if contents.trim().is_empty() {
        RawConfig::default()
    } else {
        serde_yaml::from_str(contents)?
    };

    let defaults = ArchiveConfig::defaults_in(dir);

    let database = raw.database.as_deref().map(expand_tilde).unwrap_or(defaults.database);

    let copyq = match raw.copyq {
        Some(raw_copyq) => {
            let command = match raw_copyq.command {
                Some(c) if c.trim().is_empty() => {
                    return Err(ConfigError::InvalidValue {
                        key: "copyq.command",
                        reason: "command cannot be empty".to_string(),
                    });
                }
                Some(c) => c.trim().to_string(),
                None => defaults.copyq.command,
            };
            let timeout = match raw_copyq.timeout_secs {
                Some(0) => {
                    return Err(ConfigError::InvalidValue {
                        key: "copyq.timeout_secs",
                        reason: "timeout must be at least one second".to_string(),
                    });
                }
                Some(secs) => Duration::from_secs(secs),
                None => defaults.copyq.timeout,
            };
            CopyQConfig { command, timeout }
        }
        None => defaults.copyq,
    };

    let mut tabs = Vec::new();
    for t in &raw.tabs {
        tabs.push(TabName::new(t)?);
    }

    let mut exclude_tabs = Vec::new();
    for p in &raw.exclude_tabs {
        exclude_tabs.push(TabPattern::new(p)?);
    }

    Ok(ArchiveConfig { database, copyq, tabs, exclude_tabs })
}

/// Resolve the config directory. Defaults to ~/.copyq-archive.
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("COPYQ_ARCHIVE_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".copyq-archive")
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}
