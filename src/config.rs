use crate::error::{Error, Result};
use log::Level;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration, usually read from a `rustbars.toml`
///
/// ```toml
/// [engine]
/// max_partial_depth = 32
/// log_level = "debug"
///
/// [loader]
/// extensions = ["hbs", "html"]
/// recursive = true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub loader: LoaderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Ceiling on nested partial inclusion; unlimited when unset
    #[serde(default)]
    pub max_partial_depth: Option<usize>,

    /// Default level of the `log` helper
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// File extensions to load, without the dot; empty accepts every file
    #[serde(default)]
    pub extensions: Vec<String>,

    #[serde(default = "default_recursive")]
    pub recursive: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_recursive() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_partial_depth: None,
            log_level: default_log_level(),
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            extensions: Vec::new(),
            recursive: default_recursive(),
        }
    }
}

impl EngineConfig {
    pub fn with_max_partial_depth(mut self, depth: usize) -> Self {
        self.max_partial_depth = Some(depth);
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Parsed `log_level`, falling back to `Info` when unrecognised
    pub fn log_level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::Info)
    }
}

impl LoaderConfig {
    /// Whether a discovered file should be loaded
    pub fn accepts(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }

        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|allowed| allowed == ext))
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.engine.log_level.parse::<Level>().is_err() {
            return Err(Error::config(format!(
                "unknown log level '{}', expected one of error, warn, info, debug, trace",
                self.engine.log_level
            )));
        }

        if self.engine.max_partial_depth == Some(0) {
            return Err(Error::config("max_partial_depth must be at least 1"));
        }

        if let Some(bad) = self.loader.extensions.iter().find(|ext| ext.starts_with('.')) {
            return Err(Error::config(format!(
                "extension '{}' should be given without the leading dot",
                bad
            )));
        }

        Ok(())
    }
}

#[cfg(feature = "config")]
impl Config {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let content = std::fs::read_to_string(path_ref).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {}",
                path_ref.display(),
                e
            ))
        })?;

        let config = Self::from_toml_str(&content)
            .map_err(|e| e.with_context(format!("in config file '{}'", path_ref.display())))?;

        log::debug!(
            "Successfully loaded configuration from: {}",
            path_ref.display()
        );
        Ok(config)
    }
}
