//! Configuration loading and gateway resolution
//!
//! Settings come from four places, highest priority first:
//! 1. Command-line argument
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing config file is not an error: the resolver warns and continues
//! with defaults. A config file that exists but does not parse is.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the gateway URL
pub const GATEWAY_URL_ENV: &str = "COOKBOOK_GATEWAY_URL";

/// Environment variable overriding the session cookie
pub const SESSION_COOKIE_ENV: &str = "COOKBOOK_SESSION_COOKIE";

/// Environment variable pointing at an explicit config file
pub const CONFIG_PATH_ENV: &str = "COOKBOOK_CONFIG";

/// Compiled defaults used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub gateway_url: String,
    pub log_level: String,
    pub save_max_attempts: u32,
    pub save_retry_delay_ms: u64,
    pub event_capacity: usize,
}

impl CompiledDefaults {
    pub fn get() -> Self {
        Self {
            gateway_url: "http://127.0.0.1:4000/graphql".to_string(),
            log_level: "info".to_string(),
            save_max_attempts: 3,
            save_retry_delay_ms: 500,
            event_capacity: 256,
        }
    }
}

/// Logging section of the TOML file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    CompiledDefaults::get().log_level
}

/// Save retry section of the TOML file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaveConfig {
    /// Attempts per save batch, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay between attempts of the same batch
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    CompiledDefaults::get().save_max_attempts
}

fn default_retry_delay_ms() -> u64 {
    CompiledDefaults::get().save_retry_delay_ms
}

fn default_event_capacity() -> usize {
    CompiledDefaults::get().event_capacity
}

/// Contents of `config.toml`
///
/// Every field is optional so older files keep parsing as fields are added.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    #[serde(default)]
    pub gateway_url: Option<String>,
    /// Raw `Cookie` header value carrying the signed session
    #[serde(default)]
    pub session_cookie: Option<String>,
    /// Identity of the signed-in user (used by the owner-only filter)
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub save: SaveConfig,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            gateway_url: None,
            session_cookie: None,
            owner: None,
            logging: LoggingConfig::default(),
            save: SaveConfig::default(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl TomlConfig {
    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }
}

/// Resolves effective settings from CLI, environment, TOML and defaults
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    cli_gateway: Option<String>,
    cli_config_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self {
            cli_gateway: None,
            cli_config_path: None,
        }
    }

    /// Gateway URL given on the command line
    pub fn with_gateway(mut self, url: Option<String>) -> Self {
        self.cli_gateway = url;
        self
    }

    /// Config file given on the command line
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.cli_config_path = path;
        self
    }

    /// Path of the config file that would be read, if one can be determined
    pub fn config_file_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_config_path {
            return Some(path.clone());
        }
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|d| d.join("cookbook").join("config.toml"))
    }

    /// Load the TOML file, falling back to defaults when it does not exist
    pub fn load_toml(&self) -> Result<TomlConfig> {
        match self.config_file_path() {
            Some(path) if path.exists() => {
                debug!(path = %path.display(), "Loading config file");
                TomlConfig::load(&path)
            }
            Some(path) => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(TomlConfig::default())
            }
            None => {
                warn!("Could not determine config directory, using defaults");
                Ok(TomlConfig::default())
            }
        }
    }

    /// Resolve the full effective configuration
    pub fn resolve(&self) -> Result<TomlConfig> {
        let mut config = self.load_toml()?;
        config.gateway_url = Some(self.resolve_gateway_url(&config));
        if let Ok(cookie) = std::env::var(SESSION_COOKIE_ENV) {
            if !cookie.trim().is_empty() {
                config.session_cookie = Some(cookie);
            }
        }
        if config.save.max_attempts == 0 {
            return Err(Error::Config("save.max_attempts must be at least 1".to_string()));
        }
        Ok(config)
    }

    /// Gateway URL by priority: CLI, environment, TOML, compiled default
    pub fn resolve_gateway_url(&self, toml_config: &TomlConfig) -> String {
        if let Some(url) = &self.cli_gateway {
            return url.clone();
        }
        if let Ok(url) = std::env::var(GATEWAY_URL_ENV) {
            if !url.trim().is_empty() {
                return url;
            }
        }
        if let Some(url) = &toml_config.gateway_url {
            return url.clone();
        }
        CompiledDefaults::get().gateway_url
    }
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}
