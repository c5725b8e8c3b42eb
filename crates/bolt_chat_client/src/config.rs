//! Config load/save for `~/.bolt-chat/config.yaml`.
//! Sections: `api.*` (provider), `chat.*` (session), `server.*` (web UI).

use std::path::{Path, PathBuf};

use crate::links::DEFAULT_ENCYCLOPEDIA_LANG;

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a friendly teacher who explains coding in the simplest possible way.";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8501;

/// Env var naming the config file; overridden by `--config`.
pub const CONFIG_ENV: &str = "BOLT_CHAT_CONFIG";
/// Env var holding the provider API key; wins over `api.api_key`.
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// API section (base_url, api_key, model).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ApiSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Chat section (system_prompt, encyclopedia_lang).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ChatSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encyclopedia_lang: Option<String>,
}

/// Server section (host, port).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ServerSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// Full config file.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub chat: ChatSection,
    #[serde(default)]
    pub server: ServerSection,
}

/// Provider settings with defaults applied and the API key resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl Config {
    /// Resolve provider settings. `GROQ_API_KEY` takes precedence over the file;
    /// a blank key counts as missing.
    pub fn api_settings(&self) -> Result<ApiSettings, ConfigError> {
        let env_key = std::env::var(API_KEY_ENV).ok();
        self.api_settings_with_key(env_key.as_deref())
    }

    fn api_settings_with_key(&self, env_key: Option<&str>) -> Result<ApiSettings, ConfigError> {
        let api_key = env_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .or_else(|| non_blank(&self.api.api_key).map(str::trim))
            .ok_or(ConfigError::MissingApiKey)?;
        Ok(ApiSettings {
            base_url: non_blank(&self.api.base_url).unwrap_or(DEFAULT_BASE_URL).to_string(),
            api_key: api_key.to_string(),
            model: non_blank(&self.api.model).unwrap_or(DEFAULT_MODEL).to_string(),
        })
    }

    pub fn system_prompt(&self) -> &str {
        non_blank(&self.chat.system_prompt).unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }

    pub fn encyclopedia_lang(&self) -> &str {
        non_blank(&self.chat.encyclopedia_lang).unwrap_or(DEFAULT_ENCYCLOPEDIA_LANG)
    }

    /// `host:port` for the web UI listener.
    pub fn listen_addr(&self) -> String {
        format!(
            "{}:{}",
            non_blank(&self.server.host).unwrap_or(DEFAULT_HOST),
            self.server.port.unwrap_or(DEFAULT_PORT)
        )
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Returns the default config file path: `~/.bolt-chat/config.yaml` (platform-specific).
pub fn default_config_path() -> Option<PathBuf> {
    let home = home_dir()?;
    Some(home.join(".bolt-chat").join("config.yaml"))
}

#[cfg(unix)]
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[cfg(windows)]
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE").map(PathBuf::from)
}

#[cfg(not(any(unix, windows)))]
fn home_dir() -> Option<PathBuf> {
    None
}

/// Where the config came from. Only an explicitly named file is required to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLocation {
    Explicit(PathBuf),
    Default(PathBuf),
    None,
}

/// Pick the config file: `--config` flag, then `BOLT_CHAT_CONFIG`, then the default path.
pub fn resolve_config_path(flag: Option<&str>) -> ConfigLocation {
    if let Some(p) = flag {
        return ConfigLocation::Explicit(PathBuf::from(p));
    }
    if let Some(val) = std::env::var_os(CONFIG_ENV) {
        return ConfigLocation::Explicit(PathBuf::from(val));
    }
    match default_config_path() {
        Some(p) => ConfigLocation::Default(p),
        None => ConfigLocation::None,
    }
}

/// Load the resolved config; a missing default file yields `Config::default()`.
pub fn load_from(location: &ConfigLocation) -> Result<Config, ConfigError> {
    match location {
        ConfigLocation::Explicit(path) => load(path),
        ConfigLocation::Default(path) if path.exists() => load(path),
        ConfigLocation::Default(path) => {
            log::info!("no config at {}, using defaults", path.display());
            Ok(Config::default())
        }
        ConfigLocation::None => Ok(Config::default()),
    }
}

/// Load config from a YAML file. Path is typically `~/.bolt-chat/config.yaml`.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&contents)?)
}

/// Save config to a YAML file. Creates parent directory if missing.
pub fn save(path: &Path, config: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

/// Config load/save error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error(
        "API key is not configured: set {} or api.api_key in ~/.bolt-chat/config.yaml",
        API_KEY_ENV
    )]
    MissingApiKey,
}
