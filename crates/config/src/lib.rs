//! Configuration loading, validation, and management for Leash.
//!
//! Loads configuration from `~/.leash/config.toml` with environment
//! variable overrides. Validates all settings at startup. The loop core
//! consumes this configuration but does not own it: ceilings, model id,
//! and temperature are handed in at session start.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.leash/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default provider name
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Loop ceilings
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Search tool configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// CRM bridge configuration
    #[serde(default)]
    pub crm: CrmConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Override the synthesized context message entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.5
}
fn default_max_tokens() -> u32 {
    4096
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("limits", &self.limits)
            .field("search", &self.search)
            .field("crm", &self.crm)
            .field("providers", &self.providers)
            .finish()
    }
}

/// The two ceilings that make loop termination provable.
///
/// `max_tool_calls` is the policy budget (a normal stop when reached).
/// `max_iterations` is the hard driver ceiling; exceeding it is a fatal
/// abort signaling a non-converging loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls: u32,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_max_tool_calls() -> u32 {
    5
}
fn default_max_iterations() -> u32 {
    15
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_tool_calls: default_max_tool_calls(),
            max_iterations: default_max_iterations(),
        }
    }
}

/// Search tool configuration. With no API key the search tool degrades
/// to a stub that explains unavailability; it is never omitted.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_search_results")]
    pub max_results: u32,
}

fn default_search_results() -> u32 {
    3
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("api_key", &redact(&self.api_key))
            .field("max_results", &self.max_results)
            .finish()
    }
}

/// CRM bridge configuration.
///
/// The CRM is reached through a separate integration process: `command` is
/// spawned per request and spoken to over stdio. When the section is not
/// configured, the CRM tools are silently omitted from the registry — they
/// never crash registry assembly.
#[derive(Clone, Serialize, Deserialize)]
pub struct CrmConfig {
    /// Command to launch the integration process (e.g. "npx")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Arguments for the integration process
    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_token: Option<String>,

    #[serde(default = "default_crm_instance_url")]
    pub instance_url: String,

    /// Per-request timeout for the integration process
    #[serde(default = "default_crm_timeout")]
    pub timeout_secs: u64,
}

fn default_crm_instance_url() -> String {
    "https://login.salesforce.com".into()
}
fn default_crm_timeout() -> u64 {
    30
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: vec![],
            username: None,
            password: None,
            security_token: None,
            instance_url: default_crm_instance_url(),
            timeout_secs: default_crm_timeout(),
        }
    }
}

impl CrmConfig {
    /// Whether enough is configured to register the CRM tools.
    ///
    /// The security token may legitimately be empty (trusted IP ranges),
    /// so only command + username + password are required.
    pub fn is_configured(&self) -> bool {
        self.command.is_some() && self.username.is_some() && self.password.is_some()
    }
}

impl std::fmt::Debug for CrmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrmConfig")
            .field("command", &self.command)
            .field("args", &self.args)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("security_token", &redact(&self.security_token))
            .field("instance_url", &self.instance_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.leash/config.toml).
    ///
    /// Environment variable overrides:
    /// - `LEASH_API_KEY`, `OPENROUTER_API_KEY`, `OPENAI_API_KEY` — model key
    /// - `LEASH_PROVIDER`, `LEASH_MODEL` — provider/model selection
    /// - `TAVILY_API_KEY` — search tool key
    /// - `CRM_COMMAND`, `CRM_USERNAME`, `CRM_PASSWORD`,
    ///   `CRM_SECURITY_TOKEN`, `CRM_INSTANCE_URL` — CRM bridge
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, without env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("LEASH_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("LEASH_PROVIDER") {
            self.default_provider = provider;
        }

        if let Ok(model) = std::env::var("LEASH_MODEL") {
            self.default_model = model;
        }

        if self.search.api_key.is_none() {
            self.search.api_key = std::env::var("TAVILY_API_KEY").ok();
        }

        if self.crm.command.is_none() {
            self.crm.command = std::env::var("CRM_COMMAND").ok();
        }
        if self.crm.username.is_none() {
            self.crm.username = std::env::var("CRM_USERNAME").ok();
        }
        if self.crm.password.is_none() {
            self.crm.password = std::env::var("CRM_PASSWORD").ok();
        }
        if self.crm.security_token.is_none() {
            self.crm.security_token = std::env::var("CRM_SECURITY_TOKEN").ok();
        }
        if let Ok(url) = std::env::var("CRM_INSTANCE_URL") {
            self.crm.instance_url = url;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".leash")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.limits.max_tool_calls == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_tool_calls must be at least 1".into(),
            ));
        }

        // The hard ceiling must be able to outlast a full budget run plus
        // the final text turn, otherwise every budget-limited conversation
        // would abort fatally instead of stopping normally.
        if self.limits.max_iterations <= self.limits.max_tool_calls {
            return Err(ConfigError::ValidationError(
                "limits.max_iterations must be greater than limits.max_tool_calls".into(),
            ));
        }

        Ok(())
    }

    /// Check if a model API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for first-run setup hints).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            limits: LimitsConfig::default(),
            search: SearchConfig {
                api_key: None,
                max_results: default_search_results(),
            },
            crm: CrmConfig::default(),
            providers: HashMap::new(),
            system_prompt_override: None,
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_model, "gpt-4o-mini");
        assert_eq!(config.limits.max_tool_calls, 5);
        assert_eq!(config.limits.max_iterations, 15);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_model, config.default_model);
        assert_eq!(parsed.limits.max_tool_calls, config.limits.max_tool_calls);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn iteration_ceiling_must_exceed_budget() {
        let config = AppConfig {
            limits: LimitsConfig {
                max_tool_calls: 5,
                max_iterations: 5,
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_tool_budget_rejected() {
        let config = AppConfig {
            limits: LimitsConfig {
                max_tool_calls: 0,
                max_iterations: 15,
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        let config = result.unwrap();
        assert_eq!(config.default_provider, "openai");
    }

    #[test]
    fn crm_unconfigured_by_default() {
        let config = AppConfig::default();
        assert!(!config.crm.is_configured());
    }

    #[test]
    fn crm_configured_without_security_token() {
        let crm = CrmConfig {
            command: Some("npx".into()),
            username: Some("user@example.com".into()),
            password: Some("hunter2".into()),
            ..CrmConfig::default()
        };
        assert!(crm.is_configured());
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn limits_parse_from_toml() {
        let toml_str = r#"
[limits]
max_tool_calls = 3
max_iterations = 10
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.limits.max_tool_calls, 3);
        assert_eq!(config.limits.max_iterations, 10);
    }
}
