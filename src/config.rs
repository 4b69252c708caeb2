use crate::error::{RelayError, Result};
use crate::providers::{ProviderPreset, DEFAULT_PROVIDER};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Prefix of the environment variables that override provider settings.
pub const ENV_PREFIX: &str = "OPENAI_";

const DEFAULT_CONFIG_FILE: &str = "chat-relay.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Settings of the upstream chat completion client. Read-only once the
/// server starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_provider_name")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_temperature")]
    pub temperature: Option<f64>,
    #[serde(default = "default_top_p")]
    pub top_p: Option<f64>,
    #[serde(default = "default_penalty")]
    pub frequency_penalty: Option<f64>,
    #[serde(default = "default_penalty")]
    pub presence_penalty: Option<f64>,
    /// Seconds.
    #[serde(default = "default_timeout")]
    pub timeout: f64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_provider_name() -> String {
    DEFAULT_PROVIDER.to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

#[allow(clippy::unnecessary_wraps)]
fn default_temperature() -> Option<f64> {
    Some(0.7)
}

#[allow(clippy::unnecessary_wraps)]
fn default_top_p() -> Option<f64> {
    Some(1.0)
}

#[allow(clippy::unnecessary_wraps)]
fn default_penalty() -> Option<f64> {
    Some(0.0)
}

fn default_timeout() -> f64 {
    60.0
}

fn default_max_retries() -> u32 {
    3
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            base_url: None,
            api_key: String::new(),
            model: default_model(),
            max_tokens: None,
            temperature: default_temperature(),
            top_p: default_top_p(),
            frequency_penalty: default_penalty(),
            presence_penalty: default_penalty(),
            timeout: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl RelayConfig {
    /// Load config from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the explicit file if given, else `chat-relay.toml` from the
    /// current directory if it exists, else defaults.
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        let candidate = PathBuf::from(DEFAULT_CONFIG_FILE);
        if candidate.exists() {
            tracing::info!(path = %candidate.display(), "Loading config");
            return Self::load(&candidate);
        }

        tracing::debug!("No config file found, using defaults and environment");
        Ok(Self::default())
    }

    /// Apply `OPENAI_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply `OPENAI_*` overrides from an arbitrary lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            let key = format!("{ENV_PREFIX}{name}");
            lookup(&key).map(|value| (key, value))
        };
        let p = &mut self.provider;

        if let Some((_, v)) = get("API_KEY") {
            p.api_key = v;
        }
        if let Some((_, v)) = get("BASE_URL") {
            p.base_url = Some(v);
        }
        if let Some((_, v)) = get("MODEL") {
            p.model = v;
        }
        if let Some((k, v)) = get("MAX_TOKENS") {
            p.max_tokens = Some(parse_env(&k, &v)?);
        }
        if let Some((k, v)) = get("TEMPERATURE") {
            p.temperature = Some(parse_env(&k, &v)?);
        }
        if let Some((k, v)) = get("TOP_P") {
            p.top_p = Some(parse_env(&k, &v)?);
        }
        if let Some((k, v)) = get("FREQUENCY_PENALTY") {
            p.frequency_penalty = Some(parse_env(&k, &v)?);
        }
        if let Some((k, v)) = get("PRESENCE_PENALTY") {
            p.presence_penalty = Some(parse_env(&k, &v)?);
        }
        if let Some((k, v)) = get("TIMEOUT") {
            p.timeout = parse_env(&k, &v)?;
        }
        if let Some((k, v)) = get("MAX_RETRIES") {
            p.max_retries = parse_env(&k, &v)?;
        }
        Ok(())
    }

    /// Check every provider parameter against the range the provider accepts.
    pub fn validate(&self) -> Result<()> {
        let p = &self.provider;

        if p.model.trim().is_empty() {
            return Err(RelayError::config("provider.model must not be empty"));
        }
        if let Some(max_tokens) = p.max_tokens {
            if !(1..=4096).contains(&max_tokens) {
                return Err(RelayError::config(format!(
                    "provider.max_tokens must be within 1..=4096, got {max_tokens}"
                )));
            }
        }
        check_range("temperature", p.temperature, 0.0, 2.0)?;
        check_range("top_p", p.top_p, 0.0, 1.0)?;
        check_range("frequency_penalty", p.frequency_penalty, -2.0, 2.0)?;
        check_range("presence_penalty", p.presence_penalty, -2.0, 2.0)?;
        if !(p.timeout > 0.0 && Duration::try_from_secs_f64(p.timeout).is_ok()) {
            return Err(RelayError::config(format!(
                "provider.timeout must be a positive number of seconds, got {}",
                p.timeout
            )));
        }
        if p.max_retries > 10 {
            return Err(RelayError::config(format!(
                "provider.max_retries must be within 0..=10, got {}",
                p.max_retries
            )));
        }
        p.effective_base_url().map(|_| ())
    }
}

impl ProviderSettings {
    /// Resolve the effective base URL (explicit setting or provider preset)
    pub fn effective_base_url(&self) -> Result<String> {
        if let Some(ref url) = self.base_url {
            return Ok(url.trim_end_matches('/').to_string());
        }

        let preset = ProviderPreset::from_name(&self.name).ok_or_else(|| {
            RelayError::config(format!(
                "Unknown provider '{}' and no base_url configured. Known providers: {}",
                self.name,
                ProviderPreset::names().join(", ")
            ))
        })?;

        Ok(preset.base_url.to_string())
    }

    /// Request timeout. Values too large for a `Duration` saturate.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout).unwrap_or(Duration::MAX)
    }
}

fn parse_env<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse()
        .map_err(|e| RelayError::config(format!("Invalid value '{raw}' for {key}: {e}")))
}

fn check_range(name: &str, value: Option<f64>, min: f64, max: f64) -> Result<()> {
    match value {
        Some(v) if !(min..=max).contains(&v) => Err(RelayError::config(format!(
            "provider.{name} must be within {min}..={max}, got {v}"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.provider.model, "gpt-3.5-turbo");
        assert_eq!(config.provider.temperature, Some(0.7));
        assert_eq!(config.provider.max_tokens, None);
        assert_eq!(config.provider.max_retries, 3);
        assert_eq!(config.provider.timeout(), Duration::from_secs(60));
        config.validate().unwrap();
    }

    #[test]
    fn test_load_config() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
[server]
port = 5000

[provider]
name = "groq"
model = "llama-3.1-8b-instant"
max_tokens = 512
timeout = 12.5
"#
        )
        .unwrap();

        let config = RelayConfig::load(f.path()).unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.provider.model, "llama-3.1-8b-instant");
        assert_eq!(config.provider.max_tokens, Some(512));
        assert_eq!(config.provider.top_p, Some(1.0));
        assert_eq!(config.provider.timeout(), Duration::from_millis(12_500));
        assert_eq!(
            config.provider.effective_base_url().unwrap(),
            "https://api.groq.com/openai/v1"
        );
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RelayConfig::default();
        config
            .apply_env_from(env(&[
                ("OPENAI_API_KEY", "sk-test"),
                ("OPENAI_BASE_URL", "http://localhost:9000/v1/"),
                ("OPENAI_MODEL", "gpt-4o-mini"),
                ("OPENAI_MAX_TOKENS", "256"),
                ("OPENAI_TEMPERATURE", "0.2"),
                ("OPENAI_MAX_RETRIES", "0"),
            ]))
            .unwrap();

        assert_eq!(config.provider.api_key, "sk-test");
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert_eq!(config.provider.max_tokens, Some(256));
        assert_eq!(config.provider.temperature, Some(0.2));
        assert_eq!(config.provider.max_retries, 0);
        assert_eq!(
            config.provider.effective_base_url().unwrap(),
            "http://localhost:9000/v1"
        );
    }

    #[test]
    fn test_env_parse_error_names_variable() {
        let mut config = RelayConfig::default();
        let err = config
            .apply_env_from(env(&[("OPENAI_TIMEOUT", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("OPENAI_TIMEOUT"));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = RelayConfig::default();
        config.provider.temperature = Some(2.5);
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.provider.max_tokens = Some(0);
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.provider.timeout = 0.0;
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.provider.max_retries = 11;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_timeout_is_a_config_error() {
        let mut config = RelayConfig::default();
        config
            .apply_env_from(env(&[("OPENAI_TIMEOUT", "1e300")]))
            .unwrap();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, RelayError::Config { .. }));
        assert!(err.to_string().contains("provider.timeout"));
        assert_eq!(config.provider.timeout(), Duration::MAX);
    }

    #[test]
    fn test_unknown_provider_without_base_url() {
        let mut config = RelayConfig::default();
        config.provider.name = "nowhere".to_string();
        assert!(config.provider.effective_base_url().is_err());

        config.provider.base_url = Some("https://my-server.com/v1".to_string());
        assert_eq!(
            config.provider.effective_base_url().unwrap(),
            "https://my-server.com/v1"
        );
    }
}
