use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_UPLOAD_DIR: &str = "upload";
pub const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Runtime configuration, read from the environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub model_base_url: String,
    pub model_api_key: String,
    pub model_name: String,
    pub model_timeout: Duration,
    pub upload_dir: PathBuf,
    pub port: u16,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let model_base_url = read("MODEL_BASE_URL")
            .or_else(|| read("GEMINI_BASE_URL"))
            .ok_or(ConfigError::Missing("MODEL_BASE_URL"))?;
        let model_api_key = read("MODEL_API_KEY")
            .or_else(|| read("GEMINI_API_KEY"))
            .ok_or(ConfigError::Missing("MODEL_API_KEY"))?;
        let model_name = read("MODEL_NAME").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let timeout_secs = match read("MODEL_TIMEOUT_SECS") {
            Some(value) => value.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
                name: "MODEL_TIMEOUT_SECS",
                value,
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let port = match read("PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { name: "PORT", value })?,
            None => DEFAULT_PORT,
        };

        let log_format = match read("LOG_FORMAT").as_deref() {
            None | Some("json") => LogFormat::Json,
            Some("pretty") => LogFormat::Pretty,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    value: other.to_string(),
                });
            }
        };

        Ok(Self {
            model_base_url: model_base_url.trim_end_matches('/').to_string(),
            model_api_key,
            model_name,
            model_timeout: Duration::from_secs(timeout_secs),
            upload_dir: PathBuf::from(
                read("UPLOAD_DIR").unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string()),
            ),
            port,
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn gemini_variables_are_accepted_as_fallback() {
        let config = config_from(&[
            ("GEMINI_BASE_URL", "https://example.test/v1beta/openai/"),
            ("GEMINI_API_KEY", "secret"),
        ])
        .unwrap();

        assert_eq!(config.model_base_url, "https://example.test/v1beta/openai");
        assert_eq!(config.model_api_key, "secret");
        assert_eq!(config.model_name, DEFAULT_MODEL);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.upload_dir, PathBuf::from("upload"));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn explicit_variables_win_over_fallbacks() {
        let config = config_from(&[
            ("MODEL_BASE_URL", "http://localhost:8080/v1"),
            ("GEMINI_BASE_URL", "https://ignored.test"),
            ("MODEL_API_KEY", "k"),
            ("MODEL_NAME", "local-model"),
            ("MODEL_TIMEOUT_SECS", "5"),
            ("PORT", "8081"),
            ("LOG_FORMAT", "pretty"),
        ])
        .unwrap();

        assert_eq!(config.model_base_url, "http://localhost:8080/v1");
        assert_eq!(config.model_name, "local-model");
        assert_eq!(config.model_timeout, Duration::from_secs(5));
        assert_eq!(config.port, 8081);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn missing_key_is_reported() {
        let err = config_from(&[("MODEL_BASE_URL", "http://localhost")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("MODEL_API_KEY")));
    }

    #[test]
    fn bad_port_is_reported() {
        let err = config_from(&[
            ("MODEL_BASE_URL", "http://localhost"),
            ("MODEL_API_KEY", "k"),
            ("PORT", "not-a-port"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
    }
}
