use std::env;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_SERVER_PORT: u16 = 8080;
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_SUMMARY_MODEL: &str = "llama3";
const DEFAULT_SUMMARY_TEMPERATURE: f32 = 0.3;
const DEFAULT_SUMMARY_TOP_P: f32 = 0.9;
const DEFAULT_SUMMARY_MAX_TOKENS: u32 = 50;
const DEFAULT_SUMMARY_TIMEOUT_SECS: u64 = 60;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the student API.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server listens on.
    pub server_port: u16,
    /// Base URL of the Ollama runtime used for profile summaries.
    pub ollama_url: String,
    /// Fixed generation parameters sent with every summary request.
    pub generation: GenerationSettings,
}

/// Generation parameters forwarded to the text-generation service.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    /// Model identifier understood by the provider.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus-sampling threshold.
    pub top_p: f32,
    /// Maximum number of tokens to generate.
    pub max_tokens: u32,
    /// Client-side timeout applied to the whole upstream call.
    pub timeout: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_SUMMARY_MODEL.to_string(),
            temperature: DEFAULT_SUMMARY_TEMPERATURE,
            top_p: DEFAULT_SUMMARY_TOP_P,
            max_tokens: DEFAULT_SUMMARY_MAX_TOKENS,
            timeout: Duration::from_secs(DEFAULT_SUMMARY_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup; unset or blank keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = GenerationSettings::default();

        Ok(Self {
            server_port: parse_or(optional("SERVER_PORT"), "SERVER_PORT", DEFAULT_SERVER_PORT)?,
            ollama_url: optional("OLLAMA_URL").unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            generation: GenerationSettings {
                model: optional("SUMMARY_MODEL").unwrap_or(defaults.model),
                temperature: parse_or(
                    optional("SUMMARY_TEMPERATURE"),
                    "SUMMARY_TEMPERATURE",
                    defaults.temperature,
                )?,
                top_p: parse_or(optional("SUMMARY_TOP_P"), "SUMMARY_TOP_P", defaults.top_p)?,
                max_tokens: parse_or(
                    optional("SUMMARY_MAX_TOKENS"),
                    "SUMMARY_MAX_TOKENS",
                    defaults.max_tokens,
                )?,
                timeout: match optional("SUMMARY_TIMEOUT_SECS") {
                    Some(value) => value
                        .trim()
                        .parse::<u64>()
                        .ok()
                        .filter(|secs| *secs > 0)
                        .map(Duration::from_secs)
                        .ok_or_else(|| ConfigError::InvalidValue("SUMMARY_TIMEOUT_SECS".into()))?,
                    None => defaults.timeout,
                },
            },
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    value
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
        .map(|parsed| parsed.unwrap_or(default))
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
///
/// Runs before tracing is initialized so `.env` can supply `RUST_LOG`; callers log the returned
/// configuration once a subscriber exists.
pub fn init_config() -> &'static Config {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    CONFIG.set(config).expect("Failed to set config");
    get_config()
}
