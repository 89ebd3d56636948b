//! Configuration types.

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::llm::LlmBackend;

/// Guide session configuration.
#[derive(Debug, Clone)]
pub struct GuideConfig {
    /// LLM backend used for every stage.
    pub backend: LlmBackend,
    /// Model name passed to the backend.
    pub model: String,
    /// Sampling temperature sent with every generation request.
    pub temperature: f32,
    /// Max tokens for a single stage artifact.
    pub max_tokens: u32,
    /// Upper bound on a single provider call. A call that exceeds it is a
    /// stage failure like any other.
    pub request_timeout: Duration,
    /// Pause between the intake summary and the first stage, so the summary
    /// is seen before the pipeline takes over. Zero disables it.
    pub settle_delay: Duration,
    /// Interval between progress captions while a stage is pending.
    pub caption_interval: Duration,
    /// Port for the REST surface. `None` keeps it disabled.
    pub port: Option<u16>,
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            backend: LlmBackend::Anthropic,
            model: "claude-sonnet-4-20250514".to_string(),
            temperature: 0.7,
            max_tokens: 2048,
            request_timeout: Duration::from_secs(60),
            settle_delay: Duration::from_millis(1500),
            caption_interval: Duration::from_millis(2000),
            port: None,
        }
    }
}

impl GuideConfig {
    /// Load configuration from `ASTRO_GUIDE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup. Unset keys fall
    /// back to the defaults; malformed values are rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let backend = match lookup("ASTRO_GUIDE_BACKEND") {
            Some(raw) => raw.parse::<LlmBackend>().map_err(|message| {
                ConfigError::InvalidValue {
                    key: "ASTRO_GUIDE_BACKEND".to_string(),
                    message,
                }
            })?,
            None => defaults.backend,
        };

        let model = lookup("ASTRO_GUIDE_MODEL")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(defaults.model);

        let temperature: f32 =
            parse_or(&lookup, "ASTRO_GUIDE_TEMPERATURE", defaults.temperature)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidValue {
                key: "ASTRO_GUIDE_TEMPERATURE".to_string(),
                message: format!("{temperature} is outside 0.0..=2.0"),
            });
        }

        let max_tokens = parse_or(&lookup, "ASTRO_GUIDE_MAX_TOKENS", defaults.max_tokens)?;

        let timeout_secs: u64 = parse_or(
            &lookup,
            "ASTRO_GUIDE_TIMEOUT_SECS",
            defaults.request_timeout.as_secs(),
        )?;
        // A zero timeout would fail every request before it is sent.
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "ASTRO_GUIDE_TIMEOUT_SECS".to_string(),
                message: "must be at least 1 second".to_string(),
            });
        }
        let request_timeout = Duration::from_secs(timeout_secs);
        let settle_delay = Duration::from_millis(parse_or(
            &lookup,
            "ASTRO_GUIDE_SETTLE_MS",
            defaults.settle_delay.as_millis() as u64,
        )?);
        let caption_interval = Duration::from_millis(parse_or(
            &lookup,
            "ASTRO_GUIDE_CAPTION_MS",
            defaults.caption_interval.as_millis() as u64,
        )?);

        let port = match lookup("ASTRO_GUIDE_PORT") {
            Some(raw) => Some(parse_value("ASTRO_GUIDE_PORT", &raw)?),
            None => None,
        };

        Ok(Self {
            backend,
            model,
            temperature,
            max_tokens,
            request_timeout,
            settle_delay,
            caption_interval,
            port,
        })
    }

    /// Name of the environment variable holding the API key for the
    /// configured backend.
    pub fn api_key_var(&self) -> &'static str {
        match self.backend {
            LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
            LlmBackend::OpenAi => "OPENAI_API_KEY",
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        })
}
