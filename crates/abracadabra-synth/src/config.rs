//! Runtime configuration.
//!
//! Settings come from `ABRACADABRA_*` environment variables. Both config
//! structs also accept an arbitrary lookup function so they can be built
//! from a fixed map in tests without touching the process environment.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use abracadabra_check::SandboxConfig;

use crate::error::SynthError;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Which OpenAI-style chat endpoint to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    #[default]
    OpenAi,
    OpenRouter,
    /// Any server speaking the chat-completions protocol. Needs a base URL.
    OpenAiCompatible,
}

impl Provider {
    pub fn default_base_url(self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some("https://api.openai.com/v1"),
            Provider::OpenRouter => Some("https://openrouter.ai/api/v1"),
            Provider::OpenAiCompatible => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::OpenRouter => "openrouter",
            Provider::OpenAiCompatible => "openai_compatible",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(Provider::OpenAi),
            "openrouter" => Ok(Provider::OpenRouter),
            "openai_compatible" => Ok(Provider::OpenAiCompatible),
            other => Err(SynthError::Config(format!(
                "unsupported provider '{}': use openai, openrouter or openai_compatible",
                other
            ))),
        }
    }
}

/// Connection settings for the generative collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmConfig {
    pub provider: Provider,
    pub model: String,
    /// Overrides the provider's default base URL.
    pub api_base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            provider: Provider::default(),
            model: DEFAULT_MODEL.to_string(),
            api_base_url: None,
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Result<Self, SynthError> {
        Self::from_lookup(env_lookup)
    }

    /// Reads settings through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SynthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = non_empty(lookup);
        let provider = match lookup("ABRACADABRA_PROVIDER") {
            Some(name) => name.parse()?,
            None => Provider::default(),
        };
        let timeout_secs = parse_var(&lookup, "ABRACADABRA_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;

        Ok(LlmConfig {
            provider,
            model: lookup("ABRACADABRA_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base_url: lookup("ABRACADABRA_API_BASE_URL"),
            api_key: lookup("ABRACADABRA_API_KEY").or_else(|| lookup("OPENAI_API_KEY")),
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Base URL requests go to, without a trailing slash.
    pub fn base_url(&self) -> Result<String, SynthError> {
        let base = match (&self.api_base_url, self.provider.default_base_url()) {
            (Some(url), _) => url.clone(),
            (None, Some(url)) => url.to_string(),
            (None, None) => {
                return Err(SynthError::Config(format!(
                    "{} provider requires ABRACADABRA_API_BASE_URL",
                    self.provider
                )))
            }
        };
        Ok(base.trim_end_matches('/').to_string())
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() || self.provider == Provider::OpenAiCompatible
    }
}

/// Settings for the synthesis loop itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthConfig {
    /// Attempt budget per request. Default: 3.
    pub max_attempts: usize,
    pub sandbox: SandboxConfig,
}

impl Default for SynthConfig {
    fn default() -> Self {
        SynthConfig {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            sandbox: SandboxConfig::default(),
        }
    }
}

impl SynthConfig {
    pub fn from_env() -> Result<Self, SynthError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, SynthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = non_empty(lookup);
        let defaults = SynthConfig::default();
        let max_attempts = parse_var(&lookup, "ABRACADABRA_MAX_ATTEMPTS", defaults.max_attempts)?;
        if max_attempts == 0 {
            return Err(SynthError::Config(
                "ABRACADABRA_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        let max_nodes = parse_var(&lookup, "ABRACADABRA_MAX_NODES", defaults.sandbox.max_nodes)?;

        Ok(SynthConfig {
            max_attempts,
            sandbox: SandboxConfig { max_nodes },
        })
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn non_empty<F>(lookup: F) -> impl Fn(&str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    move |key| lookup(key).filter(|value| !value.trim().is_empty())
}

fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T, SynthError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|err| SynthError::Config(format!("invalid {}='{}': {}", key, raw, err))),
        None => Ok(default),
    }
}
