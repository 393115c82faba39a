use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";

/// Runtime settings, read from the environment (and `.env` if present).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    // Empty means: answer from the built-in mock backend
    pub llm_endpoint: String,
    pub llm_timeout: Duration,
    pub bind_addr: String,
    pub registry_path: Option<PathBuf>,
    pub cors_origin: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            llm_endpoint: String::new(),
            llm_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            bind_addr: DEFAULT_ADDR.to_string(),
            registry_path: None,
            cors_origin: DEFAULT_CORS_ORIGIN.to_string(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let llm_timeout = match non_empty("LLM_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.parse()
                    .with_context(|| format!("LLM_TIMEOUT_SECS must be a whole number of seconds, got '{}'", raw))?;
                anyhow::ensure!(secs > 0, "LLM_TIMEOUT_SECS must be greater than zero");
                Duration::from_secs(secs)
            }
            None => defaults.llm_timeout,
        };

        Ok(Self {
            llm_endpoint: non_empty("LLM_ENDPOINT").unwrap_or_default(),
            llm_timeout,
            bind_addr: non_empty("GATEWAY_ADDR").unwrap_or(defaults.bind_addr),
            registry_path: non_empty("TOOL_REGISTRY_PATH").map(PathBuf::from),
            cors_origin: non_empty("CORS_ORIGIN").unwrap_or(defaults.cors_origin),
        })
    }

    pub fn uses_mock_backend(&self) -> bool {
        self.llm_endpoint.is_empty()
    }
}
