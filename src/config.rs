//! Runtime configuration read from environment variables.
//!
//! | Variable               | Meaning                                         | Default     |
//! |------------------------|-------------------------------------------------|-------------|
//! | `QRCRAFT_API_BASE_URL` | History/auth backend. Unset means in-memory.    | unset       |
//! | `QRCRAFT_TOKEN`        | Bearer token sent with backend requests.        | unset       |
//! | `QRCRAFT_OUTPUT_DIR`   | Directory generated PNGs are written to.        | `generated` |
//! | `QRCRAFT_LOG_JSON`     | Emit logs as JSON instead of human-readable.    | `false`     |

use std::env::vars;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::auth::RequestContext;
use crate::render::DEFAULT_OUTPUT_DIR;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration from environment: {0}")]
    Env(String),

    #[error("QRCRAFT_API_BASE_URL must start with http:// or https://, got `{0}`")]
    InvalidBaseUrl(String),
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    qrcraft_api_base_url: Option<String>,
    qrcraft_token: Option<String>,
    qrcraft_output_dir: Option<PathBuf>,
    qrcraft_log_json: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct Config {
    api_base_url: Option<String>,
    token: Option<String>,
    output_dir: PathBuf,
    log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: None,
            token: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            log_json: false,
        }
    }
}

impl Config {
    /// Reads configuration from the process environment.
    pub fn init() -> Result<Self, ConfigError> {
        let raw: RawConfig =
            serde_env::from_iter(vars()).map_err(|e| ConfigError::Env(e.to_string()))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let RawConfig {
            qrcraft_api_base_url,
            qrcraft_token,
            qrcraft_output_dir,
            qrcraft_log_json,
        } = raw;

        let api_base_url = match qrcraft_api_base_url.filter(|url| !url.trim().is_empty()) {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
                Some(url.trim_end_matches('/').to_owned())
            }
            Some(url) => return Err(ConfigError::InvalidBaseUrl(url)),
            None => None,
        };

        Ok(Self {
            api_base_url,
            token: qrcraft_token.filter(|t| !t.is_empty()),
            output_dir: qrcraft_output_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            log_json: qrcraft_log_json.unwrap_or(false),
        })
    }

    pub fn api_base_url(&self) -> Option<&str> {
        self.api_base_url.as_deref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn log_json(&self) -> bool {
        self.log_json
    }

    /// Request context carrying the configured token, if any.
    pub fn request_context(&self) -> RequestContext {
        match &self.token {
            Some(token) => RequestContext::with_token(token.clone()),
            None => RequestContext::anonymous(),
        }
    }
}
