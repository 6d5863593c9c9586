//! Configuration for agentrace.
//!
//! Settings live in `~/.agentrace/config.toml`:
//!
//! ```toml
//! [api]
//! url = "https://api.wordware.ai/v1alpha/apps/<org>/<app>/runs/stream"
//! api_key = "${WORDWARE_API_KEY}"
//! version = "^3.4"
//!
//! [stream]
//! idle_timeout_secs = 60
//! max_buffer_bytes = 4194304
//! ```
//!
//! String values may reference environment variables as `${VAR}`. The
//! `AGENTRACE_API_KEY` and `AGENTRACE_API_URL` variables take precedence over the
//! file. Every value is optional here; defaults are applied by the client.

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fmt, fs, io};

use agentrace_types::ApiKey;
use serde::Deserialize;
use thiserror::Error;

pub const API_KEY_ENV: &str = "AGENTRACE_API_KEY";
pub const API_URL_ENV: &str = "AGENTRACE_API_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AgentraceConfig {
    pub api: Option<ApiSection>,
    pub stream: Option<StreamSection>,
}

#[derive(Default, Deserialize)]
pub struct ApiSection {
    pub url: Option<String>,
    pub api_key: Option<String>,
    /// App version constraint sent with each run.
    pub version: Option<String>,
}

// Manual Debug impl to prevent leaking the API key in logs.
impl fmt::Debug for ApiSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiSection")
            .field("url", &self.url)
            .field(
                "api_key",
                &if self.api_key.is_some() {
                    "[REDACTED]"
                } else {
                    "None"
                },
            )
            .field("version", &self.version)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamSection {
    pub idle_timeout_secs: Option<u64>,
    pub max_buffer_bytes: Option<usize>,
}

/// Replace `${VAR}` references with the variable's value (empty if unset).
///
/// An unclosed `${` is kept verbatim.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

/// Environment value if set and non-blank, otherwise the expanded file value.
fn resolve(env_value: Option<String>, configured: Option<&str>) -> Option<String> {
    env_value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| {
            configured
                .map(|value| expand_env_vars(value).trim().to_string())
                .filter(|value| !value.is_empty())
        })
}

#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".agentrace"))
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

impl AgentraceConfig {
    /// Load `~/.agentrace/config.toml`. A missing file is `Ok(None)`.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    #[must_use]
    pub fn resolved_api_key(&self) -> Option<ApiKey> {
        let configured = self.api.as_ref().and_then(|api| api.api_key.as_deref());
        resolve(env::var(API_KEY_ENV).ok(), configured).map(ApiKey::new)
    }

    #[must_use]
    pub fn resolved_api_url(&self) -> Option<String> {
        let configured = self.api.as_ref().and_then(|api| api.url.as_deref());
        resolve(env::var(API_URL_ENV).ok(), configured)
    }

    #[must_use]
    pub fn version(&self) -> Option<String> {
        let configured = self.api.as_ref().and_then(|api| api.version.as_deref());
        resolve(None, configured)
    }

    #[must_use]
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.stream
            .as_ref()
            .and_then(|stream| stream.idle_timeout_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    #[must_use]
    pub fn max_buffer_bytes(&self) -> Option<usize> {
        self.stream
            .as_ref()
            .and_then(|stream| stream.max_buffer_bytes)
            .filter(|bytes| *bytes > 0)
    }
}
