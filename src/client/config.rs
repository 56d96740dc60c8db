//! Configuration for the RecallAI client.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::client::errors::{ClientError, ClientResult};

/// Environment variable overriding the backend base URL.
pub const BASE_URL_ENV: &str = "RECALLAI_BASE_URL";
/// Environment variable overriding the message page size.
pub const PAGE_SIZE_ENV: &str = "RECALLAI_PAGE_SIZE";
/// Environment variable overriding the number of notes retrieved per turn.
pub const TOP_K_ENV: &str = "RECALLAI_TOP_K";
/// Environment variable overriding the cached identity path.
pub const IDENTITY_PATH_ENV: &str = "RECALLAI_IDENTITY_PATH";

/// Top-level configuration for the client.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// HTTP transport settings.
    pub http: HttpConfig,
    /// Message pagination settings.
    pub paging: PagingConfig,
    /// Chat turn settings.
    pub chat: ChatConfig,
    /// Inactive conversation cache settings.
    pub cache: CacheConfig,
    /// Session persistence settings.
    pub session: SessionConfig,
}

impl ClientConfig {
    /// Build a configuration from defaults overlaid with `RECALLAI_*` variables.
    ///
    /// # Errors
    /// Returns an error if a variable is set but cannot be parsed, or if the
    /// resulting configuration is invalid.
    pub fn from_env() -> ClientResult<Self> {
        let mut config = Self::default();

        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            config.http.base_url = base_url;
        }
        if let Ok(raw) = std::env::var(PAGE_SIZE_ENV) {
            config.paging.page_size = raw.trim().parse().map_err(|_| {
                ClientError::InvalidConfig(format!("{PAGE_SIZE_ENV} must be an integer, got {raw}"))
            })?;
        }
        if let Ok(raw) = std::env::var(TOP_K_ENV) {
            config.chat.top_k = raw.trim().parse().map_err(|_| {
                ClientError::InvalidConfig(format!("{TOP_K_ENV} must be an integer, got {raw}"))
            })?;
        }
        if let Ok(path) = std::env::var(IDENTITY_PATH_ENV) {
            config.session.identity_path = PathBuf::from(path);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file. Missing keys take their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_json_file(path: &Path) -> ClientResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ClientResult<()> {
        if self.paging.page_size == 0 {
            return Err(ClientError::InvalidConfig(
                "paging.page_size must be > 0".to_string(),
            ));
        }

        if self.chat.top_k == 0 {
            return Err(ClientError::InvalidConfig(
                "chat.top_k must be > 0".to_string(),
            ));
        }

        if self.chat.title_max_chars == 0 {
            return Err(ClientError::InvalidConfig(
                "chat.title_max_chars must be > 0".to_string(),
            ));
        }

        if self.cache.window_capacity == 0 {
            return Err(ClientError::InvalidConfig(
                "cache.window_capacity must be > 0".to_string(),
            ));
        }

        if self.http.request_timeout_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "http.request_timeout_secs must be > 0".to_string(),
            ));
        }

        let url = Url::parse(&self.http.base_url)?;
        if url.cannot_be_a_base() {
            return Err(ClientError::InvalidConfig(format!(
                "http.base_url cannot be used as a base: {}",
                self.http.base_url
            )));
        }

        Ok(())
    }
}

/// HTTP transport settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Base URL of the RecallAI API, e.g. `http://127.0.0.1:8000/api/v1`.
    pub base_url: String,
    /// Connection timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds. Chat turns wait on a model, keep it generous.
    pub request_timeout_secs: u64,
}

impl HttpConfig {
    /// Connection timeout as a `Duration`.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api/v1".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 120,
        }
    }
}

/// Message pagination settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    /// Number of messages per page.
    pub page_size: u32,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self { page_size: 10 }
    }
}

/// Chat turn settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Number of notes the backend retrieves for each prompt.
    pub top_k: u32,
    /// Maximum characters of a derived conversation title, before the ellipsis.
    pub title_max_chars: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            title_max_chars: 40,
        }
    }
}

/// Cache of inactive conversation windows.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// LRU capacity, in conversations.
    pub window_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            window_capacity: 16,
        }
    }
}

/// Session persistence settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Where the signed-in identity is cached between runs.
    pub identity_path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            identity_path: PathBuf::from("recallai_identity.json"),
        }
    }
}
