//! Client configuration: default headers and retry policy.

use anyhow::{Context, Result};
use log::debug;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::http::{APPLICATION_JSON, RetryPolicy, serde_header_map};

/// Settings a [`RequestClient`](crate::http::RequestClient) is built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    #[serde(with = "serde_header_map")]
    pub default_headers: HeaderMap,
    pub retry: RetryPolicy,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));

        Self {
            default_headers,
            retry: RetryPolicy::default(),
            user_agent: format!("fetch-helper/{}", env!("FETCH_HELPER_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Loads configuration.
    ///
    /// An explicit `path` must exist. Without one, the file at
    /// [`default_path`](Self::default_path) is used if present, otherwise the
    /// built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// `<config dir>/fetch-helper/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("fetch-helper").join("config.json"))
    }
}
