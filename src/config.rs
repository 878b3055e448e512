// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Process-wide configuration.
//!
//! Built once at startup from (in increasing priority) built-in defaults,
//! an optional `config.json`, and environment variables. The resulting
//! [`Config`] is never mutated afterwards; components borrow it.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FetchError, FetchResult};
use crate::utils::mask_sensitive;

/// Canonical origin of the model hub. URLs with this prefix may be rewritten
/// to a mirror and get bearer auth attached.
pub const HUB_ORIGIN: &str = "https://huggingface.co";

/// Environment keys read by [`Config::load`].
pub mod env_keys {
    pub const QUEUE_URL: &str = "ARTIFETCH_QUEUE_URL";
    pub const QUEUE_SECRET: &str = "ARTIFETCH_QUEUE_SECRET";
    pub const MIRROR_ENDPOINT: &str = "HF_ENDPOINT";
    pub const REMOTE_ROOT: &str = "ARTIFETCH_REMOTE_ROOT";
    pub const NET_ROOT: &str = "ARTIFETCH_NET_ROOT";
    pub const INSTALL_ROOT: &str = "ARTIFETCH_INSTALL_ROOT";
    pub const TOKEN_PATH: &str = "ARTIFETCH_TOKEN_PATH";
}

const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

fn default_install_root() -> String {
    ".".to_string()
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

/// Immutable process configuration.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// aria2 JSON-RPC endpoint. Presence enables delegated mode.
    pub queue_url: Option<String>,
    /// aria2 `--rpc-secret`.
    pub queue_secret: Option<String>,
    /// Replacement for [`HUB_ORIGIN`] in origin URLs.
    pub mirror_endpoint: Option<String>,
    /// Root of the daemon's own filesystem namespace.
    pub remote_root: Option<String>,
    /// Local mount that exposes the daemon's output.
    pub net_root: Option<String>,
    /// Base directory of the local installation.
    #[serde(default = "default_install_root")]
    pub install_root: String,
    /// JSON file mapping provider name to bearer token.
    pub token_path: Option<PathBuf>,
    /// Delay between two task status polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_url: None,
            queue_secret: None,
            mirror_endpoint: None,
            remote_root: None,
            net_root: None,
            install_root: default_install_root(),
            token_path: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("queue_url", &self.queue_url)
            .field(
                "queue_secret",
                &self.queue_secret.as_deref().map(|s| mask_sensitive(s, 2)),
            )
            .field("mirror_endpoint", &self.mirror_endpoint)
            .field("remote_root", &self.remote_root)
            .field("net_root", &self.net_root)
            .field("install_root", &self.install_root)
            .field("token_path", &self.token_path)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .finish()
    }
}

impl Config {
    /// Default location of the config file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("artifetch").join("config.json"))
    }

    /// Load configuration from file (if any) and the process environment.
    ///
    /// An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> FetchResult<Self> {
        let base = match path {
            Some(p) => Self::from_file(p)?,
            None => match Self::default_path() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };

        let config = base.with_lookup(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON config file.
    pub fn from_file(path: &Path) -> FetchResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| FetchError::io(path, e))?;
        serde_json::from_str(&content)
            .map_err(|e| FetchError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Overlay values from a key lookup (normally the environment).
    ///
    /// Empty values are treated as unset.
    pub fn with_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(env_keys::QUEUE_URL) {
            self.queue_url = Some(v);
        }
        if let Some(v) = get(env_keys::QUEUE_SECRET) {
            self.queue_secret = Some(v);
        }
        if let Some(v) = get(env_keys::MIRROR_ENDPOINT) {
            self.mirror_endpoint = Some(v);
        }
        if let Some(v) = get(env_keys::REMOTE_ROOT) {
            self.remote_root = Some(v);
        }
        if let Some(v) = get(env_keys::NET_ROOT) {
            self.net_root = Some(v);
        }
        if let Some(v) = get(env_keys::INSTALL_ROOT) {
            self.install_root = v;
        }
        if let Some(v) = get(env_keys::TOKEN_PATH) {
            self.token_path = Some(PathBuf::from(v));
        }
        self
    }

    /// Check cross-field requirements.
    pub fn validate(&self) -> FetchResult<()> {
        if self.install_root.trim().is_empty() {
            return Err(FetchError::Config("install root is empty".into()));
        }
        if self.is_delegated() {
            self.queue_roots()?;
        }
        Ok(())
    }

    /// True when transfers are handed to the queue daemon.
    pub fn is_delegated(&self) -> bool {
        self.queue_url.is_some()
    }

    /// Remote and network-staging roots, both required in delegated mode.
    pub fn queue_roots(&self) -> FetchResult<(&str, &str)> {
        let remote = self.remote_root.as_deref().ok_or_else(|| {
            FetchError::Config(format!(
                "{} is required when {} is set",
                env_keys::REMOTE_ROOT,
                env_keys::QUEUE_URL
            ))
        })?;
        let net = self.net_root.as_deref().ok_or_else(|| {
            FetchError::Config(format!(
                "{} is required when {} is set",
                env_keys::NET_ROOT,
                env_keys::QUEUE_URL
            ))
        })?;
        Ok((remote, net))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Rewrite the hub origin prefix to the configured mirror.
    ///
    /// Returns the URL unchanged when no mirror is set or the URL does not
    /// target the hub.
    pub fn rewrite_for_mirror(&self, url: &str) -> String {
        match &self.mirror_endpoint {
            Some(mirror) if url.starts_with(HUB_ORIGIN) => {
                format!("{}{}", mirror.trim_end_matches('/'), &url[HUB_ORIGIN.len()..])
            }
            _ => url.to_string(),
        }
    }

    /// Base URL used for hub API and resolve requests.
    pub fn hub_base(&self) -> String {
        self.mirror_endpoint
            .as_deref()
            .unwrap_or(HUB_ORIGIN)
            .trim_end_matches('/')
            .to_string()
    }
}
