// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Bearer-token lookup for origins that require authentication.
//!
//! The token file is a flat JSON object mapping provider name to token:
//!
//! ```json
//! { "huggingface": "hf_xxxxxxxx" }
//! ```
//!
//! It is read in full each time a header is needed, which only happens when
//! a new queue task is submitted.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use reqwest::Url;

use crate::config::HUB_ORIGIN;
use crate::error::{FetchError, FetchResult};
use crate::utils::mask_sensitive;

/// Provider key for the model hub in the token file.
pub const HUB_PROVIDER: &str = "huggingface";

/// Which provider (if any) must authenticate requests to `url`.
///
/// Only the hub's exact origin (scheme, host and port) qualifies; look-alike
/// hosts such as `huggingface.co.example` do not.
pub fn provider_for(url: &str) -> Option<&'static str> {
    let target = Url::parse(url).ok()?;
    let hub = Url::parse(HUB_ORIGIN).ok()?;
    let same_origin = target.scheme() == hub.scheme()
        && target.host_str() == hub.host_str()
        && target.port_or_known_default() == hub.port_or_known_default();
    same_origin.then_some(HUB_PROVIDER)
}

/// Lazily-read provider token file.
#[derive(Debug, Clone, Default)]
pub struct TokenFile {
    path: Option<PathBuf>,
}

impl TokenFile {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read and parse the whole token file.
    pub fn load(&self) -> FetchResult<HashMap<String, String>> {
        let path = self.path.as_deref().ok_or_else(|| {
            FetchError::AuthConfig("no token file configured (ARTIFETCH_TOKEN_PATH)".into())
        })?;
        let content = fs::read_to_string(path).map_err(|e| {
            FetchError::AuthConfig(format!("cannot read token file {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            FetchError::AuthConfig(format!("malformed token file {}: {}", path.display(), e))
        })
    }

    /// Token for `provider`; a missing key is fatal.
    pub fn token(&self, provider: &str) -> FetchResult<String> {
        let tokens = self.load()?;
        match tokens.get(provider) {
            Some(token) if !token.is_empty() => {
                tracing::debug!("Using {} token {}", provider, mask_sensitive(token, 4));
                Ok(token.clone())
            }
            _ => Err(FetchError::AuthConfig(format!(
                "token file has no entry for provider '{}'",
                provider
            ))),
        }
    }

    /// Header lines (`Name: value`) to attach when submitting `url`.
    ///
    /// Returns an empty list for origins that need no authentication, without
    /// touching the token file.
    pub fn headers_for(&self, url: &str) -> FetchResult<Vec<String>> {
        match provider_for(url) {
            Some(provider) => {
                let token = self.token(provider)?;
                Ok(vec![format!("Authorization: Bearer {}", token)])
            }
            None => Ok(Vec::new()),
        }
    }
}
