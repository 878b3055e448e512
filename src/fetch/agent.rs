// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Fetch with a desktop-browser user agent, for hosts that reject unknown
//! clients.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// User agent sent by [`fetch_with_agent`].
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";

#[derive(Debug, Error)]
pub enum AgentFetchError {
    /// Request failed, returned non-2xx, or the body could not be read.
    #[error("{url}: {message}")]
    Transport { url: String, message: String },

    /// The response could not be saved.
    #[error("{}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Download `url` into `save_path`, creating the parent directory.
pub fn fetch_with_agent(url: &str, save_path: &Path) -> Result<(), AgentFetchError> {
    let transport = |message: String| AgentFetchError::Transport {
        url: url.to_string(),
        message,
    };

    let client = reqwest::blocking::Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .build()
        .map_err(|e| transport(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .map_err(|e| transport(e.to_string()))?;
    if !response.status().is_success() {
        return Err(transport(format!("HTTP {}", response.status().as_u16())));
    }
    let body = response.bytes().map_err(|e| transport(e.to_string()))?;

    if let Some(parent) = save_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| AgentFetchError::Filesystem {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(save_path, &body).map_err(|source| AgentFetchError::Filesystem {
        path: save_path.to_path_buf(),
        source,
    })?;

    Ok(())
}

/// Boolean wrapper around [`fetch_with_agent`]; failures are logged, not
/// returned. Callers must check the result.
pub fn download_url_with_agent(url: &str, save_path: &Path) -> bool {
    match fetch_with_agent(url, save_path) {
        Ok(()) => {
            tracing::info!("Installation was successful.");
            true
        }
        Err(e) => {
            tracing::error!("Download error: {} / {}", url, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refused_connection_is_transport_error() {
        let tmp = tempfile::tempdir().unwrap();
        let save = tmp.path().join("sub").join("file.bin");

        // Port 9 (discard) is closed on test machines
        let err = fetch_with_agent("http://127.0.0.1:9/file.bin", &save).unwrap_err();

        assert!(matches!(err, AgentFetchError::Transport { .. }));
        assert!(!save.exists());
    }

    #[test]
    fn test_boolean_wrapper_reports_failure() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(!download_url_with_agent(
            "http://127.0.0.1:9/file.bin",
            &tmp.path().join("file.bin")
        ));
    }
}
