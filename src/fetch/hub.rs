// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Download every file of a model-hub repository.
//!
//! Repository metadata comes from `<hub>/api/models/<repo>?blobs=true`,
//! whose `siblings` list carries each file's name and size. Sizes are summed
//! up front so a single progress bar covers the whole repository.

use std::fs;
use std::path::{Component, Path, PathBuf};

use reqwest::blocking::Client;
use serde::Deserialize;

use super::http::{get_ok, stream_to_file, transfer_client, transport_error};
use crate::config::Config;
use crate::download::progress::{BarProgress, NoProgress, ProgressSink};
use crate::error::{FetchError, FetchResult};

/// Revision used in resolve URLs.
const DEFAULT_REVISION: &str = "main";

#[derive(Debug, Deserialize)]
struct RepoInfo {
    #[serde(default)]
    siblings: Vec<RepoFile>,
}

/// One file listed in a repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepoFile {
    /// Path relative to the repository root
    pub rfilename: String,
    /// Size in bytes, when the hub reports it
    #[serde(default)]
    pub size: Option<u64>,
}

/// Summary of a finished repository download.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoDownload {
    pub files: usize,
    pub bytes: u64,
    /// Siblings without a size, not downloaded
    pub skipped: Vec<String>,
}

/// Client for hub repository listings and file downloads.
#[derive(Debug, Clone)]
pub struct HubClient {
    base: String,
    client: Client,
    show_progress: bool,
}

impl HubClient {
    /// Client for the hub at `base` (e.g. `https://huggingface.co`).
    pub fn new(base: impl Into<String>) -> FetchResult<Self> {
        Ok(Self {
            base: base.into().trim_end_matches('/').to_string(),
            client: transfer_client()?,
            show_progress: true,
        })
    }

    /// Client for the configured mirror, or the canonical hub.
    pub fn from_config(config: &Config) -> FetchResult<Self> {
        Self::new(config.hub_base())
    }

    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }

    pub fn info_url(&self, repo_id: &str) -> String {
        format!("{}/api/models/{}?blobs=true", self.base, repo_id)
    }

    pub fn resolve_url(&self, repo_id: &str, rfilename: &str) -> String {
        format!(
            "{}/{}/resolve/{}/{}",
            self.base, repo_id, DEFAULT_REVISION, rfilename
        )
    }

    /// List the files of `repo_id`.
    pub fn repo_files(&self, repo_id: &str) -> FetchResult<Vec<RepoFile>> {
        let url = self.info_url(repo_id);
        let info: RepoInfo = get_ok(&self.client, &url)?
            .json()
            .map_err(|e| transport_error(&url, e))?;
        Ok(info.siblings)
    }

    /// Download all sized files of `repo_id` under `local_dir`, keeping the
    /// repository's directory structure.
    pub fn download_repo(&self, repo_id: &str, local_dir: &Path) -> FetchResult<RepoDownload> {
        let files = self.repo_files(repo_id)?;
        fs::create_dir_all(local_dir).map_err(|e| FetchError::io(local_dir, e))?;

        let total: u64 = files.iter().filter_map(|f| f.size).sum();
        let mut progress: Box<dyn ProgressSink> = if self.show_progress {
            Box::new(BarProgress::new(repo_id))
        } else {
            Box::new(NoProgress)
        };
        progress.set_total(total);
        tracing::info!("Downloading {} files ({} bytes) from {}", files.len(), total, repo_id);

        let mut summary = RepoDownload::default();
        for file in &files {
            if file.size.is_none() {
                tracing::debug!("Skipping {} (no size reported)", file.rfilename);
                summary.skipped.push(file.rfilename.clone());
                continue;
            }

            let dest = repo_file_path(local_dir, &file.rfilename)?;
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| FetchError::io(parent, e))?;
            }

            let url = self.resolve_url(repo_id, &file.rfilename);
            let response = get_ok(&self.client, &url)?;
            summary.bytes += stream_to_file(&url, response, &dest, progress.as_mut())?;
            summary.files += 1;
        }

        progress.finish();
        Ok(summary)
    }
}

/// `local_dir/rfilename`, refusing names that climb out of `local_dir`.
pub fn repo_file_path(local_dir: &Path, rfilename: &str) -> FetchResult<PathBuf> {
    let relative = Path::new(rfilename);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if rfilename.is_empty() || escapes {
        return Err(FetchError::InvalidPath(format!(
            "repository file '{}' escapes the target directory",
            rfilename
        )));
    }
    Ok(local_dir.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_use_mirror_base() {
        let config = Config {
            mirror_endpoint: Some("https://hf-mirror.com/".into()),
            ..Config::default()
        };
        let hub = HubClient::from_config(&config).unwrap();
        assert_eq!(
            hub.info_url("org/model"),
            "https://hf-mirror.com/api/models/org/model?blobs=true"
        );
        assert_eq!(
            hub.resolve_url("org/model", "unet/model.safetensors"),
            "https://hf-mirror.com/org/model/resolve/main/unet/model.safetensors"
        );
    }

    #[test]
    fn test_repo_info_parsing() {
        let info: RepoInfo = serde_json::from_str(
            r#"{"id": "org/model", "siblings": [
                {"rfilename": "config.json", "size": 512},
                {"rfilename": ".gitattributes"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(info.siblings.len(), 2);
        assert_eq!(info.siblings[0].size, Some(512));
        assert_eq!(info.siblings[1].size, None);
    }

    #[test]
    fn test_repo_file_path_rejects_traversal() {
        let root = Path::new("/tmp/repo");
        assert_eq!(
            repo_file_path(root, "unet/model.bin").unwrap(),
            PathBuf::from("/tmp/repo/unet/model.bin")
        );
        assert!(repo_file_path(root, "../etc/passwd").is_err());
        assert!(repo_file_path(root, "/etc/passwd").is_err());
        assert!(repo_file_path(root, "").is_err());
    }
}
