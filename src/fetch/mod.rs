// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Transfers performed by this process itself.
//!
//! - [`DirectFetcher`] - streaming GET into a directory (non-delegated path)
//! - [`agent`] - whole-body GET with a browser user agent
//! - [`hub`] - every file of a hub repository

pub mod agent;
pub mod http;
pub mod hub;

pub use agent::{download_url_with_agent, fetch_with_agent, AgentFetchError};
pub use http::DirectFetcher;
pub use hub::{HubClient, RepoDownload, RepoFile};

use std::path::{Path, PathBuf};

use crate::error::FetchResult;

/// Plain `fetch(url) -> bytes on disk` capability.
pub trait Fetcher {
    /// Download `url` to `dest_dir/filename`, creating `dest_dir` if needed.
    fn fetch(&self, url: &str, dest_dir: &Path, filename: &str) -> FetchResult<PathBuf>;
}
