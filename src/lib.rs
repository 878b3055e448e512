// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! artifetch - model artifact fetcher
//!
//! Fetches large model files from HTTP(S) origins and the model hub into a
//! local tree, either directly or by delegating the transfer to an aria2
//! download queue and copying the result from a network mount.
//!
//! # Core Modules
//!
//! - [`download`] - Delegated download orchestration and `download_url`
//! - [`queue`] - Queue daemon client (aria2 JSON-RPC)
//! - [`fetch`] - In-process transfers (direct GET, browser agent, hub repos)
//! - [`config`] - Process configuration from file and environment
//! - [`auth`] - Provider token file
//! - [`error`] - Error taxonomy and user-facing formatting

pub mod auth;
pub mod config;
pub mod download;
pub mod error;
pub mod fetch;
pub mod queue;
pub mod utils;

pub use config::{Config, HUB_ORIGIN};
pub use download::{DownloadOutcome, DownloadRoute, Downloader, PhysicalPaths};
pub use error::{DirectFetchCause, FetchError, FetchResult};
pub use fetch::{download_url_with_agent, fetch_with_agent, DirectFetcher, Fetcher, HubClient};
pub use queue::{Aria2Client, QueueClient, Task, TaskStatus};
pub use utils::mask_sensitive;
