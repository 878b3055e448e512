// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Delegated download orchestration.
//!
//! A download either runs in this process ([`crate::fetch`]) or is handed to
//! an external queue daemon. In the delegated case one logical file lives in
//! three places at once: the daemon's working directory, a network mount
//! exposing that directory here, and the final local destination.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  delegated  ┌───────────┐   ┌────────────┐   ┌────────────┐   ┌──────────────┐
//! │ Downloader │────────────▶│ map_paths │──▶│ reconcile  │──▶│ Progress   │──▶│ Materializer │
//! │            │             └───────────┘   │ (find/add) │   │ Poller     │   │ (net→local)  │
//! └─────┬──────┘                             └─────┬──────┘   └─────┬──────┘   └──────────────┘
//!       │ direct                                   ▼                ▼
//!       ▼                                    ┌──────────────────────────┐
//! ┌────────────┐                             │ QueueClient (aria2 RPC)  │
//! │ Fetcher    │                             └──────────────────────────┘
//! └────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use artifetch::{Config, Downloader};
//!
//! # fn example() -> artifetch::FetchResult<()> {
//! let config = Config::load(None)?;
//! let downloader = Downloader::new(&config)?;
//! let outcome = downloader.download_url(
//!     "https://huggingface.co/org/model/resolve/main/a.bin",
//!     "/opt/app/models/checkpoints",
//!     "a.bin",
//! )?;
//! println!("saved to {}", outcome.path.display());
//! # Ok(())
//! # }
//! ```

pub mod dispatcher;
pub mod materialize;
pub mod paths;
pub mod poller;
pub mod progress;
pub mod reconcile;

// Re-export commonly used items
pub use dispatcher::{DownloadOutcome, DownloadRoute, Downloader};
pub use materialize::{FsMaterializer, Materializer};
pub use paths::{map_paths, DownloadRequest, PhysicalPaths};
pub use poller::{PollState, ProgressPoller};
pub use progress::{BarProgress, NoProgress, ProgressFactory, ProgressSink};
pub use reconcile::{find_task, reconcile, Reconciled};
