// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! `download_url` entry point.

use std::path::{Path, PathBuf};

use super::materialize::{FsMaterializer, Materializer};
use super::paths::{map_paths, DownloadRequest};
use super::poller::{PollState, ProgressPoller};
use super::progress::{bar_factory, ProgressFactory};
use super::reconcile::reconcile;
use crate::auth::TokenFile;
use crate::config::Config;
use crate::error::{FetchError, FetchResult};
use crate::fetch::{DirectFetcher, Fetcher};
use crate::queue::{Aria2Client, QueueClient};

/// How a download was carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadRoute {
    /// Transferred by the queue daemon, then copied from staging
    Delegated { gid: String, reused: bool },
    /// Fetched by this process
    Direct,
}

/// Result of a successful [`Downloader::download_url`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub path: PathBuf,
    pub route: DownloadRoute,
}

/// Chooses between delegated and direct transfer and runs it.
///
/// Delegated mode is on when a queue client is present, which
/// [`Downloader::new`] arranges whenever the configuration names a queue
/// daemon.
pub struct Downloader<'a> {
    config: &'a Config,
    queue: Option<Box<dyn QueueClient + 'a>>,
    fetcher: Box<dyn Fetcher + 'a>,
    materializer: Box<dyn Materializer + 'a>,
    tokens: TokenFile,
    progress: ProgressFactory,
}

impl<'a> Downloader<'a> {
    /// Build a downloader with the real collaborators for `config`.
    pub fn new(config: &'a Config) -> FetchResult<Self> {
        let queue: Option<Box<dyn QueueClient + 'a>> = match &config.queue_url {
            Some(url) => {
                config.queue_roots()?;
                Some(Box::new(Aria2Client::new(url, config.queue_secret.clone())?))
            }
            None => None,
        };

        Ok(Self {
            config,
            queue,
            fetcher: Box::new(DirectFetcher::new()?),
            materializer: Box::new(FsMaterializer),
            tokens: TokenFile::new(config.token_path.clone()),
            progress: bar_factory(),
        })
    }

    pub fn with_queue(mut self, queue: impl QueueClient + 'a) -> Self {
        self.queue = Some(Box::new(queue));
        self
    }

    pub fn without_queue(mut self) -> Self {
        self.queue = None;
        self
    }

    pub fn with_fetcher(mut self, fetcher: impl Fetcher + 'a) -> Self {
        self.fetcher = Box::new(fetcher);
        self
    }

    pub fn with_materializer(mut self, materializer: impl Materializer + 'a) -> Self {
        self.materializer = Box::new(materializer);
        self
    }

    pub fn with_progress(mut self, progress: ProgressFactory) -> Self {
        self.progress = progress;
        self
    }

    pub fn is_delegated(&self) -> bool {
        self.queue.is_some()
    }

    /// Download `origin_url` as `local_model_dir/filename`.
    ///
    /// Hub URLs are rewritten to the configured mirror first, and everything
    /// after that sees only the rewritten URL. Bearer auth is decided on it,
    /// so the hub token never goes to a mirror host.
    pub fn download_url(
        &self,
        origin_url: &str,
        local_model_dir: &str,
        filename: &str,
    ) -> FetchResult<DownloadOutcome> {
        let request = DownloadRequest::new(origin_url, local_model_dir, filename)?;

        let url = self.config.rewrite_for_mirror(&request.origin_url);
        if url != request.origin_url {
            tracing::info!("Origin rewritten for mirror: {}", url);
        }

        match &self.queue {
            Some(queue) => self.delegated(queue.as_ref(), &request, &url),
            None => {
                let path = self.fetcher.fetch(
                    &url,
                    Path::new(&request.logical_model_dir),
                    &request.filename,
                )?;
                Ok(DownloadOutcome {
                    path,
                    route: DownloadRoute::Direct,
                })
            }
        }
    }

    fn delegated(
        &self,
        queue: &dyn QueueClient,
        request: &DownloadRequest,
        url: &str,
    ) -> FetchResult<DownloadOutcome> {
        let (remote_root, net_root) = self.config.queue_roots()?;
        let paths = map_paths(
            &request.logical_model_dir,
            &self.config.install_root,
            remote_root,
            net_root,
        )?;

        let reconciled = reconcile(
            queue,
            &paths.remote_queue_dir,
            &request.filename,
            url,
            || self.tokens.headers_for(url),
        )?;
        let mut task = reconciled.task;

        let mut progress = (self.progress)(&request.filename);
        let state = ProgressPoller::new(queue, self.config.poll_interval())
            .wait(&mut task, progress.as_mut())?;

        if state != PollState::Complete {
            tracing::warn!(
                "Task {} for {} ended as {}",
                task.gid,
                request.filename,
                task.status
            );
            return Err(FetchError::TransferFailed {
                gid: task.gid,
                filename: request.filename.clone(),
                status: task.status.to_string(),
                message: task.error_message,
            });
        }

        let path = self.materializer.materialize(
            &paths.net_staging_dir,
            &paths.local_dir,
            &request.filename,
        )?;

        Ok(DownloadOutcome {
            path,
            route: DownloadRoute::Delegated {
                gid: task.gid,
                reused: reconciled.reused,
            },
        })
    }
}
