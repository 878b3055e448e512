// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Streaming HTTP GET into a file.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::{Client, Response};

use super::Fetcher;
use crate::download::materialize::{discard_partial, partial_path};
use crate::download::progress::{BarProgress, NoProgress, ProgressSink};
use crate::error::{DirectFetchCause, FetchError, FetchResult};

/// Timeout for establishing connections (in seconds).
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Read buffer size for streaming bodies.
pub(crate) const CHUNK_SIZE: usize = 64 * 1024;

/// Blocking client without an overall timeout; model files take a while.
pub(crate) fn transfer_client() -> FetchResult<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(None::<Duration>)
        .build()
        .map_err(|e| FetchError::Config(format!("cannot build HTTP client: {}", e)))
}

pub(crate) fn transport_error(url: &str, err: impl std::fmt::Display) -> FetchError {
    FetchError::DirectFetch {
        url: url.to_string(),
        cause: DirectFetchCause::Transport(err.to_string()),
    }
}

/// Send a GET and insist on a 2xx answer.
pub(crate) fn get_ok(client: &Client, url: &str) -> FetchResult<Response> {
    let response = client.get(url).send().map_err(|e| transport_error(url, e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::DirectFetch {
            url: url.to_string(),
            cause: DirectFetchCause::Status(status.as_u16()),
        });
    }
    Ok(response)
}

/// Copy `response` into `dest` via `<dest>.part`, reporting every chunk.
///
/// Read failures are transport errors; write failures are I/O errors. The
/// `.part` file is removed when either happens.
pub(crate) fn stream_to_file(
    url: &str,
    response: Response,
    dest: &Path,
    progress: &mut dyn ProgressSink,
) -> FetchResult<u64> {
    let partial = partial_path(dest);
    let result = write_partial(url, response, &partial, progress).and_then(|written| {
        fs::rename(&partial, dest).map_err(|e| FetchError::io(dest, e))?;
        Ok(written)
    });
    if result.is_err() {
        discard_partial(&partial);
    }
    result
}

fn write_partial(
    url: &str,
    mut response: Response,
    partial: &Path,
    progress: &mut dyn ProgressSink,
) -> FetchResult<u64> {
    let mut file = File::create(partial).map_err(|e| FetchError::io(partial, e))?;

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut written = 0u64;
    loop {
        let n = response.read(&mut buf).map_err(|e| transport_error(url, e))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(|e| FetchError::io(partial, e))?;
        written += n as u64;
        progress.advance(n as u64);
    }
    file.flush().map_err(|e| FetchError::io(partial, e))?;
    Ok(written)
}

/// Non-delegated fetcher used when no queue daemon is configured.
#[derive(Debug, Clone)]
pub struct DirectFetcher {
    client: Client,
    show_progress: bool,
}

impl DirectFetcher {
    pub fn new() -> FetchResult<Self> {
        Ok(Self {
            client: transfer_client()?,
            show_progress: true,
        })
    }

    /// Disable the terminal progress bar.
    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }
}

impl Fetcher for DirectFetcher {
    fn fetch(&self, url: &str, dest_dir: &Path, filename: &str) -> FetchResult<PathBuf> {
        fs::create_dir_all(dest_dir).map_err(|e| FetchError::io(dest_dir, e))?;
        let dest = dest_dir.join(filename);

        tracing::info!("Downloading {} -> {}", url, dest.display());
        let response = get_ok(&self.client, url)?;
        let total = response.content_length();

        let mut progress: Box<dyn ProgressSink> = if self.show_progress {
            Box::new(BarProgress::new(filename))
        } else {
            Box::new(NoProgress)
        };
        if let Some(total) = total {
            progress.set_total(total);
        }

        let written = stream_to_file(url, response, &dest, progress.as_mut())?;
        progress.finish();

        tracing::debug!("Wrote {} bytes to {}", written, dest.display());
        Ok(dest)
    }
}
