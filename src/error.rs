// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types and user-facing error formatting for artifetch.
//!
//! Library code returns [`FetchError`]; the CLI renders it with
//! [`FetchError::report`], which lists possible causes and suggested fixes.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across the library.
pub type FetchResult<T> = Result<T, FetchError>;

/// Why a non-delegated fetch failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectFetchCause {
    /// The origin answered with a non-2xx status.
    Status(u16),
    /// The request never produced a response.
    Transport(String),
}

impl fmt::Display for DirectFetchCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "HTTP {}", code),
            Self::Transport(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

/// Every failure the fetcher can surface to the caller of `download_url`.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Empty or malformed logical directory / filename.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The origin needs a provider token that cannot be found.
    #[error("auth configuration error: {0}")]
    AuthConfig(String),

    /// A queue daemon control call failed.
    #[error("queue daemon unavailable: {0}")]
    QueueUnavailable(String),

    /// The daemon task ended without completing.
    #[error("transfer of {filename} failed (task {gid}, status {status}){}", detail_suffix(.message))]
    TransferFailed {
        gid: String,
        filename: String,
        status: String,
        message: Option<String>,
    },

    /// The direct (non-delegated) fetch failed.
    #[error("failed to download file from {url}: {cause}")]
    DirectFetch { url: String, cause: DirectFetchCause },

    /// Local filesystem failure.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed or incomplete process configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

fn detail_suffix(message: &Option<String>) -> String {
    match message {
        Some(m) if !m.is_empty() => format!(": {}", m),
        _ => String::new(),
    }
}

impl FetchError {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Render the error with likely causes and fixes for terminal output.
    pub fn report(&self) -> String {
        let builder = ErrorBuilder::new(self.to_string());
        match self {
            Self::InvalidPath(_) => builder
                .cause("Model directory or filename is empty")
                .cause("Filename contains a path separator")
                .fix("Pass the directory and the bare file name separately"),
            Self::AuthConfig(_) => builder
                .cause("ARTIFETCH_TOKEN_PATH is not set")
                .cause("Token file has no entry for the provider")
                .fix("Add {\"huggingface\": \"hf_...\"} to the token file"),
            Self::QueueUnavailable(_) => builder
                .cause("aria2 is not running or not reachable")
                .cause("Wrong RPC secret")
                .fix("Check ARTIFETCH_QUEUE_URL and ARTIFETCH_QUEUE_SECRET")
                .fix("List tasks: artifetch tasks"),
            Self::TransferFailed { .. } => builder
                .cause("Origin refused the request or the link expired")
                .cause("Daemon ran out of disk space")
                .fix("Inspect the task in aria2 and remove it before retrying"),
            Self::DirectFetch { .. } => builder
                .cause("URL is wrong or requires authentication")
                .cause("Network is down")
                .fix("Retry with -v for request details"),
            Self::Io { .. } => builder
                .cause("Destination is not writable")
                .cause("Network-staging mount is missing")
                .fix("Check ARTIFETCH_NET_ROOT points at the mounted daemon output"),
            Self::Config(_) => builder
                .cause("Delegated mode enabled without remote/net roots")
                .fix("Show effective settings: artifetch config"),
        }
        .build()
    }
}

/// Formats an error message with title, causes and fixes.
///
/// # Example
///
/// ```
/// use artifetch::error::format_error;
///
/// let error = format_error(
///     "Failed to reach aria2",
///     &["aria2 not running"],
///     &["Start it: aria2c --enable-rpc"],
/// );
/// assert!(error.contains("Possible causes:"));
/// ```
pub fn format_error(title: &str, causes: &[&str], fixes: &[&str]) -> String {
    let mut output = format!("[✗] {}\n", title);

    if !causes.is_empty() {
        output.push_str("\nPossible causes:\n");
        for cause in causes {
            output.push_str(&format!("  - {}\n", cause));
        }
    }

    if !fixes.is_empty() {
        output.push_str("\nTry these fixes:\n");
        for (i, fix) in fixes.iter().enumerate() {
            output.push_str(&format!("  {}. {}\n", i + 1, fix));
        }
    }

    output
}

/// Builder for formatted error messages.
#[derive(Debug, Clone)]
pub struct ErrorBuilder {
    title: String,
    causes: Vec<String>,
    fixes: Vec<String>,
}

impl ErrorBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            causes: Vec::new(),
            fixes: Vec::new(),
        }
    }

    pub fn cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    pub fn fix(mut self, fix: impl Into<String>) -> Self {
        self.fixes.push(fix.into());
        self
    }

    pub fn build(self) -> String {
        let causes: Vec<&str> = self.causes.iter().map(|s| s.as_str()).collect();
        let fixes: Vec<&str> = self.fixes.iter().map(|s| s.as_str()).collect();
        format_error(&self.title, &causes, &fixes)
    }
}

impl fmt::Display for ErrorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.clone().build())
    }
}
