// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Queue task types, independent of the daemon's wire representation.

use serde::Serialize;
use std::fmt;

/// Prefix aria2 gives to side-car files it manages itself
/// (torrent/metalink descriptors).
pub const METADATA_PREFIX: &str = "[METADATA]";

/// Lifecycle state reported by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Transfer in progress
    Active,
    /// Queued in the daemon, not started yet
    Waiting,
    /// Paused by an operator
    Paused,
    /// Stopped with an error
    Error,
    /// Finished successfully
    Complete,
    /// Removed by an operator
    Removed,
}

impl TaskStatus {
    /// Parse aria2's status keyword. Unknown keywords count as errors.
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "active" => Self::Active,
            "waiting" => Self::Waiting,
            "paused" => Self::Paused,
            "complete" => Self::Complete,
            "removed" => Self::Removed,
            _ => Self::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Waiting => "waiting",
            Self::Paused => "paused",
            Self::Error => "error",
            Self::Complete => "complete",
            Self::Removed => "removed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One output file of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFile {
    pub path: String,
    pub is_metadata: bool,
}

impl TaskFile {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let is_metadata = path.starts_with(METADATA_PREFIX);
        Self { path, is_metadata }
    }
}

/// Daemon-owned transfer, as observed by this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Daemon task id
    pub gid: String,
    pub status: TaskStatus,
    /// Total size in bytes, 0 while unknown
    pub total_length: u64,
    pub completed_length: u64,
    /// Bytes per second as last reported
    pub download_speed: u64,
    pub error_message: Option<String>,
    pub files: Vec<TaskFile>,
}

impl Task {
    pub fn is_active(&self) -> bool {
        self.status == TaskStatus::Active
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Waiting
    }

    pub fn is_complete(&self) -> bool {
        self.status == TaskStatus::Complete
    }

    /// Still worth waiting on: running or queued.
    pub fn is_in_flight(&self) -> bool {
        self.is_active() || self.is_pending()
    }

    /// Whether a non-metadata output file has exactly this path.
    pub fn writes_to(&self, target: &str) -> bool {
        self.files
            .iter()
            .filter(|f| !f.is_metadata)
            .any(|f| f.path == target)
    }

    /// First non-metadata output path, for display.
    pub fn primary_path(&self) -> Option<&str> {
        self.files
            .iter()
            .find(|f| !f.is_metadata)
            .map(|f| f.path.as_str())
    }

    /// Progress percentage (0-100) when the total is known.
    pub fn progress_percent(&self) -> Option<f64> {
        if self.is_complete() {
            return Some(100.0);
        }
        (self.total_length > 0)
            .then(|| (self.completed_length as f64 / self.total_length as f64) * 100.0)
    }

    /// Seconds left at the current speed, when both are known.
    pub fn eta_secs(&self) -> Option<u64> {
        if self.download_speed == 0 || self.total_length == 0 {
            return None;
        }
        Some(self.total_length.saturating_sub(self.completed_length) / self.download_speed)
    }
}

/// Options for submitting a new task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddOptions {
    /// Directory in the daemon's namespace
    pub dir: String,
    /// Output file name
    pub out: String,
    /// Extra request headers, `Name: value`
    #[serde(rename = "header", skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<String>,
}

impl AddOptions {
    pub fn new(dir: impl Into<String>, out: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            out: out.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_headers(mut self, headers: Vec<String>) -> Self {
        self.headers = headers;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(status: TaskStatus, files: &[&str]) -> Task {
        Task {
            gid: "g1".into(),
            status,
            total_length: 0,
            completed_length: 0,
            download_speed: 0,
            error_message: None,
            files: files.iter().map(|p| TaskFile::new(*p)).collect(),
        }
    }

    #[test]
    fn test_status_keywords() {
        assert_eq!(TaskStatus::from_keyword("active"), TaskStatus::Active);
        assert_eq!(TaskStatus::from_keyword("complete"), TaskStatus::Complete);
        assert_eq!(TaskStatus::from_keyword("bogus"), TaskStatus::Error);
        assert_eq!(TaskStatus::Waiting.to_string(), "waiting");
    }

    #[test]
    fn test_metadata_files_never_match() {
        let t = task(TaskStatus::Active, &["[METADATA]/remote/a.bin", "/remote/b.bin"]);
        assert!(t.files[0].is_metadata);
        assert!(!t.writes_to("[METADATA]/remote/a.bin"));
        assert!(t.writes_to("/remote/b.bin"));
        assert_eq!(t.primary_path(), Some("/remote/b.bin"));
    }

    #[test]
    fn test_in_flight() {
        assert!(task(TaskStatus::Waiting, &[]).is_in_flight());
        assert!(task(TaskStatus::Active, &[]).is_in_flight());
        assert!(!task(TaskStatus::Paused, &[]).is_in_flight());
        assert!(!task(TaskStatus::Complete, &[]).is_in_flight());
    }

    #[test]
    fn test_progress_percent() {
        let mut t = task(TaskStatus::Active, &[]);
        assert_eq!(t.progress_percent(), None);
        t.total_length = 200;
        t.completed_length = 50;
        assert_eq!(t.progress_percent(), Some(25.0));
    }

    #[test]
    fn test_eta_needs_speed_and_total() {
        let mut t = task(TaskStatus::Active, &[]);
        t.completed_length = 50;
        assert_eq!(t.eta_secs(), None);
        t.total_length = 250;
        assert_eq!(t.eta_secs(), None);
        t.download_speed = 100;
        assert_eq!(t.eta_secs(), Some(2));
    }

    #[test]
    fn test_add_options_serialization() {
        let opts = AddOptions::new("/remote/checkpoints", "a.bin");
        assert_eq!(
            serde_json::to_value(&opts).unwrap(),
            serde_json::json!({"dir": "/remote/checkpoints", "out": "a.bin"})
        );

        let opts = opts.with_headers(vec!["Authorization: Bearer t".into()]);
        assert_eq!(
            serde_json::to_value(&opts).unwrap()["header"],
            serde_json::json!(["Authorization: Bearer t"])
        );
    }
}
