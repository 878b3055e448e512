// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Blocking wait on a queue task.
//!
//! Progress is sampled, never pushed: every tick reads the task's counters,
//! reports the increase since the previous tick, sleeps, then refreshes the
//! task. The total size may be unknown when the task is submitted and is set
//! as soon as the daemon reports it.
//!
//! ```text
//! Pending ──▶ Active ──▶ Complete
//!    │           │
//!    └───────────┴─────▶ Failed
//! ```

use std::thread;
use std::time::Duration;

use super::progress::ProgressSink;
use crate::error::FetchResult;
use crate::queue::{QueueClient, Task, TaskStatus};
use crate::utils::{format_bytes, format_eta, format_speed};

/// Poller view of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Known to the daemon but not transferring yet
    Pending,
    /// Transfer in progress
    Active,
    Complete,
    /// Any other stop: error, removed, paused
    Failed,
}

impl PollState {
    pub fn of(task: &Task) -> Self {
        match task.status {
            TaskStatus::Waiting => Self::Pending,
            TaskStatus::Active => Self::Active,
            TaskStatus::Complete => Self::Complete,
            TaskStatus::Paused | TaskStatus::Error | TaskStatus::Removed => Self::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// Drives a task to a terminal state.
pub struct ProgressPoller<'a, Q: QueueClient + ?Sized> {
    client: &'a Q,
    interval: Duration,
}

impl<'a, Q: QueueClient + ?Sized> ProgressPoller<'a, Q> {
    pub fn new(client: &'a Q, interval: Duration) -> Self {
        Self { client, interval }
    }

    /// Block until `task` stops being pending or active.
    ///
    /// There is no timeout. Returns the terminal state; completion and
    /// failure are not errors at this level. Refresh failures are.
    pub fn wait(&self, task: &mut Task, progress: &mut dyn ProgressSink) -> FetchResult<PollState> {
        let mut tracker = DeltaTracker::default();
        let mut state = PollState::of(task);

        while !state.is_terminal() {
            tracker.observe(task, progress);
            tracing::debug!(
                "Task {} {:?}: {}/{} at {}, eta {}",
                task.gid,
                state,
                format_bytes(task.completed_length),
                format_bytes(task.total_length),
                format_speed(task.download_speed),
                task.eta_secs().map(format_eta).unwrap_or_else(|| "?".to_string())
            );

            if !self.interval.is_zero() {
                thread::sleep(self.interval);
            }
            self.client.refresh(task)?;

            let next = PollState::of(task);
            if next != state {
                tracing::info!("Task {} is now {}", task.gid, task.status);
            }
            state = next;
        }

        if state == PollState::Complete {
            tracker.observe(task, progress);
        }
        progress.finish();
        Ok(state)
    }
}

/// Turns absolute counters into non-negative increments.
#[derive(Debug, Default)]
struct DeltaTracker {
    total_known: bool,
    reported: u64,
}

impl DeltaTracker {
    fn observe(&mut self, task: &Task, progress: &mut dyn ProgressSink) {
        if !self.total_known && task.total_length != 0 {
            progress.set_total(task.total_length);
            self.total_known = true;
        }

        // A counter that goes backwards (daemon restarted the transfer) is
        // ignored until it passes the reported mark again.
        let delta = task.completed_length.saturating_sub(self.reported);
        if delta > 0 {
            progress.advance(delta);
            self.reported += delta;
        }
    }
}
