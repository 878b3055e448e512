// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! External download-queue daemon.
//!
//! [`QueueClient`] is the seam between the orchestrator and the daemon:
//! the orchestrator only lists tasks, submits tasks and refreshes a task it
//! holds. [`Aria2Client`] implements it over aria2's JSON-RPC interface.
//!
//! The daemon does not de-duplicate submissions. Two `add_task` calls for the
//! same file start two independent transfers, so callers look for an
//! existing task first (see [`crate::download::reconcile`]).

pub mod aria2;
pub mod types;

pub use aria2::Aria2Client;
pub use types::{AddOptions, Task, TaskFile, TaskStatus};

use crate::error::FetchResult;

/// Control operations used against the queue daemon.
pub trait QueueClient {
    /// Current task table (active, waiting and stopped).
    fn list_tasks(&self) -> FetchResult<Vec<Task>>;

    /// Submit a new transfer of `url`.
    fn add_task(&self, url: &str, options: &AddOptions) -> FetchResult<Task>;

    /// Re-read status and byte counters of `task` in place.
    fn refresh(&self, task: &mut Task) -> FetchResult<()>;
}

impl<Q: QueueClient + ?Sized> QueueClient for &Q {
    fn list_tasks(&self) -> FetchResult<Vec<Task>> {
        (**self).list_tasks()
    }

    fn add_task(&self, url: &str, options: &AddOptions) -> FetchResult<Task> {
        (**self).add_task(url, options)
    }

    fn refresh(&self, task: &mut Task) -> FetchResult<()> {
        (**self).refresh(task)
    }
}

impl<Q: QueueClient + ?Sized> QueueClient for Box<Q> {
    fn list_tasks(&self) -> FetchResult<Vec<Task>> {
        (**self).list_tasks()
    }

    fn add_task(&self, url: &str, options: &AddOptions) -> FetchResult<Task> {
        (**self).add_task(url, options)
    }

    fn refresh(&self, task: &mut Task) -> FetchResult<()> {
        (**self).refresh(task)
    }
}
