// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! At most one queue task per output file.
//!
//! The daemon happily runs two transfers into the same file, so before
//! submitting we scan its whole task table for a task that already writes
//! `remote_queue_dir/filename`. Matching is exact string equality on the
//! daemon-reported path; metadata side-car files are skipped.
//!
//! Two processes reconciling the same file at the same moment can still both
//! submit. Usage is single-writer, so no locking is done around the
//! scan-then-add sequence.

use super::paths::join_root;
use crate::error::FetchResult;
use crate::queue::{AddOptions, QueueClient, Task};

/// Task to wait on, and whether it already existed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub task: Task,
    pub reused: bool,
}

/// First task whose non-metadata output is exactly `target`.
pub fn find_task<Q: QueueClient + ?Sized>(client: &Q, target: &str) -> FetchResult<Option<Task>> {
    let tasks = client.list_tasks()?;
    Ok(tasks.into_iter().find(|task| task.writes_to(target)))
}

/// Return the existing task for `remote_queue_dir/filename`, or submit one.
///
/// `headers` is only evaluated when a new task is submitted, so a token file
/// is never read for a download that is already queued.
pub fn reconcile<Q, H>(
    client: &Q,
    remote_queue_dir: &str,
    filename: &str,
    origin_url: &str,
    headers: H,
) -> FetchResult<Reconciled>
where
    Q: QueueClient + ?Sized,
    H: FnOnce() -> FetchResult<Vec<String>>,
{
    let target = join_root(remote_queue_dir, filename);

    if let Some(task) = find_task(client, &target)? {
        tracing::info!("Reusing queue task {} ({}) for {}", task.gid, task.status, target);
        return Ok(Reconciled { task, reused: true });
    }

    let options = AddOptions::new(remote_queue_dir, filename).with_headers(headers()?);
    let task = client.add_task(origin_url, &options)?;
    tracing::info!("Submitted queue task {} for {} -> {}", task.gid, origin_url, target);

    Ok(Reconciled {
        task,
        reused: false,
    })
}
