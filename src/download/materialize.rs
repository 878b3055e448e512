// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Copy a completed artifact from the network-staging mount into place.

use std::fs::{self, FileTimes, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::{FetchError, FetchResult};

/// Moves a finished download from staging to its local destination.
pub trait Materializer {
    /// Copy `net_staging_dir/filename` to `local_dir/filename` and return the
    /// destination path.
    fn materialize(&self, net_staging_dir: &str, local_dir: &Path, filename: &str)
        -> FetchResult<PathBuf>;
}

/// Filesystem copy that keeps permissions and timestamps.
///
/// The copy goes to `<filename>.part` first and is renamed into place, so a
/// failed copy never leaves a truncated artifact under the final name.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsMaterializer;

impl Materializer for FsMaterializer {
    fn materialize(
        &self,
        net_staging_dir: &str,
        local_dir: &Path,
        filename: &str,
    ) -> FetchResult<PathBuf> {
        let source = staging_dir(net_staging_dir).join(filename);
        let dest = local_dir.join(filename);
        let partial = partial_path(&dest);

        let metadata = fs::metadata(&source).map_err(|e| FetchError::io(&source, e))?;

        fs::create_dir_all(local_dir).map_err(|e| FetchError::io(local_dir, e))?;
        if let Err(e) = copy_into_place(&source, &metadata, &partial, &dest) {
            discard_partial(&partial);
            return Err(e);
        }

        tracing::info!("Copied {} -> {}", source.display(), dest.display());
        Ok(dest)
    }
}

fn copy_into_place(
    source: &Path,
    metadata: &fs::Metadata,
    partial: &Path,
    dest: &Path,
) -> FetchResult<()> {
    // fs::copy carries the permission bits over
    fs::copy(source, partial).map_err(|e| FetchError::io(partial, e))?;
    if let Err(e) = copy_times(metadata, partial) {
        tracing::debug!("Could not preserve timestamps on {}: {}", partial.display(), e);
    }
    fs::rename(partial, dest).map_err(|e| FetchError::io(dest, e))
}

/// `<dest>.part`, built on the OS string so non-UTF-8 names survive.
pub(crate) fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Best-effort removal of an abandoned `.part` file.
pub(crate) fn discard_partial(partial: &Path) {
    match fs::remove_file(partial) {
        Ok(()) => tracing::debug!("Removed partial file {}", partial.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Could not remove {}: {}", partial.display(), e),
    }
}

/// Staging path with separators for the current platform.
fn staging_dir(net_staging_dir: &str) -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(net_staging_dir.replace('/', "\\"))
    } else {
        PathBuf::from(net_staging_dir.replace('\\', "/"))
    }
}

fn copy_times(source: &fs::Metadata, dest: &Path) -> std::io::Result<()> {
    let mut times = FileTimes::new().set_modified(source.modified()?);
    if let Ok(accessed) = source.accessed() {
        times = times.set_accessed(accessed);
    }
    OpenOptions::new().write(true).open(dest)?.set_times(times)
}
