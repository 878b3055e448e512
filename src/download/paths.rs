// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Mapping of a logical model directory onto the three namespaces a
//! delegated download touches.
//!
//! ```text
//! logical dir  /opt/app/models/checkpoints      (install root /opt/app)
//! suffix       /models/checkpoints
//! remote       <remote_root>/models/checkpoints  daemon writes here
//! net          <net_root>/models/checkpoints     same bytes, seen from here
//! local        /opt/app/models/checkpoints       final destination
//! ```
//!
//! All three derive from one suffix so they cannot drift apart.

use std::path::PathBuf;

use crate::error::{FetchError, FetchResult};

/// Directory that relative model directories are anchored under.
pub const MODELS_SUBDIR: &str = "/models";

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// One requested artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub origin_url: String,
    pub logical_model_dir: String,
    pub filename: String,
}

impl DownloadRequest {
    pub fn new(
        origin_url: impl Into<String>,
        logical_model_dir: impl Into<String>,
        filename: impl Into<String>,
    ) -> FetchResult<Self> {
        let request = Self {
            origin_url: origin_url.into(),
            logical_model_dir: logical_model_dir.into(),
            filename: filename.into(),
        };

        if request.origin_url.trim().is_empty() {
            return Err(FetchError::InvalidPath("origin URL is empty".into()));
        }
        if request.logical_model_dir.trim().is_empty() {
            return Err(FetchError::InvalidPath("model directory is empty".into()));
        }
        validate_filename(&request.filename)?;
        Ok(request)
    }
}

/// Reject empty names and names that would escape their directory.
pub fn validate_filename(filename: &str) -> FetchResult<()> {
    if filename.trim().is_empty() {
        return Err(FetchError::InvalidPath("filename is empty".into()));
    }
    if filename.contains(is_separator) || filename == "." || filename == ".." {
        return Err(FetchError::InvalidPath(format!(
            "filename '{}' must be a bare file name",
            filename
        )));
    }
    Ok(())
}

/// Physical locations of one logical directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalPaths {
    /// Install-root-relative suffix shared by all namespaces, `/`-led or empty
    pub relative_suffix: String,
    /// Directory in the daemon's namespace
    pub remote_queue_dir: String,
    /// Same directory as mounted locally, `/`-separated
    pub net_staging_dir: String,
    /// Final destination
    pub local_dir: PathBuf,
}

impl PhysicalPaths {
    /// Path the daemon reports for `filename` once submitted with
    /// `dir = remote_queue_dir`.
    pub fn remote_file(&self, filename: &str) -> String {
        join_root(&self.remote_queue_dir, filename)
    }

    /// Staged copy of `filename`, with separators for this platform.
    pub fn net_file(&self, filename: &str) -> PathBuf {
        PathBuf::from(native_separators(&self.net_staging_dir)).join(filename)
    }

    pub fn local_file(&self, filename: &str) -> PathBuf {
        self.local_dir.join(filename)
    }
}

/// Map `logical_model_dir` onto remote, network-staging and local paths.
///
/// The install root is compared case-insensitively and must match whole path
/// components; the stripped suffix keeps the caller's casing. A relative
/// directory is anchored under [`MODELS_SUBDIR`] of the install root.
pub fn map_paths(
    logical_model_dir: &str,
    install_root: &str,
    remote_root: &str,
    net_root: &str,
) -> FetchResult<PhysicalPaths> {
    if logical_model_dir.trim().is_empty() {
        return Err(FetchError::InvalidPath("model directory is empty".into()));
    }

    let logical = trim_trailing_separators(logical_model_dir);
    let root = trim_trailing_separators(install_root);
    let absolute = is_absolute(logical);

    let suffix = match strip_prefix_ci(logical, root) {
        Some(rest) => rest.to_string(),
        None if absolute => logical.to_string(),
        None => format!("{}/{}", MODELS_SUBDIR, logical),
    };

    let rel = suffix.trim_start_matches(is_separator);
    let local_dir = if absolute {
        PathBuf::from(logical)
    } else {
        PathBuf::from(join_root(root, rel))
    };

    let paths = PhysicalPaths {
        remote_queue_dir: join_root(remote_root, rel),
        net_staging_dir: join_root(net_root, rel).replace('\\', "/"),
        local_dir,
        relative_suffix: suffix,
    };

    tracing::debug!(
        "Mapped {} -> remote={} net={} local={}",
        logical_model_dir,
        paths.remote_queue_dir,
        paths.net_staging_dir,
        paths.local_dir.display()
    );
    Ok(paths)
}

/// Rooted at a separator or a drive letter (`C:`).
fn is_absolute(path: &str) -> bool {
    let mut chars = path.chars();
    match (chars.next(), chars.next()) {
        (Some(c), _) if is_separator(c) => true,
        (Some(drive), Some(':')) => drive.is_ascii_alphabetic(),
        _ => false,
    }
}

fn trim_trailing_separators(path: &str) -> &str {
    let trimmed = path.trim_end_matches(is_separator);
    if trimmed.is_empty() && !path.is_empty() {
        // Keep a bare "/" as the filesystem root
        &path[..1]
    } else {
        trimmed
    }
}

/// `root/rel` without doubled separators; `root` alone when `rel` is empty.
pub(crate) fn join_root(root: &str, rel: &str) -> String {
    let base = root.trim_end_matches(is_separator);
    if rel.is_empty() {
        if base.is_empty() {
            root.to_string()
        } else {
            base.to_string()
        }
    } else {
        format!("{}/{}", base, rel)
    }
}

/// Strip `prefix` from `path` ignoring case and separator style, only at a
/// path-component boundary.
fn strip_prefix_ci<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() || prefix.chars().all(is_separator) {
        return None;
    }

    let mut offset = 0;
    let mut chars = path.chars();
    for pc in prefix.chars() {
        let sc = chars.next()?;
        let same = sc == pc
            || (is_separator(sc) && is_separator(pc))
            || sc.to_lowercase().eq(pc.to_lowercase());
        if !same {
            return None;
        }
        offset += sc.len_utf8();
    }

    let rest = &path[offset..];
    (rest.is_empty() || rest.starts_with(is_separator)).then_some(rest)
}

#[cfg(windows)]
fn native_separators(path: &str) -> String {
    path.replace('/', "\\")
}

#[cfg(not(windows))]
fn native_separators(path: &str) -> String {
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(dir: &str) -> PhysicalPaths {
        map_paths(dir, "/models", "/remote", "/net").unwrap()
    }

    #[test]
    fn test_checkpoint_dir_under_root() {
        let paths = map("/models/checkpoints");
        assert_eq!(paths.relative_suffix, "/checkpoints");
        assert_eq!(paths.remote_queue_dir, "/remote/checkpoints");
        assert_eq!(paths.net_staging_dir, "/net/checkpoints");
        assert_eq!(paths.local_dir, PathBuf::from("/models/checkpoints"));
        assert_eq!(paths.remote_file("a.bin"), "/remote/checkpoints/a.bin");
        assert_eq!(paths.local_file("a.bin"), PathBuf::from("/models/checkpoints/a.bin"));
    }

    #[test]
    fn test_mapping_is_deterministic() {
        assert_eq!(map("/models/loras"), map("/models/loras"));
    }

    #[test]
    fn test_case_insensitive_root() {
        let upper = map("/Models/Foo");
        let lower = map("/models/Foo");
        assert_eq!(upper.relative_suffix, "/Foo");
        assert_eq!(upper.relative_suffix, lower.relative_suffix);
        assert_eq!(upper.remote_queue_dir, "/remote/Foo");
        assert_eq!(upper.local_dir, PathBuf::from("/Models/Foo"));
    }

    #[test]
    fn test_relative_dir_anchored_under_models() {
        let paths = map_paths("checkpoints", "/opt/app", "/remote", "/net").unwrap();
        assert_eq!(paths.relative_suffix, "/models/checkpoints");
        assert_eq!(paths.remote_queue_dir, "/remote/models/checkpoints");
        assert_eq!(paths.net_staging_dir, "/net/models/checkpoints");
        assert_eq!(paths.local_dir, PathBuf::from("/opt/app/models/checkpoints"));
    }

    #[test]
    fn test_relative_dir_under_filesystem_root() {
        let paths = map_paths("vae", "/", "/remote", "/net").unwrap();
        assert_eq!(paths.local_dir, PathBuf::from("/models/vae"));
        assert_eq!(paths.local_dir.to_str(), Some("/models/vae"));
        assert_eq!(paths.remote_queue_dir, "/remote/models/vae");
    }

    #[test]
    fn test_absolute_dir_outside_root() {
        let paths = map_paths("/data/extra", "/opt/app", "/remote", "/net").unwrap();
        assert_eq!(paths.relative_suffix, "/data/extra");
        assert_eq!(paths.remote_queue_dir, "/remote/data/extra");
        assert_eq!(paths.local_dir, PathBuf::from("/data/extra"));
    }

    #[test]
    fn test_root_requires_component_boundary() {
        let paths = map_paths("/opt/app2/models", "/opt/app", "/remote", "/net").unwrap();
        assert_eq!(paths.relative_suffix, "/opt/app2/models");
    }

    #[test]
    fn test_trailing_separators_ignored() {
        let paths = map_paths("/opt/app/models/vae/", "/opt/app/", "/remote/", "/net/").unwrap();
        assert_eq!(paths.remote_queue_dir, "/remote/models/vae");
        assert_eq!(paths.net_staging_dir, "/net/models/vae");
        assert_eq!(paths.remote_file("x.pt"), "/remote/models/vae/x.pt");
    }

    #[test]
    fn test_dir_equal_to_root() {
        let paths = map_paths("/opt/app", "/opt/app", "/remote", "/net").unwrap();
        assert_eq!(paths.relative_suffix, "");
        assert_eq!(paths.remote_queue_dir, "/remote");
        assert_eq!(paths.local_dir, PathBuf::from("/opt/app"));
    }

    #[test]
    fn test_net_dir_uses_forward_slashes() {
        let paths =
            map_paths("C:\\App\\models\\loras", "c:\\app", "/remote", "\\\\nas\\share").unwrap();
        assert_eq!(paths.relative_suffix, "\\models\\loras");
        assert_eq!(paths.net_staging_dir, "//nas/share/models/loras");
        assert_eq!(paths.remote_queue_dir, "/remote/models\\loras");
        assert_eq!(paths.local_dir, PathBuf::from("C:\\App\\models\\loras"));
    }

    #[test]
    fn test_empty_dir_is_invalid() {
        assert!(matches!(
            map_paths("  ", "/models", "/remote", "/net"),
            Err(FetchError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_request_validation() {
        assert!(DownloadRequest::new("https://x/a.bin", "/models", "a.bin").is_ok());
        assert!(matches!(
            DownloadRequest::new("https://x/a.bin", "", "a.bin"),
            Err(FetchError::InvalidPath(_))
        ));
        assert!(matches!(
            DownloadRequest::new("https://x/a.bin", "/models", "sub/a.bin"),
            Err(FetchError::InvalidPath(_))
        ));
        assert!(matches!(
            DownloadRequest::new("", "/models", "a.bin"),
            Err(FetchError::InvalidPath(_))
        ));
    }
}
