//! Workspace discovery.
//!
//! A source bundle may lay out its environment directories in a few common
//! ways. The locator tries a fixed, ordered list of candidates below the
//! extraction root and picks the first one that exists.

use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::error::{Result, WorkspaceError};

/// Candidate layouts, in priority order. `{env}` is the environment name.
const CANDIDATE_LAYOUTS: &[&[&str]] = &[
    &["environments", "{env}"],
    &["tf", "environments", "{env}"],
    &["tf", "{env}"],
    &["{env}"],
];

/// Existence check for candidate directories.
pub trait DirectoryProbe: Send + Sync {
    /// Returns true if `path` exists and is a directory.
    fn is_dir(&self, path: &Path) -> bool;
}

/// Probe backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl DirectoryProbe for FsProbe {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

/// Locates the environment directory inside an extracted bundle.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceLocator<P: DirectoryProbe = FsProbe> {
    /// Existence check.
    probe: P,
}

impl WorkspaceLocator<FsProbe> {
    /// Creates a locator over the local filesystem.
    #[must_use]
    pub const fn new() -> Self {
        Self { probe: FsProbe }
    }
}

impl<P: DirectoryProbe> WorkspaceLocator<P> {
    /// Creates a locator with a custom probe.
    #[must_use]
    pub const fn with_probe(probe: P) -> Self {
        Self { probe }
    }

    /// Finds the first existing candidate directory for `env`.
    ///
    /// # Errors
    ///
    /// Returns `WorkspaceError::NotFound` listing every candidate when none
    /// exists, or when `env` is not a single plain path segment.
    pub fn locate(&self, root: &Path, env: &str) -> Result<PathBuf> {
        let candidates = candidate_dirs(root, env);

        if is_plain_segment(env) {
            for candidate in &candidates {
                debug!("Checking {}", candidate.display());
                if self.probe.is_dir(candidate) {
                    return Ok(candidate.clone());
                }
            }
        } else {
            debug!("Environment name '{env}' is not a plain directory name");
        }

        Err(WorkspaceError::NotFound {
            environment: env.to_string(),
            candidates,
        }
        .into())
    }
}

/// Returns every candidate directory for `env`, in priority order.
#[must_use]
pub fn candidate_dirs(root: &Path, env: &str) -> Vec<PathBuf> {
    CANDIDATE_LAYOUTS
        .iter()
        .map(|layout| {
            layout.iter().fold(root.to_path_buf(), |path, segment| {
                if *segment == "{env}" {
                    path.join(env)
                } else {
                    path.join(segment)
                }
            })
        })
        .collect()
}

/// Returns true if `env` names exactly one normal path component.
fn is_plain_segment(env: &str) -> bool {
    if env.contains('/') || env.contains('\\') {
        return false;
    }
    let mut components = Path::new(env).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
