//! Port for resolving remote task launchers from persisted addresses.

use std::sync::Arc;
use thiserror::Error;

/// Handle to a remote task launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLauncherHandle {
    url: String,
    placeholder: bool,
}

impl TaskLauncherHandle {
    /// Creates a handle to a live launcher.
    #[must_use]
    pub fn connected(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            placeholder: false,
        }
    }

    /// Creates a placeholder for a launcher that could not be reached.
    #[must_use]
    pub fn placeholder(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            placeholder: true,
        }
    }

    /// Returns the persisted address.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns true when the handle does not reach a live launcher.
    #[must_use]
    pub const fn is_placeholder(&self) -> bool {
        self.placeholder
    }
}

/// Failure to reach a remote launcher.
#[derive(Debug, Clone, Error)]
pub enum LauncherError {
    /// No launcher is bound at the address.
    #[error("no task launcher bound at {0}")]
    NotBound(String),
    /// The remote runtime failed.
    #[error("remote lookup failed: {0}")]
    Remote(Arc<dyn std::error::Error + Send + Sync>),
}

/// Remote runtime operations needed to rebind task launchers.
pub trait TaskLauncherResolver: Send + Sync {
    /// Looks up the launcher bound at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`LauncherError`] when nothing answers at the address.
    fn lookup(&self, url: &str) -> Result<TaskLauncherHandle, LauncherError>;

    /// Returns true when the launcher answers a liveness ping.
    fn ping(&self, handle: &TaskLauncherHandle) -> bool;
}
