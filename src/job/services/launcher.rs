//! Rebinding of remote task launchers from persisted addresses.

use crate::config::LauncherConfig;
use crate::job::domain::InternalJob;
use crate::job::ports::{TaskLauncherHandle, TaskLauncherResolver};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Resolves persisted launcher addresses back into handles.
pub struct LauncherRebinder<R> {
    resolver: Arc<R>,
    reconnection_timeout: Duration,
    retry_interval: Duration,
}

impl<R: TaskLauncherResolver> LauncherRebinder<R> {
    /// Creates a rebinder bounded by `reconnection_timeout`.
    #[must_use]
    pub const fn new(resolver: Arc<R>, reconnection_timeout: Duration, retry_interval: Duration) -> Self {
        Self {
            resolver,
            reconnection_timeout,
            retry_interval,
        }
    }

    /// Creates a rebinder from configuration.
    #[must_use]
    pub const fn from_config(resolver: Arc<R>, config: &LauncherConfig) -> Self {
        Self::new(
            resolver,
            config.reconnection_timeout(),
            config.retry_interval(),
        )
    }

    /// Resolves `url` into a live handle.
    ///
    /// The first lookup is always attempted. When it fails and `rebind` is
    /// set, lookups are retried every retry interval until the reconnection
    /// timeout elapses. A placeholder handle is returned when nothing
    /// answers.
    pub fn resolve(&self, url: &str, rebind: bool) -> TaskLauncherHandle {
        if let Some(handle) = self.try_resolve(url) {
            return handle;
        }
        if !rebind {
            warn!(url, "task launcher unreachable");
            return TaskLauncherHandle::placeholder(url);
        }
        let deadline = Instant::now() + self.reconnection_timeout;
        let mut attempts = 1_u32;
        while Instant::now() + self.retry_interval <= deadline {
            std::thread::sleep(self.retry_interval);
            attempts += 1;
            if let Some(handle) = self.try_resolve(url) {
                debug!(url, attempts, "task launcher rebound");
                return handle;
            }
        }
        warn!(url, attempts, "task launcher rebind timed out");
        TaskLauncherHandle::placeholder(url)
    }

    /// Resolves the launcher of every task of `job` that records one.
    #[must_use]
    pub fn resolve_job(&self, job: &InternalJob, rebind: bool) -> BTreeMap<String, TaskLauncherHandle> {
        let mut handles = BTreeMap::new();
        for task in job.tasks() {
            if let Some(url) = task.task_launcher_node_url() {
                handles
                    .entry(url.to_owned())
                    .or_insert_with(|| self.resolve(url, rebind));
            }
        }
        handles
    }

    fn try_resolve(&self, url: &str) -> Option<TaskLauncherHandle> {
        match self.resolver.lookup(url) {
            Ok(handle) if self.resolver.ping(&handle) => Some(handle),
            Ok(_) => {
                debug!(url, "task launcher did not answer ping");
                None
            }
            Err(err) => {
                debug!(url, error = %err, "task launcher lookup failed");
                None
            }
        }
    }
}
