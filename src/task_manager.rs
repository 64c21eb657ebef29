//! Task management for the sampler and controller loops.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use log::{error, info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long a cancelled task may take before it is aborted.
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Owns the spawned pipeline tasks and stops them together.
pub struct TaskManager {
    tasks: HashMap<&'static str, JoinHandle<Result<()>>>,
    global_token: CancellationToken,
}

impl TaskManager {
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
            global_token: CancellationToken::new(),
        }
    }

    /// Spawns and registers a task under `name`.
    ///
    /// Errors returned by the task are logged when it ends; they never stop
    /// the other tasks.
    pub fn spawn_task<F, Fut>(&mut self, name: &'static str, task_fn: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        let fut = task_fn(self.global_token.child_token());

        let handle = tokio::spawn(async move {
            info!("Starting task: {name}");
            let result = fut.await;
            match &result {
                Ok(()) => info!("Task '{name}' completed"),
                Err(e) => error!("Task '{name}' failed: {e:#}"),
            }
            result
        });

        self.tasks.insert(name, handle);
    }

    /// Cancels every task and waits briefly for each; stragglers are aborted.
    pub async fn stop_all(&mut self) {
        info!("Stopping all {} tasks", self.tasks.len());
        self.global_token.cancel();

        for (name, mut handle) in self.tasks.drain() {
            match tokio::time::timeout(STOP_TIMEOUT, &mut handle).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!("Task '{name}' panicked: {e}"),
                Err(_) => {
                    warn!("Task '{name}' did not stop in {STOP_TIMEOUT:?}, aborting");
                    handle.abort();
                }
            }
        }
    }

    #[cfg(test)]
    pub fn active_count(&self) -> usize {
        self.tasks.values().filter(|h| !h.is_finished()).count()
    }

    #[cfg(test)]
    pub fn is_running(&self, name: &str) -> bool {
        self.tasks.get(name).is_some_and(|h| !h.is_finished())
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}
