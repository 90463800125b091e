//! Worker — one polling loop per registered handler.

use std::sync::Arc;

use tokio::task::{JoinError, JoinHandle, JoinSet};

use crate::client::{ExternalTaskClient, ExternalTaskService};
use crate::config::WorkerConfig;
use crate::error::Result;
use crate::handler::ExternalTaskHandler;
use crate::worker::polling::HandlerLoop;

/// Runs every registered handler's polling loop concurrently.
///
/// Loops share only the stateless gateway. There is no cancellation signal:
/// abort the handle returned by [`Worker::spawn`] (or drop the `run` future)
/// to stop all loops.
pub struct Worker {
    id: String,
    service: Arc<dyn ExternalTaskService>,
    handlers: Vec<Arc<dyn ExternalTaskHandler>>,
}

impl Worker {
    /// Create a worker backed by an HTTP client built from `config`.
    pub fn new(config: &WorkerConfig) -> Result<Self> {
        let client = ExternalTaskClient::new(&config.client)?;
        Ok(Self::with_service(config.worker_id.clone(), Arc::new(client)))
    }

    /// Create a worker on top of any gateway implementation.
    pub fn with_service(id: impl Into<String>, service: Arc<dyn ExternalTaskService>) -> Self {
        Self {
            id: id.into(),
            service,
            handlers: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn add_handler(&mut self, handler: Arc<dyn ExternalTaskHandler>) -> &mut Self {
        tracing::debug!(worker_id = %self.id, handler = %handler.name(), "Registered handler");
        self.handlers.push(handler);
        self
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Start every handler loop and wait for them.
    ///
    /// Returns only once every loop has ended, which happens only for
    /// handlers using [`FailurePolicy::StopPolling`](crate::handler::FailurePolicy).
    pub async fn run(self) {
        if self.handlers.is_empty() {
            tracing::warn!(worker_id = %self.id, "Worker started with no handlers");
            return;
        }

        tracing::info!(
            worker_id = %self.id,
            handlers = self.handlers.len(),
            "Worker started"
        );

        let mut loops = JoinSet::new();
        for handler in self.handlers {
            let lp = HandlerLoop::new(self.id.clone(), Arc::clone(&self.service), handler);
            loops.spawn(lp.run());
        }

        while let Some(joined) = loops.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    tracing::error!(worker_id = %self.id, error = %e, "{}", join_failure(&e));
                } else {
                    tracing::info!(worker_id = %self.id, "{}", join_failure(&e));
                }
            }
        }

        tracing::info!(worker_id = %self.id, "All polling loops ended");
    }

    /// Run on a background task. Aborting the handle stops every loop.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

fn join_failure(e: &JoinError) -> &'static str {
    if e.is_panic() {
        "Polling loop panicked"
    } else {
        "Polling loop cancelled"
    }
}
