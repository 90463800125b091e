//! One handler's lease → execute → report loop.

use std::sync::Arc;

use crate::client::ExternalTaskService;
use crate::handler::{ExternalTaskHandler, FailurePolicy, HandlerConfig, subscriptions};
use crate::outcome::Outcome;
use crate::task::{
    CompleteRequest, ExternalTask, FetchAndLockRequest, HandleFailureRequest, Variables, as_millis,
};
use crate::worker::state::{CycleOutcome, LoopState};

/// Polling loop for a single handler.
///
/// Claims at most one task per cycle and reports on it before fetching
/// again, so the loop never holds more than one lease.
pub struct HandlerLoop {
    worker_id: String,
    service: Arc<dyn ExternalTaskService>,
    handler: Arc<dyn ExternalTaskHandler>,
    name: String,
    config: HandlerConfig,
    request: FetchAndLockRequest,
    state: LoopState,
}

impl HandlerLoop {
    pub fn new(
        worker_id: impl Into<String>,
        service: Arc<dyn ExternalTaskService>,
        handler: Arc<dyn ExternalTaskHandler>,
    ) -> Self {
        let worker_id = worker_id.into();
        let config = handler.config();
        let topics = subscriptions(&handler.topics(), &config);
        let request = FetchAndLockRequest::new(worker_id.clone(), 1, topics);

        Self {
            worker_id,
            service,
            name: handler.name(),
            handler,
            config,
            request,
            state: LoopState::Idle,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The fetch-and-lock request sent every cycle.
    pub fn request(&self) -> &FetchAndLockRequest {
        &self.request
    }

    fn transition_to(&mut self, target: LoopState) {
        debug_assert!(
            self.state.can_transition_to(target),
            "invalid loop transition {} -> {}",
            self.state,
            target
        );
        tracing::trace!(handler = %self.name, from = %self.state, to = %target, "Loop transition");
        self.state = target;
    }

    /// Poll until the process stops, or until the first handler failure if
    /// the handler opted into [`FailurePolicy::StopPolling`].
    pub async fn run(mut self) {
        tracing::info!(
            handler = %self.name,
            worker_id = %self.worker_id,
            poll_interval_ms = as_millis(self.config.poll_interval),
            "Polling loop started"
        );

        loop {
            let outcome = self.poll_once().await;

            if outcome.handler_failed() && self.config.on_failure == FailurePolicy::StopPolling {
                tracing::info!(handler = %self.name, "Polling loop stopped after handler failure");
                return;
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Run a single cycle: fetch → execute → report. Always ends `Idle`.
    pub async fn poll_once(&mut self) -> CycleOutcome {
        self.transition_to(LoopState::Fetching);

        let mut tasks = match self.service.fetch_and_lock(&self.request).await {
            Outcome::Success(tasks) => tasks,
            Outcome::Failure(error) => {
                tracing::warn!(handler = %self.name, error = %error, "Fetch and lock failed");
                self.transition_to(LoopState::Empty);
                self.transition_to(LoopState::Idle);
                return CycleOutcome::FetchFailed(error);
            }
        };

        if tasks.is_empty() {
            self.transition_to(LoopState::Empty);
            self.transition_to(LoopState::Idle);
            return CycleOutcome::NoTask;
        }

        let task = tasks.remove(0);
        self.transition_to(LoopState::Leased);
        self.release_extra(tasks).await;

        self.transition_to(LoopState::Executing);
        tracing::debug!(handler = %self.name, task_id = %task.id, "Executing task");

        let result = self.handler.handle(&task).await;
        let outcome = match result {
            Ok(variables) => self.complete(&task, variables).await,
            Err(e) => self.report_failure(&task, e).await,
        };

        self.transition_to(LoopState::Idle);
        outcome
    }

    async fn complete(&mut self, task: &ExternalTask, variables: Variables) -> CycleOutcome {
        self.transition_to(LoopState::Completing);
        let request = CompleteRequest {
            worker_id: self.worker_id.clone(),
            variables,
        };

        match self.service.complete(&task.id, &request).await {
            Outcome::Success(()) => {
                tracing::info!(handler = %self.name, task_id = %task.id, "Task completed");
                CycleOutcome::Completed {
                    task_id: task.id.clone(),
                }
            }
            Outcome::Failure(error) => {
                tracing::warn!(
                    handler = %self.name,
                    task_id = %task.id,
                    error = %error,
                    "Engine rejected task completion"
                );
                CycleOutcome::CompleteRejected {
                    task_id: task.id.clone(),
                    error,
                }
            }
        }
    }

    async fn report_failure(&mut self, task: &ExternalTask, error: anyhow::Error) -> CycleOutcome {
        self.transition_to(LoopState::Reporting);
        let message = error.to_string();
        tracing::warn!(handler = %self.name, task_id = %task.id, error = %message, "Handler failed");

        let request = HandleFailureRequest {
            worker_id: self.worker_id.clone(),
            error_message: message.clone(),
            error_details: Some(format!("{error:?}")),
            retries: self.config.failure_retries,
            retry_timeout: as_millis(self.config.retry_timeout),
        };

        match self.service.handle_failure(&task.id, &request).await {
            Outcome::Success(()) => CycleOutcome::FailureReported {
                task_id: task.id.clone(),
                message,
            },
            Outcome::Failure(error) => {
                tracing::warn!(
                    handler = %self.name,
                    task_id = %task.id,
                    error = %error,
                    "Engine rejected failure report"
                );
                CycleOutcome::FailureRejected {
                    task_id: task.id.clone(),
                    message,
                    error,
                }
            }
        }
    }

    /// Unlock tasks beyond the first. `maxTasks` is 1, so this only fires
    /// against an engine that ignores it.
    async fn release_extra(&self, extra: Vec<ExternalTask>) {
        for task in extra {
            tracing::warn!(
                handler = %self.name,
                task_id = %task.id,
                "Engine returned more tasks than requested; unlocking"
            );
            if let Outcome::Failure(error) = self.service.unlock(&task.id).await {
                tracing::warn!(task_id = %task.id, error = %error, "Failed to unlock extra task");
            }
        }
    }
}
