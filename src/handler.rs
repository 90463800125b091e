//! Handler contract — user business logic for one or more topics.

use std::time::Duration;

use async_trait::async_trait;

use crate::task::{ExternalTask, Topic, Variables};

/// What a polling loop does after reporting a handler failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Keep polling. The failed task is reported and the loop moves on.
    #[default]
    ContinuePolling,
    /// End this handler's loop after the first reported failure.
    StopPolling,
}

/// Timing and failure-reporting knobs for one handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerConfig {
    /// Lease requested on every fetch. Default 300 ms.
    pub lock_duration: Duration,
    /// Pause between polling cycles. Default 100 ms.
    pub poll_interval: Duration,
    /// Delay before a failed task becomes visible again. Default 1000 ms.
    pub retry_timeout: Duration,
    /// Retries left after a failure. Default 0, which raises an incident.
    pub failure_retries: u32,
    /// Variables to fetch with each task; `None` fetches all.
    pub variables: Option<Vec<String>>,
    pub on_failure: FailurePolicy,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            lock_duration: Duration::from_millis(300),
            poll_interval: Duration::from_millis(100),
            retry_timeout: Duration::from_millis(1000),
            failure_retries: 0,
            variables: None,
            on_failure: FailurePolicy::ContinuePolling,
        }
    }
}

/// Business logic for the tasks published on a set of topics.
///
/// Returning `Err` reports the task as failed to the engine; it never stops
/// the worker process.
#[async_trait]
pub trait ExternalTaskHandler: Send + Sync {
    /// Topics this handler serves.
    fn topics(&self) -> Vec<String>;

    /// Name used in log output.
    fn name(&self) -> String {
        self.topics().join(",")
    }

    fn config(&self) -> HandlerConfig {
        HandlerConfig::default()
    }

    /// Execute the task and produce the variables to complete it with.
    async fn handle(&self, task: &ExternalTask) -> anyhow::Result<Variables>;
}

/// Build one subscription per topic name with the handler's lease settings.
pub(crate) fn subscriptions(topics: &[String], config: &HandlerConfig) -> Vec<Topic> {
    topics
        .iter()
        .map(|name| {
            let topic = Topic::new(name.clone(), config.lock_duration);
            match &config.variables {
                Some(vars) => topic.with_variables(vars.clone()),
                None => topic,
            }
        })
        .collect()
}
