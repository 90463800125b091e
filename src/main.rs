use std::sync::Arc;

use async_trait::async_trait;

use external_task_worker::config::{self, WorkerConfig};
use external_task_worker::{ExternalTask, ExternalTaskHandler, Variables, Worker};

/// Logs every task it receives and completes it without variables.
struct LoggingHandler {
    topics: Vec<String>,
}

#[async_trait]
impl ExternalTaskHandler for LoggingHandler {
    fn topics(&self) -> Vec<String> {
        self.topics.clone()
    }

    async fn handle(&self, task: &ExternalTask) -> anyhow::Result<Variables> {
        let mut names: Vec<&str> = task.variables.keys().map(String::as_str).collect();
        names.sort_unstable();
        tracing::info!(
            task_id = %task.id,
            topic = task.topic_name.as_deref().unwrap_or(""),
            process_instance = task.process_instance_id.as_deref().unwrap_or(""),
            variables = ?names,
            "Received external task"
        );
        Ok(Variables::new())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let topics = match config::topics_from_env() {
        Ok(topics) => topics,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let config = WorkerConfig::from_env()?;

    eprintln!("External task worker v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Engine: {}", config.client.base_url);
    eprintln!("   Worker: {}", config.worker_id);
    eprintln!("   Topics: {}\n", topics.join(", "));

    let mut worker = Worker::new(&config)?;
    worker.add_handler(Arc::new(LoggingHandler { topics }));

    let handle = worker.spawn();
    let abort = handle.abort_handle();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
            abort.abort();
        }
        joined = handle => {
            joined?;
        }
    }

    Ok(())
}
