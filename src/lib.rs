//! External-task worker — client and polling harness for a workflow
//! engine's external-task REST API.

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod outcome;
pub mod task;
pub mod worker;

pub use client::{ExternalTaskClient, ExternalTaskService};
pub use error::{EngineError, Error};
pub use handler::{ExternalTaskHandler, FailurePolicy, HandlerConfig};
pub use outcome::Outcome;
pub use task::{ExternalTask, Topic, Variable, Variables};
pub use worker::Worker;
