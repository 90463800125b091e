//! Task gateway — the engine's external-task REST endpoints.
//!
//! [`ExternalTaskService`] is the seam the worker depends on;
//! [`ExternalTaskClient`] implements it over `reqwest`. The client holds no
//! per-task state and is safe to share between polling loops.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::error::{ClientError, EngineError};
use crate::outcome::Outcome;
use crate::task::{
    BpmnErrorRequest, CompleteRequest, ExtendLockRequest, ExternalTask, FetchAndLockRequest,
    HandleFailureRequest,
};

/// Maximum number of body bytes quoted in a transport error.
const MAX_QUOTED_BODY: usize = 256;

/// Remote operations on external tasks.
#[async_trait]
pub trait ExternalTaskService: Send + Sync {
    /// `GET /external-task/{id}`
    async fn get(&self, id: &str) -> Outcome<ExternalTask>;

    /// `POST /external-task/fetchAndLock`. Tasks come back in engine order.
    async fn fetch_and_lock(&self, request: &FetchAndLockRequest) -> Outcome<Vec<ExternalTask>>;

    /// `POST /external-task/{id}/complete`
    async fn complete(&self, id: &str, request: &CompleteRequest) -> Outcome<()>;

    /// `POST /external-task/{id}/failure`
    async fn handle_failure(&self, id: &str, request: &HandleFailureRequest) -> Outcome<()>;

    /// `POST /external-task/{id}/unlock`. Clears the lease immediately.
    async fn unlock(&self, id: &str) -> Outcome<()>;

    /// `POST /external-task/{id}/extendLock`
    async fn extend_lock(&self, id: &str, request: &ExtendLockRequest) -> Outcome<()>;

    /// `POST /external-task/{id}/bpmnError`
    async fn handle_bpmn_error(&self, id: &str, request: &BpmnErrorRequest) -> Outcome<()>;
}

/// HTTP implementation of [`ExternalTaskService`].
#[derive(Debug, Clone)]
pub struct ExternalTaskClient {
    base_url: String,
    client: reqwest::Client,
}

impl ExternalTaskClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::InvalidBaseUrl {
                url: config.base_url.clone(),
                reason: "expected an http:// or https:// URL".into(),
            });
        }

        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn task_url(&self, id: &str, action: &str) -> String {
        format!("{}/external-task/{id}{action}", self.base_url)
    }

    /// Send a request and decode a JSON body.
    async fn call_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Outcome<T> {
        let result: Result<T, EngineError> = async {
            let response = execute(request).await?;
            Ok(response.json::<T>().await?)
        }
        .await;
        log_failure(operation, &result);
        result.into()
    }

    /// Send a request whose success carries no body.
    async fn call_unit(&self, operation: &'static str, request: RequestBuilder) -> Outcome<()> {
        let result = execute(request).await.map(|_| ());
        log_failure(operation, &result);
        result.into()
    }
}

#[async_trait]
impl ExternalTaskService for ExternalTaskClient {
    async fn get(&self, id: &str) -> Outcome<ExternalTask> {
        let request = self.client.get(self.task_url(id, ""));
        self.call_json("get", request).await
    }

    async fn fetch_and_lock(&self, request: &FetchAndLockRequest) -> Outcome<Vec<ExternalTask>> {
        if request.topics.is_empty() {
            return Outcome::Success(Vec::new());
        }
        let url = format!("{}/external-task/fetchAndLock", self.base_url);
        let builder = self.client.post(url).json(request);
        self.call_json("fetchAndLock", builder).await
    }

    async fn complete(&self, id: &str, request: &CompleteRequest) -> Outcome<()> {
        let builder = self.client.post(self.task_url(id, "/complete")).json(request);
        self.call_unit("complete", builder).await
    }

    async fn handle_failure(&self, id: &str, request: &HandleFailureRequest) -> Outcome<()> {
        let builder = self.client.post(self.task_url(id, "/failure")).json(request);
        self.call_unit("handleFailure", builder).await
    }

    async fn unlock(&self, id: &str) -> Outcome<()> {
        let builder = self.client.post(self.task_url(id, "/unlock"));
        self.call_unit("unlock", builder).await
    }

    async fn extend_lock(&self, id: &str, request: &ExtendLockRequest) -> Outcome<()> {
        let builder = self.client.post(self.task_url(id, "/extendLock")).json(request);
        self.call_unit("extendLock", builder).await
    }

    async fn handle_bpmn_error(&self, id: &str, request: &BpmnErrorRequest) -> Outcome<()> {
        let builder = self.client.post(self.task_url(id, "/bpmnError")).json(request);
        self.call_unit("bpmnError", builder).await
    }
}

/// Send the request; turn any non-2xx status into an [`EngineError`].
async fn execute(request: RequestBuilder) -> Result<Response, EngineError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await?;
    match serde_json::from_str::<EngineError>(&body) {
        Ok(err) => Err(err),
        Err(_) => Err(EngineError::transport(format!(
            "engine returned {status} without an error body: {}",
            quote_body(&body)
        ))),
    }
}

fn log_failure<T>(operation: &'static str, result: &Result<T, EngineError>) {
    if let Err(e) = result {
        if e.is_transport() {
            tracing::warn!(operation, error = %e.message, "External task request failed");
        } else {
            tracing::debug!(
                operation,
                error_type = %e.error_type,
                error = %e.message,
                "Engine rejected external task request"
            );
        }
    }
}

fn quote_body(body: &str) -> &str {
    if body.len() <= MAX_QUOTED_BODY {
        return body;
    }
    let mut end = MAX_QUOTED_BODY;
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
