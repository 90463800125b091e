//! Shared fixtures: a canned-response stub server and a stateful fake engine.
//!
//! Both bind an Axum server to a random local port and return the REST root
//! to point an `ExternalTaskClient` at.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::net::TcpListener;

use external_task_worker::task::{
    CompleteRequest, ExtendLockRequest, ExternalTask, FetchAndLockRequest, HandleFailureRequest,
    Variables,
};

/// Maximum time any test is allowed to run before we consider it hung.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Bind `app` to a random port and return the engine REST root.
async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{port}/engine-rest")
}

// ── Canned-response stub ─────────────────────────────────────────────

/// A request the stub received.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub body: String,
}

impl Recorded {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body is not JSON")
    }
}

/// One canned response, matched by path suffix.
#[derive(Debug, Clone, Copy)]
pub struct StubRoute {
    pub path_suffix: &'static str,
    pub status: StatusCode,
    pub body: &'static str,
}

pub fn route(path_suffix: &'static str, status: StatusCode, body: &'static str) -> StubRoute {
    StubRoute {
        path_suffix,
        status,
        body,
    }
}

/// Start a stub answering each request with the first route whose suffix
/// matches the path. Unmatched paths get a 404 engine error.
pub async fn start_stub(routes: Vec<StubRoute>) -> (String, Arc<Mutex<Vec<Recorded>>>) {
    let recorded = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&recorded);
    let routes = Arc::new(routes);

    let app = Router::new().fallback(move |method: Method, uri: Uri, body: String| {
        let log = Arc::clone(&log);
        let routes = Arc::clone(&routes);
        async move {
            let path = uri.path().to_string();
            log.lock().unwrap().push(Recorded {
                method,
                path: path.clone(),
                body,
            });

            let (status, body) = routes
                .iter()
                .find(|r| path.ends_with(r.path_suffix))
                .map(|r| (r.status, r.body))
                .unwrap_or((
                    StatusCode::NOT_FOUND,
                    r#"{"type":"NotFoundException","message":"No stub route"}"#,
                ));
            (status, [(header::CONTENT_TYPE, "application/json")], body)
        }
    });

    (serve(app).await, recorded)
}

pub fn recorded(log: &Arc<Mutex<Vec<Recorded>>>) -> Vec<Recorded> {
    log.lock().unwrap().clone()
}

// ── Stateful fake engine ─────────────────────────────────────────────

struct StoredTask {
    task: ExternalTask,
    locked_until: Option<DateTime<Utc>>,
    visible_from: DateTime<Utc>,
}

impl StoredTask {
    fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }

    fn lockable(&self, now: DateTime<Utc>) -> bool {
        !self.is_locked(now) && self.visible_from <= now && self.task.retries != Some(0)
    }

    fn clear_lock(&mut self) {
        self.locked_until = None;
        self.task.worker_id = None;
        self.task.lock_expiration_time = None;
    }
}

#[derive(Default)]
struct EngineState {
    tasks: Vec<StoredTask>,
    completions: Vec<(String, CompleteRequest)>,
    failures: Vec<(String, HandleFailureRequest)>,
    /// Highest number of simultaneous leases seen per `worker|topics` key.
    max_leases: HashMap<String, usize>,
}

impl EngineState {
    fn find_mut(&mut self, id: &str) -> Option<&mut StoredTask> {
        self.tasks.iter_mut().find(|t| t.task.id == id)
    }
}

type Shared = Arc<Mutex<EngineState>>;

/// In-memory engine implementing the external-task REST contract.
#[derive(Clone)]
pub struct FakeEngine {
    pub base_url: String,
    state: Shared,
}

impl FakeEngine {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(EngineState::default()));
        let app = Router::new()
            .route("/engine-rest/external-task/fetchAndLock", post(fetch_and_lock))
            .route("/engine-rest/external-task/{id}", get(get_task))
            .route("/engine-rest/external-task/{id}/complete", post(complete))
            .route("/engine-rest/external-task/{id}/failure", post(failure))
            .route("/engine-rest/external-task/{id}/unlock", post(unlock))
            .route("/engine-rest/external-task/{id}/extendLock", post(extend_lock))
            .with_state(Arc::clone(&state));

        Self {
            base_url: serve(app).await,
            state,
        }
    }

    /// Publish a task on `topic`.
    pub fn publish(&self, id: &str, topic: &str, variables: Variables) {
        let task = ExternalTask {
            id: id.to_string(),
            topic_name: Some(topic.to_string()),
            process_instance_id: Some(format!("process-{id}")),
            retries: None,
            variables,
            ..Default::default()
        };
        self.state.lock().unwrap().tasks.push(StoredTask {
            task,
            locked_until: None,
            visible_from: Utc::now(),
        });
    }

    /// Current engine view of a task, if it still exists.
    pub fn task(&self, id: &str) -> Option<ExternalTask> {
        let state = self.state.lock().unwrap();
        state
            .tasks
            .iter()
            .find(|t| t.task.id == id)
            .map(|t| t.task.clone())
    }

    pub fn completions(&self) -> Vec<(String, CompleteRequest)> {
        self.state.lock().unwrap().completions.clone()
    }

    pub fn failures(&self) -> Vec<(String, HandleFailureRequest)> {
        self.state.lock().unwrap().failures.clone()
    }

    /// Highest simultaneous lease count seen for `worker` fetching `topics`.
    pub fn max_leases(&self, worker: &str, topics: &[&str]) -> usize {
        let key = lease_key(worker, topics.iter().copied());
        self.state
            .lock()
            .unwrap()
            .max_leases
            .get(&key)
            .copied()
            .unwrap_or(0)
    }
}

fn lease_key<'a>(worker: &str, topics: impl Iterator<Item = &'a str>) -> String {
    let mut topics: Vec<&str> = topics.collect();
    topics.sort_unstable();
    format!("{worker}|{}", topics.join(","))
}

fn engine_error(status: StatusCode, error_type: &str, message: &str) -> Response {
    (status, Json(json!({ "type": error_type, "message": message }))).into_response()
}

fn not_found() -> Response {
    engine_error(
        StatusCode::NOT_FOUND,
        "NotFoundException",
        "External task not found",
    )
}

async fn fetch_and_lock(
    State(state): State<Shared>,
    Json(request): Json<FetchAndLockRequest>,
) -> Response {
    let now = Utc::now();
    let mut state = state.lock().unwrap();
    let topic_names: Vec<&str> = request.topics.iter().map(|t| t.topic_name.as_str()).collect();

    let mut locked = Vec::new();
    for stored in state.tasks.iter_mut() {
        if locked.len() >= request.max_tasks as usize {
            break;
        }
        let topic_name = stored.task.topic_name.clone().unwrap_or_default();
        let Some(topic) = request.topics.iter().find(|t| t.topic_name == topic_name) else {
            continue;
        };
        if !stored.lockable(now) {
            continue;
        }

        let until = now + chrono::Duration::milliseconds(topic.lock_duration as i64);
        stored.locked_until = Some(until);
        stored.task.worker_id = Some(request.worker_id.clone());
        stored.task.lock_expiration_time = Some(until.to_rfc3339());

        let mut task = stored.task.clone();
        if let Some(filter) = &topic.variables {
            task.variables.retain(|name, _| filter.contains(name));
        }
        locked.push(task);
    }

    let held = state
        .tasks
        .iter()
        .filter(|t| {
            t.is_locked(now)
                && t.task.worker_id.as_deref() == Some(request.worker_id.as_str())
                && topic_names.contains(&t.task.topic_name.as_deref().unwrap_or(""))
        })
        .count();
    let key = lease_key(&request.worker_id, topic_names.iter().copied());
    let max = state.max_leases.entry(key).or_insert(0);
    *max = (*max).max(held);

    Json(locked).into_response()
}

async fn get_task(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let state = state.lock().unwrap();
    match state.tasks.iter().find(|t| t.task.id == id) {
        Some(stored) => Json(stored.task.clone()).into_response(),
        None => not_found(),
    }
}

async fn complete(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(request): Json<CompleteRequest>,
) -> Response {
    let now = Utc::now();
    let mut state = state.lock().unwrap();
    let Some(pos) = state.tasks.iter().position(|t| t.task.id == id) else {
        return not_found();
    };

    let stored = &state.tasks[pos];
    let owner = stored.task.worker_id.as_deref();
    if !stored.is_locked(now) || owner != Some(request.worker_id.as_str()) {
        return engine_error(
            StatusCode::BAD_REQUEST,
            "BadUserRequestException",
            "External task is not locked by this worker",
        );
    }

    state.tasks.remove(pos);
    state.completions.push((id, request));
    StatusCode::NO_CONTENT.into_response()
}

async fn failure(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(request): Json<HandleFailureRequest>,
) -> Response {
    let now = Utc::now();
    let mut state = state.lock().unwrap();
    let Some(stored) = state.find_mut(&id) else {
        return not_found();
    };

    stored.clear_lock();
    stored.task.retries = Some(request.retries as i32);
    stored.task.error_message = Some(request.error_message.clone());
    stored.task.error_details = request.error_details.clone();
    stored.visible_from = now + chrono::Duration::milliseconds(request.retry_timeout as i64);

    state.failures.push((id, request));
    StatusCode::NO_CONTENT.into_response()
}

async fn unlock(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let mut state = state.lock().unwrap();
    match state.find_mut(&id) {
        Some(stored) => {
            stored.clear_lock();
            StatusCode::NO_CONTENT.into_response()
        }
        None => not_found(),
    }
}

async fn extend_lock(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(request): Json<ExtendLockRequest>,
) -> Response {
    let now = Utc::now();
    let mut state = state.lock().unwrap();
    let Some(stored) = state.find_mut(&id) else {
        return not_found();
    };
    if !stored.is_locked(now) || stored.task.worker_id.as_deref() != Some(request.worker_id.as_str())
    {
        return engine_error(
            StatusCode::BAD_REQUEST,
            "BadUserRequestException",
            "External task is not locked by this worker",
        );
    }

    let until = now + chrono::Duration::milliseconds(request.new_duration as i64);
    stored.locked_until = Some(until);
    stored.task.lock_expiration_time = Some(until.to_rfc3339());
    StatusCode::NO_CONTENT.into_response()
}
