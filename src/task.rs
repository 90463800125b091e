//! External-task data model and request bodies.
//!
//! Field names follow the engine's camelCase JSON. Tasks are only ever
//! mirrored locally: the engine creates them and owns their lease state.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Process variables keyed by name.
pub type Variables = HashMap<String, Variable>;

/// Timestamp layout the engine uses for `lockExpirationTime` (`+hhmm` offset).
const ENGINE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

/// A unit of work published by the engine.
///
/// Only `id` is required on the wire. Every other field may be absent or
/// `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalTask {
    pub id: String,
    #[serde(default)]
    pub topic_name: Option<String>,
    #[serde(default)]
    pub worker_id: Option<String>,
    #[serde(default)]
    pub lock_expiration_time: Option<String>,
    #[serde(default)]
    pub activity_id: Option<String>,
    #[serde(default)]
    pub activity_instance_id: Option<String>,
    #[serde(default)]
    pub execution_id: Option<String>,
    #[serde(default)]
    pub process_instance_id: Option<String>,
    #[serde(default)]
    pub process_definition_id: Option<String>,
    #[serde(default)]
    pub process_definition_key: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub business_key: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_details: Option<String>,
    #[serde(default)]
    pub retries: Option<i32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub priority: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub suspended: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub variables: Variables,
}

impl ExternalTask {
    /// Parse `lockExpirationTime`. Accepts RFC 3339 and the engine's
    /// `2015-10-06T16:34:42.000+0200` form.
    pub fn lock_expiration(&self) -> Option<DateTime<FixedOffset>> {
        let raw = self.lock_expiration_time.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .or_else(|_| DateTime::parse_from_str(raw, ENGINE_DATE_FORMAT))
            .ok()
    }

    /// True while a worker holds an unexpired lease on this task.
    pub fn is_locked(&self) -> bool {
        let has_worker = self.worker_id.as_deref().is_some_and(|w| !w.is_empty());
        has_worker && self.lock_expiration().is_some_and(|at| at > Utc::now())
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }
}

/// A process variable: a raw JSON value tagged with the engine's type name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    #[serde(default)]
    pub value: Value,
    #[serde(rename = "type")]
    pub value_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_info: Option<serde_json::Map<String, Value>>,
}

impl Variable {
    pub fn new(value: impl Into<Value>, value_type: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            value_type: value_type.into(),
            value_info: None,
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(value.into(), "String")
    }

    pub fn integer(value: i32) -> Self {
        Self::new(value, "Integer")
    }

    pub fn long(value: i64) -> Self {
        Self::new(value, "Long")
    }

    pub fn double(value: f64) -> Self {
        Self::new(value, "Double")
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(value, "Boolean")
    }

    pub fn null() -> Self {
        Self::new(Value::Null, "Null")
    }

    /// A `Json` variable. The engine expects the document serialized as a string.
    pub fn json(document: &Value) -> Self {
        Self::new(document.to_string(), "Json")
    }

    pub fn as_str(&self) -> Option<&str> {
        self.value.as_str()
    }

    /// Check that `type` matches the dynamic shape of `value`.
    ///
    /// `null` is accepted for every type. Unknown types are not checked.
    pub fn is_consistent(&self) -> bool {
        if self.value.is_null() {
            return true;
        }
        match self.value_type.as_str() {
            "Null" => false,
            "String" | "Date" | "Json" | "Xml" => self.value.is_string(),
            "Integer" | "Long" | "Short" => self.value.is_i64() || self.value.is_u64(),
            "Double" => self.value.is_number(),
            "Boolean" => self.value.is_boolean(),
            _ => true,
        }
    }
}

/// Subscription to one topic within a fetch-and-lock request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub topic_name: String,
    /// Requested lease length in milliseconds.
    pub lock_duration: u64,
    /// Variables to fetch; `None` fetches all of them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Vec<String>>,
}

impl Topic {
    pub fn new(topic_name: impl Into<String>, lock_duration: Duration) -> Self {
        Self {
            topic_name: topic_name.into(),
            lock_duration: as_millis(lock_duration),
            variables: None,
        }
    }

    pub fn with_variables(mut self, variables: Vec<String>) -> Self {
        self.variables = Some(variables);
        self
    }
}

/// Body of `POST /external-task/fetchAndLock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchAndLockRequest {
    pub worker_id: String,
    pub max_tasks: u32,
    pub topics: Vec<Topic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_priority: Option<bool>,
    /// Long-poll window in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub async_response_timeout: Option<u64>,
}

impl FetchAndLockRequest {
    pub fn new(worker_id: impl Into<String>, max_tasks: u32, topics: Vec<Topic>) -> Self {
        Self {
            worker_id: worker_id.into(),
            max_tasks,
            topics,
            use_priority: None,
            async_response_timeout: None,
        }
    }
}

/// Body of `POST /external-task/{id}/complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    pub worker_id: String,
    #[serde(default)]
    pub variables: Variables,
}

/// Body of `POST /external-task/{id}/failure`.
///
/// `retries = 0` marks the task as permanently failed; the engine raises an
/// incident instead of offering it again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleFailureRequest {
    pub worker_id: String,
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    pub retries: u32,
    /// Delay in milliseconds before the task becomes visible again.
    pub retry_timeout: u64,
}

/// Body of `POST /external-task/{id}/extendLock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendLockRequest {
    pub worker_id: String,
    /// New lease length in milliseconds, counted from now.
    pub new_duration: u64,
}

/// Body of `POST /external-task/{id}/bpmnError`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BpmnErrorRequest {
    pub worker_id: String,
    pub error_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub variables: Variables,
}

pub(crate) fn as_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
