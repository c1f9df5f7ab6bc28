//! REST client for the task service.
//!
//! Routes, relative to the configured base URL (`http://localhost:8080/api`
//! by default):
//!   GET    /tasks                  list
//!   POST   /tasks                  create
//!   PUT    /tasks/{id}             replace fields
//!   DELETE /tasks/{id}             remove
//!   PATCH  /tasks/{id}/completion  `{"completed": bool}`
//!   GET    /health                 liveness check
//!
//! Failures come back as `{"error": true, "message": "..."}` with a 4xx/5xx
//! status.

use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::ServerConfig;
use crate::error::TransportError;
use crate::model::{Task, TaskDraft, TaskId, TaskPatch};
use crate::sync::TaskSource;

#[derive(Debug, Deserialize)]
struct MessageBody {
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpTaskSource {
    http:     Client,
    base_url: String,
}

impl HttpTaskSource {
    pub fn new(config: &ServerConfig) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("taskboard/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(http, &config.base_url))
    }

    pub fn with_client(http: Client, base_url: &str) -> Self {
        Self { http, base_url: base_url.trim_end_matches('/').to_owned() }
    }

    pub fn base_url(&self) -> &str { &self.base_url }

    fn tasks_url(&self) -> String { format!("{}/tasks", self.base_url) }

    fn task_url(&self, id: &TaskId) -> String {
        format!("{}/tasks/{}", self.base_url, pct(&id.to_string()))
    }

    /// Returns the service's status message.
    pub async fn health(&self) -> Result<String, TransportError> {
        let resp = self.http.get(format!("{}/health", self.base_url))
            .send().await
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;
        let body: MessageBody = check(resp).await?.json().await?;
        Ok(body.message.unwrap_or_else(|| "ok".to_owned()))
    }
}

impl TaskSource for HttpTaskSource {
    async fn fetch_all(&self) -> Result<Vec<Task>, TransportError> {
        let body: Value = check(self.http.get(self.tasks_url()).send().await?).await?
            .json().await?;
        let items = match body {
            Value::Array(items) => items,
            other => return Err(TransportError::Decode(format!("expected a task array, got {other}"))),
        };

        let total = items.len();
        let tasks: Vec<Task> = items.into_iter()
            .filter_map(|v| match serde_json::from_value::<Task>(v) {
                Ok(t)  => Some(t),
                Err(e) => { tracing::warn!("skipping malformed task record: {e}"); None }
            })
            .collect();
        tracing::debug!(total, loaded = tasks.len(), "fetched tasks");
        Ok(tasks)
    }

    async fn create(&self, draft: &TaskDraft) -> Result<Task, TransportError> {
        let resp = self.http.post(self.tasks_url()).json(draft).send().await?;
        decode_task(check(resp).await?, None).await
    }

    async fn update(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, TransportError> {
        let resp = self.http.put(self.task_url(id)).json(patch).send().await?;
        decode_task(check(resp).await?, Some(id)).await
    }

    async fn delete(&self, id: &TaskId) -> Result<(), TransportError> {
        check(self.http.delete(self.task_url(id)).send().await?).await?;
        Ok(())
    }

    async fn set_completed(&self, id: &TaskId, completed: bool) -> Result<Task, TransportError> {
        let resp = self.http.patch(format!("{}/completion", self.task_url(id)))
            .json(&json!({ "completed": completed }))
            .send().await?;
        decode_task(check(resp).await?, Some(id)).await
    }
}

// ─── Response handling ────────────────────────────────────────────────────────

/// Pass 2xx responses through; turn anything else into `Status`, preferring
/// the service's own `message`.
async fn check(resp: Response) -> Result<Response, TransportError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<MessageBody>(&text).ok()
        .and_then(|b| b.message)
        .or_else(|| Some(text.trim().to_owned()).filter(|t| !t.is_empty()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_owned());
    Err(TransportError::Status { status: status.as_u16(), message })
}

/// The update route echoes the submitted body, which may lack the id.
async fn decode_task(resp: Response, id: Option<&TaskId>) -> Result<Task, TransportError> {
    let mut body: Value = resp.json().await?;
    if let (Some(id), Value::Object(map)) = (id, &mut body) {
        if map.get("id").map_or(true, Value::is_null) {
            map.insert("id".to_owned(), json!(id));
        }
    }
    serde_json::from_value(body).map_err(|e| TransportError::Decode(e.to_string()))
}

/// Minimal percent-encoding for URL path components.
fn pct(s: &str) -> String {
    s.chars().flat_map(|c| {
        if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~') {
            vec![c]
        } else {
            let mut buf = [0u8; 4];
            c.encode_utf8(&mut buf).bytes()
                .flat_map(|b| format!("%{b:02X}").chars().collect::<Vec<_>>())
                .collect()
        }
    }).collect()
}
