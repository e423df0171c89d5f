//! In-process DoTrack backend for integration tests.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use dotrack_core::api::ApiClient;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;

type Shared = Arc<Mutex<Backend>>;

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct RecordedQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub q: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StoredTask {
    pub id: String,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl StoredTask {
    fn to_json(&self) -> Value {
        json!({
            "_id": self.id,
            "title": self.title,
            "description": self.description,
            "createdAt": self.created_at.to_rfc3339(),
        })
    }
}

#[derive(Debug, Default)]
pub struct Backend {
    /// Insertion order; listings are served newest first.
    pub tasks: Vec<StoredTask>,
    pub logs: Vec<Value>,
    pub task_queries: Vec<RecordedQuery>,
    pub log_queries: Vec<RecordedQuery>,
    pub fail_lists: bool,
    pub fail_mutations: bool,
    next_id: u64,
}

impl Backend {
    fn insert(&mut self, title: &str, description: &str) -> StoredTask {
        self.next_id += 1;
        let task = StoredTask {
            id: format!("{:024x}", self.next_id),
            title: title.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
        };
        self.tasks.push(task.clone());
        task
    }

    fn log(&mut self, action: &str, task_id: &str, updated: Option<Value>) {
        let mut entry = json!({
            "action": action,
            "taskId": task_id,
            "timestamp": Utc::now().to_rfc3339(),
        });
        if let (Some(updated), Value::Object(map)) = (updated, &mut entry) {
            map.insert("updatedContent".to_string(), updated);
        }
        self.logs.push(entry);
    }
}

pub struct FakeServer {
    pub base_url: String,
    pub backend: Shared,
    handle: JoinHandle<()>,
}

impl FakeServer {
    pub async fn start() -> Self {
        let backend: Shared = Arc::new(Mutex::new(Backend::default()));
        let app = Router::new()
            .route("/api/tasks", get(list_tasks).post(create_task))
            .route("/api/tasks/{id}", put(update_task).delete(delete_task))
            .route("/api/logs", get(list_logs))
            .with_state(Arc::clone(&backend));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake server");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake server");
        });

        Self {
            base_url: format!("http://{addr}"),
            backend,
            handle,
        }
    }

    pub fn client(&self) -> ApiClient {
        ApiClient::new(&self.base_url, Duration::from_secs(5)).expect("api client")
    }

    /// Adds `count` tasks titled `Task 1..=count` without writing logs.
    pub fn seed(&self, count: usize) -> Vec<StoredTask> {
        let mut backend = self.backend.lock();
        (1..=count)
            .map(|n| backend.insert(&format!("Task {n}"), &format!("Description {n}")))
            .collect()
    }

    pub fn seed_task(&self, title: &str, description: &str) -> StoredTask {
        self.backend.lock().insert(title, description)
    }

    pub fn seed_logs(&self, count: usize) {
        let mut backend = self.backend.lock();
        for n in 1..=count {
            backend.log("Task Created", &format!("seed-{n}"), None);
        }
    }

    pub fn task_count(&self) -> usize {
        self.backend.lock().tasks.len()
    }

    pub fn task_queries(&self) -> Vec<RecordedQuery> {
        self.backend.lock().task_queries.clone()
    }

    pub fn log_queries(&self) -> Vec<RecordedQuery> {
        self.backend.lock().log_queries.clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.backend
            .lock()
            .logs
            .iter()
            .filter_map(|entry| entry["action"].as_str().map(str::to_string))
            .collect()
    }

    pub fn fail_lists(&self, fail: bool) {
        self.backend.lock().fail_lists = fail;
    }

    pub fn fail_mutations(&self, fail: bool) {
        self.backend.lock().fail_mutations = fail;
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn page_of(items: Vec<Value>, query: &RecordedQuery) -> Value {
    let page = query.page.unwrap_or(1).max(1) as usize;
    let limit = query.limit.unwrap_or(5).max(1) as usize;
    let total = items.len();
    let data: Vec<Value> = items.into_iter().skip((page - 1) * limit).take(limit).collect();
    json!({
        "data": data,
        "total": total,
        "totalPages": total.div_ceil(limit),
    })
}

fn failure(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn field(body: &Value, name: &str) -> String {
    body[name].as_str().unwrap_or_default().to_string()
}

async fn list_tasks(State(backend): State<Shared>, Query(query): Query<RecordedQuery>) -> Response {
    let mut backend = backend.lock();
    backend.task_queries.push(query.clone());
    if backend.fail_lists {
        return failure(StatusCode::INTERNAL_SERVER_ERROR, "list failed");
    }

    let needle = query.q.as_deref().unwrap_or_default().to_lowercase();
    let items = backend
        .tasks
        .iter()
        .rev()
        .filter(|task| {
            needle.is_empty()
                || task.title.to_lowercase().contains(&needle)
                || task.description.to_lowercase().contains(&needle)
        })
        .map(StoredTask::to_json)
        .collect();
    Json(page_of(items, &query)).into_response()
}

async fn create_task(State(backend): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut backend = backend.lock();
    if backend.fail_mutations {
        return failure(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
    }

    let (title, description) = (field(&body, "title"), field(&body, "description"));
    if title.is_empty() || description.is_empty() {
        return failure(StatusCode::BAD_REQUEST, "Title and description are required");
    }

    let task = backend.insert(&title, &description);
    backend.log("Task Created", &task.id, None);
    (StatusCode::CREATED, Json(task.to_json())).into_response()
}

async fn update_task(
    State(backend): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut backend = backend.lock();
    if backend.fail_mutations {
        return failure(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
    }

    let (title, description) = (field(&body, "title"), field(&body, "description"));
    let Some(task) = backend.tasks.iter_mut().find(|task| task.id == id) else {
        return failure(StatusCode::NOT_FOUND, "Task not found");
    };
    task.title = title.clone();
    task.description = description.clone();
    let updated = task.to_json();

    backend.log(
        "Task Updated",
        &id,
        Some(json!({ "title": title, "description": description })),
    );
    Json(updated).into_response()
}

async fn delete_task(State(backend): State<Shared>, Path(id): Path<String>) -> Response {
    let mut backend = backend.lock();
    if backend.fail_mutations {
        return failure(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
    }

    let Some(index) = backend.tasks.iter().position(|task| task.id == id) else {
        return failure(StatusCode::NOT_FOUND, "Task not found");
    };
    backend.tasks.remove(index);
    backend.log("Task Deleted", &id, None);
    Json(json!({ "message": "Task deleted" })).into_response()
}

async fn list_logs(State(backend): State<Shared>, Query(query): Query<RecordedQuery>) -> Response {
    let mut backend = backend.lock();
    backend.log_queries.push(query.clone());
    if backend.fail_lists {
        return failure(StatusCode::INTERNAL_SERVER_ERROR, "list failed");
    }

    let items = backend.logs.iter().rev().cloned().collect();
    Json(page_of(items, &query)).into_response()
}
