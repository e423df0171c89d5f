//! HTTP client for the DoTrack REST API.
//!
//! [`ApiClient`] exposes the four generic verbs (`get`, `post`, `put`,
//! `delete`) plus typed endpoint methods. Controllers and the task form only
//! see the [`TaskApi`] and [`LogApi`] traits so they can run against any
//! backend.

use std::future::Future;
use std::time::Duration;

use dotrack_shared::{LogEntryDto, LogQuery, Page, TaskDto, TaskId, TaskInput, TaskQuery};
use reqwest::{Client as HttpClient, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::ApiSettings;
use crate::error::RequestError;

const TASKS_PATH: &str = "api/tasks";
const LOGS_PATH: &str = "api/logs";

pub trait TaskApi: Send + Sync {
    fn list_tasks(
        &self,
        query: &TaskQuery,
    ) -> impl Future<Output = Result<Page<TaskDto>, RequestError>> + Send;

    fn create_task(
        &self,
        input: &TaskInput,
    ) -> impl Future<Output = Result<TaskDto, RequestError>> + Send;

    fn update_task(
        &self,
        id: &TaskId,
        input: &TaskInput,
    ) -> impl Future<Output = Result<TaskDto, RequestError>> + Send;

    fn delete_task(&self, id: &TaskId) -> impl Future<Output = Result<(), RequestError>> + Send;
}

pub trait LogApi: Send + Sync {
    fn list_logs(
        &self,
        query: &LogQuery,
    ) -> impl Future<Output = Result<Page<LogEntryDto>, RequestError>> + Send;
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: HttpClient,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RequestError> {
        let mut base_url = Url::parse(base_url)?;
        // Relative joins keep any path prefix the API is mounted under.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = HttpClient::builder()
            .user_agent(concat!("dotrack/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        debug!(base_url = %base_url, timeout_secs = timeout.as_secs(), "built API client");
        Ok(Self { http, base_url })
    }

    pub fn from_settings(settings: &ApiSettings) -> Result<Self, RequestError> {
        Self::new(&settings.base_url, settings.timeout)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET path?params`; `None` fields of `params` are left out of the query.
    pub async fn get<T, P>(&self, path: &str, params: &P) -> Result<T, RequestError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let mut url = self.endpoint(path)?;
        append_query(&mut url, params)?;
        let text = self.send(Method::GET, url, None::<&()>).await?;
        decode(&text)
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, RequestError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(path)?;
        let text = self.send(Method::POST, url, Some(body)).await?;
        decode(&text)
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, RequestError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(path)?;
        let text = self.send(Method::PUT, url, Some(body)).await?;
        decode(&text)
    }

    /// The response body, if any, is ignored.
    pub async fn delete(&self, path: &str) -> Result<(), RequestError> {
        let url = self.endpoint(path)?;
        self.send(Method::DELETE, url, None::<&()>).await?;
        Ok(())
    }

    /// `path` is taken as-is; task ids go through `task_url` so they are
    /// encoded as a single path segment.
    fn endpoint(&self, path: &str) -> Result<Url, RequestError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    fn task_url(&self, id: &TaskId) -> Result<Url, RequestError> {
        let mut url = self.endpoint(TASKS_PATH)?;
        url.path_segments_mut()
            .map_err(|()| RequestError::Encode(format!("{} cannot take a path", self.base_url)))?
            .push(id.as_str());
        Ok(url)
    }

    #[instrument(skip_all, fields(method = %method, url = %url))]
    async fn send<B>(&self, method: Method, url: Url, body: Option<&B>) -> Result<String, RequestError>
    where
        B: Serialize + ?Sized,
    {
        let mut request = self.http.request(method, url.as_str());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            debug!(status = status.as_u16(), bytes = text.len(), "request succeeded");
            Ok(text)
        } else {
            let message = error_message(status, &text);
            warn!(status = status.as_u16(), message = %message, "request rejected");
            Err(RequestError::Status {
                status: status.as_u16(),
                message,
            })
        }
    }
}

impl TaskApi for ApiClient {
    async fn list_tasks(&self, query: &TaskQuery) -> Result<Page<TaskDto>, RequestError> {
        self.get(TASKS_PATH, query).await
    }

    async fn create_task(&self, input: &TaskInput) -> Result<TaskDto, RequestError> {
        self.post(TASKS_PATH, input).await
    }

    async fn update_task(&self, id: &TaskId, input: &TaskInput) -> Result<TaskDto, RequestError> {
        let url = self.task_url(id)?;
        let text = self.send(Method::PUT, url, Some(input)).await?;
        decode(&text)
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), RequestError> {
        let url = self.task_url(id)?;
        self.send(Method::DELETE, url, None::<&()>).await?;
        Ok(())
    }
}

impl LogApi for ApiClient {
    async fn list_logs(&self, query: &LogQuery) -> Result<Page<LogEntryDto>, RequestError> {
        self.get(LOGS_PATH, query).await
    }
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T, RequestError> {
    serde_json::from_str(text).map_err(RequestError::from)
}

fn append_query<P: Serialize + ?Sized>(url: &mut Url, params: &P) -> Result<(), RequestError> {
    let value = serde_json::to_value(params).map_err(|e| RequestError::Encode(e.to_string()))?;

    let map = match value {
        Value::Object(map) => map,
        Value::Null => return Ok(()),
        other => {
            return Err(RequestError::Encode(format!(
                "query parameters must be an object, got {other}"
            )));
        }
    };

    let pairs: Vec<(String, String)> = map
        .into_iter()
        .filter_map(|(key, val)| {
            let val = match val {
                Value::Null => return None,
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => other.to_string(),
            };
            Some((key, val))
        })
        .collect();

    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
    Ok(())
}

/// Prefers a JSON `message`/`error` string, then the raw body, then the
/// status reason phrase.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error"] {
            if let Some(Value::String(message)) = map.get(key) {
                return message.clone();
            }
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }

    status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string()
}
