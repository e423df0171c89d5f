//! Backend whose listing responses are released by the test, one request
//! at a time, so responses can be made to arrive out of order.

use std::collections::VecDeque;
use std::time::Duration;

use dotrack_core::api::{LogApi, TaskApi};
use dotrack_core::error::RequestError;
use dotrack_shared::{LogEntryDto, LogQuery, Page, TaskDto, TaskId, TaskInput, TaskQuery};
use parking_lot::Mutex;
use tokio::sync::{Notify, oneshot};

pub struct Pending<Q, T> {
    pub query: Q,
    reply: oneshot::Sender<Result<Page<T>, RequestError>>,
}

impl<Q, T> Pending<Q, T> {
    pub fn respond(self, page: Page<T>) {
        let _ = self.reply.send(Ok(page));
    }

    pub fn fail(self, message: &str) {
        let _ = self.reply.send(Err(RequestError::Transport {
            message: message.to_string(),
        }));
    }
}

struct Gate<Q, T> {
    pending: Mutex<VecDeque<Pending<Q, T>>>,
    arrived: Notify,
}

impl<Q, T> Default for Gate<Q, T> {
    fn default() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            arrived: Notify::new(),
        }
    }
}

impl<Q, T> Gate<Q, T> {
    async fn enter(&self, query: Q) -> Result<Page<T>, RequestError> {
        let (reply, rx) = oneshot::channel();
        self.pending.lock().push_back(Pending { query, reply });
        self.arrived.notify_one();
        rx.await.unwrap_or_else(|_| {
            Err(RequestError::Transport {
                message: "gate dropped".to_string(),
            })
        })
    }

    async fn next(&self) -> Pending<Q, T> {
        let wait = async {
            loop {
                let popped = self.pending.lock().pop_front();
                if let Some(pending) = popped {
                    return pending;
                }
                self.arrived.notified().await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("no request arrived at the gate")
    }
}

#[derive(Default)]
pub struct GatedApi {
    tasks: Gate<TaskQuery, TaskDto>,
    logs: Gate<LogQuery, LogEntryDto>,
    pub saved: Mutex<Vec<TaskInput>>,
}

impl GatedApi {
    /// Waits for the next task listing request.
    pub async fn next_task_list(&self) -> Pending<TaskQuery, TaskDto> {
        self.tasks.next().await
    }

    pub async fn next_log_list(&self) -> Pending<LogQuery, LogEntryDto> {
        self.logs.next().await
    }
}

impl TaskApi for GatedApi {
    async fn list_tasks(&self, query: &TaskQuery) -> Result<Page<TaskDto>, RequestError> {
        self.tasks.enter(query.clone()).await
    }

    async fn create_task(&self, input: &TaskInput) -> Result<TaskDto, RequestError> {
        self.saved.lock().push(input.clone());
        Ok(task("new", &input.title))
    }

    async fn update_task(&self, id: &TaskId, input: &TaskInput) -> Result<TaskDto, RequestError> {
        self.saved.lock().push(input.clone());
        Ok(task(id.as_str(), &input.title))
    }

    async fn delete_task(&self, _id: &TaskId) -> Result<(), RequestError> {
        Ok(())
    }
}

impl LogApi for GatedApi {
    async fn list_logs(&self, query: &LogQuery) -> Result<Page<LogEntryDto>, RequestError> {
        self.logs.enter(query.clone()).await
    }
}

pub fn task(id: &str, title: &str) -> TaskDto {
    TaskDto {
        id: TaskId::from(id),
        title: title.to_string(),
        description: format!("{title} description"),
        created_at: None,
    }
}

pub fn task_page(titles: &[&str], total: u64, total_pages: u32) -> Page<TaskDto> {
    Page {
        data: titles
            .iter()
            .enumerate()
            .map(|(idx, title)| task(&format!("id-{idx}"), title))
            .collect(),
        total,
        total_pages,
    }
}
