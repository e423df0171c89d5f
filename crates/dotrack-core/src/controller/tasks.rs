use std::sync::Arc;

use dotrack_shared::{PAGE_LIMIT, TaskDto, TaskId, TaskQuery};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use super::{RequestSequencer, guard_page, row_number};
use crate::api::TaskApi;
use crate::error::{FormError, MutationError, RequestError};
use crate::form::TaskForm;
use crate::sanitize::prepare_input;

#[derive(Debug, Clone, PartialEq)]
pub struct TaskListState {
    pub page: u32,
    pub search: String,
    pub tasks: Vec<TaskDto>,
    pub total: u64,
    pub total_pages: u32,
}

impl Default for TaskListState {
    fn default() -> Self {
        Self {
            page: 1,
            search: String::new(),
            tasks: Vec::new(),
            total: 0,
            total_pages: 1,
        }
    }
}

impl TaskListState {
    pub fn page_count(&self) -> u32 {
        self.total_pages.max(1)
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.page_count()
    }

    pub fn row_number(&self, index: usize) -> u64 {
        row_number(self.page, PAGE_LIMIT, index)
    }

    /// Looks a task up by the row number shown next to it.
    pub fn task_at_row(&self, row: u64) -> Option<&TaskDto> {
        let first = self.row_number(0);
        let offset = row.checked_sub(first)?;
        self.tasks.get(usize::try_from(offset).ok()?)
    }
}

/// Owns the visible page of the task listing.
///
/// Every change to `page` or `search` triggers exactly one fetch. Mutations
/// wait for the server and then re-fetch the page that is currently active;
/// nothing is removed or inserted locally ahead of the server.
pub struct TaskListController<A> {
    api: Arc<A>,
    state: watch::Sender<TaskListState>,
    sequencer: RequestSequencer,
}

impl<A: TaskApi> TaskListController<A> {
    pub fn new(api: Arc<A>) -> Self {
        let (state, _) = watch::channel(TaskListState::default());
        Self {
            api,
            state,
            sequencer: RequestSequencer::default(),
        }
    }

    /// Starts on page 1 with `search` already applied, so that `mount`
    /// fetches the filtered listing directly.
    pub fn with_search(api: Arc<A>, search: impl Into<String>) -> Self {
        let controller = Self::new(api);
        controller.state.send_modify(|state| state.search = search.into());
        controller
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskListState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> TaskListState {
        self.state.borrow().clone()
    }

    /// Initial fetch of page 1 with the current search.
    pub async fn mount(&self) -> bool {
        self.refresh().await
    }

    /// Fetches the current page. Returns whether the response was applied: a
    /// failed request, or one overtaken by a newer refresh, leaves the state
    /// untouched.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> bool {
        let query = {
            let state = self.state.borrow();
            TaskQuery::new(state.page, &state.search)
        };
        let request_id = self.sequencer.issue();
        debug!(request_id, page = query.page, q = ?query.q, "fetching tasks");

        let listing = match self.api.list_tasks(&query).await {
            Ok(listing) => listing,
            Err(err) => {
                warn!(request_id, error = %err, "error fetching tasks");
                return false;
            }
        };

        let applied = self.state.send_if_modified(|state| {
            if !self.sequencer.is_current(request_id) {
                return false;
            }
            state.tasks = listing.data;
            state.total = listing.total;
            state.total_pages = listing.total_pages;
            true
        });

        if applied {
            debug!(request_id, total = self.state.borrow().total, "applied task listing");
        } else {
            debug!(
                request_id,
                latest = self.sequencer.latest(),
                "discarding stale task listing"
            );
        }
        applied
    }

    /// Sets the search string and goes back to page 1. Returns whether
    /// anything changed (and therefore a fetch was issued).
    pub async fn set_search(&self, search: impl Into<String>) -> bool {
        let search = search.into();
        let changed = self.state.send_if_modified(|state| {
            let changed = state.page != 1 || state.search != search;
            state.page = 1;
            state.search = search;
            changed
        });

        if changed {
            self.refresh().await;
        }
        changed
    }

    /// Moves to page `page`. Page 0 means page 1; pages past the last known
    /// page are ignored. Returns whether the page changed.
    pub async fn set_page(&self, page: u32) -> bool {
        self.turn_to(page).await.is_some()
    }

    /// Same as `set_page`, but reports the fetch for the new page: `None`
    /// when the page did not change, otherwise whether the listing for it
    /// was applied.
    pub async fn turn_to(&self, page: u32) -> Option<bool> {
        let changed = self.state.send_if_modified(|state| {
            match guard_page(page, state.page, state.page_count()) {
                Some(next) => {
                    state.page = next;
                    true
                }
                None => false,
            }
        });

        if !changed {
            debug!(requested = page, "page change ignored");
            return None;
        }
        Some(self.refresh().await)
    }

    pub async fn next_page(&self) -> bool {
        let current = self.state.borrow().page;
        self.set_page(current.saturating_add(1)).await
    }

    pub async fn prev_page(&self) -> bool {
        let current = self.state.borrow().page;
        self.set_page(current.saturating_sub(1).max(1)).await
    }

    #[instrument(skip(self, title, description))]
    pub async fn create(&self, title: &str, description: &str) -> Result<TaskDto, MutationError> {
        let input = prepare_input(title, description)?;
        let task = self.api.create_task(&input).await.inspect_err(|err| {
            error!(error = %err, "error creating task");
        })?;
        info!(id = %task.id, "task created");
        self.refresh().await;
        Ok(task)
    }

    #[instrument(skip(self, title, description), fields(id = %id))]
    pub async fn update(
        &self,
        id: &TaskId,
        title: &str,
        description: &str,
    ) -> Result<TaskDto, MutationError> {
        let input = prepare_input(title, description)?;
        let task = self.api.update_task(id, &input).await.inspect_err(|err| {
            error!(error = %err, "error updating task");
        })?;
        info!(id = %task.id, "task updated");
        self.refresh().await;
        Ok(task)
    }

    /// Deletes on the server, then re-fetches. The row stays in the state
    /// until that fetch lands.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn delete(&self, id: &TaskId) -> Result<(), RequestError> {
        self.api.delete_task(id).await.inspect_err(|err| {
            error!(error = %err, "error deleting task");
        })?;
        info!("task deleted");
        self.refresh().await;
        Ok(())
    }

    /// Submits `form` and, once the server confirms, re-fetches the current
    /// page from the form's completion callback.
    pub async fn save(&self, form: &mut TaskForm) -> Result<TaskDto, FormError> {
        form.submit(self.api.as_ref(), async |saved: TaskDto| {
            debug!(id = %saved.id, "form saved; refreshing tasks");
            self.refresh().await;
        })
        .await
    }
}
