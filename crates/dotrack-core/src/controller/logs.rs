use std::sync::Arc;

use dotrack_shared::{LogEntryDto, LogQuery, PAGE_LIMIT};
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use super::{RequestSequencer, guard_page, row_number};
use crate::api::LogApi;

/// Badge category for a log entry's free-text action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Create,
    Update,
    Delete,
    Other,
}

/// Case-insensitive substring match, checked in create, update, delete order.
pub fn classify_action(action: &str) -> ActionKind {
    let action = action.to_lowercase();
    if action.contains("create") {
        ActionKind::Create
    } else if action.contains("update") {
        ActionKind::Update
    } else if action.contains("delete") {
        ActionKind::Delete
    } else {
        ActionKind::Other
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogListState {
    pub page: u32,
    pub logs: Vec<LogEntryDto>,
    pub total: u64,
    pub total_pages: u32,
}

impl Default for LogListState {
    fn default() -> Self {
        Self {
            page: 1,
            logs: Vec::new(),
            total: 0,
            total_pages: 1,
        }
    }
}

impl LogListState {
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
}

/// Read-only view over the activity log, one page at a time.
pub struct LogListController<A> {
    api: Arc<A>,
    state: watch::Sender<LogListState>,
    sequencer: RequestSequencer,
}

impl<A: LogApi> LogListController<A> {
    pub fn new(api: Arc<A>) -> Self {
        let (state, _) = watch::channel(LogListState::default());
        Self {
            api,
            state,
            sequencer: RequestSequencer::default(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LogListState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> LogListState {
        self.state.borrow().clone()
    }

    pub async fn mount(&self) -> bool {
        self.refresh().await
    }

    #[instrument(skip(self))]
    pub async fn refresh(&self) -> bool {
        let query = LogQuery::new(self.state.borrow().page);
        let request_id = self.sequencer.issue();
        debug!(request_id, page = query.page, "fetching logs");

        let listing = match self.api.list_logs(&query).await {
            Ok(listing) => listing,
            Err(err) => {
                warn!(request_id, error = %err, "error fetching logs");
                return false;
            }
        };

        let applied = self.state.send_if_modified(|state| {
            if !self.sequencer.is_current(request_id) {
                return false;
            }
            state.logs = listing.data;
            state.total = listing.total;
            state.total_pages = listing.total_pages;
            true
        });

        if !applied {
            debug!(
                request_id,
                latest = self.sequencer.latest(),
                "discarding stale log listing"
            );
        }
        applied
    }

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
}
