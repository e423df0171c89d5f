//! Stateful listing controllers.
//!
//! Each controller owns one page of a listing and re-fetches it whenever the
//! page (or, for tasks, the search string) changes. State lives in a
//! `tokio::sync::watch` channel so renderers can subscribe to it.

pub mod logs;
pub mod tasks;

use std::sync::atomic::{AtomicU64, Ordering};

pub use logs::{ActionKind, LogListController, LogListState, classify_action};
pub use tasks::{TaskListController, TaskListState};

/// Hands out monotonic request ids. Only the most recently issued id may
/// apply its response; anything older is stale.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    issued: AtomicU64,
}

impl RequestSequencer {
    pub fn issue(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, id: u64) -> bool {
        self.issued.load(Ordering::SeqCst) == id
    }

    pub fn latest(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }
}

/// Resolves a requested page against the current one. Zero clamps to the
/// first page; anything past `page_count` is refused, as is staying put.
pub(crate) fn guard_page(requested: u32, current: u32, page_count: u32) -> Option<u32> {
    let requested = requested.max(1);
    if requested > page_count.max(1) || requested == current {
        None
    } else {
        Some(requested)
    }
}

/// 1-based position of row `index` across the whole listing.
pub fn row_number(page: u32, limit: u32, index: usize) -> u64 {
    u64::from(page.saturating_sub(1)) * u64::from(limit) + index as u64 + 1
}
