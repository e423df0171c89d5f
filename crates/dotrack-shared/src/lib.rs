use std::collections::BTreeMap;
use std::fmt;

use chrono::{
  DateTime,
  Utc
};
use serde::{
  Deserialize,
  Deserializer,
  Serialize
};
use serde_json::Value;

/// Page size used by both listings.
pub const PAGE_LIMIT: u32 = 5;

/// Upper bound, in characters, for task
/// titles and descriptions.
pub const FIELD_MAX_CHARS: usize = 100;

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for TaskId {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<String> for TaskId {
  fn from(value: String) -> Self {
    Self(value)
  }
}

impl From<&str> for TaskId {
  fn from(value: &str) -> Self {
    Self(value.to_string())
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct TaskDto {
  #[serde(rename = "_id", alias = "id")]
  pub id:          TaskId,
  #[serde(default)]
  pub title:       String,
  #[serde(default)]
  pub description: String,
  #[serde(
    rename = "createdAt",
    default,
    deserialize_with = "lenient_timestamp",
    skip_serializing_if = "Option::is_none"
  )]
  pub created_at:  Option<DateTime<Utc>>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Default,
)]
pub struct LogEntryDto {
  #[serde(
    default,
    deserialize_with = "lenient_timestamp",
    skip_serializing_if = "Option::is_none"
  )]
  pub timestamp:       Option<DateTime<Utc>>,
  #[serde(default)]
  pub action:          Option<String>,
  #[serde(
    rename = "taskId",
    default,
    deserialize_with = "lenient_id",
    skip_serializing_if = "Option::is_none"
  )]
  pub task_id:         Option<TaskId>,
  #[serde(
    rename = "updatedContent",
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub updated_content:
    Option<BTreeMap<String, Value>>
}

/// Pagination envelope shared by the
/// task and log listings.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct Page<T> {
  #[serde(default = "Vec::new")]
  pub data:        Vec<T>,
  #[serde(default)]
  pub total:       u64,
  #[serde(
    rename = "totalPages",
    default = "default_total_pages"
  )]
  pub total_pages: u32
}

impl<T> Page<T> {
  pub fn empty() -> Self {
    Self {
      data:        Vec::new(),
      total:       0,
      total_pages: 1
    }
  }

  /// Page count used for paging
  /// guards; never below one.
  pub fn page_count(&self) -> u32 {
    self.total_pages.max(1)
  }
}

impl<T> Default for Page<T> {
  fn default() -> Self {
    Self::empty()
  }
}

/// `ceil(total / limit)`, as the server
/// computes `totalPages`.
pub fn total_pages_for(
  total: u64,
  limit: u32
) -> u32 {
  if limit == 0 {
    return 0;
  }
  let pages =
    total.div_ceil(u64::from(limit));
  u32::try_from(pages)
    .unwrap_or(u32::MAX)
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TaskQuery {
  pub page:  u32,
  pub limit: u32,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub q:     Option<String>
}

impl TaskQuery {
  /// An empty search string leaves `q`
  /// out of the query entirely.
  pub fn new(
    page: u32,
    search: &str
  ) -> Self {
    Self {
      page,
      limit: PAGE_LIMIT,
      q: if search.is_empty() {
        None
      } else {
        Some(search.to_string())
      }
    }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct LogQuery {
  pub page:  u32,
  pub limit: u32
}

impl LogQuery {
  pub fn new(page: u32) -> Self {
    Self {
      page,
      limit: PAGE_LIMIT
    }
  }
}

/// Body of `POST /api/tasks` and
/// `PUT /api/tasks/:id`.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TaskInput {
  pub title:       String,
  pub description: String
}

fn default_total_pages() -> u32 {
  1
}

fn lenient_timestamp<'de, D>(
  deserializer: D
) -> Result<Option<DateTime<Utc>>, D::Error>
where
  D: Deserializer<'de>
{
  let raw =
    Option::<Value>::deserialize(
      deserializer
    )?;
  Ok(match raw {
    | Some(Value::String(text)) => {
      DateTime::parse_from_rfc3339(&text)
        .ok()
        .map(|dt| {
          dt.with_timezone(&Utc)
        })
    }
    | Some(Value::Number(millis)) => {
      millis
        .as_i64()
        .and_then(
          DateTime::from_timestamp_millis
        )
    }
    | _ => None
  })
}

fn lenient_id<'de, D>(
  deserializer: D
) -> Result<Option<TaskId>, D::Error>
where
  D: Deserializer<'de>
{
  let raw =
    Option::<Value>::deserialize(
      deserializer
    )?;
  Ok(match raw {
    | Some(Value::String(text)) => {
      Some(TaskId(text))
    }
    | Some(Value::Number(n)) => {
      Some(TaskId(n.to_string()))
    }
    | _ => None
  })
}
