use std::borrow::Cow;
use std::sync::OnceLock;

use dotrack_shared::{FIELD_MAX_CHARS, TaskInput};
use regex::Regex;
use tracing::trace;

use crate::error::ValidationError;

const TAG_PATTERN: &str = r"<[^>]*>";

fn compile(pattern: &str) -> Result<Regex, ValidationError> {
    Regex::new(pattern).map_err(|e| ValidationError::Sanitizer(e.to_string()))
}

fn tag_pattern() -> Result<&'static Regex, ValidationError> {
    static TAG_RE: OnceLock<Result<Regex, ValidationError>> = OnceLock::new();
    TAG_RE.get_or_init(|| compile(TAG_PATTERN)).as_ref().map_err(Clone::clone)
}

/// Removes every run from `<` through the next `>`, whether or not it is
/// markup: `a < b > c` becomes `a  c`.
pub fn strip_tags(text: &str) -> Result<Cow<'_, str>, ValidationError> {
    Ok(tag_pattern()?.replace_all(text, ""))
}

/// Keeps at most `max` characters (not bytes).
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn sanitize_field(text: &str) -> Result<String, ValidationError> {
    let stripped = strip_tags(text)?;
    Ok(truncate_chars(&stripped, FIELD_MAX_CHARS).to_string())
}

/// Builds the request body for a create or update: tags stripped, each field
/// capped at [`FIELD_MAX_CHARS`], and neither field left blank.
pub fn prepare_input(title: &str, description: &str) -> Result<TaskInput, ValidationError> {
    let title = sanitize_field(title)?;
    if title.trim().is_empty() {
        return Err(ValidationError::Required("title"));
    }

    let description = sanitize_field(description)?;
    if description.trim().is_empty() {
        return Err(ValidationError::Required("description"));
    }

    trace!(
        title_len = title.chars().count(),
        description_len = description.chars().count(),
        "prepared task input"
    );
    Ok(TaskInput { title, description })
}
