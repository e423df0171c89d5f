use std::borrow::Cow;
use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Local, Utc};
use dotrack_shared::{LogEntryDto, TaskDto};
use serde_json::Value;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::controller::{ActionKind, LogListState, TaskListState, classify_action};

const CELL_MAX_CHARS: usize = 40;

pub struct Renderer {
    color: bool,
    out: Box<dyn Write + Send>,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true);

        Ok(Self {
            color: color && io::stdout().is_terminal(),
            out: Box::new(io::stdout()),
        })
    }

    /// Renders into `out` instead of stdout.
    pub fn with_writer(color: bool, out: Box<dyn Write + Send>) -> Self {
        Self { color, out }
    }

    #[tracing::instrument(skip_all, fields(page = state.page, rows = state.tasks.len()))]
    pub fn print_task_page(&mut self, state: &TaskListState) -> anyhow::Result<()> {
        if !state.search.is_empty() {
            writeln!(self.out, "Search: {}", display_safe(&state.search))?;
        }

        if state.tasks.is_empty() {
            writeln!(self.out, "No tasks yet...")?;
        } else {
            let headers = ["#", "ID", "Title", "Description", "Created"]
                .map(str::to_string)
                .to_vec();

            let rows = state
                .tasks
                .iter()
                .enumerate()
                .map(|(idx, task)| {
                    vec![
                        self.paint(&state.row_number(idx).to_string(), "33"),
                        display_safe(task.id.as_str()).into_owned(),
                        clip(&display_safe(&task.title)),
                        clip(&display_safe(&task.description)),
                        format_date(task.created_at),
                    ]
                })
                .collect();

            write_table(&mut self.out, headers, rows)?;
        }

        writeln!(
            self.out,
            "Showing {} of {} tasks  Page {}/{}",
            state.tasks.len(),
            state.total,
            state.page,
            state.page_count()
        )?;
        self.out.flush()?;
        Ok(())
    }

    /// The "Task ID" column carries the row's position in the log, not the
    /// entry's task id.
    #[tracing::instrument(skip_all, fields(page = state.page, rows = state.logs.len()))]
    pub fn print_log_page(&mut self, state: &LogListState) -> anyhow::Result<()> {
        if state.logs.is_empty() {
            writeln!(self.out, "No logs found yet.")?;
        } else {
            let headers = ["Timestamp", "Action", "Task ID", "Updated Content", "Notes"]
                .map(str::to_string)
                .to_vec();

            let rows = state
                .logs
                .iter()
                .enumerate()
                .map(|(idx, entry)| {
                    vec![
                        format_timestamp(entry.timestamp),
                        self.action_badge(entry),
                        format!("#{}", state.row_number(idx)),
                        format_updated_content(entry),
                        "-".to_string(),
                    ]
                })
                .collect();

            write_table(&mut self.out, headers, rows)?;
        }

        writeln!(
            self.out,
            "Showing {} of {} logs  Page {}/{}",
            state.logs.len(),
            state.total,
            state.page,
            state.page_count()
        )?;
        self.out.flush()?;
        Ok(())
    }

    pub fn print_task(&mut self, task: &TaskDto) -> anyhow::Result<()> {
        writeln!(self.out, "id           {}", display_safe(task.id.as_str()))?;
        writeln!(self.out, "title        {}", display_safe(&task.title))?;
        writeln!(self.out, "description  {}", display_safe(&task.description))?;
        writeln!(self.out, "created      {}", format_timestamp(task.created_at))?;
        self.out.flush()?;
        Ok(())
    }

    pub fn notice(&mut self, message: &str) -> anyhow::Result<()> {
        writeln!(self.out, "{}", self.paint(message, "36"))?;
        self.out.flush()?;
        Ok(())
    }

    /// Mutation failures: shown inline, in red when color is on.
    pub fn alert(&mut self, message: &str) -> anyhow::Result<()> {
        writeln!(self.out, "{}", self.paint(&format!("! {message}"), "31"))?;
        self.out.flush()?;
        Ok(())
    }

    pub fn prompt(&mut self, label: &str) -> anyhow::Result<()> {
        write!(self.out, "{label}")?;
        self.out.flush()?;
        Ok(())
    }

    pub fn line(&mut self, text: &str) -> anyhow::Result<()> {
        writeln!(self.out, "{text}")?;
        Ok(())
    }

    fn action_badge(&self, entry: &LogEntryDto) -> String {
        let Some(action) = entry.action.as_deref().filter(|a| !a.is_empty()) else {
            return "-".to_string();
        };
        let label = display_safe(action);
        match classify_action(action) {
            ActionKind::Create => self.paint(&label, "32"),
            ActionKind::Update => self.paint(&label, "33"),
            ActionKind::Delete => self.paint(&label, "31"),
            ActionKind::Other => label.into_owned(),
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// Output encoding for server-provided text: control characters (escape
/// sequences included) are replaced so they cannot drive the terminal.
pub fn display_safe(text: &str) -> Cow<'_, str> {
    if !text.chars().any(char::is_control) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.chars()
            .map(|ch| if ch.is_control() { '\u{FFFD}' } else { ch })
            .collect(),
    )
}

fn clip(text: &str) -> String {
    if text.chars().count() <= CELL_MAX_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(CELL_MAX_CHARS - 1).collect();
    out.push('…');
    out
}

fn format_date(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn format_timestamp(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|dt| {
            dt.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| "-".to_string())
}

fn format_updated_content(entry: &LogEntryDto) -> String {
    let Some(content) = entry.updated_content.as_ref().filter(|c| !c.is_empty()) else {
        return "-".to_string();
    };

    content
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{}: \"{}\"", display_safe(key), clip(&display_safe(&value)))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
