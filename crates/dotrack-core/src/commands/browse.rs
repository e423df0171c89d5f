use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::{debug, info};

use crate::api::{LogApi, TaskApi};
use crate::controller::{LogListController, TaskListController};
use crate::error::FormError;
use crate::form::{FormMode, TaskForm};
use crate::render::{Renderer, display_safe};

const HELP: &[&str] = &[
    "n / p         next / previous page",
    "/text         search tasks by title or description (/ alone clears)",
    "a             add a task",
    "e <row>       edit the task on row <row>",
    "d <row>       delete the task on row <row>",
    "r             reload the current page",
    "t / l         switch to tasks / logs",
    "q             quit",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseAction {
    Next,
    Prev,
    Search(String),
    Add,
    Edit(u64),
    Delete(u64),
    Refresh,
    ShowTasks,
    ShowLogs,
    Redraw,
    Help,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Tasks,
    Logs,
}

pub fn parse_action(line: &str) -> Result<BrowseAction, String> {
    if let Some(query) = line.strip_prefix('/') {
        return Ok(BrowseAction::Search(query.to_string()));
    }

    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else {
        return Ok(BrowseAction::Redraw);
    };

    let action = match cmd {
        "n" | "next" => BrowseAction::Next,
        "p" | "prev" => BrowseAction::Prev,
        "a" | "add" => BrowseAction::Add,
        "e" | "edit" => BrowseAction::Edit(parse_row(parts.next())?),
        "d" | "delete" => BrowseAction::Delete(parse_row(parts.next())?),
        "r" | "refresh" => BrowseAction::Refresh,
        "t" | "tasks" => BrowseAction::ShowTasks,
        "l" | "logs" => BrowseAction::ShowLogs,
        "?" | "h" | "help" => BrowseAction::Help,
        "q" | "quit" | "exit" => BrowseAction::Quit,
        other => return Err(format!("unknown command: {other} (? for help)")),
    };

    if let Some(extra) = parts.next() {
        return Err(format!("unexpected argument: {extra}"));
    }
    Ok(action)
}

fn parse_row(token: Option<&str>) -> Result<u64, String> {
    let token = token.ok_or_else(|| "expected a row number".to_string())?;
    token
        .parse::<u64>()
        .map_err(|_| format!("not a row number: {token}"))
}

/// Interactive loop over the task and log listings. Reads one command per
/// line from `input` until `q` or end of input.
///
/// Switching views starts the target view over from page 1, the same way a
/// freshly opened page would.
pub async fn run<A, R>(api: Arc<A>, renderer: &mut Renderer, input: R) -> anyhow::Result<()>
where
    A: TaskApi + LogApi,
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut view = View::Tasks;
    let mut tasks = TaskListController::new(Arc::clone(&api));
    let mut logs = LogListController::new(Arc::clone(&api));
    tasks.mount().await;

    renderer.notice("DoTrack  (? for help)")?;
    loop {
        match view {
            View::Tasks => renderer.print_task_page(&tasks.snapshot())?,
            View::Logs => renderer.print_log_page(&logs.snapshot())?,
        }
        renderer.prompt(match view {
            View::Tasks => "tasks> ",
            View::Logs => "logs> ",
        })?;

        let Some(line) = lines.next_line().await.context("failed to read command")? else {
            break;
        };
        let action = match parse_action(line.trim_end()) {
            Ok(action) => action,
            Err(message) => {
                renderer.alert(&message)?;
                continue;
            }
        };
        debug!(?action, ?view, "browse action");

        match (view, action) {
            (_, BrowseAction::Quit) => break,
            (_, BrowseAction::Redraw) => {}
            (_, BrowseAction::Help) => {
                for line in HELP {
                    renderer.line(line)?;
                }
            }
            (View::Logs, BrowseAction::ShowTasks) => {
                tasks = TaskListController::new(Arc::clone(&api));
                tasks.mount().await;
                view = View::Tasks;
            }
            (View::Tasks, BrowseAction::ShowLogs) => {
                logs = LogListController::new(Arc::clone(&api));
                logs.mount().await;
                view = View::Logs;
            }
            (View::Tasks, BrowseAction::ShowTasks) | (View::Logs, BrowseAction::ShowLogs) => {}
            (View::Tasks, BrowseAction::Next) => {
                tasks.next_page().await;
            }
            (View::Tasks, BrowseAction::Prev) => {
                tasks.prev_page().await;
            }
            (View::Tasks, BrowseAction::Refresh) => {
                tasks.refresh().await;
            }
            (View::Tasks, BrowseAction::Search(query)) => {
                tasks.set_search(query).await;
            }
            (View::Tasks, BrowseAction::Add) => {
                run_form(&tasks, renderer, &mut lines, TaskForm::open_create()).await?;
            }
            (View::Tasks, BrowseAction::Edit(row)) => {
                let Some(task) = tasks.snapshot().task_at_row(row).cloned() else {
                    renderer.alert(&format!("no task on row {row}"))?;
                    continue;
                };
                run_form(&tasks, renderer, &mut lines, TaskForm::open_edit(&task)).await?;
            }
            (View::Tasks, BrowseAction::Delete(row)) => {
                let Some(task) = tasks.snapshot().task_at_row(row).cloned() else {
                    renderer.alert(&format!("no task on row {row}"))?;
                    continue;
                };
                match tasks.delete(&task.id).await {
                    Ok(()) => renderer.notice(&format!("Deleted \"{}\"", display_safe(&task.title)))?,
                    Err(err) => renderer.alert(&format!("Failed to delete task: {err}"))?,
                }
            }
            (View::Logs, BrowseAction::Next) => {
                logs.next_page().await;
            }
            (View::Logs, BrowseAction::Prev) => {
                logs.prev_page().await;
            }
            (View::Logs, BrowseAction::Refresh) => {
                logs.refresh().await;
            }
            (View::Logs, _) => renderer.alert("the log view is read-only")?,
        }
    }

    info!("browse session ended");
    Ok(())
}

/// Prompts for both fields, then submits. A failed save keeps what was
/// typed and offers to try again; end of input abandons the form.
async fn run_form<A, R>(
    tasks: &TaskListController<A>,
    renderer: &mut Renderer,
    lines: &mut Lines<R>,
    mut form: TaskForm,
) -> anyhow::Result<()>
where
    A: TaskApi,
    R: AsyncBufRead + Unpin,
{
    let editing = matches!(form.mode(), FormMode::Edit(_));
    renderer.notice(if editing { "Edit Task" } else { "Add New Task" })?;

    loop {
        let Some(title) = ask(renderer, lines, "Title", &form.title).await? else {
            return Ok(());
        };
        form.title = title;

        let label = format!("Description ({})", form.description_counter());
        let Some(description) = ask(renderer, lines, &label, &form.description).await? else {
            return Ok(());
        };
        form.description = description;

        loop {
            match tasks.save(&mut form).await {
                Ok(task) => {
                    let verb = if editing { "Updated" } else { "Added" };
                    renderer.notice(&format!("{verb} \"{}\"", display_safe(&task.title)))?;
                    return Ok(());
                }
                Err(FormError::Invalid(err)) => {
                    renderer.alert(&err.to_string())?;
                    break;
                }
                Err(err) => {
                    let message = form.error().map(str::to_string).unwrap_or_else(|| err.to_string());
                    renderer.alert(&message)?;
                    renderer.prompt("Retry? [y/N] ")?;
                    let Some(answer) = lines.next_line().await.context("failed to read answer")? else {
                        return Ok(());
                    };
                    if !answer.trim().eq_ignore_ascii_case("y") {
                        form.close();
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Reads one field. An empty answer keeps `current`.
async fn ask<R>(
    renderer: &mut Renderer,
    lines: &mut Lines<R>,
    label: &str,
    current: &str,
) -> anyhow::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    if current.is_empty() {
        renderer.prompt(&format!("{label}: "))?;
    } else {
        renderer.prompt(&format!("{label} [{}]: ", display_safe(current)))?;
    }

    let Some(answer) = lines.next_line().await.context("failed to read input")? else {
        return Ok(None);
    };
    if answer.trim().is_empty() {
        return Ok(Some(current.to_string()));
    }
    Ok(Some(answer))
}
