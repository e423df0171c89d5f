pub mod browse;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use dotrack_shared::TaskId;
use tokio::io::BufReader;
use tracing::{debug, instrument, warn};

use crate::api::{ApiClient, LogApi, TaskApi};
use crate::cli::Command;
use crate::config::{ApiSettings, Config};
use crate::controller::{LogListController, TaskListController};
use crate::form::TaskForm;
use crate::render::{Renderer, display_safe};

#[instrument(skip(cfg, settings, renderer))]
pub async fn dispatch(
    cfg: &Config,
    settings: &ApiSettings,
    renderer: &mut Renderer,
    command: Command,
) -> anyhow::Result<()> {
    if command == Command::Show {
        return cmd_show(cfg, settings, renderer);
    }

    let api = Arc::new(
        ApiClient::from_settings(settings)
            .with_context(|| format!("failed to build API client for {}", settings.base_url))?,
    );
    debug!(base_url = %api.base_url(), "dispatching command");

    if command == Command::Browse {
        let input = BufReader::new(tokio::io::stdin());
        return browse::run(api, renderer, input).await;
    }

    execute(api, renderer, command).await
}

/// Runs a one-shot command against `api`.
pub async fn execute<A>(api: Arc<A>, renderer: &mut Renderer, command: Command) -> anyhow::Result<()>
where
    A: TaskApi + LogApi,
{
    match command {
        Command::Tasks { page, search } => {
            cmd_tasks(api, renderer, page, search.unwrap_or_default()).await
        }
        Command::Add { title, description } => {
            cmd_save(api, renderer, TaskForm::open_create().with_input(title, description)).await
        }
        Command::Edit {
            id,
            title,
            description,
        } => {
            let form = TaskForm::open_edit_id(TaskId::from(id)).with_input(title, description);
            cmd_save(api, renderer, form).await
        }
        Command::Delete { id } => cmd_delete(api, renderer, TaskId::from(id)).await,
        Command::Logs { page } => cmd_logs(api, renderer, page).await,
        Command::Browse | Command::Show => Err(anyhow!("{command:?} cannot run as a one-shot command")),
    }
}

async fn cmd_tasks<A: TaskApi>(
    api: Arc<A>,
    renderer: &mut Renderer,
    page: u32,
    search: String,
) -> anyhow::Result<()> {
    let tasks = TaskListController::with_search(api, search);
    if !tasks.mount().await {
        return Err(anyhow!("failed to fetch tasks"));
    }

    if page > 1 {
        match tasks.turn_to(page).await {
            Some(true) => {}
            Some(false) => return Err(anyhow!("failed to fetch tasks page {page}")),
            None => {
                let count = tasks.snapshot().page_count();
                warn!(page, count, "requested page is past the last page");
                renderer.alert(&format!("page {page} is past the last page ({count})"))?;
            }
        }
    }

    renderer.print_task_page(&tasks.snapshot())
}

async fn cmd_save<A: TaskApi>(
    api: Arc<A>,
    renderer: &mut Renderer,
    mut form: TaskForm,
) -> anyhow::Result<()> {
    let tasks = TaskListController::new(api);
    match tasks.save(&mut form).await {
        Ok(task) => {
            renderer.notice("Task saved")?;
            renderer.print_task(&task)?;
            renderer.print_task_page(&tasks.snapshot())
        }
        Err(err) => {
            if let Some(message) = form.error() {
                renderer.alert(message)?;
            }
            Err(err).context("task was not saved")
        }
    }
}

async fn cmd_delete<A: TaskApi>(
    api: Arc<A>,
    renderer: &mut Renderer,
    id: TaskId,
) -> anyhow::Result<()> {
    let tasks = TaskListController::new(api);
    match tasks.delete(&id).await {
        Ok(()) => {
            renderer.notice(&format!("Task {} deleted", display_safe(id.as_str())))?;
            renderer.print_task_page(&tasks.snapshot())
        }
        Err(err) => {
            renderer.alert(&format!("Failed to delete task: {err}"))?;
            Err(err).with_context(|| format!("failed to delete task {id}"))
        }
    }
}

async fn cmd_logs<A: LogApi>(api: Arc<A>, renderer: &mut Renderer, page: u32) -> anyhow::Result<()> {
    let logs = LogListController::new(api);
    if !logs.mount().await {
        return Err(anyhow!("failed to fetch logs"));
    }

    if page > 1 {
        match logs.turn_to(page).await {
            Some(true) => {}
            Some(false) => return Err(anyhow!("failed to fetch logs page {page}")),
            None => {
                let count = logs.snapshot().page_count();
                warn!(page, count, "requested page is past the last page");
                renderer.alert(&format!("page {page} is past the last page ({count})"))?;
            }
        }
    }

    renderer.print_log_page(&logs.snapshot())
}

fn cmd_show(cfg: &Config, settings: &ApiSettings, renderer: &mut Renderer) -> anyhow::Result<()> {
    let sorted: BTreeMap<&String, &String> = cfg.iter().collect();
    for (key, value) in sorted {
        renderer.line(&format!("{key} = {value}"))?;
    }
    for path in &cfg.loaded_files {
        renderer.line(&format!("# loaded {}", path.display()))?;
    }
    renderer.line(&format!(
        "# effective api {} (timeout {}s)",
        settings.base_url,
        settings.timeout.as_secs()
    ))?;
    Ok(())
}
