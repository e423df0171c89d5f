use dotrack_shared::{FIELD_MAX_CHARS, TaskDto, TaskId};
use tracing::{debug, error, info, instrument};

use crate::api::TaskApi;
use crate::error::FormError;
use crate::sanitize::prepare_input;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit(TaskId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormPhase {
    Closed,
    Open,
    Submitting,
}

/// Create/edit form for a single task.
///
/// `closed -> open -> submitting -> closed` on success, or back to `open`
/// with the typed input intact when the save fails.
#[derive(Debug, Clone)]
pub struct TaskForm {
    mode: FormMode,
    phase: FormPhase,
    pub title: String,
    pub description: String,
    error: Option<String>,
}

impl TaskForm {
    pub fn closed() -> Self {
        Self {
            mode: FormMode::Create,
            phase: FormPhase::Closed,
            title: String::new(),
            description: String::new(),
            error: None,
        }
    }

    /// Opens the form, prefilled from `task` when editing.
    pub fn open(task: Option<&TaskDto>) -> Self {
        match task {
            Some(task) => Self {
                mode: FormMode::Edit(task.id.clone()),
                phase: FormPhase::Open,
                title: task.title.clone(),
                description: task.description.clone(),
                error: None,
            },
            None => Self {
                phase: FormPhase::Open,
                ..Self::closed()
            },
        }
    }

    pub fn open_create() -> Self {
        Self::open(None)
    }

    pub fn open_edit(task: &TaskDto) -> Self {
        Self::open(Some(task))
    }

    /// Edit form for a task known only by id; both fields start empty.
    pub fn open_edit_id(id: TaskId) -> Self {
        Self {
            mode: FormMode::Edit(id),
            phase: FormPhase::Open,
            ..Self::closed()
        }
    }

    pub fn with_input(mut self, title: impl Into<String>, description: impl Into<String>) -> Self {
        self.title = title.into();
        self.description = description.into();
        self
    }

    pub fn close(&mut self) {
        self.phase = FormPhase::Closed;
        self.error = None;
    }

    pub fn mode(&self) -> &FormMode {
        &self.mode
    }

    pub fn phase(&self) -> FormPhase {
        self.phase
    }

    pub fn is_open(&self) -> bool {
        self.phase != FormPhase::Closed
    }

    pub fn is_submitting(&self) -> bool {
        self.phase == FormPhase::Submitting
    }

    /// Message from the last failed submit, cleared on the next attempt.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// `used/100` counter for the description field.
    pub fn description_counter(&self) -> String {
        format!("{}/{}", self.description.chars().count(), FIELD_MAX_CHARS)
    }

    /// Sanitizes and sends the form: `POST` when creating, `PUT` when
    /// editing. On success the form closes and `on_saved` runs with the
    /// server's copy of the task before this returns.
    #[instrument(skip_all, fields(mode = ?self.mode))]
    pub async fn submit<A, F>(&mut self, api: &A, on_saved: F) -> Result<TaskDto, FormError>
    where
        A: TaskApi,
        F: AsyncFnOnce(TaskDto),
    {
        match self.phase {
            FormPhase::Closed => return Err(FormError::Closed),
            FormPhase::Submitting => return Err(FormError::Busy),
            FormPhase::Open => {}
        }

        let input = match prepare_input(&self.title, &self.description) {
            Ok(input) => input,
            Err(err) => {
                debug!(error = %err, "form rejected before submit");
                self.error = Some(err.to_string());
                return Err(FormError::Invalid(err));
            }
        };

        self.phase = FormPhase::Submitting;
        self.error = None;

        let result = match &self.mode {
            FormMode::Create => api.create_task(&input).await,
            FormMode::Edit(id) => api.update_task(id, &input).await,
        };

        match result {
            Ok(task) => {
                info!(id = %task.id, "task saved");
                self.phase = FormPhase::Closed;
                on_saved(task.clone()).await;
                Ok(task)
            }
            Err(err) => {
                error!(error = %err, "error saving task");
                self.phase = FormPhase::Open;
                self.error = Some(format!("Failed to save task: {err}"));
                Err(FormError::Request(err))
            }
        }
    }
}

impl Default for TaskForm {
    fn default() -> Self {
        Self::closed()
    }
}
