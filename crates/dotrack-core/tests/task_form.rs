mod support;

use std::sync::Arc;

use dotrack_core::controller::TaskListController;
use dotrack_core::error::{FormError, ValidationError};
use dotrack_core::form::{FormPhase, TaskForm};
use dotrack_shared::TaskDto;
use parking_lot::Mutex;
use support::server::FakeServer;

#[tokio::test]
async fn create_closes_form_and_notifies_once() {
    let server = FakeServer::start().await;
    let api = server.client();
    let saved: Mutex<Vec<TaskDto>> = Mutex::new(Vec::new());

    let mut form = TaskForm::open_create().with_input("Buy milk", "2% low-fat");
    let task = form
        .submit(&api, async |task: TaskDto| saved.lock().push(task))
        .await
        .expect("submit");

    assert_eq!(form.phase(), FormPhase::Closed);
    assert_eq!(form.error(), None);
    let saved = saved.lock();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0], task);
    assert_eq!(server.actions(), vec!["Task Created"]);
}

#[tokio::test]
async fn edit_sends_put_for_existing_task() {
    let server = FakeServer::start().await;
    let seeded = server.seed_task("Draft", "First pass");
    let controller = TaskListController::new(Arc::new(server.client()));
    controller.mount().await;

    let existing = controller.snapshot().tasks[0].clone();
    assert_eq!(existing.id.as_str(), seeded.id);
    let mut form = TaskForm::open_edit(&existing);
    form.description = "Second pass".to_string();

    let task = controller.save(&mut form).await.expect("save");
    assert_eq!(task.id, existing.id);
    assert_eq!(controller.snapshot().tasks[0].description, "Second pass");
    assert_eq!(server.actions(), vec!["Task Updated"]);
    assert_eq!(server.task_queries().len(), 2, "saved callback refreshed the list");
}

#[tokio::test]
async fn failed_save_keeps_form_open_with_input() {
    let server = FakeServer::start().await;
    server.fail_mutations(true);
    let controller = TaskListController::new(Arc::new(server.client()));
    controller.mount().await;

    let mut form = TaskForm::open_create().with_input("Plan trip", "Book hotel");
    let err = controller.save(&mut form).await.expect_err("server down");

    assert!(matches!(err, FormError::Request(_)), "{err}");
    assert_eq!(form.phase(), FormPhase::Open);
    assert_eq!(form.title, "Plan trip");
    assert_eq!(form.description, "Book hotel");
    let message = form.error().expect("error message");
    assert!(message.starts_with("Failed to save task"), "{message}");
    assert!(message.contains("database unavailable"), "{message}");
    assert_eq!(server.task_queries().len(), 1, "no refresh after a failed save");

    server.fail_mutations(false);
    controller.save(&mut form).await.expect("retry");
    assert!(!form.is_open());
    assert_eq!(controller.snapshot().total, 1);
}

#[tokio::test]
async fn blank_fields_are_rejected_before_sending() {
    let server = FakeServer::start().await;
    let api = server.client();

    let called = Mutex::new(false);
    let mut form = TaskForm::open_create().with_input("   ", "description");
    let err = form
        .submit(&api, async |_task: TaskDto| *called.lock() = true)
        .await
        .expect_err("blank title");

    assert!(matches!(err, FormError::Invalid(ValidationError::Required("title"))), "{err}");
    assert_eq!(form.phase(), FormPhase::Open);
    assert_eq!(form.error(), Some("title is required"));
    assert!(!*called.lock());
    assert_eq!(server.task_count(), 0);
}

#[tokio::test]
async fn closed_form_cannot_submit() {
    let server = FakeServer::start().await;
    let api = server.client();

    let mut form = TaskForm::closed().with_input("title", "description");
    let err = form
        .submit(&api, async |_task: TaskDto| {})
        .await
        .expect_err("closed");
    assert!(matches!(err, FormError::Closed));
    assert_eq!(server.task_count(), 0);
}
