mod common;

use common::*;
use std::sync::Arc;
use tokio_test::assert_ok;

use idphoto_batch::history::INTERRUPTED_DETAIL;
use idphoto_batch::{
    BatchError, BatchOrchestrator, FailureKind, HistoryStore, TaskEvent, TaskId, TaskStatus,
};

async fn failed_task(
    history: &TestHistory,
    processor: Arc<ScriptedProcessor>,
    source_ref: &str,
) -> (BatchOrchestrator, TaskId) {
    processor.script(source_ref, Behaviour::Fail("face not found".to_string()));
    let orchestrator = history.orchestrator(processor);
    let report = orchestrator
        .run_batch(inputs(&[source_ref]), None)
        .await
        .unwrap();
    let task_id = report.results[0].task_id.unwrap();
    (orchestrator, task_id)
}

#[tokio::test]
async fn test_retry_failed_task_with_fixed_processor() {
    let history = TestHistory::new();
    let processor = ScriptedProcessor::new();
    let (orchestrator, task_id) = failed_task(&history, processor.clone(), "a.jpg").await;

    processor.script("a.jpg", Behaviour::Succeed);
    let result = assert_ok!(orchestrator.retry(task_id).await);

    assert_eq!(result.status, TaskStatus::Completed);
    assert_eq!(result.task_id, Some(task_id));
    assert!(result.error_detail.is_none());
    assert_eq!(result.outputs, outputs_for("a.jpg"));

    let record = orchestrator.get_task(task_id).unwrap();
    assert_eq!(record.status, TaskStatus::Completed);
    assert!(record.error_detail.is_none());

    // The retry reused the snapshot taken at submission
    let calls = processor.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1], calls[0]);
    assert_eq!(calls[1].1, params_for("a.jpg"));
}

#[tokio::test]
async fn test_retry_that_fails_again_records_new_detail() {
    let history = TestHistory::new();
    let processor = ScriptedProcessor::new();
    let (orchestrator, task_id) = failed_task(&history, processor.clone(), "a.jpg").await;

    processor.script("a.jpg", Behaviour::Fail("still blurred".to_string()));
    let result = orchestrator.retry(task_id).await.unwrap();

    assert_eq!(result.status, TaskStatus::Failed);
    assert_eq!(result.failure_kind, Some(FailureKind::Processing));
    let record = orchestrator.get_task(task_id).unwrap();
    assert_eq!(record.error_detail.as_deref(), Some("still blurred"));
    assert!(record.is_retryable());
}

#[tokio::test]
async fn test_retry_completed_task_is_rejected_and_unchanged() {
    let history = TestHistory::new();
    let processor = ScriptedProcessor::new();
    let orchestrator = history.orchestrator(processor.clone());
    let report = orchestrator
        .run_batch(inputs(&["a.jpg"]), None)
        .await
        .unwrap();
    let task_id = report.results[0].task_id.unwrap();
    let before = orchestrator.get_task(task_id).unwrap();

    let err = orchestrator.retry(task_id).await.unwrap_err();

    assert!(matches!(
        err,
        BatchError::InvalidState {
            current: TaskStatus::Completed,
            ..
        }
    ));
    assert_eq!(orchestrator.get_task(task_id).unwrap(), before);
    assert_eq!(processor.call_count(), 1);
}

#[tokio::test]
async fn test_retry_unknown_task_is_not_found() {
    let history = TestHistory::new();
    let orchestrator = history.orchestrator(ScriptedProcessor::new());

    let err = orchestrator.retry(TaskId::new()).await.unwrap_err();
    assert!(matches!(err, BatchError::TaskNotFound { .. }));
}

#[tokio::test]
async fn test_retry_cancelled_task_is_rejected() {
    let history = TestHistory::new();
    {
        let store = HistoryStore::open(history.path()).unwrap();
        let task_id = store.add_task("a.jpg", params_for("a.jpg")).unwrap();
        store.apply_event(task_id, TaskEvent::Cancel).unwrap();
    }
    let orchestrator = history.orchestrator(ScriptedProcessor::new());
    let task_id = orchestrator.list_tasks()[0].task_id;

    let err = orchestrator.retry(task_id).await.unwrap_err();
    assert!(matches!(
        err,
        BatchError::InvalidState {
            current: TaskStatus::Cancelled,
            ..
        }
    ));
}

#[tokio::test]
async fn test_retry_after_restart_uses_stored_snapshot() {
    let history = TestHistory::new();
    let task_id = {
        let processor = ScriptedProcessor::new();
        let (_orchestrator, task_id) = failed_task(&history, processor, "a.jpg").await;
        task_id
    };

    // A new process with no knowledge of the original input list
    let processor = ScriptedProcessor::new();
    let orchestrator = history.orchestrator(processor.clone());
    let result = orchestrator.retry(task_id).await.unwrap();

    assert!(result.is_success());
    assert_eq!(
        processor.calls(),
        vec![("a.jpg".to_string(), params_for("a.jpg"))]
    );
}

#[tokio::test]
async fn test_interrupted_tasks_become_retryable_on_open() {
    let history = TestHistory::new();
    let task_id = {
        let store = HistoryStore::open(history.path()).unwrap();
        let task_id = store.add_task("a.jpg", params_for("a.jpg")).unwrap();
        store.apply_event(task_id, TaskEvent::Start).unwrap();
        task_id
    };

    let orchestrator = history.orchestrator(ScriptedProcessor::new());
    let record = orchestrator.get_task(task_id).unwrap();
    assert_eq!(record.status, TaskStatus::Failed);
    assert_eq!(record.error_detail.as_deref(), Some(INTERRUPTED_DETAIL));

    let result = orchestrator.retry(task_id).await.unwrap();
    assert!(result.is_success());
}

#[tokio::test]
async fn test_recovery_can_be_disabled() {
    let history = TestHistory::new();
    let task_id = {
        let store = HistoryStore::open(history.path()).unwrap();
        store.add_task("a.jpg", params_for("a.jpg")).unwrap()
    };

    let orchestrator = history.orchestrator_with(ScriptedProcessor::new(), |config| {
        config.recover_interrupted_on_open = false;
    });
    assert_eq!(
        orchestrator.get_task(task_id).unwrap().status,
        TaskStatus::Waiting
    );
}
