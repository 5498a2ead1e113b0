//! Integration tests for title generation inside the pipeline

use crate::integration::test_utils::{
    drain_events, harness, harness_with, local_profile, MockAdapter, Reply,
};
use promptline::error::{ApiError, ProviderError};
use promptline::events::Notification;
use promptline::queue::JobSpec;
use promptline::store::{ResponseStatus, TitleStatus};
use promptline::title::{TitleGenerationConfig, TitleOutcome, FALLBACK_MODEL};
use std::sync::Arc;

const BODY: &str = "Recursion solves a problem by reducing it to smaller copies of itself until a base case is reached.";

#[tokio::test]
async fn test_backend_failure_falls_back_to_first_words() {
    let h = harness(
        MockAdapter::new("local", "m1")
            .with_job_reply(Reply::Text(BODY.to_string()))
            .with_title_reply(Reply::Fail(ProviderError::unknown("boom"))),
    );
    h.scheduler.submit(JobSpec::new("p1", "Explain recursion"));
    h.scheduler.wait_for_idle().await;

    let row = &h.scheduler.list_responses("p1").unwrap()[0];
    assert_eq!(row.status, ResponseStatus::Completed);
    assert_eq!(
        row.generated_title.as_deref(),
        Some("Recursion solves a problem by reducing it...")
    );
    assert_eq!(row.title_generation_status, Some(TitleStatus::Completed));
    assert_eq!(row.title_model.as_deref(), Some(FALLBACK_MODEL));
}

#[tokio::test(start_paused = true)]
async fn test_title_timeout_falls_back() {
    let titles = TitleGenerationConfig {
        timeout_secs: 5,
        ..TitleGenerationConfig::default()
    };
    let h = harness_with(
        MockAdapter::new("local", "m1")
            .with_job_reply(Reply::Text("Short answer".to_string()))
            .with_title_reply(Reply::Hang),
        local_profile("m1"),
        titles,
    );
    h.scheduler.submit(JobSpec::new("p1", "Explain recursion"));
    h.scheduler.wait_for_idle().await;

    let row = &h.scheduler.list_responses("p1").unwrap()[0];
    assert_eq!(row.generated_title.as_deref(), Some("Short answer"));
    assert_eq!(row.title_model.as_deref(), Some(FALLBACK_MODEL));
}

#[tokio::test]
async fn test_disabled_titles_leave_row_untitled() {
    let h = harness(MockAdapter::new("local", "m1"));
    h.scheduler
        .set_title_config(TitleGenerationConfig {
            enabled: false,
            ..TitleGenerationConfig::default()
        })
        .unwrap();
    let mut events = h.scheduler.subscribe();

    h.scheduler.submit(JobSpec::new("p1", "Explain recursion"));
    h.scheduler.wait_for_idle().await;

    let row = &h.scheduler.list_responses("p1").unwrap()[0];
    assert_eq!(row.status, ResponseStatus::Completed);
    assert!(row.generated_title.is_none());
    assert!(row.title_generation_status.is_none());
    assert!(!drain_events(&mut events)
        .iter()
        .any(|e| matches!(e, Notification::TitleStatusChanged { .. })));
    assert!(!h.adapter.log().contains(&"title".to_string()));
}

#[tokio::test]
async fn test_invalid_title_config_is_rejected() {
    let h = harness(MockAdapter::new("local", "m1"));
    let err = h
        .scheduler
        .set_title_config(TitleGenerationConfig {
            timeout_secs: 1,
            ..TitleGenerationConfig::default()
        })
        .unwrap_err();
    assert!(matches!(err, ApiError::ConfigError(_)));
    assert_eq!(h.scheduler.title_config().timeout_secs, 30);
}

#[tokio::test]
async fn test_selected_title_provider_is_used() {
    let h = harness(MockAdapter::new("local", "m1"));
    let titler = Arc::new(
        MockAdapter::new("titler", "tiny").with_title_reply(Reply::Text("From The Titler".to_string())),
    );
    h.scheduler.providers().write().insert_adapter(
        "titler".to_string(),
        local_profile("tiny"),
        titler.clone(),
    );
    h.scheduler
        .set_title_config(TitleGenerationConfig {
            selected_provider: Some("titler".to_string()),
            ..TitleGenerationConfig::default()
        })
        .unwrap();

    h.scheduler.submit(JobSpec::new("p1", "Explain recursion"));
    h.scheduler.wait_for_idle().await;

    let row = &h.scheduler.list_responses("p1").unwrap()[0];
    assert_eq!(row.generated_title.as_deref(), Some("From The Titler"));
    assert_eq!(row.title_model.as_deref(), Some("tiny"));
    assert_eq!(titler.log(), vec!["title"]);
    assert!(!h.adapter.log().contains(&"title".to_string()));
}

#[tokio::test]
async fn test_title_events_go_pending_then_completed() {
    let h = harness(MockAdapter::new("local", "m1"));
    let mut events = h.scheduler.subscribe();
    h.scheduler.submit(JobSpec::new("p1", "Explain recursion"));
    h.scheduler.wait_for_idle().await;

    let statuses: Vec<TitleStatus> = drain_events(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            Notification::TitleStatusChanged { status, .. } => Some(status),
            _ => None,
        })
        .collect();
    assert_eq!(statuses, vec![TitleStatus::Pending, TitleStatus::Completed]);
}

#[tokio::test]
async fn test_regenerate_title_for_completed_response() {
    let h = harness(MockAdapter::new("local", "m1"));
    h.scheduler.submit(JobSpec::new("p1", "Explain recursion"));
    h.scheduler.wait_for_idle().await;
    let id = h.scheduler.list_responses("p1").unwrap()[0].id;

    let outcome = h.scheduler.regenerate_title(&id).await.unwrap();
    assert_eq!(
        outcome,
        TitleOutcome::Generated {
            title: "Recursion In Short".to_string(),
            model: "m1".to_string(),
            fallback: false,
        }
    );
    assert_eq!(h.adapter.log().iter().filter(|e| *e == "title").count(), 2);
}

#[tokio::test]
async fn test_regenerate_title_rejects_failed_response() {
    let h = harness(
        MockAdapter::new("local", "m1")
            .with_job_reply(Reply::Fail(ProviderError::unauthorized("bad key"))),
    );
    h.scheduler.submit(JobSpec::new("p1", "Explain recursion"));
    h.scheduler.wait_for_idle().await;
    let id = h.scheduler.list_responses("p1").unwrap()[0].id;

    let err = h.scheduler.regenerate_title(&id).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidRequest(_)));
}

#[tokio::test(start_paused = true)]
async fn test_title_storage_failure_does_not_block_next_job() {
    let titles = TitleGenerationConfig {
        timeout_secs: 5,
        ..TitleGenerationConfig::default()
    };
    let h = harness_with(
        MockAdapter::new("local", "m1").with_title_reply(Reply::Hang),
        local_profile("m1"),
        titles,
    );
    let mut events = h.scheduler.subscribe();

    let first = h.scheduler.submit(JobSpec::new("p1", "first")).job_id().unwrap();
    h.scheduler.submit(JobSpec::new("p1", "second"));

    // Remove the first response's file while its title request is outstanding.
    let first_response = loop {
        let envelope = events.recv().await.unwrap();
        if let Notification::JobCompleted { job_id, response_id: Some(id), .. } = envelope.event {
            if job_id == first {
                let row = h.scheduler.store().get_metadata(&id).unwrap().unwrap();
                std::fs::remove_file(&row.file_path).unwrap();
                break id;
            }
        }
    };
    h.scheduler.wait_for_idle().await;

    assert!(drain_events(&mut events).iter().any(|e| matches!(
        e,
        Notification::TitleStatusChanged { response_id, status: TitleStatus::Failed, error: Some(_), .. }
            if *response_id == first_response
    )));
    assert_eq!(
        h.adapter.log().iter().filter(|e| e.starts_with("job:")).count(),
        2
    );
    let rows = h.scheduler.list_responses("p1").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title_model.as_deref(), Some(FALLBACK_MODEL));
}

#[tokio::test(start_paused = true)]
async fn test_corrupt_content_file_marks_title_failed_on_row() {
    let titles = TitleGenerationConfig {
        timeout_secs: 5,
        ..TitleGenerationConfig::default()
    };
    let h = harness_with(
        MockAdapter::new("local", "m1").with_title_reply(Reply::Hang),
        local_profile("m1"),
        titles,
    );
    let mut events = h.scheduler.subscribe();
    h.scheduler.submit(JobSpec::new("p1", "Explain recursion"));

    let response_id = loop {
        let envelope = events.recv().await.unwrap();
        if let Notification::TitleStatusChanged { response_id, status: TitleStatus::Pending, .. } = envelope.event {
            let row = h.scheduler.store().get_metadata(&response_id).unwrap().unwrap();
            std::fs::write(&row.file_path, "garbage").unwrap();
            break response_id;
        }
    };
    h.scheduler.wait_for_idle().await;

    let row = h.scheduler.store().get_metadata(&response_id).unwrap().unwrap();
    assert_eq!(row.title_generation_status, Some(TitleStatus::Failed));
    assert!(row.generated_title.is_none());
    assert!(drain_events(&mut events).iter().any(|e| matches!(
        e,
        Notification::TitleStatusChanged { status: TitleStatus::Failed, .. }
    )));
}
