//! Integration tests for the job pipeline
//!
//! Tests cover:
//! - End-to-end submit, persist, and title
//! - Ordering between consecutive jobs
//! - Single-flight processing
//! - Cancellation of queued and in-flight jobs
//! - Provider failures and timeouts

use crate::integration::test_utils::{
    drain_events, harness, harness_with, local_profile, wait_for_call, wait_for_start, MockAdapter,
    Reply,
};
use promptline::error::ProviderError;
use promptline::events::Notification;
use promptline::queue::{JobSpec, JobStatus};
use promptline::scheduler::SubmitOutcome;
use promptline::store::{ResponseStatus, TitleStatus};
use promptline::title::TitleGenerationConfig;
use std::time::Duration;

#[tokio::test]
async fn test_end_to_end_completed_response_with_title() {
    let h = harness(MockAdapter::new("local", "m1"));
    let spec = JobSpec::new("p1", "Explain recursion")
        .with_provider("local")
        .with_model("m1");

    let outcome = h.scheduler.submit(spec);
    assert!(matches!(outcome, SubmitOutcome::Accepted { .. }));
    h.scheduler.wait_for_idle().await;

    let rows = h.scheduler.list_responses("p1").unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.status, ResponseStatus::Completed);
    assert!(row.file_path.exists());
    assert_eq!(row.token_usage.map(|u| u.total), Some(25));
    assert_eq!(row.model, "m1");
    assert_eq!(row.generated_title.as_deref(), Some("Recursion In Short"));
    assert_eq!(row.title_generation_status, Some(TitleStatus::Completed));
    assert_eq!(row.title_model.as_deref(), Some("m1"));

    let response = h.scheduler.get_response(&row.id).unwrap();
    assert_eq!(response.prompt, "Explain recursion");
    assert_eq!(response.content, "Recursion is a function calling itself.");
    assert_eq!(h.scheduler.queue_status().queue_size, 0);
    assert!(h.scheduler.queue_status().current_job.is_none());
}

#[tokio::test]
async fn test_job_defaults_to_active_provider_and_profile_model() {
    let h = harness(MockAdapter::new("local", "m1"));
    h.scheduler.submit(JobSpec::new("p1", "Explain recursion"));
    h.scheduler.wait_for_idle().await;

    let rows = h.scheduler.list_responses("p1").unwrap();
    assert_eq!(rows[0].provider, "local");
    assert_eq!(rows[0].model, "m1");
}

#[tokio::test]
async fn test_title_of_first_job_finishes_before_second_job_starts() {
    let h = harness(MockAdapter::new("local", "m1").with_job_delay(Duration::from_millis(30)));

    h.scheduler.submit(JobSpec::new("p1", "A"));
    h.scheduler.submit(JobSpec::new("p1", "B"));
    h.scheduler.wait_for_idle().await;

    assert_eq!(
        h.adapter.log(),
        vec!["job:A", "title", "job:B", "title"]
    );
    assert_eq!(h.scheduler.list_responses("p1").unwrap().len(), 2);
}

#[tokio::test]
async fn test_at_most_one_job_in_flight() {
    let h = harness(MockAdapter::new("local", "m1").with_job_delay(Duration::from_millis(10)));
    for i in 0..5 {
        let outcome = h.scheduler.submit(JobSpec::new("p1", format!("prompt {}", i)));
        assert!(outcome.job_id().is_some());
    }
    h.scheduler.wait_for_idle().await;

    assert_eq!(h.adapter.max_in_flight(), 1);
    let jobs: Vec<String> = h
        .adapter
        .log()
        .into_iter()
        .filter(|entry| entry.starts_with("job:"))
        .collect();
    assert_eq!(
        jobs,
        (0..5).map(|i| format!("job:prompt {}", i)).collect::<Vec<_>>()
    );
    assert_eq!(h.scheduler.list_responses("p1").unwrap().len(), 5);
}

#[tokio::test]
async fn test_cancel_in_flight_job_persists_cancelled_row_without_title() {
    let h = harness(MockAdapter::new("local", "m1").with_job_reply(Reply::Hang));
    let mut events = h.scheduler.subscribe();

    let job_id = h.scheduler.submit(JobSpec::new("p1", "slow")).job_id().unwrap();
    wait_for_start(&mut events, job_id).await;
    assert_eq!(h.scheduler.queue_status().current_job.map(|j| j.id), Some(job_id));

    assert!(h.scheduler.cancel(job_id));
    h.scheduler.wait_for_idle().await;

    let rows = h.scheduler.list_responses("p1").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, ResponseStatus::Cancelled);
    assert_eq!(rows[0].error_code.as_deref(), Some("cancelled"));
    assert!(rows[0].title_generation_status.is_none());

    let completed = drain_events(&mut events).into_iter().find_map(|event| match event {
        Notification::JobCompleted { job_id: id, status, .. } if id == job_id => Some(status),
        _ => None,
    });
    assert_eq!(completed, Some(JobStatus::Cancelled));
}

#[tokio::test]
async fn test_cancel_in_flight_job_starts_next_queued_job() {
    let h = harness(MockAdapter::new("local", "m1").with_job_reply(Reply::Hang));
    let mut events = h.scheduler.subscribe();

    let first = h.scheduler.submit(JobSpec::new("p1", "A")).job_id().unwrap();
    let second = h.scheduler.submit(JobSpec::new("p1", "B")).job_id().unwrap();
    wait_for_start(&mut events, first).await;
    wait_for_call(&h.adapter, "job:A").await;

    assert!(h.scheduler.cancel(first));
    wait_for_start(&mut events, second).await;
    wait_for_call(&h.adapter, "job:B").await;
    assert_eq!(h.scheduler.queue_status().current_job.map(|j| j.id), Some(second));

    assert!(h.scheduler.cancel(second));
    h.scheduler.wait_for_idle().await;

    assert_eq!(h.adapter.log(), vec!["job:A", "job:B"]);
    let rows = h.scheduler.list_responses("p1").unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.status == ResponseStatus::Cancelled));
}

#[tokio::test]
async fn test_cancel_queued_job_drops_it_without_row() {
    let h = harness(MockAdapter::new("local", "m1").with_job_reply(Reply::Hang));
    let mut events = h.scheduler.subscribe();

    let first = h.scheduler.submit(JobSpec::new("p1", "first")).job_id().unwrap();
    let second = h.scheduler.submit(JobSpec::new("p2", "second")).job_id().unwrap();
    wait_for_start(&mut events, first).await;
    assert_eq!(h.scheduler.queue_status().queue_size, 1);

    assert!(h.scheduler.cancel(second));
    assert_eq!(h.scheduler.queue_status().queue_size, 0);
    assert!(!h.scheduler.cancel(second));

    assert!(h.scheduler.cancel(first));
    h.scheduler.wait_for_idle().await;

    assert!(h.scheduler.list_responses("p2").unwrap().is_empty());
    assert_eq!(h.scheduler.list_responses("p1").unwrap().len(), 1);
    assert!(!h.adapter.log().contains(&"job:second".to_string()));
}

#[tokio::test]
async fn test_cancel_unknown_job_returns_false() {
    let h = harness(MockAdapter::new("local", "m1"));
    assert!(!h.scheduler.cancel(promptline::JobId::new()));
}

#[tokio::test]
async fn test_cancel_all_clears_queue_and_in_flight_job() {
    let h = harness(MockAdapter::new("local", "m1").with_job_reply(Reply::Hang));
    let mut events = h.scheduler.subscribe();

    let first = h.scheduler.submit(JobSpec::new("p1", "one")).job_id().unwrap();
    h.scheduler.submit(JobSpec::new("p1", "two"));
    h.scheduler.submit(JobSpec::new("p1", "three"));
    wait_for_start(&mut events, first).await;
    wait_for_call(&h.adapter, "job:one").await;

    assert_eq!(h.scheduler.cancel_all(), 3);
    h.scheduler.wait_for_idle().await;

    let rows = h.scheduler.list_responses("p1").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, ResponseStatus::Cancelled);
    assert_eq!(h.adapter.log(), vec!["job:one"]);
}

#[tokio::test]
async fn test_provider_failure_persists_failed_row_and_continues() {
    let h = harness(
        MockAdapter::new("local", "m1")
            .with_job_reply(Reply::Fail(ProviderError::rate_limited("slow down"))),
    );
    h.scheduler.submit(JobSpec::new("p1", "first"));
    h.scheduler.submit(JobSpec::new("p1", "second"));
    h.scheduler.wait_for_idle().await;

    let rows = h.scheduler.list_responses("p1").unwrap();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row.status, ResponseStatus::Failed);
        assert_eq!(row.error_code.as_deref(), Some("rate_limited"));
        assert_eq!(row.error_message.as_deref(), Some("slow down"));
        assert!(row.generated_title.is_none());
    }
    assert!(!h.adapter.log().contains(&"title".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_provider_timeout_is_failed_not_cancelled() {
    let mut profile = local_profile("m1");
    profile.timeout_secs = 2;
    let h = harness_with(
        MockAdapter::new("local", "m1").with_job_reply(Reply::Hang),
        profile,
        TitleGenerationConfig::default(),
    );

    h.scheduler.submit(JobSpec::new("p1", "never answers"));
    h.scheduler.wait_for_idle().await;

    let rows = h.scheduler.list_responses("p1").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, ResponseStatus::Failed);
    assert_eq!(rows[0].error_code.as_deref(), Some("timeout"));
}

#[tokio::test]
async fn test_rejected_submissions_do_not_enqueue() {
    let h = harness(MockAdapter::new("local", "m1"));

    let empty = h.scheduler.submit(JobSpec::new("p1", "   "));
    assert!(matches!(empty, SubmitOutcome::Rejected { .. }));

    let unknown = h.scheduler.submit(JobSpec::new("p1", "hi").with_provider("ghost"));
    assert!(matches!(unknown, SubmitOutcome::Rejected { .. }));

    let mut profile = local_profile("m1");
    profile.context_limit = Some(4);
    h.scheduler
        .providers()
        .write()
        .insert_profile("tiny".to_string(), profile);
    let too_long = h
        .scheduler
        .submit(JobSpec::new("p1", "this prompt is far longer than sixteen characters").with_provider("tiny"));
    match too_long {
        SubmitOutcome::Rejected { reason } => assert!(reason.contains("too long")),
        other => panic!("expected rejection, got {:?}", other),
    }

    assert_eq!(h.scheduler.queue_status().queue_size, 0);
    h.scheduler.wait_for_idle().await;
    assert!(h.adapter.log().is_empty());
}

#[tokio::test]
async fn test_queue_size_notifications() {
    let h = harness(MockAdapter::new("local", "m1"));
    let mut events = h.scheduler.subscribe();

    let job_id = h.scheduler.submit(JobSpec::new("p1", "hello")).job_id().unwrap();
    h.scheduler.wait_for_idle().await;

    let events = drain_events(&mut events);
    assert!(matches!(
        events.first(),
        Some(Notification::QueueSizeChanged { queue_size: 1, added: Some(id), .. }) if *id == job_id
    ));
    assert!(events.iter().any(|e| matches!(
        e,
        Notification::QueueSizeChanged { queue_size: 0, removed: Some(id), .. } if *id == job_id
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        Notification::TitleStatusChanged { status: TitleStatus::Completed, .. }
    )));
}
