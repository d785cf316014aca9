mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::{count, setup_db};
use pgjobs::{JobStatus, JobsError, JobsRepo, NewJob};
use serde_json::json;
use serial_test::serial;
use std::time::Duration;
use uuid::Uuid;

#[tokio::test]
#[serial]
async fn ack_moves_the_job_to_history_with_its_result() {
    let pool = setup_db().await;
    let repo = JobsRepo::new(pool.clone());

    let published = repo.publish(NewJob::new("atask")).await.unwrap();
    let [claimed] = repo.consume(1).await.unwrap().try_into().unwrap();

    let finished = repo
        .ack(claimed.job_id, Some(json!({ "ok": true })))
        .await
        .unwrap();

    assert_eq!(finished.job_id, published.job_id);
    assert_eq!(finished.status, JobStatus::Success.as_str());
    assert_eq!(finished.result, Some(json!({ "ok": true })));
    assert!(finished.leased_until.is_none());

    assert_eq!(count(&pool, "jobs.job_queue").await, 0);
    assert_eq!(count(&pool, "jobs.queue").await, 0);
    assert_eq!(count(&pool, r#"jobs."all""#).await, 1);

    let fetched = repo.get(published.job_id).await.unwrap().unwrap();
    assert_eq!(fetched.status, "success");
}

#[tokio::test]
#[serial]
async fn double_ack_fails() {
    let pool = setup_db().await;
    let repo = JobsRepo::new(pool.clone());

    repo.publish(NewJob::new("atask")).await.unwrap();
    let [claimed] = repo.consume(1).await.unwrap().try_into().unwrap();

    repo.ack(claimed.job_id, None).await.unwrap();

    let err = repo.ack(claimed.job_id, None).await.unwrap_err();
    assert!(
        matches!(err, JobsError::InvalidAck(id) if id == claimed.job_id),
        "unexpected error: {err}"
    );
}

#[tokio::test]
#[serial]
async fn nack_after_terminal_ack_fails() {
    let pool = setup_db().await;
    let repo = JobsRepo::new(pool.clone());

    repo.publish(NewJob::new("atask")).await.unwrap();
    let [claimed] = repo.consume(1).await.unwrap().try_into().unwrap();

    repo.ack(claimed.job_id, None).await.unwrap();

    let err = repo.nack(claimed.job_id, None, None).await.unwrap_err();
    assert!(matches!(err, JobsError::InvalidAck(_)));
}

#[tokio::test]
#[serial]
async fn ack_of_a_queued_job_fails() {
    let pool = setup_db().await;
    let repo = JobsRepo::new(pool.clone());

    let published = repo.publish(NewJob::new("atask")).await.unwrap();

    // never consumed, so there is no lease to finalize
    let err = repo.ack(published.job_id, None).await.unwrap_err();
    assert!(matches!(err, JobsError::InvalidAck(_)));
}

#[tokio::test]
#[serial]
async fn ack_of_an_unknown_job_is_not_found() {
    let pool = setup_db().await;
    let repo = JobsRepo::new(pool.clone());

    let ghost = Uuid::new_v4();
    let err = repo.ack(ghost, None).await.unwrap_err();
    assert!(matches!(err, JobsError::NotFound(id) if id == ghost));

    let err = repo.nack(ghost, None, None).await.unwrap_err();
    assert!(matches!(err, JobsError::NotFound(_)));
}

#[tokio::test]
#[serial]
async fn nack_requeues_with_the_callers_backoff() {
    let pool = setup_db().await;
    let repo = JobsRepo::new(pool.clone());

    let published = repo
        .publish(NewJob {
            max_retries: Some(2),
            ..NewJob::new("flaky")
        })
        .await
        .unwrap();

    let [claimed] = repo.consume(1).await.unwrap().try_into().unwrap();
    let backoff = Utc::now() + ChronoDuration::milliseconds(500);
    repo.nack(claimed.job_id, Some("boom"), Some(backoff))
        .await
        .unwrap();

    // still backing off
    let early = repo.consume(1).await.unwrap();
    assert!(early.is_empty(), "backoff must gate eligibility");

    tokio::time::sleep(Duration::from_millis(600)).await;

    let [retried] = repo.consume(1).await.unwrap().try_into().unwrap();
    assert_eq!(retried.job_id, published.job_id);
    assert_eq!(retried.retries, 1);
    assert_eq!(retried.last_error.as_deref(), Some("boom"));

    // second nack exhausts the budget of 2
    repo.nack(retried.job_id, Some("boom again"), None)
        .await
        .unwrap();

    let failed_count: i64 =
        sqlx::query_scalar("SELECT count(*) FROM jobs.job WHERE status = 'failed'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(failed_count, 1, "job must be terminally failed");

    let failed = repo.get(published.job_id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed.as_str());
    assert_eq!(failed.retries, 2);
    assert_eq!(failed.last_error.as_deref(), Some("boom again"));

    // terminal rows admit no further finalization
    let err = repo.nack(published.job_id, None, None).await.unwrap_err();
    assert!(matches!(err, JobsError::InvalidAck(_)));
}

#[tokio::test]
#[serial]
async fn nack_without_scheduled_at_requeues_immediately() {
    let pool = setup_db().await;
    let repo = JobsRepo::new(pool.clone());

    let published = repo.publish(NewJob::new("flaky")).await.unwrap();
    let [claimed] = repo.consume(1).await.unwrap().try_into().unwrap();

    repo.nack(claimed.job_id, Some("boom"), None).await.unwrap();

    let [again] = repo.consume(1).await.unwrap().try_into().unwrap();
    assert_eq!(again.job_id, published.job_id);
    assert_eq!(again.retries, 1);
}
