mod common;

use common::{count, setup_db};
use pgjobs::{JobStatus, JobsError, JobsRepo, NewJob};
use serde_json::json;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn publish_returns_the_queued_row_with_defaults() {
    let pool = setup_db().await;
    let repo = JobsRepo::new(pool.clone());

    let job = repo.publish(NewJob::new("atask")).await.unwrap();

    assert_eq!(job.task, "atask");
    assert_eq!(job.status, JobStatus::Queued.as_str());
    assert_eq!(job.retries, 0);
    assert_eq!(job.timeout, 60.0);
    assert_eq!(job.priority, 0);
    assert_eq!(job.max_retries, 3);
    assert!(job.leased_until.is_none());
    assert!(job.result.is_none());

    assert_eq!(count(&pool, "jobs.job_queue").await, 1);
}

#[tokio::test]
#[serial]
async fn publish_keeps_the_payload_opaque() {
    let pool = setup_db().await;
    let repo = JobsRepo::new(pool.clone());

    let body = json!({ "args": [1, 2], "kwargs": { "retrying": true } });
    let job = repo
        .publish(NewJob {
            body: body.clone(),
            ..NewJob::new("emails.welcome.send")
        })
        .await
        .unwrap();

    assert_eq!(job.body, body);

    let fetched = repo.get(job.job_id).await.unwrap().expect("job visible");
    assert_eq!(fetched.body, body);
}

#[tokio::test]
#[serial]
async fn publish_with_empty_task_is_rejected() {
    let pool = setup_db().await;
    let repo = JobsRepo::new(pool.clone());

    let err = repo.publish(NewJob::new("")).await.unwrap_err();
    assert!(
        matches!(err, JobsError::ConstraintViolation(_)),
        "unexpected error: {err}"
    );
    assert_eq!(count(&pool, "jobs.queue").await, 0);
}

#[tokio::test]
#[serial]
async fn publish_with_negative_retry_budget_is_rejected() {
    let pool = setup_db().await;
    let repo = JobsRepo::new(pool.clone());

    let err = repo
        .publish(NewJob {
            max_retries: Some(-1),
            ..NewJob::new("atask")
        })
        .await
        .unwrap_err();

    assert!(matches!(err, JobsError::ConstraintViolation(_)));
}

#[tokio::test]
#[serial]
async fn publish_bulk_commits_all_rows_in_input_order() {
    let pool = setup_db().await;
    let repo = JobsRepo::new(pool.clone());

    let jobs: Vec<NewJob> = (0..10)
        .map(|i| NewJob {
            body: json!({ "args": [i, i] }),
            ..NewJob::new(format!("bulk.task.{i}"))
        })
        .collect();

    let rows = repo.publish_bulk(jobs).await.unwrap();

    assert_eq!(rows.len(), 10);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row.task, format!("bulk.task.{i}"), "input order preserved");
        assert_eq!(row.body, json!({ "args": [i, i] }));
    }

    assert_eq!(count(&pool, "jobs.job_queue").await, 10);
}

#[tokio::test]
#[serial]
async fn publish_bulk_of_nothing_is_a_no_op() {
    let pool = setup_db().await;
    let repo = JobsRepo::new(pool.clone());

    let rows = repo.publish_bulk(Vec::new()).await.unwrap();
    assert!(rows.is_empty());
    assert_eq!(count(&pool, "jobs.queue").await, 0);
}

#[tokio::test]
#[serial]
async fn get_returns_none_for_unknown_jobs() {
    let pool = setup_db().await;
    let repo = JobsRepo::new(pool.clone());

    let missing = repo.get(uuid::Uuid::new_v4()).await.unwrap();
    assert!(missing.is_none());
}
