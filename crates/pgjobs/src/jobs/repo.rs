use crate::error::{JobsError, Result};
use crate::jobs::model::{Job, NewJob, QueueStats};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

/// The queue engine. Every mutation of `jobs.queue` / `jobs.job` goes through
/// these operations; clients never write the rows directly.
#[derive(Clone)]
pub struct JobsRepo {
    pool: PgPool,
}

impl JobsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ----------------------------
    // Publish
    // ----------------------------

    /// Insert one job and return the full queued row.
    ///
    /// Empty task names and negative retry budgets bounce off the schema
    /// constraints and surface as `ConstraintViolation`.
    pub async fn publish(&self, job: NewJob) -> Result<Job> {
        let row = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs.queue (task, body, scheduled_at, timeout, priority, max_retries)
            VALUES ($1, $2, $3,
                    COALESCE($4::float8, 60),
                    COALESCE($5::int4, 0),
                    COALESCE($6::int4, 3))
            RETURNING job_id, task, body, created_at, scheduled_at, timeout,
                      priority, max_retries, retries, status, last_error,
                      NULL::jsonb AS result, leased_until
            "#,
        )
        .bind(&job.task)
        .bind(&job.body)
        .bind(job.scheduled_at)
        .bind(job.timeout)
        .bind(job.priority)
        .bind(job.max_retries)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Insert many jobs in a single statement; all rows commit or none do.
    /// Returned rows preserve input order.
    pub async fn publish_bulk(&self, jobs: Vec<NewJob>) -> Result<Vec<Job>> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        let mut tasks: Vec<String> = Vec::with_capacity(jobs.len());
        let mut bodies: Vec<Value> = Vec::with_capacity(jobs.len());
        let mut scheduled: Vec<Option<DateTime<Utc>>> = Vec::with_capacity(jobs.len());
        let mut timeouts: Vec<Option<f64>> = Vec::with_capacity(jobs.len());
        let mut priorities: Vec<Option<i32>> = Vec::with_capacity(jobs.len());
        let mut max_retries: Vec<Option<i32>> = Vec::with_capacity(jobs.len());

        for job in jobs {
            tasks.push(job.task);
            bodies.push(job.body);
            scheduled.push(job.scheduled_at);
            timeouts.push(job.timeout);
            priorities.push(job.priority);
            max_retries.push(job.max_retries);
        }

        let rows = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs.queue (task, body, scheduled_at, timeout, priority, max_retries)
            SELECT t.task, t.body, t.scheduled_at,
                   COALESCE(t.timeout, 60),
                   COALESCE(t.priority, 0),
                   COALESCE(t.max_retries, 3)
            FROM unnest($1::text[], $2::jsonb[], $3::timestamptz[],
                        $4::float8[], $5::int4[], $6::int4[])
                 WITH ORDINALITY
                 AS t(task, body, scheduled_at, timeout, priority, max_retries, ord)
            ORDER BY t.ord
            RETURNING job_id, task, body, created_at, scheduled_at, timeout,
                      priority, max_retries, retries, status, last_error,
                      NULL::jsonb AS result, leased_until
            "#,
        )
        .bind(&tasks)
        .bind(&bodies)
        .bind(&scheduled)
        .bind(&timeouts)
        .bind(&priorities)
        .bind(&max_retries)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // ----------------------------
    // Consume
    // ----------------------------

    /// Lease up to `n` eligible jobs for this caller.
    pub async fn consume(&self, n: i64) -> Result<Vec<Job>> {
        self.claim(n, None).await
    }

    /// Lease up to `n` eligible jobs whose task matches an SQL LIKE pattern.
    pub async fn consume_topic(&self, topic: &str, n: i64) -> Result<Vec<Job>> {
        self.claim(n, Some(topic)).await
    }

    /// Atomic claim under contention.
    ///
    /// Eligible rows are `queued`, or `running` with an elapsed lease
    /// (lazy timeout reclamation; `retries` is untouched because a timeout is
    /// not a failure). Candidates are locked FOR UPDATE SKIP LOCKED, so rows
    /// held by a concurrent consumer are skipped rather than waited on, and
    /// two callers can never claim the same row.
    ///
    /// Selection order: expired leases first, then priority DESC,
    /// scheduled_at ASC NULLS FIRST, created_at ASC, job_id as tie-break.
    async fn claim(&self, n: i64, topic: Option<&str>) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, Job>(
            r#"
            WITH candidates AS (
                SELECT job_id, status AS prev_status
                FROM jobs.queue
                WHERE (status = 'queued'
                       OR (status = 'running' AND leased_until <= now()))
                  AND (scheduled_at IS NULL OR scheduled_at <= now())
                  AND ($2::text IS NULL OR task LIKE $2)
                ORDER BY (status = 'running') DESC,
                         priority DESC,
                         scheduled_at ASC NULLS FIRST,
                         created_at ASC,
                         job_id ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            ),
            claimed AS (
                UPDATE jobs.queue q
                SET status = 'running',
                    leased_until = now() + make_interval(secs => q.timeout)
                FROM candidates c
                WHERE q.job_id = c.job_id
                RETURNING q.job_id, q.task, q.body, q.created_at, q.scheduled_at,
                          q.timeout, q.priority, q.max_retries, q.retries,
                          q.status, q.last_error, NULL::jsonb AS result,
                          q.leased_until, c.prev_status
            )
            SELECT job_id, task, body, created_at, scheduled_at, timeout,
                   priority, max_retries, retries, status, last_error,
                   result, leased_until
            FROM claimed
            ORDER BY (prev_status = 'running') DESC,
                     priority DESC,
                     scheduled_at ASC NULLS FIRST,
                     created_at ASC,
                     job_id ASC
            "#,
        )
        .bind(n)
        .bind(topic)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // ----------------------------
    // Ack / Nack
    // ----------------------------

    /// Finalize a live lease as success and move the row to history.
    ///
    /// Fails with `InvalidAck` unless the job is `running` with
    /// `leased_until > now()` — a worker whose lease expired gets the same
    /// error as one acking twice, which is what makes redelivery safe.
    pub async fn ack(&self, job_id: Uuid, result: Option<Value>) -> Result<Job> {
        let row = sqlx::query_as::<_, Job>(
            r#"
            WITH done AS (
                DELETE FROM jobs.queue
                WHERE job_id = $1
                  AND status = 'running'
                  AND leased_until > now()
                RETURNING job_id, task, body, created_at, scheduled_at, timeout,
                          priority, max_retries, retries, last_error
            )
            INSERT INTO jobs.job (job_id, task, body, created_at, scheduled_at,
                                  timeout, priority, max_retries, retries,
                                  status, last_error, result)
            SELECT job_id, task, body, created_at, scheduled_at, timeout,
                   priority, max_retries, retries, 'success', last_error, $2
            FROM done
            RETURNING job_id, task, body, created_at, scheduled_at, timeout,
                      priority, max_retries, retries, status, last_error,
                      result, NULL::timestamptz AS leased_until
            "#,
        )
        .bind(job_id)
        .bind(result)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(job) => Ok(job),
            None => Err(self.reject_finalize(job_id).await),
        }
    }

    /// Finalize a live lease as failure.
    ///
    /// With retry budget left the row goes back to `queued` at the caller's
    /// `scheduled_at` (NULL = immediately eligible; the engine never computes
    /// backoff). The `max_retries`-th nack moves the row to history as
    /// `failed`.
    pub async fn nack(
        &self,
        job_id: Uuid,
        error: Option<&str>,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let counters: Option<(i32, i32)> = sqlx::query_as(
            r#"
            SELECT retries, max_retries
            FROM jobs.queue
            WHERE job_id = $1
              AND status = 'running'
              AND leased_until > now()
            FOR UPDATE
            "#,
        )
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((retries, max_retries)) = counters else {
            drop(tx);
            return Err(self.reject_finalize(job_id).await);
        };

        if retries + 1 >= max_retries {
            sqlx::query(
                r#"
                WITH failed AS (
                    DELETE FROM jobs.queue
                    WHERE job_id = $1
                    RETURNING job_id, task, body, created_at, scheduled_at,
                              timeout, priority, max_retries, retries
                )
                INSERT INTO jobs.job (job_id, task, body, created_at,
                                      scheduled_at, timeout, priority,
                                      max_retries, retries, status, last_error,
                                      result)
                SELECT job_id, task, body, created_at, scheduled_at, timeout,
                       priority, max_retries, retries + 1, 'failed', $2, NULL
                FROM failed
                "#,
            )
            .bind(job_id)
            .bind(error)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query(
                r#"
                UPDATE jobs.queue
                SET status = 'queued',
                    retries = retries + 1,
                    last_error = $2,
                    leased_until = NULL,
                    scheduled_at = $3
                WHERE job_id = $1
                "#,
            )
            .bind(job_id)
            .bind(error)
            .bind(scheduled_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Classify a failed ack/nack: a job known to the queue or history is an
    /// invalid finalization (wrong state, expired lease, or already terminal);
    /// an unknown id is `NotFound`.
    async fn reject_finalize(&self, job_id: Uuid) -> JobsError {
        let known: std::result::Result<bool, sqlx::Error> = sqlx::query_scalar(
            r#"
            SELECT EXISTS (SELECT 1 FROM jobs.queue WHERE job_id = $1)
                OR EXISTS (SELECT 1 FROM jobs.job WHERE job_id = $1)
            "#,
        )
        .bind(job_id)
        .fetch_one(&self.pool)
        .await;

        match known {
            Ok(true) => JobsError::InvalidAck(job_id),
            Ok(false) => JobsError::NotFound(job_id),
            Err(e) => e.into(),
        }
    }

    // ----------------------------
    // Reads
    // ----------------------------

    /// Look a job up across queue and history.
    pub async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            SELECT job_id, task, body, created_at, scheduled_at, timeout,
                   priority, max_retries, retries, status, last_error,
                   result, leased_until
            FROM jobs."all"
            WHERE job_id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    /// Snapshot of the operator views.
    pub async fn stats(&self) -> Result<QueueStats> {
        let (queued, running, expired, success, failed): (i64, i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT (SELECT count(*) FROM jobs.job_queue),
                       (SELECT count(*) FROM jobs.running),
                       (SELECT count(*) FROM jobs.expired),
                       (SELECT count(*) FROM jobs.job WHERE status = 'success'),
                       (SELECT count(*) FROM jobs.job WHERE status = 'failed')
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(QueueStats {
            queued,
            running,
            expired,
            success,
            failed,
        })
    }
}
