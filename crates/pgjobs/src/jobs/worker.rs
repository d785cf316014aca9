use crate::config::Config;
use crate::error::{JobsError, Result};
use crate::jobs::registry::HandlerRegistry;
use crate::jobs::repo::JobsRepo;
use crate::jobs::retry::RetryPolicy;
use crate::jobs::runner::JobRunner;
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinSet;

/// Polling worker: N concurrent pollers, each claiming `batch_size` jobs and
/// dispatching them through the runner. Workers share nothing but the pool;
/// a crashed poller's leases expire on their own and get reclaimed by the
/// next consume.
pub struct Worker {
    repo: JobsRepo,
    runner: JobRunner,
    num_workers: usize,
    batch_size: i64,
    poll_interval: Duration,
    topic: Option<String>,
}

impl Worker {
    pub fn new(pool: PgPool, registry: Arc<HandlerRegistry>, config: &Config) -> Self {
        let repo = JobsRepo::new(pool);
        let runner = JobRunner::new(repo.clone(), registry, RetryPolicy::default());

        Self {
            repo,
            runner,
            num_workers: config.num_workers.max(1),
            batch_size: config.batch_size.max(1),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            topic: config.topic.clone(),
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let mut pollers = JoinSet::new();

        for worker in 0..self.num_workers {
            let repo = self.repo.clone();
            let runner = self.runner.clone();
            let batch_size = self.batch_size;
            let poll_interval = self.poll_interval;
            let topic = self.topic.clone();

            pollers.spawn(async move {
                poll_loop(worker, repo, runner, batch_size, poll_interval, topic).await
            });
        }

        while let Some(joined) = pollers.join_next().await {
            joined??;
        }

        Ok(())
    }
}

async fn poll_loop(
    worker: usize,
    repo: JobsRepo,
    runner: JobRunner,
    batch_size: i64,
    poll_interval: Duration,
    topic: Option<String>,
) -> Result<()> {
    loop {
        let claimed = match &topic {
            Some(pattern) => repo.consume_topic(pattern, batch_size).await,
            None => repo.consume(batch_size).await,
        };

        let batch = match claimed {
            Ok(batch) => batch,
            Err(e) if e.is_transient() => {
                tracing::warn!(worker, error = %e, "consume failed, retrying");
                tokio::time::sleep(poll_interval).await;
                continue;
            }
            Err(e) => return Err(e),
        };

        if batch.is_empty() {
            tokio::time::sleep(poll_interval).await;
            continue;
        }

        tracing::debug!(worker, claimed = batch.len(), "leased batch");

        for job in &batch {
            match runner.run(job).await {
                Ok(()) => {}
                // Our lease expired while the handler ran; the next consume
                // redelivers the job.
                Err(JobsError::InvalidAck(job_id)) => {
                    tracing::warn!(worker, %job_id, "lease expired before finalization");
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(worker, job_id = %job.job_id, error = %e, "finalization failed; lease will expire");
                }
                Err(e) => return Err(e),
            }
        }
    }
}
