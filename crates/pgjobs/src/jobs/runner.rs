use crate::error::Result;
use crate::jobs::model::Job;
use crate::jobs::registry::HandlerRegistry;
use crate::jobs::repo::JobsRepo;
use crate::jobs::retry::RetryPolicy;
use chrono::Utc;
use rand::{rngs::StdRng, SeedableRng};
use serde_json::Value;
use std::{sync::Arc, time::Duration};

/// Executes one claimed job and finalizes its lease: ack with the handler's
/// result, or nack with the error and an exponential-backoff `scheduled_at`.
#[derive(Clone)]
pub struct JobRunner {
    repo: JobsRepo,
    registry: Arc<HandlerRegistry>,
    retry: RetryPolicy,
}

impl JobRunner {
    pub fn new(repo: JobsRepo, registry: Arc<HandlerRegistry>, retry: RetryPolicy) -> Self {
        Self {
            repo,
            registry,
            retry,
        }
    }

    pub async fn run(&self, job: &Job) -> Result<()> {
        match self.execute(job).await {
            Ok(result) => {
                self.repo.ack(job.job_id, Some(result)).await?;
                tracing::debug!(job_id = %job.job_id, task = %job.task, "job succeeded");
            }
            Err(message) => {
                // retries counts prior nacks, so this failure is attempt retries+1.
                let mut rng = StdRng::from_entropy();
                let delay = self.retry.next_delay_seconds(job.retries + 1, &mut rng);
                let scheduled_at = Utc::now() + chrono::Duration::seconds(delay);

                tracing::warn!(
                    job_id = %job.job_id,
                    task = %job.task,
                    retries = job.retries,
                    delay_seconds = delay,
                    error = %message,
                    "job failed"
                );
                self.repo
                    .nack(job.job_id, Some(message.as_str()), Some(scheduled_at))
                    .await?;
            }
        }

        Ok(())
    }

    /// Run the handler under the job's own timeout. The lease expires at the
    /// same horizon, so there is no point letting the future outlive it.
    async fn execute(&self, job: &Job) -> std::result::Result<Value, String> {
        let Some(handler) = self.registry.handler_for(&job.task) else {
            return Err(format!("no handler registered for task {}", job.task));
        };

        let budget = Duration::from_secs_f64(job.timeout.max(0.0));
        match tokio::time::timeout(budget, handler(job.body.clone())).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(_) => Err(format!("handler exceeded the {}s job timeout", job.timeout)),
        }
    }
}
