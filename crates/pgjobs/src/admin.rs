use crate::jobs::model::{Job, QueueStats};
use crate::jobs::repo::JobsRepo;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

/// Read-only operator surface over the queue views. Mutations stay with the
/// engine operations; this never writes.
#[derive(Clone)]
pub struct AdminState {
    pub jobs: JobsRepo,
}

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/jobs/:id", get(get_job))
        .with_state(state)
}

pub async fn serve(addr: &str, state: AdminState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr, "admin api listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn stats(State(state): State<AdminState>) -> Result<Json<QueueStats>, StatusCode> {
    state.jobs.stats().await.map(Json).map_err(|e| {
        tracing::error!(error = %e, "stats query failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

async fn get_job(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, StatusCode> {
    match state.jobs.get(id).await {
        Ok(Some(job)) => Ok(Json(job)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!(job_id = %id, error = %e, "job lookup failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
