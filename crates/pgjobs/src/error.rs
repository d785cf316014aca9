use uuid::Uuid;

pub type Result<T> = std::result::Result<T, JobsError>;

/// Errors surfaced by the queue engine.
///
/// `InvalidAck` and `NotFound` are terminal caller mistakes; `Transient`
/// covers conditions the caller may retry idempotently (the transaction has
/// already rolled back).
#[derive(Debug, thiserror::Error)]
pub enum JobsError {
    /// Ack or nack on a job that is not running or whose lease has expired.
    #[error("job {0} is not running or its lease has expired")]
    InvalidAck(Uuid),

    /// The referenced job exists neither in the queue nor in history.
    #[error("job {0} does not exist")]
    NotFound(Uuid),

    /// Publish rejected by a schema constraint (empty task, negative retries).
    #[error("invalid job input: {0}")]
    ConstraintViolation(String),

    /// Deadlock, serialization failure, or lost connection. Retryable.
    #[error("transient database failure: {0}")]
    Transient(#[source] sqlx::Error),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

enum SqlstateClass {
    Constraint(String),
    Transient,
    Other,
}

fn classify(err: &sqlx::Error) -> SqlstateClass {
    match err {
        sqlx::Error::Database(db) => match db.code().as_deref() {
            // integrity_constraint_violation class
            Some(code) if code.starts_with("23") => {
                SqlstateClass::Constraint(db.message().to_string())
            }
            // serialization_failure, deadlock_detected, connection class
            Some("40001") | Some("40P01") => SqlstateClass::Transient,
            Some(code) if code.starts_with("08") => SqlstateClass::Transient,
            _ => SqlstateClass::Other,
        },
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => SqlstateClass::Transient,
        _ => SqlstateClass::Other,
    }
}

impl From<sqlx::Error> for JobsError {
    fn from(err: sqlx::Error) -> Self {
        match classify(&err) {
            SqlstateClass::Constraint(message) => JobsError::ConstraintViolation(message),
            SqlstateClass::Transient => JobsError::Transient(err),
            SqlstateClass::Other => JobsError::Database(err),
        }
    }
}

impl JobsError {
    /// True when the caller may safely retry the whole operation.
    pub fn is_transient(&self) -> bool {
        matches!(self, JobsError::Transient(_))
    }
}
