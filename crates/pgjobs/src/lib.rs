//! Durable job queue on PostgreSQL.
//!
//! The database is the single source of truth: publishing inserts into
//! `jobs.queue`, consumers lease rows with `FOR UPDATE SKIP LOCKED`, and
//! ack/nack move rows into the `jobs.job` history table. Delivery is
//! at-least-once; a lease that expires without an ack is silently reclaimed
//! by the next consume, and the late ack fails.

pub mod admin;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod migrate;

pub use config::Config;
pub use error::{JobsError, Result};
pub use jobs::{Job, JobStatus, JobsRepo, NewJob, QueueStats};
