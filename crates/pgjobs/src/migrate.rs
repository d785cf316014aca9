use crate::error::Result;
use sqlx::{Executor, PgPool};

/// Embedded migration scripts, `NNNN_description.up.sql`, strictly ascending.
/// There are no down migrations.
const MIGRATIONS: &[(i32, &str, &str)] = &[
    (
        1,
        "0001_job_queue.up.sql",
        include_str!("../migrations/0001_job_queue.up.sql"),
    ),
    (
        2,
        "0002_views.up.sql",
        include_str!("../migrations/0002_views.up.sql"),
    ),
];

/// Highest migration version shipped with this build.
pub fn latest_version() -> i32 {
    MIGRATIONS.last().map(|(v, _, _)| *v).unwrap_or(0)
}

/// Read the applied version; a database without the `jobs.migrations`
/// relation is at version 0.
pub async fn current_version(pool: &PgPool) -> Result<i32> {
    match sqlx::query_scalar::<_, i32>("SELECT migration FROM jobs.migrations")
        .fetch_one(pool)
        .await
    {
        Ok(version) => Ok(version),
        // undefined_table / invalid_schema_name: nothing applied yet
        Err(sqlx::Error::Database(db))
            if matches!(db.code().as_deref(), Some("42P01") | Some("3F000")) =>
        {
            Ok(0)
        }
        Err(e) => Err(e.into()),
    }
}

/// Apply every migration above the recorded version, in ascending order,
/// inside one transaction, then record the new version. Re-running against an
/// up-to-date database is a no-op.
pub async fn migrate(pool: &PgPool) -> Result<i32> {
    let current = current_version(pool).await?;
    tracing::info!(current, "current migration");

    let mut tx = pool.begin().await?;
    let mut applied = current;

    for (version, name, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        tracing::info!(migration = name, "applying migration");
        (&mut *tx).execute(*sql).await?;
        applied = *version;
    }

    if applied != current {
        sqlx::query("UPDATE jobs.migrations SET migration = $1")
            .bind(applied)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        tracing::info!(applied, "migrations applied");
    } else {
        tx.commit().await?;
        tracing::info!("no migrations to apply, database is at the latest version");
    }

    Ok(applied)
}
