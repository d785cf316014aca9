use crate::error::Result;
use sqlx::{postgres::PgPoolOptions, PgPool};

pub async fn make_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<i32> {
    crate::migrate::migrate(pool).await
}
