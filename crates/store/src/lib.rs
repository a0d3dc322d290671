//! SQLite persistence for the message store and the room directory.

pub mod message_store;
pub mod room_directory;

use {
    anyhow::Context,
    sqlx::{SqlitePool, sqlite::SqlitePoolOptions},
};

pub use {message_store::SqliteMessageStore, room_directory::SqliteRoomDirectory};

/// Open a pool for `database_url` and bring the schema up to date.
pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .with_context(|| format!("failed to open database {database_url}"))?;
    run_migrations(&pool).await?;
    Ok(pool)
}

/// Create the `messages`, `rooms` and `room_members` tables.
pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await
        .context("failed to run database migrations")?;
    Ok(())
}

/// Converts a driver error into the collaborator error type.
pub(crate) fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> nudge_channels::Error {
    move |e| nudge_channels::Error::external(context, e)
}

#[allow(clippy::expect_used)]
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    run_migrations(&pool).await.expect("migrations");
    pool
}
