pub mod order_history;

use sqlx::{Executor, PgPool};

// Design:
//
// Functions that execute a single statement take `&mut PgConnection`;
// functions that span multiple statements take `&mut PgTransaction` so the
// whole function succeeds or fails together. We call the parameter `ex` for
// `Executor`. PgTransaction derefs to PgConnection so callers decide
// whether a function runs standalone or inside a bigger transaction.
//
// For tests a useful pattern is to start a transaction at the beginning of
// the test, use it for all queries and never commit it. The uncommitted
// transaction is rolled back on drop, which lets postgres tests run in
// parallel without clearing tables between them.

pub type PgTransaction<'a> = sqlx::Transaction<'a, sqlx::Postgres>;

/// The names of all tables we use in the db.
pub const TABLES: &[&str] = &["order_history"];

/// Delete all data in the database. Only used by tests.
#[allow(non_snake_case)]
pub async fn clear_DANGER_(ex: &mut PgTransaction<'_>) -> sqlx::Result<()> {
    for table in TABLES {
        ex.execute(format!("TRUNCATE {table};").as_str()).await?;
    }
    Ok(())
}

/// Opens a connection pool to the database at `url`.
pub async fn connect(
    url: &str,
    max_connections: u32,
    idle_timeout: std::time::Duration,
) -> sqlx::Result<PgPool> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(max_connections)
        .idle_timeout(idle_timeout)
        .connect(url)
        .await
}
