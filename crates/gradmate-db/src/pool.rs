use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tracing::info;

use crate::config::DbConfig;

/// Migrations embedded at compile time from `crates/gradmate-db/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Tables reported by [`table_counts`].
const APP_TABLES: [&str; 2] = ["study_plans", "usage_logs"];

fn pool_options(max_connections: u32) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
}

/// Create a connection pool sized for a single web process.
pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    pool_options(10)
        .connect(&config.database_url)
        .await
        .with_context(|| format!("failed to connect to database at {}", config.database_url))
}

/// Run all pending embedded migrations against the pool.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to run database migrations")?;

    info!("migrations applied successfully");
    Ok(())
}

/// What [`ensure_database_exists`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseStatus {
    Existing,
    Created,
}

/// Create the configured database through the `postgres` maintenance
/// database when it is missing.
pub async fn ensure_database_exists(config: &DbConfig) -> Result<DatabaseStatus> {
    let db_name = config
        .database_name()
        .context("could not determine database name from URL")?;
    let maintenance_url = config.maintenance_url();
    let admin = pool_options(1)
        .connect(&maintenance_url)
        .await
        .with_context(|| format!("failed to connect to maintenance database at {maintenance_url}"))?;

    let result = create_if_missing(&admin, db_name).await;
    admin.close().await;
    let status = result?;
    info!(db = db_name, ?status, "database checked");
    Ok(status)
}

async fn create_if_missing(admin: &PgPool, db_name: &str) -> Result<DatabaseStatus> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(db_name)
            .fetch_one(admin)
            .await
            .context("failed to query pg_database")?;
    if exists {
        return Ok(DatabaseStatus::Existing);
    }

    admin
        .execute(format!("CREATE DATABASE {}", quote_ident(db_name)).as_str())
        .await
        .with_context(|| format!("failed to create database {db_name}"))?;
    Ok(DatabaseStatus::Created)
}

/// Quote `name` as a PostgreSQL identifier. `CREATE DATABASE` takes no bind
/// parameters.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Row counts for the application tables, printed by `gradmate db-init`.
pub async fn table_counts(pool: &PgPool) -> Result<Vec<(&'static str, i64)>> {
    let mut counts = Vec::with_capacity(APP_TABLES.len());
    for table in APP_TABLES {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await
            .with_context(|| format!("failed to count rows in {table}"))?;
        counts.push((table, count));
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_double_quoted() {
        assert_eq!(quote_ident("gradmate"), "\"gradmate\"");
        assert_eq!(quote_ident("grad-mate"), "\"grad-mate\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
