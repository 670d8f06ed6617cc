mod import;
mod models;

pub use import::{import_products_csv, ImportError};
pub use models::*;

use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool,
};
use std::str::FromStr;
use tracing::info;

use crate::config::DatabaseConfig;

pub type DbPool = SqlitePool;

/// Execute a SQL migration file, properly handling comments
async fn execute_sql(pool: &SqlitePool, sql: &str) -> Result<()> {
    for statement in sql.split(';') {
        // Strip SQL comment lines (lines starting with --)
        let cleaned: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let trimmed = cleaned.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(pool).await?;
        }
    }
    Ok(())
}

/// Open the connection pool and bring the schema up to date.
pub async fn init(config: &DatabaseConfig) -> Result<DbPool> {
    info!("Initializing database at {}", config.url);

    let mut options = SqliteConnectOptions::from_str(&config.url)
        .with_context(|| format!("Invalid database URL: {}", config.url))?
        .create_if_missing(true)
        .foreign_keys(true);

    let mut pool_options = SqlitePoolOptions::new();

    if config.is_memory() {
        // An in-memory database lives only as long as its connection.
        pool_options = pool_options
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    } else {
        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory: {}", parent.display())
                })?;
            }
        }
        options = options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
        pool_options = pool_options.max_connections(config.max_connections);
    }

    let pool = pool_options
        .connect_with(options)
        .await
        .context("Failed to open database")?;

    run_migrations(&pool).await?;

    info!("Database initialized successfully");
    Ok(pool)
}

/// Fresh in-memory database with the schema applied.
pub async fn init_memory() -> Result<DbPool> {
    init(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
    })
    .await
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    // Migration 001: users, products, orders
    execute_sql(pool, include_str!("../../migrations/001_initial.sql"))
        .await
        .context("Migration 001 failed")?;

    info!("Migrations completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = init_memory().await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('users', 'products', 'orders') ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert_eq!(names, vec!["orders", "products", "users"]);
    }

    #[tokio::test]
    async fn test_execute_sql_skips_comments() {
        let pool = init_memory().await.unwrap();
        execute_sql(
            &pool,
            "-- leading comment\nCREATE TABLE IF NOT EXISTS scratch (id INTEGER);\n-- trailing",
        )
        .await
        .unwrap();

        let found: Option<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE name = 'scratch'")
                .fetch_optional(&pool)
                .await
                .unwrap();
        assert!(found.is_some());
    }
}
