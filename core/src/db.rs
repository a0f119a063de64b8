//! Destination store bootstrap.
//!
//! The three destination tables mirror the MovieLens loader schema:
//! `Movie` keyed by the dataset's own id, `Rating` and `Tag` with generated ids.

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::errors::SinkError;

/// Connection pool handed to every sink.
pub type Pool = SqlitePool;

const CREATE_MOVIE: &str = r#"
CREATE TABLE IF NOT EXISTS Movie (
    movie_id INTEGER PRIMARY KEY,
    movie_title TEXT NOT NULL,
    movie_year INTEGER,
    movie_genres TEXT NOT NULL
)"#;

const CREATE_RATING: &str = r#"
CREATE TABLE IF NOT EXISTS Rating (
    rating_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    movie_id INTEGER NOT NULL,
    rating REAL NOT NULL,
    timestamp TEXT NOT NULL
)"#;

const CREATE_TAG: &str = r#"
CREATE TABLE IF NOT EXISTS Tag (
    tag_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    movie_id INTEGER NOT NULL,
    tag TEXT NOT NULL,
    timestamp TEXT NOT NULL
)"#;

pub async fn connect(config: &DatabaseConfig) -> Result<SqlitePool, SinkError> {
    let options = SqliteConnectOptions::from_str(&config.url)
        .map_err(|e| SinkError::Connection {
            reason: format!("invalid database url {}: {}", config.url, e),
        })?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

    let mut pool_options = SqlitePoolOptions::new().max_connections(config.max_connections);
    if config.url.contains(":memory:") {
        // every connection to :memory: is its own database, so keep exactly one alive
        pool_options = pool_options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    let pool = pool_options
        .connect_with(options)
        .await
        .map_err(|e| SinkError::Connection {
            reason: format!("cannot open {}: {}", config.url, e),
        })?;
    info!("Connected to {}", config.url);
    Ok(pool)
}

/// Creates the destination tables when they are missing. Safe to call repeatedly.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), SinkError> {
    for statement in [CREATE_MOVIE, CREATE_RATING, CREATE_TAG] {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| SinkError::Schema {
                reason: e.to_string(),
            })?;
    }
    Ok(())
}

pub async fn count_rows(pool: &SqlitePool, table: &str) -> Result<i64, SinkError> {
    if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(SinkError::Query {
            reason: format!("refusing to query table name {:?}", table),
        });
    }
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM \"{}\"", table))
        .fetch_one(pool)
        .await
        .map_err(|e| SinkError::Query {
            reason: format!("counting rows of {}: {}", table, e),
        })?;
    Ok(count)
}
