use std::marker::PhantomData;

use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::errors::SinkError;
use crate::sink::{Sink, TableRecord};

/// Writes each chunk to its table inside a single transaction.
pub struct SqliteSink<R> {
    pool: SqlitePool,
    _record: PhantomData<fn(&R)>,
}

impl<R: TableRecord> SqliteSink<R> {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            _record: PhantomData,
        }
    }

    pub fn table(&self) -> &'static str {
        R::TABLE
    }
}

impl<R: TableRecord> Sink<R> for SqliteSink<R> {
    async fn write_batch(&mut self, batch: &[R]) -> Result<(), SinkError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SinkError::Transaction {
                reason: format!("failed to begin transaction on {}: {}", R::TABLE, e),
            })?;

        for (position, record) in batch.iter().enumerate() {
            let result = record
                .bind(sqlx::query(R::INSERT_SQL))
                .execute(&mut *tx)
                .await;

            if let Err(e) = result {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Rollback on {} failed: {}", R::TABLE, rollback_err);
                }
                return Err(SinkError::BatchWrite {
                    position,
                    reason: e.to_string(),
                });
            }
        }

        tx.commit().await.map_err(|e| SinkError::Transaction {
            reason: format!("failed to commit chunk to {}: {}", R::TABLE, e),
        })?;

        debug!("Committed {} rows to {}", batch.len(), R::TABLE);
        Ok(())
    }
}
