//! Postgres-backed report store.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use report_export_core::report::{ReportStore, StoreError};

/// Report store persisting one row per generated report record.
pub struct PgReportStore {
    pool: PgPool,
}

impl PgReportStore {
    /// Connect to the database.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the pool cannot be established.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Create the `reports` table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the DDL fails.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS reports (
                id SERIAL PRIMARY KEY,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                user_id TEXT,
                type TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        info!("reports table ready");
        Ok(())
    }
}

#[async_trait]
impl ReportStore for PgReportStore {
    async fn record(&self, user_id: &str, event_type: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO reports(user_id, type) VALUES($1, $2)")
            .bind(user_id)
            .bind(event_type)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }
}
