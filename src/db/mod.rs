//! Postgres implementation of the repository traits.
//!
//! This module is split by table group:
//! - `template` - templates and template fields
//! - `document` - documents, document fields and registers
//! - `user` - read-only user profiles

mod document;
mod template;
mod user;

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use uuid::Uuid;

use crate::document::model::Stage;
use crate::repository::RepositoryError;

pub const SCHEMA: &str = include_str!("../../sql/schema.sql");

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(100)
            .min_connections(10)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(900))
            .max_lifetime(Duration::from_secs(1800))
            .connect(database_url)
            .await?;
        log::info!("Connected to Postgres");
        Ok(Self::new(pool))
    }

    /// Apply the bundled reference schema. Every statement is idempotent.
    pub async fn apply_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Open a transaction holding the document row lock, provided its stage passes `allowed`.
    async fn begin_guarded(
        &self,
        id: Uuid,
        allowed: fn(Stage) -> bool,
    ) -> Result<Transaction<'static, Postgres>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let stage: Option<i16> = sqlx::query_scalar(
            "SELECT stage FROM documents WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let stage = Stage::try_from(stage.ok_or(RepositoryError::NotFound)?)?;
        if !allowed(stage) {
            return Err(RepositoryError::StageConflict(stage));
        }
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_schema_declares_every_table() {
        for table in [
            "users",
            "templates",
            "template_fields",
            "registers",
            "documents",
            "document_fields",
        ] {
            assert!(
                super::SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {} (", table)),
                "{table}"
            );
        }
        assert!(super::SCHEMA.contains("documents_register_id_key"));
    }
}
