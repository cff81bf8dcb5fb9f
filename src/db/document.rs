//! Document, document field and register database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use super::PgStore;
use crate::document::model::{
    BriefDocument, Document, DocumentField, DocumentState, FieldValue, NewDocument,
    RegisterAssignment, Stage, VerifyCommit,
};
use crate::repository::{DocumentRepository, RepositoryError};

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    register_id: Option<i64>,
    applicant_id: Uuid,
    template_id: i64,
    stage: i16,
    verifier_id: Option<Uuid>,
    verified_at: Option<DateTime<Utc>>,
    signer_id: Option<Uuid>,
    signed_at: Option<DateTime<Utc>>,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct StateRow {
    id: Uuid,
    applicant_id: Uuid,
    template_id: i64,
    stage: i16,
    register_id: Option<i64>,
    description: String,
}

#[derive(sqlx::FromRow)]
struct BriefRow {
    id: Uuid,
    register_id: Option<i64>,
    template_name: String,
    applicant_name: Option<String>,
    stage: i16,
    description: String,
    created_at: DateTime<Utc>,
}

#[async_trait]
impl DocumentRepository for PgStore {
    async fn insert_document(&self, document: &NewDocument) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO documents (id, applicant_id, template_id, stage, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            "#,
        )
        .bind(document.id)
        .bind(document.applicant_id)
        .bind(document.template_id)
        .bind(Stage::Sent.code())
        .bind(&document.description)
        .bind(document.created_at)
        .execute(&mut *tx)
        .await?;

        for field in &document.fields {
            let inserted = sqlx::query(
                r#"
                INSERT INTO document_fields (document_id, field_id, value)
                SELECT $1, f.id, $3 FROM template_fields f
                WHERE f.id = $2 AND f.template_id = $4
                "#,
            )
            .bind(document.id)
            .bind(field.field_id)
            .bind(&field.value)
            .bind(document.template_id)
            .execute(&mut *tx)
            .await?;

            if inserted.rows_affected() == 0 {
                return Err(RepositoryError::FieldNotFound(field.field_id));
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_document(&self, id: Uuid) -> Result<Option<Document>, RepositoryError> {
        let row: Option<DocumentRow> = sqlx::query_as(
            r#"
            SELECT id, register_id, applicant_id, template_id, stage, verifier_id, verified_at,
                   signer_id, signed_at, description, created_at, updated_at
            FROM documents
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let fields: Vec<(i64, String, String)> = sqlx::query_as(
            r#"
            SELECT df.field_id, tf.key, df.value
            FROM document_fields df
            JOIN template_fields tf ON tf.id = df.field_id
            WHERE df.document_id = $1 AND df.deleted_at IS NULL
            ORDER BY tf.position, tf.id
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(Document {
            id: row.id,
            register_id: row.register_id,
            applicant_id: row.applicant_id,
            template_id: row.template_id,
            fields: fields
                .into_iter()
                .map(|(field_id, key, value)| DocumentField {
                    field_id,
                    key,
                    value,
                })
                .collect(),
            stage: Stage::try_from(row.stage)?,
            verifier_id: row.verifier_id,
            verified_at: row.verified_at,
            signer_id: row.signer_id,
            signed_at: row.signed_at,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }

    async fn find_state(&self, id: Uuid) -> Result<Option<DocumentState>, RepositoryError> {
        let row: Option<StateRow> = sqlx::query_as(
            r#"
            SELECT id, applicant_id, template_id, stage, register_id, description
            FROM documents
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<DocumentState, RepositoryError> {
            Ok(DocumentState {
                id: row.id,
                applicant_id: row.applicant_id,
                template_id: row.template_id,
                stage: Stage::try_from(row.stage)?,
                register_id: row.register_id,
                description: row.description,
            })
        })
        .transpose()
    }

    async fn list_briefs(
        &self,
        applicant: Option<Uuid>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<BriefDocument>, RepositoryError> {
        let rows: Vec<BriefRow> = sqlx::query_as(
            r#"
            SELECT d.id, d.register_id, t.name AS template_name, u.name AS applicant_name,
                   d.stage, d.description, d.created_at
            FROM documents d
            JOIN templates t ON t.id = d.template_id
            LEFT JOIN users u ON u.id = d.applicant_id
            WHERE d.deleted_at IS NULL AND ($1::uuid IS NULL OR d.applicant_id = $1)
            ORDER BY d.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(applicant)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<BriefDocument, RepositoryError> {
                Ok(BriefDocument {
                    id: row.id,
                    register_id: row.register_id,
                    template_name: row.template_name,
                    applicant_name: row.applicant_name,
                    stage: Stage::try_from(row.stage)?,
                    description: row.description,
                    created_at: row.created_at,
                })
            })
            .collect()
    }

    async fn mark_verified(
        &self,
        id: Uuid,
        commit: &VerifyCommit,
    ) -> Result<i64, RepositoryError> {
        let mut tx = self.begin_guarded(id, Stage::can_verify).await?;

        // Read under the row lock: a description set after the engine looked wins.
        let current: String = sqlx::query_scalar("SELECT description FROM documents WHERE id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        let description = if current.trim().is_empty() {
            commit.description.as_str()
        } else {
            current.as_str()
        };

        let register_id = match commit.register {
            RegisterAssignment::Existing(register_id) => register_id,
            RegisterAssignment::Create => allocate_register(&mut *tx, description).await?,
        };

        let updated = sqlx::query(
            r#"
            UPDATE documents
            SET stage = $2, register_id = $3, description = $4, verifier_id = $5,
                verified_at = $6, updated_at = $6
            WHERE id = $1 AND stage = $7 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(Stage::Verified.code())
        .bind(register_id)
        .bind(description)
        .bind(commit.verifier_id)
        .bind(commit.verified_at)
        .bind(Stage::Sent.code())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::StageConflict(Stage::Verified));
        }

        tx.commit().await?;
        Ok(register_id)
    }

    async fn mark_signed(
        &self,
        id: Uuid,
        signer_id: Uuid,
        signed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.begin_guarded(id, Stage::can_sign).await?;

        let updated = sqlx::query(
            r#"
            UPDATE documents
            SET stage = $2, signer_id = $3, signed_at = $4, updated_at = $4
            WHERE id = $1 AND stage = $5 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(Stage::Signed.code())
        .bind(signer_id)
        .bind(signed_at)
        .bind(Stage::Verified.code())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::StageConflict(Stage::Signed));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_description(
        &self,
        id: Uuid,
        description: &str,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.begin_guarded(id, Stage::can_mutate_fields).await?;

        sqlx::query("UPDATE documents SET description = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(description)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update_fields(
        &self,
        id: Uuid,
        patches: &[FieldValue],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.begin_guarded(id, Stage::can_mutate_fields).await?;

        for patch in patches {
            let updated = sqlx::query(
                r#"
                UPDATE document_fields SET value = $3
                WHERE document_id = $1 AND field_id = $2 AND deleted_at IS NULL
                "#,
            )
            .bind(id)
            .bind(patch.field_id)
            .bind(&patch.value)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                return Err(RepositoryError::FieldNotFound(patch.field_id));
            }
        }

        sqlx::query("UPDATE documents SET updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn soft_delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut tx = self.begin_guarded(id, Stage::can_delete).await?;

        sqlx::query("UPDATE documents SET deleted_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE document_fields SET deleted_at = NOW() WHERE document_id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn add_register(&self, description: &str) -> Result<i64, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        allocate_register(&mut *conn, description).await
    }
}

/// Insert a register whose number no live document holds yet. Attached numbers
/// issued elsewhere never advance the sequence, so colliding values are skipped.
async fn allocate_register(
    conn: &mut PgConnection,
    description: &str,
) -> Result<i64, RepositoryError> {
    loop {
        let inserted: Option<i64> = sqlx::query_scalar(
            "INSERT INTO registers (description) VALUES ($1) ON CONFLICT (id) DO NOTHING RETURNING id",
        )
        .bind(description)
        .fetch_optional(&mut *conn)
        .await?;
        let Some(register_id) = inserted else {
            continue;
        };

        let held: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM documents WHERE register_id = $1 AND deleted_at IS NULL)",
        )
        .bind(register_id)
        .fetch_one(&mut *conn)
        .await?;
        if !held {
            return Ok(register_id);
        }

        log::debug!("Register {} is already attached, allocating the next one", register_id);
        sqlx::query("DELETE FROM registers WHERE id = $1")
            .bind(register_id)
            .execute(&mut *conn)
            .await?;
    }
}
