//! Storage seams of the workflow core.
//!
//! - `TemplateRepository` - templates and their fields
//! - `DocumentRepository` - documents, field values and registers
//! - `UserDirectory` - read-only access to user profiles
//!
//! `PgStore` (in `crate::db`) is the production implementation and
//! `MemoryStore` backs tests and local development. Stage transitions are
//! conditional: an implementation must re-check the stage atomically with the
//! write and report `StageConflict` when it moved underneath the caller.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::document::model::{
    BriefDocument, Document, DocumentState, FieldValue, InvalidStage, NewDocument, Stage,
    VerifyCommit,
};
use crate::template::model::{CreateTemplateRequest, Template, TemplateSummary};
use crate::user::UserProfile;

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("document is in stage {0}")]
    StageConflict(Stage),
    #[error("document field {0} not found")]
    FieldNotFound(i64),
    #[error("unique constraint violated: {0}")]
    Duplicate(String),
    #[error("stored row is invalid: {0}")]
    InvalidRow(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return RepositoryError::Duplicate(
                    db.constraint().unwrap_or("unique").to_string(),
                );
            }
        }
        if matches!(err, sqlx::Error::RowNotFound) {
            return RepositoryError::NotFound;
        }
        RepositoryError::Database(err)
    }
}

impl From<InvalidStage> for RepositoryError {
    fn from(err: InvalidStage) -> Self {
        RepositoryError::InvalidRow(err.to_string())
    }
}

#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn insert_template(
        &self,
        request: &CreateTemplateRequest,
        created_at: DateTime<Utc>,
    ) -> Result<Template, RepositoryError>;

    /// Template with its fields in display order.
    async fn find_template(&self, id: i64) -> Result<Option<Template>, RepositoryError>;

    async fn list_templates(&self, active_only: bool)
        -> Result<Vec<TemplateSummary>, RepositoryError>;
}

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Persist the document and all its fields atomically, in stage `Sent`.
    async fn insert_document(&self, document: &NewDocument) -> Result<(), RepositoryError>;

    async fn find_document(&self, id: Uuid) -> Result<Option<Document>, RepositoryError>;

    async fn find_state(&self, id: Uuid) -> Result<Option<DocumentState>, RepositoryError>;

    /// Newest first. `applicant` restricts the listing to one applicant's documents.
    async fn list_briefs(
        &self,
        applicant: Option<Uuid>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<BriefDocument>, RepositoryError>;

    /// `Sent -> Verified`, creating the register in the same transaction when
    /// asked to. Returns the register id now attached to the document.
    async fn mark_verified(&self, id: Uuid, commit: &VerifyCommit)
        -> Result<i64, RepositoryError>;

    /// `Verified -> Signed`.
    async fn mark_signed(
        &self,
        id: Uuid,
        signer_id: Uuid,
        signed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Replace the description while the document is still `Sent`.
    async fn update_description(&self, id: Uuid, description: &str)
        -> Result<(), RepositoryError>;

    /// Apply every patch or none. A patch matching no row fails with `FieldNotFound`.
    async fn update_fields(&self, id: Uuid, patches: &[FieldValue])
        -> Result<(), RepositoryError>;

    /// Soft-delete the document and its fields unless it is `Signed`.
    async fn soft_delete(&self, id: Uuid) -> Result<(), RepositoryError>;

    async fn add_register(&self, description: &str) -> Result<i64, RepositoryError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, id: Uuid) -> Result<Option<UserProfile>, RepositoryError>;
}
