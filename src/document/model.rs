use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// Position of a document in the approval lifecycle.
///
/// `Sent` is the initial stage, `Signed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum Stage {
    Sent,
    Verified,
    Signed,
}

impl Stage {
    pub fn code(self) -> i16 {
        match self {
            Stage::Sent => 1,
            Stage::Verified => 2,
            Stage::Signed => 3,
        }
    }

    pub fn can_verify(self) -> bool {
        self == Stage::Sent
    }

    pub fn can_sign(self) -> bool {
        self == Stage::Verified
    }

    pub fn can_mutate_fields(self) -> bool {
        self == Stage::Sent
    }

    pub fn can_delete(self) -> bool {
        self != Stage::Signed
    }
}

impl TryFrom<i16> for Stage {
    type Error = InvalidStage;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Stage::Sent),
            2 => Ok(Stage::Verified),
            3 => Ok(Stage::Signed),
            other => Err(InvalidStage(other)),
        }
    }
}

impl From<Stage> for i16 {
    fn from(stage: Stage) -> Self {
        stage.code()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Sent => "sent",
            Stage::Verified => "verified",
            Stage::Signed => "signed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown stage code {0}")]
pub struct InvalidStage(pub i16);

/// A filled value for one template field.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, ToSchema)]
pub struct DocumentField {
    #[schema(example = 12)]
    pub field_id: i64,
    #[schema(example = "nama")]
    pub key: String,
    #[schema(example = "Budi Santoso")]
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct Document {
    #[schema(example = "f1e2d3c4-b5a6-7890-1234-567890abcdef")]
    pub id: Uuid,
    pub register_id: Option<i64>,
    pub applicant_id: Uuid,
    pub template_id: i64,
    pub fields: Vec<DocumentField>,
    #[schema(value_type = i16, example = 1)]
    pub stage: Stage,
    pub verifier_id: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,
    pub signer_id: Option<Uuid>,
    pub signed_at: Option<DateTime<Utc>>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lightweight projection used for stage guards and ownership checks.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentState {
    pub id: Uuid,
    pub applicant_id: Uuid,
    pub template_id: i64,
    pub stage: Stage,
    pub register_id: Option<i64>,
    pub description: String,
}

/// Row of the paginated document listing.
#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct BriefDocument {
    pub id: Uuid,
    pub register_id: Option<i64>,
    pub template_name: String,
    pub applicant_name: Option<String>,
    #[schema(value_type = i16, example = 1)]
    pub stage: Stage,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Public verification view, the target of the QR code.
#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct DocumentStatus {
    pub id: Uuid,
    pub register_id: Option<i64>,
    pub template_name: String,
    #[schema(value_type = i16, example = 1)]
    pub stage: Stage,
    pub verified_at: Option<DateTime<Utc>>,
    pub signed_at: Option<DateTime<Utc>>,
    pub signer_name: Option<String>,
}

/// Document ready to be persisted by `DocumentRepository::insert_document`.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: Uuid,
    pub applicant_id: Uuid,
    pub template_id: i64,
    pub fields: Vec<FieldValue>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, ToSchema)]
pub struct FieldValue {
    #[schema(example = 12)]
    pub field_id: i64,
    #[schema(example = "Budi Santoso")]
    pub value: String,
}

/// How the register number is settled during verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterAssignment {
    /// Attach an already numbered register.
    Existing(i64),
    /// Create a register with the resolved description inside the verify transaction.
    Create,
}

#[derive(Debug, Clone)]
pub struct VerifyCommit {
    pub verifier_id: Uuid,
    pub verified_at: DateTime<Utc>,
    /// Applied only if the document still has no description when the row is locked.
    pub description: String,
    pub register: RegisterAssignment,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDocumentRequest {
    #[schema(example = 1)]
    pub template_id: i64,
    pub fields: Vec<FieldValue>,
    #[serde(default)]
    #[schema(example = "Surat keterangan domisili untuk keperluan bank")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateDocumentResponse {
    pub id: Uuid,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct VerifyDocumentRequest {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub register_id: Option<i64>,
}

#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
pub struct UpdateDocumentRequest {
    #[schema(example = "Keterangan diperbarui")]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateFieldsRequest {
    pub fields: Vec<FieldValue>,
}

/// Page request for the brief listing. Pages are 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

pub const MAX_PAGE_LIMIT: i64 = 100;

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

impl Pagination {
    pub fn new(page: i64, limit: i64) -> Self {
        let page = if page < 1 { default_page() } else { page };
        let limit = if limit < 1 {
            default_limit()
        } else {
            limit.min(MAX_PAGE_LIMIT)
        };
        Self { page, limit }
    }

    pub fn normalized(self) -> Self {
        Self::new(self.page, self.limit)
    }

    /// Saturates instead of overflowing; a page past the end is simply empty.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(default_page(), default_limit())
    }
}
