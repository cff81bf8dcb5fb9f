use thiserror::Error;
use uuid::Uuid;

use crate::error::ErrorKind;
use crate::repository::RepositoryError;
use crate::template::TemplateError;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("template {0} not found")]
    TemplateNotFound(i64),
    #[error("document {0} not found")]
    DocumentNotFound(Uuid),
    #[error("document field {0} not found")]
    FieldNotFound(i64),
    #[error("user {0} not found")]
    UserNotFound(Uuid),
    #[error("document fields do not match the template (missing: {missing:?}, unexpected: {unexpected:?})")]
    FieldMismatch {
        missing: Vec<i64>,
        unexpected: Vec<i64>,
    },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("document has already been verified")]
    AlreadyVerified,
    #[error("document has already been signed")]
    AlreadySigned,
    #[error("document has not been verified yet")]
    NotVerifiedYet,
    #[error("register number is already used by another document")]
    DuplicateRegister,
    #[error("template name is already used")]
    DuplicateTemplateName,
    #[error("permission denied")]
    PermissionDenied,
    #[error(transparent)]
    Repository(RepositoryError),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::TemplateNotFound(_)
            | WorkflowError::DocumentNotFound(_)
            | WorkflowError::FieldNotFound(_)
            | WorkflowError::UserNotFound(_) => ErrorKind::NotFound,
            WorkflowError::FieldMismatch { .. } | WorkflowError::InvalidRequest(_) => {
                ErrorKind::Validation
            }
            WorkflowError::AlreadyVerified
            | WorkflowError::AlreadySigned
            | WorkflowError::NotVerifiedYet
            | WorkflowError::DuplicateRegister
            | WorkflowError::DuplicateTemplateName => ErrorKind::Conflict,
            WorkflowError::PermissionDenied => ErrorKind::PermissionDenied,
            WorkflowError::Repository(_) => ErrorKind::Unavailable,
        }
    }
}

impl From<RepositoryError> for WorkflowError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::FieldNotFound(id) => WorkflowError::FieldNotFound(id),
            RepositoryError::Duplicate(_) => WorkflowError::DuplicateRegister,
            other => WorkflowError::Repository(other),
        }
    }
}

impl From<TemplateError> for WorkflowError {
    fn from(err: TemplateError) -> Self {
        match err {
            TemplateError::NotFound(id) => WorkflowError::TemplateNotFound(id),
            TemplateError::DuplicateName(_) => WorkflowError::DuplicateTemplateName,
            TemplateError::Invalid(message) => WorkflowError::InvalidRequest(message),
            TemplateError::PermissionDenied => WorkflowError::PermissionDenied,
            TemplateError::Repository(e) => e.into(),
        }
    }
}

crate::error::impl_response_error!(WorkflowError);
