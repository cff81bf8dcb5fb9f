//! Document workflow engine.
//!
//! Enforces the stage machine `Sent -> Verified -> Signed`, the role and
//! ownership rules, and the field-set match between a document and its
//! template. The engine keeps no locks: every transition is re-checked by the
//! repository's conditional update, so a concurrent caller that loses the race
//! gets the same stage error it would have seen had it arrived second.

use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use super::error::WorkflowError;
use super::model::{
    BriefDocument, CreateDocumentRequest, Document, DocumentState, DocumentStatus, FieldValue,
    NewDocument, Pagination, RegisterAssignment, Stage, UpdateDocumentRequest,
    VerifyDocumentRequest, VerifyCommit,
};
use crate::auth::{Caller, Role};
use crate::metrics;
use crate::repository::{DocumentRepository, RepositoryError, UserDirectory};
use crate::template::{TemplateField, TemplateStore};

pub struct DocumentWorkflow {
    documents: Arc<dyn DocumentRepository>,
    templates: Arc<TemplateStore>,
    users: Arc<dyn UserDirectory>,
}

impl DocumentWorkflow {
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        templates: Arc<TemplateStore>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            documents,
            templates,
            users,
        }
    }

    /// Submit a filled document. The supplied field ids must equal the template's field ids.
    pub async fn create_document(
        &self,
        applicant_id: Uuid,
        request: CreateDocumentRequest,
    ) -> Result<Uuid, WorkflowError> {
        let result = self.create(applicant_id, request).await;
        track("create", &result);
        result
    }

    /// `Sent -> Verified`. Requires at least `Employee`.
    pub async fn verify_document(
        &self,
        caller: &Caller,
        id: Uuid,
        request: VerifyDocumentRequest,
    ) -> Result<(), WorkflowError> {
        let result = self.verify(caller, id, request).await;
        track("verify", &result);
        result
    }

    /// `Verified -> Signed`. Requires `Admin`.
    pub async fn sign_document(&self, caller: &Caller, id: Uuid) -> Result<(), WorkflowError> {
        let result = self.sign(caller, id).await;
        track("sign", &result);
        result
    }

    pub async fn delete_document(&self, caller: &Caller, id: Uuid) -> Result<(), WorkflowError> {
        let result = self.delete(caller, id).await;
        track("delete", &result);
        result
    }

    pub async fn update_document(
        &self,
        caller: &Caller,
        id: Uuid,
        patch: UpdateDocumentRequest,
    ) -> Result<(), WorkflowError> {
        let result = self.update(caller, id, patch).await;
        track("update", &result);
        result
    }

    pub async fn update_document_fields(
        &self,
        caller: &Caller,
        id: Uuid,
        patches: Vec<FieldValue>,
    ) -> Result<(), WorkflowError> {
        let result = self.update_fields(caller, id, patches).await;
        track("update_fields", &result);
        result
    }

    /// Newest first. Applicants only see their own documents; an empty page is not an error.
    pub async fn get_brief_documents(
        &self,
        caller: &Caller,
        pagination: Pagination,
    ) -> Result<Vec<BriefDocument>, WorkflowError> {
        let pagination = pagination.normalized();
        let applicant = (caller.role == Role::Applicant).then_some(caller.id);
        Ok(self
            .documents
            .list_briefs(applicant, pagination.offset(), pagination.limit)
            .await?)
    }

    pub async fn get_document(&self, caller: &Caller, id: Uuid) -> Result<Document, WorkflowError> {
        let document = self
            .documents
            .find_document(id)
            .await?
            .ok_or(WorkflowError::DocumentNotFound(id))?;
        if !caller.may_access(document.applicant_id) {
            log::warn!("user {} denied access to document {}", caller.id, id);
            return Err(WorkflowError::PermissionDenied);
        }
        Ok(document)
    }

    /// Public verification view reached through the QR code.
    pub async fn get_document_status(&self, id: Uuid) -> Result<DocumentStatus, WorkflowError> {
        let document = self
            .documents
            .find_document(id)
            .await?
            .ok_or(WorkflowError::DocumentNotFound(id))?;
        let template = self.templates.get_template_detail(document.template_id).await?;
        let signer_name = match document.signer_id {
            Some(signer_id) => self.users.find_user(signer_id).await?.map(|u| u.name),
            None => None,
        };

        Ok(DocumentStatus {
            id: document.id,
            register_id: document.register_id,
            template_name: template.name.clone(),
            stage: document.stage,
            verified_at: document.verified_at,
            signed_at: document.signed_at,
            signer_name,
        })
    }

    async fn create(
        &self,
        applicant_id: Uuid,
        request: CreateDocumentRequest,
    ) -> Result<Uuid, WorkflowError> {
        let template = self.templates.get_template_detail(request.template_id).await?;
        if !template.active {
            return Err(WorkflowError::TemplateNotFound(template.id));
        }
        let required = self.templates.get_template_fields(template.id).await?;
        check_field_set(&required, &request.fields)?;

        let document = NewDocument {
            id: Uuid::new_v4(),
            applicant_id,
            template_id: template.id,
            fields: request.fields,
            description: request.description.unwrap_or_default().trim().to_string(),
            created_at: Utc::now(),
        };
        self.documents.insert_document(&document).await?;

        log::info!(
            "Document {} created by {} from template '{}'",
            document.id,
            applicant_id,
            template.name
        );
        Ok(document.id)
    }

    async fn verify(
        &self,
        caller: &Caller,
        id: Uuid,
        request: VerifyDocumentRequest,
    ) -> Result<(), WorkflowError> {
        require_role(caller, Role::Employee, "verify", id)?;

        let state = self.load_state(id).await?;
        if !state.stage.can_verify() {
            log::warn!("Document {} is already {}, verify rejected", id, state.stage);
            return Err(WorkflowError::AlreadyVerified);
        }

        let description = self.resolve_description(&state, request.description).await?;
        let commit = VerifyCommit {
            verifier_id: caller.id,
            verified_at: Utc::now(),
            description,
            register: resolve_register(state.register_id, request.register_id),
        };

        let register_id = self
            .documents
            .mark_verified(id, &commit)
            .await
            .map_err(|e| transition_error(e, id, |_| WorkflowError::AlreadyVerified))?;

        log::info!(
            "Document {} verified by {} with register {}",
            id,
            caller.id,
            register_id
        );
        Ok(())
    }

    async fn sign(&self, caller: &Caller, id: Uuid) -> Result<(), WorkflowError> {
        require_role(caller, Role::Admin, "sign", id)?;

        let state = self.load_state(id).await?;
        if !state.stage.can_sign() {
            log::warn!("Document {} is {}, sign rejected", id, state.stage);
            return Err(sign_conflict(state.stage));
        }

        self.documents
            .mark_signed(id, caller.id, Utc::now())
            .await
            .map_err(|e| transition_error(e, id, sign_conflict))?;

        log::info!("Document {} signed by {}", id, caller.id);
        Ok(())
    }

    async fn delete(&self, caller: &Caller, id: Uuid) -> Result<(), WorkflowError> {
        let state = self.load_owned_state(caller, id).await?;
        if !state.stage.can_delete() {
            return Err(WorkflowError::AlreadySigned);
        }

        self.documents
            .soft_delete(id)
            .await
            .map_err(|e| transition_error(e, id, |_| WorkflowError::AlreadySigned))?;

        log::info!("Document {} deleted by {}", id, caller.id);
        Ok(())
    }

    async fn update(
        &self,
        caller: &Caller,
        id: Uuid,
        patch: UpdateDocumentRequest,
    ) -> Result<(), WorkflowError> {
        let state = self.load_owned_state(caller, id).await?;
        if !state.stage.can_mutate_fields() {
            return Err(mutation_conflict(state.stage));
        }

        if let Some(description) = patch.description {
            self.documents
                .update_description(id, description.trim())
                .await
                .map_err(|e| transition_error(e, id, mutation_conflict))?;
            log::info!("Document {} updated by {}", id, caller.id);
        }
        Ok(())
    }

    async fn update_fields(
        &self,
        caller: &Caller,
        id: Uuid,
        patches: Vec<FieldValue>,
    ) -> Result<(), WorkflowError> {
        if patches.is_empty() {
            return Err(WorkflowError::InvalidRequest(
                "at least one field patch is required".to_string(),
            ));
        }

        let state = self.load_owned_state(caller, id).await?;
        if !state.stage.can_mutate_fields() {
            return Err(mutation_conflict(state.stage));
        }

        self.documents
            .update_fields(id, &patches)
            .await
            .map_err(|e| transition_error(e, id, mutation_conflict))?;

        log::info!(
            "Document {}: {} field(s) updated by {}",
            id,
            patches.len(),
            caller.id
        );
        Ok(())
    }

    async fn load_state(&self, id: Uuid) -> Result<DocumentState, WorkflowError> {
        self.documents
            .find_state(id)
            .await?
            .ok_or(WorkflowError::DocumentNotFound(id))
    }

    async fn load_owned_state(
        &self,
        caller: &Caller,
        id: Uuid,
    ) -> Result<DocumentState, WorkflowError> {
        let state = self.load_state(id).await?;
        if !caller.may_access(state.applicant_id) {
            log::warn!("user {} is not the applicant of document {}", caller.id, id);
            return Err(WorkflowError::PermissionDenied);
        }
        Ok(state)
    }

    /// Existing description, else the caller's override, else "{template} a.n {applicant}".
    async fn resolve_description(
        &self,
        state: &DocumentState,
        requested: Option<String>,
    ) -> Result<String, WorkflowError> {
        if !state.description.trim().is_empty() {
            return Ok(state.description.clone());
        }
        if let Some(description) = requested.map(|d| d.trim().to_string()) {
            if !description.is_empty() {
                return Ok(description);
            }
        }

        let template = self.templates.get_template_detail(state.template_id).await?;
        let applicant = self
            .users
            .find_user(state.applicant_id)
            .await?
            .ok_or(WorkflowError::UserNotFound(state.applicant_id))?;
        Ok(format!("{} a.n {}", template.name, applicant.name))
    }
}

fn require_role(caller: &Caller, required: Role, action: &str, id: Uuid) -> Result<(), WorkflowError> {
    if caller.role.at_least(required) {
        return Ok(());
    }
    log::warn!(
        "user {} with role {} may not {} document {}",
        caller.id,
        caller.role,
        action,
        id
    );
    Err(WorkflowError::PermissionDenied)
}

/// Exact set equality between required and supplied field ids; duplicates count as unexpected.
pub fn check_field_set(
    required: &[TemplateField],
    supplied: &[FieldValue],
) -> Result<(), WorkflowError> {
    let required_ids: BTreeSet<i64> = required.iter().map(|f| f.id).collect();
    let mut supplied_ids = BTreeSet::new();
    let mut duplicates = Vec::new();
    for field in supplied {
        if !supplied_ids.insert(field.field_id) {
            duplicates.push(field.field_id);
        }
    }

    let missing: Vec<i64> = required_ids.difference(&supplied_ids).copied().collect();
    let mut unexpected: Vec<i64> = supplied_ids.difference(&required_ids).copied().collect();
    unexpected.extend(duplicates);

    if missing.is_empty() && unexpected.is_empty() {
        Ok(())
    } else {
        Err(WorkflowError::FieldMismatch {
            missing,
            unexpected,
        })
    }
}

/// A register already on the document wins, then a non-zero override, else a new register.
pub fn resolve_register(existing: Option<i64>, requested: Option<i64>) -> RegisterAssignment {
    match (existing, requested) {
        (Some(id), _) => RegisterAssignment::Existing(id),
        (None, Some(id)) if id != 0 => RegisterAssignment::Existing(id),
        _ => RegisterAssignment::Create,
    }
}

fn sign_conflict(stage: Stage) -> WorkflowError {
    match stage {
        Stage::Sent => WorkflowError::NotVerifiedYet,
        _ => WorkflowError::AlreadySigned,
    }
}

fn mutation_conflict(stage: Stage) -> WorkflowError {
    match stage {
        Stage::Signed => WorkflowError::AlreadySigned,
        _ => WorkflowError::AlreadyVerified,
    }
}

fn transition_error(
    err: RepositoryError,
    id: Uuid,
    on_conflict: impl FnOnce(Stage) -> WorkflowError,
) -> WorkflowError {
    match err {
        RepositoryError::NotFound => WorkflowError::DocumentNotFound(id),
        RepositoryError::StageConflict(stage) => {
            log::warn!("Document {} moved to {} concurrently", id, stage);
            on_conflict(stage)
        }
        other => other.into(),
    }
}

fn track<T>(operation: &str, result: &Result<T, WorkflowError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.kind().label(),
    };
    metrics::record_transition(operation, outcome);
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
