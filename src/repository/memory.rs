//! In-process store implementing every repository trait.
//!
//! All state sits behind one `RwLock`, so each trait call is a single atomic
//! step with the same conditional-update semantics as the Postgres store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use super::{DocumentRepository, RepositoryError, TemplateRepository, UserDirectory};
use crate::document::model::{
    BriefDocument, Document, DocumentField, DocumentState, FieldValue, NewDocument,
    RegisterAssignment, Stage, VerifyCommit,
};
use crate::template::model::{CreateTemplateRequest, Template, TemplateField, TemplateSummary};
use crate::user::UserProfile;

#[derive(Default)]
struct Inner {
    templates: BTreeMap<i64, Template>,
    next_template_id: i64,
    next_field_id: i64,
    documents: HashMap<Uuid, StoredDocument>,
    registers: BTreeMap<i64, String>,
    next_register_id: i64,
    users: HashMap<Uuid, UserProfile>,
}

struct StoredDocument {
    document: Document,
    deleted: bool,
}

impl Inner {
    fn live(&self, id: &Uuid) -> Option<&Document> {
        self.documents
            .get(id)
            .filter(|stored| !stored.deleted)
            .map(|stored| &stored.document)
    }

    fn live_mut(&mut self, id: &Uuid) -> Option<&mut Document> {
        self.documents
            .get_mut(id)
            .filter(|stored| !stored.deleted)
            .map(|stored| &mut stored.document)
    }

    fn field_key(&self, template_id: i64, field_id: i64) -> Option<String> {
        self.templates.get(&template_id).and_then(|template| {
            template
                .fields
                .iter()
                .find(|field| field.id == field_id)
                .map(|field| field.key.clone())
        })
    }

    fn register_in_use(&self, register_id: i64, except: Uuid) -> bool {
        self.documents.iter().any(|(id, stored)| {
            *id != except && !stored.deleted && stored.document.register_id == Some(register_id)
        })
    }

    /// Next counter value that is neither a register nor held by a live document.
    /// Verifiers may attach numbers issued elsewhere, so the counter can lag behind.
    fn next_free_register(&mut self, owner: Uuid) -> i64 {
        loop {
            self.next_register_id += 1;
            let candidate = self.next_register_id;
            if !self.registers.contains_key(&candidate)
                && !self.register_in_use(candidate, owner)
            {
                return candidate;
            }
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    #[cfg(test)]
    fail_register_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: UserProfile) {
        self.inner.write().users.insert(user.id, user);
    }

    fn create_register(
        &self,
        inner: &mut Inner,
        owner: Uuid,
        description: &str,
    ) -> Result<i64, RepositoryError> {
        #[cfg(test)]
        if self.fail_register_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "register table is not writable".to_string(),
            ));
        }
        let id = inner.next_free_register(owner);
        inner.registers.insert(id, description.to_string());
        Ok(id)
    }
}

#[cfg(test)]
impl MemoryStore {
    /// Make every register creation fail, to exercise rollback paths.
    pub fn fail_register_writes(&self, fail: bool) {
        self.fail_register_writes.store(fail, Ordering::SeqCst);
    }

    pub fn register_count(&self) -> usize {
        self.inner.read().registers.len()
    }

    pub fn register_description(&self, id: i64) -> Option<String> {
        self.inner.read().registers.get(&id).cloned()
    }
}

#[async_trait]
impl TemplateRepository for MemoryStore {
    async fn insert_template(
        &self,
        request: &CreateTemplateRequest,
        created_at: DateTime<Utc>,
    ) -> Result<Template, RepositoryError> {
        let mut inner = self.inner.write();
        if inner.templates.values().any(|t| t.name == request.name) {
            return Err(RepositoryError::Duplicate("templates_name_key".to_string()));
        }

        inner.next_template_id += 1;
        let template_id = inner.next_template_id;
        let mut fields = Vec::with_capacity(request.fields.len());
        for key in &request.fields {
            inner.next_field_id += 1;
            fields.push(TemplateField {
                id: inner.next_field_id,
                template_id,
                key: key.clone(),
            });
        }

        let template = Template {
            id: template_id,
            name: request.name.clone(),
            path: request.path.clone(),
            margin_top: request.margin_top,
            margin_bottom: request.margin_bottom,
            margin_left: request.margin_left,
            margin_right: request.margin_right,
            active: request.active,
            fields,
            created_at,
        };
        inner.templates.insert(template_id, template.clone());
        Ok(template)
    }

    async fn find_template(&self, id: i64) -> Result<Option<Template>, RepositoryError> {
        Ok(self.inner.read().templates.get(&id).cloned())
    }

    async fn list_templates(
        &self,
        active_only: bool,
    ) -> Result<Vec<TemplateSummary>, RepositoryError> {
        let inner = self.inner.read();
        let mut summaries: Vec<TemplateSummary> = inner
            .templates
            .values()
            .filter(|t| !active_only || t.active)
            .map(|t| TemplateSummary {
                id: t.id,
                name: t.name.clone(),
                active: t.active,
                field_count: t.fields.len() as i64,
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }
}

#[async_trait]
impl DocumentRepository for MemoryStore {
    async fn insert_document(&self, document: &NewDocument) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write();
        if inner.documents.contains_key(&document.id) {
            return Err(RepositoryError::Duplicate("documents_pkey".to_string()));
        }

        let mut fields = Vec::with_capacity(document.fields.len());
        for field in &document.fields {
            let key = inner
                .field_key(document.template_id, field.field_id)
                .ok_or(RepositoryError::FieldNotFound(field.field_id))?;
            fields.push(DocumentField {
                field_id: field.field_id,
                key,
                value: field.value.clone(),
            });
        }

        inner.documents.insert(
            document.id,
            StoredDocument {
                document: Document {
                    id: document.id,
                    register_id: None,
                    applicant_id: document.applicant_id,
                    template_id: document.template_id,
                    fields,
                    stage: Stage::Sent,
                    verifier_id: None,
                    verified_at: None,
                    signer_id: None,
                    signed_at: None,
                    description: document.description.clone(),
                    created_at: document.created_at,
                    updated_at: document.created_at,
                },
                deleted: false,
            },
        );
        Ok(())
    }

    async fn find_document(&self, id: Uuid) -> Result<Option<Document>, RepositoryError> {
        Ok(self.inner.read().live(&id).cloned())
    }

    async fn find_state(&self, id: Uuid) -> Result<Option<DocumentState>, RepositoryError> {
        Ok(self.inner.read().live(&id).map(|doc| DocumentState {
            id: doc.id,
            applicant_id: doc.applicant_id,
            template_id: doc.template_id,
            stage: doc.stage,
            register_id: doc.register_id,
            description: doc.description.clone(),
        }))
    }

    async fn list_briefs(
        &self,
        applicant: Option<Uuid>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<BriefDocument>, RepositoryError> {
        let inner = self.inner.read();
        let mut documents: Vec<&Document> = inner
            .documents
            .values()
            .filter(|stored| !stored.deleted)
            .map(|stored| &stored.document)
            .filter(|doc| applicant.map_or(true, |id| doc.applicant_id == id))
            .collect();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(documents
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|doc| BriefDocument {
                id: doc.id,
                register_id: doc.register_id,
                template_name: inner
                    .templates
                    .get(&doc.template_id)
                    .map(|t| t.name.clone())
                    .unwrap_or_default(),
                applicant_name: inner.users.get(&doc.applicant_id).map(|u| u.name.clone()),
                stage: doc.stage,
                description: doc.description.clone(),
                created_at: doc.created_at,
            })
            .collect())
    }

    async fn mark_verified(
        &self,
        id: Uuid,
        commit: &VerifyCommit,
    ) -> Result<i64, RepositoryError> {
        let mut inner = self.inner.write();
        let doc = inner.live(&id).ok_or(RepositoryError::NotFound)?;
        if !doc.stage.can_verify() {
            return Err(RepositoryError::StageConflict(doc.stage));
        }
        let description = if doc.description.trim().is_empty() {
            commit.description.clone()
        } else {
            doc.description.clone()
        };

        let register_id = match commit.register {
            RegisterAssignment::Existing(register_id) => {
                if inner.register_in_use(register_id, id) {
                    return Err(RepositoryError::Duplicate(
                        "documents_register_id_key".to_string(),
                    ));
                }
                register_id
            }
            RegisterAssignment::Create => self.create_register(&mut inner, id, &description)?,
        };

        let doc = inner.live_mut(&id).ok_or(RepositoryError::NotFound)?;
        doc.stage = Stage::Verified;
        doc.register_id = Some(register_id);
        doc.description = description;
        doc.verifier_id = Some(commit.verifier_id);
        doc.verified_at = Some(commit.verified_at);
        doc.updated_at = commit.verified_at;
        Ok(register_id)
    }

    async fn mark_signed(
        &self,
        id: Uuid,
        signer_id: Uuid,
        signed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write();
        let doc = inner.live_mut(&id).ok_or(RepositoryError::NotFound)?;
        if !doc.stage.can_sign() {
            return Err(RepositoryError::StageConflict(doc.stage));
        }
        doc.stage = Stage::Signed;
        doc.signer_id = Some(signer_id);
        doc.signed_at = Some(signed_at);
        doc.updated_at = signed_at;
        Ok(())
    }

    async fn update_description(
        &self,
        id: Uuid,
        description: &str,
    ) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write();
        let doc = inner.live_mut(&id).ok_or(RepositoryError::NotFound)?;
        if !doc.stage.can_mutate_fields() {
            return Err(RepositoryError::StageConflict(doc.stage));
        }
        doc.description = description.to_string();
        doc.updated_at = Utc::now();
        Ok(())
    }

    async fn update_fields(
        &self,
        id: Uuid,
        patches: &[FieldValue],
    ) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write();
        let doc = inner.live_mut(&id).ok_or(RepositoryError::NotFound)?;
        if !doc.stage.can_mutate_fields() {
            return Err(RepositoryError::StageConflict(doc.stage));
        }

        let present: HashSet<i64> = doc.fields.iter().map(|f| f.field_id).collect();
        if let Some(missing) = patches.iter().find(|p| !present.contains(&p.field_id)) {
            return Err(RepositoryError::FieldNotFound(missing.field_id));
        }

        for patch in patches {
            if let Some(field) = doc.fields.iter_mut().find(|f| f.field_id == patch.field_id) {
                field.value = patch.value.clone();
            }
        }
        doc.updated_at = Utc::now();
        Ok(())
    }

    async fn soft_delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write();
        let stored = inner
            .documents
            .get_mut(&id)
            .filter(|stored| !stored.deleted)
            .ok_or(RepositoryError::NotFound)?;
        if !stored.document.stage.can_delete() {
            return Err(RepositoryError::StageConflict(stored.document.stage));
        }
        stored.deleted = true;
        Ok(())
    }

    async fn add_register(&self, description: &str) -> Result<i64, RepositoryError> {
        let mut inner = self.inner.write();
        self.create_register(&mut inner, Uuid::nil(), description)
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<UserProfile>, RepositoryError> {
        Ok(self.inner.read().users.get(&id).cloned())
    }
}
