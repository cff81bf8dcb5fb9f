//! Template store: validated creation plus cached, read-only lookups.

use chrono::Utc;
use moka::future::Cache;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::model::{CreateTemplateRequest, Template, TemplateField, TemplateSummary};
use crate::auth::{Caller, Role};
use crate::error::ErrorKind;
use crate::repository::{RepositoryError, TemplateRepository};

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template {0} not found")]
    NotFound(i64),
    #[error("template name '{0}' is already used")]
    DuplicateName(String),
    #[error("invalid template: {0}")]
    Invalid(String),
    #[error("only admins may manage templates")]
    PermissionDenied,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl TemplateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TemplateError::NotFound(_) => ErrorKind::NotFound,
            TemplateError::DuplicateName(_) => ErrorKind::Conflict,
            TemplateError::Invalid(_) => ErrorKind::Validation,
            TemplateError::PermissionDenied => ErrorKind::PermissionDenied,
            TemplateError::Repository(_) => ErrorKind::Unavailable,
        }
    }
}

crate::error::impl_response_error!(TemplateError);

pub struct TemplateStore {
    repo: Arc<dyn TemplateRepository>,
    cache: Cache<i64, Arc<Template>>,
}

impl TemplateStore {
    pub fn new(repo: Arc<dyn TemplateRepository>) -> Self {
        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(10 * 60))
            .max_capacity(200)
            .build();
        Self { repo, cache }
    }

    pub async fn create_template(
        &self,
        caller: &Caller,
        request: CreateTemplateRequest,
    ) -> Result<Template, TemplateError> {
        if !caller.role.at_least(Role::Admin) {
            log::warn!("user {} ({}) tried to create a template", caller.id, caller.role);
            return Err(TemplateError::PermissionDenied);
        }
        validate_template(&request)?;

        match self.repo.insert_template(&request, Utc::now()).await {
            Ok(template) => {
                log::info!(
                    "Template '{}' created with {} fields",
                    template.name,
                    template.fields.len()
                );
                Ok(template)
            }
            Err(RepositoryError::Duplicate(_)) => Err(TemplateError::DuplicateName(request.name)),
            Err(e) => Err(e.into()),
        }
    }

    /// Template with its fields. Templates are never mutated, so entries stay valid until they expire.
    pub async fn get_template_detail(&self, id: i64) -> Result<Arc<Template>, TemplateError> {
        if let Some(template) = self.cache.get(&id).await {
            log::debug!("Template {} served from cache", id);
            return Ok(template);
        }

        let template = self
            .repo
            .find_template(id)
            .await?
            .map(Arc::new)
            .ok_or(TemplateError::NotFound(id))?;
        self.cache.insert(id, template.clone()).await;
        Ok(template)
    }

    /// The fields a document for this template must fill. A template without fields is unusable.
    pub async fn get_template_fields(&self, id: i64) -> Result<Vec<TemplateField>, TemplateError> {
        let template = self.get_template_detail(id).await?;
        if template.fields.is_empty() {
            return Err(TemplateError::NotFound(id));
        }
        Ok(template.fields.clone())
    }

    pub async fn list_templates(
        &self,
        active_only: bool,
    ) -> Result<Vec<TemplateSummary>, TemplateError> {
        Ok(self.repo.list_templates(active_only).await?)
    }
}

fn validate_template(request: &CreateTemplateRequest) -> Result<(), TemplateError> {
    if request.name.trim().is_empty() {
        return Err(TemplateError::Invalid("name must not be empty".to_string()));
    }
    if request.path.trim().is_empty() {
        return Err(TemplateError::Invalid("layout path must not be empty".to_string()));
    }

    let margins = [
        ("margin_top", request.margin_top),
        ("margin_bottom", request.margin_bottom),
        ("margin_left", request.margin_left),
        ("margin_right", request.margin_right),
    ];
    for (name, value) in margins {
        if !value.is_finite() || value < 0.0 {
            return Err(TemplateError::Invalid(format!(
                "{} must be a non-negative number",
                name
            )));
        }
    }

    if request.fields.is_empty() {
        return Err(TemplateError::Invalid(
            "a template needs at least one field".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for key in &request.fields {
        if key.trim().is_empty() {
            return Err(TemplateError::Invalid("field keys must not be empty".to_string()));
        }
        if !seen.insert(key.as_str()) {
            return Err(TemplateError::Invalid(format!("duplicate field key '{}'", key)));
        }
    }
    Ok(())
}
