//! Layout bodies by path.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use super::RenderError;

#[async_trait]
pub trait LayoutSource: Send + Sync {
    async fn load(&self, path: &str) -> Result<String, RenderError>;
}

/// Only plain relative paths are accepted.
fn is_safe_relative(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

pub struct FsLayoutSource {
    root: PathBuf,
}

impl FsLayoutSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl LayoutSource for FsLayoutSource {
    async fn load(&self, path: &str) -> Result<String, RenderError> {
        if !is_safe_relative(path) {
            log::warn!("Rejected layout path '{}'", path);
            return Err(RenderError::LayoutNotFound(path.to_string()));
        }

        match tokio::fs::read_to_string(self.root.join(path)).await {
            Ok(body) => Ok(body),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RenderError::LayoutNotFound(path.to_string()))
            }
            Err(e) => Err(RenderError::LayoutIo {
                path: path.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Layouts stored as public objects in a Supabase storage bucket.
pub struct SupabaseLayoutSource {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    anon_key: String,
}

impl SupabaseLayoutSource {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        bucket: impl Into<String>,
        anon_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            bucket: bucket.into(),
            anon_key: anon_key.into(),
        }
    }

    pub fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.bucket,
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl LayoutSource for SupabaseLayoutSource {
    async fn load(&self, path: &str) -> Result<String, RenderError> {
        if !is_safe_relative(path) {
            return Err(RenderError::LayoutNotFound(path.to_string()));
        }

        let url = self.object_url(path);
        let io_error = |reason: String| RenderError::LayoutIo {
            path: path.to_string(),
            reason,
        };

        let response = self
            .client
            .get(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .send()
            .await
            .map_err(|e| io_error(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::BAD_REQUEST {
            return Err(RenderError::LayoutNotFound(path.to_string()));
        }
        if !status.is_success() {
            log::error!("Layout fetch from {} failed with {}", url, status);
            return Err(io_error(format!("storage responded with {}", status)));
        }

        response.text().await.map_err(|e| io_error(e.to_string()))
    }
}

/// Layouts held in memory, keyed by path.
#[derive(Default)]
pub struct InMemoryLayoutSource {
    layouts: RwLock<HashMap<String, String>>,
}

impl InMemoryLayoutSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layout(self, path: impl Into<String>, body: impl Into<String>) -> Self {
        self.insert(path, body);
        self
    }

    pub fn insert(&self, path: impl Into<String>, body: impl Into<String>) {
        self.layouts.write().insert(path.into(), body.into());
    }
}

#[async_trait]
impl LayoutSource for InMemoryLayoutSource {
    async fn load(&self, path: &str) -> Result<String, RenderError> {
        self.layouts
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| RenderError::LayoutNotFound(path.to_string()))
    }
}
