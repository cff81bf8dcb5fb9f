use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::db::PgStore;
use crate::document::DocumentWorkflow;
use crate::render::{
    DocumentRenderer, FsLayoutSource, LayoutSource, PdfRasterizer, RenderSettings,
    SupabaseLayoutSource, WkhtmltopdfRasterizer,
};
use crate::repository::{DocumentRepository, MemoryStore, TemplateRepository, UserDirectory};
use crate::template::TemplateStore;

/// Everything the handlers need, shared across workers.
#[derive(Clone)]
pub struct AppState {
    pub templates: Arc<TemplateStore>,
    pub workflow: Arc<DocumentWorkflow>,
    pub renderer: Arc<DocumentRenderer>,
}

impl AppState {
    pub async fn new_with_config(config: &AppConfig) -> anyhow::Result<Self> {
        let store = Arc::new(
            PgStore::connect(&config.database_url)
                .await
                .context("failed to connect to the database, check DATABASE_URL")?,
        );

        let layouts: Arc<dyn LayoutSource> = match &config.supabase {
            Some(supabase) => {
                let http_client = reqwest::Client::builder()
                    .pool_idle_timeout(Duration::from_secs(900))
                    .user_agent("document-approval-server/1.0")
                    .build()
                    .context("failed to create HTTP client")?;
                log::info!("Loading layouts from Supabase bucket '{}'", supabase.bucket);
                Arc::new(SupabaseLayoutSource::new(
                    http_client,
                    supabase.url.clone(),
                    supabase.bucket.clone(),
                    supabase.anon_key.clone(),
                ))
            }
            None => {
                log::info!("Loading layouts from {}", config.layout_dir.display());
                Arc::new(FsLayoutSource::new(config.layout_dir.clone()))
            }
        };

        let rasterizer = Arc::new(WkhtmltopdfRasterizer::new(
            config.wkhtmltopdf_path.clone(),
            config.pdf_dpi,
        ));

        Ok(Self::from_components(
            store.clone(),
            store.clone(),
            store,
            layouts,
            rasterizer,
            config.render.clone(),
        ))
    }

    pub fn from_components(
        templates: Arc<dyn TemplateRepository>,
        documents: Arc<dyn DocumentRepository>,
        users: Arc<dyn UserDirectory>,
        layouts: Arc<dyn LayoutSource>,
        rasterizer: Arc<dyn PdfRasterizer>,
        settings: RenderSettings,
    ) -> Self {
        let templates = Arc::new(TemplateStore::new(templates));
        let workflow = Arc::new(DocumentWorkflow::new(
            documents.clone(),
            templates.clone(),
            users.clone(),
        ));
        let renderer = Arc::new(DocumentRenderer::new(
            documents,
            templates.clone(),
            users,
            layouts,
            rasterizer,
            settings,
        ));
        Self {
            templates,
            workflow,
            renderer,
        }
    }

    /// State backed entirely by one `MemoryStore`.
    pub fn in_memory(
        store: Arc<MemoryStore>,
        layouts: Arc<dyn LayoutSource>,
        rasterizer: Arc<dyn PdfRasterizer>,
        settings: RenderSettings,
    ) -> Self {
        Self::from_components(
            store.clone(),
            store.clone(),
            store,
            layouts,
            rasterizer,
            settings,
        )
    }
}
