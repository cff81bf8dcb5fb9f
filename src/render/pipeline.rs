//! `DocumentRenderer`: fetch document -> field map -> HTML -> PDF.

use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use super::field_map::{self, FieldMap, FOOTER_KEY, SIGNATURE_KEY, SIGNED_DATE_KEY};
use super::html::fill_layout;
use super::pdf::PdfRasterizer;
use super::qr;
use super::source::LayoutSource;
use super::RenderError;
use crate::document::model::Document;
use crate::metrics;
use crate::repository::{DocumentRepository, UserDirectory};
use crate::template::model::{Margins, Template};
use crate::template::TemplateStore;

#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Prefix of the status URL encoded in the QR code
    pub status_base_url: String,
    pub signature_layout: String,
    pub footer_layout: String,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            status_base_url: "http://127.0.0.1:8080/api/documents/".to_string(),
            signature_layout: "signature.html".to_string(),
            footer_layout: "footer.html".to_string(),
        }
    }
}

pub struct DocumentRenderer {
    documents: Arc<dyn DocumentRepository>,
    templates: Arc<TemplateStore>,
    users: Arc<dyn UserDirectory>,
    layouts: Arc<dyn LayoutSource>,
    rasterizer: Arc<dyn PdfRasterizer>,
    settings: RenderSettings,
}

impl DocumentRenderer {
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        templates: Arc<TemplateStore>,
        users: Arc<dyn UserDirectory>,
        layouts: Arc<dyn LayoutSource>,
        rasterizer: Arc<dyn PdfRasterizer>,
        settings: RenderSettings,
    ) -> Self {
        Self {
            documents,
            templates,
            users,
            layouts,
            rasterizer,
            settings,
        }
    }

    /// Field values plus `register`; signed documents also get `signature`, `footer` and `signedDate`.
    pub async fn build_field_map(&self, document: &Document) -> Result<FieldMap, RenderError> {
        let mut map = field_map::base_field_map(document);

        let Some(signed_at) = document.signed_at else {
            field_map::mark_unsigned(&mut map);
            return Ok(map);
        };

        let signed_date = field_map::format_signed_date(signed_at);
        let signature = self.render_signature(document, &signed_date).await?;
        let footer = self.render_footer(document).await?;

        map.insert(SIGNATURE_KEY.to_string(), signature);
        map.insert(FOOTER_KEY.to_string(), footer);
        map.insert(SIGNED_DATE_KEY.to_string(), signed_date);
        Ok(map)
    }

    pub async fn render_html(
        &self,
        template: &Template,
        fields: &FieldMap,
    ) -> Result<String, RenderError> {
        let layout = self.layouts.load(&template.path).await?;
        Ok(fill_layout(&layout, fields))
    }

    /// Rasterizes on the blocking pool; failures are returned as-is.
    pub async fn render_pdf(&self, html: String, margins: Margins) -> Result<Vec<u8>, RenderError> {
        let rasterizer = self.rasterizer.clone();
        let started = Instant::now();
        let pdf = tokio::task::spawn_blocking(move || rasterizer.rasterize(&html, margins)).await??;
        metrics::observe_pdf_render(started.elapsed().as_secs_f64());
        Ok(pdf)
    }

    /// Render an already loaded (and access-checked) document.
    pub async fn render_document(&self, document: &Document) -> Result<Vec<u8>, RenderError> {
        let fields = self.build_field_map(document).await?;
        let template = self.templates.get_template_detail(document.template_id).await?;
        let html = self.render_html(&template, &fields).await?;
        let pdf = self.render_pdf(html, template.margins()).await?;

        log::info!(
            "Rendered document {} ({} bytes, stage {})",
            document.id,
            pdf.len(),
            document.stage
        );
        Ok(pdf)
    }

    pub async fn generate_pdf_document(&self, id: Uuid) -> Result<Vec<u8>, RenderError> {
        let document = self
            .documents
            .find_document(id)
            .await?
            .ok_or(RenderError::DocumentNotFound(id))?;
        self.render_document(&document).await
    }

    async fn render_signature(
        &self,
        document: &Document,
        signed_date: &str,
    ) -> Result<String, RenderError> {
        let signer_id = document
            .signer_id
            .ok_or(RenderError::MissingSigner(document.id))?;
        let signer = self
            .users
            .find_user(signer_id)
            .await?
            .ok_or(RenderError::SignerNotFound(signer_id))?;

        let layout = self.layouts.load(&self.settings.signature_layout).await?;
        Ok(fill_layout(
            &layout,
            &field_map::signature_fields(&signer, signed_date),
        ))
    }

    async fn render_footer(&self, document: &Document) -> Result<String, RenderError> {
        let status_url = qr::status_url(&self.settings.status_base_url, document.id);
        let qr_code = qr::qr_data_uri(&status_url)?;

        let layout = self.layouts.load(&self.settings.footer_layout).await?;
        Ok(fill_layout(
            &layout,
            &field_map::footer_fields(document, qr_code, status_url),
        ))
    }
}
