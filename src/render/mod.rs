//! Rendering pipeline: document -> field map -> HTML -> PDF.
//!
//! - `field_map` - merges document fields with register, signature, footer and date
//! - `html` - `{{ key }}` / `{{{ key }}}` substitution into layout bodies
//! - `qr` - status URL and QR data URI for the footer
//! - `source` - where layout bodies come from (disk, Supabase storage, memory)
//! - `pdf` - HTML to PDF rasterization through `wkhtmltopdf`
//! - `pipeline` - `DocumentRenderer`, which orchestrates the above

pub mod field_map;
pub mod html;
pub mod pdf;
pub mod pipeline;
pub mod qr;
pub mod source;

pub use field_map::FieldMap;
pub use pdf::{PdfRasterizer, WkhtmltopdfRasterizer};
pub use pipeline::{DocumentRenderer, RenderSettings};
pub use source::{FsLayoutSource, InMemoryLayoutSource, LayoutSource, SupabaseLayoutSource};

use thiserror::Error;
use uuid::Uuid;

use crate::document::WorkflowError;
use crate::error::ErrorKind;
use crate::repository::RepositoryError;
use crate::template::TemplateError;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("document {0} not found")]
    DocumentNotFound(Uuid),
    #[error("signer {0} not found")]
    SignerNotFound(Uuid),
    #[error("document {0} is signed but has no signer")]
    MissingSigner(Uuid),
    #[error("layout '{0}' not found")]
    LayoutNotFound(String),
    #[error("failed to load layout '{path}': {reason}")]
    LayoutIo { path: String, reason: String },
    #[error("failed to encode QR code: {0}")]
    QrCode(#[from] qrcode::types::QrError),
    #[error("failed to create temporary directory: {0}")]
    TempDir(#[source] std::io::Error),
    #[error("failed to write HTML source: {0}")]
    WriteHtml(#[source] std::io::Error),
    #[error("wkhtmltopdf execution failed: {0}")]
    RasterizerIo(#[source] std::io::Error),
    #[error("wkhtmltopdf exited with status {0}")]
    RasterizerExit(i32),
    #[error("failed to read generated PDF: {0}")]
    ReadPdf(#[source] std::io::Error),
    #[error("rasterizer produced an empty PDF")]
    EmptyPdf,
    #[error("render task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl RenderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RenderError::DocumentNotFound(_)
            | RenderError::SignerNotFound(_)
            | RenderError::LayoutNotFound(_) => ErrorKind::NotFound,
            RenderError::Template(e) => e.kind(),
            RenderError::Workflow(e) => e.kind(),
            _ => ErrorKind::Unavailable,
        }
    }
}

crate::error::impl_response_error!(RenderError);
