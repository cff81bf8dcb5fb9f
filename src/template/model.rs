use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A named field a template requires; documents fill it by `id`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, ToSchema)]
pub struct TemplateField {
    #[schema(example = 12)]
    pub id: i64,
    #[schema(example = 1)]
    pub template_id: i64,
    #[schema(example = "nama")]
    pub key: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct Template {
    #[schema(example = 1)]
    pub id: i64,
    #[schema(example = "Surat Keterangan Domisili")]
    pub name: String,
    /// Layout path resolved through the configured layout source
    #[schema(example = "surat_keterangan_domisili.html")]
    pub path: String,
    pub margin_top: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
    pub margin_right: f64,
    pub active: bool,
    pub fields: Vec<TemplateField>,
    pub created_at: DateTime<Utc>,
}

impl Template {
    pub fn margins(&self) -> Margins {
        Margins {
            top: self.margin_top,
            bottom: self.margin_bottom,
            left: self.margin_left,
            right: self.margin_right,
        }
    }
}

/// Print margins in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Margins {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct TemplateSummary {
    pub id: i64,
    pub name: String,
    pub active: bool,
    pub field_count: i64,
}

#[derive(Debug, Deserialize, Clone, ToSchema)]
pub struct CreateTemplateRequest {
    #[schema(example = "Surat Keterangan Domisili")]
    pub name: String,
    #[schema(example = "surat_keterangan_domisili.html")]
    pub path: String,
    #[serde(default)]
    pub margin_top: f64,
    #[serde(default)]
    pub margin_bottom: f64,
    #[serde(default)]
    pub margin_left: f64,
    #[serde(default)]
    pub margin_right: f64,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Field keys in display order
    pub fields: Vec<String>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ListTemplatesQuery {
    #[serde(default)]
    pub active_only: bool,
}
