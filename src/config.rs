//! Startup configuration read from the environment (and `.env`, when present).

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::render::RenderSettings;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value '{value}' for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
    pub bucket: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_address: String,
    pub port: u16,
    pub layout_dir: PathBuf,
    /// Layouts come from Supabase storage when set, otherwise from `layout_dir`.
    pub supabase: Option<SupabaseConfig>,
    pub render: RenderSettings,
    pub wkhtmltopdf_path: PathBuf,
    pub pdf_dpi: u32,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env`, reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let render_defaults = RenderSettings::default();

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let supabase = match (get("SUPABASE_URL"), get("SUPABASE_ANON_KEY"), get("BUCKET_NAME")) {
            (Some(url), Some(anon_key), Some(bucket)) => Some(SupabaseConfig {
                url,
                anon_key,
                bucket,
            }),
            _ => None,
        };

        let cors_origins = get("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173,http://localhost:3000".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Self {
            database_url,
            bind_address: get("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&get, "PORT", 8080)?,
            layout_dir: get("LAYOUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./static/layouts")),
            supabase,
            render: RenderSettings {
                status_base_url: get("STATUS_BASE_URL").unwrap_or(render_defaults.status_base_url),
                signature_layout: get("SIGNATURE_LAYOUT")
                    .unwrap_or(render_defaults.signature_layout),
                footer_layout: get("FOOTER_LAYOUT").unwrap_or(render_defaults.footer_layout),
            },
            wkhtmltopdf_path: get("WKHTMLTOPDF_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("wkhtmltopdf")),
            pdf_dpi: parse_or(&get, "PDF_DPI", crate::render::pdf::DEFAULT_DPI)?,
            cors_origins,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}
