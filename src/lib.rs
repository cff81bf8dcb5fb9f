use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpResponse, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use anyhow::Context;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod config;
pub mod db;
pub mod document;
pub mod error;
pub mod metrics;
pub mod render;
pub mod repository;
pub mod state;
pub mod template;
pub mod user;

pub use crate::error::ErrorResponse;
pub use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::template::handlers::list_templates,
        crate::template::handlers::create_template,
        crate::template::handlers::get_template,
        crate::document::handlers::list_documents,
        crate::document::handlers::create_document,
        crate::document::handlers::get_document,
        crate::document::handlers::update_document,
        crate::document::handlers::update_document_fields,
        crate::document::handlers::delete_document,
        crate::document::handlers::verify_document,
        crate::document::handlers::sign_document,
        crate::document::handlers::get_document_pdf,
        crate::document::handlers::get_document_status
    ),
    components(
        schemas(
            template::model::Template,
            template::model::TemplateField,
            template::model::TemplateSummary,
            template::model::CreateTemplateRequest,
            document::model::Document,
            document::model::DocumentField,
            document::model::BriefDocument,
            document::model::DocumentStatus,
            document::model::FieldValue,
            document::model::CreateDocumentRequest,
            document::model::CreateDocumentResponse,
            document::model::VerifyDocumentRequest,
            document::model::UpdateDocumentRequest,
            document::model::UpdateFieldsRequest,
            ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Templates", description = "Document template endpoints."),
        (name = "Documents", description = "Document submission, approval and rendering endpoints.")
    ),
    servers(
        (url = "http://127.0.0.1:8080", description = "Localhost server")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

async fn workflow_metrics() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(metrics::export())
}

/// API routes plus the workflow metrics endpoint. Shared by `run` and the HTTP tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .configure(template::handlers::config)
            .configure(document::handlers::config),
    )
    .service(web::resource("/metrics/workflow").route(web::get().to(workflow_metrics)));
}

pub async fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = config::AppConfig::from_env()?;
    let app_state = web::Data::new(AppState::new_with_config(&config).await?);

    let prometheus = PrometheusMetricsBuilder::new("document_approval_server")
        .endpoint("/metrics")
        .build()
        .map_err(|e| anyhow::anyhow!("failed to create Prometheus metrics middleware: {}", e))?;

    let bind_address = config.bind_address.clone();
    let port = config.port;
    let cors_origins = config.cors_origins.clone();

    log::info!("Starting server at http://{}:{}", bind_address, port);

    HttpServer::new(move || {
        let cors = cors_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::ACCEPT,
                header::CONTENT_TYPE,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Compress::default())
            .wrap(prometheus.clone())
            .wrap(cors)
            .app_data(app_state.clone())
            .configure(configure)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind((bind_address.as_str(), port))
    .with_context(|| format!("failed to bind {}:{}", bind_address, port))?
    .run()
    .await?;

    Ok(())
}
