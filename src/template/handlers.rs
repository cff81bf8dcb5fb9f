use actix_web::{web, Error, HttpRequest, HttpResponse};

use crate::auth::caller_from_request;
use crate::template::model::{
    CreateTemplateRequest, ListTemplatesQuery, Template, TemplateSummary,
};
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/templates",
    tag = "Templates",
    params(("active_only" = Option<bool>, Query, description = "Only list active templates")),
    responses(
        (status = 200, description = "Templates ordered by name", body = Vec<TemplateSummary>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_templates(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<ListTemplatesQuery>,
) -> Result<HttpResponse, Error> {
    caller_from_request(&req)?;
    let templates = state.templates.list_templates(query.active_only).await?;
    Ok(HttpResponse::Ok().json(templates))
}

#[utoipa::path(
    post,
    path = "/api/templates",
    tag = "Templates",
    request_body = CreateTemplateRequest,
    responses(
        (status = 201, description = "Template created", body = Template),
        (status = 400, description = "Invalid template", body = crate::ErrorResponse),
        (status = 403, description = "Admin role required", body = crate::ErrorResponse),
        (status = 409, description = "Template name already used", body = crate::ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_template(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<CreateTemplateRequest>,
) -> Result<HttpResponse, Error> {
    let caller = caller_from_request(&req)?;
    let template = state
        .templates
        .create_template(&caller, body.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(template))
}

#[utoipa::path(
    get,
    path = "/api/templates/{id}",
    tag = "Templates",
    params(("id" = i64, Path, description = "Template ID")),
    responses(
        (status = 200, description = "Template with its fields", body = Template),
        (status = 404, description = "Template not found", body = crate::ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_template(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, Error> {
    caller_from_request(&req)?;
    let template = state.templates.get_template_detail(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(template.as_ref()))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/templates")
            .route(web::get().to(list_templates))
            .route(web::post().to(create_template)),
    )
    .service(web::resource("/templates/{id}").route(web::get().to(get_template)));
}
