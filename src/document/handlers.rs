use actix_web::{web, Error, HttpRequest, HttpResponse};
use uuid::Uuid;

use crate::auth::caller_from_request;
use crate::document::model::{
    BriefDocument, CreateDocumentRequest, CreateDocumentResponse, Document, DocumentStatus,
    Pagination, UpdateDocumentRequest, UpdateFieldsRequest, VerifyDocumentRequest,
};
use crate::render::RenderError;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/documents",
    tag = "Documents",
    params(
        ("page" = Option<i64>, Query, description = "1-indexed page number, defaults to 1"),
        ("limit" = Option<i64>, Query, description = "Page size, defaults to 20, at most 100")
    ),
    responses(
        (status = 200, description = "Documents visible to the caller, newest first", body = Vec<BriefDocument>),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_documents(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<Pagination>,
) -> Result<HttpResponse, Error> {
    let caller = caller_from_request(&req)?;
    let documents = state
        .workflow
        .get_brief_documents(&caller, query.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(documents))
}

#[utoipa::path(
    post,
    path = "/api/documents",
    tag = "Documents",
    request_body = CreateDocumentRequest,
    responses(
        (status = 201, description = "Document submitted", body = CreateDocumentResponse),
        (status = 400, description = "Fields do not match the template", body = crate::ErrorResponse),
        (status = 404, description = "Template not found", body = crate::ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_document(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<CreateDocumentRequest>,
) -> Result<HttpResponse, Error> {
    let caller = caller_from_request(&req)?;
    let id = state
        .workflow
        .create_document(caller.id, body.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(CreateDocumentResponse { id }))
}

#[utoipa::path(
    get,
    path = "/api/documents/{id}",
    tag = "Documents",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Document with its fields", body = Document),
        (status = 403, description = "Not the caller's document", body = crate::ErrorResponse),
        (status = 404, description = "Document not found", body = crate::ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_document(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, Error> {
    let caller = caller_from_request(&req)?;
    let document = state
        .workflow
        .get_document(&caller, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(document))
}

#[utoipa::path(
    patch,
    path = "/api/documents/{id}",
    tag = "Documents",
    params(("id" = Uuid, Path, description = "Document ID")),
    request_body = UpdateDocumentRequest,
    responses(
        (status = 204, description = "Document updated"),
        (status = 409, description = "Document is no longer editable", body = crate::ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_document(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateDocumentRequest>,
) -> Result<HttpResponse, Error> {
    let caller = caller_from_request(&req)?;
    state
        .workflow
        .update_document(&caller, path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    put,
    path = "/api/documents/{id}/fields",
    tag = "Documents",
    params(("id" = Uuid, Path, description = "Document ID")),
    request_body = UpdateFieldsRequest,
    responses(
        (status = 204, description = "Fields updated"),
        (status = 404, description = "Document or field not found", body = crate::ErrorResponse),
        (status = 409, description = "Document is no longer editable", body = crate::ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_document_fields(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateFieldsRequest>,
) -> Result<HttpResponse, Error> {
    let caller = caller_from_request(&req)?;
    state
        .workflow
        .update_document_fields(&caller, path.into_inner(), body.into_inner().fields)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    delete,
    path = "/api/documents/{id}",
    tag = "Documents",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 204, description = "Document deleted"),
        (status = 409, description = "Signed documents cannot be deleted", body = crate::ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_document(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, Error> {
    let caller = caller_from_request(&req)?;
    state
        .workflow
        .delete_document(&caller, path.into_inner())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/api/documents/{id}/verify",
    tag = "Documents",
    params(("id" = Uuid, Path, description = "Document ID")),
    request_body = VerifyDocumentRequest,
    responses(
        (status = 204, description = "Document verified"),
        (status = 403, description = "Employee role required", body = crate::ErrorResponse),
        (status = 409, description = "Already verified, or register already in use", body = crate::ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn verify_document(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: Option<web::Json<VerifyDocumentRequest>>,
) -> Result<HttpResponse, Error> {
    let caller = caller_from_request(&req)?;
    let request = body.map(web::Json::into_inner).unwrap_or_default();
    state
        .workflow
        .verify_document(&caller, path.into_inner(), request)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/api/documents/{id}/sign",
    tag = "Documents",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 204, description = "Document signed"),
        (status = 403, description = "Admin role required", body = crate::ErrorResponse),
        (status = 409, description = "Not verified yet, or already signed", body = crate::ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn sign_document(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, Error> {
    let caller = caller_from_request(&req)?;
    state
        .workflow
        .sign_document(&caller, path.into_inner())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    get,
    path = "/api/documents/{id}/pdf",
    tag = "Documents",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Rendered PDF", content_type = "application/pdf"),
        (status = 403, description = "Not the caller's document", body = crate::ErrorResponse),
        (status = 404, description = "Document or layout not found", body = crate::ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_document_pdf(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, Error> {
    let caller = caller_from_request(&req)?;
    let id = path.into_inner();
    let document = state
        .workflow
        .get_document(&caller, id)
        .await
        .map_err(RenderError::from)?;
    let pdf = state.renderer.render_document(&document).await?;

    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header((
            "Content-Disposition",
            format!("inline; filename=\"document-{}.pdf\"", id),
        ))
        .body(pdf))
}

#[utoipa::path(
    get,
    path = "/api/documents/{id}/status",
    tag = "Documents",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Public verification status", body = DocumentStatus),
        (status = 404, description = "Document not found", body = crate::ErrorResponse)
    )
)]
pub async fn get_document_status(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, Error> {
    let status = state
        .workflow
        .get_document_status(path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(status))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/documents")
            .route(web::get().to(list_documents))
            .route(web::post().to(create_document)),
    )
    .service(
        web::resource("/documents/{id}")
            .route(web::get().to(get_document))
            .route(web::patch().to(update_document))
            .route(web::delete().to(delete_document)),
    )
    .service(
        web::resource("/documents/{id}/fields").route(web::put().to(update_document_fields)),
    )
    .service(web::resource("/documents/{id}/verify").route(web::post().to(verify_document)))
    .service(web::resource("/documents/{id}/sign").route(web::post().to(sign_document)))
    .service(web::resource("/documents/{id}/pdf").route(web::get().to(get_document_pdf)))
    .service(web::resource("/documents/{id}/status").route(web::get().to(get_document_status)));
}
