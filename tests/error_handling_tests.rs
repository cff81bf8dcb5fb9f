use actix_web::body::to_bytes;
use actix_web::http::StatusCode;
use actix_web::ResponseError;
use uuid::Uuid;

use document_approval_server::document::model::Stage;
use document_approval_server::document::WorkflowError;
use document_approval_server::error::ErrorKind;
use document_approval_server::render::RenderError;
use document_approval_server::repository::RepositoryError;
use document_approval_server::template::TemplateError;
use document_approval_server::ErrorResponse;

async fn body_of(err: &dyn ResponseError) -> ErrorResponse {
    let bytes = to_bytes(err.error_response().into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[test]
fn test_workflow_error_kinds() {
    let id = Uuid::new_v4();
    let cases = [
        (WorkflowError::DocumentNotFound(id), ErrorKind::NotFound),
        (WorkflowError::TemplateNotFound(3), ErrorKind::NotFound),
        (WorkflowError::FieldNotFound(9), ErrorKind::NotFound),
        (WorkflowError::InvalidRequest("empty".into()), ErrorKind::Validation),
        (WorkflowError::AlreadyVerified, ErrorKind::Conflict),
        (WorkflowError::AlreadySigned, ErrorKind::Conflict),
        (WorkflowError::NotVerifiedYet, ErrorKind::Conflict),
        (WorkflowError::DuplicateRegister, ErrorKind::Conflict),
        (WorkflowError::PermissionDenied, ErrorKind::PermissionDenied),
    ];
    for (err, kind) in cases {
        assert_eq!(err.kind(), kind, "{err}");
        assert_eq!(err.status_code(), kind.status_code());
    }
}

#[test]
fn test_repository_errors_fold_into_workflow_errors() {
    assert!(matches!(
        WorkflowError::from(RepositoryError::FieldNotFound(4)),
        WorkflowError::FieldNotFound(4)
    ));
    assert!(matches!(
        WorkflowError::from(RepositoryError::Duplicate("documents_register_id_key".into())),
        WorkflowError::DuplicateRegister
    ));
    let backend = WorkflowError::from(RepositoryError::Unavailable("pool timed out".into()));
    assert_eq!(backend.kind(), ErrorKind::Unavailable);
    let conflict = WorkflowError::from(RepositoryError::StageConflict(Stage::Signed));
    assert_eq!(conflict.kind(), ErrorKind::Unavailable);
}

#[test]
fn test_template_error_kinds() {
    assert_eq!(TemplateError::NotFound(1).kind(), ErrorKind::NotFound);
    assert_eq!(
        TemplateError::DuplicateName("Surat".into()).kind(),
        ErrorKind::Conflict
    );
    assert_eq!(TemplateError::Invalid("x".into()).kind(), ErrorKind::Validation);
    assert_eq!(TemplateError::PermissionDenied.kind(), ErrorKind::PermissionDenied);
}

#[test]
fn test_render_error_kinds() {
    let id = Uuid::new_v4();
    assert_eq!(RenderError::DocumentNotFound(id).kind(), ErrorKind::NotFound);
    assert_eq!(RenderError::SignerNotFound(id).kind(), ErrorKind::NotFound);
    assert_eq!(
        RenderError::LayoutNotFound("surat.html".into()).kind(),
        ErrorKind::NotFound
    );
    assert_eq!(RenderError::MissingSigner(id).kind(), ErrorKind::Unavailable);
    assert_eq!(RenderError::RasterizerExit(1).kind(), ErrorKind::Unavailable);
    assert_eq!(RenderError::EmptyPdf.kind(), ErrorKind::Unavailable);
    assert_eq!(
        RenderError::from(WorkflowError::PermissionDenied).kind(),
        ErrorKind::PermissionDenied
    );
    assert_eq!(
        RenderError::from(TemplateError::NotFound(2)).kind(),
        ErrorKind::NotFound
    );
}

#[actix_web::test]
async fn test_client_errors_carry_their_message() {
    let err = WorkflowError::NotVerifiedYet;
    let body = body_of(&err).await;
    assert_eq!(body.error, "Conflict");
    assert_eq!(body.message, "document has not been verified yet");
    assert!(!body.timestamp.is_empty());

    let err = WorkflowError::PermissionDenied;
    assert_eq!(err.error_response().status(), StatusCode::FORBIDDEN);
    assert_eq!(body_of(&err).await.error, "Forbidden");
}

#[actix_web::test]
async fn test_backend_errors_hide_details() {
    let err = RenderError::RasterizerExit(139);
    let response = err.error_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_of(&err).await;
    assert_eq!(body.error, "InternalServerError");
    assert!(!body.message.contains("139"));

    let err = WorkflowError::from(RepositoryError::Unavailable("10.0.0.3 refused".into()));
    let body = body_of(&err).await;
    assert!(!body.message.contains("10.0.0.3"));
}
