use super::*;
use crate::document::model::{RegisterAssignment, MAX_PAGE_LIMIT};
use crate::repository::MemoryStore;
use crate::template::model::CreateTemplateRequest;
use crate::user::UserProfile;

struct Fixture {
    store: Arc<MemoryStore>,
    workflow: DocumentWorkflow,
    template_id: i64,
    field_ids: Vec<i64>,
    applicant: Caller,
    employee: Caller,
    admin: Caller,
}

async fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let templates = Arc::new(TemplateStore::new(store.clone()));

    let admin = Caller::new(Uuid::new_v4(), Role::Admin);
    let employee = Caller::new(Uuid::new_v4(), Role::Employee);
    let applicant = Caller::new(Uuid::new_v4(), Role::Applicant);
    store.insert_user(UserProfile::new(applicant.id, "Budi Santoso", Role::Applicant));
    store.insert_user(UserProfile::new(employee.id, "Rina", Role::Employee));
    store.insert_user(UserProfile::new(admin.id, "Lurah Cakung", Role::Admin));

    let template = templates
        .create_template(
            &admin,
            CreateTemplateRequest {
                name: "Surat Keterangan Domisili".to_string(),
                path: "domisili.html".to_string(),
                margin_top: 10.0,
                margin_bottom: 10.0,
                margin_left: 20.0,
                margin_right: 20.0,
                active: true,
                fields: vec!["nama".to_string(), "alamat".to_string()],
            },
        )
        .await
        .unwrap();

    let workflow = DocumentWorkflow::new(store.clone(), templates, store.clone());
    Fixture {
        field_ids: template.fields.iter().map(|f| f.id).collect(),
        template_id: template.id,
        store,
        workflow,
        applicant,
        employee,
        admin,
    }
}

impl Fixture {
    fn request(&self) -> CreateDocumentRequest {
        CreateDocumentRequest {
            template_id: self.template_id,
            fields: vec![
                FieldValue {
                    field_id: self.field_ids[0],
                    value: "Budi Santoso".to_string(),
                },
                FieldValue {
                    field_id: self.field_ids[1],
                    value: "Jl. Raya Cakung No. 1".to_string(),
                },
            ],
            description: None,
        }
    }

    async fn create(&self) -> Uuid {
        self.workflow
            .create_document(self.applicant.id, self.request())
            .await
            .unwrap()
    }

    async fn stage(&self, id: Uuid) -> Stage {
        self.store.find_state(id).await.unwrap().unwrap().stage
    }
}

#[tokio::test]
async fn test_create_document_starts_in_sent() {
    let fx = fixture().await;
    let id = fx.create().await;

    let document = fx.store.find_document(id).await.unwrap().unwrap();
    assert_eq!(document.stage, Stage::Sent);
    assert_eq!(document.applicant_id, fx.applicant.id);
    assert_eq!(document.fields.len(), 2);
    assert_eq!(document.fields[0].key, "nama");
    assert!(document.register_id.is_none());
}

#[tokio::test]
async fn test_create_with_subset_fails() {
    let fx = fixture().await;
    let mut request = fx.request();
    request.fields.pop();

    let err = fx
        .workflow
        .create_document(fx.applicant.id, request)
        .await
        .unwrap_err();
    match err {
        WorkflowError::FieldMismatch {
            missing,
            unexpected,
        } => {
            assert_eq!(missing, vec![fx.field_ids[1]]);
            assert!(unexpected.is_empty());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_create_with_superset_fails() {
    let fx = fixture().await;
    let mut request = fx.request();
    request.fields.push(FieldValue {
        field_id: 9999,
        value: "extra".to_string(),
    });

    let err = fx
        .workflow
        .create_document(fx.applicant.id, request)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::FieldMismatch { .. }));
}

#[tokio::test]
async fn test_create_with_no_fields_fails() {
    let fx = fixture().await;
    let mut request = fx.request();
    request.fields.clear();

    let err = fx
        .workflow
        .create_document(fx.applicant.id, request)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::FieldMismatch { .. }));
}

#[tokio::test]
async fn test_create_with_unknown_template_fails() {
    let fx = fixture().await;
    let mut request = fx.request();
    request.template_id = 404;

    let err = fx
        .workflow
        .create_document(fx.applicant.id, request)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::TemplateNotFound(404)));
}

#[tokio::test]
async fn test_verify_requires_employee() {
    let fx = fixture().await;
    let id = fx.create().await;

    let err = fx
        .workflow
        .verify_document(&fx.applicant, id, VerifyDocumentRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::PermissionDenied));
    assert_eq!(fx.stage(id).await, Stage::Sent);
}

#[tokio::test]
async fn test_verify_generates_description_and_register() {
    let fx = fixture().await;
    let id = fx.create().await;

    fx.workflow
        .verify_document(&fx.employee, id, VerifyDocumentRequest::default())
        .await
        .unwrap();

    let document = fx.store.find_document(id).await.unwrap().unwrap();
    assert_eq!(document.stage, Stage::Verified);
    assert_eq!(document.verifier_id, Some(fx.employee.id));
    assert!(document.verified_at.is_some());
    assert_eq!(
        document.description,
        "Surat Keterangan Domisili a.n Budi Santoso"
    );

    let register_id = document.register_id.expect("register assigned");
    assert_eq!(fx.store.register_count(), 1);
    assert_eq!(
        fx.store.register_description(register_id).as_deref(),
        Some("Surat Keterangan Domisili a.n Budi Santoso")
    );
}

#[tokio::test]
async fn test_verify_with_explicit_register_keeps_it() {
    let fx = fixture().await;
    let id = fx.create().await;

    fx.workflow
        .verify_document(
            &fx.employee,
            id,
            VerifyDocumentRequest {
                description: Some("Domisili untuk bank".to_string()),
                register_id: Some(470),
            },
        )
        .await
        .unwrap();

    let document = fx.store.find_document(id).await.unwrap().unwrap();
    assert_eq!(document.register_id, Some(470));
    assert_eq!(document.description, "Domisili untuk bank");
    assert_eq!(fx.store.register_count(), 0);
}

#[tokio::test]
async fn test_existing_description_wins_over_override() {
    let fx = fixture().await;
    let mut request = fx.request();
    request.description = Some("Untuk keperluan KPR".to_string());
    let id = fx
        .workflow
        .create_document(fx.applicant.id, request)
        .await
        .unwrap();

    fx.workflow
        .verify_document(
            &fx.employee,
            id,
            VerifyDocumentRequest {
                description: Some("ignored".to_string()),
                register_id: None,
            },
        )
        .await
        .unwrap();

    let document = fx.store.find_document(id).await.unwrap().unwrap();
    assert_eq!(document.description, "Untuk keperluan KPR");
}

#[tokio::test]
async fn test_second_verify_fails() {
    let fx = fixture().await;
    let id = fx.create().await;

    fx.workflow
        .verify_document(&fx.employee, id, VerifyDocumentRequest::default())
        .await
        .unwrap();
    let err = fx
        .workflow
        .verify_document(&fx.admin, id, VerifyDocumentRequest::default())
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::AlreadyVerified));
    assert_eq!(fx.store.register_count(), 1);
}

#[tokio::test]
async fn test_register_failure_leaves_document_untouched() {
    let fx = fixture().await;
    let id = fx.create().await;
    fx.store.fail_register_writes(true);

    let err = fx
        .workflow
        .verify_document(&fx.employee, id, VerifyDocumentRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Repository(_)));

    let document = fx.store.find_document(id).await.unwrap().unwrap();
    assert_eq!(document.stage, Stage::Sent);
    assert!(document.register_id.is_none());
    assert!(document.verifier_id.is_none());
    assert_eq!(fx.store.register_count(), 0);
}

#[tokio::test]
async fn test_register_used_by_another_document_is_conflict() {
    let fx = fixture().await;
    let first = fx.create().await;
    let second = fx.create().await;
    let explicit = VerifyDocumentRequest {
        description: None,
        register_id: Some(12),
    };

    fx.workflow
        .verify_document(&fx.employee, first, explicit)
        .await
        .unwrap();
    let err = fx
        .workflow
        .verify_document(
            &fx.employee,
            second,
            VerifyDocumentRequest {
                description: None,
                register_id: Some(12),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::DuplicateRegister));
    assert_eq!(fx.stage(second).await, Stage::Sent);
}

#[tokio::test]
async fn test_sign_stage_rules() {
    let fx = fixture().await;
    let id = fx.create().await;

    let err = fx.workflow.sign_document(&fx.admin, id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::NotVerifiedYet));

    fx.workflow
        .verify_document(&fx.employee, id, VerifyDocumentRequest::default())
        .await
        .unwrap();

    let err = fx.workflow.sign_document(&fx.employee, id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::PermissionDenied));

    fx.workflow.sign_document(&fx.admin, id).await.unwrap();
    let document = fx.store.find_document(id).await.unwrap().unwrap();
    assert_eq!(document.stage, Stage::Signed);
    assert_eq!(document.signer_id, Some(fx.admin.id));
    assert!(document.signed_at.is_some());

    let err = fx.workflow.sign_document(&fx.admin, id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::AlreadySigned));

    let err = fx
        .workflow
        .verify_document(&fx.employee, id, VerifyDocumentRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::AlreadyVerified));
}

#[tokio::test]
async fn test_concurrent_verify_only_one_wins() {
    let fx = fixture().await;
    let id = fx.create().await;

    let (a, b) = tokio::join!(
        fx.workflow
            .verify_document(&fx.employee, id, VerifyDocumentRequest::default()),
        fx.workflow
            .verify_document(&fx.admin, id, VerifyDocumentRequest::default()),
    );

    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(WorkflowError::AlreadyVerified))));
    assert_eq!(fx.store.register_count(), 1);
}

#[tokio::test]
async fn test_delete_rules() {
    let fx = fixture().await;
    let id = fx.create().await;
    let stranger = Caller::new(Uuid::new_v4(), Role::Applicant);

    let err = fx.workflow.delete_document(&stranger, id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::PermissionDenied));

    fx.workflow.delete_document(&fx.applicant, id).await.unwrap();
    assert!(fx.store.find_document(id).await.unwrap().is_none());

    let err = fx.workflow.delete_document(&fx.applicant, id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::DocumentNotFound(_)));
}

#[tokio::test]
async fn test_signed_document_cannot_be_deleted() {
    let fx = fixture().await;
    let id = fx.create().await;
    fx.workflow
        .verify_document(&fx.employee, id, VerifyDocumentRequest::default())
        .await
        .unwrap();
    fx.workflow.sign_document(&fx.admin, id).await.unwrap();

    let err = fx.workflow.delete_document(&fx.admin, id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::AlreadySigned));
    assert!(fx.store.find_document(id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_verified_document_can_still_be_deleted_by_staff() {
    let fx = fixture().await;
    let id = fx.create().await;
    fx.workflow
        .verify_document(&fx.employee, id, VerifyDocumentRequest::default())
        .await
        .unwrap();

    fx.workflow.delete_document(&fx.employee, id).await.unwrap();
    assert!(fx.store.find_document(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_fields_only_while_sent() {
    let fx = fixture().await;
    let id = fx.create().await;
    let patch = vec![FieldValue {
        field_id: fx.field_ids[1],
        value: "Jl. Baru No. 2".to_string(),
    }];

    fx.workflow
        .update_document_fields(&fx.applicant, id, patch.clone())
        .await
        .unwrap();
    let document = fx.store.find_document(id).await.unwrap().unwrap();
    assert_eq!(document.fields[1].value, "Jl. Baru No. 2");

    fx.workflow
        .verify_document(&fx.employee, id, VerifyDocumentRequest::default())
        .await
        .unwrap();
    let err = fx
        .workflow
        .update_document_fields(&fx.applicant, id, patch.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::AlreadyVerified));

    fx.workflow.sign_document(&fx.admin, id).await.unwrap();
    let err = fx
        .workflow
        .update_document_fields(&fx.admin, id, patch)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::AlreadySigned));
}

#[tokio::test]
async fn test_update_unknown_field_rolls_back() {
    let fx = fixture().await;
    let id = fx.create().await;

    let err = fx
        .workflow
        .update_document_fields(
            &fx.applicant,
            id,
            vec![
                FieldValue {
                    field_id: fx.field_ids[0],
                    value: "Changed".to_string(),
                },
                FieldValue {
                    field_id: 777,
                    value: "nope".to_string(),
                },
            ],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::FieldNotFound(777)));

    let document = fx.store.find_document(id).await.unwrap().unwrap();
    assert_eq!(document.fields[0].value, "Budi Santoso");
}

#[tokio::test]
async fn test_update_rejects_foreign_applicant_and_empty_patch() {
    let fx = fixture().await;
    let id = fx.create().await;
    let stranger = Caller::new(Uuid::new_v4(), Role::Applicant);

    let err = fx
        .workflow
        .update_document(
            &stranger,
            id,
            UpdateDocumentRequest {
                description: Some("hijack".to_string()),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::PermissionDenied));

    let err = fx
        .workflow
        .update_document_fields(&fx.applicant, id, Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_update_description() {
    let fx = fixture().await;
    let id = fx.create().await;

    fx.workflow
        .update_document(
            &fx.employee,
            id,
            UpdateDocumentRequest {
                description: Some("  Keperluan sekolah ".to_string()),
            },
        )
        .await
        .unwrap();

    let document = fx.store.find_document(id).await.unwrap().unwrap();
    assert_eq!(document.description, "Keperluan sekolah");
}

#[tokio::test]
async fn test_brief_documents_scoped_by_role() {
    let fx = fixture().await;
    let other = Caller::new(Uuid::new_v4(), Role::Applicant);
    let mine = fx.create().await;
    fx.workflow
        .create_document(other.id, fx.request())
        .await
        .unwrap();

    let own = fx
        .workflow
        .get_brief_documents(&fx.applicant, Pagination::new(1, 10))
        .await
        .unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].id, mine);
    assert_eq!(own[0].template_name, "Surat Keterangan Domisili");
    assert_eq!(own[0].applicant_name.as_deref(), Some("Budi Santoso"));

    let all = fx
        .workflow
        .get_brief_documents(&fx.employee, Pagination::new(1, 10))
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    assert!(all[0].created_at >= all[1].created_at);

    let empty_page = fx
        .workflow
        .get_brief_documents(&fx.employee, Pagination::new(5, 10))
        .await
        .unwrap();
    assert!(empty_page.is_empty());
}

#[tokio::test]
async fn test_get_document_ownership() {
    let fx = fixture().await;
    let id = fx.create().await;
    let stranger = Caller::new(Uuid::new_v4(), Role::Applicant);

    assert!(fx.workflow.get_document(&fx.applicant, id).await.is_ok());
    assert!(fx.workflow.get_document(&fx.employee, id).await.is_ok());
    let err = fx.workflow.get_document(&stranger, id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::PermissionDenied));
}

#[tokio::test]
async fn test_document_status_reports_signer() {
    let fx = fixture().await;
    let id = fx.create().await;
    fx.workflow
        .verify_document(&fx.employee, id, VerifyDocumentRequest::default())
        .await
        .unwrap();
    fx.workflow.sign_document(&fx.admin, id).await.unwrap();

    let status = fx.workflow.get_document_status(id).await.unwrap();
    assert_eq!(status.stage, Stage::Signed);
    assert_eq!(status.signer_name.as_deref(), Some("Lurah Cakung"));
    assert!(status.register_id.is_some());
}

#[test]
fn test_resolve_register() {
    assert_eq!(resolve_register(Some(5), Some(9)), RegisterAssignment::Existing(5));
    assert_eq!(resolve_register(None, Some(9)), RegisterAssignment::Existing(9));
    assert_eq!(resolve_register(None, Some(0)), RegisterAssignment::Create);
    assert_eq!(resolve_register(None, None), RegisterAssignment::Create);
}

#[test]
fn test_check_field_set_rejects_duplicates() {
    let required = vec![
        TemplateField {
            id: 1,
            template_id: 1,
            key: "a".to_string(),
        },
        TemplateField {
            id: 2,
            template_id: 1,
            key: "b".to_string(),
        },
    ];
    let supplied = vec![
        FieldValue {
            field_id: 1,
            value: "x".to_string(),
        },
        FieldValue {
            field_id: 2,
            value: "y".to_string(),
        },
        FieldValue {
            field_id: 2,
            value: "z".to_string(),
        },
    ];

    assert!(check_field_set(&required, &supplied[..2]).is_ok());
    assert!(matches!(
        check_field_set(&required, &supplied),
        Err(WorkflowError::FieldMismatch { .. })
    ));
}

#[tokio::test]
async fn test_auto_register_skips_number_attached_by_hand() {
    let fx = fixture().await;
    let first = fx.create().await;
    let second = fx.create().await;

    fx.workflow
        .verify_document(
            &fx.employee,
            first,
            VerifyDocumentRequest {
                description: None,
                register_id: Some(1),
            },
        )
        .await
        .unwrap();
    fx.workflow
        .verify_document(&fx.employee, second, VerifyDocumentRequest::default())
        .await
        .unwrap();

    let first = fx.store.find_document(first).await.unwrap().unwrap();
    let second = fx.store.find_document(second).await.unwrap().unwrap();
    assert_eq!(first.register_id, Some(1));
    assert_eq!(second.register_id, Some(2));
    assert_eq!(fx.store.register_count(), 1);
}

#[tokio::test]
async fn test_add_register_skips_attached_numbers() {
    let fx = fixture().await;
    let id = fx.create().await;
    fx.workflow
        .verify_document(
            &fx.employee,
            id,
            VerifyDocumentRequest {
                description: None,
                register_id: Some(1),
            },
        )
        .await
        .unwrap();

    let register_id = fx.store.add_register("Buku register manual").await.unwrap();
    assert_eq!(register_id, 2);
    assert_eq!(
        fx.store.register_description(2).as_deref(),
        Some("Buku register manual")
    );
}

#[tokio::test]
async fn test_verify_keeps_description_written_after_it_was_read() {
    let fx = fixture().await;
    let id = fx.create().await;

    // Resolved by the engine while the description was still empty.
    let commit = VerifyCommit {
        verifier_id: fx.employee.id,
        verified_at: Utc::now(),
        description: "Surat Keterangan Domisili a.n Budi Santoso".to_string(),
        register: RegisterAssignment::Create,
    };
    // The applicant sets one before the verify commits.
    fx.store
        .update_description(id, "Untuk pendaftaran sekolah")
        .await
        .unwrap();
    let register_id = fx.store.mark_verified(id, &commit).await.unwrap();

    let document = fx.store.find_document(id).await.unwrap().unwrap();
    assert_eq!(document.stage, Stage::Verified);
    assert_eq!(document.description, "Untuk pendaftaran sekolah");
    assert_eq!(
        fx.store.register_description(register_id).as_deref(),
        Some("Untuk pendaftaran sekolah")
    );
}

#[tokio::test]
async fn test_page_far_past_the_end_is_empty() {
    let fx = fixture().await;
    fx.create().await;

    let page = fx
        .workflow
        .get_brief_documents(&fx.employee, Pagination::new(i64::MAX, MAX_PAGE_LIMIT))
        .await
        .unwrap();
    assert!(page.is_empty());
}
