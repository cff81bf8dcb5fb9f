#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

use document_approval_server::auth::{generate_access_token, Caller, Role};
use document_approval_server::document::model::{CreateDocumentRequest, FieldValue};
use document_approval_server::render::{
    InMemoryLayoutSource, PdfRasterizer, RenderError, RenderSettings,
};
use document_approval_server::repository::MemoryStore;
use document_approval_server::template::model::{CreateTemplateRequest, Margins, Template};
use document_approval_server::user::UserProfile;
use document_approval_server::AppState;

pub const STATUS_BASE_URL: &str = "https://kelurahan.example/api/documents/";

pub const LETTER_LAYOUT: &str = "<html><body>\
<h1>Surat Keterangan Domisili</h1>\
<p>Nomor: {{ register }}</p>\
<p>Nama: {{ nama }}</p>\
<p>Alamat: {{ alamat }}</p>\
<p>Tanggal: {{ signedDate }}</p>\
<div id=\"signature\">{{{ signature }}}</div>\
<div id=\"footer\">{{{ footer }}}</div>\
</body></html>";

pub const SIGNATURE_LAYOUT: &str =
    "<div class=\"sig\">{{ position }} {{ name }} NIP {{ employeeNumber }} {{ signedDate }}</div>";

pub const FOOTER_LAYOUT: &str =
    "<div class=\"qr\"><img src=\"{{ qrCode }}\"/><a href=\"{{ statusUrl }}\">{{ register }}</a></div>";

/// Returns a fake PDF that embeds the HTML it was given.
#[derive(Default)]
pub struct RecordingRasterizer {
    calls: Mutex<Vec<(String, Margins)>>,
}

impl RecordingRasterizer {
    pub fn calls(&self) -> Vec<(String, Margins)> {
        self.calls.lock().clone()
    }

    pub fn last_html(&self) -> Option<String> {
        self.calls.lock().last().map(|(html, _)| html.clone())
    }
}

impl PdfRasterizer for RecordingRasterizer {
    fn rasterize(&self, html: &str, margins: Margins) -> Result<Vec<u8>, RenderError> {
        self.calls.lock().push((html.to_string(), margins));
        Ok(format!("%PDF-1.4\n{}", html).into_bytes())
    }
}

pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub layouts: Arc<InMemoryLayoutSource>,
    pub rasterizer: Arc<RecordingRasterizer>,
    pub state: AppState,
    pub applicant: UserProfile,
    pub employee: UserProfile,
    pub admin: UserProfile,
    pub template: Template,
}

impl TestContext {
    pub fn caller(user: &UserProfile) -> Caller {
        Caller::new(user.id, user.role)
    }

    pub fn field_values(&self, nama: &str, alamat: &str) -> Vec<FieldValue> {
        vec![
            FieldValue {
                field_id: self.template.fields[0].id,
                value: nama.to_string(),
            },
            FieldValue {
                field_id: self.template.fields[1].id,
                value: alamat.to_string(),
            },
        ]
    }

    pub fn create_request(&self) -> CreateDocumentRequest {
        CreateDocumentRequest {
            template_id: self.template.id,
            fields: self.field_values("Budi Santoso", "Jl. Raya Cakung No. 1"),
            description: None,
        }
    }

    pub async fn submit(&self) -> Uuid {
        self.state
            .workflow
            .create_document(self.applicant.id, self.create_request())
            .await
            .expect("document created")
    }
}

pub fn render_settings() -> RenderSettings {
    RenderSettings {
        status_base_url: STATUS_BASE_URL.to_string(),
        signature_layout: "signature.html".to_string(),
        footer_layout: "footer.html".to_string(),
    }
}

pub fn template_request() -> CreateTemplateRequest {
    CreateTemplateRequest {
        name: "Surat Keterangan Domisili".to_string(),
        path: "domisili.html".to_string(),
        margin_top: 20.0,
        margin_bottom: 15.0,
        margin_left: 25.0,
        margin_right: 20.0,
        active: true,
        fields: vec!["nama".to_string(), "alamat".to_string()],
    }
}

/// Seeded store: one user per role, one two-field template and its layouts.
pub async fn setup() -> TestContext {
    let store = Arc::new(MemoryStore::new());

    let applicant = UserProfile::new(Uuid::new_v4(), "Budi Santoso", Role::Applicant);
    let employee = UserProfile::new(Uuid::new_v4(), "Rina Wulandari", Role::Employee);
    let mut admin = UserProfile::new(Uuid::new_v4(), "Ahmad Fauzi", Role::Admin);
    admin.position = Some("Lurah Cakung Barat".to_string());
    admin.employee_number = Some("197001011990031001".to_string());
    admin.signature_image = Some("data:image/png;base64,AAAA".to_string());
    for user in [&applicant, &employee, &admin] {
        store.insert_user(user.clone());
    }

    let layouts = Arc::new(
        InMemoryLayoutSource::new()
            .with_layout("domisili.html", LETTER_LAYOUT)
            .with_layout("signature.html", SIGNATURE_LAYOUT)
            .with_layout("footer.html", FOOTER_LAYOUT),
    );
    let rasterizer = Arc::new(RecordingRasterizer::default());

    let state = AppState::in_memory(
        store.clone(),
        layouts.clone(),
        rasterizer.clone(),
        render_settings(),
    );

    let template = state
        .templates
        .create_template(&TestContext::caller(&admin), template_request())
        .await
        .expect("template created");

    TestContext {
        store,
        layouts,
        rasterizer,
        state,
        applicant,
        employee,
        admin,
        template,
    }
}

pub fn bearer(user: &UserProfile) -> (String, String) {
    let token = generate_access_token(&user.id.to_string(), &user.name, user.role)
        .expect("token generated");
    ("Authorization".to_string(), format!("Bearer {}", token))
}
