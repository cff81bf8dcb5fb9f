//! Key -> value dictionaries fed into layouts.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::document::model::Document;
use crate::user::UserProfile;

pub type FieldMap = BTreeMap<String, String>;

pub const SIGNED_DATE_FORMAT: &str = "%d %B %Y";

pub const REGISTER_KEY: &str = "register";
pub const SIGNATURE_KEY: &str = "signature";
pub const FOOTER_KEY: &str = "footer";
pub const SIGNED_DATE_KEY: &str = "signedDate";

/// Field values by template key, plus `register`.
pub fn base_field_map(document: &Document) -> FieldMap {
    let mut map: FieldMap = document
        .fields
        .iter()
        .map(|field| (field.key.clone(), field.value.clone()))
        .collect();
    map.insert(
        REGISTER_KEY.to_string(),
        document
            .register_id
            .map(|id| id.to_string())
            .unwrap_or_default(),
    );
    map
}

/// Draft rendering: the signed-only slots are present but empty.
pub fn mark_unsigned(map: &mut FieldMap) {
    for key in [SIGNED_DATE_KEY, SIGNATURE_KEY, FOOTER_KEY] {
        map.insert(key.to_string(), String::new());
    }
}

pub fn format_signed_date(signed_at: DateTime<Utc>) -> String {
    signed_at.format(SIGNED_DATE_FORMAT).to_string()
}

pub fn signature_fields(signer: &UserProfile, signed_date: &str) -> FieldMap {
    FieldMap::from([
        ("name".to_string(), signer.name.clone()),
        (
            "position".to_string(),
            signer.position.clone().unwrap_or_default(),
        ),
        (
            "employeeNumber".to_string(),
            signer.employee_number.clone().unwrap_or_default(),
        ),
        (
            "signatureImage".to_string(),
            signer.signature_image.clone().unwrap_or_default(),
        ),
        (SIGNED_DATE_KEY.to_string(), signed_date.to_string()),
    ])
}

pub fn footer_fields(document: &Document, qr_code: String, status_url: String) -> FieldMap {
    FieldMap::from([
        ("qrCode".to_string(), qr_code),
        ("statusUrl".to_string(), status_url),
        ("documentId".to_string(), document.id.to_string()),
        (
            REGISTER_KEY.to_string(),
            document
                .register_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
        ),
    ])
}
