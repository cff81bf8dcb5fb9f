use base64::{engine::general_purpose::STANDARD, Engine as _};
use qrcode::render::svg;
use qrcode::types::QrError;
use qrcode::QrCode;
use uuid::Uuid;

/// `{base}{id}/status`, the page a scanned QR code opens.
pub fn status_url(base: &str, id: Uuid) -> String {
    format!("{}{}/status", base, id)
}

/// SVG QR code for `content`, as a `data:` URI usable in an `<img src>`.
pub fn qr_data_uri(content: &str) -> Result<String, QrError> {
    let code = QrCode::new(content.as_bytes())?;
    let image = code
        .render::<svg::Color>()
        .min_dimensions(160, 160)
        .quiet_zone(true)
        .build();
    Ok(format!(
        "data:image/svg+xml;base64,{}",
        STANDARD.encode(image.as_bytes())
    ))
}
