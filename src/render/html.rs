use lazy_static::lazy_static;
use regex::{Captures, Regex};

use super::FieldMap;

lazy_static! {
    /// `{{{ key }}}` (raw) or `{{ key }}` (escaped).
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}\}|\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}")
            .expect("valid placeholder pattern");
}

pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Fill a layout body. Placeholders naming unknown keys are left as written.
pub fn fill_layout(layout: &str, fields: &FieldMap) -> String {
    PLACEHOLDER
        .replace_all(layout, |caps: &Captures| {
            if let Some(key) = caps.get(1) {
                if let Some(value) = fields.get(key.as_str()) {
                    return value.clone();
                }
            } else if let Some(key) = caps.get(2) {
                if let Some(value) = fields.get(key.as_str()) {
                    return escape_html(value);
                }
            }
            caps[0].to_string()
        })
        .into_owned()
}
