//! Value classification helpers used by the model layer.

use chrono::{DateTime, NaiveDateTime};
use std::sync::OnceLock;

/// Best-effort email validation.
///
/// This is intentionally not fully RFC-compliant.
pub fn is_email(s: &str) -> bool {
    static EMAIL_RE: OnceLock<Option<regex::Regex>> = OnceLock::new();
    EMAIL_RE
        .get_or_init(|| regex::Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(s))
}

/// Absolute URL with a host (`https://example.com/a`), not `mailto:` style.
pub fn is_url(s: &str) -> bool {
    url::Url::parse(s).is_ok_and(|u| u.has_host())
}

pub fn is_uuid(s: &str) -> bool {
    uuid::Uuid::parse_str(s).is_ok()
}

/// Objects and arrays only; bare scalars such as `"12"` are not treated as JSON documents.
pub fn is_json_document(s: &str) -> bool {
    matches!(
        serde_json::from_str::<serde_json::Value>(s),
        Ok(serde_json::Value::Object(_) | serde_json::Value::Array(_))
    )
}

/// RFC 3339 or `YYYY-MM-DD HH:MM:SS[.f]`.
pub fn is_date_time(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").is_ok()
}
