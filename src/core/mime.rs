//! Content types a route may declare, and the markers a client uses to accept anything.

pub const APPLICATION_JSON: &str = "application/json";
pub const APPLICATION_XML: &str = "application/xml";
pub const TEXT_XML: &str = "text/xml";
pub const TEXT_HTML: &str = "text/html";
pub const TEXT_PLAIN: &str = "text/plain";
pub const TEXT_CSV: &str = "text/csv";
pub const APPLICATION_FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";
pub const APPLICATION_OCTET_STREAM: &str = "application/octet-stream";

/// Every content type accepted in a route policy.
pub const SUPPORTED_CONTENT_TYPES: &[&str] = &[
    APPLICATION_JSON,
    APPLICATION_XML,
    TEXT_XML,
    TEXT_HTML,
    TEXT_PLAIN,
    TEXT_CSV,
    APPLICATION_FORM_URLENCODED,
    MULTIPART_FORM_DATA,
    APPLICATION_OCTET_STREAM,
];

/// Accept entries meaning "anything goes".
pub const WILDCARD_MARKERS: &[&str] = &["*/*", "*"];

pub fn is_supported(content_type: &str) -> bool {
    SUPPORTED_CONTENT_TYPES.contains(&content_type)
}

pub fn is_wildcard(entry: &str) -> bool {
    WILDCARD_MARKERS.contains(&entry)
}
