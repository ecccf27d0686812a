use crate::core::mime;

/// Normalized view of an incoming request, as consumed by the dispatcher.
///
/// `path` has scheme, host, query, base path and version prefix removed and is
/// trimmed of leading/trailing `/`. `accept` is ordered most-preferred first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub method: String,
    pub path: String,
    pub client_ip: String,
    pub secure: bool,
    pub accept: Vec<String>,
}

impl RequestDescriptor {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            path: path.into().trim_matches('/').to_string(),
            client_ip: String::new(),
            secure: false,
            accept: vec![mime::WILDCARD_MARKERS[0].to_string()],
        }
    }

    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = ip.into();
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_accept<I, S>(mut self, accept: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accept = accept.into_iter().map(Into::into).collect();
        self
    }
}
