use std::net::SocketAddr;

use http::{HeaderMap, Request, header};

use crate::core::{RequestDescriptor, mime};

/// Path handling shared by every request of one deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathOptions {
    /// Mount point of the API, e.g. `/api`
    pub base_path: String,
    /// Optional version segment following the base path, e.g. `v1`
    pub version: Option<String>,
    /// Take client IP and scheme from `X-Forwarded-*` headers
    pub trust_forwarded: bool,
}

impl PathOptions {
    /// Route path for a raw request path, with base path and version removed.
    ///
    /// A path outside the base path is returned unchanged (minus slashes) and
    /// will simply not match any route.
    pub fn route_path<'p>(&self, path: &'p str) -> &'p str {
        let mut path = path.trim_matches('/');

        let base = self.base_path.trim_matches('/');
        if !base.is_empty() {
            match strip_segments(path, base) {
                Some(rest) => path = rest,
                None => return path,
            }
        }

        let version = self.version.as_deref().unwrap_or_default().trim_matches('/');
        if version.is_empty() {
            return path;
        }
        strip_segments(path, version).unwrap_or(path)
    }
}

fn strip_segments<'p>(path: &'p str, prefix: &str) -> Option<&'p str> {
    if path == prefix {
        return Some("");
    }
    path.strip_prefix(prefix)?.strip_prefix('/')
}

/// Build the dispatcher's view of an HTTP request.
pub fn describe_request<B>(
    req: &Request<B>,
    client_addr: Option<SocketAddr>,
    options: &PathOptions,
) -> RequestDescriptor {
    let headers = req.headers();

    let forwarded_ip = options
        .trust_forwarded
        .then(|| forwarded_client_ip(headers))
        .flatten();
    let client_ip = forwarded_ip
        .or_else(|| client_addr.map(|addr| addr.ip().to_string()))
        .unwrap_or_default();

    let forwarded_https = options.trust_forwarded
        && headers
            .get("X-Forwarded-Proto")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"));
    let secure = req.uri().scheme_str() == Some("https") || forwarded_https;

    RequestDescriptor::new(req.method().as_str(), options.route_path(req.uri().path()))
        .with_client_ip(client_ip)
        .with_secure(secure)
        .with_accept(accepted_types(headers))
}

/// First address in the `X-Forwarded-For` chain, falling back to `X-Real-IP`.
fn forwarded_client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
    {
        return value.split(',').next().map(|ip| ip.trim().to_string());
    }

    headers
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
        .map(|ip| ip.trim().to_string())
}

/// Media types from the `Accept` headers, most preferred first.
///
/// Entries are ordered by `q` weight (stable, so equal weights keep header
/// order); `q=0` entries are dropped. A request without `Accept` accepts
/// anything.
pub fn accepted_types(headers: &HeaderMap) -> Vec<String> {
    let values: Vec<&str> = headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    if values.is_empty() {
        return vec![mime::WILDCARD_MARKERS[0].to_string()];
    }

    let mut weighted: Vec<(String, f32)> = values
        .iter()
        .flat_map(|value| value.split(','))
        .filter_map(|entry| {
            let mut parts = entry.split(';');
            let media_type = parts.next()?.trim();
            if media_type.is_empty() {
                return None;
            }
            let quality = parts
                .filter_map(|param| param.split_once('='))
                .find(|(key, _)| key.trim().eq_ignore_ascii_case("q"))
                .map_or(1.0, |(_, q)| q.trim().parse::<f32>().unwrap_or(0.0));
            (quality > 0.0).then(|| (media_type.to_ascii_lowercase(), quality))
        })
        .collect();

    weighted.sort_by(|a, b| b.1.total_cmp(&a.1));
    weighted.into_iter().map(|(media_type, _)| media_type).collect()
}
