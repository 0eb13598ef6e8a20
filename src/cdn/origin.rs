//! Backend URL to CDN origin conversion.

use url::Url;

use crate::synth::{ConstructError, ConstructResult};

/// Host and optional path prefix of a custom origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginTarget {
    pub domain_name: String,
    /// Path prefix forwarded to the origin; `None` for the root.
    pub origin_path: Option<String>,
}

/// Parse a backend location into an origin.
///
/// Accepts full URLs (`https://api.example.com/v1/`) and schemeless
/// host forms (`api.example.com:8443/v1`). Ports are dropped and a trailing
/// slash is trimmed from the path.
pub fn parse_origin(input: &str) -> ConstructResult<OriginTarget> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(invalid(input, "backend URL is empty"));
    }

    let (host, path) = if trimmed.contains("://") {
        let url = Url::parse(trimmed).map_err(|e| invalid(input, &e.to_string()))?;
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid(input, "URL has no host"))?
            .to_string();
        (host, url.path().to_string())
    } else {
        let (authority, path) = match trimmed.find('/') {
            Some(idx) => (&trimmed[..idx], &trimmed[idx..]),
            None => (trimmed, ""),
        };
        let host = authority.split(':').next().unwrap_or_default();
        if host.is_empty() {
            return Err(invalid(input, "no domain name before the path"));
        }
        (host.to_string(), path.to_string())
    };

    let path = path.trim_end_matches('/');
    Ok(OriginTarget {
        domain_name: host,
        origin_path: (!path.is_empty()).then(|| path.to_string()),
    })
}

fn invalid(input: &str, reason: &str) -> ConstructError {
    ConstructError::InvalidOrigin {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}
