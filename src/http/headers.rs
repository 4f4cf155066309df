//! Header manipulation shared by the outbound request and relayed response.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers (and any listed in `Connection`)
//! - Inject firm identity headers on service-API requests

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;

use crate::identity::FirmGuid;

/// Raw firm identifier taken from the request path.
pub const X_FIRM: HeaderName = HeaderName::from_static("x-firm");
/// Lowercase firm GUID.
pub const X_FIRM_GUID: HeaderName = HeaderName::from_static("x-firm-guid");
/// Base64 of the tracked engagement id.
pub const X_ENGAGEMENT: HeaderName = HeaderName::from_static("x-engagement");

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove connection-scoped headers before forwarding in either direction.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Identity headers attached to an outbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityHeaders {
    pub firm: Option<String>,
    pub guid: Option<FirmGuid>,
    pub engagement: Option<Arc<String>>,
}

impl IdentityHeaders {
    pub fn is_empty(&self) -> bool {
        self.firm.is_none() && self.guid.is_none() && self.engagement.is_none()
    }

    /// Write every available identity header, replacing client-supplied values.
    pub fn apply(&self, headers: &mut HeaderMap) {
        if let Some(firm) = &self.firm {
            insert_str(headers, X_FIRM, firm);
        }
        if let Some(guid) = &self.guid {
            insert_str(headers, X_FIRM_GUID, guid.as_str());
        }
        if let Some(engagement) = &self.engagement {
            insert_str(headers, X_ENGAGEMENT, &STANDARD.encode(engagement.as_bytes()));
        }
    }
}

fn insert_str(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => tracing::warn!(header = %name, "Skipping identity header with invalid value"),
    }
}
