//! Response relay and transformation.
//!
//! # Responsibilities
//! - Copy upstream status and headers onto the client response
//! - Stream the upstream body without buffering
//! - Optionally widen `Set-Cookie` paths and drop upstream CORS headers
//! - Produce the generic 502 shown to clients on upstream failure
//!
//! # Design Decisions
//! - Hop-by-hop headers stripped automatically
//! - The upstream error never reaches the client body

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{self, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::TryStreamExt;
use hyper::body::Incoming;

use crate::config::CookieConfig;
use crate::http::headers::strip_hop_by_hop;

pub const BAD_GATEWAY_BODY: &str = "Bad Gateway: upstream request failed";

/// The only error a client ever sees.
pub fn bad_gateway() -> Response {
    (StatusCode::BAD_GATEWAY, BAD_GATEWAY_BODY).into_response()
}

/// How relayed responses are adjusted before reaching the client.
#[derive(Debug, Clone, Default)]
pub struct ResponseRewrite {
    pub cookies: CookieRewrite,
    /// Drop upstream `access-control-*` headers (the proxy answers CORS itself).
    pub strip_cors: bool,
}

impl ResponseRewrite {
    pub fn apply(&self, headers: &mut HeaderMap) {
        strip_hop_by_hop(headers);
        if self.strip_cors {
            strip_cors_headers(headers);
        }
        self.cookies.apply(headers);
    }

    /// Turn an upstream response into a streaming client response.
    pub fn relay(&self, upstream: http::Response<Incoming>, branch: &'static str) -> Response {
        let (mut parts, body) = upstream.into_parts();
        self.apply(&mut parts.headers);

        let stream = Body::new(body).into_data_stream().inspect_err(move |e| {
            tracing::warn!(branch = branch, error = %e, "Upstream body stream failed");
        });

        Response::from_parts(parts, Body::from_stream(stream))
    }
}

fn strip_cors_headers(headers: &mut HeaderMap) {
    let cors: Vec<HeaderName> = headers
        .keys()
        .filter(|name| name.as_str().starts_with("access-control-"))
        .cloned()
        .collect();
    for name in cors {
        headers.remove(name);
    }
}

/// Rewrites `Path` attributes of relayed `Set-Cookie` headers.
#[derive(Debug, Clone, Default)]
pub struct CookieRewrite {
    widen_prefix: Option<String>,
    new_path: String,
    add_path_if_missing: bool,
}

impl CookieRewrite {
    pub fn from_config(config: &CookieConfig) -> Self {
        Self {
            widen_prefix: config.widen_prefix.clone().filter(|p| !p.is_empty()),
            new_path: config.new_path.clone(),
            add_path_if_missing: config.add_path_if_missing,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.widen_prefix.is_some()
    }

    pub fn apply(&self, headers: &mut HeaderMap) {
        if !self.is_enabled() || !headers.contains_key(header::SET_COOKIE) {
            return;
        }

        let cookies: Vec<HeaderValue> = headers.get_all(header::SET_COOKIE).iter().cloned().collect();
        headers.remove(header::SET_COOKIE);

        for cookie in cookies {
            let rewritten = cookie
                .to_str()
                .ok()
                .and_then(|c| self.rewrite(c))
                .and_then(|c| HeaderValue::from_str(&c).ok())
                .unwrap_or(cookie);
            headers.append(header::SET_COOKIE, rewritten);
        }
    }

    /// Rewritten cookie, or `None` to keep it as is.
    pub fn rewrite(&self, cookie: &str) -> Option<String> {
        let prefix = self.widen_prefix.as_deref()?;

        match find_path_attribute(cookie) {
            Some(attr) if attr.value.starts_with(prefix) => Some(format!(
                "{}; Path={}{}",
                &cookie[..attr.start],
                self.new_path,
                &cookie[attr.end..]
            )),
            Some(_) => None,
            None if self.add_path_if_missing => Some(format!("{}; Path={}", cookie, self.new_path)),
            None => None,
        }
    }
}

struct PathAttribute<'a> {
    /// Index of the `;` introducing the attribute.
    start: usize,
    /// End of the attribute value.
    end: usize,
    value: &'a str,
}

// `;` + optional whitespace + case-insensitive `Path=` + value up to the next `;`.
fn find_path_attribute(cookie: &str) -> Option<PathAttribute<'_>> {
    cookie.match_indices(';').find_map(|(semi, _)| {
        let after = cookie[semi + 1..].trim_start();
        let is_path = after.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("path="));
        if !is_path {
            return None;
        }
        let value_start = cookie.len() - after.len() + 5;
        let end = cookie[value_start..]
            .find(';')
            .map_or(cookie.len(), |i| value_start + i);
        Some(PathAttribute {
            start: semi,
            end,
            value: &cookie[value_start..end],
        })
    })
}
