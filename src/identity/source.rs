//! Firm GUID lookup against the upstream identity endpoint.
//!
//! `GET {base}/{firm}/firmLoginToFirmGuid` answers with
//! `302 Found` and `Location: /{GUID}`. Anything else is a failure.

use axum::http::{header, HeaderMap, StatusCode};
use futures_util::future::{BoxFuture, FutureExt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A firm's stable identifier, normalized to lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FirmGuid(String);

impl FirmGuid {
    /// Derive a GUID from a redirect `Location` value: strip one leading `/`
    /// and lowercase the rest.
    pub fn from_location(location: &str) -> Option<Self> {
        let raw = location.strip_prefix('/').unwrap_or(location);
        if raw.is_empty() {
            return None;
        }
        Some(Self(raw.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FirmGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a firm GUID could not be resolved.
///
/// Cloneable so a single outcome can be handed to every waiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    #[error("lookup answered {0}, expected 302 Found")]
    UnexpectedStatus(StatusCode),
    #[error("lookup redirect carried no usable Location header")]
    MissingLocation,
    #[error("lookup timed out")]
    Timeout,
    #[error("lookup request failed: {0}")]
    Transport(#[source] Arc<reqwest::Error>),
    #[error("lookup task ended without an outcome")]
    Abandoned,
}

impl From<reqwest::Error> for ResolveError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ResolveError::Timeout
        } else {
            ResolveError::Transport(Arc::new(e))
        }
    }
}

pub type LookupFuture = BoxFuture<'static, Result<FirmGuid, ResolveError>>;

/// Something that can map a firm to its GUID.
pub trait GuidSource: Send + Sync + 'static {
    fn lookup(&self, firm: &str) -> LookupFuture;
}

/// Interpret the identity endpoint's response head.
pub fn guid_from_redirect(status: StatusCode, headers: &HeaderMap) -> Result<FirmGuid, ResolveError> {
    if status != StatusCode::FOUND {
        return Err(ResolveError::UnexpectedStatus(status));
    }
    headers
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .and_then(FirmGuid::from_location)
        .ok_or(ResolveError::MissingLocation)
}

/// [`GuidSource`] backed by the cloud origin's redirect endpoint.
///
/// The client must not follow redirects; the 302 itself is the answer.
#[derive(Debug, Clone)]
pub struct HttpGuidSource {
    client: reqwest::Client,
    base: String,
    timeout: Option<Duration>,
}

impl HttpGuidSource {
    pub fn new(client: reqwest::Client, base: &str, timeout: Option<Duration>) -> Self {
        Self {
            client,
            base: base.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Source with its own client that reports redirects instead of following them.
    pub fn with_default_client(base: &str, timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()?;
        Ok(Self::new(client, base, timeout))
    }

    pub fn lookup_url(&self, firm: &str) -> String {
        format!("{}/{}/firmLoginToFirmGuid", self.base, firm)
    }
}

impl GuidSource for HttpGuidSource {
    fn lookup(&self, firm: &str) -> LookupFuture {
        let url = self.lookup_url(firm);
        let mut request = self.client.get(&url).header(header::ACCEPT, "*/*");
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        async move {
            tracing::debug!(url = %url, "Requesting firm GUID");
            let response = request.send().await?;
            guid_from_redirect(response.status(), response.headers())
        }
        .boxed()
    }
}
