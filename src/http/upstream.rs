//! Outbound request execution.
//!
//! # Responsibilities
//! - Own the pooled HTTP(S) client (redirects are never followed)
//! - Build the outbound request from an [`UpstreamPlan`]
//! - Stream the inbound body upstream
//! - Bound the wait for response headers
//!
//! # Design Decisions
//! - Single attempt, no retries
//! - The connect and header timeouts surface as errors (mapped to 502 by the caller)
//! - Body streaming is not time-bounded
//! - The request URI is handed to the client as built, so paths are never normalized

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request};
use hyper::body::Incoming;
use hyper_tls::HttpsConnector;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::time::Duration;

use crate::config::TimeoutConfig;
use crate::http::dispatch::{TargetError, UpstreamPlan};
use crate::http::headers::strip_hop_by_hop;
use crate::http::request::carries_body;

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error(transparent)]
    InvalidTarget(#[from] TargetError),
    #[error("invalid outbound request: {0}")]
    Request(#[from] axum::http::Error),
    #[error("no response headers within {0:?}")]
    Timeout(Duration),
    #[error("upstream request failed: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),
}

/// HTTP client used for every proxied call.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client<HttpsConnector<HttpConnector>, Body>,
    response_timeout: Option<Duration>,
}

impl UpstreamClient {
    pub fn new(timeouts: &TimeoutConfig) -> Self {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_connect_timeout(timeouts.connect());

        let client = Client::builder(TokioExecutor::new())
            .build(HttpsConnector::new_with_connector(http));

        Self {
            client,
            response_timeout: timeouts.response(),
        }
    }

    /// Send one request according to `plan` and wait for the response head.
    pub async fn send(
        &self,
        plan: &UpstreamPlan,
        method: Method,
        mut headers: HeaderMap,
        body: Body,
    ) -> Result<axum::http::Response<Incoming>, UpstreamError> {
        let body = if carries_body(&headers, &body) {
            body
        } else {
            Body::empty()
        };

        strip_hop_by_hop(&mut headers);
        if let Some(host) = &plan.host_override {
            headers.insert(header::HOST, host.clone());
        }
        plan.identity.apply(&mut headers);

        let mut request = Request::builder()
            .method(method)
            .uri(plan.uri.clone())
            .body(body)?;
        *request.headers_mut() = headers;

        let pending = self.client.request(request);
        let response = match self.response_timeout {
            Some(limit) => tokio::time::timeout(limit, pending)
                .await
                .map_err(|_| UpstreamError::Timeout(limit))??,
            None => pending.await?,
        };
        Ok(response)
    }
}
