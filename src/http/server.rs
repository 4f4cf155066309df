//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (request ID, tracing, optional CORS)
//! - Bind server to listener with graceful shutdown
//! - Dispatch requests through the classifier/dispatcher
//! - Relay upstream responses, mapping failures to 502

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, Uri},
    response::Response,
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::dispatch::Dispatcher;
use crate::http::request::{request_id, UuidRequestId};
use crate::http::response::{bad_gateway, CookieRewrite, ResponseRewrite};
use crate::http::upstream::{UpstreamClient, UpstreamError};
use crate::identity::{FirmGuidResolver, HttpGuidSource};
use crate::lifecycle::shutdown;
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub upstream: UpstreamClient,
    pub rewrite: Arc<ResponseRewrite>,
}

/// HTTP server for the development proxy.
pub struct ProxyServer {
    router: Router,
    config: ProxyConfig,
    state: AppState,
}

impl ProxyServer {
    /// Create a server whose firm GUID lookups go to the cloud origin.
    pub fn new(config: ProxyConfig) -> Result<Self, ProxyError> {
        let source = HttpGuidSource::with_default_client(
            &config.upstreams.cloud_origin,
            config.identity.lookup_timeout(),
        )?;
        let resolver = FirmGuidResolver::new(Arc::new(source), config.identity.guid_ttl());
        let dispatcher = Dispatcher::new(&config, resolver)?;

        let state = AppState {
            dispatcher: Arc::new(dispatcher),
            upstream: UpstreamClient::new(&config.timeouts),
            rewrite: Arc::new(ResponseRewrite {
                cookies: CookieRewrite::from_config(&config.cookies),
                strip_cors: config.cors.enabled,
            }),
        };

        let router = Self::build_router(&config, state.clone());
        Ok(Self {
            router,
            config,
            state,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let router = Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            );

        if config.cors.enabled {
            router.layer(cors_layer())
        } else {
            router
        }
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ProxyError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            port = addr.port(),
            cloud_origin = %self.config.upstreams.cloud_origin,
            local_mode = self.config.routing.local_mode,
            "Proxy listening"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait_for(shutdown))
            .await?;

        tracing::info!(cached_firms = self.state.dispatcher.resolver().len(), "HTTP server stopped");
        Ok(())
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request())
}

/// Main proxy handler: classify, plan, forward, relay.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request_id(request.headers()).to_string();
    let (parts, body) = request.into_parts();

    let plan = match state.dispatcher.plan(&parts.uri).await {
        Ok(plan) => plan,
        Err(e) => {
            let branch = e.branch;
            return upstream_failure(&request_id, branch, &parts.uri, UpstreamError::from(e), start);
        }
    };
    let branch = plan.branch;

    tracing::info!(
        request_id = %request_id,
        branch = branch,
        method = %parts.method,
        original = %parts.uri,
        target = %plan.uri,
        "Dispatching request"
    );

    match state.upstream.send(&plan, parts.method, parts.headers, body).await {
        Ok(response) => {
            let status = response.status();
            tracing::info!(
                request_id = %request_id,
                branch = branch,
                status = status.as_u16(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Upstream responded"
            );
            metrics::record_request(branch, status.as_u16(), start);
            state.rewrite.relay(response, branch)
        }
        Err(e) => upstream_failure(&request_id, branch, &plan.uri, e, start),
    }
}

fn upstream_failure(
    request_id: &str,
    branch: &'static str,
    target: &Uri,
    error: UpstreamError,
    start: Instant,
) -> Response {
    tracing::error!(
        request_id = %request_id,
        branch = branch,
        target = %target,
        error = %error,
        "Upstream request failed"
    );
    metrics::record_upstream_error(branch);
    metrics::record_request(branch, 502, start);
    bad_gateway()
}
