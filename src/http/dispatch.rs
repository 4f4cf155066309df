//! Upstream target construction.
//!
//! # Responsibilities
//! - Classify the request path
//! - Consult the firm GUID resolver and engagement tracker where the branch needs them
//! - Produce the outbound URI, `Host` override and identity headers
//!
//! # Branches
//! ```text
//! service-API   local mode → local backend, path after /ms/{service}
//!               cloud mode → cloud origin, full path, Host = cloud
//!               both inject firm / firm GUID / engagement headers
//! static asset  → local front-end, path unchanged
//! agent URL     → local front-end, path collapsed to "/", engagement recorded
//! passthrough   → cloud origin, full path, Host = cloud
//! ```
//!
//! Only the scheme and authority of the inbound URI are replaced. Path and
//! query bytes go upstream exactly as received (no dot-segment removal, no
//! re-encoding).

use axum::http::uri::{Authority, InvalidUri, PathAndQuery, Scheme};
use axum::http::{HeaderValue, Uri};

use crate::config::ProxyConfig;
use crate::http::headers::IdentityHeaders;
use crate::identity::{FirmGuid, FirmGuidResolver};
use crate::routing::{RequestClassifier, RouteClass};
use crate::session::EngagementTracker;

/// Everything needed to issue the outbound request.
#[derive(Debug, Clone)]
pub struct UpstreamPlan {
    pub branch: &'static str,
    pub uri: Uri,
    pub host_override: Option<HeaderValue>,
    pub identity: IdentityHeaders,
}

/// A configured upstream origin that cannot be used as a target.
#[derive(Debug, thiserror::Error)]
pub enum OriginError {
    #[error("invalid upstream origin {origin:?}: {source}")]
    Invalid {
        origin: String,
        #[source]
        source: InvalidUri,
    },
    #[error("upstream origin {0:?} needs a scheme and a host")]
    Incomplete(String),
}

/// The outbound URI for a request could not be assembled.
#[derive(Debug, thiserror::Error)]
#[error("cannot build {branch} target: {source}")]
pub struct TargetError {
    pub branch: &'static str,
    #[source]
    pub source: axum::http::Error,
}

#[derive(Debug, Clone)]
struct Origin {
    scheme: Scheme,
    authority: Authority,
}

impl Origin {
    fn parse(raw: &str) -> Result<Self, OriginError> {
        let uri: Uri = raw.parse().map_err(|source| OriginError::Invalid {
            origin: raw.to_string(),
            source,
        })?;
        let (scheme, authority) = match (uri.scheme(), uri.authority()) {
            (Some(scheme), Some(authority)) => (scheme.clone(), authority.clone()),
            _ => return Err(OriginError::Incomplete(raw.to_string())),
        };
        Ok(Self { scheme, authority })
    }

    fn local(host: &str, port: u16) -> Result<Self, OriginError> {
        Self::parse(&format!("http://{}:{}", host, port))
    }

    /// `Host` value for this origin, as configured.
    fn host_header(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(self.authority.as_str()).ok()
    }

    fn target(&self, path_and_query: PathAndQuery) -> Result<Uri, axum::http::Error> {
        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }
}

#[derive(Debug, Clone)]
struct Targets {
    frontend: Origin,
    backend: Origin,
    cloud: Origin,
    cloud_host: Option<HeaderValue>,
    local_mode: bool,
}

impl Targets {
    fn from_config(config: &ProxyConfig) -> Result<Self, OriginError> {
        let upstreams = &config.upstreams;
        let cloud = Origin::parse(&upstreams.cloud_origin)?;

        Ok(Self {
            frontend: Origin::local(&upstreams.local_host, upstreams.frontend_port)?,
            backend: Origin::local(&upstreams.local_host, upstreams.backend_port)?,
            cloud_host: cloud.host_header(),
            cloud,
            local_mode: config.routing.local_mode,
        })
    }
}

/// Decides where each request goes.
pub struct Dispatcher {
    classifier: RequestClassifier,
    resolver: FirmGuidResolver,
    engagements: EngagementTracker,
    targets: Targets,
}

impl Dispatcher {
    pub fn new(config: &ProxyConfig, resolver: FirmGuidResolver) -> Result<Self, OriginError> {
        Ok(Self {
            classifier: RequestClassifier::from_config(&config.routing),
            resolver,
            engagements: EngagementTracker::new(config.session.scope),
            targets: Targets::from_config(config)?,
        })
    }

    pub fn engagements(&self) -> &EngagementTracker {
        &self.engagements
    }

    pub fn resolver(&self) -> &FirmGuidResolver {
        &self.resolver
    }

    /// Classify `uri` and build its outbound plan.
    pub async fn plan(&self, uri: &Uri) -> Result<UpstreamPlan, TargetError> {
        let class = self.classifier.classify(uri.path());
        let branch = class.label();
        let fail = |source| TargetError { branch, source };

        let plan = match class {
            RouteClass::ServiceApi { firm, remainder } => {
                let identity = IdentityHeaders {
                    guid: self.firm_guid(&firm).await,
                    engagement: self.engagements.current(&firm),
                    firm: Some(firm),
                };

                if self.targets.local_mode {
                    let path = if remainder.is_empty() { "/" } else { remainder.as_str() };
                    UpstreamPlan {
                        branch,
                        uri: rebased(&self.targets.backend, path, uri.query()).map_err(fail)?,
                        host_override: None,
                        identity,
                    }
                } else {
                    UpstreamPlan {
                        branch,
                        uri: verbatim(&self.targets.cloud, uri).map_err(fail)?,
                        host_override: self.targets.cloud_host.clone(),
                        identity,
                    }
                }
            }
            RouteClass::StaticAsset => UpstreamPlan {
                branch,
                uri: verbatim(&self.targets.frontend, uri).map_err(fail)?,
                host_override: None,
                identity: IdentityHeaders::default(),
            },
            RouteClass::ConversationalAgent { firm, engagement } => {
                self.engagements.observe(&firm, &engagement);
                tracing::debug!(firm = %firm, engagement = %engagement, "Tracking engagement");

                if let Some(guid) = self.firm_guid(&firm).await {
                    tracing::debug!(firm = %firm, guid = %guid, "Agent URL firm resolved");
                }

                UpstreamPlan {
                    branch,
                    uri: rebased(&self.targets.frontend, "/", uri.query()).map_err(fail)?,
                    host_override: None,
                    identity: IdentityHeaders::default(),
                }
            }
            RouteClass::Passthrough => UpstreamPlan {
                branch,
                uri: verbatim(&self.targets.cloud, uri).map_err(fail)?,
                host_override: self.targets.cloud_host.clone(),
                identity: IdentityHeaders::default(),
            },
        };
        Ok(plan)
    }

    // Resolution failures are logged and otherwise ignored.
    async fn firm_guid(&self, firm: &str) -> Option<FirmGuid> {
        match self.resolver.resolve(firm).await {
            Ok(guid) => guid,
            Err(e) => {
                tracing::warn!(firm = %firm, error = %e, "Proceeding without firm GUID");
                None
            }
        }
    }
}

/// `origin` + the inbound path and query, untouched.
fn verbatim(origin: &Origin, uri: &Uri) -> Result<Uri, axum::http::Error> {
    let path_and_query = uri
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));
    origin.target(path_and_query)
}

/// `origin` + a new path carrying the inbound query as received.
fn rebased(origin: &Origin, path: &str, query: Option<&str>) -> Result<Uri, axum::http::Error> {
    let raw = match query {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };
    let path_and_query = PathAndQuery::try_from(raw)?;
    origin.target(path_and_query)
}
