//! Request classification.
//!
//! # Responsibilities
//! - Assign every request path exactly one [`RouteClass`]
//! - Apply the fixed priority order: service-API, static asset,
//!   conversational agent, passthrough
//!
//! # Design Decisions
//! - Immutable after construction (shared without locks)
//! - Looks at the path only; method and headers never influence the class

use crate::config::RoutingConfig;
use crate::routing::matcher::{AgentUrlMatcher, PathPrefixMatcher, ServiceApiMatcher};

/// Routing class of an inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteClass {
    /// `/{firm}/ms/{service}...`, destined for the named backend service.
    ServiceApi { firm: String, remainder: String },
    /// Front-end build artifacts and well-known metadata.
    StaticAsset,
    /// `/{firm}/e/eng/{engagement}/s/{slug}`, boots the local front-end.
    ConversationalAgent { firm: String, engagement: String },
    /// Everything else goes to the cloud origin untouched.
    Passthrough,
}

impl RouteClass {
    /// Short label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            RouteClass::ServiceApi { .. } => "service-api",
            RouteClass::StaticAsset => "static-asset",
            RouteClass::ConversationalAgent { .. } => "agent-url",
            RouteClass::Passthrough => "passthrough",
        }
    }

    /// Firm captured from the path, if the class carries one.
    pub fn firm(&self) -> Option<&str> {
        match self {
            RouteClass::ServiceApi { firm, .. } | RouteClass::ConversationalAgent { firm, .. } => {
                Some(firm)
            }
            _ => None,
        }
    }
}

/// Compiled classification rules.
#[derive(Debug, Clone)]
pub struct RequestClassifier {
    service_api: ServiceApiMatcher,
    static_assets: PathPrefixMatcher,
    agent_url: AgentUrlMatcher,
}

impl RequestClassifier {
    pub fn from_config(config: &RoutingConfig) -> Self {
        Self {
            service_api: ServiceApiMatcher::new(&config.service_name),
            static_assets: PathPrefixMatcher::new(config.static_prefixes.iter().cloned()),
            agent_url: AgentUrlMatcher::new(&config.agent_slug),
        }
    }

    /// Classify a request path (query string excluded). First match wins.
    pub fn classify(&self, path: &str) -> RouteClass {
        if let Some(m) = self.service_api.capture(path) {
            return RouteClass::ServiceApi {
                firm: m.firm.to_string(),
                remainder: m.remainder.to_string(),
            };
        }

        if self.static_assets.matches(path) {
            return RouteClass::StaticAsset;
        }

        if let Some(m) = self.agent_url.capture(path) {
            return RouteClass::ConversationalAgent {
                firm: m.firm.to_string(),
                engagement: m.engagement.to_string(),
            };
        }

        RouteClass::Passthrough
    }
}
