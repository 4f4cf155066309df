//! Path matchers for the request classifier.
//!
//! # Responsibilities
//! - Detect `/{firm}/ms/{service}` service-API paths and capture the firm
//! - Detect reserved front-end prefixes
//! - Detect `/{firm}/e/eng/{engagement}/s/{slug}` agent URLs and capture both ids
//!
//! # Design Decisions
//! - Paths are matched without the query string
//! - Matching is case-sensitive
//! - No regex; plain segment and prefix comparisons

/// Captures from a service-API path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceApiMatch<'a> {
    /// Segment immediately preceding `/ms/`.
    pub firm: &'a str,
    /// Path after `/ms/{service}`; empty or starting with `/`.
    pub remainder: &'a str,
}

/// Matches `/{anything}/ms/{service}` followed by `/` or end of path.
#[derive(Debug, Clone)]
pub struct ServiceApiMatcher {
    marker: String,
}

impl ServiceApiMatcher {
    pub fn new(service_name: &str) -> Self {
        Self {
            marker: format!("/ms/{}", service_name),
        }
    }

    pub fn capture<'a>(&self, path: &'a str) -> Option<ServiceApiMatch<'a>> {
        let mut from = 0;
        while let Some(offset) = path[from..].find(&self.marker) {
            let start = from + offset;
            let rest = &path[start + self.marker.len()..];

            if rest.is_empty() || rest.starts_with('/') {
                let firm = path[..start].rsplit('/').next().unwrap_or_default();
                if !firm.is_empty() {
                    return Some(ServiceApiMatch {
                        firm,
                        remainder: rest,
                    });
                }
            }
            from = start + 1;
        }
        None
    }
}

/// Matches any of a fixed set of path prefixes.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefixes: Vec<String>,
}

impl PathPrefixMatcher {
    pub fn new(prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        self.prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }
}

/// Captures from a conversational-agent URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentUrlMatch<'a> {
    pub firm: &'a str,
    pub engagement: &'a str,
}

/// Matches `/{firm}/e/eng/{engagement}/s/{slug}`.
/// Further segments after the slug are tolerated.
#[derive(Debug, Clone)]
pub struct AgentUrlMatcher {
    slug: String,
}

impl AgentUrlMatcher {
    pub fn new(slug: &str) -> Self {
        Self {
            slug: slug.to_string(),
        }
    }

    pub fn capture<'a>(&self, path: &'a str) -> Option<AgentUrlMatch<'a>> {
        let mut segments = path.strip_prefix('/')?.split('/');

        let firm = segments.next().filter(|s| !s.is_empty())?;
        segments.next().filter(|s| *s == "e")?;
        segments.next().filter(|s| *s == "eng")?;
        let engagement = segments.next().filter(|s| !s.is_empty())?;
        segments.next().filter(|s| *s == "s")?;
        segments.next().filter(|s| *s == self.slug)?;

        Some(AgentUrlMatch { firm, engagement })
    }
}
