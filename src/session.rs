//! Conversational engagement tracking.
//!
//! Agent URLs carry an engagement id that later service-API calls forward
//! as a header. The last observed value wins. With
//! [`EngagementScope::Process`] a single value is shared by every client;
//! with [`EngagementScope::Firm`] values are kept apart per firm.

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use std::sync::Arc;

use crate::config::EngagementScope;

#[derive(Debug)]
pub struct EngagementTracker {
    scope: EngagementScope,
    latest: ArcSwapOption<String>,
    by_firm: DashMap<String, Arc<String>>,
}

impl EngagementTracker {
    pub fn new(scope: EngagementScope) -> Self {
        Self {
            scope,
            latest: ArcSwapOption::empty(),
            by_firm: DashMap::new(),
        }
    }

    /// Record the engagement seen on an agent URL for `firm`.
    pub fn observe(&self, firm: &str, engagement: &str) {
        let value = Arc::new(engagement.to_string());
        match self.scope {
            EngagementScope::Process => self.latest.store(Some(value)),
            EngagementScope::Firm => {
                self.by_firm.insert(firm.to_string(), value);
            }
        }
    }

    /// Engagement to forward on a request for `firm`, if any was observed.
    pub fn current(&self, firm: &str) -> Option<Arc<String>> {
        match self.scope {
            EngagementScope::Process => self.latest.load_full(),
            EngagementScope::Firm => self.by_firm.get(firm).map(|v| Arc::clone(v.value())),
        }
    }
}

impl Default for EngagementTracker {
    fn default() -> Self {
        Self::new(EngagementScope::default())
    }
}
