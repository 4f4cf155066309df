//! Single-flight firm GUID cache.
//!
//! Each firm maps to either a pending lookup or a resolved GUID.
//! The first miss inserts a pending entry and spawns the lookup; later
//! callers for the same firm await that same shared outcome. The spawned
//! task settles the entry (resolved on success, removed on failure) before
//! any waiter sees the outcome, so a failed firm is retried from scratch by
//! the next caller.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

use crate::identity::source::{FirmGuid, GuidSource, LookupFuture, ResolveError};
use crate::observability::metrics;

type SharedLookup = Shared<LookupFuture>;

enum CacheEntry {
    Pending { id: u64, outcome: SharedLookup },
    Resolved { guid: FirmGuid, resolved_at: Instant },
}

enum Lookup {
    Cached(FirmGuid),
    InFlight(SharedLookup),
    Start {
        id: u64,
        outcome: SharedLookup,
        tx: oneshot::Sender<Result<FirmGuid, ResolveError>>,
    },
}

struct Inner {
    source: Arc<dyn GuidSource>,
    entries: DashMap<String, CacheEntry>,
    ttl: Option<Duration>,
    next_id: AtomicU64,
}

/// Resolves firms to GUIDs with at most one lookup in flight per firm.
#[derive(Clone)]
pub struct FirmGuidResolver {
    inner: Arc<Inner>,
}

impl FirmGuidResolver {
    /// `ttl` of `None` keeps resolved GUIDs for the life of the process.
    pub fn new(source: Arc<dyn GuidSource>, ttl: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                entries: DashMap::new(),
                ttl,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Resolve `firm`, joining an in-flight lookup when there is one.
    ///
    /// An empty firm yields `Ok(None)` without any network traffic.
    pub async fn resolve(&self, firm: &str) -> Result<Option<FirmGuid>, ResolveError> {
        if firm.is_empty() {
            return Ok(None);
        }

        let outcome = match self.join_or_start(firm) {
            Lookup::Cached(guid) => {
                metrics::record_guid_lookup("cached");
                return Ok(Some(guid));
            }
            Lookup::InFlight(outcome) => {
                metrics::record_guid_lookup("joined");
                outcome
            }
            Lookup::Start { id, outcome, tx } => {
                self.spawn_lookup(firm, id, tx);
                outcome
            }
        };

        outcome.await.map(Some)
    }

    /// Number of firms with a pending or resolved entry.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Resolved GUID for `firm`, ignoring pending lookups and expiry.
    pub fn cached(&self, firm: &str) -> Option<FirmGuid> {
        self.inner.entries.get(firm).and_then(|e| match e.value() {
            CacheEntry::Resolved { guid, .. } => Some(guid.clone()),
            CacheEntry::Pending { .. } => None,
        })
    }

    // The map guard is released before returning, so no await ever runs
    // while a shard lock is held.
    fn join_or_start(&self, firm: &str) -> Lookup {
        match self.inner.entries.entry(firm.to_string()) {
            Entry::Occupied(mut occupied) => {
                match occupied.get() {
                    CacheEntry::Resolved { guid, resolved_at } if !self.is_expired(*resolved_at) => {
                        return Lookup::Cached(guid.clone());
                    }
                    CacheEntry::Pending { outcome, .. } => {
                        return Lookup::InFlight(outcome.clone());
                    }
                    CacheEntry::Resolved { .. } => {
                        tracing::debug!(firm = %firm, "Cached firm GUID expired");
                    }
                }
                let (entry, lookup) = self.pending();
                occupied.insert(entry);
                lookup
            }
            Entry::Vacant(vacant) => {
                let (entry, lookup) = self.pending();
                vacant.insert(entry);
                lookup
            }
        }
    }

    fn pending(&self) -> (CacheEntry, Lookup) {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let outcome = rx
            .map(|received| received.unwrap_or(Err(ResolveError::Abandoned)))
            .boxed()
            .shared();

        (
            CacheEntry::Pending {
                id,
                outcome: outcome.clone(),
            },
            Lookup::Start { id, outcome, tx },
        )
    }

    fn spawn_lookup(
        &self,
        firm: &str,
        id: u64,
        tx: oneshot::Sender<Result<FirmGuid, ResolveError>>,
    ) {
        let lookup = self.inner.source.lookup(firm);
        let settle = SettleGuard {
            inner: Arc::clone(&self.inner),
            firm: firm.to_string(),
            id,
            settled: false,
        };

        tokio::spawn(async move {
            let mut settle = settle;
            let outcome = lookup.await;
            settle.settle(&outcome);
            let _ = tx.send(outcome);
        });
    }

    fn is_expired(&self, resolved_at: Instant) -> bool {
        self.inner
            .ttl
            .is_some_and(|ttl| resolved_at.elapsed() >= ttl)
    }
}

/// Settles a pending entry exactly once; evicts it if the lookup task dies first.
struct SettleGuard {
    inner: Arc<Inner>,
    firm: String,
    id: u64,
    settled: bool,
}

impl SettleGuard {
    fn settle(&mut self, outcome: &Result<FirmGuid, ResolveError>) {
        self.settled = true;
        match outcome {
            Ok(guid) => {
                tracing::info!(firm = %self.firm, guid = %guid, "Resolved firm GUID");
                metrics::record_guid_lookup("resolved");
                if let Some(mut entry) = self.inner.entries.get_mut(&self.firm) {
                    if is_pending(entry.value(), self.id) {
                        *entry = CacheEntry::Resolved {
                            guid: guid.clone(),
                            resolved_at: Instant::now(),
                        };
                    }
                }
            }
            Err(e) => {
                tracing::warn!(firm = %self.firm, error = %e, "Firm GUID lookup failed");
                metrics::record_guid_lookup("failed");
                self.evict();
            }
        }
    }

    fn evict(&self) {
        self.inner
            .entries
            .remove_if(&self.firm, |_, entry| is_pending(entry, self.id));
    }
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        if !self.settled {
            self.evict();
        }
    }
}

fn is_pending(entry: &CacheEntry, id: u64) -> bool {
    matches!(entry, CacheEntry::Pending { id: pending, .. } if *pending == id)
}
