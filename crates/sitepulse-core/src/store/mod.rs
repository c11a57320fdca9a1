// ── Bounded per-site ingestion store ──
//
// Concurrent storage for one bounded, chronologically ordered event log
// per site. Ingestion and pruning mutate a site's log under that site's
// DashMap entry lock; unrelated sites never contend. Readers get
// copy-on-read snapshots — never a live reference into a log.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::watch;

use crate::model::{SiteEvent, SiteId};

/// Default cap on a single site's event log.
pub const DEFAULT_EVENT_CAP: usize = 1000;

// ── SiteSnapshot ─────────────────────────────────────────────────────

/// Point-in-time view of one site, detached from the live store.
///
/// Events are `Arc`-shared with the store but the vector is owned by the
/// snapshot, so iteration is never racing concurrent ingestion.
#[derive(Debug, Clone)]
pub struct SiteSnapshot {
    pub id: SiteId,
    pub name: String,
    pub last_update: DateTime<Utc>,
    pub events: Vec<Arc<SiteEvent>>,
}

// ── SiteStore ────────────────────────────────────────────────────────

struct SiteRecord {
    name: String,
    events: VecDeque<Arc<SiteEvent>>,
    last_update: DateTime<Utc>,
}

/// The single source of truth for ingested analytics samples.
///
/// Invariants:
/// - a site's log never exceeds the cap; eviction is strictly oldest-first
/// - logs are chronologically non-decreasing (the transport delivers
///   frames in order and the store preserves arrival order, including for
///   duplicate timestamps)
/// - sites are created lazily on first event and never removed, even when
///   pruned to zero events — a pending selection may be targeting them
pub struct SiteStore {
    sites: DashMap<SiteId, SiteRecord>,
    cap: usize,
    /// Running total of retained events across all sites.
    total_events: AtomicU64,
    /// Bumped on every mutation so readers can re-snapshot on change.
    version: watch::Sender<u64>,
}

impl SiteStore {
    pub fn new(cap: usize) -> Self {
        let (version, _) = watch::channel(0u64);
        Self {
            sites: DashMap::new(),
            cap,
            total_events: AtomicU64::new(0),
            version,
        }
    }

    /// Append one event to its site's log, creating the site if this is
    /// the first event referencing it. Evicts oldest-first past the cap.
    /// Returns `true` if the site was newly created.
    ///
    /// Synchronous and cheap — safe at tens of events per second. The cap
    /// is the only hard memory bound.
    pub fn ingest(&self, event: SiteEvent) -> bool {
        let timestamp = event.timestamp;
        let site_id = event.site_id.clone();
        let site_name = event.site_name.clone();
        let event = Arc::new(event);

        let mut evicted: u64 = 0;
        let mut created = false;

        {
            let mut record = self.sites.entry(site_id).or_insert_with(|| {
                created = true;
                SiteRecord {
                    name: site_name,
                    events: VecDeque::new(),
                    last_update: timestamp,
                }
            });

            record.events.push_back(event);
            while record.events.len() > self.cap {
                record.events.pop_front();
                evicted += 1;
            }
            record.last_update = timestamp;
        }

        self.total_events.fetch_add(1, Ordering::Relaxed);
        if evicted > 0 {
            self.total_events.fetch_sub(evicted, Ordering::Relaxed);
        }
        self.bump_version();

        created
    }

    /// Remove every event older than `now − max_age`, across all sites.
    ///
    /// Site records themselves survive — a site may end up with an empty
    /// log. Runs on a fixed cadence independent of ingestion rate.
    /// Returns the number of events removed.
    pub fn prune(&self, max_age: Duration) -> u64 {
        let cutoff = Utc::now() - max_age;
        let mut removed: u64 = 0;

        for mut record in self.sites.iter_mut() {
            // Logs are chronologically non-decreasing, so expired events
            // are a prefix.
            while record
                .events
                .front()
                .is_some_and(|e| e.timestamp < cutoff)
            {
                record.events.pop_front();
                removed += 1;
            }
        }

        if removed > 0 {
            self.total_events.fetch_sub(removed, Ordering::Relaxed);
            self.bump_version();
            tracing::debug!(removed, "pruned expired events");
        }

        removed
    }

    // ── Read accessors ───────────────────────────────────────────────

    /// Copy-on-read snapshot of one site's log.
    pub fn site_snapshot(&self, id: &SiteId) -> Option<SiteSnapshot> {
        self.sites.get(id).map(|record| SiteSnapshot {
            id: id.clone(),
            name: record.name.clone(),
            last_update: record.last_update,
            events: record.events.iter().map(Arc::clone).collect(),
        })
    }

    /// Copy-on-read snapshot of every site.
    pub fn sites_snapshot(&self) -> Vec<SiteSnapshot> {
        self.sites
            .iter()
            .map(|record| SiteSnapshot {
                id: record.key().clone(),
                name: record.name.clone(),
                last_update: record.last_update,
                events: record.events.iter().map(Arc::clone).collect(),
            })
            .collect()
    }

    pub fn contains(&self, id: &SiteId) -> bool {
        self.sites.contains_key(id)
    }

    pub fn site_count(&self) -> usize {
        self.sites.len()
    }

    /// Running total of retained events across all sites.
    pub fn total_events(&self) -> u64 {
        self.total_events.load(Ordering::Relaxed)
    }

    /// Subscribe to mutation notifications (monotonic version counter).
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

impl Default for SiteStore {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAP)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
