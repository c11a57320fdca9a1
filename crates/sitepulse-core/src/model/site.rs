// ── Site and event domain types ──
//
// A Site is a tracked source of time-series samples, identified by a
// stable string id. Sites are created lazily on first event and never
// "created" explicitly by a user.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sitepulse_api::frame::MetricsFrame;

// ── SiteId ───────────────────────────────────────────────────────────

/// Stable identifier for a tracked site, e.g. `"site_1"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(String);

impl SiteId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SiteId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SiteId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ── Event ────────────────────────────────────────────────────────────

/// One timestamped analytics sample for a site.
///
/// Immutable once ingested — only retention (age-based pruning or
/// cap-based truncation) ever removes one from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteEvent {
    pub timestamp: DateTime<Utc>,
    pub site_id: SiteId,
    pub site_name: String,
    pub metrics: TrafficMetrics,
    pub performance: PerfMetrics,
    pub top_paths: Vec<PathCount>,
    pub transitions: Vec<PathTransition>,
}

/// Core traffic metrics of one sample.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrafficMetrics {
    pub page_views: u64,
    pub unique_visitors: u64,
    /// Fraction of single-page sessions, always in [0, 1].
    pub bounce_rate: f64,
    /// Average session duration in seconds.
    pub avg_session_secs: f64,
}

/// Page performance timings, milliseconds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PerfMetrics {
    pub load_ms: f64,
    pub fcp_ms: f64,
    pub lcp_ms: f64,
    pub ttfb_ms: f64,
}

/// A path and its view count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathCount {
    pub path: String,
    pub views: u64,
}

/// A directed transition count between two paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathTransition {
    pub from: String,
    pub to: String,
    pub count: u64,
}

impl From<MetricsFrame> for SiteEvent {
    fn from(frame: MetricsFrame) -> Self {
        Self {
            timestamp: frame.timestamp,
            site_id: SiteId::new(frame.site_id),
            site_name: frame.site_name,
            metrics: TrafficMetrics {
                page_views: frame.traffic.page_views,
                unique_visitors: frame.traffic.unique_visitors,
                // Misbehaving producers occasionally send >1 here.
                bounce_rate: frame.traffic.bounce_rate.clamp(0.0, 1.0),
                avg_session_secs: frame.traffic.avg_session_duration,
            },
            performance: PerfMetrics {
                load_ms: frame.performance.load_time,
                fcp_ms: frame.performance.first_contentful_paint,
                lcp_ms: frame.performance.largest_contentful_paint,
                ttfb_ms: frame.performance.time_to_first_byte,
            },
            top_paths: frame
                .top_paths
                .into_iter()
                .map(|p| PathCount {
                    path: p.path,
                    views: p.views,
                })
                .collect(),
            transitions: frame
                .transitions
                .into_iter()
                .map(|t| PathTransition {
                    from: t.from,
                    to: t.to,
                    count: t.count,
                })
                .collect(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
