// ── View state value types ──
//
// Selection, filters, and date range travel together as one immutable
// ViewState value. The sharing guard snapshots and restores the whole
// value atomically — never field-by-field — so a restore can't observe
// a half-old, half-new state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{ShareKind, SiteId};

// ── Selection ────────────────────────────────────────────────────────

/// The user's "current site" intent.
///
/// `confirmed` always names a site that existed in the store when it was
/// set. `pending` names a site the user asked for before any event for it
/// arrived; it is promoted to confirmed the instant the site appears and
/// cleared otherwise only by explicit user action. Both may be `None`;
/// pending never replaces confirmed until promotion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub confirmed: Option<SiteId>,
    pub pending: Option<SiteId>,
}

impl Selection {
    /// The site the UI should currently display.
    pub fn current(&self) -> Option<&SiteId> {
        self.confirmed.as_ref()
    }
}

// ── Filters and date range ───────────────────────────────────────────

/// Display filters applied by the rendering layer to store snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewFilters {
    /// Substring match on path names.
    pub path_query: Option<String>,
    /// Hide samples below this page-view count.
    pub min_page_views: Option<u64>,
}

/// Inclusive UTC time window the dashboard is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// The trailing window ending now.
    pub fn last(duration: Duration) -> Self {
        let end = Utc::now();
        Self {
            start: end - duration,
            end,
        }
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self::last(Duration::hours(24))
    }
}

// ── ViewState ────────────────────────────────────────────────────────

/// Everything the sharing guard must snapshot on `enter_shared` and
/// restore byte-for-byte on `exit_shared`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    pub selection: Selection,
    pub filters: ViewFilters,
    pub date_range: DateRange,
}

// ── SharingMode ──────────────────────────────────────────────────────

/// Whether the session is the owner's own view or a shared one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SharingMode {
    #[default]
    Normal,
    Shared {
        kind: ShareKind,
    },
}
