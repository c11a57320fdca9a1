// ── Sharing domain types ──
//
// Share kinds, the capability sets they grant, and validation outcomes.
// The capability mapping is fixed: member shares keep full interaction,
// public shares are strictly read-only.

use serde::{Deserialize, Serialize};

// ── ShareKind ────────────────────────────────────────────────────────

/// What kind of share link granted the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareKind {
    /// Anonymous read-only link.
    Public,
    /// Link for an authenticated workspace member; full interaction.
    Member,
}

impl ShareKind {
    /// Parse the backend's wire string. Unknown kinds collapse to
    /// `Public` — the most restrictive interpretation.
    pub fn from_wire(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("member") {
            Self::Member
        } else {
            Self::Public
        }
    }
}

// ── Actions and capabilities ─────────────────────────────────────────

/// Mutating actions gated by the sharing guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShareAction {
    SelectSite,
    ApplyFilters,
    Export,
    Share,
    ModifySettings,
}

/// The set of actions a shared session may perform.
///
/// Derived deterministically from [`ShareKind`] — never configured
/// per-session, so a public viewer can never be escalated by accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilitySet {
    pub select_site: bool,
    pub apply_filters: bool,
    pub export: bool,
    pub share: bool,
    pub modify_settings: bool,
}

impl CapabilitySet {
    pub fn for_kind(kind: ShareKind) -> Self {
        match kind {
            ShareKind::Member => Self {
                select_site: true,
                apply_filters: true,
                export: true,
                share: true,
                modify_settings: true,
            },
            ShareKind::Public => Self {
                select_site: false,
                apply_filters: false,
                export: false,
                share: false,
                modify_settings: false,
            },
        }
    }

    pub fn allows(&self, action: ShareAction) -> bool {
        match action {
            ShareAction::SelectSite => self.select_site,
            ShareAction::ApplyFilters => self.apply_filters,
            ShareAction::Export => self.export,
            ShareAction::Share => self.share,
            ShareAction::ModifySettings => self.modify_settings,
        }
    }
}

// ── Validation outcomes ──────────────────────────────────────────────

/// Outcome of validating a share token against the backend.
///
/// Both variants are *successful* validations — errors (rate limit,
/// circuit breaker, unknown token, backend failure) live in
/// [`ShareError`](crate::share::ShareError) so callers can message each
/// case differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareAccess {
    Granted(ShareKind),
    Denied {
        reason: DeniedReason,
        /// `true` when logging in would resolve the denial (member share
        /// viewed anonymously) — the UI prompts for auth instead of
        /// showing a dead end.
        requires_auth: bool,
    },
}

/// Why a known share token was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeniedReason {
    /// Owner revoked the share.
    Inactive,
    /// The share's expiry timestamp has passed.
    Expired,
    /// Member-only share requested without authentication.
    AuthRequired,
}

// ── Tests ────────────────────────────────────────────────────────────
