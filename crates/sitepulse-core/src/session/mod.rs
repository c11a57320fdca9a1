// ── Session state: selection resolution + sharing guard ──
//
// One watch channel holds the whole ViewState (selection, filters, date
// range); another holds the sharing mode. Every mutator is capability-
// checked against the mode. Denied calls are silent, observable no-ops —
// a shared viewer sees absence of effect, never an exception.

pub mod view;

use std::sync::Mutex;

use tokio::sync::watch;

use crate::model::{CapabilitySet, ShareAction, ShareKind, SiteId};
use crate::store::SiteStore;

pub use view::{DateRange, Selection, SharingMode, ViewFilters, ViewState};

// ── Outcomes ─────────────────────────────────────────────────────────

/// Observable result of a `select` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// The site exists; selection is confirmed.
    Confirmed,
    /// The site is unknown so far; recorded as pending, confirmed
    /// selection untouched.
    Pending,
    /// Capability check failed; state unchanged.
    Denied,
}

/// Observable result of a guarded mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied,
    /// Capability check failed; state unchanged.
    Denied,
}

// ── SessionState ─────────────────────────────────────────────────────

/// Selection resolver and sharing guard over one `ViewState`.
///
/// All operations are synchronous and fast; they are called from the
/// ingest path and from UI-facing engine methods.
pub struct SessionState {
    view: watch::Sender<ViewState>,
    mode: watch::Sender<SharingMode>,
    /// Pre-`enter_shared` snapshot, restored exactly on `exit_shared`.
    saved: Mutex<Option<ViewState>>,
}

impl SessionState {
    pub fn new() -> Self {
        let (view, _) = watch::channel(ViewState::default());
        let (mode, _) = watch::channel(SharingMode::Normal);
        Self {
            view,
            mode,
            saved: Mutex::new(None),
        }
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn view(&self) -> ViewState {
        self.view.borrow().clone()
    }

    pub fn subscribe_view(&self) -> watch::Receiver<ViewState> {
        self.view.subscribe()
    }

    pub fn mode(&self) -> SharingMode {
        *self.mode.borrow()
    }

    pub fn subscribe_mode(&self) -> watch::Receiver<SharingMode> {
        self.mode.subscribe()
    }

    // ── Selection resolver ───────────────────────────────────────────

    /// Point the selection at `id`.
    ///
    /// If the site already exists in `store` the selection is confirmed
    /// immediately and any pending id is cleared. Otherwise the id is
    /// recorded as pending and the confirmed selection stays put, so the
    /// UI keeps showing the last valid site.
    ///
    /// `force` bypasses the capability check; it exists for internal
    /// restore paths and must not be exposed to shared viewers.
    pub fn select(&self, store: &SiteStore, id: SiteId, force: bool) -> SelectOutcome {
        if !force && !self.check_permission(ShareAction::SelectSite) {
            tracing::debug!(site = %id, "select denied in shared mode");
            return SelectOutcome::Denied;
        }

        if store.contains(&id) {
            self.view.send_if_modified(|v| {
                let changed = v.selection.confirmed.as_ref() != Some(&id)
                    || v.selection.pending.is_some();
                v.selection.confirmed = Some(id.clone());
                v.selection.pending = None;
                changed
            });
            SelectOutcome::Confirmed
        } else {
            self.view.send_if_modified(|v| {
                let changed = v.selection.pending.as_ref() != Some(&id);
                v.selection.pending = Some(id.clone());
                changed
            });
            SelectOutcome::Pending
        }
    }

    /// Promote a pending selection whose site just appeared.
    ///
    /// Called synchronously from the ingest path so promotion happens in
    /// the same logical step as the ingest that satisfies it — there is
    /// no observable state where neither the old nor the new selection
    /// is set.
    pub fn resolve_pending(&self, arrived: &SiteId) {
        self.view.send_if_modified(|v| {
            if v.selection.pending.as_ref() == Some(arrived) {
                v.selection.confirmed = v.selection.pending.take();
                tracing::debug!(site = %arrived, "pending selection promoted");
                true
            } else {
                false
            }
        });
    }

    /// Clear both confirmed and pending selection.
    pub fn clear_selection(&self) -> MutationOutcome {
        if !self.check_permission(ShareAction::SelectSite) {
            tracing::debug!("clear_selection denied in shared mode");
            return MutationOutcome::Denied;
        }
        self.view.send_if_modified(|v| {
            let changed = v.selection != Selection::default();
            v.selection = Selection::default();
            changed
        });
        MutationOutcome::Applied
    }

    // ── Guarded view mutators ────────────────────────────────────────

    pub fn set_filters(&self, filters: ViewFilters) -> MutationOutcome {
        if !self.check_permission(ShareAction::ApplyFilters) {
            tracing::debug!("set_filters denied in shared mode");
            return MutationOutcome::Denied;
        }
        self.view.send_if_modified(|v| {
            let changed = v.filters != filters;
            v.filters = filters.clone();
            changed
        });
        MutationOutcome::Applied
    }

    pub fn set_date_range(&self, range: DateRange) -> MutationOutcome {
        if !self.check_permission(ShareAction::ApplyFilters) {
            tracing::debug!("set_date_range denied in shared mode");
            return MutationOutcome::Denied;
        }
        self.view.send_if_modified(|v| {
            let changed = v.date_range != range;
            v.date_range = range;
            changed
        });
        MutationOutcome::Applied
    }

    // ── Sharing guard ────────────────────────────────────────────────

    /// Enter shared mode: snapshot the current `ViewState`, then derive
    /// capabilities from `kind`.
    ///
    /// Re-entry while already shared keeps the original snapshot —
    /// overwriting it would make `exit_shared` restore shared-mode state.
    pub fn enter_shared(&self, kind: ShareKind) {
        let mut saved = self.saved.lock().expect("session snapshot lock poisoned");
        if matches!(*self.mode.borrow(), SharingMode::Shared { .. }) {
            tracing::warn!("enter_shared while already shared, keeping original snapshot");
            let _ = self.mode.send(SharingMode::Shared { kind });
            return;
        }

        *saved = Some(self.view.borrow().clone());
        let _ = self.mode.send(SharingMode::Shared { kind });
        tracing::info!(?kind, "entered shared mode");
    }

    /// Exit shared mode, restoring exactly the pre-entry snapshot.
    ///
    /// Whatever a shared viewer navigated to while shared is discarded —
    /// the host's working state must not be corrupted by a visitor's
    /// incidental clicks. No-op without a prior `enter_shared`.
    pub fn exit_shared(&self) {
        let mut saved = self.saved.lock().expect("session snapshot lock poisoned");
        if matches!(*self.mode.borrow(), SharingMode::Normal) {
            tracing::debug!("exit_shared without enter_shared, ignoring");
            return;
        }

        if let Some(snapshot) = saved.take() {
            self.view.send_replace(snapshot);
        }
        let _ = self.mode.send(SharingMode::Normal);
        tracing::info!("exited shared mode, view state restored");
    }

    /// Pure capability query. Always `true` in normal mode; in shared
    /// mode, the flag from the capability set derived from the share
    /// kind.
    pub fn check_permission(&self, action: ShareAction) -> bool {
        match *self.mode.borrow() {
            SharingMode::Normal => true,
            SharingMode::Shared { kind } => CapabilitySet::for_kind(kind).allows(action),
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────────
