//! Canonical domain types for the analytics state core.

pub mod share;
pub mod site;

pub use share::{CapabilitySet, DeniedReason, ShareAccess, ShareAction, ShareKind};
pub use site::{PathCount, PathTransition, PerfMetrics, SiteEvent, SiteId, TrafficMetrics};
