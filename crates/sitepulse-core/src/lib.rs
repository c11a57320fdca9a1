// sitepulse-core: Reactive state layer between sitepulse-api and UI consumers.

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod session;
pub mod share;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{EngineConfig, ValidatorConfig};
pub use engine::Engine;
pub use error::CoreError;
pub use session::{
    DateRange, MutationOutcome, SelectOutcome, SessionState, SharingMode, ViewFilters, ViewState,
};
pub use share::{CallerId, OpClass, RateLimits, ShareAccessValidator, ShareBackend, ShareError};
pub use store::{SiteSnapshot, SiteStore};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    CapabilitySet, DeniedReason, PathCount, PathTransition, PerfMetrics, ShareAccess, ShareAction,
    ShareKind, SiteEvent, SiteId, TrafficMetrics,
};

// Connection state comes from the transport crate; re-export it so UI
// code only depends on sitepulse-core.
pub use sitepulse_api::{ConnectionState, ReconnectConfig};
