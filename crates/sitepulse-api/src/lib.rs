//! Transport layer for the sitepulse analytics core.
//!
//! Two external surfaces live here, both treated as opaque collaborators
//! by `sitepulse-core`:
//!
//! - **[`websocket`]** — the live metrics stream. One socket per
//!   [`StreamHandle`], decoded [`MetricsFrame`]s fanned out through a
//!   broadcast channel, connection status published through a `watch`
//!   channel, bounded automatic reconnection with a fixed delay.
//! - **[`share`]** — the hosted share-persistence backend.
//!   [`ShareApiClient`] fetches share records by token and bumps their
//!   access counters.
//!
//! Wire-format details stay in this crate; `sitepulse-core` only sees
//! typed frames and records.

pub mod error;
pub mod frame;
pub mod share;
pub mod websocket;

pub use error::Error;
pub use frame::{MetricsFrame, PathCount, PathTransition, PerfTimings, TrafficCounters};
pub use share::{ShareApiClient, ShareRecord};
pub use websocket::{ConnectionState, ReconnectConfig, StreamHandle};
