// ── Engine configuration ──
//
// Plain constructed values; this crate never reads disk or environment.
// The embedding application decides where settings come from and hands
// them in fully formed.

use std::time::Duration;

use url::Url;

use sitepulse_api::ReconnectConfig;

use crate::share::RateLimits;
use crate::store::DEFAULT_EVENT_CAP;

/// Everything the engine needs to run: where to stream from, how to
/// reconnect, and how much to retain.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// WebSocket endpoint emitting metrics frames.
    pub stream_url: Url,
    pub reconnect: ReconnectConfig,
    /// Maximum retained events per site.
    pub event_cap: usize,
    /// Events older than this are pruned.
    pub prune_max_age: chrono::Duration,
    /// How often the background prune pass runs.
    pub prune_interval: Duration,
}

impl EngineConfig {
    pub fn new(stream_url: Url) -> Self {
        Self {
            stream_url,
            reconnect: ReconnectConfig::default(),
            event_cap: DEFAULT_EVENT_CAP,
            prune_max_age: chrono::Duration::hours(24),
            prune_interval: Duration::from_secs(60),
        }
    }
}

/// Tuning for the share access validator.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// How long a validation outcome stays served from cache.
    pub cache_ttl: Duration,
    /// Backend fetches allowed per token inside `breaker_window` before
    /// the circuit opens for that token.
    pub breaker_max_fetches: u32,
    pub breaker_window: Duration,
    pub rate_limits: RateLimits,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(30),
            breaker_max_fetches: 5,
            breaker_window: Duration::from_secs(10),
            rate_limits: RateLimits::default(),
        }
    }
}
