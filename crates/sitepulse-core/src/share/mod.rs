// ── Share access validation ──
//
// Validates share tokens against the backend with three protections
// stacked in front of it, checked in order:
//
//   1. rate limit per caller (cheapest, rejects before any state lookup)
//   2. outcome cache per token (serves repeats without a fetch)
//   3. circuit breaker per token (stops hammering on a hot uncached token)
//
// Cached outcomes are grants, denials, and not-found — never transient
// failures, which must stay retryable.

pub mod rate_limit;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;

use sitepulse_api::{Error as ApiError, ShareApiClient, ShareRecord};

use crate::config::ValidatorConfig;
use crate::model::{DeniedReason, ShareAccess, ShareKind};

pub use rate_limit::{CallerId, OpClass, RateLimiter, RateLimits};

// ── Errors ───────────────────────────────────────────────────────────

/// Why a validation call could not produce an outcome.
#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    /// The caller exceeded its budget; no backend work was done.
    #[error("rate limited, retry in {retry_after:?}")]
    RateLimited { retry_after: Duration },
    /// Too many recent uncached lookups for this token.
    #[error("share lookups temporarily suspended for this token")]
    CircuitOpen,
    /// The backend has no share with this token.
    #[error("share token not found")]
    NotFound,
    #[error(transparent)]
    Backend(#[from] ApiError),
}

// ── Backend seam ─────────────────────────────────────────────────────

/// Where share records come from. The production impl is the HTTP
/// client; tests swap in an in-memory one.
pub trait ShareBackend {
    fn fetch_share(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Option<ShareRecord>, ApiError>> + Send;

    fn record_access(&self, token: &str) -> impl Future<Output = Result<(), ApiError>> + Send;
}

impl ShareBackend for ShareApiClient {
    async fn fetch_share(&self, token: &str) -> Result<Option<ShareRecord>, ApiError> {
        ShareApiClient::fetch_share(self, token).await
    }

    async fn record_access(&self, token: &str) -> Result<(), ApiError> {
        ShareApiClient::record_access(self, token).await
    }
}

// ── Validator ────────────────────────────────────────────────────────

enum CachedOutcome {
    Access(ShareAccess),
    NotFound,
}

struct CacheEntry {
    outcome: CachedOutcome,
    cached_at: Instant,
}

/// Rate-limited, cached, circuit-broken share token validator.
pub struct ShareAccessValidator<B> {
    backend: B,
    config: ValidatorConfig,
    limiter: RateLimiter,
    cache: Mutex<HashMap<String, CacheEntry>>,
    /// Timestamps of recent backend fetches per token.
    breaker: Mutex<HashMap<String, Vec<Instant>>>,
}

impl<B: ShareBackend> ShareAccessValidator<B> {
    pub fn new(backend: B, config: ValidatorConfig) -> Self {
        let limiter = RateLimiter::new(config.rate_limits);
        Self {
            backend,
            config,
            limiter,
            cache: Mutex::new(HashMap::new()),
            breaker: Mutex::new(HashMap::new()),
        }
    }

    /// Validate `token` on behalf of `caller`.
    ///
    /// `authenticated` says whether the caller has a logged-in identity;
    /// member shares viewed anonymously are denied with
    /// `requires_auth: true` so the UI can prompt for login.
    pub async fn validate(
        &self,
        caller: &CallerId,
        token: &str,
        authenticated: bool,
    ) -> Result<ShareAccess, ShareError> {
        if let Err(retry_after) = self.limiter.try_acquire(caller, OpClass::Validate) {
            return Err(ShareError::RateLimited { retry_after });
        }

        if let Some(outcome) = self.cached(token) {
            tracing::debug!(token, "share validation served from cache");
            return match outcome {
                CachedOutcome::Access(access) => Ok(access),
                CachedOutcome::NotFound => Err(ShareError::NotFound),
            };
        }

        self.admit_fetch(token)?;

        let record = self.backend.fetch_share(token).await?;

        let Some(record) = record else {
            self.remember(token, CachedOutcome::NotFound);
            return Err(ShareError::NotFound);
        };

        let access = evaluate(&record, authenticated);
        self.remember(token, CachedOutcome::Access(access));

        if matches!(access, ShareAccess::Granted(_)) {
            // Access accounting is best-effort; a failed write must not
            // turn a valid grant into an error.
            if let Err(err) = self.backend.record_access(token).await {
                tracing::warn!(token, %err, "failed to record share access");
            }
        }

        Ok(access)
    }

    fn cached(&self, token: &str) -> Option<CachedOutcome> {
        let cache = self.cache.lock().expect("share cache lock poisoned");
        let entry = cache.get(token)?;
        if entry.cached_at.elapsed() < self.config.cache_ttl {
            Some(match entry.outcome {
                CachedOutcome::Access(access) => CachedOutcome::Access(access),
                CachedOutcome::NotFound => CachedOutcome::NotFound,
            })
        } else {
            None
        }
    }

    fn remember(&self, token: &str, outcome: CachedOutcome) {
        let mut cache = self.cache.lock().expect("share cache lock poisoned");
        // Drop expired entries so one-off tokens don't accumulate over a
        // long session.
        cache.retain(|_, entry| entry.cached_at.elapsed() < self.config.cache_ttl);
        cache.insert(
            token.to_owned(),
            CacheEntry {
                outcome,
                cached_at: Instant::now(),
            },
        );
    }

    /// Count this uncached fetch against the token's circuit breaker, or
    /// refuse if the breaker is open.
    fn admit_fetch(&self, token: &str) -> Result<(), ShareError> {
        let now = Instant::now();
        let mut breaker = self.breaker.lock().expect("share breaker lock poisoned");
        // Expire old fetches everywhere; tokens with none left are gone.
        breaker.retain(|_, fetches| {
            fetches.retain(|&at| now.duration_since(at) < self.config.breaker_window);
            !fetches.is_empty()
        });
        let fetches = breaker.entry(token.to_owned()).or_default();

        if fetches.len() >= self.config.breaker_max_fetches as usize {
            tracing::warn!(token, "share lookup circuit open");
            return Err(ShareError::CircuitOpen);
        }
        fetches.push(now);
        Ok(())
    }

    #[cfg(test)]
    fn cache_len(&self) -> usize {
        self.cache.lock().expect("share cache lock poisoned").len()
    }

    #[cfg(test)]
    fn breaker_len(&self) -> usize {
        self.breaker
            .lock()
            .expect("share breaker lock poisoned")
            .len()
    }
}

/// Pure policy: map one share record to its access outcome.
fn evaluate(record: &ShareRecord, authenticated: bool) -> ShareAccess {
    if !record.active {
        return ShareAccess::Denied {
            reason: DeniedReason::Inactive,
            requires_auth: false,
        };
    }

    if record.expires_at.is_some_and(|at| at < Utc::now()) {
        return ShareAccess::Denied {
            reason: DeniedReason::Expired,
            requires_auth: false,
        };
    }

    let kind = ShareKind::from_wire(&record.kind);
    if kind == ShareKind::Member && !authenticated {
        return ShareAccess::Denied {
            reason: DeniedReason::AuthRequired,
            requires_auth: true,
        };
    }

    ShareAccess::Granted(kind)
}

// ── Tests ────────────────────────────────────────────────────────────
