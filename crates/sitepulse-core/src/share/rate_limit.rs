// ── Sliding-window rate limiter ──
//
// Limits share operations per caller identity, not per share token —
// limiting by token would let one noisy token starve every caller, and
// let one caller spread load across many tokens unchecked.
//
// Uses `tokio::time::Instant` so tests can drive the window with the
// paused clock.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Who is making the call. Anonymous viewers are bucketed together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallerId {
    User(String),
    Anonymous,
}

/// Classes of share operations with independent budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpClass {
    Create,
    Read,
    Validate,
}

/// Per-class budget over one sliding window.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    pub window: Duration,
    pub create: u32,
    pub read: u32,
    pub validate: u32,
}

impl RateLimits {
    fn budget(&self, class: OpClass) -> u32 {
        match class {
            OpClass::Create => self.create,
            OpClass::Read => self.read,
            OpClass::Validate => self.validate,
        }
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            create: 10,
            read: 60,
            validate: 30,
        }
    }
}

/// Sliding-window limiter keyed by `(caller, operation class)`.
///
/// Each key holds the timestamps of its calls inside the current window;
/// a call is admitted when fewer than the class budget remain after
/// expiring old entries. Rejection reports how long until the oldest
/// retained call leaves the window.
pub struct RateLimiter {
    limits: RateLimits,
    windows: Mutex<HashMap<(CallerId, OpClass), Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(limits: RateLimits) -> Self {
        Self {
            limits,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or reject one call. On rejection returns the duration after
    /// which retrying can succeed.
    pub fn try_acquire(&self, caller: &CallerId, class: OpClass) -> Result<(), Duration> {
        let now = Instant::now();
        let budget = self.limits.budget(class) as usize;

        let mut windows = self.windows.lock().expect("rate limiter lock poisoned");
        let calls = windows
            .entry((caller.clone(), class))
            .or_default();

        calls.retain(|&at| now.duration_since(at) < self.limits.window);

        if calls.len() < budget {
            calls.push(now);
            return Ok(());
        }

        // Entries are in insertion order, so the first is the oldest. A
        // zero budget has no entries to age out; the class is disabled
        // and retrying never helps sooner than a full window.
        let Some(&oldest) = calls.first() else {
            tracing::debug!(?caller, ?class, "operation class has zero budget");
            return Err(self.limits.window);
        };
        let retry_after = self
            .limits
            .window
            .saturating_sub(now.duration_since(oldest));
        tracing::debug!(?caller, ?class, ?retry_after, "rate limit exceeded");
        Err(retry_after)
    }
}
