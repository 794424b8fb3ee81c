//! Provider-level rate limiting shared across requests.

use prospector_collector::CollectorRegistry;
use prospector_core::CollectorKind;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Spaces calls to one provider at least `min_interval` apart.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    next_slot: AsyncMutex<Option<Instant>>,
}

impl RateLimiter {
    /// Limiter with an explicit minimum interval.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: AsyncMutex::new(None),
        }
    }

    /// Limiter allowing `calls` per minute.
    #[must_use]
    pub fn per_minute(calls: u32) -> Self {
        Self::new(Duration::from_secs(60) / calls.max(1))
    }

    /// Minimum spacing between calls.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait for the next call slot.
    ///
    /// The slot is claimed before waiting, so concurrent callers queue up
    /// one interval apart. Returns `false` if `cancel` fired first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> bool {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = next.map_or(now, |n| n.max(now));
            *next = Some(slot + self.min_interval);
            slot
        };

        let wait = slot.saturating_duration_since(Instant::now());
        if wait.is_zero() {
            return !cancel.is_cancelled();
        }

        debug!("Rate limiting: waiting {:?}", wait);
        tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            () = tokio::time::sleep_until(slot) => true,
        }
    }
}

/// One [`RateLimiter`] per collector kind.
///
/// Share one instance (it is cheap to clone) between every orchestrator
/// that talks to the same providers.
#[derive(Debug, Clone, Default)]
pub struct ProviderLimiters {
    limiters: Arc<Mutex<HashMap<CollectorKind, Arc<RateLimiter>>>>,
}

impl ProviderLimiters {
    /// Empty set; kinds get limiters on first use.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Limiters for every rate-limited collector in `registry`.
    #[must_use]
    pub fn from_registry(registry: &CollectorRegistry) -> Self {
        let limiters = Self::new();
        for definition in registry.definitions() {
            if let Some(per_minute) = definition.collector.rate_limit_per_minute {
                limiters.get_or_create(definition.kind(), per_minute);
            }
        }
        limiters
    }

    /// Limiter for `kind`, created at `per_minute` if missing.
    #[must_use]
    pub fn get_or_create(&self, kind: CollectorKind, per_minute: u32) -> Arc<RateLimiter> {
        let mut limiters = self.limiters.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            limiters
                .entry(kind)
                .or_insert_with(|| Arc::new(RateLimiter::per_minute(per_minute))),
        )
    }

    /// Existing limiter for `kind`.
    #[must_use]
    pub fn get(&self, kind: CollectorKind) -> Option<Arc<RateLimiter>> {
        self.limiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
    }

    /// Number of kinds with a limiter.
    #[must_use]
    pub fn len(&self) -> usize {
        self.limiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no limiter exists yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
