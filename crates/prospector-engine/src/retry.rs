//! Bounded retries with exponential backoff for one collector call.

use crate::rate_limit::RateLimiter;
use crate::task::CancelSignal;
use prospector_budget::{BudgetLedger, Reservation};
use prospector_collector::{
    CallContext, CallFailure, CancelReason, Collector, CollectorError, CollectorInput,
    RetryPolicy,
};
use prospector_core::{Cost, RequestId, RunId};
use rand::Rng;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// How a retried call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStatus {
    /// An attempt returned data
    Succeeded(Value),
    /// The last attempt failed and no further attempt was made
    Failed(CollectorError),
    /// The request deadline or an abort stopped the call
    Cancelled(CancelReason),
}

/// Outcome of [`RetryExecutor::execute`].
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome {
    /// Final status
    pub status: RetryStatus,
    /// Attempts made
    pub attempts: u32,
    /// Attempt cost recorded against the ledger
    pub cost: Cost,
    /// Attempt cost the ledger could not absorb
    pub overrun: Cost,
}

/// Request-level context for a retried call.
#[derive(Debug, Clone, Copy)]
pub struct RetryContext<'a> {
    /// Request being served
    pub request_id: &'a RequestId,
    /// Run executing the request
    pub run_id: RunId,
    /// Absolute request deadline
    pub deadline: Instant,
    /// Request cancellation
    pub cancel: &'a CancelSignal,
    /// Provider call spacing, awaited before every attempt
    pub limiter: Option<&'a RateLimiter>,
}

/// Runs one collector call under a [`RetryPolicy`].
///
/// Transient failures are retried after `base * 2^(attempt-1)` (capped at
/// the policy maximum, jittered, and never shorter than a provider's
/// `Retry-After`). Non-retryable failures stop immediately. Every attempt
/// waits for the provider's rate limiter, runs under
/// `min(call_timeout, deadline - now)` and has its cost charged to the
/// ledger, even when the attempt fails.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Executor for `policy`.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Policy in use.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Delay before the attempt following `attempt` (1-based).
    pub fn backoff_delay<R: Rng + ?Sized>(
        &self,
        attempt: u32,
        retry_after: Option<Duration>,
        rng: &mut R,
    ) -> Duration {
        let base = self.policy.base_backoff();
        let max = self.policy.max_backoff();

        let factor = 1_u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        let exponential = base.checked_mul(factor).unwrap_or(max).min(max);

        let jitter = self.policy.jitter;
        let jittered = if jitter > 0.0 {
            exponential
                .mul_f64(rng.gen_range(1.0 - jitter..=1.0 + jitter))
                .min(max)
        } else {
            exponential
        };

        retry_after.map_or(jittered, |hint| jittered.max(hint))
    }

    /// Call `collector` until it succeeds, fails permanently, runs out of
    /// attempts, or the request is cancelled.
    pub async fn execute(
        &self,
        collector: &dyn Collector,
        input: &CollectorInput,
        ledger: &BudgetLedger,
        reservation: &Reservation,
        ctx: RetryContext<'_>,
    ) -> RetryOutcome {
        let kind = collector.kind();
        let mut outcome = RetryOutcome {
            status: RetryStatus::Cancelled(CancelReason::Aborted),
            attempts: 0,
            cost: Cost::ZERO,
            overrun: Cost::ZERO,
        };

        loop {
            if let Some(reason) = ctx.cancel.reason() {
                outcome.status = RetryStatus::Cancelled(reason);
                return outcome;
            }

            if let Some(limiter) = ctx.limiter {
                if !limiter.acquire(ctx.cancel.token()).await {
                    let reason = ctx.cancel.reason().unwrap_or(CancelReason::Aborted);
                    outcome.status = RetryStatus::Cancelled(reason);
                    return outcome;
                }
            }

            let now = Instant::now();
            let remaining = ctx.deadline.saturating_duration_since(now);
            if remaining.is_zero() {
                outcome.status = RetryStatus::Cancelled(CancelReason::Deadline);
                return outcome;
            }

            outcome.attempts += 1;
            let attempt = outcome.attempts;
            let call_timeout = self.policy.call_timeout();
            let limit = call_timeout.min(remaining);
            let cut_by_deadline = remaining <= call_timeout;

            let call_ctx = CallContext {
                request_id: ctx.request_id.clone(),
                run_id: ctx.run_id,
                kind,
                attempt,
                deadline: ctx.deadline,
                max_charge: reservation.amount(),
                cancel: ctx.cancel.token().clone(),
            };

            debug!(kind = %kind, attempt, timeout_ms = limit.as_millis(), "calling collector");
            let result = tokio::select! {
                biased;
                reason = ctx.cancel.cancelled() => {
                    outcome.status = RetryStatus::Cancelled(reason);
                    return outcome;
                }
                r = tokio::time::timeout(limit, collector.call(input, &call_ctx)) => r,
            };

            let error = match result {
                Err(_) if cut_by_deadline => {
                    debug!(kind = %kind, attempt, "attempt cut short by request deadline");
                    outcome.status = RetryStatus::Cancelled(CancelReason::Deadline);
                    return outcome;
                }
                Err(_) => CollectorError::Timeout {
                    elapsed_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                },
                Ok(Ok(output)) => {
                    charge(ledger, reservation, output.cost, &mut outcome);
                    outcome.status = RetryStatus::Succeeded(output.payload);
                    return outcome;
                }
                Ok(Err(CallFailure { error, cost })) => {
                    charge(ledger, reservation, cost, &mut outcome);
                    error
                }
            };

            if !collector.is_retryable(&error) {
                debug!(kind = %kind, attempt, error = %error, "non-retryable failure");
                outcome.status = RetryStatus::Failed(error);
                return outcome;
            }
            if attempt >= self.policy.max_attempts {
                warn!(kind = %kind, attempts = attempt, error = %error, "retries exhausted");
                outcome.status = RetryStatus::Failed(error);
                return outcome;
            }

            let delay = self.backoff_delay(attempt, error.retry_after(), &mut rand::thread_rng());
            if Instant::now() + delay >= ctx.deadline {
                warn!(
                    kind = %kind,
                    attempt,
                    error = %error,
                    "next attempt would pass the request deadline; giving up"
                );
                outcome.status = RetryStatus::Failed(error);
                return outcome;
            }

            warn!(
                kind = %kind,
                attempt,
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis(),
                error = %error,
                "collector call failed, retrying"
            );

            tokio::select! {
                biased;
                reason = ctx.cancel.cancelled() => {
                    outcome.status = RetryStatus::Cancelled(reason);
                    return outcome;
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

fn charge(
    ledger: &BudgetLedger,
    reservation: &Reservation,
    cost: Cost,
    outcome: &mut RetryOutcome,
) {
    if cost.is_zero() {
        return;
    }
    match ledger.charge(reservation, cost) {
        Ok(receipt) => {
            outcome.cost += receipt.recorded;
            outcome.overrun += receipt.overrun;
        }
        Err(e) => warn!(
            kind = %reservation.kind(),
            error = %e,
            "failed to record attempt cost"
        ),
    }
}
