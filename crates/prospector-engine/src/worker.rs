//! Runs a single task: input, reservation, rate-limited retried call,
//! settlement.

use crate::rate_limit::RateLimiter;
use crate::retry::{RetryContext, RetryExecutor, RetryStatus};
use crate::task::CancelSignal;
use prospector_budget::{BudgetError, BudgetLedger, Reservation, ReserveOutcome, Settlement};
use prospector_collector::{
    Collector, CollectorInput, CollectorResult, SkipReason, Subject, TaskUsage,
};
use prospector_core::{BudgetStrategy, CollectorKind, Cost, RequestId, RunId, Timestamp};
use serde_json::Value;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Executes tasks for one request.
///
/// Every path out of [`run`](Self::run) closes the task's reservation, so
/// no budget stays held once the task is terminal.
#[derive(Debug, Clone)]
pub struct TaskRunner {
    request_id: RequestId,
    run_id: RunId,
    ledger: Arc<BudgetLedger>,
    cancel: CancelSignal,
    deadline: Instant,
    headroom_pct: u32,
    strategy: BudgetStrategy,
    economy_batch_size: usize,
}

impl TaskRunner {
    /// Runner for one request.
    #[must_use]
    pub fn new(
        request_id: RequestId,
        run_id: RunId,
        ledger: Arc<BudgetLedger>,
        cancel: CancelSignal,
        deadline: Instant,
    ) -> Self {
        Self {
            request_id,
            run_id,
            ledger,
            cancel,
            deadline,
            headroom_pct: 0,
            strategy: BudgetStrategy::default(),
            economy_batch_size: 5,
        }
    }

    /// Reserve `pct` percent above each estimate.
    #[must_use]
    pub fn with_headroom_pct(mut self, pct: u32) -> Self {
        self.headroom_pct = pct;
        self
    }

    /// Size inputs against the budget with `strategy`.
    #[must_use]
    pub fn with_budget_strategy(
        mut self,
        strategy: BudgetStrategy,
        economy_batch_size: usize,
    ) -> Self {
        self.strategy = strategy;
        self.economy_batch_size = economy_batch_size.max(1);
        self
    }

    /// Run `collector` to a terminal result.
    pub async fn run(
        &self,
        collector: Arc<dyn Collector>,
        subject: &Subject,
        upstream: Option<Value>,
        limiter: Option<Arc<RateLimiter>>,
    ) -> CollectorResult {
        let kind = collector.kind();

        let input = match collector.build_input(subject, upstream.as_ref()) {
            Ok(input) => input,
            Err(e) => {
                debug!(kind = %kind, error = %e, "could not build collector input");
                return CollectorResult::failed(kind, &e, TaskUsage::none(Timestamp::now()));
            }
        };

        let input = match self.strategy {
            BudgetStrategy::Cost => collector
                .shrink_input(&input, self.economy_batch_size)
                .unwrap_or(input),
            BudgetStrategy::Balanced | BudgetStrategy::Quality => input,
        };

        let (input, reservation) = match self.reserve(collector.as_ref(), input) {
            Ok(reserved) => reserved,
            Err(reason) => return CollectorResult::skipped(kind, reason, Timestamp::now()),
        };

        let started_at = Timestamp::now();
        let executor = RetryExecutor::new(collector.definition().retry.clone());
        let outcome = executor
            .execute(
                collector.as_ref(),
                &input,
                &self.ledger,
                &reservation,
                RetryContext {
                    request_id: &self.request_id,
                    run_id: self.run_id,
                    deadline: self.deadline,
                    cancel: &self.cancel,
                    limiter: limiter.as_deref(),
                },
            )
            .await;

        if !outcome.overrun.is_zero() {
            warn!(
                request_id = %self.request_id,
                kind = %kind,
                overrun = %outcome.overrun,
                "provider charged beyond the remaining budget"
            );
        }

        let attempts = outcome.attempts;
        match outcome.status {
            RetryStatus::Succeeded(payload) => {
                let reported = outcome.cost + outcome.overrun;
                let settlement = self.commit(reservation, reported);
                let usage = usage(settlement, attempts, started_at);
                CollectorResult::succeeded(kind, payload, usage)
            }
            RetryStatus::Failed(error) => {
                let settlement = self.release(reservation);
                let usage = usage(settlement, attempts, started_at);
                CollectorResult::failed(kind, &error, usage)
            }
            RetryStatus::Cancelled(reason) => {
                let settlement = self.release(reservation);
                let usage = usage(settlement, attempts, started_at);
                CollectorResult::cancelled(kind, reason, usage)
            }
        }
    }

    /// Reserve budget for `input`, trimming its batch when the strategy
    /// allows and the full batch is denied.
    fn reserve(
        &self,
        collector: &dyn Collector,
        input: CollectorInput,
    ) -> Result<(CollectorInput, Reservation), SkipReason> {
        let kind = collector.kind();
        let estimate = self.estimate(collector, &input);
        let (requested, mut remaining) = match self.ledger.reserve(kind, estimate) {
            ReserveOutcome::Allowed(reservation) => return Ok((input, reservation)),
            ReserveOutcome::Denied {
                requested,
                remaining,
            } => (requested, remaining),
        };
        let denied = SkipReason::BudgetExhausted {
            requested,
            remaining,
        };
        if !self.strategy.trims_to_fit() {
            return Err(denied);
        }

        let full = usize::try_from(input.units()).unwrap_or(usize::MAX);
        for max_items in (1..full).rev() {
            let Some(trimmed) = collector.shrink_input(&input, max_items) else {
                break;
            };
            let estimate = self.estimate(collector, &trimmed);
            if estimate > remaining {
                continue;
            }
            match self.ledger.reserve(kind, estimate) {
                ReserveOutcome::Allowed(reservation) => {
                    info!(
                        request_id = %self.request_id,
                        kind = %kind,
                        requested = full,
                        kept = max_items,
                        estimate = %estimate,
                        "trimmed collector input to fit the budget"
                    );
                    return Ok((trimmed, reservation));
                }
                ReserveOutcome::Denied { remaining: now, .. } => remaining = now,
            }
        }
        Err(denied)
    }

    fn estimate(&self, collector: &dyn Collector, input: &CollectorInput) -> Cost {
        collector
            .estimate_cost(input)
            .with_headroom_pct(self.headroom_pct)
    }

    fn commit(&self, reservation: Reservation, actual: Cost) -> Settlement {
        let kind = reservation.kind();
        self.ledger
            .commit(reservation, actual)
            .unwrap_or_else(|e| self.lost(kind, &e))
    }

    fn release(&self, reservation: Reservation) -> Settlement {
        let kind = reservation.kind();
        self.ledger
            .release(reservation)
            .unwrap_or_else(|e| self.lost(kind, &e))
    }

    fn lost(&self, kind: CollectorKind, error: &BudgetError) -> Settlement {
        warn!(
            request_id = %self.request_id,
            kind = %kind,
            error = %error,
            "failed to settle reservation"
        );
        Settlement {
            spent: Cost::ZERO,
            released: Cost::ZERO,
            overrun: Cost::ZERO,
        }
    }
}

fn usage(settlement: Settlement, attempts: u32, started_at: Timestamp) -> TaskUsage {
    TaskUsage {
        cost: settlement.spent,
        overrun: settlement.overrun,
        attempts,
        started_at: Some(started_at),
        finished_at: Timestamp::now(),
    }
}
