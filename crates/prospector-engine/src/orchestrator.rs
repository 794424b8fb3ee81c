//! Request orchestrator coordinating collector tasks.
//!
//! The [`Orchestrator`] turns a [`Request`] into an execution plan, runs the
//! planned tasks on a bounded worker pool in dependency order, and hands the
//! aggregated, scored envelope to the configured sink.

use crate::aggregate::{aggregate, RunMeta};
use crate::error::{EngineError, Result};
use crate::plan::ExecutionPlan;
use crate::rate_limit::{ProviderLimiters, RateLimiter};
use crate::request::Request;
use crate::task::{CancelSignal, TaskTable};
use crate::worker::TaskRunner;
use futures::stream::{FuturesUnordered, StreamExt};
use prospector_budget::{BudgetLedger, LedgerSnapshot};
use prospector_collector::{
    AggregatedEnvelope, CancelReason, CollectorError, CollectorRegistry, CollectorResult,
    SkipReason, Subject, TaskUsage,
};
use prospector_core::{
    AppConfig, BudgetStrategy, CollectorKind, Cost, RequestId, RunId, Timestamp,
};
use prospector_quality::{QualitySchema, QualityScore, QualityScorer, ScoringSettings};
use prospector_sink::{ResultSink, SinkAck};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default number of collector calls in flight per request.
const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Default request deadline.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default request budget in USD.
const DEFAULT_BUDGET_USD: f64 = 100.0;

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// Validating the request and building the plan
    Planning,
    /// Tasks are running
    Executing,
    /// Aggregating, scoring and storing
    Finalizing,
    /// Finished, successfully or not
    Done,
}

/// What happened when the report was handed to the sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SinkStatus {
    /// No sink is configured
    NotConfigured,
    /// The sink acknowledged the report
    Stored(SinkAck),
    /// The sink refused or failed; the envelope is still returned
    Failed {
        /// Sink error
        error: String,
    },
}

/// Everything a finished run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    /// One result per requested kind
    pub envelope: AggregatedEnvelope,
    /// Quality score of the envelope
    pub score: QualityScore,
    /// Final budget totals
    pub ledger: LedgerSnapshot,
    /// Sink acknowledgement
    pub sink: SinkStatus,
}

/// Handle to a run started with [`Orchestrator::submit`].
#[derive(Debug)]
pub struct RunHandle {
    request_id: RequestId,
    abort: CancellationToken,
    phase: watch::Receiver<RunPhase>,
    join: JoinHandle<Result<RunOutcome>>,
}

impl RunHandle {
    /// Request the run serves.
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> RunPhase {
        *self.phase.borrow()
    }

    /// Cancel the run. Running tasks stop cooperatively and the run still
    /// finishes with an envelope.
    pub fn abort(&self) {
        self.abort.cancel();
    }

    /// Wait for the run to finish.
    pub async fn wait(self) -> Result<RunOutcome> {
        self.join
            .await
            .map_err(|e| EngineError::Join(e.to_string()))?
    }
}

/// Coordinates collector tasks for requests.
///
/// One orchestrator serves many concurrent requests; each request gets its
/// own ledger, deadline and cancellation. Provider rate limits are shared
/// across all of them.
pub struct Orchestrator {
    /// Kind-to-collector map
    registry: Arc<CollectorRegistry>,
    /// Scorer built from the registry's definitions
    scorer: Arc<QualityScorer>,
    /// Per-provider call spacing
    limiters: ProviderLimiters,
    /// Where finished reports go
    sink: Option<Arc<dyn ResultSink>>,
    /// Maximum collector calls in flight per request
    max_concurrency: usize,
    default_budget: Cost,
    default_timeout: Duration,
    headroom_pct: u32,
    alert_threshold_pct: u8,
    budget_strategy: BudgetStrategy,
    economy_batch_size: usize,
}

impl Orchestrator {
    /// Create an orchestrator with default limits.
    ///
    /// # Errors
    /// Returns error if a definition's quality fields are malformed.
    pub fn new(registry: Arc<CollectorRegistry>) -> Result<Self> {
        let schema = QualitySchema::from_registry(&registry)?;
        let limiters = ProviderLimiters::from_registry(&registry);
        Ok(Self {
            registry,
            scorer: Arc::new(QualityScorer::new(schema)),
            limiters,
            sink: None,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            default_budget: Cost::from_usd(DEFAULT_BUDGET_USD),
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            headroom_pct: 0,
            alert_threshold_pct: 80,
            budget_strategy: BudgetStrategy::default(),
            economy_batch_size: 5,
        })
    }

    /// Create an orchestrator with limits taken from `config`.
    pub fn from_config(registry: Arc<CollectorRegistry>, config: &AppConfig) -> Result<Self> {
        let schema = QualitySchema::from_registry(&registry)?;
        let scorer = QualityScorer::new(schema).with_settings(ScoringSettings::from(&config.quality));
        let mut orchestrator = Self::new(registry)?
            .with_scorer(scorer)
            .with_max_concurrency(config.engine.max_concurrency)
            .with_default_budget(Cost::from_usd(config.budget.default_limit_usd))
            .with_default_timeout(Duration::from_secs(config.engine.default_timeout_secs))
            .with_budget_strategy(config.budget.strategy)
            .with_economy_batch_size(config.budget.economy_batch_size);
        orchestrator.headroom_pct = config.engine.reservation_headroom_pct;
        orchestrator.alert_threshold_pct = config.budget.alert_threshold_pct;
        Ok(orchestrator)
    }

    /// Set the maximum number of collector calls in flight per request.
    #[must_use]
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    /// Store finished reports in `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Share provider rate limits with other orchestrators.
    #[must_use]
    pub fn with_limiters(mut self, limiters: ProviderLimiters) -> Self {
        self.limiters = limiters;
        self
    }

    /// Replace the quality scorer.
    #[must_use]
    pub fn with_scorer(mut self, scorer: QualityScorer) -> Self {
        self.scorer = Arc::new(scorer);
        self
    }

    /// Budget for requests that do not carry one.
    #[must_use]
    pub fn with_default_budget(mut self, budget: Cost) -> Self {
        self.default_budget = budget;
        self
    }

    /// Deadline for requests that do not carry one.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// How task inputs are sized against each request's budget.
    #[must_use]
    pub fn with_budget_strategy(mut self, strategy: BudgetStrategy) -> Self {
        self.budget_strategy = strategy;
        self
    }

    /// Batch cap used by [`BudgetStrategy::Cost`].
    #[must_use]
    pub fn with_economy_batch_size(mut self, size: usize) -> Self {
        self.economy_batch_size = size.max(1);
        self
    }

    /// Registry in use.
    #[must_use]
    pub fn registry(&self) -> &CollectorRegistry {
        &self.registry
    }

    /// Plan `request` without running it.
    pub fn plan(&self, request: &Request) -> Result<ExecutionPlan> {
        Ok(ExecutionPlan::build(request, &self.registry)?)
    }

    /// Run `request` to completion.
    ///
    /// Only planning errors fail the call; collector failures, budget denials
    /// and the deadline all end up as per-kind results in the envelope.
    pub async fn run(&self, request: Request) -> Result<RunOutcome> {
        self.run_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Run `request`, stopping early when `abort` is cancelled.
    pub async fn run_with_cancel(
        &self,
        request: Request,
        abort: CancellationToken,
    ) -> Result<RunOutcome> {
        let (phase, _) = watch::channel(RunPhase::Planning);
        self.execute(request, abort, &phase).await
    }

    /// Start `request` in the background and return a handle to it.
    pub fn submit(self: &Arc<Self>, request: Request) -> RunHandle {
        let request_id = request.request_id.clone();
        let abort = CancellationToken::new();
        let (phase_tx, phase_rx) = watch::channel(RunPhase::Planning);

        let orchestrator = Arc::clone(self);
        let token = abort.clone();
        let join = tokio::spawn(async move { orchestrator.execute(request, token, &phase_tx).await });

        RunHandle {
            request_id,
            abort,
            phase: phase_rx,
            join,
        }
    }

    async fn execute(
        &self,
        request: Request,
        abort: CancellationToken,
        phase: &watch::Sender<RunPhase>,
    ) -> Result<RunOutcome> {
        let request_id = request.request_id.clone();
        let result = self.execute_inner(request, abort, phase).await;
        if let Err(e) = &result {
            error!(request_id = %request_id, error = %e, "run failed");
        }
        phase.send_replace(RunPhase::Done);
        result
    }

    async fn execute_inner(
        &self,
        request: Request,
        abort: CancellationToken,
        phase: &watch::Sender<RunPhase>,
    ) -> Result<RunOutcome> {
        let started_at = Timestamp::now();
        let run_id = RunId::generate();
        phase.send_replace(RunPhase::Planning);

        let plan = ExecutionPlan::build(&request, &self.registry)?;
        let budget = request.budget.unwrap_or(self.default_budget);
        let timeout = request.timeout().unwrap_or(self.default_timeout);
        let deadline = Instant::now() + timeout;

        info!(
            request_id = %request.request_id,
            run_id = %run_id,
            tasks = plan.len(),
            budget = %budget,
            estimated = %plan.estimated_total(),
            timeout_secs = timeout.as_secs(),
            "starting run"
        );

        let ledger = Arc::new(
            BudgetLedger::new(request.request_id.clone(), budget)
                .with_alert_threshold(self.alert_threshold_pct),
        );
        let cancel = CancelSignal::child_of(&abort);
        let runner = TaskRunner::new(
            request.request_id.clone(),
            run_id,
            Arc::clone(&ledger),
            cancel.clone(),
            deadline,
        )
        .with_headroom_pct(self.headroom_pct)
        .with_budget_strategy(self.budget_strategy, self.economy_batch_size);

        phase.send_replace(RunPhase::Executing);
        let table = self
            .execute_plan(&plan, &request.subject, &runner, &cancel, deadline)
            .await;

        phase.send_replace(RunPhase::Finalizing);
        let meta = RunMeta {
            request_id: request.request_id.clone(),
            run_id,
            requested: plan.requested().to_vec(),
            budget_limit: budget,
            started_at,
        };
        let envelope = aggregate(meta, table.into_results(), Timestamp::now())?;
        let score = self.scorer.score(&envelope);
        let sink = self.store(&envelope, &score).await;
        let snapshot = ledger.snapshot();

        info!(
            request_id = %request.request_id,
            run_id = %run_id,
            succeeded = envelope.succeeded().count(),
            requested = envelope.requested.len(),
            total_cost = %envelope.total_cost,
            quality = score.overall,
            grade = %score.grade,
            elapsed_ms = envelope.total_elapsed_ms,
            "run complete"
        );

        Ok(RunOutcome {
            envelope,
            score,
            ledger: snapshot,
            sink,
        })
    }

    /// Run every task of `plan` to a terminal state.
    async fn execute_plan(
        &self,
        plan: &ExecutionPlan,
        subject: &Subject,
        runner: &TaskRunner,
        cancel: &CancelSignal,
        deadline: Instant,
    ) -> TaskTable {
        let mut table = TaskTable::new(plan);
        let mut in_flight = FuturesUnordered::new();

        let reason = loop {
            if let Some(reason) = cancel.reason() {
                break reason;
            }

            for kind in resolve_ready(plan, &mut table) {
                if in_flight.len() >= self.max_concurrency {
                    break;
                }
                let Some(collector) = self.registry.get(kind) else {
                    let error = CollectorError::InvalidInput(format!("no collector for {kind}"));
                    table.finish(CollectorResult::failed(
                        kind,
                        &error,
                        TaskUsage::none(Timestamp::now()),
                    ));
                    continue;
                };
                let upstream = plan
                    .task(kind)
                    .and_then(|t| t.depends_on)
                    .and_then(|dep| table.payload(dep).cloned());
                let limiter = self.limiter_for(kind);

                table.start(kind);
                debug!(kind = %kind, in_flight = in_flight.len() + 1, "launching task");
                in_flight.push(runner.run(collector, subject, upstream, limiter));
            }

            if in_flight.is_empty() {
                return table;
            }

            tokio::select! {
                biased;
                reason = cancel.cancelled() => break reason,
                () = tokio::time::sleep_until(deadline) => {
                    warn!(
                        request_id = %plan.request_id(),
                        running = in_flight.len(),
                        "request deadline reached; cancelling"
                    );
                    cancel.cancel(CancelReason::Deadline);
                }
                Some(result) = in_flight.next() => {
                    table.finish(result);
                }
            }
        };

        // Running tasks observe the signal and return promptly.
        while let Some(result) = in_flight.next().await {
            table.finish(result);
        }
        let _ = resolve_ready(plan, &mut table);

        let now = Timestamp::now();
        for kind in table.pending() {
            table.finish(CollectorResult::cancelled(
                kind,
                reason,
                TaskUsage::none(now),
            ));
        }
        table
    }

    fn limiter_for(&self, kind: CollectorKind) -> Option<Arc<RateLimiter>> {
        self.registry
            .definition(kind)
            .and_then(|d| d.collector.rate_limit_per_minute)
            .map(|per_minute| self.limiters.get_or_create(kind, per_minute))
    }

    async fn store(&self, envelope: &AggregatedEnvelope, score: &QualityScore) -> SinkStatus {
        let Some(sink) = &self.sink else {
            return SinkStatus::NotConfigured;
        };
        match sink.store(&envelope.request_id, envelope, score).await {
            Ok(ack) => {
                debug!(sink = sink.name(), location = %ack.location, "report stored");
                SinkStatus::Stored(ack)
            }
            Err(e) => {
                warn!(
                    request_id = %envelope.request_id,
                    sink = sink.name(),
                    error = %e,
                    "failed to store report"
                );
                SinkStatus::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}

/// Skip pending tasks whose dependency is unavailable or did not succeed and
/// return the pending tasks that can start now, in scheduling order.
fn resolve_ready(plan: &ExecutionPlan, table: &mut TaskTable) -> Vec<CollectorKind> {
    let mut ready = Vec::new();
    for kind in plan.order() {
        if !table.is_pending(kind) {
            continue;
        }
        let Some(task) = plan.task(kind) else {
            continue;
        };

        if let Some(dependency) = task.unavailable_dependency {
            table.finish(CollectorResult::skipped(
                kind,
                SkipReason::DependencyUnavailable { dependency },
                Timestamp::now(),
            ));
            continue;
        }

        match task.depends_on {
            None => ready.push(kind),
            Some(dependency) => match table.result(dependency).map(CollectorResult::is_success) {
                Some(true) => ready.push(kind),
                Some(false) => {
                    table.finish(CollectorResult::skipped(
                        kind,
                        SkipReason::DependencyUnavailable { dependency },
                        Timestamp::now(),
                    ));
                }
                None => {}
            },
        }
    }
    ready
}
