//! End-to-end orchestrator behaviour against scripted collectors.

mod common;

use common::{definition, registry, subject, CallGauge, MockCollector, Step};
use prospector_collector::{
    CancelReason, CollectorError, CostModel, InputMapping, ResultStatus, SkipReason,
    SubjectField,
};
use prospector_core::{BudgetStrategy, CollectorKind, Cost};
use serde_json::json;
use prospector_engine::{EngineError, Orchestrator, PlanError, Request, RunPhase, SinkStatus};
use prospector_sink::MemorySink;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn mock(kind: CollectorKind, usd: f64, steps: Vec<Step>) -> Arc<MockCollector> {
    Arc::new(MockCollector::new(definition(kind, None, usd), steps))
}

fn request(kinds: Vec<CollectorKind>, budget_usd: f64, timeout_secs: u64) -> Request {
    Request::new(subject(), kinds)
        .with_budget(Cost::from_usd(budget_usd))
        .with_timeout(Duration::from_secs(timeout_secs))
}

#[tokio::test(start_paused = true)]
async fn test_every_requested_kind_gets_a_terminal_result() {
    let zoominfo = mock(CollectorKind::Zoominfo, 1.0, vec![Step::ok(1.0)]);
    let crunchbase = mock(CollectorKind::Crunchbase, 1.0, vec![Step::ok(0.8)]);
    let dnb = mock(CollectorKind::DunBradstreet, 1.0, vec![Step::ok(1.0)]);
    let orchestrator =
        Orchestrator::new(registry(&[zoominfo, crunchbase, dnb])).expect("orchestrator");

    let outcome = orchestrator
        .run(request(
            vec![
                CollectorKind::Zoominfo,
                CollectorKind::Crunchbase,
                CollectorKind::DunBradstreet,
            ],
            10.0,
            60,
        ))
        .await
        .expect("run");

    let envelope = &outcome.envelope;
    assert_eq!(envelope.results.len(), 3);
    assert!(envelope.is_complete());
    assert_eq!(envelope.total_cost, Cost::from_usd(2.8));
    assert!((envelope.success_rate - 1.0).abs() < 1e-9);

    assert_eq!(outcome.ledger.spent, Cost::from_usd(2.8));
    assert_eq!(outcome.ledger.held, Cost::ZERO);
    assert_eq!(outcome.ledger.open_reservations, 0);
    assert!((outcome.score.overall - 1.0).abs() < 1e-9);
    assert_eq!(outcome.sink, SinkStatus::NotConfigured);
}

#[tokio::test(start_paused = true)]
async fn test_dependent_task_waits_for_upstream_payload() {
    let company = Arc::new(
        MockCollector::new(
            definition(CollectorKind::LinkedinCompany, None, 1.0),
            vec![Step::ok(1.0)],
        )
        .with_delay(Duration::from_secs(1)),
    );
    let profile = Arc::new(MockCollector::new(
        definition(
            CollectorKind::LinkedinProfile,
            Some(CollectorKind::LinkedinCompany),
            1.0,
        ),
        vec![Step::ok(1.0)],
    ));
    let orchestrator = Orchestrator::new(registry(&[Arc::clone(&company), Arc::clone(&profile)]))
        .expect("orchestrator");

    let outcome = orchestrator
        .run(request(
            vec![CollectorKind::LinkedinProfile, CollectorKind::LinkedinCompany],
            10.0,
            60,
        ))
        .await
        .expect("run");

    assert!(outcome.envelope.is_complete());
    let upstream_done = company.first_finish().expect("company finished");
    let dependent_start = profile.first_start().expect("profile started");
    assert!(dependent_start >= upstream_done);

    let inputs = profile.inputs();
    assert_eq!(inputs.len(), 1);
    let companies = inputs[0].params["companies"]
        .as_array()
        .expect("companies array");
    assert!(companies.iter().any(|v| v == "Acme Ltd"));
}

#[tokio::test(start_paused = true)]
async fn test_partial_failure_still_yields_envelope() {
    let zoominfo = mock(CollectorKind::Zoominfo, 1.0, vec![Step::ok(1.0)]);
    let crunchbase = mock(
        CollectorKind::Crunchbase,
        1.0,
        vec![Step::fail(
            CollectorError::Authentication("token revoked".to_string()),
            0.0,
        )],
    );
    let dnb = mock(CollectorKind::DunBradstreet, 1.0, vec![Step::ok(1.0)]);
    let orchestrator = Orchestrator::new(registry(&[
        zoominfo,
        Arc::clone(&crunchbase),
        dnb,
    ]))
    .expect("orchestrator");

    let outcome = orchestrator
        .run(request(
            vec![
                CollectorKind::Zoominfo,
                CollectorKind::Crunchbase,
                CollectorKind::DunBradstreet,
            ],
            10.0,
            60,
        ))
        .await
        .expect("run");

    let failed = outcome
        .envelope
        .get(CollectorKind::Crunchbase)
        .expect("crunchbase result");
    assert!(matches!(failed.status, ResultStatus::Failed { .. }));
    assert_eq!(crunchbase.calls(), 1, "permanent failures are not retried");

    assert_eq!(outcome.envelope.succeeded().count(), 2);
    assert_eq!(outcome.envelope.missing().len(), 1);
    assert!((outcome.score.overall - 2.0 / 3.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_cancels_hanging_task_and_restores_budget() {
    let zoominfo = mock(CollectorKind::Zoominfo, 2.0, vec![Step::Hang]);
    let crunchbase = mock(CollectorKind::Crunchbase, 1.0, vec![Step::ok(1.0)]);
    let orchestrator =
        Orchestrator::new(registry(&[zoominfo, crunchbase])).expect("orchestrator");

    let start = Instant::now();
    let outcome = orchestrator
        .run(request(
            vec![CollectorKind::Zoominfo, CollectorKind::Crunchbase],
            10.0,
            5,
        ))
        .await
        .expect("run");

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(5));
    assert!(elapsed < Duration::from_secs(6));

    let hung = outcome
        .envelope
        .get(CollectorKind::Zoominfo)
        .expect("zoominfo result");
    assert_eq!(
        hung.status,
        ResultStatus::Cancelled {
            reason: CancelReason::Deadline
        }
    );
    assert!(outcome
        .envelope
        .get(CollectorKind::Crunchbase)
        .is_some_and(|r| r.is_success()));

    assert_eq!(outcome.ledger.open_reservations, 0);
    assert_eq!(outcome.ledger.committed, Cost::from_usd(1.0));
    assert_eq!(outcome.ledger.remaining, Cost::from_usd(9.0));
}

#[tokio::test(start_paused = true)]
async fn test_budget_denial_skips_without_calling() {
    let zoominfo = mock(CollectorKind::Zoominfo, 1.0, vec![Step::ok(1.0)]);
    let crunchbase = mock(CollectorKind::Crunchbase, 1.0, vec![Step::ok(1.0)]);
    let orchestrator = Orchestrator::new(registry(&[
        Arc::clone(&zoominfo),
        Arc::clone(&crunchbase),
    ]))
    .expect("orchestrator");

    let outcome = orchestrator
        .run(request(
            vec![CollectorKind::Zoominfo, CollectorKind::Crunchbase],
            1.5,
            60,
        ))
        .await
        .expect("run");

    let skipped: Vec<_> = outcome
        .envelope
        .results
        .values()
        .filter(|r| {
            matches!(
                r.status,
                ResultStatus::Skipped {
                    reason: SkipReason::BudgetExhausted { .. }
                }
            )
        })
        .collect();
    assert_eq!(skipped.len(), 1);

    let uncalled = if skipped[0].kind == CollectorKind::Zoominfo {
        &zoominfo
    } else {
        &crunchbase
    };
    assert_eq!(uncalled.calls(), 0);
    assert_eq!(outcome.ledger.spent, Cost::from_usd(1.0));
    assert!(outcome.ledger.spent <= outcome.ledger.limit);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried_with_backoff() {
    let zoominfo = mock(
        CollectorKind::Zoominfo,
        1.0,
        vec![
            Step::fail(CollectorError::Network("connection reset".to_string()), 0.1),
            Step::fail(CollectorError::ProviderUnavailable { status: 503 }, 0.0),
            Step::ok(1.0),
        ],
    );
    let orchestrator =
        Orchestrator::new(registry(&[Arc::clone(&zoominfo)])).expect("orchestrator");

    let start = Instant::now();
    let outcome = orchestrator
        .run(request(vec![CollectorKind::Zoominfo], 10.0, 60))
        .await
        .expect("run");

    let result = outcome
        .envelope
        .get(CollectorKind::Zoominfo)
        .expect("zoominfo result");
    assert!(result.is_success());
    assert_eq!(result.attempts, 3);
    assert_eq!(zoominfo.calls(), 3);
    assert_eq!(result.cost, Cost::from_usd(1.1));
    // 1s + 2s of backoff
    assert!(start.elapsed() >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_retries_stop_after_max_attempts() {
    let zoominfo = mock(
        CollectorKind::Zoominfo,
        1.0,
        vec![Step::fail(
            CollectorError::RateLimited {
                retry_after: Some(Duration::from_secs(4)),
            },
            0.0,
        )],
    );
    let orchestrator =
        Orchestrator::new(registry(&[Arc::clone(&zoominfo)])).expect("orchestrator");

    let start = Instant::now();
    let outcome = orchestrator
        .run(request(vec![CollectorKind::Zoominfo], 10.0, 60))
        .await
        .expect("run");

    let result = outcome
        .envelope
        .get(CollectorKind::Zoominfo)
        .expect("zoominfo result");
    assert!(matches!(result.status, ResultStatus::Failed { .. }));
    assert_eq!(zoominfo.calls(), 3);
    // Retry-After (4s) outweighs the 1s and 2s backoff steps
    assert!(start.elapsed() >= Duration::from_secs(8));
    assert_eq!(outcome.ledger.spent, Cost::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_circular_dependency_fails_before_any_call() {
    let company = Arc::new(MockCollector::new(
        definition(
            CollectorKind::LinkedinCompany,
            Some(CollectorKind::LinkedinProfile),
            1.0,
        ),
        vec![Step::ok(1.0)],
    ));
    let profile = Arc::new(MockCollector::new(
        definition(
            CollectorKind::LinkedinProfile,
            Some(CollectorKind::LinkedinCompany),
            1.0,
        ),
        vec![Step::ok(1.0)],
    ));
    let orchestrator = Orchestrator::new(registry(&[Arc::clone(&company), Arc::clone(&profile)]))
        .expect("orchestrator");

    let err = orchestrator
        .run(request(
            vec![CollectorKind::LinkedinProfile, CollectorKind::LinkedinCompany],
            10.0,
            60,
        ))
        .await
        .expect_err("cycle");

    assert!(matches!(
        err,
        EngineError::Plan(PlanError::CircularDependency { .. })
    ));
    assert_eq!(company.calls(), 0);
    assert_eq!(profile.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_kind_is_rejected() {
    let zoominfo = mock(CollectorKind::Zoominfo, 1.0, vec![Step::ok(1.0)]);
    let orchestrator = Orchestrator::new(registry(&[zoominfo])).expect("orchestrator");

    let err = orchestrator
        .run(request(vec![CollectorKind::TwitterProfile], 10.0, 60))
        .await
        .expect_err("unknown kind");

    assert!(matches!(
        err,
        EngineError::Plan(PlanError::UnknownCollector {
            kind: CollectorKind::TwitterProfile
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_failed_dependency_skips_dependents() {
    let company = mock(
        CollectorKind::LinkedinCompany,
        1.0,
        vec![Step::fail(
            CollectorError::InvalidTarget("page not found".to_string()),
            0.0,
        )],
    );
    let profile = Arc::new(MockCollector::new(
        definition(
            CollectorKind::LinkedinProfile,
            Some(CollectorKind::LinkedinCompany),
            1.0,
        ),
        vec![Step::ok(1.0)],
    ));
    let orchestrator = Orchestrator::new(registry(&[company, Arc::clone(&profile)]))
        .expect("orchestrator");

    let outcome = orchestrator
        .run(request(
            vec![CollectorKind::LinkedinCompany, CollectorKind::LinkedinProfile],
            10.0,
            60,
        ))
        .await
        .expect("run");

    assert_eq!(
        outcome
            .envelope
            .get(CollectorKind::LinkedinProfile)
            .map(|r| r.status.clone()),
        Some(ResultStatus::Skipped {
            reason: SkipReason::DependencyUnavailable {
                dependency: CollectorKind::LinkedinCompany
            }
        })
    );
    assert_eq!(profile.calls(), 0);

    // Dependency not requested at all
    let outcome = orchestrator
        .run(request(vec![CollectorKind::LinkedinProfile], 10.0, 60))
        .await
        .expect("run");
    assert!(matches!(
        outcome
            .envelope
            .get(CollectorKind::LinkedinProfile)
            .map(|r| &r.status),
        Some(ResultStatus::Skipped {
            reason: SkipReason::DependencyUnavailable { .. }
        })
    ));
    assert_eq!(profile.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dependency_failure_skips_whole_chain() {
    let company = mock(
        CollectorKind::LinkedinCompany,
        1.0,
        vec![Step::fail(
            CollectorError::InvalidTarget("page not found".to_string()),
            0.0,
        )],
    );
    let profile = Arc::new(MockCollector::new(
        definition(
            CollectorKind::LinkedinProfile,
            Some(CollectorKind::LinkedinCompany),
            1.0,
        ),
        vec![Step::ok(1.0)],
    ));
    let posts = Arc::new(MockCollector::new(
        definition(
            CollectorKind::LinkedinPosts,
            Some(CollectorKind::LinkedinProfile),
            1.0,
        ),
        vec![Step::ok(1.0)],
    ));
    let orchestrator = Orchestrator::new(registry(&[
        Arc::clone(&company),
        Arc::clone(&profile),
        Arc::clone(&posts),
    ]))
    .expect("orchestrator");

    let outcome = orchestrator
        .run(request(
            vec![
                CollectorKind::LinkedinPosts,
                CollectorKind::LinkedinProfile,
                CollectorKind::LinkedinCompany,
            ],
            10.0,
            60,
        ))
        .await
        .expect("run");

    let status = |kind| outcome.envelope.get(kind).map(|r| r.status.clone());
    assert_eq!(
        status(CollectorKind::LinkedinProfile),
        Some(ResultStatus::Skipped {
            reason: SkipReason::DependencyUnavailable {
                dependency: CollectorKind::LinkedinCompany
            }
        })
    );
    assert_eq!(
        status(CollectorKind::LinkedinPosts),
        Some(ResultStatus::Skipped {
            reason: SkipReason::DependencyUnavailable {
                dependency: CollectorKind::LinkedinProfile
            }
        })
    );
    assert_eq!(company.calls(), 1);
    assert_eq!(profile.calls(), 0);
    assert_eq!(posts.calls(), 0);
    assert_eq!(outcome.ledger.spent, Cost::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_worker_pool_respects_max_concurrency() {
    let gauge = Arc::new(CallGauge::default());
    let kinds = [
        CollectorKind::Zoominfo,
        CollectorKind::Crunchbase,
        CollectorKind::DunBradstreet,
        CollectorKind::ErasmusOrganisation,
    ];
    let mocks: Vec<_> = kinds
        .iter()
        .map(|kind| {
            Arc::new(
                MockCollector::new(definition(*kind, None, 1.0), vec![Step::ok(1.0)])
                    .with_delay(Duration::from_secs(2))
                    .with_gauge(Arc::clone(&gauge)),
            )
        })
        .collect();
    let orchestrator = Orchestrator::new(registry(&mocks))
        .expect("orchestrator")
        .with_max_concurrency(2);

    let start = Instant::now();
    let outcome = orchestrator
        .run(request(kinds.to_vec(), 10.0, 60))
        .await
        .expect("run");

    assert!(outcome.envelope.is_complete());
    assert_eq!(gauge.peak(), 2);
    // two waves of two 2s calls
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(4), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_randomized_costs_never_exceed_budget() {
    let kinds = [
        CollectorKind::LinkedinProfile,
        CollectorKind::LinkedinPosts,
        CollectorKind::FacebookPosts,
        CollectorKind::TwitterProfile,
        CollectorKind::ErasmusOrganisation,
        CollectorKind::Zoominfo,
    ];

    for seed in 0..20_u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mocks: Vec<_> = kinds
            .iter()
            .map(|kind| {
                let price: f64 = rng.gen_range(0.5..3.0);
                let steps = (0..3)
                    .map(|_| {
                        let actual = price * rng.gen_range(0.0..1.6);
                        if rng.gen_bool(0.3) {
                            Step::fail(CollectorError::Network("reset".to_string()), actual)
                        } else {
                            Step::ok(actual)
                        }
                    })
                    .collect();
                mock(*kind, price, steps)
            })
            .collect();
        let orchestrator = Orchestrator::new(registry(&mocks))
            .expect("orchestrator")
            .with_max_concurrency(3);
        let budget = rng.gen_range(1.0..8.0);

        let outcome = orchestrator
            .run(request(kinds.to_vec(), budget, 120))
            .await
            .expect("run");

        let ledger = outcome.ledger;
        assert!(ledger.spent <= ledger.limit, "seed {seed}: {ledger:?}");
        assert_eq!(ledger.held, Cost::ZERO, "seed {seed}");
        assert_eq!(ledger.open_reservations, 0, "seed {seed}");
        assert_eq!(outcome.envelope.total_cost, ledger.spent, "seed {seed}");
        assert_eq!(outcome.envelope.results.len(), kinds.len(), "seed {seed}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_abort_through_run_handle() {
    let zoominfo = mock(CollectorKind::Zoominfo, 1.0, vec![Step::Hang]);
    let orchestrator =
        Arc::new(Orchestrator::new(registry(&[zoominfo])).expect("orchestrator"));

    let handle = orchestrator.submit(request(vec![CollectorKind::Zoominfo], 10.0, 60));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(handle.phase(), RunPhase::Executing);

    handle.abort();
    let outcome = handle.wait().await.expect("run");

    assert_eq!(
        outcome
            .envelope
            .get(CollectorKind::Zoominfo)
            .map(|r| r.status.clone()),
        Some(ResultStatus::Cancelled {
            reason: CancelReason::Aborted
        })
    );
    assert_eq!(outcome.ledger.open_reservations, 0);
    assert_eq!(outcome.ledger.committed, Cost::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_is_shared_across_requests() {
    let mut def = definition(CollectorKind::Zoominfo, None, 1.0);
    def.collector.rate_limit_per_minute = Some(60);
    let zoominfo = Arc::new(MockCollector::new(def, vec![Step::ok(1.0)]));
    let orchestrator =
        Orchestrator::new(registry(&[Arc::clone(&zoominfo)])).expect("orchestrator");

    let start = Instant::now();
    for _ in 0..2 {
        let outcome = orchestrator
            .run(request(vec![CollectorKind::Zoominfo], 10.0, 60))
            .await
            .expect("run");
        assert!(outcome.envelope.is_complete());
    }

    assert_eq!(zoominfo.calls(), 2);
    assert!(start.elapsed() >= Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_spaces_every_retry() {
    let mut def = definition(CollectorKind::Zoominfo, None, 1.0);
    def.collector.rate_limit_per_minute = Some(6);
    let zoominfo = Arc::new(MockCollector::new(
        def,
        vec![
            Step::fail(CollectorError::Network("connection reset".to_string()), 0.0),
            Step::ok(1.0),
        ],
    ));
    let orchestrator =
        Orchestrator::new(registry(&[Arc::clone(&zoominfo)])).expect("orchestrator");

    let outcome = orchestrator
        .run(request(vec![CollectorKind::Zoominfo], 10.0, 60))
        .await
        .expect("run");

    let result = outcome
        .envelope
        .get(CollectorKind::Zoominfo)
        .expect("zoominfo result");
    assert!(result.is_success());
    assert_eq!(result.attempts, 2);

    let starts = zoominfo.starts();
    assert_eq!(starts.len(), 2);
    // 6 calls per minute: the retry waits out the limiter, not just the 1s backoff
    let gap = starts[1] - starts[0];
    assert!(gap >= Duration::from_secs(10), "{gap:?}");
}

fn per_company_definition() -> prospector_collector::CollectorDefinition {
    let mut def = definition(CollectorKind::Zoominfo, None, 1.0);
    def.cost = CostModel::PerUnit {
        price: Cost::from_usd(1.0),
        unit_size: 1,
    };
    def.input = InputMapping::from_subject(
        "companies",
        vec![SubjectField::Company, SubjectField::Domain],
    );
    def
}

#[tokio::test(start_paused = true)]
async fn test_denied_batch_is_trimmed_to_fit_budget() {
    let zoominfo = Arc::new(MockCollector::new(
        per_company_definition(),
        vec![Step::ok(1.0)],
    ));
    let orchestrator =
        Orchestrator::new(registry(&[Arc::clone(&zoominfo)])).expect("orchestrator");

    // two lookup values at $1 each against a $1.50 budget
    let outcome = orchestrator
        .run(request(vec![CollectorKind::Zoominfo], 1.5, 60))
        .await
        .expect("run");

    assert!(outcome.envelope.is_complete());
    let inputs = zoominfo.inputs();
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0].units(), 1);
    assert_eq!(inputs[0].params["companies"], json!(["Acme"]));
    assert_eq!(outcome.ledger.spent, Cost::from_usd(1.0));
    assert_eq!(outcome.ledger.open_reservations, 0);
}

#[tokio::test(start_paused = true)]
async fn test_quality_strategy_never_trims() {
    let zoominfo = Arc::new(MockCollector::new(
        per_company_definition(),
        vec![Step::ok(1.0)],
    ));
    let orchestrator = Orchestrator::new(registry(&[Arc::clone(&zoominfo)]))
        .expect("orchestrator")
        .with_budget_strategy(BudgetStrategy::Quality);

    let outcome = orchestrator
        .run(request(vec![CollectorKind::Zoominfo], 1.5, 60))
        .await
        .expect("run");

    assert_eq!(
        outcome
            .envelope
            .get(CollectorKind::Zoominfo)
            .map(|r| r.status.clone()),
        Some(ResultStatus::Skipped {
            reason: SkipReason::BudgetExhausted {
                requested: Cost::from_usd(2.0),
                remaining: Cost::from_usd(1.5),
            }
        })
    );
    assert_eq!(zoominfo.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cost_strategy_caps_batches_under_ample_budget() {
    let zoominfo = Arc::new(MockCollector::new(
        per_company_definition(),
        vec![Step::ok(1.0)],
    ));
    let orchestrator = Orchestrator::new(registry(&[Arc::clone(&zoominfo)]))
        .expect("orchestrator")
        .with_budget_strategy(BudgetStrategy::Cost)
        .with_economy_batch_size(1);

    let outcome = orchestrator
        .run(request(vec![CollectorKind::Zoominfo], 100.0, 60))
        .await
        .expect("run");

    assert!(outcome.envelope.is_complete());
    assert_eq!(zoominfo.inputs()[0].units(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sink_receives_report() {
    let zoominfo = mock(CollectorKind::Zoominfo, 1.0, vec![Step::ok(1.0)]);
    let sink = Arc::new(MemorySink::new());
    let orchestrator = Orchestrator::new(registry(&[zoominfo]))
        .expect("orchestrator")
        .with_sink(Arc::clone(&sink) as Arc<dyn prospector_sink::ResultSink>);

    let req = request(vec![CollectorKind::Zoominfo], 10.0, 60);
    let request_id = req.request_id.clone();
    let outcome = orchestrator.run(req).await.expect("run");

    assert!(matches!(outcome.sink, SinkStatus::Stored(_)));
    let stored = sink.get(&request_id).expect("stored report");
    assert_eq!(stored.envelope, outcome.envelope);
}

#[tokio::test(start_paused = true)]
async fn test_sink_failure_keeps_envelope() {
    let zoominfo = mock(CollectorKind::Zoominfo, 1.0, vec![Step::ok(1.0)]);
    let sink = Arc::new(MemorySink::new());
    sink.set_rejecting(true);
    let orchestrator = Orchestrator::new(registry(&[zoominfo]))
        .expect("orchestrator")
        .with_sink(Arc::clone(&sink) as Arc<dyn prospector_sink::ResultSink>);

    let outcome = orchestrator
        .run(request(vec![CollectorKind::Zoominfo], 10.0, 60))
        .await
        .expect("run");

    assert!(matches!(outcome.sink, SinkStatus::Failed { .. }));
    assert!(outcome.envelope.is_complete());
    assert!(sink.is_empty());
}
