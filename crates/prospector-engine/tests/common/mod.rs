//! Scripted collectors shared by the engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use prospector_collector::{
    CallContext, CallFailure, CallOutput, CallResult, Collector, CollectorDefinition,
    CollectorError, CollectorInput, CollectorMetadata, CollectorRegistry, CostModel, InputMapping,
    OutputSchema, RetryPolicy, Subject, SubjectField,
};
use prospector_core::{CollectorKind, Cost};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// What one call attempt does.
#[derive(Debug, Clone)]
pub enum Step {
    Ok { payload: Value, cost: Cost },
    Fail { error: CollectorError, cost: Cost },
    Hang,
}

impl Step {
    pub fn ok(usd: f64) -> Self {
        Self::Ok {
            payload: company_payload("Acme Ltd"),
            cost: Cost::from_usd(usd),
        }
    }

    pub fn fail(error: CollectorError, usd: f64) -> Self {
        Self::Fail {
            error,
            cost: Cost::from_usd(usd),
        }
    }
}

/// Counts calls in progress across every collector sharing it.
#[derive(Debug, Default)]
pub struct CallGauge {
    current: AtomicU32,
    peak: AtomicU32,
}

impl CallGauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    /// Most calls ever in progress at once.
    pub fn peak(&self) -> u32 {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Collector that plays back a script; the last step repeats.
pub struct MockCollector {
    definition: CollectorDefinition,
    steps: Vec<Step>,
    delay: Duration,
    gauge: Option<Arc<CallGauge>>,
    calls: AtomicU32,
    inputs: Mutex<Vec<CollectorInput>>,
    started: Mutex<Vec<Instant>>,
    finished: Mutex<Vec<Instant>>,
}

impl MockCollector {
    pub fn new(definition: CollectorDefinition, steps: Vec<Step>) -> Self {
        Self {
            definition,
            steps,
            delay: Duration::ZERO,
            gauge: None,
            calls: AtomicU32::new(0),
            inputs: Mutex::new(Vec::new()),
            started: Mutex::new(Vec::new()),
            finished: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_gauge(mut self, gauge: Arc<CallGauge>) -> Self {
        self.gauge = Some(gauge);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inputs(&self) -> Vec<CollectorInput> {
        self.inputs.lock().expect("inputs lock").clone()
    }

    pub fn starts(&self) -> Vec<Instant> {
        self.started.lock().expect("started lock").clone()
    }

    pub fn first_start(&self) -> Option<Instant> {
        self.started.lock().expect("started lock").first().copied()
    }

    pub fn first_finish(&self) -> Option<Instant> {
        self.finished.lock().expect("finished lock").first().copied()
    }
}

#[async_trait]
impl Collector for MockCollector {
    fn definition(&self) -> &CollectorDefinition {
        &self.definition
    }

    async fn call(&self, input: &CollectorInput, _ctx: &CallContext) -> CallResult {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        self.inputs.lock().expect("inputs lock").push(input.clone());
        self.started.lock().expect("started lock").push(Instant::now());
        if let Some(gauge) = &self.gauge {
            gauge.enter();
        }

        let step = self
            .steps
            .get(n)
            .or_else(|| self.steps.last())
            .cloned()
            .unwrap_or(Step::Hang);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = match step {
            Step::Ok { payload, cost } => Ok(CallOutput { payload, cost }),
            Step::Fail { error, cost } => Err(CallFailure { error, cost }),
            Step::Hang => std::future::pending::<CallResult>().await,
        };
        if let Some(gauge) = &self.gauge {
            gauge.exit();
        }
        self.finished.lock().expect("finished lock").push(Instant::now());
        result
    }
}

pub fn company_payload(name: &str) -> Value {
    json!({ "company": { "name": name, "employees": 120 } })
}

/// Definition priced at `usd` per call with deterministic backoff
/// (1s, 2s, ... capped at 10s, no jitter).
pub fn definition(kind: CollectorKind, depends_on: Option<CollectorKind>, usd: f64) -> CollectorDefinition {
    let mut input = InputMapping::from_subject("companies", vec![SubjectField::Company]);
    if depends_on.is_some() {
        input = input.with_upstream("/company/name");
    }

    CollectorDefinition {
        collector: CollectorMetadata {
            kind,
            name: format!("Mock {}", kind.display_name()),
            description: String::new(),
            endpoint: None,
            token_env: None,
            depends_on,
            priority: 0,
            reliability_weight: 1.0,
            rate_limit_per_minute: None,
        },
        cost: CostModel::Fixed {
            price: Cost::from_usd(usd),
        },
        retry: RetryPolicy {
            max_attempts: 3,
            base_backoff_ms: 1_000,
            max_backoff_ms: 10_000,
            jitter: 0.0,
            call_timeout_secs: 30,
        },
        input,
        output: OutputSchema {
            expected_fields: vec!["company.name".to_string()],
            freshness_field: None,
            stale_after_days: None,
        },
    }
}

pub fn registry(collectors: &[Arc<MockCollector>]) -> Arc<CollectorRegistry> {
    let mut builder = CollectorRegistry::builder();
    for collector in collectors {
        builder = builder
            .register(Arc::clone(collector) as Arc<dyn Collector>)
            .expect("register mock collector");
    }
    Arc::new(builder.build())
}

pub fn subject() -> Subject {
    Subject {
        company: Some("Acme".to_string()),
        domain: Some("acme.example".to_string()),
        ..Subject::default()
    }
}
