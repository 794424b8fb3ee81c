//! Execution planning: one task per requested kind, grouped into
//! dependency stages.

use crate::error::PlanError;
use crate::request::Request;
use prospector_collector::CollectorRegistry;
use prospector_core::{CollectorKind, Cost, RequestId};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// One planned task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedTask {
    /// Collector kind
    pub kind: CollectorKind,
    /// Requested kind whose payload this task consumes
    pub depends_on: Option<CollectorKind>,
    /// Declared dependency that is not part of the request; the task is
    /// skipped without running
    pub unavailable_dependency: Option<CollectorKind>,
    /// Scheduling priority (higher first within a stage)
    pub priority: i32,
    /// Dependency depth (0 = runs immediately)
    pub stage: usize,
    /// Cost estimate from the subject alone; `None` when the input depends
    /// on another task or cannot be built yet
    pub estimated_cost: Option<Cost>,
}

/// Immutable plan for one request.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionPlan {
    request_id: RequestId,
    requested: Vec<CollectorKind>,
    tasks: BTreeMap<CollectorKind, PlannedTask>,
    stages: Vec<Vec<CollectorKind>>,
}

impl ExecutionPlan {
    /// Build the plan for `request` against `registry`.
    ///
    /// # Errors
    /// Returns error if the request is empty, names an unregistered kind, or
    /// its kinds depend on each other in a cycle.
    pub fn build(request: &Request, registry: &CollectorRegistry) -> Result<Self, PlanError> {
        if request.kinds.is_empty() {
            return Err(PlanError::InvalidRequest(
                "request names no collector kinds".to_string(),
            ));
        }
        if request.timeout_secs == Some(0) {
            return Err(PlanError::InvalidRequest(
                "timeout must be at least one second".to_string(),
            ));
        }

        let mut requested = Vec::with_capacity(request.kinds.len());
        for kind in &request.kinds {
            if requested.contains(kind) {
                debug!(kind = %kind, "ignoring duplicate kind in request");
                continue;
            }
            if !registry.contains(*kind) {
                return Err(PlanError::UnknownCollector { kind: *kind });
            }
            requested.push(*kind);
        }

        for kind in &requested {
            if let Some(cycle) = find_cycle(*kind, registry) {
                return Err(PlanError::CircularDependency { cycle });
            }
        }

        let requested_set: HashSet<CollectorKind> = requested.iter().copied().collect();
        let mut tasks = BTreeMap::new();
        for kind in &requested {
            let collector = registry.require(*kind).map_err(|_| PlanError::UnknownCollector {
                kind: *kind,
            })?;
            let definition = collector.definition();
            let declared = definition.depends_on();
            let depends_on = declared.filter(|d| requested_set.contains(d));
            let unavailable_dependency = declared.filter(|d| !requested_set.contains(d));

            let estimated_cost = if declared.is_none() {
                collector
                    .build_input(&request.subject, None)
                    .ok()
                    .map(|input| collector.estimate_cost(&input))
            } else {
                None
            };

            tasks.insert(
                *kind,
                PlannedTask {
                    kind: *kind,
                    depends_on,
                    unavailable_dependency,
                    priority: definition.collector.priority,
                    stage: 0,
                    estimated_cost,
                },
            );
        }

        let stages = assign_stages(&mut tasks);

        let plan = Self {
            request_id: request.request_id.clone(),
            requested,
            tasks,
            stages,
        };
        debug!(
            request_id = %plan.request_id,
            tasks = plan.len(),
            stages = plan.stages.len(),
            "built execution plan"
        );
        Ok(plan)
    }

    /// Request the plan belongs to.
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Requested kinds, deduplicated, in request order.
    #[must_use]
    pub fn requested(&self) -> &[CollectorKind] {
        &self.requested
    }

    /// Planned task for `kind`.
    #[must_use]
    pub fn task(&self, kind: CollectorKind) -> Option<&PlannedTask> {
        self.tasks.get(&kind)
    }

    /// All planned tasks, by kind.
    pub fn tasks(&self) -> impl Iterator<Item = &PlannedTask> {
        self.tasks.values()
    }

    /// Kinds grouped by dependency depth, each stage in scheduling order.
    #[must_use]
    pub fn stages(&self) -> &[Vec<CollectorKind>] {
        &self.stages
    }

    /// Every kind in scheduling order; dependencies always come first.
    #[must_use]
    pub fn order(&self) -> Vec<CollectorKind> {
        self.stages.iter().flatten().copied().collect()
    }

    /// Requested kinds that consume `kind`'s payload.
    #[must_use]
    pub fn dependents(&self, kind: CollectorKind) -> Vec<CollectorKind> {
        self.tasks
            .values()
            .filter(|t| t.depends_on == Some(kind))
            .map(|t| t.kind)
            .collect()
    }

    /// Sum of the known cost estimates.
    #[must_use]
    pub fn estimated_total(&self) -> Cost {
        self.tasks.values().filter_map(|t| t.estimated_cost).sum()
    }

    /// Number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the plan has no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Follow the dependency chain from `start` through the registry and return
/// the cycle it runs into, if any.
fn find_cycle(start: CollectorKind, registry: &CollectorRegistry) -> Option<Vec<CollectorKind>> {
    let mut chain = vec![start];
    let mut current = start;

    while let Some(next) = registry.definition(current).and_then(|d| d.depends_on()) {
        if let Some(pos) = chain.iter().position(|k| *k == next) {
            let mut cycle = chain.split_off(pos);
            cycle.push(next);
            return Some(cycle);
        }
        chain.push(next);
        current = next;
    }
    None
}

/// Set each task's stage and group kinds by stage, ordered by priority
/// (higher first) then kind. Requires an acyclic dependency graph.
fn assign_stages(tasks: &mut BTreeMap<CollectorKind, PlannedTask>) -> Vec<Vec<CollectorKind>> {
    let kinds: Vec<CollectorKind> = tasks.keys().copied().collect();
    for kind in &kinds {
        let mut depth = 0;
        let mut current = *kind;
        while let Some(dep) = tasks.get(&current).and_then(|t| t.depends_on) {
            depth += 1;
            current = dep;
        }
        if let Some(task) = tasks.get_mut(kind) {
            task.stage = depth;
        }
    }

    let depth = tasks.values().map(|t| t.stage + 1).max().unwrap_or(0);
    let mut stages: Vec<Vec<&PlannedTask>> = vec![Vec::new(); depth];
    for task in tasks.values() {
        stages[task.stage].push(task);
    }

    stages
        .into_iter()
        .map(|mut stage| {
            stage.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.kind.cmp(&b.kind)));
            stage.into_iter().map(|t| t.kind).collect()
        })
        .collect()
}
