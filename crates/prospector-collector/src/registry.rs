//! Static registry of collector implementations keyed by kind.

use crate::{
    collector::Collector,
    definition::CollectorDefinition,
    error::{DefinitionError, Result},
};
use prospector_core::CollectorKind;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Immutable map from collector kind to implementation.
///
/// Built once at startup through [`CollectorRegistryBuilder`]; lookups are a
/// plain hash map access on the enumerated kind.
#[derive(Clone, Default)]
pub struct CollectorRegistry {
    collectors: HashMap<CollectorKind, Arc<dyn Collector>>,
}

impl CollectorRegistry {
    /// Start building a registry.
    #[must_use]
    pub fn builder() -> CollectorRegistryBuilder {
        CollectorRegistryBuilder::default()
    }

    /// Collector registered for `kind`.
    #[must_use]
    pub fn get(&self, kind: CollectorKind) -> Option<Arc<dyn Collector>> {
        self.collectors.get(&kind).cloned()
    }

    /// Collector registered for `kind`, or `NotFound`.
    pub fn require(&self, kind: CollectorKind) -> Result<Arc<dyn Collector>> {
        self.get(kind).ok_or_else(|| DefinitionError::NotFound {
            kind: kind.to_string(),
        })
    }

    /// Whether a collector is registered for `kind`.
    #[must_use]
    pub fn contains(&self, kind: CollectorKind) -> bool {
        self.collectors.contains_key(&kind)
    }

    /// Definition of the collector registered for `kind`.
    #[must_use]
    pub fn definition(&self, kind: CollectorKind) -> Option<&CollectorDefinition> {
        self.collectors.get(&kind).map(|c| c.definition())
    }

    /// All definitions, ordered by kind.
    #[must_use]
    pub fn definitions(&self) -> Vec<&CollectorDefinition> {
        let mut defs: Vec<_> = self.collectors.values().map(|c| c.definition()).collect();
        defs.sort_by_key(|d| d.kind());
        defs
    }

    /// Registered kinds, ordered.
    #[must_use]
    pub fn kinds(&self) -> Vec<CollectorKind> {
        let mut kinds: Vec<_> = self.collectors.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Number of registered collectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    /// Whether no collector is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }
}

impl std::fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

/// Builder for [`CollectorRegistry`].
#[derive(Default)]
pub struct CollectorRegistryBuilder {
    collectors: HashMap<CollectorKind, Arc<dyn Collector>>,
}

impl CollectorRegistryBuilder {
    /// Register a collector.
    ///
    /// # Errors
    /// Returns error if the collector's definition is invalid or its kind is
    /// already registered.
    pub fn register(mut self, collector: Arc<dyn Collector>) -> Result<Self> {
        let definition = collector.definition();
        definition.validate()?;

        let kind = collector.kind();
        if kind != definition.kind() {
            return Err(DefinitionError::ValidationError {
                kind: kind.to_string(),
                reason: format!(
                    "collector reports kind {kind} but its definition declares {}",
                    definition.kind()
                ),
            });
        }
        if self.collectors.contains_key(&kind) {
            return Err(DefinitionError::DuplicateKind {
                kind: kind.to_string(),
            });
        }

        debug!(kind = %kind, name = %definition.name(), "registered collector");
        self.collectors.insert(kind, collector);
        Ok(self)
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> CollectorRegistry {
        info!(count = self.collectors.len(), "collector registry ready");
        CollectorRegistry {
            collectors: self.collectors,
        }
    }
}
