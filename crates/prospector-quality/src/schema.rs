//! Static per-kind scoring schema derived from collector definitions.

use crate::error::{QualityError, Result};
use crate::fields::FieldPath;
use prospector_collector::{CollectorDefinition, CollectorRegistry};
use prospector_core::{CollectorCategory, CollectorKind};
use std::collections::BTreeMap;

/// Scoring inputs for one collector kind.
#[derive(Debug, Clone, PartialEq)]
pub struct KindSchema {
    /// Collector kind
    pub kind: CollectorKind,
    /// Category used for the roll-up
    pub category: CollectorCategory,
    /// Fields a complete payload carries
    pub expected_fields: Vec<FieldPath>,
    /// Static reliability weight (relative, non-negative)
    pub reliability_weight: f64,
    /// Field holding the data's date
    pub freshness_field: Option<FieldPath>,
    /// Age in days after which data is stale
    pub stale_after_days: Option<u32>,
}

impl KindSchema {
    /// Build the schema for one definition.
    pub fn from_definition(definition: &CollectorDefinition) -> Result<Self> {
        let kind = definition.kind();
        let parse = |raw: &str| {
            FieldPath::parse(raw).ok_or_else(|| QualityError::InvalidFieldPath {
                kind: kind.to_string(),
                path: raw.to_string(),
            })
        };

        let weight = definition.collector.reliability_weight;
        if !weight.is_finite() || weight < 0.0 {
            return Err(QualityError::InvalidWeight {
                kind: kind.to_string(),
                weight,
            });
        }

        let expected_fields = definition
            .output
            .expected_fields
            .iter()
            .map(|f| parse(f))
            .collect::<Result<Vec<_>>>()?;
        let freshness_field = definition
            .output
            .freshness_field
            .as_deref()
            .map(parse)
            .transpose()?;

        Ok(Self {
            kind,
            category: definition.category(),
            expected_fields,
            reliability_weight: weight,
            freshness_field,
            stale_after_days: definition.output.stale_after_days,
        })
    }

    /// Neutral schema for a kind without a definition.
    #[must_use]
    pub fn unknown(kind: CollectorKind) -> Self {
        Self {
            kind,
            category: kind.category(),
            expected_fields: Vec::new(),
            reliability_weight: 1.0,
            freshness_field: None,
            stale_after_days: None,
        }
    }
}

/// Lookup table of [`KindSchema`] by kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualitySchema {
    kinds: BTreeMap<CollectorKind, KindSchema>,
}

impl QualitySchema {
    /// Build from a set of definitions.
    pub fn from_definitions<'a, I>(definitions: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a CollectorDefinition>,
    {
        let kinds = definitions
            .into_iter()
            .map(|d| KindSchema::from_definition(d).map(|s| (s.kind, s)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self { kinds })
    }

    /// Build from every collector in a registry.
    pub fn from_registry(registry: &CollectorRegistry) -> Result<Self> {
        Self::from_definitions(registry.definitions())
    }

    /// Schema for `kind`, if declared.
    #[must_use]
    pub fn get(&self, kind: CollectorKind) -> Option<&KindSchema> {
        self.kinds.get(&kind)
    }

    /// Number of kinds declared.
    #[must_use]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Whether no kind is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prospector_collector::{
        CollectorMetadata, CostModel, InputMapping, OutputSchema, RetryPolicy, SubjectField,
    };
    use prospector_core::Cost;

    fn definition(fields: &[&str], weight: f64) -> CollectorDefinition {
        CollectorDefinition {
            collector: CollectorMetadata {
                kind: CollectorKind::LinkedinPosts,
                name: "posts".to_string(),
                description: String::new(),
                endpoint: None,
                token_env: None,
                depends_on: None,
                priority: 0,
                reliability_weight: weight,
                rate_limit_per_minute: None,
            },
            cost: CostModel::Fixed {
                price: Cost::from_usd(1.0),
            },
            retry: RetryPolicy::default(),
            input: InputMapping::from_subject("profileUrls", vec![SubjectField::LinkedinUrl]),
            output: OutputSchema {
                expected_fields: fields.iter().map(|f| (*f).to_string()).collect(),
                freshness_field: Some("posts.postedAt".to_string()),
                stale_after_days: Some(30),
            },
        }
    }

    #[test]
    fn test_from_definition() {
        let schema =
            KindSchema::from_definition(&definition(&["posts", "profile.fullName"], 0.6))
                .expect("schema");
        assert_eq!(schema.category, CollectorCategory::Linkedin);
        assert_eq!(schema.expected_fields.len(), 2);
        assert_eq!(
            schema.freshness_field.map(|f| f.to_string()),
            Some("posts.postedAt".to_string())
        );
    }

    #[test]
    fn test_invalid_path_rejected() {
        let err = KindSchema::from_definition(&definition(&["profile..name"], 0.6))
            .expect_err("bad path");
        assert!(matches!(err, QualityError::InvalidFieldPath { .. }));
    }

    #[test]
    fn test_from_definitions_keys_by_kind() {
        let defs = [definition(&["posts"], 0.6)];
        let schema = QualitySchema::from_definitions(&defs).expect("schema");
        assert_eq!(schema.len(), 1);
        assert!(schema.get(CollectorKind::LinkedinPosts).is_some());
        assert!(schema.get(CollectorKind::Zoominfo).is_none());
    }
}
