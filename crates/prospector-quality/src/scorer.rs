//! The quality scorer.

use crate::fields::is_empty_value;
use crate::schema::{KindSchema, QualitySchema};
use crate::score::{CategoryScore, Deduction, DeductionReason, Grade, KindScore, QualityScore};
use prospector_collector::{AggregatedEnvelope, CollectorResult};
use prospector_core::{CollectorCategory, CollectorKind, QualityConfig, Timestamp};
use std::collections::BTreeMap;
use tracing::debug;

/// Tunables applied on top of the static schema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringSettings {
    /// Fraction removed from a kind's score when its data is stale
    pub stale_penalty: f64,
    /// Weights below this flag the source as low confidence
    pub low_confidence_weight: f64,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self::from(&QualityConfig::default())
    }
}

impl From<&QualityConfig> for ScoringSettings {
    fn from(config: &QualityConfig) -> Self {
        Self {
            stale_penalty: config.stale_penalty.clamp(0.0, 1.0),
            low_confidence_weight: config.low_confidence_weight,
        }
    }
}

/// Scores aggregated envelopes against a [`QualitySchema`].
///
/// Scoring is a pure function of the envelope: the same envelope always
/// yields the same score. Staleness is measured against the envelope's
/// `completed_at`, never the wall clock.
#[derive(Debug, Clone)]
pub struct QualityScorer {
    schema: QualitySchema,
    settings: ScoringSettings,
}

impl QualityScorer {
    /// Create a scorer with default settings.
    #[must_use]
    pub fn new(schema: QualitySchema) -> Self {
        Self {
            schema,
            settings: ScoringSettings::default(),
        }
    }

    /// Replace the scoring settings.
    #[must_use]
    pub fn with_settings(mut self, settings: ScoringSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Schema in use.
    #[must_use]
    pub fn schema(&self) -> &QualitySchema {
        &self.schema
    }

    /// Score an envelope.
    ///
    /// Every requested kind counts: kinds without data score zero but keep
    /// their weight in the denominator, so a missing high-weight source
    /// lowers the overall score visibly.
    #[must_use]
    pub fn score(&self, envelope: &AggregatedEnvelope) -> QualityScore {
        let mut kinds = BTreeMap::new();
        let mut deductions = Vec::new();

        for kind in requested_kinds(envelope) {
            let schema = self
                .schema
                .get(kind)
                .cloned()
                .unwrap_or_else(|| KindSchema::unknown(kind));
            let score = self.score_kind(
                &schema,
                envelope.get(kind),
                envelope.completed_at,
                &mut deductions,
            );
            kinds.insert(kind, score);
        }

        let no_data = !kinds.values().any(|k: &KindScore| k.available);
        let overall = if no_data {
            0.0
        } else {
            weighted_mean(kinds.values())
        };
        let categories = self.categories(&kinds);

        debug!(
            request_id = %envelope.request_id,
            overall,
            no_data,
            deductions = deductions.len(),
            "scored envelope"
        );

        QualityScore {
            request_id: envelope.request_id.clone(),
            overall,
            grade: Grade::from_score(overall),
            no_data,
            kinds,
            categories,
            deductions,
        }
    }

    fn score_kind(
        &self,
        schema: &KindSchema,
        result: Option<&CollectorResult>,
        as_of: Timestamp,
        deductions: &mut Vec<Deduction>,
    ) -> KindScore {
        let kind = schema.kind;
        let mut deduct = |reason| deductions.push(Deduction { kind, reason });

        let unavailable = |missing_fields: Vec<String>| KindScore {
            kind,
            available: false,
            completeness: 0.0,
            present_fields: Vec::new(),
            missing_fields,
            stale: false,
            weight: schema.reliability_weight,
            score: 0.0,
        };
        let all_fields = || -> Vec<String> {
            schema.expected_fields.iter().map(ToString::to_string).collect()
        };

        let payload = match result {
            Some(r) if r.is_success() => r.payload.as_ref(),
            Some(r) => {
                deduct(DeductionReason::Unavailable {
                    status: r.status.label().to_string(),
                    reason: r.status.reason().unwrap_or_default(),
                });
                return unavailable(all_fields());
            }
            None => {
                deduct(DeductionReason::Unavailable {
                    status: "missing".to_string(),
                    reason: "no result recorded".to_string(),
                });
                return unavailable(all_fields());
            }
        };

        if schema.reliability_weight < self.settings.low_confidence_weight {
            deduct(DeductionReason::LowConfidenceSource {
                weight: schema.reliability_weight,
            });
        }

        let Some(payload) = payload.filter(|p| !is_empty_value(p)) else {
            deduct(DeductionReason::EmptyPayload);
            let mut score = unavailable(all_fields());
            score.available = true;
            return score;
        };

        let (present, missing): (Vec<_>, Vec<_>) = schema
            .expected_fields
            .iter()
            .partition(|field| field.is_present(payload));
        for field in &missing {
            deduct(DeductionReason::MissingField {
                field: field.to_string(),
            });
        }

        #[allow(clippy::cast_precision_loss)]
        let completeness = if schema.expected_fields.is_empty() {
            1.0
        } else {
            present.len() as f64 / schema.expected_fields.len() as f64
        };

        let mut stale = false;
        if let (Some(field), Some(max_age)) = (&schema.freshness_field, schema.stale_after_days) {
            if let Some(latest) = field.latest_timestamp(payload) {
                let age_days = as_of.days_since(&latest);
                if age_days > i64::from(max_age) {
                    stale = true;
                    deduct(DeductionReason::StaleData {
                        age_days,
                        max_age_days: max_age,
                    });
                }
            }
        }

        let score = if stale {
            completeness * (1.0 - self.settings.stale_penalty)
        } else {
            completeness
        };

        KindScore {
            kind,
            available: true,
            completeness,
            present_fields: present.iter().map(ToString::to_string).collect(),
            missing_fields: missing.iter().map(ToString::to_string).collect(),
            stale,
            weight: schema.reliability_weight,
            score,
        }
    }

    fn categories(
        &self,
        kinds: &BTreeMap<CollectorKind, KindScore>,
    ) -> BTreeMap<CollectorCategory, CategoryScore> {
        let mut grouped: BTreeMap<CollectorCategory, Vec<&KindScore>> = BTreeMap::new();
        for score in kinds.values() {
            let category = self
                .schema
                .get(score.kind)
                .map_or_else(|| score.kind.category(), |s| s.category);
            grouped.entry(category).or_default().push(score);
        }

        grouped
            .into_iter()
            .map(|(category, scores)| {
                let available = scores.iter().filter(|s| s.available).count();
                let score = if available == 0 {
                    0.0
                } else {
                    weighted_mean(scores.iter().copied())
                };
                (
                    category,
                    CategoryScore {
                        category,
                        requested: scores.len(),
                        available,
                        score,
                    },
                )
            })
            .collect()
    }
}

/// Requested kinds, deduplicated, in kind order.
fn requested_kinds(envelope: &AggregatedEnvelope) -> Vec<CollectorKind> {
    let mut kinds = envelope.requested.clone();
    kinds.sort();
    kinds.dedup();
    kinds
}

/// Weighted average of kind scores; falls back to a plain mean when every
/// weight is zero.
fn weighted_mean<'a, I>(scores: I) -> f64
where
    I: IntoIterator<Item = &'a KindScore>,
{
    let mut weighted = 0.0;
    let mut weights = 0.0;
    let mut plain = 0.0;
    let mut count = 0_u32;
    for s in scores {
        weighted += s.score * s.weight;
        weights += s.weight;
        plain += s.score;
        count += 1;
    }

    if weights > 0.0 {
        (weighted / weights).clamp(0.0, 1.0)
    } else if count > 0 {
        (plain / f64::from(count)).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prospector_collector::{
        CollectorDefinition, CollectorError, CollectorMetadata, CostModel, InputMapping,
        OutputSchema, RetryPolicy, SkipReason, SubjectField, TaskUsage,
    };
    use prospector_core::{Cost, RequestId, RunId};
    use serde_json::{json, Value};

    fn definition(kind: CollectorKind, weight: f64, fields: &[&str]) -> CollectorDefinition {
        CollectorDefinition {
            collector: CollectorMetadata {
                kind,
                name: kind.display_name().to_string(),
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
            input: InputMapping::from_subject("names", vec![SubjectField::Company]),
            output: OutputSchema {
                expected_fields: fields.iter().map(|f| (*f).to_string()).collect(),
                freshness_field: None,
                stale_after_days: None,
            },
        }
    }

    fn scorer() -> QualityScorer {
        let mut posts = definition(CollectorKind::LinkedinPosts, 0.6, &["posts"]);
        posts.output.freshness_field = Some("posts.postedAt".to_string());
        posts.output.stale_after_days = Some(30);

        let defs = vec![
            definition(
                CollectorKind::LinkedinProfile,
                1.0,
                &["profile.fullName", "profile.headline"],
            ),
            posts,
            definition(CollectorKind::Zoominfo, 0.7, &["company.name", "contacts"]),
            definition(CollectorKind::ErasmusOrganisation, 0.4, &["organisation.name"]),
        ];
        QualityScorer::new(QualitySchema::from_definitions(&defs).expect("schema"))
    }

    fn at(s: &str) -> Timestamp {
        Timestamp::from_rfc3339(s).expect("timestamp")
    }

    fn ok(kind: CollectorKind, payload: Value) -> CollectorResult {
        CollectorResult::succeeded(kind, payload, TaskUsage::none(at("2025-06-01T00:00:00Z")))
    }

    fn envelope(results: Vec<CollectorResult>) -> AggregatedEnvelope {
        let completed_at = at("2025-06-01T00:00:00Z");
        AggregatedEnvelope {
            request_id: RequestId::generate(),
            run_id: RunId::generate(),
            requested: results.iter().map(|r| r.kind).collect(),
            results: results.into_iter().map(|r| (r.kind, r)).collect(),
            total_cost: Cost::ZERO,
            cost_by_category: BTreeMap::new(),
            budget_limit: Cost::from_usd(100.0),
            total_elapsed_ms: 0,
            success_rate: 0.0,
            started_at: completed_at,
            completed_at,
        }
    }

    fn full_profile() -> CollectorResult {
        ok(
            CollectorKind::LinkedinProfile,
            json!({"profile": {"fullName": "Ada", "headline": "CTO"}}),
        )
    }

    fn full_zoominfo() -> CollectorResult {
        ok(
            CollectorKind::Zoominfo,
            json!({"company": {"name": "Acme"}, "contacts": [{"name": "Bob"}]}),
        )
    }

    #[test]
    fn test_complete_envelope_scores_one() {
        let score = scorer().score(&envelope(vec![full_profile(), full_zoominfo()]));
        assert!((score.overall - 1.0).abs() < f64::EPSILON);
        assert_eq!(score.grade, Grade::A);
        assert!(!score.no_data);
        assert!(score.deductions.is_empty());
        assert_eq!(score.percent(), 100);
    }

    #[test]
    fn test_scoring_is_idempotent() {
        let scorer = scorer();
        let env = envelope(vec![
            full_profile(),
            ok(CollectorKind::Zoominfo, json!({"company": {"name": "Acme"}})),
        ]);
        assert_eq!(scorer.score(&env), scorer.score(&env));
    }

    #[test]
    fn test_partial_completeness_and_missing_fields() {
        let score = scorer().score(&envelope(vec![ok(
            CollectorKind::Zoominfo,
            json!({"company": {"name": "Acme"}, "contacts": []}),
        )]));
        let kind = &score.kinds[&CollectorKind::Zoominfo];
        assert!((kind.completeness - 0.5).abs() < f64::EPSILON);
        assert_eq!(kind.missing_fields, vec!["contacts".to_string()]);
        assert!(score.deductions_for(CollectorKind::Zoominfo).any(|d| matches!(
            &d.reason,
            DeductionReason::MissingField { field } if field == "contacts"
        )));
    }

    #[test]
    fn test_missing_high_weight_kind_scores_lower() {
        let scorer = scorer();
        let complete = scorer.score(&envelope(vec![full_profile(), full_zoominfo()]));

        let failed = CollectorResult::failed(
            CollectorKind::LinkedinProfile,
            &CollectorError::InvalidTarget("profile removed".to_string()),
            TaskUsage::none(at("2025-06-01T00:00:00Z")),
        );
        let partial = scorer.score(&envelope(vec![failed, full_zoominfo()]));

        assert!(partial.overall < complete.overall);
        // zoominfo weight 0.7 over total weight 1.7
        assert!((partial.overall - 0.7 / 1.7).abs() < 1e-9);
        assert!(partial
            .deductions_for(CollectorKind::LinkedinProfile)
            .any(|d| matches!(&d.reason, DeductionReason::Unavailable { status, .. } if status == "failed")));
    }

    #[test]
    fn test_no_successful_kind_flags_no_data() {
        let skipped = CollectorResult::skipped(
            CollectorKind::Zoominfo,
            SkipReason::BudgetExhausted {
                requested: Cost::from_usd(20.0),
                remaining: Cost::from_usd(1.0),
            },
            at("2025-06-01T00:00:00Z"),
        );
        let score = scorer().score(&envelope(vec![skipped]));
        assert!(score.no_data);
        assert!(score.overall.abs() < f64::EPSILON);
        assert_eq!(score.grade, Grade::F);
    }

    #[test]
    fn test_empty_request_scores_zero() {
        let score = scorer().score(&envelope(Vec::new()));
        assert!(score.no_data);
        assert!(score.kinds.is_empty());
        assert!(score.overall.abs() < f64::EPSILON);
    }

    #[test]
    fn test_stale_data_penalised() {
        let scorer = scorer();
        let fresh = scorer.score(&envelope(vec![ok(
            CollectorKind::LinkedinPosts,
            json!({"posts": [{"postedAt": "2025-05-20T00:00:00Z"}]}),
        )]));
        let stale = scorer.score(&envelope(vec![ok(
            CollectorKind::LinkedinPosts,
            json!({"posts": [{"postedAt": "2025-01-01T00:00:00Z"}]}),
        )]));

        assert!((fresh.overall - 1.0).abs() < f64::EPSILON);
        assert!((stale.overall - 0.75).abs() < 1e-9);
        assert!(stale.kinds[&CollectorKind::LinkedinPosts].stale);
        assert!(stale
            .deductions
            .iter()
            .any(|d| matches!(d.reason, DeductionReason::StaleData { max_age_days: 30, .. })));
    }

    #[test]
    fn test_low_confidence_and_empty_payload() {
        let score = scorer().score(&envelope(vec![ok(
            CollectorKind::ErasmusOrganisation,
            json!([]),
        )]));
        let reasons: Vec<_> = score.deductions.iter().map(|d| &d.reason).collect();
        assert!(reasons
            .iter()
            .any(|r| matches!(r, DeductionReason::LowConfidenceSource { .. })));
        assert!(reasons
            .iter()
            .any(|r| matches!(r, DeductionReason::EmptyPayload)));
        let kind = &score.kinds[&CollectorKind::ErasmusOrganisation];
        assert!(kind.available);
        assert!(kind.score.abs() < f64::EPSILON);
        assert!(!score.no_data);
    }

    #[test]
    fn test_unknown_kind_uses_neutral_schema() {
        let score = scorer().score(&envelope(vec![ok(
            CollectorKind::Crunchbase,
            json!({"organisation": {"name": "Acme"}}),
        )]));
        let kind = &score.kinds[&CollectorKind::Crunchbase];
        assert!((kind.completeness - 1.0).abs() < f64::EPSILON);
        assert!((kind.weight - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_weights_fall_back_to_plain_mean() {
        let defs = vec![
            definition(CollectorKind::FacebookPosts, 0.0, &["posts"]),
            definition(CollectorKind::TwitterProfile, 0.0, &["profile"]),
        ];
        let scorer = QualityScorer::new(QualitySchema::from_definitions(&defs).expect("schema"));
        let score = scorer.score(&envelope(vec![
            ok(CollectorKind::FacebookPosts, json!({"posts": [1]})),
            ok(CollectorKind::TwitterProfile, json!({"other": 1})),
        ]));
        assert!((score.overall - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_category_rollup() {
        let score = scorer().score(&envelope(vec![full_profile(), full_zoominfo()]));
        let linkedin = &score.categories[&CollectorCategory::Linkedin];
        assert_eq!(linkedin.requested, 1);
        assert_eq!(linkedin.available, 1);
        assert!((linkedin.score - 1.0).abs() < f64::EPSILON);
        assert!(score.categories.contains_key(&CollectorCategory::CompanyData));
        assert!(!score.categories.contains_key(&CollectorCategory::SocialMedia));
    }
}
