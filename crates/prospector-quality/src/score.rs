//! Quality score types.

use prospector_core::{CollectorCategory, CollectorKind, RequestId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Letter grade for an overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    /// 0.9 and above
    A,
    /// 0.8 and above
    B,
    /// 0.7 and above
    C,
    /// 0.6 and above
    D,
    /// Below 0.6
    F,
}

impl Grade {
    /// Grade for a score in `[0, 1]`.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 0.9 => Self::A,
            s if s >= 0.8 => Self::B,
            s if s >= 0.7 => Self::C,
            s if s >= 0.6 => Self::D,
            _ => Self::F,
        }
    }

    /// Human-readable descriptor.
    #[must_use]
    pub fn descriptor(self) -> &'static str {
        match self {
            Self::A => "Excellent",
            Self::B => "Good",
            Self::C => "Fair",
            Self::D => "Poor",
            Self::F => "Insufficient",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        };
        f.write_str(letter)
    }
}

/// Why a score was lowered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeductionReason {
    /// An expected field is empty or absent
    MissingField {
        /// Dotted field path
        field: String,
    },
    /// The requested kind produced no data
    Unavailable {
        /// `failed`, `skipped` or `cancelled`
        status: String,
        /// Human-readable reason
        reason: String,
    },
    /// The data is older than the kind's freshness window
    StaleData {
        /// Age of the freshest record
        age_days: i64,
        /// Allowed age
        max_age_days: u32,
    },
    /// The kind is a fallback source with a low reliability weight
    LowConfidenceSource {
        /// The kind's reliability weight
        weight: f64,
    },
    /// The collector succeeded with an empty payload
    EmptyPayload,
}

/// A deduction attributed to one kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deduction {
    /// Kind concerned
    pub kind: CollectorKind,
    /// What was wrong
    #[serde(flatten)]
    pub reason: DeductionReason,
}

/// Score of one requested kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindScore {
    /// Collector kind
    pub kind: CollectorKind,
    /// Whether the kind produced data
    pub available: bool,
    /// Non-empty expected fields over expected fields
    pub completeness: f64,
    /// Expected fields present in the payload
    pub present_fields: Vec<String>,
    /// Expected fields missing from the payload
    pub missing_fields: Vec<String>,
    /// Whether the freshness window was exceeded
    pub stale: bool,
    /// Reliability weight used in the overall average
    pub weight: f64,
    /// Completeness after the staleness penalty
    pub score: f64,
}

/// Weighted roll-up of one data category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    /// Category
    pub category: CollectorCategory,
    /// Requested kinds in this category
    pub requested: usize,
    /// Of those, how many produced data
    pub available: usize,
    /// Weighted average score
    pub score: f64,
}

/// Quality assessment of one aggregated envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    /// Request the envelope belongs to
    pub request_id: RequestId,
    /// Weighted average over every requested kind, in `[0, 1]`
    pub overall: f64,
    /// Letter grade of `overall`
    pub grade: Grade,
    /// Set when no requested kind produced data
    pub no_data: bool,
    /// Per-kind scores
    pub kinds: BTreeMap<CollectorKind, KindScore>,
    /// Per-category roll-up
    pub categories: BTreeMap<CollectorCategory, CategoryScore>,
    /// Every deduction, ordered by kind
    pub deductions: Vec<Deduction>,
}

impl QualityScore {
    /// Overall score as a 0-100 percentage.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn percent(&self) -> u8 {
        (self.overall * 100.0).round().clamp(0.0, 100.0) as u8
    }

    /// Deductions for one kind.
    pub fn deductions_for(&self, kind: CollectorKind) -> impl Iterator<Item = &Deduction> {
        self.deductions.iter().filter(move |d| d.kind == kind)
    }
}
