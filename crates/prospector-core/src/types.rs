//! Shared types used across Prospector.
//!
//! This module defines the identifiers, money type and collector taxonomy
//! that every other crate speaks in.

use crate::error::ProspectorError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;
use std::sync::OnceLock;

const MICROS_PER_USD: f64 = 1_000_000.0;

/// Newtype for request identifiers with validation.
///
/// Request IDs must be valid UUIDs (v4 format).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RequestId(String);

impl RequestId {
    /// Create a new `RequestId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID is not a valid UUID v4.
    pub fn new(id: impl Into<String>) -> Result<Self, ProspectorError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Create a new random `RequestId` using UUID v4.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> Result<(), ProspectorError> {
        static UUID_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = UUID_REGEX.get_or_init(|| {
            Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
                .expect("valid regex")
        });

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(ProspectorError::Validation(format!(
                "invalid request ID: must be a valid UUID v4, got '{id}'"
            )))
        }
    }
}

impl TryFrom<String> for RequestId {
    type Error = ProspectorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RequestId> for String {
    fn from(id: RequestId) -> Self {
        id.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one orchestrator run.
///
/// A request is executed by exactly one run; the run ID distinguishes log
/// lines and stored envelopes when the same request is resubmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(uuid::Uuid);

impl RunId {
    /// Create a fresh run identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monetary amount in micro-dollars.
///
/// Ledger arithmetic is exact integer arithmetic; the USD float form exists
/// only at the serialization and configuration edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Cost(u64);

impl Cost {
    /// Zero cost.
    pub const ZERO: Self = Self(0);

    /// Create a cost from micro-dollars.
    #[must_use]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Create a cost from a USD amount, rounding to the nearest micro-dollar.
    ///
    /// Negative and non-finite amounts clamp to zero.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_usd(usd: f64) -> Self {
        if usd.is_finite() && usd > 0.0 {
            Self((usd * MICROS_PER_USD).round() as u64)
        } else {
            Self::ZERO
        }
    }

    /// Amount in micro-dollars.
    #[must_use]
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// Amount in USD.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_usd(self) -> f64 {
        self.0 as f64 / MICROS_PER_USD
    }

    /// Whether the amount is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Saturating addition.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Saturating subtraction (floors at zero).
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Checked subtraction.
    #[must_use]
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Multiply by `numerator / denominator`, rounding up.
    ///
    /// Used for per-unit pricing where the price is quoted per `denominator`
    /// units. A zero denominator is treated as one.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn mul_ratio(self, numerator: u64, denominator: u64) -> Self {
        let denominator = u128::from(denominator.max(1));
        let product = u128::from(self.0) * u128::from(numerator);
        let value = product.div_ceil(denominator);
        Self(u64::try_from(value).unwrap_or(u64::MAX))
    }

    /// Increase the amount by `pct` percent, rounding up.
    #[must_use]
    pub fn with_headroom_pct(self, pct: u32) -> Self {
        self.mul_ratio(100 + u64::from(pct), 100)
    }
}

impl TryFrom<f64> for Cost {
    type Error = ProspectorError;

    fn try_from(usd: f64) -> Result<Self, Self::Error> {
        if !usd.is_finite() || usd < 0.0 {
            return Err(ProspectorError::Validation(format!(
                "invalid cost: must be a finite non-negative USD amount, got {usd}"
            )));
        }
        Ok(Self::from_usd(usd))
    }
}

impl From<Cost> for f64 {
    fn from(cost: Cost) -> Self {
        cost.as_usd()
    }
}

impl Add for Cost {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl AddAssign for Cost {
    fn add_assign(&mut self, rhs: Self) {
        *self = self.saturating_add(rhs);
    }
}

impl Sum for Cost {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.4}", self.as_usd())
    }
}

/// Category a collector's data belongs to.
///
/// Quality scores are rolled up per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorCategory {
    /// Professional network profile and activity
    Linkedin,
    /// Public social media activity
    SocialMedia,
    /// Firmographic and company registry data
    CompanyData,
}

impl CollectorCategory {
    /// Human-readable name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Linkedin => "LinkedIn",
            Self::SocialMedia => "Social Media",
            Self::CompanyData => "Company Data",
        }
    }
}

impl fmt::Display for CollectorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Enumerated collector kinds known to the engine.
///
/// Dispatch is keyed by this enum; every kind has at most one registered
/// collector implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorKind {
    /// LinkedIn profile scraper
    LinkedinProfile,
    /// LinkedIn posts scraper
    LinkedinPosts,
    /// LinkedIn company page scraper
    LinkedinCompany,
    /// Facebook page posts scraper
    FacebookPosts,
    /// Twitter/X profile and tweets scraper
    TwitterProfile,
    /// Erasmus+ organisation search
    ErasmusOrganisation,
    /// Dun & Bradstreet company lookup
    DunBradstreet,
    /// ZoomInfo company lookup
    Zoominfo,
    /// Crunchbase organisation lookup
    Crunchbase,
}

impl CollectorKind {
    /// Every known kind, in declaration order.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[
            Self::LinkedinProfile,
            Self::LinkedinPosts,
            Self::LinkedinCompany,
            Self::FacebookPosts,
            Self::TwitterProfile,
            Self::ErasmusOrganisation,
            Self::DunBradstreet,
            Self::Zoominfo,
            Self::Crunchbase,
        ]
    }

    /// Stable machine identifier (matches the serde form).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LinkedinProfile => "linkedin_profile",
            Self::LinkedinPosts => "linkedin_posts",
            Self::LinkedinCompany => "linkedin_company",
            Self::FacebookPosts => "facebook_posts",
            Self::TwitterProfile => "twitter_profile",
            Self::ErasmusOrganisation => "erasmus_organisation",
            Self::DunBradstreet => "dun_bradstreet",
            Self::Zoominfo => "zoominfo",
            Self::Crunchbase => "crunchbase",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::LinkedinProfile => "LinkedIn Profile",
            Self::LinkedinPosts => "LinkedIn Posts",
            Self::LinkedinCompany => "LinkedIn Company",
            Self::FacebookPosts => "Facebook Posts",
            Self::TwitterProfile => "Twitter/X Profile",
            Self::ErasmusOrganisation => "Erasmus+ Organisation",
            Self::DunBradstreet => "Dun & Bradstreet",
            Self::Zoominfo => "ZoomInfo",
            Self::Crunchbase => "Crunchbase",
        }
    }

    /// Category this kind's data belongs to.
    #[must_use]
    pub fn category(&self) -> CollectorCategory {
        match self {
            Self::LinkedinProfile | Self::LinkedinPosts | Self::LinkedinCompany => {
                CollectorCategory::Linkedin
            }
            Self::FacebookPosts | Self::TwitterProfile => CollectorCategory::SocialMedia,
            Self::ErasmusOrganisation
            | Self::DunBradstreet
            | Self::Zoominfo
            | Self::Crunchbase => CollectorCategory::CompanyData,
        }
    }
}

impl FromStr for CollectorKind {
    type Err = ProspectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ProspectorError::Validation(format!("unknown collector kind '{s}'")))
    }
}

impl fmt::Display for CollectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Wrapper around `chrono::DateTime<Utc>` for consistent timestamp handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp representing the current moment.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Get the inner `DateTime<Utc>`.
    #[must_use]
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Parse a timestamp from an RFC3339 string.
    pub fn from_rfc3339(s: &str) -> Result<Self, ProspectorError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| ProspectorError::Validation(format!("invalid timestamp: {e}")))
    }

    /// Format as RFC3339 string.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Milliseconds elapsed from `earlier` to `self`, floored at zero.
    #[must_use]
    pub fn millis_since(&self, earlier: &Timestamp) -> u64 {
        u64::try_from((self.0 - earlier.0).num_milliseconds()).unwrap_or(0)
    }

    /// Whole days elapsed from `earlier` to `self` (negative if `earlier` is later).
    #[must_use]
    pub fn days_since(&self, earlier: &Timestamp) -> i64 {
        (self.0 - earlier.0).num_days()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}
