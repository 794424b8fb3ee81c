//! Request subject and collector input construction.
//!
//! A collector's input is assembled from the request [`Subject`] and, for
//! dependent collectors, values pulled out of the dependency's payload.

use crate::error::CollectorError;
use prospector_core::CollectorKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// The prospect a request is about.
///
/// Every field is optional; collectors declare which ones they read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subject {
    /// Person's full name
    pub full_name: Option<String>,
    /// Company name
    pub company: Option<String>,
    /// Company web domain
    pub domain: Option<String>,
    /// Contact email
    pub email: Option<String>,
    /// LinkedIn profile URL
    pub linkedin_url: Option<String>,
    /// LinkedIn company page URL
    pub linkedin_company_url: Option<String>,
    /// Facebook page URL
    pub facebook_page: Option<String>,
    /// Twitter/X handle
    pub twitter_handle: Option<String>,
    /// D-U-N-S number
    pub duns_number: Option<String>,
    /// Erasmus+ organisation ID (OID)
    pub erasmus_oid: Option<String>,
    /// Crunchbase organisation URL
    pub crunchbase_url: Option<String>,
}

impl Subject {
    /// Value of one field, ignoring blank strings.
    #[must_use]
    pub fn get(&self, field: SubjectField) -> Option<&str> {
        let value = match field {
            SubjectField::FullName => &self.full_name,
            SubjectField::Company => &self.company,
            SubjectField::Domain => &self.domain,
            SubjectField::Email => &self.email,
            SubjectField::LinkedinUrl => &self.linkedin_url,
            SubjectField::LinkedinCompanyUrl => &self.linkedin_company_url,
            SubjectField::FacebookPage => &self.facebook_page,
            SubjectField::TwitterHandle => &self.twitter_handle,
            SubjectField::DunsNumber => &self.duns_number,
            SubjectField::ErasmusOid => &self.erasmus_oid,
            SubjectField::CrunchbaseUrl => &self.crunchbase_url,
        };
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    /// Whether no field carries a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        SubjectField::all().iter().all(|f| self.get(*f).is_none())
    }
}

/// Addressable fields of a [`Subject`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum SubjectField {
    FullName,
    Company,
    Domain,
    Email,
    LinkedinUrl,
    LinkedinCompanyUrl,
    FacebookPage,
    TwitterHandle,
    DunsNumber,
    ErasmusOid,
    CrunchbaseUrl,
}

impl SubjectField {
    /// Every field.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[
            Self::FullName,
            Self::Company,
            Self::Domain,
            Self::Email,
            Self::LinkedinUrl,
            Self::LinkedinCompanyUrl,
            Self::FacebookPage,
            Self::TwitterHandle,
            Self::DunsNumber,
            Self::ErasmusOid,
            Self::CrunchbaseUrl,
        ]
    }
}

/// Declarative description of how a collector's input is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputMapping {
    /// Name of the array parameter that carries the lookup values
    pub target: String,

    /// Subject fields read in order; every present value is used
    #[serde(default)]
    pub sources: Vec<SubjectField>,

    /// JSON pointer into the dependency's payload (e.g. `/company/url`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<String>,

    /// Maximum number of lookup values sent in one call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,

    /// Static parameters merged into every call
    #[serde(default)]
    pub defaults: Map<String, Value>,
}

impl InputMapping {
    /// Mapping that reads the given subject fields into `target`.
    #[must_use]
    pub fn from_subject(target: impl Into<String>, sources: Vec<SubjectField>) -> Self {
        Self {
            target: target.into(),
            sources,
            upstream: None,
            max_items: None,
            defaults: Map::new(),
        }
    }

    /// Also read values from the dependency payload at `pointer`.
    #[must_use]
    pub fn with_upstream(mut self, pointer: impl Into<String>) -> Self {
        self.upstream = Some(pointer.into());
        self
    }

    /// Build the call input for `kind`.
    ///
    /// # Errors
    /// Returns [`CollectorError::InvalidInput`] when neither the subject nor
    /// the upstream payload yields a single lookup value.
    pub fn build(
        &self,
        kind: CollectorKind,
        subject: &Subject,
        upstream: Option<&Value>,
    ) -> Result<CollectorInput, CollectorError> {
        let mut values: Vec<String> = Vec::new();

        for field in &self.sources {
            if let Some(value) = subject.get(*field) {
                push_unique(&mut values, value);
            }
        }

        if let (Some(pointer), Some(payload)) = (&self.upstream, upstream) {
            for value in extract_strings(payload, pointer) {
                push_unique(&mut values, &value);
            }
        }

        if values.is_empty() {
            return Err(CollectorError::InvalidInput(format!(
                "no value for `{}` in subject or upstream payload",
                self.target
            )));
        }

        if let Some(max) = self.max_items {
            if values.len() > max {
                warn!(
                    kind = %kind,
                    requested = values.len(),
                    max,
                    "truncating collector input to batch limit"
                );
                values.truncate(max);
            }
        }

        let units = values.len() as u64;
        let mut params = self.defaults.clone();
        params.insert(
            self.target.clone(),
            Value::Array(values.into_iter().map(Value::String).collect()),
        );

        Ok(CollectorInput {
            kind,
            params: Value::Object(params),
            units,
        })
    }

    /// Copy of `input` with the lookup batch cut to its first `max_items`
    /// values.
    ///
    /// Returns `None` when the batch already fits or `max_items` is zero.
    #[must_use]
    pub fn limit(&self, input: &CollectorInput, max_items: usize) -> Option<CollectorInput> {
        if max_items == 0 {
            return None;
        }
        let items = input.params.get(&self.target)?.as_array()?;
        if items.len() <= max_items {
            return None;
        }

        let mut params = input.params.clone();
        params
            .as_object_mut()?
            .insert(self.target.clone(), Value::Array(items[..max_items].to_vec()));

        Some(CollectorInput {
            kind: input.kind,
            params,
            units: max_items as u64,
        })
    }
}

fn push_unique(values: &mut Vec<String>, value: &str) {
    let value = value.trim();
    if !value.is_empty() && !values.iter().any(|v| v == value) {
        values.push(value.to_string());
    }
}

/// Strings found at `pointer`; array payloads are searched item by item.
fn extract_strings(payload: &Value, pointer: &str) -> Vec<String> {
    let mut found = Vec::new();
    match payload {
        Value::Array(items) => {
            for item in items {
                collect_at(item, pointer, &mut found);
            }
        }
        other => collect_at(other, pointer, &mut found),
    }
    found
}

fn collect_at(value: &Value, pointer: &str, out: &mut Vec<String>) {
    match value.pointer(pointer) {
        Some(Value::String(s)) => out.push(s.clone()),
        Some(Value::Array(items)) => {
            out.extend(items.iter().filter_map(Value::as_str).map(str::to_string));
        }
        _ => {}
    }
}

/// Input for one collector call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorInput {
    /// Collector this input is for
    pub kind: CollectorKind,
    /// Provider parameters
    pub params: Value,
    /// Number of lookup values (drives per-unit pricing)
    pub units: u64,
}

impl CollectorInput {
    /// Number of lookup values.
    #[must_use]
    pub fn units(&self) -> u64 {
        self.units
    }
}
