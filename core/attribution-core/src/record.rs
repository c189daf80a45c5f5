//! The attribution record and the partial signal sets merged into it.
//!
//! A record on disk is a flat JSON object. Updates are a shallow right-biased
//! merge: each layer overwrites only the keys it defines, and keys this crate
//! does not know about ride along untouched in [`AttributionRecord::extra`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The five campaign-tagging fields, in the order they are read from a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtmField {
    Source,
    Medium,
    Campaign,
    Term,
    Content,
}

impl UtmField {
    pub const ALL: [UtmField; 5] = [
        UtmField::Source,
        UtmField::Medium,
        UtmField::Campaign,
        UtmField::Term,
        UtmField::Content,
    ];

    /// Query parameter name (`utm_source`, ...).
    pub fn param(self) -> &'static str {
        match self {
            UtmField::Source => "utm_source",
            UtmField::Medium => "utm_medium",
            UtmField::Campaign => "utm_campaign",
            UtmField::Term => "utm_term",
            UtmField::Content => "utm_content",
        }
    }
}

/// Medium assigned to click-identifier matches.
pub const MEDIUM_PAID: &str = "paid";
/// Medium assigned to unclassified external referrers.
pub const MEDIUM_REFERRAL: &str = "referral";

/// A partial record produced by one signal source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signals {
    pub source: Option<String>,
    pub medium: Option<String>,
    pub campaign: Option<String>,
    pub term: Option<String>,
    pub content: Option<String>,
}

impl Signals {
    pub fn new(source: impl Into<String>, medium: impl Into<String>) -> Self {
        Signals {
            source: Some(source.into()),
            medium: Some(medium.into()),
            ..Signals::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        UtmField::ALL.iter().all(|field| self.get(*field).is_none())
    }

    pub fn get(&self, field: UtmField) -> Option<&str> {
        self.slot(field).as_deref()
    }

    pub fn set(&mut self, field: UtmField, value: impl Into<String>) {
        *self.slot_mut(field) = Some(value.into());
    }

    fn slot(&self, field: UtmField) -> &Option<String> {
        match field {
            UtmField::Source => &self.source,
            UtmField::Medium => &self.medium,
            UtmField::Campaign => &self.campaign,
            UtmField::Term => &self.term,
            UtmField::Content => &self.content,
        }
    }

    fn slot_mut(&mut self, field: UtmField) -> &mut Option<String> {
        match field {
            UtmField::Source => &mut self.source,
            UtmField::Medium => &mut self.medium,
            UtmField::Campaign => &mut self.campaign,
            UtmField::Term => &mut self.term,
            UtmField::Content => &mut self.content,
        }
    }
}

/// Freshness metadata stamped onto a record whenever new signal arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateMetadata {
    pub last_updated: DateTime<Utc>,
    pub referrer: String,
    pub landing_page: String,
}

/// The persisted and propagated attribution entity.
///
/// `AttributionRecord::default()` is the empty record, `{}` on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "iso_millis"
    )]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landing_page: Option<String>,
    /// Keys written by someone else. Preserved across merges.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl AttributionRecord {
    pub fn is_empty(&self) -> bool {
        self.source.is_none()
            && self.medium.is_none()
            && self.campaign.is_none()
            && self.term.is_none()
            && self.content.is_none()
            && self.last_updated.is_none()
            && self.referrer.is_none()
            && self.landing_page.is_none()
            && self.extra.is_empty()
    }

    /// Shallow merge: `existing ⊕ referrer ⊕ params ⊕ metadata`.
    pub fn merged(
        existing: AttributionRecord,
        referrer: &Signals,
        params: &Signals,
        metadata: UpdateMetadata,
    ) -> AttributionRecord {
        let mut record = existing;
        record.apply(referrer);
        record.apply(params);
        record.stamp(metadata);
        record
    }

    /// Overwrites every field the signal set defines and nothing else.
    pub fn apply(&mut self, signals: &Signals) {
        for field in UtmField::ALL {
            if let Some(value) = signals.get(field) {
                *self.field_mut(field) = Some(value.to_string());
            }
        }
    }

    /// Millisecond precision, matching what the store round-trips.
    pub fn stamp(&mut self, metadata: UpdateMetadata) {
        let ts = metadata.last_updated;
        self.last_updated =
            Some(DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts));
        self.referrer = Some(metadata.referrer);
        self.landing_page = Some(metadata.landing_page);
    }

    pub fn field(&self, field: UtmField) -> Option<&str> {
        match field {
            UtmField::Source => self.source.as_deref(),
            UtmField::Medium => self.medium.as_deref(),
            UtmField::Campaign => self.campaign.as_deref(),
            UtmField::Term => self.term.as_deref(),
            UtmField::Content => self.content.as_deref(),
        }
    }

    fn field_mut(&mut self, field: UtmField) -> &mut Option<String> {
        match field {
            UtmField::Source => &mut self.source,
            UtmField::Medium => &mut self.medium,
            UtmField::Campaign => &mut self.campaign,
            UtmField::Term => &mut self.term,
            UtmField::Content => &mut self.content,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Default::default()))
    }
}

/// `2026-10-15T12:00:00.000Z`, the format browsers produce for ISO timestamps.
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(serde::de::Error::custom)
        })
        .transpose()
    }
}
