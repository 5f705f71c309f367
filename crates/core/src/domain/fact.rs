use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::query::{Crop, Region, Topic};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub String);

impl SourceId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The region/crop half of a `(topic, key)` pair.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FactKey {
    pub region: Option<Region>,
    pub crop: Option<Crop>,
}

impl FactKey {
    pub fn region(region: Region) -> Self {
        Self { region: Some(region), crop: None }
    }

    pub fn crop(crop: Crop, region: Option<Region>) -> Self {
        Self { region, crop: Some(crop) }
    }

    pub fn describe(&self) -> String {
        match (&self.crop, &self.region) {
            (Some(crop), Some(region)) => format!("{crop} in {}", region.display_name()),
            (Some(crop), None) => crop.to_string(),
            (None, Some(region)) => region.display_name(),
            (None, None) => "unkeyed".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub temperature_c: f64,
    pub precip_mm: f64,
    pub condition: String,
    pub humidity_pct: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTrend {
    Stable,
    Rising,
    Falling,
    Volatile,
}

impl PriceTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Rising => "rising",
            Self::Falling => "falling",
            Self::Volatile => "volatile",
        }
    }
}

impl std::str::FromStr for PriceTrend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stable" | "steady" => Ok(Self::Stable),
            "rising" | "up" => Ok(Self::Rising),
            "falling" | "down" => Ok(Self::Falling),
            "volatile" => Ok(Self::Volatile),
            _ => Err(format!("unknown price trend `{value}`")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketPrice {
    /// Rupees per quintal, rounded to paise.
    pub price_per_quintal: Decimal,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend: Option<PriceTrend>,
    /// Reference mandis quoting this price, sorted and deduplicated.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub markets: Vec<String>,
}

impl MarketPrice {
    pub fn new(price_per_quintal: Decimal) -> Self {
        Self { price_per_quintal, currency: "INR".to_string(), trend: None, markets: Vec::new() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiseaseFinding {
    pub disease_name: String,
    pub severity: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "topic")]
pub enum FactValue {
    Weather(WeatherReading),
    Market(MarketPrice),
    Disease(DiseaseFinding),
}

impl FactValue {
    pub fn topic(&self) -> Topic {
        match self {
            Self::Weather(_) => Topic::Weather,
            Self::Market(_) => Topic::Market,
            Self::Disease(_) => Topic::Disease,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            Self::Weather(reading) => format!(
                "{:.1}°C, {:.1} mm, {}",
                reading.temperature_c, reading.precip_mm, reading.condition
            ),
            Self::Market(price) => format!("₹{}/quintal", price.price_per_quintal),
            Self::Disease(finding) => {
                format!("{} (severity {:.2})", finding.disease_name, finding.severity)
            }
        }
    }
}

/// One normalized observation from one adapter call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceFact {
    pub topic: Topic,
    pub key: FactKey,
    pub source_id: SourceId,
    pub value: FactValue,
    pub observed_at: DateTime<Utc>,
    pub confidence: f64,
}

impl SourceFact {
    /// Age relative to `now`; observations stamped in the future count as fresh.
    pub fn staleness(&self, now: DateTime<Utc>) -> Duration {
        (now - self.observed_at).max(Duration::zero())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterFailureKind {
    Timeout,
    Unavailable,
    InvalidKey,
}

impl AdapterFailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Unavailable => "unavailable",
            Self::InvalidKey => "invalid_key",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{source_id} failed with {}: {detail}", .kind.as_str())]
pub struct AdapterFailure {
    pub source_id: SourceId,
    pub kind: AdapterFailureKind,
    pub detail: String,
}

impl AdapterFailure {
    pub fn new(source_id: SourceId, kind: AdapterFailureKind, detail: impl Into<String>) -> Self {
        Self { source_id, kind, detail: detail.into() }
    }

    pub fn timeout(source_id: SourceId, detail: impl Into<String>) -> Self {
        Self::new(source_id, AdapterFailureKind::Timeout, detail)
    }

    pub fn unavailable(source_id: SourceId, detail: impl Into<String>) -> Self {
        Self::new(source_id, AdapterFailureKind::Unavailable, detail)
    }

    pub fn invalid_key(source_id: SourceId, detail: impl Into<String>) -> Self {
        Self::new(source_id, AdapterFailureKind::InvalidKey, detail)
    }
}

/// A conflicting observation that lost resolution but is kept for the record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    pub source_id: SourceId,
    pub value: FactValue,
    pub confidence: f64,
    pub observed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFact {
    pub topic: Topic,
    pub key: FactKey,
    pub value: FactValue,
    pub confidence: f64,
    pub contributing_source_ids: Vec<SourceId>,
    pub alternatives: Vec<Alternative>,
}

impl ResolvedFact {
    pub fn reference(&self) -> FactRef {
        FactRef { topic: self.topic, key: self.key.clone() }
    }
}

/// Points at a `ResolvedFact` held by the same advisory.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FactRef {
    pub topic: Topic,
    pub key: FactKey,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ResolutionReason {
    /// The query lacked the field the adapter is keyed on.
    MissingKey { field: String },
    /// No adapter is configured for the topic.
    NoSources,
    /// Every adapter call failed.
    SourcesFailed { failures: Vec<AdapterFailureKind> },
    /// Adapters answered but none of the payloads normalized.
    NoUsableFacts { rejected: usize },
    /// Facts arrived but all were older than the topic's freshness window.
    AllStale { discarded: usize },
}

impl ResolutionReason {
    pub fn describe(&self) -> String {
        match self {
            Self::MissingKey { field } => format!("the {field} was not mentioned"),
            Self::NoSources => "no data source is configured".to_string(),
            Self::SourcesFailed { failures } => {
                if failures.iter().all(|kind| *kind == AdapterFailureKind::Timeout) {
                    "the data source did not respond in time".to_string()
                } else if failures.iter().any(|kind| *kind == AdapterFailureKind::InvalidKey) {
                    "the data source does not recognise this location or crop".to_string()
                } else {
                    "the data source is currently unavailable".to_string()
                }
            }
            Self::NoUsableFacts { .. } => "the data source returned incomplete data".to_string(),
            Self::AllStale { .. } => "the latest available data is out of date".to_string(),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Serialize, Deserialize)]
#[error("no usable {topic} data for {}: {}", .key.describe(), .reason.describe())]
pub struct ResolutionFailure {
    pub topic: Topic,
    pub key: FactKey,
    pub reason: ResolutionReason,
}

pub type Resolution = Result<ResolvedFact, ResolutionFailure>;
