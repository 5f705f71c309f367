//! Contracts for the external data sources the engine fans out to.
//!
//! Implementations live outside the core (HTTP clients, LLM wrappers, test
//! fakes). The engine only knows these traits and the raw response shape.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::domain::fact::{AdapterFailure, SourceId};
use crate::domain::query::{Crop, ImageHandle, Region, Topic};

/// Per-call context handed to every adapter.
///
/// Retrying within `retry_budget` is the adapter's job. Long-running adapters
/// should watch `cancel` and bail out once it fires.
#[derive(Clone, Debug)]
pub struct FetchContext {
    pub date: NaiveDate,
    pub retry_budget: u32,
    pub cancel: CancellationToken,
}

impl FetchContext {
    pub fn new(date: NaiveDate, retry_budget: u32) -> Self {
        Self { date, retry_budget, cancel: CancellationToken::new() }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
    Kelvin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrecipUnit {
    Millimetre,
    Centimetre,
    Inch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceUnit {
    Quintal,
    Kilogram,
    Tonne,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawWeather {
    pub temperature: Option<f64>,
    pub temperature_unit: TemperatureUnit,
    pub precipitation: Option<f64>,
    pub precipitation_unit: PrecipUnit,
    pub condition: Option<String>,
    pub humidity_pct: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawMarket {
    pub price: Option<Decimal>,
    pub currency: Option<String>,
    pub unit: PriceUnit,
    /// Free-form label such as "rising"; checked by the normalizer.
    #[serde(default)]
    pub trend: Option<String>,
    #[serde(default)]
    pub markets: Vec<String>,
}

/// Severity as a classifier reports it: a number or a label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawSeverity {
    Score(f64),
    Label(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawDiagnosis {
    pub disease_name: Option<String>,
    pub severity: Option<RawSeverity>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "topic")]
pub enum RawPayload {
    Weather(RawWeather),
    Market(RawMarket),
    Disease(RawDiagnosis),
}

impl RawPayload {
    pub fn topic(&self) -> Topic {
        match self {
            Self::Weather(_) => Topic::Weather,
            Self::Market(_) => Topic::Market,
            Self::Disease(_) => Topic::Disease,
        }
    }
}

/// What an adapter hands back before normalization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdapterResponse {
    pub source_id: SourceId,
    pub confidence: f64,
    pub observed_at: Option<DateTime<Utc>>,
    pub payload: RawPayload,
}

pub type AdapterResult = Result<AdapterResponse, AdapterFailure>;

#[async_trait]
pub trait WeatherSource: Send + Sync {
    fn source_id(&self) -> SourceId;
    async fn fetch(&self, region: &Region, ctx: &FetchContext) -> AdapterResult;
}

#[async_trait]
pub trait MarketSource: Send + Sync {
    fn source_id(&self) -> SourceId;
    async fn fetch(&self, crop: Crop, region: Option<&Region>, ctx: &FetchContext)
        -> AdapterResult;
}

#[async_trait]
pub trait DiseaseClassifier: Send + Sync {
    fn source_id(&self) -> SourceId;
    async fn classify(
        &self,
        image: &ImageHandle,
        crop: Option<Crop>,
        ctx: &FetchContext,
    ) -> AdapterResult;
}

/// The adapters available to one engine. Any list may be empty.
#[derive(Clone, Default)]
pub struct AdapterSet {
    pub weather: Vec<Arc<dyn WeatherSource>>,
    pub market: Vec<Arc<dyn MarketSource>>,
    pub disease: Vec<Arc<dyn DiseaseClassifier>>,
}

impl AdapterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weather(mut self, source: Arc<dyn WeatherSource>) -> Self {
        self.weather.push(source);
        self
    }

    pub fn with_market(mut self, source: Arc<dyn MarketSource>) -> Self {
        self.market.push(source);
        self
    }

    pub fn with_disease(mut self, classifier: Arc<dyn DiseaseClassifier>) -> Self {
        self.disease.push(classifier);
        self
    }

    pub fn count(&self, topic: Topic) -> usize {
        match topic {
            Topic::Weather => self.weather.len(),
            Topic::Market => self.market.len(),
            Topic::Disease => self.disease.len(),
            Topic::Calendar => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.weather.is_empty() && self.market.is_empty() && self.disease.is_empty()
    }
}

impl std::fmt::Debug for AdapterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids = |ids: Vec<SourceId>| ids.into_iter().map(|id| id.0).collect::<Vec<_>>();
        f.debug_struct("AdapterSet")
            .field("weather", &ids(self.weather.iter().map(|source| source.source_id()).collect()))
            .field("market", &ids(self.market.iter().map(|source| source.source_id()).collect()))
            .field("disease", &ids(self.disease.iter().map(|source| source.source_id()).collect()))
            .finish()
    }
}
