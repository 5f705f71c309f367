//! End-to-end advisory scenarios against in-memory adapters.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use krishi_core::adapters::{
    PrecipUnit, PriceUnit, RawDiagnosis, RawMarket, RawSeverity, RawWeather, TemperatureUnit,
};
use krishi_core::{
    AdapterFailure, AdapterResponse, AdapterResult, AdapterSet, AdvisoryEngine, Crop,
    DiseaseClassifier, EngineSettings, FactValue, FetchContext, ImageHandle, MarketSource,
    Priority, RationaleTag, RawPayload, Region, ResolutionReason, SourceId, Topic, WeatherSource,
};
use krishi_core::{AdapterFailureKind, AdvisorySynthesizer, ConflictResolver};
use rust_decimal::Decimal;

fn july_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 7, 10, 4, 30, 0).single().expect("valid timestamp")
}

struct StaticWeather {
    id: &'static str,
    precip_mm: f64,
    observed_at: DateTime<Utc>,
    calls: AtomicUsize,
}

impl StaticWeather {
    fn new(id: &'static str, precip_mm: f64) -> Self {
        Self { id, precip_mm, observed_at: july_morning(), calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl WeatherSource for StaticWeather {
    fn source_id(&self) -> SourceId {
        SourceId::new(self.id)
    }

    async fn fetch(&self, _region: &Region, _ctx: &FetchContext) -> AdapterResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AdapterResponse {
            source_id: self.source_id(),
            confidence: 0.9,
            observed_at: Some(self.observed_at),
            payload: RawPayload::Weather(RawWeather {
                temperature: Some(29.0),
                temperature_unit: TemperatureUnit::Celsius,
                precipitation: Some(self.precip_mm),
                precipitation_unit: PrecipUnit::Millimetre,
                condition: Some("Heavy rain".to_string()),
                humidity_pct: Some(88.0),
            }),
        })
    }
}

/// Never answers on its own; only cancellation ends it.
struct StalledWeather;

#[async_trait]
impl WeatherSource for StalledWeather {
    fn source_id(&self) -> SourceId {
        SourceId::new("stalled-weather")
    }

    async fn fetch(&self, _region: &Region, ctx: &FetchContext) -> AdapterResult {
        tokio::select! {
            _ = ctx.cancel.cancelled() => {}
            _ = tokio::time::sleep(Duration::from_secs(600)) => {}
        }
        Err(AdapterFailure::unavailable(self.source_id(), "gave up"))
    }
}

struct StaticMarket {
    id: &'static str,
    price: i64,
    confidence: f64,
    calls: AtomicUsize,
}

impl StaticMarket {
    fn new(id: &'static str, price: i64, confidence: f64) -> Self {
        Self { id, price, confidence, calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl MarketSource for StaticMarket {
    fn source_id(&self) -> SourceId {
        SourceId::new(self.id)
    }

    async fn fetch(
        &self,
        _crop: Crop,
        _region: Option<&Region>,
        _ctx: &FetchContext,
    ) -> AdapterResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AdapterResponse {
            source_id: self.source_id(),
            confidence: self.confidence,
            observed_at: Some(july_morning()),
            payload: RawPayload::Market(RawMarket {
                price: Some(Decimal::from(self.price)),
                currency: Some("INR".to_string()),
                unit: PriceUnit::Quintal,
                trend: None,
                markets: Vec::new(),
            }),
        })
    }
}

struct StaticClassifier {
    disease: &'static str,
    severity: f64,
    calls: AtomicUsize,
}

impl StaticClassifier {
    fn new(disease: &'static str, severity: f64) -> Self {
        Self { disease, severity, calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl DiseaseClassifier for StaticClassifier {
    fn source_id(&self) -> SourceId {
        SourceId::new("leaf-classifier")
    }

    async fn classify(
        &self,
        _image: &ImageHandle,
        _crop: Option<Crop>,
        _ctx: &FetchContext,
    ) -> AdapterResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AdapterResponse {
            source_id: self.source_id(),
            confidence: 0.85,
            observed_at: Some(july_morning()),
            payload: RawPayload::Disease(RawDiagnosis {
                disease_name: Some(self.disease.to_string()),
                severity: Some(RawSeverity::Score(self.severity)),
            }),
        })
    }
}

fn engine() -> AdvisoryEngine {
    AdvisoryEngine::new(
        EngineSettings {
            total_budget: Duration::from_millis(2_000),
            adapter_timeout: Duration::from_millis(1_000),
            retry_budget: 0,
        },
        ConflictResolver::default(),
        AdvisorySynthesizer::default(),
    )
}

#[tokio::test]
async fn heavy_rain_in_bihar_yields_one_critical_weather_item() {
    let weather = Arc::new(StaticWeather::new("imd", 80.0));
    let adapters = AdapterSet::new().with_weather(weather.clone());

    let advisory = engine()
        .advise("Bihar mein dhan ke liye mausam kaisa rahega", None, july_morning(), &adapters)
        .await;

    assert_eq!(advisory.crop(), Some(Crop::Rice));
    assert_eq!(advisory.region(), Some(&Region::state("Bihar")));
    assert_eq!(advisory.items().len(), 1);

    let item = &advisory.items()[0];
    assert_eq!(item.topic, Topic::Weather);
    assert_eq!(item.priority, Priority::Critical);
    assert!(item.rationale[0].tags.contains(&RationaleTag::HeavyRain));
    assert!(advisory.fact(&item.rationale[0].fact).is_some());
    assert_eq!(weather.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn agreeing_wheat_prices_in_punjab_are_merged() {
    let adapters = AdapterSet::new()
        .with_market(Arc::new(StaticMarket::new("agmarknet", 2100, 0.8)))
        .with_market(Arc::new(StaticMarket::new("enam", 2150, 0.8)));

    let advisory =
        engine().advise("Punjab mein gehun ka bhav kya hai", None, july_morning(), &adapters).await;

    let fact = advisory.facts().first().expect("resolved market fact");
    assert_eq!(fact.topic, Topic::Market);
    assert_eq!(fact.contributing_source_ids.len(), 2);
    assert!(fact.alternatives.is_empty());
    match &fact.value {
        FactValue::Market(price) => assert_eq!(price.price_per_quintal, Decimal::from(2125)),
        other => panic!("expected market value, got {other:?}"),
    }

    let item = advisory.item(Topic::Market).expect("market item");
    assert_eq!(item.headline, "Wheat price in Punjab: ₹2125/quintal");
    assert!(item.rationale[0].tags.contains(&RationaleTag::Merged { sources: 2 }));
}

#[tokio::test(start_paused = true)]
async fn stalled_weather_source_reports_unavailable_within_budget() {
    let adapters = AdapterSet::new().with_weather(Arc::new(StalledWeather));
    let engine = engine();
    let started = tokio::time::Instant::now();

    let advisory = engine.advise("Will it rain in Patna?", None, july_morning(), &adapters).await;

    assert!(started.elapsed() <= engine.settings().total_budget);
    assert_eq!(advisory.items().len(), 1);
    let item = &advisory.items()[0];
    assert_eq!(item.topic, Topic::Weather);
    assert_eq!(item.priority, Priority::Informational);
    assert_eq!(
        item.unavailable,
        Some(ResolutionReason::SourcesFailed { failures: vec![AdapterFailureKind::Timeout] })
    );
    assert!(item.headline.contains("did not respond in time"));
}

#[tokio::test]
async fn image_only_query_uses_the_classifier_alone() {
    let weather = Arc::new(StaticWeather::new("imd", 0.0));
    let market = Arc::new(StaticMarket::new("agmarknet", 2100, 0.8));
    let classifier = Arc::new(StaticClassifier::new("blast", 0.5));
    let adapters = AdapterSet::new()
        .with_weather(weather.clone())
        .with_market(market.clone())
        .with_disease(classifier.clone());

    let advisory = engine()
        .advise("", Some(ImageHandle("upload://leaf-1.jpg".to_string())), july_morning(), &adapters)
        .await;

    assert_eq!(advisory.crop(), None);
    assert_eq!(advisory.region(), None);
    assert_eq!(advisory.items().len(), 1);
    let item = &advisory.items()[0];
    assert_eq!(item.topic, Topic::Disease);
    assert_eq!(item.priority, Priority::Recommended);
    assert!(item.details.iter().any(|line| line.contains("Tricyclazole")));

    assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    assert_eq!(weather.calls.load(Ordering::SeqCst), 0);
    assert_eq!(market.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn severe_disease_outranks_critical_weather() {
    let adapters = AdapterSet::new()
        .with_weather(Arc::new(StaticWeather::new("imd", 80.0)))
        .with_disease(Arc::new(StaticClassifier::new("blast", 0.9)));

    let advisory = engine()
        .advise(
            "My rice leaves have brown spots. Will it rain in Bihar?",
            Some(ImageHandle("upload://leaf-2.jpg".to_string())),
            july_morning(),
            &adapters,
        )
        .await;

    let order: Vec<(Topic, Priority)> =
        advisory.items().iter().map(|item| (item.topic, item.priority)).collect();
    assert_eq!(
        order,
        vec![(Topic::Disease, Priority::Critical), (Topic::Weather, Priority::Critical)]
    );
    assert!(advisory.items()[0].rationale[0].tags.contains(&RationaleTag::SeverityAboveThreshold));
}

#[tokio::test]
async fn heavy_rain_postpones_sowing_advice() {
    let adapters = AdapterSet::new().with_weather(Arc::new(StaticWeather::new("imd", 80.0)));

    let advisory = engine()
        .advise("When should I sow rice in Bihar? Will it rain?", None, july_morning(), &adapters)
        .await;

    let calendar = advisory.item(Topic::Calendar).expect("calendar item");
    assert_eq!(calendar.headline, "Delay Rice sowing: 80 mm rain expected");
    assert!(calendar
        .rationale
        .iter()
        .any(|rationale| rationale.tags.contains(&RationaleTag::WeatherVeto)));
    assert_eq!(advisory.items()[0].topic, Topic::Weather);
}

#[tokio::test]
async fn stale_weather_is_not_used() {
    let mut stale = StaticWeather::new("imd", 10.0);
    stale.observed_at = july_morning() - chrono::Duration::hours(12);
    let adapters = AdapterSet::new().with_weather(Arc::new(stale));

    let advisory = engine().advise("Bihar weather today", None, july_morning(), &adapters).await;

    let item = advisory.item(Topic::Weather).expect("weather item");
    assert_eq!(item.unavailable, Some(ResolutionReason::AllStale { discarded: 1 }));
    assert!(advisory.facts().is_empty());
}
