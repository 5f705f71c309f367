//! Deterministic reconciliation of facts that share a `(topic, key)`.
//!
//! Resolution steps, in order:
//! 1. stale facts are discarded against the topic's freshness window;
//! 2. a winner is chosen by confidence, then recency, then smallest source id,
//!    then smallest value;
//! 3. facts within tolerance of the winner are merged by confidence-weighted
//!    average, the rest are kept as alternatives.
//!
//! Facts are sorted into a canonical order (source id, observation time,
//! confidence, value) before any arithmetic so the same input set always
//! produces bit-identical output, even when two facts differ only in value.

use std::cmp::{Ordering, Reverse};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::config::ResolverConfig;
use crate::domain::fact::{
    AdapterFailure, Alternative, DiseaseFinding, FactKey, FactValue, MarketPrice, Resolution,
    ResolutionFailure, ResolutionReason, ResolvedFact, SourceFact, WeatherReading,
};
use crate::domain::query::Topic;

#[derive(Clone, Debug, PartialEq)]
pub struct ResolverPolicy {
    pub weather_max_age: Duration,
    pub market_max_age: Duration,
    pub temperature_tolerance_c: f64,
    pub precip_tolerance_mm: f64,
    pub price_tolerance_pct: f64,
}

impl Default for ResolverPolicy {
    fn default() -> Self {
        Self {
            weather_max_age: Duration::hours(6),
            market_max_age: Duration::hours(24),
            temperature_tolerance_c: 1.0,
            precip_tolerance_mm: 5.0,
            price_tolerance_pct: 5.0,
        }
    }
}

impl From<&ResolverConfig> for ResolverPolicy {
    fn from(config: &ResolverConfig) -> Self {
        Self {
            weather_max_age: Duration::hours(i64::from(config.weather_max_age_hours)),
            market_max_age: Duration::hours(i64::from(config.market_max_age_hours)),
            temperature_tolerance_c: config.temperature_tolerance_c,
            precip_tolerance_mm: config.precip_tolerance_mm,
            price_tolerance_pct: config.price_tolerance_pct,
        }
    }
}

impl ResolverPolicy {
    /// Disease findings do not go stale.
    pub fn max_age(&self, topic: Topic) -> Option<Duration> {
        match topic {
            Topic::Weather => Some(self.weather_max_age),
            Topic::Market => Some(self.market_max_age),
            Topic::Disease | Topic::Calendar => None,
        }
    }
}

/// Everything gathered for one `(topic, key)` before resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct FactGroup {
    pub topic: Topic,
    pub key: FactKey,
    pub facts: Vec<SourceFact>,
    pub failures: Vec<AdapterFailure>,
    /// Responses that arrived but failed normalization.
    pub rejected: usize,
}

impl FactGroup {
    pub fn new(topic: Topic, key: FactKey) -> Self {
        Self { topic, key, facts: Vec::new(), failures: Vec::new(), rejected: 0 }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConflictResolver {
    policy: ResolverPolicy,
}

impl ConflictResolver {
    pub fn new(policy: ResolverPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ResolverPolicy {
        &self.policy
    }

    pub fn resolve(&self, group: FactGroup, now: DateTime<Utc>) -> Resolution {
        let FactGroup { topic, key, mut facts, failures, rejected } = group;
        facts.sort_by(canonical_order);

        let max_age = self.policy.max_age(topic);
        let (fresh, stale): (Vec<SourceFact>, Vec<SourceFact>) = facts
            .into_iter()
            .partition(|fact| max_age.map_or(true, |limit| fact.staleness(now) <= limit));

        if fresh.is_empty() {
            let reason = if !stale.is_empty() {
                ResolutionReason::AllStale { discarded: stale.len() }
            } else if rejected > 0 {
                ResolutionReason::NoUsableFacts { rejected }
            } else if !failures.is_empty() {
                let mut kinds: Vec<_> = failures.iter().map(|failure| failure.kind).collect();
                kinds.sort();
                ResolutionReason::SourcesFailed { failures: kinds }
            } else {
                ResolutionReason::NoSources
            };
            return Err(ResolutionFailure { topic, key, reason });
        }

        let winner_index = fresh
            .iter()
            .enumerate()
            .max_by(|(_, left), (_, right)| preference(left, right))
            .map(|(index, _)| index)
            .unwrap_or(0);

        let mut agreeing = Vec::new();
        let mut alternatives = Vec::new();
        let winner = fresh[winner_index].clone();
        for (index, fact) in fresh.into_iter().enumerate() {
            if index == winner_index {
                continue;
            }
            if self.agrees(&winner.value, &fact.value) {
                agreeing.push(fact);
            } else {
                alternatives.push(Alternative {
                    source_id: fact.source_id,
                    value: fact.value,
                    confidence: fact.confidence,
                    observed_at: fact.observed_at,
                });
            }
        }

        if agreeing.is_empty() {
            return Ok(ResolvedFact {
                topic,
                key,
                value: winner.value,
                confidence: winner.confidence,
                contributing_source_ids: vec![winner.source_id],
                alternatives,
            });
        }

        // The winner joins the merge in canonical position.
        agreeing.push(winner.clone());
        agreeing.sort_by(canonical_order);

        let confidence =
            agreeing.iter().map(|fact| fact.confidence).fold(winner.confidence, f64::max);
        let mut contributing_source_ids: Vec<_> =
            agreeing.iter().map(|fact| fact.source_id.clone()).collect();
        contributing_source_ids.dedup();

        Ok(ResolvedFact {
            topic,
            key,
            value: merge(&winner.value, &agreeing),
            confidence,
            contributing_source_ids,
            alternatives,
        })
    }

    fn agrees(&self, left: &FactValue, right: &FactValue) -> bool {
        match (left, right) {
            (FactValue::Weather(left), FactValue::Weather(right)) => {
                (left.temperature_c - right.temperature_c).abs()
                    <= self.policy.temperature_tolerance_c
                    && (left.precip_mm - right.precip_mm).abs() <= self.policy.precip_tolerance_mm
            }
            (FactValue::Market(left), FactValue::Market(right)) => {
                let Some(tolerance_pct) = Decimal::from_f64(self.policy.price_tolerance_pct) else {
                    return false;
                };
                let lower = left.price_per_quintal.min(right.price_per_quintal);
                let difference = left
                    .price_per_quintal
                    .checked_sub(right.price_per_quintal)
                    .map(|difference| difference.abs());
                match (
                    difference.and_then(|difference| difference.checked_mul(Decimal::ONE_HUNDRED)),
                    tolerance_pct.checked_mul(lower),
                ) {
                    (Some(scaled), Some(allowed)) => scaled <= allowed,
                    _ => false,
                }
            }
            (FactValue::Disease(left), FactValue::Disease(right)) => {
                left.disease_name.eq_ignore_ascii_case(&right.disease_name)
            }
            _ => false,
        }
    }
}

/// Canonical order: source id, then observation time, then confidence, then value.
fn canonical_order(left: &SourceFact, right: &SourceFact) -> Ordering {
    left.source_id
        .cmp(&right.source_id)
        .then(left.observed_at.cmp(&right.observed_at))
        .then(left.confidence.total_cmp(&right.confidence))
        .then_with(|| value_order(&left.value, &right.value))
}

/// Greater means preferred: higher confidence, then more recent, then smaller source id,
/// then smaller value.
fn preference(left: &SourceFact, right: &SourceFact) -> Ordering {
    left.confidence
        .total_cmp(&right.confidence)
        .then(left.observed_at.cmp(&right.observed_at))
        .then(Reverse(&left.source_id).cmp(&Reverse(&right.source_id)))
        .then_with(|| value_order(&right.value, &left.value))
}

/// Total order over values so facts tied on every other field still sort one way.
fn value_order(left: &FactValue, right: &FactValue) -> Ordering {
    match (left, right) {
        (FactValue::Weather(left), FactValue::Weather(right)) => left
            .temperature_c
            .total_cmp(&right.temperature_c)
            .then(left.precip_mm.total_cmp(&right.precip_mm))
            .then_with(|| match (left.humidity_pct, right.humidity_pct) {
                (Some(left), Some(right)) => left.total_cmp(&right),
                (left, right) => left.is_some().cmp(&right.is_some()),
            })
            .then_with(|| left.condition.cmp(&right.condition)),
        (FactValue::Market(left), FactValue::Market(right)) => left
            .price_per_quintal
            .cmp(&right.price_per_quintal)
            .then_with(|| left.currency.cmp(&right.currency))
            .then(left.trend.cmp(&right.trend))
            .then_with(|| left.markets.cmp(&right.markets)),
        (FactValue::Disease(left), FactValue::Disease(right)) => left
            .severity
            .total_cmp(&right.severity)
            .then_with(|| left.disease_name.cmp(&right.disease_name)),
        _ => variant_rank(left).cmp(&variant_rank(right)),
    }
}

fn variant_rank(value: &FactValue) -> u8 {
    match value {
        FactValue::Weather(_) => 0,
        FactValue::Market(_) => 1,
        FactValue::Disease(_) => 2,
    }
}

/// Confidence-weighted weights, or equal weights when every confidence is zero.
fn weights(facts: &[SourceFact]) -> Vec<f64> {
    let total: f64 = facts.iter().map(|fact| fact.confidence).sum();
    if total > 0.0 {
        facts.iter().map(|fact| fact.confidence / total).collect()
    } else {
        vec![1.0 / facts.len() as f64; facts.len()]
    }
}

fn weighted_mean(values: impl Iterator<Item = (f64, f64)>) -> Option<f64> {
    let (sum, total) = values.fold((0.0, 0.0), |(sum, total), (value, weight)| {
        (sum + value * weight, total + weight)
    });
    (total > 0.0).then(|| sum / total)
}

fn merge(winner: &FactValue, facts: &[SourceFact]) -> FactValue {
    let weights = weights(facts);
    match winner {
        FactValue::Weather(reading) => {
            let readings: Vec<(&WeatherReading, f64)> = facts
                .iter()
                .zip(&weights)
                .filter_map(|(fact, weight)| match &fact.value {
                    FactValue::Weather(reading) => Some((reading, *weight)),
                    _ => None,
                })
                .collect();
            let temperature_c = weighted_mean(
                readings.iter().map(|(reading, weight)| (reading.temperature_c, *weight)),
            )
            .unwrap_or(reading.temperature_c);
            let precip_mm =
                weighted_mean(readings.iter().map(|(reading, weight)| (reading.precip_mm, *weight)))
                    .unwrap_or(reading.precip_mm);
            let humidity_pct = weighted_mean(readings.iter().filter_map(|(reading, weight)| {
                reading.humidity_pct.map(|humidity| (humidity, *weight))
            }))
            .or(reading.humidity_pct);

            FactValue::Weather(WeatherReading {
                temperature_c,
                precip_mm,
                condition: reading.condition.clone(),
                humidity_pct,
            })
        }
        FactValue::Market(price) => {
            let quotes: Vec<(&MarketPrice, Decimal)> = facts
                .iter()
                .filter_map(|fact| match &fact.value {
                    FactValue::Market(other) => Some((
                        other,
                        Decimal::from_f64(fact.confidence).unwrap_or(Decimal::ZERO),
                    )),
                    _ => None,
                })
                .collect();
            let merged = weighted_price(&quotes)
                .or_else(|| plain_price(&quotes))
                .unwrap_or(price.price_per_quintal);

            let mut markets: Vec<String> =
                quotes.iter().flat_map(|(quote, _)| quote.markets.iter().cloned()).collect();
            markets.sort();
            markets.dedup();

            FactValue::Market(MarketPrice {
                price_per_quintal: merged.round_dp(2),
                currency: price.currency.clone(),
                trend: price.trend,
                markets,
            })
        }
        FactValue::Disease(finding) => {
            let severity = weighted_mean(facts.iter().zip(&weights).filter_map(
                |(fact, weight)| match &fact.value {
                    FactValue::Disease(other) => Some((other.severity, *weight)),
                    _ => None,
                },
            ))
            .unwrap_or(finding.severity);

            FactValue::Disease(DiseaseFinding {
                disease_name: finding.disease_name.clone(),
                severity: severity.clamp(0.0, 1.0),
            })
        }
    }
}

/// Confidence-weighted mean price; `None` when every weight is zero or the sum overflows.
fn weighted_price(quotes: &[(&MarketPrice, Decimal)]) -> Option<Decimal> {
    let mut sum = Decimal::ZERO;
    let mut total = Decimal::ZERO;
    for (quote, weight) in quotes {
        sum = sum.checked_add(quote.price_per_quintal.checked_mul(*weight)?)?;
        total = total.checked_add(*weight)?;
    }
    if total > Decimal::ZERO {
        sum.checked_div(total)
    } else {
        None
    }
}

fn plain_price(quotes: &[(&MarketPrice, Decimal)]) -> Option<Decimal> {
    let mut sum = Decimal::ZERO;
    for (quote, _) in quotes {
        sum = sum.checked_add(quote.price_per_quintal)?;
    }
    sum.checked_div(Decimal::from(quotes.len()))
}
