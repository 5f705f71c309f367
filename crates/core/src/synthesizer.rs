use chrono::{DateTime, Datelike, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::calendar::{india_time, CalendarTable, CalendarWindow};
use crate::config::AdvisoryConfig;
use crate::domain::advisory::{
    Advisory, AdvisoryItem, Priority, ProfitabilityEstimate, Rationale, RationaleTag,
};
use crate::domain::fact::{
    DiseaseFinding, FactKey, FactRef, FactValue, MarketPrice, PriceTrend, Resolution,
    ResolutionReason, ResolvedFact, WeatherReading,
};
use crate::domain::query::{Crop, Language, Query, Topic};
use crate::treatments;

const NO_IRRIGATION_RAIN_MM: f64 = 5.0;

#[derive(Clone, Debug, PartialEq)]
pub struct SynthesisPolicy {
    pub disease_critical_severity: f64,
    pub heavy_rain_mm: f64,
    pub extreme_heat_c: f64,
}

impl Default for SynthesisPolicy {
    fn default() -> Self {
        Self { disease_critical_severity: 0.7, heavy_rain_mm: 50.0, extreme_heat_c: 40.0 }
    }
}

impl From<&AdvisoryConfig> for SynthesisPolicy {
    fn from(config: &AdvisoryConfig) -> Self {
        Self {
            disease_critical_severity: config.disease_critical_severity,
            heavy_rain_mm: config.heavy_rain_mm,
            extreme_heat_c: config.extreme_heat_c,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AdvisorySynthesizer {
    policy: SynthesisPolicy,
    calendar: CalendarTable,
}

impl Default for AdvisorySynthesizer {
    fn default() -> Self {
        Self::new(SynthesisPolicy::default(), CalendarTable::builtin())
    }
}

impl AdvisorySynthesizer {
    pub fn new(policy: SynthesisPolicy, calendar: CalendarTable) -> Self {
        Self { policy, calendar }
    }

    pub fn calendar(&self) -> &CalendarTable {
        &self.calendar
    }

    /// Builds exactly one item per requested topic.
    pub fn synthesize(
        &self,
        query: &Query,
        resolutions: Vec<Resolution>,
        now: DateTime<Utc>,
    ) -> Advisory {
        let mut facts: Vec<ResolvedFact> = Vec::new();
        let mut failures = Vec::new();
        for resolution in resolutions {
            match resolution {
                Ok(fact) => {
                    if !facts.iter().any(|known| known.reference() == fact.reference()) {
                        facts.push(fact);
                    }
                }
                Err(failure) => failures.push(failure),
            }
        }

        let weather_fact = facts.iter().find(|fact| fact.topic == Topic::Weather);
        let mut items = Vec::with_capacity(query.requested_topics.len());

        for topic in query.requested_topics.iter() {
            let item = if topic == Topic::Calendar {
                self.calendar_item(query, weather_fact, now)
            } else if let Some(fact) = facts.iter().find(|fact| fact.topic == topic) {
                self.fact_item(query, fact)
            } else {
                let reason = failures
                    .iter()
                    .find(|failure| failure.topic == topic)
                    .map(|failure| failure.reason.clone())
                    .unwrap_or(ResolutionReason::NoSources);
                unavailable_item(query, topic, reason)
            };
            items.push(item);
        }

        Advisory::new(
            items,
            facts,
            query.detected_language,
            query.language_confidence,
            query.crop,
            query.region.clone(),
            now,
        )
    }

    fn fact_item(&self, query: &Query, fact: &ResolvedFact) -> AdvisoryItem {
        match &fact.value {
            FactValue::Weather(reading) => self.weather_item(query, fact, reading),
            FactValue::Market(price) => self.market_item(query, fact, price),
            FactValue::Disease(finding) => self.disease_item(query, fact, finding),
        }
    }

    fn disease_item(
        &self,
        query: &Query,
        fact: &ResolvedFact,
        finding: &DiseaseFinding,
    ) -> AdvisoryItem {
        let mut tags = source_tags(fact);
        let priority = if finding.severity >= self.policy.disease_critical_severity {
            tags.push(RationaleTag::SeverityAboveThreshold);
            Priority::Critical
        } else {
            Priority::Recommended
        };

        let display_name = finding.disease_name.replace('_', " ");
        let subject = match query.crop {
            Some(crop) => format!("{} on your {}", display_name, crop.as_str()),
            None => display_name,
        };
        let headline = format!("{subject} detected (severity {:.0}%)", finding.severity * 100.0);

        let mut details = Vec::new();
        match treatments::lookup(&finding.disease_name) {
            Some(treatment) => {
                if query.detected_language == Language::Hindi {
                    details.push(format!("रोग: {}", treatment.hindi_name));
                }
                details.push(format!("Treatment: {}", treatment.chemical));
                details.push(format!("Organic option: {}", treatment.organic));
                details.push(format!("Prevention: {}", treatment.prevention));
            }
            None => details.push(
                "Show a sample to your nearest Krishi Vigyan Kendra for a treatment plan."
                    .to_string(),
            ),
        }
        details.extend(alternative_notes(fact));

        AdvisoryItem {
            topic: Topic::Disease,
            priority,
            headline,
            details,
            rationale: vec![Rationale { fact: fact.reference(), tags }],
            profitability: None,
            unavailable: None,
            language: query.detected_language,
        }
    }

    fn weather_item(
        &self,
        query: &Query,
        fact: &ResolvedFact,
        reading: &WeatherReading,
    ) -> AdvisoryItem {
        let mut tags = source_tags(fact);
        let place = fact.key.describe();

        let heavy_rain = reading.precip_mm >= self.policy.heavy_rain_mm;
        let extreme_heat = reading.temperature_c >= self.policy.extreme_heat_c;
        if heavy_rain {
            tags.push(RationaleTag::HeavyRain);
        }
        if extreme_heat {
            tags.push(RationaleTag::ExtremeHeat);
        }

        let (priority, headline) = if heavy_rain {
            (
                Priority::Critical,
                format!("Heavy rain expected in {place} ({:.0} mm)", reading.precip_mm),
            )
        } else if extreme_heat {
            (
                Priority::Critical,
                format!("Extreme heat in {place} ({:.0}°C)", reading.temperature_c),
            )
        } else {
            (
                Priority::Recommended,
                format!(
                    "{} in {place}, {:.0}°C",
                    reading.condition, reading.temperature_c
                ),
            )
        };

        let mut details = vec![
            format!(
                "Temperature {:.1}°C, rainfall {:.1} mm, {}",
                reading.temperature_c, reading.precip_mm, reading.condition
            ),
            irrigation_advice(reading).to_string(),
        ];
        if let Some(humidity) = reading.humidity_pct {
            details.insert(1, format!("Humidity {humidity:.0}%"));
        }
        if heavy_rain {
            details.push(
                "Clear field drainage channels and hold off fertilizer and spraying.".to_string(),
            );
        }
        details.extend(alternative_notes(fact));

        AdvisoryItem {
            topic: Topic::Weather,
            priority,
            headline,
            details,
            rationale: vec![Rationale { fact: fact.reference(), tags }],
            profitability: None,
            unavailable: None,
            language: query.detected_language,
        }
    }

    fn market_item(
        &self,
        query: &Query,
        fact: &ResolvedFact,
        price: &MarketPrice,
    ) -> AdvisoryItem {
        let mut tags = source_tags(fact);
        let crop = fact.key.crop.or(query.crop);
        let crop_name = crop.map(|crop| crop.display_name()).unwrap_or("Crop");
        let place = fact
            .key
            .region
            .as_ref()
            .map(|region| format!(" in {}", region.display_name()))
            .unwrap_or_default();
        let headline = format!(
            "{crop_name} price{place}: ₹{}/quintal",
            rupees(price.price_per_quintal)
        );

        let profitability = crop.zip(query.acreage).and_then(|(crop, acreage)| {
            self.profitability(crop, acreage, price.price_per_quintal)
        });

        let mut details = Vec::new();
        let priority = match &profitability {
            Some(estimate) => {
                tags.push(RationaleTag::ProfitabilityEstimated);
                details.push(format!(
                    "Expected yield {} quintals from {} acres",
                    estimate.expected_yield_quintals.normalize(),
                    estimate.acreage.normalize()
                ));
                details.push(format!(
                    "Estimated gross income ₹{} at today's price",
                    rupees(estimate.gross_income)
                ));
                Priority::Recommended
            }
            None => Priority::Informational,
        };
        if let Some(trend) = price.trend {
            details.push(format!("Price trend: {}", trend_advice(trend)));
        }
        if !price.markets.is_empty() {
            details.push(format!("Reference mandis: {}", price.markets.join(", ")));
        }
        details.extend(alternative_notes(fact));

        AdvisoryItem {
            topic: Topic::Market,
            priority,
            headline,
            details,
            rationale: vec![Rationale { fact: fact.reference(), tags }],
            profitability,
            unavailable: None,
            language: query.detected_language,
        }
    }

    fn profitability(
        &self,
        crop: Crop,
        acreage: f64,
        price_per_quintal: Decimal,
    ) -> Option<ProfitabilityEstimate> {
        let profile = self.calendar.profile(crop)?;
        let acreage = Decimal::from_f64(acreage)?.round_dp(2);
        // Out-of-range products drop the estimate and leave the price on its own.
        let expected_yield_quintals =
            profile.average_yield_quintals_per_acre.checked_mul(acreage)?.round_dp(2);
        let gross_income = expected_yield_quintals.checked_mul(price_per_quintal)?.round_dp(2);

        Some(ProfitabilityEstimate {
            acreage,
            expected_yield_quintals,
            price_per_quintal,
            gross_income,
        })
    }

    fn calendar_item(
        &self,
        query: &Query,
        weather_fact: Option<&ResolvedFact>,
        now: DateTime<Utc>,
    ) -> AdvisoryItem {
        let Some(crop) = query.crop else {
            return unavailable_item(
                query,
                Topic::Calendar,
                ResolutionReason::MissingKey { field: "crop".to_string() },
            );
        };
        let month = calendar_month(now);
        let Some(window) = self.calendar.window(crop, query.region.as_ref(), month) else {
            return unavailable_item(query, Topic::Calendar, ResolutionReason::NoSources);
        };

        let calendar_ref = FactRef {
            topic: Topic::Calendar,
            key: FactKey::crop(crop, query.region.clone()),
        };
        let mut calendar_tags = Vec::new();
        let mut rationale = Vec::new();

        let heavy_rain = weather_fact.and_then(|fact| match &fact.value {
            FactValue::Weather(reading) if reading.precip_mm >= self.policy.heavy_rain_mm => {
                Some((fact, reading.precip_mm))
            }
            _ => None,
        });
        let vetoed = heavy_rain.filter(|_| window.plant_now || window.harvest_now);

        let name = crop.display_name();
        let (priority, headline) = match vetoed {
            Some((fact, precip_mm)) => {
                rationale.push(Rationale {
                    fact: fact.reference(),
                    tags: vec![RationaleTag::WeatherVeto],
                });
                let action =
                    if window.harvest_now && !window.plant_now { "harvest" } else { "sowing" };
                (
                    Priority::Recommended,
                    format!("Delay {name} {action}: {precip_mm:.0} mm rain expected"),
                )
            }
            None if window.plant_now => {
                (Priority::Recommended, format!("Good time to sow {}", name.to_lowercase()))
            }
            None if window.harvest_now => {
                (Priority::Recommended, format!("{name} is due for harvest this month"))
            }
            None => (
                Priority::Informational,
                match window.next_planting_month {
                    Some(next) => {
                        format!("Next {} sowing window: {}", name.to_lowercase(), month_name(next))
                    }
                    None => format!("No sowing window for {} this year", name.to_lowercase()),
                },
            ),
        };

        let hindi_name = self.calendar.profile(crop).map(|profile| profile.hindi_name.as_str());
        let mut details = calendar_details(&window, hindi_name);
        if window.region_suitable == Some(false) {
            calendar_tags.push(RationaleTag::RegionUnsuited);
            if let Some(region) = &query.region {
                details.push(format!(
                    "{name} is not commonly grown in {}; check with local extension officers.",
                    region.state
                ));
            }
        }
        rationale.insert(0, Rationale { fact: calendar_ref, tags: calendar_tags });

        AdvisoryItem {
            topic: Topic::Calendar,
            priority,
            headline,
            details,
            rationale,
            profitability: None,
            unavailable: None,
            language: query.detected_language,
        }
    }
}

fn calendar_details(window: &CalendarWindow, hindi_name: Option<&str>) -> Vec<String> {
    let mut details = vec![format!("Current season: {}", window.season.display_name())];
    if let Some(hindi_name) = hindi_name {
        details.push(format!("{} ({hindi_name})", window.crop.display_name()));
    }
    if window.plant_now && window.harvest_now {
        details.push("Both sowing and harvest fall in this month.".to_string());
    }
    if let (false, Some(next)) = (window.plant_now, window.next_planting_month) {
        details.push(format!("Next planting month: {}", month_name(next)));
    }
    details
}

fn unavailable_item(query: &Query, topic: Topic, reason: ResolutionReason) -> AdvisoryItem {
    AdvisoryItem {
        topic,
        priority: Priority::Informational,
        headline: format!("{} information unavailable: {}", topic_title(topic), reason.describe()),
        details: Vec::new(),
        rationale: Vec::new(),
        profitability: None,
        unavailable: Some(reason),
        language: query.detected_language,
    }
}

fn source_tags(fact: &ResolvedFact) -> Vec<RationaleTag> {
    let mut tags = if fact.contributing_source_ids.len() > 1 {
        vec![RationaleTag::Merged { sources: fact.contributing_source_ids.len() }]
    } else {
        vec![RationaleTag::SingleSource]
    };
    if !fact.alternatives.is_empty() {
        tags.push(RationaleTag::ConflictResolved {
            discarded: fact.alternatives.iter().map(|alt| alt.source_id.clone()).collect(),
        });
    }
    tags
}

fn alternative_notes(fact: &ResolvedFact) -> Vec<String> {
    fact.alternatives
        .iter()
        .map(|alternative| {
            format!(
                "Note: {} reported {} (confidence {:.2})",
                alternative.source_id,
                alternative.value.summary(),
                alternative.confidence
            )
        })
        .collect()
}

fn irrigation_advice(reading: &WeatherReading) -> &'static str {
    let humidity = reading.humidity_pct;
    let temperature = reading.temperature_c;
    if reading.precip_mm > NO_IRRIGATION_RAIN_MM {
        "No irrigation needed today because of rain."
    } else if humidity.is_some_and(|humidity| humidity < 40.0) && temperature > 35.0 {
        "Extreme heat: irrigate immediately."
    } else if humidity.is_some_and(|humidity| humidity < 60.0) && temperature > 30.0 {
        "Hot weather: irrigate in the evening."
    } else {
        "Weather is favourable: follow the regular irrigation schedule."
    }
}

fn trend_advice(trend: PriceTrend) -> &'static str {
    match trend {
        PriceTrend::Stable => "stable; sell when convenient",
        PriceTrend::Rising => "rising; holding stock a little longer may pay",
        PriceTrend::Falling => "falling; consider selling soon",
        PriceTrend::Volatile => "volatile; compare several mandis before selling",
    }
}

fn calendar_month(now: DateTime<Utc>) -> u32 {
    india_time(now).month()
}

fn month_name(month: u32) -> &'static str {
    const NAMES: [&str; 12] = [
        "January", "February", "March", "April", "May", "June", "July", "August", "September",
        "October", "November", "December",
    ];
    month.checked_sub(1).and_then(|index| NAMES.get(index as usize)).copied().unwrap_or("unknown")
}

fn topic_title(topic: Topic) -> &'static str {
    match topic {
        Topic::Disease => "Disease",
        Topic::Weather => "Weather",
        Topic::Market => "Market price",
        Topic::Calendar => "Crop calendar",
    }
}

fn rupees(amount: Decimal) -> String {
    amount.round_dp(2).normalize().to_string()
}
