use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::fact::{FactRef, ResolutionReason, ResolvedFact, SourceId};
use super::query::{Crop, Language, LanguageConfidence, Region, Topic};

/// Declaration order is the primary sort key of an advisory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    Recommended,
    Informational,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Recommended => "recommended",
            Self::Informational => "informational",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "tag")]
pub enum RationaleTag {
    /// The fact came from a single source.
    SingleSource,
    /// Several agreeing sources were averaged.
    Merged { sources: usize },
    /// Sources disagreed; the listed ones lost and are kept as footnotes.
    ConflictResolved { discarded: Vec<SourceId> },
    SeverityAboveThreshold,
    HeavyRain,
    ExtremeHeat,
    /// Weather postponed a calendar recommendation.
    WeatherVeto,
    ProfitabilityEstimated,
    RegionUnsuited,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rationale {
    pub fact: FactRef,
    pub tags: Vec<RationaleTag>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitabilityEstimate {
    pub acreage: Decimal,
    pub expected_yield_quintals: Decimal,
    pub price_per_quintal: Decimal,
    pub gross_income: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryItem {
    pub topic: Topic,
    pub priority: Priority,
    pub headline: String,
    pub details: Vec<String>,
    pub rationale: Vec<Rationale>,
    pub profitability: Option<ProfitabilityEstimate>,
    /// Set when the item only reports that data was unavailable.
    pub unavailable: Option<ResolutionReason>,
    pub language: Language,
}

impl AdvisoryItem {
    pub fn is_unavailable(&self) -> bool {
        self.unavailable.is_some()
    }
}

/// Final ranked advice for one query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Advisory {
    items: Vec<AdvisoryItem>,
    facts: Vec<ResolvedFact>,
    language: Language,
    language_confidence: LanguageConfidence,
    crop: Option<Crop>,
    region: Option<Region>,
    generated_at: DateTime<Utc>,
}

impl Advisory {
    /// Orders `items` by priority, then topic.
    pub fn new(
        mut items: Vec<AdvisoryItem>,
        facts: Vec<ResolvedFact>,
        language: Language,
        language_confidence: LanguageConfidence,
        crop: Option<Crop>,
        region: Option<Region>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        items.sort_by_key(|item| (item.priority, item.topic));
        Self { items, facts, language, language_confidence, crop, region, generated_at }
    }

    pub fn items(&self) -> &[AdvisoryItem] {
        &self.items
    }

    pub fn facts(&self) -> &[ResolvedFact] {
        &self.facts
    }

    pub fn fact(&self, reference: &FactRef) -> Option<&ResolvedFact> {
        self.facts.iter().find(|fact| fact.topic == reference.topic && fact.key == reference.key)
    }

    pub fn item(&self, topic: Topic) -> Option<&AdvisoryItem> {
        self.items.iter().find(|item| item.topic == topic)
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn language_confidence(&self) -> LanguageConfidence {
        self.language_confidence
    }

    /// The caller may want to ask the farmer to confirm their language.
    pub fn needs_clarification(&self) -> bool {
        self.language_confidence == LanguageConfidence::Low
    }

    pub fn crop(&self) -> Option<Crop> {
        self.crop
    }

    pub fn region(&self) -> Option<&Region> {
        self.region.as_ref()
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn has_critical(&self) -> bool {
        self.items.iter().any(|item| item.priority == Priority::Critical)
    }
}
