use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Advisory topics a farmer can ask about.
///
/// Declaration order is the secondary sort key of an advisory: among items of
/// equal priority, disease comes first, then weather, market and calendar.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Disease,
    Weather,
    Market,
    Calendar,
}

impl Topic {
    pub const ALL: [Topic; 4] = [Topic::Disease, Topic::Weather, Topic::Market, Topic::Calendar];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disease => "disease",
            Self::Weather => "weather",
            Self::Market => "market",
            Self::Calendar => "calendar",
        }
    }

    /// Calendar advice comes from the rule table and never needs an adapter.
    pub fn needs_adapter(&self) -> bool {
        !matches!(self, Self::Calendar)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of requested topics that is never empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TopicSet(BTreeSet<Topic>);

impl TopicSet {
    /// Returns `None` when `topics` yields nothing.
    pub fn from_topics(topics: impl IntoIterator<Item = Topic>) -> Option<Self> {
        let set: BTreeSet<Topic> = topics.into_iter().collect();
        (!set.is_empty()).then_some(Self(set))
    }

    pub fn single(topic: Topic) -> Self {
        Self(BTreeSet::from([topic]))
    }

    /// Fallback when nothing in the query hints at a topic.
    pub fn default_for_unclear_query() -> Self {
        Self(BTreeSet::from([Topic::Weather, Topic::Calendar]))
    }

    pub fn contains(&self, topic: Topic) -> bool {
        self.0.contains(&topic)
    }

    pub fn iter(&self) -> impl Iterator<Item = Topic> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    // A TopicSet is never empty; kept for clippy's len_without_is_empty.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl<'de> Deserialize<'de> for TopicSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let topics = BTreeSet::<Topic>::deserialize(deserializer)?;
        Self::from_topics(topics)
            .ok_or_else(|| serde::de::Error::custom("requested topics must not be empty"))
    }
}

/// Writing systems the interpreter can tell apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Script {
    Latin,
    Devanagari,
    Bengali,
    Gurmukhi,
    Gujarati,
    Oriya,
    Tamil,
    Telugu,
    Kannada,
    Malayalam,
}

impl Script {
    pub fn of(ch: char) -> Option<Self> {
        match ch as u32 {
            0x0041..=0x005A | 0x0061..=0x007A => Some(Self::Latin),
            0x0900..=0x097F => Some(Self::Devanagari),
            0x0980..=0x09FF => Some(Self::Bengali),
            0x0A00..=0x0A7F => Some(Self::Gurmukhi),
            0x0A80..=0x0AFF => Some(Self::Gujarati),
            0x0B00..=0x0B7F => Some(Self::Oriya),
            0x0B80..=0x0BFF => Some(Self::Tamil),
            0x0C00..=0x0C7F => Some(Self::Telugu),
            0x0C80..=0x0CFF => Some(Self::Kannada),
            0x0D00..=0x0D7F => Some(Self::Malayalam),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "script")]
pub enum Language {
    English,
    Hindi,
    Regional(Script),
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Hindi => "hi",
            Self::Regional(Script::Bengali) => "bn",
            Self::Regional(Script::Gurmukhi) => "pa",
            Self::Regional(Script::Gujarati) => "gu",
            Self::Regional(Script::Oriya) => "or",
            Self::Regional(Script::Tamil) => "ta",
            Self::Regional(Script::Telugu) => "te",
            Self::Regional(Script::Kannada) => "kn",
            Self::Regional(Script::Malayalam) => "ml",
            Self::Regional(Script::Devanagari) => "mr",
            Self::Regional(Script::Latin) => "und",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageConfidence {
    High,
    Low,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Crop {
    Rice,
    Wheat,
    Cotton,
    Sugarcane,
    Tomato,
    Onion,
}

impl Crop {
    pub const ALL: [Crop; 6] =
        [Crop::Rice, Crop::Wheat, Crop::Cotton, Crop::Sugarcane, Crop::Tomato, Crop::Onion];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rice => "rice",
            Self::Wheat => "wheat",
            Self::Cotton => "cotton",
            Self::Sugarcane => "sugarcane",
            Self::Tomato => "tomato",
            Self::Onion => "onion",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Rice => "Rice",
            Self::Wheat => "Wheat",
            Self::Cotton => "Cotton",
            Self::Sugarcane => "Sugarcane",
            Self::Tomato => "Tomato",
            Self::Onion => "Onion",
        }
    }
}

impl fmt::Display for Crop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Crop {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|crop| crop.as_str() == normalized)
            .ok_or_else(|| format!("unknown crop `{value}`"))
    }
}

/// A resolved location: always a state, optionally narrowed to a city.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Region {
    pub state: String,
    pub city: Option<String>,
}

impl Region {
    pub fn state(state: impl Into<String>) -> Self {
        Self { state: state.into(), city: None }
    }

    pub fn city(city: impl Into<String>, state: impl Into<String>) -> Self {
        Self { state: state.into(), city: Some(city.into()) }
    }

    pub fn display_name(&self) -> String {
        match &self.city {
            Some(city) => format!("{city}, {}", self.state),
            None => self.state.clone(),
        }
    }
}

/// Opaque reference to an uploaded image. The engine never decodes it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageHandle(pub String);

/// Something the interpreter could not pin down with confidence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "field")]
pub enum InterpretationAmbiguity {
    Language { reason: String },
    Crop { candidates: Vec<Crop> },
    Region { candidates: Vec<String> },
    Acreage { mentions: Vec<String> },
}

/// A parsed farmer query. Built once by the interpreter and never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub raw_text: String,
    pub detected_language: Language,
    pub language_confidence: LanguageConfidence,
    pub crop: Option<Crop>,
    pub region: Option<Region>,
    pub acreage: Option<f64>,
    pub requested_topics: TopicSet,
    pub attached_image: Option<ImageHandle>,
    pub ambiguities: Vec<InterpretationAmbiguity>,
}

impl Query {
    pub fn needs_clarification(&self) -> bool {
        self.language_confidence == LanguageConfidence::Low
    }
}

#[cfg(test)]
mod tests {
    use super::{Crop, Script, Topic, TopicSet};

    #[test]
    fn topic_set_rejects_empty_input() {
        assert!(TopicSet::from_topics(Vec::new()).is_none());
        let set = TopicSet::from_topics([Topic::Market, Topic::Market]).expect("non-empty");
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn topic_set_deserialization_enforces_non_empty() {
        let empty = serde_json::from_str::<TopicSet>("[]");
        assert!(empty.is_err());

        let parsed: TopicSet =
            serde_json::from_str(r#"["calendar","weather"]"#).expect("valid topic set");
        assert_eq!(parsed.iter().collect::<Vec<_>>(), vec![Topic::Weather, Topic::Calendar]);
    }

    #[test]
    fn crop_parses_case_insensitively() {
        assert_eq!("Wheat".parse::<Crop>(), Ok(Crop::Wheat));
        assert!("barley".parse::<Crop>().is_err());
    }

    #[test]
    fn script_detection_covers_indic_blocks() {
        assert_eq!(Script::of('a'), Some(Script::Latin));
        assert_eq!(Script::of('ध'), Some(Script::Devanagari));
        assert_eq!(Script::of('ਕ'), Some(Script::Gurmukhi));
        assert_eq!(Script::of('த'), Some(Script::Tamil));
        assert_eq!(Script::of('7'), None);
    }
}
