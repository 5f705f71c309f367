//! Deterministic parsing of free-text farmer messages into a [`Query`].
//!
//! The interpreter never fails. Fields it cannot find stay unset, and anything
//! it had to guess is recorded on the query as an [`InterpretationAmbiguity`].

mod gazetteer;
mod language;

use std::collections::BTreeSet;

use crate::domain::query::{
    Crop, ImageHandle, InterpretationAmbiguity, LanguageConfidence, Query, Region, Topic,
    TopicSet,
};

use gazetteer::{
    alias_positions, stem_matches, word_matches, ACRES_PER_HECTARE, ACRE_UNITS, CITIES,
    CROP_NAMES, HECTARE_UNITS, STATES, TOPIC_KEYWORDS,
};

#[derive(Clone, Debug, Default)]
pub struct QueryInterpreter;

impl QueryInterpreter {
    pub fn new() -> Self {
        Self
    }

    pub fn interpret(&self, raw_text: &str, image: Option<ImageHandle>) -> Query {
        let normalized_text = normalize_text(raw_text);
        let tokens = tokenize(&normalized_text);
        let mut ambiguities = Vec::new();

        let guess = language::detect(&tokens, is_gazetteer_word);
        if guess.confidence == LanguageConfidence::Low {
            let reason = guess.reason.clone().unwrap_or_else(|| "language unclear".to_string());
            ambiguities.push(InterpretationAmbiguity::Language { reason });
        }

        let crop = extract_crop(&tokens, &mut ambiguities);
        let region = extract_region(&tokens, &mut ambiguities);
        let acreage = extract_acreage(&tokens, &mut ambiguities);
        let requested_topics = extract_topics(&tokens, image.is_some());

        Query {
            raw_text: raw_text.to_string(),
            detected_language: guess.language,
            language_confidence: guess.confidence,
            crop,
            region,
            acreage,
            requested_topics,
            attached_image: image,
            ambiguities,
        }
    }
}

/// Lowercases and maps Devanagari digits to ASCII.
fn normalize_text(text: &str) -> String {
    text.chars()
        .map(|character| match character {
            '\u{0966}'..='\u{096F}' => {
                char::from(b'0' + (character as u32 - 0x0966) as u8)
            }
            other => other,
        })
        .flat_map(char::to_lowercase)
        .collect()
}

fn tokenize(text: &str) -> Vec<String> {
    let mut sanitized = String::with_capacity(text.len());
    for character in text.chars() {
        let separator = character.is_whitespace()
            || matches!(character, '।' | '॥')
            || (character.is_ascii_punctuation() && character != '.');
        sanitized.push(if separator { ' ' } else { character });
    }

    sanitized
        .split_whitespace()
        .map(|token| token.trim_matches('.'))
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
        .collect()
}

fn is_gazetteer_word(token: &str) -> bool {
    let crop_word = CROP_NAMES.iter().flat_map(|(_, names)| names.iter());
    let state_word = STATES.iter().flat_map(|state| state.aliases.iter());
    let city_word = CITIES.iter().flat_map(|city| city.aliases.iter());
    let hit = crop_word
        .chain(state_word)
        .chain(city_word)
        .flat_map(|alias| alias.split(' '))
        .any(|word| word_matches(token, word));

    hit || TOPIC_KEYWORDS
        .iter()
        .flat_map(|(_, stems)| stems.iter())
        .any(|stem| stem_matches(token, stem))
        || ACRE_UNITS.contains(&token)
        || HECTARE_UNITS.contains(&token)
}

fn first_position(tokens: &[String], aliases: &[&str]) -> Option<usize> {
    aliases.iter().flat_map(|alias| alias_positions(tokens, alias)).min()
}

fn extract_crop(
    tokens: &[String],
    ambiguities: &mut Vec<InterpretationAmbiguity>,
) -> Option<Crop> {
    let mut mentions: Vec<(usize, Crop)> = CROP_NAMES
        .iter()
        .filter_map(|(crop, names)| first_position(tokens, names).map(|position| (position, *crop)))
        .collect();
    mentions.sort();

    if mentions.len() > 1 {
        ambiguities.push(InterpretationAmbiguity::Crop {
            candidates: mentions.iter().map(|(_, crop)| *crop).collect(),
        });
    }

    mentions.first().map(|(_, crop)| *crop)
}

fn extract_region(
    tokens: &[String],
    ambiguities: &mut Vec<InterpretationAmbiguity>,
) -> Option<Region> {
    let mut mentions: Vec<(usize, Region)> = Vec::new();
    for city in CITIES {
        if let Some(position) = first_position(tokens, city.aliases) {
            mentions.push((position, Region::city(city.name, city.state)));
        }
    }
    for state in STATES {
        if let Some(position) = first_position(tokens, state.aliases) {
            mentions.push((position, Region::state(state.name)));
        }
    }
    mentions.sort();

    let states: BTreeSet<&str> = mentions.iter().map(|(_, region)| region.state.as_str()).collect();
    if states.len() > 1 {
        let mut candidates = Vec::new();
        for (_, region) in &mentions {
            let name = region.display_name();
            if !candidates.contains(&name) {
                candidates.push(name);
            }
        }
        ambiguities.push(InterpretationAmbiguity::Region { candidates });
        return mentions.into_iter().next().map(|(_, region)| region);
    }

    // A city and its own state ("Ludhiana, Punjab") agree; keep the narrower one.
    let city = mentions.iter().find(|(_, region)| region.city.is_some()).cloned();
    city.or_else(|| mentions.into_iter().next()).map(|(_, region)| region)
}

fn extract_acreage(
    tokens: &[String],
    ambiguities: &mut Vec<InterpretationAmbiguity>,
) -> Option<f64> {
    let mut mentions: Vec<(f64, String)> = Vec::new();

    for (index, token) in tokens.iter().enumerate() {
        let (number, attached_unit) = split_number(token);
        let Some(value) = number.and_then(|digits| digits.parse::<f64>().ok()) else {
            continue;
        };
        if !value.is_finite() || value <= 0.0 {
            continue;
        }

        let unit = if attached_unit.is_empty() {
            match tokens.get(index + 1) {
                Some(next) => next.as_str(),
                None => continue,
            }
        } else {
            attached_unit
        };

        let acres = if is_unit(unit, ACRE_UNITS) {
            value
        } else if is_unit(unit, HECTARE_UNITS) {
            value * ACRES_PER_HECTARE
        } else {
            continue;
        };
        mentions.push((acres, format!("{value} {unit}")));
    }

    let distinct: Vec<f64> = mentions.iter().fold(Vec::new(), |mut seen, (acres, _)| {
        if !seen.iter().any(|known: &f64| (known - acres).abs() < 1e-9) {
            seen.push(*acres);
        }
        seen
    });
    if distinct.len() > 1 {
        ambiguities.push(InterpretationAmbiguity::Acreage {
            mentions: mentions.iter().map(|(_, text)| text.clone()).collect(),
        });
    }

    mentions.first().map(|(acres, _)| *acres)
}

/// Splits `"2.5acre"` into `(Some("2.5"), "acre")`.
fn split_number(token: &str) -> (Option<&str>, &str) {
    let end = token
        .char_indices()
        .find(|(_, character)| !(character.is_ascii_digit() || *character == '.'))
        .map(|(index, _)| index)
        .unwrap_or(token.len());
    if end == 0 {
        return (None, token);
    }
    (Some(&token[..end]), &token[end..])
}

fn is_unit(token: &str, units: &[&str]) -> bool {
    units.iter().any(|unit| word_matches(token, unit))
}

fn extract_topics(tokens: &[String], has_image: bool) -> TopicSet {
    let mut topics: Vec<Topic> = TOPIC_KEYWORDS
        .iter()
        .filter(|(_, stems)| {
            tokens.iter().any(|token| stems.iter().any(|stem| stem_matches(token, stem)))
        })
        .map(|(topic, _)| *topic)
        .collect();

    if has_image {
        topics.push(Topic::Disease);
    }

    TopicSet::from_topics(topics).unwrap_or_else(TopicSet::default_for_unclear_query)
}
