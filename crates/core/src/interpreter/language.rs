use std::collections::BTreeMap;

use crate::domain::query::{Language, LanguageConfidence, Script};

use super::gazetteer::{ENGLISH_WORDS, HINGLISH_MARKERS};

/// Share of word tokens the dominant script must hold before the message
/// counts as written in one language.
const DOMINANT_SCRIPT_SHARE: f64 = 0.6;

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct LanguageGuess {
    pub language: Language,
    pub confidence: LanguageConfidence,
    /// Why confidence is low, when it is.
    pub reason: Option<String>,
}

impl LanguageGuess {
    fn confident(language: Language) -> Self {
        Self { language, confidence: LanguageConfidence::High, reason: None }
    }

    fn unsure(reason: &str) -> Self {
        Self {
            language: Language::English,
            confidence: LanguageConfidence::Low,
            reason: Some(reason.to_string()),
        }
    }
}

/// Detects the query language from the scripts of its tokens.
///
/// `recognised` reports whether a Latin token is a known gazetteer or topic
/// word, so that romanized text made only of place and crop names still counts
/// as understood.
pub(crate) fn detect(tokens: &[String], recognised: impl Fn(&str) -> bool) -> LanguageGuess {
    let mut per_script: BTreeMap<Script, usize> = BTreeMap::new();
    let mut latin_tokens = Vec::new();

    for token in tokens {
        let Some(script) = token_script(token) else {
            continue;
        };
        *per_script.entry(script).or_default() += 1;
        if script == Script::Latin {
            latin_tokens.push(token.as_str());
        }
    }

    let word_count: usize = per_script.values().sum();
    if word_count == 0 {
        return LanguageGuess::unsure("message has no recognisable words");
    }

    let Some((dominant, count)) =
        per_script.iter().max_by_key(|(script, count)| (**count, std::cmp::Reverse(**script)))
    else {
        return LanguageGuess::unsure("message has no recognisable words");
    };

    if (*count as f64) / (word_count as f64) < DOMINANT_SCRIPT_SHARE {
        return LanguageGuess::unsure("message mixes several scripts");
    }

    match dominant {
        Script::Devanagari => LanguageGuess::confident(Language::Hindi),
        Script::Latin => detect_latin(&latin_tokens, recognised),
        other => LanguageGuess::confident(Language::Regional(*other)),
    }
}

fn detect_latin(tokens: &[&str], recognised: impl Fn(&str) -> bool) -> LanguageGuess {
    let hinglish = tokens.iter().filter(|token| HINGLISH_MARKERS.contains(*token)).count();
    if hinglish >= 2 && hinglish * 2 >= tokens.len() {
        return LanguageGuess::confident(Language::Hindi);
    }

    let understood = tokens
        .iter()
        .filter(|token| ENGLISH_WORDS.contains(*token) || recognised(**token))
        .count();
    if understood == 0 && hinglish == 0 {
        return LanguageGuess::unsure("no known English or Hindi words found");
    }

    LanguageGuess::confident(Language::English)
}

/// Script of the majority of a token's letters; digits and marks do not count.
fn token_script(token: &str) -> Option<Script> {
    let mut counts: BTreeMap<Script, usize> = BTreeMap::new();
    for ch in token.chars() {
        if let Some(script) = Script::of(ch) {
            *counts.entry(script).or_default() += 1;
        }
    }
    counts.into_iter().max_by_key(|(script, count)| (*count, std::cmp::Reverse(*script))).map(
        |(script, _)| script,
    )
}

#[cfg(test)]
mod tests {
    use super::detect;
    use crate::domain::query::{Language, LanguageConfidence, Script};

    fn tokens(text: &str) -> Vec<String> {
        text.split_whitespace().map(|word| word.to_lowercase()).collect()
    }

    fn none(_: &str) -> bool {
        false
    }

    #[test]
    fn devanagari_text_is_hindi() {
        let guess = detect(&tokens("पंजाब में गेहूं का भाव"), none);
        assert_eq!(guess.language, Language::Hindi);
        assert_eq!(guess.confidence, LanguageConfidence::High);
    }

    #[test]
    fn a_latin_place_name_does_not_break_hindi_detection() {
        let guess = detect(&tokens("Punjab में गेहूं का भाव"), none);
        assert_eq!(guess.language, Language::Hindi);
    }

    #[test]
    fn romanized_hindi_is_detected_from_markers() {
        let guess = detect(&tokens("gehun ka bhav kya hai"), none);
        assert_eq!(guess.language, Language::Hindi);
        assert_eq!(guess.confidence, LanguageConfidence::High);
    }

    #[test]
    fn plain_english_is_english() {
        let guess = detect(&tokens("what is the weather tomorrow"), none);
        assert_eq!(guess.language, Language::English);
        assert_eq!(guess.confidence, LanguageConfidence::High);
    }

    #[test]
    fn other_indic_scripts_are_regional() {
        let guess = detect(&tokens("ਕਣਕ ਦਾ ਭਾਅ"), none);
        assert_eq!(guess.language, Language::Regional(Script::Gurmukhi));
    }

    #[test]
    fn empty_or_mixed_text_falls_back_to_low_confidence_english() {
        let empty = detect(&[], none);
        assert_eq!(empty.language, Language::English);
        assert_eq!(empty.confidence, LanguageConfidence::Low);

        let mixed = detect(&tokens("wheat गेहूं ਕਣਕ"), none);
        assert_eq!(mixed.language, Language::English);
        assert_eq!(mixed.confidence, LanguageConfidence::Low);
        assert!(mixed.reason.is_some());
    }

    #[test]
    fn unknown_latin_words_are_low_confidence() {
        let guess = detect(&tokens("xyzzy plugh"), none);
        assert_eq!(guess.confidence, LanguageConfidence::Low);
    }
}
