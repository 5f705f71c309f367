//! Translation of rendered advice into the farmer's language.
//!
//! The engine never translates; the agent does it on the finished text, and
//! falls back to English whenever the translator misbehaves.

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use krishi_core::domain::query::Script;
use krishi_core::Language;

use crate::llm::LlmClient;
use crate::reply::ItemText;

#[async_trait]
pub trait Translator: Send + Sync {
    /// Returns exactly one translated line per input line.
    async fn translate(&self, lines: &[String], language: Language) -> Result<Vec<String>>;
}

pub fn language_name(language: Language) -> &'static str {
    match language {
        Language::English => "English",
        Language::Hindi => "Hindi",
        Language::Regional(Script::Bengali) => "Bengali",
        Language::Regional(Script::Gurmukhi) => "Punjabi",
        Language::Regional(Script::Gujarati) => "Gujarati",
        Language::Regional(Script::Oriya) => "Odia",
        Language::Regional(Script::Tamil) => "Tamil",
        Language::Regional(Script::Telugu) => "Telugu",
        Language::Regional(Script::Kannada) => "Kannada",
        Language::Regional(Script::Malayalam) => "Malayalam",
        Language::Regional(Script::Devanagari) => "Marathi",
        Language::Regional(Script::Latin) => "English",
    }
}

pub struct LlmTranslator {
    client: Arc<dyn LlmClient>,
}

impl LlmTranslator {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(&self, lines: &[String], language: Language) -> Result<Vec<String>> {
        if lines.is_empty() {
            return Ok(Vec::new());
        }

        let numbered: Vec<String> = lines
            .iter()
            .enumerate()
            .map(|(index, line)| format!("{}. {line}", index + 1))
            .collect();
        let prompt = format!(
            "Translate each numbered line into simple {} for a farmer. Keep numbers, ₹ amounts \
             and units unchanged. Answer with the same numbered lines and nothing else.\n\n{}",
            language_name(language),
            numbered.join("\n")
        );

        let answer = self.client.complete(&prompt).await?;
        let translated = parse_numbered_lines(&answer);
        if translated.len() != lines.len() {
            bail!("expected {} translated lines, got {}", lines.len(), translated.len());
        }
        Ok(translated)
    }
}

fn parse_numbered_lines(answer: &str) -> Vec<String> {
    answer
        .lines()
        .filter_map(|line| {
            let (number, text) = line.trim().split_once('.')?;
            number.trim().parse::<usize>().ok()?;
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        })
        .collect()
}

/// Translates every headline and detail, keeping the item structure.
pub async fn translate_items(
    translator: &dyn Translator,
    items: &[ItemText],
    language: Language,
) -> Result<Vec<ItemText>> {
    let lines: Vec<String> =
        items.iter().flat_map(|item| item.lines().map(str::to_string)).collect();
    let translated = translator.translate(&lines, language).await?;
    if translated.len() != lines.len() {
        bail!("translator returned {} lines for {}", translated.len(), lines.len());
    }

    let mut translated = translated.into_iter();
    let mut result = Vec::with_capacity(items.len());
    for item in items {
        let mut take = || translated.next().unwrap_or_default();
        let headline = take();
        let details = item.details.iter().map(|_| take()).collect();
        result.push(ItemText { priority: item.priority, headline, details });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use krishi_core::{ImageHandle, Language, Priority};

    use super::{parse_numbered_lines, translate_items, LlmTranslator, Translator};
    use crate::llm::LlmClient;
    use crate::reply::ItemText;

    struct EchoUpper;

    #[async_trait]
    impl Translator for EchoUpper {
        async fn translate(&self, lines: &[String], _language: Language) -> Result<Vec<String>> {
            Ok(lines.iter().map(|line| line.to_uppercase()).collect())
        }
    }

    struct FixedAnswer(&'static str);

    #[async_trait]
    impl LlmClient for FixedAnswer {
        fn model(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }

        async fn describe_image(&self, _image: &ImageHandle, _prompt: &str) -> Result<String> {
            Err(anyhow!("vision not scripted"))
        }
    }

    #[test]
    fn numbered_lines_are_parsed_in_order() {
        let parsed = parse_numbered_lines("1. पहली पंक्ति\n\n2. दूसरी पंक्ति ₹2100\nnote");
        assert_eq!(parsed, vec!["पहली पंक्ति".to_string(), "दूसरी पंक्ति ₹2100".to_string()]);
    }

    #[tokio::test]
    async fn translate_items_preserves_structure() {
        let items = vec![
            ItemText {
                priority: Priority::Critical,
                headline: "heavy rain".to_string(),
                details: vec!["clear drains".to_string(), "delay spraying".to_string()],
            },
            ItemText {
                priority: Priority::Informational,
                headline: "price".to_string(),
                details: Vec::new(),
            },
        ];

        let translated = translate_items(&EchoUpper, &items, Language::Hindi).await.expect("ok");

        assert_eq!(translated[0].headline, "HEAVY RAIN");
        assert_eq!(translated[0].details, vec!["CLEAR DRAINS", "DELAY SPRAYING"]);
        assert_eq!(translated[1].headline, "PRICE");
        assert_eq!(translated[1].priority, Priority::Informational);
    }

    #[tokio::test]
    async fn llm_translator_rejects_short_answers() {
        let translator = LlmTranslator::new(Arc::new(FixedAnswer("1. केवल एक")));

        let result = translator
            .translate(&["one".to_string(), "two".to_string()], Language::Hindi)
            .await;

        assert!(result.is_err());
    }
}
