use std::sync::Arc;

use chrono::{DateTime, Utc};
use krishi_core::{Advisory, AdapterSet, AdvisoryEngine, ImageHandle, Language};
use serde::Serialize;
use tracing::{info, warn};

use crate::reply::{item_texts, render_reply};
use crate::translate::{translate_items, Translator};

/// What the chat surface sends back: the rendered text and the advisory behind it.
#[derive(Clone, Debug, Serialize)]
pub struct AgentReply {
    pub reply: String,
    pub advisory: Advisory,
    pub translated: bool,
}

pub struct AgentRuntime {
    engine: AdvisoryEngine,
    adapters: AdapterSet,
    translator: Option<Arc<dyn Translator>>,
}

impl AgentRuntime {
    pub fn new(engine: AdvisoryEngine, adapters: AdapterSet) -> Self {
        Self { engine, adapters, translator: None }
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn engine(&self) -> &AdvisoryEngine {
        &self.engine
    }

    pub fn adapters(&self) -> &AdapterSet {
        &self.adapters
    }

    pub async fn handle_message(
        &self,
        text: &str,
        image: Option<ImageHandle>,
        now: DateTime<Utc>,
    ) -> AgentReply {
        let advisory = self.engine.advise(text, image, now, &self.adapters).await;
        let mut items = item_texts(&advisory);
        let mut translated = false;

        if let (Some(translator), true) =
            (&self.translator, advisory.language() != Language::English)
        {
            match translate_items(translator.as_ref(), &items, advisory.language()).await {
                Ok(localized) => {
                    items = localized;
                    translated = true;
                }
                Err(error) => warn!(
                    event_name = "agent.reply.translation_failed",
                    language = advisory.language().code(),
                    error = %error,
                    "translation failed, replying in English"
                ),
            }
        }

        let reply = render_reply(&advisory, &items);
        info!(
            event_name = "agent.reply.rendered",
            items = advisory.items().len(),
            translated,
            reply_chars = reply.chars().count(),
            "reply rendered"
        );

        AgentReply { reply, advisory, translated }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use krishi_core::adapters::{PriceUnit, RawMarket};
    use krishi_core::{
        AdapterResponse, AdapterResult, AdapterSet, AdvisoryEngine, Crop, FetchContext, Language,
        MarketSource, RawPayload, Region, SourceId,
    };
    use rust_decimal::Decimal;

    use super::AgentRuntime;
    use crate::translate::Translator;

    struct Mandi;

    #[async_trait]
    impl MarketSource for Mandi {
        fn source_id(&self) -> SourceId {
            SourceId::new("mandi-board")
        }

        async fn fetch(
            &self,
            _crop: Crop,
            _region: Option<&Region>,
            _ctx: &FetchContext,
        ) -> AdapterResult {
            Ok(AdapterResponse {
                source_id: self.source_id(),
                confidence: 0.8,
                observed_at: Some(Utc::now()),
                payload: RawPayload::Market(RawMarket {
                    price: Some(Decimal::from(2050)),
                    currency: Some("₹".to_string()),
                    unit: PriceUnit::Quintal,
                    trend: None,
                    markets: Vec::new(),
                }),
            })
        }
    }

    struct Tagging;

    #[async_trait]
    impl Translator for Tagging {
        async fn translate(&self, lines: &[String], _language: Language) -> Result<Vec<String>> {
            Ok(lines.iter().map(|line| format!("[hi] {line}")).collect())
        }
    }

    struct Broken;

    #[async_trait]
    impl Translator for Broken {
        async fn translate(&self, _lines: &[String], _language: Language) -> Result<Vec<String>> {
            Err(anyhow!("model offline"))
        }
    }

    fn runtime() -> AgentRuntime {
        AgentRuntime::new(AdvisoryEngine::default(), AdapterSet::new().with_market(Arc::new(Mandi)))
    }

    #[tokio::test]
    async fn hindi_query_is_translated_when_translator_is_configured() {
        let runtime = runtime().with_translator(Arc::new(Tagging));
        let now = Utc::now();

        let reply = runtime.handle_message("पंजाब में गेहूं का भाव क्या है?", None, now).await;

        assert!(reply.translated);
        assert!(reply.reply.contains("[hi] Wheat price in Punjab: ₹2050/quintal"));
        assert!(reply.reply.starts_with("🌾 *कृषि सलाह*"));
    }

    #[tokio::test]
    async fn translation_failure_falls_back_to_english() {
        let runtime = runtime().with_translator(Arc::new(Broken));

        let reply =
            runtime.handle_message("पंजाब में गेहूं का भाव क्या है?", None, Utc::now()).await;

        assert!(!reply.translated);
        assert!(reply.reply.contains("Wheat price in Punjab: ₹2050/quintal"));
    }

    #[tokio::test]
    async fn english_query_is_not_translated() {
        let runtime = runtime().with_translator(Arc::new(Tagging));
        let now = Utc.with_ymd_and_hms(2026, 11, 2, 6, 0, 0).single().expect("valid timestamp");

        let reply = runtime.handle_message("wheat price in Punjab", None, now).await;

        assert!(!reply.translated);
        assert_eq!(reply.advisory.language(), Language::English);
    }
}
