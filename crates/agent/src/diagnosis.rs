//! Disease classification backed by a vision-capable LLM.
//!
//! The model is asked for a fixed line format and the answer is parsed into a
//! raw diagnosis; validation of names and severities stays with the
//! normalizer in `krishi-core`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use krishi_core::adapters::{RawDiagnosis, RawSeverity};
use krishi_core::{
    AdapterFailure, AdapterResponse, AdapterResult, Crop, DiseaseClassifier, FetchContext,
    ImageHandle, RawPayload, SourceId,
};
use tracing::warn;

use crate::llm::LlmClient;

const DEFAULT_CONFIDENCE: f64 = 0.6;

pub struct LlmDiseaseClassifier {
    client: Arc<dyn LlmClient>,
}

impl LlmDiseaseClassifier {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DiseaseClassifier for LlmDiseaseClassifier {
    fn source_id(&self) -> SourceId {
        SourceId::new(format!("llm:{}", self.client.model()))
    }

    async fn classify(
        &self,
        image: &ImageHandle,
        crop: Option<Crop>,
        ctx: &FetchContext,
    ) -> AdapterResult {
        let prompt = diagnosis_prompt(crop);
        let mut attempt = 0;
        let answer = loop {
            if ctx.is_cancelled() {
                return Err(AdapterFailure::timeout(self.source_id(), "cancelled before answer"));
            }
            match self.client.describe_image(image, &prompt).await {
                Ok(answer) => break answer,
                Err(error) if attempt < ctx.retry_budget => {
                    attempt += 1;
                    warn!(
                        event_name = "agent.diagnosis.retry",
                        attempt,
                        error = %error,
                        "image diagnosis failed, retrying"
                    );
                }
                Err(error) => {
                    return Err(AdapterFailure::unavailable(self.source_id(), error.to_string()))
                }
            }
        };

        let parsed = parse_diagnosis(&answer);
        Ok(AdapterResponse {
            source_id: self.source_id(),
            confidence: parsed.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            observed_at: Some(Utc::now()),
            payload: RawPayload::Disease(RawDiagnosis {
                disease_name: parsed.disease_name,
                severity: parsed.severity,
            }),
        })
    }
}

fn diagnosis_prompt(crop: Option<Crop>) -> String {
    let subject = crop.map(|crop| format!("{crop} plant")).unwrap_or_else(|| "crop".to_string());
    format!(
        "You are an agricultural plant pathologist. Examine this {subject} image and answer \
         with exactly three lines:\n\
         disease: <snake_case disease name, or healthy>\n\
         severity: <mild, moderate or severe>\n\
         confidence: <number between 0 and 1>"
    )
}

#[derive(Debug, Default, PartialEq)]
struct ParsedDiagnosis {
    disease_name: Option<String>,
    severity: Option<RawSeverity>,
    confidence: Option<f64>,
}

fn parse_diagnosis(answer: &str) -> ParsedDiagnosis {
    let mut parsed = ParsedDiagnosis::default();
    for line in answer.lines() {
        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().trim_matches(|ch| ch == '*' || ch == '`').trim();
        if value.is_empty() {
            continue;
        }
        match field.trim().trim_matches('*').to_ascii_lowercase().as_str() {
            "disease" => parsed.disease_name = Some(value.to_ascii_lowercase().replace(' ', "_")),
            "severity" => {
                parsed.severity = Some(match value.parse::<f64>() {
                    Ok(score) => RawSeverity::Score(score),
                    Err(_) => RawSeverity::Label(value.to_string()),
                })
            }
            "confidence" => parsed.confidence = value.parse::<f64>().ok(),
            _ => {}
        }
    }
    parsed
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use krishi_core::adapters::RawSeverity;
    use krishi_core::{
        AdapterFailureKind, Crop, DiseaseClassifier, FetchContext, ImageHandle, RawPayload,
    };

    use super::{parse_diagnosis, LlmDiseaseClassifier};
    use crate::llm::LlmClient;

    struct ScriptedVision {
        answer: &'static str,
        failures_before_answer: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for ScriptedVision {
        fn model(&self) -> &str {
            "vision-test"
        }

        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(anyhow!("text completion not scripted"))
        }

        async fn describe_image(&self, _image: &ImageHandle, _prompt: &str) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_answer {
                Err(anyhow!("upstream 503"))
            } else {
                Ok(self.answer.to_string())
            }
        }
    }

    fn ctx(retry_budget: u32) -> FetchContext {
        FetchContext::new(NaiveDate::from_ymd_opt(2026, 7, 10).expect("valid date"), retry_budget)
    }

    fn image() -> ImageHandle {
        ImageHandle("upload://leaf.jpg".to_string())
    }

    #[test]
    fn parses_line_format_with_markdown_noise() {
        let parsed =
            parse_diagnosis("**Disease:** Early Blight\nseverity: severe\nconfidence: 0.82\n");

        assert_eq!(parsed.disease_name.as_deref(), Some("early_blight"));
        assert_eq!(parsed.severity, Some(RawSeverity::Label("severe".to_string())));
        assert_eq!(parsed.confidence, Some(0.82));
    }

    #[test]
    fn numeric_severity_is_kept_as_score() {
        let parsed = parse_diagnosis("disease: rust\nseverity: 0.4");
        assert_eq!(parsed.severity, Some(RawSeverity::Score(0.4)));
        assert_eq!(parsed.confidence, None);
    }

    #[tokio::test]
    async fn classify_retries_within_budget() {
        let client = Arc::new(ScriptedVision {
            answer: "disease: blast\nseverity: moderate\nconfidence: 0.7",
            failures_before_answer: 1,
            calls: AtomicUsize::new(0),
        });
        let classifier = LlmDiseaseClassifier::new(client.clone());

        let response =
            classifier.classify(&image(), Some(Crop::Rice), &ctx(1)).await.expect("diagnosis");

        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
        assert_eq!(response.source_id.as_str(), "llm:vision-test");
        assert_eq!(response.confidence, 0.7);
        match response.payload {
            RawPayload::Disease(raw) => assert_eq!(raw.disease_name.as_deref(), Some("blast")),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[tokio::test]
    async fn classify_reports_unavailable_when_budget_is_spent() {
        let client = Arc::new(ScriptedVision {
            answer: "disease: blast",
            failures_before_answer: 5,
            calls: AtomicUsize::new(0),
        });
        let classifier = LlmDiseaseClassifier::new(client.clone());

        let failure = classifier.classify(&image(), None, &ctx(1)).await.expect_err("failure");

        assert_eq!(failure.kind, AdapterFailureKind::Unavailable);
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }
}
