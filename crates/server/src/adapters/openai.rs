//! Chat-completions client for OpenAI and OpenAI-compatible endpoints (Ollama).

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use krishi_agent::LlmClient;
use krishi_core::config::LlmConfig;
use krishi_core::ImageHandle;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

const OLLAMA_DEFAULT_BASE_URL: &str = "http://localhost:11434/v1";

pub struct OpenAiCompatibleClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenAiCompatibleClient {
    pub fn from_config(client: Client, config: &LlmConfig) -> Self {
        let base_url =
            config.base_url.clone().unwrap_or_else(|| OLLAMA_DEFAULT_BASE_URL.to_string());
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        }
    }

    fn request_body(&self, content: Value) -> Value {
        json!({
            "model": self.model,
            "temperature": 0.2,
            "messages": [{ "role": "user", "content": content }],
        })
    }

    async fn chat(&self, body: Value) -> Result<String> {
        let mut request =
            self.client.post(format!("{}/chat/completions", self.base_url)).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.context("chat completion request failed")?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("chat completion endpoint returned {status}"));
        }

        let completion: ChatCompletion =
            response.json().await.context("chat completion response was malformed")?;
        first_message(completion)
    }
}

fn first_message(completion: ChatCompletion) -> Result<String> {
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| anyhow!("chat completion contained no message"))
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.chat(self.request_body(json!(prompt))).await
    }

    async fn describe_image(&self, image: &ImageHandle, prompt: &str) -> Result<String> {
        let url = image.0.as_str();
        let content = json!([
            { "type": "text", "text": prompt },
            { "type": "image_url", "image_url": { "url": url } },
        ]);
        self.chat(self.request_body(content)).await
    }
}

#[cfg(test)]
mod tests {
    use krishi_core::config::{AppConfig, LlmProvider};
    use reqwest::Client;
    use serde_json::json;

    use super::{first_message, ChatCompletion, OpenAiCompatibleClient};

    #[test]
    fn ollama_without_base_url_uses_local_default() {
        let mut config = AppConfig::default().llm;
        config.provider = LlmProvider::Ollama;
        config.base_url = None;
        config.model = "llava".to_string();

        let client = OpenAiCompatibleClient::from_config(Client::new(), &config);

        assert_eq!(client.base_url, "http://localhost:11434/v1");
        let body = client.request_body(json!("hello"));
        assert_eq!(body["model"], "llava");
        assert_eq!(body["messages"][0]["content"], "hello");
    }

    #[test]
    fn empty_completion_is_an_error() {
        let completion: ChatCompletion =
            serde_json::from_value(json!({"choices": [{"message": {"content": "  "}}]}))
                .expect("fixture parses");
        assert!(first_message(completion).is_err());

        let completion: ChatCompletion =
            serde_json::from_value(json!({"choices": [{"message": {"content": "disease: rust"}}]}))
                .expect("fixture parses");
        assert_eq!(first_message(completion).expect("content"), "disease: rust");
    }
}
