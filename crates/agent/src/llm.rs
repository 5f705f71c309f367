use anyhow::Result;
use async_trait::async_trait;
use krishi_core::ImageHandle;

/// Text and vision completion capability. The agent only ever asks it to
/// translate or to describe; it never decides advice.
#[async_trait]
pub trait LlmClient: Send + Sync {
    fn model(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String>;

    async fn describe_image(&self, image: &ImageHandle, prompt: &str) -> Result<String>;
}
