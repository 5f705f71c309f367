//! Chat-facing layer around the advisory engine.
//!
//! - `llm`: the completion/vision capability the agent is allowed to use
//! - `diagnosis`: a `DiseaseClassifier` that asks a vision model about a photo
//! - `translate`: localisation of finished advice text
//! - `reply`: WhatsApp text rendering
//! - `runtime`: message in, reply out
//!
//! The LLM only describes images and translates text. Priorities, prices and
//! calendar decisions always come from `krishi-core`.

pub mod diagnosis;
pub mod llm;
pub mod reply;
pub mod runtime;
pub mod translate;

pub use diagnosis::LlmDiseaseClassifier;
pub use llm::LlmClient;
pub use runtime::{AgentReply, AgentRuntime};
pub use translate::{LlmTranslator, Translator};
