//! Advisory engine for farmer queries: interpretation, adapter fan-out,
//! normalization, conflict resolution and ranked synthesis.

pub mod adapters;
pub mod calendar;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod interpreter;
pub mod normalizer;
pub mod resolver;
pub mod synthesizer;
pub mod treatments;

pub use adapters::{
    AdapterResponse, AdapterResult, AdapterSet, DiseaseClassifier, FetchContext, MarketSource,
    RawPayload, WeatherSource,
};
pub use calendar::{CalendarTable, CalendarWindow, CropProfile, Season};
pub use config::{AppConfig, ConfigError, LoadOptions};
pub use domain::advisory::{Advisory, AdvisoryItem, Priority, RationaleTag};
pub use domain::fact::{
    AdapterFailure, AdapterFailureKind, FactKey, FactValue, MarketPrice, PriceTrend,
    ResolutionReason, ResolvedFact, SourceFact, SourceId,
};
pub use domain::query::{
    Crop, ImageHandle, Language, LanguageConfidence, Query, Region, Topic, TopicSet,
};
pub use engine::{AdvisoryEngine, EngineSettings};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use interpreter::QueryInterpreter;
pub use resolver::{ConflictResolver, ResolverPolicy};
pub use synthesizer::{AdvisorySynthesizer, SynthesisPolicy};
