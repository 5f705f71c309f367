use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use krishi_agent::{AgentRuntime, LlmDiseaseClassifier, LlmTranslator};
use krishi_core::config::{AppConfig, ConfigError};
use krishi_core::{AdapterSet, AdvisoryEngine, ApplicationError};
use reqwest::Client;
use thiserror::Error;
use tracing::info;

use crate::adapters::{MandiPriceBoard, OpenAiCompatibleClient, OpenMeteoWeather};
use crate::advise::{self, AdviseState};
use crate::health::{self, AdapterCounts, HealthState};

pub struct Application {
    pub config: AppConfig,
    pub runtime: Arc<AgentRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("advisory engine setup failed: {0}")]
    Engine(#[from] ApplicationError),
    #[error("http client setup failed: {0}")]
    HttpClient(#[source] reqwest::Error),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let engine = AdvisoryEngine::from_config(&config)?;
    info!(
        event_name = "system.bootstrap.calendar_loaded",
        correlation_id = "bootstrap",
        crops = engine.calendar().crops().count(),
        custom_table = config.advisory.calendar_path.is_some(),
        "crop calendar loaded"
    );

    // Adapter calls are bounded by the engine; the client timeout only guards
    // against sockets that outlive a cancelled request.
    let http = Client::builder()
        .timeout(Duration::from_secs(config.llm.timeout_secs.max(1)))
        .build()
        .map_err(BootstrapError::HttpClient)?;

    let mut adapters = AdapterSet::new().with_market(Arc::new(MandiPriceBoard::default()));
    if config.weather.enabled {
        adapters = adapters.with_weather(Arc::new(OpenMeteoWeather::new(
            http.clone(),
            config.weather.open_meteo_base_url.clone(),
        )));
    }

    let mut translator = None;
    if config.llm.enabled {
        let llm = Arc::new(OpenAiCompatibleClient::from_config(http, &config.llm));
        adapters = adapters.with_disease(Arc::new(LlmDiseaseClassifier::new(llm.clone())));
        translator = Some(Arc::new(LlmTranslator::new(llm)));
    }

    info!(
        event_name = "system.bootstrap.adapters_configured",
        correlation_id = "bootstrap",
        adapters = ?adapters,
        translation = translator.is_some(),
        "data adapters configured"
    );

    let mut runtime = AgentRuntime::new(engine, adapters);
    if let Some(translator) = translator {
        runtime = runtime.with_translator(translator);
    }

    Ok(Application { config, runtime: Arc::new(runtime) })
}

impl Application {
    pub fn router(&self) -> Router {
        let health_state = HealthState::new(
            AdapterCounts::from(self.runtime.adapters()),
            self.runtime.engine().calendar().crops().count(),
        );
        Router::new()
            .merge(health::router(health_state))
            .merge(advise::router(AdviseState::new(self.runtime.clone())))
    }
}
