//! The advisory façade: interpret, fan out, normalize, resolve, synthesize.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::{
    AdapterResult, AdapterSet, DiseaseClassifier, FetchContext, MarketSource, WeatherSource,
};
use crate::calendar::{india_time, CalendarTable};
use crate::config::{AppConfig, EngineConfig};
use crate::domain::advisory::Advisory;
use crate::domain::fact::{
    AdapterFailure, FactKey, Resolution, ResolutionFailure, ResolutionReason, SourceId,
};
use crate::domain::query::{Crop, ImageHandle, Query, Region, Topic};
use crate::errors::ApplicationError;
use crate::interpreter::QueryInterpreter;
use crate::normalizer::normalize;
use crate::resolver::{ConflictResolver, FactGroup, ResolverPolicy};
use crate::synthesizer::{AdvisorySynthesizer, SynthesisPolicy};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    pub total_budget: Duration,
    pub adapter_timeout: Duration,
    pub retry_budget: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default().engine)
    }
}

impl From<&EngineConfig> for EngineSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            total_budget: Duration::from_millis(config.total_budget_ms),
            adapter_timeout: Duration::from_millis(config.adapter_timeout_ms),
            retry_budget: config.retry_budget,
        }
    }
}

/// One adapter invocation waiting to be spawned.
enum PendingCall {
    Weather(Arc<dyn WeatherSource>, Region),
    Market(Arc<dyn MarketSource>, Crop, Option<Region>),
    Disease(Arc<dyn DiseaseClassifier>, ImageHandle, Option<Crop>),
}

impl PendingCall {
    fn source_id(&self) -> SourceId {
        match self {
            Self::Weather(source, _) => source.source_id(),
            Self::Market(source, _, _) => source.source_id(),
            Self::Disease(classifier, _, _) => classifier.source_id(),
        }
    }

    async fn run(self, ctx: &FetchContext) -> AdapterResult {
        match self {
            Self::Weather(source, region) => source.fetch(&region, ctx).await,
            Self::Market(source, crop, region) => source.fetch(crop, region.as_ref(), ctx).await,
            Self::Disease(classifier, image, crop) => classifier.classify(&image, crop, ctx).await,
        }
    }
}

/// Which calls to make, and which groups they feed.
struct CallPlan {
    groups: Vec<FactGroup>,
    calls: Vec<(usize, PendingCall)>,
    missing: Vec<ResolutionFailure>,
}

#[derive(Clone, Debug, Default)]
pub struct AdvisoryEngine {
    interpreter: QueryInterpreter,
    resolver: ConflictResolver,
    synthesizer: AdvisorySynthesizer,
    settings: EngineSettings,
}

impl AdvisoryEngine {
    pub fn new(
        settings: EngineSettings,
        resolver: ConflictResolver,
        synthesizer: AdvisorySynthesizer,
    ) -> Self {
        Self { interpreter: QueryInterpreter::new(), resolver, synthesizer, settings }
    }

    /// Builds an engine from loaded configuration, reading the calendar file if one is set.
    pub fn from_config(config: &AppConfig) -> Result<Self, ApplicationError> {
        let calendar = CalendarTable::from_optional_path(config.advisory.calendar_path.as_deref())?;
        Ok(Self::new(
            EngineSettings::from(&config.engine),
            ConflictResolver::new(ResolverPolicy::from(&config.resolver)),
            AdvisorySynthesizer::new(SynthesisPolicy::from(&config.advisory), calendar),
        ))
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn calendar(&self) -> &CalendarTable {
        self.synthesizer.calendar()
    }

    pub fn interpret(&self, raw_text: &str, image: Option<ImageHandle>) -> Query {
        self.interpreter.interpret(raw_text, image)
    }

    pub async fn advise(
        &self,
        raw_text: &str,
        image: Option<ImageHandle>,
        now: DateTime<Utc>,
        adapters: &AdapterSet,
    ) -> Advisory {
        let query = self.interpret(raw_text, image);
        self.advise_query(&query, now, adapters).await
    }

    /// Runs the pipeline for an already interpreted query. Never fails.
    pub async fn advise_query(
        &self,
        query: &Query,
        now: DateTime<Utc>,
        adapters: &AdapterSet,
    ) -> Advisory {
        let correlation_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let topics: Vec<&str> = query.requested_topics.iter().map(|topic| topic.as_str()).collect();

        info!(
            event_name = "advisory.request.received",
            correlation_id = %correlation_id,
            language = query.detected_language.code(),
            language_confidence = ?query.language_confidence,
            crop = query.crop.map(|crop| crop.as_str()).unwrap_or("unknown"),
            topics = ?topics,
            "advisory request received"
        );

        let CallPlan { mut groups, calls, missing } = plan_calls(query, adapters);
        let (targets, calls): (Vec<usize>, Vec<PendingCall>) = calls.into_iter().unzip();
        let outcomes = self.fan_out(calls, now, &correlation_id).await;

        for (group_index, outcome) in targets.into_iter().zip(outcomes) {
            let group = &mut groups[group_index];
            match outcome {
                Ok(response) => {
                    let source_id = response.source_id.clone();
                    match normalize(response, group.topic, group.key.clone()) {
                        Ok(fact) => group.facts.push(fact),
                        Err(error) => {
                            warn!(
                                event_name = "advisory.fact.rejected",
                                correlation_id = %correlation_id,
                                topic = group.topic.as_str(),
                                source_id = %source_id,
                                error = %error,
                                "adapter payload failed normalization"
                            );
                            group.rejected += 1;
                        }
                    }
                }
                Err(failure) => {
                    warn!(
                        event_name = "advisory.adapter.failed",
                        correlation_id = %correlation_id,
                        topic = group.topic.as_str(),
                        source_id = %failure.source_id,
                        failure_kind = failure.kind.as_str(),
                        detail = %failure.detail,
                        "adapter call failed"
                    );
                    group.failures.push(failure);
                }
            }
        }

        let mut resolutions: Vec<Resolution> = missing.into_iter().map(Err).collect();
        for group in groups {
            let resolution = self.resolver.resolve(group, now);
            if let Err(failure) = &resolution {
                debug!(
                    event_name = "advisory.topic.unresolved",
                    correlation_id = %correlation_id,
                    topic = failure.topic.as_str(),
                    reason = %failure.reason.describe(),
                    "topic could not be resolved"
                );
            }
            resolutions.push(resolution);
        }

        let advisory = self.synthesizer.synthesize(query, resolutions, now);

        info!(
            event_name = "advisory.request.completed",
            correlation_id = %correlation_id,
            items = advisory.items().len(),
            critical = advisory.has_critical(),
            needs_clarification = advisory.needs_clarification(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "advisory ready"
        );

        advisory
    }

    /// Runs every call concurrently and returns results in call order.
    ///
    /// Calls still pending when the total budget runs out are cancelled and
    /// reported as timeouts.
    async fn fan_out(
        &self,
        calls: Vec<PendingCall>,
        now: DateTime<Utc>,
        correlation_id: &str,
    ) -> Vec<AdapterResult> {
        if calls.is_empty() {
            return Vec::new();
        }

        let source_ids: Vec<SourceId> = calls.iter().map(PendingCall::source_id).collect();
        let mut results: Vec<Option<AdapterResult>> = source_ids.iter().map(|_| None).collect();

        let cancel = CancellationToken::new();
        let ctx = FetchContext {
            date: india_time(now).date_naive(),
            retry_budget: self.settings.retry_budget,
            cancel: cancel.clone(),
        };
        let adapter_timeout = self.settings.adapter_timeout;

        let mut tasks = JoinSet::new();
        for (slot, call) in calls.into_iter().enumerate() {
            let ctx = ctx.clone();
            tasks.spawn(async move {
                let source_id = call.source_id();
                let result = tokio::select! {
                    _ = ctx.cancel.cancelled() => Err(AdapterFailure::timeout(
                        source_id,
                        "cancelled when the request budget ran out",
                    )),
                    outcome = tokio::time::timeout(adapter_timeout, call.run(&ctx)) => {
                        outcome.unwrap_or_else(|_| {
                            Err(AdapterFailure::timeout(
                                source_id,
                                format!("no response within {} ms", adapter_timeout.as_millis()),
                            ))
                        })
                    }
                };
                (slot, result)
            });
        }

        let deadline = Instant::now() + self.settings.total_budget;
        let mut budget_expired = false;
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((slot, result)))) => results[slot] = Some(result),
                Ok(Some(Err(join_error))) => {
                    warn!(
                        event_name = "advisory.adapter.aborted",
                        correlation_id = %correlation_id,
                        error = %join_error,
                        "adapter task ended without a result"
                    );
                }
                Ok(None) => break,
                Err(_) => {
                    budget_expired = true;
                    cancel.cancel();
                    tasks.abort_all();
                    warn!(
                        event_name = "advisory.budget.exhausted",
                        correlation_id = %correlation_id,
                        budget_ms = self.settings.total_budget.as_millis() as u64,
                        pending = tasks.len(),
                        "request budget exhausted; pending adapter calls cancelled"
                    );
                    break;
                }
            }
        }

        results
            .into_iter()
            .zip(source_ids)
            .map(|(result, source_id)| match result {
                Some(result) => result,
                None if budget_expired => {
                    Err(AdapterFailure::timeout(source_id, "request budget exhausted"))
                }
                None => Err(AdapterFailure::unavailable(source_id, "adapter task aborted")),
            })
            .collect()
    }
}

fn plan_calls(query: &Query, adapters: &AdapterSet) -> CallPlan {
    let mut plan = CallPlan { groups: Vec::new(), calls: Vec::new(), missing: Vec::new() };

    for topic in query.requested_topics.iter().filter(Topic::needs_adapter) {
        match topic {
            Topic::Weather => {
                let Some(region) = query.region.clone() else {
                    plan.missing.push(missing_key(topic, FactKey::default(), "region"));
                    continue;
                };
                let index = plan.open_group(topic, FactKey::region(region.clone()));
                for source in &adapters.weather {
                    plan.calls.push((index, PendingCall::Weather(source.clone(), region.clone())));
                }
            }
            Topic::Market => {
                let Some(crop) = query.crop else {
                    let key = FactKey { region: query.region.clone(), crop: None };
                    plan.missing.push(missing_key(topic, key, "crop"));
                    continue;
                };
                let index = plan.open_group(topic, FactKey::crop(crop, query.region.clone()));
                for source in &adapters.market {
                    plan.calls.push((
                        index,
                        PendingCall::Market(source.clone(), crop, query.region.clone()),
                    ));
                }
            }
            Topic::Disease => {
                let key = FactKey { region: None, crop: query.crop };
                let Some(image) = query.attached_image.clone() else {
                    plan.missing.push(missing_key(topic, key, "image"));
                    continue;
                };
                let index = plan.open_group(topic, key);
                for classifier in &adapters.disease {
                    plan.calls.push((
                        index,
                        PendingCall::Disease(classifier.clone(), image.clone(), query.crop),
                    ));
                }
            }
            Topic::Calendar => {}
        }
    }

    plan
}

impl CallPlan {
    fn open_group(&mut self, topic: Topic, key: FactKey) -> usize {
        self.groups.push(FactGroup::new(topic, key));
        self.groups.len() - 1
    }
}

fn missing_key(topic: Topic, key: FactKey, field: &str) -> ResolutionFailure {
    ResolutionFailure {
        topic,
        key,
        reason: ResolutionReason::MissingKey { field: field.to_string() },
    }
}
