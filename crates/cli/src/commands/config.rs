use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use krishi_core::config::{AppConfig, LoadOptions};
use toml::Value;

use super::CommandResult;

/// One reported setting: dotted key, env override, rendered value.
struct Field {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

fn field(key: &'static str, env_keys: &'static [&'static str], value: impl Into<String>) -> Field {
    Field { key, env_keys, value: value.into() }
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let llm_api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };
    let calendar_path = config
        .advisory
        .calendar_path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<builtin>".to_string());

    vec![
        field(
            "engine.total_budget_ms",
            &["KRISHI_ENGINE_TOTAL_BUDGET_MS"],
            config.engine.total_budget_ms.to_string(),
        ),
        field(
            "engine.adapter_timeout_ms",
            &["KRISHI_ENGINE_ADAPTER_TIMEOUT_MS"],
            config.engine.adapter_timeout_ms.to_string(),
        ),
        field(
            "engine.retry_budget",
            &["KRISHI_ENGINE_RETRY_BUDGET"],
            config.engine.retry_budget.to_string(),
        ),
        field(
            "resolver.weather_max_age_hours",
            &["KRISHI_RESOLVER_WEATHER_MAX_AGE_HOURS"],
            config.resolver.weather_max_age_hours.to_string(),
        ),
        field(
            "resolver.market_max_age_hours",
            &["KRISHI_RESOLVER_MARKET_MAX_AGE_HOURS"],
            config.resolver.market_max_age_hours.to_string(),
        ),
        field(
            "resolver.temperature_tolerance_c",
            &["KRISHI_RESOLVER_TEMPERATURE_TOLERANCE_C"],
            config.resolver.temperature_tolerance_c.to_string(),
        ),
        field(
            "resolver.precip_tolerance_mm",
            &["KRISHI_RESOLVER_PRECIP_TOLERANCE_MM"],
            config.resolver.precip_tolerance_mm.to_string(),
        ),
        field(
            "resolver.price_tolerance_pct",
            &["KRISHI_RESOLVER_PRICE_TOLERANCE_PCT"],
            config.resolver.price_tolerance_pct.to_string(),
        ),
        field(
            "advisory.disease_critical_severity",
            &["KRISHI_ADVISORY_DISEASE_CRITICAL_SEVERITY"],
            config.advisory.disease_critical_severity.to_string(),
        ),
        field(
            "advisory.heavy_rain_mm",
            &["KRISHI_ADVISORY_HEAVY_RAIN_MM"],
            config.advisory.heavy_rain_mm.to_string(),
        ),
        field(
            "advisory.extreme_heat_c",
            &["KRISHI_ADVISORY_EXTREME_HEAT_C"],
            config.advisory.extreme_heat_c.to_string(),
        ),
        field("advisory.calendar_path", &["KRISHI_ADVISORY_CALENDAR_PATH"], calendar_path),
        field("weather.enabled", &["KRISHI_WEATHER_ENABLED"], config.weather.enabled.to_string()),
        field(
            "weather.open_meteo_base_url",
            &["KRISHI_WEATHER_OPEN_METEO_BASE_URL"],
            config.weather.open_meteo_base_url.clone(),
        ),
        field("llm.enabled", &["KRISHI_LLM_ENABLED"], config.llm.enabled.to_string()),
        field("llm.provider", &["KRISHI_LLM_PROVIDER"], format!("{:?}", config.llm.provider)),
        field("llm.model", &["KRISHI_LLM_MODEL"], config.llm.model.clone()),
        field(
            "llm.base_url",
            &["KRISHI_LLM_BASE_URL"],
            config.llm.base_url.as_deref().unwrap_or("<unset>"),
        ),
        field("llm.api_key", &["KRISHI_LLM_API_KEY"], llm_api_key),
        field(
            "llm.timeout_secs",
            &["KRISHI_LLM_TIMEOUT_SECS"],
            config.llm.timeout_secs.to_string(),
        ),
        field(
            "server.bind_address",
            &["KRISHI_SERVER_BIND_ADDRESS"],
            config.server.bind_address.clone(),
        ),
        field("server.port", &["KRISHI_SERVER_PORT"], config.server.port.to_string()),
        field(
            "server.graceful_shutdown_secs",
            &["KRISHI_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            config.server.graceful_shutdown_secs.to_string(),
        ),
        field(
            "logging.level",
            &["KRISHI_LOGGING_LEVEL", "KRISHI_LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        field(
            "logging.format",
            &["KRISHI_LOGGING_FORMAT", "KRISHI_LOG_FORMAT"],
            format!("{:?}", config.logging.format),
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    ["krishi.toml", "config/krishi.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
