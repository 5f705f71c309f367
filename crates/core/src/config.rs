use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub resolver: ResolverConfig,
    pub advisory: AdvisoryConfig,
    pub weather: WeatherConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub total_budget_ms: u64,
    pub adapter_timeout_ms: u64,
    pub retry_budget: u32,
}

#[derive(Clone, Debug)]
pub struct ResolverConfig {
    pub weather_max_age_hours: u32,
    pub market_max_age_hours: u32,
    pub temperature_tolerance_c: f64,
    pub precip_tolerance_mm: f64,
    pub price_tolerance_pct: f64,
}

#[derive(Clone, Debug)]
pub struct AdvisoryConfig {
    pub disease_critical_severity: f64,
    pub heavy_rain_mm: f64,
    pub extreme_heat_c: f64,
    pub calendar_path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct WeatherConfig {
    pub enabled: bool,
    pub open_meteo_base_url: String,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub enabled: bool,
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub total_budget_ms: Option<u64>,
    pub adapter_timeout_ms: Option<u64>,
    pub calendar_path: Option<PathBuf>,
    pub weather_enabled: Option<bool>,
    pub llm_enabled: Option<bool>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig {
                total_budget_ms: 4_000,
                adapter_timeout_ms: 2_500,
                retry_budget: 1,
            },
            resolver: ResolverConfig {
                weather_max_age_hours: 6,
                market_max_age_hours: 24,
                temperature_tolerance_c: 1.0,
                precip_tolerance_mm: 5.0,
                price_tolerance_pct: 5.0,
            },
            advisory: AdvisoryConfig {
                disease_critical_severity: 0.7,
                heavy_rain_mm: 50.0,
                extreme_heat_c: 40.0,
                calendar_path: None,
            },
            weather: WeatherConfig {
                enabled: true,
                open_meteo_base_url: "https://api.open-meteo.com/v1".to_string(),
            },
            llm: LlmConfig {
                enabled: false,
                provider: LlmProvider::OpenAi,
                api_key: None,
                base_url: Some("https://api.openai.com/v1".to_string()),
                model: "gpt-4o".to_string(),
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8086,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("krishi.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(engine) = patch.engine {
            if let Some(total_budget_ms) = engine.total_budget_ms {
                self.engine.total_budget_ms = total_budget_ms;
            }
            if let Some(adapter_timeout_ms) = engine.adapter_timeout_ms {
                self.engine.adapter_timeout_ms = adapter_timeout_ms;
            }
            if let Some(retry_budget) = engine.retry_budget {
                self.engine.retry_budget = retry_budget;
            }
        }

        if let Some(resolver) = patch.resolver {
            if let Some(hours) = resolver.weather_max_age_hours {
                self.resolver.weather_max_age_hours = hours;
            }
            if let Some(hours) = resolver.market_max_age_hours {
                self.resolver.market_max_age_hours = hours;
            }
            if let Some(tolerance) = resolver.temperature_tolerance_c {
                self.resolver.temperature_tolerance_c = tolerance;
            }
            if let Some(tolerance) = resolver.precip_tolerance_mm {
                self.resolver.precip_tolerance_mm = tolerance;
            }
            if let Some(tolerance) = resolver.price_tolerance_pct {
                self.resolver.price_tolerance_pct = tolerance;
            }
        }

        if let Some(advisory) = patch.advisory {
            if let Some(severity) = advisory.disease_critical_severity {
                self.advisory.disease_critical_severity = severity;
            }
            if let Some(heavy_rain_mm) = advisory.heavy_rain_mm {
                self.advisory.heavy_rain_mm = heavy_rain_mm;
            }
            if let Some(extreme_heat_c) = advisory.extreme_heat_c {
                self.advisory.extreme_heat_c = extreme_heat_c;
            }
            if let Some(calendar_path) = advisory.calendar_path {
                self.advisory.calendar_path = Some(calendar_path);
            }
        }

        if let Some(weather) = patch.weather {
            if let Some(enabled) = weather.enabled {
                self.weather.enabled = enabled;
            }
            if let Some(base_url) = weather.open_meteo_base_url {
                self.weather.open_meteo_base_url = base_url;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(enabled) = llm.enabled {
                self.llm.enabled = enabled;
            }
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("KRISHI_ENGINE_TOTAL_BUDGET_MS") {
            self.engine.total_budget_ms = parse_u64("KRISHI_ENGINE_TOTAL_BUDGET_MS", &value)?;
        }
        if let Some(value) = read_env("KRISHI_ENGINE_ADAPTER_TIMEOUT_MS") {
            self.engine.adapter_timeout_ms =
                parse_u64("KRISHI_ENGINE_ADAPTER_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read_env("KRISHI_ENGINE_RETRY_BUDGET") {
            self.engine.retry_budget = parse_u32("KRISHI_ENGINE_RETRY_BUDGET", &value)?;
        }

        if let Some(value) = read_env("KRISHI_RESOLVER_WEATHER_MAX_AGE_HOURS") {
            self.resolver.weather_max_age_hours =
                parse_u32("KRISHI_RESOLVER_WEATHER_MAX_AGE_HOURS", &value)?;
        }
        if let Some(value) = read_env("KRISHI_RESOLVER_MARKET_MAX_AGE_HOURS") {
            self.resolver.market_max_age_hours =
                parse_u32("KRISHI_RESOLVER_MARKET_MAX_AGE_HOURS", &value)?;
        }
        if let Some(value) = read_env("KRISHI_RESOLVER_TEMPERATURE_TOLERANCE_C") {
            self.resolver.temperature_tolerance_c =
                parse_f64("KRISHI_RESOLVER_TEMPERATURE_TOLERANCE_C", &value)?;
        }
        if let Some(value) = read_env("KRISHI_RESOLVER_PRECIP_TOLERANCE_MM") {
            self.resolver.precip_tolerance_mm =
                parse_f64("KRISHI_RESOLVER_PRECIP_TOLERANCE_MM", &value)?;
        }
        if let Some(value) = read_env("KRISHI_RESOLVER_PRICE_TOLERANCE_PCT") {
            self.resolver.price_tolerance_pct =
                parse_f64("KRISHI_RESOLVER_PRICE_TOLERANCE_PCT", &value)?;
        }

        if let Some(value) = read_env("KRISHI_ADVISORY_DISEASE_CRITICAL_SEVERITY") {
            self.advisory.disease_critical_severity =
                parse_f64("KRISHI_ADVISORY_DISEASE_CRITICAL_SEVERITY", &value)?;
        }
        if let Some(value) = read_env("KRISHI_ADVISORY_HEAVY_RAIN_MM") {
            self.advisory.heavy_rain_mm = parse_f64("KRISHI_ADVISORY_HEAVY_RAIN_MM", &value)?;
        }
        if let Some(value) = read_env("KRISHI_ADVISORY_EXTREME_HEAT_C") {
            self.advisory.extreme_heat_c = parse_f64("KRISHI_ADVISORY_EXTREME_HEAT_C", &value)?;
        }
        if let Some(value) = read_env("KRISHI_ADVISORY_CALENDAR_PATH") {
            self.advisory.calendar_path = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("KRISHI_WEATHER_ENABLED") {
            self.weather.enabled = parse_bool("KRISHI_WEATHER_ENABLED", &value)?;
        }
        if let Some(value) = read_env("KRISHI_WEATHER_OPEN_METEO_BASE_URL") {
            self.weather.open_meteo_base_url = value;
        }

        if let Some(value) = read_env("KRISHI_LLM_ENABLED") {
            self.llm.enabled = parse_bool("KRISHI_LLM_ENABLED", &value)?;
        }
        if let Some(value) = read_env("KRISHI_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("KRISHI_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("KRISHI_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("KRISHI_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("KRISHI_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("KRISHI_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("KRISHI_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("KRISHI_SERVER_PORT") {
            self.server.port = parse_u16("KRISHI_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("KRISHI_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("KRISHI_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("KRISHI_LOGGING_LEVEL").or_else(|| read_env("KRISHI_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("KRISHI_LOGGING_FORMAT").or_else(|| read_env("KRISHI_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(total_budget_ms) = overrides.total_budget_ms {
            self.engine.total_budget_ms = total_budget_ms;
        }
        if let Some(adapter_timeout_ms) = overrides.adapter_timeout_ms {
            self.engine.adapter_timeout_ms = adapter_timeout_ms;
        }
        if let Some(calendar_path) = overrides.calendar_path {
            self.advisory.calendar_path = Some(calendar_path);
        }
        if let Some(enabled) = overrides.weather_enabled {
            self.weather.enabled = enabled;
        }
        if let Some(enabled) = overrides.llm_enabled {
            self.llm.enabled = enabled;
        }
        if let Some(provider) = overrides.llm_provider {
            self.llm.provider = provider;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(api_key));
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_engine(&self.engine)?;
        validate_resolver(&self.resolver)?;
        validate_advisory(&self.advisory)?;
        validate_weather(&self.weather)?;
        validate_llm(&self.llm)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("krishi.toml"), PathBuf::from("config/krishi.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_engine(engine: &EngineConfig) -> Result<(), ConfigError> {
    if engine.total_budget_ms == 0 || engine.total_budget_ms > 60_000 {
        return Err(ConfigError::Validation(
            "engine.total_budget_ms must be in range 1..=60000".to_string(),
        ));
    }

    if engine.adapter_timeout_ms == 0 || engine.adapter_timeout_ms > engine.total_budget_ms {
        return Err(ConfigError::Validation(
            "engine.adapter_timeout_ms must be greater than zero and within engine.total_budget_ms"
                .to_string(),
        ));
    }

    if engine.retry_budget > 5 {
        return Err(ConfigError::Validation("engine.retry_budget must be at most 5".to_string()));
    }

    Ok(())
}

fn validate_resolver(resolver: &ResolverConfig) -> Result<(), ConfigError> {
    if resolver.weather_max_age_hours == 0 || resolver.market_max_age_hours == 0 {
        return Err(ConfigError::Validation(
            "resolver staleness windows must be greater than zero hours".to_string(),
        ));
    }

    let tolerances = [
        ("resolver.temperature_tolerance_c", resolver.temperature_tolerance_c),
        ("resolver.precip_tolerance_mm", resolver.precip_tolerance_mm),
        ("resolver.price_tolerance_pct", resolver.price_tolerance_pct),
    ];
    for (key, value) in tolerances {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::Validation(format!(
                "{key} must be a non-negative finite number"
            )));
        }
    }

    if resolver.price_tolerance_pct >= 100.0 {
        return Err(ConfigError::Validation(
            "resolver.price_tolerance_pct must be below 100".to_string(),
        ));
    }

    Ok(())
}

fn validate_advisory(advisory: &AdvisoryConfig) -> Result<(), ConfigError> {
    let severity = advisory.disease_critical_severity;
    if !severity.is_finite() || severity <= 0.0 || severity > 1.0 {
        return Err(ConfigError::Validation(
            "advisory.disease_critical_severity must be in range (0, 1]".to_string(),
        ));
    }

    if !advisory.heavy_rain_mm.is_finite() || advisory.heavy_rain_mm <= 0.0 {
        return Err(ConfigError::Validation(
            "advisory.heavy_rain_mm must be greater than zero".to_string(),
        ));
    }

    if !advisory.extreme_heat_c.is_finite() {
        return Err(ConfigError::Validation(
            "advisory.extreme_heat_c must be a finite number".to_string(),
        ));
    }

    Ok(())
}

fn validate_weather(weather: &WeatherConfig) -> Result<(), ConfigError> {
    let url = weather.open_meteo_base_url.trim();
    if weather.enabled && !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "weather.open_meteo_base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !llm.enabled {
        return Ok(());
    }

    match llm.provider {
        LlmProvider::OpenAi => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required when the openai provider is enabled".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for ollama provider".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    engine: Option<EnginePatch>,
    resolver: Option<ResolverPatch>,
    advisory: Option<AdvisoryPatch>,
    weather: Option<WeatherPatch>,
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct EnginePatch {
    total_budget_ms: Option<u64>,
    adapter_timeout_ms: Option<u64>,
    retry_budget: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ResolverPatch {
    weather_max_age_hours: Option<u32>,
    market_max_age_hours: Option<u32>,
    temperature_tolerance_c: Option<f64>,
    precip_tolerance_mm: Option<f64>,
    price_tolerance_pct: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct AdvisoryPatch {
    disease_critical_severity: Option<f64>,
    heavy_rain_mm: Option<f64>,
    extreme_heat_c: Option<f64>,
    calendar_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct WeatherPatch {
    enabled: Option<bool>,
    open_meteo_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    enabled: Option<bool>,
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_match_documented_thresholds() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.resolver.weather_max_age_hours == 6, "weather window should be 6h")?;
        ensure(config.resolver.market_max_age_hours == 24, "market window should be 24h")?;
        ensure(config.resolver.price_tolerance_pct == 5.0, "price tolerance should be 5%")?;
        ensure(!config.llm.enabled, "llm should be disabled by default")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_KRISHI_LLM_KEY", "sk-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("krishi.toml");
            fs::write(
                &path,
                r#"
[llm]
enabled = true
provider = "open_ai"
api_key = "${TEST_KRISHI_LLM_KEY}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            let key = config.llm.api_key.as_ref().map(|key| key.expose_secret().to_string());
            ensure(key.as_deref() == Some("sk-from-env"), "api key should come from env")
        })();

        clear_vars(&["TEST_KRISHI_LLM_KEY"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("KRISHI_ENGINE_TOTAL_BUDGET_MS", "5000");
        env::set_var("KRISHI_LOG_LEVEL", "warn");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("krishi.toml");
            fs::write(
                &path,
                r#"
[engine]
total_budget_ms = 3000
adapter_timeout_ms = 1500

[advisory]
heavy_rain_mm = 64.5

[logging]
level = "error"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.engine.total_budget_ms == 5000, "env budget should win over file")?;
            ensure(config.engine.adapter_timeout_ms == 1500, "file timeout should apply")?;
            ensure(config.advisory.heavy_rain_mm == 64.5, "file rain threshold should apply")?;
            ensure(config.logging.level == "debug", "override log level should win")
        })();

        clear_vars(&["KRISHI_ENGINE_TOTAL_BUDGET_MS", "KRISHI_LOG_LEVEL"]);
        result
    }

    #[test]
    fn env_overrides_cover_weather_tolerances_and_heat_threshold() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("KRISHI_RESOLVER_TEMPERATURE_TOLERANCE_C", "2.5");
        env::set_var("KRISHI_RESOLVER_PRECIP_TOLERANCE_MM", "12");
        env::set_var("KRISHI_ADVISORY_EXTREME_HEAT_C", "42.5");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.resolver.temperature_tolerance_c == 2.5, "temperature tolerance")?;
            ensure(config.resolver.precip_tolerance_mm == 12.0, "precip tolerance")?;
            ensure(config.advisory.extreme_heat_c == 42.5, "extreme heat threshold")
        })();

        clear_vars(&[
            "KRISHI_RESOLVER_TEMPERATURE_TOLERANCE_C",
            "KRISHI_RESOLVER_PRECIP_TOLERANCE_MM",
            "KRISHI_ADVISORY_EXTREME_HEAT_C",
        ]);
        result
    }

    #[test]
    fn unparseable_heat_threshold_names_the_variable() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("KRISHI_ADVISORY_EXTREME_HEAT_C", "scorching");
        let result = AppConfig::load(LoadOptions::default());
        clear_vars(&["KRISHI_ADVISORY_EXTREME_HEAT_C"]);

        ensure(
            matches!(
                result,
                Err(ConfigError::InvalidEnvOverride { ref key, .. })
                    if key == "KRISHI_ADVISORY_EXTREME_HEAT_C"
            ),
            "bad heat threshold should be reported against its env key",
        )
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let error = match AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                total_budget_ms: Some(1_000),
                adapter_timeout_ms: Some(2_000),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }) {
            Ok(_) => {
                return Err("expected validation failure but config load succeeded".to_string())
            }
            Err(error) => error,
        };

        ensure(
            matches!(
                error,
                ConfigError::Validation(ref message)
                    if message.contains("engine.adapter_timeout_ms")
            ),
            "validation failure should mention engine.adapter_timeout_ms",
        )
    }

    #[test]
    fn enabled_openai_requires_api_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides { llm_enabled: Some(true), ..ConfigOverrides::default() },
            ..LoadOptions::default()
        });

        ensure(
            matches!(
                result,
                Err(ConfigError::Validation(ref message)) if message.contains("llm.api_key")
            ),
            "enabled openai provider without key should fail validation",
        )
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                llm_enabled: Some(true),
                llm_api_key: Some("sk-secret-value".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .map_err(|err| format!("config load failed: {err}"))?;
        let debug = format!("{config:?}");

        ensure(!debug.contains("sk-secret-value"), "debug output should not contain api key")
    }
}
