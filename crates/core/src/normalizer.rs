use rust_decimal::Decimal;
use thiserror::Error;

use crate::adapters::{
    AdapterResponse, PrecipUnit, PriceUnit, RawDiagnosis, RawMarket, RawPayload, RawSeverity,
    RawWeather, TemperatureUnit,
};
use crate::domain::fact::{
    DiseaseFinding, FactKey, FactValue, MarketPrice, PriceTrend, SourceFact, WeatherReading,
};
use crate::domain::query::Topic;

pub const CURRENCY_INR: &str = "INR";

const MILD_SEVERITY: f64 = 0.3;
const MODERATE_SEVERITY: f64 = 0.6;
const SEVERE_SEVERITY: f64 = 0.9;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum NormalizationError {
    #[error("payload for `{found}` was returned for a `{expected}` request")]
    TopicMismatch { expected: Topic, found: Topic },
    #[error("mandatory field `{0}` is missing")]
    MissingField(&'static str),
    #[error("field `{field}` is invalid: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f64),
    #[error("unsupported currency `{0}`")]
    UnsupportedCurrency(String),
    #[error("unknown severity label `{0}`")]
    UnknownSeverity(String),
}

/// Converts one raw adapter response into a typed fact for `(topic, key)`.
pub fn normalize(
    response: AdapterResponse,
    topic: Topic,
    key: FactKey,
) -> Result<SourceFact, NormalizationError> {
    let found = response.payload.topic();
    if found != topic {
        return Err(NormalizationError::TopicMismatch { expected: topic, found });
    }

    if !response.confidence.is_finite() || !(0.0..=1.0).contains(&response.confidence) {
        return Err(NormalizationError::ConfidenceOutOfRange(response.confidence));
    }

    let observed_at = response.observed_at.ok_or(NormalizationError::MissingField("observed_at"))?;

    let value = match response.payload {
        RawPayload::Weather(raw) => FactValue::Weather(normalize_weather(raw)?),
        RawPayload::Market(raw) => FactValue::Market(normalize_market(raw)?),
        RawPayload::Disease(raw) => FactValue::Disease(normalize_diagnosis(raw)?),
    };

    Ok(SourceFact {
        topic,
        key,
        source_id: response.source_id,
        value,
        observed_at,
        confidence: response.confidence,
    })
}

fn normalize_weather(raw: RawWeather) -> Result<WeatherReading, NormalizationError> {
    let temperature = finite("temperature", raw.temperature)?;
    let temperature_c = match raw.temperature_unit {
        TemperatureUnit::Celsius => temperature,
        TemperatureUnit::Fahrenheit => (temperature - 32.0) * 5.0 / 9.0,
        TemperatureUnit::Kelvin => {
            if temperature < 0.0 {
                return Err(NormalizationError::InvalidValue {
                    field: "temperature",
                    reason: "kelvin reading below absolute zero".to_string(),
                });
            }
            temperature - 273.15
        }
    };

    let precipitation = finite("precipitation", raw.precipitation)?;
    if precipitation < 0.0 {
        return Err(NormalizationError::InvalidValue {
            field: "precipitation",
            reason: "negative precipitation".to_string(),
        });
    }
    let precip_mm = match raw.precipitation_unit {
        PrecipUnit::Millimetre => precipitation,
        PrecipUnit::Centimetre => precipitation * 10.0,
        PrecipUnit::Inch => precipitation * 25.4,
    };

    let condition = raw
        .condition
        .map(|condition| condition.trim().to_string())
        .filter(|condition| !condition.is_empty())
        .ok_or(NormalizationError::MissingField("condition"))?;

    let humidity_pct = match raw.humidity_pct {
        Some(humidity) if !humidity.is_finite() || !(0.0..=100.0).contains(&humidity) => {
            return Err(NormalizationError::InvalidValue {
                field: "humidity_pct",
                reason: format!("{humidity} is outside 0..=100"),
            });
        }
        other => other,
    };

    Ok(WeatherReading { temperature_c, precip_mm, condition, humidity_pct })
}

fn normalize_market(raw: RawMarket) -> Result<MarketPrice, NormalizationError> {
    let price = raw.price.ok_or(NormalizationError::MissingField("price"))?;
    if price <= Decimal::ZERO {
        return Err(NormalizationError::InvalidValue {
            field: "price",
            reason: "price must be positive".to_string(),
        });
    }

    let currency = raw.currency.ok_or(NormalizationError::MissingField("currency"))?;
    if !is_rupee(&currency) {
        return Err(NormalizationError::UnsupportedCurrency(currency));
    }

    let per_quintal = match raw.unit {
        PriceUnit::Quintal => Some(price),
        PriceUnit::Kilogram => price.checked_mul(Decimal::ONE_HUNDRED),
        PriceUnit::Tonne => price.checked_div(Decimal::TEN),
    }
    .ok_or_else(|| NormalizationError::InvalidValue {
        field: "price",
        reason: "price is out of range".to_string(),
    })?;

    let trend = raw
        .trend
        .map(|label| label.parse::<PriceTrend>())
        .transpose()
        .map_err(|reason| NormalizationError::InvalidValue { field: "trend", reason })?;

    let mut markets: Vec<String> = raw
        .markets
        .into_iter()
        .map(|market| market.trim().to_string())
        .filter(|market| !market.is_empty())
        .collect();
    markets.sort();
    markets.dedup();

    Ok(MarketPrice {
        price_per_quintal: per_quintal.round_dp(2),
        currency: CURRENCY_INR.to_string(),
        trend,
        markets,
    })
}

fn normalize_diagnosis(raw: RawDiagnosis) -> Result<DiseaseFinding, NormalizationError> {
    let disease_name = raw
        .disease_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or(NormalizationError::MissingField("disease_name"))?;

    let severity = match raw.severity.ok_or(NormalizationError::MissingField("severity"))? {
        RawSeverity::Score(score) => severity_from_score(score)?,
        RawSeverity::Label(label) => severity_from_label(&label)?,
    };

    Ok(DiseaseFinding { disease_name, severity })
}

/// Scores in (1, 100] are read as percentages.
fn severity_from_score(score: f64) -> Result<f64, NormalizationError> {
    if score.is_finite() && (0.0..=1.0).contains(&score) {
        return Ok(score);
    }
    if score.is_finite() && score > 1.0 && score <= 100.0 {
        return Ok(score / 100.0);
    }
    Err(NormalizationError::InvalidValue {
        field: "severity",
        reason: format!("{score} is neither a fraction nor a percentage"),
    })
}

fn severity_from_label(label: &str) -> Result<f64, NormalizationError> {
    match label.trim().to_ascii_lowercase().as_str() {
        "mild" | "low" => Ok(MILD_SEVERITY),
        "moderate" | "medium" => Ok(MODERATE_SEVERITY),
        "severe" | "high" => Ok(SEVERE_SEVERITY),
        _ => match label.trim().parse::<f64>() {
            Ok(score) => severity_from_score(score),
            Err(_) => Err(NormalizationError::UnknownSeverity(label.to_string())),
        },
    }
}

fn is_rupee(currency: &str) -> bool {
    let trimmed = currency.trim();
    trimmed == "₹"
        || matches!(trimmed.to_ascii_lowercase().as_str(), "inr" | "rs" | "rs." | "rupees")
}

fn finite(field: &'static str, value: Option<f64>) -> Result<f64, NormalizationError> {
    let value = value.ok_or(NormalizationError::MissingField(field))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(NormalizationError::InvalidValue { field, reason: "value is not finite".to_string() })
    }
}
