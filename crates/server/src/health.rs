use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use krishi_core::{AdapterSet, Topic};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AdapterCounts {
    pub weather: usize,
    pub market: usize,
    pub disease: usize,
}

impl From<&AdapterSet> for AdapterCounts {
    fn from(adapters: &AdapterSet) -> Self {
        Self {
            weather: adapters.count(Topic::Weather),
            market: adapters.count(Topic::Market),
            disease: adapters.count(Topic::Disease),
        }
    }
}

#[derive(Clone)]
pub struct HealthState {
    adapters: AdapterCounts,
    calendar_crops: usize,
}

impl HealthState {
    pub fn new(adapters: AdapterCounts, calendar_crops: usize) -> Self {
        Self { adapters, calendar_crops }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub adapters: AdapterCounts,
    pub calendar: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// Ready when at least one live data source is configured; the calendar alone
/// still answers, so the service degrades instead of failing.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let counts = &state.adapters;
    let ready = counts.weather + counts.market + counts.disease > 0;

    let calendar = if state.calendar_crops > 0 {
        HealthCheck {
            status: "ready",
            detail: format!("{} crops in rule table", state.calendar_crops),
        }
    } else {
        HealthCheck { status: "degraded", detail: "calendar rule table is empty".to_string() }
    };

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "krishi-server advisory engine initialized".to_string(),
        },
        adapters: state.adapters.clone(),
        calendar,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};

    use crate::health::{health, AdapterCounts, HealthState};

    #[tokio::test]
    async fn health_returns_ready_with_configured_sources() {
        let state =
            HealthState::new(AdapterCounts { weather: 1, market: 1, disease: 0 }, 6);

        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.adapters.market, 1);
        assert_eq!(payload.calendar.detail, "6 crops in rule table");
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_without_sources() {
        let state = HealthState::new(AdapterCounts { weather: 0, market: 0, disease: 0 }, 6);

        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }
}
