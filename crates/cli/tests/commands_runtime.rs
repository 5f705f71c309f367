use std::env;
use std::sync::{Mutex, OnceLock};

use krishi_cli::commands::{calendar, config, doctor, interpret};
use serde_json::Value;

#[test]
fn config_attributes_env_overrides_and_redacts_api_key() {
    with_env(
        &[
            ("KRISHI_ENGINE_TOTAL_BUDGET_MS", "5000"),
            ("KRISHI_LLM_ENABLED", "true"),
            ("KRISHI_LLM_API_KEY", "sk-very-secret"),
        ],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0);
            assert!(result.output.contains(
                "- engine.total_budget_ms = 5000 (source: env (KRISHI_ENGINE_TOTAL_BUDGET_MS))"
            ));
            assert!(result.output.contains("- engine.retry_budget = 1 (source: default)"));
            assert!(result
                .output
                .contains("- llm.api_key = <redacted> (source: env (KRISHI_LLM_API_KEY))"));
            assert!(!result.output.contains("sk-very-secret"));
        },
    );
}

#[test]
fn config_attributes_weather_tolerance_overrides() {
    with_env(
        &[
            ("KRISHI_RESOLVER_PRECIP_TOLERANCE_MM", "8"),
            ("KRISHI_ADVISORY_EXTREME_HEAT_C", "43"),
        ],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);
            let precip = "- resolver.precip_tolerance_mm = 8 \
                          (source: env (KRISHI_RESOLVER_PRECIP_TOLERANCE_MM))";
            assert!(result.output.contains(precip), "missing line in: {}", result.output);
            assert!(result.output.contains(
                "- advisory.extreme_heat_c = 43 (source: env (KRISHI_ADVISORY_EXTREME_HEAT_C))"
            ));
            assert!(result
                .output
                .contains("- resolver.temperature_tolerance_c = 1 (source: default)"));
        },
    );
}

#[test]
fn config_reports_validation_failure_as_structured_error() {
    with_env(&[("KRISHI_ENGINE_TOTAL_BUDGET_MS", "soon")], || {
        let result = config::run();
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn doctor_json_passes_with_default_config() {
    with_env(&[], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0, "unexpected report: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
        let checks = payload["checks"].as_array().expect("checks array");
        let names: Vec<&str> = checks.iter().filter_map(|check| check["name"].as_str()).collect();
        assert_eq!(
            names,
            vec!["config_validation", "calendar_table", "llm_readiness", "engine_pipeline"]
        );
        assert_eq!(checks[2]["status"], "skipped");
        assert_eq!(checks[3]["status"], "pass");
    });
}

#[test]
fn doctor_fails_when_llm_is_enabled_without_a_key() {
    with_env(&[("KRISHI_LLM_ENABLED", "true")], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 1);
        assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
        assert!(result.output.contains("- [fail] config_validation: "));
        assert!(result.output.contains("- [skip] engine_pipeline: "));
    });
}

#[test]
fn interpret_prints_the_parsed_query() {
    let result = interpret::run("Bihar mein dhan ka bhav aur mausam", None);
    assert_eq!(result.exit_code, 0);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["crop"], "rice");
    assert_eq!(payload["region"]["state"], "Bihar");
    assert_eq!(payload["attached_image"], Value::Null);
}

#[test]
fn interpret_rejects_an_empty_message_without_image() {
    let result = interpret::run("   ", None);
    assert_eq!(result.exit_code, 2);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "interpret");
    assert_eq!(payload["error_class"], "invalid_argument");
}

#[test]
fn calendar_reports_planting_window_for_state() {
    with_env(&[], || {
        let result = calendar::run("rice", Some(7), Some("bihar"));
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["crop"], "rice");
        assert_eq!(payload["month"], 7);
        assert_eq!(payload["plant_now"], true);
        assert_eq!(payload["region_suitable"], true);
        assert_eq!(payload["hindi_name"], "धान/चावल");
    });
}

#[test]
fn calendar_points_to_next_planting_month_out_of_season() {
    with_env(&[], || {
        let result = calendar::run("Wheat", Some(7), Some("Punjab"));
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["plant_now"], false);
        assert_eq!(payload["next_planting_month"], 11);
    });
}

#[test]
fn calendar_rejects_unknown_crop_and_bad_month() {
    let unknown = calendar::run("mango", Some(7), None);
    assert_eq!(unknown.exit_code, 2);
    assert_eq!(parse_payload(&unknown.output)["error_class"], "invalid_argument");

    let bad_month = calendar::run("rice", Some(13), None);
    assert_eq!(bad_month.exit_code, 2);
    assert!(parse_payload(&bad_month.output)["message"]
        .as_str()
        .is_some_and(|message| message.contains("between 1 and 12")));
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid json")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "KRISHI_ENGINE_TOTAL_BUDGET_MS",
        "KRISHI_ENGINE_ADAPTER_TIMEOUT_MS",
        "KRISHI_ENGINE_RETRY_BUDGET",
        "KRISHI_RESOLVER_WEATHER_MAX_AGE_HOURS",
        "KRISHI_RESOLVER_MARKET_MAX_AGE_HOURS",
        "KRISHI_RESOLVER_TEMPERATURE_TOLERANCE_C",
        "KRISHI_RESOLVER_PRECIP_TOLERANCE_MM",
        "KRISHI_RESOLVER_PRICE_TOLERANCE_PCT",
        "KRISHI_ADVISORY_DISEASE_CRITICAL_SEVERITY",
        "KRISHI_ADVISORY_HEAVY_RAIN_MM",
        "KRISHI_ADVISORY_EXTREME_HEAT_C",
        "KRISHI_ADVISORY_CALENDAR_PATH",
        "KRISHI_WEATHER_ENABLED",
        "KRISHI_WEATHER_OPEN_METEO_BASE_URL",
        "KRISHI_LLM_ENABLED",
        "KRISHI_LLM_PROVIDER",
        "KRISHI_LLM_API_KEY",
        "KRISHI_LLM_BASE_URL",
        "KRISHI_LLM_MODEL",
        "KRISHI_LLM_TIMEOUT_SECS",
        "KRISHI_SERVER_BIND_ADDRESS",
        "KRISHI_SERVER_PORT",
        "KRISHI_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "KRISHI_LOGGING_LEVEL",
        "KRISHI_LOGGING_FORMAT",
        "KRISHI_LOG_LEVEL",
        "KRISHI_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
