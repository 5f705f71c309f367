use chrono::Utc;
use krishi_core::calendar::CalendarTable;
use krishi_core::config::{AppConfig, LlmProvider, LoadOptions};
use krishi_core::{AdapterSet, AdvisoryEngine};
use serde::Serialize;

use super::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const SMOKE_QUERY: &str = "Bihar mein dhan ka bhav aur mausam";

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\
                 \"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_calendar_table(&config));
            checks.push(check_llm_readiness(&config));
            checks.push(check_engine_pipeline(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["calendar_table", "llm_readiness", "engine_pipeline"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_calendar_table(config: &AppConfig) -> DoctorCheck {
    let source = config
        .advisory
        .calendar_path
        .as_ref()
        .map(|path| format!("`{}`", path.display()))
        .unwrap_or_else(|| "builtin table".to_string());

    match CalendarTable::from_optional_path(config.advisory.calendar_path.as_deref()) {
        Ok(table) => DoctorCheck {
            name: "calendar_table",
            status: CheckStatus::Pass,
            details: format!("{} crops loaded from {source}", table.crops().count()),
        },
        Err(error) => {
            DoctorCheck {
                name: "calendar_table",
                status: CheckStatus::Fail,
                details: error.to_string(),
            }
        }
    }
}

fn check_llm_readiness(config: &AppConfig) -> DoctorCheck {
    if !config.llm.enabled {
        return DoctorCheck {
            name: "llm_readiness",
            status: CheckStatus::Skipped,
            details: "llm disabled; disease photos and translation are unavailable".to_string(),
        };
    }

    let endpoint = config.llm.base_url.as_deref().unwrap_or("<unset>");
    let details = match config.llm.provider {
        LlmProvider::OpenAi => format!("openai model `{}` via {endpoint}", config.llm.model),
        LlmProvider::Ollama => format!("ollama model `{}` via {endpoint}", config.llm.model),
    };
    DoctorCheck { name: "llm_readiness", status: CheckStatus::Pass, details }
}

/// Runs one advisory with no adapters; the calendar topic must still answer.
fn check_engine_pipeline(config: &AppConfig) -> DoctorCheck {
    let engine = match AdvisoryEngine::from_config(config) {
        Ok(engine) => engine,
        Err(error) => {
            return DoctorCheck {
                name: "engine_pipeline",
                status: CheckStatus::Fail,
                details: error.to_string(),
            };
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "engine_pipeline",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let advisory =
        runtime.block_on(engine.advise(SMOKE_QUERY, None, Utc::now(), &AdapterSet::new()));
    let unavailable = advisory.items().iter().filter(|item| item.is_unavailable()).count();

    DoctorCheck {
        name: "engine_pipeline",
        status: if advisory.items().is_empty() { CheckStatus::Fail } else { CheckStatus::Pass },
        details: format!(
            "{} items produced offline ({unavailable} awaiting live data sources)",
            advisory.items().len()
        ),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
