use chrono::{Datelike, Utc};
use krishi_core::calendar::{india_time, CalendarTable, CalendarWindow};
use krishi_core::config::{AppConfig, LoadOptions};
use krishi_core::{Crop, Region};
use rust_decimal::Decimal;
use serde::Serialize;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct CalendarReport {
    #[serde(flatten)]
    window: CalendarWindow,
    hindi_name: String,
    state: Option<String>,
    average_yield_quintals_per_acre: Decimal,
    common_diseases: Vec<String>,
}

pub fn run(crop: &str, month: Option<u32>, state: Option<&str>) -> CommandResult {
    let crop = match crop.parse::<Crop>() {
        Ok(crop) => crop,
        Err(message) => return CommandResult::failure("calendar", "invalid_argument", message, 2),
    };

    let month = month.unwrap_or_else(|| india_time(Utc::now()).month());
    if !(1..=12).contains(&month) {
        return CommandResult::failure(
            "calendar",
            "invalid_argument",
            format!("month must be between 1 and 12, got {month}"),
            2,
        );
    }

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("calendar", "config_validation", error.to_string(), 2);
        }
    };
    let table = match CalendarTable::from_optional_path(config.advisory.calendar_path.as_deref()) {
        Ok(table) => table,
        Err(error) => {
            return CommandResult::failure("calendar", "calendar_load", error.to_string(), 1);
        }
    };

    let region = state.map(|state| Region::state(state.trim()));
    let (Some(window), Some(profile)) =
        (table.window(crop, region.as_ref(), month), table.profile(crop))
    else {
        return CommandResult::failure(
            "calendar",
            "not_found",
            format!("crop `{crop}` is not in the calendar table"),
            1,
        );
    };

    let report = CalendarReport {
        window,
        hindi_name: profile.hindi_name.clone(),
        state: region.map(|region| region.state),
        average_yield_quintals_per_acre: profile.average_yield_quintals_per_acre,
        common_diseases: profile.common_diseases.clone(),
    };
    CommandResult::json("calendar", &report)
}
