//! Static crop calendar: when each crop is sown and harvested, and where it grows.
//!
//! The table is configuration. A built-in copy ships with the engine and a TOML
//! file can replace it (`advisory.calendar_path`).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Offset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::query::{Crop, Region};
use crate::errors::{ApplicationError, DomainError};

/// India Standard Time, UTC+05:30.
const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// `now` on the farmer's wall clock. Calendar months and adapter dates use this.
pub fn india_time(now: DateTime<Utc>) -> DateTime<FixedOffset> {
    let offset = FixedOffset::east_opt(IST_OFFSET_SECS).unwrap_or_else(|| Utc.fix());
    now.with_timezone(&offset)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Kharif,
    Rabi,
    Zaid,
    Annual,
}

impl Season {
    /// Kharif runs June to September, Rabi October to March, Zaid April and May.
    pub fn of_month(month: u32) -> Self {
        match month {
            6..=9 => Self::Kharif,
            4 | 5 => Self::Zaid,
            _ => Self::Rabi,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kharif => "kharif",
            Self::Rabi => "rabi",
            Self::Zaid => "zaid",
            Self::Annual => "annual",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Kharif => "Kharif (monsoon)",
            Self::Rabi => "Rabi (winter)",
            Self::Zaid => "Zaid (summer)",
            Self::Annual => "Annual",
        }
    }
}

/// Sowing and harvest months that apply to one state instead of the defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionalWindow {
    pub state: String,
    pub planting_months: Vec<u32>,
    pub harvesting_months: Vec<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropProfile {
    pub hindi_name: String,
    pub seasons: Vec<Season>,
    pub planting_months: Vec<u32>,
    pub harvesting_months: Vec<u32>,
    pub suitable_states: Vec<String>,
    pub average_yield_quintals_per_acre: Decimal,
    #[serde(default)]
    pub common_diseases: Vec<String>,
    #[serde(default)]
    pub regional: Vec<RegionalWindow>,
}

impl CropProfile {
    fn window_for(&self, region: Option<&Region>) -> (&[u32], &[u32]) {
        let regional = region.and_then(|region| {
            self.regional.iter().find(|window| window.state.eq_ignore_ascii_case(&region.state))
        });
        match regional {
            Some(window) => (&window.planting_months, &window.harvesting_months),
            None => (&self.planting_months, &self.harvesting_months),
        }
    }

    pub fn suits_state(&self, state: &str) -> bool {
        self.suitable_states.iter().any(|suitable| suitable.eq_ignore_ascii_case(state))
    }
}

/// What the calendar says about one crop in one month.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarWindow {
    pub crop: Crop,
    pub month: u32,
    pub season: Season,
    pub plant_now: bool,
    pub harvest_now: bool,
    /// First planting month after `month`, when planting is not due now.
    pub next_planting_month: Option<u32>,
    /// `None` when no region was given.
    pub region_suitable: Option<bool>,
}

#[derive(Debug, Error)]
pub enum CalendarLoadError {
    #[error("could not read calendar file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse calendar file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Rule(#[from] DomainError),
}

impl From<CalendarLoadError> for ApplicationError {
    fn from(value: CalendarLoadError) -> Self {
        match value {
            CalendarLoadError::Rule(error) => Self::Domain(error),
            other => Self::Configuration(other.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CalendarTable {
    profiles: BTreeMap<Crop, CropProfile>,
}

#[derive(Debug, Deserialize)]
struct CalendarFile {
    crops: BTreeMap<String, CropProfile>,
}

impl CalendarTable {
    pub fn new(profiles: BTreeMap<Crop, CropProfile>) -> Result<Self, DomainError> {
        for (crop, profile) in &profiles {
            validate_profile(*crop, profile)?;
        }
        Ok(Self { profiles })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, CalendarLoadError> {
        let file: CalendarFile = toml::from_str(raw)?;
        let mut profiles = BTreeMap::new();
        for (name, profile) in file.crops {
            let crop = name.parse::<Crop>().map_err(|message| DomainError::InvalidCalendarRule {
                crop: name.clone(),
                message,
            })?;
            profiles.insert(crop, profile);
        }
        Ok(Self::new(profiles)?)
    }

    pub fn load(path: &Path) -> Result<Self, CalendarLoadError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| CalendarLoadError::ReadFile { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&raw)
    }

    /// Loads `path` when given, otherwise the built-in table.
    pub fn from_optional_path(path: Option<&Path>) -> Result<Self, CalendarLoadError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::builtin()),
        }
    }

    pub fn profile(&self, crop: Crop) -> Option<&CropProfile> {
        self.profiles.get(&crop)
    }

    pub fn crops(&self) -> impl Iterator<Item = Crop> + '_ {
        self.profiles.keys().copied()
    }

    pub fn window(
        &self,
        crop: Crop,
        region: Option<&Region>,
        month: u32,
    ) -> Option<CalendarWindow> {
        let profile = self.profiles.get(&crop)?;
        let (planting, harvesting) = profile.window_for(region);
        let plant_now = planting.contains(&month);
        let next_planting_month = if plant_now { None } else { next_month_in(planting, month) };

        Some(CalendarWindow {
            crop,
            month,
            season: Season::of_month(month),
            plant_now,
            harvest_now: harvesting.contains(&month),
            next_planting_month,
            region_suitable: region.map(|region| profile.suits_state(&region.state)),
        })
    }

    pub fn builtin() -> Self {
        let profiles = BTreeMap::from([
            (
                Crop::Rice,
                profile(
                    "धान/चावल",
                    &[Season::Kharif],
                    &[6, 7, 8],
                    &[10, 11, 12],
                    &["West Bengal", "Punjab", "Uttar Pradesh", "Andhra Pradesh", "Bihar"],
                    25,
                    &["blast", "brown_spot", "sheath_blight"],
                    vec![RegionalWindow {
                        state: "Punjab".to_string(),
                        planting_months: vec![6, 7],
                        harvesting_months: vec![10, 11],
                    }],
                ),
            ),
            (
                Crop::Wheat,
                profile(
                    "गेहूं",
                    &[Season::Rabi],
                    &[11, 12, 1],
                    &[3, 4, 5],
                    &["Punjab", "Haryana", "Uttar Pradesh", "Madhya Pradesh"],
                    20,
                    &["rust", "smut", "bunt"],
                    Vec::new(),
                ),
            ),
            (
                Crop::Cotton,
                profile(
                    "कपास",
                    &[Season::Kharif],
                    &[5, 6, 7],
                    &[10, 11, 12],
                    &["Gujarat", "Maharashtra", "Karnataka", "Andhra Pradesh"],
                    8,
                    &["bollworm", "leaf_curl", "root_rot"],
                    Vec::new(),
                ),
            ),
            (
                Crop::Sugarcane,
                profile(
                    "गन्ना",
                    &[Season::Annual],
                    &[2, 3, 10, 11],
                    &[12, 1, 2, 3],
                    &["Uttar Pradesh", "Maharashtra", "Karnataka", "Tamil Nadu"],
                    300,
                    &["red_rot", "smut", "wilt"],
                    Vec::new(),
                ),
            ),
            (
                Crop::Tomato,
                profile(
                    "टमाटर",
                    &[Season::Kharif, Season::Rabi],
                    &[6, 7, 11, 12],
                    &[9, 10, 2, 3],
                    &["Karnataka", "Uttar Pradesh", "Bihar", "West Bengal"],
                    150,
                    &["early_blight", "late_blight", "leaf_curl"],
                    Vec::new(),
                ),
            ),
            (
                Crop::Onion,
                profile(
                    "प्याज",
                    &[Season::Rabi, Season::Kharif],
                    &[6, 7, 11, 12],
                    &[10, 11, 3, 4],
                    &["Maharashtra", "Karnataka", "Gujarat", "Uttar Pradesh"],
                    120,
                    &["purple_blotch", "downy_mildew", "basal_rot"],
                    Vec::new(),
                ),
            ),
        ]);
        Self { profiles }
    }
}

#[allow(clippy::too_many_arguments)]
fn profile(
    hindi_name: &str,
    seasons: &[Season],
    planting_months: &[u32],
    harvesting_months: &[u32],
    suitable_states: &[&str],
    average_yield_quintals_per_acre: i64,
    common_diseases: &[&str],
    regional: Vec<RegionalWindow>,
) -> CropProfile {
    CropProfile {
        hindi_name: hindi_name.to_string(),
        seasons: seasons.to_vec(),
        planting_months: planting_months.to_vec(),
        harvesting_months: harvesting_months.to_vec(),
        suitable_states: suitable_states.iter().map(|state| state.to_string()).collect(),
        average_yield_quintals_per_acre: Decimal::from(average_yield_quintals_per_acre),
        common_diseases: common_diseases.iter().map(|disease| disease.to_string()).collect(),
        regional,
    }
}

fn next_month_in(months: &[u32], month: u32) -> Option<u32> {
    (1..=12)
        .map(|offset| (month + offset - 1) % 12 + 1)
        .find(|candidate| months.contains(candidate))
}

fn validate_profile(crop: Crop, profile: &CropProfile) -> Result<(), DomainError> {
    let invalid = |message: String| DomainError::InvalidCalendarRule {
        crop: crop.as_str().to_string(),
        message,
    };

    if profile.planting_months.is_empty() {
        return Err(invalid("at least one planting month is required".to_string()));
    }

    let regional_months = profile
        .regional
        .iter()
        .flat_map(|window| window.planting_months.iter().chain(&window.harvesting_months));
    let all_months =
        profile.planting_months.iter().chain(&profile.harvesting_months).chain(regional_months);
    for month in all_months {
        if !(1..=12).contains(month) {
            return Err(invalid(format!("month {month} is out of range 1..=12")));
        }
    }

    if profile.average_yield_quintals_per_acre <= Decimal::ZERO {
        return Err(invalid("average yield must be positive".to_string()));
    }

    if let Some(window) = profile.regional.iter().find(|window| window.planting_months.is_empty()) {
        return Err(invalid(format!("regional window for {} has no planting months", window.state)));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::{Datelike, TimeZone, Utc};

    use super::{india_time, CalendarLoadError, CalendarTable, Season};
    use crate::domain::query::{Crop, Region};
    use crate::errors::DomainError;

    #[test]
    fn seasons_follow_the_indian_cropping_year() {
        assert_eq!(Season::of_month(7), Season::Kharif);
        assert_eq!(Season::of_month(11), Season::Rabi);
        assert_eq!(Season::of_month(2), Season::Rabi);
        assert_eq!(Season::of_month(5), Season::Zaid);
    }

    #[test]
    fn india_time_rolls_the_month_over_before_utc() {
        let utc = Utc.with_ymd_and_hms(2026, 6, 30, 20, 0, 0).single().expect("valid timestamp");
        assert_eq!(india_time(utc).month(), 7);
    }

    #[test]
    fn rice_in_july_is_planting_time() {
        let table = CalendarTable::builtin();
        let window = table
            .window(Crop::Rice, Some(&Region::state("Bihar")), 7)
            .expect("rice is in the table");

        assert!(window.plant_now);
        assert!(!window.harvest_now);
        assert_eq!(window.region_suitable, Some(true));
        assert_eq!(window.season, Season::Kharif);
    }

    #[test]
    fn regional_window_overrides_default_months() {
        let table = CalendarTable::builtin();

        let punjab = table.window(Crop::Rice, Some(&Region::state("Punjab")), 8).expect("rice");
        assert!(!punjab.plant_now);
        assert_eq!(punjab.next_planting_month, Some(6));

        let bihar = table.window(Crop::Rice, Some(&Region::state("Bihar")), 8).expect("rice");
        assert!(bihar.plant_now);
    }

    #[test]
    fn next_planting_month_wraps_around_the_year() {
        let table = CalendarTable::builtin();
        let window = table.window(Crop::Wheat, None, 4).expect("wheat");

        assert!(!window.plant_now);
        assert!(window.harvest_now);
        assert_eq!(window.next_planting_month, Some(11));
        assert_eq!(window.region_suitable, None);
    }

    #[test]
    fn unsuited_state_is_reported() {
        let table = CalendarTable::builtin();
        let window =
            table.window(Crop::Cotton, Some(&Region::state("Punjab")), 6).expect("cotton");
        assert_eq!(window.region_suitable, Some(false));
    }

    #[test]
    fn out_of_range_month_is_an_invalid_rule() {
        let raw = r#"
[crops.wheat]
hindi_name = "गेहूं"
seasons = ["rabi"]
planting_months = [11, 13]
harvesting_months = [4]
suitable_states = ["Punjab"]
average_yield_quintals_per_acre = 20
"#;

        let error = CalendarTable::from_toml_str(raw).expect_err("month 13 must be rejected");
        assert!(matches!(
            error,
            CalendarLoadError::Rule(DomainError::InvalidCalendarRule { ref crop, .. })
                if crop == "wheat"
        ));
    }

    #[test]
    fn unknown_crop_name_is_an_invalid_rule() {
        let raw = r#"
[crops.barley]
hindi_name = "जौ"
seasons = ["rabi"]
planting_months = [11]
harvesting_months = [4]
suitable_states = ["Rajasthan"]
average_yield_quintals_per_acre = 12
"#;

        assert!(matches!(
            CalendarTable::from_toml_str(raw),
            Err(CalendarLoadError::Rule(DomainError::InvalidCalendarRule { .. }))
        ));
    }

    #[test]
    fn shipped_calendar_file_matches_builtin_table() {
        let path =
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config/crop_calendar.toml");
        let table = CalendarTable::load(&path).expect("shipped calendar loads");

        assert_eq!(table, CalendarTable::builtin());
    }
}
