pub mod add;
pub mod announce;
pub mod completions;
pub mod fixup;
pub mod history;
pub mod merge;
pub mod organize;
pub mod payer;
pub mod refresh;
pub mod run;
pub mod score;
pub mod seed;
pub mod show;
pub mod sim;

use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use lunchbot_core::config::LunchConfig;
use lunchbot_core::dates::{next_lunch_date, parse_lunch_date};
use lunchbot_core::workflow::open_lunch;
use lunchbot_core::{JsonStore, LunchStore};

/// Store under the configured data directory.
pub fn open_store(config: &LunchConfig, project_root: &Path) -> JsonStore {
    JsonStore::open(config.data_path(project_root))
}

/// Lunch a command applies to: `--date` when given, else the lunch still
/// taking sign-ups, else the upcoming lunch day.
pub fn lunch_date<S: LunchStore>(raw: Option<&str>, store: &S, config: &LunchConfig) -> Result<DateTime<Utc>> {
    resolve_lunch_date(raw, store, config, Utc::now())
}

fn resolve_lunch_date<S: LunchStore>(
    raw: Option<&str>,
    store: &S,
    config: &LunchConfig,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    if let Some(raw) = raw {
        return Ok(parse_lunch_date(raw)?);
    }
    Ok(open_lunch(store, now)?.unwrap_or_else(|| next_lunch_date(now, config.lunch_weekday)))
}
