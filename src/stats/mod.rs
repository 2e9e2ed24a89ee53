//! Usage and cost statistics read back from the relay's store

mod account;
mod info;
mod keys;
mod rpm;

pub(crate) use account::{AccountSummary, CostSource, account_summary};
pub(crate) use keys::{KeyDailyUsage, key_daily_usage};
pub(crate) use rpm::requests_per_minute;

use chrono::NaiveDate;

use crate::consts::DATE_FORMAT;

fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Stored cost strings; anything unparsable is absent.
fn parse_cost(raw: Option<&str>) -> Option<f64> {
    raw?.trim().parse::<f64>().ok().filter(|c| c.is_finite())
}
