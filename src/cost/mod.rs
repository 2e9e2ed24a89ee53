mod calculator;
mod savings;
mod usage;

pub(crate) use calculator::{CostBreakdown, CostTotal, calculate_cost, sum_costs};
pub(crate) use savings::{CacheSavings, cache_savings};
pub(crate) use usage::{EphemeralSplit, UsageRecord, count_from_str};
