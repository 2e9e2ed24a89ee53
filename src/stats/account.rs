//! Account-level daily statistics
//!
//! The relay does not always write an account's cost directly, so the daily
//! cost is resolved through a chain of sources. The first one with a non-zero
//! result wins.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cost::{CostTotal, UsageRecord, count_from_str, sum_costs};
use crate::error::StoreError;
use crate::pricing::PricingTable;
use crate::store::{KvStore, StoreCommand};

use super::info::{
    AccountGroup, AccountInfo, HourlyUsage, account_group, account_hourly, account_info,
};
use super::{date_key, parse_cost, requests_per_minute};

const RPM_WINDOW_MINUTES: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum CostSource {
    /// `cost` field of the account's daily bucket
    Direct,
    /// Summed from the API keys bound to the account
    ApiKeys,
    /// Recomputed from per-model token buckets
    Models,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct DailyCost {
    pub(crate) cost: f64,
    pub(crate) source: CostSource,
    /// Models found in the per-model buckets that have no price
    pub(crate) unpriced_models: Vec<String>,
}

impl DailyCost {
    fn new(cost: f64, source: CostSource) -> Self {
        Self {
            cost,
            source,
            unpriced_models: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct AccountSummary {
    pub(crate) account_id: String,
    pub(crate) date: NaiveDate,
    /// `None` when no platform holds a record for the id
    pub(crate) info: Option<AccountInfo>,
    pub(crate) group: Option<AccountGroup>,
    pub(crate) usage: UsageRecord,
    pub(crate) requests: u64,
    pub(crate) total_tokens: u64,
    pub(crate) cost: DailyCost,
    pub(crate) api_keys: Vec<String>,
    pub(crate) recent_rpm: u64,
    pub(crate) hourly: Vec<HourlyUsage>,
}

fn or_logged<T: Default>(result: Result<T, StoreError>, account_id: &str, what: &str) -> T {
    result.unwrap_or_else(|e| {
        warn!(account_id, error = %e, "failed to read {what}");
        T::default()
    })
}

/// Everything the dashboard shows for one account and day.
pub(crate) async fn account_summary<S: KvStore>(
    store: &S,
    table: &PricingTable,
    account_id: &str,
    date: NaiveDate,
    now: DateTime<FixedOffset>,
) -> AccountSummary {
    let daily_key = format!("account_usage:daily:{account_id}:{}", date_key(date));
    let (fields, cost, api_keys, recent_rpm, info, group, hourly) = tokio::join!(
        store.hash_get_all(&daily_key),
        account_daily_cost(store, table, account_id, date),
        related_api_keys(store, account_id),
        requests_per_minute(store, "account_usage", account_id, now, RPM_WINDOW_MINUTES),
        account_info(store, account_id),
        account_group(store, account_id, now),
        account_hourly(store, account_id, date),
    );

    let fields = or_logged(fields, account_id, "account usage");
    let usage = UsageRecord::from_hash(&fields);
    let requests = fields.get("requests").map_or(0, |v| count_from_str(v));
    let total_tokens = fields
        .get("allTokens")
        .map(|v| count_from_str(v))
        .filter(|&n| n > 0)
        .unwrap_or_else(|| usage.total_tokens());

    AccountSummary {
        account_id: account_id.to_string(),
        date,
        info: or_logged(info, account_id, "account record"),
        group: or_logged(group, account_id, "account group"),
        usage,
        requests,
        total_tokens,
        cost,
        api_keys: or_logged(api_keys, account_id, "related API keys"),
        recent_rpm,
        hourly: or_logged(hourly, account_id, "hourly usage"),
    }
}

pub(crate) async fn account_daily_cost<S: KvStore>(
    store: &S,
    table: &PricingTable,
    account_id: &str,
    date: NaiveDate,
) -> DailyCost {
    let date = date_key(date);

    match direct_cost(store, account_id, &date).await {
        Ok(cost) if cost > 0.0 => return DailyCost::new(cost, CostSource::Direct),
        Ok(_) => {}
        Err(e) => warn!(account_id, error = %e, "failed to read account cost"),
    }

    match api_key_cost(store, account_id, &date).await {
        Ok(cost) if cost > 0.0 => return DailyCost::new(cost, CostSource::ApiKeys),
        Ok(_) => {}
        Err(e) => warn!(account_id, error = %e, "failed to sum API key costs"),
    }

    let mut unpriced_models = Vec::new();
    match model_cost(store, table, account_id, &date).await {
        Ok(total) if total.cost.total_cost > 0.0 => {
            return DailyCost {
                cost: total.cost.total_cost,
                source: CostSource::Models,
                unpriced_models: total.unpriced_models,
            };
        }
        Ok(total) => unpriced_models = total.unpriced_models,
        Err(e) => warn!(account_id, error = %e, "failed to recompute cost from model usage"),
    }

    debug!(account_id, date = %date, "no cost data for account");
    DailyCost {
        cost: 0.0,
        source: CostSource::None,
        unpriced_models,
    }
}

async fn direct_cost<S: KvStore>(store: &S, account_id: &str, date: &str) -> Result<f64, StoreError> {
    let key = format!("account_usage:daily:{account_id}:{date}");
    let raw = store.hash_get_field(&key, "cost").await?;
    Ok(parse_cost(raw.as_deref()).unwrap_or(0.0))
}

/// API keys bound to the account, by id (the part after `apikey:`).
pub(crate) async fn related_api_keys<S: KvStore>(
    store: &S,
    account_id: &str,
) -> Result<Vec<String>, StoreError> {
    let group_ref = format!("group:{account_id}");
    let mut related = Vec::new();
    for path in store.scan_keys("apikey:*").await? {
        let Some(key_id) = path.strip_prefix("apikey:") else {
            continue;
        };
        let data = store.hash_get_all(&path).await?;
        let field = |name: &str| data.get(name).map(String::as_str);
        let bound = field("claudeAccountId") == Some(account_id)
            || field("claudeAccountId") == Some(group_ref.as_str())
            || field("accountId") == Some(account_id)
            || field("name").is_some_and(|name| name.contains(account_id));
        if bound {
            related.push(key_id.to_string());
        }
    }
    Ok(related)
}

async fn api_key_cost<S: KvStore>(store: &S, account_id: &str, date: &str) -> Result<f64, StoreError> {
    let keys = related_api_keys(store, account_id).await?;
    if keys.is_empty() {
        return Ok(0.0);
    }

    // three candidate records per key, first present one counts
    let commands: Vec<StoreCommand> = keys
        .iter()
        .flat_map(|key| {
            [
                StoreCommand::get(format!("usage:cost:daily:{key}:{date}")),
                StoreCommand::hget(format!("usage:daily:{key}:{date}"), "cost"),
                StoreCommand::hget(format!("apikey_usage:daily:{key}:{date}"), "cost"),
            ]
        })
        .collect();
    let replies = store.pipeline(&commands).await?;

    let total = replies
        .chunks(3)
        .map(|candidates| {
            candidates
                .iter()
                .find_map(|reply| parse_cost(reply.as_deref()))
                .unwrap_or(0.0)
        })
        .sum();
    debug!(account_id, keys = keys.len(), total, "summed API key costs");
    Ok(total)
}

async fn model_cost<S: KvStore>(
    store: &S,
    table: &PricingTable,
    account_id: &str,
    date: &str,
) -> Result<CostTotal, StoreError> {
    let prefix = format!("account_usage:model:daily:{account_id}:");
    let suffix = format!(":{date}");
    let mut records = Vec::new();
    for key in store.scan_keys(&format!("{prefix}*{suffix}")).await? {
        let Some(model) = key
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(&suffix))
        else {
            continue;
        };
        let fields = store.hash_get_all(&key).await?;
        records.push((UsageRecord::from_hash(&fields), model.to_string()));
    }
    let total = sum_costs(&records, table);
    if !total.is_complete() {
        warn!(
            account_id,
            models = ?total.unpriced_models,
            "recomputed account cost leaves out unpriced models"
        );
    }
    Ok(total)
}
