use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Serialize;
use tracing::warn;

use crate::cost::{CostBreakdown, CostTotal, UsageRecord, calculate_cost, count_from_str};
use crate::error::StoreError;
use crate::pricing::PricingTable;
use crate::store::KvStore;

use super::{date_key, parse_cost, requests_per_minute};

const RPM_WINDOW_MINUTES: u32 = 10;

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ModelUsage {
    pub(crate) model: String,
    pub(crate) usage: UsageRecord,
    pub(crate) cost: CostBreakdown,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct KeyDailyUsage {
    pub(crate) key_id: String,
    pub(crate) date: NaiveDate,
    pub(crate) usage: UsageRecord,
    pub(crate) requests: u64,
    /// Cost the relay recorded, when it did
    pub(crate) stored_cost: Option<f64>,
    /// Sum of the per-model breakdowns
    pub(crate) cost: CostTotal,
    pub(crate) models: Vec<ModelUsage>,
    pub(crate) recent_rpm: u64,
}

pub(crate) async fn key_daily_usage<S: KvStore>(
    store: &S,
    table: &PricingTable,
    key_id: &str,
    date: NaiveDate,
    now: DateTime<FixedOffset>,
) -> Result<KeyDailyUsage, StoreError> {
    let day = date_key(date);
    let fields = store.hash_get_all(&format!("usage:daily:{key_id}:{day}")).await?;
    let usage = UsageRecord::from_hash(&fields);
    let requests = fields.get("requests").map_or(0, |v| count_from_str(v));

    let stored_cost = match store.get(&format!("usage:cost:daily:{key_id}:{day}")).await {
        Ok(raw) => parse_cost(raw.as_deref()),
        Err(e) => {
            warn!(key_id, error = %e, "failed to read stored key cost");
            None
        }
    }
    .or_else(|| parse_cost(fields.get("cost").map(String::as_str)));

    let models = model_usage(store, table, key_id, &day).await?;
    let cost = models.iter().fold(CostTotal::default(), |mut total, m| {
        total.push(&m.model, &m.cost);
        total
    });
    if !cost.is_complete() {
        warn!(key_id, models = ?cost.unpriced_models, "key cost leaves out unpriced models");
    }
    let recent_rpm = requests_per_minute(store, "usage", key_id, now, RPM_WINDOW_MINUTES).await;

    Ok(KeyDailyUsage {
        key_id: key_id.to_string(),
        date,
        usage,
        requests,
        stored_cost,
        cost,
        models,
        recent_rpm,
    })
}

/// Per-model buckets `usage:model:daily:{key}:{model}:{date}`, priced and
/// sorted by cost, most expensive first.
async fn model_usage<S: KvStore>(
    store: &S,
    table: &PricingTable,
    key_id: &str,
    day: &str,
) -> Result<Vec<ModelUsage>, StoreError> {
    let prefix = format!("usage:model:daily:{key_id}:");
    let suffix = format!(":{day}");
    let mut models = Vec::new();
    for key in store.scan_keys(&format!("{prefix}*{suffix}")).await? {
        let Some(model) = key
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(&suffix))
        else {
            continue;
        };
        let usage = UsageRecord::from_hash(&store.hash_get_all(&key).await?);
        models.push(ModelUsage {
            model: model.to_string(),
            usage,
            cost: calculate_cost(&usage, model, table),
        });
    }
    models.sort_by(|a, b| {
        b.cost
            .total_cost
            .total_cmp(&a.cost.total_cost)
            .then_with(|| a.model.cmp(&b.model))
    });
    Ok(models)
}
