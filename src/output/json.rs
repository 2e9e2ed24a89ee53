use serde::Serialize;

use crate::cost::{CacheSavings, CostBreakdown, UsageRecord};
use crate::error::AppError;
use crate::pricing::ModelPricing;

#[derive(Serialize)]
struct CostReport<'a> {
    model: &'a str,
    usage: &'a UsageRecord,
    #[serde(flatten)]
    cost: &'a CostBreakdown,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_savings: Option<&'a CacheSavings>,
}

#[derive(Serialize)]
struct ModelRow<'a> {
    model: &'a str,
    #[serde(flatten)]
    pricing: &'a ModelPricing,
}

pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, AppError> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub(crate) fn cost_json(
    model: &str,
    usage: &UsageRecord,
    cost: &CostBreakdown,
    savings: Option<&CacheSavings>,
) -> Result<String, AppError> {
    to_json(&CostReport {
        model,
        usage,
        cost,
        cache_savings: savings,
    })
}

pub(crate) fn models_json(models: &[(String, ModelPricing)]) -> Result<String, AppError> {
    let rows: Vec<ModelRow<'_>> = models
        .iter()
        .map(|(model, pricing)| ModelRow { model, pricing })
        .collect();
    to_json(&rows)
}
