use serde::Serialize;

use crate::pricing::ModelPricing;

use super::usage::UsageRecord;

/// What cache reads saved against paying the full input rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) struct CacheSavings {
    pub(crate) normal_cost: f64,
    pub(crate) cache_cost: f64,
    pub(crate) savings: f64,
    pub(crate) savings_percentage: f64,
}

pub(crate) fn cache_savings(usage: &UsageRecord, pricing: &ModelPricing) -> CacheSavings {
    let tokens = usage.cache_read_tokens as f64;
    let normal_cost = tokens * pricing.input;
    let cache_cost = tokens * pricing.cache_read;
    let savings = normal_cost - cache_cost;
    let savings_percentage = if normal_cost > 0.0 {
        savings / normal_cost * 100.0
    } else {
        0.0
    };
    CacheSavings {
        normal_cost,
        cache_cost,
        savings,
        savings_percentage,
    }
}
