use rayon::prelude::*;
use serde::Serialize;

use crate::consts::LONG_CONTEXT_THRESHOLD;
use crate::pricing::{
    PricingTable, ephemeral_1h_price, is_long_context_model, long_context_pricing,
    resolve_pricing,
};

use super::usage::UsageRecord;

/// Per-token prices actually applied, kept for auditing
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub(crate) struct AppliedPricing {
    pub(crate) input: f64,
    pub(crate) output: f64,
    pub(crate) cache_write: f64,
    pub(crate) cache_read: f64,
    pub(crate) ephemeral_1h: f64,
}

/// Itemized cost of a usage record. `total_cost` is always the sum of the
/// input, output, cache write and cache read components; the two ephemeral
/// fields break down `cache_write_cost`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub(crate) struct CostBreakdown {
    pub(crate) input_cost: f64,
    pub(crate) output_cost: f64,
    pub(crate) cache_write_cost: f64,
    pub(crate) cache_read_cost: f64,
    pub(crate) ephemeral_5m_cost: f64,
    pub(crate) ephemeral_1h_cost: f64,
    pub(crate) total_cost: f64,
    pub(crate) has_pricing: bool,
    pub(crate) is_long_context_request: bool,
    pub(crate) pricing: AppliedPricing,
}

impl CostBreakdown {
    /// Fold another breakdown into this one. The applied pricing of `self` is kept.
    pub(crate) fn add(&mut self, other: &CostBreakdown) {
        self.input_cost += other.input_cost;
        self.output_cost += other.output_cost;
        self.cache_write_cost += other.cache_write_cost;
        self.cache_read_cost += other.cache_read_cost;
        self.ephemeral_5m_cost += other.ephemeral_5m_cost;
        self.ephemeral_1h_cost += other.ephemeral_1h_cost;
        self.total_cost =
            self.input_cost + self.output_cost + self.cache_write_cost + self.cache_read_cost;
        self.has_pricing |= other.has_pricing;
        self.is_long_context_request |= other.is_long_context_request;
    }
}

pub(crate) fn calculate_cost(usage: &UsageRecord, model: &str, table: &PricingTable) -> CostBreakdown {
    let mut is_long_context_request = false;
    let mut long_context = None;

    if is_long_context_model(model) && usage.input_side_tokens() > LONG_CONTEXT_THRESHOLD {
        is_long_context_request = true;
        long_context = long_context_pricing(model);
    }

    let base = resolve_pricing(model, table).map(|(pricing, _)| pricing);
    if base.is_none() && long_context.is_none() {
        return CostBreakdown {
            is_long_context_request,
            ..CostBreakdown::default()
        };
    }

    let (input_price, output_price) = match (long_context, base) {
        (Some(lc), _) => (lc.input, lc.output),
        (None, Some(p)) => (p.input, p.output),
        (None, None) => (0.0, 0.0),
    };
    let cache_write_price = base.map_or(0.0, |p| p.cache_write);
    let cache_read_price = base.map_or(0.0, |p| p.cache_read);
    let ephemeral_1h = ephemeral_1h_price(model);

    let input_cost = usage.input_tokens as f64 * input_price;
    let output_cost = usage.output_tokens as f64 * output_price;
    let cache_read_cost = usage.cache_read_tokens as f64 * cache_read_price;

    let (ephemeral_5m_cost, ephemeral_1h_cost, cache_write_cost) = match usage.ephemeral {
        Some(split) => {
            let five = split.five_minute_tokens as f64 * cache_write_price;
            let hour = split.one_hour_tokens as f64 * ephemeral_1h;
            (five, hour, five + hour)
        }
        None if usage.cache_creation_tokens > 0 => {
            let cost = usage.cache_creation_tokens as f64 * cache_write_price;
            (cost, 0.0, cost)
        }
        None => (0.0, 0.0, 0.0),
    };

    CostBreakdown {
        input_cost,
        output_cost,
        cache_write_cost,
        cache_read_cost,
        ephemeral_5m_cost,
        ephemeral_1h_cost,
        total_cost: input_cost + output_cost + cache_write_cost + cache_read_cost,
        has_pricing: true,
        is_long_context_request,
        pricing: AppliedPricing {
            input: input_price,
            output: output_price,
            cache_write: cache_write_price,
            cache_read: cache_read_price,
            ephemeral_1h,
        },
    }
}

/// Breakdowns folded across models. Models without a price contribute zero
/// to every cost field and are listed in `unpriced_models`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub(crate) struct CostTotal {
    #[serde(flatten)]
    pub(crate) cost: CostBreakdown,
    pub(crate) unpriced_models: Vec<String>,
}

impl CostTotal {
    pub(crate) fn push(&mut self, model: &str, cost: &CostBreakdown) {
        self.cost.add(cost);
        if !cost.has_pricing && !self.unpriced_models.iter().any(|m| m == model) {
            self.unpriced_models.push(model.to_string());
        }
    }

    /// True when every folded model had a price
    pub(crate) fn is_complete(&self) -> bool {
        self.unpriced_models.is_empty()
    }
}

/// Price many records against one table snapshot and fold the results.
/// Pricing runs in parallel; the fold follows input order so float totals
/// are reproducible.
pub(crate) fn sum_costs(records: &[(UsageRecord, String)], table: &PricingTable) -> CostTotal {
    let costs: Vec<CostBreakdown> = records
        .par_iter()
        .map(|(usage, model)| calculate_cost(usage, model, table))
        .collect();
    records
        .iter()
        .zip(&costs)
        .fold(CostTotal::default(), |mut total, ((_, model), cost)| {
            total.push(model, cost);
            total
        })
}
