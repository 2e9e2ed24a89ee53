//! Price tiers the remote feed does not carry: 1-hour ephemeral cache writes
//! and long-context flat rates.

use tracing::debug;

use crate::consts::LONG_CONTEXT_MARKER;

use super::types::LongContextPricing;

const OPUS_1H: f64 = 0.00003; // $30/M
const SONNET_1H: f64 = 0.000006; // $6/M
const HAIKU_1H: f64 = 0.0000016; // $1.6/M

const EPHEMERAL_1H_PRICING: &[(&str, f64)] = &[
    ("claude-opus-4-1", OPUS_1H),
    ("claude-opus-4-1-20250805", OPUS_1H),
    ("claude-opus-4", OPUS_1H),
    ("claude-opus-4-20250514", OPUS_1H),
    ("claude-3-opus", OPUS_1H),
    ("claude-3-opus-latest", OPUS_1H),
    ("claude-3-opus-20240229", OPUS_1H),
    ("claude-3-5-sonnet", SONNET_1H),
    ("claude-3-5-sonnet-latest", SONNET_1H),
    ("claude-3-5-sonnet-20241022", SONNET_1H),
    ("claude-3-5-sonnet-20240620", SONNET_1H),
    ("claude-3-sonnet", SONNET_1H),
    ("claude-3-sonnet-20240307", SONNET_1H),
    ("claude-sonnet-3", SONNET_1H),
    ("claude-sonnet-3-5", SONNET_1H),
    ("claude-sonnet-3-7", SONNET_1H),
    ("claude-sonnet-4", SONNET_1H),
    ("claude-sonnet-4-20250514", SONNET_1H),
    ("claude-3-5-haiku", HAIKU_1H),
    ("claude-3-5-haiku-latest", HAIKU_1H),
    ("claude-3-5-haiku-20241022", HAIKU_1H),
    ("claude-3-haiku", HAIKU_1H),
    ("claude-3-haiku-20240307", HAIKU_1H),
    ("claude-haiku-3", HAIKU_1H),
    ("claude-haiku-3-5", HAIKU_1H),
];

const LONG_CONTEXT_PRICING: &[(&str, LongContextPricing)] = &[(
    "claude-sonnet-4-20250514[1m]",
    LongContextPricing {
        input: 0.000006,   // $6/M
        output: 0.0000225, // $22.50/M
    },
)];

/// Per-token price of a 1-hour ephemeral cache write; 0 when the family is unknown.
pub(crate) fn ephemeral_1h_price(model: &str) -> f64 {
    if model.is_empty() {
        return 0.0;
    }
    if let Some((_, price)) = EPHEMERAL_1H_PRICING.iter().find(|(name, _)| *name == model) {
        return *price;
    }

    let model_lower = model.to_lowercase();
    if model_lower.contains("opus") {
        OPUS_1H
    } else if model_lower.contains("sonnet") {
        SONNET_1H
    } else if model_lower.contains("haiku") {
        HAIKU_1H
    } else {
        debug!(model, "no 1h cache pricing found");
        0.0
    }
}

pub(crate) fn is_long_context_model(model: &str) -> bool {
    model.contains(LONG_CONTEXT_MARKER)
}

/// Flat long-context rates, keyed by the exact marked model id.
pub(crate) fn long_context_pricing(model: &str) -> Option<LongContextPricing> {
    LONG_CONTEXT_PRICING
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, pricing)| *pricing)
}
