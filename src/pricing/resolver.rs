use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::types::{ModelPricing, PricingTable};

/// Raw feed payload: model id -> LiteLLM pricing entry
pub(crate) type RawPricing = Map<String, Value>;

const CACHE_WRITE_MULTIPLIER: f64 = 1.25;
const CACHE_READ_MULTIPLIER: f64 = 0.1;
const REGION_PREFIXES: [&str; 3] = ["us.", "eu.", "apac."];
/// Schema description entry at the top of the LiteLLM file
const SAMPLE_SPEC_KEY: &str = "sample_spec";

/// How a model id was matched against the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum MatchKind {
    Exact,
    RegionStripped,
    Fuzzy,
}

impl MatchKind {
    pub(crate) fn label(self) -> &'static str {
        match self {
            MatchKind::Exact => "exact",
            MatchKind::RegionStripped => "region stripped",
            MatchKind::Fuzzy => "fuzzy",
        }
    }
}

fn price_field(entry: &Value, key: &str) -> Option<f64> {
    let value = match entry.get(key)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (value.is_finite() && value >= 0.0).then_some(value)
}

/// OpenAI bills prompt-cache writes at the plain input rate.
fn bills_cache_write_as_input(model: &str, provider: Option<&str>) -> bool {
    if provider.is_some_and(|p| p.eq_ignore_ascii_case("openai")) {
        return true;
    }
    let base = model.rsplit('/').next().unwrap_or(model).to_lowercase();
    base.starts_with("gpt") || base.starts_with("o1")
}

pub(crate) fn parse_litellm_data(data: &RawPricing) -> PricingTable {
    let mut table = PricingTable::default();

    for (name, value) in data {
        if !value.is_object() || name == SAMPLE_SPEC_KEY {
            continue;
        }

        let input = price_field(value, "input_cost_per_token").unwrap_or(0.0);
        let output = price_field(value, "output_cost_per_token").unwrap_or(0.0);
        let provider = value
            .get("litellm_provider")
            .and_then(Value::as_str)
            .map(str::to_string);

        let cache_write = price_field(value, "cache_creation_input_token_cost").unwrap_or_else(|| {
            if bills_cache_write_as_input(name, provider.as_deref()) {
                input
            } else {
                input * CACHE_WRITE_MULTIPLIER
            }
        });
        let cache_read =
            price_field(value, "cache_read_input_token_cost").unwrap_or(input * CACHE_READ_MULTIPLIER);

        table.insert(
            name.clone(),
            ModelPricing {
                input,
                output,
                cache_write,
                cache_read,
                provider,
            },
        );
    }

    table
}

/// Layer configured overrides on top of a freshly parsed table.
pub(crate) fn apply_overrides(table: &mut PricingTable, overrides: &[(String, ModelPricing)]) {
    for (model, pricing) in overrides {
        table.insert(model.clone(), pricing.clone());
    }
}

/// Lower-case and drop `-`/`_` so naming drift between feeds still matches.
pub(crate) fn normalize_model_name(model: &str) -> String {
    model
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Strip the region token from cloud relay ids like `us.anthropic.claude-...`.
fn strip_region_prefix(model: &str) -> Option<&str> {
    if !model.contains(".anthropic.") && !model.contains(".claude") {
        return None;
    }
    REGION_PREFIXES
        .iter()
        .find_map(|prefix| model.strip_prefix(prefix))
}

pub(crate) fn resolve_pricing<'a>(
    model: &str,
    table: &'a PricingTable,
) -> Option<(&'a ModelPricing, MatchKind)> {
    if model.is_empty() {
        return None;
    }

    if let Some(pricing) = table.get(model) {
        return Some((pricing, MatchKind::Exact));
    }

    if let Some(stripped) = strip_region_prefix(model)
        && let Some(pricing) = table.get(stripped)
    {
        debug!(model, stripped, "pricing matched after removing region prefix");
        return Some((pricing, MatchKind::RegionStripped));
    }

    // First hit in table order wins
    let query = normalize_model_name(model);
    if query.is_empty() {
        return None;
    }
    let found = table.iter().find(|(name, _)| {
        let key = normalize_model_name(name);
        !key.is_empty() && (key.contains(&query) || query.contains(&key))
    });

    match found {
        Some((name, pricing)) => {
            debug!(model, matched = name, "pricing matched by fuzzy name");
            Some((pricing, MatchKind::Fuzzy))
        }
        None => {
            debug!(model, "no pricing found");
            None
        }
    }
}
