use std::collections::HashMap;

use serde::Serialize;

/// Model pricing info (per token, not per million)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub(crate) struct ModelPricing {
    pub(crate) input: f64,
    pub(crate) output: f64,
    pub(crate) cache_write: f64,
    pub(crate) cache_read: f64,
    /// Provider tag from the feed (`litellm_provider`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) provider: Option<String>,
}

/// Flat per-token rates charged once a long-context request crosses the threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) struct LongContextPricing {
    pub(crate) input: f64,
    pub(crate) output: f64,
}

/// Immutable model table. Keeps insertion order for fuzzy matching.
#[derive(Debug, Default)]
pub(crate) struct PricingTable {
    entries: Vec<(String, ModelPricing)>,
    index: HashMap<String, usize>,
}

impl PricingTable {
    /// Insert or replace an entry; a replaced entry keeps its original position.
    pub(crate) fn insert(&mut self, model: String, pricing: ModelPricing) {
        if let Some(&pos) = self.index.get(&model) {
            self.entries[pos].1 = pricing;
            return;
        }
        self.index.insert(model.clone(), self.entries.len());
        self.entries.push((model, pricing));
    }

    pub(crate) fn get(&self, model: &str) -> Option<&ModelPricing> {
        self.index.get(model).map(|&pos| &self.entries[pos].1)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &ModelPricing)> {
        self.entries.iter().map(|(name, p)| (name.as_str(), p))
    }
}
