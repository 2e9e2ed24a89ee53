mod cache;
mod catalog;
mod provider;
mod resolver;
mod tiers;
mod types;

pub(crate) use catalog::{CatalogOptions, CatalogStatus, PriceQuote, PricingCatalog};
pub(crate) use provider::{LiteLlmFeed, PricingFeed};
pub(crate) use resolver::resolve_pricing;
pub(crate) use tiers::{ephemeral_1h_price, is_long_context_model, long_context_pricing};
pub(crate) use types::{ModelPricing, PricingTable};
