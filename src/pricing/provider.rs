use std::time::Duration;

use serde_json::Value;

use crate::error::PricingError;

use super::cache::into_raw_pricing;
use super::resolver::RawPricing;

/// Source of the remote pricing feed. `fetch` blocks; the catalog runs it
/// on the blocking pool under a timeout.
pub(crate) trait PricingFeed: Send + Sync {
    fn fetch(&self) -> Result<RawPricing, PricingError>;
}

/// LiteLLM `model_prices_and_context_window.json` over HTTPS
pub(crate) struct LiteLlmFeed {
    url: String,
    timeout: Duration,
}

impl LiteLlmFeed {
    pub(crate) fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

impl PricingFeed for LiteLlmFeed {
    fn fetch(&self) -> Result<RawPricing, PricingError> {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(self.timeout))
            .http_status_as_error(false)
            .build()
            .into();

        let response = agent.get(&self.url).call()?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(PricingError::Status(status));
        }

        let mut body = response.into_body();
        let data: Value = serde_json::from_reader(body.as_reader())?;
        into_raw_pricing(data)
    }
}
