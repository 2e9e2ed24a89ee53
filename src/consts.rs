use std::time::Duration;

/// Standard date format used in store keys: "2025-01-15"
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) const LITELLM_PRICING_URL: &str =
    "https://raw.githubusercontent.com/BerriAI/litellm/main/model_prices_and_context_window.json";

/// File name of the local pricing cache inside the data directory
pub(crate) const PRICING_CACHE_FILE: &str = "model_pricing.json";

pub(crate) const REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
pub(crate) const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const WATCH_INTERVAL: Duration = Duration::from_secs(60);
pub(crate) const RELOAD_DEBOUNCE: Duration = Duration::from_millis(500);

/// Marker suffix carried by long-context model variants
pub(crate) const LONG_CONTEXT_MARKER: &str = "[1m]";

/// Input-side token count above which long-context pricing applies (exclusive)
pub(crate) const LONG_CONTEXT_THRESHOLD: u64 = 200_000;
