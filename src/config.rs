use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::pricing::ModelPricing;

const PER_MILLION: f64 = 1_000_000.0;

/// Price override in USD per million tokens. Unset `input`/`output` are 0;
/// unset cache prices follow the usual backfills from `input`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct PriceOverride {
    #[serde(default)]
    pub(crate) input: f64,
    #[serde(default)]
    pub(crate) output: f64,
    #[serde(default)]
    pub(crate) cache_write: Option<f64>,
    #[serde(default)]
    pub(crate) cache_read: Option<f64>,
}

impl PriceOverride {
    fn to_per_token(&self) -> ModelPricing {
        let input = self.input / PER_MILLION;
        ModelPricing {
            input,
            output: self.output / PER_MILLION,
            cache_write: self.cache_write.map_or(input * 1.25, |p| p / PER_MILLION),
            cache_read: self.cache_read.map_or(input * 0.1, |p| p / PER_MILLION),
            provider: Some("override".to_string()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Config {
    #[serde(default)]
    pub(crate) data_dir: Option<PathBuf>,
    #[serde(default)]
    pub(crate) fallback_file: Option<PathBuf>,
    #[serde(default)]
    pub(crate) pricing_url: Option<String>,
    #[serde(default)]
    pub(crate) refresh_interval_hours: Option<u64>,
    #[serde(default)]
    pub(crate) watch_interval_secs: Option<u64>,
    #[serde(default)]
    pub(crate) offline: bool,
    #[serde(default)]
    pub(crate) redis_url: Option<String>,
    #[serde(default)]
    pub(crate) timezone: Option<String>,
    #[serde(default)]
    pub(crate) debug: bool,
    #[serde(default)]
    pub(crate) overrides: BTreeMap<String, PriceOverride>,
}

impl Config {
    /// First config file that parses wins; none found means defaults.
    /// Runs before logging is set up, so problems go straight to stderr.
    pub(crate) fn load() -> Self {
        for path in Self::get_config_paths() {
            if path.exists()
                && let Ok(content) = fs::read_to_string(&path)
            {
                match toml::from_str::<Config>(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        eprintln!("Warning: Failed to parse {}: {}", path.display(), e);
                    }
                }
            }
        }

        Self::default()
    }

    fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // 1. XDG config: ~/.config/relaycost/config.toml
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".config").join("relaycost").join("config.toml"));
        }

        // 2. Platform config dir (macOS Application Support)
        if let Some(config_dir) = dirs::config_dir() {
            let platform_path = config_dir.join("relaycost").join("config.toml");
            if !paths.contains(&platform_path) {
                paths.push(platform_path);
            }
        }

        // 3. Home directory: ~/.relaycost.toml
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".relaycost.toml"));
        }

        paths
    }

    /// Overrides converted to per-token prices, in model order
    pub(crate) fn price_overrides(&self) -> Vec<(String, ModelPricing)> {
        self.overrides
            .iter()
            .map(|(model, price)| (model.clone(), price.to_per_token()))
            .collect()
    }
}
