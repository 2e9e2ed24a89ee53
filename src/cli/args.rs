//! CLI argument definitions
//!
//! Global CLI options and configuration merging logic.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::Config;
use crate::consts::{LITELLM_PRICING_URL, REFRESH_INTERVAL, WATCH_INTERVAL};

use super::commands::Commands;

const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_FALLBACK_FILE: &str =
    "./resources/model-pricing/model_prices_and_context_window.json";
const DEFAULT_TIMEZONE: &str = "Asia/Shanghai";

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq)]
pub(crate) enum ColorMode {
    /// Auto-detect based on terminal (default)
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

#[derive(Parser)]
#[command(name = "relaycost")]
#[command(about = "LLM pricing catalog and cost calculator for relay usage", version)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,

    /// Output as JSON
    #[arg(short, long, global = true)]
    pub(crate) json: bool,

    /// Never download pricing; use the cache file or the bundled fallback
    #[arg(short = 'O', long, global = true)]
    pub(crate) offline: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub(crate) debug: bool,

    /// Directory holding the pricing cache file
    #[arg(long, global = true, env = "RELAYCOST_DATA_DIR", value_name = "DIR")]
    pub(crate) data_dir: Option<PathBuf>,

    /// Bundled pricing file used when download and cache both fail
    #[arg(long, global = true, env = "RELAYCOST_FALLBACK_FILE", value_name = "FILE")]
    pub(crate) fallback_file: Option<PathBuf>,

    /// Remote LiteLLM pricing JSON
    #[arg(long, global = true, env = "RELAYCOST_PRICING_URL", value_name = "URL")]
    pub(crate) pricing_url: Option<String>,

    /// Timezone for "today" and timestamps (e.g., "Asia/Shanghai", "UTC")
    #[arg(long, global = true, value_name = "TZ")]
    pub(crate) timezone: Option<String>,

    /// Color output mode
    #[arg(long, global = true, value_enum, default_value = "auto")]
    pub(crate) color: ColorMode,

    /// Disable colored output (shorthand for --color=never)
    #[arg(long, global = true)]
    pub(crate) no_color: bool,

    #[arg(skip)]
    pub(crate) refresh_interval: Option<Duration>,

    #[arg(skip)]
    pub(crate) watch_interval: Option<Duration>,
}

impl Cli {
    /// Merge config file values into CLI (CLI args take precedence)
    pub(crate) fn with_config(mut self, config: &Config) -> Self {
        if !self.offline && config.offline {
            self.offline = true;
        }
        if !self.debug && config.debug {
            self.debug = true;
        }

        if self.data_dir.is_none() {
            self.data_dir = config.data_dir.clone();
        }
        if self.fallback_file.is_none() {
            self.fallback_file = config.fallback_file.clone();
        }
        if self.pricing_url.is_none() {
            self.pricing_url = config.pricing_url.clone();
        }
        if self.timezone.is_none() {
            self.timezone = config.timezone.clone();
        }
        if let Some(hours) = config.refresh_interval_hours.filter(|&h| h > 0) {
            self.refresh_interval = Some(Duration::from_secs(hours * 3600));
        }
        if let Some(secs) = config.watch_interval_secs.filter(|&s| s > 0) {
            self.watch_interval = Some(Duration::from_secs(secs));
        }

        self.command.apply_config(config);
        self
    }

    pub(crate) fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
    }

    pub(crate) fn fallback_file(&self) -> PathBuf {
        self.fallback_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FALLBACK_FILE))
    }

    pub(crate) fn pricing_url(&self) -> &str {
        self.pricing_url.as_deref().unwrap_or(LITELLM_PRICING_URL)
    }

    pub(crate) fn timezone(&self) -> &str {
        self.timezone.as_deref().unwrap_or(DEFAULT_TIMEZONE)
    }

    pub(crate) fn refresh_interval(&self) -> Duration {
        self.refresh_interval.unwrap_or(REFRESH_INTERVAL)
    }

    pub(crate) fn watch_interval(&self) -> Duration {
        self.watch_interval.unwrap_or(WATCH_INTERVAL)
    }

    pub(crate) fn use_color(&self) -> bool {
        if self.no_color || self.json {
            return false;
        }
        match self.color {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => std::io::stdout().is_terminal(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Commands;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("relaycost").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_without_config() {
        let cli = parse(&["status"]).with_config(&Config::default());
        assert_eq!(cli.timezone(), "Asia/Shanghai");
        assert_eq!(cli.pricing_url(), LITELLM_PRICING_URL);
        assert_eq!(cli.refresh_interval(), REFRESH_INTERVAL);
        assert!(!cli.offline);
    }

    #[test]
    fn config_fills_unset_values() {
        let config: Config = toml::from_str(
            r#"
            offline = true
            timezone = "UTC"
            data_dir = "/srv/pricing"
            refresh_interval_hours = 2
            "#,
        )
        .unwrap();
        let cli = parse(&["--timezone", "Europe/Berlin", "status"]).with_config(&config);
        assert!(cli.offline);
        assert_eq!(cli.timezone(), "Europe/Berlin");
        assert_eq!(cli.data_dir(), PathBuf::from("/srv/pricing"));
        assert_eq!(cli.refresh_interval(), Duration::from_secs(7200));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = parse(&["price", "claude-3-opus", "--json", "--offline"]);
        assert!(cli.json);
        assert!(cli.offline);
        assert!(matches!(cli.command, Commands::Price { ref model } if model == "claude-3-opus"));
    }

    #[test]
    fn json_disables_color() {
        let cli = parse(&["--color", "always", "--json", "status"]);
        assert!(!cli.use_color());
    }
}
