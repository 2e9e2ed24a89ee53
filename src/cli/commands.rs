//! CLI subcommand definitions

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::config::Config;

/// Where statistics are read from. A snapshot wins over Redis.
#[derive(Debug, Clone, Default, Args)]
pub(crate) struct StoreArgs {
    /// Redis connection URL
    #[arg(long, env = "REDIS_URL", value_name = "URL")]
    pub(crate) redis_url: Option<String>,

    /// JSON snapshot of store keys instead of a live Redis
    #[arg(long, value_name = "FILE")]
    pub(crate) snapshot: Option<PathBuf>,
}

/// Token counts given on the command line
#[derive(Debug, Clone, Default, Args)]
pub(crate) struct UsageArgs {
    /// Provider usage JSON (overrides the count flags)
    #[arg(long, value_name = "JSON")]
    pub(crate) usage: Option<String>,

    #[arg(long, default_value_t = 0)]
    pub(crate) input: u64,

    #[arg(long, default_value_t = 0)]
    pub(crate) output: u64,

    /// Cache write tokens without a 5m/1h split
    #[arg(long, default_value_t = 0)]
    pub(crate) cache_write: u64,

    #[arg(long, default_value_t = 0)]
    pub(crate) cache_read: u64,

    /// 5-minute ephemeral cache write tokens
    #[arg(long = "ephemeral-5m", value_name = "N")]
    pub(crate) ephemeral_5m: Option<u64>,

    /// 1-hour ephemeral cache write tokens
    #[arg(long = "ephemeral-1h", value_name = "N")]
    pub(crate) ephemeral_1h: Option<u64>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Show pricing catalog status
    Status,
    /// Show every rate that applies to a model
    Price {
        model: String,
    },
    /// Calculate the cost of one usage record
    Cost {
        model: String,
        #[command(flatten)]
        usage: UsageArgs,
    },
    /// List catalog models, optionally filtered by substring
    Models {
        filter: Option<String>,
    },
    /// Daily usage, cost and RPM of an upstream account
    Account {
        id: String,
        /// Day to report (YYYYMMDD or YYYY-MM-DD), default today
        #[arg(long)]
        date: Option<String>,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Daily usage, cost and RPM of an API key
    Key {
        id: String,
        /// Day to report (YYYYMMDD or YYYY-MM-DD), default today
        #[arg(long)]
        date: Option<String>,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Keep the catalog running with scheduled refresh and file watch until Ctrl-C
    Watch,
}

impl Commands {
    pub(crate) fn apply_config(&mut self, config: &Config) {
        if let Commands::Account { store, .. } | Commands::Key { store, .. } = self
            && store.redis_url.is_none()
        {
            store.redis_url = config.redis_url.clone();
        }
    }
}
