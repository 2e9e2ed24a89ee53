//! Command handlers

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::cli::{Cli, Commands, StoreArgs, UsageArgs};
use crate::config::Config;
use crate::consts::DOWNLOAD_TIMEOUT;
use crate::cost::{EphemeralSplit, UsageRecord, cache_savings};
use crate::error::AppError;
use crate::output::{
    cost_json, models_json, render_account, render_cost, render_key, render_models, render_price,
    render_status, to_json,
};
use crate::pricing::{CatalogOptions, LiteLlmFeed, PricingCatalog, PricingFeed};
use crate::stats::{account_summary, key_daily_usage};
use crate::store::{AnyStore, MemoryStore, RedisStore};
use crate::utils::{Timezone, parse_date};

pub(crate) struct CommandContext {
    pub(crate) catalog: Arc<PricingCatalog>,
    pub(crate) timezone: Timezone,
    pub(crate) json: bool,
    pub(crate) use_color: bool,
}

impl CommandContext {
    fn print(
        &self,
        json: impl FnOnce() -> Result<String, AppError>,
        text: impl FnOnce() -> String,
    ) -> Result<(), AppError> {
        let out = if self.json { json()? } else { text() };
        println!("{out}");
        Ok(())
    }

    fn report_date(&self, date: Option<&str>) -> Result<chrono::NaiveDate, AppError> {
        match date {
            Some(d) => parse_date(d),
            None => Ok(self.timezone.today()),
        }
    }
}

fn build_catalog(cli: &Cli, config: &Config) -> PricingCatalog {
    let mut options = CatalogOptions::new(cli.data_dir(), cli.fallback_file());
    options.refresh_interval = cli.refresh_interval();
    options.watch_interval = cli.watch_interval();
    options.overrides = config.price_overrides();

    let feed: Option<Arc<dyn PricingFeed>> = if cli.offline {
        None
    } else {
        Some(Arc::new(LiteLlmFeed::new(cli.pricing_url(), DOWNLOAD_TIMEOUT)))
    };
    PricingCatalog::new(options, feed)
}

pub(crate) async fn run(cli: Cli, config: &Config) -> Result<(), AppError> {
    let timezone = Timezone::parse(Some(cli.timezone()))?;
    let catalog = Arc::new(build_catalog(&cli, config));

    if matches!(cli.command, Commands::Watch) {
        return watch(catalog).await;
    }

    catalog.initialize().await;
    let ctx = CommandContext {
        catalog,
        timezone,
        json: cli.json,
        use_color: cli.use_color(),
    };

    match &cli.command {
        Commands::Status => handle_status(&ctx),
        Commands::Price { model } => handle_price(&ctx, model),
        Commands::Cost { model, usage } => handle_cost(&ctx, model, usage),
        Commands::Models { filter } => handle_models(&ctx, filter.as_deref()),
        Commands::Account { id, date, store } => {
            handle_account(&ctx, id, date.as_deref(), store).await
        }
        Commands::Key { id, date, store } => handle_key(&ctx, id, date.as_deref(), store).await,
        Commands::Watch => Ok(()),
    }
}

fn handle_status(ctx: &CommandContext) -> Result<(), AppError> {
    let status = ctx.catalog.status();
    ctx.print(
        || to_json(&status),
        || render_status(&status, ctx.timezone, ctx.use_color),
    )
}

fn handle_price(ctx: &CommandContext, model: &str) -> Result<(), AppError> {
    let quote = ctx.catalog.quote(model);
    ctx.print(|| to_json(&quote), || render_price(&quote, ctx.use_color))
}

fn usage_from_args(args: &UsageArgs) -> Result<UsageRecord, AppError> {
    if let Some(json) = &args.usage {
        return serde_json::from_str(json).map_err(AppError::InvalidUsage);
    }
    let ephemeral = (args.ephemeral_5m.is_some() || args.ephemeral_1h.is_some()).then(|| {
        EphemeralSplit {
            five_minute_tokens: args.ephemeral_5m.unwrap_or(0),
            one_hour_tokens: args.ephemeral_1h.unwrap_or(0),
        }
    });
    Ok(UsageRecord {
        input_tokens: args.input,
        output_tokens: args.output,
        cache_creation_tokens: args.cache_write,
        cache_read_tokens: args.cache_read,
        ephemeral,
    })
}

fn handle_cost(ctx: &CommandContext, model: &str, args: &UsageArgs) -> Result<(), AppError> {
    let usage = usage_from_args(args)?;
    let cost = ctx.catalog.calculate_cost(&usage, model);
    let savings = ctx
        .catalog
        .get_model_pricing(model)
        .map(|pricing| cache_savings(&usage, &pricing));
    ctx.print(
        || cost_json(model, &usage, &cost, savings.as_ref()),
        || render_cost(model, &usage, &cost, savings.as_ref(), ctx.use_color),
    )
}

fn handle_models(ctx: &CommandContext, filter: Option<&str>) -> Result<(), AppError> {
    let models = ctx.catalog.models(filter);
    ctx.print(|| models_json(&models), || render_models(&models, ctx.use_color))
}

async fn open_store(args: &StoreArgs) -> Result<AnyStore, AppError> {
    if let Some(path) = &args.snapshot {
        return load_snapshot(path).await;
    }
    match &args.redis_url {
        Some(url) => Ok(AnyStore::Redis(RedisStore::connect(url).await?)),
        None => Err(AppError::NoStore),
    }
}

async fn load_snapshot(path: &Path) -> Result<AnyStore, AppError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| AppError::Snapshot {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(AnyStore::Memory(MemoryStore::from_json(&content)?))
}

async fn handle_account(
    ctx: &CommandContext,
    id: &str,
    date: Option<&str>,
    store: &StoreArgs,
) -> Result<(), AppError> {
    let date = ctx.report_date(date)?;
    let store = open_store(store).await?;
    let table = ctx.catalog.snapshot();
    let summary = account_summary(&store, &table, id, date, ctx.timezone.now()).await;
    ctx.print(
        || to_json(&summary),
        || render_account(&summary, ctx.use_color),
    )
}

async fn handle_key(
    ctx: &CommandContext,
    id: &str,
    date: Option<&str>,
    store: &StoreArgs,
) -> Result<(), AppError> {
    let date = ctx.report_date(date)?;
    let store = open_store(store).await?;
    let table = ctx.catalog.snapshot();
    let report = key_daily_usage(&store, &table, id, date, ctx.timezone.now()).await?;
    ctx.print(|| to_json(&report), || render_key(&report, ctx.use_color))
}

/// Run the catalog with its background tasks until Ctrl-C.
async fn watch(catalog: Arc<PricingCatalog>) -> Result<(), AppError> {
    let handle = PricingCatalog::start(catalog).await;
    let status = handle.catalog().status();
    info!(models = status.model_count, "pricing catalog running, press Ctrl-C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
    handle.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_from_count_flags() {
        let args = UsageArgs {
            input: 10,
            output: 20,
            cache_write: 30,
            cache_read: 40,
            ..UsageArgs::default()
        };
        let usage = usage_from_args(&args).unwrap();
        assert_eq!(usage.input_tokens, 10);
        assert_eq!(usage.cache_creation_tokens, 30);
        assert!(usage.ephemeral.is_none());
    }

    #[test]
    fn ephemeral_flags_build_split() {
        let args = UsageArgs {
            ephemeral_1h: Some(5),
            ..UsageArgs::default()
        };
        let usage = usage_from_args(&args).unwrap();
        assert_eq!(
            usage.ephemeral,
            Some(EphemeralSplit {
                five_minute_tokens: 0,
                one_hour_tokens: 5,
            })
        );
    }

    #[test]
    fn usage_json_wins_over_flags() {
        let args = UsageArgs {
            usage: Some(r#"{"input_tokens": 7}"#.to_string()),
            input: 99,
            ..UsageArgs::default()
        };
        assert_eq!(usage_from_args(&args).unwrap().input_tokens, 7);
    }

    #[test]
    fn invalid_usage_json_is_an_error() {
        let args = UsageArgs {
            usage: Some("{not json".to_string()),
            ..UsageArgs::default()
        };
        assert!(matches!(usage_from_args(&args), Err(AppError::InvalidUsage(_))));
    }

    #[tokio::test]
    async fn missing_snapshot_names_path() {
        let args = StoreArgs {
            redis_url: None,
            snapshot: Some("/nonexistent/relaycost/snapshot.json".into()),
        };
        let err = open_store(&args).await.err().unwrap();
        assert!(err.to_string().contains("snapshot.json"));
    }

    #[tokio::test]
    async fn no_store_configured() {
        let err = open_store(&StoreArgs::default()).await.err().unwrap();
        assert!(matches!(err, AppError::NoStore));
    }
}
