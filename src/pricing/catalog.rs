//! Pricing catalog service
//!
//! Owns the in-memory model table and keeps it current through a three-tier
//! chain: remote feed, local cache file, bundled fallback file. The table is
//! swapped as a whole, so readers always see a complete snapshot.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::consts::{
    DOWNLOAD_TIMEOUT, PRICING_CACHE_FILE, REFRESH_INTERVAL, RELOAD_DEBOUNCE, WATCH_INTERVAL,
};
use crate::cost::{CostBreakdown, UsageRecord, calculate_cost};
use crate::error::PricingError;

use super::cache;
use super::provider::PricingFeed;
use super::resolver::{MatchKind, RawPricing, apply_overrides, parse_litellm_data, resolve_pricing};
use super::tiers::{ephemeral_1h_price, long_context_pricing};
use super::types::{LongContextPricing, ModelPricing, PricingTable};

const MIN_TICK: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub(crate) struct CatalogOptions {
    pub(crate) data_dir: PathBuf,
    pub(crate) fallback_file: PathBuf,
    pub(crate) refresh_interval: Duration,
    pub(crate) watch_interval: Duration,
    pub(crate) download_timeout: Duration,
    /// Per-token overrides layered on every load
    pub(crate) overrides: Vec<(String, ModelPricing)>,
}

impl CatalogOptions {
    pub(crate) fn new(data_dir: PathBuf, fallback_file: PathBuf) -> Self {
        Self {
            data_dir,
            fallback_file,
            refresh_interval: REFRESH_INTERVAL,
            watch_interval: WATCH_INTERVAL,
            download_timeout: DOWNLOAD_TIMEOUT,
            overrides: Vec::new(),
        }
    }

    pub(crate) fn cache_file(&self) -> PathBuf {
        self.data_dir.join(PRICING_CACHE_FILE)
    }
}

#[derive(Debug, Default)]
struct CatalogState {
    table: Option<Arc<PricingTable>>,
    last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CatalogStatus {
    pub(crate) initialized: bool,
    pub(crate) last_updated: Option<DateTime<Utc>>,
    pub(crate) model_count: usize,
    pub(crate) next_update: Option<DateTime<Utc>>,
}

/// Every rate that applies to one model id
#[derive(Debug, Clone, Serialize)]
pub(crate) struct PriceQuote {
    pub(crate) model: String,
    pub(crate) pricing: Option<ModelPricing>,
    pub(crate) match_kind: Option<MatchKind>,
    pub(crate) ephemeral_1h: f64,
    pub(crate) long_context: Option<LongContextPricing>,
}

pub(crate) struct PricingCatalog {
    options: CatalogOptions,
    /// `None` runs offline: no downloads, stale cache is still used
    feed: Option<Arc<dyn PricingFeed>>,
    state: ArcSwap<CatalogState>,
}

impl PricingCatalog {
    pub(crate) fn new(options: CatalogOptions, feed: Option<Arc<dyn PricingFeed>>) -> Self {
        Self {
            options,
            feed,
            state: ArcSwap::from_pointee(CatalogState::default()),
        }
    }

    /// Initialize, then spawn the scheduled refresh and file watch tasks.
    pub(crate) async fn start(catalog: Arc<Self>) -> CatalogHandle {
        catalog.initialize().await;
        let refresh = tokio::spawn(refresh_loop(Arc::clone(&catalog)));
        let watch = tokio::spawn(watch_loop(Arc::clone(&catalog)));
        CatalogHandle {
            catalog,
            tasks: vec![refresh, watch],
        }
    }

    pub(crate) async fn initialize(&self) {
        let data_dir = &self.options.data_dir;
        if let Err(e) = tokio::fs::create_dir_all(data_dir).await {
            error!(path = %data_dir.display(), error = %e, "failed to create data directory");
            self.adopt_empty();
            warn!("pricing catalog running without pricing data");
            return;
        }

        self.reload().await;
        info!(models = self.model_count(), "pricing catalog initialized");
    }

    /// Refresh from the remote feed when the cache is missing or stale,
    /// otherwise load the cache file.
    pub(crate) async fn reload(&self) {
        let cache_file = self.options.cache_file();
        match (cache::file_age(&cache_file).await, &self.feed) {
            (Some(age), _) if age <= self.options.refresh_interval => self.load_cached().await,
            (Some(age), None) => {
                debug!(hours = age.as_secs() / 3600, "offline, using stale pricing cache");
                self.load_cached().await;
            }
            (Some(age), Some(_)) => {
                info!(hours = age.as_secs() / 3600, "pricing file is stale, updating");
                self.update_from_remote().await;
            }
            (None, _) => {
                info!(path = %cache_file.display(), "pricing file not found, downloading");
                self.update_from_remote().await;
            }
        }
    }

    /// Re-read the cache file after an external change. A corrupt file
    /// leaves the current table untouched.
    pub(crate) async fn reload_from_disk(&self) {
        let path = self.options.cache_file();
        if cache::modified_at(&path).await.is_none() {
            warn!(path = %path.display(), "pricing file was deleted, using fallback");
            self.use_fallback().await;
            return;
        }

        match cache::load_raw(&path).await.and_then(|raw| self.build_table(&raw)) {
            Ok(table) => {
                let count = self.install(table, Utc::now());
                info!(models = count, "reloaded pricing data from file");
            }
            Err(e) => {
                error!(error = %e, "failed to reload pricing data, keeping existing table");
            }
        }
    }

    async fn download(&self) -> Result<RawPricing, PricingError> {
        let Some(feed) = self.feed.clone() else {
            return Err(PricingError::Offline);
        };
        let timeout = self.options.download_timeout;
        let task = tokio::task::spawn_blocking(move || feed.fetch());
        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(PricingError::Task(join.to_string())),
            Err(_) => Err(PricingError::Timeout(timeout)),
        }
    }

    async fn update_from_remote(&self) {
        let downloaded = self
            .download()
            .await
            .and_then(|raw| self.build_table(&raw).map(|table| (raw, table)));
        match downloaded {
            Ok((raw, table)) => {
                let cache_file = self.options.cache_file();
                if let Err(e) = cache::save_raw(&cache_file, &raw).await {
                    warn!(error = %e, "failed to persist downloaded pricing data");
                }
                let count = self.install(table, Utc::now());
                info!(models = count, "downloaded pricing data");
            }
            Err(e) => {
                warn!(error = %e, "failed to download pricing data, using local fallback");
                self.use_fallback().await;
            }
        }
    }

    async fn load_cached(&self) {
        let path = self.options.cache_file();
        match cache::load_raw(&path).await.and_then(|raw| self.build_table(&raw)) {
            Ok(table) => {
                let updated = cache::modified_at(&path)
                    .await
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(Utc::now);
                let count = self.install(table, updated);
                info!(models = count, "loaded pricing data from cache");
            }
            Err(e) => {
                warn!(error = %e, "failed to load cached pricing data, using fallback");
                self.use_fallback().await;
            }
        }
    }

    async fn use_fallback(&self) {
        let fallback = &self.options.fallback_file;
        let loaded = cache::load_raw(fallback)
            .await
            .and_then(|raw| self.build_table(&raw).map(|table| (raw, table)));
        match loaded {
            Ok((raw, table)) => {
                if let Err(e) = cache::save_raw(&self.options.cache_file(), &raw).await {
                    warn!(error = %e, "failed to copy fallback pricing into data directory");
                }
                let count = self.install(table, Utc::now());
                warn!(models = count, path = %fallback.display(), "using fallback pricing data");
            }
            Err(e) => {
                error!(path = %fallback.display(), error = %e, "fallback pricing data unavailable");
                if self.state.load().table.is_some() {
                    warn!("keeping existing pricing data in memory");
                } else {
                    self.adopt_empty();
                    warn!("pricing catalog running without pricing data");
                }
            }
        }
    }

    /// Parse a raw payload; one without a single usable model entry is rejected.
    fn build_table(&self, raw: &RawPricing) -> Result<PricingTable, PricingError> {
        let mut table = parse_litellm_data(raw);
        if table.is_empty() {
            return Err(PricingError::EmptyTable);
        }
        apply_overrides(&mut table, &self.options.overrides);
        Ok(table)
    }

    fn install(&self, table: PricingTable, updated: DateTime<Utc>) -> usize {
        let count = table.len();
        self.state.store(Arc::new(CatalogState {
            table: Some(Arc::new(table)),
            last_updated: Some(updated),
        }));
        count
    }

    fn adopt_empty(&self) {
        let mut table = PricingTable::default();
        apply_overrides(&mut table, &self.options.overrides);
        self.state.store(Arc::new(CatalogState {
            table: Some(Arc::new(table)),
            last_updated: None,
        }));
    }

    /// Current table; empty before the first load.
    pub(crate) fn snapshot(&self) -> Arc<PricingTable> {
        self.state.load().table.clone().unwrap_or_default()
    }

    pub(crate) fn get_model_pricing(&self, model: &str) -> Option<ModelPricing> {
        let table = self.snapshot();
        resolve_pricing(model, &table).map(|(pricing, _)| pricing.clone())
    }

    pub(crate) fn quote(&self, model: &str) -> PriceQuote {
        let table = self.snapshot();
        let resolved = resolve_pricing(model, &table);
        PriceQuote {
            model: model.to_string(),
            pricing: resolved.map(|(pricing, _)| pricing.clone()),
            match_kind: resolved.map(|(_, kind)| kind),
            ephemeral_1h: ephemeral_1h_price(model),
            long_context: long_context_pricing(model),
        }
    }

    pub(crate) fn calculate_cost(&self, usage: &UsageRecord, model: &str) -> CostBreakdown {
        calculate_cost(usage, model, &self.snapshot())
    }

    fn model_count(&self) -> usize {
        self.state.load().table.as_ref().map_or(0, |t| t.len())
    }

    pub(crate) fn status(&self) -> CatalogStatus {
        let state = self.state.load();
        let refresh = chrono::Duration::from_std(self.options.refresh_interval).ok();
        CatalogStatus {
            initialized: state.table.is_some(),
            last_updated: state.last_updated,
            model_count: state.table.as_ref().map_or(0, |t| t.len()),
            next_update: state
                .last_updated
                .zip(refresh)
                .and_then(|(at, every)| at.checked_add_signed(every)),
        }
    }

    /// Models sorted by id, optionally filtered by a case-insensitive substring.
    pub(crate) fn models(&self, filter: Option<&str>) -> Vec<(String, ModelPricing)> {
        let needle = filter.map(str::to_lowercase);
        let table = self.snapshot();
        let mut models: Vec<(String, ModelPricing)> = table
            .iter()
            .filter(|(name, _)| {
                needle
                    .as_deref()
                    .is_none_or(|n| name.to_lowercase().contains(n))
            })
            .map(|(name, pricing)| (name.to_string(), pricing.clone()))
            .collect();
        models.sort_by(|(a, _), (b, _)| a.cmp(b));
        models
    }
}

/// Running catalog with its background tasks. Tasks stop on `shutdown` or drop.
pub(crate) struct CatalogHandle {
    catalog: Arc<PricingCatalog>,
    tasks: Vec<JoinHandle<()>>,
}

impl CatalogHandle {
    pub(crate) fn catalog(&self) -> &Arc<PricingCatalog> {
        &self.catalog
    }

    pub(crate) async fn shutdown(mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
            let _ = task.await;
        }
        debug!("pricing catalog stopped");
    }
}

impl Drop for CatalogHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn refresh_loop(catalog: Arc<PricingCatalog>) {
    let period = catalog.options.refresh_interval.max(MIN_TICK);
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        debug!("scheduled pricing refresh");
        catalog.reload().await;
    }
}

/// Poll the cache file's mtime; reload once it has held still for the debounce window.
async fn watch_loop(catalog: Arc<PricingCatalog>) {
    let path = catalog.options.cache_file();
    let period = catalog.options.watch_interval.max(MIN_TICK);
    let mut last_seen = cache::modified_at(&path).await;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(path = %path.display(), every_secs = period.as_secs_f64(), "watching pricing file");

    loop {
        ticker.tick().await;
        let current = cache::modified_at(&path).await;
        if current == last_seen {
            continue;
        }
        debug!(path = %path.display(), "detected change in pricing file");

        last_seen = current;
        loop {
            tokio::time::sleep(RELOAD_DEBOUNCE).await;
            let settled = cache::modified_at(&path).await;
            if settled == last_seen {
                break;
            }
            last_seen = settled;
        }

        catalog.reload_from_disk().await;
        // the fallback path may have rewritten the file
        last_seen = cache::modified_at(&path).await;
    }
}
