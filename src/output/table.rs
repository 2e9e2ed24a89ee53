use comfy_table::{Cell, Color, Table};

use crate::cost::{CacheSavings, CostBreakdown, UsageRecord};
use crate::pricing::{CatalogStatus, ModelPricing, PriceQuote};
use crate::stats::{AccountSummary, CostSource, KeyDailyUsage};
use crate::utils::Timezone;

use super::format::{
    create_styled_table, format_cost, format_number, format_rate, format_timestamp, header_cell,
    right_cell,
};

fn key_value_table(rows: &[(&str, String)], use_color: bool) -> Table {
    let mut table = create_styled_table();
    table.set_header(vec![header_cell("Field", use_color), header_cell("Value", use_color)]);
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    table
}

fn cost_color(use_color: bool) -> Option<Color> {
    use_color.then_some(Color::Green)
}

pub(crate) fn render_status(status: &CatalogStatus, timezone: Timezone, use_color: bool) -> String {
    let rows = [
        ("Initialized", status.initialized.to_string()),
        ("Models", format_number(status.model_count as u64)),
        ("Last updated", format_timestamp(status.last_updated, timezone)),
        ("Next update", format_timestamp(status.next_update, timezone)),
    ];
    key_value_table(&rows, use_color).to_string()
}

pub(crate) fn render_price(quote: &PriceQuote, use_color: bool) -> String {
    let Some(pricing) = &quote.pricing else {
        return format!("No pricing found for {}", quote.model);
    };

    let mut rows = vec![
        ("Model", quote.model.clone()),
        ("Input", format_rate(pricing.input)),
        ("Output", format_rate(pricing.output)),
        ("Cache write (5m)", format_rate(pricing.cache_write)),
        ("Cache write (1h)", format_rate(quote.ephemeral_1h)),
        ("Cache read", format_rate(pricing.cache_read)),
    ];
    if let Some(provider) = &pricing.provider {
        rows.push(("Provider", provider.clone()));
    }
    if let Some(lc) = quote.long_context {
        rows.push(("Long context input", format_rate(lc.input)));
        rows.push(("Long context output", format_rate(lc.output)));
    }
    if let Some(kind) = quote.match_kind {
        rows.push(("Match", kind.label().to_string()));
    }
    key_value_table(&rows, use_color).to_string()
}

pub(crate) fn render_cost(
    model: &str,
    usage: &UsageRecord,
    cost: &CostBreakdown,
    savings: Option<&CacheSavings>,
    use_color: bool,
) -> String {
    if !cost.has_pricing {
        return format!("No pricing found for {model}; cost is {}", format_cost(0.0));
    }

    let c = use_color;
    let mut table = create_styled_table();
    table.set_header(vec![
        header_cell("Category", c),
        header_cell("Tokens", c),
        header_cell("Rate", c),
        header_cell("Cost", c),
    ]);

    let p = &cost.pricing;
    let mut rows = vec![
        ("Input", usage.input_tokens, format_rate(p.input), cost.input_cost),
        ("Output", usage.output_tokens, format_rate(p.output), cost.output_cost),
    ];
    match usage.ephemeral {
        Some(split) => {
            rows.push((
                "Cache write (5m)",
                split.five_minute_tokens,
                format_rate(p.cache_write),
                cost.ephemeral_5m_cost,
            ));
            rows.push((
                "Cache write (1h)",
                split.one_hour_tokens,
                format_rate(p.ephemeral_1h),
                cost.ephemeral_1h_cost,
            ));
        }
        None => rows.push((
            "Cache write",
            usage.cache_creation_tokens,
            format_rate(p.cache_write),
            cost.cache_write_cost,
        )),
    }
    rows.push((
        "Cache read",
        usage.cache_read_tokens,
        format_rate(p.cache_read),
        cost.cache_read_cost,
    ));

    for (label, tokens, rate, amount) in rows {
        table.add_row(vec![
            Cell::new(label),
            right_cell(&format_number(tokens), None, false),
            right_cell(&rate, None, false),
            right_cell(&format_cost(amount), cost_color(c), false),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total"),
        right_cell(&format_number(usage.total_tokens()), None, true),
        Cell::new(""),
        right_cell(&format_cost(cost.total_cost), cost_color(c), true),
    ]);

    let mut out = format!("{model}\n{table}");
    if cost.is_long_context_request {
        out.push_str("\nLong context request: flat long-context rates applied");
    }
    if let Some(s) = savings
        && s.savings > 0.0
    {
        out.push_str(&format!(
            "\nCache savings: {} ({:.1}%)",
            format_cost(s.savings),
            s.savings_percentage
        ));
    }
    out
}

pub(crate) fn render_models(models: &[(String, ModelPricing)], use_color: bool) -> String {
    if models.is_empty() {
        return "No models found.".to_string();
    }
    let c = use_color;
    let mut table = create_styled_table();
    table.set_header(vec![
        header_cell("Model", c),
        header_cell("Input", c),
        header_cell("Output", c),
        header_cell("Cache Write", c),
        header_cell("Cache Read", c),
    ]);
    for (name, pricing) in models {
        table.add_row(vec![
            Cell::new(name),
            right_cell(&format_rate(pricing.input), None, false),
            right_cell(&format_rate(pricing.output), None, false),
            right_cell(&format_rate(pricing.cache_write), None, false),
            right_cell(&format_rate(pricing.cache_read), None, false),
        ]);
    }
    format!("{table}\n{} models", format_number(models.len() as u64))
}

fn source_label(source: CostSource) -> &'static str {
    match source {
        CostSource::Direct => "account bucket",
        CostSource::ApiKeys => "API keys",
        CostSource::Models => "model usage",
        CostSource::None => "no data",
    }
}

fn account_cost(summary: &AccountSummary) -> String {
    let cost = &summary.cost;
    let mut out = format!("{} ({})", format_cost(cost.cost), source_label(cost.source));
    if !cost.unpriced_models.is_empty() {
        out.push_str(&format!("; unpriced: {}", cost.unpriced_models.join(", ")));
    }
    out
}

pub(crate) fn render_account(summary: &AccountSummary, use_color: bool) -> String {
    let c = use_color;
    let usage = &summary.usage;
    let keys = if summary.api_keys.is_empty() {
        "-".to_string()
    } else {
        summary.api_keys.join(", ")
    };

    let mut rows = vec![("Account", summary.account_id.clone())];
    match &summary.info {
        Some(info) => {
            if !info.name.is_empty() {
                rows.push(("Name", info.name.clone()));
            }
            rows.push(("Platform", info.platform.label().to_string()));
            rows.push(("Status", info.status.clone()));
            rows.push(("Active", info.is_active.to_string()));
            rows.push(("Schedulable", info.schedulable.to_string()));
            if let Some(limit) = &info.rate_limit {
                let mut text = limit.status.clone();
                if let Some(at) = &limit.limited_at {
                    text.push_str(&format!(" since {at}"));
                }
                if let Some(minutes) = limit.duration {
                    text.push_str(&format!(" for {minutes}m"));
                }
                rows.push(("Rate limit", text));
            }
            if let Some(error) = &info.error_message {
                rows.push(("Error", error.clone()));
            }
        }
        None => rows.push(("Platform", "unknown (no account record)".to_string())),
    }
    if let Some(group) = &summary.group {
        rows.push((
            "Group",
            format!(
                "{} ({}/{} active)",
                if group.name.is_empty() { &group.id } else { &group.name },
                group.active_members,
                group.total_members
            ),
        ));
    }
    rows.extend([
        ("Date", summary.date.to_string()),
        ("Requests", format_number(summary.requests)),
        ("Input tokens", format_number(usage.input_tokens)),
        ("Output tokens", format_number(usage.output_tokens)),
        ("Cache write tokens", format_number(usage.cache_write_tokens())),
        ("Cache read tokens", format_number(usage.cache_read_tokens)),
        ("Total tokens", format_number(summary.total_tokens)),
        ("Cost", account_cost(summary)),
        ("Recent RPM", format_number(summary.recent_rpm)),
        ("API keys", keys),
    ]);
    let mut out = key_value_table(&rows, c).to_string();

    // quiet hours are left out
    let active: Vec<_> = summary
        .hourly
        .iter()
        .filter(|h| h.requests > 0 || h.tokens > 0)
        .collect();
    if !active.is_empty() {
        let mut table = create_styled_table();
        table.set_header(vec![
            header_cell("Hour", c),
            header_cell("Requests", c),
            header_cell("Tokens", c),
        ]);
        for h in active {
            table.add_row(vec![
                Cell::new(&h.hour),
                right_cell(&format_number(h.requests), None, false),
                right_cell(&format_number(h.tokens), None, false),
            ]);
        }
        out.push('\n');
        out.push_str(&table.to_string());
    }
    out
}

pub(crate) fn render_key(report: &KeyDailyUsage, use_color: bool) -> String {
    let c = use_color;
    let usage = &report.usage;
    let stored = report
        .stored_cost
        .map_or_else(|| "-".to_string(), format_cost);
    let mut rows = vec![
        ("API key", report.key_id.clone()),
        ("Date", report.date.to_string()),
        ("Requests", format_number(report.requests)),
        ("Total tokens", format_number(usage.total_tokens())),
        ("Recorded cost", stored),
        ("Computed cost", format_cost(report.cost.cost.total_cost)),
        ("Recent RPM", format_number(report.recent_rpm)),
    ];
    if !report.cost.is_complete() {
        rows.push(("Unpriced models", report.cost.unpriced_models.join(", ")));
    }
    let mut out = key_value_table(&rows, c).to_string();

    if !report.models.is_empty() {
        let mut table = create_styled_table();
        table.set_header(vec![
            header_cell("Model", c),
            header_cell("Input", c),
            header_cell("Output", c),
            header_cell("Cache Write", c),
            header_cell("Cache Read", c),
            header_cell("Cost", c),
        ]);
        for m in &report.models {
            let cost = if m.cost.has_pricing {
                format_cost(m.cost.total_cost)
            } else {
                "N/A".to_string()
            };
            table.add_row(vec![
                Cell::new(&m.model),
                right_cell(&format_number(m.usage.input_tokens), None, false),
                right_cell(&format_number(m.usage.output_tokens), None, false),
                right_cell(&format_number(m.usage.cache_write_tokens()), None, false),
                right_cell(&format_number(m.usage.cache_read_tokens), None, false),
                right_cell(&cost, cost_color(c), false),
            ]);
        }
        out.push('\n');
        out.push_str(&table.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::calculate_cost;
    use crate::pricing::PricingTable;
    use crate::stats::{account_summary, key_daily_usage};
    use crate::store::MemoryStore;

    fn sonnet() -> ModelPricing {
        ModelPricing {
            input: 3e-6,
            output: 15e-6,
            cache_write: 3.75e-6,
            cache_read: 0.3e-6,
            provider: Some("anthropic".to_string()),
        }
    }

    #[test]
    fn price_for_unknown_model() {
        let quote = PriceQuote {
            model: "mystery".to_string(),
            pricing: None,
            match_kind: None,
            ephemeral_1h: 0.0,
            long_context: None,
        };
        assert_eq!(render_price(&quote, false), "No pricing found for mystery");
    }

    #[test]
    fn price_lists_rates_per_million() {
        let quote = PriceQuote {
            model: "claude-sonnet-4".to_string(),
            pricing: Some(sonnet()),
            match_kind: None,
            ephemeral_1h: 0.000006,
            long_context: None,
        };
        let out = render_price(&quote, false);
        assert!(out.contains("$3.00/M"));
        assert!(out.contains("$15.00/M"));
        assert!(out.contains("$6.00/M"));
        assert!(out.contains("anthropic"));
    }

    #[test]
    fn cost_table_shows_total() {
        let mut table = PricingTable::default();
        table.insert("claude-sonnet-4".to_string(), sonnet());
        let usage = UsageRecord {
            input_tokens: 1_000_000,
            output_tokens: 500_000,
            ..UsageRecord::default()
        };
        let cost = calculate_cost(&usage, "claude-sonnet-4", &table);
        let out = render_cost("claude-sonnet-4", &usage, &cost, None, false);
        assert!(out.contains("$10.50"));
        assert!(out.contains("1,500,000"));
        assert!(!out.contains("Long context"));
    }

    #[test]
    fn cost_without_pricing() {
        let out = render_cost("x", &UsageRecord::default(), &CostBreakdown::default(), None, false);
        assert!(out.starts_with("No pricing found for x"));
    }

    #[test]
    fn empty_model_list() {
        assert_eq!(render_models(&[], false), "No models found.");
    }

    fn date() -> chrono::NaiveDate {
        chrono::NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    fn now() -> chrono::DateTime<chrono::FixedOffset> {
        chrono::DateTime::parse_from_rfc3339("2025-01-15T10:00:00+08:00").unwrap()
    }

    #[tokio::test]
    async fn account_shows_rate_limit_group_and_hours() {
        let mut store = MemoryStore::default();
        let record = "claude_account:acct-1";
        store.hset(record, "name", "primary");
        store.hset(record, "status", "active");
        store.hset(record, "rateLimitStatus", "limited");
        store.hset(record, "rateLimitDuration", "60");
        store.sadd("account_groups", "g1");
        store.sadd("account_group_members:g1", "acct-1");
        store.hset("account_group:g1", "name", "pool");
        store.hset("account_usage:hourly:acct-1:2025-01-15:08", "requests", "7");
        store.hset("account_usage:model:daily:acct-1:mystery:2025-01-15", "inputTokens", "10");

        let summary =
            account_summary(&store, &PricingTable::default(), "acct-1", date(), now()).await;
        let out = render_account(&summary, false);
        assert!(out.contains("primary"));
        assert!(out.contains("limited for 60m"));
        assert!(out.contains("pool (0/1 active)"));
        assert!(out.contains("08:00"));
        assert!(!out.contains("09:00"));
        assert!(out.contains("unpriced: mystery"));
    }

    #[tokio::test]
    async fn account_without_record() {
        let summary = account_summary(
            &MemoryStore::default(),
            &PricingTable::default(),
            "ghost",
            date(),
            now(),
        )
        .await;
        let out = render_account(&summary, false);
        assert!(out.contains("no account record"));
        assert!(!out.contains("Hour"));
    }

    #[tokio::test]
    async fn key_lists_unpriced_models() {
        let mut table = PricingTable::default();
        table.insert("claude-sonnet-4".to_string(), sonnet());
        let mut store = MemoryStore::default();
        store.hset("usage:model:daily:k1:claude-sonnet-4:2025-01-15", "inputTokens", "1000000");
        store.hset("usage:model:daily:k1:mystery:2025-01-15", "inputTokens", "1000");

        let report = key_daily_usage(&store, &table, "k1", date(), now()).await.unwrap();
        let out = render_key(&report, false);
        assert!(out.contains("Unpriced models"));
        assert!(out.contains("$3.00"));
        assert!(out.contains("N/A"));
    }
}
