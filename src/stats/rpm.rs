use chrono::{DateTime, Duration, FixedOffset};
use tracing::warn;

use crate::cost::count_from_str;
use crate::store::{KvStore, StoreCommand};

use super::date_key;

/// Average requests per minute over the last `minutes` minutes, read from the
/// hourly buckets `{prefix}:hourly:{id}:{date}:{HH}`. Each minute looks up
/// the bucket of the hour it falls in, so a busy hour is counted once per
/// minute spent in it. Store failures read as 0.
pub(crate) async fn requests_per_minute<S: KvStore>(
    store: &S,
    prefix: &str,
    id: &str,
    now: DateTime<FixedOffset>,
    minutes: u32,
) -> u64 {
    if minutes == 0 {
        return 0;
    }

    let commands: Vec<StoreCommand> = (0..minutes)
        .map(|i| {
            let at = now - Duration::minutes(i64::from(i));
            let key = format!(
                "{prefix}:hourly:{id}:{}:{}",
                date_key(at.date_naive()),
                at.format("%H")
            );
            StoreCommand::hget(key, "requests")
        })
        .collect();

    match store.pipeline(&commands).await {
        Ok(replies) => {
            let total: u64 = replies
                .iter()
                .map(|reply| reply.as_deref().map_or(0, count_from_str))
                .sum();
            (total as f64 / f64::from(minutes)).round() as u64
        }
        Err(e) => {
            warn!(prefix, id, error = %e, "failed to read hourly request counters");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[tokio::test]
    async fn averages_current_hour() {
        let mut store = MemoryStore::default();
        store.hset("usage:hourly:k1:2025-01-15:10", "requests", "7");
        let rpm = requests_per_minute(&store, "usage", "k1", at("2025-01-15T10:30:00+08:00"), 10).await;
        // 10 lookups of the same bucket: 70 / 10
        assert_eq!(rpm, 7);
    }

    #[tokio::test]
    async fn window_spans_hour_and_date_boundary() {
        let mut store = MemoryStore::default();
        store.hset("account_usage:hourly:a1:2025-01-15:23", "requests", "3");
        store.hset("account_usage:hourly:a1:2025-01-16:00", "requests", "6");
        // 00:04 back to 23:55: 5 minutes in hour 00, 5 in hour 23
        let rpm = requests_per_minute(
            &store,
            "account_usage",
            "a1",
            at("2025-01-16T00:04:00+00:00"),
            10,
        )
        .await;
        // (5 * 6 + 5 * 3) / 10 = 4.5
        assert_eq!(rpm, 5);
    }

    #[tokio::test]
    async fn missing_buckets_and_zero_window() {
        let store = MemoryStore::default();
        let now = at("2025-01-15T10:30:00+00:00");
        assert_eq!(requests_per_minute(&store, "usage", "k1", now, 10).await, 0);
        assert_eq!(requests_per_minute(&store, "usage", "k1", now, 0).await, 0);
    }
}
