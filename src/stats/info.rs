//! Account records, group membership and hourly activity
//!
//! Each upstream platform keeps its account hashes under its own prefix.
//! Lookups try the prefixes in a fixed order and take the first non-empty hash.

use std::collections::HashMap;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use serde::Serialize;
use tracing::debug;

use crate::cost::count_from_str;
use crate::error::StoreError;
use crate::store::{KvStore, StoreCommand};

use super::date_key;

/// Members used within this window count as active
const ACTIVE_WINDOW_MINUTES: i64 = 10;
const DEFAULT_PRIORITY: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum Platform {
    ClaudeConsole,
    Claude,
    Gemini,
    Openai,
    Bedrock,
    AzureOpenai,
}

impl Platform {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Platform::ClaudeConsole => "claude-console",
            Platform::Claude => "claude",
            Platform::Gemini => "gemini",
            Platform::Openai => "openai",
            Platform::Bedrock => "bedrock",
            Platform::AzureOpenai => "azure-openai",
        }
    }
}

const ACCOUNT_PREFIXES: &[(&str, Platform)] = &[
    ("claude_console_account:", Platform::ClaudeConsole),
    ("claude_account:", Platform::Claude),
    ("claude:account:", Platform::Claude),
    ("gemini_account:", Platform::Gemini),
    ("openai:account:", Platform::Openai),
    ("bedrock_account:", Platform::Bedrock),
    ("azure_openai:account:", Platform::AzureOpenai),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct RateLimit {
    pub(crate) status: String,
    pub(crate) limited_at: Option<String>,
    /// Minutes, as the relay records it
    pub(crate) duration: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct AccountInfo {
    pub(crate) name: String,
    pub(crate) platform: Platform,
    pub(crate) status: String,
    pub(crate) account_type: String,
    pub(crate) is_active: bool,
    pub(crate) schedulable: bool,
    pub(crate) priority: u32,
    pub(crate) last_used_at: Option<String>,
    pub(crate) error_message: Option<String>,
    pub(crate) rate_limit: Option<RateLimit>,
}

impl AccountInfo {
    fn from_hash(platform: Platform, data: &HashMap<String, String>) -> Self {
        let text = |name: &str| {
            data.get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let flag = |name: &str| data.get(name).is_some_and(|v| v == "true");

        let rate_limit = text("rateLimitStatus").map(|status| RateLimit {
            status,
            limited_at: text("rateLimitedAt"),
            duration: text("rateLimitDuration").and_then(|v| v.parse().ok()),
        });

        AccountInfo {
            name: text("name").unwrap_or_default(),
            platform,
            status: text("status").unwrap_or_else(|| "created".to_string()),
            account_type: text("accountType").unwrap_or_else(|| "dedicated".to_string()),
            is_active: flag("isActive"),
            schedulable: flag("schedulable"),
            priority: text("priority")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PRIORITY),
            last_used_at: text("lastUsedAt"),
            error_message: text("errorMessage"),
            rate_limit,
        }
    }

    fn used_since(&self, cutoff: DateTime<FixedOffset>) -> bool {
        self.last_used_at
            .as_deref()
            .and_then(|at| DateTime::parse_from_rfc3339(at).ok())
            .is_some_and(|at| at > cutoff)
    }
}

pub(crate) async fn account_info<S: KvStore>(
    store: &S,
    account_id: &str,
) -> Result<Option<AccountInfo>, StoreError> {
    for (prefix, platform) in ACCOUNT_PREFIXES {
        let data = store.hash_get_all(&format!("{prefix}{account_id}")).await?;
        if !data.is_empty() {
            return Ok(Some(AccountInfo::from_hash(*platform, &data)));
        }
    }
    debug!(account_id, "no account record under any platform prefix");
    Ok(None)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct AccountGroup {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) total_members: usize,
    pub(crate) active_members: usize,
}

/// First group in `account_groups` that lists the account as a member.
pub(crate) async fn account_group<S: KvStore>(
    store: &S,
    account_id: &str,
    now: DateTime<FixedOffset>,
) -> Result<Option<AccountGroup>, StoreError> {
    for group_id in store.set_members("account_groups").await? {
        let members = store
            .set_members(&format!("account_group_members:{group_id}"))
            .await?;
        if !members.iter().any(|m| m == account_id) {
            continue;
        }

        let details = store.hash_get_all(&format!("account_group:{group_id}")).await?;
        let cutoff = now - Duration::minutes(ACTIVE_WINDOW_MINUTES);
        let mut active_members = 0;
        for member in &members {
            if account_info(store, member)
                .await?
                .is_some_and(|info| info.used_since(cutoff))
            {
                active_members += 1;
            }
        }

        return Ok(Some(AccountGroup {
            name: details.get("name").cloned().unwrap_or_default(),
            id: group_id,
            total_members: members.len(),
            active_members,
        }));
    }
    Ok(None)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct HourlyUsage {
    /// `HH:00`
    pub(crate) hour: String,
    pub(crate) requests: u64,
    pub(crate) tokens: u64,
}

/// All 24 hourly buckets of one day, zero-filled.
pub(crate) async fn account_hourly<S: KvStore>(
    store: &S,
    account_id: &str,
    date: NaiveDate,
) -> Result<Vec<HourlyUsage>, StoreError> {
    let day = date_key(date);
    let commands: Vec<StoreCommand> = (0..24)
        .flat_map(|hour| {
            let key = format!("account_usage:hourly:{account_id}:{day}:{hour:02}");
            [
                StoreCommand::hget(key.clone(), "requests"),
                StoreCommand::hget(key.clone(), "allTokens"),
                StoreCommand::hget(key, "tokens"),
            ]
        })
        .collect();
    let replies = store.pipeline(&commands).await?;

    let count = |reply: &Option<String>| reply.as_deref().map_or(0, count_from_str);
    Ok(replies
        .chunks(3)
        .enumerate()
        .map(|(hour, bucket)| {
            let all_tokens = bucket.get(1).map_or(0, count);
            HourlyUsage {
                hour: format!("{hour:02}:00"),
                requests: bucket.first().map_or(0, count),
                tokens: if all_tokens > 0 {
                    all_tokens
                } else {
                    bucket.get(2).map_or(0, count)
                },
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2025-01-15T12:00:00+08:00").unwrap()
    }

    #[tokio::test]
    async fn info_tries_platform_prefixes_in_order() {
        let mut store = MemoryStore::default();
        store.hset("gemini_account:acct-1", "name", "gemini one");
        store.hset("claude_account:acct-1", "name", "claude one");
        store.hset("claude_account:acct-1", "isActive", "true");

        let info = account_info(&store, "acct-1").await.unwrap().unwrap();
        assert_eq!(info.platform, Platform::Claude);
        assert_eq!(info.name, "claude one");
        assert!(info.is_active);
        assert_eq!(info.status, "created");
        assert_eq!(info.account_type, "dedicated");
        assert_eq!(info.priority, 50);
        assert!(info.rate_limit.is_none());

        assert!(account_info(&store, "acct-9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn info_reads_rate_limit_state() {
        let mut store = MemoryStore::default();
        let key = "azure_openai:account:acct-1";
        store.hset(key, "status", "active");
        store.hset(key, "rateLimitStatus", "limited");
        store.hset(key, "rateLimitedAt", "2025-01-15T03:00:00Z");
        store.hset(key, "rateLimitDuration", "60");
        store.hset(key, "priority", "not a number");

        let info = account_info(&store, "acct-1").await.unwrap().unwrap();
        assert_eq!(info.platform, Platform::AzureOpenai);
        assert_eq!(info.platform.label(), "azure-openai");
        assert_eq!(info.priority, 50);
        assert_eq!(
            info.rate_limit,
            Some(RateLimit {
                status: "limited".to_string(),
                limited_at: Some("2025-01-15T03:00:00Z".to_string()),
                duration: Some(60),
            })
        );
    }

    #[tokio::test]
    async fn group_counts_recently_used_members() {
        let mut store = MemoryStore::default();
        store.sadd("account_groups", "g-other");
        store.sadd("account_groups", "g1");
        store.sadd("account_group_members:g-other", "acct-9");
        for member in ["acct-1", "acct-2", "acct-3"] {
            store.sadd("account_group_members:g1", member);
        }
        store.hset("account_group:g1", "name", "pool");
        // five minutes ago, an hour ago, and never
        store.hset("claude_account:acct-1", "lastUsedAt", "2025-01-15T03:55:00Z");
        store.hset("claude_account:acct-2", "lastUsedAt", "2025-01-15T11:00:00+08:00");
        store.hset("claude_account:acct-3", "name", "idle");

        let group = account_group(&store, "acct-2", now()).await.unwrap().unwrap();
        assert_eq!(
            group,
            AccountGroup {
                id: "g1".to_string(),
                name: "pool".to_string(),
                total_members: 3,
                active_members: 1,
            }
        );
        assert!(account_group(&store, "acct-4", now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn hourly_series_is_zero_filled() {
        let mut store = MemoryStore::default();
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        store.hset("account_usage:hourly:acct-1:2025-01-15:09", "requests", "12");
        store.hset("account_usage:hourly:acct-1:2025-01-15:09", "allTokens", "3400");
        store.hset("account_usage:hourly:acct-1:2025-01-15:23", "tokens", "50");

        let hours = account_hourly(&store, "acct-1", date).await.unwrap();
        assert_eq!(hours.len(), 24);
        assert_eq!(hours[0].hour, "00:00");
        assert_eq!(hours[0].requests, 0);
        assert_eq!(
            hours[9],
            HourlyUsage {
                hour: "09:00".to_string(),
                requests: 12,
                tokens: 3400,
            }
        );
        assert_eq!(hours[23].tokens, 50);
    }
}
