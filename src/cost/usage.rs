//! Token usage records
//!
//! Counters come from provider usage JSON or from store hash buckets whose
//! values are strings. Anything missing or malformed counts as zero.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One billable event or an aggregated bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct UsageRecord {
    #[serde(default, deserialize_with = "lenient_count")]
    pub(crate) input_tokens: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub(crate) output_tokens: u64,
    /// Legacy single-tier cache write count
    #[serde(
        default,
        rename = "cache_creation_input_tokens",
        deserialize_with = "lenient_count"
    )]
    pub(crate) cache_creation_tokens: u64,
    #[serde(
        default,
        rename = "cache_read_input_tokens",
        deserialize_with = "lenient_count"
    )]
    pub(crate) cache_read_tokens: u64,
    /// Structured cache write split; supersedes the legacy count when present
    #[serde(
        default,
        rename = "cache_creation",
        deserialize_with = "lenient_split",
        skip_serializing_if = "Option::is_none"
    )]
    pub(crate) ephemeral: Option<EphemeralSplit>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub(crate) struct EphemeralSplit {
    #[serde(rename = "ephemeral_5m_input_tokens")]
    pub(crate) five_minute_tokens: u64,
    #[serde(rename = "ephemeral_1h_input_tokens")]
    pub(crate) one_hour_tokens: u64,
}

impl EphemeralSplit {
    pub(crate) fn total(&self) -> u64 {
        self.five_minute_tokens.saturating_add(self.one_hour_tokens)
    }
}

pub(crate) fn count_from_value(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().and_then(float_count))
            .unwrap_or(0),
        Value::String(s) => count_from_str(s),
        _ => 0,
    }
}

pub(crate) fn count_from_str(s: &str) -> u64 {
    let trimmed = s.trim();
    trimmed
        .parse::<u64>()
        .ok()
        .or_else(|| trimmed.parse::<f64>().ok().and_then(float_count))
        .unwrap_or(0)
}

fn float_count(f: f64) -> Option<u64> {
    (f.is_finite() && f >= 0.0).then_some(f as u64)
}

fn lenient_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(count_from_value(&value))
}

fn lenient_split<'de, D>(deserializer: D) -> Result<Option<EphemeralSplit>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Object(map) = value else {
        return Ok(None);
    };
    let field = |key: &str| map.get(key).map_or(0, count_from_value);
    Ok(Some(EphemeralSplit {
        five_minute_tokens: field("ephemeral_5m_input_tokens"),
        one_hour_tokens: field("ephemeral_1h_input_tokens"),
    }))
}

impl UsageRecord {
    /// Decode a store hash bucket (`inputTokens`, `cacheCreateTokens`, ...).
    /// Aggregated buckets may use `total*` field names instead.
    pub(crate) fn from_hash(fields: &HashMap<String, String>) -> Self {
        let count = |names: &[&str]| {
            names
                .iter()
                .map(|name| fields.get(*name).map_or(0, |v| count_from_str(v)))
                .find(|&n| n > 0)
                .unwrap_or(0)
        };

        let has_split = fields.contains_key("ephemeral5mTokens")
            || fields.contains_key("ephemeral1hTokens");

        UsageRecord {
            input_tokens: count(&["inputTokens", "totalInputTokens"]),
            output_tokens: count(&["outputTokens", "totalOutputTokens"]),
            cache_creation_tokens: count(&["cacheCreateTokens", "totalCacheCreateTokens"]),
            cache_read_tokens: count(&["cacheReadTokens", "totalCacheReadTokens"]),
            ephemeral: has_split.then(|| EphemeralSplit {
                five_minute_tokens: count(&["ephemeral5mTokens"]),
                one_hour_tokens: count(&["ephemeral1hTokens"]),
            }),
        }
    }

    /// Cache write tokens, preferring the structured split.
    pub(crate) fn cache_write_tokens(&self) -> u64 {
        match self.ephemeral {
            Some(split) => split.total(),
            None => self.cache_creation_tokens,
        }
    }

    /// Tokens counted against the long-context threshold
    pub(crate) fn input_side_tokens(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.cache_write_tokens())
            .saturating_add(self.cache_read_tokens)
    }

    pub(crate) fn total_tokens(&self) -> u64 {
        self.input_side_tokens().saturating_add(self.output_tokens)
    }
}
