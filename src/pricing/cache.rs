use std::path::Path;
use std::time::{Duration, SystemTime};

use serde_json::Value;

use crate::error::PricingError;

use super::resolver::RawPricing;

/// Accept only a non-empty JSON object as pricing data.
pub(super) fn into_raw_pricing(value: Value) -> Result<RawPricing, PricingError> {
    match value {
        Value::Object(map) if !map.is_empty() => Ok(map),
        _ => Err(PricingError::EmptyTable),
    }
}

pub(super) async fn load_raw(path: &Path) -> Result<RawPricing, PricingError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| PricingError::io(path, e))?;
    let value: Value = serde_json::from_slice(&bytes)?;
    into_raw_pricing(value)
}

pub(super) async fn save_raw(path: &Path, raw_data: &RawPricing) -> Result<(), PricingError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PricingError::io(parent, e))?;
    }
    let body = serde_json::to_vec_pretty(raw_data)?;
    tokio::fs::write(path, body)
        .await
        .map_err(|e| PricingError::io(path, e))
}

pub(super) async fn modified_at(path: &Path) -> Option<SystemTime> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    meta.modified().ok()
}

/// Age of the file; `None` if it is missing or its mtime is unreadable.
pub(super) async fn file_age(path: &Path) -> Option<Duration> {
    let modified = modified_at(path).await?;
    // mtime in the future counts as brand new
    Some(SystemTime::now().duration_since(modified).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("model_pricing.json");
        let raw = into_raw_pricing(json!({ "m": { "input_cost_per_token": 1e-6 } })).unwrap();

        save_raw(&path, &raw).await.unwrap();
        let loaded = load_raw(&path).await.unwrap();
        assert_eq!(loaded, raw);
        assert!(file_age(&path).await.unwrap() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn load_rejects_empty_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.json");
        std::fs::write(&path, "{}").unwrap();
        assert!(matches!(load_raw(&path).await, Err(PricingError::EmptyTable)));
    }

    #[tokio::test]
    async fn load_rejects_torn_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.json");
        std::fs::write(&path, r#"{"m": {"input_cost_per"#).unwrap();
        assert!(matches!(load_raw(&path).await, Err(PricingError::Parse(_))));
    }

    #[tokio::test]
    async fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert!(matches!(load_raw(&path).await, Err(PricingError::Io { .. })));
        assert!(file_age(&path).await.is_none());
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(into_raw_pricing(json!([1, 2])).is_err());
    }
}
