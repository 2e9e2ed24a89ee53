use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

const FALLBACK: &str = r#"{
  "claude-sonnet-4-20250514": {
    "input_cost_per_token": 3e-06,
    "output_cost_per_token": 1.5e-05,
    "cache_creation_input_token_cost": 3.75e-06,
    "cache_read_input_token_cost": 3e-07,
    "litellm_provider": "anthropic"
  },
  "claude-3-opus-20240229": {
    "input_cost_per_token": 1.5e-05,
    "output_cost_per_token": 7.5e-05,
    "litellm_provider": "anthropic"
  },
  "gpt-4o": {
    "input_cost_per_token": "2.5e-06",
    "output_cost_per_token": 1e-05,
    "litellm_provider": "openai"
  }
}"#;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "relaycost-{prefix}-{}-{nanos}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(path, content).expect("write test file");
}

/// Temp root with a fallback pricing file and an empty data dir
struct Env {
    root: PathBuf,
    data_dir: PathBuf,
    fallback: PathBuf,
}

impl Env {
    fn new(prefix: &str, fallback: Option<&str>) -> Self {
        let root = unique_temp_dir(prefix);
        let fallback_path = root.join("resources").join("fallback.json");
        if let Some(content) = fallback {
            write_file(&fallback_path, content);
        }
        Env {
            data_dir: root.join("data"),
            fallback: fallback_path,
            root,
        }
    }

    fn run(&self, args: &[&str]) -> (bool, Vec<u8>, Vec<u8>) {
        let bin = std::env::var("CARGO_BIN_EXE_relaycost").unwrap_or_else(|_| {
            let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
            path.push("target");
            path.push("debug");
            if cfg!(windows) {
                path.push("relaycost.exe");
            } else {
                path.push("relaycost");
            }
            path.to_string_lossy().into_owned()
        });
        let output = Command::new(bin)
            .arg("--offline")
            .arg("--timezone")
            .arg("UTC")
            .arg("--data-dir")
            .arg(&self.data_dir)
            .arg("--fallback-file")
            .arg(&self.fallback)
            .args(args)
            // keep the user's config file and environment out of the run
            .env("HOME", &self.root)
            .env("XDG_CONFIG_HOME", self.root.join(".config"))
            .env_remove("RELAYCOST_DATA_DIR")
            .env_remove("RELAYCOST_FALLBACK_FILE")
            .env_remove("RELAYCOST_PRICING_URL")
            .env_remove("REDIS_URL")
            .env_remove("RUST_LOG")
            .output()
            .expect("run relaycost");
        (output.status.success(), output.stdout, output.stderr)
    }

    fn run_json(&self, args: &[&str]) -> Value {
        let (ok, stdout, stderr) = self.run(args);
        assert!(ok, "stderr: {}", String::from_utf8_lossy(&stderr));
        serde_json::from_slice(&stdout).expect("json")
    }
}

#[test]
fn status_json_reports_fallback_models() {
    let env = Env::new("status", Some(FALLBACK));
    let json = env.run_json(&["status", "--json"]);
    assert_eq!(json["initialized"], true);
    assert_eq!(json["model_count"], 3);
    assert!(json["last_updated"].is_string());
    assert!(json["next_update"].is_string());
    // fallback data is copied into the cache location
    assert!(env.data_dir.join("model_pricing.json").exists());
}

#[test]
fn status_without_any_pricing_source() {
    let env = Env::new("empty", None);
    let json = env.run_json(&["status", "--json"]);
    assert_eq!(json["initialized"], true);
    assert_eq!(json["model_count"], 0);
    assert!(json["last_updated"].is_null());
}

#[test]
fn cached_file_wins_over_fallback() {
    let env = Env::new("cached", Some(FALLBACK));
    write_file(
        &env.data_dir.join("model_pricing.json"),
        r#"{"only-cached": {"input_cost_per_token": 1e-06, "output_cost_per_token": 2e-06}}"#,
    );
    let json = env.run_json(&["models", "--json"]);
    let models = json.as_array().expect("array output");
    assert_eq!(models.len(), 1);
    assert_eq!(models[0]["model"], "only-cached");
}

#[test]
fn cost_json_input_output() {
    let env = Env::new("cost", Some(FALLBACK));
    let json = env.run_json(&[
        "cost",
        "claude-sonnet-4-20250514",
        "--input",
        "1000000",
        "--output",
        "500000",
        "--json",
    ]);
    assert_eq!(json["has_pricing"], true);
    assert_eq!(json["is_long_context_request"], false);
    let total = json["total_cost"].as_f64().unwrap();
    assert!((total - 10.5).abs() < 1e-9, "total {total}");
    let input = json["input_cost"].as_f64().unwrap();
    assert!((input - 3.0).abs() < 1e-9);
}

#[test]
fn cost_json_from_usage_payload() {
    let env = Env::new("cost-usage", Some(FALLBACK));
    let usage = r#"{"input_tokens":0,"output_tokens":0,"cache_creation":{"ephemeral_5m_input_tokens":0,"ephemeral_1h_input_tokens":1000}}"#;
    let json = env.run_json(&[
        "cost",
        "claude-sonnet-4-20250514",
        "--usage",
        usage,
        "--json",
    ]);
    let one_hour = json["ephemeral_1h_cost"].as_f64().unwrap();
    assert!((one_hour - 0.006).abs() < 1e-12);
    assert_eq!(json["cache_write_cost"], json["ephemeral_1h_cost"]);
}

#[test]
fn long_context_request_uses_flat_rates() {
    let env = Env::new("long-context", Some(FALLBACK));
    let json = env.run_json(&[
        "cost",
        "claude-sonnet-4-20250514[1m]",
        "--input",
        "200001",
        "--json",
    ]);
    assert_eq!(json["is_long_context_request"], true);
    assert_eq!(json["pricing"]["input"], 0.000006);
}

#[test]
fn cost_for_unknown_model_is_zero() {
    let env = Env::new("cost-unknown", Some(FALLBACK));
    let json = env.run_json(&["cost", "mystery-model", "--input", "1000", "--json"]);
    assert_eq!(json["has_pricing"], false);
    assert_eq!(json["total_cost"], 0.0);
}

#[test]
fn price_for_unknown_model_exits_zero() {
    let env = Env::new("price-unknown", Some(FALLBACK));
    let (ok, stdout, stderr) = env.run(&["price", "mystery-model"]);
    assert!(ok, "stderr: {}", String::from_utf8_lossy(&stderr));
    assert!(String::from_utf8_lossy(&stdout).contains("No pricing found for mystery-model"));
}

#[test]
fn price_json_resolves_region_and_fuzzy_ids() {
    let env = Env::new("price", Some(FALLBACK));
    let json = env.run_json(&["price", "claude-3-opus", "--json"]);
    assert_eq!(json["match_kind"], "fuzzy");
    assert_eq!(json["pricing"]["input"], 0.000015);
    // backfilled from input
    let cache_write = json["pricing"]["cache_write"].as_f64().unwrap();
    assert!((cache_write - 0.00001875).abs() < 1e-15);
    assert_eq!(json["ephemeral_1h"], 0.00003);
}

#[test]
fn models_filter_is_case_insensitive() {
    let env = Env::new("models", Some(FALLBACK));
    let json = env.run_json(&["models", "CLAUDE", "--json"]);
    let names: Vec<&str> = json
        .as_array()
        .expect("array output")
        .iter()
        .map(|m| m["model"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["claude-3-opus-20240229", "claude-sonnet-4-20250514"]);
}

#[test]
fn account_cost_from_snapshot() {
    let env = Env::new("account", Some(FALLBACK));
    let snapshot = env.root.join("snapshot.json");
    write_file(
        &snapshot,
        r#"{
            "apikey:k1": {"name": "relay key", "claudeAccountId": "acct-1"},
            "claude_account:acct-1": {"name": "primary", "rateLimitStatus": "limited", "rateLimitDuration": 60},
            "account_groups": ["g1"],
            "account_group_members:g1": ["acct-1", "acct-2"],
            "account_usage:hourly:acct-1:2025-01-15:10": {"requests": 3, "allTokens": 900},
            "usage:cost:daily:k1:2025-01-15": "1.25",
            "account_usage:daily:acct-1:2025-01-15": {"inputTokens": "1000", "requests": "4"}
        }"#,
    );
    let json = env.run_json(&[
        "account",
        "acct-1",
        "--date",
        "2025-01-15",
        "--snapshot",
        snapshot.to_str().unwrap(),
        "--json",
    ]);
    assert_eq!(json["cost"]["source"], "api_keys");
    assert_eq!(json["cost"]["cost"], 1.25);
    assert_eq!(json["requests"], 4);
    assert_eq!(json["api_keys"][0], "k1");
    assert_eq!(json["info"]["platform"], "claude");
    assert_eq!(json["info"]["rate_limit"]["status"], "limited");
    assert_eq!(json["info"]["rate_limit"]["duration"], 60);
    assert_eq!(json["group"]["total_members"], 2);
    let hourly = json["hourly"].as_array().expect("hourly series");
    assert_eq!(hourly.len(), 24);
    assert_eq!(hourly[10]["tokens"], 900);
}

#[test]
fn key_usage_from_snapshot() {
    let env = Env::new("key", Some(FALLBACK));
    let snapshot = env.root.join("snapshot.json");
    write_file(
        &snapshot,
        r#"{
            "usage:daily:k1:20250115": {"inputTokens": "1"},
            "usage:daily:k1:2025-01-15": {"inputTokens": "1000000", "requests": "2"},
            "usage:model:daily:k1:claude-sonnet-4-20250514:2025-01-15": {"inputTokens": "1000000"}
        }"#,
    );
    let json = env.run_json(&[
        "key",
        "k1",
        "--date",
        "20250115",
        "--snapshot",
        snapshot.to_str().unwrap(),
        "--json",
    ]);
    assert_eq!(json["requests"], 2);
    assert_eq!(json["models"][0]["model"], "claude-sonnet-4-20250514");
    let total = json["cost"]["total_cost"].as_f64().unwrap();
    assert!((total - 3.0).abs() < 1e-9);
}

#[test]
fn account_without_store_fails() {
    let env = Env::new("no-store", Some(FALLBACK));
    let (ok, _stdout, stderr) = env.run(&["account", "acct-1"]);
    assert!(!ok);
    assert!(String::from_utf8_lossy(&stderr).contains("No store configured"));
}

#[test]
fn invalid_date_exits_with_error() {
    let env = Env::new("bad-date", Some(FALLBACK));
    let snapshot = env.root.join("snapshot.json");
    write_file(&snapshot, "{}");
    let (ok, _stdout, stderr) = env.run(&[
        "key",
        "k1",
        "--date",
        "15/01/2025",
        "--snapshot",
        snapshot.to_str().unwrap(),
    ]);
    assert!(!ok);
    assert!(String::from_utf8_lossy(&stderr).contains("Invalid date"));
}

#[test]
fn invalid_usage_json_exits_with_error() {
    let env = Env::new("bad-usage", Some(FALLBACK));
    let (ok, _stdout, stderr) = env.run(&["cost", "gpt-4o", "--usage", "{oops"]);
    assert!(!ok);
    assert!(String::from_utf8_lossy(&stderr).contains("Invalid usage JSON"));
}
