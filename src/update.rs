//! Post-hoc patcher for `analysis_stats.json`.
//!
//! Asks the collection API how many objects changed since the model was last
//! retrained and records that next to the existing statistics as
//! `updated_since_retrain`. Every other field of the file is left as found.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{json, Map, Value};

use crate::error::UpdateError;

pub const DEFAULT_API_BASE: &str = "https://collectionapi.metmuseum.org";
pub const DEFAULT_OUTPUT_PATHS: [&str; 2] = ["static/analysis_stats.json", "public/analysis_stats.json"];
pub const OBJECTS_ENDPOINT: &str = "/public/collection/v1/objects";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

type Result<T> = std::result::Result<T, UpdateError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateConfig {
    /// `YYYY-MM-DD`, passed to the API verbatim.
    pub last_retrain_date: String,
    pub api_base: String,
    pub output_paths: Vec<PathBuf>,
}

impl UpdateConfig {
    /// Read `LAST_RETRAIN_DATE`, `MET_API_BASE` and `OUTPUT_PATHS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let last_retrain_date = lookup("LAST_RETRAIN_DATE")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(UpdateError::MissingEnv("LAST_RETRAIN_DATE"))?;

        let api_base = lookup("MET_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let output_paths: Vec<PathBuf> = match lookup("OUTPUT_PATHS") {
            Some(list) if !list.trim().is_empty() => list
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .collect(),
            _ => DEFAULT_OUTPUT_PATHS.iter().map(PathBuf::from).collect(),
        };

        Ok(UpdateConfig {
            last_retrain_date,
            api_base,
            output_paths,
        })
    }
}

// ---------------------------------------------------------------------------
// Collection API
// ---------------------------------------------------------------------------

/// Number of objects whose metadata changed on or after `metadata_date`.
pub fn fetch_updated_count(api_base: &str, metadata_date: &str) -> Result<u64> {
    let url = format!("{}{OBJECTS_ENDPOINT}", api_base.trim_end_matches('/'));
    let agent = ureq::config::Config::builder()
        .http_status_as_error(false)
        .timeout_global(Some(REQUEST_TIMEOUT))
        .build()
        .new_agent();

    let response = agent
        .get(url.as_str())
        .query("metadataDate", metadata_date)
        .call()
        .map_err(|e| UpdateError::Transport {
            url: url.clone(),
            message: e.to_string(),
        })?;

    let status = response.status().as_u16();
    if !(200..300).contains(&status) {
        return Err(UpdateError::Status { url, status });
    }

    let body: Value = response
        .into_body()
        .read_json()
        .map_err(|e| UpdateError::Response {
            url: url.clone(),
            message: e.to_string(),
        })?;
    count_from_response(&body).map_err(|message| UpdateError::Response { url, message })
}

/// `total` when present, otherwise the length of `objectIDs` (null counts as 0).
pub fn count_from_response(body: &Value) -> std::result::Result<u64, String> {
    let Some(object) = body.as_object() else {
        return Err("response is not a JSON object".into());
    };
    if let Some(total) = object.get("total") {
        return as_count(total).ok_or_else(|| format!("`total` is not a count: {total}"));
    }
    match object.get("objectIDs") {
        Some(Value::Array(ids)) => Ok(ids.len() as u64),
        Some(Value::Null) | None => Ok(0),
        Some(other) => Err(format!("`objectIDs` is not a list: {other}")),
    }
}

fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// File patching
// ---------------------------------------------------------------------------

/// `round(count / total_items * 100, 3)`, or 0.0 without a usable total.
pub fn updated_percentage(count: u64, total_items: f64) -> f64 {
    if total_items <= 0.0 || !total_items.is_finite() {
        return 0.0;
    }
    (count as f64 / total_items * 100.0 * 1000.0).round() / 1000.0
}

/// `total_items`, else `total`, else 0. Zero and null fall through.
fn total_items(stats: &Map<String, Value>) -> f64 {
    ["total_items", "total"]
        .iter()
        .filter_map(|key| stats.get(*key).and_then(Value::as_f64))
        .find(|v| *v != 0.0)
        .unwrap_or(0.0)
}

/// Add or replace `updated_since_retrain` in one stats document.
pub fn patch_stats(stats: &mut Map<String, Value>, count: u64, last_retrain_date: &str) -> f64 {
    let percentage = updated_percentage(count, total_items(stats));
    stats.insert(
        "updated_since_retrain".to_string(),
        json!({
            "count": count,
            "percentage": percentage,
            "last_retrain_date": last_retrain_date,
        }),
    );
    percentage
}

/// Rewrite one file in place. Returns `false` when the file does not exist.
pub fn patch_analysis_file(path: &Path, count: u64, last_retrain_date: &str) -> Result<bool> {
    if !path.exists() {
        log::info!("Skipping missing file: {}", path.display());
        return Ok(false);
    }
    let io_err = |source: std::io::Error| UpdateError::Io {
        path: path.to_path_buf(),
        source,
    };
    let text = std::fs::read_to_string(path).map_err(io_err)?;
    let mut value: Value = serde_json::from_str(&text).map_err(|source| UpdateError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let Some(stats) = value.as_object_mut() else {
        return Err(UpdateError::NotAnObject(path.to_path_buf()));
    };
    let percentage = patch_stats(stats, count, last_retrain_date);

    let mut out = serde_json::to_string_pretty(&value).map_err(|source| UpdateError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    out.push('\n');
    std::fs::write(path, out).map_err(io_err)?;
    log::info!(
        "Updated {} with count={count}, pct={percentage}%",
        path.display()
    );
    Ok(true)
}

/// Patch every configured file; returns how many were rewritten.
pub fn update_analysis_files(paths: &[PathBuf], count: u64, last_retrain_date: &str) -> Result<usize> {
    let mut updated = 0;
    for path in paths {
        if patch_analysis_file(path, count, last_retrain_date)? {
            updated += 1;
        }
    }
    Ok(updated)
}

/// Fetch once, then patch. Nothing is read from disk if the fetch fails.
pub fn run(config: &UpdateConfig) -> Result<usize> {
    log::info!(
        "Fetching updated objects since {} from {} ...",
        config.last_retrain_date,
        config.api_base
    );
    let count = fetch_updated_count(&config.api_base, &config.last_retrain_date)?;
    log::info!("Found {count} updated objects since last retrain");
    update_analysis_files(&config.output_paths, count, &config.last_retrain_date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn config_requires_retrain_date() {
        let err = UpdateConfig::from_lookup(lookup(&[("LAST_RETRAIN_DATE", "  ")])).unwrap_err();
        assert!(matches!(err, UpdateError::MissingEnv("LAST_RETRAIN_DATE")));
        assert_eq!(
            err.to_string(),
            "Missing required environment variable: LAST_RETRAIN_DATE"
        );
    }

    #[test]
    fn config_defaults_and_path_list() {
        let c = UpdateConfig::from_lookup(lookup(&[("LAST_RETRAIN_DATE", "2025-10-19")])).unwrap();
        assert_eq!(c.api_base, DEFAULT_API_BASE);
        assert_eq!(
            c.output_paths,
            vec![
                PathBuf::from("static/analysis_stats.json"),
                PathBuf::from("public/analysis_stats.json")
            ]
        );

        let c = UpdateConfig::from_lookup(lookup(&[
            ("LAST_RETRAIN_DATE", "2025-10-19"),
            ("OUTPUT_PATHS", " a.json, ,b/c.json "),
        ]))
        .unwrap();
        assert_eq!(c.output_paths, vec![PathBuf::from("a.json"), PathBuf::from("b/c.json")]);
    }

    #[test]
    fn count_prefers_total_then_object_ids() {
        assert_eq!(count_from_response(&json!({"total": 42, "objectIDs": [1]})), Ok(42));
        assert_eq!(count_from_response(&json!({"objectIDs": [1, 2, 3]})), Ok(3));
        assert_eq!(count_from_response(&json!({"objectIDs": null})), Ok(0));
        assert_eq!(count_from_response(&json!({})), Ok(0));
        assert!(count_from_response(&json!([1, 2])).is_err());
    }

    #[test]
    fn percentage_rounds_to_three_places() {
        assert_eq!(updated_percentage(1, 3.0), 33.333);
        assert_eq!(updated_percentage(10, 0.0), 0.0);
        assert_eq!(updated_percentage(5, 200.0), 2.5);
    }

    #[test]
    fn patch_keeps_existing_fields_and_order() {
        let mut stats = json!({"last_updated": "x", "total_items": 200, "accuracy": 0.9})
            .as_object()
            .cloned()
            .unwrap();
        let pct = patch_stats(&mut stats, 5, "2025-10-19");
        assert_eq!(pct, 2.5);
        let keys: Vec<&str> = stats.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["last_updated", "total_items", "accuracy", "updated_since_retrain"]);
        assert_eq!(stats["accuracy"], 0.9);
        assert_eq!(
            stats["updated_since_retrain"],
            json!({"count": 5, "percentage": 2.5, "last_retrain_date": "2025-10-19"})
        );
    }

    #[test]
    fn total_falls_back_and_zero_total_gives_zero() {
        let mut stats = json!({"total": 50}).as_object().cloned().unwrap();
        assert_eq!(patch_stats(&mut stats, 5, "d"), 10.0);

        let mut stats = json!({"total_items": 0}).as_object().cloned().unwrap();
        assert_eq!(patch_stats(&mut stats, 5, "d"), 0.0);
        assert_eq!(stats["updated_since_retrain"]["percentage"], 0.0);
    }

    #[test]
    fn files_are_rewritten_and_missing_ones_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("analysis_stats.json");
        std::fs::write(&present, r#"{"total_items": 4, "errors": {"correct": 3}}"#).unwrap();
        let missing = dir.path().join("nope/analysis_stats.json");

        let n = update_analysis_files(&[missing.clone(), present.clone()], 1, "2025-10-19").unwrap();
        assert_eq!(n, 1);
        assert!(!missing.exists());

        let text = std::fs::read_to_string(&present).unwrap();
        assert!(text.ends_with("}\n"));
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["errors"]["correct"], 3);
        assert_eq!(value["updated_since_retrain"]["percentage"], 25.0);
    }

    #[test]
    fn non_object_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis_stats.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(
            patch_analysis_file(&path, 1, "d"),
            Err(UpdateError::NotAnObject(_))
        ));
    }
}
