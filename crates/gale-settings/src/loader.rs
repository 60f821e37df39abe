//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`EngineSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `GALE_*` environment overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::EngineSettings;

/// Load settings from `path` with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or out-of-range values are
/// errors.
pub fn load_settings_from_path(path: &Path) -> Result<EngineSettings> {
    let defaults = serde_json::to_value(EngineSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: EngineSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply process environment overrides.
pub fn apply_env_overrides(settings: &mut EngineSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Invalid values are ignored with a warning (fall back to file/default).
pub fn apply_overrides_from<F>(settings: &mut EngineSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let read_string = |name: &str| lookup(name).filter(|v| !v.is_empty());
    let read_u32 = |name: &str, min: u32, max: u32| {
        let val = lookup(name)?;
        let result = parse_u32_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u32 env var, ignoring");
        }
        result
    };

    if let Some(v) = read_string("GALE_DEFAULT_MODEL") {
        settings.default_model = v;
    }
    if let Some(v) = read_u32("GALE_MAX_ITERATIONS", 1, 100_000) {
        settings.max_iterations = v;
    }
    if let Some(v) = read_u32("GALE_MAX_INJECTION_LOOPS", 0, 1_000) {
        settings.max_injection_loops = v;
    }
    if let Some(v) = read_string("GALE_LOG_LEVEL") {
        settings.log_level = v;
    }
    if let Some(v) = read_string("GALE_GOOGLE_BASE_URL") {
        settings.google.base_url = v;
    }
}

/// Parse a string as a `u32` within a range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::errors::SettingsError;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"google": {"baseUrl": "a", "apiKeyEnv": "K"}});
        let source = serde_json::json!({"google": {"baseUrl": "b"}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["google"]["baseUrl"], "b");
        assert_eq!(merged["google"]["apiKeyEnv"], "K");
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4, 5]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["items"], serde_json::json!([4, 5]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let path = Path::new("/nonexistent/gale.json");
        let settings = load_settings_from_path(path).unwrap();
        assert_eq!(settings.max_iterations, EngineSettings::default().max_iterations);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gale.json");
        std::fs::write(&path, r#"{"maxIterations": 12, "google": {"baseUrl": "http://x"}}"#)
            .unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.max_iterations, 12);
        assert_eq!(settings.google.base_url, "http://x");
        assert_eq!(settings.google.api_key_env, "GEMINI_API_KEY");
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gale.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_settings_from_path(&path);
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn load_zero_iterations_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gale.json");
        std::fs::write(&path, r#"{"maxIterations": 0}"#).unwrap();

        let result = load_settings_from_path(&path);
        assert!(matches!(result.unwrap_err(), SettingsError::InvalidValue(_)));
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn overrides_apply() {
        let mut settings = EngineSettings::default();
        apply_overrides_from(
            &mut settings,
            lookup(&[
                ("GALE_DEFAULT_MODEL", "gemini-2.5-flash"),
                ("GALE_MAX_ITERATIONS", "3"),
                ("GALE_MAX_INJECTION_LOOPS", "0"),
                ("GALE_LOG_LEVEL", "debug"),
            ]),
        );
        assert_eq!(settings.default_model, "gemini-2.5-flash");
        assert_eq!(settings.max_iterations, 3);
        assert_eq!(settings.max_injection_loops, 0);
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn invalid_override_is_ignored() {
        let mut settings = EngineSettings::default();
        apply_overrides_from(
            &mut settings,
            lookup(&[("GALE_MAX_ITERATIONS", "0"), ("GALE_DEFAULT_MODEL", "")]),
        );
        assert_eq!(settings.max_iterations, 100);
        assert_eq!(settings.default_model, "gemini-3-pro-preview");
    }

    #[test]
    fn parse_u32_range_bounds() {
        assert_eq!(parse_u32_range("5", 1, 10), Some(5));
        assert_eq!(parse_u32_range(" 10 ", 1, 10), Some(10));
        assert_eq!(parse_u32_range("11", 1, 10), None);
        assert_eq!(parse_u32_range("abc", 1, 10), None);
    }
}
