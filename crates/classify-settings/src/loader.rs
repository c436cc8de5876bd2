//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ClassifySettings::default()`]
//! 2. If `~/.classify/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::ClassifySettings;

/// Resolve the path to the settings file (`~/.classify/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".classify").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ClassifySettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<ClassifySettings> {
    let defaults = serde_json::to_value(ClassifySettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: ClassifySettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
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

/// Apply environment variable overrides to loaded settings.
///
/// Each env var has strict parsing rules:
/// - Integers must be valid and within the specified range
/// - Booleans accept: `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`
/// - Invalid values are silently ignored (fall back to file/default)
pub fn apply_env_overrides(settings: &mut ClassifySettings) {
    // ── Server settings ─────────────────────────────────────────────
    if let Some(v) = read_env_string("CLASSIFY_SOCKET_ENDPOINT") {
        settings.server.socket_endpoint = v;
    }
    if let Some(v) = read_env_bool("CLASSIFY_OFFLINE") {
        settings.server.offline = v;
    }
    if let Some(v) = read_env_string("CLASSIFY_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_env_u16("CLASSIFY_PORT", 0, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = read_env_i64("CLASSIFY_SESSION_EXPIRY_MINUTES", 1, 525_600) {
        settings.server.session_expiry_minutes = v;
    }
    if let Some(v) = read_env_i64("CLASSIFY_DEBOUNCE_MINUTES", 0, 1440) {
        settings.server.debounce_minutes = v;
    }

    // ── Client settings ─────────────────────────────────────────────
    if let Some(v) = read_env_string("CLASSIFY_DISPATCH_URL") {
        settings.client.dispatch_url = v;
    }
    if let Some(v) = read_env_u64("CLASSIFY_OPEN_TIMEOUT_MS", 100, 600_000) {
        settings.client.open_timeout_ms = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as an `i64` within a range.
pub fn parse_i64_range(val: &str, min: i64, max: i64) -> Option<i64> {
    let n: i64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    std::env::var(name).ok().as_deref().and_then(parse_bool)
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    std::env::var(name)
        .ok()
        .and_then(|v| parse_u16_range(&v, min, max))
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    std::env::var(name)
        .ok()
        .and_then(|v| parse_u64_range(&v, min, max))
}

fn read_env_i64(name: &str, min: i64, max: i64) -> Option<i64> {
    std::env::var(name)
        .ok()
        .and_then(|v| parse_i64_range(&v, min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_disjoint_keys() {
        let merged = deep_merge(json!({"a": 1}), json!({"b": 2}));
        assert_eq!(merged, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn source_overrides_target() {
        let merged = deep_merge(json!({"a": 1}), json!({"a": 9}));
        assert_eq!(merged["a"], 9);
    }

    #[test]
    fn nested_objects_merge_recursively() {
        let target = json!({"server": {"port": 0, "offline": true}});
        let source = json!({"server": {"port": 3001}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 3001);
        assert_eq!(merged["server"]["offline"], true);
    }

    #[test]
    fn null_in_source_preserves_target() {
        let merged = deep_merge(json!({"a": 1}), json!({"a": null}));
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn arrays_replaced_entirely() {
        let merged = deep_merge(json!({"a": [1, 2, 3]}), json!({"a": [9]}));
        assert_eq!(merged["a"], json!([9]));
    }

    #[test]
    fn primitive_replaced_by_object() {
        let merged = deep_merge(json!({"a": 1}), json!({"a": {"b": 2}}));
        assert_eq!(merged["a"]["b"], 2);
    }

    // ── parse helpers ───────────────────────────────────────────────

    #[test]
    fn parse_bool_truthy_values() {
        for v in ["true", "TRUE", "1", "yes", "on", "On"] {
            assert_eq!(parse_bool(v), Some(true), "{v}");
        }
    }

    #[test]
    fn parse_bool_falsy_values() {
        for v in ["false", "0", "no", "off", "OFF"] {
            assert_eq!(parse_bool(v), Some(false), "{v}");
        }
    }

    #[test]
    fn parse_bool_garbage_is_none() {
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn parse_u16_in_range() {
        assert_eq!(parse_u16_range("3001", 0, 65535), Some(3001));
    }

    #[test]
    fn parse_u16_out_of_range() {
        assert_eq!(parse_u16_range("99", 100, 65535), None);
    }

    #[test]
    fn parse_i64_rejects_garbage() {
        assert_eq!(parse_i64_range("ten", 0, 100), None);
    }

    #[test]
    fn parse_i64_bounds_inclusive() {
        assert_eq!(parse_i64_range("10", 10, 10), Some(10));
    }

    // ── file loading ────────────────────────────────────────────────

    #[test]
    fn missing_file_yields_defaults() {
        let settings =
            load_settings_from_path(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings.server.debounce_minutes, 10);
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"server": {{"port": 3001}}}}"#).unwrap();
        let settings = load_settings_from_path(file.path()).unwrap();
        assert_eq!(settings.server.port, 3001);
        // Untouched defaults survive
        assert_eq!(settings.server.session_expiry_minutes, 1440);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(load_settings_from_path(file.path()).is_err());
    }
}
