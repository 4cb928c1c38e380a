//! Policy settings loader
//!
//! ## Loading Strategy
//! 1. Try environment variables
//! 2. Fall back to the first settings file found by [`probe_config_paths`]
//!
//! ## Environment Variables
//! - `HOLDFAST_MAX_RETRIES`: retry count, or `infinite` (required)
//! - `HOLDFAST_DELAY_KIND`: `constant`, `linear`, `exponential` or `time_series`
//! - `HOLDFAST_DELAY_BASE_MS`: base delay in milliseconds (required with a kind)
//! - `HOLDFAST_DELAY_MAX_MS`: maximum delay in milliseconds
//! - `HOLDFAST_DELAY_JITTER`: whether to add jitter (true/false)
//!
//! ## File Locations
//! `./holdfast.toml`, then `./holdfast.json`, then the same names next to
//! the executable.

use std::path::{Path, PathBuf};
use std::time::Duration;

use holdfast_common::error::CommonError;
use tracing::{debug, info};

use super::{DelaySettings, PolicySettings};
use crate::delay::DelayKind;
use crate::error::ConfigResult;

const ENV_MAX_RETRIES: &str = "HOLDFAST_MAX_RETRIES";
const ENV_DELAY_KIND: &str = "HOLDFAST_DELAY_KIND";
const ENV_DELAY_BASE_MS: &str = "HOLDFAST_DELAY_BASE_MS";
const ENV_DELAY_MAX_MS: &str = "HOLDFAST_DELAY_MAX_MS";
const ENV_DELAY_JITTER: &str = "HOLDFAST_DELAY_JITTER";

const CONFIG_FILE_NAMES: [&str; 2] = ["holdfast.toml", "holdfast.json"];

/// Load settings from the environment, falling back to a settings file
///
/// # Errors
/// Returns an error when neither source yields valid settings.
pub fn load() -> ConfigResult<PolicySettings> {
    match load_from_env() {
        Ok(settings) => {
            info!("Policy settings loaded from environment variables");
            Ok(settings)
        }
        Err(e) => {
            debug!(error = %e, "Failed to load policy settings from environment, trying file");
            let path = probe_config_paths().ok_or_else(|| {
                CommonError::config("No policy settings file found in any of the standard locations")
            })?;
            load_from_file(&path)
        }
    }
}

/// Load settings from `HOLDFAST_*` environment variables
///
/// # Errors
/// Returns `CommonError::Config` when a required variable is missing or a
/// value does not parse, and validation errors from the settings.
pub fn load_from_env() -> ConfigResult<PolicySettings> {
    from_lookup(|key| std::env::var(key).ok())
}

/// Load settings from a TOML or JSON file, chosen by extension
pub fn load_from_file(path: &Path) -> ConfigResult<PolicySettings> {
    if !path.exists() {
        return Err(CommonError::persistence_at(path.display().to_string(), "settings file not found").into());
    }
    info!(path = %path.display(), "Loading policy settings from file");

    let contents = std::fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()).unwrap_or("toml") {
        "toml" => from_toml_str(&contents),
        "json" => from_json_str(&contents),
        other => Err(CommonError::config(format!("Unsupported settings format: {other}")).into()),
    }
}

pub fn from_toml_str(contents: &str) -> ConfigResult<PolicySettings> {
    let settings: PolicySettings = toml::from_str(contents)?;
    settings.validate()?;
    Ok(settings)
}

pub fn from_json_str(contents: &str) -> ConfigResult<PolicySettings> {
    let settings: PolicySettings = serde_json::from_str(contents)?;
    settings.validate()?;
    Ok(settings)
}

/// First existing settings file in the working directory or next to the
/// executable
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(CONFIG_FILE_NAMES.iter().map(|name| cwd.join(name)));
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(CONFIG_FILE_NAMES.iter().map(|name| exe_dir.join(name)));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn from_lookup<F>(lookup: F) -> ConfigResult<PolicySettings>
where
    F: Fn(&str) -> Option<String>,
{
    let required = |key: &str| {
        lookup(key).ok_or_else(|| {
            CommonError::config_field(key, "Missing required environment variable")
        })
    };

    let raw_retries = required(ENV_MAX_RETRIES)?;
    let max_retries = if raw_retries.trim().eq_ignore_ascii_case("infinite") {
        None
    } else {
        Some(parse_number::<u32>(ENV_MAX_RETRIES, &raw_retries)?)
    };

    let delay = match lookup(ENV_DELAY_KIND) {
        Some(raw_kind) => {
            let kind: DelayKind = raw_kind
                .parse()
                .map_err(|e: String| CommonError::config_field(ENV_DELAY_KIND, e))?;
            let base_ms = parse_number::<u64>(ENV_DELAY_BASE_MS, &required(ENV_DELAY_BASE_MS)?)?;

            let mut delay = DelaySettings::new(kind, Duration::from_millis(base_ms));
            if let Some(raw_max) = lookup(ENV_DELAY_MAX_MS) {
                delay.max_delay = Some(Duration::from_millis(parse_number::<u64>(ENV_DELAY_MAX_MS, &raw_max)?));
            }
            delay.jitter = lookup(ENV_DELAY_JITTER).is_some_and(|raw| parse_bool(&raw));
            Some(delay)
        }
        None => None,
    };

    let settings = PolicySettings { max_retries, delay, ..PolicySettings::default() };
    settings.validate()?;
    Ok(settings)
}

fn parse_number<N: std::str::FromStr>(key: &str, raw: &str) -> Result<N, CommonError>
where
    N::Err: std::fmt::Display,
{
    raw.trim().parse::<N>().map_err(|e| CommonError::config_field(key, format!("Invalid number '{raw}': {e}")))
}

/// Accepts `1`/`true`/`yes`/`on` (case-insensitive) as true
fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::{Builder, NamedTempFile};

    use super::*;
    use crate::error::PolicyError;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    fn temp_file(suffix: &str, contents: &str) -> NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().expect("create temp file");
        file.write_all(contents.as_bytes()).expect("write temp file");
        file
    }

    /// Validates a full set of variables.
    ///
    /// Assertions:
    /// - Confirms retries, kind, base, max and jitter are read.
    #[test]
    fn test_lookup_all_vars() {
        let settings = from_lookup(lookup_from(&[
            (ENV_MAX_RETRIES, "4"),
            (ENV_DELAY_KIND, "Linear"),
            (ENV_DELAY_BASE_MS, "250"),
            (ENV_DELAY_MAX_MS, "1000"),
            (ENV_DELAY_JITTER, "yes"),
        ]))
        .expect("settings should load");

        assert_eq!(settings.max_retries, Some(4));
        let delay = settings.delay.expect("delay section");
        assert_eq!(delay.kind, DelayKind::Linear);
        assert_eq!(delay.base, Duration::from_millis(250));
        assert_eq!(delay.max_delay, Some(Duration::from_secs(1)));
        assert!(delay.jitter);
    }

    #[test]
    fn test_lookup_infinite_without_delay() {
        let settings = from_lookup(lookup_from(&[(ENV_MAX_RETRIES, "infinite")])).expect("settings should load");
        assert_eq!(settings.max_retries, None);
        assert!(settings.delay.is_none());
    }

    /// Validates error reporting for missing and malformed variables.
    ///
    /// Assertions:
    /// - Confirms a missing retry count is a config error naming the variable.
    /// - Confirms a kind without a base is rejected.
    /// - Confirms a malformed number is rejected.
    #[test]
    fn test_lookup_errors() {
        let missing = from_lookup(lookup_from(&[]));
        holdfast_common::assert_error_contains!(missing, ENV_MAX_RETRIES);

        let no_base = from_lookup(lookup_from(&[(ENV_MAX_RETRIES, "2"), (ENV_DELAY_KIND, "constant")]));
        holdfast_common::assert_error_contains!(no_base, ENV_DELAY_BASE_MS);

        let malformed = from_lookup(lookup_from(&[(ENV_MAX_RETRIES, "many")]));
        assert!(matches!(malformed, Err(PolicyError::Common(CommonError::Config { .. }))));
    }

    #[test]
    fn test_load_from_env_reads_process_env() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        std::env::set_var(ENV_MAX_RETRIES, "7");
        std::env::remove_var(ENV_DELAY_KIND);

        let settings = load_from_env();
        std::env::remove_var(ENV_MAX_RETRIES);

        assert_eq!(settings.expect("settings should load").max_retries, Some(7));
    }

    /// Tests that `load` prefers the environment over any settings file
    #[test]
    fn test_load_prefers_env() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        std::env::set_var(ENV_MAX_RETRIES, "infinite");
        std::env::set_var(ENV_DELAY_KIND, "exponential");
        std::env::set_var(ENV_DELAY_BASE_MS, "40");

        let settings = load();
        for key in [ENV_MAX_RETRIES, ENV_DELAY_KIND, ENV_DELAY_BASE_MS] {
            std::env::remove_var(key);
        }

        let settings = settings.expect("settings should load");
        assert!(settings.retry_count_info().is_infinite());
        assert_eq!(settings.delay.map(|d| d.base), Some(Duration::from_millis(40)));
    }

    /// Validates file loading by extension.
    ///
    /// Assertions:
    /// - Confirms TOML and JSON files parse to the same settings.
    #[test]
    fn test_load_from_file_formats() {
        let toml_file = temp_file(
            ".toml",
            r#"
                name = "billing"
                max_retries = 3

                [delay]
                kind = "exponential"
                base_ms = 100
                max_delay_ms = 2000
                jitter = true
            "#,
        );
        let json_file = temp_file(
            ".json",
            r#"{
                "name": "billing",
                "max_retries": 3,
                "delay": { "kind": "exponential", "base_ms": 100, "max_delay_ms": 2000, "jitter": true }
            }"#,
        );

        let from_toml = load_from_file(toml_file.path()).expect("toml should load");
        let from_json = load_from_file(json_file.path()).expect("json should load");
        assert_eq!(from_toml, from_json);
        assert_eq!(from_toml.name.as_deref(), Some("billing"));
    }

    #[test]
    fn test_load_from_file_rejects_invalid() {
        let bad = temp_file(".toml", "max_retries = 2\n[delay]\nkind = \"exponential\"\nbase_ms = 10\nfactor = -1.0\n");
        assert!(matches!(load_from_file(bad.path()), Err(PolicyError::InvalidDelay(_))));

        let yaml = temp_file(".yaml", "max_retries: 2");
        holdfast_common::assert_error_contains!(load_from_file(yaml.path()), "Unsupported settings format");

        let missing = load_from_file(Path::new("/definitely/not/here/holdfast.toml"));
        assert!(missing.is_err());
    }

    #[test]
    fn test_parse_bool_values() {
        for raw in ["1", "true", "YES", " on "] {
            assert!(parse_bool(raw), "{raw} should be true");
        }
        for raw in ["0", "false", "no", "off", "maybe"] {
            assert!(!parse_bool(raw), "{raw} should be false");
        }
    }
}
