//! Environment variable overrides.
//!
//! `ENCLAVE_*` variables are applied on top of every file layer.

use std::collections::HashMap;

use crate::error::{ConfigError, ConfigResult};
use crate::merge::set_path;

/// Prefix shared by every recognised variable.
const ENV_PREFIX: &str = "ENCLAVE_";

/// Variables that override a config field, with the dotted field path.
const OVERRIDES: &[(&str, &str)] = &[
    ("ENCLAVE_MAX_FILE_SIZE", "tools.max_file_size"),
    ("ENCLAVE_LOG_LEVEL", "logging.level"),
    ("ENCLAVE_LOG_FORMAT", "logging.format"),
];

/// Snapshot of the `ENCLAVE_*` variables in the process environment.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| key.starts_with(ENV_PREFIX))
        .collect()
}

/// Apply overrides from `env` to the merged tree. Returns how many applied.
///
/// # Errors
///
/// [`ConfigError::EnvError`] if `ENCLAVE_MAX_FILE_SIZE` is not an integer.
pub fn apply_env_overrides(
    merged: &mut toml::Value,
    env: &HashMap<String, String>,
) -> ConfigResult<usize> {
    let mut applied = 0usize;
    for (var, field) in OVERRIDES {
        let Some(raw) = env.get(*var) else {
            continue;
        };
        let value = if *var == "ENCLAVE_MAX_FILE_SIZE" {
            let size: i64 = raw.trim().parse().map_err(|_| ConfigError::EnvError {
                var: (*var).to_owned(),
                message: format!("expected a byte count, got '{raw}'"),
            })?;
            toml::Value::Integer(size)
        } else {
            toml::Value::String(raw.trim().to_owned())
        };
        set_path(merged, field, value);
        applied = applied.saturating_add(1);
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_applied() {
        let mut merged: toml::Value = toml::from_str("[tools]\nmax_file_size = 1\n").unwrap();
        let env = HashMap::from([
            ("ENCLAVE_MAX_FILE_SIZE".to_owned(), "2048".to_owned()),
            ("ENCLAVE_LOG_LEVEL".to_owned(), "debug".to_owned()),
            ("ENCLAVE_UNRELATED".to_owned(), "x".to_owned()),
        ]);
        assert_eq!(apply_env_overrides(&mut merged, &env).unwrap(), 2);
        assert_eq!(merged["tools"]["max_file_size"].as_integer(), Some(2048));
        assert_eq!(merged["logging"]["level"].as_str(), Some("debug"));
    }

    #[test]
    fn test_bad_size_rejected() {
        let mut merged = toml::Value::Table(toml::Table::new());
        let env = HashMap::from([("ENCLAVE_MAX_FILE_SIZE".to_owned(), "5MB".to_owned())]);
        assert!(matches!(
            apply_env_overrides(&mut merged, &env),
            Err(ConfigError::EnvError { .. })
        ));
    }
}
