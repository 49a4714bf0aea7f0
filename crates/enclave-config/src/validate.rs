//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_tools(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_tools(config: &Config) -> ConfigResult<()> {
    let t = &config.tools;

    if t.max_file_size == 0 {
        return Err(ConfigError::ValidationError {
            field: "tools.max_file_size".to_owned(),
            message: "max_file_size must be greater than zero".to_owned(),
        });
    }

    if t.binary_sample_size == 0 {
        return Err(ConfigError::ValidationError {
            field: "tools.binary_sample_size".to_owned(),
            message: "binary_sample_size must be greater than zero".to_owned(),
        });
    }

    if t.default_file_mode > 0o777 {
        return Err(ConfigError::ValidationError {
            field: "tools.default_file_mode".to_owned(),
            message: format!(
                "mode {:o} has bits outside 0777",
                t.default_file_mode
            ),
        });
    }

    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.level".to_owned(),
            message: format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                valid_levels.join(", ")
            ),
        });
    }

    let valid_formats = ["pretty", "compact", "json"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.format".to_owned(),
            message: format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                valid_formats.join(", ")
            ),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(result: ConfigResult<()>) -> String {
        match result {
            Err(ConfigError::ValidationError { field, .. }) => field,
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_sizes_rejected() {
        let mut config = Config::default();
        config.tools.max_file_size = 0;
        assert_eq!(field_of(validate(&config)), "tools.max_file_size");

        let mut config = Config::default();
        config.tools.binary_sample_size = 0;
        assert_eq!(field_of(validate(&config)), "tools.binary_sample_size");
    }

    #[test]
    fn test_mode_above_0777_rejected() {
        let mut config = Config::default();
        config.tools.default_file_mode = 0o4755;
        assert_eq!(field_of(validate(&config)), "tools.default_file_mode");
    }

    #[test]
    fn test_unknown_logging_values_rejected() {
        let mut config = Config::default();
        config.logging.level = "loud".to_owned();
        assert_eq!(field_of(validate(&config)), "logging.level");

        let mut config = Config::default();
        config.logging.format = "xml".to_owned();
        assert_eq!(field_of(validate(&config)), "logging.format");
    }
}
