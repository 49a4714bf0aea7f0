//! Bridge from `enclave_config::Config` to domain types.
//!
//! The config crate has no dependencies on other internal crates, so the
//! translation into workspace options and logging setup happens here.

use enclave_config::Config;
use enclave_telemetry::{LogConfig, LogFormat};
use enclave_workspace::WorkspaceOptions;

/// Convert config to [`WorkspaceOptions`].
#[must_use]
pub fn to_workspace_options(cfg: &Config) -> WorkspaceOptions {
    WorkspaceOptions::default()
        .with_max_file_size(cfg.tools.max_file_size)
        .with_binary_sample_size(cfg.tools.binary_sample_size)
        .with_default_file_mode(cfg.tools.default_file_mode)
}

/// Convert config to [`LogConfig`].
#[must_use]
pub fn to_log_config(cfg: &Config) -> LogConfig {
    let format = cfg
        .logging
        .format
        .parse::<LogFormat>()
        .unwrap_or_default();

    LogConfig::new(&cfg.logging.level)
        .with_format(format)
        .with_directives(cfg.logging.directives.iter().cloned())
}
