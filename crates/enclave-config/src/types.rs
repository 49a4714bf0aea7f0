//! Configuration types.
//!
//! Every struct implements [`Default`] so that a bare `[section]` header in
//! TOML produces a working configuration.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Limits applied by the file tools.
    pub tools: ToolsSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

/// Limits for the read, write and edit tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// Largest file, in bytes, any tool reads or produces.
    pub max_file_size: u64,
    /// Number of leading bytes inspected for binary detection.
    pub binary_sample_size: usize,
    /// Mode for newly created files. Written as an octal string (`"0644"`)
    /// or a plain integer.
    #[serde(with = "octal_mode")]
    pub default_file_mode: u32,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            max_file_size: 5 * 1024 * 1024,
            binary_sample_size: 8000,
            default_file_mode: 0o644,
        }
    }
}

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"` or `"json"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["enclave_workspace=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}

/// Parse an octal permission string such as `"0644"` or `"0o755"`.
#[must_use]
pub fn parse_octal_mode(raw: &str) -> Option<u32> {
    let digits = raw.strip_prefix("0o").unwrap_or(raw);
    u32::from_str_radix(digits, 8).ok()
}

mod octal_mode {
    use serde::{Deserialize, Deserializer, Serializer, de};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u32),
        Str(String),
    }

    pub(super) fn serialize<S: Serializer>(mode: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{mode:04o}"))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Int(mode) => Ok(mode),
            Raw::Str(s) => super::parse_octal_mode(&s)
                .ok_or_else(|| de::Error::custom(format!("invalid octal mode '{s}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_accepts_string_and_integer() {
        let config: Config = toml::from_str("[tools]\ndefault_file_mode = \"0600\"").unwrap();
        assert_eq!(config.tools.default_file_mode, 0o600);

        let config: Config = toml::from_str("[tools]\ndefault_file_mode = 420").unwrap();
        assert_eq!(config.tools.default_file_mode, 0o644);

        assert!(toml::from_str::<Config>("[tools]\ndefault_file_mode = \"rw-\"").is_err());
    }

    #[test]
    fn test_mode_serializes_as_octal() {
        let rendered = toml::to_string(&Config::default()).unwrap();
        assert!(rendered.contains("default_file_mode = \"0644\""));
    }

    #[test]
    fn test_bare_sections_use_defaults() {
        let config: Config = toml::from_str("[tools]\n[logging]\n").unwrap();
        assert_eq!(config, Config::default());
    }
}
