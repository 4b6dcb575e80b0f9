//! Reader settings using Figment
//!
//! Settings are layered in this order, later sources overriding earlier ones:
//! 1. Built-in defaults ([`ReaderSettings::default`])
//! 2. An optional TOML file
//! 3. Environment variables prefixed with `DAQ_READER_` (nested keys split on `__`)
//!
//! # Example
//! ```no_run
//! use daq_reader::config::ReaderSettings;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = ReaderSettings::load_from("reader.toml")?;
//! settings.validate()?;
//! println!("timeout: {} ms", settings.timeout_ms);
//! # Ok(())
//! # }
//! ```

use crate::domain::DomainMode;
use crate::error::{ReaderError, ReaderResult};
use crate::logging::LogFormat;
use crate::sample_type::{SampleType, SampleTypeRegistry};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "DAQ_READER_";

/// Settings shared by all reader kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderSettings {
    /// Default read timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Type values are read as; `Invalid` follows the port descriptor
    #[serde(default)]
    pub value_read_type: SampleType,
    /// Type the domain is read as; `Invalid` follows the port descriptor
    #[serde(default)]
    pub domain_read_type: SampleType,
    /// Samples per block (block readers only)
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    /// Native ticks or wall-clock nanoseconds
    #[serde(default)]
    pub domain_mode: DomainMode,
    /// Logging settings
    #[serde(default)]
    pub log: LogSettings,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSettings {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_block_size() -> usize {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            value_read_type: SampleType::Invalid,
            domain_read_type: SampleType::Invalid,
            block_size: default_block_size(),
            domain_mode: DomainMode::Native,
            log: LogSettings::default(),
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl ReaderSettings {
    /// Defaults overridden by the environment only.
    pub fn load() -> ReaderResult<Self> {
        Ok(Self::figment().extract()?)
    }

    /// Defaults, then `path` (if it exists), then the environment.
    pub fn load_from<P: AsRef<Path>>(path: P) -> ReaderResult<Self> {
        Ok(Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?)
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate settings after loading
    pub fn validate(&self) -> ReaderResult<()> {
        SampleTypeRegistry::check_types(self.value_read_type, self.domain_read_type)?;

        if self.block_size == 0 {
            return Err(ReaderError::Configuration(
                "block_size must be at least 1".to_string(),
            ));
        }

        crate::logging::parse_level(&self.log.level)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn write_toml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_are_valid() {
        let settings = ReaderSettings::default();
        assert_eq!(settings.timeout_ms, 1000);
        assert_eq!(settings.value_read_type, SampleType::Invalid);
        assert_eq!(settings.block_size, 1);
        assert_eq!(settings.domain_mode, DomainMode::Native);
        assert!(settings.validate().is_ok());
    }

    #[test]
    #[serial]
    fn load_from_file() {
        let file = write_toml(
            r#"
timeout_ms = 250
value_read_type = "Float64"
block_size = 4
domain_mode = "wall_clock"

[log]
level = "debug"
format = "json"
"#,
        );

        let settings = ReaderSettings::load_from(file.path()).unwrap();
        assert_eq!(settings.timeout_ms, 250);
        assert_eq!(settings.value_read_type, SampleType::Float64);
        assert_eq!(settings.domain_read_type, SampleType::Invalid);
        assert_eq!(settings.block_size, 4);
        assert_eq!(settings.domain_mode, DomainMode::WallClock);
        assert_eq!(settings.log.level, "debug");
        assert_eq!(settings.log.format, LogFormat::Json);
        assert!(settings.validate().is_ok());
    }

    #[test]
    #[serial]
    fn missing_file_falls_back_to_defaults() {
        let settings = ReaderSettings::load_from("/nonexistent/reader.toml").unwrap();
        assert_eq!(settings, ReaderSettings::default());
    }

    #[test]
    #[serial]
    fn environment_overrides_file() {
        let file = write_toml("timeout_ms = 250\n");
        std::env::set_var("DAQ_READER_TIMEOUT_MS", "75");
        std::env::set_var("DAQ_READER_LOG__LEVEL", "warn");

        let result = ReaderSettings::load_from(file.path());

        std::env::remove_var("DAQ_READER_TIMEOUT_MS");
        std::env::remove_var("DAQ_READER_LOG__LEVEL");

        let settings = result.unwrap();
        assert_eq!(settings.timeout_ms, 75);
        assert_eq!(settings.log.level, "warn");
    }

    #[test]
    #[serial]
    fn malformed_value_is_a_config_error() {
        let file = write_toml("timeout_ms = \"soon\"\n");
        let err = ReaderSettings::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ReaderError::Config(_)));
    }

    #[test]
    fn unreadable_type_fails_validation() {
        let settings = ReaderSettings {
            domain_read_type: SampleType::String,
            ..Default::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, ReaderError::Configuration(_)));
        assert!(err.to_string().contains("String"));
    }

    #[test]
    fn zero_block_size_fails_validation() {
        let settings = ReaderSettings {
            block_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ReaderError::Configuration(_))
        ));
    }

    #[test]
    fn bad_log_level_fails_validation() {
        let settings = ReaderSettings {
            log: LogSettings {
                level: "loud".to_string(),
                format: LogFormat::Compact,
            },
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
