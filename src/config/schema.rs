use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::codec::CsvDialect;
use crate::integrity::DEFAULT_MAX_EXAMPLES;

pub const ENV_PREFIX: &str = "KILLRVIDEO";
pub const ENV_SEPARATOR: &str = "__";

#[derive(Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub csv: Csv,
    pub data: Data,
    pub validation: Validation,
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct Csv {
    pub delimiter: String,
    pub quote: String,
    /// Empty for no escape character; only valid with `double_quote`.
    pub escape: String,
    pub double_quote: bool,
}

impl Default for Csv {
    fn default() -> Self {
        Self {
            delimiter: ",".to_string(),
            quote: "\"".to_string(),
            escape: "\\".to_string(),
            double_quote: false,
        }
    }
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct Data {
    pub dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for Data {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            output_dir: PathBuf::from("data/dsbulk"),
        }
    }
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct Validation {
    pub max_examples: usize,
}

impl Default for Validation {
    fn default() -> Self {
        Self {
            max_examples: DEFAULT_MAX_EXAMPLES,
        }
    }
}

fn single_byte(name: &str, value: &str) -> Result<u8, ConfigError> {
    match value.as_bytes() {
        [byte] if byte.is_ascii() => Ok(*byte),
        _ => Err(ConfigError::Message(format!(
            "csv.{name} must be a single ASCII character, got {value:?}"
        ))),
    }
}

impl Csv {
    pub fn to_dialect(&self) -> Result<CsvDialect, ConfigError> {
        let escape = if self.escape.is_empty() {
            None
        } else {
            Some(single_byte("escape", &self.escape)?)
        };

        CsvDialect {
            delimiter: single_byte("delimiter", &self.delimiter)?,
            quote: single_byte("quote", &self.quote)?,
            escape,
            double_quote: self.double_quote,
        }
        .validate()
        .map_err(|e| ConfigError::Message(e.to_string()))
    }
}

pub fn validate_config(config: AppConfig) -> Result<AppConfig, ConfigError> {
    config.csv.to_dialect()?;

    if config.validation.max_examples == 0 {
        return Err(ConfigError::Message(
            "validation.max_examples must be greater than 0".to_string(),
        ));
    }
    Ok(config)
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR)
}

/// Load a TOML file, with `KILLRVIDEO__SECTION__KEY` variables taking
/// precedence over it.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path))
        .add_source(environment());

    config.build()?.try_deserialize().and_then(validate_config)
}

/// Defaults plus environment overrides, for runs without a config file.
pub fn load_config_from_env() -> Result<AppConfig, ConfigError> {
    let config = Config::builder().add_source(environment());

    config.build()?.try_deserialize().and_then(validate_config)
}

pub fn load_config_from_string(
    config_str: &str,
    skip_validation: bool,
) -> Result<AppConfig, ConfigError> {
    let config =
        Config::builder().add_source(File::from_str(config_str, FileFormat::Toml));

    if skip_validation {
        config.build()?.try_deserialize()
    } else {
        config.build()?.try_deserialize().and_then(validate_config)
    }
}
