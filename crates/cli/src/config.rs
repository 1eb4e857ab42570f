//! Node configuration file and environment overrides.

use std::{
    fmt, fs,
    io::Write,
    path::{Path, PathBuf},
    str::FromStr,
};

use clap::ValueEnum;
use lattice_module::RuntimeConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Error;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plaintext,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: LogLevel,
    pub log_format: LogFormat,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisConfig {
    /// Directory holding `genesis.json` and any per-module files. Defaults to `<home>/config`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Pretty-print exported module files.
    pub indent: bool,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self { dir: None, indent: true }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub genesis: GenesisConfig,
    pub runtime: RuntimeConfig,
}

impl Config {
    /// Apply environment variable overrides.
    ///
    /// Supported variables:
    /// - LATTICE_LOG_LEVEL
    /// - LATTICE_LOG_FORMAT
    /// - LATTICE_GENESIS_DIR
    /// - LATTICE_GENESIS_INDENT
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Same as [`Config::apply_env_overrides`] with a custom variable lookup.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("LATTICE_LOG_LEVEL") {
            match v.parse::<LogLevel>() {
                Ok(level) => self.logging.log_level = level,
                Err(_) => warn!(value = %v, "Invalid LATTICE_LOG_LEVEL, ignoring"),
            }
        }
        if let Some(v) = get("LATTICE_LOG_FORMAT") {
            match v.parse::<LogFormat>() {
                Ok(format) => self.logging.log_format = format,
                Err(_) => warn!(value = %v, "Invalid LATTICE_LOG_FORMAT, ignoring"),
            }
        }
        if let Some(v) = get("LATTICE_GENESIS_DIR") {
            self.genesis.dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("LATTICE_GENESIS_INDENT") {
            match v.parse::<bool>() {
                Ok(b) => self.genesis.indent = b,
                Err(_) => warn!(value = %v, "Invalid LATTICE_GENESIS_INDENT, ignoring"),
            }
        }
    }
}

/// Load configuration from file
pub fn load_config(config_file: &Path) -> Result<Config, Error> {
    let content =
        fs::read_to_string(config_file).map_err(|_| Error::OpenFile(config_file.to_path_buf()))?;
    toml::from_str(&content).map_err(|e| Error::ParseConfig {
        path: config_file.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load configuration from file, or the defaults when the file does not exist.
pub fn load_config_or_default(config_file: &Path) -> Result<Config, Error> {
    if config_file.exists() { load_config(config_file) } else { Ok(Config::default()) }
}

/// Save configuration to file
pub fn save_config(config_file: &Path, config: &Config) -> Result<(), Error> {
    let content =
        toml::to_string_pretty(config).map_err(|e| Error::SerializeConfig(e.to_string()))?;
    save(config_file, &content)
}

fn save(path: &Path, data: &str) -> Result<(), Error> {
    if let Some(parent_dir) = path.parent() {
        fs::create_dir_all(parent_dir).map_err(|_| Error::ParentDir(parent_dir.to_path_buf()))?;
    }

    let mut f = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|_| Error::OpenFile(path.to_path_buf()))?;

    f.write_all(data.as_bytes()).map_err(|_| Error::WriteFile(path.to_path_buf()))?;

    Ok(())
}
