//! Command-line arguments shared by every lattice application binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::{
    cmd::genesis::GenesisCmd,
    config::{LogFormat, LogLevel},
    error::Error,
};

const APP_FOLDER: &str = ".lattice";
const CONFIG_FILE: &str = "config.toml";
const CONFIG_FOLDER: &str = "config";

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Home directory for lattice (default: `~/.lattice`)
    #[arg(long, global = true, value_name = "HOME_DIR")]
    pub home: Option<PathBuf>,

    /// Log level (default: `info`)
    #[arg(long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Log format (default: `plaintext`)
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Generate, validate and export genesis documents
    #[command(subcommand)]
    Genesis(GenesisCmd),
}

impl Args {
    pub fn new() -> Self {
        Self::parse()
    }

    /// Home directory, `--home` if given, else `.lattice` under the user's home.
    pub fn get_home_dir(&self) -> Result<PathBuf, Error> {
        if let Some(home) = &self.home {
            return Ok(home.clone());
        }
        dirs::home_dir().map(|home| home.join(APP_FOLDER)).ok_or(Error::HomeDir)
    }

    pub fn get_config_dir(&self) -> Result<PathBuf, Error> {
        Ok(self.get_home_dir()?.join(CONFIG_FOLDER))
    }

    pub fn get_config_file_path(&self) -> Result<PathBuf, Error> {
        Ok(self.get_config_dir()?.join(CONFIG_FILE))
    }
}
