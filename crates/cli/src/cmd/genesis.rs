use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use lattice_genesis::AppGenesis;
use lattice_module::ModuleManager;
use lattice_types::{BlockInfo, Context, Height, constants::GENESIS_FILE_NAME};
use tracing::info;

use crate::error::Error;

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum GenesisCmd {
    /// Write a genesis file holding every module's default genesis
    Default(DefaultCmd),
    /// Check a genesis file against every registered module
    Validate(ValidateCmd),
    /// Initialise the application from a genesis file and export it as per-module files
    Export(ExportCmd),
}

#[derive(Parser, Debug, Clone, PartialEq)]
pub struct DefaultCmd {
    /// Chain identifier written into the envelope
    #[clap(long)]
    pub chain_id: String,

    /// Output file (default: `<genesis dir>/genesis.json`)
    #[clap(long)]
    pub output: Option<PathBuf>,

    /// Overwrite an existing file
    #[clap(long)]
    pub force: bool,
}

#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateCmd {
    /// Genesis file to validate (default: `<genesis dir>/genesis.json`)
    #[clap(long)]
    pub file: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ExportCmd {
    /// Genesis file to import (default: `<genesis dir>/genesis.json`)
    #[clap(long)]
    pub file: Option<PathBuf>,

    /// Directory receiving `<module>.json` and `<module>/<field>.json` files
    #[clap(long)]
    pub output_dir: PathBuf,

    /// Only export these modules (comma separated)
    #[clap(long, value_delimiter = ',')]
    pub modules: Vec<String>,
}

impl GenesisCmd {
    pub fn run(
        &self,
        manager: &mut ModuleManager,
        genesis_dir: &Path,
        indent: bool,
    ) -> Result<(), Error> {
        let default_file = genesis_dir.join(GENESIS_FILE_NAME);
        match self {
            GenesisCmd::Default(cmd) => cmd.run(manager, &default_file),
            GenesisCmd::Validate(cmd) => cmd.run(manager, &default_file),
            GenesisCmd::Export(cmd) => cmd.run(manager, &default_file, indent),
        }
    }
}

impl DefaultCmd {
    fn run(&self, manager: &ModuleManager, default_file: &Path) -> Result<(), Error> {
        let path = self.output.as_deref().unwrap_or(default_file);
        if path.exists() && !self.force {
            return Err(Error::AlreadyExists(path.to_path_buf()));
        }

        let genesis = AppGenesis::new(&self.chain_id, manager.default_genesis()?);
        genesis.save(path)?;

        info!(
            chain_id = %self.chain_id,
            modules = genesis.app_state.len(),
            "Wrote default genesis"
        );
        Ok(())
    }
}

impl ValidateCmd {
    fn run(&self, manager: &ModuleManager, default_file: &Path) -> Result<(), Error> {
        let path = self.file.as_deref().unwrap_or(default_file);
        let genesis = AppGenesis::load(path)?;
        manager.validate_genesis(&genesis.app_state)?;

        info!(file = %path.display(), chain_id = %genesis.chain_id, "Genesis is valid");
        Ok(())
    }
}

impl ExportCmd {
    fn run(
        &self,
        manager: &mut ModuleManager,
        default_file: &Path,
        indent: bool,
    ) -> Result<(), Error> {
        let path = self.file.as_deref().unwrap_or(default_file);
        let genesis = AppGenesis::load(path)?;
        manager.validate_genesis(&genesis.app_state)?;

        let info = BlockInfo::new(
            Height::new(genesis.initial_height),
            genesis.genesis_time,
            genesis.chain_id.as_str(),
        );
        let ctx = Context::detached(info);
        manager.init_chain(&ctx, &genesis.app_state)?;

        let modules: Vec<&str> = self.modules.iter().map(String::as_str).collect();
        manager.export_genesis_to_dir(&ctx, &self.output_dir, Some(modules.as_slice()), indent)?;

        info!(
            file = %path.display(),
            output_dir = %self.output_dir.display(),
            "Exported genesis to directory"
        );
        Ok(())
    }
}
