use std::path::PathBuf;

use lattice_genesis::GenesisError;
use lattice_module::ManagerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Error opening file: {}", .0.display())]
    OpenFile(PathBuf),

    #[error("Error writing file: {}", .0.display())]
    WriteFile(PathBuf),

    #[error("{} already exists, pass --force to overwrite", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Error creating parent directory: {}", .0.display())]
    ParentDir(PathBuf),

    #[error("Error parsing configuration {}: {message}", .path.display())]
    ParseConfig { path: PathBuf, message: String },

    #[error("Error serializing configuration: {0}")]
    SerializeConfig(String),

    #[error("Invalid log filter: {0}")]
    LogFilter(String),

    #[error("Failed to install the global logger: {0}")]
    LoggerInit(String),

    #[error("Home directory could not be determined")]
    HomeDir,

    #[error(transparent)]
    Genesis(#[from] GenesisError),

    #[error(transparent)]
    Manager(#[from] ManagerError),
}
