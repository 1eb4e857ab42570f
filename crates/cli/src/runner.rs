//! Entry point shared by application binaries.
//!
//! An application supplies a closure building its [`ModuleManager`]; the runner parses arguments,
//! loads configuration, initialises logging and dispatches the command.

use std::path::PathBuf;

use color_eyre::eyre::{Result, eyre};
use lattice_module::ModuleManager;
use tracing::{info, trace};

use crate::{
    args::{Args, Commands},
    config::{self, Config},
    logging,
};

/// Runs the command line for an application.
///
/// ```no_run
/// # use lattice_module::ModuleManager;
/// fn main() -> color_eyre::Result<()> {
///     lattice_cli::runner::run(|_config| Ok(ModuleManager::new([])?))
/// }
/// ```
pub fn run<F>(build: F) -> Result<()>
where
    F: FnOnce(&Config) -> Result<ModuleManager>,
{
    color_eyre::install()?;
    install_tracing_panic_hook();

    let args = Args::new();
    let config = load(&args)?;

    // Drop guard flushing buffered logs on exit. It must not be bound to `_`.
    let _guard = logging::init(&config.logging)?;

    trace!("Command-line parameters: {args:?}");
    trace!(?config, "Configuration");

    let manager = build(&config)?;
    execute(&args, &config, manager)
}

/// Loads the configuration file, if present, then applies environment and command-line overrides.
pub fn load(args: &Args) -> Result<Config> {
    let config_file = args
        .get_config_file_path()
        .map_err(|error| eyre!("Failed to get configuration file path: {error}"))?;

    let mut config = config::load_config_or_default(&config_file)
        .map_err(|error| eyre!("Failed to load configuration file: {error}"))?;
    config.apply_env_overrides();

    if let Some(log_level) = args.log_level {
        config.logging.log_level = log_level;
    }
    if let Some(log_format) = args.log_format {
        config.logging.log_format = log_format;
    }

    Ok(config)
}

/// Applies the runtime ordering overrides, completes wiring and runs the command.
pub fn execute(args: &Args, config: &Config, mut manager: ModuleManager) -> Result<()> {
    manager.apply_config(&config.runtime)?;
    if !manager.is_wired() {
        manager.configure()?;
    }

    let genesis_dir = genesis_dir(args, config)?;
    info!(
        modules = manager.registry().len(),
        genesis_dir = %genesis_dir.display(),
        "Wired modules"
    );

    match &args.command {
        Commands::Genesis(cmd) => cmd.run(&mut manager, &genesis_dir, config.genesis.indent)?,
    }
    Ok(())
}

fn genesis_dir(args: &Args, config: &Config) -> Result<PathBuf> {
    match &config.genesis.dir {
        Some(dir) => Ok(dir.clone()),
        None => Ok(args.get_config_dir()?),
    }
}

fn install_tracing_panic_hook() {
    use std::panic;

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());

        let msg: &str = if let Some(s) = info.payload().downcast_ref::<&str>() {
            s
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.as_str()
        } else {
            "panic"
        };

        tracing::error!(target: "panic", %location, message = %msg, "panic occurred");

        default_hook(info);
    }));
}
