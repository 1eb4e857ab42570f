//! End-to-end runs of the `genesis` subcommands against mock modules.

use std::path::Path;

use clap::Parser;
use lattice_cli::{args::Args, config::Config, error::Error, runner::execute};
use lattice_genesis::AppGenesis;
use lattice_module::{ManagerError, ModuleManager, RuntimeConfig};
use lattice_test_support::{CallLog, MockModule};
use serde_json::json;
use tempfile::tempdir;

fn manager(log: &CallLog) -> color_eyre::Result<ModuleManager> {
    let modules = [
        MockModule::new("auth", log).with_genesis(json!({"accounts": []})),
        MockModule::new("bank", log).with_genesis(json!({"supply": 0})).with_field_export(),
        MockModule::new("mint", log).with_begin_block(),
    ];
    Ok(ModuleManager::new(modules.map(MockModule::into_arc))?)
}

fn config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.genesis.dir = Some(dir.to_path_buf());
    config
}

fn args(argv: &[&str]) -> Args {
    Args::try_parse_from(["lattice"].iter().chain(argv)).unwrap()
}

#[test]
fn default_then_validate() -> color_eyre::Result<()> {
    let dir = tempdir()?;
    let log = CallLog::new();
    let config = config(dir.path());

    execute(&args(&["genesis", "default", "--chain-id", "lattice-1"]), &config, manager(&log)?)?;

    let genesis = AppGenesis::load_from_dir(dir.path())?;
    assert_eq!(genesis.chain_id, "lattice-1");
    assert_eq!(genesis.app_state.module_names().collect::<Vec<_>>(), ["auth", "bank"]);

    execute(&args(&["genesis", "validate"]), &config, manager(&log)?)?;
    Ok(())
}

#[test]
fn default_refuses_to_overwrite() -> color_eyre::Result<()> {
    let dir = tempdir()?;
    let log = CallLog::new();
    let config = config(dir.path());
    let default = args(&["genesis", "default", "--chain-id", "lattice-1"]);

    execute(&default, &config, manager(&log)?)?;
    let err = execute(&default, &config, manager(&log)?).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::AlreadyExists(_))));

    let forced = args(&["genesis", "default", "--chain-id", "lattice-2", "--force"]);
    execute(&forced, &config, manager(&log)?)?;
    assert_eq!(AppGenesis::load_from_dir(dir.path())?.chain_id, "lattice-2");
    Ok(())
}

#[test]
fn validate_reports_module_errors() -> color_eyre::Result<()> {
    let dir = tempdir()?;
    let log = CallLog::new();
    let config = config(dir.path());

    let mut state = manager(&log)?.default_genesis()?;
    state.insert_json("bank", &json!({"invalid": true}))?;
    AppGenesis::new("lattice-1", state).save(&dir.path().join("genesis.json"))?;

    let err = execute(&args(&["genesis", "validate"]), &config, manager(&log)?).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::Manager(ManagerError::InvalidGenesis { module, .. })) if module == "bank"
    ));
    Ok(())
}

#[test]
fn export_writes_module_files() -> color_eyre::Result<()> {
    let dir = tempdir()?;
    let out = dir.path().join("export");
    let log = CallLog::new();
    let config = config(dir.path());

    let mut state = manager(&log)?.default_genesis()?;
    state.insert_json("bank", &json!({"supply": 7, "balances": {"alice": 7}}))?;
    AppGenesis::new("lattice-1", state).save(&dir.path().join("genesis.json"))?;

    let out_arg = out.to_string_lossy().into_owned();
    execute(&args(&["genesis", "export", "--output-dir", &out_arg]), &config, manager(&log)?)?;

    assert!(out.join("auth.json").is_file());
    assert_eq!(std::fs::read_to_string(out.join("bank").join("supply.json"))?, "7");
    assert!(out.join("bank").join("balances.json").is_file());
    Ok(())
}

#[test]
fn export_honours_module_filter() -> color_eyre::Result<()> {
    let dir = tempdir()?;
    let out = dir.path().join("export");
    let log = CallLog::new();
    let config = config(dir.path());

    let state = manager(&log)?.default_genesis()?;
    AppGenesis::new("lattice-1", state).save(&dir.path().join("genesis.json"))?;

    let out_arg = out.to_string_lossy().into_owned();
    let export = args(&["genesis", "export", "--output-dir", &out_arg, "--modules", "auth"]);
    execute(&export, &config, manager(&log)?)?;

    assert!(out.join("auth.json").is_file());
    assert!(!out.join("bank").exists());
    Ok(())
}

#[test]
fn runtime_overrides_are_applied() -> color_eyre::Result<()> {
    let dir = tempdir()?;
    let log = CallLog::new();
    let mut config = config(dir.path());
    config.runtime = RuntimeConfig {
        init_genesis: Some(vec!["ghost".into()]),
        ..Default::default()
    };

    let err = execute(&args(&["genesis", "default", "--chain-id", "x"]), &config, manager(&log)?)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ManagerError>(),
        Some(ManagerError::UnknownModule(name)) if name == "ghost"
    ));
    Ok(())
}
