//! Version map driven in-place migrations.

mod common;

use common::{emitted, manager};
use lattice_module::{ManagerError, ModuleManager};
use lattice_test_support::{CallLog, MockModule, context, validator_update};
use lattice_types::{Phase, VersionMap};
use serde_json::json;

fn wired(modules: impl IntoIterator<Item = MockModule>) -> color_eyre::Result<ModuleManager> {
    let mut mm = manager(modules)?;
    mm.configure()?;
    Ok(mm)
}

fn versions(entries: &[(&str, u64)]) -> VersionMap {
    entries.iter().map(|(name, v)| (*name, *v)).collect()
}

#[test]
fn handlers_run_in_version_order() -> color_eyre::Result<()> {
    let log = CallLog::new();
    let mut mm = wired([MockModule::new("mod", &log).with_version(3).with_migrations([2, 1])])?;

    let mut ctx = context(100);
    let updated = mm.run_migrations(&mut ctx, &versions(&[("mod", 1)]))?;

    assert_eq!(log.calls(), ["mod.migrate_from_1", "mod.migrate_from_2"]);
    assert_eq!(updated, versions(&[("mod", 3)]));
    assert_eq!(mm.version_map(), &updated);
    assert_eq!(ctx.event_manager().len(), 2);
    Ok(())
}

#[test]
fn missing_handler_aborts_before_any_runs() -> color_eyre::Result<()> {
    let log = CallLog::new();
    let mut mm = wired([MockModule::new("mod", &log).with_version(3).with_migrations([1, 2])])?;

    let err = mm.run_migrations(&mut context(100), &versions(&[("mod", 0)])).unwrap_err();
    assert!(matches!(
        err,
        ManagerError::MissingMigration { ref module, from_version: 0 } if module == "mod"
    ));
    assert!(log.is_empty());
    Ok(())
}

#[test]
fn plan_covers_every_module_before_running() -> color_eyre::Result<()> {
    let log = CallLog::new();
    let mut mm = wired([
        MockModule::new("a", &log).with_version(2).with_migrations([1]),
        MockModule::new("b", &log).with_version(3).with_migrations([1]),
    ])?;

    let err = mm.run_migrations(&mut context(100), &versions(&[("a", 1), ("b", 1)])).unwrap_err();
    assert!(matches!(
        err,
        ManagerError::MissingMigration { ref module, from_version: 2 } if module == "b"
    ));
    assert!(log.is_empty());
    Ok(())
}

#[test]
fn modules_migrate_in_migration_order() -> color_eyre::Result<()> {
    let log = CallLog::new();
    let mut mm = manager([
        MockModule::new("a", &log).with_version(2).with_migrations([1]),
        MockModule::new("b", &log).with_version(3).with_migrations([1, 2]),
    ])?;
    mm.set_order_migrations(["b", "a"])?;
    mm.configure()?;

    let mut ctx = context(100);
    mm.run_migrations(&mut ctx, &versions(&[("a", 1), ("b", 1)]))?;
    assert_eq!(log.calls(), ["b.migrate_from_1", "b.migrate_from_2", "a.migrate_from_1"]);
    assert_eq!(
        emitted(ctx.event_manager().events()),
        [
            ("migrate_from_1".to_string(), "b".to_string()),
            ("migrate_from_2".to_string(), "b".to_string()),
            ("migrate_from_1".to_string(), "a".to_string()),
        ]
    );
    Ok(())
}

#[test]
fn new_module_is_initialised_from_default_genesis() -> color_eyre::Result<()> {
    let log = CallLog::new();
    let mut mm = wired([
        MockModule::new("bank", &log).with_version(2).with_migrations([1]),
        MockModule::new("feegrant", &log).with_genesis(json!({"allowances": []})),
    ])?;

    let updated = mm.run_migrations(&mut context(100), &versions(&[("bank", 1)]))?;
    assert_eq!(log.calls(), ["bank.migrate_from_1", "feegrant.init_genesis"]);
    assert_eq!(updated, versions(&[("bank", 2), ("feegrant", 1)]));

    let feegrant = mm.export_genesis(&context(101), Some(&["feegrant"][..]))?;
    assert_eq!(feegrant.value("feegrant")?, Some(json!({"allowances": []})));
    Ok(())
}

#[test]
fn new_module_may_not_change_validators() -> color_eyre::Result<()> {
    let log = CallLog::new();
    let mut mm = wired([
        MockModule::new("poa", &log).with_init_updates(vec![validator_update(1, 10)]),
    ])?;

    let err = mm.run_migrations(&mut context(100), &VersionMap::new()).unwrap_err();
    assert!(matches!(
        err,
        ManagerError::UnexpectedValidatorUpdates { ref module } if module == "poa"
    ));
    Ok(())
}

#[test]
fn downgrade_is_rejected() -> color_eyre::Result<()> {
    let log = CallLog::new();
    let mut mm = wired([MockModule::new("bank", &log).with_version(2)])?;

    let err = mm.run_migrations(&mut context(100), &versions(&[("bank", 5)])).unwrap_err();
    assert!(matches!(
        err,
        ManagerError::VersionDowngrade { ref module, from: 5, to: 2 } if module == "bank"
    ));
    Ok(())
}

#[test]
fn migration_order_falls_back_to_init_genesis() -> color_eyre::Result<()> {
    let log = CallLog::new();
    let mut mm = manager([
        MockModule::new("a", &log).with_version(2).with_migrations([1]),
        MockModule::new("b", &log).with_version(2).with_migrations([1]),
    ])?;
    mm.set_order_init_genesis(["b", "a"])?;
    mm.configure()?;

    mm.run_migrations(&mut context(100), &versions(&[("a", 1), ("b", 1)]))?;
    assert_eq!(log.calls(), ["b.migrate_from_1", "a.migrate_from_1"]);
    Ok(())
}

#[test]
fn empty_order_fails_with_no_order() -> color_eyre::Result<()> {
    let log = CallLog::new();
    let mut mm = manager([MockModule::new("a", &log).with_version(2).with_migrations([1])])?;
    mm.set_order_init_genesis(Vec::<String>::new())?;
    mm.configure()?;

    let err = mm.run_migrations(&mut context(100), &versions(&[("a", 1)])).unwrap_err();
    assert!(matches!(err, ManagerError::NoOrder));
    assert!(log.is_empty());
    Ok(())
}

#[test]
fn modules_outside_the_order_keep_their_version() -> color_eyre::Result<()> {
    let log = CallLog::new();
    let mut mm = manager([
        MockModule::new("a", &log).with_version(2).with_migrations([1]),
        MockModule::new("b", &log).with_version(4),
    ])?;
    mm.set_order_migrations(["a"])?;
    mm.configure()?;

    let updated =
        mm.run_migrations(&mut context(100), &versions(&[("a", 1), ("b", 3), ("gone", 9)]))?;
    assert_eq!(updated, versions(&[("a", 2), ("b", 3)]));
    Ok(())
}

#[test]
fn failing_handler_is_fatal() -> color_eyre::Result<()> {
    let log = CallLog::new();
    let mut mm = wired([MockModule::new("a", &log)
        .with_version(3)
        .with_migrations([1, 2])
        .failing_in(Phase::Migrations)])?;

    let err = mm.run_migrations(&mut context(100), &versions(&[("a", 1)])).unwrap_err();
    assert!(matches!(
        err,
        ManagerError::Fatal { phase: Phase::Migrations, ref module, .. } if module == "a"
    ));
    assert_eq!(log.calls(), ["a.migrate_from_1"]);
    Ok(())
}
