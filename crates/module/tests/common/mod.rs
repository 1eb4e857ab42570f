//! Helpers shared by the module manager integration tests.
#![allow(dead_code)]

use lattice_module::{ManagerError, ModuleManager};
use lattice_test_support::MockModule;
use lattice_types::Event;

/// Registers `modules` in the given order.
pub fn manager(
    modules: impl IntoIterator<Item = MockModule>,
) -> Result<ModuleManager, ManagerError> {
    ModuleManager::new(modules.into_iter().map(MockModule::into_arc))
}

/// `(kind, module)` pairs of `events`, in order.
pub fn emitted(events: &[Event]) -> Vec<(String, String)> {
    events
        .iter()
        .map(|e| (e.kind.clone(), e.attribute("module").unwrap_or_default().to_string()))
        .collect()
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
