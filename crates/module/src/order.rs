//! Per-phase ordering lists.

use std::collections::BTreeSet;

use lattice_types::Phase;

use crate::{error::ManagerError, registry::ModuleRegistry};

/// Execution order of modules for every lifecycle phase.
///
/// Lists that were never set explicitly follow registration order. The migration order is
/// special: until it is set it falls back to the init genesis order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderingLists {
    init_genesis: Vec<String>,
    export_genesis: Vec<String>,
    pre_block: Vec<String>,
    begin_block: Vec<String>,
    end_block: Vec<String>,
    precommit: Vec<String>,
    prepare_check_state: Vec<String>,
    migrations: Option<Vec<String>>,
    explicit: BTreeSet<Phase>,
}

impl OrderingLists {
    pub fn new() -> Self {
        Self::default()
    }

    /// Effective order for `phase`.
    pub fn get(&self, phase: Phase) -> &[String] {
        match phase {
            Phase::InitGenesis => &self.init_genesis,
            Phase::ExportGenesis => &self.export_genesis,
            Phase::PreBlock => &self.pre_block,
            Phase::BeginBlock => &self.begin_block,
            Phase::EndBlock => &self.end_block,
            Phase::Precommit => &self.precommit,
            Phase::PrepareCheckState => &self.prepare_check_state,
            Phase::Migrations => self.migrations.as_deref().unwrap_or(&self.init_genesis),
        }
    }

    pub fn is_explicit(&self, phase: Phase) -> bool {
        self.explicit.contains(&phase)
    }

    /// Replaces the list for `phase` after checking every name is registered and appears once.
    /// On error the previous list is kept.
    pub fn set(
        &mut self,
        phase: Phase,
        order: Vec<String>,
        registry: &ModuleRegistry,
    ) -> Result<(), ManagerError> {
        validate(phase, &order, registry)?;

        match phase {
            Phase::Migrations => self.migrations = Some(order),
            _ => *self.list_mut(phase) = order,
        }
        self.explicit.insert(phase);
        Ok(())
    }

    /// Appends newly registered modules to every list that was not set explicitly.
    pub fn extend_defaults(&mut self, names: &[String]) {
        for phase in Phase::ALL {
            if phase == Phase::Migrations || self.is_explicit(phase) {
                continue;
            }
            self.list_mut(phase).extend(names.iter().cloned());
        }
    }

    fn list_mut(&mut self, phase: Phase) -> &mut Vec<String> {
        match phase {
            Phase::InitGenesis => &mut self.init_genesis,
            Phase::ExportGenesis => &mut self.export_genesis,
            Phase::PreBlock => &mut self.pre_block,
            Phase::BeginBlock => &mut self.begin_block,
            Phase::EndBlock => &mut self.end_block,
            Phase::Precommit => &mut self.precommit,
            Phase::PrepareCheckState => &mut self.prepare_check_state,
            Phase::Migrations => self.migrations.get_or_insert_with(Vec::new),
        }
    }
}

fn validate(phase: Phase, order: &[String], registry: &ModuleRegistry) -> Result<(), ManagerError> {
    let mut seen = BTreeSet::new();
    for name in order {
        if !registry.contains(name) {
            return Err(ManagerError::UnknownModule(name.clone()));
        }
        if !seen.insert(name.as_str()) {
            return Err(ManagerError::DuplicateInOrder { phase, name: name.clone() });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::capability::AppModule;

    struct Named(&'static str);

    impl AppModule for Named {
        fn name(&self) -> &str {
            self.0
        }
    }

    fn setup() -> (ModuleRegistry, OrderingLists) {
        let mut registry = ModuleRegistry::new();
        let names = registry
            .register(["a", "b", "c"].map(|n| Arc::new(Named(n)) as Arc<dyn AppModule>))
            .unwrap();
        let mut orders = OrderingLists::new();
        orders.extend_defaults(&names);
        (registry, orders)
    }

    fn order(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn defaults_follow_registration_order() {
        let (_, orders) = setup();
        for phase in Phase::ALL {
            assert_eq!(orders.get(phase), ["a", "b", "c"], "{phase}");
        }
    }

    #[test]
    fn rejected_order_keeps_previous_list() {
        let (registry, mut orders) = setup();
        orders.set(Phase::BeginBlock, order(&["c", "a"]), &registry).unwrap();

        let err = orders.set(Phase::BeginBlock, order(&["a", "ghost"]), &registry).unwrap_err();
        assert!(matches!(err, ManagerError::UnknownModule(name) if name == "ghost"));

        let err = orders.set(Phase::BeginBlock, order(&["b", "b"]), &registry).unwrap_err();
        assert!(matches!(
            err,
            ManagerError::DuplicateInOrder { phase: Phase::BeginBlock, name } if name == "b"
        ));

        assert_eq!(orders.get(Phase::BeginBlock), ["c", "a"]);
    }

    #[test]
    fn migration_order_falls_back_to_init_genesis() {
        let (registry, mut orders) = setup();
        orders.set(Phase::InitGenesis, order(&["c", "b", "a"]), &registry).unwrap();
        assert_eq!(orders.get(Phase::Migrations), ["c", "b", "a"]);

        orders.set(Phase::Migrations, order(&["b"]), &registry).unwrap();
        assert_eq!(orders.get(Phase::Migrations), ["b"]);
        assert_eq!(orders.get(Phase::InitGenesis), ["c", "b", "a"]);
    }

    #[test]
    fn explicit_lists_ignore_later_registrations() {
        let (registry, mut orders) = setup();
        orders.set(Phase::EndBlock, order(&["b"]), &registry).unwrap();

        orders.extend_defaults(&order(&["d"]));
        assert_eq!(orders.get(Phase::EndBlock), ["b"]);
        assert_eq!(orders.get(Phase::BeginBlock), ["a", "b", "c", "d"]);
    }
}
