use std::{collections::BTreeMap, sync::Arc};

use crate::{
    capability::{AppModule, Capabilities},
    error::ManagerError,
};

/// A registered module together with the capabilities probed when it was added.
#[derive(Clone)]
pub struct RegisteredModule {
    pub module: Arc<dyn AppModule>,
    pub capabilities: Capabilities,
}

/// Name-keyed set of modules.
///
/// Lookups go through a sorted map, insertion order is kept separately because it seeds the
/// default ordering lists.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, RegisteredModule>,
    insertion: Vec<String>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `modules` to the registry and returns their names in insertion order.
    ///
    /// Either every module is added or none is.
    pub fn register(
        &mut self,
        modules: impl IntoIterator<Item = Arc<dyn AppModule>>,
    ) -> Result<Vec<String>, ManagerError> {
        let modules: Vec<_> = modules.into_iter().collect();

        let mut added: Vec<String> = Vec::with_capacity(modules.len());
        for module in &modules {
            let name = module.name();
            validate_name(name)?;
            if self.modules.contains_key(name) || added.iter().any(|n| n == name) {
                return Err(ManagerError::DuplicateName(name.to_string()));
            }
            added.push(name.to_string());
        }

        for (name, module) in added.iter().zip(modules) {
            let capabilities = Capabilities::probe(module.as_ref());
            self.modules.insert(name.clone(), RegisteredModule { module, capabilities });
            self.insertion.push(name.clone());
        }

        Ok(added)
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredModule> {
        self.modules.get(name)
    }

    pub fn lookup(&self, name: &str) -> Result<&RegisteredModule, ManagerError> {
        self.get(name).ok_or_else(|| ManagerError::UnknownModule(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Registered modules, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RegisteredModule)> {
        self.modules.iter().map(|(name, m)| (name.as_str(), m))
    }

    pub fn insertion_order(&self) -> &[String] {
        &self.insertion
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

fn validate_name(name: &str) -> Result<(), ManagerError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);

    if invalid { Err(ManagerError::InvalidName(name.to_string())) } else { Ok(()) }
}
