//! In-place store migrations between consensus versions.

use color_eyre::eyre;
use lattice_genesis::JsonGenesisSource;
use lattice_types::{ConsensusVersion, Context, Phase, VersionMap};
use tracing::{debug, info};

use crate::{
    configurator::{MigrationHandler, MigrationTable},
    error::ManagerError,
    registry::{ModuleRegistry, RegisteredModule},
};

enum Step<'a> {
    /// Module absent from the previous version map, initialised from its default genesis.
    Add { name: &'a str, module: &'a RegisteredModule },
    Migrate { name: &'a str, from: ConsensusVersion, handler: &'a MigrationHandler },
}

impl Step<'_> {
    fn module(&self) -> &str {
        match self {
            Step::Add { name, .. } | Step::Migrate { name, .. } => name,
        }
    }
}

/// Runs registered migrations in migration order.
#[derive(Default)]
pub struct Migrator {
    table: MigrationTable,
}

impl Migrator {
    pub fn new(table: MigrationTable) -> Self {
        Self { table }
    }

    pub fn handler(&self, module: &str, from: ConsensusVersion) -> Option<&MigrationHandler> {
        self.table.get(module)?.get(&from)
    }

    pub fn has_migrations(&self, module: &str) -> bool {
        self.table.get(module).is_some_and(|h| !h.is_empty())
    }

    /// Brings every module in `order` from its version in `from` to its current version.
    ///
    /// The whole pass is planned first, so a missing handler or a downgrade is reported before
    /// any handler runs. Modules outside `order` keep the version they had in `from`.
    pub fn run(
        &self,
        ctx: &mut Context,
        order: &[String],
        registry: &ModuleRegistry,
        from: &VersionMap,
    ) -> Result<VersionMap, ManagerError> {
        let (steps, versions) = self.plan(order, registry, from)?;
        debug!(steps = steps.len(), "Planned migrations");

        for step in steps {
            if ctx.is_cancelled() {
                return Err(ManagerError::Cancelled {
                    phase: Phase::Migrations,
                    module: step.module().to_string(),
                });
            }

            match step {
                Step::Add { name, module } => add_module(ctx, name, module)?,
                Step::Migrate { name, from, handler } => {
                    info!(module = %name, from, to = from + 1, "Migrating module");
                    handler(&mut *ctx)
                        .map_err(|e| ManagerError::fatal(Phase::Migrations, name, e))?;
                }
            }
        }

        Ok(versions)
    }

    fn plan<'a>(
        &'a self,
        order: &'a [String],
        registry: &'a ModuleRegistry,
        from: &VersionMap,
    ) -> Result<(Vec<Step<'a>>, VersionMap), ManagerError> {
        let mut versions: VersionMap = from
            .iter()
            .filter(|(name, _)| registry.contains(name))
            .map(|(name, version)| (name.clone(), *version))
            .collect();
        let mut steps = Vec::new();

        for name in order {
            let module = registry.lookup(name)?;
            let to = module.module.consensus_version();

            match from.get(name) {
                None => steps.push(Step::Add { name, module }),
                Some(current) if current > to => {
                    return Err(ManagerError::VersionDowngrade {
                        module: name.clone(),
                        from: current,
                        to,
                    });
                }
                Some(current) => {
                    for version in current..to {
                        let handler = self.handler(name, version).ok_or_else(|| {
                            ManagerError::MissingMigration {
                                module: name.clone(),
                                from_version: version,
                            }
                        })?;
                        steps.push(Step::Migrate { name, from: version, handler });
                    }
                }
            }

            versions.insert(name.clone(), to);
        }

        Ok((steps, versions))
    }
}

fn add_module(
    ctx: &mut Context,
    name: &str,
    module: &RegisteredModule,
) -> Result<(), ManagerError> {
    let Some(genesis) = module.module.as_genesis() else {
        info!(module = %name, "Adding new module without genesis");
        return Ok(());
    };

    info!(module = %name, "Adding new module from default genesis");
    let fatal = |e: eyre::Report| ManagerError::fatal(Phase::Migrations, name, e);

    let raw = genesis.default_genesis().map_err(fatal)?;
    let mut source = JsonGenesisSource::new(name, raw);
    let updates = genesis.init_genesis(ctx, &mut source).map_err(fatal)?;
    if !updates.is_empty() {
        return Err(ManagerError::UnexpectedValidatorUpdates { module: name.to_string() });
    }
    Ok(())
}
