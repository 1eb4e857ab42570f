//! The module manager.
//!
//! [`ModuleManager`] owns the registered modules and their per-phase ordering lists, and drives
//! every lifecycle phase on behalf of the consensus engine. Each phase runs against a branch of the
//! caller's [`Context`] with a fresh event manager, walks the modules of that phase in order and
//! stops at the first failing hook.

use std::{collections::BTreeMap, path::Path, sync::Arc};

use lattice_genesis::{
    FileGenesisSource, FileGenesisTarget, GenesisDocument, GenesisSource, JsonGenesisSource,
    JsonGenesisTarget,
};
use lattice_types::{
    BeginBlockResponse, Context, EndBlockResponse, InitChainResponse, Phase, PreBlockResponse,
    VersionMap,
};
use tracing::{debug, info, trace, warn};

use crate::{
    aggregate::ValidatorUpdateCollector,
    capability::AppModule,
    config::RuntimeConfig,
    configurator::{Configurator, ServiceRouter},
    error::ManagerError,
    migrator::Migrator,
    order::OrderingLists,
    registry::ModuleRegistry,
};

/// Modules taking part in each phase, in phase order. Rebuilt whenever registration or ordering
/// changes so that dispatch never has to probe capabilities.
#[derive(Default)]
struct DispatchPlan {
    participants: BTreeMap<Phase, Vec<Arc<dyn AppModule>>>,
}

impl DispatchPlan {
    fn build(registry: &ModuleRegistry, orders: &OrderingLists) -> Self {
        let participants = Phase::ALL
            .into_iter()
            .filter(|phase| *phase != Phase::Migrations)
            .map(|phase| {
                let modules = orders
                    .get(phase)
                    .iter()
                    .filter_map(|name| registry.get(name))
                    .filter(|m| m.capabilities.supports(phase))
                    .map(|m| Arc::clone(&m.module))
                    .collect();
                (phase, modules)
            })
            .collect();
        Self { participants }
    }

    fn get(&self, phase: Phase) -> &[Arc<dyn AppModule>] {
        self.participants.get(&phase).map(Vec::as_slice).unwrap_or_default()
    }
}

#[derive(Default)]
pub struct ModuleManager {
    registry: ModuleRegistry,
    orders: OrderingLists,
    plan: DispatchPlan,
    msg_router: ServiceRouter,
    query_router: ServiceRouter,
    migrator: Migrator,
    version_map: VersionMap,
    wired: bool,
    sealed: bool,
}

impl ModuleManager {
    pub fn new(
        modules: impl IntoIterator<Item = Arc<dyn AppModule>>,
    ) -> Result<Self, ManagerError> {
        let mut manager = Self::default();
        manager.register(modules)?;
        Ok(manager)
    }

    // ========================================================================
    // Wiring
    // ========================================================================

    /// Registers more modules. Ordering lists that were never set explicitly get the new modules
    /// appended.
    pub fn register(
        &mut self,
        modules: impl IntoIterator<Item = Arc<dyn AppModule>>,
    ) -> Result<(), ManagerError> {
        self.ensure_mutable()?;
        if self.wired {
            return Err(ManagerError::AlreadyWired);
        }

        let added = self.registry.register(modules)?;
        self.orders.extend_defaults(&added);
        self.rebuild_plan();

        debug!(modules = ?added, "Registered modules");
        Ok(())
    }

    /// Replaces the ordering list of `phase`. The previous list is kept if validation fails.
    pub fn set_order(
        &mut self,
        phase: Phase,
        order: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<(), ManagerError> {
        self.ensure_mutable()?;

        let order = order.into_iter().map(Into::into).collect();
        self.orders.set(phase, order, &self.registry)?;
        self.rebuild_plan();
        Ok(())
    }

    pub fn set_order_init_genesis(
        &mut self,
        order: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<(), ManagerError> {
        self.set_order(Phase::InitGenesis, order)
    }

    pub fn set_order_export_genesis(
        &mut self,
        order: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<(), ManagerError> {
        self.set_order(Phase::ExportGenesis, order)
    }

    pub fn set_order_pre_blockers(
        &mut self,
        order: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<(), ManagerError> {
        self.set_order(Phase::PreBlock, order)
    }

    pub fn set_order_begin_blockers(
        &mut self,
        order: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<(), ManagerError> {
        self.set_order(Phase::BeginBlock, order)
    }

    pub fn set_order_end_blockers(
        &mut self,
        order: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<(), ManagerError> {
        self.set_order(Phase::EndBlock, order)
    }

    pub fn set_order_precommiters(
        &mut self,
        order: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<(), ManagerError> {
        self.set_order(Phase::Precommit, order)
    }

    pub fn set_order_prepare_check_staters(
        &mut self,
        order: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<(), ManagerError> {
        self.set_order(Phase::PrepareCheckState, order)
    }

    pub fn set_order_migrations(
        &mut self,
        order: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<(), ManagerError> {
        self.set_order(Phase::Migrations, order)
    }

    /// Applies every ordering override in `config`. Nothing changes if any list is invalid.
    pub fn apply_config(&mut self, config: &RuntimeConfig) -> Result<(), ManagerError> {
        self.ensure_mutable()?;

        let mut orders = self.orders.clone();
        for phase in Phase::ALL {
            if let Some(order) = config.order(phase) {
                orders.set(phase, order.to_vec(), &self.registry)?;
                debug!(%phase, ?order, "Applied ordering override");
            }
        }

        self.orders = orders;
        self.rebuild_plan();
        Ok(())
    }

    /// A configurator that accepts migrations for the registered modules.
    pub fn configurator(&self) -> Configurator {
        Configurator::new(self.registry.names())
    }

    /// Lets every module with services register them on `cfg`, in registration order.
    ///
    /// Stops at the first module whose registration fails.
    pub fn register_services(&self, cfg: &mut Configurator) -> Result<(), ManagerError> {
        for name in self.registry.insertion_order() {
            let Some(module) = self.registry.get(name) else { continue };
            let Some(services) = module.module.as_services() else { continue };

            cfg.enter_module(Some(name));
            let registered = services.register_services(cfg);
            cfg.enter_module(None);
            registered?;
        }
        Ok(())
    }

    /// Takes over the routers and migrations collected by `cfg`.
    ///
    /// Fails with the accumulated service registration errors, if any. Can only succeed once.
    pub fn complete_wiring(&mut self, cfg: Configurator) -> Result<(), ManagerError> {
        if self.wired {
            return Err(ManagerError::AlreadyWired);
        }
        cfg.error()?;

        let (msg_router, query_router, migrations) = cfg.into_parts();
        info!(
            msg_services = msg_router.len(),
            query_services = query_router.len(),
            migrations = migrations.values().map(|h| h.len()).sum::<usize>(),
            "Completed module wiring"
        );

        self.msg_router = msg_router;
        self.query_router = query_router;
        self.migrator = Migrator::new(migrations);
        self.wired = true;
        Ok(())
    }

    /// Registers every module's services and completes wiring in one step.
    pub fn configure(&mut self) -> Result<(), ManagerError> {
        if self.wired {
            return Err(ManagerError::AlreadyWired);
        }
        let mut cfg = self.configurator();
        self.register_services(&mut cfg)?;
        self.complete_wiring(cfg)
    }

    /// Freezes the registry and ordering lists. Called by chain initialisation; nodes restarting
    /// from existing state call it themselves.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn is_wired(&self) -> bool {
        self.wired
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn orders(&self) -> &OrderingLists {
        &self.orders
    }

    pub fn module(&self, name: &str) -> Option<&Arc<dyn AppModule>> {
        self.registry.get(name).map(|m| &m.module)
    }

    /// Sorted names of every registered module.
    pub fn module_names(&self) -> Vec<&str> {
        self.registry.names().collect()
    }

    /// Modules that take part in `phase`, in execution order.
    pub fn participants(&self, phase: Phase) -> Vec<&str> {
        match phase {
            Phase::Migrations => self.orders.get(phase).iter().map(String::as_str).collect(),
            _ => self.plan.get(phase).iter().map(|m| m.name()).collect(),
        }
    }

    pub fn msg_router(&self) -> &ServiceRouter {
        &self.msg_router
    }

    pub fn query_router(&self) -> &ServiceRouter {
        &self.query_router
    }

    pub fn migrator(&self) -> &Migrator {
        &self.migrator
    }

    /// Versions recorded by the last chain initialisation or migration pass.
    pub fn version_map(&self) -> &VersionMap {
        &self.version_map
    }

    /// Current consensus version of every registered module.
    pub fn current_versions(&self) -> VersionMap {
        self.registry.iter().map(|(name, m)| (name, m.module.consensus_version())).collect()
    }

    // ========================================================================
    // Genesis
    // ========================================================================

    /// Default genesis of every module with genesis support.
    pub fn default_genesis(&self) -> Result<GenesisDocument, ManagerError> {
        let mut doc = GenesisDocument::new();
        for (name, registered) in self.registry.iter() {
            let Some(genesis) = registered.module.as_genesis() else { continue };
            let raw = genesis
                .default_genesis()
                .map_err(|e| ManagerError::invalid_genesis(name, e))?;
            doc.insert(name, raw);
        }
        Ok(doc)
    }

    /// Validates every fragment of `doc` that belongs to a module with genesis support.
    pub fn validate_genesis(&self, doc: &GenesisDocument) -> Result<(), ManagerError> {
        for name in doc.module_names() {
            if !self.registry.contains(name) {
                warn!(module = %name, "Genesis fragment for unregistered module");
            }
        }

        for (name, registered) in self.registry.iter() {
            let Some(genesis) = registered.module.as_genesis() else { continue };
            let Some(fragment) = doc.get(name) else { continue };
            genesis.validate_genesis(fragment).map_err(|e| ManagerError::invalid_genesis(name, e))?;
        }
        Ok(())
    }

    /// Initialises the chain from an in-memory genesis document.
    ///
    /// Modules without a fragment in `genesis` are skipped. Records the version map and seals the
    /// manager on success. A sealed manager was already initialised and fails with
    /// [`ManagerError::Sealed`].
    pub fn init_chain(
        &mut self,
        ctx: &Context,
        genesis: &GenesisDocument,
    ) -> Result<InitChainResponse, ManagerError> {
        for name in genesis.module_names() {
            if !self.plan.get(Phase::InitGenesis).iter().any(|m| m.name() == name) {
                warn!(module = %name, "Genesis fragment has no init genesis participant, ignoring");
            }
        }

        self.run_init_genesis(ctx, |name| {
            Ok(genesis.get(name).map(|raw| {
                Box::new(JsonGenesisSource::new(name, raw.to_owned())) as Box<dyn GenesisSource>
            }))
        })
    }

    /// Initialises the chain from the raw `app_state` JSON object.
    pub fn init_chain_from_json(
        &mut self,
        ctx: &Context,
        app_state: &[u8],
    ) -> Result<InitChainResponse, ManagerError> {
        let genesis = GenesisDocument::from_slice(app_state)?;
        self.init_chain(ctx, &genesis)
    }

    /// Initialises the chain from a genesis directory, every participant reading its own files.
    /// Participants with no state in any layer of the directory are skipped.
    pub fn init_genesis_from_dir(
        &mut self,
        ctx: &Context,
        dir: &Path,
    ) -> Result<InitChainResponse, ManagerError> {
        info!(dir = %dir.display(), "Initialising genesis from directory");
        self.run_init_genesis(ctx, |name| {
            let mut source = FileGenesisSource::new(dir, name);
            if !source.has_fragment()? {
                return Ok(None);
            }
            Ok(Some(Box::new(source) as Box<dyn GenesisSource>))
        })
    }

    fn run_init_genesis(
        &mut self,
        ctx: &Context,
        mut source_for: impl FnMut(&str) -> Result<Option<Box<dyn GenesisSource>>, ManagerError>,
    ) -> Result<InitChainResponse, ManagerError> {
        self.ensure_mutable()?;

        let mut phase_ctx = ctx.branch();
        let mut validators = ValidatorUpdateCollector::new(Phase::InitGenesis);

        self.dispatch(Phase::InitGenesis, &mut phase_ctx, |module, ctx| {
            let name = module.name();
            let Some(genesis) = module.as_genesis() else { return Ok(()) };
            let Some(mut source) = source_for(name)? else {
                debug!(module = %name, "No genesis fragment, skipping");
                return Ok(());
            };

            let updates = genesis
                .init_genesis(ctx, source.as_mut())
                .map_err(|e| ManagerError::fatal(Phase::InitGenesis, name, e))?;
            validators.add(name, updates)
        })?;

        self.version_map = self.current_versions();
        self.sealed = true;

        let validators = validators.finish();
        let events = phase_ctx.into_events();
        info!(
            chain_id = %ctx.chain_id(),
            validators = validators.len(),
            events = events.len(),
            "Initialised chain"
        );

        Ok(InitChainResponse { validators, events })
    }

    /// Exports the genesis of the modules selected by `filter`, all of them when it is `None` or
    /// empty. Every filter entry must be in the export order.
    pub fn export_genesis(
        &self,
        ctx: &Context,
        filter: Option<&[&str]>,
    ) -> Result<GenesisDocument, ManagerError> {
        let selected = self.export_filter(filter)?;
        let mut phase_ctx = ctx.branch();
        let mut doc = GenesisDocument::new();

        self.dispatch(Phase::ExportGenesis, &mut phase_ctx, |module, ctx| {
            let name = module.name();
            let Some(genesis) = module.as_genesis() else { return Ok(()) };
            if !selected(name) {
                return Ok(());
            }

            let mut target = JsonGenesisTarget::new(name);
            genesis
                .export_genesis(ctx, &mut target)
                .map_err(|e| ManagerError::fatal(Phase::ExportGenesis, name, e))?;
            doc.insert(name, target.flush()?);
            Ok(())
        })?;

        info!(height = %ctx.height(), modules = doc.len(), "Exported genesis");
        Ok(doc)
    }

    /// Exports the selected modules into `dir`, each through its own file-backed target.
    pub fn export_genesis_to_dir(
        &self,
        ctx: &Context,
        dir: &Path,
        filter: Option<&[&str]>,
        indent: bool,
    ) -> Result<(), ManagerError> {
        let selected = self.export_filter(filter)?;
        let mut phase_ctx = ctx.branch();
        let mut exported = 0usize;

        self.dispatch(Phase::ExportGenesis, &mut phase_ctx, |module, ctx| {
            let name = module.name();
            let Some(genesis) = module.as_genesis() else { return Ok(()) };
            if !selected(name) {
                return Ok(());
            }

            let mut target = FileGenesisTarget::new(dir, name).with_indent(indent);
            genesis
                .export_genesis(ctx, &mut target)
                .map_err(|e| ManagerError::fatal(Phase::ExportGenesis, name, e))?;
            exported += 1;
            Ok(())
        })?;

        info!(height = %ctx.height(), dir = %dir.display(), modules = exported, "Exported genesis");
        Ok(())
    }

    fn export_filter<'a>(
        &self,
        filter: Option<&'a [&'a str]>,
    ) -> Result<impl Fn(&str) -> bool + 'a, ManagerError> {
        let filter = filter.unwrap_or_default();
        let order = self.orders.get(Phase::ExportGenesis);
        let in_order = |name: &str| order.iter().any(|o| o == name);
        if let Some(unknown) = filter.iter().find(|name| !in_order(**name)) {
            return Err(ManagerError::UnknownModule(unknown.to_string()));
        }
        Ok(move |name: &str| filter.is_empty() || filter.iter().any(|f| *f == name))
    }

    // ========================================================================
    // Block lifecycle
    // ========================================================================

    pub fn pre_block(&self, ctx: &Context) -> Result<PreBlockResponse, ManagerError> {
        let mut phase_ctx = ctx.branch();
        let mut consensus_params_changed = false;

        self.dispatch(Phase::PreBlock, &mut phase_ctx, |module, ctx| {
            let Some(hook) = module.as_pre_block() else { return Ok(()) };
            let outcome = hook
                .pre_block(ctx)
                .map_err(|e| ManagerError::fatal(Phase::PreBlock, module.name(), e))?;
            consensus_params_changed |= outcome.consensus_params_changed;
            Ok(())
        })?;

        let events = phase_ctx.into_events();
        debug!(
            height = %ctx.height(),
            consensus_params_changed,
            events = events.len(),
            "Pre block"
        );
        Ok(PreBlockResponse { consensus_params_changed, events })
    }

    pub fn begin_block(&self, ctx: &Context) -> Result<BeginBlockResponse, ManagerError> {
        let mut phase_ctx = ctx.branch();

        self.dispatch(Phase::BeginBlock, &mut phase_ctx, |module, ctx| {
            let Some(hook) = module.as_begin_block() else { return Ok(()) };
            hook.begin_block(ctx)
                .map_err(|e| ManagerError::fatal(Phase::BeginBlock, module.name(), e))
        })?;

        let events = phase_ctx.into_events();
        debug!(height = %ctx.height(), events = events.len(), "Begin block");
        Ok(BeginBlockResponse { events })
    }

    pub fn end_block(&self, ctx: &Context) -> Result<EndBlockResponse, ManagerError> {
        let mut phase_ctx = ctx.branch();
        let mut validators = ValidatorUpdateCollector::new(Phase::EndBlock);

        self.dispatch(Phase::EndBlock, &mut phase_ctx, |module, ctx| {
            let Some(hook) = module.as_end_block() else { return Ok(()) };
            let updates = hook
                .end_block(ctx)
                .map_err(|e| ManagerError::fatal(Phase::EndBlock, module.name(), e))?;
            validators.add(module.name(), updates)
        })?;

        let validator_updates = validators.finish();
        let events = phase_ctx.into_events();
        debug!(
            height = %ctx.height(),
            validator_updates = validator_updates.len(),
            events = events.len(),
            "End block"
        );
        Ok(EndBlockResponse { validator_updates, events })
    }

    /// Runs the precommit hooks before the block's state is committed.
    pub fn precommit(&self, ctx: &Context) -> Result<(), ManagerError> {
        let mut phase_ctx = ctx.branch();
        self.dispatch(Phase::Precommit, &mut phase_ctx, |module, ctx| {
            let Some(hook) = module.as_precommit() else { return Ok(()) };
            hook.precommit(ctx).map_err(|e| ManagerError::fatal(Phase::Precommit, module.name(), e))
        })
    }

    /// Runs the hooks that refresh the check state after commit.
    pub fn prepare_check_state(&self, ctx: &Context) -> Result<(), ManagerError> {
        let mut phase_ctx = ctx.branch();
        self.dispatch(Phase::PrepareCheckState, &mut phase_ctx, |module, ctx| {
            let Some(hook) = module.as_prepare_check_state() else { return Ok(()) };
            hook.prepare_check_state(ctx)
                .map_err(|e| ManagerError::fatal(Phase::PrepareCheckState, module.name(), e))
        })
    }

    /// Commit step: every precommiter in order, then every prepare-check-stater.
    pub fn commit(&self, ctx: &Context) -> Result<(), ManagerError> {
        self.precommit(ctx)?;
        self.prepare_check_state(ctx)
    }

    // ========================================================================
    // Migrations
    // ========================================================================

    /// Migrates every module in migration order from the versions in `from`.
    ///
    /// Events emitted by handlers land in `ctx`. Returns the new version map, which is also
    /// recorded on the manager.
    pub fn run_migrations(
        &mut self,
        ctx: &mut Context,
        from: &VersionMap,
    ) -> Result<VersionMap, ManagerError> {
        let order = self.orders.get(Phase::Migrations);
        if order.is_empty() {
            return Err(ManagerError::NoOrder);
        }

        info!(height = %ctx.height(), modules = order.len(), "Running migrations");
        let versions = self.migrator.run(ctx, order, &self.registry, from)?;
        self.version_map = versions.clone();
        Ok(versions)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn dispatch(
        &self,
        phase: Phase,
        ctx: &mut Context,
        mut hook: impl FnMut(&dyn AppModule, &mut Context) -> Result<(), ManagerError>,
    ) -> Result<(), ManagerError> {
        for module in self.plan.get(phase) {
            let name = module.name();
            if ctx.is_cancelled() {
                return Err(ManagerError::Cancelled { phase, module: name.to_string() });
            }

            trace!(%phase, module = %name, "Running hook");
            hook(module.as_ref(), &mut *ctx)?;
        }
        Ok(())
    }

    fn rebuild_plan(&mut self) {
        self.plan = DispatchPlan::build(&self.registry, &self.orders);
    }

    fn ensure_mutable(&self) -> Result<(), ManagerError> {
        if self.sealed { Err(ManagerError::Sealed) } else { Ok(()) }
    }
}
