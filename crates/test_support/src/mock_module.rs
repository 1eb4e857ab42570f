//! A configurable module that records every hook it runs.

use std::sync::{Arc, Mutex, PoisonError};

use color_eyre::eyre::{bail, eyre};
use lattice_genesis::{GenesisSource, GenesisSourceExt, GenesisTarget, GenesisTargetExt};
use lattice_module::{
    AppModule, Configurator, HasBeginBlock, HasEndBlock, HasGenesis, HasPreBlock, HasPrecommit,
    HasPrepareCheckState, HasServices, HookResult, ManagerError, PreBlockOutcome,
    ServiceDescriptor, ServiceHandler,
};
use lattice_types::{ConsensusVersion, Context, Event, Phase, ValidatorUpdate};
use serde_json::{Value, json, value::RawValue};

use crate::recorder::CallLog;

/// Answers every method with `<method>:<request>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct EchoHandler;

impl ServiceHandler for EchoHandler {
    fn handle(&self, _ctx: &mut Context, method: &str, request: &[u8]) -> HookResult<Vec<u8>> {
        let mut out = format!("{method}:").into_bytes();
        out.extend_from_slice(request);
        Ok(out)
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Hooks {
    genesis: bool,
    pre_block: bool,
    begin_block: bool,
    end_block: bool,
    precommit: bool,
    prepare_check_state: bool,
}

/// Test module whose capabilities and behaviour are chosen through builder methods.
///
/// Every hook records `<name>.<phase>` in the shared [`CallLog`] and emits an event of kind
/// `<phase>` carrying a `module` attribute. Genesis state is kept in memory: `init_genesis` stores
/// the fragment it reads, `export_genesis` writes it back.
pub struct MockModule {
    name: String,
    version: ConsensusVersion,
    hooks: Hooks,
    log: CallLog,
    state: Mutex<Value>,
    default_genesis: Value,
    export_fields: bool,
    init_updates: Vec<ValidatorUpdate>,
    end_block_updates: Vec<ValidatorUpdate>,
    params_changed: bool,
    fail_in: Option<Phase>,
    cancel_in: Option<Phase>,
    migrations: Vec<ConsensusVersion>,
    services: Vec<ServiceDescriptor>,
}

impl MockModule {
    pub fn new(name: impl Into<String>, log: &CallLog) -> Self {
        Self {
            name: name.into(),
            version: 1,
            hooks: Hooks::default(),
            log: log.clone(),
            state: Mutex::new(Value::Null),
            default_genesis: json!({}),
            export_fields: false,
            init_updates: Vec::new(),
            end_block_updates: Vec::new(),
            params_changed: false,
            fail_in: None,
            cancel_in: None,
            migrations: Vec::new(),
            services: Vec::new(),
        }
    }

    /// Every lifecycle capability, genesis included.
    pub fn with_all_hooks(mut self) -> Self {
        self.hooks = Hooks {
            genesis: true,
            pre_block: true,
            begin_block: true,
            end_block: true,
            precommit: true,
            prepare_check_state: true,
        };
        self
    }

    pub fn with_version(mut self, version: ConsensusVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_genesis(mut self, default_genesis: Value) -> Self {
        self.hooks.genesis = true;
        self.default_genesis = default_genesis;
        self
    }

    /// Export each top-level key of the state as its own field stream.
    pub fn with_field_export(mut self) -> Self {
        self.export_fields = true;
        self
    }

    pub fn with_pre_block(mut self, params_changed: bool) -> Self {
        self.hooks.pre_block = true;
        self.params_changed = params_changed;
        self
    }

    pub fn with_begin_block(mut self) -> Self {
        self.hooks.begin_block = true;
        self
    }

    pub fn with_end_block(mut self, updates: Vec<ValidatorUpdate>) -> Self {
        self.hooks.end_block = true;
        self.end_block_updates = updates;
        self
    }

    pub fn with_precommit(mut self) -> Self {
        self.hooks.precommit = true;
        self
    }

    pub fn with_prepare_check_state(mut self) -> Self {
        self.hooks.prepare_check_state = true;
        self
    }

    pub fn with_init_updates(mut self, updates: Vec<ValidatorUpdate>) -> Self {
        self.hooks.genesis = true;
        self.init_updates = updates;
        self
    }

    /// Fail the hook of `phase` with an error.
    pub fn failing_in(mut self, phase: Phase) -> Self {
        self.fail_in = Some(phase);
        self
    }

    /// Cancel the context while running the hook of `phase`.
    pub fn cancelling_in(mut self, phase: Phase) -> Self {
        self.cancel_in = Some(phase);
        self
    }

    /// Register a migration handler from each of `versions`, in the given order.
    pub fn with_migrations(mut self, versions: impl IntoIterator<Item = ConsensusVersion>) -> Self {
        self.migrations.extend(versions);
        self
    }

    pub fn with_service(mut self, descriptor: ServiceDescriptor) -> Self {
        self.services.push(descriptor);
        self
    }

    pub fn into_arc(self) -> Arc<dyn AppModule> {
        Arc::new(self)
    }

    /// Genesis state currently held by the module.
    pub fn state(&self) -> Value {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn run(&self, ctx: &mut Context, phase: Phase) -> HookResult {
        self.log.record(&self.name, phase.as_str());
        let event = Event::new(phase.as_str()).with_attribute("module", &self.name);
        ctx.event_manager_mut().emit(event);

        if self.cancel_in == Some(phase) {
            ctx.cancellation().cancel();
        }
        if self.fail_in == Some(phase) {
            bail!("{} failed in {phase}", self.name);
        }
        Ok(())
    }

    fn set_state(&self, value: Value) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = value;
    }
}

impl AppModule for MockModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn consensus_version(&self) -> ConsensusVersion {
        self.version
    }

    fn as_genesis(&self) -> Option<&dyn HasGenesis> {
        self.hooks.genesis.then_some(self as &dyn HasGenesis)
    }

    fn as_pre_block(&self) -> Option<&dyn HasPreBlock> {
        self.hooks.pre_block.then_some(self as &dyn HasPreBlock)
    }

    fn as_begin_block(&self) -> Option<&dyn HasBeginBlock> {
        self.hooks.begin_block.then_some(self as &dyn HasBeginBlock)
    }

    fn as_end_block(&self) -> Option<&dyn HasEndBlock> {
        self.hooks.end_block.then_some(self as &dyn HasEndBlock)
    }

    fn as_precommit(&self) -> Option<&dyn HasPrecommit> {
        self.hooks.precommit.then_some(self as &dyn HasPrecommit)
    }

    fn as_prepare_check_state(&self) -> Option<&dyn HasPrepareCheckState> {
        self.hooks.prepare_check_state.then_some(self as &dyn HasPrepareCheckState)
    }

    fn as_services(&self) -> Option<&dyn HasServices> {
        let registers = !self.migrations.is_empty() || !self.services.is_empty();
        registers.then_some(self as &dyn HasServices)
    }
}

impl HasGenesis for MockModule {
    fn default_genesis(&self) -> HookResult<Box<RawValue>> {
        Ok(serde_json::value::to_raw_value(&self.default_genesis)?)
    }

    fn validate_genesis(&self, fragment: &RawValue) -> HookResult {
        let value: Value = serde_json::from_str(fragment.get())?;
        if !value.is_object() {
            bail!("genesis of {} must be an object", self.name);
        }
        if value.get("invalid") == Some(&Value::Bool(true)) {
            bail!("genesis of {} is marked invalid", self.name);
        }
        Ok(())
    }

    fn init_genesis(
        &self,
        ctx: &mut Context,
        source: &mut dyn GenesisSource,
    ) -> HookResult<Vec<ValidatorUpdate>> {
        self.run(ctx, Phase::InitGenesis)?;
        let state: Value = source.read_message()?;
        self.set_state(state);
        Ok(self.init_updates.clone())
    }

    fn export_genesis(&self, ctx: &mut Context, target: &mut dyn GenesisTarget) -> HookResult {
        self.run(ctx, Phase::ExportGenesis)?;
        let state = self.state();

        if self.export_fields {
            let Value::Object(fields) = state else {
                return Err(eyre!("{} has no object state to export by field", self.name));
            };
            for (field, value) in &fields {
                target.write_field(field, value)?;
            }
            return Ok(());
        }

        let raw = serde_json::value::to_raw_value(&state)?;
        target.write_raw_json(&raw)?;
        Ok(())
    }
}

impl HasPreBlock for MockModule {
    fn pre_block(&self, ctx: &mut Context) -> HookResult<PreBlockOutcome> {
        self.run(ctx, Phase::PreBlock)?;
        Ok(PreBlockOutcome { consensus_params_changed: self.params_changed })
    }
}

impl HasBeginBlock for MockModule {
    fn begin_block(&self, ctx: &mut Context) -> HookResult {
        self.run(ctx, Phase::BeginBlock)
    }
}

impl HasEndBlock for MockModule {
    fn end_block(&self, ctx: &mut Context) -> HookResult<Vec<ValidatorUpdate>> {
        self.run(ctx, Phase::EndBlock)?;
        Ok(self.end_block_updates.clone())
    }
}

impl HasPrecommit for MockModule {
    fn precommit(&self, ctx: &mut Context) -> HookResult {
        self.run(ctx, Phase::Precommit)
    }
}

impl HasPrepareCheckState for MockModule {
    fn prepare_check_state(&self, ctx: &mut Context) -> HookResult {
        self.run(ctx, Phase::PrepareCheckState)
    }
}

impl HasServices for MockModule {
    fn register_services(&self, cfg: &mut Configurator) -> Result<(), ManagerError> {
        for descriptor in &self.services {
            cfg.register_service(descriptor.clone(), Arc::new(EchoHandler));
        }

        for &from in &self.migrations {
            let log = self.log.clone();
            let name = self.name.clone();
            let fail = self.fail_in == Some(Phase::Migrations);
            cfg.register_migration(&self.name, from, move |ctx: &mut Context| {
                let hook = format!("migrate_from_{from}");
                log.record(&name, &hook);
                ctx.event_manager_mut().emit(Event::new(hook).with_attribute("module", &name));
                if fail {
                    return Err(eyre!("{name} migration from {from} failed"));
                }
                Ok(())
            })?;
        }
        Ok(())
    }
}
