//! The module contract and its optional capabilities.
//!
//! A module implements [`AppModule`] and opts into lifecycle phases by overriding the matching
//! `as_*` probe to return itself. The manager probes every module once at registration and only
//! dispatches a phase to modules that answered.

use color_eyre::eyre;
use lattice_genesis::{GenesisSource, GenesisTarget};
use lattice_types::{
    ConsensusVersion, Context, Phase, ValidatorUpdate, constants::DEFAULT_CONSENSUS_VERSION,
};
use serde_json::value::RawValue;

use crate::{configurator::Configurator, error::ManagerError};

/// Result type returned by module hooks.
pub type HookResult<T = ()> = eyre::Result<T>;

/// A self-contained unit of application logic.
pub trait AppModule: Send + Sync {
    /// Unique, non-empty identifier of the module.
    fn name(&self) -> &str;

    /// Current revision of the module's state layout. Bumped whenever a migration is required.
    fn consensus_version(&self) -> ConsensusVersion {
        DEFAULT_CONSENSUS_VERSION
    }

    fn as_genesis(&self) -> Option<&dyn HasGenesis> {
        None
    }

    fn as_pre_block(&self) -> Option<&dyn HasPreBlock> {
        None
    }

    fn as_begin_block(&self) -> Option<&dyn HasBeginBlock> {
        None
    }

    fn as_end_block(&self) -> Option<&dyn HasEndBlock> {
        None
    }

    fn as_precommit(&self) -> Option<&dyn HasPrecommit> {
        None
    }

    fn as_prepare_check_state(&self) -> Option<&dyn HasPrepareCheckState> {
        None
    }

    fn as_services(&self) -> Option<&dyn HasServices> {
        None
    }
}

/// Genesis import, export and validation.
pub trait HasGenesis {
    /// Fragment written into a freshly generated genesis document.
    fn default_genesis(&self) -> HookResult<Box<RawValue>>;

    /// Checks a fragment without touching state.
    fn validate_genesis(&self, fragment: &RawValue) -> HookResult;

    /// Loads the module's state from its fragment. Only one module per chain may return
    /// validator updates.
    fn init_genesis(
        &self,
        ctx: &mut Context,
        source: &mut dyn GenesisSource,
    ) -> HookResult<Vec<ValidatorUpdate>>;

    fn export_genesis(&self, ctx: &mut Context, target: &mut dyn GenesisTarget) -> HookResult;
}

/// Outcome of a pre-block hook.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PreBlockOutcome {
    pub consensus_params_changed: bool,
}

impl PreBlockOutcome {
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn params_changed() -> Self {
        Self { consensus_params_changed: true }
    }
}

pub trait HasPreBlock {
    fn pre_block(&self, ctx: &mut Context) -> HookResult<PreBlockOutcome>;
}

pub trait HasBeginBlock {
    fn begin_block(&self, ctx: &mut Context) -> HookResult;
}

pub trait HasEndBlock {
    /// Returns validator updates, empty when the module has none for this block.
    fn end_block(&self, ctx: &mut Context) -> HookResult<Vec<ValidatorUpdate>>;
}

pub trait HasPrecommit {
    fn precommit(&self, ctx: &mut Context) -> HookResult;
}

pub trait HasPrepareCheckState {
    fn prepare_check_state(&self, ctx: &mut Context) -> HookResult;
}

/// Registration of message and query services, and of state migrations.
pub trait HasServices {
    /// Called exactly once during wiring.
    ///
    /// Invalid service descriptors are recorded on the configurator and reported when wiring
    /// completes. Migration registration fails immediately; return that error to abort wiring.
    fn register_services(&self, cfg: &mut Configurator) -> Result<(), ManagerError>;
}

/// Capabilities a module answered at registration time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub genesis: bool,
    pub pre_block: bool,
    pub begin_block: bool,
    pub end_block: bool,
    pub precommit: bool,
    pub prepare_check_state: bool,
    pub services: bool,
}

impl Capabilities {
    pub fn probe(module: &dyn AppModule) -> Self {
        Self {
            genesis: module.as_genesis().is_some(),
            pre_block: module.as_pre_block().is_some(),
            begin_block: module.as_begin_block().is_some(),
            end_block: module.as_end_block().is_some(),
            precommit: module.as_precommit().is_some(),
            prepare_check_state: module.as_prepare_check_state().is_some(),
            services: module.as_services().is_some(),
        }
    }

    /// Whether the module takes part in `phase`.
    ///
    /// Every module is a migration participant: modules without handlers still get their version
    /// recorded.
    pub fn supports(&self, phase: Phase) -> bool {
        match phase {
            Phase::InitGenesis | Phase::ExportGenesis => self.genesis,
            Phase::PreBlock => self.pre_block,
            Phase::BeginBlock => self.begin_block,
            Phase::EndBlock => self.end_block,
            Phase::Precommit => self.precommit,
            Phase::PrepareCheckState => self.prepare_check_state,
            Phase::Migrations => true,
        }
    }
}
