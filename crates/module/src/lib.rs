//! Module orchestration for lattice applications.
//!
//! An application is a set of named modules. The [`ModuleManager`] registers them, keeps an
//! ordering list per lifecycle phase and drives chain initialisation, the per-block phases,
//! genesis export and in-place migrations, aggregating events and validator updates into the
//! responses handed back to the consensus engine.

mod aggregate;
pub mod capability;
pub mod config;
pub mod configurator;
pub mod error;
pub mod manager;
pub mod migrator;
pub mod order;
pub mod registry;

pub use capability::{
    AppModule, Capabilities, HasBeginBlock, HasEndBlock, HasGenesis, HasPreBlock, HasPrecommit,
    HasPrepareCheckState, HasServices, HookResult, PreBlockOutcome,
};
pub use config::RuntimeConfig;
pub use configurator::{
    Configurator, MigrationHandler, RegisteredService, ServiceDescriptor, ServiceHandler,
    ServiceRouter,
};
pub use error::{BoxError, ManagerError, ServiceError, ServiceErrors};
pub use manager::ModuleManager;
pub use migrator::Migrator;
pub use order::OrderingLists;
pub use registry::{ModuleRegistry, RegisteredModule};
