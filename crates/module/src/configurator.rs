//! Service and migration registration.
//!
//! Modules receive a [`Configurator`] once during wiring. Service registration failures do not
//! abort the module that caused them; they are collected and reported by
//! [`Configurator::error`] when wiring completes. Migration registration fails immediately.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::Arc,
};

use lattice_types::{ConsensusVersion, Context};
use tracing::debug;

use crate::{
    capability::HookResult,
    error::{ManagerError, ServiceError, ServiceErrors},
};

/// State migration from one consensus version to the next.
pub type MigrationHandler = Box<dyn Fn(&mut Context) -> HookResult + Send + Sync>;

/// Migration handlers per module, keyed by the version they migrate from.
pub type MigrationTable = BTreeMap<String, BTreeMap<ConsensusVersion, MigrationHandler>>;

/// Describes a message or query service exposed by a module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub name: String,
    pub methods: Vec<String>,
    pub is_msg_service: bool,
}

impl ServiceDescriptor {
    pub fn msg(
        name: impl Into<String>,
        methods: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::build(name, methods, true)
    }

    pub fn query(
        name: impl Into<String>,
        methods: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::build(name, methods, false)
    }

    fn build(
        name: impl Into<String>,
        methods: impl IntoIterator<Item = impl Into<String>>,
        is_msg_service: bool,
    ) -> Self {
        let methods = methods.into_iter().map(Into::into).collect();
        Self { name: name.into(), methods, is_msg_service }
    }

    fn validate(&self) -> Result<(), ServiceError> {
        if self.name.is_empty() {
            return Err(ServiceError::EmptyName);
        }
        if self.name.contains('/') {
            return Err(ServiceError::InvalidName(self.name.clone()));
        }
        if self.methods.is_empty() {
            return Err(ServiceError::NoMethods(self.name.clone()));
        }

        let mut seen = BTreeSet::new();
        for method in &self.methods {
            if method.is_empty() || method.contains('/') || !seen.insert(method.as_str()) {
                return Err(ServiceError::InvalidMethod {
                    service: self.name.clone(),
                    method: method.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Handles requests for the methods of a registered service.
pub trait ServiceHandler: Send + Sync {
    fn handle(&self, ctx: &mut Context, method: &str, request: &[u8]) -> HookResult<Vec<u8>>;
}

#[derive(Clone)]
pub struct RegisteredService {
    /// Module that registered the service, `None` for application level services.
    pub module: Option<String>,
    pub descriptor: ServiceDescriptor,
    pub handler: Arc<dyn ServiceHandler>,
}

impl fmt::Debug for RegisteredService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredService")
            .field("module", &self.module)
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Routes `/<service>/<method>` paths to service handlers.
#[derive(Clone, Debug, Default)]
pub struct ServiceRouter {
    services: BTreeMap<String, RegisteredService>,
}

impl ServiceRouter {
    /// Finds the service and method addressed by `path`.
    pub fn route(&self, path: &str) -> Option<(&RegisteredService, &str)> {
        let (service, method) = path.strip_prefix('/')?.split_once('/')?;
        let registered = self.services.get(service)?;
        let method = registered.descriptor.methods.iter().find(|m| m.as_str() == method)?;
        Some((registered, method.as_str()))
    }

    /// Dispatches a request to the handler registered for `path`.
    pub fn invoke(&self, ctx: &mut Context, path: &str, request: &[u8]) -> HookResult<Vec<u8>> {
        let Some((service, method)) = self.route(path) else {
            color_eyre::eyre::bail!("no handler registered for `{path}`");
        };
        service.handler.handle(ctx, method, request)
    }

    pub fn service(&self, name: &str) -> Option<&RegisteredService> {
        self.services.get(name)
    }

    /// Registered services, sorted by name.
    pub fn services(&self) -> impl Iterator<Item = &RegisteredService> {
        self.services.values()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Wiring-time registration surface handed to modules.
pub struct Configurator {
    modules: BTreeSet<String>,
    current_module: Option<String>,
    msg_router: ServiceRouter,
    query_router: ServiceRouter,
    migrations: MigrationTable,
    errors: Vec<ServiceError>,
}

impl Configurator {
    /// Creates a configurator accepting migrations for the given module names.
    pub fn new(modules: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            modules: modules.into_iter().map(Into::into).collect(),
            current_module: None,
            msg_router: ServiceRouter::default(),
            query_router: ServiceRouter::default(),
            migrations: MigrationTable::new(),
            errors: Vec::new(),
        }
    }

    /// Registers a service on the message or query router depending on the descriptor.
    pub fn register_service(
        &mut self,
        descriptor: ServiceDescriptor,
        handler: Arc<dyn ServiceHandler>,
    ) {
        if let Err(e) = descriptor.validate() {
            self.errors.push(e);
            return;
        }

        let name = descriptor.name.clone();
        if self.msg_router.services.contains_key(&name)
            || self.query_router.services.contains_key(&name)
        {
            self.errors.push(ServiceError::Duplicate(name));
            return;
        }

        debug!(
            service = %name,
            module = ?self.current_module,
            msg = descriptor.is_msg_service,
            "Registered service"
        );

        let module = self.current_module.clone();
        let router =
            if descriptor.is_msg_service { &mut self.msg_router } else { &mut self.query_router };
        router.services.insert(name, RegisteredService { module, descriptor, handler });
    }

    /// Registers the handler migrating `module` from `from_version` to `from_version + 1`.
    pub fn register_migration(
        &mut self,
        module: &str,
        from_version: ConsensusVersion,
        handler: impl Fn(&mut Context) -> HookResult + Send + Sync + 'static,
    ) -> Result<(), ManagerError> {
        if !self.modules.contains(module) {
            return Err(ManagerError::UnknownModule(module.to_string()));
        }

        let handlers = self.migrations.entry(module.to_string()).or_default();
        if handlers.contains_key(&from_version) {
            return Err(ManagerError::DuplicateMigration {
                module: module.to_string(),
                from_version,
            });
        }
        handlers.insert(from_version, Box::new(handler));

        debug!(%module, from_version, "Registered migration");
        Ok(())
    }

    /// Whether at least one migration was registered for `module`.
    pub fn has_migrations(&self, module: &str) -> bool {
        self.migrations.get(module).is_some_and(|h| !h.is_empty())
    }

    /// Accumulated service registration failures.
    pub fn error(&self) -> Result<(), ManagerError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ManagerError::ServiceRegistration(ServiceErrors(self.errors.clone())))
        }
    }

    pub fn msg_router(&self) -> &ServiceRouter {
        &self.msg_router
    }

    pub fn query_router(&self) -> &ServiceRouter {
        &self.query_router
    }

    pub(crate) fn enter_module(&mut self, module: Option<&str>) {
        self.current_module = module.map(str::to_string);
    }

    pub(crate) fn into_parts(self) -> (ServiceRouter, ServiceRouter, MigrationTable) {
        (self.msg_router, self.query_router, self.migrations)
    }
}
