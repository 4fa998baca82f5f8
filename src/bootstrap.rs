//! Composition root and host hook.
//!
//! Weaving has two phases. During initialization a [`BootstrapBuilder`] collects mappers,
//! locators, contracts and failure handlers; classes the host loads meanwhile are only recorded.
//! [`BootstrapBuilder::initialize`] resolves everything into an immutable [`Bootstrapper`], which
//! the host then calls for every class it defines.
//!
//! # Error Reporting
//!
//! [`Bootstrapper::transform`] never fails: when a class cannot be woven the host receives the
//! original bytes and every registered [`FailureHandler`] is told why. Errors raised during
//! initialization are queued and delivered once [`BootstrapBuilder::initialize`] has installed
//! the handlers. Without a handler, [`Escalate`] is used.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use classweave::prelude::*;
//!
//! let mut builder = BootstrapBuilder::new();
//! builder.register_class_mapper("app", |id: &str, _: SearchPurpose| {
//!     (id == "player").then(|| ClassIdentifier::names(["game/Player"]))
//! });
//! builder.register_accessor(
//!     ContractDescriptor::builder("hooks/Player", "player")
//!         .member(MemberDescriptor::field_generator("getTag", "()Ljava/lang/String;", "tag")),
//! )?;
//! let bootstrapper = builder.initialize();
//!
//! let loader = MemoryClassLoader::new("app").into_ref();
//! let bytes = std::fs::read("Player.class")?;
//! let woven = bootstrapper.transform(&loader, "game/Player", &bytes);
//! # Ok::<(), classweave::Error>(())
//! ```

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, debug_span, error, warn};

use crate::{
    accessor::{AccessorRegistry, AccessorRegistryBuilder, ContractDescriptor},
    classfile::{ClassNode, ClassReader, ReaderFlags},
    config::WeaverConfig,
    identification::{
        ClassIdentifier, FieldIdentifier, InstructionIdentifier, Mapper, MapperRegistryBuilder,
        MethodIdentifier,
    },
    topology::{ClassLocator, ClassTopology, LoaderRef, LocatorRegistryBuilder},
    weaver::{WeaveContext, Weaver},
    Error, Result,
};

/// Receives the errors of classes that could not be woven.
pub trait FailureHandler: Send + Sync {
    /// Called once per failed class or registration.
    fn on_failure(&self, error: &Error);
}

impl<F> FailureHandler for F
where
    F: Fn(&Error) + Send + Sync,
{
    fn on_failure(&self, error: &Error) {
        self(error);
    }
}

/// The default handler: logs the error and aborts.
///
/// A contract that cannot be woven leaves the application in a state its authors did not plan
/// for, so this handler treats every failure as fatal.
#[derive(Debug, Clone, Copy, Default)]
pub struct Escalate;

impl FailureHandler for Escalate {
    fn on_failure(&self, error: &Error) {
        error!(category = %error.category(), "{error}");
        panic!("class weaving failed: {error}");
    }
}

/// Collects registrations until [`BootstrapBuilder::initialize`].
pub struct BootstrapBuilder {
    config: WeaverConfig,
    mappers: MapperRegistryBuilder,
    locators: LocatorRegistryBuilder,
    accessors: AccessorRegistryBuilder,
    handlers: Vec<Arc<dyn FailureHandler>>,
    /// Errors raised before the handlers are final
    queued: boxcar::Vec<Error>,
    /// Classes the host defined during initialization
    loaded: boxcar::Vec<(LoaderRef, ClassNode)>,
}

impl Default for BootstrapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BootstrapBuilder {
    /// Create a builder with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(WeaverConfig::default())
    }

    /// Create a builder with `config`.
    #[must_use]
    pub fn with_config(config: WeaverConfig) -> Self {
        BootstrapBuilder {
            config,
            mappers: MapperRegistryBuilder::new(),
            locators: LocatorRegistryBuilder::new(),
            accessors: AccessorRegistryBuilder::new(),
            handlers: Vec::new(),
            queued: boxcar::Vec::new(),
            loaded: boxcar::Vec::new(),
        }
    }

    /// The configuration the bootstrapper will run with.
    #[must_use]
    pub fn config(&self) -> &WeaverConfig {
        &self.config
    }

    /// Register a class mapper under `id`.
    pub fn register_class_mapper(
        &mut self,
        id: &str,
        mapper: impl Mapper<ClassIdentifier> + 'static,
    ) {
        self.mappers.register_class_mapper(id, mapper);
    }

    /// Remove the class mapper `id`.
    pub fn unregister_class_mapper(&mut self, id: &str) -> bool {
        self.mappers.unregister_class_mapper(id)
    }

    /// Register a field mapper under `id`.
    pub fn register_field_mapper(
        &mut self,
        id: &str,
        mapper: impl Mapper<FieldIdentifier> + 'static,
    ) {
        self.mappers.register_field_mapper(id, mapper);
    }

    /// Remove the field mapper `id`.
    pub fn unregister_field_mapper(&mut self, id: &str) -> bool {
        self.mappers.unregister_field_mapper(id)
    }

    /// Register a method mapper under `id`.
    pub fn register_method_mapper(
        &mut self,
        id: &str,
        mapper: impl Mapper<MethodIdentifier> + 'static,
    ) {
        self.mappers.register_method_mapper(id, mapper);
    }

    /// Remove the method mapper `id`.
    pub fn unregister_method_mapper(&mut self, id: &str) -> bool {
        self.mappers.unregister_method_mapper(id)
    }

    /// Register an instruction mapper under `id`.
    pub fn register_instruction_mapper(
        &mut self,
        id: &str,
        mapper: impl Mapper<InstructionIdentifier> + 'static,
    ) {
        self.mappers.register_instruction_mapper(id, mapper);
    }

    /// Remove the instruction mapper `id`.
    pub fn unregister_instruction_mapper(&mut self, id: &str) -> bool {
        self.mappers.unregister_instruction_mapper(id)
    }

    /// Register a class locator under `id`. Locators are asked in registration order.
    pub fn register_class_locator(&mut self, id: &str, locator: impl ClassLocator + 'static) {
        self.locators.register_class_locator(id, locator);
    }

    /// Remove the class locator `id`.
    pub fn unregister_class_locator(&mut self, id: &str) -> bool {
        self.locators.unregister_class_locator(id)
    }

    /// Register an accessor contract.
    ///
    /// Accessor identifiers must be mapped by the mappers registered so far.
    ///
    /// # Errors
    /// Returns [`Error::InvalidContract`] or [`Error::NotMapped`].
    pub fn register_accessor(&mut self, contract: ContractDescriptor) -> Result<()> {
        self.accessors.register(contract, &self.mappers)
    }

    /// Register the contract declared by the annotated interface in `data`.
    ///
    /// # Errors
    /// Returns decoding errors and everything [`BootstrapBuilder::register_accessor`] returns.
    pub fn register_accessor_class(&mut self, data: &[u8]) -> Result<()> {
        let contract = ContractDescriptor::from_class_bytes(data)?;
        self.register_accessor(contract)
    }

    /// Remove the contract `name`, returning its descriptor.
    pub fn unregister_accessor(&mut self, name: &str) -> Option<ContractDescriptor> {
        self.accessors.unregister(name)
    }

    /// Add a failure handler. Errors queued so far are delivered to it after initialization.
    pub fn add_failure_handler(&mut self, handler: impl FailureHandler + 'static) {
        self.handlers.push(Arc::new(handler));
    }

    /// Host hook during initialization: records the class structure and returns `data` as is.
    ///
    /// A registered contract seen here is reported as [`Error::AccessorAlreadyLoaded`], because
    /// its interceptor bodies can no longer be instrumented.
    pub fn transform(&self, loader: &LoaderRef, name: &str, data: &[u8]) -> Vec<u8> {
        if self.accessors.contains(name) {
            self.queued.push(Error::AccessorAlreadyLoaded(name.to_string()));
        }
        match ClassReader::new(data).read(ReaderFlags::SKIP_CODE | ReaderFlags::SKIP_DEBUG) {
            Ok(class) => {
                self.loaded.push((Arc::clone(loader), class));
            }
            Err(error) => warn!(class = name, %error, "class loaded during initialization is unreadable"),
        }
        data.to_vec()
    }

    /// Resolve all registrations and deliver the queued errors.
    ///
    /// Contracts whose interceptors fail to resolve are dropped and reported.
    #[must_use]
    pub fn initialize(self) -> Bootstrapper {
        let mappers = self.mappers.build();
        let (accessors, errors) = self.accessors.build(&mappers);
        let topology = ClassTopology::new(self.locators.build(), &self.config);
        for (_, (loader, class)) in self.loaded.iter() {
            topology.add_class(loader, class);
        }

        let mut handlers = self.handlers;
        if handlers.is_empty() {
            handlers.push(Arc::new(Escalate));
        }
        let bootstrapper = Bootstrapper {
            config: self.config,
            accessors,
            topology,
            handlers,
        };
        debug!(
            contracts = bootstrapper.accessors.len(),
            preloaded = self.loaded.count(),
            "bootstrapper initialized"
        );

        for error in errors.iter().chain(self.queued.iter().map(|(_, e)| e)) {
            bootstrapper.report(error);
        }
        bootstrapper
    }
}

/// The initialized weaving engine.
pub struct Bootstrapper {
    config: WeaverConfig,
    accessors: AccessorRegistry,
    topology: ClassTopology,
    handlers: Vec<Arc<dyn FailureHandler>>,
}

impl Bootstrapper {
    /// The registered contracts.
    #[must_use]
    pub fn accessors(&self) -> &AccessorRegistry {
        &self.accessors
    }

    /// The structural class cache.
    #[must_use]
    pub fn topology(&self) -> &ClassTopology {
        &self.topology
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &WeaverConfig {
        &self.config
    }

    fn weaver(&self) -> Weaver<'_> {
        Weaver::new(WeaveContext::new(
            &self.accessors,
            &self.topology,
            &self.config,
        ))
    }

    fn report(&self, error: &Error) {
        for handler in &self.handlers {
            handler.on_failure(error);
        }
    }

    /// Host hook: the woven bytes of class `name`, or `data` unchanged if nothing applies or
    /// weaving fails. Failures go to the failure handlers.
    pub fn transform(&self, loader: &LoaderRef, name: &str, data: &[u8]) -> Vec<u8> {
        match self.try_transform(loader, name, data) {
            Ok(Some(woven)) => woven,
            Ok(None) => data.to_vec(),
            Err(error) => {
                self.report(&error);
                data.to_vec()
            }
        }
    }

    /// Weave class `name`. Returns `None` if nothing applies to it.
    ///
    /// # Errors
    /// Returns the error that aborted the class; failure handlers are not called.
    pub fn try_transform(
        &self,
        loader: &LoaderRef,
        name: &str,
        data: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        let _span = debug_span!("transform", loader = loader.name(), class = name).entered();
        let woven = self.weaver().weave_bytes(loader, data)?;
        if woven.is_some() {
            debug!("class woven");
        }
        Ok(woven)
    }

    /// Transform a batch of `(name, bytes)` pairs defined by the same loader, in order.
    ///
    /// Batches of at least [`WeaverConfig::parallel_threshold`] classes are woven on the rayon
    /// pool.
    pub fn transform_all(&self, loader: &LoaderRef, classes: &[(String, Vec<u8>)]) -> Vec<Vec<u8>> {
        if classes.len() >= self.config.parallel_threshold {
            classes
                .par_iter()
                .map(|(name, data)| self.transform(loader, name, data))
                .collect()
        } else {
            classes
                .iter()
                .map(|(name, data)| self.transform(loader, name, data))
                .collect()
        }
    }

    /// Drop cached state of loaders that no longer exist.
    pub fn prune(&self) {
        self.topology.prune();
        for contract in self.accessors.contracts() {
            contract.prune();
        }
    }
}
