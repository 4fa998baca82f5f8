//! Loader-aware class topology.
//!
//! The weaver has to answer structural questions about classes it is not currently
//! transforming: which classes a type extends, whether it implements a contract, which type
//! parameters its outer class declares. [`ClassTopology`] answers them by locating class bytes
//! through the registered [`ClassLocator`]s and caching a structural [`ClassTopologyEntry`] per
//! loader.
//!
//! # Caching
//!
//! - Classes under a durable prefix (`java/` by default) are loader-independent and cached once
//!   in a lock-free [`SkipMap`].
//! - Every other class is cached per loader, keyed by the identity of the loader's `Arc`. The
//!   cache only holds a [`Weak`] reference, so a loader that is dropped by the host is pruned
//!   together with its entries.
//! - Missing classes are not cached and are looked up again on the next request.
//!
//! # Key Components
//!
//! - [`ClassLoader`] / [`LoaderRef`] - The host's view of a class loader
//! - [`ClassTopology`] - The cache and hierarchy walks
//! - [`TopologyHierarchy`] - A [`crate::analysis::TypeHierarchy`] for frame computation
//! - [`LocatorRegistryBuilder`] / [`LocatorRegistry`] - Ordered locator registrations

mod entry;
mod hierarchy;
mod loader;
mod locator;

pub use entry::ClassTopologyEntry;
pub use hierarchy::TopologyHierarchy;
pub use loader::{ClassLoader, LoaderRef, MemoryClassLoader};
pub use locator::{
    ClassLocator, DirectoryLocator, LocatorRegistry, LocatorRegistryBuilder, MemoryLocator,
    ResourceLocator, DEFAULT_LOCATOR,
};

use std::sync::{Arc, Weak};

use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;
use tracing::{debug, trace, warn};

use crate::{classfile::ClassNode, config::WeaverConfig, Result};

pub(crate) use loader::{loader_key, LoaderMemo};

struct LoaderCache {
    loader: Weak<dyn ClassLoader>,
    entries: DashMap<String, Arc<ClassTopologyEntry>>,
}

impl LoaderCache {
    fn new(loader: &LoaderRef) -> Self {
        LoaderCache {
            loader: Arc::downgrade(loader),
            entries: DashMap::new(),
        }
    }

    fn belongs_to(&self, loader: &LoaderRef) -> bool {
        self.loader
            .upgrade()
            .is_some_and(|cached| Arc::ptr_eq(&cached, loader))
    }
}

/// Structural class cache shared by every weave.
pub struct ClassTopology {
    locators: LocatorRegistry,
    durable_prefixes: Vec<String>,
    max_depth: usize,
    durable: SkipMap<String, Arc<ClassTopologyEntry>>,
    loaders: DashMap<usize, LoaderCache>,
}

impl ClassTopology {
    /// Create an empty topology over `locators`.
    #[must_use]
    pub fn new(locators: LocatorRegistry, config: &WeaverConfig) -> Self {
        ClassTopology {
            locators,
            durable_prefixes: config.durable_prefixes.clone(),
            max_depth: config.max_hierarchy_depth,
            durable: SkipMap::new(),
            loaders: DashMap::new(),
        }
    }

    /// The registered locators.
    #[must_use]
    pub fn locators(&self) -> &LocatorRegistry {
        &self.locators
    }

    fn is_durable(&self, name: &str) -> bool {
        self.durable_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
    }

    fn cached(&self, loader: &LoaderRef, name: &str) -> Option<Arc<ClassTopologyEntry>> {
        if self.is_durable(name) {
            return self.durable.get(name).map(|entry| Arc::clone(entry.value()));
        }
        let cache = self.loaders.get(&loader_key(loader))?;
        if !cache.belongs_to(loader) {
            return None;
        }
        cache.entries.get(name).map(|entry| Arc::clone(entry.value()))
    }

    fn store(&self, loader: &LoaderRef, entry: ClassTopologyEntry) -> Arc<ClassTopologyEntry> {
        let entry = Arc::new(entry);
        if self.is_durable(&entry.name) {
            self.durable.insert(entry.name.clone(), Arc::clone(&entry));
            return entry;
        }

        let key = loader_key(loader);
        let scoped = self
            .loaders
            .get(&key)
            .is_some_and(|cache| cache.belongs_to(loader));
        if !scoped {
            self.prune();
        }

        // Creating or replacing the scope happens under the shard lock of `key`.
        let mut cache = self.loaders.entry(key).or_insert_with(|| {
            debug!(loader = loader.name(), "new class topology scope");
            LoaderCache::new(loader)
        });
        if !cache.belongs_to(loader) {
            debug!(loader = loader.name(), "replacing stale class topology scope");
            *cache = LoaderCache::new(loader);
        }
        cache.entries.insert(entry.name.clone(), Arc::clone(&entry));
        entry
    }

    /// Structural entry of class `name` as seen by `loader`.
    ///
    /// The durable and per-loader caches are consulted first, then the locators in order.
    ///
    /// # Errors
    /// Returns the reader's error if a locator produced bytes that do not decode.
    pub fn get_class(
        &self,
        loader: &LoaderRef,
        name: &str,
    ) -> Result<Option<Arc<ClassTopologyEntry>>> {
        if let Some(entry) = self.cached(loader, name) {
            return Ok(Some(entry));
        }
        let Some(data) = self.locators.locate(loader, name) else {
            trace!(loader = loader.name(), class = name, "class not located");
            return Ok(None);
        };
        let entry = ClassTopologyEntry::from_bytes(&data)?;
        if entry.name != name {
            warn!(requested = name, found = %entry.name, "located class has a different name");
            return Ok(None);
        }
        Ok(Some(self.store(loader, entry)))
    }

    /// Seed the cache with a class the host is defining.
    pub fn add_class(&self, loader: &LoaderRef, node: &ClassNode) -> Arc<ClassTopologyEntry> {
        self.store(loader, ClassTopologyEntry::from_node(node))
    }

    /// Entry of the lexically enclosing class of `name`.
    ///
    /// # Errors
    /// See [`ClassTopology::get_class`].
    pub fn get_outer_class(
        &self,
        loader: &LoaderRef,
        name: &str,
    ) -> Result<Option<Arc<ClassTopologyEntry>>> {
        let Some(entry) = self.get_class(loader, name)? else {
            return Ok(None);
        };
        match &entry.outer_name {
            Some(outer) => self.get_class(loader, outer),
            None => Ok(None),
        }
    }

    /// Drop the caches of loaders that no longer exist.
    pub fn prune(&self) {
        self.loaders
            .retain(|_, cache| cache.loader.strong_count() > 0);
    }

    /// Number of loaders with a cache.
    #[must_use]
    pub fn loader_count(&self) -> usize {
        self.loaders.len()
    }
}
