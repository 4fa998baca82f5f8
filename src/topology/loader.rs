//! Class loaders as seen by the weaver.

use std::{
    fmt,
    hash::Hash,
    sync::{Arc, Weak},
};

use dashmap::DashMap;

/// A host class loader.
///
/// The weaver never defines classes. It only needs a name for diagnostics and read access to the
/// loader's resources, from which the default locator reads `name.class`.
pub trait ClassLoader: Send + Sync {
    /// Name used in log output.
    fn name(&self) -> &str;

    /// Contents of the resource at `path`, e.g. `java/lang/Object.class`.
    fn resource(&self, path: &str) -> Option<Vec<u8>>;
}

/// Shared handle to a class loader.
///
/// Topology caches are keyed by the identity of the `Arc`, not by loader name.
pub type LoaderRef = Arc<dyn ClassLoader>;

/// A loader serving resources from memory.
#[derive(Default)]
pub struct MemoryClassLoader {
    name: String,
    resources: DashMap<String, Vec<u8>>,
}

impl MemoryClassLoader {
    /// Create an empty loader.
    #[must_use]
    pub fn new(name: &str) -> Self {
        MemoryClassLoader {
            name: name.to_string(),
            resources: DashMap::new(),
        }
    }

    /// Add a resource.
    pub fn insert(&self, path: &str, data: Vec<u8>) {
        self.resources.insert(path.to_string(), data);
    }

    /// Add the bytes of class `name` as `name.class`.
    pub fn insert_class(&self, name: &str, data: Vec<u8>) {
        self.insert(&format!("{name}.class"), data);
    }

    /// Convert into a [`LoaderRef`].
    #[must_use]
    pub fn into_ref(self) -> LoaderRef {
        Arc::new(self)
    }
}

impl ClassLoader for MemoryClassLoader {
    fn name(&self) -> &str {
        &self.name
    }

    fn resource(&self, path: &str) -> Option<Vec<u8>> {
        self.resources.get(path).map(|data| data.value().clone())
    }
}

impl fmt::Debug for MemoryClassLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryClassLoader")
            .field("name", &self.name)
            .field("resources", &self.resources.len())
            .finish()
    }
}

/// Cache key of a loader: the address of its allocation.
pub(crate) fn loader_key(loader: &LoaderRef) -> usize {
    Arc::as_ptr(loader).cast::<()>() as usize
}

/// Values memoized per loader and key.
///
/// Entries remember their loader weakly; an entry whose loader is gone never matches, even if a
/// new loader reuses the address.
pub(crate) struct LoaderMemo<K, V> {
    entries: DashMap<(usize, K), (Weak<dyn ClassLoader>, V)>,
}

impl<K: Eq + Hash + Clone, V: Clone> LoaderMemo<K, V> {
    pub(crate) fn new() -> Self {
        LoaderMemo {
            entries: DashMap::new(),
        }
    }

    pub(crate) fn get(&self, loader: &LoaderRef, key: &K) -> Option<V> {
        let entry = self.entries.get(&(loader_key(loader), key.clone()))?;
        let (owner, value) = entry.value();
        owner
            .upgrade()
            .is_some_and(|owner| Arc::ptr_eq(&owner, loader))
            .then(|| value.clone())
    }

    pub(crate) fn insert(&self, loader: &LoaderRef, key: K, value: V) {
        self.entries
            .insert((loader_key(loader), key), (Arc::downgrade(loader), value));
    }

    pub(crate) fn prune(&self) {
        self.entries.retain(|_, (owner, _)| owner.strong_count() > 0);
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for LoaderMemo<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, V> fmt::Debug for LoaderMemo<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LoaderMemo({} entries)", self.entries.len())
    }
}
