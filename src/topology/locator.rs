//! Class locators.
//!
//! A locator finds the bytes of a class for a loader. Locators are consulted in registration
//! order and the first one that answers wins. The `"default"` locator reads `name.class` from the
//! loader's resources and is always registered first.
//!
//! # Examples
//!
//! ```rust,no_run
//! use classweave::topology::{DirectoryLocator, LocatorRegistryBuilder};
//!
//! let mut locators = LocatorRegistryBuilder::new();
//! locators.register_class_locator("classes", DirectoryLocator::new("target/classes"));
//! let locators = locators.build();
//! assert_eq!(locators.ids().collect::<Vec<_>>(), vec!["default", "classes"]);
//! ```

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use dashmap::DashMap;
use tracing::warn;

use crate::{
    file::File,
    identification::Registrations,
    topology::LoaderRef,
    Result,
};

/// Id of the locator that reads class resources from the loader.
pub const DEFAULT_LOCATOR: &str = "default";

/// Finds class-file bytes.
///
/// Implemented for every `Fn(&LoaderRef, &str) -> Result<Option<Vec<u8>>>`.
pub trait ClassLocator: Send + Sync {
    /// Bytes of class `name` as seen by `loader`, or `None` if this locator does not know it.
    ///
    /// # Errors
    /// Any error is logged by the registry and treated as `None`.
    fn locate(&self, loader: &LoaderRef, name: &str) -> Result<Option<Vec<u8>>>;
}

impl<F> ClassLocator for F
where
    F: Fn(&LoaderRef, &str) -> Result<Option<Vec<u8>>> + Send + Sync,
{
    fn locate(&self, loader: &LoaderRef, name: &str) -> Result<Option<Vec<u8>>> {
        self(loader, name)
    }
}

/// Reads `name.class` from the loader's resources.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceLocator;

impl ClassLocator for ResourceLocator {
    fn locate(&self, loader: &LoaderRef, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(loader.resource(&format!("{name}.class")))
    }
}

/// Reads class files below a directory, ignoring the loader.
#[derive(Debug, Clone)]
pub struct DirectoryLocator {
    root: PathBuf,
}

impl DirectoryLocator {
    /// Create a locator for the class tree under `root`.
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        DirectoryLocator {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl ClassLocator for DirectoryLocator {
    fn locate(&self, _loader: &LoaderRef, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.root.join(format!("{name}.class"));
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(File::from_file(path)?.into_bytes()))
    }
}

/// Serves classes added at runtime, for every loader.
#[derive(Debug, Default)]
pub struct MemoryLocator {
    classes: DashMap<String, Vec<u8>>,
}

impl MemoryLocator {
    /// Create an empty locator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the bytes of class `name`.
    pub fn insert(&self, name: &str, data: Vec<u8>) {
        self.classes.insert(name.to_string(), data);
    }
}

impl ClassLocator for MemoryLocator {
    fn locate(&self, _loader: &LoaderRef, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.classes.get(name).map(|data| data.value().clone()))
    }
}

/// Collects locator registrations during initialization.
pub struct LocatorRegistryBuilder {
    locators: Registrations<dyn ClassLocator>,
}

impl Default for LocatorRegistryBuilder {
    fn default() -> Self {
        let mut locators: Registrations<dyn ClassLocator> = Registrations::default();
        locators.insert(DEFAULT_LOCATOR, Arc::new(ResourceLocator));
        LocatorRegistryBuilder { locators }
    }
}

impl LocatorRegistryBuilder {
    /// Create a builder holding only the `"default"` locator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a locator under `id`. An existing id keeps its position.
    pub fn register_class_locator(&mut self, id: &str, locator: impl ClassLocator + 'static) {
        self.locators.insert(id, Arc::new(locator));
    }

    /// Remove the locator registered under `id`.
    pub fn unregister_class_locator(&mut self, id: &str) -> bool {
        self.locators.remove(id)
    }

    /// Freeze the registrations.
    #[must_use]
    pub fn build(self) -> LocatorRegistry {
        LocatorRegistry {
            locators: self.locators,
        }
    }
}

/// The frozen, ordered set of locators.
pub struct LocatorRegistry {
    locators: Registrations<dyn ClassLocator>,
}

impl LocatorRegistry {
    /// Ids of the registered locators, in query order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.locators.ids()
    }

    /// Bytes of class `name` from the first locator that knows it.
    #[must_use]
    pub fn locate(&self, loader: &LoaderRef, name: &str) -> Option<Vec<u8>> {
        for (id, locator) in self.locators.ids().zip(self.locators.values()) {
            match locator.locate(loader, name) {
                Ok(Some(data)) => return Some(data),
                Ok(None) => {}
                Err(error) => {
                    warn!(locator = id, loader = loader.name(), class = name, %error, "class locator failed");
                }
            }
        }
        None
    }
}
