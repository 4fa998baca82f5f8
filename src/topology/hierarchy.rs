//! Hierarchy walks over the class topology.

use std::collections::{HashSet, VecDeque};

use tracing::warn;

use crate::{
    analysis::TypeHierarchy,
    topology::{ClassTopology, ClassTopologyEntry, LoaderRef},
    Error, Result,
};

const OBJECT: &str = "java/lang/Object";

impl ClassTopology {
    fn resolve_quietly(
        &self,
        loader: &LoaderRef,
        name: &str,
    ) -> Option<std::sync::Arc<ClassTopologyEntry>> {
        match self.get_class(loader, name) {
            Ok(entry) => entry,
            Err(error) => {
                warn!(class = name, %error, "class could not be decoded, treating it as missing");
                None
            }
        }
    }

    /// Breadth-first walk over `start` and its supertypes.
    ///
    /// Superclass edges are always followed, interface edges only when `include_interfaces` is
    /// set. Each class is visited once and classes that cannot be located are dead ends. The walk
    /// stops as soon as `visitor` returns `true`.
    ///
    /// # Errors
    /// Returns [`Error::Unresolved`] if not a single class of the walk, `start` included, could
    /// be located.
    pub fn traverse_hierarchy(
        &self,
        loader: &LoaderRef,
        start: &str,
        include_interfaces: bool,
        mut visitor: impl FnMut(&ClassTopologyEntry) -> bool,
    ) -> Result<bool> {
        let mut queue = VecDeque::from([(start.to_string(), 0usize)]);
        let mut visited = HashSet::new();
        let mut resolved = false;

        while let Some((name, depth)) = queue.pop_front() {
            if !visited.insert(name.clone()) {
                continue;
            }
            let Some(entry) = self.resolve_quietly(loader, &name) else {
                continue;
            };
            resolved = true;
            if visitor(&entry) {
                return Ok(true);
            }
            if depth >= self.max_depth {
                continue;
            }
            if let Some(super_name) = &entry.super_name {
                queue.push_back((super_name.clone(), depth + 1));
            }
            if include_interfaces {
                for interface in &entry.interfaces {
                    queue.push_back((interface.clone(), depth + 1));
                }
            }
        }

        if resolved {
            Ok(false)
        } else {
            Err(Error::Unresolved(start.to_string()))
        }
    }

    /// `name` followed by its superclasses, as far as they resolve.
    fn superclass_chain(&self, loader: &LoaderRef, name: &str) -> Vec<String> {
        let mut chain = vec![name.to_string()];
        let mut current = name.to_string();
        while chain.len() <= self.max_depth {
            let Some(entry) = self.resolve_quietly(loader, &current) else {
                break;
            };
            let Some(super_name) = entry.super_name.clone() else {
                break;
            };
            chain.push(super_name.clone());
            current = super_name;
        }
        chain
    }

    fn is_interface(&self, loader: &LoaderRef, name: &str) -> bool {
        self.resolve_quietly(loader, name)
            .is_some_and(|entry| entry.is_interface())
    }

    /// Most specific common superclass of two classes, as required by stack map frames.
    ///
    /// Interfaces and classes whose chains do not meet fall back to `java/lang/Object`.
    #[must_use]
    pub fn common_super_class(&self, loader: &LoaderRef, a: &str, b: &str) -> String {
        if a == b {
            return a.to_string();
        }
        if self.is_interface(loader, a) || self.is_interface(loader, b) {
            return OBJECT.to_string();
        }
        let ancestors: HashSet<String> = self.superclass_chain(loader, a).into_iter().collect();
        self.superclass_chain(loader, b)
            .into_iter()
            .find(|name| ancestors.contains(name))
            .unwrap_or_else(|| OBJECT.to_string())
    }
}

/// A [`TypeHierarchy`] answering through the topology of one loader.
pub struct TopologyHierarchy<'a> {
    topology: &'a ClassTopology,
    loader: &'a LoaderRef,
}

impl<'a> TopologyHierarchy<'a> {
    /// Create a hierarchy view for `loader`.
    #[must_use]
    pub fn new(topology: &'a ClassTopology, loader: &'a LoaderRef) -> Self {
        TopologyHierarchy { topology, loader }
    }
}

impl TypeHierarchy for TopologyHierarchy<'_> {
    fn common_super_class(&self, a: &str, b: &str) -> String {
        self.topology.common_super_class(self.loader, a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::WeaverConfig,
        test::{class, interface, loader_with},
        topology::LocatorRegistryBuilder,
    };

    fn fixture() -> (ClassTopology, LoaderRef) {
        let topology =
            ClassTopology::new(LocatorRegistryBuilder::new().build(), &WeaverConfig::default());
        let mut base = class("a/Base", "java/lang/Object");
        base.interfaces.push("a/Marker".into());
        let left = class("a/Left", "a/Base");
        let right = class("a/Right", "a/Base");
        let marker = interface("a/Marker", &[]);
        let loader = loader_with("app", &[&base, &left, &right, &marker]);
        (topology, loader)
    }

    #[test]
    fn test_traverse_finds_interfaces() {
        let (topology, loader) = fixture();
        let found = topology
            .traverse_hierarchy(&loader, "a/Left", true, |entry| entry.name == "a/Marker")
            .unwrap();
        assert!(found);
        let found = topology
            .traverse_hierarchy(&loader, "a/Left", false, |entry| entry.name == "a/Marker")
            .unwrap();
        assert!(!found);
    }

    #[test]
    fn test_traverse_unresolved() {
        let (topology, loader) = fixture();
        let result = topology.traverse_hierarchy(&loader, "b/Nowhere", true, |_| false);
        assert!(matches!(result, Err(Error::Unresolved(name)) if name == "b/Nowhere"));
    }

    #[test]
    fn test_common_super_class() {
        let (topology, loader) = fixture();
        assert_eq!(topology.common_super_class(&loader, "a/Left", "a/Right"), "a/Base");
        assert_eq!(topology.common_super_class(&loader, "a/Left", "a/Base"), "a/Base");
        assert_eq!(
            topology.common_super_class(&loader, "a/Left", "a/Marker"),
            "java/lang/Object"
        );
        assert_eq!(
            topology.common_super_class(&loader, "a/Left", "b/Unknown"),
            "java/lang/Object"
        );
    }
}
