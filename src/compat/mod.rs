//! Type and generic-signature compatibility between contracts and targets.
//!
//! The weaver asks two questions before it emits anything. Can a value of the target's type flow
//! into the contract's declared type ([`CompatibilityChecker::is_assignable`])? And does the type
//! argument of an interceptor's context accept the target method's generic return type
//! ([`CompatibilityChecker::check_return_signature`])?
//!
//! Both look through registered contracts: a contract type accepts every class its class
//! identifier identifies, and every subclass of such a class.

mod signature;

use tracing::trace;

use crate::{
    accessor::{AccessorContract, AccessorRegistry},
    classfile::Type,
    topology::{ClassTopology, LoaderRef},
    Error, Result,
};

const OBJECT: &str = "java/lang/Object";

/// Answers assignability questions for one weave.
pub struct CompatibilityChecker<'a> {
    topology: &'a ClassTopology,
    accessors: &'a AccessorRegistry,
}

impl<'a> CompatibilityChecker<'a> {
    /// Create a checker over `topology`, treating the contracts of `accessors` as substitutes
    /// for their targets.
    #[must_use]
    pub fn new(topology: &'a ClassTopology, accessors: &'a AccessorRegistry) -> Self {
        CompatibilityChecker {
            topology,
            accessors,
        }
    }

    /// The contract registered under `name`, if any.
    #[must_use]
    pub fn contract(&self, name: &str) -> Option<&'a AccessorContract> {
        self.accessors.by_name(name).map(AsRef::as_ref)
    }

    /// Returns `true` if a value of type `concrete` may be used where `declared` is expected.
    ///
    /// Arrays of equal dimensions compare their element types. Identical types are always
    /// compatible, even when neither can be located. Object types are also compatible when
    /// `declared` is `java/lang/Object`, when `concrete` extends or implements `declared`, or when
    /// `declared` is a contract identifying `concrete` or one of its supertypes. Everything else
    /// must match exactly.
    ///
    /// # Errors
    /// Returns [`Error::ResolutionFailed`] if the hierarchy of `concrete` cannot be resolved at
    /// all and no contract identifies it directly.
    pub fn is_assignable(&self, loader: &LoaderRef, concrete: &Type, declared: &Type) -> Result<bool> {
        let (concrete, declared) = match (concrete, declared) {
            (Type::Array(_), Type::Array(_)) if concrete.dimensions() == declared.dimensions() => {
                (concrete.element_type(), declared.element_type())
            }
            _ => (concrete, declared),
        };

        let (Type::Object(concrete_name), Type::Object(declared_name)) = (concrete, declared) else {
            return Ok(concrete == declared);
        };
        if declared_name == OBJECT || concrete_name == declared_name {
            return Ok(true);
        }

        let contract = self.contract(declared_name);
        let walk = self
            .topology
            .traverse_hierarchy(loader, concrete_name, true, |entry| match contract {
                Some(contract) => contract.identifies(loader, &entry.name, Some(&entry.node)),
                None => entry.name == *declared_name,
            });

        match walk {
            Ok(found) => {
                trace!(concrete = %concrete_name, declared = %declared_name, found, "assignability");
                Ok(found)
            }
            Err(_) if contract.is_some_and(|c| c.identifies(loader, concrete_name, None)) => Ok(true),
            Err(_) => Err(Error::ResolutionFailed {
                concrete: concrete_name.clone(),
                declared: declared_name.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        accessor::{AccessorRegistryBuilder, ContractDescriptor},
        config::WeaverConfig,
        identification::{ClassIdentifier, MapperRegistryBuilder, SearchPurpose},
        test::{class, interface, loader_with},
        topology::LocatorRegistryBuilder,
    };

    pub(super) fn registry(targets: &[(&str, &str)]) -> AccessorRegistry {
        let owned: Vec<(String, String)> = targets
            .iter()
            .map(|(contract, target)| ((*contract).to_string(), (*target).to_string()))
            .collect();
        let mut mappers = MapperRegistryBuilder::new();
        let lookup = owned.clone();
        mappers.register_class_mapper("test", move |id: &str, _: SearchPurpose| {
            lookup
                .iter()
                .find(|(contract, _)| contract == id)
                .map(|(_, target)| ClassIdentifier::names([target.clone()]))
        });
        let mut builder = AccessorRegistryBuilder::new();
        for (contract, _) in &owned {
            builder
                .register(ContractDescriptor::builder(contract, contract), &mappers)
                .unwrap();
        }
        builder.build(&mappers.build()).0
    }

    pub(super) fn topology() -> ClassTopology {
        ClassTopology::new(LocatorRegistryBuilder::new().build(), &WeaverConfig::default())
    }

    #[test]
    fn test_hierarchy_assignability() {
        let topology = topology();
        let accessors = registry(&[]);
        let checker = CompatibilityChecker::new(&topology, &accessors);
        let loader = loader_with(
            "app",
            &[
                &class("a/Base", "java/lang/Object"),
                &class("a/Derived", "a/Base"),
                &interface("a/Marker", &[]),
            ],
        );

        let derived = Type::object("a/Derived");
        assert!(checker.is_assignable(&loader, &derived, &Type::object("a/Base")).unwrap());
        assert!(!checker.is_assignable(&loader, &derived, &Type::object("a/Marker")).unwrap());
        assert!(checker.is_assignable(&loader, &derived, &Type::object(OBJECT)).unwrap());
        assert!(!checker.is_assignable(&loader, &Type::Int, &Type::Long).unwrap());
        assert!(checker
            .is_assignable(
                &loader,
                &Type::Array(Box::new(derived.clone())),
                &Type::Array(Box::new(Type::object("a/Base")))
            )
            .unwrap());
    }

    #[test]
    fn test_contract_substitution() {
        let topology = topology();
        let accessors = registry(&[("c/BaseAccessor", "a/Base")]);
        let checker = CompatibilityChecker::new(&topology, &accessors);
        let loader = loader_with(
            "app",
            &[
                &class("a/Base", "java/lang/Object"),
                &class("a/Derived", "a/Base"),
                &class("a/Other", "java/lang/Object"),
            ],
        );

        let contract = Type::object("c/BaseAccessor");
        assert!(checker.is_assignable(&loader, &Type::object("a/Derived"), &contract).unwrap());
        assert!(!checker.is_assignable(&loader, &Type::object("a/Other"), &contract).unwrap());
    }

    #[test]
    fn test_unresolvable_hierarchy() {
        let topology = topology();
        let accessors = registry(&[("c/GhostAccessor", "a/Ghost")]);
        let checker = CompatibilityChecker::new(&topology, &accessors);
        let loader = loader_with("app", &[]);

        assert!(checker
            .is_assignable(&loader, &Type::object("a/Ghost"), &Type::object("c/GhostAccessor"))
            .unwrap());
        assert!(matches!(
            checker.is_assignable(&loader, &Type::object("a/Ghost"), &Type::object("a/Other")),
            Err(Error::ResolutionFailed { .. })
        ));
    }

    #[test]
    fn test_identical_types_without_hierarchy() {
        let topology = topology();
        let accessors = registry(&[]);
        let checker = CompatibilityChecker::new(&topology, &accessors);
        let loader = loader_with("app", &[]);

        let string = Type::object("java/lang/String");
        assert!(checker.is_assignable(&loader, &string, &string).unwrap());
        assert!(checker
            .is_assignable(&loader, &Type::object("a/Ghost"), &Type::object("a/Ghost"))
            .unwrap());
        let strings = Type::Array(Box::new(string.clone()));
        assert!(checker.is_assignable(&loader, &strings, &strings).unwrap());
        assert!(matches!(
            checker.is_assignable(&loader, &string, &Type::object("java/lang/CharSequence")),
            Err(Error::ResolutionFailed { .. })
        ));
    }
}
