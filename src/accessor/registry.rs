use std::{collections::HashMap, sync::Arc};

use tracing::debug;

use crate::{
    accessor::{contract::PendingContract, AccessorContract, ContractDescriptor},
    identification::{MapperRegistry, MapperRegistryBuilder},
    Error, Result,
};

/// Collects contract registrations during initialization.
#[derive(Default)]
pub struct AccessorRegistryBuilder {
    pending: Vec<PendingContract>,
}

impl AccessorRegistryBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a contract.
    ///
    /// Accessor identifiers are resolved against the mappers registered in `mappers` so far;
    /// interceptor identifiers are resolved by [`AccessorRegistryBuilder::build`].
    ///
    /// # Errors
    /// Returns [`Error::InvalidContract`] for an ill-formed contract or a duplicate name, and
    /// [`Error::NotMapped`] for an identifier no mapper knows.
    pub fn register(
        &mut self,
        descriptor: ContractDescriptor,
        mappers: &MapperRegistryBuilder,
    ) -> Result<()> {
        if self.contains(&descriptor.name) {
            return Err(Error::InvalidContract {
                contract: descriptor.name,
                message: "is already registered".to_string(),
            });
        }
        let pending = PendingContract::new(descriptor, mappers)?;
        debug!(contract = %pending.descriptor.name, "registered accessor contract");
        self.pending.push(pending);
        Ok(())
    }

    /// Remove a registered contract, returning its descriptor.
    pub fn unregister(&mut self, name: &str) -> Option<ContractDescriptor> {
        let index = self
            .pending
            .iter()
            .position(|pending| pending.descriptor.name == name)?;
        Some(self.pending.remove(index).descriptor)
    }

    /// Returns `true` if a contract called `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.pending.iter().any(|pending| pending.descriptor.name == name)
    }

    /// Resolve every interceptor against `mappers` and freeze the registry.
    ///
    /// Contracts that fail to resolve are left out; their errors are returned alongside.
    #[must_use]
    pub fn build(self, mappers: &MapperRegistry) -> (AccessorRegistry, Vec<Error>) {
        let mut registry = AccessorRegistry::default();
        let mut errors = Vec::new();
        for pending in self.pending {
            match pending.resolve(mappers) {
                Ok(contract) => registry.insert(contract),
                Err(error) => errors.push(error),
            }
        }
        (registry, errors)
    }
}

/// The frozen set of contracts.
#[derive(Debug, Default, Clone)]
pub struct AccessorRegistry {
    contracts: Vec<Arc<AccessorContract>>,
    by_name: HashMap<String, usize>,
}

impl AccessorRegistry {
    fn insert(&mut self, contract: AccessorContract) {
        self.by_name
            .insert(contract.name().to_string(), self.contracts.len());
        self.contracts.push(Arc::new(contract));
    }

    /// Contracts in registration order.
    #[must_use]
    pub fn contracts(&self) -> &[Arc<AccessorContract>] {
        &self.contracts
    }

    /// The contract with internal name `name`.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&Arc<AccessorContract>> {
        self.by_name.get(name).map(|index| &self.contracts[*index])
    }

    /// Contracts whose class identifier id is `id`.
    pub fn by_identifier<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Arc<AccessorContract>> {
        self.contracts
            .iter()
            .filter(move |contract| contract.class_identifier_id() == id)
    }

    /// Returns `true` if `name` is a registered contract.
    #[must_use]
    pub fn is_contract(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Number of contracts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    /// Returns `true` if no contract is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Drop memoised answers of unloaded loaders.
    pub(crate) fn prune(&self) {
        for contract in &self.contracts {
            contract.prune();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        accessor::MemberDescriptor,
        identification::{builtin, ClassIdentifier, ElementDescription, MethodIdentifier, SearchPurpose},
    };

    fn mappers(with_entry: bool) -> MapperRegistryBuilder {
        let mut mappers = MapperRegistryBuilder::new();
        mappers.register_class_mapper("test", |id: &str, _: SearchPurpose| {
            (id == "target").then(|| ClassIdentifier::names(["t/Target"]))
        });
        mappers.register_method_mapper("test", |_: &str, _: SearchPurpose| {
            Some(MethodIdentifier::descriptions([ElementDescription::new("run", "()V")]))
        });
        if with_entry {
            mappers.register_instruction_mapper("test", |_: &str, _: SearchPurpose| {
                Some(builtin::by_index(0, false))
            });
        }
        mappers
    }

    fn interceptor_contract(name: &str) -> ContractDescriptor {
        ContractDescriptor::builder(name, "target").member(
            MemberDescriptor::interceptor(
                "on",
                "(Lclassweave/runtime/v1/InterceptorContext;)V",
                "run",
                "head",
            )
            .with_signature("(Lclassweave/runtime/v1/InterceptorContext<Ljava/lang/Void;>;)V"),
        )
    }

    #[test]
    fn test_registration_order_and_lookup() {
        let mappers = mappers(true);
        let mut builder = AccessorRegistryBuilder::new();
        builder.register(interceptor_contract("c/B"), &mappers).unwrap();
        builder.register(interceptor_contract("c/A"), &mappers).unwrap();
        assert!(matches!(
            builder.register(interceptor_contract("c/A"), &mappers),
            Err(Error::InvalidContract { .. })
        ));

        let (registry, errors) = builder.build(&mappers.build());
        assert!(errors.is_empty());
        let names: Vec<_> = registry.contracts().iter().map(|c| c.name()).collect();
        assert_eq!(names, ["c/B", "c/A"]);
        assert!(registry.is_contract("c/A"));
        assert_eq!(registry.by_identifier("target").count(), 2);
        assert!(registry.by_name("c/C").is_none());
    }

    #[test]
    fn test_unresolved_interceptors_are_dropped() {
        let mappers = mappers(false);
        let mut builder = AccessorRegistryBuilder::new();
        builder.register(interceptor_contract("c/A"), &mappers).unwrap();
        let (registry, errors) = builder.build(&mappers.build());
        assert!(registry.is_empty());
        assert!(matches!(errors.as_slice(), [Error::NotMapped { .. }]));
    }

    #[test]
    fn test_unregister_returns_descriptor() {
        let mappers = mappers(true);
        let mut builder = AccessorRegistryBuilder::new();
        builder.register(interceptor_contract("c/A"), &mappers).unwrap();
        let descriptor = builder.unregister("c/A").unwrap();
        assert_eq!(descriptor.members.len(), 1);
        assert!(builder.unregister("c/A").is_none());
        assert!(!builder.contains("c/A"));
    }
}
