//! The weaving engine.
//!
//! A [`Weaver`] rewrites one class at a time. For a class targeted by registered contracts it
//! runs a fixed sequence of states ([`WeaveState`]): find the contracts, declare them as
//! interfaces, implement their field accessors and generators, implement their method accessors,
//! and finally splice the interceptor calls into the identified methods. The first error aborts
//! the class; the caller keeps the original bytes.
//!
//! A class that is itself a registered contract is instrumented instead, so that interceptor
//! parameters written by the interceptor body flow back into the intercepted method.
//!
//! # Key Components
//!
//! - [`WeaveContext`] - The registries, topology, checker and configuration a weave reads
//! - [`Weaver`] - The per-class state machine
//! - [`unique_name`] / [`free_slot`] - Name and slot allocation for introduced locals
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use classweave::weaver::{WeaveContext, Weaver};
//!
//! let weaver = Weaver::new(WeaveContext::new(&accessors, &topology, &config));
//! match weaver.weave_bytes(&loader, &bytes)? {
//!     Some(woven) => define(woven),
//!     None => define(bytes),
//! }
//! ```

mod contract_class;
mod emit;
mod fields;
mod interceptors;
mod locals;
mod methods;

pub use locals::{free_slot, unique_name, MAX_NAME_LENGTH};

use tracing::{debug, trace};

use crate::{
    accessor::{AccessorContract, AccessorRegistry, ElementAccessorSpec},
    classfile::{ClassNode, ClassReader, ClassWriter, MethodNode, ReaderFlags},
    compat::CompatibilityChecker,
    config::WeaverConfig,
    identification::ElementDescription,
    topology::{ClassTopology, LoaderRef, TopologyHierarchy},
    Error, Result,
};

/// States of a class weave, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum WeaveState {
    /// Find the contracts targeting the class
    Scan,
    /// Add the contracts to the implemented interfaces
    Declare,
    /// Implement field accessors and field generators
    FieldAccessors,
    /// Implement method accessors
    MethodAccessors,
    /// Insert interceptor calls
    Interceptors,
    /// The class is woven
    Done,
}

/// Everything a weave reads.
pub struct WeaveContext<'a> {
    /// Registered contracts
    pub accessors: &'a AccessorRegistry,
    /// Structural class cache
    pub topology: &'a ClassTopology,
    /// Assignability checks through `topology` and `accessors`
    pub checker: CompatibilityChecker<'a>,
    /// Engine configuration
    pub config: &'a WeaverConfig,
}

impl<'a> WeaveContext<'a> {
    /// Create a context over the given registries.
    #[must_use]
    pub fn new(
        accessors: &'a AccessorRegistry,
        topology: &'a ClassTopology,
        config: &'a WeaverConfig,
    ) -> Self {
        WeaveContext {
            accessors,
            topology,
            checker: CompatibilityChecker::new(topology, accessors),
            config,
        }
    }
}

/// Rewrites classes according to the registered contracts.
pub struct Weaver<'a> {
    ctx: WeaveContext<'a>,
}

impl<'a> Weaver<'a> {
    /// Create a weaver.
    #[must_use]
    pub fn new(ctx: WeaveContext<'a>) -> Self {
        Weaver { ctx }
    }

    /// The context this weaver reads.
    #[must_use]
    pub fn context(&self) -> &WeaveContext<'a> {
        &self.ctx
    }

    /// Contracts whose class identifier matches `class`, in registration order.
    #[must_use]
    pub fn matching_contracts(&self, loader: &LoaderRef, class: &ClassNode) -> Vec<&'a AccessorContract> {
        self.ctx
            .accessors
            .contracts()
            .iter()
            .filter(|contract| contract.identifies(loader, &class.name, Some(class)))
            .map(AsRef::as_ref)
            .collect()
    }

    /// Weave `class` in place. Returns `false` if nothing applies to it.
    ///
    /// On error `class` may be partially rewritten and must be discarded.
    ///
    /// # Errors
    /// Returns the first resolution, compatibility or verification error of any contract
    /// targeting the class.
    pub fn weave(&self, loader: &LoaderRef, class: &mut ClassNode) -> Result<bool> {
        if let Some(contract) = self.ctx.accessors.by_name(&class.name) {
            return self.instrument_contract_class(contract, class);
        }

        let mut contracts = Vec::new();
        let mut state = WeaveState::Scan;
        loop {
            trace!(class = %class.name, %state, "weave state");
            state = match state {
                WeaveState::Scan => {
                    contracts = self.matching_contracts(loader, class);
                    if contracts.is_empty() {
                        return Ok(false);
                    }
                    debug!(class = %class.name, contracts = contracts.len(), "weaving class");
                    WeaveState::Declare
                }
                WeaveState::Declare => {
                    for contract in &contracts {
                        class.add_interface(contract.name());
                    }
                    WeaveState::FieldAccessors
                }
                WeaveState::FieldAccessors => {
                    for contract in &contracts {
                        self.weave_field_accessors(loader, contract, class)?;
                        self.weave_field_generators(loader, contract, class)?;
                    }
                    WeaveState::MethodAccessors
                }
                WeaveState::MethodAccessors => {
                    for contract in &contracts {
                        self.weave_method_accessors(loader, contract, class)?;
                    }
                    WeaveState::Interceptors
                }
                WeaveState::Interceptors => {
                    self.weave_interceptors(loader, &contracts, class)?;
                    WeaveState::Done
                }
                WeaveState::Done => return Ok(true),
            };
        }
    }

    /// Decode, weave and re-encode a class file. Returns `None` if nothing applies to it.
    ///
    /// The class is recorded in the topology as it was read. Only rewritten and generated methods
    /// are re-assembled; everything else keeps its original encoding.
    ///
    /// # Errors
    /// Returns decoding and encoding errors, and everything [`Weaver::weave`] returns.
    pub fn weave_bytes(&self, loader: &LoaderRef, data: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut class = ClassReader::new(data).read(ReaderFlags::empty())?;
        self.ctx.topology.add_class(loader, &class);
        if !self.weave(loader, &mut class)? {
            return Ok(None);
        }
        let hierarchy = TopologyHierarchy::new(self.ctx.topology, loader);
        let woven = ClassWriter::new(&hierarchy)
            .compute_frames(self.ctx.config.compute_frames)
            .write(&class)?;
        Ok(Some(woven))
    }
}

/// Returns `true` if the member `name`/`desc` of `class` is the target of `spec`, consulting and
/// filling the per-loader memo.
fn is_identified<I>(
    spec: &ElementAccessorSpec<I>,
    loader: &LoaderRef,
    class: &str,
    name: &str,
    desc: &str,
    identifies: impl FnOnce() -> bool,
) -> bool {
    if spec
        .identified(loader, class)
        .is_some_and(|known| known.matches(name, desc))
    {
        return true;
    }
    if identifies() {
        spec.remember(loader, class, ElementDescription::new(name, desc));
        return true;
    }
    false
}

/// Fails with [`Error::AccessorTaken`] if `class` already declares a method matching `taken`.
fn ensure_free(class: &ClassNode, owner: &str, taken: impl Fn(&MethodNode) -> bool) -> Result<()> {
    if class.methods.iter().any(taken) {
        return Err(Error::AccessorTaken(owner.to_string()));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        accessor::{AccessorRegistryBuilder, ContractDescriptor},
        classfile::{opcodes::*, AccessFlags, Insn},
        identification::{ClassIdentifier, MapperRegistryBuilder, SearchPurpose},
        test::{class, method, write},
        topology::{LocatorRegistryBuilder, MemoryClassLoader},
    };

    /// A registry holding `contracts`, all targeting `t/Target`, with `mappers` for their members.
    pub(crate) fn registry(
        mut mappers: MapperRegistryBuilder,
        contracts: Vec<ContractDescriptor>,
    ) -> AccessorRegistry {
        mappers.register_class_mapper("target", |id: &str, _: SearchPurpose| {
            (id == "target").then(|| ClassIdentifier::names(["t/Target"]))
        });
        let mut builder = AccessorRegistryBuilder::new();
        for contract in contracts {
            builder.register(contract, &mappers).unwrap();
        }
        let (registry, errors) = builder.build(&mappers.build());
        assert!(errors.is_empty(), "{errors:?}");
        registry
    }

    pub(crate) fn topology() -> ClassTopology {
        ClassTopology::new(LocatorRegistryBuilder::new().build(), &WeaverConfig::default())
    }

    pub(crate) fn loader() -> LoaderRef {
        Arc::new(MemoryClassLoader::new("app"))
    }

    pub(crate) fn target() -> ClassNode {
        let mut node = class("t/Target", "java/lang/Object");
        node.methods.push(method(
            AccessFlags::PUBLIC,
            "<init>",
            "()V",
            vec![
                Insn::var(ALOAD, 0),
                Insn::method(INVOKESPECIAL, "java/lang/Object", "<init>", "()V", false),
                Insn::Simple(RETURN),
            ],
        ));
        node
    }

    #[test]
    fn test_unmatched_class_is_left_alone() {
        let accessors = registry(
            MapperRegistryBuilder::new(),
            vec![ContractDescriptor::builder("c/Contract", "target")],
        );
        let topology = topology();
        let config = WeaverConfig::default();
        let weaver = Weaver::new(WeaveContext::new(&accessors, &topology, &config));

        let other = write(&class("t/Other", "java/lang/Object"));
        assert!(weaver.weave_bytes(&loader(), &other).unwrap().is_none());
    }

    #[test]
    fn test_contracts_are_declared_once() {
        let accessors = registry(
            MapperRegistryBuilder::new(),
            vec![
                ContractDescriptor::builder("c/First", "target"),
                ContractDescriptor::builder("c/Second", "target"),
            ],
        );
        let topology = topology();
        let config = WeaverConfig::default();
        let weaver = Weaver::new(WeaveContext::new(&accessors, &topology, &config));

        let mut node = target();
        node.interfaces.push("c/First".into());
        assert!(weaver.weave(&loader(), &mut node).unwrap());
        assert_eq!(node.interfaces, vec!["c/First", "c/Second"]);

        let woven = weaver.weave_bytes(&loader(), &write(&target())).unwrap().unwrap();
        let decoded = ClassReader::new(&woven).read(ReaderFlags::empty()).unwrap();
        assert_eq!(decoded.interfaces, vec!["c/First", "c/Second"]);
    }
}
