//! Accessor contracts.
//!
//! A contract is an interface the weaver makes a target class implement. Its members say what to
//! generate: getters and setters of existing fields, getters and setters of fields added on
//! demand, proxies to existing methods, and interceptors spliced into method bodies.
//!
//! # Key Components
//!
//! - [`ContractDescriptor`] / [`MemberDescriptor`] - Decoded or hand-built contract interfaces
//! - [`AccessorRegistryBuilder`] - Validates contracts during initialization
//! - [`AccessorRegistry`] / [`AccessorContract`] - The frozen, fully resolved contracts
//!
//! # Examples
//!
//! ```rust,no_run
//! use classweave::accessor::{AccessorRegistryBuilder, ContractDescriptor, MemberDescriptor};
//! use classweave::identification::MapperRegistryBuilder;
//!
//! let mappers = MapperRegistryBuilder::new();
//! let mut contracts = AccessorRegistryBuilder::new();
//! let contract = ContractDescriptor::builder("game/PlayerAccessor", "player")
//!     .member(MemberDescriptor::field_accessor("getHealth", "()I", "health"));
//! contracts.register(contract, &mappers)?;
//! let (registry, errors) = contracts.build(&mappers.build());
//! # Ok::<(), classweave::Error>(())
//! ```

mod contract;
mod descriptor;
mod registry;

pub use contract::{
    is_java_identifier, AccessorContract, ElementAccessorSpec, FieldAccessorSpec,
    FieldGeneratorSpec, GeneratedField, ImportedLocalVariable, MethodAccessorSpec,
    MethodInterceptorSpec,
};
pub use descriptor::{ContractDescriptor, MemberDescriptor, MemberRole, ParameterDescriptor};
pub use registry::{AccessorRegistry, AccessorRegistryBuilder};
