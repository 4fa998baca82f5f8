//! Identification strategies and the mapper registry.
//!
//! Accessor contracts never name their targets directly. They carry symbolic ids, and the
//! registered mappers turn an id into an identifier for the element being looked for: a class, a
//! field, a method, or an instruction index inside a method body. The same id may mean different
//! things depending on the [`SearchPurpose`] a lookup is made for.
//!
//! # Key Components
//!
//! - [`ClassIdentifier`], [`FieldIdentifier`], [`MethodIdentifier`] - Static name sets or
//!   dynamic predicates
//! - [`InstructionIdentifier`] - Finds an instruction index or a local-variable slot
//! - [`MapperRegistryBuilder`] / [`MapperRegistry`] - Ordered, id-keyed mapper registrations
//! - [`builtin`] - Ready-made instruction strategies
//!
//! # Examples
//!
//! ```rust,no_run
//! use classweave::identification::{
//!     builtin, ClassIdentifier, MapperRegistryBuilder, SearchPurpose,
//! };
//!
//! let mut mappers = MapperRegistryBuilder::new();
//! mappers.register_class_mapper("names", |id: &str, _purpose: SearchPurpose| match id {
//!     "player" => Some(ClassIdentifier::names(["game/Player"])),
//!     _ => None,
//! });
//! mappers.register_instruction_mapper("names", |id: &str, _purpose: SearchPurpose| match id {
//!     "head" => Some(builtin::by_index(0, false)),
//!     _ => None,
//! });
//!
//! let registry = mappers.build();
//! assert!(registry.class_identifier("player", SearchPurpose::Accessor).is_some());
//! ```

pub mod builtin;
mod element;
mod identifier;
mod instruction;
mod registry;

pub use element::ElementDescription;
pub use identifier::{ClassIdentifier, FieldIdentifier, MethodIdentifier};
pub use instruction::{InstructionIdentifier, InstructionKind};
pub(crate) use registry::Registrations;
pub use registry::{Mapper, MapperRegistry, MapperRegistryBuilder};

/// The kind of element an identifier selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum IdentifierKind {
    /// A class
    Class,
    /// A field
    Field,
    /// A method
    Method,
    /// An instruction index
    Instruction,
    /// A local-variable slot
    LocalVariable,
}

/// Why an identifier is being looked up.
///
/// Mappers may answer `None` for purposes they do not serve, which lets one id space carry
/// different meanings per purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum SearchPurpose {
    /// The target of an accessor contract, field accessor or method accessor
    Accessor,
    /// The name of a field generator
    NameGenerator,
    /// The target method of an interceptor
    Interceptor,
    /// A local variable imported by an interceptor
    LocalVariable,
    /// The instruction an interceptor is inserted before
    InterceptorEntry,
    /// An instruction an interceptor may jump to
    InterceptorExit,
    /// Anything else
    Other,
}
