//! # classweave Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the classweave library. Import this module to get quick access to the essential
//! types for registering contracts and weaving classes.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all classweave operations
pub use crate::Error;

/// Taxonomy of errors
pub use crate::ErrorCategory;

/// The result type used throughout classweave
pub use crate::Result;

/// Engine configuration
pub use crate::WeaverConfig;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Composition root and host hook
pub use crate::bootstrap::{BootstrapBuilder, Bootstrapper, Escalate, FailureHandler};

/// Declarative mappings
pub use crate::mappings::{InstructionMapping, XmlMappings};

// ================================================================================================
// Contracts and Identification
// ================================================================================================

/// Contract descriptors
pub use crate::accessor::{ContractDescriptor, MemberDescriptor, MemberRole};

/// Identifiers and mappers
pub use crate::identification::{
    builtin, ClassIdentifier, ElementDescription, FieldIdentifier, IdentifierKind,
    InstructionIdentifier, Mapper, MethodIdentifier, SearchPurpose,
};

// ================================================================================================
// Class Loaders and Topology
// ================================================================================================

/// Loaders and locators
pub use crate::topology::{
    ClassLoader, ClassLocator, DirectoryLocator, LoaderRef, MemoryClassLoader, MemoryLocator,
};

// ================================================================================================
// Class-File Codec
// ================================================================================================

/// Reading and writing class files
pub use crate::classfile::{
    AccessFlags, ClassNode, ClassReader, ClassWriter, FieldNode, Insn, MethodNode, ReaderFlags,
};

/// Descriptors
pub use crate::classfile::{MethodType, Type};

/// Weaving a single class directly
pub use crate::weaver::{WeaveContext, Weaver};
