//! Cached structural view of a class.

use crate::{
    classfile::{AccessFlags, ClassNode, ClassReader, ReaderFlags},
    signature::{parse_signature, Signature},
    Result,
};

/// Structural metadata of one class, as seen through one loader.
///
/// Entries carry no method bodies. The structural [`ClassNode`] is kept so dynamic identifiers
/// can inspect members.
#[derive(Debug, Clone)]
pub struct ClassTopologyEntry {
    /// Internal name
    pub name: String,
    /// Access flags
    pub access: AccessFlags,
    /// Superclass, `None` for `java/lang/Object` and module descriptors
    pub super_name: Option<String>,
    /// Direct superinterfaces
    pub interfaces: Vec<String>,
    /// Generic class signature
    pub signature: Option<String>,
    /// Lexically enclosing class
    pub outer_name: Option<String>,
    /// The class without code
    pub node: ClassNode,
}

impl ClassTopologyEntry {
    /// Build an entry from a class node, dropping its method bodies.
    #[must_use]
    pub fn from_node(node: &ClassNode) -> Self {
        let node = node.structural();
        ClassTopologyEntry {
            name: node.name.clone(),
            access: node.access,
            super_name: node.super_name.clone(),
            interfaces: node.interfaces.clone(),
            signature: node.signature.clone(),
            outer_name: node.outer_class().map(str::to_string),
            node,
        }
    }

    /// Decode an entry from class-file bytes.
    ///
    /// # Errors
    /// Returns the reader's error for malformed input.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let node = ClassReader::new(data).read(ReaderFlags::SKIP_CODE | ReaderFlags::SKIP_DEBUG)?;
        Ok(ClassTopologyEntry::from_node(&node))
    }

    /// Returns `true` for interfaces.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.access.is_interface()
    }

    /// The parsed class signature.
    ///
    /// # Errors
    /// Returns the parser's error for a malformed `Signature` attribute.
    pub fn parsed_signature(&self) -> Result<Option<Signature>> {
        self.signature.as_deref().map(parse_signature).transpose()
    }
}
