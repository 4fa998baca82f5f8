//! JVM class-file codec.
//!
//! This module decodes class files into an editable tree and encodes the tree back. It is the
//! collaborator every other part of the weaver builds on: the topology resolver reads class
//! headers through it, and the weaver edits [`ClassNode`]s and writes them with [`ClassWriter`].
//!
//! # Architecture
//!
//! - [`constpool`] - Constant pool parsing and an append-only pool builder
//! - [`descriptor`] - Field and method descriptors
//! - [`insn`] - Instruction nodes with symbolic labels
//! - [`nodes`] - Class, field and method nodes
//! - [`annotation`] - Runtime-visible annotations
//! - [`reader`] / [`writer`] - Decoding and encoding
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use classweave::analysis::ObjectHierarchy;
//! use classweave::classfile::{ClassReader, ClassWriter, ReaderFlags};
//!
//! let mut node = ClassReader::new(&bytes).read(ReaderFlags::empty())?;
//! node.add_interface("java/io/Serializable");
//! let woven = ClassWriter::new(&ObjectHierarchy).write(&node)?;
//! # Ok::<(), classweave::Error>(())
//! ```

pub mod access;
pub mod annotation;
pub mod constpool;
pub mod descriptor;
pub mod insn;
pub mod nodes;
pub mod opcodes;
pub mod reader;
pub mod writer;

pub use access::AccessFlags;
pub use annotation::{Annotation, ElementValue};
pub use constpool::{Constant, ConstantPool, ConstantPoolBuilder};
pub use descriptor::{MethodType, Type};
pub use insn::{Insn, InsnList, LabelId, LdcValue};
pub use nodes::{
    Attribute, ClassNode, Code, EnclosingMethod, FieldNode, InnerClassNode, LocalVariableNode,
    MethodNode, TryCatchBlock,
};
pub use reader::{ClassReader, ReaderFlags};
pub use writer::ClassWriter;
