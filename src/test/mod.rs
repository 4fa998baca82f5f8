//! Builders shared by unit tests.

use std::sync::Arc;

use crate::{
    analysis::ObjectHierarchy,
    classfile::{AccessFlags, ClassNode, ClassWriter, Code, Insn, InsnList, MethodNode},
    topology::{LoaderRef, MemoryClassLoader},
};

// A public class of version 52
pub fn class(name: &str, super_name: &str) -> ClassNode {
    ClassNode::new(52, AccessFlags::PUBLIC | AccessFlags::SUPER, name, Some(super_name))
}

// A public interface of version 52
pub fn interface(name: &str, interfaces: &[&str]) -> ClassNode {
    let mut node = ClassNode::new(
        52,
        AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT,
        name,
        Some("java/lang/Object"),
    );
    node.interfaces = interfaces.iter().map(|i| (*i).to_string()).collect();
    node
}

// A method with the given body
pub fn method(access: AccessFlags, name: &str, desc: &str, insns: Vec<Insn>) -> MethodNode {
    let mut node = MethodNode::new(access, name, desc);
    node.set_code(Code {
        instructions: insns.into_iter().collect::<InsnList>(),
        ..Code::default()
    });
    node
}

// Encode without a hierarchy
pub fn write(node: &ClassNode) -> Vec<u8> {
    ClassWriter::new(&ObjectHierarchy).write(node).unwrap()
}

// A loader serving the given classes
pub fn loader_with(name: &str, classes: &[&ClassNode]) -> LoaderRef {
    let loader = MemoryClassLoader::new(name);
    for class in classes {
        loader.insert_class(&class.name, write(class));
    }
    Arc::new(loader)
}
