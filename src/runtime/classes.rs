//! Class files of the runtime types.
//!
//! Hosts that cannot ship the runtime as a library define these classes themselves, typically in
//! the bootstrap or platform loader so every woven class can see them.

use crate::{
    analysis::ObjectHierarchy,
    classfile::{
        opcodes::*, AccessFlags, ClassNode, ClassWriter, Code, FieldNode, Insn, InsnList,
        MethodNode,
    },
    runtime::abi::{context, context_impl, invalid_exit, Member},
    Result,
};

const OBJECT: &str = "java/lang/Object";
const RUNTIME_EXCEPTION: &str = "java/lang/RuntimeException";
const CLASS_VERSION: u16 = 52;

const PARAMS: (&str, &str) = ("params", "[Ljava/lang/Object;");
const EXIT: (&str, &str) = ("exit", "I");
const EXITING: (&str, &str) = ("exiting", "Z");
const RETURN_VALUE: (&str, &str) = ("returnValue", "Ljava/lang/Object;");
const RETURNING: (&str, &str) = ("returning", "Z");

fn method(access: AccessFlags, member: Member, insns: Vec<Insn>) -> MethodNode {
    let mut node = MethodNode::new(access, member.name, member.desc);
    node.set_code(Code {
        instructions: insns.into_iter().collect::<InsnList>(),
        ..Code::default()
    });
    node
}

fn get(owner: &str, (name, desc): (&str, &str)) -> Vec<Insn> {
    vec![Insn::var(ALOAD, 0), Insn::field(GETFIELD, owner, name, desc)]
}

fn put(owner: &str, (name, desc): (&str, &str), value: Insn) -> Vec<Insn> {
    vec![
        Insn::var(ALOAD, 0),
        value,
        Insn::field(PUTFIELD, owner, name, desc),
    ]
}

fn super_init(owner: &str, desc: &str) -> Vec<Insn> {
    vec![
        Insn::var(ALOAD, 0),
        Insn::method(INVOKESPECIAL, owner, "<init>", desc, false),
    ]
}

/// The `InterceptorContext` interface.
#[must_use]
pub fn context_interface() -> ClassNode {
    let mut node = ClassNode::new(
        CLASS_VERSION,
        AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT,
        context::NAME,
        Some(OBJECT),
    );
    node.signature = Some(context::SIGNATURE.to_string());
    let abstract_method = AccessFlags::PUBLIC | AccessFlags::ABSTRACT;
    for member in [
        context::EXIT_AT,
        context::CANCEL_EXIT,
        context::GET_EXIT,
        context::IS_EXITING,
        context::RETURN_WITH,
        context::CANCEL_RETURN,
        context::GET_RETURN,
        context::IS_RETURNING,
        context::GET_LOCAL_VARIABLES,
    ] {
        let mut method = MethodNode::new(abstract_method, member.name, member.desc);
        if member == context::RETURN_WITH {
            method.signature = Some("(TT;)V".to_string());
        } else if member == context::GET_RETURN {
            method.signature = Some("()TT;".to_string());
        }
        node.methods.push(method);
    }
    node
}

/// The concrete context woven code instantiates.
#[must_use]
pub fn context_class() -> ClassNode {
    let owner = context_impl::NAME;
    let mut node = ClassNode::new(
        CLASS_VERSION,
        AccessFlags::PUBLIC | AccessFlags::FINAL | AccessFlags::SUPER,
        owner,
        Some(OBJECT),
    );
    node.interfaces.push(context::NAME.to_string());
    node.signature = Some(format!("L{OBJECT};L{}<L{OBJECT};>;", context::NAME));

    for (access, (name, desc)) in [
        (AccessFlags::PRIVATE | AccessFlags::FINAL, PARAMS),
        (AccessFlags::PRIVATE, EXIT),
        (AccessFlags::PRIVATE, EXITING),
        (AccessFlags::PRIVATE, RETURN_VALUE),
        (AccessFlags::PRIVATE, RETURNING),
    ] {
        node.fields.push(FieldNode::new(access, name, desc));
    }

    let public = AccessFlags::PUBLIC;
    let mut init = super_init(OBJECT, "()V");
    init.extend([
        Insn::var(ALOAD, 0),
        Insn::var(ILOAD, 1),
        Insn::type_insn(ANEWARRAY, OBJECT),
        Insn::field(PUTFIELD, owner, PARAMS.0, PARAMS.1),
        Insn::Simple(RETURN),
    ]);
    node.methods.push(method(public, context_impl::INIT, init));

    let mut exit_at = put(owner, EXIT, Insn::var(ILOAD, 1));
    exit_at.extend(put(owner, EXITING, Insn::Simple(ICONST_1)));
    exit_at.push(Insn::Simple(RETURN));
    node.methods.push(method(public, context::EXIT_AT, exit_at));

    let mut cancel_exit = put(owner, EXITING, Insn::Simple(ICONST_0));
    cancel_exit.push(Insn::Simple(RETURN));
    node.methods.push(method(public, context::CANCEL_EXIT, cancel_exit));

    let mut return_with = put(owner, RETURN_VALUE, Insn::var(ALOAD, 1));
    return_with.extend(put(owner, RETURNING, Insn::Simple(ICONST_1)));
    return_with.push(Insn::Simple(RETURN));
    node.methods.push(method(public, context::RETURN_WITH, return_with));

    let mut cancel_return = put(owner, RETURNING, Insn::Simple(ICONST_0));
    cancel_return.push(Insn::Simple(RETURN));
    node.methods.push(method(public, context::CANCEL_RETURN, cancel_return));

    for (member, field, opcode) in [
        (context::GET_EXIT, EXIT, IRETURN),
        (context::IS_EXITING, EXITING, IRETURN),
        (context::GET_RETURN, RETURN_VALUE, ARETURN),
        (context::IS_RETURNING, RETURNING, IRETURN),
        (context::GET_LOCAL_VARIABLES, PARAMS, ARETURN),
    ] {
        let mut body = get(owner, field);
        body.push(Insn::Simple(opcode));
        node.methods.push(method(public, member, body));
    }
    node
}

/// The error thrown for undeclared exit indices.
#[must_use]
pub fn invalid_exit_class() -> ClassNode {
    let owner = invalid_exit::NAME;
    let mut node = ClassNode::new(
        CLASS_VERSION,
        AccessFlags::PUBLIC | AccessFlags::SUPER,
        owner,
        Some(RUNTIME_EXCEPTION),
    );
    node.fields.push(FieldNode::new(
        AccessFlags::PRIVATE | AccessFlags::FINAL,
        EXIT.0,
        EXIT.1,
    ));

    let mut init = super_init(RUNTIME_EXCEPTION, "()V");
    init.extend(put(owner, EXIT, Insn::var(ILOAD, 1)));
    init.push(Insn::Simple(RETURN));
    node.methods
        .push(method(AccessFlags::PUBLIC, invalid_exit::INIT, init));

    let mut get_exit = get(owner, EXIT);
    get_exit.push(Insn::Simple(IRETURN));
    node.methods
        .push(method(AccessFlags::PUBLIC, context::GET_EXIT, get_exit));
    node
}

/// Encoded runtime classes, as `(internal name, bytes)` in definition order.
///
/// # Errors
/// Returns the writer's error if a class cannot be encoded.
pub fn classes() -> Result<Vec<(String, Vec<u8>)>> {
    let writer = ClassWriter::new(&ObjectHierarchy);
    let mut encoded = Vec::with_capacity(3);
    for node in [context_interface(), context_class(), invalid_exit_class()] {
        let bytes = writer.write(&node)?;
        encoded.push((node.name, bytes));
    }
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::{ClassReader, ReaderFlags};

    #[test]
    fn test_classes_decode() {
        let classes = classes().unwrap();
        let names: Vec<_> = classes.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec![context::NAME, context_impl::NAME, invalid_exit::NAME]);

        for (name, bytes) in &classes {
            let node = ClassReader::new(bytes).read(ReaderFlags::empty()).unwrap();
            assert_eq!(&node.name, name);
        }
    }

    #[test]
    fn test_context_class_implements_every_member() {
        let interface = context_interface();
        let class = context_class();
        for method in &interface.methods {
            let implemented = class.method(&method.name, &method.desc).unwrap();
            assert!(!implemented.access.is_abstract());
            assert!(implemented.code().is_some());
        }
        assert!(class.method("<init>", "(I)V").is_some());
    }
}
