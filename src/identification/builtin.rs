//! Ready-made instruction and local-variable strategies.
//!
//! These cover the usual ways of pointing into a method body: a fixed index, the first or last
//! return, a call site, or a local variable by name or slot.

use crate::{
    classfile::{opcodes::is_return, Insn, MethodNode},
    identification::{ElementDescription, InstructionIdentifier, InstructionKind},
};

fn offset_index(base: usize, offset: isize) -> Option<usize> {
    base.checked_add_signed(offset)
}

fn instructions(method: &MethodNode) -> &[Insn] {
    method
        .code()
        .map_or(&[][..], |code| code.instructions.as_slice())
}

/// The instruction at `index`, counted from the end when `reversed`.
#[must_use]
pub fn by_index(index: usize, reversed: bool) -> InstructionIdentifier {
    InstructionIdentifier::new(
        InstructionKind::Instruction,
        format!("index {index}{}", if reversed { " from end" } else { "" }),
        move |method| {
            if reversed {
                instructions(method).len().checked_sub(index + 1)
            } else {
                Some(index)
            }
        },
    )
}

/// The first `xreturn`, moved by `offset` nodes.
#[must_use]
pub fn first_return(offset: isize) -> InstructionIdentifier {
    InstructionIdentifier::new(
        InstructionKind::Instruction,
        format!("first return {offset:+}"),
        move |method| {
            instructions(method)
                .iter()
                .position(|insn| matches!(insn, Insn::Simple(op) if is_return(*op)))
                .and_then(|index| offset_index(index, offset))
        },
    )
}

/// The last `xreturn`, moved by `offset` nodes.
#[must_use]
pub fn last_return(offset: isize) -> InstructionIdentifier {
    InstructionIdentifier::new(
        InstructionKind::Instruction,
        format!("last return {offset:+}"),
        move |method| {
            instructions(method)
                .iter()
                .rposition(|insn| matches!(insn, Insn::Simple(op) if is_return(*op)))
                .and_then(|index| offset_index(index, offset))
        },
    )
}

/// The first invocation of any of `calls`, given as owner and method description.
///
/// Points at the invocation itself when `before` is set, otherwise at the node after it.
#[must_use]
pub fn method_call(calls: Vec<(String, ElementDescription)>, before: bool) -> InstructionIdentifier {
    let description = format!(
        "{} call to {}",
        if before { "before" } else { "after" },
        calls
            .iter()
            .map(|(owner, method)| format!("{owner}.{method}"))
            .collect::<Vec<_>>()
            .join(" | ")
    );
    InstructionIdentifier::new(InstructionKind::Instruction, description, move |method| {
        instructions(method)
            .iter()
            .position(|insn| match insn {
                Insn::Method {
                    owner, name, desc, ..
                } => calls
                    .iter()
                    .any(|(call_owner, call)| call_owner == owner && call.matches(name, desc)),
                _ => false,
            })
            .map(|index| if before { index } else { index + 1 })
    })
}

/// The slot of the first local variable named one of `names`.
#[must_use]
pub fn local_by_name(names: Vec<String>) -> InstructionIdentifier {
    InstructionIdentifier::new(
        InstructionKind::LocalVariable,
        format!("local named {}", names.join(" | ")),
        move |method| {
            method.code().and_then(|code| {
                code.local_variables
                    .iter()
                    .find(|local| names.iter().any(|name| *name == local.name))
                    .map(|local| usize::from(local.index))
            })
        },
    )
}

/// Local slot `index`, or counted back from the number of local-variable entries when `reversed`.
#[must_use]
pub fn local_by_index(index: usize, reversed: bool) -> InstructionIdentifier {
    InstructionIdentifier::new(
        InstructionKind::LocalVariable,
        format!("local {index}{}", if reversed { " from end" } else { "" }),
        move |method| {
            if reversed {
                method
                    .code()
                    .and_then(|code| code.local_variables.len().checked_sub(index + 1))
            } else {
                Some(index)
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::{opcodes::*, AccessFlags, Code, LabelId, LocalVariableNode};

    fn method() -> MethodNode {
        let mut method = MethodNode::new(AccessFlags::PUBLIC, "m", "(I)V");
        method.set_code(Code {
            instructions: vec![
                Insn::Label(LabelId(0)),
                Insn::Var { opcode: ILOAD, var: 1 },
                Insn::Method {
                    opcode: INVOKESTATIC,
                    owner: "a/Log".into(),
                    name: "log".into(),
                    desc: "(I)V".into(),
                    interface: false,
                },
                Insn::Simple(RETURN),
                Insn::Simple(RETURN),
                Insn::Label(LabelId(1)),
            ]
            .into_iter()
            .collect(),
            local_variables: vec![
                LocalVariableNode {
                    name: "this".into(),
                    desc: "La/B;".into(),
                    signature: None,
                    start: LabelId(0),
                    end: LabelId(1),
                    index: 0,
                },
                LocalVariableNode {
                    name: "count".into(),
                    desc: "I".into(),
                    signature: None,
                    start: LabelId(0),
                    end: LabelId(1),
                    index: 1,
                },
            ],
            ..Code::default()
        });
        method
    }

    #[test]
    fn test_index_strategies() {
        let method = method();
        assert_eq!(by_index(2, false).identify(&method), Some(2));
        assert_eq!(by_index(0, true).identify(&method), Some(5));
        assert_eq!(by_index(9, true).identify(&method), None);
    }

    #[test]
    fn test_return_strategies() {
        let method = method();
        assert_eq!(first_return(0).identify(&method), Some(3));
        assert_eq!(last_return(0).identify(&method), Some(4));
        assert_eq!(first_return(-1).identify(&method), Some(2));
        assert_eq!(first_return(-9).identify(&method), None);
    }

    #[test]
    fn test_method_call_strategy() {
        let method = method();
        let calls = vec![("a/Log".to_string(), ElementDescription::new("log", "(I)V"))];
        assert_eq!(method_call(calls.clone(), true).identify(&method), Some(2));
        assert_eq!(method_call(calls, false).identify(&method), Some(3));
        let other = vec![("a/Log".to_string(), ElementDescription::new("log", "()V"))];
        assert_eq!(method_call(other, true).identify(&method), None);
    }

    #[test]
    fn test_local_strategies() {
        let method = method();
        let by_name = local_by_name(vec!["count".into()]);
        assert_eq!(by_name.kind(), InstructionKind::LocalVariable);
        assert_eq!(by_name.identify(&method), Some(1));
        assert_eq!(local_by_index(0, true).identify(&method), Some(1));
        assert_eq!(local_by_name(vec!["missing".into()]).identify(&method), None);
    }
}
