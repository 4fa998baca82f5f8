//! Names and slots for locals the weaver introduces.

use std::collections::HashSet;

use crate::{
    classfile::{descriptor::Type, opcodes::*, Insn, LabelId, LocalVariableNode, MethodNode},
    Error, Result,
};

/// Longest name [`unique_name`] will try.
pub const MAX_NAME_LENGTH: usize = 32;

/// The shortest lowercase ASCII name not in `exclusions`.
///
/// Candidates are enumerated breadth-first: `a` to `z`, then `aa`, `ab` and so on.
///
/// # Errors
/// Returns [`Error::NotSupported`] if every name up to [`MAX_NAME_LENGTH`] is excluded.
pub fn unique_name<'a>(exclusions: impl IntoIterator<Item = &'a str>) -> Result<String> {
    let taken: HashSet<&str> = exclusions.into_iter().collect();
    for length in 1..=MAX_NAME_LENGTH {
        let mut candidate = vec![b'a'; length];
        loop {
            let name = String::from_utf8_lossy(&candidate);
            if !taken.contains(name.as_ref()) {
                return Ok(name.into_owned());
            }
            if !advance(&mut candidate) {
                break;
            }
        }
    }
    Err(Error::NotSupported(format!(
        "no unused local name of at most {MAX_NAME_LENGTH} characters"
    )))
}

// Odometer increment over 'a'..='z'. Returns false on wrap-around.
fn advance(candidate: &mut [u8]) -> bool {
    for digit in candidate.iter_mut().rev() {
        if *digit < b'z' {
            *digit += 1;
            return true;
        }
        *digit = b'a';
    }
    false
}

/// The lowest slot at or above 1 that holds neither the receiver, a parameter, a local-variable
/// table entry nor a slot touched by a load, store or `iinc`.
///
/// # Errors
/// Returns [`Error::Malformed`] for an invalid descriptor and [`Error::NotSupported`] if the
/// method has no free slot left.
pub fn free_slot(method: &MethodNode) -> Result<u16> {
    let receiver = u16::from(!method.access.is_static());
    let first = (receiver + method.method_type()?.argument_slots()).max(1);

    let mut used: HashSet<u32> = HashSet::new();
    if let Some(code) = method.code() {
        for local in &code.local_variables {
            let size = Type::parse(&local.desc)?.size();
            for offset in 0..u32::from(size.max(1)) {
                used.insert(u32::from(local.index) + offset);
            }
        }
        for insn in &code.instructions {
            match insn {
                Insn::Var { opcode, var } => {
                    used.insert(u32::from(*var));
                    if matches!(*opcode, LLOAD | DLOAD | LSTORE | DSTORE) {
                        used.insert(u32::from(*var) + 1);
                    }
                }
                Insn::Iinc { var, .. } => {
                    used.insert(u32::from(*var));
                }
                _ => {}
            }
        }
    }

    (u32::from(first)..=u32::from(u16::MAX))
        .find(|slot| !used.contains(slot))
        .and_then(|slot| u16::try_from(slot).ok())
        .ok_or_else(|| {
            Error::NotSupported(format!("{} has no free local slot", method.name))
        })
}

/// Declare a new local of type `desc`, live between `start` and `end`, and return its slot.
///
/// The local gets a name no other local of the method uses.
///
/// # Errors
/// Returns [`Error::Malformed`] if the method has no code, see also [`free_slot`] and
/// [`unique_name`].
pub(crate) fn declare_local(
    method: &mut MethodNode,
    desc: &str,
    signature: Option<String>,
    start: LabelId,
    end: LabelId,
) -> Result<u16> {
    let index = free_slot(method)?;
    let name = {
        let Some(code) = method.code() else {
            return Err(malformed_error!("Method {} has no code", method.name));
        };
        unique_name(code.local_variables.iter().map(|local| local.name.as_str()))?
    };
    let Some(code) = method.code_mut() else {
        return Err(malformed_error!("Method {} has no code", method.name));
    };
    code.local_variables.push(LocalVariableNode {
        name,
        desc: desc.to_string(),
        signature,
        start,
        end,
        index,
    });
    Ok(index)
}
