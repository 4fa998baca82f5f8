//! Instruction snippets shared by the generated members.

use crate::{
    classfile::{descriptor::Type, opcodes::*, Insn},
    runtime::abi::Member,
    Error, Result,
};

const OBJECT: &str = "java/lang/Object";

/// Box the primitive on top of the stack.
pub(crate) fn box_primitive(ty: &Type) -> Result<Insn> {
    let Some(class) = ty.box_class().filter(|_| ty.is_primitive()) else {
        return Err(Error::NotSupported(format!("{ty} is not a primitive and cannot be boxed")));
    };
    Ok(Insn::method(
        INVOKESTATIC,
        class,
        "valueOf",
        &format!("({})L{class};", ty.descriptor()),
        false,
    ))
}

/// Turn the `Object` on top of the stack into a value of `ty`: unbox primitives, cast references.
pub(crate) fn from_object(ty: &Type) -> Result<Vec<Insn>> {
    if ty.is_primitive() {
        let (Some(class), Some(method)) = (ty.box_class(), ty.unbox_method()) else {
            return Err(Error::NotSupported(format!("{ty} cannot be unboxed")));
        };
        return Ok(vec![
            Insn::type_insn(CHECKCAST, class),
            Insn::method(
                INVOKEVIRTUAL,
                class,
                method,
                &format!("(){}", ty.descriptor()),
                false,
            ),
        ]);
    }
    Ok(checkcast(ty).into_iter().collect())
}

/// A `checkcast` to `ty`, unless `ty` is a primitive or `Object`.
pub(crate) fn checkcast(ty: &Type) -> Option<Insn> {
    ty.internal_name()
        .filter(|name| name != OBJECT)
        .map(|name| Insn::type_insn(CHECKCAST, &name))
}

/// An invocation of a runtime interface method.
pub(crate) fn invoke_interface(owner: &str, member: Member) -> Insn {
    Insn::method(INVOKEINTERFACE, owner, member.name, member.desc, true)
}

/// An invocation of a runtime constructor.
pub(crate) fn invoke_init(owner: &str, member: Member) -> Insn {
    Insn::method(INVOKESPECIAL, owner, member.name, member.desc, false)
}
