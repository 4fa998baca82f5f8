//! Method accessors.

use std::collections::BTreeSet;

use tracing::trace;

use crate::{
    accessor::{AccessorContract, MethodAccessorSpec},
    classfile::{
        descriptor::MethodType, opcodes::*, AccessFlags, ClassNode, Code, Insn, MethodNode,
    },
    identification::IdentifierKind,
    topology::LoaderRef,
    weaver::{emit::checkcast, ensure_free, is_identified, Weaver},
    Error, Result,
};

impl Weaver<'_> {
    pub(super) fn weave_method_accessors(
        &self,
        loader: &LoaderRef,
        contract: &AccessorContract,
        class: &mut ClassNode,
    ) -> Result<()> {
        for accessor in contract.method_accessors() {
            let member = &accessor.member;
            let owner = member.display_name(contract.name());
            ensure_free(class, &owner, |m| m.name == member.name)?;

            let target = find_target(accessor, loader, class, &owner)?;
            let target_type = target.method_type()?;
            let accessor_type = MethodType::parse(&member.descriptor)?;
            if !self.compatible(loader, &target_type, &accessor_type)? {
                return Err(Error::IncompatibleType {
                    owner,
                    expected: target.desc.clone(),
                    actual: member.descriptor.clone(),
                });
            }

            let declared: BTreeSet<&str> = member.exceptions.iter().map(String::as_str).collect();
            let thrown: BTreeSet<&str> = target.exceptions.iter().map(String::as_str).collect();
            if declared != thrown {
                return Err(Error::ExceptionsMismatch {
                    owner,
                    expected: format!("{thrown:?}"),
                    actual: format!("{declared:?}"),
                });
            }

            let proxy = proxy_method(class, target, &accessor_type, &target_type, accessor)?;
            trace!(class = %class.name, accessor = %owner, target = %target.name, "method accessor");
            class.methods.push(proxy);
        }
        Ok(())
    }

    /// The target's return type must flow into the accessor's, and every target parameter into
    /// the accessor's parameter at the same position.
    fn compatible(
        &self,
        loader: &LoaderRef,
        target: &MethodType,
        accessor: &MethodType,
    ) -> Result<bool> {
        if target.params.len() != accessor.params.len() {
            return Ok(false);
        }
        let checker = &self.ctx.checker;
        if !checker.is_assignable(loader, &target.ret, &accessor.ret)? {
            return Ok(false);
        }
        for (target_param, accessor_param) in target.params.iter().zip(&accessor.params) {
            if !checker.is_assignable(loader, target_param, accessor_param)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn find_target<'c>(
    accessor: &MethodAccessorSpec,
    loader: &LoaderRef,
    class: &'c ClassNode,
    owner: &str,
) -> Result<&'c MethodNode> {
    let mut found = None;
    for method in &class.methods {
        let identified = is_identified(accessor, loader, &class.name, &method.name, &method.desc, || {
            accessor.identifier.identifies(method)
        });
        if !identified {
            continue;
        }
        if found.replace(method).is_some() {
            return Err(Error::MultipleMatches {
                owner: owner.to_string(),
                target: class.name.clone(),
                kind: IdentifierKind::Method,
                id: accessor.identifier_id.clone(),
            });
        }
    }
    found.ok_or_else(|| Error::NotFound {
        owner: owner.to_string(),
        target: class.name.clone(),
        kind: IdentifierKind::Method,
        id: accessor.identifier_id.clone(),
    })
}

/// A public method forwarding its arguments to `target` and returning its result.
fn proxy_method(
    class: &ClassNode,
    target: &MethodNode,
    accessor_type: &MethodType,
    target_type: &MethodType,
    accessor: &MethodAccessorSpec,
) -> Result<MethodNode> {
    let is_static = target.access.is_static();
    let mut insns = Vec::with_capacity(accessor_type.params.len() + 3);
    if !is_static {
        insns.push(Insn::var(ALOAD, 0));
    }
    let mut slot = 1;
    for (param, target_param) in accessor_type.params.iter().zip(&target_type.params) {
        insns.push(Insn::var(param.load_opcode(), slot));
        if param != target_param {
            insns.extend(checkcast(target_param));
        }
        slot += param.size();
    }

    let interface = class.is_interface();
    let opcode = if is_static {
        INVOKESTATIC
    } else if target.access.contains(AccessFlags::PRIVATE) {
        INVOKESPECIAL
    } else if interface {
        INVOKEINTERFACE
    } else {
        INVOKEVIRTUAL
    };
    insns.push(Insn::method(opcode, &class.name, &target.name, &target.desc, interface));
    insns.push(Insn::Simple(accessor_type.ret.return_opcode()));

    let member = &accessor.member;
    let mut method = MethodNode::new(AccessFlags::PUBLIC, &member.name, &member.descriptor);
    method.signature.clone_from(&member.signature);
    method.exceptions.clone_from(&target.exceptions);
    method.set_code(Code {
        instructions: insns.into_iter().collect(),
        ..Code::default()
    });
    Ok(method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        accessor::{ContractDescriptor, MemberDescriptor},
        config::WeaverConfig,
        identification::{
            ClassIdentifier, ElementDescription, MapperRegistryBuilder, MethodIdentifier,
            SearchPurpose,
        },
        test::{class, loader_with, method},
        weaver::{
            tests::{registry, target, topology},
            WeaveContext,
        },
    };

    fn mappers() -> MapperRegistryBuilder {
        let mut mappers = MapperRegistryBuilder::new();
        mappers.register_method_mapper("methods", |id: &str, _: SearchPurpose| match id {
            "compute" => Some(MethodIdentifier::descriptions([ElementDescription::new(
                "compute",
                "(Lt/Part;J)I",
            )])),
            "any" => Some(MethodIdentifier::matching(|m| m.name.starts_with("run"))),
            _ => None,
        });
        mappers.register_class_mapper("part", |id: &str, _: SearchPurpose| {
            (id == "part").then(|| ClassIdentifier::names(["t/Part"]))
        });
        mappers
    }

    fn target_with(methods: Vec<MethodNode>) -> ClassNode {
        let mut node = target();
        node.methods.extend(methods);
        node
    }

    fn compute(access: AccessFlags, exceptions: &[&str]) -> MethodNode {
        let mut node = method(
            access,
            "compute",
            "(Lt/Part;J)I",
            vec![Insn::Simple(ICONST_0), Insn::Simple(IRETURN)],
        );
        node.exceptions = exceptions.iter().map(|e| (*e).to_string()).collect();
        node
    }

    fn weave(members: Vec<MemberDescriptor>, target: &mut ClassNode) -> Result<bool> {
        let mut contract = ContractDescriptor::builder("c/Target", "target");
        for member in members {
            contract = contract.member(member);
        }
        let part = ContractDescriptor::builder("c/Part", "part");
        let accessors = registry(mappers(), vec![contract, part]);
        let topology = topology();
        let config = WeaverConfig::default();
        let weaver = Weaver::new(WeaveContext::new(&accessors, &topology, &config));
        let loader = loader_with("app", &[&class("t/Part", "java/lang/Object")]);
        weaver.weave(&loader, target)
    }

    #[test]
    fn test_proxy_casts_contract_arguments() {
        let accessor = MemberDescriptor::method_accessor("callCompute", "(Lc/Part;J)I", "compute")
            .with_exceptions(&["java/io/IOException"]);
        let mut class = target_with(vec![compute(AccessFlags::PUBLIC, &["java/io/IOException"])]);

        assert!(weave(vec![accessor], &mut class).unwrap());
        let proxy = class.method("callCompute", "(Lc/Part;J)I").unwrap();
        assert_eq!(proxy.exceptions, vec!["java/io/IOException"]);
        let insns: Vec<Insn> = proxy.code().unwrap().instructions.iter().cloned().collect();
        assert_eq!(
            insns,
            vec![
                Insn::var(ALOAD, 0),
                Insn::var(ALOAD, 1),
                Insn::type_insn(CHECKCAST, "t/Part"),
                Insn::var(LLOAD, 2),
                Insn::method(INVOKEVIRTUAL, "t/Target", "compute", "(Lt/Part;J)I", false),
                Insn::Simple(IRETURN),
            ]
        );
    }

    #[test]
    fn test_private_and_static_targets() {
        let accessor = MemberDescriptor::method_accessor("callCompute", "(Lt/Part;J)I", "compute");
        let mut class = target_with(vec![compute(AccessFlags::PRIVATE, &[])]);
        weave(vec![accessor.clone()], &mut class).unwrap();
        let proxy = class.method("callCompute", "(Lt/Part;J)I").unwrap();
        let code = proxy.code().unwrap();
        assert!(matches!(
            code.instructions.get(3),
            Some(Insn::Method { opcode: INVOKESPECIAL, .. })
        ));

        let mut class = target_with(vec![compute(AccessFlags::PUBLIC | AccessFlags::STATIC, &[])]);
        weave(vec![accessor], &mut class).unwrap();
        let proxy = class.method("callCompute", "(Lt/Part;J)I").unwrap();
        let code = proxy.code().unwrap();
        assert_eq!(code.instructions.get(0), Some(&Insn::var(ALOAD, 1)));
        assert!(matches!(
            code.instructions.get(2),
            Some(Insn::Method { opcode: INVOKESTATIC, .. })
        ));
    }

    #[test]
    fn test_accessor_checks() {
        let accessor = MemberDescriptor::method_accessor("callCompute", "(Lt/Part;J)I", "compute");
        let mut class = target_with(vec![compute(AccessFlags::PUBLIC, &["java/io/IOException"])]);
        assert!(matches!(
            weave(vec![accessor.clone()], &mut class),
            Err(Error::ExceptionsMismatch { .. })
        ));

        let narrowed = MemberDescriptor::method_accessor("callCompute", "(Lt/Part;I)I", "compute");
        let mut class = target_with(vec![compute(AccessFlags::PUBLIC, &[])]);
        assert!(matches!(
            weave(vec![narrowed], &mut class),
            Err(Error::IncompatibleType { .. })
        ));

        let mut class = target_with(vec![compute(AccessFlags::PUBLIC, &[])]);
        class.methods.push(method(AccessFlags::PUBLIC, "callCompute", "()V", vec![Insn::Simple(RETURN)]));
        assert!(matches!(
            weave(vec![accessor], &mut class),
            Err(Error::AccessorTaken(_))
        ));

        let ambiguous = MemberDescriptor::method_accessor("callRun", "()V", "any");
        let mut class = target_with(vec![
            method(AccessFlags::PUBLIC, "runA", "()V", vec![Insn::Simple(RETURN)]),
            method(AccessFlags::PUBLIC, "runB", "()V", vec![Insn::Simple(RETURN)]),
        ]);
        assert!(matches!(
            weave(vec![ambiguous], &mut class),
            Err(Error::MultipleMatches { .. })
        ));
    }
}
