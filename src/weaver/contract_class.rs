//! Instrumentation of the contract interfaces themselves.
//!
//! An interceptor body may assign its imported parameters. Before each of its exits the current
//! parameter values are written into the context's local-variable array, from where the woven
//! call site copies them back into the target method's locals.

use tracing::debug;

use crate::{
    accessor::{AccessorContract, MethodInterceptorSpec},
    classfile::{opcodes::*, ClassNode, Insn, MethodNode},
    runtime::abi::context,
    weaver::{emit::box_primitive, emit::invoke_interface, locals::declare_local, Weaver},
    Result,
};

const OBJECT_ARRAY: &str = "[Ljava/lang/Object;";

impl Weaver<'_> {
    pub(super) fn instrument_contract_class(
        &self,
        contract: &AccessorContract,
        class: &mut ClassNode,
    ) -> Result<bool> {
        let mut changed = false;
        for spec in contract.interceptors() {
            if spec.locals.is_empty() {
                continue;
            }
            let member = &spec.member;
            let Some(method) = class
                .methods
                .iter_mut()
                .find(|m| m.name == member.name && m.desc == member.descriptor)
            else {
                continue;
            };
            let sites = export_parameters(method, spec)?;
            debug!(contract = %contract.name(), interceptor = %member.name, sites, "exported parameters");
            changed |= sites > 0;
        }
        Ok(changed)
    }
}

/// Insert the parameter export before every return and `athrow` of `method`. Returns the number
/// of exits instrumented.
fn export_parameters(method: &mut MethodNode, spec: &MethodInterceptorSpec) -> Result<usize> {
    let params = spec.method_type()?.params;
    let mut slots = Vec::with_capacity(params.len());
    let mut slot: u16 = 1;
    for param in &params {
        slots.push(slot);
        slot += param.size();
    }
    let Some(&context_slot) = slots.get(spec.context_parameter) else {
        return Ok(0);
    };

    let exits: Vec<usize> = match method.code() {
        Some(code) => code
            .instructions
            .iter()
            .enumerate()
            .filter(|(_, insn)| {
                matches!(insn, Insn::Simple(op) if is_return(*op) || *op == ATHROW)
            })
            .map(|(index, _)| index)
            .collect(),
        None => return Ok(0),
    };

    if exits.is_empty() {
        return Ok(0);
    }

    // One array local spans the whole body and is reused at every exit.
    let (start, end, len) = match method.code_mut() {
        Some(code) => (
            code.instructions.new_label(),
            code.instructions.new_label(),
            code.instructions.len(),
        ),
        None => return Ok(0),
    };
    let array = declare_local(method, OBJECT_ARRAY, None, start, end)?;

    let mut export = vec![
        Insn::var(ALOAD, context_slot),
        invoke_interface(context::NAME, context::GET_LOCAL_VARIABLES),
        Insn::var(ASTORE, array),
    ];
    for (position, local) in spec.locals.iter().enumerate() {
        let (Some(param), Some(&param_slot)) =
            (params.get(local.parameter), slots.get(local.parameter))
        else {
            continue;
        };
        let position =
            i32::try_from(position).map_err(|_| malformed_error!("Too many imported locals"))?;
        export.extend([
            Insn::var(ALOAD, array),
            Insn::push_int(position),
            Insn::var(param.load_opcode(), param_slot),
        ]);
        if param.is_primitive() {
            export.push(box_primitive(param)?);
        }
        export.push(Insn::Simple(AASTORE));
    }

    let mut groups = Vec::with_capacity(exits.len() + 2);
    groups.push((0, vec![Insn::Label(start)]));
    groups.extend(exits.iter().map(|exit| (*exit, export.clone())));
    groups.push((len, vec![Insn::Label(end)]));

    if let Some(code) = method.code_mut() {
        code.instructions.insert_all(groups);
    }
    Ok(exits.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        accessor::{ContractDescriptor, MemberDescriptor},
        classfile::{AccessFlags, LabelId},
        config::WeaverConfig,
        identification::{
            builtin, ElementDescription, MapperRegistryBuilder, MethodIdentifier, SearchPurpose,
        },
        test::{interface, method},
        weaver::{
            tests::{loader, registry, topology},
            WeaveContext,
        },
    };

    const CTX: &str = "Lclassweave/runtime/v1/InterceptorContext";

    fn mappers() -> MapperRegistryBuilder {
        let mut mappers = MapperRegistryBuilder::new();
        mappers.register_method_mapper("methods", |id: &str, _: SearchPurpose| {
            (id == "run").then(|| MethodIdentifier::descriptions([ElementDescription::new("run", "(J)V")]))
        });
        mappers.register_instruction_mapper("insns", |id: &str, _: SearchPurpose| match id {
            "first" => Some(builtin::by_index(0, false)),
            "total" => Some(builtin::local_by_name(vec!["total".into()])),
            _ => None,
        });
        mappers
    }

    fn weave(member: MemberDescriptor, class: &mut ClassNode) -> Result<bool> {
        let contract = ContractDescriptor::builder("c/Hook", "target").member(member);
        let accessors = registry(mappers(), vec![contract]);
        let topology = topology();
        let config = WeaverConfig::default();
        let weaver = Weaver::new(WeaveContext::new(&accessors, &topology, &config));
        weaver.weave(&loader(), class)
    }

    fn hook(body: Vec<Insn>) -> ClassNode {
        let mut node = interface("c/Hook", &[]);
        node.methods.push(method(
            AccessFlags::PUBLIC,
            "onRun",
            &format!("(J{CTX};)V"),
            body,
        ));
        node
    }

    fn member() -> MemberDescriptor {
        MemberDescriptor::interceptor("onRun", &format!("(J{CTX};)V"), "run", "first")
            .with_signature(&format!("(J{CTX}<Ljava/lang/Void;>;)V"))
            .with_local(0, "total")
    }

    #[test]
    fn test_parameters_exported_before_each_exit() {
        let mut class = hook(vec![
            Insn::var(LLOAD, 1),
            Insn::Simple(LCONST_0),
            Insn::Simple(LCMP),
            Insn::Jump {
                opcode: IFNE,
                target: LabelId(0),
            },
            Insn::Simple(RETURN),
            Insn::Label(LabelId(0)),
            Insn::Simple(ACONST_NULL),
            Insn::Simple(ATHROW),
        ]);

        assert!(weave(member(), &mut class).unwrap());
        let code = class.methods[0].code().unwrap();
        let insns = code.instructions.as_slice();
        let boxes = insns
            .iter()
            .filter(|insn| {
                **insn == Insn::method(INVOKESTATIC, "java/lang/Long", "valueOf", "(J)Ljava/lang/Long;", false)
            })
            .count();
        assert_eq!(boxes, 2);

        let ret = insns.iter().position(|i| *i == Insn::Simple(RETURN)).unwrap();
        let export = [
            Insn::var(ALOAD, 3),
            invoke_interface(context::NAME, context::GET_LOCAL_VARIABLES),
            Insn::var(ASTORE, 4),
            Insn::var(ALOAD, 4),
            Insn::push_int(0),
            Insn::var(LLOAD, 1),
            Insn::method(INVOKESTATIC, "java/lang/Long", "valueOf", "(J)Ljava/lang/Long;", false),
            Insn::Simple(AASTORE),
        ];
        assert_eq!(&insns[ret - 8..ret], &export);
        let throw = insns.iter().position(|i| *i == Insn::Simple(ATHROW)).unwrap();
        assert_eq!(&insns[throw - 8..throw], &export);

        assert_eq!(code.local_variables.len(), 1);
        let array = &code.local_variables[0];
        assert_eq!(array.desc, OBJECT_ARRAY);
        assert_eq!(array.index, 4);
        assert_eq!(insns.first(), Some(&Insn::Label(array.start)));
        assert_eq!(insns.last(), Some(&Insn::Label(array.end)));
    }

    #[test]
    fn test_interceptor_without_imports_is_untouched() {
        let member = MemberDescriptor::interceptor("onRun", &format!("({CTX};)V"), "run", "first")
            .with_signature(&format!("({CTX}<Ljava/lang/Void;>;)V"));
        let mut class = interface("c/Hook", &[]);
        class.methods.push(method(
            AccessFlags::PUBLIC,
            "onRun",
            &format!("({CTX};)V"),
            vec![Insn::Simple(RETURN)],
        ));
        assert!(!weave(member, &mut class).unwrap());
        assert_eq!(class.methods[0].code().unwrap().instructions.len(), 1);
    }
}
