//! Interceptor call sites.
//!
//! Every interceptor of the class is located first, against the unmodified methods: target
//! method, entry, exits, imported locals, the context signature and the operand stack at each
//! exit. Only when all of them resolve are the call sites inserted, one batch per method.
//!
//! The inserted code at the entry reads:
//!
//! ```text
//! aload_0
//! <parameters, the context as new InterceptorContextImpl(locals)>
//! invokeinterface Contract.interceptor
//! if (ctx.isReturning()) return (T) ctx.getReturn();
//! <imported locals stored back from ctx.getLocalVariables()>
//! if (ctx.isExiting()) switch (ctx.getExit()) { case i: goto exit_i; default: throw }
//! ```

use tracing::{debug, trace};

use crate::{
    accessor::{AccessorContract, MethodInterceptorSpec},
    analysis::{Analyzer, BasicInterpreter},
    classfile::{descriptor::Type, opcodes::*, ClassNode, Insn, LabelId, MethodNode},
    identification::IdentifierKind,
    runtime::abi::{context, context_impl, invalid_exit},
    signature::{parse_signature, TypeSymbol},
    topology::LoaderRef,
    weaver::{
        emit::{from_object, invoke_init, invoke_interface},
        locals::declare_local,
        Weaver,
    },
    Error, Result,
};

const OBJECT_ARRAY: &str = "[Ljava/lang/Object;";

/// A local of the target method passed to an interceptor parameter.
#[derive(Debug)]
struct ImportedSlot {
    parameter: usize,
    slot: u16,
    local_type: Type,
}

/// An interceptor whose insertion points are known.
struct LocatedInterceptor<'c> {
    contract: &'c AccessorContract,
    spec: &'c MethodInterceptorSpec,
    method: usize,
    entry: usize,
    exits: Vec<usize>,
    imports: Vec<ImportedSlot>,
}

impl<'a> Weaver<'a> {
    pub(super) fn weave_interceptors(
        &self,
        loader: &LoaderRef,
        contracts: &[&'a AccessorContract],
        class: &mut ClassNode,
    ) -> Result<()> {
        let mut located = Vec::new();
        for contract in contracts {
            for spec in contract.interceptors() {
                located.push(self.locate(loader, contract, spec, class)?);
            }
        }

        let mut methods: Vec<usize> = located.iter().map(|l| l.method).collect();
        methods.sort_unstable();
        methods.dedup();
        for index in methods {
            let batch: Vec<&LocatedInterceptor<'_>> =
                located.iter().filter(|l| l.method == index).collect();
            let Some(method) = class.methods.get_mut(index) else {
                continue;
            };
            let mut groups = Vec::new();
            for interceptor in batch {
                groups.extend(emit(method, interceptor)?);
                trace!(
                    class = %class.name,
                    method = %method.name,
                    interceptor = %interceptor.spec.display_name(),
                    entry = interceptor.entry,
                    "interceptor"
                );
            }
            let Some(code) = method.code_mut() else {
                return Err(malformed_error!("Method {} has no code", method.name));
            };
            code.instructions.insert_all(groups);
        }
        Ok(())
    }

    fn locate<'c>(
        &self,
        loader: &LoaderRef,
        contract: &'c AccessorContract,
        spec: &'c MethodInterceptorSpec,
        class: &ClassNode,
    ) -> Result<LocatedInterceptor<'c>> {
        let owner = spec.display_name();
        let mut found = None;
        for (index, method) in class.methods.iter().enumerate() {
            if !spec.method_identifier.identifies(method) {
                continue;
            }
            if found.replace(index).is_some() {
                return Err(Error::MultipleMatches {
                    owner,
                    target: class.name.clone(),
                    kind: IdentifierKind::Method,
                    id: spec.method_identifier_id.clone(),
                });
            }
        }
        let Some((index, method)) = found.and_then(|i| class.methods.get(i).map(|m| (i, m))) else {
            return Err(Error::NotFound {
                owner,
                target: class.name.clone(),
                kind: IdentifierKind::Method,
                id: spec.method_identifier_id.clone(),
            });
        };

        let target = method.display_name(&class.name);
        if method.access.is_static() {
            return Err(Error::NotSupported(format!(
                "{owner} intercepts the static method {target}"
            )));
        }
        let Some(code) = method.code() else {
            return Err(Error::NotSupported(format!(
                "{owner} intercepts {target}, which has no code"
            )));
        };
        let size = code.instructions.len();

        let Some(entry) = spec.entry_identifier.identify(method) else {
            return Err(Error::NotFound {
                owner,
                target,
                kind: IdentifierKind::Instruction,
                id: spec.entry_identifier_id.clone(),
            });
        };
        if entry >= size {
            return Err(Error::InstructionOutOfBounds {
                owner,
                method: target,
                id: spec.entry_identifier_id.clone(),
                index: entry,
                min: 0,
                max: size.saturating_sub(1),
            });
        }

        let mut exits = Vec::with_capacity(spec.exit_identifiers.len());
        for (id, identifier) in spec.exit_identifier_ids.iter().zip(&spec.exit_identifiers) {
            let Some(exit) = identifier.identify(method) else {
                return Err(Error::NotFound {
                    owner,
                    target,
                    kind: IdentifierKind::Instruction,
                    id: id.clone(),
                });
            };
            if exit <= entry || exit >= size {
                return Err(Error::InstructionOutOfBounds {
                    owner,
                    method: target,
                    id: id.clone(),
                    index: exit,
                    min: entry + 1,
                    max: size.saturating_sub(1),
                });
            }
            exits.push(exit);
        }

        if spec.check_signature {
            if let (Some(target_signature), Some(interceptor_signature)) =
                (&method.signature, &spec.member.signature)
            {
                self.ctx.checker.check_return_signature(
                    loader,
                    &class.name,
                    &parse_signature(target_signature)?,
                    contract.name(),
                    &parse_signature(interceptor_signature)?,
                    &spec.context_type,
                )?;
            }
        }

        let imports = self.import_locals(loader, spec, method, &owner)?;

        if !exits.is_empty() {
            verify_exit_stacks(&class.name, method, spec, &exits)?;
        }

        debug!(interceptor = %owner, %target, entry, exits = exits.len(), "located interceptor");
        Ok(LocatedInterceptor {
            contract,
            spec,
            method: index,
            entry,
            exits,
            imports,
        })
    }

    /// Resolve the imported locals. A parameter must have the local's exact type, or be a
    /// contract the local's type satisfies.
    fn import_locals(
        &self,
        loader: &LoaderRef,
        spec: &MethodInterceptorSpec,
        method: &MethodNode,
        owner: &str,
    ) -> Result<Vec<ImportedSlot>> {
        let params = spec.method_type()?.params;
        let Some(code) = method.code() else {
            return Ok(Vec::new());
        };

        let mut imports = Vec::with_capacity(spec.locals.len());
        for local in &spec.locals {
            let Some(variable) = local.identifier.identify(method).and_then(|slot| {
                code.local_variables
                    .iter()
                    .rev()
                    .find(|variable| usize::from(variable.index) == slot)
            }) else {
                return Err(Error::LocalVariableNotFound {
                    owner: owner.to_string(),
                    parameter: local.parameter,
                    id: local.identifier_id.clone(),
                });
            };

            let local_type = Type::parse(&variable.desc)?;
            let Some(param_type) = params.get(local.parameter) else {
                return Err(malformed_error!(
                    "{} has no parameter {}",
                    owner,
                    local.parameter
                ));
            };
            let through_contract = param_type
                .internal_name()
                .is_some_and(|name| self.ctx.accessors.is_contract(&name));
            let compatible = if through_contract {
                self.ctx.checker.is_assignable(loader, &local_type, param_type)?
            } else {
                local_type == *param_type
            };
            if !compatible {
                return Err(Error::IncompatibleType {
                    owner: format!("{owner} parameter {}", local.parameter),
                    expected: local_type.to_string(),
                    actual: param_type.to_string(),
                });
            }

            imports.push(ImportedSlot {
                parameter: local.parameter,
                slot: variable.index,
                local_type,
            });
        }
        Ok(imports)
    }
}

/// Exits are branch targets of the inserted code, so the operand stack must be empty there.
fn verify_exit_stacks(
    class: &str,
    method: &MethodNode,
    spec: &MethodInterceptorSpec,
    exits: &[usize],
) -> Result<()> {
    let analysis = Analyzer::new(BasicInterpreter).analyze(class, method)?;
    for (id, exit) in spec.exit_identifier_ids.iter().zip(exits) {
        let stack = match analysis.frames.get(*exit) {
            Some(Some(frame)) if frame.stack().is_empty() => continue,
            Some(Some(frame)) => format!("{:?}", frame.stack()),
            _ => "unreachable".to_string(),
        };
        return Err(Error::InvalidExitTarget {
            method: method.display_name(class),
            id: id.clone(),
            index: *exit,
            stack,
        });
    }
    Ok(())
}

fn new_label(method: &mut MethodNode) -> Result<LabelId> {
    match method.code_mut() {
        Some(code) => Ok(code.instructions.new_label()),
        None => Err(malformed_error!("Method {} has no code", method.name)),
    }
}

/// Build the insertion groups of one interceptor and declare its locals in `method`.
///
/// Indices refer to the method as it was located.
fn emit(
    method: &mut MethodNode,
    interceptor: &LocatedInterceptor<'_>,
) -> Result<Vec<(usize, Vec<Insn>)>> {
    let spec = interceptor.spec;
    let target_return = method.method_type()?.ret;
    let interceptor_type = spec.method_type()?;

    let scope_start = new_label(method)?;
    let scope_end = new_label(method)?;
    let skip_return = new_label(method)?;
    let context_signature = TypeSymbol::Class(spec.context_type.clone()).to_signature_string();
    let ctx = declare_local(
        method,
        context::DESCRIPTOR,
        Some(context_signature),
        scope_start,
        scope_end,
    )?;

    let mut insns = vec![Insn::Label(scope_start), Insn::var(ALOAD, 0)];
    for (index, param) in interceptor_type.params.iter().enumerate() {
        if index == spec.context_parameter {
            let locals = i32::try_from(interceptor.imports.len())
                .map_err(|_| malformed_error!("Too many imported locals"))?;
            insns.extend([
                Insn::type_insn(NEW, context_impl::NAME),
                Insn::Simple(DUP),
                Insn::Simple(DUP),
                Insn::push_int(locals),
                invoke_init(context_impl::NAME, context_impl::INIT),
                Insn::var(ASTORE, ctx),
            ]);
            continue;
        }
        let Some(import) = interceptor.imports.iter().find(|i| i.parameter == index) else {
            return Err(malformed_error!(
                "Parameter {} of {} is not imported",
                index,
                spec.display_name()
            ));
        };
        insns.push(Insn::var(param.load_opcode(), import.slot));
    }
    insns.push(Insn::method(
        INVOKEINTERFACE,
        interceptor.contract.name(),
        &spec.member.name,
        &spec.member.descriptor,
        true,
    ));

    insns.extend([
        Insn::var(ALOAD, ctx),
        invoke_interface(context::NAME, context::IS_RETURNING),
        Insn::Jump {
            opcode: IFEQ,
            target: skip_return,
        },
    ]);
    if target_return != Type::Void {
        insns.push(Insn::var(ALOAD, ctx));
        insns.push(invoke_interface(context::NAME, context::GET_RETURN));
        insns.extend(from_object(&target_return)?);
    }
    insns.push(Insn::Simple(target_return.return_opcode()));
    insns.push(Insn::Label(skip_return));

    if !interceptor.imports.is_empty() {
        let locals_start = new_label(method)?;
        let locals_end = new_label(method)?;
        let array = declare_local(method, OBJECT_ARRAY, None, locals_start, locals_end)?;
        insns.extend([
            Insn::Label(locals_start),
            Insn::var(ALOAD, ctx),
            invoke_interface(context::NAME, context::GET_LOCAL_VARIABLES),
            Insn::var(ASTORE, array),
        ]);
        for (position, import) in interceptor.imports.iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|_| malformed_error!("Too many imported locals"))?;
            insns.extend([
                Insn::var(ALOAD, array),
                Insn::push_int(position),
                Insn::Simple(AALOAD),
            ]);
            insns.extend(from_object(&import.local_type)?);
            insns.push(Insn::var(import.local_type.store_opcode(), import.slot));
        }
        insns.push(Insn::Label(locals_end));
    }

    let mut groups = Vec::with_capacity(interceptor.exits.len() + 1);
    if !interceptor.exits.is_empty() {
        let skip_exit = new_label(method)?;
        let invalid = new_label(method)?;
        let mut targets = Vec::with_capacity(interceptor.exits.len());
        for exit in &interceptor.exits {
            let label = new_label(method)?;
            targets.push(label);
            groups.push((*exit, vec![Insn::Label(label)]));
        }
        let max = i32::try_from(targets.len() - 1)
            .map_err(|_| malformed_error!("Too many exits"))?;
        insns.extend([
            Insn::var(ALOAD, ctx),
            invoke_interface(context::NAME, context::IS_EXITING),
            Insn::Jump {
                opcode: IFEQ,
                target: skip_exit,
            },
            Insn::var(ALOAD, ctx),
            invoke_interface(context::NAME, context::GET_EXIT),
            Insn::TableSwitch {
                min: 0,
                max,
                default: invalid,
                targets,
            },
            Insn::Label(invalid),
            Insn::type_insn(NEW, invalid_exit::NAME),
            Insn::Simple(DUP),
            Insn::var(ALOAD, ctx),
            invoke_interface(context::NAME, context::GET_EXIT),
            invoke_init(invalid_exit::NAME, invalid_exit::INIT),
            Insn::Simple(ATHROW),
            Insn::Label(skip_exit),
        ]);
    }
    insns.push(Insn::Label(scope_end));

    groups.insert(0, (interceptor.entry, insns));
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        accessor::{ContractDescriptor, MemberDescriptor},
        analysis::ObjectHierarchy,
        classfile::{
            AccessFlags, ClassReader, ClassWriter, Code, InsnList, LocalVariableNode, ReaderFlags,
        },
        config::WeaverConfig,
        identification::{
            builtin, ElementDescription, MapperRegistryBuilder, MethodIdentifier, SearchPurpose,
        },
        weaver::{
            tests::{loader, registry, target, topology},
            WeaveContext,
        },
    };

    const CTX: &str = "Lclassweave/runtime/v1/InterceptorContext";

    fn mappers() -> MapperRegistryBuilder {
        let mut mappers = MapperRegistryBuilder::new();
        mappers.register_method_mapper("methods", |id: &str, _: SearchPurpose| match id {
            "run" => Some(MethodIdentifier::descriptions([ElementDescription::new("run", "(I)I")])),
            "sum" => Some(MethodIdentifier::descriptions([ElementDescription::new("sum", "()V")])),
            _ => None,
        });
        mappers.register_instruction_mapper("insns", |id: &str, _: SearchPurpose| match id {
            "first" => Some(builtin::by_index(0, false)),
            "return" => Some(builtin::first_return(0)),
            "second" => Some(builtin::by_index(2, false)),
            "value" => Some(builtin::local_by_name(vec!["value".into()])),
            "missing" => Some(builtin::local_by_name(vec!["nope".into()])),
            "far" => Some(builtin::by_index(100, false)),
            _ => None,
        });
        mappers
    }

    /// `int run(int value) { return value; }` with a local-variable table.
    fn run_method() -> MethodNode {
        let mut method = MethodNode::new(AccessFlags::PUBLIC, "run", "(I)I");
        let instructions: InsnList = vec![
            Insn::Label(LabelId(0)),
            Insn::var(ILOAD, 1),
            Insn::Simple(IRETURN),
            Insn::Label(LabelId(1)),
        ]
        .into_iter()
        .collect();
        method.set_code(Code {
            instructions,
            local_variables: vec![LocalVariableNode {
                name: "value".into(),
                desc: "I".into(),
                signature: None,
                start: LabelId(0),
                end: LabelId(1),
                index: 1,
            }],
            ..Code::default()
        });
        method
    }

    fn interceptor(entry: &str, exits: &[&str]) -> MemberDescriptor {
        MemberDescriptor::interceptor("onRun", &format!("({CTX};I)V"), "run", entry)
            .with_signature(&format!("({CTX}<Ljava/lang/Integer;>;I)V"))
            .with_exits(exits)
            .with_local(1, "value")
    }

    fn weave(member: MemberDescriptor, class: &mut ClassNode) -> Result<bool> {
        let contract = ContractDescriptor::builder("c/Hook", "target").member(member);
        let accessors = registry(mappers(), vec![contract]);
        let topology = topology();
        let config = WeaverConfig::default();
        let weaver = Weaver::new(WeaveContext::new(&accessors, &topology, &config));
        weaver.weave(&loader(), class)
    }

    fn target_with_run() -> ClassNode {
        let mut class = target();
        class.methods.push(run_method());
        class
    }

    #[test]
    fn test_interceptor_before_first_return() {
        let mut class = target_with_run();
        assert!(weave(interceptor("return", &[]), &mut class).unwrap());

        let run = class.method("run", "(I)I").unwrap();
        let code = run.code().unwrap();
        let insns = code.instructions.as_slice();
        assert_eq!(insns[0], Insn::Label(LabelId(0)));
        assert_eq!(insns[1], Insn::var(ILOAD, 1));
        assert_eq!(insns[3], Insn::var(ALOAD, 0));
        assert_eq!(insns[4], Insn::type_insn(NEW, context_impl::NAME));
        assert_eq!(insns[7], Insn::push_int(1));
        assert_eq!(insns[9], Insn::var(ASTORE, 2));
        assert_eq!(insns[10], Insn::var(ILOAD, 1));
        assert_eq!(
            insns[11],
            Insn::method(INVOKEINTERFACE, "c/Hook", "onRun", &format!("({CTX};I)V"), true)
        );
        assert!(insns.contains(&Insn::method(
            INVOKEVIRTUAL,
            "java/lang/Integer",
            "intValue",
            "()I",
            false
        )));
        assert!(insns.contains(&Insn::var(ISTORE, 1)));
        assert_eq!(insns[insns.len() - 2], Insn::Simple(IRETURN));

        let context = code.local_variables.iter().find(|l| l.index == 2).unwrap();
        assert_eq!(context.desc, context::DESCRIPTOR);
        assert_eq!(
            context.signature.as_deref(),
            Some("Lclassweave/runtime/v1/InterceptorContext<Ljava/lang/Integer;>;")
        );
        assert!(code.local_variables.iter().any(|l| l.index == 3 && l.desc == OBJECT_ARRAY));

        let bytes = ClassWriter::new(&ObjectHierarchy).write(&class).unwrap();
        let decoded = ClassReader::new(&bytes).read(ReaderFlags::empty()).unwrap();
        assert_eq!(decoded.interfaces, vec!["c/Hook"]);
    }

    #[test]
    fn test_exit_ordering() {
        let mut class = target_with_run();
        assert!(matches!(
            weave(interceptor("return", &["first"]), &mut class),
            Err(Error::InstructionOutOfBounds { min: 3, .. })
        ));

        let mut class = target_with_run();
        assert!(matches!(
            weave(interceptor("first", &["far"]), &mut class),
            Err(Error::InstructionOutOfBounds { index: 100, .. })
        ));

        let mut class = target_with_run();
        assert!(matches!(
            weave(interceptor("far", &[]), &mut class),
            Err(Error::InstructionOutOfBounds { min: 0, max: 3, .. })
        ));
    }

    #[test]
    fn test_exit_requires_empty_stack() {
        let mut class = target_with_run();
        assert!(matches!(
            weave(interceptor("first", &["second"]), &mut class),
            Err(Error::InvalidExitTarget { index: 2, .. })
        ));
    }

    #[test]
    fn test_no_exits_no_switch() {
        let mut class = target_with_run();
        let member = MemberDescriptor::interceptor("onRun", &format!("({CTX};I)V"), "run", "first")
            .with_signature(&format!("({CTX}<Ljava/lang/Integer;>;I)V"))
            .with_local(1, "value");
        assert!(weave(member, &mut class).unwrap());
        let code = class.method("run", "(I)I").unwrap().code().unwrap();
        assert!(!code
            .instructions
            .iter()
            .any(|insn| matches!(insn, Insn::TableSwitch { .. })));
    }

    #[test]
    fn test_missing_local_and_wrong_type() {
        let mut class = target_with_run();
        let member = MemberDescriptor::interceptor("onRun", &format!("({CTX};I)V"), "run", "first")
            .with_signature(&format!("({CTX}<Ljava/lang/Integer;>;I)V"))
            .with_local(1, "missing");
        assert!(matches!(
            weave(member, &mut class),
            Err(Error::LocalVariableNotFound { parameter: 1, .. })
        ));

        let mut class = target_with_run();
        let member = MemberDescriptor::interceptor("onRun", &format!("({CTX};J)V"), "run", "first")
            .with_signature(&format!("({CTX}<Ljava/lang/Integer;>;J)V"))
            .with_local(1, "value");
        assert!(matches!(
            weave(member, &mut class),
            Err(Error::IncompatibleType { .. })
        ));
    }

    #[test]
    fn test_exits_branch_to_labels() {
        let mut class = target();
        let mut sum = MethodNode::new(AccessFlags::PUBLIC, "sum", "()V");
        sum.set_code(Code {
            instructions: vec![
                Insn::Simple(NOP),
                Insn::Simple(NOP),
                Insn::Simple(RETURN),
            ]
            .into_iter()
            .collect(),
            ..Code::default()
        });
        class.methods.push(sum);

        let member = MemberDescriptor::interceptor("onSum", &format!("({CTX};)V"), "sum", "first")
            .with_signature(&format!("({CTX}<Ljava/lang/Void;>;)V"))
            .with_exits(&["return"]);
        assert!(weave(member, &mut class).unwrap());

        let code = class.method("sum", "()V").unwrap().code().unwrap();
        let insns = code.instructions.as_slice();
        let Some(Insn::TableSwitch { min, max, targets, .. }) =
            insns.iter().find(|insn| matches!(insn, Insn::TableSwitch { .. }))
        else {
            panic!("no exit switch");
        };
        assert_eq!((*min, *max), (0, 0));
        let exit = code.instructions.label_index(targets[0]).unwrap();
        assert_eq!(insns[exit + 1], Insn::Simple(RETURN));
        assert!(insns.contains(&Insn::type_insn(NEW, invalid_exit::NAME)));
        assert!(insns.contains(&Insn::Simple(ATHROW)));

        let bytes = ClassWriter::new(&ObjectHierarchy).write(&class).unwrap();
        assert!(ClassReader::new(&bytes).read(ReaderFlags::empty()).is_ok());
    }
}
