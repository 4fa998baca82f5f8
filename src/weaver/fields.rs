//! Field accessors and field generators.

use tracing::trace;

use crate::{
    accessor::{AccessorContract, MemberDescriptor},
    classfile::{
        descriptor::{MethodType, Type},
        opcodes::*,
        AccessFlags, ClassNode, Code, FieldNode, Insn, MethodNode,
    },
    identification::IdentifierKind,
    topology::LoaderRef,
    weaver::{emit::checkcast, ensure_free, is_identified, Weaver},
    Error, Result,
};

/// The field an accessor reads or writes.
struct AccessedField {
    owner: String,
    name: String,
    field_type: Type,
    is_static: bool,
}

impl AccessedField {
    fn of(class: &ClassNode, field: &FieldNode) -> Result<Self> {
        Ok(AccessedField {
            owner: class.name.clone(),
            name: field.name.clone(),
            field_type: field.field_type()?,
            is_static: field.access.is_static(),
        })
    }

    fn insn(&self, instance: u8, stat: u8) -> Insn {
        let opcode = if self.is_static { stat } else { instance };
        Insn::field(opcode, &self.owner, &self.name, &self.field_type.descriptor())
    }
}

impl Weaver<'_> {
    pub(super) fn weave_field_accessors(
        &self,
        loader: &LoaderRef,
        contract: &AccessorContract,
        class: &mut ClassNode,
    ) -> Result<()> {
        for accessor in contract.field_accessors() {
            let member = &accessor.member;
            let owner = member.display_name(contract.name());
            ensure_free(class, &owner, |m| {
                m.name == member.name && m.desc == member.descriptor
            })?;

            let mut found = None;
            for field in &class.fields {
                let identified = is_identified(accessor, loader, &class.name, &field.name, &field.desc, || {
                    accessor.identifier.identifies(field)
                });
                if !identified {
                    continue;
                }
                if found.is_some() {
                    return Err(Error::MultipleMatches {
                        owner,
                        target: class.name.clone(),
                        kind: IdentifierKind::Field,
                        id: accessor.identifier_id.clone(),
                    });
                }
                found = Some(AccessedField::of(class, field)?);
            }
            let Some(field) = found else {
                return Err(Error::NotFound {
                    owner,
                    target: class.name.clone(),
                    kind: IdentifierKind::Field,
                    id: accessor.identifier_id.clone(),
                });
            };

            let value_type = accessor.value_type()?;
            if !self
                .ctx
                .checker
                .is_assignable(loader, &field.field_type, &value_type)?
            {
                return Err(Error::IncompatibleType {
                    owner,
                    expected: field.field_type.to_string(),
                    actual: value_type.to_string(),
                });
            }

            let method = accessor_method(contract.name(), member, accessor.setter, &field)?;
            trace!(class = %class.name, accessor = %owner, field = %field.name, "field accessor");
            class.methods.push(method);
        }
        Ok(())
    }

    pub(super) fn weave_field_generators(
        &self,
        loader: &LoaderRef,
        contract: &AccessorContract,
        class: &mut ClassNode,
    ) -> Result<()> {
        for generator in contract.field_generators() {
            let member = &generator.member;
            let owner = member.display_name(contract.name());
            ensure_free(class, &owner, |m| {
                m.name == member.name && m.desc == member.descriptor
            })?;

            let generated = &generator.identifier;
            let field = match class.fields.iter().find(|f| f.name == generated.name) {
                Some(existing) => {
                    let existing_type = existing.field_type()?;
                    if !self
                        .ctx
                        .checker
                        .is_assignable(loader, &existing_type, &generated.field_type)?
                    {
                        return Err(Error::FieldGeneratorTaken {
                            owner,
                            field: generated.name.clone(),
                        });
                    }
                    AccessedField::of(class, existing)?
                }
                None => {
                    let field = FieldNode::new(
                        AccessFlags::PUBLIC,
                        &generated.name,
                        &generated.field_type.descriptor(),
                    );
                    trace!(class = %class.name, field = %field.name, "generated field");
                    class.fields.push(field);
                    AccessedField {
                        owner: class.name.clone(),
                        name: generated.name.clone(),
                        field_type: generated.field_type.clone(),
                        is_static: false,
                    }
                }
            };

            let method = accessor_method(contract.name(), member, generator.setter, &field)?;
            trace!(class = %class.name, accessor = %owner, field = %field.name, "field generator");
            class.methods.push(method);
        }
        Ok(())
    }
}

/// A public getter or setter of `field` implementing `member`.
///
/// Setters return nothing, the receiver (when declared to return the contract) or the value
/// that was set.
fn accessor_method(
    contract: &str,
    member: &MemberDescriptor,
    setter: bool,
    field: &AccessedField,
) -> Result<MethodNode> {
    let method_type = MethodType::parse(&member.descriptor)?;
    let mut insns = Vec::with_capacity(8);
    if setter {
        let Some(param) = method_type.params.first() else {
            return Err(malformed_error!("Setter {} has no parameter", member.name));
        };
        if !field.is_static {
            insns.push(Insn::var(ALOAD, 0));
        }
        insns.push(Insn::var(param.load_opcode(), 1));
        if *param != field.field_type {
            insns.extend(checkcast(&field.field_type));
        }
        insns.push(field.insn(PUTFIELD, PUTSTATIC));
        let ret = &method_type.ret;
        if *ret == Type::object(contract) {
            insns.push(Insn::var(ALOAD, 0));
        } else if *ret != Type::Void {
            insns.push(Insn::var(ret.load_opcode(), 1));
        }
        insns.push(Insn::Simple(ret.return_opcode()));
    } else {
        if !field.is_static {
            insns.push(Insn::var(ALOAD, 0));
        }
        insns.push(field.insn(GETFIELD, GETSTATIC));
        insns.push(Insn::Simple(method_type.ret.return_opcode()));
    }

    let mut method = MethodNode::new(AccessFlags::PUBLIC, &member.name, &member.descriptor);
    method.signature.clone_from(&member.signature);
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
        accessor::ContractDescriptor,
        config::WeaverConfig,
        identification::{ElementDescription, FieldIdentifier, MapperRegistryBuilder, SearchPurpose},
        weaver::{
            tests::{loader, registry, target, topology},
            WeaveContext,
        },
    };

    fn mappers() -> MapperRegistryBuilder {
        let mut mappers = MapperRegistryBuilder::new();
        mappers.register_field_mapper("fields", |id: &str, _: SearchPurpose| match id {
            "count" => Some(FieldIdentifier::descriptions([ElementDescription::new("n", "I")])),
            "any" => Some(FieldIdentifier::matching(|f| f.desc == "I")),
            "tag" => Some(FieldIdentifier::descriptions([ElementDescription::new(
                "tag",
                "Ljava/lang/String;",
            )])),
            _ => None,
        });
        mappers
    }

    fn weave(contract: ContractDescriptor, class: &mut ClassNode) -> Result<bool> {
        let accessors = registry(mappers(), vec![contract]);
        let topology = topology();
        let config = WeaverConfig::default();
        let weaver = Weaver::new(WeaveContext::new(&accessors, &topology, &config));
        weaver.weave(&loader(), class)
    }

    fn insns(class: &ClassNode, name: &str) -> Vec<Insn> {
        let method = class.methods.iter().find(|m| m.name == name).unwrap();
        method.code().unwrap().instructions.iter().cloned().collect()
    }

    #[test]
    fn test_getter_and_fluent_setter() {
        let contract = ContractDescriptor::builder("c/Counter", "target")
            .member(MemberDescriptor::field_accessor("getCount", "()I", "count"))
            .member(MemberDescriptor::field_accessor("setCount", "(I)Lc/Counter;", "count"));
        let mut class = target();
        class.fields.push(FieldNode::new(AccessFlags::PRIVATE, "n", "I"));

        assert!(weave(contract, &mut class).unwrap());
        assert_eq!(
            insns(&class, "getCount"),
            vec![
                Insn::var(ALOAD, 0),
                Insn::field(GETFIELD, "t/Target", "n", "I"),
                Insn::Simple(IRETURN),
            ]
        );
        assert_eq!(
            insns(&class, "setCount"),
            vec![
                Insn::var(ALOAD, 0),
                Insn::var(ILOAD, 1),
                Insn::field(PUTFIELD, "t/Target", "n", "I"),
                Insn::var(ALOAD, 0),
                Insn::Simple(ARETURN),
            ]
        );
    }

    #[test]
    fn test_field_resolution_failures() {
        let missing = ContractDescriptor::builder("c/Counter", "target")
            .member(MemberDescriptor::field_accessor("getCount", "()I", "count"));
        assert!(matches!(
            weave(missing, &mut target()),
            Err(Error::NotFound { kind: IdentifierKind::Field, .. })
        ));

        let ambiguous = ContractDescriptor::builder("c/Counter", "target")
            .member(MemberDescriptor::field_accessor("getAny", "()I", "any"));
        let mut class = target();
        class.fields.push(FieldNode::new(AccessFlags::PRIVATE, "a", "I"));
        class.fields.push(FieldNode::new(AccessFlags::PRIVATE, "b", "I"));
        assert!(matches!(
            weave(ambiguous, &mut class),
            Err(Error::MultipleMatches { .. })
        ));

        let wrong_type = ContractDescriptor::builder("c/Counter", "target")
            .member(MemberDescriptor::field_accessor("getCount", "()J", "count"));
        let mut class = target();
        class.fields.push(FieldNode::new(AccessFlags::PRIVATE, "n", "I"));
        assert!(matches!(
            weave(wrong_type, &mut class),
            Err(Error::IncompatibleType { .. })
        ));
    }

    #[test]
    fn test_taken_accessor_method() {
        let contract = ContractDescriptor::builder("c/Counter", "target")
            .member(MemberDescriptor::field_accessor("getCount", "()I", "count"));
        let mut class = target();
        class.fields.push(FieldNode::new(AccessFlags::PRIVATE, "n", "I"));
        class
            .methods
            .push(MethodNode::new(AccessFlags::PUBLIC | AccessFlags::ABSTRACT, "getCount", "()I"));
        assert!(matches!(
            weave(contract, &mut class),
            Err(Error::AccessorTaken(_))
        ));
    }

    #[test]
    fn test_generator_adds_field() {
        let contract = ContractDescriptor::builder("c/Tagged", "target")
            .member(MemberDescriptor::field_generator("getTag", "()Ljava/lang/String;", "tag"))
            .member(MemberDescriptor::field_generator("setTag", "(Ljava/lang/String;)V", "tag"));
        let mut class = target();

        assert!(weave(contract, &mut class).unwrap());
        let field = class.field("tag", "Ljava/lang/String;").unwrap();
        assert_eq!(field.access, AccessFlags::PUBLIC);
        assert_eq!(class.fields.len(), 1);
        assert_eq!(
            insns(&class, "setTag"),
            vec![
                Insn::var(ALOAD, 0),
                Insn::var(ALOAD, 1),
                Insn::field(PUTFIELD, "t/Target", "tag", "Ljava/lang/String;"),
                Insn::Simple(RETURN),
            ]
        );
    }

    #[test]
    fn test_generator_conflicts_with_existing_field() {
        let contract = ContractDescriptor::builder("c/Tagged", "target")
            .member(MemberDescriptor::field_generator("getTag", "()Ljava/lang/String;", "tag"));
        let mut class = target();
        class.fields.push(FieldNode::new(AccessFlags::PRIVATE, "tag", "I"));
        assert!(matches!(
            weave(contract, &mut class),
            Err(Error::FieldGeneratorTaken { .. })
        ));
    }
}
