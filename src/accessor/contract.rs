//! Validated accessor contracts.
//!
//! A [`ContractDescriptor`] becomes an [`AccessorContract`] in two steps. Registration checks the
//! shape of every member and resolves the identifiers the weaver needs for accessors, using the
//! mappers registered so far. Interceptor identifiers are resolved when the registry is built,
//! against the final mapper registry.

use std::fmt;

use crate::{
    accessor::descriptor::{ContractDescriptor, MemberDescriptor, MemberRole},
    classfile::{ClassNode, MethodType, Type},
    identification::{
        ClassIdentifier, ElementDescription, FieldIdentifier, IdentifierKind,
        InstructionIdentifier, MapperRegistry, MapperRegistryBuilder, MethodIdentifier,
        SearchPurpose,
    },
    runtime::abi,
    signature::{parse_signature, ClassType, TypeSymbol},
    topology::{LoaderMemo, LoaderRef},
    Error, Result,
};

/// A field created by a field generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedField {
    /// Field name
    pub name: String,
    /// Field type
    pub field_type: Type,
}

/// A field accessor, field generator or method accessor of a contract.
pub struct ElementAccessorSpec<I> {
    /// The contract member implemented by the generated method
    pub member: MemberDescriptor,
    /// Identifier id the member was declared with
    pub identifier_id: String,
    /// The resolved identifier
    pub identifier: I,
    /// `true` for setters; method accessors are never setters
    pub setter: bool,
    identified: LoaderMemo<String, ElementDescription>,
}

/// Proxy to a target method.
pub type MethodAccessorSpec = ElementAccessorSpec<MethodIdentifier>;
/// Getter or setter of an existing field.
pub type FieldAccessorSpec = ElementAccessorSpec<FieldIdentifier>;
/// Getter or setter of a field added on demand.
pub type FieldGeneratorSpec = ElementAccessorSpec<GeneratedField>;

impl<I> ElementAccessorSpec<I> {
    fn new(member: MemberDescriptor, identifier_id: String, identifier: I, setter: bool) -> Self {
        ElementAccessorSpec {
            member,
            identifier_id,
            identifier,
            setter,
            identified: LoaderMemo::new(),
        }
    }

    /// Erased type of the accessed value: the setter parameter or the getter return type.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] for an invalid member descriptor.
    pub fn value_type(&self) -> Result<Type> {
        accessed_type(&self.member.descriptor, self.setter)
    }

    /// Target member found earlier in `class` for `loader`.
    pub(crate) fn identified(&self, loader: &LoaderRef, class: &str) -> Option<ElementDescription> {
        self.identified.get(loader, &class.to_string())
    }

    pub(crate) fn remember(&self, loader: &LoaderRef, class: &str, target: ElementDescription) {
        self.identified.insert(loader, class.to_string(), target);
    }
}

impl<I: fmt::Debug> fmt::Debug for ElementAccessorSpec<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementAccessorSpec")
            .field("member", &self.member.name)
            .field("identifier_id", &self.identifier_id)
            .field("identifier", &self.identifier)
            .field("setter", &self.setter)
            .finish_non_exhaustive()
    }
}

/// A local variable of the target method passed to an interceptor parameter.
#[derive(Debug, Clone)]
pub struct ImportedLocalVariable {
    /// Index of the interceptor parameter
    pub parameter: usize,
    /// Instruction identifier id
    pub identifier_id: String,
    /// The resolved local-variable identifier
    pub identifier: InstructionIdentifier,
}

/// An interceptor with every identifier resolved.
#[derive(Debug, Clone)]
pub struct MethodInterceptorSpec {
    /// Internal name of the declaring contract
    pub contract: String,
    /// The interceptor method
    pub member: MemberDescriptor,
    /// Id of the target method identifier
    pub method_identifier_id: String,
    /// Target method identifier
    pub method_identifier: MethodIdentifier,
    /// Id of the entry instruction identifier
    pub entry_identifier_id: String,
    /// Entry instruction identifier
    pub entry_identifier: InstructionIdentifier,
    /// Ids of the exit instruction identifiers
    pub exit_identifier_ids: Vec<String>,
    /// Exit instruction identifiers, in exit-index order
    pub exit_identifiers: Vec<InstructionIdentifier>,
    /// Imported locals, by parameter order
    pub locals: Vec<ImportedLocalVariable>,
    /// Index of the context parameter
    pub context_parameter: usize,
    /// Generic type of the context parameter
    pub context_type: ClassType,
    /// Whether the context type argument is checked against the target's return type
    pub check_signature: bool,
}

impl MethodInterceptorSpec {
    /// `Contract.name(desc)`, as used in diagnostics.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.member.display_name(&self.contract)
    }

    /// Erased parameter and return types of the interceptor.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] for an invalid member descriptor.
    pub fn method_type(&self) -> Result<MethodType> {
        MethodType::parse(&self.member.descriptor)
    }
}

/// An interceptor whose shape is valid but whose identifiers are not resolved yet.
#[derive(Debug, Clone)]
struct InterceptorDraft {
    member: MemberDescriptor,
    method_identifier_id: String,
    entry_identifier_id: String,
    exit_identifier_ids: Vec<String>,
    locals: Vec<(usize, String)>,
    context_parameter: usize,
    context_type: ClassType,
    check_signature: bool,
}

impl InterceptorDraft {
    fn resolve(self, contract: &str, mappers: &MapperRegistry) -> Result<MethodInterceptorSpec> {
        let owner = self.member.display_name(contract);
        let Some(method_identifier) =
            mappers.method_identifier(&self.method_identifier_id, SearchPurpose::Interceptor)
        else {
            return Err(Error::NotMapped {
                owner,
                kind: IdentifierKind::Method,
                id: self.method_identifier_id,
            });
        };

        let entry_identifier = mappers.require_instruction(
            &owner,
            &self.entry_identifier_id,
            SearchPurpose::InterceptorEntry,
            IdentifierKind::Instruction,
        )?;

        let mut exit_identifiers = Vec::with_capacity(self.exit_identifier_ids.len());
        for id in &self.exit_identifier_ids {
            exit_identifiers.push(mappers.require_instruction(
                &owner,
                id,
                SearchPurpose::InterceptorExit,
                IdentifierKind::Instruction,
            )?);
        }

        let mut locals = Vec::with_capacity(self.locals.len());
        for (parameter, identifier_id) in self.locals {
            let identifier = mappers.require_instruction(
                &owner,
                &identifier_id,
                SearchPurpose::LocalVariable,
                IdentifierKind::LocalVariable,
            )?;
            locals.push(ImportedLocalVariable {
                parameter,
                identifier_id,
                identifier,
            });
        }

        Ok(MethodInterceptorSpec {
            contract: contract.to_string(),
            member: self.member,
            method_identifier_id: self.method_identifier_id,
            method_identifier,
            entry_identifier_id: self.entry_identifier_id,
            entry_identifier,
            exit_identifier_ids: self.exit_identifier_ids,
            exit_identifiers,
            locals,
            context_parameter: self.context_parameter,
            context_type: self.context_type,
            check_signature: self.check_signature,
        })
    }
}

/// A registered contract waiting for its interceptors to be resolved.
pub(crate) struct PendingContract {
    pub(crate) descriptor: ContractDescriptor,
    class_identifier_id: String,
    class_identifier: ClassIdentifier,
    method_accessors: Vec<MethodAccessorSpec>,
    field_accessors: Vec<FieldAccessorSpec>,
    field_generators: Vec<FieldGeneratorSpec>,
    interceptors: Vec<InterceptorDraft>,
}

impl PendingContract {
    /// Validate `descriptor` and resolve its accessor identifiers.
    pub(crate) fn new(descriptor: ContractDescriptor, mappers: &MapperRegistryBuilder) -> Result<Self> {
        let name = descriptor.name.clone();
        let invalid = |message: String| Error::InvalidContract {
            contract: name.clone(),
            message,
        };

        if !descriptor.access.is_interface() {
            return Err(invalid("contracts must be interfaces".to_string()));
        }
        let Some(class_identifier_id) = descriptor.class_identifier.clone() else {
            return Err(invalid("no class identifier declared".to_string()));
        };
        let Some(class_identifier) =
            mappers.class_identifier(&class_identifier_id, SearchPurpose::Accessor)
        else {
            return Err(Error::NotMapped {
                owner: name.clone(),
                kind: IdentifierKind::Class,
                id: class_identifier_id,
            });
        };

        let members = descriptor.members.clone();
        let mut pending = PendingContract {
            descriptor,
            class_identifier_id,
            class_identifier,
            method_accessors: Vec::new(),
            field_accessors: Vec::new(),
            field_generators: Vec::new(),
            interceptors: Vec::new(),
        };
        for member in members {
            pending.add_member(member, mappers)?;
        }
        Ok(pending)
    }

    fn add_member(&mut self, member: MemberDescriptor, mappers: &MapperRegistryBuilder) -> Result<()> {
        let contract = self.descriptor.name.clone();
        let owner = member.display_name(&contract);
        let invalid = |message: &str| Error::InvalidContract {
            contract: contract.clone(),
            message: format!("{owner} {message}"),
        };

        match member.role.clone() {
            MemberRole::None => {
                if member.access.is_abstract() && !member.access.is_static() {
                    return Err(invalid("is abstract but declares no role"));
                }
            }
            MemberRole::MethodAccessor { method_identifier } => {
                require_abstract_instance(&member, "Method accessor", &invalid)?;
                let Some(identifier) =
                    mappers.method_identifier(&method_identifier, SearchPurpose::Accessor)
                else {
                    return Err(Error::NotMapped {
                        owner: owner.clone(),
                        kind: IdentifierKind::Method,
                        id: method_identifier,
                    });
                };
                self.method_accessors.push(ElementAccessorSpec::new(
                    member,
                    method_identifier,
                    identifier,
                    false,
                ));
            }
            MemberRole::FieldAccessor { field_identifier } => {
                require_abstract_instance(&member, "Field accessor", &invalid)?;
                let setter = accessor_shape(&member, &contract, &invalid)?;
                let Some(identifier) =
                    mappers.field_identifier(&field_identifier, SearchPurpose::Accessor)
                else {
                    return Err(Error::NotMapped {
                        owner: owner.clone(),
                        kind: IdentifierKind::Field,
                        id: field_identifier,
                    });
                };
                self.field_accessors.push(ElementAccessorSpec::new(
                    member,
                    field_identifier,
                    identifier,
                    setter,
                ));
            }
            MemberRole::FieldGenerator {
                field_name_identifier,
            } => {
                require_abstract_instance(&member, "Field generator", &invalid)?;
                let setter = accessor_shape(&member, &contract, &invalid)?;
                let Some(identifier) =
                    mappers.field_identifier(&field_name_identifier, SearchPurpose::NameGenerator)
                else {
                    return Err(Error::NotMapped {
                        owner: owner.clone(),
                        kind: IdentifierKind::Field,
                        id: field_name_identifier,
                    });
                };
                let Some(descriptions) = identifier.static_descriptions() else {
                    return Err(invalid("has a dynamic field name identifier"));
                };
                let mut names = descriptions.iter();
                let (Some(description), None) = (names.next(), names.next()) else {
                    return Err(invalid("needs a field name identifier yielding exactly one field"));
                };
                if !is_java_identifier(&description.name) {
                    return Err(invalid(&format!(
                        "generates an invalid field name: {}",
                        description.name
                    )));
                }

                let generated = GeneratedField {
                    name: description.name.clone(),
                    field_type: accessed_type(&member.descriptor, setter)?,
                };
                self.field_generators.push(ElementAccessorSpec::new(
                    member,
                    field_name_identifier,
                    generated,
                    setter,
                ));
            }
            MemberRole::Interceptor {
                method_identifier,
                entry_identifier,
                exit_identifiers,
            } => {
                let draft = interceptor_draft(
                    member,
                    method_identifier,
                    entry_identifier,
                    exit_identifiers,
                    &invalid,
                )?;
                self.interceptors.push(draft);
            }
        }
        Ok(())
    }

    /// Resolve the interceptor identifiers against the final mapper registry.
    pub(crate) fn resolve(self, mappers: &MapperRegistry) -> Result<AccessorContract> {
        let name = self.descriptor.name;
        let mut interceptors = Vec::with_capacity(self.interceptors.len());
        for draft in self.interceptors {
            interceptors.push(draft.resolve(&name, mappers)?);
        }
        Ok(AccessorContract {
            name,
            class_identifier_id: self.class_identifier_id,
            class_identifier: self.class_identifier,
            method_accessors: self.method_accessors,
            field_accessors: self.field_accessors,
            field_generators: self.field_generators,
            interceptors,
            identified: LoaderMemo::new(),
        })
    }
}

fn accessed_type(descriptor: &str, setter: bool) -> Result<Type> {
    let method_type = MethodType::parse(descriptor)?;
    if !setter {
        return Ok(method_type.ret);
    }
    method_type
        .params
        .into_iter()
        .next()
        .ok_or_else(|| malformed_error!("Setter {} has no parameter", descriptor))
}

fn require_abstract_instance(
    member: &MemberDescriptor,
    role: &str,
    invalid: &impl Fn(&str) -> Error,
) -> Result<()> {
    if !member.access.is_abstract() {
        return Err(invalid(&format!("is a {role} with a default body")));
    }
    if member.access.is_static() {
        return Err(invalid(&format!("is a static {role}")));
    }
    Ok(())
}

/// Checks the getter/setter shape shared by field accessors and field generators. Returns `true`
/// for setters.
fn accessor_shape(
    member: &MemberDescriptor,
    contract: &str,
    invalid: &impl Fn(&str) -> Error,
) -> Result<bool> {
    if !member.exceptions.is_empty() {
        return Err(invalid("declares exceptions"));
    }
    let method_type = MethodType::parse(&member.descriptor)?;
    match method_type.params.as_slice() {
        [] if method_type.ret == Type::Void => Err(invalid("is a getter returning void")),
        [] => Ok(false),
        [param] => {
            let ret = &method_type.ret;
            if *ret == Type::Void || *ret == Type::object(contract) || ret == param {
                Ok(true)
            } else {
                Err(invalid(&format!(
                    "must return void, the contract or {param}"
                )))
            }
        }
        _ => Err(invalid("must have zero or one parameter")),
    }
}

fn interceptor_draft(
    member: MemberDescriptor,
    method_identifier_id: String,
    entry_identifier_id: String,
    exit_identifier_ids: Vec<String>,
    invalid: &impl Fn(&str) -> Error,
) -> Result<InterceptorDraft> {
    if member.access.is_abstract() {
        return Err(invalid("is an interceptor without a body"));
    }
    if member.access.is_static() {
        return Err(invalid("is a static interceptor"));
    }
    let method_type = MethodType::parse(&member.descriptor)?;
    if method_type.ret != Type::Void {
        return Err(invalid("is an interceptor not returning void"));
    }

    let context = Type::object(abi::context::NAME);
    let mut context_parameter = None;
    let mut locals = Vec::new();
    for (index, param) in method_type.params.iter().enumerate() {
        if *param == context {
            if context_parameter.replace(index).is_some() {
                return Err(invalid("has more than one context parameter"));
            }
            continue;
        }
        let Some(id) = member
            .parameter(index)
            .and_then(|p| p.local_variable.clone())
        else {
            return Err(invalid(&format!(
                "parameter {index} is neither the context nor an imported local"
            )));
        };
        locals.push((index, id));
    }
    let Some(context_parameter) = context_parameter else {
        return Err(invalid("has no context parameter"));
    };

    let context_type = match &member.signature {
        Some(signature) => parse_signature(signature)?
            .parameters
            .into_iter()
            .find_map(|param| match param {
                TypeSymbol::Class(class)
                    if class.dims == 0 && class.internal_name() == abi::context::NAME =>
                {
                    Some(class)
                }
                _ => None,
            }),
        None => None,
    };
    let Some(context_type) = context_type.filter(|class| class.args().len() == 1) else {
        return Err(invalid("context parameter needs exactly one type argument"));
    };

    let check_signature = !member
        .parameter(context_parameter)
        .is_some_and(|p| p.unchecked_signature);

    Ok(InterceptorDraft {
        member,
        method_identifier_id,
        entry_identifier_id,
        exit_identifier_ids,
        locals,
        context_parameter,
        context_type,
        check_signature,
    })
}

const JAVA_KEYWORDS: &[&str] = &[
    "_", "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class",
    "const", "continue", "default", "do", "double", "else", "enum", "extends", "false", "final",
    "finally", "float", "for", "goto", "if", "implements", "import", "instanceof", "int",
    "interface", "long", "native", "new", "null", "package", "private", "protected", "public",
    "return", "short", "static", "strictfp", "super", "switch", "synchronized", "this", "throw",
    "throws", "transient", "true", "try", "void", "volatile", "while",
];

/// Returns `true` if `name` is a valid Java identifier and not a reserved word.
#[must_use]
pub fn is_java_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_' || first == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        && !JAVA_KEYWORDS.contains(&name)
}

/// A validated contract with every identifier resolved.
pub struct AccessorContract {
    name: String,
    class_identifier_id: String,
    class_identifier: ClassIdentifier,
    method_accessors: Vec<MethodAccessorSpec>,
    field_accessors: Vec<FieldAccessorSpec>,
    field_generators: Vec<FieldGeneratorSpec>,
    interceptors: Vec<MethodInterceptorSpec>,
    identified: LoaderMemo<String, bool>,
}

impl AccessorContract {
    /// Internal name of the contract interface.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Id of the target class identifier.
    #[must_use]
    pub fn class_identifier_id(&self) -> &str {
        &self.class_identifier_id
    }

    /// The target class identifier.
    #[must_use]
    pub fn class_identifier(&self) -> &ClassIdentifier {
        &self.class_identifier
    }

    /// Method accessors in declaration order.
    #[must_use]
    pub fn method_accessors(&self) -> &[MethodAccessorSpec] {
        &self.method_accessors
    }

    /// Field accessors in declaration order.
    #[must_use]
    pub fn field_accessors(&self) -> &[FieldAccessorSpec] {
        &self.field_accessors
    }

    /// Field generators in declaration order.
    #[must_use]
    pub fn field_generators(&self) -> &[FieldGeneratorSpec] {
        &self.field_generators
    }

    /// Interceptors in declaration order.
    #[must_use]
    pub fn interceptors(&self) -> &[MethodInterceptorSpec] {
        &self.interceptors
    }

    /// Returns `true` if the class `name`, loaded by `loader`, is a target of this contract.
    ///
    /// Dynamic identifiers need the class structure; their answers are memoised per loader.
    pub fn identifies(&self, loader: &LoaderRef, name: &str, node: Option<&ClassNode>) -> bool {
        if self.class_identifier.is_static() {
            return self.class_identifier.identifies(name, None);
        }
        if let Some(known) = self.identified.get(loader, &name.to_string()) {
            return known;
        }
        let Some(node) = node else {
            return false;
        };
        let identified = self.class_identifier.identifies(name, Some(node));
        self.identified.insert(loader, name.to_string(), identified);
        identified
    }

    /// Drop memoised answers of unloaded loaders.
    pub(crate) fn prune(&self) {
        self.identified.prune();
        for accessor in &self.method_accessors {
            accessor.identified.prune();
        }
        for accessor in &self.field_accessors {
            accessor.identified.prune();
        }
        for generator in &self.field_generators {
            generator.identified.prune();
        }
    }
}

impl fmt::Debug for AccessorContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessorContract")
            .field("name", &self.name)
            .field("class_identifier_id", &self.class_identifier_id)
            .field("method_accessors", &self.method_accessors.len())
            .field("field_accessors", &self.field_accessors.len())
            .field("field_generators", &self.field_generators.len())
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{classfile::AccessFlags, identification::builtin, test::loader_with};

    const CTX: &str = "Lclassweave/runtime/v1/InterceptorContext;";

    fn mappers() -> MapperRegistryBuilder {
        let mut mappers = MapperRegistryBuilder::new();
        mappers.register_class_mapper("test", |id: &str, _: SearchPurpose| match id {
            "target" => Some(ClassIdentifier::names(["t/Target"])),
            "dynamic" => Some(ClassIdentifier::matching(|node| node.access.is_abstract())),
            _ => None,
        });
        mappers.register_field_mapper("test", |id: &str, _: SearchPurpose| match id {
            "count" => Some(FieldIdentifier::descriptions([ElementDescription::new("count", "I")])),
            "two" => Some(FieldIdentifier::descriptions([
                ElementDescription::new("a", "I"),
                ElementDescription::new("b", "I"),
            ])),
            "keyword" => Some(FieldIdentifier::descriptions([ElementDescription::new("class", "I")])),
            _ => None,
        });
        mappers.register_method_mapper("test", |id: &str, _: SearchPurpose| {
            (id == "run").then(|| MethodIdentifier::descriptions([ElementDescription::new("run", "()V")]))
        });
        mappers.register_instruction_mapper("test", |id: &str, _: SearchPurpose| match id {
            "head" => Some(builtin::by_index(0, false)),
            "local" => Some(builtin::local_by_index(1, false)),
            _ => None,
        });
        mappers
    }

    fn pending(member: MemberDescriptor) -> Result<PendingContract> {
        let descriptor = ContractDescriptor::builder("c/Contract", "target").member(member);
        PendingContract::new(descriptor, &mappers())
    }

    fn message(result: Result<PendingContract>) -> String {
        match result {
            Err(Error::InvalidContract { message, .. }) => message,
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("contract accepted"),
        }
    }

    #[test]
    fn test_field_accessor_shapes() {
        let getter = pending(MemberDescriptor::field_accessor("get", "()I", "count")).unwrap();
        assert!(!getter.field_accessors[0].setter);
        assert_eq!(getter.field_accessors[0].value_type().unwrap(), Type::Int);

        for desc in ["(I)V", "(I)I", "(I)Lc/Contract;"] {
            let setter = pending(MemberDescriptor::field_accessor("set", desc, "count")).unwrap();
            assert!(setter.field_accessors[0].setter);
        }

        assert!(message(pending(MemberDescriptor::field_accessor("set", "(I)J", "count")))
            .contains("must return"));
        assert!(message(pending(MemberDescriptor::field_accessor("set", "(II)V", "count")))
            .contains("zero or one"));
        assert!(message(pending(
            MemberDescriptor::field_accessor("get", "()I", "count").with_exceptions(&["java/io/IOException"])
        ))
        .contains("exceptions"));
    }

    #[test]
    fn test_unmapped_identifiers() {
        let result = pending(MemberDescriptor::field_accessor("get", "()I", "missing"));
        assert!(matches!(
            result,
            Err(Error::NotMapped {
                kind: IdentifierKind::Field,
                ..
            })
        ));

        let descriptor = ContractDescriptor::builder("c/Contract", "nowhere");
        assert!(matches!(
            PendingContract::new(descriptor, &mappers()),
            Err(Error::NotMapped {
                kind: IdentifierKind::Class,
                ..
            })
        ));
    }

    #[test]
    fn test_field_generator_rules() {
        let generator = pending(MemberDescriptor::field_generator("get", "()I", "count")).unwrap();
        assert_eq!(
            generator.field_generators[0].identifier,
            GeneratedField {
                name: "count".into(),
                field_type: Type::Int
            }
        );
        assert!(message(pending(MemberDescriptor::field_generator("get", "()I", "two")))
            .contains("exactly one"));
        assert!(message(pending(MemberDescriptor::field_generator("get", "()I", "keyword")))
            .contains("invalid field name"));
    }

    #[test]
    fn test_abstract_member_without_role() {
        let member = MemberDescriptor::plain(AccessFlags::PUBLIC | AccessFlags::ABSTRACT, "x", "()V");
        assert!(message(pending(member)).contains("no role"));
        let member = MemberDescriptor::plain(AccessFlags::PUBLIC | AccessFlags::STATIC, "x", "()V");
        assert!(pending(member).is_ok());
    }

    #[test]
    fn test_interceptor_rules() {
        let desc = format!("({CTX}I)V");
        let signature = format!("(L{}<Ljava/lang/Void;>;I)V", abi::context::NAME);
        let valid = MemberDescriptor::interceptor("on", &desc, "run", "head")
            .with_signature(&signature)
            .with_local(1, "local");
        let contract = pending(valid.clone())
            .unwrap()
            .resolve(&mappers().build())
            .unwrap();
        let interceptor = &contract.interceptors()[0];
        assert_eq!(interceptor.context_parameter, 0);
        assert_eq!(interceptor.locals[0].parameter, 1);
        assert!(interceptor.check_signature);

        let unchecked = pending(valid.clone().unchecked(0)).unwrap();
        assert!(!unchecked.interceptors[0].check_signature);

        let no_local = MemberDescriptor::interceptor("on", &desc, "run", "head").with_signature(&signature);
        assert!(message(pending(no_local)).contains("parameter 1"));

        let raw = MemberDescriptor::interceptor("on", &desc, "run", "head").with_local(1, "local");
        assert!(message(pending(raw)).contains("type argument"));

        let pair = MemberDescriptor::interceptor("on", &desc, "run", "head")
            .with_signature(&format!(
                "(L{}<Ljava/lang/Void;Ljava/lang/Void;>;I)V",
                abi::context::NAME
            ))
            .with_local(1, "local");
        assert!(message(pending(pair)).contains("exactly one type argument"));

        let twice = MemberDescriptor::interceptor("on", &format!("({CTX}{CTX})V"), "run", "head");
        assert!(message(pending(twice)).contains("more than one"));

        let wrong_kind = MemberDescriptor::interceptor("on", &desc, "run", "local")
            .with_signature(&signature)
            .with_local(1, "local");
        assert!(matches!(
            pending(wrong_kind).unwrap().resolve(&mappers().build()),
            Err(Error::WrongIdentifierKind { .. })
        ));
    }

    #[test]
    fn test_dynamic_identification_is_memoised() {
        let descriptor = ContractDescriptor::builder("c/Contract", "dynamic");
        let contract = PendingContract::new(descriptor, &mappers())
            .unwrap()
            .resolve(&mappers().build())
            .unwrap();
        let loader = loader_with("app", &[]);
        let mut node = crate::test::class("t/Abstract", "java/lang/Object");
        node.access |= AccessFlags::ABSTRACT;

        assert!(!contract.identifies(&loader, "t/Abstract", None));
        assert!(contract.identifies(&loader, "t/Abstract", Some(&node)));
        assert!(contract.identifies(&loader, "t/Abstract", None));
    }

    #[test]
    fn test_java_identifiers() {
        assert!(is_java_identifier("health"));
        assert!(is_java_identifier("$x_1"));
        assert!(!is_java_identifier("1x"));
        assert!(!is_java_identifier("int"));
        assert!(!is_java_identifier(""));
    }
}
