//! Generic signatures: parsing, emission, variable resolution and the return-signature check of
//! interceptor contexts.

use classweave::{
    analysis::ObjectHierarchy,
    classfile::{opcodes::*, Code, InnerClassNode},
    prelude::*,
    signature::{parse_signature, Signature, SignatureTypesResolver, TypeSymbol},
    topology::{ClassTopology, LocatorRegistryBuilder},
};

const CTX: &str = "Lclassweave/runtime/v1/InterceptorContext";

fn encode(node: &ClassNode) -> Result<Vec<u8>> {
    ClassWriter::new(&ObjectHierarchy).write(node)
}

fn class(name: &str) -> ClassNode {
    ClassNode::new(
        52,
        AccessFlags::PUBLIC | AccessFlags::SUPER,
        name,
        Some("java/lang/Object"),
    )
}

#[test]
fn signatures_survive_a_round_trip() -> Result<()> {
    let inputs = [
        "<K:Ljava/lang/Object;V::Ljava/lang/Comparable<TV;>;>Ljava/lang/Object;Ljava/util/Map<TK;TV;>;",
        "<T:Ljava/lang/Number;>(Ljava/util/List<+TT;>;[[I)Ljava/util/Map<TT;*>;^Ljava/io/IOException;",
        "(Ljava/util/List<-Ljava/lang/Integer;>;)V",
        "()La/Outer<Ljava/lang/String;>.Inner<[TT;>;",
    ];
    for input in inputs {
        let signature = parse_signature(input)?;
        assert_eq!(signature.to_signature_string(), input);
    }

    let method = Signature::parse(inputs[1])?;
    assert_eq!(method, parse_signature(inputs[1])?);
    assert_eq!(method.formal_type_parameters.len(), 1);
    assert_eq!(method.parameters.len(), 2);
    assert_eq!(method.exceptions.len(), 1);
    assert!(matches!(
        &method.parameters[1],
        TypeSymbol::Base { descriptor: 'I', dims: 2 }
    ));
    assert!(method.variables().contains("T"));

    assert!(parse_signature("(Ljava/util/List<").is_err());
    assert!(parse_signature("(I").is_err());
    Ok(())
}

#[test]
fn variables_resolve_through_outer_classes() -> Result<()> {
    let mut outer = class("a/Outer");
    outer.signature = Some("<T:Ljava/lang/Number;>Ljava/lang/Object;".into());
    let mut inner = class("a/Outer$Inner");
    inner.signature = Some("<U:TT;>Ljava/lang/Object;".into());
    inner.inner_classes.push(InnerClassNode {
        name: "a/Outer$Inner".into(),
        outer_name: Some("a/Outer".into()),
        inner_name: Some("Inner".into()),
        access: AccessFlags::PUBLIC,
    });

    let loader = MemoryClassLoader::new("app");
    loader.insert_class("a/Outer", encode(&outer)?);
    loader.insert_class("a/Outer$Inner", encode(&inner)?);
    let loader = loader.into_ref();
    let topology = ClassTopology::new(LocatorRegistryBuilder::new().build(), &WeaverConfig::default());
    let resolver = SignatureTypesResolver::new(&topology, &loader);

    let resolved = resolver.resolve("a/Outer$Inner", &parse_signature("()TU;")?)?;
    assert_eq!(resolved.len(), 2);
    assert_eq!(
        resolved["T"].class_bound.as_ref().map(ToString::to_string).as_deref(),
        Some("java.lang.Number")
    );

    let shadowed = resolver.resolve("a/Outer$Inner", &parse_signature("<U:Ljava/lang/String;>()TU;")?)?;
    assert_eq!(shadowed.len(), 1);

    let local = resolver.resolve("a/Outer", &parse_signature("()TX;")?)?;
    assert!(local.is_empty());
    Ok(())
}

/// `game/a` with `List<String> names() { return null; }`.
fn target() -> ClassNode {
    let mut node = class("game/a");
    let mut names = MethodNode::new(AccessFlags::PUBLIC, "names", "()Ljava/util/List;");
    names.signature = Some("()Ljava/util/List<Ljava/lang/String;>;".into());
    names.set_code(Code {
        instructions: vec![Insn::Simple(ACONST_NULL), Insn::Simple(ARETURN)]
            .into_iter()
            .collect(),
        ..Code::default()
    });
    node.methods.push(names);
    node
}

fn weave_with_context(argument: &str) -> Result<Option<Vec<u8>>> {
    let mut builder = BootstrapBuilder::new();
    builder.register_class_mapper("game", |id: &str, _: SearchPurpose| {
        (id == "player").then(|| ClassIdentifier::names(["game/a"]))
    });
    builder.register_method_mapper("game", |id: &str, _: SearchPurpose| {
        (id == "names").then(|| MethodIdentifier::matching(|m| m.name == "names"))
    });
    builder.register_instruction_mapper("game", |id: &str, _: SearchPurpose| {
        (id == "return").then(|| builtin::first_return(0))
    });
    builder.add_failure_handler(|_: &Error| {});
    let member = MemberDescriptor::interceptor("onNames", &format!("({CTX};)V"), "names", "return")
        .with_signature(&format!("({CTX}<{argument}>;)V"));
    builder.register_accessor(ContractDescriptor::builder("hooks/Player", "player").member(member))?;

    let bootstrapper = builder.initialize();
    let loader = MemoryClassLoader::new("game").into_ref();
    bootstrapper.try_transform(&loader, "game/a", &encode(&target())?)
}

#[test]
fn context_arguments_match_generic_returns() -> Result<()> {
    assert!(weave_with_context("Ljava/util/List<Ljava/lang/String;>;")?.is_some());
    assert!(weave_with_context("*")?.is_some());

    let error = weave_with_context("Ljava/util/List<Ljava/lang/Integer;>;").unwrap_err();
    assert!(matches!(error, Error::SignatureMismatch { .. }));
    assert_eq!(error.category(), ErrorCategory::Compatibility);
    Ok(())
}

#[test]
fn unchecked_contexts_skip_the_signature_check() -> Result<()> {
    let mut builder = BootstrapBuilder::new();
    builder.register_class_mapper("game", |id: &str, _: SearchPurpose| {
        (id == "player").then(|| ClassIdentifier::names(["game/a"]))
    });
    builder.register_method_mapper("game", |id: &str, _: SearchPurpose| {
        (id == "names").then(|| MethodIdentifier::matching(|m| m.name == "names"))
    });
    builder.register_instruction_mapper("game", |id: &str, _: SearchPurpose| {
        (id == "return").then(|| builtin::first_return(0))
    });
    let member = MemberDescriptor::interceptor("onNames", &format!("({CTX};)V"), "names", "return")
        .with_signature(&format!("({CTX}<Ljava/lang/Integer;>;)V"))
        .unchecked(0);
    builder.register_accessor(ContractDescriptor::builder("hooks/Player", "player").member(member))?;

    let bootstrapper = builder.initialize();
    let loader = MemoryClassLoader::new("game").into_ref();
    assert!(bootstrapper
        .try_transform(&loader, "game/a", &encode(&target())?)?
        .is_some());
    Ok(())
}
