//! End-to-end weaving through the bootstrapper.
//!
//! Classes are built in memory, encoded, handed to `Bootstrapper::transform` the way a host would,
//! and the result is decoded again for inspection.

use std::sync::{Arc, Mutex};

use classweave::{
    analysis::ObjectHierarchy,
    classfile::{opcodes::*, Code},
    prelude::*,
};

fn class(name: &str) -> ClassNode {
    let mut node = ClassNode::new(
        52,
        AccessFlags::PUBLIC | AccessFlags::SUPER,
        name,
        Some("java/lang/Object"),
    );
    let mut init = MethodNode::new(AccessFlags::PUBLIC, "<init>", "()V");
    init.set_code(Code {
        instructions: vec![
            Insn::var(ALOAD, 0),
            Insn::method(INVOKESPECIAL, "java/lang/Object", "<init>", "()V", false),
            Insn::Simple(RETURN),
        ]
        .into_iter()
        .collect(),
        ..Code::default()
    });
    node.methods.push(init);
    node
}

fn method(name: &str, desc: &str, insns: Vec<Insn>) -> MethodNode {
    let mut node = MethodNode::new(AccessFlags::PUBLIC, name, desc);
    node.set_code(Code {
        instructions: insns.into_iter().collect(),
        ..Code::default()
    });
    node
}

fn encode(node: &ClassNode) -> Result<Vec<u8>> {
    ClassWriter::new(&ObjectHierarchy).write(node)
}

fn decode(data: &[u8]) -> Result<ClassNode> {
    ClassReader::new(data).read(ReaderFlags::empty())
}

fn body(node: &ClassNode, name: &str) -> Vec<Insn> {
    node.methods
        .iter()
        .find(|m| m.name == name)
        .and_then(|m| m.code())
        .map(|code| code.instructions.iter().filter(|i| !i.is_pseudo()).cloned().collect())
        .unwrap_or_default()
}

/// Mappers for the obfuscated `game/a` (the player) and `game/p` (a part of it).
fn builder() -> (BootstrapBuilder, Arc<Mutex<Vec<String>>>) {
    let mut builder = BootstrapBuilder::new();
    builder.register_class_mapper("game", |id: &str, _: SearchPurpose| match id {
        "player" => Some(ClassIdentifier::names(["game/a"])),
        "part" => Some(ClassIdentifier::names(["game/p"])),
        _ => None,
    });
    builder.register_field_mapper("game", |id: &str, _: SearchPurpose| match id {
        "health" => Some(FieldIdentifier::descriptions([ElementDescription::new("b", "I")])),
        "tag" => Some(FieldIdentifier::descriptions([ElementDescription::new(
            "tag",
            "Ljava/lang/String;",
        )])),
        _ => None,
    });
    builder.register_method_mapper("game", |id: &str, _: SearchPurpose| {
        (id == "attach").then(|| MethodIdentifier::matching(|m| m.name == "c"))
    });

    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&failures);
    builder.add_failure_handler(move |error: &Error| {
        sink.lock().unwrap().push(error.category().to_string());
    });
    (builder, failures)
}

#[test]
fn unmatched_classes_are_byte_identical() -> Result<()> {
    let (mut builder, failures) = builder();
    builder.register_accessor(
        ContractDescriptor::builder("hooks/Player", "player")
            .member(MemberDescriptor::field_accessor("getHealth", "()I", "health")),
    )?;
    let bootstrapper = builder.initialize();
    let loader = MemoryClassLoader::new("game").into_ref();

    let original = encode(&class("game/z"))?;
    assert_eq!(bootstrapper.transform(&loader, "game/z", &original), original);
    assert!(bootstrapper.try_transform(&loader, "game/z", &original)?.is_none());
    assert!(failures.lock().unwrap().is_empty());
    Ok(())
}

#[test]
fn field_getter_and_setter() -> Result<()> {
    let (mut builder, failures) = builder();
    builder.register_accessor(
        ContractDescriptor::builder("hooks/Player", "player")
            .member(MemberDescriptor::field_accessor("getHealth", "()I", "health"))
            .member(MemberDescriptor::field_accessor("setHealth", "(I)V", "health")),
    )?;
    let bootstrapper = builder.initialize();
    let loader = MemoryClassLoader::new("game").into_ref();

    let mut player = class("game/a");
    player.fields.push(FieldNode::new(AccessFlags::PRIVATE, "b", "I"));
    let woven = decode(&bootstrapper.transform(&loader, "game/a", &encode(&player)?))?;

    assert_eq!(woven.interfaces, vec!["hooks/Player"]);
    assert_eq!(
        body(&woven, "getHealth"),
        vec![
            Insn::var(ALOAD, 0),
            Insn::field(GETFIELD, "game/a", "b", "I"),
            Insn::Simple(IRETURN),
        ]
    );
    assert_eq!(
        body(&woven, "setHealth"),
        vec![
            Insn::var(ALOAD, 0),
            Insn::var(ILOAD, 1),
            Insn::field(PUTFIELD, "game/a", "b", "I"),
            Insn::Simple(RETURN),
        ]
    );
    let getter = woven.method("getHealth", "()I").unwrap();
    assert!(getter.access.contains(AccessFlags::PUBLIC));
    assert!(failures.lock().unwrap().is_empty());
    Ok(())
}

#[test]
fn field_generator_conflict_keeps_original() -> Result<()> {
    let (mut builder, failures) = builder();
    builder.register_accessor(
        ContractDescriptor::builder("hooks/Player", "player").member(
            MemberDescriptor::field_generator("getTag", "()Ljava/lang/String;", "tag"),
        ),
    )?;
    let bootstrapper = builder.initialize();
    let loader = MemoryClassLoader::new("game").into_ref();

    let mut player = class("game/a");
    player.fields.push(FieldNode::new(AccessFlags::PRIVATE, "tag", "I"));
    let original = encode(&player)?;

    assert_eq!(bootstrapper.transform(&loader, "game/a", &original), original);
    assert_eq!(*failures.lock().unwrap(), vec!["Compatibility".to_string()]);
    assert!(matches!(
        bootstrapper.try_transform(&loader, "game/a", &original),
        Err(Error::FieldGeneratorTaken { .. })
    ));
    Ok(())
}

#[test]
fn competing_field_generators() -> Result<()> {
    let (mut builder, failures) = builder();
    builder.register_accessor(
        ContractDescriptor::builder("hooks/Player", "player").member(
            MemberDescriptor::field_generator("getTag", "()Ljava/lang/String;", "tag"),
        ),
    )?;
    builder.register_accessor(
        ContractDescriptor::builder("hooks/Counted", "player")
            .member(MemberDescriptor::field_generator("getTagCount", "()I", "tag")),
    )?;
    let bootstrapper = builder.initialize();
    let loader = MemoryClassLoader::new("game").into_ref();
    let original = encode(&class("game/a"))?;

    assert!(matches!(
        bootstrapper.try_transform(&loader, "game/a", &original),
        Err(Error::FieldGeneratorTaken { ref field, .. }) if field == "tag"
    ));
    assert_eq!(bootstrapper.transform(&loader, "game/a", &original), original);
    assert_eq!(failures.lock().unwrap().len(), 1);

    let mut builder = BootstrapBuilder::new();
    builder.register_class_mapper("game", |id: &str, _: SearchPurpose| {
        (id == "player").then(|| ClassIdentifier::names(["game/a"]))
    });
    builder.register_field_mapper("game", |id: &str, _: SearchPurpose| {
        (id == "tag").then(|| {
            FieldIdentifier::descriptions([ElementDescription::new("tag", "Ljava/lang/String;")])
        })
    });
    builder.register_accessor(
        ContractDescriptor::builder("hooks/Player", "player").member(
            MemberDescriptor::field_generator("getTag", "()Ljava/lang/String;", "tag"),
        ),
    )?;
    let woven = decode(&builder.initialize().transform(&loader, "game/a", &original))?;
    let tag = woven.field("tag", "Ljava/lang/String;").unwrap();
    assert!(tag.access.contains(AccessFlags::PUBLIC));
    Ok(())
}

#[test]
fn reference_fields_without_a_hierarchy() -> Result<()> {
    let (mut builder, failures) = builder();
    builder.register_accessor(
        ContractDescriptor::builder("hooks/Player", "player")
            .member(MemberDescriptor::field_accessor(
                "getName",
                "()Ljava/lang/String;",
                "tag",
            ))
            .member(MemberDescriptor::field_generator(
                "getTag",
                "()Ljava/lang/String;",
                "tag",
            )),
    )?;
    let bootstrapper = builder.initialize();
    // Neither the loader nor a locator can serve java/lang/String.
    let loader = MemoryClassLoader::new("game").into_ref();

    let mut player = class("game/a");
    player
        .fields
        .push(FieldNode::new(AccessFlags::PRIVATE, "tag", "Ljava/lang/String;"));
    let woven = decode(&bootstrapper.transform(&loader, "game/a", &encode(&player)?))?;

    assert_eq!(woven.fields.len(), 1);
    let read = vec![
        Insn::var(ALOAD, 0),
        Insn::field(GETFIELD, "game/a", "tag", "Ljava/lang/String;"),
        Insn::Simple(ARETURN),
    ];
    assert_eq!(body(&woven, "getName"), read);
    assert_eq!(body(&woven, "getTag"), read);
    assert!(failures.lock().unwrap().is_empty());
    Ok(())
}

#[test]
fn contract_arguments_substitute_identified_classes() -> Result<()> {
    let (mut builder, failures) = builder();
    builder.register_accessor(ContractDescriptor::builder("hooks/Part", "part"))?;
    builder.register_accessor(
        ContractDescriptor::builder("hooks/Player", "player").member(
            MemberDescriptor::method_accessor("attach", "(Lhooks/Part;)V", "attach"),
        ),
    )?;
    let bootstrapper = builder.initialize();

    let loader = MemoryClassLoader::new("game");
    loader.insert_class("game/p", encode(&class("game/p"))?);
    loader.insert_class("game/q", encode(&class("game/q"))?);
    let loader = loader.into_ref();

    let mut accepted = class("game/a");
    accepted
        .methods
        .push(method("c", "(Lgame/p;)V", vec![Insn::Simple(RETURN)]));
    let woven = decode(&bootstrapper.transform(&loader, "game/a", &encode(&accepted)?))?;
    assert_eq!(
        body(&woven, "attach"),
        vec![
            Insn::var(ALOAD, 0),
            Insn::var(ALOAD, 1),
            Insn::type_insn(CHECKCAST, "game/p"),
            Insn::method(INVOKEVIRTUAL, "game/a", "c", "(Lgame/p;)V", false),
            Insn::Simple(RETURN),
        ]
    );

    let mut rejected = class("game/a");
    rejected
        .methods
        .push(method("c", "(Lgame/q;)V", vec![Insn::Simple(RETURN)]));
    let original = encode(&rejected)?;
    assert!(matches!(
        bootstrapper.try_transform(&loader, "game/a", &original),
        Err(Error::IncompatibleType { .. })
    ));
    assert!(failures.lock().unwrap().is_empty());
    Ok(())
}

#[test]
fn batches_keep_their_order() -> Result<()> {
    let (mut builder, _) = builder();
    builder.register_accessor(ContractDescriptor::builder("hooks/Player", "player"))?;
    let bootstrapper = builder.initialize();
    let loader = MemoryClassLoader::new("game").into_ref();

    let names = ["game/w", "game/x", "game/a", "game/y", "game/z"];
    let mut batch = Vec::with_capacity(names.len());
    for name in names {
        batch.push((name.to_string(), encode(&class(name))?));
    }
    let out = bootstrapper.transform_all(&loader, &batch);

    assert_eq!(out.len(), names.len());
    for (index, (name, original)) in batch.iter().enumerate() {
        let decoded = decode(&out[index])?;
        assert_eq!(decoded.name, *name);
        if name == "game/a" {
            assert_eq!(decoded.interfaces, vec!["hooks/Player"]);
        } else {
            assert_eq!(out[index], *original);
        }
    }
    Ok(())
}

#[test]
fn parallel_batches_seed_the_topology() -> Result<()> {
    let (mut builder, failures) = builder();
    builder.register_accessor(ContractDescriptor::builder("hooks/Player", "player"))?;
    let bootstrapper = builder.initialize();

    let mut batch = Vec::with_capacity(64);
    for index in 0..64 {
        let name = format!("game/c{index}");
        batch.push((name.clone(), encode(&class(&name))?));
    }

    for _ in 0..20 {
        let loader = MemoryClassLoader::new("game").into_ref();
        let out = bootstrapper.transform_all(&loader, &batch);
        assert_eq!(out.len(), batch.len());
        for (name, _) in &batch {
            assert!(bootstrapper.topology().get_class(&loader, name)?.is_some(), "{name}");
        }
    }
    assert!(failures.lock().unwrap().is_empty());
    Ok(())
}

#[test]
fn unmodified_classes_survive_the_codec() -> Result<()> {
    let mut node = class("game/r");
    node.fields.push(FieldNode::new(AccessFlags::PRIVATE, "v", "J"));
    node.methods.push(method(
        "twice",
        "(J)J",
        vec![
            Insn::var(LLOAD, 1),
            Insn::push_int(2),
            Insn::Simple(I2L),
            Insn::Simple(LMUL),
            Insn::Simple(LRETURN),
        ],
    ));
    let first = encode(&node)?;
    let decoded = decode(&first)?;
    assert_eq!(decoded.name, "game/r");
    assert_eq!(decoded.fields.len(), 1);
    assert_eq!(body(&decoded, "twice"), body(&node, "twice"));

    let second = encode(&decoded)?;
    assert_eq!(decode(&second)?.methods.len(), node.methods.len());
    Ok(())
}
