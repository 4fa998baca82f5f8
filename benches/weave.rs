//! Benchmarks for the weaving pipeline.
//!
//! - Class-file decoding and encoding of an unmodified class
//! - Generic signature parsing
//! - Weaving a field accessor and an interceptor through the bootstrapper
//! - Passing through a class no contract targets

extern crate classweave;

use classweave::{
    analysis::ObjectHierarchy,
    classfile::{opcodes::*, Code, InsnList, LabelId, LocalVariableNode},
    prelude::*,
    signature::parse_signature,
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

const CTX: &str = "Lclassweave/runtime/v1/InterceptorContext";

/// `game/a` with `int b`, `int run(int value)` and `count` filler methods.
fn target(name: &str, count: usize) -> Vec<u8> {
    let mut node = ClassNode::new(
        52,
        AccessFlags::PUBLIC | AccessFlags::SUPER,
        name,
        Some("java/lang/Object"),
    );
    node.fields.push(FieldNode::new(AccessFlags::PRIVATE, "b", "I"));

    let mut run = MethodNode::new(AccessFlags::PUBLIC, "run", "(I)I");
    let instructions: InsnList = vec![
        Insn::Label(LabelId(0)),
        Insn::var(ILOAD, 1),
        Insn::push_int(3),
        Insn::Simple(IMUL),
        Insn::Simple(IRETURN),
        Insn::Label(LabelId(1)),
    ]
    .into_iter()
    .collect();
    run.set_code(Code {
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
    node.methods.push(run);

    for index in 0..count {
        let mut filler = MethodNode::new(AccessFlags::PUBLIC, &format!("m{index}"), "(J)J");
        filler.set_code(Code {
            instructions: vec![
                Insn::var(LLOAD, 1),
                Insn::var(LLOAD, 1),
                Insn::Simple(LADD),
                Insn::Simple(LRETURN),
            ]
            .into_iter()
            .collect(),
            ..Code::default()
        });
        node.methods.push(filler);
    }
    ClassWriter::new(&ObjectHierarchy).write(&node).unwrap()
}

fn bootstrapper() -> Bootstrapper {
    let mut builder = BootstrapBuilder::new();
    builder.register_class_mapper("game", |id: &str, _: SearchPurpose| {
        (id == "player").then(|| ClassIdentifier::names(["game/a"]))
    });
    builder.register_field_mapper("game", |id: &str, _: SearchPurpose| {
        (id == "health").then(|| FieldIdentifier::descriptions([ElementDescription::new("b", "I")]))
    });
    builder.register_method_mapper("game", |id: &str, _: SearchPurpose| {
        (id == "run").then(|| MethodIdentifier::descriptions([ElementDescription::new("run", "(I)I")]))
    });
    builder.register_instruction_mapper("game", |id: &str, _: SearchPurpose| match id {
        "return" => Some(builtin::first_return(0)),
        "value" => Some(builtin::local_by_name(vec!["value".into()])),
        _ => None,
    });
    builder
        .register_accessor(
            ContractDescriptor::builder("hooks/Player", "player")
                .member(MemberDescriptor::field_accessor("getHealth", "()I", "health"))
                .member(
                    MemberDescriptor::interceptor("onRun", &format!("({CTX};I)V"), "run", "return")
                        .with_signature(&format!("({CTX}<Ljava/lang/Integer;>;I)V"))
                        .with_local(1, "value"),
                ),
        )
        .unwrap();
    builder.initialize()
}

/// Benchmark decoding a class with 32 methods.
fn bench_read_class(c: &mut Criterion) {
    let data = target("game/a", 32);

    c.bench_function("classfile_read", |b| {
        b.iter(|| {
            let node = ClassReader::new(black_box(&data))
                .read(ReaderFlags::empty())
                .unwrap();
            black_box(node)
        });
    });
}

/// Benchmark encoding a class with 32 methods, frames included.
fn bench_write_class(c: &mut Criterion) {
    let node = ClassReader::new(&target("game/a", 32))
        .read(ReaderFlags::empty())
        .unwrap();

    c.bench_function("classfile_write", |b| {
        b.iter(|| {
            let data = ClassWriter::new(&ObjectHierarchy)
                .write(black_box(&node))
                .unwrap();
            black_box(data)
        });
    });
}

/// Benchmark parsing a generic method signature with bounded formals and wildcards.
fn bench_parse_signature(c: &mut Criterion) {
    let signature =
        "<K:Ljava/lang/Object;V::Ljava/lang/Comparable<TV;>;>(Ljava/util/Map<TK;+TV;>;[[I)Ljava/util/List<-TV;>;^Ljava/io/IOException;";

    c.bench_function("signature_parse", |b| {
        b.iter(|| {
            let parsed = parse_signature(black_box(signature)).unwrap();
            black_box(parsed)
        });
    });
}

/// Benchmark weaving a field accessor and an interceptor into a matching class.
fn bench_weave_matching(c: &mut Criterion) {
    let bootstrapper = bootstrapper();
    let loader = MemoryClassLoader::new("game").into_ref();
    let data = target("game/a", 8);

    c.bench_function("weave_matching", |b| {
        b.iter(|| {
            let woven = bootstrapper.transform(&loader, "game/a", black_box(&data));
            black_box(woven)
        });
    });
}

/// Benchmark passing through a class no contract targets.
fn bench_weave_unmatched(c: &mut Criterion) {
    let bootstrapper = bootstrapper();
    let loader = MemoryClassLoader::new("game").into_ref();
    let data = target("game/z", 8);

    c.bench_function("weave_unmatched", |b| {
        b.iter(|| {
            let woven = bootstrapper.transform(&loader, "game/z", black_box(&data));
            black_box(woven)
        });
    });
}

/// Benchmark a batch of 64 classes, one of them matching.
fn bench_weave_batch(c: &mut Criterion) {
    let bootstrapper = bootstrapper();
    let loader = MemoryClassLoader::new("game").into_ref();
    let batch: Vec<(String, Vec<u8>)> = (0..64)
        .map(|index| {
            let name = if index == 0 {
                "game/a".to_string()
            } else {
                format!("game/c{index}")
            };
            let data = target(&name, 4);
            (name, data)
        })
        .collect();

    c.bench_function("weave_batch_64", |b| {
        b.iter(|| {
            let woven = bootstrapper.transform_all(&loader, black_box(&batch));
            black_box(woven)
        });
    });
}

criterion_group!(
    benches,
    bench_read_class,
    bench_write_class,
    bench_parse_signature,
    bench_weave_matching,
    bench_weave_unmatched,
    bench_weave_batch,
);
criterion_main!(benches);
