//! Class-file encoding.
//!
//! [`ClassWriter`] serializes a [`ClassNode`]. The constant pool of the decoded class is kept
//! index-for-index and new entries are only appended, so raw attributes and untouched method
//! bodies are copied without re-encoding. Bodies that were edited are assembled from their
//! instruction list; `max_stack`, `max_locals` and the `StackMapTable` are recomputed.
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use classweave::analysis::ObjectHierarchy;
//! use classweave::classfile::ClassWriter;
//!
//! let bytes = ClassWriter::new(&ObjectHierarchy).write(&node)?;
//! # Ok::<(), classweave::Error>(())
//! ```

use std::collections::HashMap;

use crate::{
    analysis::{
        stackmap::encode_stack_map_table, Analyzer, BasicInterpreter, TypeHierarchy,
        VerifierInterpreter,
    },
    classfile::{
        annotation::{write_annotations, write_parameter_annotations},
        constpool::{Constant, ConstantPoolBuilder},
        descriptor::MethodType,
        insn::{Insn, LabelId, LdcValue},
        nodes::{Attribute, ClassNode, Code, FieldNode, MethodNode},
        opcodes::*,
    },
    file::{io::push_be, CLASS_MAGIC},
    Error, Result,
};

/// First class-file version that requires `StackMapTable` frames.
const FRAMES_VERSION: u16 = 50;

/// Encodes [`ClassNode`]s into class-file bytes.
pub struct ClassWriter<'h> {
    hierarchy: &'h dyn TypeHierarchy,
    compute_frames: bool,
}

impl<'h> ClassWriter<'h> {
    /// Create a writer that merges reference types through `hierarchy`.
    #[must_use]
    pub fn new(hierarchy: &'h dyn TypeHierarchy) -> Self {
        ClassWriter {
            hierarchy,
            compute_frames: true,
        }
    }

    /// Enable or disable `StackMapTable` computation for assembled bodies.
    #[must_use]
    pub fn compute_frames(mut self, compute: bool) -> Self {
        self.compute_frames = compute;
        self
    }

    /// Serialize `class`.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] if a limit of the format is exceeded or an edited
    /// body contains unreachable code, and [`crate::Error::Malformed`] if an edited body is
    /// inconsistent.
    pub fn write(&self, class: &ClassNode) -> Result<Vec<u8>> {
        let mut pool = ConstantPoolBuilder::from_pool(class.constant_pool());
        let mut body = Vec::with_capacity(4096);

        push_be(&mut body, class.access.bits());
        push_be(&mut body, pool.class(&class.name)?);
        match &class.super_name {
            Some(name) => push_be(&mut body, pool.class(name)?),
            None => push_be(&mut body, 0_u16),
        }
        push_be(&mut body, class.interfaces.len() as u16);
        for interface in &class.interfaces {
            push_be(&mut body, pool.class(interface)?);
        }

        push_be(&mut body, class.fields.len() as u16);
        for field in &class.fields {
            write_field(&mut body, field, &mut pool)?;
        }

        push_be(&mut body, class.methods.len() as u16);
        for method in &class.methods {
            self.write_method(&mut body, class, method, &mut pool)?;
        }

        let mut attributes: Vec<(u16, Vec<u8>)> = Vec::new();
        if let Some(signature) = &class.signature {
            attributes.push(signature_attribute(signature, &mut pool)?);
        }
        if !class.visible_annotations.is_empty() {
            let mut data = Vec::new();
            write_annotations(&mut data, &class.visible_annotations, &mut pool)?;
            attributes.push((pool.utf8("RuntimeVisibleAnnotations")?, data));
        }
        if !class.inner_classes.is_empty() {
            let mut data = Vec::new();
            push_be(&mut data, class.inner_classes.len() as u16);
            for inner in &class.inner_classes {
                push_be(&mut data, pool.class(&inner.name)?);
                match &inner.outer_name {
                    Some(outer) => push_be(&mut data, pool.class(outer)?),
                    None => push_be(&mut data, 0_u16),
                }
                match &inner.inner_name {
                    Some(simple) => push_be(&mut data, pool.utf8(simple)?),
                    None => push_be(&mut data, 0_u16),
                }
                push_be(&mut data, inner.access.bits());
            }
            attributes.push((pool.utf8("InnerClasses")?, data));
        }
        if let Some(enclosing) = &class.enclosing_method {
            let mut data = Vec::new();
            push_be(&mut data, pool.class(&enclosing.owner)?);
            match &enclosing.method {
                Some((name, desc)) => push_be(&mut data, pool.name_and_type(name, desc)?),
                None => push_be(&mut data, 0_u16),
            }
            attributes.push((pool.utf8("EnclosingMethod")?, data));
        }
        attributes.extend(raw_attributes(&class.attributes, &mut pool)?);
        write_attributes(&mut body, &attributes);

        let pool_bytes = pool.to_bytes();
        let mut out = Vec::with_capacity(8 + pool_bytes.len() + body.len());
        push_be(&mut out, CLASS_MAGIC);
        push_be(&mut out, class.minor_version);
        push_be(&mut out, class.major_version);
        out.extend_from_slice(&pool_bytes);
        out.extend_from_slice(&body);
        Ok(out)
    }

    fn write_method(
        &self,
        out: &mut Vec<u8>,
        class: &ClassNode,
        method: &MethodNode,
        pool: &mut ConstantPoolBuilder,
    ) -> Result<()> {
        push_be(out, method.access.bits());
        push_be(out, pool.utf8(&method.name)?);
        push_be(out, pool.utf8(&method.desc)?);

        let mut attributes: Vec<(u16, Vec<u8>)> = Vec::new();
        if let Some(verbatim) = method.verbatim_code() {
            attributes.push((pool.utf8("Code")?, verbatim.to_vec()));
        } else if let Some(code) = method.code() {
            let data = self.assemble(class, method, code, pool)?;
            attributes.push((pool.utf8("Code")?, data));
        }
        if !method.exceptions.is_empty() {
            let mut data = Vec::new();
            push_be(&mut data, method.exceptions.len() as u16);
            for exception in &method.exceptions {
                push_be(&mut data, pool.class(exception)?);
            }
            attributes.push((pool.utf8("Exceptions")?, data));
        }
        if let Some(signature) = &method.signature {
            attributes.push(signature_attribute(signature, pool)?);
        }
        if !method.visible_annotations.is_empty() {
            let mut data = Vec::new();
            write_annotations(&mut data, &method.visible_annotations, pool)?;
            attributes.push((pool.utf8("RuntimeVisibleAnnotations")?, data));
        }
        if method
            .visible_parameter_annotations
            .iter()
            .any(|annotations| !annotations.is_empty())
        {
            let mut data = Vec::new();
            write_parameter_annotations(&mut data, &method.visible_parameter_annotations, pool)?;
            attributes.push((pool.utf8("RuntimeVisibleParameterAnnotations")?, data));
        }
        attributes.extend(raw_attributes(&method.attributes, pool)?);
        write_attributes(out, &attributes);
        Ok(())
    }

    /// Assemble a `Code` attribute body.
    fn assemble(
        &self,
        class: &ClassNode,
        method: &MethodNode,
        code: &Code,
        pool: &mut ConstantPoolBuilder,
    ) -> Result<Vec<u8>> {
        let encoded = CodeEncoder::new(pool).encode(code)?;

        let with_frames = self.compute_frames && class.major_version >= FRAMES_VERSION;
        let (max_stack, max_locals, stack_map) = if with_frames {
            let analysis = Analyzer::new(VerifierInterpreter::new(self.hierarchy))
                .analyze(&class.name, method)?;
            for (insn, frame) in code.instructions.iter().zip(&analysis.frames) {
                if frame.is_none() && !insn.is_pseudo() {
                    return Err(Error::NotSupported(format!(
                        "unreachable code in {}",
                        method.display_name(&class.name)
                    )));
                }
            }
            let stack_map = encode_stack_map_table(code, &analysis, &encoded.offsets, pool)?;
            (analysis.max_stack, analysis.max_locals, stack_map)
        } else {
            let analysis = Analyzer::new(BasicInterpreter).analyze(&class.name, method)?;
            (analysis.max_stack, analysis.max_locals, None)
        };

        let max_stack = u16::try_from(max_stack)
            .map_err(|_| Error::NotSupported("operand stack exceeds 65535 words".to_string()))?;
        let max_locals = u16::try_from(max_locals)
            .map_err(|_| Error::NotSupported("local variables exceed 65535 slots".to_string()))?;

        let mut out = Vec::with_capacity(encoded.bytes.len() + 64);
        push_be(&mut out, max_stack);
        push_be(&mut out, max_locals);
        push_be(&mut out, encoded.bytes.len() as u32);
        out.extend_from_slice(&encoded.bytes);

        push_be(&mut out, code.try_catch_blocks.len() as u16);
        for block in &code.try_catch_blocks {
            push_be(&mut out, encoded.offset_of(block.start)?);
            push_be(&mut out, encoded.offset_of(block.end)?);
            push_be(&mut out, encoded.offset_of(block.handler)?);
            match &block.catch_type {
                Some(catch_type) => push_be(&mut out, pool.class(catch_type)?),
                None => push_be(&mut out, 0_u16),
            }
        }

        let mut attributes: Vec<(u16, Vec<u8>)> = Vec::new();
        let mut lines: Vec<(u16, u16)> = Vec::new();
        for insn in &code.instructions {
            if let Insn::LineNumber { line, start } = insn {
                lines.push((encoded.offset_of(*start)?, *line));
            }
        }
        if !lines.is_empty() {
            let mut data = Vec::new();
            push_be(&mut data, lines.len() as u16);
            for (start, line) in lines {
                push_be(&mut data, start);
                push_be(&mut data, line);
            }
            attributes.push((pool.utf8("LineNumberTable")?, data));
        }

        if !code.local_variables.is_empty() {
            let mut table = Vec::new();
            let mut type_table = Vec::new();
            let mut typed = 0_u16;
            for local in &code.local_variables {
                let start = encoded.offset_of(local.start)?;
                let end = encoded.offset_of(local.end)?;
                let length = end.checked_sub(start).ok_or_else(|| {
                    malformed_error!("Local variable {} ends before it starts", local.name)
                })?;
                push_be(&mut table, start);
                push_be(&mut table, length);
                push_be(&mut table, pool.utf8(&local.name)?);
                push_be(&mut table, pool.utf8(&local.desc)?);
                push_be(&mut table, local.index);
                if let Some(signature) = &local.signature {
                    push_be(&mut type_table, start);
                    push_be(&mut type_table, length);
                    push_be(&mut type_table, pool.utf8(&local.name)?);
                    push_be(&mut type_table, pool.utf8(signature)?);
                    push_be(&mut type_table, local.index);
                    typed += 1;
                }
            }
            let mut data = Vec::with_capacity(table.len() + 2);
            push_be(&mut data, code.local_variables.len() as u16);
            data.extend_from_slice(&table);
            attributes.push((pool.utf8("LocalVariableTable")?, data));
            if typed > 0 {
                let mut data = Vec::with_capacity(type_table.len() + 2);
                push_be(&mut data, typed);
                data.extend_from_slice(&type_table);
                attributes.push((pool.utf8("LocalVariableTypeTable")?, data));
            }
        }

        if let Some(stack_map) = stack_map {
            attributes.push((pool.utf8("StackMapTable")?, stack_map));
        }
        write_attributes(&mut out, &attributes);
        Ok(out)
    }
}

fn write_field(out: &mut Vec<u8>, field: &FieldNode, pool: &mut ConstantPoolBuilder) -> Result<()> {
    push_be(out, field.access.bits());
    push_be(out, pool.utf8(&field.name)?);
    push_be(out, pool.utf8(&field.desc)?);

    let mut attributes: Vec<(u16, Vec<u8>)> = Vec::new();
    if let Some(signature) = &field.signature {
        attributes.push(signature_attribute(signature, pool)?);
    }
    if !field.visible_annotations.is_empty() {
        let mut data = Vec::new();
        write_annotations(&mut data, &field.visible_annotations, pool)?;
        attributes.push((pool.utf8("RuntimeVisibleAnnotations")?, data));
    }
    attributes.extend(raw_attributes(&field.attributes, pool)?);
    write_attributes(out, &attributes);
    Ok(())
}

fn signature_attribute(signature: &str, pool: &mut ConstantPoolBuilder) -> Result<(u16, Vec<u8>)> {
    let mut data = Vec::with_capacity(2);
    push_be(&mut data, pool.utf8(signature)?);
    Ok((pool.utf8("Signature")?, data))
}

fn raw_attributes(
    attributes: &[Attribute],
    pool: &mut ConstantPoolBuilder,
) -> Result<Vec<(u16, Vec<u8>)>> {
    attributes
        .iter()
        .map(|attribute| Ok((pool.utf8(&attribute.name)?, attribute.data.clone())))
        .collect()
}

fn write_attributes(out: &mut Vec<u8>, attributes: &[(u16, Vec<u8>)]) {
    push_be(out, attributes.len() as u16);
    for (name, data) in attributes {
        push_be(out, *name);
        push_be(out, data.len() as u32);
        out.extend_from_slice(data);
    }
}

/// Bytecode of an assembled body, with the offset of every node of its instruction list.
struct EncodedCode {
    bytes: Vec<u8>,
    offsets: Vec<u32>,
    labels: HashMap<LabelId, u32>,
}

impl EncodedCode {
    fn offset_of(&self, label: LabelId) -> Result<u16> {
        match self.labels.get(&label) {
            Some(offset) => Ok(*offset as u16),
            None => Err(malformed_error!("Undefined label L{}", label.0)),
        }
    }
}

/// A branch operand to patch once every label has an offset.
struct Fixup {
    /// Offset of the branching instruction
    base: u32,
    /// Position of the operand in the output
    at: usize,
    target: LabelId,
    wide: bool,
}

struct CodeEncoder<'p> {
    pool: &'p mut ConstantPoolBuilder,
    bytes: Vec<u8>,
    fixups: Vec<Fixup>,
}

impl<'p> CodeEncoder<'p> {
    fn new(pool: &'p mut ConstantPoolBuilder) -> Self {
        CodeEncoder {
            pool,
            bytes: Vec::new(),
            fixups: Vec::new(),
        }
    }

    fn encode(mut self, code: &Code) -> Result<EncodedCode> {
        let mut offsets = Vec::with_capacity(code.instructions.len() + 1);
        let mut labels = HashMap::new();
        for insn in &code.instructions {
            let offset = self.bytes.len() as u32;
            offsets.push(offset);
            if let Insn::Label(label) = insn {
                labels.insert(*label, offset);
            }
            self.insn(insn, offset)?;
        }

        if self.bytes.is_empty() {
            return Err(malformed_error!("Empty method body"));
        }
        if self.bytes.len() > usize::from(u16::MAX) {
            return Err(Error::NotSupported(
                "method body exceeds 65535 bytes".to_string(),
            ));
        }

        for fixup in &self.fixups {
            let Some(target) = labels.get(&fixup.target) else {
                return Err(malformed_error!("Undefined label L{}", fixup.target.0));
            };
            let delta = i64::from(*target) - i64::from(fixup.base);
            if fixup.wide {
                let bytes = (delta as i32).to_be_bytes();
                self.bytes[fixup.at..fixup.at + 4].copy_from_slice(&bytes);
            } else {
                let delta = i16::try_from(delta).map_err(|_| {
                    Error::NotSupported(format!("branch offset {delta} exceeds 16 bits"))
                })?;
                self.bytes[fixup.at..fixup.at + 2].copy_from_slice(&delta.to_be_bytes());
            }
        }

        Ok(EncodedCode {
            bytes: self.bytes,
            offsets,
            labels,
        })
    }

    fn branch(&mut self, base: u32, target: LabelId, wide: bool) {
        self.fixups.push(Fixup {
            base,
            at: self.bytes.len(),
            target,
            wide,
        });
        if wide {
            push_be(&mut self.bytes, 0_i32);
        } else {
            push_be(&mut self.bytes, 0_i16);
        }
    }

    fn insn(&mut self, insn: &Insn, offset: u32) -> Result<()> {
        let out = &mut self.bytes;
        match insn {
            Insn::Label(_) | Insn::LineNumber { .. } => {}
            Insn::Simple(opcode) => push_be(out, *opcode),
            Insn::Int { opcode, operand } => {
                push_be(out, *opcode);
                match *opcode {
                    SIPUSH => push_be(out, *operand as i16),
                    BIPUSH => push_be(out, *operand as i8),
                    _ => push_be(out, *operand as u8),
                }
            }
            Insn::Var { opcode, var } => {
                if *var <= 3 && *opcode != RET {
                    let short = if *opcode >= ISTORE {
                        ISTORE_0 + (*opcode - ISTORE) * 4
                    } else {
                        ILOAD_0 + (*opcode - ILOAD) * 4
                    };
                    push_be(out, short + *var as u8);
                } else if *var <= 0xFF {
                    push_be(out, *opcode);
                    push_be(out, *var as u8);
                } else {
                    push_be(out, WIDE);
                    push_be(out, *opcode);
                    push_be(out, *var);
                }
            }
            Insn::Iinc { var, incr } => {
                if *var <= 0xFF && i8::try_from(*incr).is_ok() {
                    push_be(out, IINC);
                    push_be(out, *var as u8);
                    push_be(out, *incr as i8);
                } else {
                    push_be(out, WIDE);
                    push_be(out, IINC);
                    push_be(out, *var);
                    push_be(out, *incr);
                }
            }
            Insn::Type { opcode, class } => {
                let index = self.pool.class(class)?;
                push_be(&mut self.bytes, *opcode);
                push_be(&mut self.bytes, index);
            }
            Insn::Field {
                opcode,
                owner,
                name,
                desc,
            } => {
                let index = self.pool.field_ref(owner, name, desc)?;
                push_be(&mut self.bytes, *opcode);
                push_be(&mut self.bytes, index);
            }
            Insn::Method {
                opcode,
                owner,
                name,
                desc,
                interface,
            } => {
                let index = self.pool.method_ref(owner, name, desc, *interface)?;
                push_be(&mut self.bytes, *opcode);
                push_be(&mut self.bytes, index);
                if *opcode == INVOKEINTERFACE {
                    let count = MethodType::parse(desc)?.argument_slots() + 1;
                    push_be(&mut self.bytes, count as u8);
                    push_be(&mut self.bytes, 0_u8);
                }
            }
            Insn::InvokeDynamic { index, .. } => {
                push_be(out, INVOKEDYNAMIC);
                push_be(out, *index);
                push_be(out, 0_u16);
            }
            Insn::Jump { opcode, target } => {
                push_be(out, *opcode);
                self.branch(offset, *target, false);
            }
            Insn::Ldc(value) => self.ldc(value)?,
            Insn::TableSwitch {
                min,
                max,
                default,
                targets,
            } => {
                push_be(out, TABLESWITCH);
                self.pad();
                self.branch(offset, *default, true);
                push_be(&mut self.bytes, *min);
                push_be(&mut self.bytes, *max);
                for target in targets {
                    self.branch(offset, *target, true);
                }
            }
            Insn::LookupSwitch { default, pairs } => {
                push_be(out, LOOKUPSWITCH);
                self.pad();
                self.branch(offset, *default, true);
                push_be(&mut self.bytes, pairs.len() as i32);
                for (key, target) in pairs {
                    push_be(&mut self.bytes, *key);
                    self.branch(offset, *target, true);
                }
            }
            Insn::MultiANewArray { desc, dims } => {
                let index = self.pool.class(desc)?;
                push_be(&mut self.bytes, MULTIANEWARRAY);
                push_be(&mut self.bytes, index);
                push_be(&mut self.bytes, *dims);
            }
        }
        Ok(())
    }

    fn pad(&mut self) {
        while self.bytes.len() % 4 != 0 {
            self.bytes.push(0);
        }
    }

    fn ldc(&mut self, value: &LdcValue) -> Result<()> {
        let (index, wide) = match value {
            LdcValue::Int(value) => (self.pool.add(Constant::Integer(*value))?, false),
            LdcValue::Float(bits) => (self.pool.add(Constant::Float(*bits))?, false),
            LdcValue::Long(value) => (self.pool.add(Constant::Long(*value))?, true),
            LdcValue::Double(bits) => (self.pool.add(Constant::Double(*bits))?, true),
            LdcValue::String(value) => (self.pool.string(value)?, false),
            LdcValue::Class(name) => (self.pool.class(name)?, false),
            LdcValue::MethodType(index) | LdcValue::MethodHandle(index) => (*index, false),
            LdcValue::Dynamic { index, descriptor } => {
                (*index, descriptor == "J" || descriptor == "D")
            }
        };

        if wide {
            push_be(&mut self.bytes, LDC2_W);
            push_be(&mut self.bytes, index);
        } else if index <= 0xFF {
            push_be(&mut self.bytes, LDC);
            push_be(&mut self.bytes, index as u8);
        } else {
            push_be(&mut self.bytes, LDC_W);
            push_be(&mut self.bytes, index);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::ObjectHierarchy,
        classfile::{
            access::AccessFlags,
            insn::InsnList,
            nodes::TryCatchBlock,
            reader::{ClassReader, ReaderFlags},
        },
    };

    fn class_with(method: MethodNode) -> ClassNode {
        let mut class = ClassNode::new(52, AccessFlags::PUBLIC | AccessFlags::SUPER, "a/B", Some("java/lang/Object"));
        class.methods.push(method);
        class
    }

    fn body(access: AccessFlags, desc: &str, insns: Vec<Insn>) -> MethodNode {
        let mut method = MethodNode::new(access, "run", desc);
        method.set_code(Code {
            instructions: insns.into_iter().collect::<InsnList>(),
            ..Code::default()
        });
        method
    }

    #[test]
    fn test_write_and_read_back() {
        let method = body(
            AccessFlags::PUBLIC | AccessFlags::STATIC,
            "(I)I",
            vec![
                Insn::Var { opcode: ILOAD, var: 0 },
                Insn::Jump {
                    opcode: IFEQ,
                    target: LabelId(0),
                },
                Insn::Ldc(LdcValue::String("hello".into())),
                Insn::Simple(POP),
                Insn::Simple(ICONST_1),
                Insn::Simple(IRETURN),
                Insn::Label(LabelId(0)),
                Insn::Simple(ICONST_0),
                Insn::Simple(IRETURN),
            ],
        );
        let mut class = class_with(method);
        class.interfaces.push("java/io/Serializable".into());
        class.signature = Some("Ljava/lang/Object;".into());

        let bytes = ClassWriter::new(&ObjectHierarchy).write(&class).unwrap();
        let read = ClassReader::new(&bytes).read(ReaderFlags::empty()).unwrap();

        assert_eq!(read.name, "a/B");
        assert_eq!(read.interfaces, vec!["java/io/Serializable".to_string()]);
        assert_eq!(read.signature.as_deref(), Some("Ljava/lang/Object;"));
        let method = read.method("run", "(I)I").unwrap();
        let code = method.code().unwrap();
        assert_eq!(code.max_stack, 1);
        assert_eq!(code.max_locals, 1);
        assert!(method.attributes.is_empty());
        assert!(code
            .instructions
            .iter()
            .any(|insn| *insn == Insn::Ldc(LdcValue::String("hello".into()))));
    }

    #[test]
    fn test_verbatim_code_survives_rewrite() {
        let method = body(
            AccessFlags::STATIC,
            "()V",
            vec![Insn::Simple(RETURN)],
        );
        let bytes = ClassWriter::new(&ObjectHierarchy)
            .write(&class_with(method))
            .unwrap();

        let read = ClassReader::new(&bytes).read(ReaderFlags::SKIP_CODE).unwrap();
        assert!(read.methods[0].code().is_none());
        let again = ClassWriter::new(&ObjectHierarchy).write(&read).unwrap();
        assert_eq!(again, bytes);
    }

    #[test]
    fn test_unreachable_code_is_rejected() {
        let method = body(
            AccessFlags::STATIC,
            "()V",
            vec![Insn::Simple(RETURN), Insn::Simple(NOP), Insn::Simple(RETURN)],
        );
        let result = ClassWriter::new(&ObjectHierarchy).write(&class_with(method));
        assert!(matches!(result, Err(Error::NotSupported(_))));
    }

    #[test]
    fn test_old_versions_skip_frames() {
        let method = body(
            AccessFlags::STATIC,
            "()V",
            vec![Insn::Simple(RETURN), Insn::Simple(NOP), Insn::Simple(RETURN)],
        );
        let mut class = class_with(method);
        class.major_version = 49;
        assert!(ClassWriter::new(&ObjectHierarchy).write(&class).is_ok());
    }

    #[test]
    fn test_exception_table_offsets() {
        let method = body(
            AccessFlags::STATIC,
            "()V",
            vec![
                Insn::Label(LabelId(0)),
                Insn::Simple(NOP),
                Insn::Label(LabelId(1)),
                Insn::Simple(RETURN),
                Insn::Label(LabelId(2)),
                Insn::Simple(ATHROW),
            ],
        );
        let mut class = class_with(method);
        if let Some(code) = class.methods[0].code_mut() {
            code.try_catch_blocks.push(TryCatchBlock {
                start: LabelId(0),
                end: LabelId(1),
                handler: LabelId(2),
                catch_type: None,
            });
        }

        let bytes = ClassWriter::new(&ObjectHierarchy).write(&class).unwrap();
        let read = ClassReader::new(&bytes).read(ReaderFlags::empty()).unwrap();
        let code = read.methods[0].code().unwrap();
        assert_eq!(code.try_catch_blocks.len(), 1);
        assert!(code.try_catch_blocks[0].catch_type.is_none());
        assert_eq!(code.max_stack, 1);
    }

    #[test]
    fn test_wide_locals_and_switch() {
        let mut encoder_pool = ConstantPoolBuilder::from_pool(&Default::default());
        let code = Code {
            instructions: vec![
                Insn::Var { opcode: ILOAD, var: 300 },
                Insn::TableSwitch {
                    min: 0,
                    max: 0,
                    default: LabelId(0),
                    targets: vec![LabelId(0)],
                },
                Insn::Label(LabelId(0)),
                Insn::Simple(RETURN),
            ]
            .into_iter()
            .collect(),
            ..Code::default()
        };
        let encoded = CodeEncoder::new(&mut encoder_pool).encode(&code).unwrap();
        assert_eq!(&encoded.bytes[..4], &[WIDE, ILOAD, 0x01, 0x2C]);
        assert_eq!(encoded.bytes[4], TABLESWITCH);
        // tableswitch at 4, operands aligned to 8, default + low + high + one target
        assert_eq!(encoded.bytes.len(), 8 + 16 + 1);
        assert_eq!(encoded.offsets[2], 24);
        assert_eq!(&encoded.bytes[8..12], &20_i32.to_be_bytes());
    }
}
