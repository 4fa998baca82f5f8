//! Class-file decoding.
//!
//! [`ClassReader`] turns class-file bytes into a [`ClassNode`]. Method bodies are decoded into
//! [`InsnList`]s with symbolic labels; `StackMapTable` frames are never decoded because the writer
//! recomputes them for every body it re-encodes.
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use classweave::classfile::{ClassReader, ReaderFlags};
//!
//! let node = ClassReader::new(&bytes).read(ReaderFlags::SKIP_CODE | ReaderFlags::SKIP_DEBUG)?;
//! println!("{} extends {:?}", node.name, node.super_name);
//! # Ok::<(), classweave::Error>(())
//! ```

use std::collections::BTreeMap;

use bitflags::bitflags;

use crate::{
    classfile::{
        access::AccessFlags,
        annotation::{read_annotations, read_parameter_annotations},
        constpool::{Constant, ConstantPool},
        insn::{Insn, InsnList, LabelId, LdcValue},
        nodes::{
            Attribute, ClassNode, Code, EnclosingMethod, FieldNode, InnerClassNode,
            LocalVariableNode, MethodNode, TryCatchBlock,
        },
        opcodes::*,
    },
    file::{parser::Parser, CLASS_MAGIC},
    Result,
};

bitflags! {
    #[derive(PartialEq, Eq, Debug, Clone, Copy, Default)]
    /// Parts of a class file the reader may skip
    pub struct ReaderFlags : u8 {
        /// Do not decode method bodies; they are still written back verbatim
        const SKIP_CODE = 0x01;
        /// Do not decode line numbers and local-variable tables
        const SKIP_DEBUG = 0x02;
    }
}

/// Decodes class-file bytes into a [`ClassNode`].
pub struct ClassReader<'a> {
    data: &'a [u8],
}

impl<'a> ClassReader<'a> {
    /// Create a reader over `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        ClassReader { data }
    }

    /// Decode the class.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] or [`crate::Error::OutOfBounds`] for invalid input.
    pub fn read(&self, flags: ReaderFlags) -> Result<ClassNode> {
        let mut parser = Parser::new(self.data);

        let magic = parser.read_be::<u32>()?;
        if magic != CLASS_MAGIC {
            return Err(malformed_error!("Invalid class file magic - {:#x}", magic));
        }

        let minor_version = parser.read_be::<u16>()?;
        let major_version = parser.read_be::<u16>()?;
        let pool = ConstantPool::parse(&mut parser)?;

        let access = AccessFlags::from_bits_retain(parser.read_be()?);
        let name = pool.class_name(parser.read_be()?)?.to_string();
        let super_index = parser.read_be::<u16>()?;
        let super_name = if super_index == 0 {
            None
        } else {
            Some(pool.class_name(super_index)?.to_string())
        };

        let interface_count = parser.read_be::<u16>()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(pool.class_name(parser.read_be()?)?.to_string());
        }

        let mut node = ClassNode::new(major_version, access, &name, super_name.as_deref());
        node.minor_version = minor_version;
        node.interfaces = interfaces;

        let field_count = parser.read_be::<u16>()?;
        for _ in 0..field_count {
            node.fields.push(read_field(&mut parser, &pool)?);
        }

        let method_count = parser.read_be::<u16>()?;
        for _ in 0..method_count {
            node.methods.push(read_method(&mut parser, &pool, flags)?);
        }

        let attribute_count = parser.read_be::<u16>()?;
        for _ in 0..attribute_count {
            let attr_name = pool.utf8(parser.read_be()?)?;
            let mut body = parser.sub_parser()?;
            match attr_name {
                "Signature" => node.signature = Some(pool.utf8(body.read_be()?)?.to_string()),
                "RuntimeVisibleAnnotations" => {
                    node.visible_annotations = read_annotations(&mut body, &pool)?;
                }
                "InnerClasses" => {
                    let count = body.read_be::<u16>()?;
                    for _ in 0..count {
                        let inner = body.read_be::<u16>()?;
                        let outer = body.read_be::<u16>()?;
                        let simple = body.read_be::<u16>()?;
                        let inner_access = body.read_be::<u16>()?;
                        node.inner_classes.push(InnerClassNode {
                            name: pool.class_name(inner)?.to_string(),
                            outer_name: optional(outer, |i| pool.class_name(i))?,
                            inner_name: optional(simple, |i| pool.utf8(i))?,
                            access: AccessFlags::from_bits_retain(inner_access),
                        });
                    }
                }
                "EnclosingMethod" => {
                    let owner = pool.class_name(body.read_be()?)?.to_string();
                    let method_index = body.read_be::<u16>()?;
                    let method = if method_index == 0 {
                        None
                    } else {
                        let (name, desc) = pool.name_and_type(method_index)?;
                        Some((name.to_string(), desc.to_string()))
                    };
                    node.enclosing_method = Some(EnclosingMethod { owner, method });
                }
                _ => node.attributes.push(Attribute {
                    name: attr_name.to_string(),
                    data: body.data().to_vec(),
                }),
            }
        }

        node.constant_pool = pool;
        Ok(node)
    }
}

fn optional<'p>(
    index: u16,
    lookup: impl FnOnce(u16) -> Result<&'p str>,
) -> Result<Option<String>> {
    if index == 0 {
        Ok(None)
    } else {
        Ok(Some(lookup(index)?.to_string()))
    }
}

fn read_field(parser: &mut Parser<'_>, pool: &ConstantPool) -> Result<FieldNode> {
    let access = AccessFlags::from_bits_retain(parser.read_be()?);
    let name = pool.utf8(parser.read_be()?)?;
    let desc = pool.utf8(parser.read_be()?)?;
    let mut field = FieldNode::new(access, name, desc);

    let attribute_count = parser.read_be::<u16>()?;
    for _ in 0..attribute_count {
        let attr_name = pool.utf8(parser.read_be()?)?;
        let mut body = parser.sub_parser()?;
        match attr_name {
            "Signature" => field.signature = Some(pool.utf8(body.read_be()?)?.to_string()),
            "RuntimeVisibleAnnotations" => {
                field.visible_annotations = read_annotations(&mut body, pool)?;
            }
            _ => field.attributes.push(Attribute {
                name: attr_name.to_string(),
                data: body.data().to_vec(),
            }),
        }
    }

    Ok(field)
}

fn read_method(
    parser: &mut Parser<'_>,
    pool: &ConstantPool,
    flags: ReaderFlags,
) -> Result<MethodNode> {
    let access = AccessFlags::from_bits_retain(parser.read_be()?);
    let name = pool.utf8(parser.read_be()?)?;
    let desc = pool.utf8(parser.read_be()?)?;
    let mut method = MethodNode::new(access, name, desc);

    let attribute_count = parser.read_be::<u16>()?;
    for _ in 0..attribute_count {
        let attr_name = pool.utf8(parser.read_be()?)?;
        let mut body = parser.sub_parser()?;
        match attr_name {
            "Code" => {
                let code = if flags.contains(ReaderFlags::SKIP_CODE) {
                    None
                } else {
                    Some(CodeDecoder::new(pool, flags).decode(&mut Parser::new(body.data()))?)
                };
                method.set_decoded(code, body.data().to_vec());
            }
            "Exceptions" => {
                let count = body.read_be::<u16>()?;
                for _ in 0..count {
                    method
                        .exceptions
                        .push(pool.class_name(body.read_be()?)?.to_string());
                }
            }
            "Signature" => method.signature = Some(pool.utf8(body.read_be()?)?.to_string()),
            "RuntimeVisibleAnnotations" => {
                method.visible_annotations = read_annotations(&mut body, pool)?;
            }
            "RuntimeVisibleParameterAnnotations" => {
                method.visible_parameter_annotations =
                    read_parameter_annotations(&mut body, pool)?;
            }
            _ => method.attributes.push(Attribute {
                name: attr_name.to_string(),
                data: body.data().to_vec(),
            }),
        }
    }

    Ok(method)
}

struct RawLocal {
    start: u32,
    length: u32,
    name: String,
    desc: String,
    index: u16,
}

/// Decodes a `Code` attribute body into a [`Code`] tree.
struct CodeDecoder<'p> {
    pool: &'p ConstantPool,
    flags: ReaderFlags,
    labels: BTreeMap<u32, LabelId>,
}

impl<'p> CodeDecoder<'p> {
    fn new(pool: &'p ConstantPool, flags: ReaderFlags) -> Self {
        CodeDecoder {
            pool,
            flags,
            labels: BTreeMap::new(),
        }
    }

    fn label(&mut self, offset: i64, code_length: usize) -> Result<LabelId> {
        if offset < 0 || offset > code_length as i64 {
            return Err(malformed_error!("Branch target out of code - {}", offset));
        }
        let next = LabelId(self.labels.len() as u32);
        Ok(*self.labels.entry(offset as u32).or_insert(next))
    }

    fn decode(mut self, parser: &mut Parser<'_>) -> Result<Code> {
        let max_stack = parser.read_be::<u16>()?;
        let max_locals = parser.read_be::<u16>()?;
        let code_length = parser.read_be::<u32>()? as usize;
        if code_length == 0 {
            return Err(malformed_error!("Empty code attribute"));
        }
        let code = parser.read_bytes(code_length)?;

        let mut decoded: Vec<(u32, Insn)> = Vec::new();
        let mut cursor = Parser::new(code);
        while cursor.has_more_data() {
            let offset = cursor.pos() as u32;
            let insn = self.decode_insn(&mut cursor, offset, code_length)?;
            decoded.push((offset, insn));
        }

        let mut try_catch_blocks = Vec::new();
        let handler_count = parser.read_be::<u16>()?;
        for _ in 0..handler_count {
            let start = self.label(i64::from(parser.read_be::<u16>()?), code_length)?;
            let end = self.label(i64::from(parser.read_be::<u16>()?), code_length)?;
            let handler = self.label(i64::from(parser.read_be::<u16>()?), code_length)?;
            let catch_index = parser.read_be::<u16>()?;
            let catch_type = optional(catch_index, |i| self.pool.class_name(i))?;
            try_catch_blocks.push(TryCatchBlock {
                start,
                end,
                handler,
                catch_type,
            });
        }

        let mut lines: BTreeMap<u32, Vec<u16>> = BTreeMap::new();
        let mut locals: Vec<RawLocal> = Vec::new();
        let mut local_types: Vec<RawLocal> = Vec::new();
        let attribute_count = parser.read_be::<u16>()?;
        for _ in 0..attribute_count {
            let attr_name = self.pool.utf8(parser.read_be()?)?;
            let mut body = parser.sub_parser()?;
            if self.flags.contains(ReaderFlags::SKIP_DEBUG) {
                continue;
            }
            match attr_name {
                "LineNumberTable" => {
                    let count = body.read_be::<u16>()?;
                    for _ in 0..count {
                        let start = body.read_be::<u16>()?;
                        let line = body.read_be::<u16>()?;
                        lines.entry(u32::from(start)).or_default().push(line);
                    }
                }
                "LocalVariableTable" | "LocalVariableTypeTable" => {
                    let count = body.read_be::<u16>()?;
                    for _ in 0..count {
                        let start = u32::from(body.read_be::<u16>()?);
                        let length = u32::from(body.read_be::<u16>()?);
                        let name = self.pool.utf8(body.read_be()?)?.to_string();
                        let desc = self.pool.utf8(body.read_be()?)?.to_string();
                        let index = body.read_be::<u16>()?;
                        let local = RawLocal {
                            start,
                            length,
                            name,
                            desc,
                            index,
                        };
                        if attr_name == "LocalVariableTable" {
                            locals.push(local);
                        } else {
                            local_types.push(local);
                        }
                    }
                }
                _ => {}
            }
        }

        let mut local_variables = Vec::with_capacity(locals.len());
        for local in locals {
            let start = self.label(i64::from(local.start), code_length)?;
            let end = self.label(i64::from(local.start + local.length), code_length)?;
            let signature = local_types
                .iter()
                .find(|t| t.start == local.start && t.length == local.length && t.index == local.index)
                .map(|t| t.desc.clone());
            local_variables.push(LocalVariableNode {
                name: local.name,
                desc: local.desc,
                signature,
                start,
                end,
                index: local.index,
            });
        }

        for start in lines.keys() {
            self.label(i64::from(*start), code_length)?;
        }

        let mut instructions = InsnList::new();
        let mut placed = 0_usize;
        for (offset, insn) in decoded {
            if let Some(label) = self.labels.get(&offset) {
                instructions.push(Insn::Label(*label));
                placed += 1;
            }
            if let Some(numbers) = lines.get(&offset) {
                if let Some(label) = self.labels.get(&offset) {
                    for line in numbers {
                        instructions.push(Insn::LineNumber {
                            line: *line,
                            start: *label,
                        });
                    }
                }
            }
            instructions.push(insn);
        }
        if let Some(label) = self.labels.get(&(code_length as u32)) {
            instructions.push(Insn::Label(*label));
            placed += 1;
        }

        if placed != self.labels.len() {
            return Err(malformed_error!(
                "Branch or range target inside an instruction ({} of {} labels placed)",
                placed,
                self.labels.len()
            ));
        }

        Ok(Code {
            instructions,
            try_catch_blocks,
            local_variables,
            max_stack,
            max_locals,
        })
    }

    fn decode_insn(
        &mut self,
        cursor: &mut Parser<'_>,
        offset: u32,
        code_length: usize,
    ) -> Result<Insn> {
        let opcode = cursor.read_be::<u8>()?;
        let base = i64::from(offset);
        Ok(match opcode {
            NOP..=DCONST_1 => Insn::Simple(opcode),
            BIPUSH => Insn::Int {
                opcode,
                operand: i32::from(cursor.read_be::<i8>()?),
            },
            SIPUSH => Insn::Int {
                opcode,
                operand: i32::from(cursor.read_be::<i16>()?),
            },
            NEWARRAY => Insn::Int {
                opcode,
                operand: i32::from(cursor.read_be::<u8>()?),
            },
            LDC => self.ldc(u16::from(cursor.read_be::<u8>()?))?,
            LDC_W | LDC2_W => self.ldc(cursor.read_be::<u16>()?)?,
            ILOAD..=ALOAD | ISTORE..=ASTORE | RET => Insn::Var {
                opcode,
                var: u16::from(cursor.read_be::<u8>()?),
            },
            ILOAD_0..=ALOAD_3 => Insn::Var {
                opcode: ILOAD + (opcode - ILOAD_0) / 4,
                var: u16::from((opcode - ILOAD_0) % 4),
            },
            ISTORE_0..=ASTORE_3 => Insn::Var {
                opcode: ISTORE + (opcode - ISTORE_0) / 4,
                var: u16::from((opcode - ISTORE_0) % 4),
            },
            IINC => Insn::Iinc {
                var: u16::from(cursor.read_be::<u8>()?),
                incr: i16::from(cursor.read_be::<i8>()?),
            },
            WIDE => {
                let wide_opcode = cursor.read_be::<u8>()?;
                match wide_opcode {
                    ILOAD..=ALOAD | ISTORE..=ASTORE | RET => Insn::Var {
                        opcode: wide_opcode,
                        var: cursor.read_be::<u16>()?,
                    },
                    IINC => Insn::Iinc {
                        var: cursor.read_be::<u16>()?,
                        incr: cursor.read_be::<i16>()?,
                    },
                    _ => return Err(malformed_error!("Invalid wide opcode - {}", wide_opcode)),
                }
            }
            IFEQ..=JSR | IFNULL | IFNONNULL => {
                let delta = i64::from(cursor.read_be::<i16>()?);
                Insn::Jump {
                    opcode,
                    target: self.label(base + delta, code_length)?,
                }
            }
            GOTO_W | JSR_W => {
                let delta = i64::from(cursor.read_be::<i32>()?);
                Insn::Jump {
                    opcode: if opcode == GOTO_W { GOTO } else { JSR },
                    target: self.label(base + delta, code_length)?,
                }
            }
            TABLESWITCH => {
                cursor.advance_by((4 - (cursor.pos() % 4)) % 4)?;
                let default = self.label(base + i64::from(cursor.read_be::<i32>()?), code_length)?;
                let min = cursor.read_be::<i32>()?;
                let max = cursor.read_be::<i32>()?;
                if max < min {
                    return Err(malformed_error!("Invalid tableswitch range {}..{}", min, max));
                }
                let count = (i64::from(max) - i64::from(min) + 1) as usize;
                if count > code_length {
                    return Err(out_of_bounds_error!());
                }
                let mut targets = Vec::with_capacity(count);
                for _ in 0..count {
                    targets.push(self.label(base + i64::from(cursor.read_be::<i32>()?), code_length)?);
                }
                Insn::TableSwitch {
                    min,
                    max,
                    default,
                    targets,
                }
            }
            LOOKUPSWITCH => {
                cursor.advance_by((4 - (cursor.pos() % 4)) % 4)?;
                let default = self.label(base + i64::from(cursor.read_be::<i32>()?), code_length)?;
                let count = cursor.read_be::<i32>()?;
                if count < 0 || count as usize > code_length {
                    return Err(malformed_error!("Invalid lookupswitch pair count - {}", count));
                }
                let mut pairs = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let key = cursor.read_be::<i32>()?;
                    let target = self.label(base + i64::from(cursor.read_be::<i32>()?), code_length)?;
                    pairs.push((key, target));
                }
                Insn::LookupSwitch { default, pairs }
            }
            IALOAD..=SALOAD | IASTORE..=LXOR | I2L..=DCMPG | IRETURN..=RETURN => {
                Insn::Simple(opcode)
            }
            ARRAYLENGTH | ATHROW | MONITORENTER | MONITOREXIT => Insn::Simple(opcode),
            GETSTATIC..=PUTFIELD => {
                let member = self.pool.member_ref(cursor.read_be()?)?;
                Insn::Field {
                    opcode,
                    owner: member.owner.to_string(),
                    name: member.name.to_string(),
                    desc: member.descriptor.to_string(),
                }
            }
            INVOKEVIRTUAL..=INVOKEINTERFACE => {
                let member = self.pool.member_ref(cursor.read_be()?)?;
                if opcode == INVOKEINTERFACE {
                    cursor.advance_by(2)?;
                }
                Insn::Method {
                    opcode,
                    owner: member.owner.to_string(),
                    name: member.name.to_string(),
                    desc: member.descriptor.to_string(),
                    interface: member.interface,
                }
            }
            INVOKEDYNAMIC => {
                let index = cursor.read_be::<u16>()?;
                cursor.advance_by(2)?;
                let Constant::InvokeDynamic { name_and_type, .. } = self.pool.get(index)? else {
                    return Err(malformed_error!("Expected InvokeDynamic at {}", index));
                };
                let (name, desc) = self.pool.name_and_type(*name_and_type)?;
                Insn::InvokeDynamic {
                    index,
                    name: name.to_string(),
                    desc: desc.to_string(),
                }
            }
            NEW | ANEWARRAY | CHECKCAST | INSTANCEOF => Insn::Type {
                opcode,
                class: self.pool.class_name(cursor.read_be()?)?.to_string(),
            },
            MULTIANEWARRAY => Insn::MultiANewArray {
                desc: self.pool.class_name(cursor.read_be()?)?.to_string(),
                dims: cursor.read_be::<u8>()?,
            },
            _ => return Err(malformed_error!("Invalid opcode {:#x} at {}", opcode, offset)),
        })
    }

    fn ldc(&self, index: u16) -> Result<Insn> {
        let value = match self.pool.get(index)? {
            Constant::Integer(value) => LdcValue::Int(*value),
            Constant::Float(bits) => LdcValue::Float(*bits),
            Constant::Long(value) => LdcValue::Long(*value),
            Constant::Double(bits) => LdcValue::Double(*bits),
            Constant::String(value) => LdcValue::String(self.pool.utf8(*value)?.to_string()),
            Constant::Class(name) => LdcValue::Class(self.pool.utf8(*name)?.to_string()),
            Constant::MethodType(_) => LdcValue::MethodType(index),
            Constant::MethodHandle { .. } => LdcValue::MethodHandle(index),
            Constant::Dynamic { name_and_type, .. } => LdcValue::Dynamic {
                index,
                descriptor: self.pool.name_and_type(*name_and_type)?.1.to_string(),
            },
            other => return Err(malformed_error!("Constant {:?} is not loadable", other)),
        };
        Ok(Insn::Ldc(value))
    }
}
