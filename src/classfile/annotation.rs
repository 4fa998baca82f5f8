//! Runtime-visible annotations.
//!
//! Contracts describe their roles through annotations, so the codec decodes
//! `RuntimeVisibleAnnotations` and `RuntimeVisibleParameterAnnotations` into [`Annotation`] trees
//! and encodes them back when a class is written.

use crate::{
    classfile::constpool::{Constant, ConstantPool, ConstantPoolBuilder},
    file::{io::push_be, parser::Parser},
    Result,
};

/// Maximum nesting of annotation values accepted by the decoder.
const MAX_ANNOTATION_DEPTH: usize = 32;

/// A decoded annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Field descriptor of the annotation interface
    pub desc: String,
    /// Element name and value pairs, in class-file order
    pub values: Vec<(String, ElementValue)>,
}

/// The value of an annotation element.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    /// `B`, `C`, `I`, `S` or `Z` constant
    Int {
        /// The element tag
        tag: u8,
        /// The value
        value: i32,
    },
    /// `J` constant
    Long(i64),
    /// `F` constant, raw bits
    Float(u32),
    /// `D` constant, raw bits
    Double(u64),
    /// `s` constant
    String(String),
    /// `e` enum constant
    Enum {
        /// Descriptor of the enum type
        desc: String,
        /// Name of the constant
        name: String,
    },
    /// `c` class literal, by return descriptor
    Class(String),
    /// `@` nested annotation
    Annotation(Box<Annotation>),
    /// `[` array of values
    Array(Vec<ElementValue>),
}

impl Annotation {
    /// Create an annotation with no elements.
    #[must_use]
    pub fn new(desc: &str) -> Self {
        Annotation {
            desc: desc.to_string(),
            values: Vec::new(),
        }
    }

    /// Builder-style element setter.
    #[must_use]
    pub fn with(mut self, name: &str, value: ElementValue) -> Self {
        self.values.push((name.to_string(), value));
        self
    }

    /// Value of the element called `name`.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&ElementValue> {
        self.values
            .iter()
            .find(|(element, _)| element == name)
            .map(|(_, value)| value)
    }

    /// Value of a string element.
    #[must_use]
    pub fn string(&self, name: &str) -> Option<&str> {
        match self.value(name)? {
            ElementValue::String(value) => Some(value),
            _ => None,
        }
    }

    /// Values of a string-array element. A single string counts as a one-element array.
    #[must_use]
    pub fn strings(&self, name: &str) -> Vec<String> {
        match self.value(name) {
            Some(ElementValue::Array(values)) => values
                .iter()
                .filter_map(|value| match value {
                    ElementValue::String(value) => Some(value.clone()),
                    _ => None,
                })
                .collect(),
            Some(ElementValue::String(value)) => vec![value.clone()],
            _ => Vec::new(),
        }
    }

    /// Value of a boolean element.
    #[must_use]
    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.value(name)? {
            ElementValue::Int { tag: b'Z', value } => Some(*value != 0),
            _ => None,
        }
    }
}

/// Decode a `num_annotations` prefixed annotation table.
pub(crate) fn read_annotations(
    parser: &mut Parser<'_>,
    pool: &ConstantPool,
) -> Result<Vec<Annotation>> {
    let count = parser.read_be::<u16>()?;
    let mut annotations = Vec::with_capacity(count as usize);
    for _ in 0..count {
        annotations.push(read_annotation(parser, pool, 0)?);
    }
    Ok(annotations)
}

/// Decode a `RuntimeVisibleParameterAnnotations` body.
pub(crate) fn read_parameter_annotations(
    parser: &mut Parser<'_>,
    pool: &ConstantPool,
) -> Result<Vec<Vec<Annotation>>> {
    let count = parser.read_be::<u8>()?;
    let mut parameters = Vec::with_capacity(count as usize);
    for _ in 0..count {
        parameters.push(read_annotations(parser, pool)?);
    }
    Ok(parameters)
}

fn read_annotation(
    parser: &mut Parser<'_>,
    pool: &ConstantPool,
    depth: usize,
) -> Result<Annotation> {
    if depth > MAX_ANNOTATION_DEPTH {
        return Err(crate::Error::RecursionLimit(MAX_ANNOTATION_DEPTH));
    }

    let desc = pool.utf8(parser.read_be()?)?.to_string();
    let count = parser.read_be::<u16>()?;
    let mut values = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = pool.utf8(parser.read_be()?)?.to_string();
        values.push((name, read_element_value(parser, pool, depth + 1)?));
    }
    Ok(Annotation { desc, values })
}

fn read_element_value(
    parser: &mut Parser<'_>,
    pool: &ConstantPool,
    depth: usize,
) -> Result<ElementValue> {
    if depth > MAX_ANNOTATION_DEPTH {
        return Err(crate::Error::RecursionLimit(MAX_ANNOTATION_DEPTH));
    }

    let tag = parser.read_be::<u8>()?;
    Ok(match tag {
        b'B' | b'C' | b'I' | b'S' | b'Z' => match pool.get(parser.read_be()?)? {
            Constant::Integer(value) => ElementValue::Int { tag, value: *value },
            other => return Err(malformed_error!("Expected Integer constant, found {:?}", other)),
        },
        b'J' => match pool.get(parser.read_be()?)? {
            Constant::Long(value) => ElementValue::Long(*value),
            other => return Err(malformed_error!("Expected Long constant, found {:?}", other)),
        },
        b'F' => match pool.get(parser.read_be()?)? {
            Constant::Float(bits) => ElementValue::Float(*bits),
            other => return Err(malformed_error!("Expected Float constant, found {:?}", other)),
        },
        b'D' => match pool.get(parser.read_be()?)? {
            Constant::Double(bits) => ElementValue::Double(*bits),
            other => return Err(malformed_error!("Expected Double constant, found {:?}", other)),
        },
        b's' => ElementValue::String(pool.utf8(parser.read_be()?)?.to_string()),
        b'e' => ElementValue::Enum {
            desc: pool.utf8(parser.read_be()?)?.to_string(),
            name: pool.utf8(parser.read_be()?)?.to_string(),
        },
        b'c' => ElementValue::Class(pool.utf8(parser.read_be()?)?.to_string()),
        b'@' => ElementValue::Annotation(Box::new(read_annotation(parser, pool, depth + 1)?)),
        b'[' => {
            let count = parser.read_be::<u16>()?;
            let mut values = Vec::with_capacity(count as usize);
            for _ in 0..count {
                values.push(read_element_value(parser, pool, depth + 1)?);
            }
            ElementValue::Array(values)
        }
        _ => return Err(malformed_error!("Invalid element value tag - {}", tag)),
    })
}

/// Encode a `num_annotations` prefixed annotation table.
pub(crate) fn write_annotations(
    out: &mut Vec<u8>,
    annotations: &[Annotation],
    pool: &mut ConstantPoolBuilder,
) -> Result<()> {
    push_be(out, annotations.len() as u16);
    for annotation in annotations {
        write_annotation(out, annotation, pool)?;
    }
    Ok(())
}

/// Encode a `RuntimeVisibleParameterAnnotations` body.
pub(crate) fn write_parameter_annotations(
    out: &mut Vec<u8>,
    parameters: &[Vec<Annotation>],
    pool: &mut ConstantPoolBuilder,
) -> Result<()> {
    push_be(out, parameters.len() as u8);
    for annotations in parameters {
        write_annotations(out, annotations, pool)?;
    }
    Ok(())
}

fn write_annotation(
    out: &mut Vec<u8>,
    annotation: &Annotation,
    pool: &mut ConstantPoolBuilder,
) -> Result<()> {
    push_be(out, pool.utf8(&annotation.desc)?);
    push_be(out, annotation.values.len() as u16);
    for (name, value) in &annotation.values {
        push_be(out, pool.utf8(name)?);
        write_element_value(out, value, pool)?;
    }
    Ok(())
}

fn write_element_value(
    out: &mut Vec<u8>,
    value: &ElementValue,
    pool: &mut ConstantPoolBuilder,
) -> Result<()> {
    match value {
        ElementValue::Int { tag, value } => {
            push_be(out, *tag);
            push_be(out, pool.add(Constant::Integer(*value))?);
        }
        ElementValue::Long(value) => {
            push_be(out, b'J');
            push_be(out, pool.add(Constant::Long(*value))?);
        }
        ElementValue::Float(bits) => {
            push_be(out, b'F');
            push_be(out, pool.add(Constant::Float(*bits))?);
        }
        ElementValue::Double(bits) => {
            push_be(out, b'D');
            push_be(out, pool.add(Constant::Double(*bits))?);
        }
        ElementValue::String(value) => {
            push_be(out, b's');
            push_be(out, pool.utf8(value)?);
        }
        ElementValue::Enum { desc, name } => {
            push_be(out, b'e');
            push_be(out, pool.utf8(desc)?);
            push_be(out, pool.utf8(name)?);
        }
        ElementValue::Class(desc) => {
            push_be(out, b'c');
            push_be(out, pool.utf8(desc)?);
        }
        ElementValue::Annotation(annotation) => {
            push_be(out, b'@');
            write_annotation(out, annotation, pool)?;
        }
        ElementValue::Array(values) => {
            push_be(out, b'[');
            push_be(out, values.len() as u16);
            for value in values {
                write_element_value(out, value, pool)?;
            }
        }
    }
    Ok(())
}
