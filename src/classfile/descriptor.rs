//! Field and method descriptors.
//!
//! A [`Type`] is the erased type of a field, parameter, return value or local variable, decoded
//! from its descriptor string (`I`, `Ljava/lang/String;`, `[[J`). A [`MethodType`] pairs the
//! parameter types of a method with its return type.

use std::fmt;

use crate::{classfile::opcodes, Result};

/// An erased JVM type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// `V`, only valid as a return type
    Void,
    /// `Z`
    Boolean,
    /// `B`
    Byte,
    /// `C`
    Char,
    /// `S`
    Short,
    /// `I`
    Int,
    /// `F`
    Float,
    /// `J`
    Long,
    /// `D`
    Double,
    /// `Lname;` with the internal name
    Object(String),
    /// `[component`
    Array(Box<Type>),
}

/// The parameter and return types of a method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodType {
    /// Parameter types in declaration order
    pub params: Vec<Type>,
    /// Return type, [`Type::Void`] for `V`
    pub ret: Type,
}

impl Type {
    /// Parse a field descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `desc` is not exactly one valid descriptor.
    pub fn parse(desc: &str) -> Result<Type> {
        let mut pos = 0;
        let ty = Type::parse_at(desc.as_bytes(), &mut pos)?;
        if pos != desc.len() {
            return Err(malformed_error!("Trailing data in descriptor - {}", desc));
        }
        Ok(ty)
    }

    fn parse_at(bytes: &[u8], pos: &mut usize) -> Result<Type> {
        let Some(&tag) = bytes.get(*pos) else {
            return Err(malformed_error!("Unexpected end of descriptor"));
        };
        *pos += 1;
        Ok(match tag {
            b'V' => Type::Void,
            b'Z' => Type::Boolean,
            b'B' => Type::Byte,
            b'C' => Type::Char,
            b'S' => Type::Short,
            b'I' => Type::Int,
            b'F' => Type::Float,
            b'J' => Type::Long,
            b'D' => Type::Double,
            b'L' => {
                let start = *pos;
                let Some(len) = bytes[start..].iter().position(|b| *b == b';') else {
                    return Err(malformed_error!("Unterminated class descriptor"));
                };
                *pos = start + len + 1;
                if len == 0 {
                    return Err(malformed_error!("Empty class name in descriptor"));
                }
                let name = std::str::from_utf8(&bytes[start..start + len])
                    .map_err(|_| malformed_error!("Invalid UTF-8 in descriptor"))?;
                Type::Object(name.to_string())
            }
            b'[' => {
                let component = Type::parse_at(bytes, pos)?;
                if component == Type::Void {
                    return Err(malformed_error!("Array of void in descriptor"));
                }
                Type::Array(Box::new(component))
            }
            other => {
                return Err(malformed_error!(
                    "Invalid descriptor tag - {}",
                    char::from(other)
                ))
            }
        })
    }

    /// Object type from an internal name.
    #[must_use]
    pub fn object(name: &str) -> Type {
        Type::Object(name.to_string())
    }

    /// Type from the operand of a `checkcast`, `anewarray` or constant-pool class entry.
    ///
    /// Array classes are written as descriptors (`[I`), all others as internal names.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an invalid array descriptor.
    pub fn from_internal_name(name: &str) -> Result<Type> {
        if name.starts_with('[') {
            Type::parse(name)
        } else {
            Ok(Type::object(name))
        }
    }

    /// The descriptor string of this type.
    #[must_use]
    pub fn descriptor(&self) -> String {
        let mut out = String::new();
        self.write_descriptor(&mut out);
        out
    }

    fn write_descriptor(&self, out: &mut String) {
        match self {
            Type::Void => out.push('V'),
            Type::Boolean => out.push('Z'),
            Type::Byte => out.push('B'),
            Type::Char => out.push('C'),
            Type::Short => out.push('S'),
            Type::Int => out.push('I'),
            Type::Float => out.push('F'),
            Type::Long => out.push('J'),
            Type::Double => out.push('D'),
            Type::Object(name) => {
                out.push('L');
                out.push_str(name);
                out.push(';');
            }
            Type::Array(component) => {
                out.push('[');
                component.write_descriptor(out);
            }
        }
    }

    /// The internal name used in constant-pool class entries, `None` for primitives.
    #[must_use]
    pub fn internal_name(&self) -> Option<String> {
        match self {
            Type::Object(name) => Some(name.clone()),
            Type::Array(_) => Some(self.descriptor()),
            _ => None,
        }
    }

    /// Returns `true` for the eight primitive types.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Type::Void | Type::Object(_) | Type::Array(_))
    }

    /// Returns `true` for object and array types.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        matches!(self, Type::Object(_) | Type::Array(_))
    }

    /// Number of array dimensions, 0 for non-arrays.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        match self {
            Type::Array(component) => 1 + component.dimensions(),
            _ => 0,
        }
    }

    /// The innermost element type of an array, or the type itself.
    #[must_use]
    pub fn element_type(&self) -> &Type {
        match self {
            Type::Array(component) => component.element_type(),
            _ => self,
        }
    }

    /// Number of local-variable slots and operand-stack words the type occupies.
    #[must_use]
    pub fn size(&self) -> u16 {
        match self {
            Type::Void => 0,
            Type::Long | Type::Double => 2,
            _ => 1,
        }
    }

    fn opcode_offset(&self) -> u8 {
        match self {
            Type::Boolean | Type::Byte | Type::Char | Type::Short | Type::Int => 0,
            Type::Long => 1,
            Type::Float => 2,
            Type::Double => 3,
            _ => 4,
        }
    }

    /// The `xLOAD` opcode for a local of this type.
    #[must_use]
    pub fn load_opcode(&self) -> u8 {
        opcodes::ILOAD + self.opcode_offset()
    }

    /// The `xSTORE` opcode for a local of this type.
    #[must_use]
    pub fn store_opcode(&self) -> u8 {
        opcodes::ISTORE + self.opcode_offset()
    }

    /// The `xRETURN` opcode for this return type.
    #[must_use]
    pub fn return_opcode(&self) -> u8 {
        match self {
            Type::Void => opcodes::RETURN,
            _ => opcodes::IRETURN + self.opcode_offset(),
        }
    }

    /// Internal name of the wrapper class of a primitive (or `java/lang/Void`).
    #[must_use]
    pub fn box_class(&self) -> Option<&'static str> {
        Some(match self {
            Type::Void => "java/lang/Void",
            Type::Boolean => "java/lang/Boolean",
            Type::Byte => "java/lang/Byte",
            Type::Char => "java/lang/Character",
            Type::Short => "java/lang/Short",
            Type::Int => "java/lang/Integer",
            Type::Float => "java/lang/Float",
            Type::Long => "java/lang/Long",
            Type::Double => "java/lang/Double",
            _ => return None,
        })
    }

    /// Name of the wrapper method that yields the primitive value (`intValue`).
    #[must_use]
    pub fn unbox_method(&self) -> Option<&'static str> {
        Some(match self {
            Type::Boolean => "booleanValue",
            Type::Byte => "byteValue",
            Type::Char => "charValue",
            Type::Short => "shortValue",
            Type::Int => "intValue",
            Type::Float => "floatValue",
            Type::Long => "longValue",
            Type::Double => "doubleValue",
            _ => return None,
        })
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Boolean => write!(f, "boolean"),
            Type::Byte => write!(f, "byte"),
            Type::Char => write!(f, "char"),
            Type::Short => write!(f, "short"),
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::Long => write!(f, "long"),
            Type::Double => write!(f, "double"),
            Type::Object(name) => write!(f, "{}", name.replace('/', ".")),
            Type::Array(component) => write!(f, "{component}[]"),
        }
    }
}

impl MethodType {
    /// Parse a method descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `desc` is not a valid method descriptor.
    pub fn parse(desc: &str) -> Result<MethodType> {
        let bytes = desc.as_bytes();
        if bytes.first() != Some(&b'(') {
            return Err(malformed_error!("Method descriptor must start with '(' - {}", desc));
        }

        let mut pos = 1;
        let mut params = Vec::new();
        loop {
            match bytes.get(pos) {
                Some(b')') => {
                    pos += 1;
                    break;
                }
                Some(_) => {
                    let param = Type::parse_at(bytes, &mut pos)?;
                    if param == Type::Void {
                        return Err(malformed_error!("Void parameter in descriptor - {}", desc));
                    }
                    params.push(param);
                }
                None => return Err(malformed_error!("Unterminated method descriptor - {}", desc)),
            }
        }

        let ret = Type::parse_at(bytes, &mut pos)?;
        if pos != bytes.len() {
            return Err(malformed_error!("Trailing data in method descriptor - {}", desc));
        }

        Ok(MethodType { params, ret })
    }

    /// The descriptor string of this method type.
    #[must_use]
    pub fn descriptor(&self) -> String {
        let mut out = String::from("(");
        for param in &self.params {
            param.write_descriptor(&mut out);
        }
        out.push(')');
        self.ret.write_descriptor(&mut out);
        out
    }

    /// Number of local-variable slots the parameters occupy, excluding `this`.
    #[must_use]
    pub fn argument_slots(&self) -> u16 {
        self.params.iter().map(Type::size).sum()
    }
}

impl fmt::Display for MethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.ret)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, ")")
    }
}
