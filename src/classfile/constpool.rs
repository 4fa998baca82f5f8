//! The class-file constant pool.
//!
//! [`ConstantPool`] is the decoded, read-only pool of a parsed class. [`ConstantPoolBuilder`]
//! produces the pool of a class being written. It is seeded from the original pool so that every
//! existing index stays valid: attributes and method bodies that are copied verbatim keep
//! referring to the same entries, and new entries are only ever appended.

use std::collections::HashMap;

use crate::{
    file::{
        io::push_be,
        parser::{decode_modified_utf8, encode_modified_utf8, Parser},
    },
    Result,
};

/// A single constant-pool entry.
///
/// Floating point constants are kept as their raw IEEE-754 bits so entries can be hashed and
/// deduplicated exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    /// The unusable slot at index 0 and after every long or double entry
    Unusable,
    /// `CONSTANT_Utf8`
    Utf8(String),
    /// `CONSTANT_Integer`
    Integer(i32),
    /// `CONSTANT_Float`, raw bits
    Float(u32),
    /// `CONSTANT_Long`
    Long(i64),
    /// `CONSTANT_Double`, raw bits
    Double(u64),
    /// `CONSTANT_Class`, index of the name
    Class(u16),
    /// `CONSTANT_String`, index of the value
    String(u16),
    /// `CONSTANT_Fieldref`
    FieldRef {
        /// Index of the owner class entry
        class: u16,
        /// Index of the name and type entry
        name_and_type: u16,
    },
    /// `CONSTANT_Methodref`
    MethodRef {
        /// Index of the owner class entry
        class: u16,
        /// Index of the name and type entry
        name_and_type: u16,
    },
    /// `CONSTANT_InterfaceMethodref`
    InterfaceMethodRef {
        /// Index of the owner class entry
        class: u16,
        /// Index of the name and type entry
        name_and_type: u16,
    },
    /// `CONSTANT_NameAndType`
    NameAndType {
        /// Index of the name
        name: u16,
        /// Index of the descriptor
        descriptor: u16,
    },
    /// `CONSTANT_MethodHandle`
    MethodHandle {
        /// Reference kind (1-9)
        kind: u8,
        /// Index of the referenced member
        reference: u16,
    },
    /// `CONSTANT_MethodType`, index of the descriptor
    MethodType(u16),
    /// `CONSTANT_Dynamic`
    Dynamic {
        /// Index into the bootstrap methods attribute
        bootstrap: u16,
        /// Index of the name and type entry
        name_and_type: u16,
    },
    /// `CONSTANT_InvokeDynamic`
    InvokeDynamic {
        /// Index into the bootstrap methods attribute
        bootstrap: u16,
        /// Index of the name and type entry
        name_and_type: u16,
    },
    /// `CONSTANT_Module`, index of the name
    Module(u16),
    /// `CONSTANT_Package`, index of the name
    Package(u16),
}

impl Constant {
    fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }
}

/// A symbolic reference to a field or method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef<'a> {
    /// Internal name of the owner
    pub owner: &'a str,
    /// Member name
    pub name: &'a str,
    /// Member descriptor
    pub descriptor: &'a str,
    /// `true` for `CONSTANT_InterfaceMethodref`
    pub interface: bool,
}

/// The decoded constant pool of a class file.
#[derive(Debug, Clone)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        ConstantPool {
            entries: vec![Constant::Unusable],
        }
    }
}

impl ConstantPool {
    /// Decode the constant pool, starting at its `constant_pool_count`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] on unknown tags or invalid strings, and
    /// [`crate::Error::OutOfBounds`] on truncated input.
    pub fn parse(parser: &mut Parser<'_>) -> Result<ConstantPool> {
        let count = parser.read_be::<u16>()? as usize;
        if count == 0 {
            return Err(malformed_error!("Constant pool count must be at least 1"));
        }

        let mut entries = Vec::with_capacity(count);
        entries.push(Constant::Unusable);
        while entries.len() < count {
            let tag = parser.read_be::<u8>()?;
            let entry = match tag {
                1 => {
                    let len = parser.read_be::<u16>()? as usize;
                    Constant::Utf8(decode_modified_utf8(parser.read_bytes(len)?)?)
                }
                3 => Constant::Integer(parser.read_be::<i32>()?),
                4 => Constant::Float(parser.read_be::<u32>()?),
                5 => Constant::Long(parser.read_be::<i64>()?),
                6 => Constant::Double(parser.read_be::<u64>()?),
                7 => Constant::Class(parser.read_be::<u16>()?),
                8 => Constant::String(parser.read_be::<u16>()?),
                9 => Constant::FieldRef {
                    class: parser.read_be()?,
                    name_and_type: parser.read_be()?,
                },
                10 => Constant::MethodRef {
                    class: parser.read_be()?,
                    name_and_type: parser.read_be()?,
                },
                11 => Constant::InterfaceMethodRef {
                    class: parser.read_be()?,
                    name_and_type: parser.read_be()?,
                },
                12 => Constant::NameAndType {
                    name: parser.read_be()?,
                    descriptor: parser.read_be()?,
                },
                15 => Constant::MethodHandle {
                    kind: parser.read_be()?,
                    reference: parser.read_be()?,
                },
                16 => Constant::MethodType(parser.read_be::<u16>()?),
                17 => Constant::Dynamic {
                    bootstrap: parser.read_be()?,
                    name_and_type: parser.read_be()?,
                },
                18 => Constant::InvokeDynamic {
                    bootstrap: parser.read_be()?,
                    name_and_type: parser.read_be()?,
                },
                19 => Constant::Module(parser.read_be::<u16>()?),
                20 => Constant::Package(parser.read_be::<u16>()?),
                _ => return Err(malformed_error!("Invalid constant pool tag - {}", tag)),
            };

            let wide = entry.is_wide();
            entries.push(entry);
            if wide {
                entries.push(Constant::Unusable);
            }
        }

        if entries.len() != count {
            return Err(malformed_error!(
                "Wide constant overruns the constant pool count - {}",
                count
            ));
        }

        Ok(ConstantPool { entries })
    }

    /// Number of slots, including the unusable slot 0.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the pool holds no entries besides slot 0.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    /// Entry at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `index` is not a valid slot.
    pub fn get(&self, index: u16) -> Result<&Constant> {
        match self.entries.get(index as usize) {
            Some(Constant::Unusable) | None => {
                Err(malformed_error!("Invalid constant pool index - {}", index))
            }
            Some(entry) => Ok(entry),
        }
    }

    /// The string of a `CONSTANT_Utf8` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the entry is missing or not a UTF-8 entry.
    pub fn utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Utf8(value) => Ok(value),
            other => Err(malformed_error!("Expected Utf8 at {}, found {:?}", index, other)),
        }
    }

    /// The internal name of a `CONSTANT_Class` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the entry is missing or not a class entry.
    pub fn class_name(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Class(name) => self.utf8(*name),
            other => Err(malformed_error!("Expected Class at {}, found {:?}", index, other)),
        }
    }

    /// Name and descriptor of a `CONSTANT_NameAndType` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the entry is missing or of the wrong kind.
    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str)> {
        match self.get(index)? {
            Constant::NameAndType { name, descriptor } => {
                Ok((self.utf8(*name)?, self.utf8(*descriptor)?))
            }
            other => Err(malformed_error!(
                "Expected NameAndType at {}, found {:?}",
                index,
                other
            )),
        }
    }

    /// A field, method or interface method reference.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the entry is missing or of the wrong kind.
    pub fn member_ref(&self, index: u16) -> Result<MemberRef<'_>> {
        let (class, nat, interface) = match self.get(index)? {
            Constant::FieldRef {
                class,
                name_and_type,
            }
            | Constant::MethodRef {
                class,
                name_and_type,
            } => (*class, *name_and_type, false),
            Constant::InterfaceMethodRef {
                class,
                name_and_type,
            } => (*class, *name_and_type, true),
            other => {
                return Err(malformed_error!(
                    "Expected member reference at {}, found {:?}",
                    index,
                    other
                ))
            }
        };
        let (name, descriptor) = self.name_and_type(nat)?;
        Ok(MemberRef {
            owner: self.class_name(class)?,
            name,
            descriptor,
            interface,
        })
    }

    /// Iterate over `(index, entry)` pairs, skipping unusable slots.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| !matches!(entry, Constant::Unusable))
            .map(|(index, entry)| (index as u16, entry))
    }
}

/// Builds the constant pool of a class being written.
pub struct ConstantPoolBuilder {
    entries: Vec<Constant>,
    lookup: HashMap<Constant, u16>,
}

impl ConstantPoolBuilder {
    /// Start a new pool that contains every entry of `pool` at its original index.
    #[must_use]
    pub fn from_pool(pool: &ConstantPool) -> Self {
        let mut lookup = HashMap::with_capacity(pool.len());
        for (index, entry) in pool.iter() {
            lookup.entry(entry.clone()).or_insert(index);
        }
        ConstantPoolBuilder {
            entries: pool.entries.clone(),
            lookup,
        }
    }

    /// Add `entry` unless an identical entry exists, returning its index.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] if the pool would exceed 65535 slots.
    pub fn add(&mut self, entry: Constant) -> Result<u16> {
        if let Some(index) = self.lookup.get(&entry) {
            return Ok(*index);
        }

        let needed = if entry.is_wide() { 2 } else { 1 };
        if self.entries.len() + needed > usize::from(u16::MAX) {
            return Err(crate::Error::NotSupported(
                "constant pool exceeds 65535 entries".to_string(),
            ));
        }

        let index = self.entries.len() as u16;
        let wide = entry.is_wide();
        self.lookup.insert(entry.clone(), index);
        self.entries.push(entry);
        if wide {
            self.entries.push(Constant::Unusable);
        }
        Ok(index)
    }

    /// Index of a `CONSTANT_Utf8` entry.
    ///
    /// # Errors
    /// See [`ConstantPoolBuilder::add`].
    pub fn utf8(&mut self, value: &str) -> Result<u16> {
        self.add(Constant::Utf8(value.to_string()))
    }

    /// Index of a `CONSTANT_Class` entry.
    ///
    /// # Errors
    /// See [`ConstantPoolBuilder::add`].
    pub fn class(&mut self, name: &str) -> Result<u16> {
        let name = self.utf8(name)?;
        self.add(Constant::Class(name))
    }

    /// Index of a `CONSTANT_String` entry.
    ///
    /// # Errors
    /// See [`ConstantPoolBuilder::add`].
    pub fn string(&mut self, value: &str) -> Result<u16> {
        let value = self.utf8(value)?;
        self.add(Constant::String(value))
    }

    /// Index of a `CONSTANT_NameAndType` entry.
    ///
    /// # Errors
    /// See [`ConstantPoolBuilder::add`].
    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name = self.utf8(name)?;
        let descriptor = self.utf8(descriptor)?;
        self.add(Constant::NameAndType { name, descriptor })
    }

    /// Index of a `CONSTANT_Fieldref` entry.
    ///
    /// # Errors
    /// See [`ConstantPoolBuilder::add`].
    pub fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class = self.class(owner)?;
        let name_and_type = self.name_and_type(name, descriptor)?;
        self.add(Constant::FieldRef {
            class,
            name_and_type,
        })
    }

    /// Index of a `CONSTANT_Methodref` or `CONSTANT_InterfaceMethodref` entry.
    ///
    /// # Errors
    /// See [`ConstantPoolBuilder::add`].
    pub fn method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        interface: bool,
    ) -> Result<u16> {
        let class = self.class(owner)?;
        let name_and_type = self.name_and_type(name, descriptor)?;
        if interface {
            self.add(Constant::InterfaceMethodRef {
                class,
                name_and_type,
            })
        } else {
            self.add(Constant::MethodRef {
                class,
                name_and_type,
            })
        }
    }

    /// Serialize the pool, starting with `constant_pool_count`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.entries.len() * 8);
        push_be(&mut out, self.entries.len() as u16);
        for entry in &self.entries {
            match entry {
                Constant::Unusable => {}
                Constant::Utf8(value) => {
                    let bytes = encode_modified_utf8(value);
                    push_be(&mut out, 1_u8);
                    push_be(&mut out, bytes.len() as u16);
                    out.extend_from_slice(&bytes);
                }
                Constant::Integer(value) => {
                    push_be(&mut out, 3_u8);
                    push_be(&mut out, *value);
                }
                Constant::Float(bits) => {
                    push_be(&mut out, 4_u8);
                    push_be(&mut out, *bits);
                }
                Constant::Long(value) => {
                    push_be(&mut out, 5_u8);
                    push_be(&mut out, *value);
                }
                Constant::Double(bits) => {
                    push_be(&mut out, 6_u8);
                    push_be(&mut out, *bits);
                }
                Constant::Class(name) => {
                    push_be(&mut out, 7_u8);
                    push_be(&mut out, *name);
                }
                Constant::String(value) => {
                    push_be(&mut out, 8_u8);
                    push_be(&mut out, *value);
                }
                Constant::FieldRef {
                    class,
                    name_and_type,
                } => {
                    push_be(&mut out, 9_u8);
                    push_be(&mut out, *class);
                    push_be(&mut out, *name_and_type);
                }
                Constant::MethodRef {
                    class,
                    name_and_type,
                } => {
                    push_be(&mut out, 10_u8);
                    push_be(&mut out, *class);
                    push_be(&mut out, *name_and_type);
                }
                Constant::InterfaceMethodRef {
                    class,
                    name_and_type,
                } => {
                    push_be(&mut out, 11_u8);
                    push_be(&mut out, *class);
                    push_be(&mut out, *name_and_type);
                }
                Constant::NameAndType { name, descriptor } => {
                    push_be(&mut out, 12_u8);
                    push_be(&mut out, *name);
                    push_be(&mut out, *descriptor);
                }
                Constant::MethodHandle { kind, reference } => {
                    push_be(&mut out, 15_u8);
                    push_be(&mut out, *kind);
                    push_be(&mut out, *reference);
                }
                Constant::MethodType(descriptor) => {
                    push_be(&mut out, 16_u8);
                    push_be(&mut out, *descriptor);
                }
                Constant::Dynamic {
                    bootstrap,
                    name_and_type,
                } => {
                    push_be(&mut out, 17_u8);
                    push_be(&mut out, *bootstrap);
                    push_be(&mut out, *name_and_type);
                }
                Constant::InvokeDynamic {
                    bootstrap,
                    name_and_type,
                } => {
                    push_be(&mut out, 18_u8);
                    push_be(&mut out, *bootstrap);
                    push_be(&mut out, *name_and_type);
                }
                Constant::Module(name) => {
                    push_be(&mut out, 19_u8);
                    push_be(&mut out, *name);
                }
                Constant::Package(name) => {
                    push_be(&mut out, 20_u8);
                    push_be(&mut out, *name);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_preserves_and_deduplicates() {
        let mut builder = ConstantPoolBuilder::from_pool(&ConstantPool::default());
        let first = builder.method_ref("a/B", "run", "()V", false).unwrap();
        let again = builder.method_ref("a/B", "run", "()V", false).unwrap();
        assert_eq!(first, again);

        let long = builder.add(Constant::Long(7)).unwrap();
        let after = builder.utf8("after").unwrap();
        assert_eq!(after, long + 2);

        let bytes = builder.to_bytes();
        let pool = ConstantPool::parse(&mut Parser::new(&bytes)).unwrap();
        let member = pool.member_ref(first).unwrap();
        assert_eq!(member.owner, "a/B");
        assert_eq!(member.name, "run");
        assert_eq!(member.descriptor, "()V");
        assert!(!member.interface);
        assert!(pool.get(long + 1).is_err());
        assert_eq!(pool.utf8(after).unwrap(), "after");

        let mut seeded = ConstantPoolBuilder::from_pool(&pool);
        assert_eq!(seeded.method_ref("a/B", "run", "()V", false).unwrap(), first);
        assert_eq!(seeded.utf8("new").unwrap() as usize, pool.len());
    }

    #[test]
    fn test_parse_rejects_bad_tag() {
        let data = [0x00, 0x02, 0x02, 0x00];
        let result = ConstantPool::parse(&mut Parser::new(&data));
        assert!(matches!(result, Err(crate::Error::Malformed { .. })));
    }

    #[test]
    fn test_wrong_entry_kind() {
        let mut builder = ConstantPoolBuilder::from_pool(&ConstantPool::default());
        let utf8 = builder.utf8("x").unwrap();
        let pool = ConstantPool::parse(&mut Parser::new(&builder.to_bytes())).unwrap();
        assert!(pool.class_name(utf8).is_err());
        assert!(pool.get(0).is_err());
    }
}
