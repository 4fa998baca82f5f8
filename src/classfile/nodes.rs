//! The editable tree representation of a class file.
//!
//! A [`ClassNode`] owns its fields, methods and the attributes the weaver needs to inspect or
//! rewrite. Attributes the codec does not model are kept as raw [`Attribute`]s and written back
//! verbatim; this is valid because the writer keeps every constant-pool index of the original
//! class stable.
//!
//! Method bodies follow the same rule. A method decoded from a class file remembers its original
//! `Code` attribute, and the writer copies that attribute unchanged until the body is touched
//! through [`MethodNode::code_mut`] or replaced with [`MethodNode::set_code`].

use crate::{
    classfile::{
        access::AccessFlags,
        annotation::Annotation,
        constpool::ConstantPool,
        descriptor::{MethodType, Type},
        insn::{InsnList, LabelId},
    },
    Result,
};

/// An attribute the codec does not interpret.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Attribute name
    pub name: String,
    /// Raw attribute body
    pub data: Vec<u8>,
}

/// An entry of the `InnerClasses` attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct InnerClassNode {
    /// Internal name of the inner class
    pub name: String,
    /// Internal name of the declaring class, `None` for local and anonymous classes
    pub outer_name: Option<String>,
    /// Simple name, `None` for anonymous classes
    pub inner_name: Option<String>,
    /// Access flags declared in the source
    pub access: AccessFlags,
}

/// The `EnclosingMethod` attribute of a local or anonymous class.
#[derive(Debug, Clone, PartialEq)]
pub struct EnclosingMethod {
    /// Internal name of the enclosing class
    pub owner: String,
    /// Name and descriptor of the enclosing method, if any
    pub method: Option<(String, String)>,
}

/// An entry of the local-variable table, merged with its local-variable-type entry.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVariableNode {
    /// Variable name
    pub name: String,
    /// Field descriptor of the variable
    pub desc: String,
    /// Generic signature, from `LocalVariableTypeTable`
    pub signature: Option<String>,
    /// First instruction of the scope
    pub start: LabelId,
    /// End of the scope, exclusive
    pub end: LabelId,
    /// Local-variable slot
    pub index: u16,
}

/// An exception handler.
#[derive(Debug, Clone, PartialEq)]
pub struct TryCatchBlock {
    /// Start of the protected range
    pub start: LabelId,
    /// End of the protected range, exclusive
    pub end: LabelId,
    /// Handler entry point
    pub handler: LabelId,
    /// Internal name of the caught type, `None` for `finally`
    pub catch_type: Option<String>,
}

/// A decoded method body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Code {
    /// The instructions
    pub instructions: InsnList,
    /// Exception handlers, innermost first
    pub try_catch_blocks: Vec<TryCatchBlock>,
    /// Local-variable debug information
    pub local_variables: Vec<LocalVariableNode>,
    /// Maximum operand stack depth, recomputed on write
    pub max_stack: u16,
    /// Number of local slots, recomputed on write
    pub max_locals: u16,
}

/// A field of a class.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    /// Access flags
    pub access: AccessFlags,
    /// Field name
    pub name: String,
    /// Field descriptor
    pub desc: String,
    /// Generic signature
    pub signature: Option<String>,
    /// Runtime-visible annotations
    pub visible_annotations: Vec<Annotation>,
    /// Attributes kept verbatim, such as `ConstantValue`
    pub attributes: Vec<Attribute>,
}

impl FieldNode {
    /// Create a field with no attributes.
    #[must_use]
    pub fn new(access: AccessFlags, name: &str, desc: &str) -> Self {
        FieldNode {
            access,
            name: name.to_string(),
            desc: desc.to_string(),
            signature: None,
            visible_annotations: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// The erased type of the field.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an invalid descriptor.
    pub fn field_type(&self) -> Result<Type> {
        Type::parse(&self.desc)
    }
}

/// A method of a class.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodNode {
    /// Access flags
    pub access: AccessFlags,
    /// Method name
    pub name: String,
    /// Method descriptor
    pub desc: String,
    /// Generic signature
    pub signature: Option<String>,
    /// Declared checked exceptions, as internal names
    pub exceptions: Vec<String>,
    /// Runtime-visible annotations
    pub visible_annotations: Vec<Annotation>,
    /// Runtime-visible annotations per parameter
    pub visible_parameter_annotations: Vec<Vec<Annotation>>,
    /// Attributes kept verbatim
    pub attributes: Vec<Attribute>,
    code: Option<Code>,
    verbatim_code: Option<Vec<u8>>,
}

impl MethodNode {
    /// Create a method with no body.
    #[must_use]
    pub fn new(access: AccessFlags, name: &str, desc: &str) -> Self {
        MethodNode {
            access,
            name: name.to_string(),
            desc: desc.to_string(),
            signature: None,
            exceptions: Vec::new(),
            visible_annotations: Vec::new(),
            visible_parameter_annotations: Vec::new(),
            attributes: Vec::new(),
            code: None,
            verbatim_code: None,
        }
    }

    pub(crate) fn set_decoded(&mut self, code: Option<Code>, verbatim: Vec<u8>) {
        self.code = code;
        self.verbatim_code = Some(verbatim);
    }

    /// The decoded body, `None` for abstract and native methods or when code was skipped.
    #[must_use]
    pub fn code(&self) -> Option<&Code> {
        self.code.as_ref()
    }

    /// Mutable access to the body. The original `Code` attribute is discarded, so the body is
    /// re-encoded when the class is written.
    pub fn code_mut(&mut self) -> Option<&mut Code> {
        if self.code.is_some() {
            self.verbatim_code = None;
        }
        self.code.as_mut()
    }

    /// Replace the body.
    pub fn set_code(&mut self, code: Code) {
        self.verbatim_code = None;
        self.code = Some(code);
    }

    /// The original `Code` attribute body, while the method is unmodified.
    #[must_use]
    pub fn verbatim_code(&self) -> Option<&[u8]> {
        self.verbatim_code.as_deref()
    }

    /// Parameter and return types.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an invalid descriptor.
    pub fn method_type(&self) -> Result<MethodType> {
        MethodType::parse(&self.desc)
    }

    /// The runtime-visible annotation of type `desc`.
    #[must_use]
    pub fn annotation(&self, desc: &str) -> Option<&Annotation> {
        self.visible_annotations.iter().find(|a| a.desc == desc)
    }

    /// The runtime-visible annotation of type `desc` on parameter `index`.
    #[must_use]
    pub fn parameter_annotation(&self, index: usize, desc: &str) -> Option<&Annotation> {
        self.visible_parameter_annotations
            .get(index)?
            .iter()
            .find(|a| a.desc == desc)
    }

    /// `owner.name(desc)` display form used in diagnostics.
    #[must_use]
    pub fn display_name(&self, owner: &str) -> String {
        format!("{owner}.{}{}", self.name, self.desc)
    }
}

/// A class or interface.
#[derive(Debug, Clone)]
pub struct ClassNode {
    /// Minor class-file version
    pub minor_version: u16,
    /// Major class-file version
    pub major_version: u16,
    /// Access flags
    pub access: AccessFlags,
    /// Internal name
    pub name: String,
    /// Internal name of the superclass, `None` only for `java/lang/Object`
    pub super_name: Option<String>,
    /// Internal names of the direct superinterfaces
    pub interfaces: Vec<String>,
    /// Generic signature
    pub signature: Option<String>,
    /// `EnclosingMethod` attribute
    pub enclosing_method: Option<EnclosingMethod>,
    /// `InnerClasses` attribute
    pub inner_classes: Vec<InnerClassNode>,
    /// Runtime-visible annotations
    pub visible_annotations: Vec<Annotation>,
    /// Fields in declaration order
    pub fields: Vec<FieldNode>,
    /// Methods in declaration order
    pub methods: Vec<MethodNode>,
    /// Attributes kept verbatim
    pub attributes: Vec<Attribute>,
    pub(crate) constant_pool: ConstantPool,
}

impl ClassNode {
    /// Create an empty class with a fresh constant pool.
    #[must_use]
    pub fn new(major_version: u16, access: AccessFlags, name: &str, super_name: Option<&str>) -> Self {
        ClassNode {
            minor_version: 0,
            major_version,
            access,
            name: name.to_string(),
            super_name: super_name.map(str::to_string),
            interfaces: Vec::new(),
            signature: None,
            enclosing_method: None,
            inner_classes: Vec::new(),
            visible_annotations: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
            constant_pool: ConstantPool::default(),
        }
    }

    /// The constant pool the class was decoded from.
    #[must_use]
    pub fn constant_pool(&self) -> &ConstantPool {
        &self.constant_pool
    }

    /// Returns `true` for interfaces.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.access.is_interface()
    }

    /// The field with the given name and descriptor.
    #[must_use]
    pub fn field(&self, name: &str, desc: &str) -> Option<&FieldNode> {
        self.fields
            .iter()
            .find(|field| field.name == name && field.desc == desc)
    }

    /// The method with the given name and descriptor.
    #[must_use]
    pub fn method(&self, name: &str, desc: &str) -> Option<&MethodNode> {
        self.methods
            .iter()
            .find(|method| method.name == name && method.desc == desc)
    }

    /// The runtime-visible annotation of type `desc`.
    #[must_use]
    pub fn annotation(&self, desc: &str) -> Option<&Annotation> {
        self.visible_annotations.iter().find(|a| a.desc == desc)
    }

    /// Internal name of the lexically enclosing class.
    ///
    /// The `EnclosingMethod` attribute wins. Otherwise the `InnerClasses` entry describing this
    /// class names its declaring class.
    #[must_use]
    pub fn outer_class(&self) -> Option<&str> {
        if let Some(enclosing) = &self.enclosing_method {
            return Some(&enclosing.owner);
        }
        self.inner_classes
            .iter()
            .find(|inner| inner.name == self.name)
            .and_then(|inner| inner.outer_name.as_deref())
    }

    /// Add `interface` to the superinterfaces unless it is already there.
    pub fn add_interface(&mut self, interface: &str) -> bool {
        if self.interfaces.iter().any(|existing| existing == interface) {
            return false;
        }
        self.interfaces.push(interface.to_string());
        true
    }

    /// Copy of the class without method bodies.
    #[must_use]
    pub fn structural(&self) -> ClassNode {
        let mut copy = self.clone();
        for method in &mut copy.methods {
            method.code = None;
            method.verbatim_code = None;
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outer_class_prefers_enclosing_method() {
        let mut class = ClassNode::new(52, AccessFlags::SUPER, "a/Outer$1", Some("java/lang/Object"));
        class.inner_classes.push(InnerClassNode {
            name: "a/Outer$1".into(),
            outer_name: Some("a/Other".into()),
            inner_name: None,
            access: AccessFlags::empty(),
        });
        assert_eq!(class.outer_class(), Some("a/Other"));

        class.enclosing_method = Some(EnclosingMethod {
            owner: "a/Outer".into(),
            method: Some(("run".into(), "()V".into())),
        });
        assert_eq!(class.outer_class(), Some("a/Outer"));
    }

    #[test]
    fn test_add_interface_skips_duplicates() {
        let mut class = ClassNode::new(52, AccessFlags::PUBLIC, "a/B", Some("java/lang/Object"));
        assert!(class.add_interface("x/Contract"));
        assert!(!class.add_interface("x/Contract"));
        assert_eq!(class.interfaces, vec!["x/Contract"]);
    }

    #[test]
    fn test_code_mut_drops_verbatim_body() {
        let mut method = MethodNode::new(AccessFlags::PUBLIC, "run", "()V");
        method.set_decoded(Some(Code::default()), vec![0, 1, 2]);
        assert!(method.verbatim_code().is_some());
        let _ = method.code_mut();
        assert!(method.verbatim_code().is_none());
    }
}
