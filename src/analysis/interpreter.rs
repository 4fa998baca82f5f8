//! Abstract value domains for the dataflow analyzer.
//!
//! An [`Interpreter`] supplies the abstract values a [`crate::analysis::Frame`] manipulates.
//! Two domains are provided:
//!
//! - [`BasicInterpreter`] only distinguishes value categories. It is enough to check stack
//!   heights and compute `max_stack`.
//! - [`VerifierInterpreter`] tracks verification types with class names, uninitialised objects
//!   and `null`. Its results feed the `StackMapTable` encoder, and merging two reference types
//!   asks a [`TypeHierarchy`] for their common superclass.

use std::fmt::Debug;

use crate::{analysis::TypeHierarchy, classfile::descriptor::Type, Result};

/// An abstract value.
pub trait AbstractValue: Clone + PartialEq + Debug {
    /// Number of stack words or local slots the value occupies.
    fn size(&self) -> usize;
}

/// Creates and merges abstract values.
pub trait Interpreter {
    /// The abstract value domain
    type Value: AbstractValue;

    /// Value of the given type, as produced by a load, field read or invocation.
    fn new_value(&self, ty: &Type) -> Self::Value;

    /// Value of an unset local slot.
    fn new_empty(&self) -> Self::Value;

    /// Value pushed by `aconst_null`.
    fn new_null(&self) -> Self::Value;

    /// Value pushed by `new class` at instruction `index`.
    fn new_uninitialized(&self, class: &str, index: usize) -> Self::Value;

    /// Value of `this` in a constructor before the super constructor runs.
    fn new_uninitialized_this(&self, owner: &str) -> Self::Value;

    /// Value pushed by `aaload` from `array`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `array` cannot hold references.
    fn array_element(&self, array: &Self::Value) -> Result<Self::Value>;

    /// Replacement of `value` once its constructor has been invoked, if it was uninitialised.
    fn initialized(&self, value: &Self::Value) -> Option<Self::Value>;

    /// Least upper bound of two values.
    fn merge(&self, a: &Self::Value, b: &Self::Value) -> Self::Value;
}

/// Values of the [`BasicInterpreter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicValue {
    /// Unset or conflicting
    Uninitialized,
    /// `int` and smaller integral types
    Int,
    /// `float`
    Float,
    /// `long`
    Long,
    /// `double`
    Double,
    /// Any reference
    Reference,
}

impl AbstractValue for BasicValue {
    fn size(&self) -> usize {
        match self {
            BasicValue::Long | BasicValue::Double => 2,
            _ => 1,
        }
    }
}

/// Category-only interpreter.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicInterpreter;

impl Interpreter for BasicInterpreter {
    type Value = BasicValue;

    fn new_value(&self, ty: &Type) -> BasicValue {
        match ty {
            Type::Void => BasicValue::Uninitialized,
            Type::Float => BasicValue::Float,
            Type::Long => BasicValue::Long,
            Type::Double => BasicValue::Double,
            Type::Object(_) | Type::Array(_) => BasicValue::Reference,
            _ => BasicValue::Int,
        }
    }

    fn new_empty(&self) -> BasicValue {
        BasicValue::Uninitialized
    }

    fn new_null(&self) -> BasicValue {
        BasicValue::Reference
    }

    fn new_uninitialized(&self, _class: &str, _index: usize) -> BasicValue {
        BasicValue::Reference
    }

    fn new_uninitialized_this(&self, _owner: &str) -> BasicValue {
        BasicValue::Reference
    }

    fn array_element(&self, _array: &BasicValue) -> Result<BasicValue> {
        Ok(BasicValue::Reference)
    }

    fn initialized(&self, _value: &BasicValue) -> Option<BasicValue> {
        None
    }

    fn merge(&self, a: &BasicValue, b: &BasicValue) -> BasicValue {
        if a == b {
            *a
        } else {
            BasicValue::Uninitialized
        }
    }
}

/// Verification types, as written to a `StackMapTable`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VerificationType {
    /// Unusable
    Top,
    /// `int` and smaller integral types
    Integer,
    /// `float`
    Float,
    /// `long`
    Long,
    /// `double`
    Double,
    /// The `null` reference
    Null,
    /// `this` in a constructor before the super constructor runs
    UninitializedThis(String),
    /// Result of `new` at an instruction index, before its constructor runs
    Uninitialized {
        /// Index of the `new` instruction
        index: usize,
        /// The class being instantiated
        class: String,
    },
    /// An initialised reference, by internal name or array descriptor
    Reference(String),
}

impl AbstractValue for VerificationType {
    fn size(&self) -> usize {
        match self {
            VerificationType::Long | VerificationType::Double => 2,
            _ => 1,
        }
    }
}

impl VerificationType {
    /// Returns `true` for `null` and initialised references.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        matches!(self, VerificationType::Null | VerificationType::Reference(_))
    }
}

const OBJECT: &str = "java/lang/Object";

/// Interpreter computing verification types.
pub struct VerifierInterpreter<'h> {
    hierarchy: &'h dyn TypeHierarchy,
}

impl<'h> VerifierInterpreter<'h> {
    /// Create an interpreter that merges references through `hierarchy`.
    #[must_use]
    pub fn new(hierarchy: &'h dyn TypeHierarchy) -> Self {
        VerifierInterpreter { hierarchy }
    }

    fn merge_references(&self, a: &str, b: &str) -> String {
        let a_dims = a.bytes().take_while(|c| *c == b'[').count();
        let b_dims = b.bytes().take_while(|c| *c == b'[').count();
        if a_dims == 0 && b_dims == 0 {
            return self.hierarchy.common_super_class(a, b);
        }
        if a_dims == 0 || b_dims == 0 {
            return OBJECT.to_string();
        }

        let a_element = &a[a_dims..];
        let b_element = &b[b_dims..];
        let a_ref = a_element.starts_with('L');
        let b_ref = b_element.starts_with('L');

        let object_array = |dims: usize| {
            if dims == 0 {
                OBJECT.to_string()
            } else {
                format!("{}L{OBJECT};", "[".repeat(dims))
            }
        };

        if a_dims == b_dims {
            if a_ref && b_ref {
                let common = self
                    .hierarchy
                    .common_super_class(&a_element[1..a_element.len() - 1], &b_element[1..b_element.len() - 1]);
                return format!("{}L{common};", "[".repeat(a_dims));
            }
            return object_array(a_dims - 1);
        }

        let (dims, element_is_ref) = if a_dims < b_dims {
            (a_dims, a_ref)
        } else {
            (b_dims, b_ref)
        };
        if element_is_ref {
            object_array(dims)
        } else {
            object_array(dims - 1)
        }
    }
}

impl Interpreter for VerifierInterpreter<'_> {
    type Value = VerificationType;

    fn new_value(&self, ty: &Type) -> VerificationType {
        match ty {
            Type::Void => VerificationType::Top,
            Type::Float => VerificationType::Float,
            Type::Long => VerificationType::Long,
            Type::Double => VerificationType::Double,
            Type::Object(name) => VerificationType::Reference(name.clone()),
            Type::Array(_) => VerificationType::Reference(ty.descriptor()),
            _ => VerificationType::Integer,
        }
    }

    fn new_empty(&self) -> VerificationType {
        VerificationType::Top
    }

    fn new_null(&self) -> VerificationType {
        VerificationType::Null
    }

    fn new_uninitialized(&self, class: &str, index: usize) -> VerificationType {
        VerificationType::Uninitialized {
            index,
            class: class.to_string(),
        }
    }

    fn new_uninitialized_this(&self, owner: &str) -> VerificationType {
        VerificationType::UninitializedThis(owner.to_string())
    }

    fn array_element(&self, array: &VerificationType) -> Result<VerificationType> {
        match array {
            VerificationType::Null => Ok(VerificationType::Null),
            VerificationType::Reference(desc) if desc.starts_with('[') => {
                Ok(self.new_value(&Type::parse(&desc[1..])?))
            }
            other => Err(malformed_error!("aaload on a non-array value - {:?}", other)),
        }
    }

    fn initialized(&self, value: &VerificationType) -> Option<VerificationType> {
        match value {
            VerificationType::UninitializedThis(owner) => {
                Some(VerificationType::Reference(owner.clone()))
            }
            VerificationType::Uninitialized { class, .. } => {
                Some(VerificationType::Reference(class.clone()))
            }
            _ => None,
        }
    }

    fn merge(&self, a: &VerificationType, b: &VerificationType) -> VerificationType {
        if a == b {
            return a.clone();
        }
        match (a, b) {
            (VerificationType::Null, VerificationType::Reference(_)) => b.clone(),
            (VerificationType::Reference(_), VerificationType::Null) => a.clone(),
            (VerificationType::Reference(x), VerificationType::Reference(y)) => {
                VerificationType::Reference(self.merge_references(x, y))
            }
            _ => VerificationType::Top,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ObjectHierarchy;

    struct Fixed;

    impl TypeHierarchy for Fixed {
        fn common_super_class(&self, a: &str, b: &str) -> String {
            if a == b {
                a.to_string()
            } else {
                "a/Base".to_string()
            }
        }
    }

    #[test]
    fn test_basic_merge() {
        let interp = BasicInterpreter;
        assert_eq!(interp.merge(&BasicValue::Int, &BasicValue::Int), BasicValue::Int);
        assert_eq!(
            interp.merge(&BasicValue::Int, &BasicValue::Reference),
            BasicValue::Uninitialized
        );
        assert_eq!(interp.new_value(&Type::Boolean), BasicValue::Int);
    }

    #[test]
    fn test_verifier_reference_merge() {
        let interp = VerifierInterpreter::new(&Fixed);
        let a = VerificationType::Reference("a/A".into());
        let b = VerificationType::Reference("a/B".into());
        assert_eq!(interp.merge(&a, &b), VerificationType::Reference("a/Base".into()));
        assert_eq!(interp.merge(&VerificationType::Null, &a), a);
        assert_eq!(
            interp.merge(&VerificationType::Integer, &a),
            VerificationType::Top
        );
    }

    #[test]
    fn test_verifier_array_merge() {
        let interp = VerifierInterpreter::new(&Fixed);
        let merge = |x: &str, y: &str| {
            interp.merge(
                &VerificationType::Reference(x.into()),
                &VerificationType::Reference(y.into()),
            )
        };
        assert_eq!(
            merge("[La/A;", "[La/B;"),
            VerificationType::Reference("[La/Base;".into())
        );
        assert_eq!(merge("[I", "[F"), VerificationType::Reference(OBJECT.into()));
        assert_eq!(
            merge("[[I", "[La/A;"),
            VerificationType::Reference("[Ljava/lang/Object;".into())
        );
        assert_eq!(merge("[I", "a/A"), VerificationType::Reference(OBJECT.into()));
    }

    #[test]
    fn test_array_element_and_initialisation() {
        let interp = VerifierInterpreter::new(&ObjectHierarchy);
        let element = interp
            .array_element(&VerificationType::Reference("[[J".into()))
            .unwrap();
        assert_eq!(element, VerificationType::Reference("[J".into()));
        assert!(interp
            .array_element(&VerificationType::Reference("a/A".into()))
            .is_err());

        let uninit = interp.new_uninitialized("a/A", 3);
        assert_eq!(
            interp.initialized(&uninit),
            Some(VerificationType::Reference("a/A".into()))
        );
    }
}
