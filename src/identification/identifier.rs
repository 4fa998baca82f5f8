use std::{collections::HashSet, fmt, sync::Arc};

use crate::{
    classfile::{ClassNode, FieldNode, MethodNode},
    identification::ElementDescription,
};

/// Predicate over the structure of a class.
pub type ClassPredicate = Arc<dyn Fn(&ClassNode) -> bool + Send + Sync>;
/// Predicate over a field.
pub type FieldPredicate = Arc<dyn Fn(&FieldNode) -> bool + Send + Sync>;
/// Predicate over a method.
pub type MethodPredicate = Arc<dyn Fn(&MethodNode) -> bool + Send + Sync>;

/// Identifies classes.
#[derive(Clone)]
pub enum ClassIdentifier {
    /// A fixed set of internal names
    Static(HashSet<String>),
    /// A predicate evaluated against the class structure
    Dynamic(ClassPredicate),
}

impl ClassIdentifier {
    /// Identify classes by internal name.
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ClassIdentifier::Static(names.into_iter().map(Into::into).collect())
    }

    /// Identify classes with a predicate.
    pub fn matching(predicate: impl Fn(&ClassNode) -> bool + Send + Sync + 'static) -> Self {
        ClassIdentifier::Dynamic(Arc::new(predicate))
    }

    /// Returns `true` for name-set identifiers.
    #[must_use]
    pub fn is_static(&self) -> bool {
        matches!(self, ClassIdentifier::Static(_))
    }

    /// Returns `true` if the class named `name`, with structure `node` when known, is identified.
    ///
    /// A dynamic identifier never matches a class whose structure is unknown.
    #[must_use]
    pub fn identifies(&self, name: &str, node: Option<&ClassNode>) -> bool {
        match self {
            ClassIdentifier::Static(names) => names.contains(name),
            ClassIdentifier::Dynamic(predicate) => node.is_some_and(|node| predicate(node)),
        }
    }
}

impl fmt::Debug for ClassIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassIdentifier::Static(names) => f.debug_tuple("Static").field(names).finish(),
            ClassIdentifier::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Identifies fields of a class.
#[derive(Clone)]
pub enum FieldIdentifier {
    /// A fixed set of name and descriptor pairs
    Static(HashSet<ElementDescription>),
    /// A predicate evaluated against each field
    Dynamic(FieldPredicate),
}

impl FieldIdentifier {
    /// Identify fields by name and descriptor.
    pub fn descriptions(items: impl IntoIterator<Item = ElementDescription>) -> Self {
        FieldIdentifier::Static(items.into_iter().collect())
    }

    /// Identify fields with a predicate.
    pub fn matching(predicate: impl Fn(&FieldNode) -> bool + Send + Sync + 'static) -> Self {
        FieldIdentifier::Dynamic(Arc::new(predicate))
    }

    /// The described elements of a static identifier.
    #[must_use]
    pub fn static_descriptions(&self) -> Option<&HashSet<ElementDescription>> {
        match self {
            FieldIdentifier::Static(items) => Some(items),
            FieldIdentifier::Dynamic(_) => None,
        }
    }

    /// Returns `true` if `field` is identified.
    #[must_use]
    pub fn identifies(&self, field: &FieldNode) -> bool {
        match self {
            FieldIdentifier::Static(items) => items
                .iter()
                .any(|item| item.matches(&field.name, &field.desc)),
            FieldIdentifier::Dynamic(predicate) => predicate(field),
        }
    }
}

impl fmt::Debug for FieldIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldIdentifier::Static(items) => f.debug_tuple("Static").field(items).finish(),
            FieldIdentifier::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Identifies methods of a class.
#[derive(Clone)]
pub enum MethodIdentifier {
    /// A fixed set of name and descriptor pairs
    Static(HashSet<ElementDescription>),
    /// A predicate evaluated against each method
    Dynamic(MethodPredicate),
}

impl MethodIdentifier {
    /// Identify methods by name and descriptor.
    pub fn descriptions(items: impl IntoIterator<Item = ElementDescription>) -> Self {
        MethodIdentifier::Static(items.into_iter().collect())
    }

    /// Identify methods with a predicate.
    pub fn matching(predicate: impl Fn(&MethodNode) -> bool + Send + Sync + 'static) -> Self {
        MethodIdentifier::Dynamic(Arc::new(predicate))
    }

    /// Returns `true` if `method` is identified.
    #[must_use]
    pub fn identifies(&self, method: &MethodNode) -> bool {
        match self {
            MethodIdentifier::Static(items) => items
                .iter()
                .any(|item| item.matches(&method.name, &method.desc)),
            MethodIdentifier::Dynamic(predicate) => predicate(method),
        }
    }
}

impl fmt::Debug for MethodIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodIdentifier::Static(items) => f.debug_tuple("Static").field(items).finish(),
            MethodIdentifier::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}
