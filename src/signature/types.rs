use std::{collections::HashSet, fmt};

use crate::{classfile::descriptor::Type, Result};

/// A parsed class or method signature.
///
/// Class signatures fill `superclass` and `interfaces`; method signatures fill `parameters`,
/// `return_type` and `exceptions`. Both may declare formal type parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    /// Formal type parameters in declaration order
    pub formal_type_parameters: Vec<FormalTypeParameter>,
    /// Method parameter types
    pub parameters: Vec<TypeSymbol>,
    /// Method return type
    pub return_type: Option<TypeSymbol>,
    /// Declared thrown types
    pub exceptions: Vec<TypeSymbol>,
    /// Class superclass type
    pub superclass: Option<TypeSymbol>,
    /// Class superinterface types
    pub interfaces: Vec<TypeSymbol>,
}

/// A formal type parameter such as `T extends Number & Comparable<T>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormalTypeParameter {
    /// Variable name
    pub name: String,
    /// The class bound, absent when only interface bounds are declared
    pub class_bound: Option<TypeSymbol>,
    /// Interface bounds
    pub interface_bounds: Vec<TypeSymbol>,
}

/// A type inside a signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSymbol {
    /// A type variable, possibly as an array element type
    Variable {
        /// Variable name
        name: String,
        /// Array dimensions
        dims: u8,
    },
    /// A class or interface type
    Class(ClassType),
    /// A primitive type or `void`
    Base {
        /// Descriptor character, one of `BCDFIJSZV`
        descriptor: char,
        /// Array dimensions
        dims: u8,
    },
}

/// A possibly parameterized class type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassType {
    /// The outermost class followed by inner-class segments
    pub segments: Vec<ClassSegment>,
    /// Array dimensions
    pub dims: u8,
}

/// One segment of a [`ClassType`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassSegment {
    /// Internal name of the first segment, simple name of inner segments
    pub name: String,
    /// Type arguments of this segment
    pub args: Vec<TypeArg>,
}

/// A type argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeArg {
    /// `?`
    Unbounded,
    /// `? extends T`
    Extends(TypeSymbol),
    /// `? super T`
    Super(TypeSymbol),
    /// `T`
    Exact(TypeSymbol),
}

/// Wildcard discriminator of a [`TypeArg`], as reported to a visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wildcard {
    /// `*`
    Unbounded,
    /// `+`
    Extends,
    /// `-`
    Super,
    /// `=`, no wildcard
    Exact,
}

/// A node visited by [`Signature::traverse_dfs`].
#[derive(Debug, Clone, Copy)]
pub enum SymbolRef<'a> {
    /// A formal type parameter
    Formal(&'a FormalTypeParameter),
    /// A type
    Type(&'a TypeSymbol),
    /// A type argument
    Arg(&'a TypeArg),
}

impl Signature {
    /// Parse a class or method signature. Same as [`crate::signature::parse_signature`].
    ///
    /// # Errors
    /// See [`crate::signature::parse_signature`].
    pub fn parse(input: &str) -> Result<Signature> {
        crate::signature::SignatureParser::new(input).parse_signature()
    }

    /// Returns `true` for class signatures.
    #[must_use]
    pub fn is_class_signature(&self) -> bool {
        self.superclass.is_some() || !self.interfaces.is_empty()
    }

    /// Formal type parameter named `name`.
    #[must_use]
    pub fn formal(&self, name: &str) -> Option<&FormalTypeParameter> {
        self.formal_type_parameters.iter().find(|f| f.name == name)
    }

    /// Visit every formal parameter, type and type argument in depth-first order.
    pub fn traverse_dfs<'a>(&'a self, visitor: &mut impl FnMut(SymbolRef<'a>)) {
        for formal in &self.formal_type_parameters {
            visitor(SymbolRef::Formal(formal));
            formal.traverse_dfs(visitor);
        }
        let types = self
            .parameters
            .iter()
            .chain(&self.return_type)
            .chain(&self.exceptions)
            .chain(&self.superclass)
            .chain(&self.interfaces);
        for ty in types {
            visitor(SymbolRef::Type(ty));
            ty.traverse_dfs(visitor);
        }
    }

    /// Names of every type variable referenced by the signature, including inside bounds.
    #[must_use]
    pub fn variables(&self) -> HashSet<String> {
        let mut variables = HashSet::new();
        self.traverse_dfs(&mut |symbol| {
            if let SymbolRef::Type(TypeSymbol::Variable { name, .. }) = symbol {
                variables.insert(name.clone());
            }
        });
        variables
    }
}

impl FormalTypeParameter {
    /// All bounds, the class bound first.
    pub fn bounds(&self) -> impl Iterator<Item = &TypeSymbol> {
        self.class_bound.iter().chain(&self.interface_bounds)
    }

    /// Visit every type and type argument of the bounds in depth-first order.
    pub fn traverse_dfs<'a>(&'a self, visitor: &mut impl FnMut(SymbolRef<'a>)) {
        for bound in self.bounds() {
            visitor(SymbolRef::Type(bound));
            bound.traverse_dfs(visitor);
        }
    }

    /// Names of the type variables referenced by the bounds.
    #[must_use]
    pub fn variables(&self) -> HashSet<String> {
        let mut variables = HashSet::new();
        self.traverse_dfs(&mut |symbol| {
            if let SymbolRef::Type(TypeSymbol::Variable { name, .. }) = symbol {
                variables.insert(name.clone());
            }
        });
        variables
    }
}

impl TypeSymbol {
    /// A non-array class type without type arguments.
    #[must_use]
    pub fn class(internal_name: &str) -> TypeSymbol {
        TypeSymbol::Class(ClassType {
            segments: vec![ClassSegment {
                name: internal_name.to_string(),
                args: Vec::new(),
            }],
            dims: 0,
        })
    }

    /// Array dimensions.
    #[must_use]
    pub fn dims(&self) -> u8 {
        match self {
            TypeSymbol::Variable { dims, .. } | TypeSymbol::Base { dims, .. } => *dims,
            TypeSymbol::Class(class) => class.dims,
        }
    }

    /// The same symbol with `dims` array dimensions.
    #[must_use]
    pub fn with_dims(mut self, new_dims: u8) -> TypeSymbol {
        match &mut self {
            TypeSymbol::Variable { dims, .. } | TypeSymbol::Base { dims, .. } => *dims = new_dims,
            TypeSymbol::Class(class) => class.dims = new_dims,
        }
        self
    }

    /// Visit nested type arguments and their types in depth-first order.
    pub fn traverse_dfs<'a>(&'a self, visitor: &mut impl FnMut(SymbolRef<'a>)) {
        let TypeSymbol::Class(class) = self else {
            return;
        };
        for arg in class.segments.iter().flat_map(|segment| &segment.args) {
            visitor(SymbolRef::Arg(arg));
            if let Some(bound) = arg.bound() {
                visitor(SymbolRef::Type(bound));
                bound.traverse_dfs(visitor);
            }
        }
    }

    /// Erased descriptor type, with type variables erased to `java/lang/Object`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an invalid base descriptor.
    pub fn erasure(&self) -> Result<Type> {
        let element = match self {
            TypeSymbol::Variable { .. } => Type::object("java/lang/Object"),
            TypeSymbol::Class(class) => Type::object(&class.internal_name()),
            TypeSymbol::Base { descriptor, .. } => Type::parse(descriptor.encode_utf8(&mut [0; 4]))?,
        };
        let mut ty = element;
        for _ in 0..self.dims() {
            ty = Type::Array(Box::new(ty));
        }
        Ok(ty)
    }
}

impl ClassType {
    /// Internal name, inner segments joined with `$`.
    #[must_use]
    pub fn internal_name(&self) -> String {
        let mut name = String::new();
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                name.push('$');
            }
            name.push_str(&segment.name);
        }
        name
    }

    /// Type arguments of the innermost segment.
    #[must_use]
    pub fn args(&self) -> &[TypeArg] {
        self.segments
            .last()
            .map_or(&[][..], |segment| segment.args.as_slice())
    }
}

impl TypeArg {
    /// The bound or exact type, `None` for `?`.
    #[must_use]
    pub fn bound(&self) -> Option<&TypeSymbol> {
        match self {
            TypeArg::Unbounded => None,
            TypeArg::Extends(ty) | TypeArg::Super(ty) | TypeArg::Exact(ty) => Some(ty),
        }
    }

    /// The wildcard discriminator.
    #[must_use]
    pub fn wildcard(&self) -> Wildcard {
        match self {
            TypeArg::Unbounded => Wildcard::Unbounded,
            TypeArg::Extends(_) => Wildcard::Extends,
            TypeArg::Super(_) => Wildcard::Super,
            TypeArg::Exact(_) => Wildcard::Exact,
        }
    }
}

fn write_joined<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class = self.is_class_signature();
        if class {
            write!(f, "class")?;
        }
        if !self.formal_type_parameters.is_empty() {
            if class {
                write!(f, " ")?;
            }
            write!(f, "<")?;
            write_joined(f, &self.formal_type_parameters)?;
            write!(f, ">")?;
        }

        if class {
            if let Some(superclass) = &self.superclass {
                write!(f, " extends {superclass}")?;
            }
            if !self.interfaces.is_empty() {
                write!(f, " implements ")?;
                write_joined(f, &self.interfaces)?;
            }
            return Ok(());
        }

        if !self.formal_type_parameters.is_empty() {
            write!(f, " ")?;
        }
        match &self.return_type {
            Some(ret) => write!(f, "{ret}")?,
            None => write!(f, "void")?,
        }
        write!(f, " method(")?;
        write_joined(f, &self.parameters)?;
        write!(f, ")")?;
        if !self.exceptions.is_empty() {
            write!(f, " throws ")?;
            write_joined(f, &self.exceptions)?;
        }
        Ok(())
    }
}

impl fmt::Display for FormalTypeParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for (i, bound) in self.bounds().enumerate() {
            if i == 0 {
                write!(f, " extends {bound}")?;
            } else {
                write!(f, " & {bound}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for TypeSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSymbol::Variable { name, .. } => write!(f, "{name}")?,
            TypeSymbol::Class(class) => {
                for (i, segment) in class.segments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{}", segment.name.replace('/', "."))?;
                    if !segment.args.is_empty() {
                        write!(f, "<")?;
                        write_joined(f, &segment.args)?;
                        write!(f, ">")?;
                    }
                }
            }
            TypeSymbol::Base { descriptor, .. } => {
                let name = match descriptor {
                    'B' => "byte",
                    'C' => "char",
                    'D' => "double",
                    'F' => "float",
                    'I' => "int",
                    'J' => "long",
                    'S' => "short",
                    'Z' => "boolean",
                    _ => "void",
                };
                write!(f, "{name}")?;
            }
        }
        for _ in 0..self.dims() {
            write!(f, "[]")?;
        }
        Ok(())
    }
}

impl fmt::Display for TypeArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeArg::Unbounded => write!(f, "?"),
            TypeArg::Extends(ty) => write!(f, "? extends {ty}"),
            TypeArg::Super(ty) => write!(f, "? super {ty}"),
            TypeArg::Exact(ty) => write!(f, "{ty}"),
        }
    }
}
