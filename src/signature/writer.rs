//! Visitor-based signature emission.
//!
//! [`Signature::accept`] and [`TypeSymbol::accept`] replay a parsed signature as a flat stream of
//! [`SignatureVisitor`] events. [`SignatureWriter`] turns that stream back into the wire format,
//! which is how synthesized methods get their `Signature` attribute.

use crate::signature::{FormalTypeParameter, Signature, TypeSymbol, Wildcard};

/// Receives the structure of a signature.
///
/// The context methods (`visit_class_bound`, `visit_parameter_type`, ...) announce the role of
/// the type events that follow. A class type is opened by `visit_class_type`, may continue with
/// `visit_type_argument` and `visit_inner_class_type`, and is closed by `visit_end`.
pub trait SignatureVisitor {
    /// A formal type parameter; its bounds follow.
    fn visit_formal_type_parameter(&mut self, name: &str);
    /// The class bound of the current formal type parameter follows.
    fn visit_class_bound(&mut self);
    /// An interface bound of the current formal type parameter follows.
    fn visit_interface_bound(&mut self);
    /// The superclass type follows.
    fn visit_superclass(&mut self);
    /// A superinterface type follows.
    fn visit_interface(&mut self);
    /// A method parameter type follows.
    fn visit_parameter_type(&mut self);
    /// The method return type follows.
    fn visit_return_type(&mut self);
    /// A thrown type follows.
    fn visit_exception_type(&mut self);
    /// A primitive type or `void`.
    fn visit_base_type(&mut self, descriptor: char);
    /// A type variable.
    fn visit_type_variable(&mut self, name: &str);
    /// An array whose element type follows.
    fn visit_array_type(&mut self);
    /// Start of a class type.
    fn visit_class_type(&mut self, name: &str);
    /// An inner-class segment of the current class type.
    fn visit_inner_class_type(&mut self, name: &str);
    /// A type argument of the current class type; unless unbounded, its type follows.
    fn visit_type_argument(&mut self, wildcard: Wildcard);
    /// End of the current class type.
    fn visit_end(&mut self);
}

/// Emits the wire form of a signature.
#[derive(Debug, Default)]
pub struct SignatureWriter {
    out: String,
    has_formals: bool,
    has_parameters: bool,
    // One flag per open class type: whether its `<` has been written
    argument_stack: Vec<bool>,
}

impl SignatureWriter {
    /// Create an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The emitted signature.
    #[must_use]
    pub fn finish(self) -> String {
        self.out
    }

    fn end_formals(&mut self) {
        if self.has_formals {
            self.has_formals = false;
            self.out.push('>');
        }
    }

    fn end_arguments(&mut self) {
        if self.argument_stack.pop() == Some(true) {
            self.out.push('>');
        }
    }
}

impl SignatureVisitor for SignatureWriter {
    fn visit_formal_type_parameter(&mut self, name: &str) {
        if !self.has_formals {
            self.has_formals = true;
            self.out.push('<');
        }
        self.out.push_str(name);
        self.out.push(':');
    }

    fn visit_class_bound(&mut self) {}

    fn visit_interface_bound(&mut self) {
        self.out.push(':');
    }

    fn visit_superclass(&mut self) {
        self.end_formals();
    }

    fn visit_interface(&mut self) {}

    fn visit_parameter_type(&mut self) {
        self.end_formals();
        if !self.has_parameters {
            self.has_parameters = true;
            self.out.push('(');
        }
    }

    fn visit_return_type(&mut self) {
        self.end_formals();
        if !self.has_parameters {
            self.out.push('(');
        }
        self.out.push(')');
    }

    fn visit_exception_type(&mut self) {
        self.out.push('^');
    }

    fn visit_base_type(&mut self, descriptor: char) {
        self.out.push(descriptor);
    }

    fn visit_type_variable(&mut self, name: &str) {
        self.out.push('T');
        self.out.push_str(name);
        self.out.push(';');
    }

    fn visit_array_type(&mut self) {
        self.out.push('[');
    }

    fn visit_class_type(&mut self, name: &str) {
        self.out.push('L');
        self.out.push_str(name);
        self.argument_stack.push(false);
    }

    fn visit_inner_class_type(&mut self, name: &str) {
        self.end_arguments();
        self.out.push('.');
        self.out.push_str(name);
        self.argument_stack.push(false);
    }

    fn visit_type_argument(&mut self, wildcard: Wildcard) {
        if let Some(open) = self.argument_stack.last_mut() {
            if !*open {
                *open = true;
                self.out.push('<');
            }
        }
        match wildcard {
            Wildcard::Unbounded => self.out.push('*'),
            Wildcard::Extends => self.out.push('+'),
            Wildcard::Super => self.out.push('-'),
            Wildcard::Exact => {}
        }
    }

    fn visit_end(&mut self) {
        self.end_arguments();
        self.out.push(';');
    }
}

impl Signature {
    /// Replay this signature into `visitor`.
    pub fn accept(&self, visitor: &mut dyn SignatureVisitor) {
        for formal in &self.formal_type_parameters {
            formal.accept(visitor);
        }
        for param in &self.parameters {
            visitor.visit_parameter_type();
            param.accept(visitor);
        }
        if let Some(ret) = &self.return_type {
            visitor.visit_return_type();
            ret.accept(visitor);
        }
        for exception in &self.exceptions {
            visitor.visit_exception_type();
            exception.accept(visitor);
        }
        if let Some(superclass) = &self.superclass {
            visitor.visit_superclass();
            superclass.accept(visitor);
        }
        for interface in &self.interfaces {
            visitor.visit_interface();
            interface.accept(visitor);
        }
    }

    /// The wire form of this signature.
    #[must_use]
    pub fn to_signature_string(&self) -> String {
        let mut writer = SignatureWriter::new();
        self.accept(&mut writer);
        writer.finish()
    }
}

impl FormalTypeParameter {
    /// Replay this formal type parameter into `visitor`.
    pub fn accept(&self, visitor: &mut dyn SignatureVisitor) {
        visitor.visit_formal_type_parameter(&self.name);
        if let Some(bound) = &self.class_bound {
            visitor.visit_class_bound();
            bound.accept(visitor);
        }
        for bound in &self.interface_bounds {
            visitor.visit_interface_bound();
            bound.accept(visitor);
        }
    }
}

impl TypeSymbol {
    /// Replay this type into `visitor`.
    pub fn accept(&self, visitor: &mut dyn SignatureVisitor) {
        for _ in 0..self.dims() {
            visitor.visit_array_type();
        }
        match self {
            TypeSymbol::Base { descriptor, .. } => visitor.visit_base_type(*descriptor),
            TypeSymbol::Variable { name, .. } => visitor.visit_type_variable(name),
            TypeSymbol::Class(class) => {
                for (i, segment) in class.segments.iter().enumerate() {
                    if i == 0 {
                        visitor.visit_class_type(&segment.name);
                    } else {
                        visitor.visit_inner_class_type(&segment.name);
                    }
                    for arg in &segment.args {
                        visitor.visit_type_argument(arg.wildcard());
                        if let Some(bound) = arg.bound() {
                            bound.accept(visitor);
                        }
                    }
                }
                visitor.visit_end();
            }
        }
    }

    /// The wire form of this type.
    #[must_use]
    pub fn to_signature_string(&self) -> String {
        let mut writer = SignatureWriter::new();
        self.accept(&mut writer);
        writer.finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::signature::{parse_signature, parse_type_signature};

    #[test]
    fn test_round_trip() {
        let inputs = [
            "<T:Ljava/lang/Object;>(TT;)Ljava/util/List<TT;>;",
            "<K:Ljava/lang/Object;V::Ljava/lang/Comparable<-TV;>;>(Ljava/util/Map<TK;+TV;>;[[TK;I)TV;^Ljava/io/IOException;^TE;",
            "()V",
            "<E:Ljava/lang/Enum<TE;>;>Ljava/lang/Object;Ljava/lang/Comparable<TE;>;Ljava/io/Serializable;",
            "La/Outer<TT;>.Inner<Ljava/lang/String;>.Deeper;",
            "(Lclassweave/api/Context<*>;[J)Z",
        ];
        for input in inputs {
            let sig = parse_signature(input).unwrap();
            let emitted = sig.to_signature_string();
            assert_eq!(emitted, input);
            assert_eq!(parse_signature(&emitted).unwrap(), sig);
        }
    }

    #[test]
    fn test_type_round_trip() {
        let input = "[Ljava/util/Map<Ljava/lang/String;+[I>.Entry<*>;";
        let ty = parse_type_signature(input).unwrap();
        assert_eq!(ty.to_signature_string(), input);
    }
}
