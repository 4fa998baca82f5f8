//! Generic signature model.
//!
//! Erased descriptors cannot tell a `List<Number>` from a `List<String>`, so the compatibility
//! checker works on the `Signature` attributes of classes and members instead. This module parses
//! those attributes into a traversable tree, writes trees back to the wire format, and resolves
//! type variables through enclosing scopes.
//!
//! # Key Components
//!
//! - [`Signature`] / [`TypeSymbol`] / [`TypeArg`] - The parsed model
//! - [`SignatureParser`] - Recursive-descent parser with a nesting limit
//! - [`SignatureVisitor`] / [`SignatureWriter`] - Event replay and wire-format emission
//! - [`SignatureTypesResolver`] - Binds free type variables to their declaring formals
//!
//! # Examples
//!
//! ```rust,no_run
//! use classweave::signature::parse_signature;
//!
//! let sig = parse_signature("<T:Ljava/lang/Number;>(Ljava/util/List<TT;>;)V")?;
//! assert_eq!(sig.to_string(), "<T extends java.lang.Number> void method(java.util.List<T>)");
//! assert_eq!(sig.to_signature_string(), "<T:Ljava/lang/Number;>(Ljava/util/List<TT;>;)V");
//! # Ok::<(), classweave::Error>(())
//! ```

mod parser;
mod resolver;
mod types;
mod writer;

pub use parser::SignatureParser;
pub use resolver::SignatureTypesResolver;
pub use types::*;
pub use writer::{SignatureVisitor, SignatureWriter};

use crate::Result;

/// Parse a class or method signature.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for invalid input and [`crate::Error::RecursionLimit`] for
/// excessive nesting.
pub fn parse_signature(input: &str) -> Result<Signature> {
    SignatureParser::new(input).parse_signature()
}

/// Parse a field or type signature.
///
/// # Errors
/// See [`parse_signature`].
pub fn parse_type_signature(input: &str) -> Result<TypeSymbol> {
    SignatureParser::new(input).parse_type_signature()
}
