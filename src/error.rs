use thiserror::Error;

use crate::identification::IdentifierKind;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Variants are grouped by where in the weaving lifecycle they surface. Each group maps to one
/// [`ErrorCategory`], which hosts can use to decide how loudly to react: a
/// [`ErrorCategory::Infrastructure`] failure usually means a class locator is misconfigured,
/// while a [`ErrorCategory::Compatibility`] failure means a contract genuinely does not fit the
/// class it was woven into.
///
/// # Error Categories
///
/// ## Class File Errors
/// - [`Error::Malformed`] - Corrupted or invalid class file structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond the input
/// - [`Error::NotSupported`] - Construct the codec does not handle
/// - [`Error::RecursionLimit`] - Nesting too deep (signatures, annotations)
///
/// ## Registration Errors
/// - [`Error::InvalidContract`] - Contract shape violation
/// - [`Error::NotMapped`] - No mapper answered for an identifier id
/// - [`Error::WrongIdentifierKind`] - Instruction identifier of the wrong kind
/// - [`Error::AccessorAlreadyLoaded`] - Contract class loaded before initialization finished
///
/// ## Resolution Errors
/// - [`Error::NotFound`] / [`Error::MultipleMatches`] - Identifier matched 0 or several members
/// - [`Error::InstructionOutOfBounds`] - Instruction index outside the method body
/// - [`Error::LocalVariableNotFound`] - Imported local does not exist in the target
///
/// ## Compatibility Errors
/// - [`Error::IncompatibleType`], [`Error::SignatureMismatch`], [`Error::AccessorTaken`],
///   [`Error::FieldGeneratorTaken`], [`Error::ExceptionsMismatch`]
///
/// ## Verification Errors
/// - [`Error::InvalidExitTarget`] - Exit target with a non-empty operand stack
///
/// ## Resolver Infrastructure Errors
/// - [`Error::ResolutionFailed`] - Assignability could not be decided
/// - [`Error::Unresolved`] - No class of a hierarchy walk could be located
///
/// # Examples
///
/// ```rust
/// use classweave::{Error, ErrorCategory};
///
/// let err = Error::ResolutionFailed {
///     concrete: "a/B".to_string(),
///     declared: "a/C".to_string(),
/// };
/// assert_eq!(err.category(), ErrorCategory::Infrastructure);
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // Class file errors
    /// The class file is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected for debugging
    /// purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the input.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// The input uses a construct the codec does not handle.
    #[error("Not supported - {0}")]
    NotSupported(String),

    /// Recursion limit reached.
    ///
    /// Generic signatures and annotation values are recursive structures. To keep hostile input
    /// from exhausting the stack, parsing enforces a maximum depth.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// A declarative mapping document could not be read.
    #[error("Mapping document error - {0}")]
    Xml(String),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),

    // Registration errors
    /// A contract violates the shape rules of its declared roles.
    ///
    /// Raised while registering a contract, never during weaving. Only the offending
    /// registration is aborted.
    #[error("Invalid accessor contract {contract}: {message}")]
    InvalidContract {
        /// Internal name of the contract
        contract: String,
        /// What rule was violated
        message: String,
    },

    /// No registered mapper resolved the identifier id for the requested purpose.
    #[error("{kind} identifier {owner}[{id}] is not mapped")]
    NotMapped {
        /// Contract member that references the identifier
        owner: String,
        /// Kind of identifier that was requested
        kind: IdentifierKind,
        /// The symbolic identifier id
        id: String,
    },

    /// An instruction identifier resolved, but with the wrong kind.
    ///
    /// Entry and exit points require instruction-kind identifiers, imported locals require
    /// local-variable-kind identifiers.
    #[error("Instruction identifier {owner}[{id}] is not of kind {expected}")]
    WrongIdentifierKind {
        /// Contract member that references the identifier
        owner: String,
        /// The symbolic identifier id
        id: String,
        /// The kind that was required
        expected: IdentifierKind,
    },

    /// A contract class was loaded before or while the bootstrapper was initializing.
    ///
    /// Contracts must reach the host hook after initialization, otherwise their interceptor
    /// bodies are never instrumented.
    #[error("Accessor class {0} was already loaded before or during the bootstrapper initialization")]
    AccessorAlreadyLoaded(String),

    // Resolution errors
    /// An identifier matched no member of the target class.
    #[error("{kind} identifier {owner}[{id}] did not match anything in {target}")]
    NotFound {
        /// Contract member that references the identifier
        owner: String,
        /// Class or method that was searched
        target: String,
        /// Kind of element searched for
        kind: IdentifierKind,
        /// The symbolic identifier id
        id: String,
    },

    /// An identifier matched more than one member of the target class.
    #[error("{kind} identifier {owner}[{id}] matched multiple elements in {target}")]
    MultipleMatches {
        /// Contract member that references the identifier
        owner: String,
        /// Class that was searched
        target: String,
        /// Kind of element searched for
        kind: IdentifierKind,
        /// The symbolic identifier id
        id: String,
    },

    /// An instruction identifier produced an index outside the permitted range.
    #[error("Instruction index of {owner}[{id}] in {method} is out of bounds. Current: {index}, Expected: [{min}, {max}]")]
    InstructionOutOfBounds {
        /// Contract member that references the identifier
        owner: String,
        /// Target method, as `owner.name(desc)`
        method: String,
        /// The symbolic identifier id
        id: String,
        /// The resolved index
        index: usize,
        /// Lowest permitted index
        min: usize,
        /// Highest permitted index
        max: usize,
    },

    /// A local-variable identifier resolved to a slot with no local variable entry.
    #[error("Local variable for parameter {parameter} of {owner}[{id}] was not found")]
    LocalVariableNotFound {
        /// Interceptor that imports the local
        owner: String,
        /// Parameter index of the import
        parameter: usize,
        /// The symbolic identifier id
        id: String,
    },

    // Compatibility errors
    /// The concrete type of a member is not assignable to the contract's declared type.
    #[error("{owner} does not match. Current: {actual}, Expected: {expected}, or an accessor of that class")]
    IncompatibleType {
        /// Contract member that was checked
        owner: String,
        /// Type declared by the contract
        expected: String,
        /// Type found in the target
        actual: String,
    },

    /// The generic return signature of a target method does not fit the interceptor context.
    #[error("InterceptorContext signature of {owner} is not compatible.\nExpected: {expected},\nActual: {actual}")]
    SignatureMismatch {
        /// Interceptor that was checked
        owner: String,
        /// Resolved signature of the target method's return
        expected: String,
        /// Resolved signature of the context argument
        actual: String,
    },

    /// The target class already declares the method an accessor wants to synthesize.
    #[error("Method for accessor {0} is already taken")]
    AccessorTaken(String),

    /// A field generator's field exists with an incompatible type.
    #[error("Field {field} for field generator {owner} is already taken")]
    FieldGeneratorTaken {
        /// Generator member
        owner: String,
        /// Name of the conflicting field
        field: String,
    },

    /// A method accessor declares different checked exceptions than its target.
    #[error("Method accessor {owner} exceptions do not match. Current: {actual}, Expected: {expected}")]
    ExceptionsMismatch {
        /// Accessor member
        owner: String,
        /// Exceptions of the target method
        expected: String,
        /// Exceptions of the accessor
        actual: String,
    },

    // Verification errors
    /// An exit instruction was selected where the operand stack is not empty.
    #[error("Cannot insert exit target of {method}[{id}] at index {index}. Stack must be empty. Current stack: {stack}")]
    InvalidExitTarget {
        /// Target method, as `owner.name(desc)`
        method: String,
        /// The symbolic identifier id
        id: String,
        /// Index of the exit instruction
        index: usize,
        /// Rendering of the operand stack at the exit
        stack: String,
    },

    // Resolver infrastructure errors
    /// Assignability of two types could not be decided because the hierarchy was unresolvable.
    #[error("Class relation resolver failed for classes {concrete} and {declared}")]
    ResolutionFailed {
        /// The concrete type
        concrete: String,
        /// The declared type
        declared: String,
    },

    /// No class of a hierarchy walk could be located through any locator.
    #[error("Class hierarchy of {0} could not be resolved")]
    Unresolved(String),
}

/// Broad failure classes, mirroring the weaving lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum ErrorCategory {
    /// Contract or identifier registration failed.
    Registration,
    /// An identifier matched zero or several elements.
    Resolution,
    /// Contract and target disagree on a type or signature.
    Compatibility,
    /// Static verification of woven code failed.
    Verification,
    /// Class hierarchy lookups failed; usually a locator problem.
    Infrastructure,
    /// The input could not be decoded or encoded.
    Codec,
}

impl Error {
    /// Returns the [`ErrorCategory`] of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidContract { .. }
            | Error::NotMapped { .. }
            | Error::WrongIdentifierKind { .. }
            | Error::AccessorAlreadyLoaded(_) => ErrorCategory::Registration,
            Error::NotFound { .. }
            | Error::MultipleMatches { .. }
            | Error::InstructionOutOfBounds { .. }
            | Error::LocalVariableNotFound { .. } => ErrorCategory::Resolution,
            Error::IncompatibleType { .. }
            | Error::SignatureMismatch { .. }
            | Error::AccessorTaken(_)
            | Error::FieldGeneratorTaken { .. }
            | Error::ExceptionsMismatch { .. } => ErrorCategory::Compatibility,
            Error::InvalidExitTarget { .. } => ErrorCategory::Verification,
            Error::ResolutionFailed { .. } | Error::Unresolved(_) | Error::FileError(_) => {
                ErrorCategory::Infrastructure
            }
            Error::Malformed { .. }
            | Error::OutOfBounds
            | Error::NotSupported(_)
            | Error::RecursionLimit(_)
            | Error::Xml(_)
            | Error::Error(_) => ErrorCategory::Codec,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_separates_infrastructure_from_compatibility() {
        let infra = Error::Unresolved("a/B".into());
        let compat = Error::IncompatibleType {
            owner: "a/C.get()I".into(),
            expected: "int".into(),
            actual: "long".into(),
        };
        assert_eq!(infra.category(), ErrorCategory::Infrastructure);
        assert_eq!(compat.category(), ErrorCategory::Compatibility);
    }

    #[test]
    fn test_malformed_macro_records_location() {
        let err = malformed_error!("bad tag {}", 42);
        match err {
            Error::Malformed { message, file, .. } => {
                assert_eq!(message, "bad tag 42");
                assert!(file.ends_with("error.rs"));
            }
            _ => panic!("unexpected variant"),
        }
    }
}
