//! Names and descriptors of the versioned runtime ABI.
//!
//! Woven code calls into a small runtime: the interceptor context, its concrete implementation
//! and the invalid-exit error. Contracts are tagged with annotations from the same package. All
//! of them live under [`PACKAGE`], which carries the ABI version, so a host can load two
//! generations of woven code side by side.

/// ABI version encoded in [`PACKAGE`].
pub const VERSION: u32 = 1;

/// Package of every runtime type.
pub const PACKAGE: &str = "classweave/runtime/v1";

/// A method of a runtime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member {
    /// Method name
    pub name: &'static str,
    /// Method descriptor
    pub desc: &'static str,
}

/// The interceptor context interface, generic in the intercepted method's return type.
pub mod context {
    use super::Member;

    /// Internal name
    pub const NAME: &str = "classweave/runtime/v1/InterceptorContext";
    /// Field descriptor
    pub const DESCRIPTOR: &str = "Lclassweave/runtime/v1/InterceptorContext;";
    /// Generic class signature
    pub const SIGNATURE: &str = "<T:Ljava/lang/Object;>Ljava/lang/Object;";

    /// Request an exit through the exit identifier at the given index
    pub const EXIT_AT: Member = Member { name: "exitAt", desc: "(I)V" };
    /// Withdraw an exit request
    pub const CANCEL_EXIT: Member = Member { name: "cancelExit", desc: "()V" };
    /// Index of the requested exit
    pub const GET_EXIT: Member = Member { name: "getExit", desc: "()I" };
    /// Whether an exit was requested
    pub const IS_EXITING: Member = Member { name: "isExiting", desc: "()Z" };
    /// Request an early return with a value
    pub const RETURN_WITH: Member = Member { name: "returnWith", desc: "(Ljava/lang/Object;)V" };
    /// Withdraw a return request
    pub const CANCEL_RETURN: Member = Member { name: "cancelReturn", desc: "()V" };
    /// The value to return
    pub const GET_RETURN: Member = Member { name: "getReturn", desc: "()Ljava/lang/Object;" };
    /// Whether a return was requested
    pub const IS_RETURNING: Member = Member { name: "isReturning", desc: "()Z" };
    /// Imported locals as written back by the interceptor
    pub const GET_LOCAL_VARIABLES: Member = Member {
        name: "getLocalVariables",
        desc: "()[Ljava/lang/Object;",
    };
}

/// The concrete context class woven code instantiates.
pub mod context_impl {
    use super::Member;

    /// Internal name
    pub const NAME: &str = "classweave/runtime/v1/InterceptorContextImpl";
    /// Constructor taking the number of imported locals
    pub const INIT: Member = Member { name: "<init>", desc: "(I)V" };
}

/// The error thrown when an interceptor requests an undeclared exit.
pub mod invalid_exit {
    use super::Member;

    /// Internal name
    pub const NAME: &str = "classweave/runtime/v1/InvalidExitException";
    /// Constructor taking the requested exit index
    pub const INIT: Member = Member { name: "<init>", desc: "(I)V" };
}

/// Contract annotations, as field descriptors, with their element names.
pub mod annotations {
    /// Marks a contract interface; element [`CLASS_IDENTIFIER`]
    pub const CLASS_ACCESSOR: &str = "Lclassweave/runtime/v1/ClassAccessor;";
    /// Class identifier id
    pub const CLASS_IDENTIFIER: &str = "classIdentifier";

    /// Marks a field accessor; element [`FIELD_IDENTIFIER`]
    pub const FIELD_ACCESSOR: &str = "Lclassweave/runtime/v1/FieldAccessor;";
    /// Field identifier id
    pub const FIELD_IDENTIFIER: &str = "fieldIdentifier";

    /// Marks a field generator; element [`FIELD_NAME_IDENTIFIER`]
    pub const FIELD_GENERATOR: &str = "Lclassweave/runtime/v1/FieldGenerator;";
    /// Field name identifier id
    pub const FIELD_NAME_IDENTIFIER: &str = "fieldNameIdentifier";

    /// Marks a method accessor; element [`METHOD_IDENTIFIER`]
    pub const METHOD_ACCESSOR: &str = "Lclassweave/runtime/v1/MethodAccessor;";
    /// Method identifier id, shared by accessors and interceptors
    pub const METHOD_IDENTIFIER: &str = "methodIdentifier";

    /// Marks an interceptor; elements [`METHOD_IDENTIFIER`], [`INSTRUCTION_IDENTIFIER`] and
    /// [`EXIT_INSTRUCTION_IDENTIFIERS`]
    pub const INTERCEPTOR: &str = "Lclassweave/runtime/v1/Interceptor;";
    /// Instruction identifier id, shared by interceptors and local imports
    pub const INSTRUCTION_IDENTIFIER: &str = "instructionIdentifier";
    /// Exit identifier ids
    pub const EXIT_INSTRUCTION_IDENTIFIERS: &str = "exitInstructionIdentifiers";

    /// Marks an interceptor parameter as an imported local; element [`INSTRUCTION_IDENTIFIER`]
    pub const LOCAL_VAR: &str = "Lclassweave/runtime/v1/LocalVar;";

    /// Disables signature checks; elements [`UNCHECKED_IN`] and [`UNCHECKED_OUT`]
    pub const UNCHECKED_SIGNATURE: &str = "Lclassweave/runtime/v1/UncheckedSignature;";
    /// Skip checks of inputs
    pub const UNCHECKED_IN: &str = "in";
    /// Skip checks of outputs, including the interceptor return signature
    pub const UNCHECKED_OUT: &str = "out";
}
