//! Dataflow analysis of method bodies.
//!
//! The weaver needs two facts about code it rewrites: the operand stack at every instruction it
//! might branch to (exit targets must have an empty stack), and the verification types at every
//! branch target of a rewritten body (for the `StackMapTable`). Both come from the same worklist
//! analyzer run with different value domains.
//!
//! # Key Components
//!
//! - [`Analyzer`] - Forward worklist analysis producing a [`Frame`] per instruction
//! - [`Interpreter`] - Value domain plugged into the analyzer
//! - [`BasicInterpreter`] - Category-only values, for stack heights
//! - [`VerifierInterpreter`] - Verification types, for stack map frames
//! - [`TypeHierarchy`] - Common-superclass oracle used when reference types merge
//! - [`stackmap`] - `StackMapTable` encoding

mod analyzer;
mod frame;
mod interpreter;
pub mod stackmap;

pub use analyzer::{compute_max_locals, Analysis, Analyzer};
pub use frame::Frame;
pub use interpreter::{
    AbstractValue, BasicInterpreter, BasicValue, Interpreter, VerificationType,
    VerifierInterpreter,
};

/// Answers class-hierarchy questions during frame computation.
pub trait TypeHierarchy: Send + Sync {
    /// Internal name of the most specific common superclass of `a` and `b`.
    ///
    /// Interfaces merge to `java/lang/Object`.
    fn common_super_class(&self, a: &str, b: &str) -> String;
}

/// A hierarchy that knows nothing: distinct classes merge to `java/lang/Object`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectHierarchy;

impl TypeHierarchy for ObjectHierarchy {
    fn common_super_class(&self, a: &str, b: &str) -> String {
        if a == b {
            a.to_string()
        } else {
            "java/lang/Object".to_string()
        }
    }
}
