use std::{fmt, sync::Arc};

use crate::{classfile::MethodNode, identification::IdentifierKind};

/// What an [`InstructionIdentifier`] locates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    /// An index into the method's instruction list
    Instruction,
    /// A local-variable slot
    LocalVariable,
}

impl From<InstructionKind> for IdentifierKind {
    fn from(kind: InstructionKind) -> Self {
        match kind {
            InstructionKind::Instruction => IdentifierKind::Instruction,
            InstructionKind::LocalVariable => IdentifierKind::LocalVariable,
        }
    }
}

type Strategy = Arc<dyn Fn(&MethodNode) -> Option<usize> + Send + Sync>;

/// Locates an instruction index or a local-variable slot inside a method body.
///
/// Instruction indices count every node of the [`crate::classfile::InsnList`], labels and line
/// numbers included.
#[derive(Clone)]
pub struct InstructionIdentifier {
    kind: InstructionKind,
    description: String,
    strategy: Strategy,
}

impl InstructionIdentifier {
    /// Create an identifier of `kind` backed by `strategy`.
    ///
    /// `description` names the strategy in diagnostics.
    pub fn new(
        kind: InstructionKind,
        description: impl Into<String>,
        strategy: impl Fn(&MethodNode) -> Option<usize> + Send + Sync + 'static,
    ) -> Self {
        InstructionIdentifier {
            kind,
            description: description.into(),
            strategy: Arc::new(strategy),
        }
    }

    /// What this identifier locates.
    #[must_use]
    pub fn kind(&self) -> InstructionKind {
        self.kind
    }

    /// Run the strategy against `method`.
    #[must_use]
    pub fn identify(&self, method: &MethodNode) -> Option<usize> {
        (self.strategy)(method)
    }
}

impl fmt::Debug for InstructionIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstructionIdentifier")
            .field("kind", &self.kind)
            .field("description", &self.description)
            .finish()
    }
}

impl fmt::Display for InstructionIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}
