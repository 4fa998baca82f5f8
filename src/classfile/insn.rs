//! The instruction tree of a method body.
//!
//! Method bodies are decoded into an [`InsnList`]: a flat, editable sequence of [`Insn`] nodes in
//! which branch targets are symbolic [`LabelId`]s rather than byte offsets. Labels and line
//! numbers are themselves entries of the list, so inserting code never invalidates a branch.
//!
//! Instruction identifiers select positions by index into this list.

use std::fmt;

use crate::classfile::opcodes::{self, mnemonic};

/// A symbolic position in an instruction list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelId(pub u32);

/// A loadable constant.
#[derive(Debug, Clone, PartialEq)]
pub enum LdcValue {
    /// An `int` constant
    Int(i32),
    /// A `float` constant, raw bits
    Float(u32),
    /// A `long` constant
    Long(i64),
    /// A `double` constant, raw bits
    Double(u64),
    /// A `java.lang.String` constant
    String(String),
    /// A class literal, by internal name or array descriptor
    Class(String),
    /// A `java.lang.invoke.MethodType`, by constant-pool index
    MethodType(u16),
    /// A `java.lang.invoke.MethodHandle`, by constant-pool index
    MethodHandle(u16),
    /// A dynamically-computed constant, by constant-pool index, with its field descriptor
    Dynamic {
        /// Constant-pool index of the `CONSTANT_Dynamic` entry
        index: u16,
        /// Descriptor of the computed value
        descriptor: String,
    },
}

/// A single node of an [`InsnList`].
#[derive(Debug, Clone, PartialEq)]
pub enum Insn {
    /// A branch target or range boundary
    Label(LabelId),
    /// A source line starting at `start`
    LineNumber {
        /// Source line number
        line: u16,
        /// First instruction of the line
        start: LabelId,
    },
    /// An instruction without operands
    Simple(u8),
    /// `bipush`, `sipush` or `newarray`
    Int {
        /// The opcode
        opcode: u8,
        /// Immediate operand
        operand: i32,
    },
    /// A local-variable load, store or `ret`
    Var {
        /// The canonical long-form opcode
        opcode: u8,
        /// Local-variable slot
        var: u16,
    },
    /// `new`, `anewarray`, `checkcast` or `instanceof`
    Type {
        /// The opcode
        opcode: u8,
        /// Internal name or array descriptor
        class: String,
    },
    /// A field access
    Field {
        /// The opcode
        opcode: u8,
        /// Owner internal name
        owner: String,
        /// Field name
        name: String,
        /// Field descriptor
        desc: String,
    },
    /// A method invocation, except `invokedynamic`
    Method {
        /// The opcode
        opcode: u8,
        /// Owner internal name
        owner: String,
        /// Method name
        name: String,
        /// Method descriptor
        desc: String,
        /// Whether the owner is an interface
        interface: bool,
    },
    /// `invokedynamic`
    InvokeDynamic {
        /// Constant-pool index of the `CONSTANT_InvokeDynamic` entry
        index: u16,
        /// Call-site name
        name: String,
        /// Call-site descriptor
        desc: String,
    },
    /// A conditional or unconditional jump
    Jump {
        /// The opcode, `goto_w` and `jsr_w` are normalised to their short forms
        opcode: u8,
        /// Jump target
        target: LabelId,
    },
    /// `ldc`, `ldc_w` or `ldc2_w`
    Ldc(LdcValue),
    /// `iinc`
    Iinc {
        /// Local-variable slot
        var: u16,
        /// Signed increment
        incr: i16,
    },
    /// `tableswitch`
    TableSwitch {
        /// Lowest key
        min: i32,
        /// Highest key
        max: i32,
        /// Default target
        default: LabelId,
        /// Targets for `min..=max`
        targets: Vec<LabelId>,
    },
    /// `lookupswitch`
    LookupSwitch {
        /// Default target
        default: LabelId,
        /// Key and target pairs
        pairs: Vec<(i32, LabelId)>,
    },
    /// `multianewarray`
    MultiANewArray {
        /// Array descriptor
        desc: String,
        /// Number of dimensions to allocate
        dims: u8,
    },
}

impl Insn {
    /// The opcode of a real instruction, `None` for labels and line numbers.
    #[must_use]
    pub fn opcode(&self) -> Option<u8> {
        match self {
            Insn::Label(_) | Insn::LineNumber { .. } => None,
            Insn::Simple(opcode)
            | Insn::Int { opcode, .. }
            | Insn::Var { opcode, .. }
            | Insn::Type { opcode, .. }
            | Insn::Field { opcode, .. }
            | Insn::Method { opcode, .. }
            | Insn::Jump { opcode, .. } => Some(*opcode),
            Insn::InvokeDynamic { .. } => Some(opcodes::INVOKEDYNAMIC),
            Insn::Ldc(_) => Some(opcodes::LDC),
            Insn::Iinc { .. } => Some(opcodes::IINC),
            Insn::TableSwitch { .. } => Some(opcodes::TABLESWITCH),
            Insn::LookupSwitch { .. } => Some(opcodes::LOOKUPSWITCH),
            Insn::MultiANewArray { .. } => Some(opcodes::MULTIANEWARRAY),
        }
    }

    /// A local-variable load or store.
    #[must_use]
    pub fn var(opcode: u8, var: u16) -> Insn {
        Insn::Var { opcode, var }
    }

    /// A type instruction.
    #[must_use]
    pub fn type_insn(opcode: u8, class: &str) -> Insn {
        Insn::Type {
            opcode,
            class: class.to_string(),
        }
    }

    /// A field access.
    #[must_use]
    pub fn field(opcode: u8, owner: &str, name: &str, desc: &str) -> Insn {
        Insn::Field {
            opcode,
            owner: owner.to_string(),
            name: name.to_string(),
            desc: desc.to_string(),
        }
    }

    /// A method invocation. `interface` is derived from the opcode for `invokeinterface`.
    #[must_use]
    pub fn method(opcode: u8, owner: &str, name: &str, desc: &str, interface: bool) -> Insn {
        Insn::Method {
            opcode,
            owner: owner.to_string(),
            name: name.to_string(),
            desc: desc.to_string(),
            interface: interface || opcode == opcodes::INVOKEINTERFACE,
        }
    }

    /// The shortest instruction pushing the `int` constant `value`.
    #[must_use]
    pub fn push_int(value: i32) -> Insn {
        match value {
            -1..=5 => Insn::Simple((i32::from(opcodes::ICONST_0) + value) as u8),
            -128..=127 => Insn::Int {
                opcode: opcodes::BIPUSH,
                operand: value,
            },
            -32768..=32767 => Insn::Int {
                opcode: opcodes::SIPUSH,
                operand: value,
            },
            _ => Insn::Ldc(LdcValue::Int(value)),
        }
    }

    /// Returns `true` for labels and line numbers, which emit no bytecode.
    #[must_use]
    pub fn is_pseudo(&self) -> bool {
        self.opcode().is_none()
    }

    /// Branch targets of a jump or switch.
    #[must_use]
    pub fn targets(&self) -> Vec<LabelId> {
        match self {
            Insn::Jump { target, .. } => vec![*target],
            Insn::TableSwitch {
                default, targets, ..
            } => std::iter::once(*default)
                .chain(targets.iter().copied())
                .collect(),
            Insn::LookupSwitch { default, pairs } => std::iter::once(*default)
                .chain(pairs.iter().map(|(_, label)| *label))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Insn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Insn::Label(label) => write!(f, "L{}:", label.0),
            Insn::LineNumber { line, start } => write!(f, "LINE {line} L{}", start.0),
            Insn::Simple(opcode) => write!(f, "{}", mnemonic(*opcode)),
            Insn::Int { opcode, operand } => write!(f, "{} {operand}", mnemonic(*opcode)),
            Insn::Var { opcode, var } => write!(f, "{} {var}", mnemonic(*opcode)),
            Insn::Type { opcode, class } => write!(f, "{} {class}", mnemonic(*opcode)),
            Insn::Field {
                opcode,
                owner,
                name,
                desc,
            } => write!(f, "{} {owner}.{name} : {desc}", mnemonic(*opcode)),
            Insn::Method {
                opcode,
                owner,
                name,
                desc,
                ..
            } => write!(f, "{} {owner}.{name}{desc}", mnemonic(*opcode)),
            Insn::InvokeDynamic { name, desc, .. } => write!(f, "invokedynamic {name}{desc}"),
            Insn::Jump { opcode, target } => write!(f, "{} L{}", mnemonic(*opcode), target.0),
            Insn::Ldc(value) => write!(f, "ldc {value:?}"),
            Insn::Iinc { var, incr } => write!(f, "iinc {var} {incr}"),
            Insn::TableSwitch { min, max, .. } => write!(f, "tableswitch {min}..{max}"),
            Insn::LookupSwitch { pairs, .. } => write!(f, "lookupswitch [{}]", pairs.len()),
            Insn::MultiANewArray { desc, dims } => write!(f, "multianewarray {desc} {dims}"),
        }
    }
}

/// An editable instruction sequence with its own label allocator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsnList {
    insns: Vec<Insn>,
    next_label: u32,
}

impl InsnList {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        InsnList::default()
    }

    /// Allocate a fresh label, unique within this list.
    pub fn new_label(&mut self) -> LabelId {
        let label = LabelId(self.next_label);
        self.next_label += 1;
        label
    }

    /// Number of nodes, including labels and line numbers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.insns.len()
    }

    /// Returns `true` if the list holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.insns.is_empty()
    }

    /// Node at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Insn> {
        self.insns.get(index)
    }

    /// Iterate over the nodes.
    pub fn iter(&self) -> std::slice::Iter<'_, Insn> {
        self.insns.iter()
    }

    /// All nodes as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Insn] {
        &self.insns
    }

    /// Append a node.
    pub fn push(&mut self, insn: Insn) {
        if let Insn::Label(label) = &insn {
            self.reserve_label(*label);
        }
        self.insns.push(insn);
    }

    /// Index of the node defining `label`.
    #[must_use]
    pub fn label_index(&self, label: LabelId) -> Option<usize> {
        self.insns
            .iter()
            .position(|insn| matches!(insn, Insn::Label(l) if *l == label))
    }

    /// Insert groups of nodes before the given indices.
    ///
    /// All indices refer to positions in the list before any insertion. Groups that share an
    /// index keep their relative order.
    pub fn insert_all(&mut self, mut groups: Vec<(usize, Vec<Insn>)>) {
        for (_, group) in &groups {
            for insn in group {
                if let Insn::Label(label) = insn {
                    self.reserve_label(*label);
                }
            }
        }

        let mut order: Vec<usize> = (0..groups.len()).collect();
        order.sort_by(|a, b| groups[*b].0.cmp(&groups[*a].0).then(b.cmp(a)));
        for slot in order {
            let (index, group) = std::mem::take(&mut groups[slot]);
            let index = index.min(self.insns.len());
            self.insns.splice(index..index, group);
        }
    }

    fn reserve_label(&mut self, label: LabelId) {
        if label.0 >= self.next_label {
            self.next_label = label.0 + 1;
        }
    }
}

impl<'a> IntoIterator for &'a InsnList {
    type Item = &'a Insn;
    type IntoIter = std::slice::Iter<'a, Insn>;

    fn into_iter(self) -> Self::IntoIter {
        self.insns.iter()
    }
}

impl FromIterator<Insn> for InsnList {
    fn from_iter<T: IntoIterator<Item = Insn>>(iter: T) -> Self {
        let mut list = InsnList::new();
        for insn in iter {
            list.push(insn);
        }
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::opcodes::*;

    #[test]
    fn test_insert_all_uses_original_indices() {
        let mut list: InsnList = vec![
            Insn::Simple(ICONST_0),
            Insn::Simple(ICONST_1),
            Insn::Simple(IRETURN),
        ]
        .into_iter()
        .collect();

        list.insert_all(vec![
            (1, vec![Insn::Simple(NOP)]),
            (2, vec![Insn::Simple(POP)]),
            (1, vec![Insn::Simple(DUP)]),
        ]);

        let opcodes: Vec<u8> = list.iter().filter_map(Insn::opcode).collect();
        assert_eq!(
            opcodes,
            vec![ICONST_0, NOP, DUP, ICONST_1, POP, IRETURN]
        );
    }

    #[test]
    fn test_labels_stay_unique() {
        let mut list = InsnList::new();
        list.push(Insn::Label(LabelId(7)));
        let fresh = list.new_label();
        assert_eq!(fresh, LabelId(8));
        assert_eq!(list.label_index(LabelId(7)), Some(0));
        assert!(list.get(0).is_some_and(Insn::is_pseudo));
    }

    #[test]
    fn test_push_int_picks_shortest_form() {
        assert_eq!(Insn::push_int(-1), Insn::Simple(ICONST_M1));
        assert_eq!(Insn::push_int(5), Insn::Simple(ICONST_5));
        assert_eq!(Insn::push_int(6).opcode(), Some(BIPUSH));
        assert_eq!(Insn::push_int(-129).opcode(), Some(SIPUSH));
        assert_eq!(Insn::push_int(40_000), Insn::Ldc(LdcValue::Int(40_000)));
    }

    #[test]
    fn test_switch_targets() {
        let insn = Insn::TableSwitch {
            min: 0,
            max: 1,
            default: LabelId(0),
            targets: vec![LabelId(1), LabelId(2)],
        };
        assert_eq!(insn.targets(), vec![LabelId(0), LabelId(1), LabelId(2)]);
        assert_eq!(insn.opcode(), Some(TABLESWITCH));
    }
}
