//! Worklist dataflow analysis over a method body.
//!
//! [`Analyzer`] computes, for every node of an [`crate::classfile::InsnList`], the abstract
//! [`Frame`] that holds before it executes. Frames flow along fall-through edges, jump and switch
//! targets, and into exception handlers. A `None` frame marks unreachable code.
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use classweave::analysis::{Analyzer, BasicInterpreter};
//!
//! let analysis = Analyzer::new(BasicInterpreter).analyze(&class.name, method)?;
//! let frame = analysis.frames[index].as_ref().expect("reachable");
//! assert!(frame.stack().is_empty());
//! ```

use std::collections::{HashMap, VecDeque};

use crate::{
    analysis::{frame::Frame, interpreter::Interpreter},
    classfile::{
        descriptor::Type,
        insn::{Insn, LabelId},
        nodes::{Code, MethodNode},
        opcodes::*,
    },
    Result,
};

/// Result of an analysis.
#[derive(Debug, Clone)]
pub struct Analysis<V> {
    /// Frame before each node, `None` where unreachable
    pub frames: Vec<Option<Frame<V>>>,
    /// Largest operand stack, in words
    pub max_stack: usize,
    /// Number of local slots the frames track
    pub max_locals: usize,
}

/// Forward dataflow analyzer parameterised by an [`Interpreter`].
pub struct Analyzer<I: Interpreter> {
    interpreter: I,
}

struct Worklist<V> {
    frames: Vec<Option<Frame<V>>>,
    worklist: VecDeque<usize>,
    in_worklist: Vec<bool>,
}

impl<V: crate::analysis::interpreter::AbstractValue> Worklist<V> {
    fn merge_into<I: Interpreter<Value = V>>(
        &mut self,
        index: usize,
        frame: Frame<V>,
        interp: &I,
    ) -> Result<()> {
        let Some(slot) = self.frames.get_mut(index) else {
            return Err(malformed_error!("Execution falls off the end of the code"));
        };

        let changed = match slot {
            Some(existing) => existing.merge(&frame, interp)?,
            None => {
                *slot = Some(frame);
                true
            }
        };

        if changed && !self.in_worklist[index] {
            self.in_worklist[index] = true;
            self.worklist.push_back(index);
        }
        Ok(())
    }
}

impl<I: Interpreter> Analyzer<I> {
    /// Create an analyzer.
    #[must_use]
    pub fn new(interpreter: I) -> Self {
        Analyzer { interpreter }
    }

    /// The interpreter used by this analyzer.
    #[must_use]
    pub fn interpreter(&self) -> &I {
        &self.interpreter
    }

    /// Analyze `method`, declared in class `owner`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the method has no decoded body or its code is
    /// inconsistent (stack underflow, mismatched heights, dangling labels), and
    /// [`crate::Error::NotSupported`] for subroutines.
    pub fn analyze(&self, owner: &str, method: &MethodNode) -> Result<Analysis<I::Value>> {
        let Some(code) = method.code() else {
            return Err(malformed_error!("Method {} has no code to analyze", method.name));
        };
        let interp = &self.interpreter;
        let insns = code.instructions.as_slice();
        let count = insns.len();
        if count == 0 {
            return Err(malformed_error!("Method {} has empty code", method.name));
        }

        let mut labels: HashMap<LabelId, usize> = HashMap::new();
        for (index, insn) in insns.iter().enumerate() {
            if let Insn::Label(label) = insn {
                labels.insert(*label, index);
            }
        }
        let resolve = |label: LabelId| {
            labels
                .get(&label)
                .copied()
                .ok_or_else(|| malformed_error!("Undefined label L{}", label.0))
        };

        let mut handlers: Vec<Vec<(usize, I::Value)>> = vec![Vec::new(); count];
        for block in &code.try_catch_blocks {
            let start = resolve(block.start)?;
            let end = resolve(block.end)?;
            let handler = resolve(block.handler)?;
            let exception = interp.new_value(&Type::object(
                block.catch_type.as_deref().unwrap_or("java/lang/Throwable"),
            ));
            for covered in handlers.iter_mut().take(end).skip(start) {
                covered.push((handler, exception.clone()));
            }
        }

        let max_locals = compute_max_locals(method, code)?;
        let mut state = Worklist {
            frames: vec![None; count],
            worklist: VecDeque::new(),
            in_worklist: vec![false; count],
        };
        state.merge_into(0, self.initial_frame(owner, method, max_locals)?, interp)?;

        let mut max_stack = 0;
        while let Some(index) = state.worklist.pop_front() {
            state.in_worklist[index] = false;
            let Some(before) = state.frames[index].clone() else {
                continue;
            };

            let insn = &insns[index];
            let mut after = before.clone();
            after.execute(insn, index, interp)?;
            max_stack = max_stack.max(before.stack_size()).max(after.stack_size());

            if !insn.is_pseudo() {
                for (handler, exception) in &handlers[index] {
                    for base in [&before, &after] {
                        let mut frame = base.clone();
                        frame.clear_stack();
                        frame.push(exception.clone());
                        state.merge_into(*handler, frame, interp)?;
                    }
                }
            }

            match insn {
                Insn::Jump { opcode, target } => {
                    state.merge_into(resolve(*target)?, after.clone(), interp)?;
                    if *opcode != GOTO {
                        state.merge_into(index + 1, after, interp)?;
                    }
                }
                Insn::TableSwitch { .. } | Insn::LookupSwitch { .. } => {
                    for target in insn.targets() {
                        state.merge_into(resolve(target)?, after.clone(), interp)?;
                    }
                }
                Insn::Simple(opcode) if is_return(*opcode) || *opcode == ATHROW => {}
                _ => state.merge_into(index + 1, after, interp)?,
            }
        }

        Ok(Analysis {
            frames: state.frames,
            max_stack,
            max_locals,
        })
    }

    fn initial_frame(
        &self,
        owner: &str,
        method: &MethodNode,
        max_locals: usize,
    ) -> Result<Frame<I::Value>> {
        let interp = &self.interpreter;
        let mut frame = Frame::new(max_locals, interp.new_empty());
        let mut slot = 0;
        if !method.access.is_static() {
            let this = if method.name == "<init>" && owner != "java/lang/Object" {
                interp.new_uninitialized_this(owner)
            } else {
                interp.new_value(&Type::object(owner))
            };
            frame.set_local(slot, this)?;
            slot += 1;
        }
        for param in method.method_type()?.params {
            frame.set_local(slot, interp.new_value(&param))?;
            slot += param.size() as usize;
        }
        Ok(frame)
    }
}

/// Number of local slots `code` needs: the parameters, every slot an instruction touches and
/// every slot in the local-variable table.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for an invalid method or local descriptor.
pub fn compute_max_locals(method: &MethodNode, code: &Code) -> Result<usize> {
    let receiver = usize::from(!method.access.is_static());
    let mut max = receiver + method.method_type()?.argument_slots() as usize;
    for insn in &code.instructions {
        let end = match insn {
            Insn::Var { opcode, var } => {
                let wide = matches!(*opcode, LLOAD | DLOAD | LSTORE | DSTORE);
                *var as usize + if wide { 2 } else { 1 }
            }
            Insn::Iinc { var, .. } => *var as usize + 1,
            _ => continue,
        };
        max = max.max(end);
    }
    for local in &code.local_variables {
        max = max.max(local.index as usize + Type::parse(&local.desc)?.size() as usize);
    }
    Ok(max)
}
