//! Abstract execution frames.
//!
//! A [`Frame`] holds the abstract values of the local variables and of the operand stack before
//! an instruction executes. [`Frame::execute`] applies the stack effect of one instruction; the
//! [`Interpreter`] decides what the abstract values look like.
//!
//! Category-2 values (`long`, `double`) take one stack entry with a size of 2, and two local
//! slots where the second slot holds the interpreter's empty value.

use crate::{
    analysis::interpreter::{AbstractValue, Interpreter},
    classfile::{
        descriptor::{MethodType, Type},
        insn::{Insn, LdcValue},
        opcodes::*,
    },
    Error, Result,
};

/// The abstract state before an instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<V> {
    locals: Vec<V>,
    stack: Vec<V>,
}

impl<V: AbstractValue> Frame<V> {
    /// Create a frame with `locals` slots set to `empty` and an empty stack.
    #[must_use]
    pub fn new(locals: usize, empty: V) -> Self {
        Frame {
            locals: vec![empty; locals],
            stack: Vec::new(),
        }
    }

    /// The local-variable slots.
    #[must_use]
    pub fn locals(&self) -> &[V] {
        &self.locals
    }

    /// The operand stack, bottom first.
    #[must_use]
    pub fn stack(&self) -> &[V] {
        &self.stack
    }

    /// Number of stack words, counting category-2 values twice.
    #[must_use]
    pub fn stack_size(&self) -> usize {
        self.stack.iter().map(AbstractValue::size).sum()
    }

    /// Value of local `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the slot does not exist.
    pub fn get_local(&self, index: usize) -> Result<&V> {
        self.locals
            .get(index)
            .ok_or_else(|| malformed_error!("Local variable {} out of range", index))
    }

    /// Set local `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the slot does not exist.
    pub fn set_local(&mut self, index: usize, value: V) -> Result<()> {
        match self.locals.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(malformed_error!("Local variable {} out of range", index)),
        }
    }

    /// Push a value.
    pub fn push(&mut self, value: V) {
        self.stack.push(value);
    }

    /// Pop a value.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] on stack underflow.
    pub fn pop(&mut self) -> Result<V> {
        self.stack
            .pop()
            .ok_or_else(|| malformed_error!("Operand stack underflow"))
    }

    /// Remove all stack values.
    pub fn clear_stack(&mut self) {
        self.stack.clear();
    }

    /// Merge `other` into this frame.
    ///
    /// Returns `true` if this frame changed.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the stack heights differ.
    pub fn merge<I: Interpreter<Value = V>>(&mut self, other: &Frame<V>, interp: &I) -> Result<bool> {
        if self.stack.len() != other.stack.len() {
            return Err(malformed_error!(
                "Incompatible stack heights {} and {}",
                self.stack.len(),
                other.stack.len()
            ));
        }

        let mut changed = false;
        for (mine, theirs) in self
            .locals
            .iter_mut()
            .chain(self.stack.iter_mut())
            .zip(other.locals.iter().chain(other.stack.iter()))
        {
            let merged = interp.merge(mine, theirs);
            if merged != *mine {
                *mine = merged;
                changed = true;
            }
        }
        Ok(changed)
    }

    fn pop_category1(&mut self) -> Result<V> {
        let value = self.pop()?;
        if value.size() != 1 {
            return Err(malformed_error!("Expected a category 1 value, found {:?}", value));
        }
        Ok(value)
    }

    fn store(&mut self, index: usize, value: V, interp: &impl Interpreter<Value = V>) -> Result<()> {
        let size = value.size();
        if index > 0 {
            if let Some(previous) = self.locals.get(index - 1) {
                if previous.size() == 2 {
                    self.set_local(index - 1, interp.new_empty())?;
                }
            }
        }
        self.set_local(index, value)?;
        if size == 2 {
            self.set_local(index + 1, interp.new_empty())?;
        }
        Ok(())
    }

    /// Apply the stack effect of `insn`, which sits at `index` in its list.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for stack underflow or invalid slots, and
    /// [`crate::Error::NotSupported`] for `jsr`/`ret` subroutines.
    pub fn execute<I: Interpreter<Value = V>>(
        &mut self,
        insn: &Insn,
        index: usize,
        interp: &I,
    ) -> Result<()> {
        match insn {
            Insn::Label(_) | Insn::LineNumber { .. } => {}
            Insn::Simple(opcode) => self.execute_simple(*opcode, interp)?,
            Insn::Int { opcode, operand } => {
                if *opcode == NEWARRAY {
                    self.pop_category1()?;
                    let element = match *operand as u8 {
                        T_BOOLEAN => Type::Boolean,
                        T_CHAR => Type::Char,
                        T_FLOAT => Type::Float,
                        T_DOUBLE => Type::Double,
                        T_BYTE => Type::Byte,
                        T_SHORT => Type::Short,
                        T_INT => Type::Int,
                        T_LONG => Type::Long,
                        other => return Err(malformed_error!("Invalid newarray type - {}", other)),
                    };
                    self.push(interp.new_value(&Type::Array(Box::new(element))));
                } else {
                    self.push(interp.new_value(&Type::Int));
                }
            }
            Insn::Var { opcode, var } => {
                let var = *var as usize;
                match *opcode {
                    ILOAD..=ALOAD => {
                        let value = self.get_local(var)?.clone();
                        self.push(value);
                    }
                    ISTORE..=ASTORE => {
                        let value = self.pop()?;
                        self.store(var, value, interp)?;
                    }
                    _ => return Err(Error::NotSupported("jsr/ret subroutines".to_string())),
                }
            }
            Insn::Type { opcode, class } => match *opcode {
                NEW => self.push(interp.new_uninitialized(class, index)),
                ANEWARRAY => {
                    self.pop_category1()?;
                    let component = Type::from_internal_name(class)?;
                    self.push(interp.new_value(&Type::Array(Box::new(component))));
                }
                CHECKCAST => {
                    self.pop_category1()?;
                    self.push(interp.new_value(&Type::from_internal_name(class)?));
                }
                _ => {
                    self.pop_category1()?;
                    self.push(interp.new_value(&Type::Int));
                }
            },
            Insn::Field {
                opcode, desc, ..
            } => {
                let ty = Type::parse(desc)?;
                match *opcode {
                    GETSTATIC => self.push(interp.new_value(&ty)),
                    PUTSTATIC => {
                        self.pop()?;
                    }
                    GETFIELD => {
                        self.pop_category1()?;
                        self.push(interp.new_value(&ty));
                    }
                    _ => {
                        self.pop()?;
                        self.pop_category1()?;
                    }
                }
            }
            Insn::Method {
                opcode,
                name,
                desc,
                ..
            } => {
                let method = MethodType::parse(desc)?;
                for _ in 0..method.params.len() {
                    self.pop()?;
                }
                if *opcode != INVOKESTATIC {
                    let receiver = self.pop_category1()?;
                    if *opcode == INVOKESPECIAL && name == "<init>" {
                        if let Some(initialized) = interp.initialized(&receiver) {
                            for value in self.locals.iter_mut().chain(self.stack.iter_mut()) {
                                if *value == receiver {
                                    *value = initialized.clone();
                                }
                            }
                        }
                    }
                }
                if method.ret != Type::Void {
                    self.push(interp.new_value(&method.ret));
                }
            }
            Insn::InvokeDynamic { desc, .. } => {
                let method = MethodType::parse(desc)?;
                for _ in 0..method.params.len() {
                    self.pop()?;
                }
                if method.ret != Type::Void {
                    self.push(interp.new_value(&method.ret));
                }
            }
            Insn::Jump { opcode, .. } => match *opcode {
                IFEQ..=IFLE | IFNULL | IFNONNULL => {
                    self.pop_category1()?;
                }
                IF_ICMPEQ..=IF_ACMPNE => {
                    self.pop_category1()?;
                    self.pop_category1()?;
                }
                GOTO => {}
                _ => return Err(Error::NotSupported("jsr/ret subroutines".to_string())),
            },
            Insn::Ldc(value) => {
                let ty = match value {
                    LdcValue::Int(_) => Type::Int,
                    LdcValue::Float(_) => Type::Float,
                    LdcValue::Long(_) => Type::Long,
                    LdcValue::Double(_) => Type::Double,
                    LdcValue::String(_) => Type::object("java/lang/String"),
                    LdcValue::Class(_) => Type::object("java/lang/Class"),
                    LdcValue::MethodType(_) => Type::object("java/lang/invoke/MethodType"),
                    LdcValue::MethodHandle(_) => Type::object("java/lang/invoke/MethodHandle"),
                    LdcValue::Dynamic { descriptor, .. } => Type::parse(descriptor)?,
                };
                self.push(interp.new_value(&ty));
            }
            Insn::Iinc { var, .. } => {
                self.set_local(*var as usize, interp.new_value(&Type::Int))?;
            }
            Insn::TableSwitch { .. } | Insn::LookupSwitch { .. } => {
                self.pop_category1()?;
            }
            Insn::MultiANewArray { desc, dims } => {
                for _ in 0..*dims {
                    self.pop_category1()?;
                }
                self.push(interp.new_value(&Type::parse(desc)?));
            }
        }
        Ok(())
    }

    fn execute_simple<I: Interpreter<Value = V>>(&mut self, opcode: u8, interp: &I) -> Result<()> {
        match opcode {
            NOP | RETURN => {}
            ACONST_NULL => self.push(interp.new_null()),
            ICONST_M1..=ICONST_5 => self.push(interp.new_value(&Type::Int)),
            LCONST_0 | LCONST_1 => self.push(interp.new_value(&Type::Long)),
            FCONST_0..=FCONST_2 => self.push(interp.new_value(&Type::Float)),
            DCONST_0 | DCONST_1 => self.push(interp.new_value(&Type::Double)),
            IALOAD..=SALOAD => {
                self.pop_category1()?;
                let array = self.pop_category1()?;
                let value = match opcode {
                    LALOAD => interp.new_value(&Type::Long),
                    FALOAD => interp.new_value(&Type::Float),
                    DALOAD => interp.new_value(&Type::Double),
                    AALOAD => interp.array_element(&array)?,
                    _ => interp.new_value(&Type::Int),
                };
                self.push(value);
            }
            IASTORE..=SASTORE => {
                self.pop()?;
                self.pop_category1()?;
                self.pop_category1()?;
            }
            POP => {
                self.pop_category1()?;
            }
            POP2 => {
                if self.pop()?.size() == 1 {
                    self.pop_category1()?;
                }
            }
            DUP => {
                let v1 = self.pop_category1()?;
                self.push(v1.clone());
                self.push(v1);
            }
            DUP_X1 => {
                let v1 = self.pop_category1()?;
                let v2 = self.pop_category1()?;
                self.push(v1.clone());
                self.push(v2);
                self.push(v1);
            }
            DUP_X2 => {
                let v1 = self.pop_category1()?;
                let v2 = self.pop()?;
                if v2.size() == 1 {
                    let v3 = self.pop_category1()?;
                    self.push(v1.clone());
                    self.push(v3);
                    self.push(v2);
                    self.push(v1);
                } else {
                    self.push(v1.clone());
                    self.push(v2);
                    self.push(v1);
                }
            }
            DUP2 => {
                let v1 = self.pop()?;
                if v1.size() == 1 {
                    let v2 = self.pop_category1()?;
                    self.push(v2.clone());
                    self.push(v1.clone());
                    self.push(v2);
                    self.push(v1);
                } else {
                    self.push(v1.clone());
                    self.push(v1);
                }
            }
            DUP2_X1 => {
                let v1 = self.pop()?;
                if v1.size() == 1 {
                    let v2 = self.pop_category1()?;
                    let v3 = self.pop_category1()?;
                    self.push(v2.clone());
                    self.push(v1.clone());
                    self.push(v3);
                    self.push(v2);
                    self.push(v1);
                } else {
                    let v2 = self.pop_category1()?;
                    self.push(v1.clone());
                    self.push(v2);
                    self.push(v1);
                }
            }
            DUP2_X2 => {
                let v1 = self.pop()?;
                if v1.size() == 1 {
                    let v2 = self.pop_category1()?;
                    let v3 = self.pop()?;
                    if v3.size() == 1 {
                        let v4 = self.pop_category1()?;
                        self.push(v2.clone());
                        self.push(v1.clone());
                        self.push(v4);
                    } else {
                        self.push(v2.clone());
                        self.push(v1.clone());
                    }
                    self.push(v3);
                    self.push(v2);
                    self.push(v1);
                } else {
                    let v2 = self.pop()?;
                    if v2.size() == 1 {
                        let v3 = self.pop_category1()?;
                        self.push(v1.clone());
                        self.push(v3);
                    } else {
                        self.push(v1.clone());
                    }
                    self.push(v2);
                    self.push(v1);
                }
            }
            SWAP => {
                let v1 = self.pop_category1()?;
                let v2 = self.pop_category1()?;
                self.push(v1);
                self.push(v2);
            }
            IADD..=DREM | ISHL..=LXOR => {
                self.pop()?;
                self.pop()?;
                self.push(interp.new_value(&arithmetic_result(opcode)));
            }
            INEG..=DNEG => {
                let value = self.pop()?;
                self.push(value);
            }
            I2L..=I2S => {
                self.pop()?;
                let ty = match opcode {
                    I2L | F2L | D2L => Type::Long,
                    I2F | L2F | D2F => Type::Float,
                    I2D | L2D | F2D => Type::Double,
                    _ => Type::Int,
                };
                self.push(interp.new_value(&ty));
            }
            LCMP..=DCMPG => {
                self.pop()?;
                self.pop()?;
                self.push(interp.new_value(&Type::Int));
            }
            IRETURN..=ARETURN | ATHROW | MONITORENTER | MONITOREXIT => {
                self.pop()?;
            }
            ARRAYLENGTH => {
                self.pop_category1()?;
                self.push(interp.new_value(&Type::Int));
            }
            _ => {
                return Err(malformed_error!(
                    "Unexpected operand-less opcode - {}",
                    mnemonic(opcode)
                ))
            }
        }
        Ok(())
    }
}

/// Result type of an arithmetic, shift or bitwise instruction.
///
/// Arithmetic opcodes cycle through int, long, float and double; shifts and bitwise operations
/// alternate between int and long.
fn arithmetic_result(opcode: u8) -> Type {
    match opcode {
        IADD..=DREM => match (opcode - IADD) % 4 {
            0 => Type::Int,
            1 => Type::Long,
            2 => Type::Float,
            _ => Type::Double,
        },
        _ if (opcode - ISHL) % 2 == 0 => Type::Int,
        _ => Type::Long,
    }
}
