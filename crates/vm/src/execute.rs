//! Instruction dispatch.
//!
//! Each call to [`ScriptInstance::step`] executes exactly one instruction
//! of the active handler and reports how control continues.

use std::time::Duration;

use lso_common::library;
use lso_common::{Instruction, Opcode, Operand, Rotation, SectionId, TypeTag, Value, Vector};
use lso_verifier::references::slot_class;
use tracing::debug;

use crate::builtins::{BuiltinContext, BuiltinOutcome, BuiltinTable, Ticket};
use crate::error::Fault;
use crate::machine::{check_tag, CallFrame, Ip, ScriptInstance};
use crate::operators;
use crate::slot::Slot;

/// How control continues after one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    /// The handler's outermost RETURN.
    Return,
    ChangeState(u32),
    /// An asynchronous built-in ended the handler.
    Async(Ticket),
    /// Resume the same handler after the duration.
    Sleep(Duration),
}

impl ScriptInstance {
    /// Execute one instruction.
    pub(crate) fn step(&mut self, builtins: &mut BuiltinTable, now: Duration) -> Result<Flow, Fault> {
        let ip = self.ip.ok_or(Fault::UnexpectedEndOfCode)?;
        self.current = Some(ip);
        let image = self.image.clone();
        let code = image.code(ip.section).ok_or(match ip.section {
            SectionId::Function(index) => Fault::BadReference { what: "function", index },
            SectionId::State(index) => Fault::BadReference { what: "state", index },
        })?;
        if ip.offset >= code.len() {
            return Err(Fault::UnexpectedEndOfCode);
        }
        let (instr, len) = Instruction::decode(code, ip.offset)?;
        let next = ip.offset + len;
        self.ip = Some(Ip {
            section: ip.section,
            offset: next,
        });
        self.dispatch(instr, ip.section, next, code.len(), builtins, now)
    }

    fn dispatch(
        &mut self,
        instr: Instruction,
        section: SectionId,
        next: usize,
        code_len: usize,
        builtins: &mut BuiltinTable,
        now: Duration,
    ) -> Result<Flow, Fault> {
        use Opcode::*;

        match (instr.opcode, instr.operand) {
            (Noop, _) => {}

            // Stack
            (op @ (Pop | PopS | PopL | PopV | PopQ), _) => {
                self.pop_class(op)?;
            }
            (PopArg, Operand::Count(n)) => {
                for _ in 0..n {
                    self.pop()?;
                }
            }
            (op @ (Dup | DupS | DupL | DupV | DupQ), _) => {
                let slot = self.peek_class(op)?.clone();
                self.push(slot)?;
            }

            // Locals and globals
            (op @ (Store | StoreS | StoreL | StoreV | StoreQ), Operand::Local(index)) => {
                let slot = self.peek_class(op)?.clone();
                let at = self.local_index(index)?;
                replace(&mut self.stack[at], slot)?;
            }
            (op @ (StoreG | StoreGS | StoreGL | StoreGV | StoreGQ), Operand::Global(index)) => {
                let slot = self.peek_class(op)?.clone();
                replace(self.global_mut(index)?, slot)?;
            }
            (op @ (LoadP | LoadSP | LoadLP | LoadVP | LoadQP), Operand::Local(index)) => {
                let slot = self.pop_class(op)?;
                let at = self.local_index(index)?;
                replace(&mut self.stack[at], slot)?;
            }
            (op @ (LoadGP | LoadGSP | LoadGLP | LoadGVP | LoadGQP), Operand::Global(index)) => {
                let slot = self.pop_class(op)?;
                replace(self.global_mut(index)?, slot)?;
            }
            (op @ (Push | PushS | PushL | PushV | PushQ), Operand::Local(index)) => {
                let slot = self.stack[self.local_index(index)?].clone();
                check_class(op, &slot)?;
                self.push(slot)?;
            }
            (op @ (PushG | PushGS | PushGL | PushGV | PushGQ), Operand::Global(index)) => {
                let slot = self.global_mut(index)?.clone();
                check_class(op, &slot)?;
                self.push(slot)?;
            }

            // Registers
            (PushIp, _) => self.push(Slot::Integer(next as i32))?,
            (PushBp, _) => self.push(Slot::Integer(self.bp as i32))?,
            (PushSp, _) => self.push(Slot::Integer(self.stack.len() as i32))?,

            // Immediates
            (PushArgB, Operand::Byte(b)) => self.push(Slot::Integer(b as i32))?,
            (PushArgI, Operand::Integer(n)) => self.push(Slot::Integer(n))?,
            (PushArgF, Operand::Float(f)) => self.push(Slot::Float(f))?,
            (PushArgS, Operand::Constant(index)) => {
                let image = self.image.clone();
                let constant = image
                    .constants
                    .get(index as usize)
                    .ok_or(Fault::BadReference { what: "constant", index })?;
                let slot = match constant {
                    Value::String(_) | Value::Key(_) => self.to_slot(constant.clone())?,
                    other => {
                        return Err(Fault::TypeMismatch {
                            expected: TypeTag::String,
                            found: other.type_tag(),
                        })
                    }
                };
                self.push(slot)?;
            }
            (PushArgV, Operand::Vector(v)) => self.push(Slot::Vector(v))?,
            (PushArgQ, Operand::Rotation(r)) => self.push(Slot::Rotation(r))?,
            (PushE, _) => self.push(Slot::Integer(0))?,
            (PushEV, _) => self.push(Slot::Vector(Vector::ZERO))?,
            (PushEQ, _) => self.push(Slot::Rotation(Rotation::IDENTITY))?,
            (PushArgE, Operand::Type(tag)) => {
                let slot = self.default_slot(tag)?;
                self.push(slot)?;
            }

            // Operators
            (
                op @ (Add | Sub | Mul | Div | Mod | Eq | Neq | Leq | Geq | Less | Greater | BitAnd
                | BitOr | BitXor | BoolAnd | BoolOr),
                Operand::TypePair(left, right),
            ) => self.binary(op, left, right)?,
            (op @ (Shl | Shr), _) => self.binary(op, TypeTag::Integer, TypeTag::Integer)?,
            (Neg, Operand::Type(tag)) => self.unary(Neg, tag)?,
            (op @ (BitNot | BoolNot), _) => self.unary(op, TypeTag::Integer)?,

            // Control
            (Jump, Operand::Jump(offset)) => self.jump(section, next, offset, code_len)?,
            (op @ (JumpIf | JumpNIf), Operand::CondJump(tag, offset)) => {
                let truthy = self.pop_tag(tag)?.is_truthy();
                if truthy == (op == JumpIf) {
                    self.jump(section, next, offset, code_len)?;
                }
            }
            (State, Operand::State(index)) => {
                if index as usize >= self.image.states.len() {
                    return Err(Fault::BadReference { what: "state", index });
                }
                return Ok(Flow::ChangeState(index));
            }
            (Call, Operand::Function(index)) => self.call(index, section, next)?,
            (Return, _) => return self.ret(),

            // Conversion and aggregation
            (Cast, Operand::TypePair(from, to)) => {
                let value = self.pop_tag(from)?;
                let cast = value.cast(to).ok_or(Fault::InvalidCast { from, to })?;
                let slot = self.to_slot(cast)?;
                self.push(slot)?;
            }
            (StackToS, Operand::Count(n)) => {
                let joined: String = self
                    .pop_values(n)?
                    .iter()
                    .map(Value::to_lsl_string)
                    .collect();
                let slot = self.to_slot(Value::String(joined))?;
                self.push(slot)?;
            }
            (StackToL, Operand::Count(n)) => {
                let items = self.pop_values(n)?;
                let slot = self.to_slot(Value::list(items))?;
                self.push(slot)?;
            }
            (Print, Operand::Type(tag)) => {
                let line = self.pop_tag(tag)?.to_lsl_string();
                debug!(script = %self.name, "{line}");
                self.output.push(line);
            }

            // Built-ins
            (CallLib | CallLibTwoByte, Operand::Builtin(id)) => {
                return self.call_builtin(id, builtins, now);
            }

            (op, _) => return Err(Fault::UnsupportedOpcode(op)),
        }
        Ok(Flow::Continue)
    }

    fn pop_class(&mut self, opcode: Opcode) -> Result<Slot, Fault> {
        let slot = self.pop()?;
        check_class(opcode, &slot)?;
        Ok(slot)
    }

    fn peek_class(&self, opcode: Opcode) -> Result<&Slot, Fault> {
        if self.stack.len() <= self.floor() {
            return Err(Fault::StackUnderflow);
        }
        let slot = self.stack.last().ok_or(Fault::StackUnderflow)?;
        check_class(opcode, slot)?;
        Ok(slot)
    }

    fn global_mut(&mut self, index: u32) -> Result<&mut Slot, Fault> {
        self.globals
            .get_mut(index as usize)
            .ok_or(Fault::BadReference { what: "global", index })
    }

    /// Pop `n` values; the deepest comes first.
    fn pop_values(&mut self, n: u32) -> Result<Vec<Value>, Fault> {
        let n = n as usize;
        if self.stack.len() < self.floor() + n {
            return Err(Fault::StackUnderflow);
        }
        let slots = self.stack.split_off(self.stack.len() - n);
        slots.iter().map(|slot| self.to_value(slot)).collect()
    }

    fn binary(&mut self, opcode: Opcode, left: TypeTag, right: TypeTag) -> Result<(), Fault> {
        let rhs = self.pop_tag(right)?;
        let lhs = self.pop_tag(left)?;
        let result = operators::binary(opcode, lhs, rhs)?;
        let slot = self.to_slot(result)?;
        self.push(slot)
    }

    fn unary(&mut self, opcode: Opcode, tag: TypeTag) -> Result<(), Fault> {
        let value = self.pop_tag(tag)?;
        let result = operators::unary(opcode, value)?;
        let slot = self.to_slot(result)?;
        self.push(slot)
    }

    fn jump(&mut self, section: SectionId, next: usize, offset: i32, code_len: usize) -> Result<(), Fault> {
        let target = next as i64 + offset as i64;
        if target < 0 || target >= code_len as i64 {
            return Err(Fault::InvalidJumpTarget { target });
        }
        self.ip = Some(Ip {
            section,
            offset: target as usize,
        });
        Ok(())
    }

    fn call(&mut self, index: u32, section: SectionId, next: usize) -> Result<(), Fault> {
        let image = self.image.clone();
        let function = image
            .functions
            .get(index as usize)
            .ok_or(Fault::BadReference { what: "function", index })?;
        if self.frames.len() >= self.limits.max_call_depth {
            return Err(Fault::CallStackOverflow);
        }

        let argc = function.params.len();
        if self.stack.len() < self.floor() + argc {
            return Err(Fault::StackUnderflow);
        }
        let base = self.stack.len() - argc;
        for (slot, &expected) in self.stack[base..].iter().zip(&function.params) {
            check_tag(expected, slot)?;
        }

        self.frames.push(CallFrame {
            ret: Some(Ip {
                section,
                offset: next,
            }),
            saved_bp: self.bp,
            slots: argc + function.locals.len(),
            function: Some(index),
        });
        self.bp = base;
        for &tag in &function.locals {
            let slot = self.default_slot(tag)?;
            self.push(slot)?;
        }
        self.ip = Some(Ip {
            section: SectionId::Function(index),
            offset: 0,
        });
        Ok(())
    }

    fn ret(&mut self) -> Result<Flow, Fault> {
        let frame = self.frames.last().ok_or(Fault::StackUnderflow)?;
        let Some(resume) = frame.ret else {
            return Ok(Flow::Return);
        };
        let ret = match frame.function {
            Some(index) => self
                .image
                .functions
                .get(index as usize)
                .map(|f| f.ret)
                .ok_or(Fault::BadReference { what: "function", index })?,
            None => TypeTag::Void,
        };

        let value = match ret {
            TypeTag::Void => None,
            tag => Some(self.pop_slot(tag)?),
        };
        self.stack.truncate(self.bp);
        let frame = self.frames.pop().ok_or(Fault::StackUnderflow)?;
        self.bp = frame.saved_bp;
        self.ip = Some(resume);
        if let Some(slot) = value {
            self.push(slot)?;
        }
        Ok(Flow::Continue)
    }

    fn call_builtin(&mut self, id: u16, builtins: &mut BuiltinTable, now: Duration) -> Result<Flow, Fault> {
        let signature = library::lookup(id).ok_or(Fault::UnknownBuiltin(id))?;
        let name = signature.name;
        let f = builtins
            .get_mut(id)
            .ok_or(Fault::UnboundBuiltin { id, name })?;

        let argc = signature.params.len();
        if self.stack.len() < self.floor() + argc {
            return Err(Fault::StackUnderflow);
        }
        let base = self.stack.len() - argc;
        for (index, (slot, &expected)) in self.stack[base..].iter().zip(signature.params).enumerate() {
            let found = slot.tag();
            if found != expected {
                return Err(Fault::BuiltinArgMismatch {
                    name,
                    index,
                    expected,
                    found,
                });
            }
        }
        let slots = self.stack.split_off(base);
        let args = slots
            .iter()
            .map(|slot| self.to_value(slot))
            .collect::<Result<Vec<_>, _>>()?;

        let image = self.image.clone();
        let mut ctx = BuiltinContext {
            object: self.object,
            script: &self.name,
            state: &image.states[self.state as usize].name,
            now,
            next_ticket: &mut self.next_ticket,
        };
        let outcome = f(&mut ctx, &args).map_err(|e| Fault::BuiltinFailed {
            name,
            message: e.to_string(),
        })?;

        match outcome {
            BuiltinOutcome::Return(value) => {
                if signature.returns_value() {
                    let found = value.type_tag();
                    if found != signature.ret {
                        return Err(Fault::TypeMismatch {
                            expected: signature.ret,
                            found,
                        });
                    }
                    let slot = self.to_slot(value)?;
                    self.push(slot)?;
                }
                Ok(Flow::Continue)
            }
            BuiltinOutcome::Async { ticket } => Ok(Flow::Async(ticket)),
            BuiltinOutcome::Sleep(duration) => Ok(Flow::Sleep(duration)),
        }
    }
}

/// Check `slot` against the slot class an opcode accepts.
fn check_class(opcode: Opcode, slot: &Slot) -> Result<(), Fault> {
    let Some(class) = slot_class(opcode) else {
        return Ok(());
    };
    let found = slot.tag();
    if class.contains(&found) {
        Ok(())
    } else {
        Err(Fault::TypeMismatch {
            expected: class[0],
            found,
        })
    }
}

/// Overwrite a local or global. The stored value must keep its tag.
fn replace(target: &mut Slot, slot: Slot) -> Result<(), Fault> {
    check_tag(target.tag(), &slot)?;
    *target = slot;
    Ok(())
}
