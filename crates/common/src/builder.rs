//! Incremental construction of code sections with symbolic jump labels.

use std::collections::HashMap;

use thiserror::Error;

use crate::instruction::{Instruction, Operand};
use crate::opcode::Opcode;
use crate::type_tag::TypeTag;

/// Errors from resolving labels.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("label '{0}' defined twice")]
    DuplicateLabel(String),

    #[error("undefined label '{0}'")]
    UndefinedLabel(String),
}

/// A jump whose offset is filled in by [`CodeBuilder::finish`].
struct Fixup {
    label: String,
    /// Byte position of the `i32` offset field.
    field: usize,
    /// Offset of the instruction after the jump.
    next: usize,
}

/// Builds one code section.
#[derive(Default)]
pub struct CodeBuilder {
    code: Vec<u8>,
    labels: HashMap<String, usize>,
    fixups: Vec<Fixup>,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current byte offset; the offset the next instruction will get.
    pub fn offset(&self) -> usize {
        self.code.len()
    }

    /// Bind `name` to the current offset.
    pub fn label(&mut self, name: &str) -> Result<&mut Self, BuildError> {
        if self.labels.insert(name.to_string(), self.code.len()).is_some() {
            return Err(BuildError::DuplicateLabel(name.to_string()));
        }
        Ok(self)
    }

    /// Append an instruction.
    pub fn emit(&mut self, instr: Instruction) -> &mut Self {
        instr.encode_into(&mut self.code);
        self
    }

    /// Append an instruction that takes no operand.
    pub fn op(&mut self, opcode: Opcode) -> &mut Self {
        self.emit(Instruction::bare(opcode))
    }

    /// Append `opcode` with `operand`.
    pub fn with(&mut self, opcode: Opcode, operand: Operand) -> &mut Self {
        self.emit(Instruction::new(opcode, operand))
    }

    /// `PUSHARGI value`.
    pub fn push_int(&mut self, value: i32) -> &mut Self {
        self.with(Opcode::PushArgI, Operand::Integer(value))
    }

    /// `PUSHARGF value`.
    pub fn push_float(&mut self, value: f32) -> &mut Self {
        self.with(Opcode::PushArgF, Operand::Float(value))
    }

    /// A binary operator on `(left, right)`.
    pub fn binary(&mut self, opcode: Opcode, left: TypeTag, right: TypeTag) -> &mut Self {
        self.with(opcode, Operand::TypePair(left, right))
    }

    /// `CALLLIB` or `CALLLIB_TWO_BYTE`, by id width.
    pub fn call_lib(&mut self, id: u16) -> &mut Self {
        self.emit(Instruction::call_lib(id))
    }

    /// `JUMP` to a label.
    pub fn jump(&mut self, label: &str) -> &mut Self {
        self.code.push(Opcode::Jump as u8);
        self.fixup(label)
    }

    /// `JUMPIF`/`JUMPNIF` on a value of type `tag` to a label.
    pub fn jump_if(&mut self, opcode: Opcode, tag: TypeTag, label: &str) -> &mut Self {
        self.code.push(opcode as u8);
        self.code.push(tag as u8);
        self.fixup(label)
    }

    fn fixup(&mut self, label: &str) -> &mut Self {
        let field = self.code.len();
        self.code.extend_from_slice(&[0; 4]);
        self.fixups.push(Fixup {
            label: label.to_string(),
            field,
            next: self.code.len(),
        });
        self
    }

    /// Resolve labels and return the section bytes.
    pub fn finish(mut self) -> Result<Vec<u8>, BuildError> {
        for fixup in &self.fixups {
            let target = *self
                .labels
                .get(&fixup.label)
                .ok_or_else(|| BuildError::UndefinedLabel(fixup.label.clone()))?;
            let offset = target as i64 - fixup.next as i64;
            self.code[fixup.field..fixup.field + 4].copy_from_slice(&(offset as i32).to_be_bytes());
        }
        Ok(self.code)
    }
}
