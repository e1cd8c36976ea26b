//! Instruction encoding and decoding for the LSO instruction set.
//!
//! Instructions are variable length: one opcode byte followed by an
//! operand whose layout is fixed by the opcode (see [`OperandKind`]).
//! All multi-byte fields are big-endian.
//!
//! ```text
//! PUSHARGI 5      5e 00 00 00 05
//! ADD int,int     70 11
//! JUMP -7         90 ff ff ff f9
//! CALLLIB 13      d0 0d
//! ```

use crate::codec::{self, Reader};
use crate::error::DecodeError;
use crate::math::{Rotation, Vector};
use crate::opcode::{Opcode, OperandKind};
use crate::type_tag::TypeTag;

/// Decoded operand of an instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    None,
    Count(u32),
    Local(u32),
    Global(u32),
    Byte(u8),
    Integer(i32),
    Float(f32),
    Constant(u32),
    Vector(Vector),
    Rotation(Rotation),
    Type(TypeTag),
    /// (left, right) for binary operators; (from, to) for CAST.
    TypePair(TypeTag, TypeTag),
    /// Offset relative to the next instruction.
    Jump(i32),
    CondJump(TypeTag, i32),
    State(u32),
    Function(u32),
    /// Built-in id; one byte wide under CALLLIB, two under CALLLIB_TWO_BYTE.
    Builtin(u16),
}

impl Operand {
    /// The layout this operand encodes to.
    pub fn kind(&self) -> OperandKind {
        match self {
            Operand::None => OperandKind::None,
            Operand::Count(_) => OperandKind::Count,
            Operand::Local(_) => OperandKind::Local,
            Operand::Global(_) => OperandKind::Global,
            Operand::Byte(_) => OperandKind::Byte,
            Operand::Integer(_) => OperandKind::Integer,
            Operand::Float(_) => OperandKind::Float,
            Operand::Constant(_) => OperandKind::Constant,
            Operand::Vector(_) => OperandKind::Vector,
            Operand::Rotation(_) => OperandKind::Rotation,
            Operand::Type(_) => OperandKind::Type,
            Operand::TypePair(..) => OperandKind::TypePair,
            Operand::Jump(_) => OperandKind::Jump,
            Operand::CondJump(..) => OperandKind::CondJump,
            Operand::State(_) => OperandKind::State,
            Operand::Function(_) => OperandKind::Function,
            Operand::Builtin(id) if *id <= u8::MAX as u16 => OperandKind::Builtin8,
            Operand::Builtin(_) => OperandKind::Builtin16,
        }
    }
}

/// A single LSO instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instruction {
    /// The operation to perform.
    pub opcode: Opcode,
    /// Operand; its variant must match `opcode.operand_kind()`.
    pub operand: Operand,
}

impl Instruction {
    /// Create a new instruction.
    pub fn new(opcode: Opcode, operand: Operand) -> Self {
        Self { opcode, operand }
    }

    /// An instruction with no operand.
    pub fn bare(opcode: Opcode) -> Self {
        Self::new(opcode, Operand::None)
    }

    /// A built-in call, picking the one- or two-byte form by id.
    pub fn call_lib(id: u16) -> Self {
        let opcode = if id <= u8::MAX as u16 {
            Opcode::CallLib
        } else {
            Opcode::CallLibTwoByte
        };
        Self::new(opcode, Operand::Builtin(id))
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        1 + self.opcode.operand_kind().len()
    }

    /// Always false; every instruction has an opcode byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Append the encoding of this instruction to `out`.
    ///
    /// The operand is written in the layout the opcode dictates. A
    /// mismatched operand variant, or a built-in id too wide for the
    /// one-byte form, writes zero bytes of the right width so the stream
    /// stays decodable. Use [`Instruction::call_lib`] to pick the form.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.opcode as u8);
        let kind = self.opcode.operand_kind();
        match (kind, self.operand) {
            (OperandKind::None, _) => {}
            (OperandKind::Count, Operand::Count(n))
            | (OperandKind::Local, Operand::Local(n))
            | (OperandKind::Global, Operand::Global(n))
            | (OperandKind::Constant, Operand::Constant(n))
            | (OperandKind::State, Operand::State(n))
            | (OperandKind::Function, Operand::Function(n)) => codec::put_u32(out, n),
            (OperandKind::Byte, Operand::Byte(b)) => out.push(b),
            (OperandKind::Integer, Operand::Integer(i)) => codec::put_i32(out, i),
            (OperandKind::Float, Operand::Float(f)) => codec::put_f32(out, f),
            (OperandKind::Vector, Operand::Vector(v)) => codec::put_vector(out, v),
            (OperandKind::Rotation, Operand::Rotation(r)) => codec::put_rotation(out, r),
            (OperandKind::Type, Operand::Type(t)) => out.push(t as u8),
            (OperandKind::TypePair, Operand::TypePair(l, r)) => out.push(TypeTag::pair(l, r)),
            (OperandKind::Jump, Operand::Jump(offset)) => codec::put_i32(out, offset),
            (OperandKind::CondJump, Operand::CondJump(t, offset)) => {
                out.push(t as u8);
                codec::put_i32(out, offset);
            }
            (OperandKind::Builtin8, Operand::Builtin(id)) if id <= u8::MAX as u16 => {
                out.push(id as u8)
            }
            (OperandKind::Builtin16, Operand::Builtin(id)) => codec::put_u16(out, id),
            (kind, _) => out.extend(std::iter::repeat(0).take(kind.len())),
        }
    }

    /// Encode this instruction to a fresh buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        self.encode_into(&mut out);
        out
    }

    /// Decode the instruction starting at byte `at` of `code`.
    ///
    /// Returns the instruction and its encoded length.
    pub fn decode(code: &[u8], at: usize) -> Result<(Self, usize), DecodeError> {
        let mut r = Reader::at(code, at);
        let opcode = Opcode::try_from(r.u8()?)?;
        let operand = match opcode.operand_kind() {
            OperandKind::None => Operand::None,
            OperandKind::Count => Operand::Count(r.u32()?),
            OperandKind::Local => Operand::Local(r.u32()?),
            OperandKind::Global => Operand::Global(r.u32()?),
            OperandKind::Byte => Operand::Byte(r.u8()?),
            OperandKind::Integer => Operand::Integer(r.i32()?),
            OperandKind::Float => Operand::Float(r.f32()?),
            OperandKind::Constant => Operand::Constant(r.u32()?),
            OperandKind::Vector => Operand::Vector(r.vector()?),
            OperandKind::Rotation => Operand::Rotation(r.rotation()?),
            OperandKind::Type => Operand::Type(r.type_tag()?),
            OperandKind::TypePair => {
                let (left, right) = TypeTag::unpair(r.u8()?)?;
                Operand::TypePair(left, right)
            }
            OperandKind::Jump => Operand::Jump(r.i32()?),
            OperandKind::CondJump => {
                let tag = r.type_tag()?;
                Operand::CondJump(tag, r.i32()?)
            }
            OperandKind::State => Operand::State(r.u32()?),
            OperandKind::Function => Operand::Function(r.u32()?),
            OperandKind::Builtin8 => Operand::Builtin(r.u8()? as u16),
            OperandKind::Builtin16 => Operand::Builtin(r.u16()?),
        };
        Ok((Self { opcode, operand }, r.pos() - at))
    }
}

/// Decode a whole code section into `(offset, instruction)` pairs.
pub fn decode_all(code: &[u8]) -> Result<Vec<(usize, Instruction)>, DecodeError> {
    let mut out = Vec::new();
    let mut at = 0;
    while at < code.len() {
        let (instr, len) = Instruction::decode(code, at)?;
        out.push((at, instr));
        at += len;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(instr: Instruction) {
        let bytes = instr.encode();
        assert_eq!(bytes.len(), instr.len(), "length mismatch for {instr:?}");
        let (decoded, len) = Instruction::decode(&bytes, 0).unwrap();
        assert_eq!(decoded, instr);
        assert_eq!(len, bytes.len());
    }

    #[test]
    fn bare_opcodes_are_one_byte() {
        for &op in &crate::opcode::ALL_OPCODES {
            if op.operand_kind() == OperandKind::None {
                assert_eq!(Instruction::bare(op).encode(), vec![op as u8]);
            }
        }
    }

    #[test]
    fn push_integer_layout() {
        let instr = Instruction::new(Opcode::PushArgI, Operand::Integer(5));
        assert_eq!(instr.encode(), vec![0x5e, 0, 0, 0, 5]);
        roundtrip(instr);
    }

    #[test]
    fn add_type_pair_layout() {
        let instr = Instruction::new(
            Opcode::Add,
            Operand::TypePair(TypeTag::String, TypeTag::String),
        );
        assert_eq!(instr.encode(), vec![0x70, 0x33]);
        roundtrip(instr);
    }

    #[test]
    fn wide_builtin_id_never_truncates() {
        let instr = Instruction::new(Opcode::CallLib, Operand::Builtin(400));
        assert_eq!(instr.encode(), vec![0xd0, 0]);
        assert_eq!(
            Instruction::call_lib(400).encode(),
            vec![0xd1, 0x01, 0x90]
        );
        assert_eq!(Instruction::call_lib(200).encode(), vec![0xd0, 200]);
    }

    #[test]
    fn jump_is_signed() {
        let instr = Instruction::new(Opcode::Jump, Operand::Jump(-7));
        assert_eq!(instr.encode(), vec![0x90, 0xff, 0xff, 0xff, 0xf9]);
        roundtrip(instr);
    }

    #[test]
    fn conditional_jump_carries_type() {
        roundtrip(Instruction::new(
            Opcode::JumpNIf,
            Operand::CondJump(TypeTag::Integer, 12),
        ));
    }

    #[test]
    fn vector_and_rotation_immediates() {
        roundtrip(Instruction::new(
            Opcode::PushArgV,
            Operand::Vector(Vector::new(1.0, -2.0, 3.5)),
        ));
        roundtrip(Instruction::new(
            Opcode::PushArgQ,
            Operand::Rotation(Rotation::new(0.0, 0.0, 0.5, 0.5)),
        ));
    }

    #[test]
    fn call_lib_width_by_id() {
        assert_eq!(Instruction::call_lib(13).encode(), vec![0xd0, 13]);
        assert_eq!(Instruction::call_lib(327).encode(), vec![0xd1, 0x01, 0x47]);
        roundtrip(Instruction::call_lib(327));
    }

    #[test]
    fn decode_at_offset() {
        let mut code = Vec::new();
        Instruction::bare(Opcode::Noop).encode_into(&mut code);
        Instruction::new(Opcode::Push, Operand::Local(2)).encode_into(&mut code);
        let (instr, len) = Instruction::decode(&code, 1).unwrap();
        assert_eq!(instr, Instruction::new(Opcode::Push, Operand::Local(2)));
        assert_eq!(len, 5);
    }

    #[test]
    fn decode_rejects_unassigned_opcode() {
        assert_eq!(
            Instruction::decode(&[0x0b], 0),
            Err(DecodeError::InvalidOpcode(0x0b))
        );
    }

    #[test]
    fn decode_rejects_truncated_operand() {
        assert_eq!(
            Instruction::decode(&[0x5e, 0, 0], 0),
            Err(DecodeError::Truncated { at: 1, needed: 2 })
        );
    }

    #[test]
    fn decode_rejects_bad_type_pair() {
        assert_eq!(
            Instruction::decode(&[0x70, 0x19], 0),
            Err(DecodeError::InvalidTypeTag(0x19))
        );
    }

    #[test]
    fn decode_all_walks_section() {
        let mut code = Vec::new();
        Instruction::new(Opcode::PushArgI, Operand::Integer(2)).encode_into(&mut code);
        Instruction::new(Opcode::PushArgI, Operand::Integer(3)).encode_into(&mut code);
        Instruction::new(Opcode::Add, Operand::TypePair(TypeTag::Integer, TypeTag::Integer))
            .encode_into(&mut code);
        Instruction::bare(Opcode::Return).encode_into(&mut code);
        let offsets: Vec<usize> = decode_all(&code).unwrap().iter().map(|(at, _)| *at).collect();
        assert_eq!(offsets, vec![0, 5, 10, 12]);
    }
}
