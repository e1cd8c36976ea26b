//! Opcode definitions for the LSO instruction set.
//!
//! Opcode byte values follow the LSO operation table so that images
//! produced by existing compilers decode unchanged. The operand that
//! follows each opcode has a fixed layout given by [`Opcode::operand_kind`].

use crate::error::DecodeError;

/// Identifies the operation to perform.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// No operation.
    Noop = 0x00,

    // Pops, one per slot class
    /// Pop an integer or float.
    Pop = 0x01,
    /// Pop a string or key.
    PopS = 0x02,
    /// Pop a list.
    PopL = 0x03,
    /// Pop a vector.
    PopV = 0x04,
    /// Pop a rotation.
    PopQ = 0x05,
    /// Pop `n` slots of any type.
    PopArg = 0x06,
    /// Register write (not accepted by the verifier).
    PopIp = 0x07,
    /// Register write (not accepted by the verifier).
    PopBp = 0x08,
    /// Register write (not accepted by the verifier).
    PopSp = 0x09,
    /// Register write (not accepted by the verifier).
    PopSlr = 0x0a,

    // Duplicate top of stack
    /// Duplicate an integer or float.
    Dup = 0x20,
    /// Duplicate a string or key.
    DupS = 0x21,
    /// Duplicate a list.
    DupL = 0x22,
    /// Duplicate a vector.
    DupV = 0x23,
    /// Duplicate a rotation.
    DupQ = 0x24,

    // Store top of stack into a local (value stays on the stack)
    /// Store integer/float into a local.
    Store = 0x30,
    /// Store string/key into a local.
    StoreS = 0x31,
    /// Store list into a local.
    StoreL = 0x32,
    /// Store vector into a local.
    StoreV = 0x33,
    /// Store rotation into a local.
    StoreQ = 0x34,
    /// Store integer/float into a global.
    StoreG = 0x35,
    /// Store string/key into a global.
    StoreGS = 0x36,
    /// Store list into a global.
    StoreGL = 0x37,
    /// Store vector into a global.
    StoreGV = 0x38,
    /// Store rotation into a global.
    StoreGQ = 0x39,

    // Pop top of stack into a local or global
    /// Pop integer/float into a local.
    LoadP = 0x3a,
    /// Pop string/key into a local.
    LoadSP = 0x3b,
    /// Pop list into a local.
    LoadLP = 0x3c,
    /// Pop vector into a local.
    LoadVP = 0x3d,
    /// Pop rotation into a local.
    LoadQP = 0x3e,
    /// Pop integer/float into a global.
    LoadGP = 0x3f,
    /// Pop string/key into a global.
    LoadGSP = 0x40,
    /// Pop list into a global.
    LoadGLP = 0x41,
    /// Pop vector into a global.
    LoadGVP = 0x42,
    /// Pop rotation into a global.
    LoadGQP = 0x43,

    // Push locals and globals
    /// Push an integer/float local.
    Push = 0x50,
    /// Push a string/key local.
    PushS = 0x51,
    /// Push a list local.
    PushL = 0x52,
    /// Push a vector local.
    PushV = 0x53,
    /// Push a rotation local.
    PushQ = 0x54,
    /// Push an integer/float global.
    PushG = 0x55,
    /// Push a string/key global.
    PushGS = 0x56,
    /// Push a list global.
    PushGL = 0x57,
    /// Push a vector global.
    PushGV = 0x58,
    /// Push a rotation global.
    PushGQ = 0x59,

    // Registers
    /// Push the instruction pointer as an integer.
    PushIp = 0x5a,
    /// Push the base pointer as an integer.
    PushBp = 0x5b,
    /// Push the stack pointer as an integer.
    PushSp = 0x5c,

    // Immediates
    /// Push a byte immediate as an integer.
    PushArgB = 0x5d,
    /// Push an integer immediate.
    PushArgI = 0x5e,
    /// Push a float immediate.
    PushArgF = 0x5f,
    /// Push a string from the constant pool.
    PushArgS = 0x60,
    /// Push a vector immediate.
    PushArgV = 0x61,
    /// Push a rotation immediate.
    PushArgQ = 0x62,
    /// Push integer zero.
    PushE = 0x63,
    /// Push the zero vector.
    PushEV = 0x64,
    /// Push the identity rotation.
    PushEQ = 0x65,
    /// Push the default value of a type.
    PushArgE = 0x66,

    // Binary operators (operand: type pair)
    /// Addition, concatenation, list append.
    Add = 0x70,
    /// Subtraction.
    Sub = 0x71,
    /// Multiplication, scaling, dot product, rotation composition.
    Mul = 0x72,
    /// Division.
    Div = 0x73,
    /// Integer remainder, vector cross product.
    Mod = 0x74,
    /// Equality.
    Eq = 0x75,
    /// Inequality.
    Neq = 0x76,
    /// Less or equal.
    Leq = 0x77,
    /// Greater or equal.
    Geq = 0x78,
    /// Less than.
    Less = 0x79,
    /// Greater than.
    Greater = 0x7a,
    /// Bitwise and.
    BitAnd = 0x7b,
    /// Bitwise or.
    BitOr = 0x7c,
    /// Bitwise xor.
    BitXor = 0x7d,
    /// Logical and.
    BoolAnd = 0x7e,
    /// Logical or.
    BoolOr = 0x7f,

    // Unary operators
    /// Negation (operand: type).
    Neg = 0x80,
    /// Bitwise not.
    BitNot = 0x81,
    /// Logical not.
    BoolNot = 0x82,

    // Control transfer
    /// Unconditional relative jump.
    Jump = 0x90,
    /// Jump if top of stack is truthy.
    JumpIf = 0x91,
    /// Jump if top of stack is falsy.
    JumpNIf = 0x92,
    /// Transition to another state.
    State = 0x93,
    /// Call a user function.
    Call = 0x94,
    /// Return from the current function or handler.
    Return = 0x95,

    /// Explicit conversion (operand: type pair from/to).
    Cast = 0xa0,
    /// Pop `n` values and push their concatenated string casts.
    StackToS = 0xb0,
    /// Pop `n` values and push them as a list.
    StackToL = 0xb1,
    /// Pop a value and hand it to the host debug channel.
    Print = 0xc0,
    /// Call a built-in with a one-byte id.
    CallLib = 0xd0,
    /// Call a built-in with a two-byte id.
    CallLibTwoByte = 0xd1,
    /// Shift left.
    Shl = 0xe0,
    /// Arithmetic shift right.
    Shr = 0xe1,
}

/// Layout of the operand bytes that follow an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// No operand.
    None,
    /// `u32` count.
    Count,
    /// `u32` local slot index.
    Local,
    /// `u32` global slot index.
    Global,
    /// `u8` immediate.
    Byte,
    /// `i32` immediate.
    Integer,
    /// `f32` immediate.
    Float,
    /// `u32` constant pool index.
    Constant,
    /// Three `f32`.
    Vector,
    /// Four `f32`.
    Rotation,
    /// One type tag byte.
    Type,
    /// One packed (left, right) type byte.
    TypePair,
    /// `i32` relative offset.
    Jump,
    /// Type tag byte then `i32` relative offset.
    CondJump,
    /// `u32` state index.
    State,
    /// `u32` function index.
    Function,
    /// `u8` built-in id.
    Builtin8,
    /// `u16` built-in id.
    Builtin16,
}

impl OperandKind {
    /// Number of operand bytes.
    pub fn len(&self) -> usize {
        match self {
            OperandKind::None => 0,
            OperandKind::Byte
            | OperandKind::Type
            | OperandKind::TypePair
            | OperandKind::Builtin8 => 1,
            OperandKind::Builtin16 => 2,
            OperandKind::Count
            | OperandKind::Local
            | OperandKind::Global
            | OperandKind::Integer
            | OperandKind::Float
            | OperandKind::Constant
            | OperandKind::Jump
            | OperandKind::State
            | OperandKind::Function => 4,
            OperandKind::CondJump => 5,
            OperandKind::Vector => 12,
            OperandKind::Rotation => 16,
        }
    }

    /// Returns true when the operand occupies no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// All valid opcodes, in table order. Useful for exhaustive testing.
pub const ALL_OPCODES: [Opcode; 92] = [
    Opcode::Noop,
    Opcode::Pop,
    Opcode::PopS,
    Opcode::PopL,
    Opcode::PopV,
    Opcode::PopQ,
    Opcode::PopArg,
    Opcode::PopIp,
    Opcode::PopBp,
    Opcode::PopSp,
    Opcode::PopSlr,
    Opcode::Dup,
    Opcode::DupS,
    Opcode::DupL,
    Opcode::DupV,
    Opcode::DupQ,
    Opcode::Store,
    Opcode::StoreS,
    Opcode::StoreL,
    Opcode::StoreV,
    Opcode::StoreQ,
    Opcode::StoreG,
    Opcode::StoreGS,
    Opcode::StoreGL,
    Opcode::StoreGV,
    Opcode::StoreGQ,
    Opcode::LoadP,
    Opcode::LoadSP,
    Opcode::LoadLP,
    Opcode::LoadVP,
    Opcode::LoadQP,
    Opcode::LoadGP,
    Opcode::LoadGSP,
    Opcode::LoadGLP,
    Opcode::LoadGVP,
    Opcode::LoadGQP,
    Opcode::Push,
    Opcode::PushS,
    Opcode::PushL,
    Opcode::PushV,
    Opcode::PushQ,
    Opcode::PushG,
    Opcode::PushGS,
    Opcode::PushGL,
    Opcode::PushGV,
    Opcode::PushGQ,
    Opcode::PushIp,
    Opcode::PushBp,
    Opcode::PushSp,
    Opcode::PushArgB,
    Opcode::PushArgI,
    Opcode::PushArgF,
    Opcode::PushArgS,
    Opcode::PushArgV,
    Opcode::PushArgQ,
    Opcode::PushE,
    Opcode::PushEV,
    Opcode::PushEQ,
    Opcode::PushArgE,
    Opcode::Add,
    Opcode::Sub,
    Opcode::Mul,
    Opcode::Div,
    Opcode::Mod,
    Opcode::Eq,
    Opcode::Neq,
    Opcode::Leq,
    Opcode::Geq,
    Opcode::Less,
    Opcode::Greater,
    Opcode::BitAnd,
    Opcode::BitOr,
    Opcode::BitXor,
    Opcode::BoolAnd,
    Opcode::BoolOr,
    Opcode::Neg,
    Opcode::BitNot,
    Opcode::BoolNot,
    Opcode::Jump,
    Opcode::JumpIf,
    Opcode::JumpNIf,
    Opcode::State,
    Opcode::Call,
    Opcode::Return,
    Opcode::Cast,
    Opcode::StackToS,
    Opcode::StackToL,
    Opcode::Print,
    Opcode::CallLib,
    Opcode::CallLibTwoByte,
    Opcode::Shl,
    Opcode::Shr,
    // Keep in table order; the count above is checked by a test.
];

impl TryFrom<u8> for Opcode {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        ALL_OPCODES
            .iter()
            .copied()
            .find(|op| *op as u8 == value)
            .ok_or(DecodeError::InvalidOpcode(value))
    }
}

impl Opcode {
    /// Returns the assembly mnemonic for this opcode.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Noop => "NOOP",
            Opcode::Pop => "POP",
            Opcode::PopS => "POPS",
            Opcode::PopL => "POPL",
            Opcode::PopV => "POPV",
            Opcode::PopQ => "POPQ",
            Opcode::PopArg => "POPARG",
            Opcode::PopIp => "POPIP",
            Opcode::PopBp => "POPBP",
            Opcode::PopSp => "POPSP",
            Opcode::PopSlr => "POPSLR",
            Opcode::Dup => "DUP",
            Opcode::DupS => "DUPS",
            Opcode::DupL => "DUPL",
            Opcode::DupV => "DUPV",
            Opcode::DupQ => "DUPQ",
            Opcode::Store => "STORE",
            Opcode::StoreS => "STORES",
            Opcode::StoreL => "STOREL",
            Opcode::StoreV => "STOREV",
            Opcode::StoreQ => "STOREQ",
            Opcode::StoreG => "STOREG",
            Opcode::StoreGS => "STOREGS",
            Opcode::StoreGL => "STOREGL",
            Opcode::StoreGV => "STOREGV",
            Opcode::StoreGQ => "STOREGQ",
            Opcode::LoadP => "LOADP",
            Opcode::LoadSP => "LOADSP",
            Opcode::LoadLP => "LOADLP",
            Opcode::LoadVP => "LOADVP",
            Opcode::LoadQP => "LOADQP",
            Opcode::LoadGP => "LOADGP",
            Opcode::LoadGSP => "LOADGSP",
            Opcode::LoadGLP => "LOADGLP",
            Opcode::LoadGVP => "LOADGVP",
            Opcode::LoadGQP => "LOADGQP",
            Opcode::Push => "PUSH",
            Opcode::PushS => "PUSHS",
            Opcode::PushL => "PUSHL",
            Opcode::PushV => "PUSHV",
            Opcode::PushQ => "PUSHQ",
            Opcode::PushG => "PUSHG",
            Opcode::PushGS => "PUSHGS",
            Opcode::PushGL => "PUSHGL",
            Opcode::PushGV => "PUSHGV",
            Opcode::PushGQ => "PUSHGQ",
            Opcode::PushIp => "PUSHIP",
            Opcode::PushBp => "PUSHBP",
            Opcode::PushSp => "PUSHSP",
            Opcode::PushArgB => "PUSHARGB",
            Opcode::PushArgI => "PUSHARGI",
            Opcode::PushArgF => "PUSHARGF",
            Opcode::PushArgS => "PUSHARGS",
            Opcode::PushArgV => "PUSHARGV",
            Opcode::PushArgQ => "PUSHARGQ",
            Opcode::PushE => "PUSHE",
            Opcode::PushEV => "PUSHEV",
            Opcode::PushEQ => "PUSHEQ",
            Opcode::PushArgE => "PUSHARGE",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Mod => "MOD",
            Opcode::Eq => "EQ",
            Opcode::Neq => "NEQ",
            Opcode::Leq => "LEQ",
            Opcode::Geq => "GEQ",
            Opcode::Less => "LESS",
            Opcode::Greater => "GREATER",
            Opcode::BitAnd => "BITAND",
            Opcode::BitOr => "BITOR",
            Opcode::BitXor => "BITXOR",
            Opcode::BoolAnd => "BOOLAND",
            Opcode::BoolOr => "BOOLOR",
            Opcode::Neg => "NEG",
            Opcode::BitNot => "BITNOT",
            Opcode::BoolNot => "BOOLNOT",
            Opcode::Jump => "JUMP",
            Opcode::JumpIf => "JUMPIF",
            Opcode::JumpNIf => "JUMPNIF",
            Opcode::State => "STATE",
            Opcode::Call => "CALL",
            Opcode::Return => "RETURN",
            Opcode::Cast => "CAST",
            Opcode::StackToS => "STACKTOS",
            Opcode::StackToL => "STACKTOL",
            Opcode::Print => "PRINT",
            Opcode::CallLib => "CALLLIB",
            Opcode::CallLibTwoByte => "CALLLIB_TWO_BYTE",
            Opcode::Shl => "SHL",
            Opcode::Shr => "SHR",
        }
    }

    /// Look up an opcode by mnemonic (uppercase).
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        ALL_OPCODES
            .iter()
            .copied()
            .find(|op| op.mnemonic() == mnemonic)
    }

    /// The operand layout that follows this opcode.
    pub fn operand_kind(&self) -> OperandKind {
        use Opcode::*;
        match self {
            Noop | Pop | PopS | PopL | PopV | PopQ | PopIp | PopBp | PopSp | PopSlr | Dup
            | DupS | DupL | DupV | DupQ | PushIp | PushBp | PushSp | PushE | PushEV | PushEQ
            | BitNot | BoolNot | Return | Shl | Shr => OperandKind::None,

            PopArg | StackToS | StackToL => OperandKind::Count,

            Store | StoreS | StoreL | StoreV | StoreQ | LoadP | LoadSP | LoadLP | LoadVP
            | LoadQP | Push | PushS | PushL | PushV | PushQ => OperandKind::Local,

            StoreG | StoreGS | StoreGL | StoreGV | StoreGQ | LoadGP | LoadGSP | LoadGLP
            | LoadGVP | LoadGQP | PushG | PushGS | PushGL | PushGV | PushGQ => {
                OperandKind::Global
            }

            PushArgB => OperandKind::Byte,
            PushArgI => OperandKind::Integer,
            PushArgF => OperandKind::Float,
            PushArgS => OperandKind::Constant,
            PushArgV => OperandKind::Vector,
            PushArgQ => OperandKind::Rotation,
            PushArgE | Neg | Print => OperandKind::Type,

            Add | Sub | Mul | Div | Mod | Eq | Neq | Leq | Geq | Less | Greater | BitAnd
            | BitOr | BitXor | BoolAnd | BoolOr | Cast => OperandKind::TypePair,

            Jump => OperandKind::Jump,
            JumpIf | JumpNIf => OperandKind::CondJump,
            State => OperandKind::State,
            Call => OperandKind::Function,
            CallLib => OperandKind::Builtin8,
            CallLibTwoByte => OperandKind::Builtin16,
        }
    }

    /// Returns true if control never falls through to the next instruction.
    pub fn is_terminator(&self) -> bool {
        matches!(self, Opcode::Jump | Opcode::Return | Opcode::State)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;

    #[test]
    fn all_opcodes_count() {
        assert_eq!(ALL_OPCODES.len(), 92);
    }

    #[test]
    fn roundtrip_all_valid_opcodes() {
        for &opcode in &ALL_OPCODES {
            let byte = opcode as u8;
            let decoded = Opcode::try_from(byte).unwrap();
            assert_eq!(
                opcode, decoded,
                "roundtrip failed for {opcode:?} ({byte:#04x})"
            );
        }
    }

    #[test]
    fn stable_numbering() {
        assert_eq!(Opcode::Noop as u8, 0x00);
        assert_eq!(Opcode::PushArgE as u8, 0x66);
        assert_eq!(Opcode::Add as u8, 0x70);
        assert_eq!(Opcode::State as u8, 0x93);
        assert_eq!(Opcode::Return as u8, 0x95);
        assert_eq!(Opcode::CallLib as u8, 0xd0);
        assert_eq!(Opcode::CallLibTwoByte as u8, 0xd1);
        assert_eq!(Opcode::Shr as u8, 0xe1);
    }

    #[test]
    fn unassigned_bytes_rejected() {
        for byte in [0x0bu8, 0x1f, 0x25, 0x44, 0x67, 0x83, 0x96, 0xa1, 0xb2, 0xc1, 0xd2, 0xe2, 0xff] {
            assert_eq!(
                Opcode::try_from(byte),
                Err(DecodeError::InvalidOpcode(byte)),
                "byte {byte:#04x} should be unassigned"
            );
        }
    }

    #[test]
    fn every_byte_value_resolves() {
        let mut assigned = 0;
        for byte in 0..=255u8 {
            match Opcode::try_from(byte) {
                Ok(_) => assigned += 1,
                Err(DecodeError::InvalidOpcode(_)) => {}
                other => panic!("unexpected result for byte {byte:#04x}: {other:?}"),
            }
        }
        assert_eq!(assigned, ALL_OPCODES.len());
    }

    #[test]
    fn mnemonic_roundtrip() {
        for &opcode in &ALL_OPCODES {
            let m = opcode.mnemonic();
            assert_eq!(m, m.to_uppercase(), "mnemonic should be uppercase: {m}");
            assert_eq!(Opcode::from_mnemonic(m), Some(opcode));
        }
    }

    #[test]
    fn builtin_width_split() {
        assert_eq!(Opcode::CallLib.operand_kind().len(), 1);
        assert_eq!(Opcode::CallLibTwoByte.operand_kind().len(), 2);
    }
}
