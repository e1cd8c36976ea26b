//! LSO common types and encoding.
//!
//! This crate provides the foundational data structures shared by the
//! verifier, the VM and the tooling:
//!
//! - [`Opcode`] / [`Instruction`] / [`Operand`]: the instruction set and
//!   its variable-length big-endian encoding
//! - [`TypeTag`] and the owned [`Value`] model, with [`Key`], [`Vector`]
//!   and [`Rotation`]
//! - [`EventKind`] with the fixed handler signatures, and [`EventMask`]
//! - [`library`]: the built-in function ABI table
//! - [`BytecodeImage`]: the compiled script container and its codec
//! - [`CodeBuilder`]: label-aware section assembly
//! - [`DecodeError`]: errors from decoding byte streams

pub mod builder;
mod codec;
pub mod error;
pub mod event;
pub mod image;
pub mod instruction;
pub mod library;
pub mod math;
pub mod opcode;
pub mod type_tag;
pub mod value;

// Re-export commonly used types at the crate root.
pub use builder::{BuildError, CodeBuilder};
pub use error::DecodeError;
pub use event::{EventKind, EventMask};
pub use image::{BytecodeImage, Function, Global, Handler, ImageDigest, SectionId, State};
pub use instruction::{Instruction, Operand};
pub use library::BuiltinSignature;
pub use math::{Rotation, Vector};
pub use opcode::{Opcode, OperandKind};
pub use type_tag::TypeTag;
pub use value::{Key, Value};

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<i32>().prop_map(Value::Integer),
            (-1.0e6f32..1.0e6).prop_map(Value::Float),
            "[a-z ]{0,12}".prop_map(Value::String),
            any::<u128>().prop_map(|n| Value::Key(Key::Uuid(uuid::Uuid::from_u128(n)))),
            (-100.0f32..100.0, -100.0f32..100.0, -100.0f32..100.0)
                .prop_map(|(x, y, z)| Value::Vector(Vector::new(x, y, z))),
        ]
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            4 => arb_scalar(),
            1 => prop::collection::vec(arb_scalar(), 0..6).prop_map(Value::List),
        ]
    }

    /// Strategy that generates a random valid Instruction.
    fn arb_instruction() -> impl Strategy<Value = Instruction> {
        let tag = || prop::sample::select(&type_tag::ALL_TYPE_TAGS[..]);
        prop::sample::select(&opcode::ALL_OPCODES[..]).prop_flat_map(move |op| {
            let operand: BoxedStrategy<Operand> = match op.operand_kind() {
                OperandKind::None => Just(Operand::None).boxed(),
                OperandKind::Count => any::<u32>().prop_map(Operand::Count).boxed(),
                OperandKind::Local => any::<u32>().prop_map(Operand::Local).boxed(),
                OperandKind::Global => any::<u32>().prop_map(Operand::Global).boxed(),
                OperandKind::Byte => any::<u8>().prop_map(Operand::Byte).boxed(),
                OperandKind::Integer => any::<i32>().prop_map(Operand::Integer).boxed(),
                OperandKind::Float => (-1.0e9f32..1.0e9).prop_map(Operand::Float).boxed(),
                OperandKind::Constant => any::<u32>().prop_map(Operand::Constant).boxed(),
                OperandKind::Vector => (-1.0f32..1.0, -1.0f32..1.0, -1.0f32..1.0)
                    .prop_map(|(x, y, z)| Operand::Vector(Vector::new(x, y, z)))
                    .boxed(),
                OperandKind::Rotation => (-1.0f32..1.0, -1.0f32..1.0)
                    .prop_map(|(z, s)| Operand::Rotation(Rotation::new(0.0, 0.0, z, s)))
                    .boxed(),
                OperandKind::Type => tag().prop_map(Operand::Type).boxed(),
                OperandKind::TypePair => (tag(), tag())
                    .prop_map(|(l, r)| Operand::TypePair(l, r))
                    .boxed(),
                OperandKind::Jump => any::<i32>().prop_map(Operand::Jump).boxed(),
                OperandKind::CondJump => (tag(), any::<i32>())
                    .prop_map(|(t, o)| Operand::CondJump(t, o))
                    .boxed(),
                OperandKind::State => any::<u32>().prop_map(Operand::State).boxed(),
                OperandKind::Function => any::<u32>().prop_map(Operand::Function).boxed(),
                OperandKind::Builtin8 => any::<u8>()
                    .prop_map(|id| Operand::Builtin(id as u16))
                    .boxed(),
                OperandKind::Builtin16 => any::<u16>().prop_map(Operand::Builtin).boxed(),
            };
            operand.prop_map(move |operand| Instruction::new(op, operand))
        })
    }

    proptest! {
        /// For all valid instructions, encode then decode produces the original.
        #[test]
        fn encode_decode_roundtrip(instr in arb_instruction()) {
            let bytes = instr.encode();
            let (decoded, len) = Instruction::decode(&bytes, 0).unwrap();
            prop_assert_eq!(decoded, instr);
            prop_assert_eq!(len, bytes.len());
        }

        /// Arbitrary bytes either decode and re-encode identically, or
        /// produce a decode error. Never a panic.
        #[test]
        fn random_bytes_decode(bytes in prop::collection::vec(any::<u8>(), 1..24)) {
            if let Ok((instr, len)) = Instruction::decode(&bytes, 0) {
                prop_assert_eq!(&instr.encode()[..], &bytes[..len]);
            }
        }

        /// Images built from arbitrary constants survive the codec.
        #[test]
        fn image_roundtrip(constants in prop::collection::vec(arb_value(), 0..10)) {
            let image = BytecodeImage { constants, ..BytecodeImage::default() };
            let bytes = image.encode();
            prop_assert_eq!(BytecodeImage::decode(&bytes), Ok(image));
        }

        /// Arbitrary bytes never panic the image decoder.
        #[test]
        fn image_decode_total(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
            let _ = BytecodeImage::decode(&bytes);
        }

        /// Casting any value to string and back to list never panics, and
        /// a string cast of a list equals the concatenation of its items.
        #[test]
        fn list_string_cast(items in prop::collection::vec(arb_scalar(), 0..6)) {
            let joined: String = items.iter().map(Value::to_lsl_string).collect();
            let list = Value::List(items);
            prop_assert_eq!(list.cast(TypeTag::String), Some(Value::String(joined)));
        }
    }
}
