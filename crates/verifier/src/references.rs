//! Reference checking for LSO images.
//!
//! Every global, constant, state and function index named by an operand
//! must exist, and global accesses must use the opcode family of the
//! global's declared type.

use crate::error::VerifyError;
use crate::structural::ImageContext;
use lso_common::{BytecodeImage, Opcode, Operand, TypeTag};

/// Tags an opcode that moves a single slot may touch.
///
/// Returns `None` for opcodes that do not address a typed slot.
pub fn slot_class(opcode: Opcode) -> Option<&'static [TypeTag]> {
    use Opcode::*;
    const NUMERIC: &[TypeTag] = &[TypeTag::Integer, TypeTag::Float];
    const TEXT: &[TypeTag] = &[TypeTag::String, TypeTag::Key];
    match opcode {
        Pop | Dup | Store | StoreG | LoadP | LoadGP | Push | PushG => Some(NUMERIC),
        PopS | DupS | StoreS | StoreGS | LoadSP | LoadGSP | PushS | PushGS => Some(TEXT),
        PopL | DupL | StoreL | StoreGL | LoadLP | LoadGLP | PushL | PushGL => {
            Some(&[TypeTag::List])
        }
        PopV | DupV | StoreV | StoreGV | LoadVP | LoadGVP | PushV | PushGV => {
            Some(&[TypeTag::Vector])
        }
        PopQ | DupQ | StoreQ | StoreGQ | LoadQP | LoadGQP | PushQ | PushGQ => {
            Some(&[TypeTag::Rotation])
        }
        _ => None,
    }
}

/// Run the reference check over every decoded section.
pub fn check_references(image: &BytecodeImage, ctx: &ImageContext) -> Vec<VerifyError> {
    let mut errors = Vec::new();

    for section in &ctx.sections {
        let id = section.id;
        for (at, instr) in &section.instrs {
            let at = *at;
            match instr.operand {
                Operand::Global(index) => match image.globals.get(index as usize) {
                    None => errors.push(VerifyError::GlobalOutOfRange {
                        section: id,
                        at,
                        index,
                    }),
                    Some(global) => {
                        let accepted = slot_class(instr.opcode).unwrap_or(&[]);
                        if !accepted.contains(&global.tag) {
                            errors.push(VerifyError::GlobalTypeMismatch {
                                section: id,
                                at,
                                opcode: instr.opcode,
                                index,
                                found: global.tag,
                            });
                        }
                    }
                },
                Operand::Constant(index) => match image.constants.get(index as usize) {
                    None => errors.push(VerifyError::ConstantOutOfRange {
                        section: id,
                        at,
                        index,
                    }),
                    Some(constant) => {
                        let found = constant.type_tag();
                        if !matches!(found, TypeTag::String | TypeTag::Key) {
                            errors.push(VerifyError::ConstantNotString {
                                section: id,
                                at,
                                index,
                                found,
                            });
                        }
                    }
                },
                Operand::State(index) if index as usize >= image.states.len() => {
                    errors.push(VerifyError::StateOutOfRange {
                        section: id,
                        at,
                        index,
                    });
                }
                Operand::Function(index) if index as usize >= image.functions.len() => {
                    errors.push(VerifyError::FunctionOutOfRange {
                        section: id,
                        at,
                        index,
                    });
                }
                _ => {}
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structural::check_structural;
    use lso_common::{CodeBuilder, Global, SectionId, State, Value};

    fn image_with(code: Vec<u8>) -> BytecodeImage {
        BytecodeImage {
            globals: vec![Global {
                name: "count".into(),
                tag: TypeTag::Integer,
                init: Value::Integer(0),
            }],
            constants: vec![Value::String("hi".into()), Value::List(vec![])],
            states: vec![State {
                name: "default".into(),
                code,
                ..State::default()
            }],
            ..BytecodeImage::default()
        }
    }

    fn run(image: &BytecodeImage) -> Vec<VerifyError> {
        let (ctx, errors) = check_structural(image);
        assert!(errors.is_empty(), "{errors:?}");
        check_references(image, &ctx)
    }

    #[test]
    fn valid_references() {
        let mut b = CodeBuilder::new();
        b.with(Opcode::PushG, Operand::Global(0))
            .with(Opcode::LoadGP, Operand::Global(0))
            .with(Opcode::PushArgS, Operand::Constant(0))
            .op(Opcode::PopS)
            .with(Opcode::State, Operand::State(0));
        assert!(run(&image_with(b.finish().unwrap())).is_empty());
    }

    #[test]
    fn global_out_of_range() {
        let mut b = CodeBuilder::new();
        b.with(Opcode::PushG, Operand::Global(3)).op(Opcode::Return);
        let errors = run(&image_with(b.finish().unwrap()));
        assert_eq!(
            errors,
            vec![VerifyError::GlobalOutOfRange {
                section: SectionId::State(0),
                at: 0,
                index: 3,
            }]
        );
    }

    #[test]
    fn global_accessed_with_wrong_family() {
        let mut b = CodeBuilder::new();
        b.with(Opcode::PushGS, Operand::Global(0)).op(Opcode::Return);
        let errors = run(&image_with(b.finish().unwrap()));
        assert!(errors.iter().any(|e| matches!(
            e,
            VerifyError::GlobalTypeMismatch {
                opcode: Opcode::PushGS,
                found: TypeTag::Integer,
                ..
            }
        )));
    }

    #[test]
    fn constant_checks() {
        let mut b = CodeBuilder::new();
        b.with(Opcode::PushArgS, Operand::Constant(1))
            .with(Opcode::PushArgS, Operand::Constant(9))
            .op(Opcode::Return);
        let errors = run(&image_with(b.finish().unwrap()));
        assert!(errors
            .iter()
            .any(|e| matches!(e, VerifyError::ConstantNotString { index: 1, .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, VerifyError::ConstantOutOfRange { index: 9, .. })));
    }

    #[test]
    fn state_and_function_out_of_range() {
        let mut b = CodeBuilder::new();
        b.with(Opcode::Call, Operand::Function(0))
            .with(Opcode::State, Operand::State(1));
        let errors = run(&image_with(b.finish().unwrap()));
        assert!(errors
            .iter()
            .any(|e| matches!(e, VerifyError::FunctionOutOfRange { index: 0, .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, VerifyError::StateOutOfRange { index: 1, at: 5, .. })));
    }

    #[test]
    fn slot_classes() {
        assert_eq!(
            slot_class(Opcode::StoreS),
            Some(&[TypeTag::String, TypeTag::Key][..])
        );
        assert_eq!(slot_class(Opcode::LoadGQP), Some(&[TypeTag::Rotation][..]));
        assert_eq!(slot_class(Opcode::Add), None);
    }
}
