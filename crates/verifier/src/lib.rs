//! LSO verifier — load-time static checks for bytecode images.
//!
//! The verifier checks a `BytecodeImage` for well-formedness BEFORE any
//! instance runs it. It collects ALL errors (not just the first) and
//! returns them.
//!
//! # Usage
//!
//! ```
//! use lso_common::{BytecodeImage, CodeBuilder, EventKind, Handler, Opcode, State};
//! use lso_verifier::verify;
//!
//! let mut code = CodeBuilder::new();
//! code.push_int(42).op(Opcode::Pop).op(Opcode::Return);
//!
//! let image = BytecodeImage {
//!     states: vec![State {
//!         name: "default".into(),
//!         mask: [EventKind::StateEntry].into_iter().collect(),
//!         handlers: vec![Handler { event: EventKind::StateEntry, locals: vec![], entry: 0 }],
//!         code: code.finish().unwrap(),
//!     }],
//!     ..BytecodeImage::default()
//! };
//!
//! assert!(verify(&image).is_ok());
//! ```
//!
//! # Passes
//!
//! 1. **Limits** — state count, section size, frame size
//! 2. **Structural** — decoding, jump targets, register writes, section
//!    ends, handler entries, handler/mask agreement
//! 3. **Types** — declared slot and global types
//! 4. **References** — global, constant, state and function indices
//! 5. **Reachability** — local indices and types per entry frame

pub mod error;
pub mod limits;
pub mod reachability;
pub mod references;
pub mod structural;
pub mod types;

pub use error::VerifyError;

use lso_common::BytecodeImage;

/// Verify an image for well-formedness.
///
/// Returns `Ok(())` if the image passes all checks, or
/// `Err(Vec<VerifyError>)` with all errors found.
///
/// If the structural pass finds fatal errors (undecodable code, bad jump
/// targets or handler entries), passes that walk control flow are skipped.
pub fn verify(image: &BytecodeImage) -> Result<(), Vec<VerifyError>> {
    let mut all_errors = Vec::new();

    // Pass 1: Limits (independent)
    all_errors.extend(limits::check_limits(image));

    // Pass 2: Structural (builds ImageContext)
    let (ctx, structural_errors) = structural::check_structural(image);
    all_errors.extend(structural_errors);

    // Pass 3: Types (declarations only)
    all_errors.extend(types::check_types(image));

    // Pass 4: References (whatever decoded)
    all_errors.extend(references::check_references(image, &ctx));

    if !ctx.fatal {
        // Pass 5: Reachability
        all_errors.extend(reachability::check_reachability(image, &ctx));
    }

    if all_errors.is_empty() {
        Ok(())
    } else {
        Err(all_errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lso_common::{
        CodeBuilder, EventKind, EventMask, Function, Handler, Opcode, Operand, SectionId, State,
        TypeTag,
    };

    fn handler(event: EventKind, entry: u32) -> Handler {
        Handler {
            event,
            locals: vec![],
            entry,
        }
    }

    fn single_state(code: Vec<u8>, handlers: Vec<Handler>) -> BytecodeImage {
        let mask: EventMask = handlers.iter().map(|h| h.event).collect();
        BytecodeImage {
            states: vec![State {
                name: "default".into(),
                mask,
                handlers,
                code,
            }],
            ..BytecodeImage::default()
        }
    }

    #[test]
    fn minimal_valid_image() {
        let image = single_state(
            vec![Opcode::Return as u8],
            vec![handler(EventKind::StateEntry, 0)],
        );
        assert!(verify(&image).is_ok());
    }

    #[test]
    fn empty_image() {
        let errors = verify(&BytecodeImage::default()).unwrap_err();
        assert_eq!(errors, vec![VerifyError::NoStates]);
    }

    #[test]
    fn function_call_valid() {
        let mut f = CodeBuilder::new();
        f.with(Opcode::Push, Operand::Local(0))
            .with(Opcode::Push, Operand::Local(1))
            .binary(Opcode::Add, TypeTag::Integer, TypeTag::Integer)
            .op(Opcode::Return);
        let mut s = CodeBuilder::new();
        s.push_int(2)
            .push_int(3)
            .with(Opcode::Call, Operand::Function(0))
            .op(Opcode::Pop)
            .op(Opcode::Return);

        let mut image = single_state(s.finish().unwrap(), vec![handler(EventKind::StateEntry, 0)]);
        image.functions.push(Function {
            name: "add".into(),
            ret: TypeTag::Integer,
            params: vec![TypeTag::Integer, TypeTag::Integer],
            locals: vec![],
            code: f.finish().unwrap(),
        });
        assert!(verify(&image).is_ok());
    }

    #[test]
    fn multiple_errors_collected() {
        let mut b = CodeBuilder::new();
        b.with(Opcode::PushG, Operand::Global(4))
            .op(Opcode::PopBp)
            .op(Opcode::Noop);
        let image = single_state(b.finish().unwrap(), vec![handler(EventKind::StateEntry, 0)]);
        let errors = verify(&image).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, VerifyError::GlobalOutOfRange { .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, VerifyError::RegisterWrite { .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, VerifyError::FallsOffEnd { .. })));
    }

    #[test]
    fn fatal_structure_skips_frame_checks() {
        let mut b = CodeBuilder::new();
        b.with(Opcode::Push, Operand::Local(7))
            .with(Opcode::Jump, Operand::Jump(1000));
        let image = single_state(b.finish().unwrap(), vec![handler(EventKind::StateEntry, 0)]);
        let errors = verify(&image).unwrap_err();
        assert_eq!(
            errors,
            vec![VerifyError::InvalidJumpTarget {
                section: SectionId::State(0),
                at: 5,
                target: 1010,
            }]
        );
    }

    #[test]
    fn local_checked_in_handler() {
        let mut b = CodeBuilder::new();
        b.with(Opcode::PushS, Operand::Local(0)).op(Opcode::Return);
        let image = single_state(b.finish().unwrap(), vec![handler(EventKind::TouchStart, 0)]);
        let errors = verify(&image).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            VerifyError::LocalTypeMismatch {
                opcode: Opcode::PushS,
                found: TypeTag::Integer,
                ..
            }
        )));
    }
}
