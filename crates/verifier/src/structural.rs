//! Structural validation pass for LSO images.
//!
//! Decodes every code section, checks jump targets, register writes,
//! section ends, handler entries and handler/mask agreement, and builds
//! the [`ImageContext`] used by later passes.

use std::collections::HashMap;

use crate::error::VerifyError;
use lso_common::{BytecodeImage, EventMask, Instruction, Opcode, Operand, SectionId};

/// One decoded code section.
#[derive(Debug, Clone)]
pub struct DecodedSection {
    pub id: SectionId,
    /// Instructions with their byte offsets, in order.
    pub instrs: Vec<(usize, Instruction)>,
    /// Byte offset of each instruction to its index in `instrs`.
    pub boundaries: HashMap<usize, usize>,
    /// Length of the section in bytes.
    pub len: usize,
}

impl DecodedSection {
    /// Index of the instruction starting at `offset`.
    pub fn index_of(&self, offset: usize) -> Option<usize> {
        self.boundaries.get(&offset).copied()
    }

    /// Absolute target of the jump at instruction `index`, if it jumps.
    pub fn jump_target(&self, index: usize) -> Option<i64> {
        let (at, instr) = &self.instrs[index];
        let offset = match instr.operand {
            Operand::Jump(o) | Operand::CondJump(_, o) => o,
            _ => return None,
        };
        Some(*at as i64 + instr.len() as i64 + offset as i64)
    }

    /// Indices of the instructions control can reach next from `index`.
    pub fn successors(&self, index: usize) -> Vec<usize> {
        let (_, instr) = &self.instrs[index];
        let mut next = Vec::with_capacity(2);
        if !instr.opcode.is_terminator() && index + 1 < self.instrs.len() {
            next.push(index + 1);
        }
        if let Some(target) = self.jump_target(index) {
            if let Some(i) = usize::try_from(target).ok().and_then(|t| self.index_of(t)) {
                next.push(i);
            }
        }
        next
    }
}

/// Context built from the structural pass, consumed by later passes.
#[derive(Debug, Clone)]
pub struct ImageContext {
    /// Functions first, then states, matching [`BytecodeImage::sections`].
    pub sections: Vec<DecodedSection>,
    /// Whether a fatal structural error occurred (callers should skip later passes).
    pub fatal: bool,
}

impl ImageContext {
    /// The decoded section with id `id`.
    pub fn section(&self, id: SectionId) -> Option<&DecodedSection> {
        self.sections.iter().find(|s| s.id == id)
    }
}

/// Run the structural validation pass.
///
/// Returns the ImageContext and any errors found.
pub fn check_structural(image: &BytecodeImage) -> (ImageContext, Vec<VerifyError>) {
    let mut errors = Vec::new();
    let mut sections = Vec::new();
    let mut fatal = false;

    for id in image.sections() {
        let code = image.code(id).unwrap_or_default();
        match decode_section(id, code) {
            Ok(section) => {
                let before = errors.len();
                check_section(&section, &mut errors);
                fatal |= errors.len() > before;
                sections.push(section);
            }
            Err(error) => {
                errors.push(error);
                fatal = true;
            }
        }
    }

    for (i, state) in image.states.iter().enumerate() {
        let state_index = i as u32;
        let section = sections.iter().find(|s| s.id == SectionId::State(state_index));
        let mut seen = EventMask::EMPTY;

        for handler in &state.handlers {
            if seen.contains(handler.event) {
                errors.push(VerifyError::DuplicateHandler {
                    state: state_index,
                    event: handler.event,
                });
                fatal = true;
            }
            seen.insert(handler.event);

            if !state.mask.contains(handler.event) {
                errors.push(VerifyError::HandlerNotInMask {
                    state: state_index,
                    event: handler.event,
                });
            }

            // An undecodable section has already been reported.
            if let Some(section) = section {
                if section.index_of(handler.entry as usize).is_none() {
                    errors.push(VerifyError::InvalidHandlerEntry {
                        state: state_index,
                        event: handler.event,
                        entry: handler.entry,
                    });
                    fatal = true;
                }
            }
        }

        for event in state.mask.kinds() {
            if !seen.contains(event) {
                errors.push(VerifyError::MaskWithoutHandler {
                    state: state_index,
                    event,
                });
            }
        }

        let bits = state.mask.unknown_bits();
        if bits != 0 {
            errors.push(VerifyError::UnknownMaskBits {
                state: state_index,
                bits,
            });
        }
    }

    (ImageContext { sections, fatal }, errors)
}

fn decode_section(id: SectionId, code: &[u8]) -> Result<DecodedSection, VerifyError> {
    let mut instrs = Vec::new();
    let mut boundaries = HashMap::new();
    let mut at = 0;
    while at < code.len() {
        let (instr, len) = Instruction::decode(code, at).map_err(|error| {
            VerifyError::Undecodable {
                section: id,
                at,
                error,
            }
        })?;
        boundaries.insert(at, instrs.len());
        instrs.push((at, instr));
        at += len;
    }
    Ok(DecodedSection {
        id,
        instrs,
        boundaries,
        len: code.len(),
    })
}

fn check_section(section: &DecodedSection, errors: &mut Vec<VerifyError>) {
    let id = section.id;

    for (index, (at, instr)) in section.instrs.iter().enumerate() {
        if matches!(
            instr.opcode,
            Opcode::PopIp | Opcode::PopBp | Opcode::PopSp | Opcode::PopSlr
        ) {
            errors.push(VerifyError::RegisterWrite {
                section: id,
                at: *at,
                opcode: instr.opcode,
            });
        }

        if let Some(target) = section.jump_target(index) {
            let lands = usize::try_from(target)
                .ok()
                .and_then(|t| section.index_of(t))
                .is_some();
            if !lands {
                errors.push(VerifyError::InvalidJumpTarget {
                    section: id,
                    at: *at,
                    target,
                });
            }
        }
    }

    // State sections without handlers may be empty; function bodies may not.
    let falls_off = match section.instrs.last() {
        Some((_, last)) => !last.opcode.is_terminator(),
        None => matches!(id, SectionId::Function(_)),
    };
    if falls_off {
        errors.push(VerifyError::FallsOffEnd { section: id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lso_common::{CodeBuilder, DecodeError, EventKind, Function, Handler, State, TypeTag};

    fn state_with(code: Vec<u8>, handlers: Vec<Handler>, mask: EventMask) -> BytecodeImage {
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

    fn entry_handler(entry: u32) -> Handler {
        Handler {
            event: EventKind::StateEntry,
            locals: vec![],
            entry,
        }
    }

    fn mask_of(kinds: &[EventKind]) -> EventMask {
        kinds.iter().copied().collect()
    }

    #[test]
    fn valid_state_builds_context() {
        let mut b = CodeBuilder::new();
        b.push_int(1).op(Opcode::Pop).op(Opcode::Return);
        let image = state_with(
            b.finish().unwrap(),
            vec![entry_handler(0)],
            mask_of(&[EventKind::StateEntry]),
        );
        let (ctx, errors) = check_structural(&image);
        assert!(errors.is_empty(), "{errors:?}");
        assert!(!ctx.fatal);
        let section = ctx.section(SectionId::State(0)).unwrap();
        assert_eq!(section.instrs.len(), 3);
        assert_eq!(section.index_of(5), Some(1));
        assert_eq!(section.index_of(4), None);
    }

    #[test]
    fn undecodable_byte() {
        let image = state_with(
            vec![Opcode::Noop as u8, 0x0b],
            vec![],
            EventMask::EMPTY,
        );
        let (ctx, errors) = check_structural(&image);
        assert!(ctx.fatal);
        assert_eq!(
            errors,
            vec![VerifyError::Undecodable {
                section: SectionId::State(0),
                at: 1,
                error: DecodeError::InvalidOpcode(0x0b),
            }]
        );
    }

    #[test]
    fn jump_beyond_section() {
        let mut b = CodeBuilder::new();
        b.with(Opcode::Jump, Operand::Jump(100));
        let image = state_with(
            b.finish().unwrap(),
            vec![entry_handler(0)],
            mask_of(&[EventKind::StateEntry]),
        );
        let (ctx, errors) = check_structural(&image);
        assert!(ctx.fatal);
        assert!(errors.iter().any(|e| matches!(
            e,
            VerifyError::InvalidJumpTarget {
                at: 0,
                target: 105,
                ..
            }
        )));
    }

    #[test]
    fn jump_into_instruction() {
        let mut b = CodeBuilder::new();
        b.push_int(7)
            .with(Opcode::Jump, Operand::Jump(-8))
            .op(Opcode::Return);
        let image = state_with(
            b.finish().unwrap(),
            vec![entry_handler(0)],
            mask_of(&[EventKind::StateEntry]),
        );
        let (_, errors) = check_structural(&image);
        assert!(errors.iter().any(|e| matches!(
            e,
            VerifyError::InvalidJumpTarget { target: 2, .. }
        )));
    }

    #[test]
    fn jump_to_section_end_rejected() {
        let mut b = CodeBuilder::new();
        b.jump_if(Opcode::JumpIf, TypeTag::Integer, "end")
            .op(Opcode::Return);
        b.label("end").unwrap();
        let mut image = state_with(vec![], vec![], EventMask::EMPTY);
        image.functions.push(Function {
            code: b.finish().unwrap(),
            ..Function::default()
        });
        let (_, errors) = check_structural(&image);
        assert!(errors
            .iter()
            .any(|e| matches!(e, VerifyError::InvalidJumpTarget { target: 7, .. })));
    }

    #[test]
    fn register_write_rejected() {
        let image = state_with(
            vec![Opcode::PopSp as u8, Opcode::Return as u8],
            vec![entry_handler(0)],
            mask_of(&[EventKind::StateEntry]),
        );
        let (_, errors) = check_structural(&image);
        assert!(errors.iter().any(|e| matches!(
            e,
            VerifyError::RegisterWrite {
                opcode: Opcode::PopSp,
                ..
            }
        )));
    }

    #[test]
    fn falls_off_end() {
        let mut image = state_with(vec![], vec![], EventMask::EMPTY);
        image.functions.push(Function {
            code: vec![Opcode::Noop as u8],
            ..Function::default()
        });
        image.functions.push(Function::default());
        let (_, errors) = check_structural(&image);
        assert!(errors.contains(&VerifyError::FallsOffEnd {
            section: SectionId::Function(0)
        }));
        assert!(errors.contains(&VerifyError::FallsOffEnd {
            section: SectionId::Function(1)
        }));
        // The empty handler-less state is fine.
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn handler_entry_off_boundary() {
        let mut b = CodeBuilder::new();
        b.push_int(1).op(Opcode::Pop).op(Opcode::Return);
        let image = state_with(
            b.finish().unwrap(),
            vec![entry_handler(2)],
            mask_of(&[EventKind::StateEntry]),
        );
        let (ctx, errors) = check_structural(&image);
        assert!(ctx.fatal);
        assert!(errors.contains(&VerifyError::InvalidHandlerEntry {
            state: 0,
            event: EventKind::StateEntry,
            entry: 2,
        }));
    }

    #[test]
    fn mask_and_handlers_disagree() {
        let touch = Handler {
            event: EventKind::TouchStart,
            locals: vec![],
            entry: 0,
        };
        let image = state_with(
            vec![Opcode::Return as u8],
            vec![touch.clone(), touch],
            mask_of(&[EventKind::Timer]),
        );
        let (_, errors) = check_structural(&image);
        assert!(errors.contains(&VerifyError::DuplicateHandler {
            state: 0,
            event: EventKind::TouchStart,
        }));
        assert!(errors.contains(&VerifyError::HandlerNotInMask {
            state: 0,
            event: EventKind::TouchStart,
        }));
        assert!(errors.contains(&VerifyError::MaskWithoutHandler {
            state: 0,
            event: EventKind::Timer,
        }));
    }

    #[test]
    fn unknown_mask_bits() {
        let image = state_with(vec![], vec![], EventMask(1 << 50));
        let (_, errors) = check_structural(&image);
        assert_eq!(
            errors,
            vec![VerifyError::UnknownMaskBits {
                state: 0,
                bits: 1 << 50,
            }]
        );
    }
}
