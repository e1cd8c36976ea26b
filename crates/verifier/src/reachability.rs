//! Reachability analysis for LSO images.
//!
//! Every function body and every handler is an entry point with its own
//! frame: a function's parameters then locals, or a handler's event
//! parameters then locals. Local operands are checked against the frame
//! of every entry that reaches them. Handlers of one state share the
//! state's code, so an instruction may be reached under several frames.

use std::collections::VecDeque;

use crate::error::VerifyError;
use crate::references::slot_class;
use crate::structural::{DecodedSection, ImageContext};
use lso_common::{BytecodeImage, Operand, SectionId, TypeTag};

/// Run the reachability check.
pub fn check_reachability(image: &BytecodeImage, ctx: &ImageContext) -> Vec<VerifyError> {
    let mut errors = Vec::new();

    for (i, function) in image.functions.iter().enumerate() {
        let Some(section) = ctx.section(SectionId::Function(i as u32)) else {
            continue;
        };
        if section.instrs.is_empty() {
            continue;
        }
        let frame: Vec<TypeTag> = function
            .params
            .iter()
            .chain(&function.locals)
            .copied()
            .collect();
        check_entry(section, 0, &frame, &mut errors);
    }

    for (i, state) in image.states.iter().enumerate() {
        let Some(section) = ctx.section(SectionId::State(i as u32)) else {
            continue;
        };
        for handler in &state.handlers {
            let Some(entry) = section.index_of(handler.entry as usize) else {
                continue;
            };
            let frame: Vec<TypeTag> = handler
                .event
                .signature()
                .iter()
                .chain(&handler.locals)
                .copied()
                .collect();
            check_entry(section, entry, &frame, &mut errors);
        }
    }

    errors
}

/// Instruction indices reachable from `entry`, in visiting order.
pub fn reachable_from(section: &DecodedSection, entry: usize) -> Vec<usize> {
    let mut seen = vec![false; section.instrs.len()];
    let mut order = Vec::new();
    let mut work = VecDeque::from([entry]);
    while let Some(index) = work.pop_front() {
        if index >= seen.len() || seen[index] {
            continue;
        }
        seen[index] = true;
        order.push(index);
        work.extend(section.successors(index));
    }
    order.sort_unstable();
    order
}

fn check_entry(
    section: &DecodedSection,
    entry: usize,
    frame: &[TypeTag],
    errors: &mut Vec<VerifyError>,
) {
    for index in reachable_from(section, entry) {
        let (at, instr) = &section.instrs[index];
        let Operand::Local(local) = instr.operand else {
            continue;
        };
        let error = match frame.get(local as usize) {
            None => VerifyError::LocalOutOfRange {
                section: section.id,
                at: *at,
                index: local,
                frame: frame.len(),
            },
            Some(tag) if !slot_class(instr.opcode).unwrap_or(&[]).contains(tag) => {
                VerifyError::LocalTypeMismatch {
                    section: section.id,
                    at: *at,
                    opcode: instr.opcode,
                    index: local,
                    found: *tag,
                }
            }
            Some(_) => continue,
        };
        // Handlers with identical frames reach the same instructions.
        if !errors.contains(&error) {
            errors.push(error);
        }
    }
}
