//! Declaration type checking for LSO images.
//!
//! Globals, parameters and locals must have a storable type, global
//! initializers must match their declarations, and functions may not
//! return `null`. Operand stack types are dynamic and checked by the VM.

use crate::error::VerifyError;
use lso_common::{BytecodeImage, SectionId, TypeTag};

/// Whether a slot may be declared with `tag`.
fn storable(tag: TypeTag) -> bool {
    !matches!(tag, TypeTag::Void | TypeTag::Null)
}

/// Run the declaration type check.
pub fn check_types(image: &BytecodeImage) -> Vec<VerifyError> {
    let mut errors = Vec::new();

    for (i, global) in image.globals.iter().enumerate() {
        let index = i as u32;
        if !storable(global.tag) {
            errors.push(VerifyError::InvalidGlobalType {
                index,
                tag: global.tag,
            });
            continue;
        }
        let found = global.init.type_tag();
        if found != global.tag {
            errors.push(VerifyError::GlobalInitMismatch {
                index,
                declared: global.tag,
                found,
            });
        }
    }

    for (i, function) in image.functions.iter().enumerate() {
        let section = SectionId::Function(i as u32);
        if function.ret == TypeTag::Null {
            errors.push(VerifyError::InvalidReturnType {
                function: i as u32,
                ret: function.ret,
            });
        }
        let slots = function.params.iter().chain(&function.locals);
        check_slots(section, slots, &mut errors);
    }

    for (i, state) in image.states.iter().enumerate() {
        let section = SectionId::State(i as u32);
        for handler in &state.handlers {
            let offset = handler.event.signature().len();
            for (j, tag) in handler.locals.iter().enumerate() {
                if !storable(*tag) {
                    errors.push(VerifyError::InvalidSlotType {
                        section,
                        index: offset + j,
                        tag: *tag,
                    });
                }
            }
        }
    }

    errors
}

fn check_slots<'a>(
    section: SectionId,
    slots: impl Iterator<Item = &'a TypeTag>,
    errors: &mut Vec<VerifyError>,
) {
    for (index, tag) in slots.enumerate() {
        if !storable(*tag) {
            errors.push(VerifyError::InvalidSlotType {
                section,
                index,
                tag: *tag,
            });
        }
    }
}
