//! Limits checking for LSO images.
//!
//! Hard bounds that hold regardless of the VM configuration.

use crate::error::VerifyError;
use lso_common::{BytecodeImage, SectionId};

/// Maximum size of one code section in bytes.
pub const MAX_SECTION_SIZE: usize = 65_536;

/// Maximum parameters plus locals in one frame.
pub const MAX_FRAME_SLOTS: usize = 1_024;

/// Run the limits check.
pub fn check_limits(image: &BytecodeImage) -> Vec<VerifyError> {
    let mut errors = Vec::new();

    if image.states.is_empty() {
        errors.push(VerifyError::NoStates);
    }

    for section in image.sections() {
        let size = image.code(section).map_or(0, <[u8]>::len);
        if size > MAX_SECTION_SIZE {
            errors.push(VerifyError::SectionTooLarge { section, size });
        }
    }

    for (i, function) in image.functions.iter().enumerate() {
        let count = function.params.len() + function.locals.len();
        if count > MAX_FRAME_SLOTS {
            errors.push(VerifyError::TooManyLocals {
                section: SectionId::Function(i as u32),
                count,
            });
        }
    }

    for (i, state) in image.states.iter().enumerate() {
        for handler in &state.handlers {
            let count = handler.event.signature().len() + handler.locals.len();
            if count > MAX_FRAME_SLOTS {
                errors.push(VerifyError::TooManyLocals {
                    section: SectionId::State(i as u32),
                    count,
                });
            }
        }
    }

    errors
}
