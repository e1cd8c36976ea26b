//! LSO assembler: text assembly ⇄ [`BytecodeImage`].
//!
//! The text form is line oriented. Directives declare globals, constants,
//! functions and states; instructions are one per line with their
//! operands; jumps take labels or relative offsets.
//!
//! # Usage
//!
//! ```
//! use lso_assembler::{assemble, disassemble};
//!
//! let text = "\
//! .state default
//! .handler state_entry
//!     PUSHARGI 2
//!     PUSHARGI 3
//!     ADD integer, integer
//!     PRINT integer
//!     RETURN
//! .end
//! ";
//! let image = assemble(text).unwrap();
//! assert_eq!(image.states[0].handlers.len(), 1);
//! assert_eq!(disassemble(&image).unwrap(), text);
//! ```
//!
//! # Round trip
//!
//! `assemble(disassemble(image)) == image` holds for images whose
//! handlers are listed in entry order and whose masks name exactly their
//! handlers. The assembler derives both from the source layout.

pub mod error;

mod disassembler;
mod lexer;
mod parser;

pub use error::{AsmError, DisasmError};

use lso_common::BytecodeImage;

/// Assemble text into an image.
///
/// Returns the first error encountered. The image is not verified.
pub fn assemble(text: &str) -> Result<BytecodeImage, AsmError> {
    parser::assemble(text)
}

/// Disassemble an image into canonical assembly text.
///
/// Fails only when a code section does not decode.
pub fn disassemble(image: &BytecodeImage) -> Result<String, DisasmError> {
    disassembler::disassemble(image)
}
