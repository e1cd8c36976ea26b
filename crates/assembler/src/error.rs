//! Error types for the LSO assembler.

use lso_common::DecodeError;
use thiserror::Error;

/// Errors produced while assembling text into an image. Every variant
/// carries the 1-based line it was found on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AsmError {
    /// An unrecognized opcode mnemonic.
    #[error("line {line}: unknown opcode '{token}'")]
    UnknownOpcode { line: usize, token: String },

    /// An unrecognized directive.
    #[error("line {line}: unknown directive '{token}'")]
    UnknownDirective { line: usize, token: String },

    /// An unrecognized type name.
    #[error("line {line}: unknown type '{token}'")]
    UnknownType { line: usize, token: String },

    /// An unrecognized event name.
    #[error("line {line}: unknown event '{token}'")]
    UnknownEvent { line: usize, token: String },

    /// A built-in name or id not in the library table.
    #[error("line {line}: unknown built-in '{token}'")]
    UnknownBuiltin { line: usize, token: String },

    /// A function or state name that was never declared.
    #[error("line {line}: undefined {kind} '{name}'")]
    UndefinedName {
        line: usize,
        kind: &'static str,
        name: String,
    },

    /// A function or state declared twice.
    #[error("line {line}: {kind} '{name}' declared twice")]
    DuplicateName {
        line: usize,
        kind: &'static str,
        name: String,
    },

    /// A jump to a label not defined in the same section.
    #[error("line {line}: undefined label '{label}'")]
    UndefinedLabel { line: usize, label: String },

    /// A label defined twice in one section.
    #[error("line {line}: label '{label}' defined twice")]
    DuplicateLabel { line: usize, label: String },

    /// An instruction or directive ended early.
    #[error("line {line}: {what} expects {expected}")]
    MissingOperand {
        line: usize,
        what: &'static str,
        expected: &'static str,
    },

    /// A numeric literal could not be parsed or is out of range.
    #[error("line {line}: invalid number '{token}'")]
    InvalidNumber { line: usize, token: String },

    /// A malformed value literal.
    #[error("line {line}: invalid value: {reason}")]
    InvalidValue { line: usize, reason: String },

    /// A global's initial value does not match its declared type.
    #[error("line {line}: global '{name}' declared {declared}, initialized with {found}")]
    GlobalType {
        line: usize,
        name: String,
        declared: lso_common::TypeTag,
        found: lso_common::TypeTag,
    },

    /// A string literal without its closing quote.
    #[error("line {line}: unterminated string")]
    UnterminatedString { line: usize },

    /// An unknown escape sequence inside a string literal.
    #[error("line {line}: invalid escape '\\{escape}'")]
    InvalidEscape { line: usize, escape: String },

    /// A token appeared where it was not expected.
    #[error("line {line}: unexpected token '{token}'")]
    UnexpectedToken { line: usize, token: String },

    /// Code, a label or a handler outside the section that may hold it.
    #[error("line {line}: {what} outside {expected}")]
    Misplaced {
        line: usize,
        what: &'static str,
        expected: &'static str,
    },

    /// A section opened inside another one.
    #[error("line {line}: section opened before the previous one was closed with .end")]
    NestedSection { line: usize },

    /// End of input inside a section.
    #[error("line {line}: section '{name}' is missing .end")]
    UnclosedSection { line: usize, name: String },
}

/// Errors from disassembling an image whose code does not decode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{section}: {error}")]
pub struct DisasmError {
    pub section: lso_common::SectionId,
    pub error: DecodeError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_unknown_opcode() {
        let e = AsmError::UnknownOpcode {
            line: 3,
            token: "FOO".to_string(),
        };
        assert_eq!(e.to_string(), "line 3: unknown opcode 'FOO'");
    }

    #[test]
    fn error_display_missing_operand() {
        let e = AsmError::MissingOperand {
            line: 7,
            what: "PUSH",
            expected: "a local index",
        };
        assert_eq!(e.to_string(), "line 7: PUSH expects a local index");
    }

    #[test]
    fn error_display_invalid_escape() {
        let e = AsmError::InvalidEscape {
            line: 2,
            escape: "q".to_string(),
        };
        assert_eq!(e.to_string(), "line 2: invalid escape '\\q'");
    }

    #[test]
    fn error_display_unclosed_section() {
        let e = AsmError::UnclosedSection {
            line: 9,
            name: "default".to_string(),
        };
        assert_eq!(e.to_string(), "line 9: section 'default' is missing .end");
    }

    #[test]
    fn disasm_error_names_section() {
        let e = DisasmError {
            section: lso_common::SectionId::State(1),
            error: DecodeError::InvalidOpcode(0x0b),
        };
        assert!(e.to_string().starts_with("state 1: "));
    }
}
