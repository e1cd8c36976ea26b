//! Errors for the LSO VM.
//!
//! [`Fault`] is what a running instance can hit; it never escapes the
//! instance and is reported as a [`FaultReport`] carrying the code
//! location and state. The remaining enums cover loading images, building
//! events, configuring the VM and binding built-ins.

use lso_common::{DecodeError, EventKind, Opcode, SectionId, TypeTag};
use lso_verifier::VerifyError;
use thiserror::Error;

/// Runtime faults. Each one stops the current handler and moves the
/// instance to `Faulted`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    /// Push beyond the configured stack capacity.
    #[error("stack overflow")]
    StackOverflow,

    /// Pop, or frame access, below the bottom of the stack.
    #[error("stack underflow")]
    StackUnderflow,

    /// CALL beyond the configured call depth.
    #[error("call stack overflow")]
    CallStackOverflow,

    /// A slot did not carry the tag the instruction requires.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: TypeTag, found: TypeTag },

    /// Operator applied to a pair of types it does not define.
    #[error("{} not defined for {left} and {right}", .opcode.mnemonic())]
    InvalidOperands {
        opcode: Opcode,
        left: TypeTag,
        right: TypeTag,
    },

    /// Integer or float division (or modulo) by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Jump outside the current code section.
    #[error("jump to invalid target {target}")]
    InvalidJumpTarget { target: i64 },

    /// Unassigned opcode byte.
    #[error("invalid opcode {0:#04x}")]
    InvalidOpcode(u8),

    /// Other undecodable instruction bytes.
    #[error("malformed instruction: {0}")]
    Malformed(DecodeError),

    /// Built-in id outside the library table.
    #[error("unknown built-in {0}")]
    UnknownBuiltin(u16),

    /// Built-in in the table but not bound by the host.
    #[error("built-in {name} ({id}) is not bound")]
    UnboundBuiltin { id: u16, name: &'static str },

    /// Argument tag does not match the built-in's signature.
    #[error("{name}: argument {index} expected {expected}, found {found}")]
    BuiltinArgMismatch {
        name: &'static str,
        index: usize,
        expected: TypeTag,
        found: TypeTag,
    },

    /// The host implementation returned an error.
    #[error("{name} failed: {message}")]
    BuiltinFailed { name: &'static str, message: String },

    /// Allocation does not fit even after a collection.
    #[error("heap exhausted: {requested} bytes requested, limit {limit}")]
    HeapExhausted { requested: usize, limit: usize },

    /// CAST between types with no defined conversion.
    #[error("invalid cast from {from} to {to}")]
    InvalidCast { from: TypeTag, to: TypeTag },

    /// Execution ran past the end of a code section.
    #[error("unexpected end of code")]
    UnexpectedEndOfCode,

    /// Opcode the VM refuses to execute (register writes).
    #[error("unsupported opcode {}", .0.mnemonic())]
    UnsupportedOpcode(Opcode),

    /// Operand names a local, global, constant, function, state or heap
    /// object that does not exist.
    #[error("{what} {index} does not exist")]
    BadReference { what: &'static str, index: u32 },
}

impl From<DecodeError> for Fault {
    fn from(error: DecodeError) -> Self {
        match error {
            DecodeError::InvalidOpcode(byte) => Fault::InvalidOpcode(byte),
            DecodeError::Truncated { .. } => Fault::UnexpectedEndOfCode,
            other => Fault::Malformed(other),
        }
    }
}

/// A fault together with where it happened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{fault} at {section} offset {offset} in state '{state}'")]
pub struct FaultReport {
    pub fault: Fault,
    pub section: SectionId,
    /// Byte offset of the faulting instruction.
    pub offset: usize,
    /// Name of the state the instance was in.
    pub state: String,
}

/// Errors from loading an image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("verification failed with {} error(s)", .0.len())]
    Verify(Vec<VerifyError>),
}

/// Errors from building an event record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("{event} takes {expected} parameter(s), got {found}")]
    Arity {
        event: EventKind,
        expected: usize,
        found: usize,
    },

    #[error("{event} parameter {index}: expected {expected}, found {found}")]
    ParamType {
        event: EventKind,
        index: usize,
        expected: TypeTag,
        found: TypeTag,
    },
}

/// Error returned by a host built-in implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuiltinError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Math(#[from] lso_common::library::math::MathError),
}

/// Errors from binding a built-in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    #[error("built-in id {0} is not in the library table")]
    UnknownId(u16),

    #[error("no built-in named '{0}'")]
    UnknownName(String),
}

/// Invalid VM configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_display_formats() {
        assert_eq!(Fault::DivisionByZero.to_string(), "division by zero");
        assert_eq!(Fault::UnknownBuiltin(400).to_string(), "unknown built-in 400");
        assert_eq!(
            Fault::UnsupportedOpcode(Opcode::PopIp).to_string(),
            "unsupported opcode POPIP"
        );
        assert_eq!(
            Fault::TypeMismatch {
                expected: TypeTag::Integer,
                found: TypeTag::String,
            }
            .to_string(),
            "type mismatch: expected integer, found string"
        );
    }

    #[test]
    fn report_display_names_location() {
        let report = FaultReport {
            fault: Fault::StackUnderflow,
            section: SectionId::Function(1),
            offset: 12,
            state: "default".into(),
        };
        assert_eq!(
            report.to_string(),
            "stack underflow at function 1 offset 12 in state 'default'"
        );
    }

    #[test]
    fn decode_errors_map_to_faults() {
        assert_eq!(
            Fault::from(DecodeError::InvalidOpcode(0x0b)),
            Fault::InvalidOpcode(0x0b)
        );
        assert_eq!(
            Fault::from(DecodeError::Truncated { at: 3, needed: 4 }),
            Fault::UnexpectedEndOfCode
        );
        assert!(matches!(
            Fault::from(DecodeError::InvalidTypeTag(12)),
            Fault::Malformed(_)
        ));
    }
}
