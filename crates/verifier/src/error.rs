//! Verification errors for the LSO verifier.
//!
//! Code errors carry the section and the byte offset (`at`) of the
//! offending instruction. The verifier collects ALL errors, not just the
//! first.

use lso_common::{DecodeError, EventKind, Opcode, SectionId, TypeTag};
use thiserror::Error;

/// Errors found during load-time verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    // --- Limits ---
    /// Image has no states; there is nothing to run.
    #[error("image has no states")]
    NoStates,

    /// A code section exceeds the maximum size.
    #[error("{section} too large: {size} bytes")]
    SectionTooLarge { section: SectionId, size: usize },

    /// A frame declares more parameters and locals than allowed.
    #[error("{section} declares {count} locals")]
    TooManyLocals { section: SectionId, count: usize },

    // --- Structural ---
    /// Bytes that do not decode to an instruction.
    #[error("{section}: undecodable instruction at byte {at}: {error}")]
    Undecodable {
        section: SectionId,
        at: usize,
        error: DecodeError,
    },

    /// Jump lands outside the section or inside an instruction.
    #[error("{section}: jump at byte {at} to invalid target {target}")]
    InvalidJumpTarget {
        section: SectionId,
        at: usize,
        target: i64,
    },

    /// Instruction writes a VM register directly.
    #[error("{section}: register write {} at byte {at}", .opcode.mnemonic())]
    RegisterWrite {
        section: SectionId,
        at: usize,
        opcode: Opcode,
    },

    /// Execution can run past the last byte of a section.
    #[error("{section}: control falls off the end of the section")]
    FallsOffEnd { section: SectionId },

    /// Handler entry is not an instruction boundary of its state's code.
    #[error("state {state}: {event} handler entry {entry} is not an instruction boundary")]
    InvalidHandlerEntry {
        state: u32,
        event: EventKind,
        entry: u32,
    },

    /// Mask bit set but the state has no handler for the event.
    #[error("state {state}: mask includes {event} but there is no handler")]
    MaskWithoutHandler { state: u32, event: EventKind },

    /// Handler present but its mask bit is clear.
    #[error("state {state}: {event} handler missing from mask")]
    HandlerNotInMask { state: u32, event: EventKind },

    /// Two handlers for the same event in one state.
    #[error("state {state}: duplicate {event} handler")]
    DuplicateHandler { state: u32, event: EventKind },

    /// Mask bits beyond the defined event kinds.
    #[error("state {state}: unknown mask bits {bits:#x}")]
    UnknownMaskBits { state: u32, bits: u64 },

    // --- References ---
    /// Local index beyond the frame of an entry that reaches it.
    #[error("{section}: local {index} at byte {at} out of range (frame has {frame})")]
    LocalOutOfRange {
        section: SectionId,
        at: usize,
        index: u32,
        frame: usize,
    },

    /// Local accessed with an opcode for a different type class.
    #[error("{section}: {} at byte {at} on local {index} of type {found}", .opcode.mnemonic())]
    LocalTypeMismatch {
        section: SectionId,
        at: usize,
        opcode: Opcode,
        index: u32,
        found: TypeTag,
    },

    /// Global index beyond the global table.
    #[error("{section}: global {index} at byte {at} out of range")]
    GlobalOutOfRange {
        section: SectionId,
        at: usize,
        index: u32,
    },

    /// Global accessed with an opcode for a different type class.
    #[error("{section}: {} at byte {at} on global {index} of type {found}", .opcode.mnemonic())]
    GlobalTypeMismatch {
        section: SectionId,
        at: usize,
        opcode: Opcode,
        index: u32,
        found: TypeTag,
    },

    /// Constant index beyond the constant pool.
    #[error("{section}: constant {index} at byte {at} out of range")]
    ConstantOutOfRange {
        section: SectionId,
        at: usize,
        index: u32,
    },

    /// PUSHARGS of a constant that is not a string.
    #[error("{section}: constant {index} at byte {at} is {found}, not a string")]
    ConstantNotString {
        section: SectionId,
        at: usize,
        index: u32,
        found: TypeTag,
    },

    /// STATE to a state that does not exist.
    #[error("{section}: state {index} at byte {at} out of range")]
    StateOutOfRange {
        section: SectionId,
        at: usize,
        index: u32,
    },

    /// CALL to a function that does not exist.
    #[error("{section}: function {index} at byte {at} out of range")]
    FunctionOutOfRange {
        section: SectionId,
        at: usize,
        index: u32,
    },

    // --- Types ---
    /// Global initializer does not have the declared type.
    #[error("global {index}: declared {declared}, initialized with {found}")]
    GlobalInitMismatch {
        index: u32,
        declared: TypeTag,
        found: TypeTag,
    },

    /// Parameter, local or global declared void or null.
    #[error("{section}: slot {index} declared {tag}")]
    InvalidSlotType {
        section: SectionId,
        index: usize,
        tag: TypeTag,
    },

    /// Global declared void or null.
    #[error("global {index} declared {tag}")]
    InvalidGlobalType { index: u32, tag: TypeTag },

    /// Function declared to return null.
    #[error("function {function} declared to return {ret}")]
    InvalidReturnType { function: u32, ret: TypeTag },
}
