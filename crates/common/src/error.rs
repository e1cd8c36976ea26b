//! Decode errors for LSO bytecode images and instruction streams.

use thiserror::Error;

/// Errors that occur while decoding an image or an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Image does not start with the `LSOB` magic.
    #[error("bad image magic: {0:02x?}")]
    BadMagic([u8; 4]),

    /// Image format version is not one this decoder understands.
    #[error("unsupported image version {0}")]
    UnsupportedVersion(u16),

    /// Input ended before a complete item could be read.
    #[error("unexpected end of data at byte {at} (needed {needed} more)")]
    Truncated { at: usize, needed: usize },

    /// Opcode byte is not assigned in the LSO operation table.
    #[error("invalid opcode: {0:#04x}")]
    InvalidOpcode(u8),

    /// Type tag outside 0x00-0x08.
    #[error("invalid type tag: {0:#04x}")]
    InvalidTypeTag(u8),

    /// Event kind outside 0-32.
    #[error("invalid event kind: {0}")]
    InvalidEventKind(u8),

    /// A string field is not valid UTF-8.
    #[error("invalid UTF-8 in string at byte {at}")]
    InvalidUtf8 { at: usize },

    /// A list constant contains another list.
    #[error("nested list at byte {at}")]
    NestedList { at: usize },

    /// Bytes remain after the last state section.
    #[error("{0} trailing bytes after image")]
    TrailingBytes(usize),
}
