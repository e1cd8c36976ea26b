//! Bytecode images.
//!
//! An image is the immutable output of compiling one script: global
//! table, constant pool, user functions and states. Each function and
//! each state owns a code section; handlers are entry offsets into
//! their state's section.
//!
//! Binary layout (all integers big-endian):
//!
//! ```text
//! "LSOB" u16:version
//! u16:n  { str:name u8:tag value }                      globals
//! u16:n  { value }                                      constants
//! u16:n  { str:name u8:ret types:params types:locals
//!          u32:len code }                               functions
//! u16:n  { str:name u64:mask
//!          u8:n { u8:event types:locals u32:entry }
//!          u32:len code }                               states
//! ```
//!
//! `str` is a `u16` length plus UTF-8, `types` a `u16` count plus tag
//! bytes, `value` a tag byte plus payload.

use std::fmt;

use crate::codec::{self, Reader};
use crate::error::DecodeError;
use crate::event::{EventKind, EventMask};
use crate::type_tag::TypeTag;
use crate::value::Value;

/// Leading bytes of every image.
pub const MAGIC: [u8; 4] = *b"LSOB";

/// The only image format version this crate reads and writes.
pub const FORMAT_VERSION: u16 = 1;

/// A global variable slot and its initial value.
#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub name: String,
    pub tag: TypeTag,
    pub init: Value,
}

/// A user-defined function.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Function {
    pub name: String,
    /// `TypeTag::Void` for functions without a result.
    pub ret: TypeTag,
    pub params: Vec<TypeTag>,
    pub locals: Vec<TypeTag>,
    pub code: Vec<u8>,
}

/// An event handler within a state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handler {
    pub event: EventKind,
    /// Locals beyond the event's parameters.
    pub locals: Vec<TypeTag>,
    /// Byte offset into the state's code section.
    pub entry: u32,
}

/// A script state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct State {
    pub name: String,
    pub mask: EventMask,
    pub handlers: Vec<Handler>,
    pub code: Vec<u8>,
}

impl State {
    /// The handler for `event`, if this state has one.
    pub fn handler(&self, event: EventKind) -> Option<&Handler> {
        self.handlers.iter().find(|h| h.event == event)
    }
}

/// Identifies one code section of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionId {
    Function(u32),
    State(u32),
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionId::Function(i) => write!(f, "function {i}"),
            SectionId::State(i) => write!(f, "state {i}"),
        }
    }
}

/// 32-byte content digest of an encoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageDigest(pub [u8; 32]);

impl ImageDigest {
    /// Digest of arbitrary image bytes.
    pub fn of(bytes: &[u8]) -> Self {
        ImageDigest(*blake3::hash(bytes).as_bytes())
    }
}

impl fmt::Display for ImageDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// A compiled script.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BytecodeImage {
    pub globals: Vec<Global>,
    pub constants: Vec<Value>,
    pub functions: Vec<Function>,
    /// State 0 is the initial state.
    pub states: Vec<State>,
}

impl BytecodeImage {
    /// Code of a section, if it exists.
    pub fn code(&self, section: SectionId) -> Option<&[u8]> {
        match section {
            SectionId::Function(i) => self.functions.get(i as usize).map(|f| f.code.as_slice()),
            SectionId::State(i) => self.states.get(i as usize).map(|s| s.code.as_slice()),
        }
    }

    /// Every section id, functions first.
    pub fn sections(&self) -> impl Iterator<Item = SectionId> + '_ {
        let functions = (0..self.functions.len() as u32).map(SectionId::Function);
        let states = (0..self.states.len() as u32).map(SectionId::State);
        functions.chain(states)
    }

    /// Index of the state named `name`.
    pub fn state_index(&self, name: &str) -> Option<u32> {
        self.states
            .iter()
            .position(|s| s.name == name)
            .map(|i| i as u32)
    }

    /// Index of the function named `name`.
    pub fn function_index(&self, name: &str) -> Option<u32> {
        self.functions
            .iter()
            .position(|f| f.name == name)
            .map(|i| i as u32)
    }

    /// blake3 digest of the encoded image.
    pub fn digest(&self) -> ImageDigest {
        ImageDigest::of(&self.encode())
    }

    /// Encode to the binary image format. Tables longer than their count
    /// field allows are truncated.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC);
        codec::put_u16(&mut out, FORMAT_VERSION);

        let count = codec::put_count(&mut out, self.globals.len());
        for global in &self.globals[..count] {
            codec::put_string(&mut out, &global.name);
            out.push(global.tag as u8);
            codec::put_value(&mut out, &global.init);
        }

        let count = codec::put_count(&mut out, self.constants.len());
        for constant in &self.constants[..count] {
            codec::put_value(&mut out, constant);
        }

        let count = codec::put_count(&mut out, self.functions.len());
        for function in &self.functions[..count] {
            codec::put_string(&mut out, &function.name);
            out.push(function.ret as u8);
            codec::put_type_list(&mut out, &function.params);
            codec::put_type_list(&mut out, &function.locals);
            codec::put_u32(&mut out, function.code.len() as u32);
            out.extend_from_slice(&function.code);
        }

        let count = codec::put_count(&mut out, self.states.len());
        for state in &self.states[..count] {
            codec::put_string(&mut out, &state.name);
            codec::put_u64(&mut out, state.mask.0);
            let handlers = state.handlers.len().min(u8::MAX as usize);
            out.push(handlers as u8);
            for handler in &state.handlers[..handlers] {
                out.push(handler.event as u8);
                codec::put_type_list(&mut out, &handler.locals);
                codec::put_u32(&mut out, handler.entry);
            }
            codec::put_u32(&mut out, state.code.len() as u32);
            out.extend_from_slice(&state.code);
        }
        out
    }

    /// Decode an image. Only the container is checked here; code
    /// sections are validated by the verifier.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut r = Reader::new(bytes);

        let mut magic = [0u8; 4];
        magic.copy_from_slice(r.take(4)?);
        if magic != MAGIC {
            return Err(DecodeError::BadMagic(magic));
        }
        let version = r.u16()?;
        if version != FORMAT_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }

        let count = r.u16()?;
        let mut globals = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name = r.string()?;
            let tag = r.type_tag()?;
            let init = r.value()?;
            globals.push(Global { name, tag, init });
        }

        let count = r.u16()?;
        let mut constants = Vec::with_capacity(count as usize);
        for _ in 0..count {
            constants.push(r.value()?);
        }

        let count = r.u16()?;
        let mut functions = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name = r.string()?;
            let ret = r.type_tag()?;
            let params = r.type_list()?;
            let locals = r.type_list()?;
            let len = r.u32()? as usize;
            let code = r.take(len)?.to_vec();
            functions.push(Function {
                name,
                ret,
                params,
                locals,
                code,
            });
        }

        let count = r.u16()?;
        let mut states = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name = r.string()?;
            let mask = EventMask(r.u64()?);
            let handler_count = r.u8()?;
            let mut handlers = Vec::with_capacity(handler_count as usize);
            for _ in 0..handler_count {
                let event = EventKind::try_from(r.u8()?)?;
                let locals = r.type_list()?;
                let entry = r.u32()?;
                handlers.push(Handler {
                    event,
                    locals,
                    entry,
                });
            }
            let len = r.u32()? as usize;
            let code = r.take(len)?.to_vec();
            states.push(State {
                name,
                mask,
                handlers,
                code,
            });
        }

        if r.remaining() > 0 {
            return Err(DecodeError::TrailingBytes(r.remaining()));
        }

        Ok(Self {
            globals,
            constants,
            functions,
            states,
        })
    }
}
