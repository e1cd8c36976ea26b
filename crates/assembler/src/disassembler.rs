//! Disassembler: BytecodeImage → canonical LSO assembly text.

use lso_common::instruction::decode_all;
use lso_common::{
    library, BytecodeImage, Handler, Instruction, Key, Operand, Rotation, SectionId, TypeTag,
    Value, Vector,
};

use crate::error::DisasmError;
use crate::lexer::quote;

/// Render an image as assembly text.
///
/// Jumps keep their numeric offsets, so the text reassembles to the same
/// bytes. Global, function and state operands carry the target's name
/// as a comment.
pub(crate) fn disassemble(image: &BytecodeImage) -> Result<String, DisasmError> {
    let mut out = String::new();

    for global in &image.globals {
        out.push_str(&format!(
            ".global {} {} {}\n",
            name_text(&global.name),
            global.tag,
            value_text(&global.init)
        ));
    }
    for constant in &image.constants {
        out.push_str(&format!(".const {}\n", value_text(constant)));
    }

    for (index, function) in image.functions.iter().enumerate() {
        out.push_str(&format!(
            ".function {} {} {}{}\n",
            name_text(&function.name),
            function.ret,
            types_text(&function.params),
            locals_text(&function.locals)
        ));
        section(
            &mut out,
            image,
            SectionId::Function(index as u32),
            &function.code,
            &[],
        )?;
        out.push_str(".end\n");
    }

    for (index, state) in image.states.iter().enumerate() {
        out.push_str(&format!(".state {}\n", name_text(&state.name)));
        section(
            &mut out,
            image,
            SectionId::State(index as u32),
            &state.code,
            &state.handlers,
        )?;
        out.push_str(".end\n");
    }

    Ok(out)
}

/// One code section, with `.handler` lines at their entry offsets.
/// Handlers whose entry is not an instruction boundary are listed after
/// the code.
fn section(
    out: &mut String,
    image: &BytecodeImage,
    id: SectionId,
    code: &[u8],
    handlers: &[Handler],
) -> Result<(), DisasmError> {
    let instrs = decode_all(code).map_err(|error| DisasmError { section: id, error })?;

    for (offset, instr) in &instrs {
        for handler in handlers.iter().filter(|h| h.entry as usize == *offset) {
            out.push_str(&handler_line(handler));
        }
        out.push_str("    ");
        out.push_str(&instruction_text(image, instr));
        out.push('\n');
    }

    let stray = handlers
        .iter()
        .filter(|h| !instrs.iter().any(|(offset, _)| h.entry as usize == *offset));
    for handler in stray {
        out.push_str(&handler_line(handler));
    }
    Ok(())
}

fn handler_line(handler: &Handler) -> String {
    format!(".handler {}{}\n", handler.event, locals_text(&handler.locals))
}

/// Text of one instruction, without indentation.
pub(crate) fn instruction_text(image: &BytecodeImage, instr: &Instruction) -> String {
    let mnemonic = instr.opcode.mnemonic();
    let operand = match instr.operand {
        Operand::None => return mnemonic.to_string(),
        Operand::Count(n) | Operand::Local(n) | Operand::Constant(n) => n.to_string(),
        Operand::Global(n) => match image.globals.get(n as usize) {
            Some(global) => format!("{n} ; {}", name_text(&global.name)),
            None => n.to_string(),
        },
        Operand::Byte(b) => b.to_string(),
        Operand::Integer(i) => i.to_string(),
        Operand::Float(f) => float_text(f),
        Operand::Vector(v) => vector_text(v),
        Operand::Rotation(r) => rotation_text(r),
        Operand::Type(t) => t.to_string(),
        Operand::TypePair(left, right) => format!("{left}, {right}"),
        Operand::Jump(offset) => offset.to_string(),
        Operand::CondJump(tag, offset) => format!("{tag}, {offset}"),
        Operand::State(n) => match image.states.get(n as usize) {
            Some(state) => format!("{n} ; {}", name_text(&state.name)),
            None => n.to_string(),
        },
        Operand::Function(n) => match image.functions.get(n as usize) {
            Some(function) => format!("{n} ; {}", name_text(&function.name)),
            None => n.to_string(),
        },
        Operand::Builtin(id) => match library::lookup(id) {
            Some(sig) => sig.name.to_string(),
            None => id.to_string(),
        },
    };
    format!("{mnemonic} {operand}")
}

/// Bare when the name is a plain identifier, quoted otherwise.
fn name_text(name: &str) -> String {
    let plain = !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    if plain {
        name.to_string()
    } else {
        quote(name)
    }
}

fn types_text(tags: &[TypeTag]) -> String {
    let names: Vec<&str> = tags.iter().map(TypeTag::name).collect();
    format!("({})", names.join(", "))
}

fn locals_text(tags: &[TypeTag]) -> String {
    if tags.is_empty() {
        String::new()
    } else {
        format!(" locals {}", types_text(tags))
    }
}

/// `{:?}` always keeps a `.`, an exponent, `inf` or `NaN`, so floats
/// never read back as integers.
fn float_text(f: f32) -> String {
    format!("{f:?}")
}

fn vector_text(v: Vector) -> String {
    format!(
        "<{}, {}, {}>",
        float_text(v.x),
        float_text(v.y),
        float_text(v.z)
    )
}

fn rotation_text(r: Rotation) -> String {
    format!(
        "<{}, {}, {}, {}>",
        float_text(r.x),
        float_text(r.y),
        float_text(r.z),
        float_text(r.s)
    )
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Void => "void".to_string(),
        Value::Null => "null".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => float_text(*f),
        Value::String(s) => quote(s),
        Value::Key(Key::Uuid(uuid)) => format!("key:{}", uuid.hyphenated()),
        Value::Key(Key::Text(text)) => format!("key:{}", quote(text)),
        Value::Vector(v) => vector_text(*v),
        Value::Rotation(r) => rotation_text(*r),
        Value::List(items) => {
            let items: Vec<String> = items.iter().map(value_text).collect();
            format!("[{}]", items.join(", "))
        }
    }
}
