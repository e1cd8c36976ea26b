//! Parser for LSO assembly: directives, labels and instructions.
//!
//! Assembly is two passes over the tokenized lines. The first collects
//! global, function and state names so that operands may refer to them
//! before their declaration; the second builds each section with a
//! [`CodeBuilder`].

use std::collections::HashMap;

use lso_common::{
    library, BuildError, BytecodeImage, CodeBuilder, EventKind, Function, Global, Handler,
    Instruction, Key, Opcode, Operand, OperandKind, Rotation, State, TypeTag, Value, Vector,
};

use crate::error::AsmError;
use crate::lexer::{tokenize_line, Token};

/// Token cursor over one line.
struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
    line: usize,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [Token], line: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            line,
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn expect(&mut self, what: &'static str, expected: &'static str) -> Result<&'a Token, AsmError> {
        self.next().ok_or(AsmError::MissingOperand {
            line: self.line,
            what,
            expected,
        })
    }

    /// A bare word.
    fn word(&mut self, what: &'static str, expected: &'static str) -> Result<&'a str, AsmError> {
        match self.expect(what, expected)? {
            Token::Word(w) => Ok(w),
            other => Err(self.unexpected(other)),
        }
    }

    /// A bare word or a quoted string.
    fn name(&mut self, what: &'static str, expected: &'static str) -> Result<&'a str, AsmError> {
        match self.expect(what, expected)? {
            Token::Word(w) | Token::Str(w) => Ok(w),
            other => Err(self.unexpected(other)),
        }
    }

    /// Consume `c` if it is next.
    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(&Token::Punct(c)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn punct(&mut self, c: char, what: &'static str, expected: &'static str) -> Result<(), AsmError> {
        match self.expect(what, expected)? {
            Token::Punct(p) if *p == c => Ok(()),
            other => Err(self.unexpected(other)),
        }
    }

    fn unexpected(&self, token: &Token) -> AsmError {
        AsmError::UnexpectedToken {
            line: self.line,
            token: token.text(),
        }
    }

    fn invalid_number(&self, token: &str) -> AsmError {
        AsmError::InvalidNumber {
            line: self.line,
            token: token.to_string(),
        }
    }

    /// Fail if anything is left on the line.
    fn finish(&self) -> Result<(), AsmError> {
        match self.peek() {
            Some(token) => Err(self.unexpected(token)),
            None => Ok(()),
        }
    }
}

// ============================================================
// Numbers and literals
// ============================================================

/// Decimal or `0x` hex, with an optional leading minus.
pub(crate) fn parse_int(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) if !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()) => {
            i64::from_str_radix(hex, 16).ok()?
        }
        Some(_) => return None,
        None if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            digits.parse::<i64>().ok()?
        }
        None => return None,
    };
    Some(if negative { -magnitude } else { magnitude })
}

/// An `i32`, also accepting the unsigned spelling of negative values
/// (`0xffffffff` is -1).
fn to_i32(n: i64) -> Option<i32> {
    i32::try_from(n)
        .ok()
        .or_else(|| u32::try_from(n).ok().map(|u| u as i32))
}

fn parse_float(text: &str) -> Option<f32> {
    match parse_int(text) {
        Some(n) => Some(n as f32),
        None => text.parse::<f32>().ok(),
    }
}

fn number_value(cur: &Cursor<'_>, text: &str) -> Result<Value, AsmError> {
    if let Some(n) = parse_int(text) {
        return to_i32(n)
            .map(Value::Integer)
            .ok_or_else(|| cur.invalid_number(text));
    }
    text.parse::<f32>()
        .map(Value::Float)
        .map_err(|_| cur.invalid_number(text))
}

fn float_operand(cur: &mut Cursor<'_>, what: &'static str) -> Result<f32, AsmError> {
    let token = cur.word(what, "a float")?;
    parse_float(token).ok_or_else(|| cur.invalid_number(token))
}

fn u32_operand(
    cur: &mut Cursor<'_>,
    what: &'static str,
    expected: &'static str,
) -> Result<u32, AsmError> {
    let token = cur.word(what, expected)?;
    parse_int(token)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| cur.invalid_number(token))
}

/// Components of `<x, y, z>` or `<x, y, z, s>`; the `<` is consumed.
fn components(cur: &mut Cursor<'_>) -> Result<Vec<f32>, AsmError> {
    let mut out = Vec::new();
    loop {
        out.push(float_operand(cur, "vector literal")?);
        if cur.eat('>') {
            break;
        }
        cur.punct(',', "vector literal", "',' or '>'")?;
    }
    Ok(out)
}

fn vector_literal(cur: &mut Cursor<'_>) -> Result<Vector, AsmError> {
    match components(cur)?[..] {
        [x, y, z] => Ok(Vector::new(x, y, z)),
        _ => Err(AsmError::InvalidValue {
            line: cur.line,
            reason: "a vector has 3 components".to_string(),
        }),
    }
}

fn rotation_literal(cur: &mut Cursor<'_>) -> Result<Rotation, AsmError> {
    match components(cur)?[..] {
        [x, y, z, s] => Ok(Rotation::new(x, y, z, s)),
        _ => Err(AsmError::InvalidValue {
            line: cur.line,
            reason: "a rotation has 4 components".to_string(),
        }),
    }
}

/// Any value literal, lists included.
fn value(cur: &mut Cursor<'_>) -> Result<Value, AsmError> {
    if !cur.eat('[') {
        return scalar(cur);
    }
    let mut items = Vec::new();
    if cur.eat(']') {
        return Ok(Value::List(items));
    }
    loop {
        if cur.peek() == Some(&Token::Punct('[')) {
            return Err(AsmError::InvalidValue {
                line: cur.line,
                reason: "lists cannot contain lists".to_string(),
            });
        }
        items.push(scalar(cur)?);
        if cur.eat(']') {
            return Ok(Value::List(items));
        }
        cur.punct(',', "list literal", "',' or ']'")?;
    }
}

fn scalar(cur: &mut Cursor<'_>) -> Result<Value, AsmError> {
    match cur.expect("value", "a literal")? {
        Token::Str(s) => Ok(Value::String(s.clone())),
        Token::Punct('<') => match components(cur)?[..] {
            [x, y, z] => Ok(Value::Vector(Vector::new(x, y, z))),
            [x, y, z, s] => Ok(Value::Rotation(Rotation::new(x, y, z, s))),
            _ => Err(AsmError::InvalidValue {
                line: cur.line,
                reason: "vector literals take 3 or 4 components".to_string(),
            }),
        },
        Token::Word(w) => {
            if w.eq_ignore_ascii_case("void") {
                return Ok(Value::Void);
            }
            if w.eq_ignore_ascii_case("null") {
                return Ok(Value::Null);
            }
            if let Some(rest) = w.strip_prefix("key:") {
                if !rest.is_empty() {
                    return Ok(Value::Key(Key::parse(rest)));
                }
                return match cur.expect("key literal", "a uuid or quoted text")? {
                    Token::Str(text) => Ok(Value::Key(Key::parse(text))),
                    other => Err(cur.unexpected(other)),
                };
            }
            number_value(cur, w)
        }
        other => Err(cur.unexpected(other)),
    }
}

fn type_name(cur: &mut Cursor<'_>, what: &'static str) -> Result<TypeTag, AsmError> {
    let token = cur.word(what, "a type")?;
    TypeTag::from_name(&token.to_ascii_lowercase()).ok_or_else(|| AsmError::UnknownType {
        line: cur.line,
        token: token.to_string(),
    })
}

/// `(type, type, ...)`, possibly empty.
fn type_list(cur: &mut Cursor<'_>, what: &'static str) -> Result<Vec<TypeTag>, AsmError> {
    cur.punct('(', what, "a parenthesized type list")?;
    let mut out = Vec::new();
    if cur.eat(')') {
        return Ok(out);
    }
    loop {
        out.push(type_name(cur, what)?);
        if cur.eat(')') {
            return Ok(out);
        }
        cur.punct(',', what, "',' or ')'")?;
    }
}

/// Optional trailing `locals (types)`.
fn locals_clause(cur: &mut Cursor<'_>, what: &'static str) -> Result<Vec<TypeTag>, AsmError> {
    if cur.at_end() {
        return Ok(Vec::new());
    }
    let keyword = cur.word(what, "'locals'")?;
    if !keyword.eq_ignore_ascii_case("locals") {
        return Err(AsmError::UnexpectedToken {
            line: cur.line,
            token: keyword.to_string(),
        });
    }
    type_list(cur, what)
}

/// Coerce a global's initializer to its declared type.
fn coerce(value: Value, tag: TypeTag) -> Result<Value, TypeTag> {
    match (value, tag) {
        (Value::Integer(i), TypeTag::Float) => Ok(Value::Float(i as f32)),
        (Value::String(s), TypeTag::Key) => Ok(Value::Key(Key::parse(&s))),
        (v, t) if v.type_tag() == t => Ok(v),
        (v, _) => Err(v.type_tag()),
    }
}

/// Index of a string constant, adding it to the pool if absent.
fn intern(constants: &mut Vec<Value>, text: &str) -> u32 {
    let value = Value::String(text.to_string());
    match constants.iter().position(|c| *c == value) {
        Some(index) => index as u32,
        None => {
            constants.push(value);
            (constants.len() - 1) as u32
        }
    }
}

/// A global, function or state reference: a name, or an index as a
/// bare number.
fn target(
    cur: &mut Cursor<'_>,
    names: &[String],
    what: &'static str,
    kind: &'static str,
) -> Result<u32, AsmError> {
    let token = cur.expect(what, "a name or index")?;
    let name = match token {
        Token::Word(w) => {
            if let Some(n) = parse_int(w) {
                return u32::try_from(n).map_err(|_| cur.invalid_number(w));
            }
            w
        }
        Token::Str(s) => s,
        other => return Err(cur.unexpected(other)),
    };
    names
        .iter()
        .position(|n| n == name)
        .map(|i| i as u32)
        .ok_or_else(|| AsmError::UndefinedName {
            line: cur.line,
            kind,
            name: name.clone(),
        })
}

fn builtin(cur: &mut Cursor<'_>, opcode: Opcode) -> Result<u16, AsmError> {
    let what = opcode.mnemonic();
    let token = cur.word(what, "a built-in name or id")?;
    let id = match parse_int(token) {
        Some(n) => u16::try_from(n).map_err(|_| cur.invalid_number(token))?,
        None => {
            library::by_name(token)
                .ok_or_else(|| AsmError::UnknownBuiltin {
                    line: cur.line,
                    token: token.to_string(),
                })?
                .id
        }
    };
    if opcode == Opcode::CallLib && id > u8::MAX as u16 {
        return Err(AsmError::InvalidValue {
            line: cur.line,
            reason: format!("built-in {id} needs CALLLIB_TWO_BYTE"),
        });
    }
    Ok(id)
}

// ============================================================
// Sections
// ============================================================

#[derive(Debug, Clone, Copy)]
enum SectionKind {
    Function(usize),
    State(usize),
}

/// The section between a `.function`/`.state` line and its `.end`.
struct OpenSection {
    kind: SectionKind,
    name: String,
    line: usize,
    code: CodeBuilder,
    /// First line each label is jumped to from.
    label_uses: HashMap<String, usize>,
    handlers: Vec<Handler>,
}

impl OpenSection {
    fn new(kind: SectionKind, name: String, line: usize) -> Self {
        Self {
            kind,
            name,
            line,
            code: CodeBuilder::new(),
            label_uses: HashMap::new(),
            handlers: Vec::new(),
        }
    }
}

/// What an instruction line appends to its section.
enum Emit {
    Instruction(Instruction),
    Jump(String),
    JumpIf(Opcode, TypeTag, String),
}

struct Assembler {
    image: BytecodeImage,
    globals: Vec<String>,
    functions: Vec<String>,
    states: Vec<String>,
    section: Option<OpenSection>,
}

/// Assemble a whole source text. Returns the first error.
pub(crate) fn assemble(text: &str) -> Result<BytecodeImage, AsmError> {
    let mut lines = Vec::new();
    let mut last_line = 0;
    for (idx, line) in text.lines().enumerate() {
        last_line = idx + 1;
        let tokens = tokenize_line(line, last_line)?;
        if !tokens.is_empty() {
            lines.push((last_line, tokens));
        }
    }

    let mut asm = Assembler::declare(&lines)?;
    for (line, tokens) in &lines {
        asm.line(&mut Cursor::new(tokens, *line))?;
    }
    asm.finish()
}

impl Assembler {
    /// First pass: collect global, function and state names in order.
    fn declare(lines: &[(usize, Vec<Token>)]) -> Result<Self, AsmError> {
        let mut globals: Vec<String> = Vec::new();
        let mut functions: Vec<String> = Vec::new();
        let mut states: Vec<String> = Vec::new();
        for (line, tokens) in lines {
            let (names, kind) = match tokens.first() {
                Some(Token::Word(d)) if d.eq_ignore_ascii_case(".global") => (&mut globals, "global"),
                Some(Token::Word(d)) if d.eq_ignore_ascii_case(".function") => {
                    (&mut functions, "function")
                }
                Some(Token::Word(d)) if d.eq_ignore_ascii_case(".state") => (&mut states, "state"),
                _ => continue,
            };
            // A missing name is reported by the second pass.
            let name = match tokens.get(1) {
                Some(Token::Word(n) | Token::Str(n)) => n,
                _ => continue,
            };
            if names.contains(name) {
                return Err(AsmError::DuplicateName {
                    line: *line,
                    kind,
                    name: name.clone(),
                });
            }
            names.push(name.clone());
        }
        Ok(Self {
            image: BytecodeImage::default(),
            globals,
            functions,
            states,
            section: None,
        })
    }

    fn line(&mut self, cur: &mut Cursor<'_>) -> Result<(), AsmError> {
        let first = cur.word("line", "a directive, label or instruction")?;
        if let Some(directive) = first.strip_prefix('.') {
            return self.directive(&directive.to_ascii_lowercase(), first, cur);
        }
        if let Some(label) = first.strip_suffix(':') {
            let line = cur.line;
            let section = self.section.as_mut().ok_or(AsmError::Misplaced {
                line,
                what: "label",
                expected: "a section",
            })?;
            section
                .code
                .label(label)
                .map_err(|_| AsmError::DuplicateLabel {
                    line,
                    label: label.to_string(),
                })?;
            return match cur.next() {
                None => Ok(()),
                Some(Token::Word(mnemonic)) => self.instruction(mnemonic, cur),
                Some(other) => Err(cur.unexpected(other)),
            };
        }
        self.instruction(first, cur)
    }

    fn directive(&mut self, directive: &str, token: &str, cur: &mut Cursor<'_>) -> Result<(), AsmError> {
        match directive {
            "global" => self.global(cur),
            "const" => {
                let constant = value(cur)?;
                cur.finish()?;
                self.image.constants.push(constant);
                Ok(())
            }
            "function" => self.open_function(cur),
            "state" => self.open_state(cur),
            "handler" => self.handler(cur),
            "end" => {
                cur.finish()?;
                self.close(cur.line)
            }
            _ => Err(AsmError::UnknownDirective {
                line: cur.line,
                token: token.to_string(),
            }),
        }
    }

    fn global(&mut self, cur: &mut Cursor<'_>) -> Result<(), AsmError> {
        let name = cur.name(".global", "a name")?.to_string();
        let tag = type_name(cur, ".global")?;
        let init = if cur.at_end() {
            Value::default_for(tag)
        } else {
            coerce(value(cur)?, tag).map_err(|found| AsmError::GlobalType {
                line: cur.line,
                name: name.clone(),
                declared: tag,
                found,
            })?
        };
        cur.finish()?;
        self.image.globals.push(Global { name, tag, init });
        Ok(())
    }

    fn open_function(&mut self, cur: &mut Cursor<'_>) -> Result<(), AsmError> {
        if self.section.is_some() {
            return Err(AsmError::NestedSection { line: cur.line });
        }
        let name = cur.name(".function", "a name")?.to_string();
        let ret = type_name(cur, ".function")?;
        let params = type_list(cur, ".function")?;
        let locals = locals_clause(cur, ".function")?;
        cur.finish()?;

        let index = self.image.functions.len();
        self.image.functions.push(Function {
            name: name.clone(),
            ret,
            params,
            locals,
            code: Vec::new(),
        });
        self.section = Some(OpenSection::new(SectionKind::Function(index), name, cur.line));
        Ok(())
    }

    fn open_state(&mut self, cur: &mut Cursor<'_>) -> Result<(), AsmError> {
        if self.section.is_some() {
            return Err(AsmError::NestedSection { line: cur.line });
        }
        let name = cur.name(".state", "a name")?.to_string();
        cur.finish()?;

        let index = self.image.states.len();
        self.image.states.push(State {
            name: name.clone(),
            ..State::default()
        });
        self.section = Some(OpenSection::new(SectionKind::State(index), name, cur.line));
        Ok(())
    }

    fn handler(&mut self, cur: &mut Cursor<'_>) -> Result<(), AsmError> {
        let line = cur.line;
        let section = match self.section.as_mut() {
            Some(section) if matches!(section.kind, SectionKind::State(_)) => section,
            _ => {
                return Err(AsmError::Misplaced {
                    line,
                    what: ".handler",
                    expected: "a .state section",
                })
            }
        };
        let token = cur.word(".handler", "an event name")?;
        let event = EventKind::from_name(&token.to_ascii_lowercase()).ok_or_else(|| {
            AsmError::UnknownEvent {
                line,
                token: token.to_string(),
            }
        })?;
        if section.handlers.iter().any(|h| h.event == event) {
            return Err(AsmError::DuplicateName {
                line,
                kind: "handler",
                name: event.name().to_string(),
            });
        }
        let locals = locals_clause(cur, ".handler")?;
        cur.finish()?;

        section.handlers.push(Handler {
            event,
            locals,
            entry: section.code.offset() as u32,
        });
        Ok(())
    }

    fn close(&mut self, line: usize) -> Result<(), AsmError> {
        let section = self.section.take().ok_or(AsmError::Misplaced {
            line,
            what: ".end",
            expected: "a section",
        })?;
        let OpenSection {
            kind,
            code,
            label_uses,
            handlers,
            ..
        } = section;
        let code = code.finish().map_err(|e| match e {
            BuildError::UndefinedLabel(label) => AsmError::UndefinedLabel {
                line: label_uses.get(&label).copied().unwrap_or(line),
                label,
            },
            BuildError::DuplicateLabel(label) => AsmError::DuplicateLabel { line, label },
        })?;

        match kind {
            SectionKind::Function(index) => self.image.functions[index].code = code,
            SectionKind::State(index) => {
                let state = &mut self.image.states[index];
                state.mask = handlers.iter().map(|h| h.event).collect();
                state.handlers = handlers;
                state.code = code;
            }
        }
        Ok(())
    }

    fn instruction(&mut self, mnemonic: &str, cur: &mut Cursor<'_>) -> Result<(), AsmError> {
        let line = cur.line;
        let opcode = Opcode::from_mnemonic(&mnemonic.to_ascii_uppercase()).ok_or_else(|| {
            AsmError::UnknownOpcode {
                line,
                token: mnemonic.to_string(),
            }
        })?;
        let Some(section) = self.section.as_mut() else {
            return Err(AsmError::Misplaced {
                line,
                what: "instruction",
                expected: "a .function or .state section",
            });
        };
        let what = opcode.mnemonic();

        let operand = match opcode.operand_kind() {
            OperandKind::None => Operand::None,
            OperandKind::Count => Operand::Count(u32_operand(cur, what, "a count")?),
            OperandKind::Local => Operand::Local(u32_operand(cur, what, "a local index")?),
            OperandKind::Global => Operand::Global(target(cur, &self.globals, what, "global")?),
            OperandKind::Byte => {
                let token = cur.word(what, "a byte")?;
                let byte = parse_int(token).and_then(|n| u8::try_from(n).ok());
                Operand::Byte(byte.ok_or_else(|| cur.invalid_number(token))?)
            }
            OperandKind::Integer => {
                let token = cur.word(what, "an integer")?;
                let n = parse_int(token).and_then(to_i32);
                Operand::Integer(n.ok_or_else(|| cur.invalid_number(token))?)
            }
            OperandKind::Float => Operand::Float(float_operand(cur, what)?),
            OperandKind::Constant => match cur.peek() {
                Some(Token::Str(text)) => {
                    cur.next();
                    Operand::Constant(intern(&mut self.image.constants, text))
                }
                _ => Operand::Constant(u32_operand(cur, what, "a constant index or string")?),
            },
            OperandKind::Vector => {
                cur.punct('<', what, "a vector")?;
                Operand::Vector(vector_literal(cur)?)
            }
            OperandKind::Rotation => {
                cur.punct('<', what, "a rotation")?;
                Operand::Rotation(rotation_literal(cur)?)
            }
            OperandKind::Type => Operand::Type(type_name(cur, what)?),
            OperandKind::TypePair => {
                let left = type_name(cur, what)?;
                cur.punct(',', what, "two types")?;
                Operand::TypePair(left, type_name(cur, what)?)
            }
            OperandKind::Jump => {
                let token = cur.word(what, "a label or offset")?;
                match parse_int(token) {
                    Some(n) => {
                        Operand::Jump(i32::try_from(n).map_err(|_| cur.invalid_number(token))?)
                    }
                    None => return emit(section, cur, Emit::Jump(token.to_string())),
                }
            }
            OperandKind::CondJump => {
                let tag = type_name(cur, what)?;
                cur.punct(',', what, "a type and a label or offset")?;
                let token = cur.word(what, "a label or offset")?;
                match parse_int(token) {
                    Some(n) => Operand::CondJump(
                        tag,
                        i32::try_from(n).map_err(|_| cur.invalid_number(token))?,
                    ),
                    None => {
                        return emit(section, cur, Emit::JumpIf(opcode, tag, token.to_string()))
                    }
                }
            }
            OperandKind::State => Operand::State(target(cur, &self.states, what, "state")?),
            OperandKind::Function => {
                Operand::Function(target(cur, &self.functions, what, "function")?)
            }
            OperandKind::Builtin8 | OperandKind::Builtin16 => {
                Operand::Builtin(builtin(cur, opcode)?)
            }
        };
        emit(section, cur, Emit::Instruction(Instruction::new(opcode, operand)))
    }

    fn finish(self) -> Result<BytecodeImage, AsmError> {
        match self.section {
            Some(section) => Err(AsmError::UnclosedSection {
                line: section.line,
                name: section.name,
            }),
            None => Ok(self.image),
        }
    }
}

/// Append to `section` once the rest of the line is known to be empty.
fn emit(section: &mut OpenSection, cur: &Cursor<'_>, item: Emit) -> Result<(), AsmError> {
    cur.finish()?;
    match item {
        Emit::Instruction(instr) => {
            section.code.emit(instr);
        }
        Emit::Jump(label) => {
            section.code.jump(&label);
            section.label_uses.entry(label).or_insert(cur.line);
        }
        Emit::JumpIf(opcode, tag, label) => {
            section.code.jump_if(opcode, tag, &label);
            section.label_uses.entry(label).or_insert(cur.line);
        }
    }
    Ok(())
}
