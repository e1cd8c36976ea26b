//! Tokenizer for LSO assembly text.

use crate::error::AsmError;

/// A single token from an assembly line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    /// A bare word: mnemonic, directive, name, label or number. Case is
    /// preserved; callers decide where it matters.
    Word(String),
    /// A double-quoted string literal, escapes resolved.
    Str(String),
    /// One of `( ) , < > [ ]`.
    Punct(char),
}

impl Token {
    /// Source-like rendering for error messages.
    pub(crate) fn text(&self) -> String {
        match self {
            Token::Word(w) => w.clone(),
            Token::Str(s) => format!("\"{s}\""),
            Token::Punct(c) => c.to_string(),
        }
    }
}

fn is_punct(c: char) -> bool {
    matches!(c, '(' | ')' | ',' | '<' | '>' | '[' | ']')
}

/// Tokenize a single line of assembly text.
///
/// Returns an empty Vec for blank lines and comment-only lines.
/// Comments start with `;` outside a string and extend to end of line.
pub(crate) fn tokenize_line(line: &str, line_num: usize) -> Result<Vec<Token>, AsmError> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c == ';' {
            break;
        }
        if c.is_whitespace() {
            chars.next();
        } else if is_punct(c) {
            chars.next();
            tokens.push(Token::Punct(c));
        } else if c == '"' {
            chars.next();
            tokens.push(Token::Str(string_literal(&mut chars, line_num)?));
        } else {
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || is_punct(c) || c == '"' || c == ';' {
                    break;
                }
                word.push(c);
                chars.next();
            }
            tokens.push(Token::Word(word));
        }
    }

    Ok(tokens)
}

/// Read the rest of a string literal; the opening quote is consumed.
fn string_literal(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    line_num: usize,
) -> Result<String, AsmError> {
    let mut out = String::new();
    loop {
        match chars.next() {
            None => return Err(AsmError::UnterminatedString { line: line_num }),
            Some('"') => return Ok(out),
            Some('\\') => {
                let escape = chars
                    .next()
                    .ok_or(AsmError::UnterminatedString { line: line_num })?;
                match escape {
                    '"' => out.push('"'),
                    '\\' => out.push('\\'),
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    'u' => out.push(unicode_escape(chars, line_num)?),
                    other => {
                        return Err(AsmError::InvalidEscape {
                            line: line_num,
                            escape: other.to_string(),
                        })
                    }
                }
            }
            Some(c) => out.push(c),
        }
    }
}

/// `\u{XXXX}`; the `\u` is consumed.
fn unicode_escape(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    line_num: usize,
) -> Result<char, AsmError> {
    let mut digits = String::new();
    let invalid = |digits: &str| AsmError::InvalidEscape {
        line: line_num,
        escape: format!("u{digits}"),
    };
    if chars.next() != Some('{') {
        return Err(invalid(""));
    }
    for c in chars.by_ref() {
        if c == '}' {
            return u32::from_str_radix(&digits, 16)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| invalid(&format!("{{{digits}}}")));
        }
        digits.push(c);
    }
    Err(invalid(&format!("{{{digits}")))
}

/// Quote `s` so that [`tokenize_line`] reads it back unchanged.
pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => out.push_str(&format!("\\u{{{:x}}}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
