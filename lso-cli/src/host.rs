//! Built-ins bound by `lso run`: the reference math table plus chat,
//! which prints to stdout.

use lso_common::Value;
use lso_vm::{BuiltinError, BuiltinOutcome, BuiltinTable, RegisterError};

/// Chat built-ins taking `(channel, message)`, with the verb they print.
const CHANNEL_CHAT: [(&str, &str); 3] = [
    ("llWhisper", "whisper"),
    ("llSay", "say"),
    ("llShout", "shout"),
];

/// Render one chat line.
pub fn chat_line(verb: &str, channel: Option<i32>, script: &str, message: &str) -> String {
    match channel {
        Some(channel) => format!("[{verb} {channel}] {script}: {message}"),
        None => format!("[{verb}] {script}: {message}"),
    }
}

pub fn builtins() -> Result<BuiltinTable, RegisterError> {
    let mut table = BuiltinTable::with_math();

    for (name, verb) in CHANNEL_CHAT {
        table.register_name(name, move |ctx, args| match args {
            [Value::Integer(channel), Value::String(message)] => {
                println!("{}", chat_line(verb, Some(*channel), ctx.script, message));
                Ok(BuiltinOutcome::Return(Value::Void))
            }
            _ => Err(BuiltinError::Failed(format!("{name}: bad arguments"))),
        })?;
    }

    table.register_name("llOwnerSay", |ctx, args| match args {
        [Value::String(message)] => {
            println!("{}", chat_line("owner", None, ctx.script, message));
            Ok(BuiltinOutcome::Return(Value::Void))
        }
        _ => Err(BuiltinError::Failed("llOwnerSay: bad arguments".to_string())),
    })?;

    Ok(table)
}
