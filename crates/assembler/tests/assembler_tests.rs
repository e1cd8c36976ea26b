//! Integration tests for the LSO assembler.
//!
//! Tests cover:
//! - Script programs assembled, verified and run on the VM
//! - Round trips (assemble → disassemble → assemble, and arbitrary code)
//! - Error cases with their line numbers

use std::time::Duration;

use lso_assembler::{assemble, disassemble, AsmError};
use lso_common::opcode::ALL_OPCODES;
use lso_common::type_tag::ALL_TYPE_TAGS;
use lso_common::{
    BytecodeImage, EventKind, Function, Instruction, Key, Operand, OperandKind, Rotation,
    TypeTag, Value, Vector,
};
use lso_vm::{BuiltinTable, EventRecord, ObjectId, RunOutcome, ScriptInstance, VmConfig};
use proptest::prelude::*;

// ============================================================
// Helpers
// ============================================================

/// Assemble, verify and run until idle; return the printed lines.
fn run_text(text: &str, events: Vec<EventRecord>) -> Vec<String> {
    let image = assemble(text).unwrap();
    lso_verifier::verify(&image).unwrap_or_else(|errors| {
        panic!("verification failed: {errors:?}");
    });
    let image = lso_vm::load(image).unwrap();
    let mut vm = ScriptInstance::new(image, ObjectId::default(), "test", &VmConfig::default());
    let mut builtins = BuiltinTable::with_math();
    assert_eq!(vm.run(100_000, &mut builtins, Duration::ZERO), RunOutcome::Idle);
    for event in events {
        vm.post(event);
        let outcome = vm.run(100_000, &mut builtins, Duration::ZERO);
        assert_eq!(outcome, RunOutcome::Idle);
    }
    vm.take_output()
}

fn assert_roundtrip(text: &str) {
    let image = assemble(text).unwrap();
    let canonical = disassemble(&image).unwrap();
    let again = assemble(&canonical).unwrap_or_else(|e| {
        panic!("canonical text did not reassemble: {e}\n{canonical}");
    });
    assert_eq!(again, image, "{canonical}");
    assert_eq!(disassemble(&again).unwrap(), canonical);
}

const FACTORIAL: &str = "\
; fact(n) = n <= 1 ? 1 : n * fact(n - 1)
.function fact integer (integer)
    PUSH 0
    PUSHARGI 1
    LEQ integer, integer
    JUMPNIF integer, recurse
    PUSHARGI 1
    RETURN
recurse:
    PUSH 0
    PUSH 0
    PUSHARGI 1
    SUB integer, integer
    CALL fact
    MUL integer, integer
    RETURN
.end

.state default
.handler state_entry
    PUSHARGI 5
    CALL fact
    PRINT integer
    RETURN
.end
";

const COUNTER: &str = "\
.global touches integer
.global greeting string \"touched \"

.state default
.handler state_entry
    PUSHARGS \"ready\"
    PRINT string
    RETURN
.handler touch_start
    PUSHG touches
    PUSHARGI 1
    ADD integer, integer
    LOADGP touches
    PUSHGS greeting
    PUSHG touches
    CAST integer, string
    ADD string, string
    PRINT string
    PUSHG touches
    PUSHARGI 2
    LESS integer, integer
    JUMPIF integer, stay
    STATE done
stay:
    RETURN
.end

.state done
.handler state_entry
    PUSHARGS \"done\"
    PRINT string
    RETURN
.end
";

// ============================================================
// Programs that run
// ============================================================

#[test]
fn factorial_runs() {
    assert_eq!(run_text(FACTORIAL, vec![]), vec!["120"]);
}

#[test]
fn counter_changes_state_after_two_touches() {
    let touch = || EventRecord::new(EventKind::TouchStart, vec![Value::Integer(1)]).unwrap();
    assert_eq!(
        run_text(COUNTER, vec![touch(), touch(), touch()]),
        vec!["ready", "touched 1", "touched 2", "done"]
    );
}

#[test]
fn handler_mask_follows_declared_handlers() {
    let image = assemble(COUNTER).unwrap();
    let kinds: Vec<EventKind> = image.states[0].mask.kinds().collect();
    assert_eq!(kinds, vec![EventKind::StateEntry, EventKind::TouchStart]);
    assert_eq!(image.state_index("done"), Some(1));
}

#[test]
fn globals_take_defaults_and_coercions() {
    let text = "\
.global a integer
.global b float 2
.global c key \"a2e76fcd-9360-4f6d-a924-000000000003\"
.global d vector
.global e list [1, 2.5, \"x\"]
";
    let image = assemble(text).unwrap();
    let inits: Vec<&Value> = image.globals.iter().map(|g| &g.init).collect();
    assert_eq!(
        inits,
        vec![
            &Value::Integer(0),
            &Value::Float(2.0),
            &Value::Key(Key::parse("a2e76fcd-9360-4f6d-a924-000000000003")),
            &Value::Vector(Vector::ZERO),
            &Value::List(vec![
                Value::Integer(1),
                Value::Float(2.5),
                Value::String("x".into())
            ]),
        ]
    );
}

// ============================================================
// Round trips
// ============================================================

#[test]
fn roundtrip_factorial() {
    assert_roundtrip(FACTORIAL);
}

#[test]
fn roundtrip_counter() {
    assert_roundtrip(COUNTER);
}

#[test]
fn roundtrip_literals_and_locals() {
    assert_roundtrip(
        "\
.global v vector <1, 2, 3>
.global r rotation <0, 0, 0.7071068, 0.7071068>
.global k key key:\"not a uuid\"
.const \"line\\nbreak \\\"quoted\\\"\"
.const [<1, 0, 0>, key:a2e76fcd-9360-4f6d-a924-000000000003, -7]
.function \"odd name\" float (float, vector) locals (list, rotation)
    PUSHARGF -0.25
    PUSHARGV <0.5, 0, -1e-7>
    PUSHARGQ <0, 0, 0, 1>
    PUSHARGB 255
    PUSHARGI 0xffffffff
    POPARG 3
    CALLLIB llSay
    CALLLIB_TWO_BYTE 400
    JUMP 0
    RETURN
.end
.state default
.handler listen locals (integer)
    RETURN
.handler timer
    RETURN
.end
",
    );
}

#[test]
fn canonical_text_is_stable() {
    let text = "\
.function f void ()
    pushargi 0x10
    JUMP done
done:
    RETURN
.end
";
    let canonical = disassemble(&assemble(text).unwrap()).unwrap();
    assert_eq!(
        canonical,
        ".function f void ()\n    PUSHARGI 16\n    JUMP 0\n    RETURN\n.end\n"
    );
}

fn arb_instruction() -> impl Strategy<Value = Instruction> {
    let tag = || prop::sample::select(&ALL_TYPE_TAGS[..]);
    prop::sample::select(&ALL_OPCODES[..]).prop_flat_map(move |op| {
        let operand: BoxedStrategy<Operand> = match op.operand_kind() {
            OperandKind::None => Just(Operand::None).boxed(),
            OperandKind::Count => any::<u32>().prop_map(Operand::Count).boxed(),
            OperandKind::Local => any::<u32>().prop_map(Operand::Local).boxed(),
            OperandKind::Global => any::<u32>().prop_map(Operand::Global).boxed(),
            OperandKind::Byte => any::<u8>().prop_map(Operand::Byte).boxed(),
            OperandKind::Integer => any::<i32>().prop_map(Operand::Integer).boxed(),
            OperandKind::Float => (-1.0e9f32..1.0e9).prop_map(Operand::Float).boxed(),
            OperandKind::Constant => any::<u32>().prop_map(Operand::Constant).boxed(),
            OperandKind::Vector => (-1.0f32..1.0, -1.0f32..1.0, -1.0f32..1.0)
                .prop_map(|(x, y, z)| Operand::Vector(Vector::new(x, y, z)))
                .boxed(),
            OperandKind::Rotation => (-1.0f32..1.0, -1.0f32..1.0)
                .prop_map(|(z, s)| Operand::Rotation(Rotation::new(0.0, 0.0, z, s)))
                .boxed(),
            OperandKind::Type => tag().prop_map(Operand::Type).boxed(),
            OperandKind::TypePair => (tag(), tag())
                .prop_map(|(l, r)| Operand::TypePair(l, r))
                .boxed(),
            OperandKind::Jump => any::<i32>().prop_map(Operand::Jump).boxed(),
            OperandKind::CondJump => (tag(), any::<i32>())
                .prop_map(|(t, o)| Operand::CondJump(t, o))
                .boxed(),
            OperandKind::State => any::<u32>().prop_map(Operand::State).boxed(),
            OperandKind::Function => any::<u32>().prop_map(Operand::Function).boxed(),
            OperandKind::Builtin8 => any::<u8>()
                .prop_map(|id| Operand::Builtin(id as u16))
                .boxed(),
            OperandKind::Builtin16 => any::<u16>().prop_map(Operand::Builtin).boxed(),
        };
        operand.prop_map(move |operand| Instruction::new(op, operand))
    })
}

proptest! {
    /// Any decodable code section survives disassembly and reassembly,
    /// verified or not.
    #[test]
    fn arbitrary_code_roundtrips(instrs in prop::collection::vec(arb_instruction(), 0..24)) {
        let mut code = Vec::new();
        for instr in &instrs {
            instr.encode_into(&mut code);
        }
        let image = BytecodeImage {
            functions: vec![Function {
                name: "f".into(),
                ret: TypeTag::Void,
                code,
                ..Function::default()
            }],
            ..BytecodeImage::default()
        };
        let text = disassemble(&image).unwrap();
        prop_assert_eq!(assemble(&text).unwrap(), image);
    }
}

// ============================================================
// Errors
// ============================================================

#[test]
fn error_unknown_directive() {
    let err = assemble(".frobnicate").unwrap_err();
    assert!(matches!(err, AsmError::UnknownDirective { line: 1, .. }));
}

#[test]
fn error_unknown_type_and_event() {
    let err = assemble(".global x int").unwrap_err();
    assert!(matches!(err, AsmError::UnknownType { line: 1, .. }));

    let err = assemble(".state s\n.handler poke\n.end").unwrap_err();
    assert!(matches!(err, AsmError::UnknownEvent { line: 2, .. }));
}

#[test]
fn error_unknown_builtin() {
    let err = assemble(".function f void ()\nCALLLIB llFrobnicate\n.end").unwrap_err();
    assert!(matches!(err, AsmError::UnknownBuiltin { line: 2, .. }));
}

#[test]
fn error_undefined_state_and_function() {
    let err = assemble(".state a\n.handler state_entry\nSTATE b\n.end").unwrap_err();
    assert_eq!(
        err,
        AsmError::UndefinedName {
            line: 3,
            kind: "state",
            name: "b".into()
        }
    );

    let err = assemble(".function f void ()\nCALL g\n.end").unwrap_err();
    assert!(matches!(err, AsmError::UndefinedName { kind: "function", .. }));
}

#[test]
fn error_duplicate_names() {
    let err = assemble(".state a\n.end\n.state a\n.end").unwrap_err();
    assert!(matches!(err, AsmError::DuplicateName { line: 3, kind: "state", .. }));

    let err = assemble(".state a\n.handler timer\nRETURN\n.handler timer\n.end").unwrap_err();
    assert!(matches!(err, AsmError::DuplicateName { line: 4, kind: "handler", .. }));
}

#[test]
fn error_duplicate_label() {
    let err = assemble(".function f void ()\nx:\nx:\nRETURN\n.end").unwrap_err();
    assert_eq!(
        err,
        AsmError::DuplicateLabel {
            line: 3,
            label: "x".into()
        }
    );
}

#[test]
fn error_global_type_mismatch() {
    let err = assemble(".global n integer \"three\"").unwrap_err();
    assert_eq!(
        err,
        AsmError::GlobalType {
            line: 1,
            name: "n".into(),
            declared: TypeTag::Integer,
            found: TypeTag::String
        }
    );
}

#[test]
fn error_nested_section_and_stray_end() {
    let err = assemble(".state a\n.function f void ()\n.end").unwrap_err();
    assert_eq!(err, AsmError::NestedSection { line: 2 });

    let err = assemble(".end").unwrap_err();
    assert!(matches!(err, AsmError::Misplaced { line: 1, what: ".end", .. }));
}

#[test]
fn error_handler_outside_state() {
    let err = assemble(".function f void ()\n.handler timer\n.end").unwrap_err();
    assert!(matches!(err, AsmError::Misplaced { line: 2, what: ".handler", .. }));
}

#[test]
fn error_trailing_tokens() {
    let err = assemble(".function f void ()\nRETURN 5\n.end").unwrap_err();
    assert_eq!(
        err,
        AsmError::UnexpectedToken {
            line: 2,
            token: "5".into()
        }
    );
}

#[test]
fn error_invalid_numbers() {
    let err = assemble(".function f void ()\nPUSHARGB 256\n.end").unwrap_err();
    assert!(matches!(err, AsmError::InvalidNumber { line: 2, .. }));

    let err = assemble(".function f void ()\nPUSH -1\n.end").unwrap_err();
    assert!(matches!(err, AsmError::InvalidNumber { line: 2, .. }));
}

#[test]
fn first_error_wins() {
    let err = assemble(".function f void ()\nFOO\nBAR\n.end").unwrap_err();
    assert!(matches!(err, AsmError::UnknownOpcode { line: 2, .. }));
}
