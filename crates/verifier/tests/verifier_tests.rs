//! Integration tests for the LSO verifier.
//!
//! Images are built the way a compiler would lay them out: one code
//! section per state holding all of its handlers, one per function.

use lso_common::{
    BytecodeImage, CodeBuilder, EventKind, EventMask, Function, Global, Handler, Opcode, Operand,
    SectionId, State, TypeTag, Value,
};
use lso_verifier::{verify, VerifyError};
use proptest::prelude::*;

fn handler(event: EventKind, entry: u32) -> Handler {
    Handler {
        event,
        locals: vec![],
        entry,
    }
}

fn state(name: &str, code: Vec<u8>, handlers: Vec<Handler>) -> State {
    State {
        name: name.into(),
        mask: handlers.iter().map(|h| h.event).collect(),
        handlers,
        code,
    }
}

// ========================================================
// Valid images pass verification
// ========================================================

#[test]
fn accept_add_and_return() {
    let mut b = CodeBuilder::new();
    b.push_int(2)
        .push_int(3)
        .binary(Opcode::Add, TypeTag::Integer, TypeTag::Integer)
        .op(Opcode::Pop)
        .op(Opcode::Return);
    let image = BytecodeImage {
        states: vec![state(
            "default",
            b.finish().unwrap(),
            vec![handler(EventKind::StateEntry, 0)],
        )],
        ..BytecodeImage::default()
    };
    assert!(verify(&image).is_ok());
}

#[test]
fn accept_two_states_with_globals_and_loop() {
    let mut default = CodeBuilder::new();
    // state_entry: count = 0; state on
    default.label("entry").unwrap();
    default
        .push_int(0)
        .with(Opcode::LoadGP, Operand::Global(0))
        .with(Opcode::State, Operand::State(1));
    // touch_start(integer n): while (n) { n = n - 1; } return
    let touch_entry = default.offset() as u32;
    default.label("top").unwrap();
    default
        .with(Opcode::Push, Operand::Local(0))
        .jump_if(Opcode::JumpNIf, TypeTag::Integer, "done")
        .with(Opcode::Push, Operand::Local(0))
        .push_int(1)
        .binary(Opcode::Sub, TypeTag::Integer, TypeTag::Integer)
        .with(Opcode::LoadP, Operand::Local(0))
        .jump("top");
    default.label("done").unwrap();
    default.op(Opcode::Return);

    let mut on = CodeBuilder::new();
    on.with(Opcode::PushArgS, Operand::Constant(0))
        .with(Opcode::PushG, Operand::Global(0))
        .binary(Opcode::Add, TypeTag::String, TypeTag::Integer)
        .with(Opcode::Print, Operand::Type(TypeTag::String))
        .op(Opcode::PopS)
        .op(Opcode::Return);

    let image = BytecodeImage {
        globals: vec![Global {
            name: "count".into(),
            tag: TypeTag::Integer,
            init: Value::Integer(5),
        }],
        constants: vec![Value::String("count=".into())],
        functions: vec![],
        states: vec![
            state(
                "default",
                default.finish().unwrap(),
                vec![
                    handler(EventKind::StateEntry, 0),
                    handler(EventKind::TouchStart, touch_entry),
                ],
            ),
            state(
                "on",
                on.finish().unwrap(),
                vec![handler(EventKind::StateEntry, 0)],
            ),
        ],
    };
    assert_eq!(verify(&image), Ok(()));
}

#[test]
fn accept_handler_locals_and_function_call() {
    let mut f = CodeBuilder::new();
    f.with(Opcode::Push, Operand::Local(0))
        .with(Opcode::Push, Operand::Local(0))
        .binary(Opcode::Mul, TypeTag::Float, TypeTag::Float)
        .with(Opcode::LoadP, Operand::Local(1))
        .with(Opcode::Push, Operand::Local(1))
        .op(Opcode::Return);

    let mut s = CodeBuilder::new();
    s.push_float(1.5)
        .with(Opcode::Call, Operand::Function(0))
        .with(Opcode::LoadP, Operand::Local(1))
        .op(Opcode::Return);

    let image = BytecodeImage {
        functions: vec![Function {
            name: "square".into(),
            ret: TypeTag::Float,
            params: vec![TypeTag::Float],
            locals: vec![TypeTag::Float],
            code: f.finish().unwrap(),
        }],
        states: vec![State {
            name: "default".into(),
            mask: [EventKind::Timer].into_iter().collect(),
            handlers: vec![Handler {
                event: EventKind::Timer,
                locals: vec![TypeTag::Integer, TypeTag::Float],
                entry: 0,
            }],
            code: s.finish().unwrap(),
        }],
        ..BytecodeImage::default()
    };
    assert!(verify(&image).is_ok());
}

// ========================================================
// Malformed images are rejected at load time
// ========================================================

#[test]
fn reject_jump_beyond_section() {
    let mut b = CodeBuilder::new();
    b.push_int(1)
        .with(Opcode::JumpIf, Operand::CondJump(TypeTag::Integer, 64))
        .op(Opcode::Return);
    let image = BytecodeImage {
        states: vec![state(
            "default",
            b.finish().unwrap(),
            vec![handler(EventKind::StateEntry, 0)],
        )],
        ..BytecodeImage::default()
    };
    let errors = verify(&image).unwrap_err();
    assert!(errors.iter().any(|e| matches!(
        e,
        VerifyError::InvalidJumpTarget {
            section: SectionId::State(0),
            at: 5,
            target: 75,
        }
    )));
}

#[test]
fn reject_call_to_missing_function() {
    let mut b = CodeBuilder::new();
    b.with(Opcode::Call, Operand::Function(2)).op(Opcode::Return);
    let image = BytecodeImage {
        states: vec![state(
            "default",
            b.finish().unwrap(),
            vec![handler(EventKind::StateEntry, 0)],
        )],
        ..BytecodeImage::default()
    };
    let errors = verify(&image).unwrap_err();
    assert_eq!(
        errors,
        vec![VerifyError::FunctionOutOfRange {
            section: SectionId::State(0),
            at: 0,
            index: 2,
        }]
    );
}

#[test]
fn reject_register_writes() {
    for opcode in [Opcode::PopIp, Opcode::PopBp, Opcode::PopSp, Opcode::PopSlr] {
        let image = BytecodeImage {
            states: vec![state(
                "default",
                vec![opcode as u8, Opcode::Return as u8],
                vec![handler(EventKind::StateEntry, 0)],
            )],
            ..BytecodeImage::default()
        };
        let errors = verify(&image).unwrap_err();
        assert!(
            errors.contains(&VerifyError::RegisterWrite {
                section: SectionId::State(0),
                at: 0,
                opcode,
            }),
            "{opcode:?} accepted"
        );
    }
}

#[test]
fn reject_mask_without_handler() {
    let mut s = state(
        "default",
        vec![Opcode::Return as u8],
        vec![handler(EventKind::StateEntry, 0)],
    );
    s.mask.insert(EventKind::CollisionStart);
    let image = BytecodeImage {
        states: vec![s],
        ..BytecodeImage::default()
    };
    let errors = verify(&image).unwrap_err();
    assert_eq!(
        errors,
        vec![VerifyError::MaskWithoutHandler {
            state: 0,
            event: EventKind::CollisionStart,
        }]
    );
}

#[test]
fn reject_undecodable_trailing_byte() {
    let mut b = CodeBuilder::new();
    b.with(Opcode::PushG, Operand::Global(0));
    let mut code = b.finish().unwrap();
    code.push(0xff);
    let image = BytecodeImage {
        functions: vec![Function {
            code,
            ..Function::default()
        }],
        states: vec![state("default", vec![], vec![])],
        ..BytecodeImage::default()
    };
    let errors = verify(&image).unwrap_err();
    assert!(errors.iter().any(|e| matches!(
        e,
        VerifyError::Undecodable {
            section: SectionId::Function(0),
            at: 5,
            ..
        }
    )));
}

#[test]
fn errors_survive_image_codec() {
    let mut b = CodeBuilder::new();
    b.with(Opcode::State, Operand::State(9));
    let image = BytecodeImage {
        states: vec![state(
            "default",
            b.finish().unwrap(),
            vec![handler(EventKind::StateEntry, 0)],
        )],
        ..BytecodeImage::default()
    };
    let decoded = BytecodeImage::decode(&image.encode()).unwrap();
    assert_eq!(verify(&decoded), verify(&image));
    assert!(verify(&decoded).is_err());
}

#[test]
fn mask_of_empty_state_is_empty() {
    let image = BytecodeImage {
        states: vec![State {
            name: "idle".into(),
            mask: EventMask::EMPTY,
            ..State::default()
        }],
        ..BytecodeImage::default()
    };
    assert!(verify(&image).is_ok());
}

proptest! {
    /// Arbitrary state code never panics the verifier.
    #[test]
    fn arbitrary_code_never_panics(
        code in prop::collection::vec(any::<u8>(), 0..48),
        entry in 0u32..48,
    ) {
        let image = BytecodeImage {
            states: vec![state("default", code, vec![handler(EventKind::TouchStart, entry)])],
            ..BytecodeImage::default()
        };
        let _ = verify(&image);
    }
}
