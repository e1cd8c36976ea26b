//! LSO virtual machine: executes verified script images.
//!
//! Each [`ScriptInstance`] is a stack machine with:
//! - A bounded value stack of tagged slots, addressed through call frames
//! - Globals and a private heap for strings and lists
//! - A bounded event queue feeding the handlers of the current state
//!
//! Execution is budgeted: [`ScriptInstance::run`] stops after a given
//! number of instructions and resumes where it left off. A [`Scheduler`]
//! grants slices to the instances of one region round-robin.
//!
//! # Usage
//!
//! ```
//! use std::time::Duration;
//! use lso_common::{BytecodeImage, CodeBuilder, EventKind, Handler, Opcode, Operand, State, TypeTag};
//! use lso_vm::{BuiltinTable, ObjectId, Scheduler, VmConfig};
//!
//! let mut code = CodeBuilder::new();
//! code.push_int(2)
//!     .push_int(3)
//!     .binary(Opcode::Add, TypeTag::Integer, TypeTag::Integer)
//!     .with(Opcode::Print, Operand::Type(TypeTag::Integer))
//!     .op(Opcode::Return);
//! let image = BytecodeImage {
//!     states: vec![State {
//!         name: "default".into(),
//!         mask: [EventKind::StateEntry].into_iter().collect(),
//!         handlers: vec![Handler { event: EventKind::StateEntry, locals: vec![], entry: 0 }],
//!         code: code.finish().unwrap(),
//!     }],
//!     ..BytecodeImage::default()
//! };
//!
//! let image = lso_vm::load(image).unwrap();
//! let mut scheduler = Scheduler::new(VmConfig::default(), BuiltinTable::with_math()).unwrap();
//! let id = scheduler.create(image, ObjectId::default(), "adder");
//! let report = scheduler.tick(Duration::from_millis(100));
//! assert!(report.faults.is_empty());
//! assert_eq!(scheduler.instance_mut(id).unwrap().take_output(), vec!["5"]);
//! ```

pub mod builtins;
pub mod config;
pub mod error;
pub mod event;
pub mod execute;
pub mod heap;
pub mod image;
pub mod machine;
pub mod operators;
pub mod scheduler;
pub mod slot;

pub use builtins::{BuiltinContext, BuiltinFn, BuiltinOutcome, BuiltinTable, Ticket};
pub use config::VmConfig;
pub use error::{BuiltinError, ConfigError, EventError, Fault, FaultReport, LoadError, RegisterError};
pub use event::{Enqueued, EventQueue, EventRecord};
pub use image::{load, load_bytes, ImageCache, VerifiedImage};
pub use machine::{CallFrame, Delivery, Ip, ObjectId, RunOutcome, ScriptInstance, Status};
pub use scheduler::{InstanceId, Scheduler, TickReport};
