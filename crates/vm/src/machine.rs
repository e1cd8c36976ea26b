//! Script instance state: stack, frames, globals, heap, event queue and
//! the lifecycle state machine.

use std::fmt;
use std::time::Duration;

use lso_common::{EventKind, Key, SectionId, State, TypeTag, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::builtins::{BuiltinTable, Ticket};
use crate::config::VmConfig;
use crate::error::{Fault, FaultReport};
use crate::event::{Enqueued, EventQueue, EventRecord};
use crate::execute::Flow;
use crate::heap::{Heap, HeapObject};
use crate::image::VerifiedImage;
use crate::slot::Slot;

/// Host object an instance is attached to. The instance never owns the
/// object; the host resolves the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ObjectId(pub Uuid);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ObjectId {
    fn from(id: Uuid) -> Self {
        ObjectId(id)
    }
}

/// A code location: section plus byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ip {
    pub section: SectionId,
    pub offset: usize,
}

/// A call frame for function invocation.
#[derive(Debug, Clone)]
pub struct CallFrame {
    /// Where RETURN resumes. `None` for the outermost frame of a handler.
    pub ret: Option<Ip>,
    /// Base pointer of the caller.
    pub saved_bp: usize,
    /// Parameters plus locals.
    pub slots: usize,
    /// Index of the called function; `None` for a handler frame.
    pub function: Option<u32>,
}

/// Execution status of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Nothing queued, no handler active.
    Idle,
    /// Events queued.
    Runnable,
    /// Inside [`ScriptInstance::run`].
    Running,
    /// Budget ran out mid-handler; registers kept.
    SuspendedBudget,
    /// Waiting on an asynchronous built-in or a sleep.
    SuspendedAsync,
    Faulted,
}

/// Why [`ScriptInstance::run`] returned.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Queue drained.
    Idle,
    /// Budget exhausted.
    Suspended,
    /// Waiting on a ticket or a wake time.
    Waiting,
    Faulted(FaultReport),
}

/// What happened to a posted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// Queued after evicting an older event of this kind.
    Displaced(EventKind),
    /// Queue full of `state_entry`; event dropped.
    Rejected,
    /// Current state does not handle the kind; event dropped.
    NotInMask,
    /// Instance is faulted; event dropped.
    Faulted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wait {
    Ticket(Ticket),
    Until(Duration),
}

/// One running copy of a script.
pub struct ScriptInstance {
    pub(crate) image: VerifiedImage,
    pub(crate) name: String,
    pub(crate) object: ObjectId,
    pub(crate) limits: VmConfig,
    pub(crate) stack: Vec<Slot>,
    pub(crate) bp: usize,
    /// Next instruction of the active handler.
    pub(crate) ip: Option<Ip>,
    /// Instruction being executed, for fault reports.
    pub(crate) current: Option<Ip>,
    pub(crate) frames: Vec<CallFrame>,
    pub(crate) globals: Vec<Slot>,
    pub(crate) heap: Heap,
    pub(crate) state: u32,
    queue: EventQueue,
    status: Status,
    handler: Option<EventKind>,
    pending_state: Option<u32>,
    wait: Option<Wait>,
    fault: Option<FaultReport>,
    /// Last ticket issued. Never reset, so tickets from before a reset
    /// cannot match a later wait.
    pub(crate) next_ticket: Ticket,
    pub(crate) output: Vec<String>,
    executed: u64,
}

impl fmt::Debug for ScriptInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptInstance")
            .field("name", &self.name)
            .field("object", &self.object)
            .field("state", &self.state_name())
            .field("status", &self.status)
            .field("queued", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl ScriptInstance {
    /// Create an instance in state 0 with one `state_entry` queued.
    pub fn new(image: VerifiedImage, object: ObjectId, name: &str, config: &VmConfig) -> Self {
        let mut instance = Self {
            image,
            name: name.to_string(),
            object,
            limits: config.clone(),
            stack: Vec::new(),
            bp: 0,
            ip: None,
            current: None,
            frames: Vec::new(),
            globals: Vec::new(),
            heap: Heap::new(config.heap_limit),
            state: 0,
            queue: EventQueue::new(config.event_queue_capacity),
            status: Status::Idle,
            handler: None,
            pending_state: None,
            wait: None,
            fault: None,
            next_ticket: 0,
            output: Vec::new(),
            executed: 0,
        };
        instance.start();
        instance
    }

    /// Back to state 0 with fresh globals and heap and one `state_entry`.
    /// Pending tickets, sleeps and faults are discarded.
    pub fn reset(&mut self) {
        self.clear_handler();
        self.heap.clear();
        self.queue.clear();
        self.globals.clear();
        self.state = 0;
        self.pending_state = None;
        self.wait = None;
        self.fault = None;
        self.start();
        debug!(script = %self.name, object = %self.object, "instance reset");
    }

    fn start(&mut self) {
        if let Err(fault) = self.init_globals() {
            self.fail(fault);
            return;
        }
        self.queue.push(EventRecord::state_entry());
        self.settle();
    }

    fn init_globals(&mut self) -> Result<(), Fault> {
        let image = self.image.clone();
        for global in &image.globals {
            let slot = self.to_slot(global.init.clone())?;
            self.globals.push(slot);
        }
        Ok(())
    }

    /// Offer an event. Kinds outside the current state's mask are
    /// dropped without touching the queue.
    pub fn post(&mut self, record: EventRecord) -> Delivery {
        if self.fault.is_some() {
            return Delivery::Faulted;
        }
        let kind = record.kind();
        if !self.current_state().mask.contains(kind) {
            return Delivery::NotInMask;
        }
        let delivery = match self.queue.push(record) {
            Enqueued::Accepted => Delivery::Queued,
            Enqueued::Displaced(dropped) => {
                warn!(script = %self.name, event = %dropped, "event queue full, dropped oldest event");
                Delivery::Displaced(dropped)
            }
            Enqueued::Rejected => {
                warn!(script = %self.name, event = %kind, "event queue full, event rejected");
                Delivery::Rejected
            }
        };
        if self.status == Status::Idle {
            self.status = Status::Runnable;
        }
        delivery
    }

    /// Finish an asynchronous request. Returns false, and does nothing,
    /// unless the instance is waiting on exactly this ticket.
    pub fn complete(&mut self, ticket: Ticket, record: EventRecord) -> bool {
        if self.wait != Some(Wait::Ticket(ticket)) {
            return false;
        }
        self.wait = None;
        self.settle();
        self.post(record);
        true
    }

    /// Execute at most `budget` instructions.
    pub fn run(&mut self, budget: u32, builtins: &mut BuiltinTable, now: Duration) -> RunOutcome {
        if let Some(report) = &self.fault {
            return RunOutcome::Faulted(report.clone());
        }
        match self.wait {
            Some(Wait::Ticket(_)) => return RunOutcome::Waiting,
            Some(Wait::Until(wake)) if now < wake => return RunOutcome::Waiting,
            Some(Wait::Until(_)) => self.wait = None,
            None => {}
        }

        self.status = Status::Running;
        let mut remaining = budget;
        let outcome = loop {
            if self.ip.is_none() {
                if self.queue.is_empty() {
                    break RunOutcome::Idle;
                }
                if remaining == 0 {
                    break RunOutcome::Suspended;
                }
                if let Err(fault) = self.start_next_handler() {
                    break self.fail(fault);
                }
                continue;
            }
            if remaining == 0 {
                break RunOutcome::Suspended;
            }
            remaining -= 1;
            self.executed += 1;

            let result = match self.step(builtins, now) {
                Ok(Flow::Continue) => Ok(()),
                Ok(Flow::Return) => self.finish_handler(),
                Ok(Flow::ChangeState(target)) => self.change_state(target),
                Ok(Flow::Async(ticket)) => match self.finish_handler() {
                    Ok(()) => {
                        self.wait = Some(Wait::Ticket(ticket));
                        break RunOutcome::Waiting;
                    }
                    Err(fault) => Err(fault),
                },
                Ok(Flow::Sleep(duration)) => {
                    // An overlong sleep waits until the clock saturates.
                    self.wait = Some(Wait::Until(now.saturating_add(duration)));
                    break RunOutcome::Waiting;
                }
                Err(fault) => Err(fault),
            };
            if let Err(fault) = result {
                break self.fail(fault);
            }
        };
        self.settle();
        outcome
    }

    /// Whether the scheduler should grant a slice at `now`.
    pub fn is_ready(&self, now: Duration) -> bool {
        match self.status {
            Status::Runnable | Status::SuspendedBudget => true,
            Status::SuspendedAsync => matches!(self.wait, Some(Wait::Until(wake)) if now >= wake),
            Status::Idle | Status::Running | Status::Faulted => false,
        }
    }

    /// Pop events until one has a handler in the current state, and set
    /// it up.
    fn start_next_handler(&mut self) -> Result<(), Fault> {
        while let Some(record) = self.queue.pop() {
            if self.current_state().handler(record.kind()).is_some() {
                return self.start_handler(record);
            }
        }
        Ok(())
    }

    fn start_handler(&mut self, record: EventRecord) -> Result<(), Fault> {
        let image = self.image.clone();
        let state = &image.states[self.state as usize];
        let Some(handler) = state.handler(record.kind()) else {
            return Ok(());
        };
        let entry = Ip {
            section: SectionId::State(self.state),
            offset: handler.entry as usize,
        };
        self.current = Some(entry);
        self.handler = Some(record.kind());
        self.bp = self.stack.len();

        let params = record.into_params();
        let slots = params.len() + handler.locals.len();
        for value in params {
            let slot = self.to_slot(value)?;
            self.push(slot)?;
        }
        for &tag in &handler.locals {
            let slot = self.default_slot(tag)?;
            self.push(slot)?;
        }
        self.frames.push(CallFrame {
            ret: None,
            saved_bp: self.bp,
            slots,
            function: None,
        });
        self.ip = Some(entry);
        Ok(())
    }

    fn finish_handler(&mut self) -> Result<(), Fault> {
        self.clear_handler();
        self.collect_garbage();
        if let Some(target) = self.pending_state.take() {
            self.complete_transition(target);
        }
        Ok(())
    }

    /// STATE: end the current handler, run the old state's `state_exit`
    /// once if it has one, then switch.
    fn change_state(&mut self, target: u32) -> Result<(), Fault> {
        let issuer = self.clear_handler();
        let has_exit = self.current_state().handler(EventKind::StateExit).is_some();
        if has_exit && issuer != Some(EventKind::StateExit) && self.pending_state.is_none() {
            self.pending_state = Some(target);
            return self.start_handler(EventRecord::state_exit());
        }
        self.complete_transition(target);
        Ok(())
    }

    fn complete_transition(&mut self, target: u32) {
        let from = self.current_state().name.clone();
        self.pending_state = None;
        self.queue.clear();
        self.state = target;
        self.queue.push(EventRecord::state_entry());
        self.collect_garbage();
        debug!(script = %self.name, from = %from, to = %self.state_name(), "state transition");
    }

    /// Drop the active handler's stack and frames. Returns its kind.
    fn clear_handler(&mut self) -> Option<EventKind> {
        self.stack.clear();
        self.frames.clear();
        self.bp = 0;
        self.ip = None;
        self.current = None;
        self.handler.take()
    }

    fn fail(&mut self, fault: Fault) -> RunOutcome {
        let location = self.current.unwrap_or(Ip {
            section: SectionId::State(self.state),
            offset: 0,
        });
        let report = FaultReport {
            fault,
            section: location.section,
            offset: location.offset,
            state: self.state_name().to_string(),
        };
        self.clear_handler();
        self.pending_state = None;
        self.wait = None;
        self.fault = Some(report.clone());
        self.status = Status::Faulted;
        RunOutcome::Faulted(report)
    }

    fn settle(&mut self) {
        self.status = if self.fault.is_some() {
            Status::Faulted
        } else if self.wait.is_some() {
            Status::SuspendedAsync
        } else if self.ip.is_some() {
            Status::SuspendedBudget
        } else if !self.queue.is_empty() {
            Status::Runnable
        } else {
            Status::Idle
        };
    }

    pub(crate) fn current_state(&self) -> &State {
        // STATE targets are verified, and reset returns to state 0.
        &self.image.states[self.state as usize]
    }

    // Stack

    /// Lowest stack index the operand stack may pop to.
    pub(crate) fn floor(&self) -> usize {
        self.bp + self.frames.last().map_or(0, |f| f.slots)
    }

    pub(crate) fn push(&mut self, slot: Slot) -> Result<(), Fault> {
        if self.stack.len() >= self.limits.stack_capacity {
            return Err(Fault::StackOverflow);
        }
        self.stack.push(slot);
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> Result<Slot, Fault> {
        if self.stack.len() <= self.floor() {
            return Err(Fault::StackUnderflow);
        }
        self.stack.pop().ok_or(Fault::StackUnderflow)
    }

    /// Pop a slot that must carry `tag`.
    pub(crate) fn pop_slot(&mut self, tag: TypeTag) -> Result<Slot, Fault> {
        let slot = self.pop()?;
        check_tag(tag, &slot)?;
        Ok(slot)
    }

    /// Pop a slot that must carry `tag`, as a value.
    pub(crate) fn pop_tag(&mut self, tag: TypeTag) -> Result<Value, Fault> {
        let slot = self.pop_slot(tag)?;
        self.to_value(&slot)
    }

    /// Stack index of local `index` in the current frame.
    pub(crate) fn local_index(&self, index: u32) -> Result<usize, Fault> {
        let frame = self.frames.last().ok_or(Fault::StackUnderflow)?;
        if index as usize >= frame.slots {
            return Err(Fault::BadReference { what: "local", index });
        }
        let at = self.bp + index as usize;
        if at >= self.stack.len() {
            return Err(Fault::StackUnderflow);
        }
        Ok(at)
    }

    // Heap

    pub(crate) fn to_value(&self, slot: &Slot) -> Result<Value, Fault> {
        Ok(match slot {
            Slot::Void => Value::Void,
            Slot::Integer(n) => Value::Integer(*n),
            Slot::Float(f) => Value::Float(*f),
            Slot::Key(key) => Value::Key(key.clone()),
            Slot::Vector(v) => Value::Vector(*v),
            Slot::Rotation(r) => Value::Rotation(*r),
            Slot::Null => Value::Null,
            Slot::Str(r) | Slot::List(r) | Slot::TextKey(r) => match (slot, self.heap.get(*r)) {
                (Slot::TextKey(_), Some(HeapObject::Str(s))) => Value::Key(Key::Text(s.clone())),
                (_, Some(HeapObject::Str(s))) => Value::String(s.clone()),
                (_, Some(HeapObject::List(items))) => Value::List(items.clone()),
                (_, None) => {
                    return Err(Fault::BadReference {
                        what: "heap object",
                        index: r.index(),
                    })
                }
            },
        })
    }

    /// Store `value` in a slot, allocating strings and lists.
    pub(crate) fn to_slot(&mut self, value: Value) -> Result<Slot, Fault> {
        Ok(match value {
            Value::Void => Slot::Void,
            Value::Integer(n) => Slot::Integer(n),
            Value::Float(f) => Slot::Float(f),
            Value::Key(Key::Text(text)) => Slot::TextKey(self.alloc(HeapObject::Str(text))?),
            Value::Key(key) => Slot::Key(key),
            Value::Vector(v) => Slot::Vector(v),
            Value::Rotation(r) => Slot::Rotation(r),
            Value::Null => Slot::Null,
            Value::String(s) => Slot::Str(self.alloc(HeapObject::Str(s))?),
            Value::List(items) => Slot::List(self.alloc(HeapObject::List(items))?),
        })
    }

    pub(crate) fn default_slot(&mut self, tag: TypeTag) -> Result<Slot, Fault> {
        self.to_slot(Value::default_for(tag))
    }

    fn alloc(&mut self, object: HeapObject) -> Result<crate::heap::HeapRef, Fault> {
        let size = object.size();
        if !self.heap.fits(size) {
            self.collect_garbage();
            if !self.heap.fits(size) {
                return Err(Fault::HeapExhausted {
                    requested: size,
                    limit: self.heap.limit(),
                });
            }
        }
        Ok(self.heap.insert(object))
    }

    /// Free every heap object not reachable from the stack or globals.
    /// Returns the bytes freed.
    pub fn collect_garbage(&mut self) -> usize {
        let roots = self
            .stack
            .iter()
            .chain(&self.globals)
            .filter_map(Slot::heap_ref);
        self.heap.collect(roots)
    }

    // Accessors

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn object(&self) -> ObjectId {
        self.object
    }

    pub fn image(&self) -> &VerifiedImage {
        &self.image
    }

    pub fn state(&self) -> u32 {
        self.state
    }

    pub fn state_name(&self) -> &str {
        &self.current_state().name
    }

    pub fn fault(&self) -> Option<&FaultReport> {
        self.fault.as_ref()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Kinds of the queued events, oldest first.
    pub fn queued(&self) -> Vec<EventKind> {
        self.queue.kinds().collect()
    }

    /// Current value of global `index`.
    pub fn global(&self, index: usize) -> Option<Value> {
        self.globals.get(index).and_then(|slot| self.to_value(slot).ok())
    }

    pub fn global_named(&self, name: &str) -> Option<Value> {
        let index = self.image.globals.iter().position(|g| g.name == name)?;
        self.global(index)
    }

    pub fn heap_used(&self) -> usize {
        self.heap.used()
    }

    /// Lines written by PRINT since the last call.
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    /// Instructions executed over the instance's life.
    pub fn executed(&self) -> u64 {
        self.executed
    }

    /// The ticket the instance waits on, if any.
    pub fn waiting_ticket(&self) -> Option<Ticket> {
        match self.wait {
            Some(Wait::Ticket(ticket)) => Some(ticket),
            _ => None,
        }
    }

    /// Frames on the call stack, the handler frame included.
    pub fn call_depth(&self) -> usize {
        self.frames.len()
    }

    /// Kind of the handler currently active, if any.
    pub fn active_handler(&self) -> Option<EventKind> {
        self.handler
    }
}

pub(crate) fn check_tag(expected: TypeTag, slot: &Slot) -> Result<(), Fault> {
    let found = slot.tag();
    if found != expected {
        return Err(Fault::TypeMismatch { expected, found });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image;
    use lso_common::{BytecodeImage, CodeBuilder, Global, Handler, Opcode, Operand};

    fn instance(globals: Vec<Global>, code: Vec<u8>) -> ScriptInstance {
        let image = BytecodeImage {
            globals,
            states: vec![State {
                name: "default".into(),
                mask: [EventKind::StateEntry].into_iter().collect(),
                handlers: vec![Handler {
                    event: EventKind::StateEntry,
                    locals: vec![],
                    entry: 0,
                }],
                code,
            }],
            ..BytecodeImage::default()
        };
        let image = image::load(image).unwrap();
        ScriptInstance::new(image, ObjectId::default(), "test", &VmConfig::default())
    }

    #[test]
    fn new_instance_queues_state_entry() {
        let vm = instance(vec![], vec![Opcode::Return as u8]);
        assert_eq!(vm.status(), Status::Runnable);
        assert_eq!(vm.queued(), vec![EventKind::StateEntry]);
        assert_eq!(vm.state_name(), "default");
    }

    #[test]
    fn globals_initialized_from_image() {
        let vm = instance(
            vec![Global {
                name: "greeting".into(),
                tag: TypeTag::String,
                init: Value::String("hi".into()),
            }],
            vec![Opcode::Return as u8],
        );
        assert_eq!(vm.global_named("greeting"), Some(Value::String("hi".into())));
        assert!(vm.heap_used() > 0);
    }

    #[test]
    fn run_drains_queue() {
        let mut vm = instance(vec![], vec![Opcode::Return as u8]);
        let mut builtins = BuiltinTable::new();
        assert_eq!(vm.run(10, &mut builtins, Duration::ZERO), RunOutcome::Idle);
        assert_eq!(vm.status(), Status::Idle);
        assert_eq!(vm.executed(), 1);
    }

    #[test]
    fn store_keeps_tos_and_pop_respects_frame() {
        let mut b = CodeBuilder::new();
        b.push_int(7)
            .with(Opcode::StoreG, Operand::Global(0))
            .op(Opcode::Pop)
            .op(Opcode::Return);
        let mut vm = instance(
            vec![Global {
                name: "n".into(),
                tag: TypeTag::Integer,
                init: Value::Integer(0),
            }],
            b.finish().unwrap(),
        );
        let mut builtins = BuiltinTable::new();
        assert_eq!(vm.run(10, &mut builtins, Duration::ZERO), RunOutcome::Idle);
        assert_eq!(vm.global(0), Some(Value::Integer(7)));
    }

    #[test]
    fn fault_reports_location_and_state() {
        let mut b = CodeBuilder::new();
        b.push_int(1)
            .push_int(0)
            .binary(Opcode::Div, TypeTag::Integer, TypeTag::Integer)
            .op(Opcode::Pop)
            .op(Opcode::Return);
        let mut vm = instance(vec![], b.finish().unwrap());
        let mut builtins = BuiltinTable::new();
        let RunOutcome::Faulted(report) = vm.run(10, &mut builtins, Duration::ZERO) else {
            panic!("expected a fault");
        };
        assert_eq!(report.fault, Fault::DivisionByZero);
        assert_eq!(report.section, SectionId::State(0));
        assert_eq!(report.offset, 10);
        assert_eq!(report.state, "default");
        assert_eq!(vm.status(), Status::Faulted);
        assert_eq!(vm.post(EventRecord::state_entry()), Delivery::Faulted);

        vm.reset();
        assert_eq!(vm.status(), Status::Runnable);
        assert!(vm.fault().is_none());
    }
}
