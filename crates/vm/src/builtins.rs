//! Host bindings for built-in functions.
//!
//! The id, name and signature of every built-in are fixed by
//! [`lso_common::library`]. A [`BuiltinTable`] maps ids to host callables;
//! the interpreter checks arguments against the signature before calling.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use lso_common::library::{self, math};
use lso_common::Value;

use crate::error::{BuiltinError, RegisterError};
use crate::machine::ObjectId;

/// Identifies one pending asynchronous request.
pub type Ticket = u64;

/// What a built-in asks the interpreter to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum BuiltinOutcome {
    /// Push `value` (ignored for built-ins returning void) and continue.
    Return(Value),
    /// End the handler; the instance waits until `ticket` is completed.
    Async { ticket: Ticket },
    /// Resume the same handler once `duration` has elapsed.
    Sleep(Duration),
}

/// What a built-in can see of the calling instance.
pub struct BuiltinContext<'a> {
    pub object: ObjectId,
    pub script: &'a str,
    pub state: &'a str,
    /// Scheduler clock at the call.
    pub now: Duration,
    pub(crate) next_ticket: &'a mut Ticket,
}

impl BuiltinContext<'_> {
    /// Allocate a ticket for an asynchronous request. Tickets increase
    /// monotonically for the life of the instance, across resets.
    pub fn ticket(&mut self) -> Ticket {
        *self.next_ticket += 1;
        *self.next_ticket
    }
}

/// A host implementation of one built-in.
pub type BuiltinFn =
    Box<dyn FnMut(&mut BuiltinContext<'_>, &[Value]) -> Result<BuiltinOutcome, BuiltinError> + Send>;

/// Built-in id to host implementation.
#[derive(Default)]
pub struct BuiltinTable {
    bindings: HashMap<u16, BuiltinFn>,
}

impl fmt::Debug for BuiltinTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.bindings.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("BuiltinTable").field("bound", &ids).finish()
    }
}

impl BuiltinTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table with the reference math and string built-ins bound.
    pub fn with_math() -> Self {
        let mut table = Self::new();
        for (name, f) in math::FUNCTIONS.iter() {
            let f = *f;
            // Every reference function is in the library table.
            let _ = table.register_name(name, move |_, args| {
                f(args).map(BuiltinOutcome::Return).map_err(BuiltinError::from)
            });
        }
        table
    }

    /// Bind `id`. Replaces any earlier binding.
    pub fn register<F>(&mut self, id: u16, f: F) -> Result<(), RegisterError>
    where
        F: FnMut(&mut BuiltinContext<'_>, &[Value]) -> Result<BuiltinOutcome, BuiltinError>
            + Send
            + 'static,
    {
        if library::lookup(id).is_none() {
            return Err(RegisterError::UnknownId(id));
        }
        self.bindings.insert(id, Box::new(f));
        Ok(())
    }

    /// Bind a built-in by name.
    pub fn register_name<F>(&mut self, name: &str, f: F) -> Result<(), RegisterError>
    where
        F: FnMut(&mut BuiltinContext<'_>, &[Value]) -> Result<BuiltinOutcome, BuiltinError>
            + Send
            + 'static,
    {
        let signature =
            library::by_name(name).ok_or_else(|| RegisterError::UnknownName(name.to_string()))?;
        self.register(signature.id, f)
    }

    pub fn is_bound(&self, id: u16) -> bool {
        self.bindings.contains_key(&id)
    }

    pub(crate) fn get_mut(&mut self, id: u16) -> Option<&mut BuiltinFn> {
        self.bindings.get_mut(&id)
    }
}
