//! Event records and the bounded per-instance queue.

use std::collections::VecDeque;

use lso_common::{EventKind, Value};

use crate::error::EventError;

/// An event with parameters matching its kind's fixed signature.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    kind: EventKind,
    params: Vec<Value>,
}

impl EventRecord {
    /// Build a record, checking arity and parameter tags.
    pub fn new(kind: EventKind, params: Vec<Value>) -> Result<Self, EventError> {
        let signature = kind.signature();
        if params.len() != signature.len() {
            return Err(EventError::Arity {
                event: kind,
                expected: signature.len(),
                found: params.len(),
            });
        }
        for (index, (param, expected)) in params.iter().zip(signature).enumerate() {
            let found = param.type_tag();
            if found != *expected {
                return Err(EventError::ParamType {
                    event: kind,
                    index,
                    expected: *expected,
                    found,
                });
            }
        }
        Ok(Self { kind, params })
    }

    /// `state_entry`, which takes no parameters.
    pub fn state_entry() -> Self {
        Self {
            kind: EventKind::StateEntry,
            params: Vec::new(),
        }
    }

    /// `state_exit`, which takes no parameters.
    pub fn state_exit() -> Self {
        Self {
            kind: EventKind::StateExit,
            params: Vec::new(),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn into_params(self) -> Vec<Value> {
        self.params
    }
}

/// Result of offering an event to a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Accepted,
    /// Accepted after evicting the oldest non-`state_entry` event.
    Displaced(EventKind),
    /// Queue full of `state_entry` events; the incoming event was dropped.
    Rejected,
}

/// FIFO of pending events with a fixed capacity.
///
/// On overflow the oldest event other than `state_entry` is evicted.
/// `state_entry` is never evicted.
#[derive(Debug, Clone)]
pub struct EventQueue {
    items: VecDeque<EventRecord>,
    capacity: usize,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, record: EventRecord) -> Enqueued {
        if self.items.len() < self.capacity {
            self.items.push_back(record);
            return Enqueued::Accepted;
        }
        let victim = self
            .items
            .iter()
            .position(|r| r.kind != EventKind::StateEntry);
        match victim.and_then(|i| self.items.remove(i)) {
            Some(evicted) => {
                self.items.push_back(record);
                Enqueued::Displaced(evicted.kind)
            }
            None => Enqueued::Rejected,
        }
    }

    pub fn pop(&mut self) -> Option<EventRecord> {
        self.items.pop_front()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Kinds in queue order.
    pub fn kinds(&self) -> impl Iterator<Item = EventKind> + '_ {
        self.items.iter().map(|r| r.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lso_common::{Key, TypeTag};

    fn touch(n: i32) -> EventRecord {
        EventRecord::new(EventKind::TouchStart, vec![Value::Integer(n)]).unwrap()
    }

    #[test]
    fn record_checks_signature() {
        assert!(EventRecord::new(EventKind::Timer, vec![]).is_ok());
        assert_eq!(
            EventRecord::new(EventKind::Timer, vec![Value::Integer(1)]),
            Err(EventError::Arity {
                event: EventKind::Timer,
                expected: 0,
                found: 1,
            })
        );
        assert_eq!(
            EventRecord::new(
                EventKind::Money,
                vec![Value::String("x".into()), Value::Integer(5)]
            ),
            Err(EventError::ParamType {
                event: EventKind::Money,
                index: 0,
                expected: TypeTag::Key,
                found: TypeTag::String,
            })
        );
        assert!(EventRecord::new(
            EventKind::Money,
            vec![Value::Key(Key::NULL), Value::Integer(5)]
        )
        .is_ok());
    }

    #[test]
    fn fifo_order() {
        let mut q = EventQueue::new(4);
        q.push(touch(1));
        q.push(touch(2));
        assert_eq!(q.pop().unwrap().params(), &[Value::Integer(1)]);
        assert_eq!(q.pop().unwrap().params(), &[Value::Integer(2)]);
        assert!(q.pop().is_none());
    }

    #[test]
    fn overflow_drops_oldest_non_state_entry() {
        let mut q = EventQueue::new(3);
        q.push(EventRecord::state_entry());
        q.push(touch(1));
        q.push(touch(2));
        assert_eq!(q.push(touch(3)), Enqueued::Displaced(EventKind::TouchStart));
        assert_eq!(q.len(), 3);
        let kinds: Vec<_> = q.kinds().collect();
        assert_eq!(kinds[0], EventKind::StateEntry);
        q.pop();
        assert_eq!(q.pop().unwrap().params(), &[Value::Integer(2)]);
        assert_eq!(q.pop().unwrap().params(), &[Value::Integer(3)]);
    }

    #[test]
    fn overflow_of_state_entries_rejects_incoming() {
        let mut q = EventQueue::new(1);
        q.push(EventRecord::state_entry());
        assert_eq!(q.push(touch(1)), Enqueued::Rejected);
        assert_eq!(q.len(), 1);
    }
}
