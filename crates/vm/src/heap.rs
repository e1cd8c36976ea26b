//! Per-instance heap for strings and lists.
//!
//! Objects are immutable once allocated. Slots refer to them through
//! [`HeapRef`] handles, which are indices into one instance's arena and
//! mean nothing to any other instance. Freed entries are recycled through
//! a free list. Lists hold owned [`Value`]s, so marking never recurses.

use lso_common::Value;

/// Fixed per-object cost charged against the heap limit.
pub const OBJECT_OVERHEAD: usize = 16;

/// Handle to a heap object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapRef(u32);

impl HeapRef {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// A heap object.
#[derive(Debug, Clone, PartialEq)]
pub enum HeapObject {
    Str(String),
    List(Vec<Value>),
}

impl HeapObject {
    /// Bytes charged for this object.
    pub fn size(&self) -> usize {
        match self {
            HeapObject::Str(s) => OBJECT_OVERHEAD + s.len(),
            HeapObject::List(items) => OBJECT_OVERHEAD + items.iter().map(element_size).sum::<usize>(),
        }
    }
}

/// Bytes charged for one list element.
fn element_size(value: &Value) -> usize {
    match value {
        Value::String(s) => OBJECT_OVERHEAD + s.len(),
        Value::Key(key) => OBJECT_OVERHEAD + key.to_string().len(),
        _ => OBJECT_OVERHEAD,
    }
}

struct Entry {
    object: HeapObject,
    size: usize,
}

/// Arena with byte accounting.
pub struct Heap {
    entries: Vec<Option<Entry>>,
    free: Vec<u32>,
    used: usize,
    limit: usize,
}

impl Heap {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
            used: 0,
            limit,
        }
    }

    /// Bytes currently allocated.
    pub fn used(&self) -> usize {
        self.used
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of live objects.
    pub fn live(&self) -> usize {
        self.entries.len() - self.free.len()
    }

    /// Whether `size` more bytes fit under the limit.
    pub fn fits(&self, size: usize) -> bool {
        self.used.saturating_add(size) <= self.limit
    }

    /// Store `object`. Callers check [`Heap::fits`] first; the limit is
    /// not enforced here.
    pub fn insert(&mut self, object: HeapObject) -> HeapRef {
        let size = object.size();
        self.used += size;
        let entry = Some(Entry { object, size });
        match self.free.pop() {
            Some(index) => {
                self.entries[index as usize] = entry;
                HeapRef(index)
            }
            None => {
                self.entries.push(entry);
                HeapRef(self.entries.len() as u32 - 1)
            }
        }
    }

    pub fn get(&self, r: HeapRef) -> Option<&HeapObject> {
        self.entries
            .get(r.0 as usize)
            .and_then(Option::as_ref)
            .map(|e| &e.object)
    }

    /// Free every object not named by `roots`. Returns the bytes freed.
    pub fn collect(&mut self, roots: impl IntoIterator<Item = HeapRef>) -> usize {
        let mut marked = vec![false; self.entries.len()];
        for r in roots {
            if let Some(flag) = marked.get_mut(r.0 as usize) {
                *flag = true;
            }
        }

        let mut freed = 0;
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if marked[index] {
                continue;
            }
            if let Some(dead) = entry.take() {
                freed += dead.size;
                self.free.push(index as u32);
            }
        }
        self.used -= freed;
        freed
    }

    /// Release everything. Safe to call repeatedly.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.free.clear();
        self.used = 0;
    }
}
