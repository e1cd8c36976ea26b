//! VM limits and scheduling parameters.

use serde::Deserialize;

use crate::error::ConfigError;

/// Limits applied to every instance, plus scheduler slicing.
///
/// Deserializes from any serde format; missing fields take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VmConfig {
    /// Value stack capacity in slots.
    pub stack_capacity: usize,
    /// Maximum nested calls, the handler frame included.
    pub max_call_depth: usize,
    /// Pending events per instance.
    pub event_queue_capacity: usize,
    /// Heap byte limit per instance.
    pub heap_limit: usize,
    /// Instructions granted per slice.
    pub budget_per_slice: u32,
    /// Slices the scheduler runs per tick, across all instances.
    pub max_slices_per_tick: u32,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            stack_capacity: 1024,
            max_call_depth: 64,
            event_queue_capacity: 64,
            heap_limit: 65_536,
            budget_per_slice: 1000,
            max_slices_per_tick: 256,
        }
    }
}

impl VmConfig {
    /// Reject settings that would make every instance unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("stack_capacity", self.stack_capacity),
            ("max_call_depth", self.max_call_depth),
            ("event_queue_capacity", self.event_queue_capacity),
            ("heap_limit", self.heap_limit),
            ("budget_per_slice", self.budget_per_slice as usize),
            ("max_slices_per_tick", self.max_slices_per_tick as usize),
        ];
        match fields.iter().find(|(_, value)| *value == 0) {
            Some((name, _)) => Err(ConfigError::Zero(name)),
            None => Ok(()),
        }
    }
}
