//! Cooperative round-robin scheduling of the instances of one region.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::builtins::{BuiltinTable, Ticket};
use crate::config::VmConfig;
use crate::error::{ConfigError, FaultReport};
use crate::event::EventRecord;
use crate::image::VerifiedImage;
use crate::machine::{Delivery, ObjectId, RunOutcome, ScriptInstance};

/// Handle to an instance owned by a [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Summary of one [`Scheduler::tick`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub slices: u32,
    pub instructions: u64,
    pub faults: Vec<(InstanceId, FaultReport)>,
}

/// Owns the instances of one region, the built-in table and a
/// deterministic clock.
#[derive(Debug)]
pub struct Scheduler {
    config: VmConfig,
    builtins: BuiltinTable,
    instances: BTreeMap<InstanceId, ScriptInstance>,
    next_id: u64,
    clock: Duration,
    /// Instance visited first on the previous tick.
    last_first: Option<InstanceId>,
}

impl Scheduler {
    pub fn new(config: VmConfig, builtins: BuiltinTable) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            builtins,
            instances: BTreeMap::new(),
            next_id: 0,
            clock: Duration::ZERO,
            last_first: None,
        })
    }

    /// Start a new instance of `image` attached to `object`.
    pub fn create(&mut self, image: VerifiedImage, object: ObjectId, name: &str) -> InstanceId {
        let id = InstanceId(self.next_id);
        self.next_id += 1;
        let instance = ScriptInstance::new(image, object, name, &self.config);
        debug!(instance = %id, script = name, object = %object, "instance created");
        self.instances.insert(id, instance);
        id
    }

    /// Destroy an instance, discarding its queue and pending tickets.
    pub fn remove(&mut self, id: InstanceId) -> Option<ScriptInstance> {
        let removed = self.instances.remove(&id);
        if removed.is_some() {
            debug!(instance = %id, "instance removed");
        }
        removed
    }

    /// Reset an instance to state 0. Returns false if it does not exist.
    pub fn reset(&mut self, id: InstanceId) -> bool {
        match self.instances.get_mut(&id) {
            Some(instance) => {
                instance.reset();
                true
            }
            None => false,
        }
    }

    pub fn instance(&self, id: InstanceId) -> Option<&ScriptInstance> {
        self.instances.get(&id)
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> Option<&mut ScriptInstance> {
        self.instances.get_mut(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.instances.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Post an event to an instance. `None` if it does not exist.
    pub fn post(&mut self, id: InstanceId, record: EventRecord) -> Option<Delivery> {
        self.instances.get_mut(&id).map(|i| i.post(record))
    }

    /// Complete an asynchronous request with its result event. A no-op
    /// returning false if the instance is gone or no longer waits on
    /// `ticket`.
    pub fn complete(&mut self, id: InstanceId, ticket: Ticket, record: EventRecord) -> bool {
        self.instances
            .get_mut(&id)
            .is_some_and(|i| i.complete(ticket, record))
    }

    /// Time since the scheduler started.
    pub fn now(&self) -> Duration {
        self.clock
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn builtins_mut(&mut self) -> &mut BuiltinTable {
        &mut self.builtins
    }

    /// Advance the clock by `dt` and grant slices round-robin until no
    /// instance is ready or the slice limit is reached.
    pub fn tick(&mut self, dt: Duration) -> TickReport {
        self.clock = self.clock.saturating_add(dt);
        let now = self.clock;
        let mut report = TickReport::default();

        let mut order: Vec<InstanceId> = self.instances.keys().copied().collect();
        if let Some(last) = self.last_first {
            let start = order.partition_point(|id| *id <= last);
            order.rotate_left(start);
        }
        self.last_first = None;

        'passes: loop {
            let mut progressed = false;
            for &id in &order {
                if report.slices >= self.config.max_slices_per_tick {
                    break 'passes;
                }
                let Some(instance) = self.instances.get_mut(&id) else {
                    continue;
                };
                if !instance.is_ready(now) {
                    continue;
                }
                if self.last_first.is_none() {
                    self.last_first = Some(id);
                }

                let before = instance.executed();
                let outcome = instance.run(self.config.budget_per_slice, &mut self.builtins, now);
                let executed = instance.executed() - before;
                report.slices += 1;
                report.instructions += executed;
                progressed = true;
                trace!(instance = %id, executed, outcome = ?outcome, "slice");

                if let RunOutcome::Faulted(fault) = outcome {
                    warn!(instance = %id, script = %instance.name(), %fault, "script fault");
                    report.faults.push((id, fault));
                }
            }
            if !progressed {
                break;
            }
        }

        if !report.faults.is_empty() {
            info!(
                slices = report.slices,
                instructions = report.instructions,
                faults = report.faults.len(),
                "tick finished with faults"
            );
        }
        report
    }
}
