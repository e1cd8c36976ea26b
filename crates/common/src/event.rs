//! Event kinds, their fixed parameter signatures, and state event masks.
//!
//! The numbering matches the event mask bit positions of compiled
//! images: bit `n` of a state's mask is set when the state handles the
//! event with kind `n`.

use crate::error::DecodeError;
use crate::type_tag::TypeTag;
use crate::type_tag::TypeTag::{
    Integer as I, Key as K, List as L, Rotation as R, String as S, Vector as V,
};

/// An event a script state can handle.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    StateEntry = 0,
    StateExit = 1,
    TouchStart = 2,
    Touch = 3,
    TouchEnd = 4,
    CollisionStart = 5,
    Collision = 6,
    CollisionEnd = 7,
    LandCollisionStart = 8,
    LandCollision = 9,
    LandCollisionEnd = 10,
    Timer = 11,
    Listen = 12,
    OnRez = 13,
    Sensor = 14,
    NoSensor = 15,
    Control = 16,
    Money = 17,
    Email = 18,
    AtTarget = 19,
    NotAtTarget = 20,
    AtRotTarget = 21,
    NotAtRotTarget = 22,
    RunTimePermissions = 23,
    Changed = 24,
    Attach = 25,
    Dataserver = 26,
    LinkMessage = 27,
    MovingStart = 28,
    MovingEnd = 29,
    ObjectRez = 30,
    RemoteData = 31,
    HttpResponse = 32,
}

/// All event kinds in mask-bit order.
pub const ALL_EVENT_KINDS: [EventKind; 33] = [
    EventKind::StateEntry,
    EventKind::StateExit,
    EventKind::TouchStart,
    EventKind::Touch,
    EventKind::TouchEnd,
    EventKind::CollisionStart,
    EventKind::Collision,
    EventKind::CollisionEnd,
    EventKind::LandCollisionStart,
    EventKind::LandCollision,
    EventKind::LandCollisionEnd,
    EventKind::Timer,
    EventKind::Listen,
    EventKind::OnRez,
    EventKind::Sensor,
    EventKind::NoSensor,
    EventKind::Control,
    EventKind::Money,
    EventKind::Email,
    EventKind::AtTarget,
    EventKind::NotAtTarget,
    EventKind::AtRotTarget,
    EventKind::NotAtRotTarget,
    EventKind::RunTimePermissions,
    EventKind::Changed,
    EventKind::Attach,
    EventKind::Dataserver,
    EventKind::LinkMessage,
    EventKind::MovingStart,
    EventKind::MovingEnd,
    EventKind::ObjectRez,
    EventKind::RemoteData,
    EventKind::HttpResponse,
];

impl TryFrom<u8> for EventKind {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        ALL_EVENT_KINDS
            .get(value as usize)
            .copied()
            .ok_or(DecodeError::InvalidEventKind(value))
    }
}

impl EventKind {
    /// Script-facing handler name, e.g. `touch_start`.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::StateEntry => "state_entry",
            EventKind::StateExit => "state_exit",
            EventKind::TouchStart => "touch_start",
            EventKind::Touch => "touch",
            EventKind::TouchEnd => "touch_end",
            EventKind::CollisionStart => "collision_start",
            EventKind::Collision => "collision",
            EventKind::CollisionEnd => "collision_end",
            EventKind::LandCollisionStart => "land_collision_start",
            EventKind::LandCollision => "land_collision",
            EventKind::LandCollisionEnd => "land_collision_end",
            EventKind::Timer => "timer",
            EventKind::Listen => "listen",
            EventKind::OnRez => "on_rez",
            EventKind::Sensor => "sensor",
            EventKind::NoSensor => "no_sensor",
            EventKind::Control => "control",
            EventKind::Money => "money",
            EventKind::Email => "email",
            EventKind::AtTarget => "at_target",
            EventKind::NotAtTarget => "not_at_target",
            EventKind::AtRotTarget => "at_rot_target",
            EventKind::NotAtRotTarget => "not_at_rot_target",
            EventKind::RunTimePermissions => "run_time_permissions",
            EventKind::Changed => "changed",
            EventKind::Attach => "attach",
            EventKind::Dataserver => "dataserver",
            EventKind::LinkMessage => "link_message",
            EventKind::MovingStart => "moving_start",
            EventKind::MovingEnd => "moving_end",
            EventKind::ObjectRez => "object_rez",
            EventKind::RemoteData => "remote_data",
            EventKind::HttpResponse => "http_response",
        }
    }

    /// Look up a kind by handler name.
    pub fn from_name(name: &str) -> Option<Self> {
        ALL_EVENT_KINDS.iter().copied().find(|k| k.name() == name)
    }

    /// Parameter types the handler receives, in order.
    pub fn signature(&self) -> &'static [TypeTag] {
        match self {
            EventKind::StateEntry
            | EventKind::StateExit
            | EventKind::Timer
            | EventKind::NoSensor
            | EventKind::NotAtTarget
            | EventKind::NotAtRotTarget
            | EventKind::MovingStart
            | EventKind::MovingEnd => &[],
            EventKind::TouchStart
            | EventKind::Touch
            | EventKind::TouchEnd
            | EventKind::CollisionStart
            | EventKind::Collision
            | EventKind::CollisionEnd
            | EventKind::OnRez
            | EventKind::Sensor
            | EventKind::RunTimePermissions
            | EventKind::Changed => &[I],
            EventKind::LandCollisionStart
            | EventKind::LandCollision
            | EventKind::LandCollisionEnd => &[V],
            EventKind::Listen => &[I, S, K, S],
            EventKind::Control => &[K, I, I],
            EventKind::Money => &[K, I],
            EventKind::Email => &[S, S, S, S, I],
            EventKind::AtTarget => &[I, V, V],
            EventKind::AtRotTarget => &[I, R, R],
            EventKind::Attach | EventKind::ObjectRez => &[K],
            EventKind::Dataserver => &[K, S],
            EventKind::LinkMessage => &[I, I, S, K],
            EventKind::RemoteData => &[I, K, K, S, I, S],
            EventKind::HttpResponse => &[K, I, L, S],
        }
    }

    /// This kind's bit in an [`EventMask`].
    pub fn bit(&self) -> u64 {
        1u64 << (*self as u8)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of event kinds a state handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EventMask(pub u64);

impl EventMask {
    pub const EMPTY: EventMask = EventMask(0);

    pub fn contains(&self, kind: EventKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn insert(&mut self, kind: EventKind) {
        self.0 |= kind.bit();
    }

    /// Kinds present in the mask, in bit order.
    pub fn kinds(&self) -> impl Iterator<Item = EventKind> + '_ {
        ALL_EVENT_KINDS.iter().copied().filter(|k| self.contains(*k))
    }

    /// Bits above the highest defined kind.
    pub fn unknown_bits(&self) -> u64 {
        self.0 & !((1u64 << ALL_EVENT_KINDS.len()) - 1)
    }
}

impl FromIterator<EventKind> for EventMask {
    fn from_iter<T: IntoIterator<Item = EventKind>>(iter: T) -> Self {
        let mut mask = EventMask::EMPTY;
        for kind in iter {
            mask.insert(kind);
        }
        mask
    }
}
