//! The concrete value payloads carried by a [`super::Object`] of kind
//! `Value` (spec.md §3 "Object").

use arcstr::ArcStr;
use std::fmt;
use std::sync::Arc as StdArc;

use crate::types::Type;

/// Opaque frame-time value, expressed as an integer tick count.
///
/// One tick is `1 / (705_600_000 * 4/5) s`, matching spec.md §9's open
/// question resolution: the source mixes two incompatible time types, and
/// only one — this one — is exposed by the core. A rate is only
/// representable exactly if it evenly divides [`FrameTime::TICKS_PER_SECOND`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct FrameTime {
    ticks: i64,
}

impl FrameTime {
    /// `705_600_000 * 4 / 5`.
    pub const TICKS_PER_SECOND: i64 = 564_480_000;

    pub const fn from_ticks(ticks: i64) -> Self {
        FrameTime { ticks }
    }

    pub const fn ticks(&self) -> i64 {
        self.ticks
    }

    /// Construct a `FrameTime` for `frame_index` at `fps_num/fps_den`
    /// frames per second, or `None` if that rate does not evenly divide
    /// [`FrameTime::TICKS_PER_SECOND`].
    pub fn from_frame_rate(frame_index: i64, fps_num: i64, fps_den: i64) -> Option<Self> {
        if fps_num <= 0 || fps_den <= 0 {
            return None;
        }
        let ticks_per_frame_num = Self::TICKS_PER_SECOND.checked_mul(fps_den)?;
        if ticks_per_frame_num % fps_num != 0 {
            return None;
        }
        let ticks_per_frame = ticks_per_frame_num / fps_num;
        Some(FrameTime { ticks: frame_index.checked_mul(ticks_per_frame)? })
    }

    pub fn checked_add(self, rhs: FrameTime) -> Option<Self> {
        self.ticks.checked_add(rhs.ticks).map(FrameTime::from_ticks)
    }

    pub fn checked_sub(self, rhs: FrameTime) -> Option<Self> {
        self.ticks.checked_sub(rhs.ticks).map(FrameTime::from_ticks)
    }
}

/// A request to evaluate a term at a particular frame time (spec.md §6).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FrameDemand {
    pub time: FrameTime,
}

/// Implemented by boxed user values so they can report their own nominal
/// [`Type`] and be cloned without knowing their concrete Rust type.
pub trait UserValue: fmt::Debug + Send + Sync {
    fn type_of(&self) -> Type;
    fn clone_boxed(&self) -> StdArc<dyn UserValue>;
    fn as_any(&self) -> &dyn std::any::Any;
}

/// A runtime value payload (spec.md §3 "Object" variant `Value`).
#[derive(Clone, Debug)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(ArcStr),
    FrameTime(FrameTime),
    User(StdArc<dyn UserValue>),
}

impl Value {
    pub fn type_of(&self) -> Type {
        match self {
            Value::Int(_) => Type::builtin_int(),
            Value::Float(_) => Type::builtin_float(),
            Value::Bool(_) => Type::builtin_bool(),
            Value::String(_) => Type::builtin_string(),
            Value::FrameTime(_) => Type::builtin_frame_time(),
            Value::User(u) => u.type_of(),
        }
    }
}
