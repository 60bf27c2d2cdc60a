// SPDX-License-Identifier: MIT OR Apache-2.0
//! Curve sampling for timeline tracks.
//!
//! Curves arrive already authored; this module only knows how to sample them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// 3D vector value
pub type Vec3 = [f32; 3];

/// Linear-space RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearColor {
    /// Red
    pub r: f32,
    /// Green
    pub g: f32,
    /// Blue
    pub b: f32,
    /// Alpha
    pub a: f32,
}

impl LinearColor {
    /// Opaque black, the value of an absent color curve
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    /// Opaque white
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    /// Create a color
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for LinearColor {
    fn default() -> Self {
        Self::BLACK
    }
}

/// Value type a curve can produce
pub trait CurveValue: Copy + fmt::Debug + PartialEq + 'static {
    /// Value reported for an absent or empty curve
    const ZERO: Self;

    /// Linear interpolation between two values
    fn lerp(a: Self, b: Self, t: f32) -> Self;
}

impl CurveValue for f32 {
    const ZERO: Self = 0.0;

    fn lerp(a: Self, b: Self, t: f32) -> Self {
        a + (b - a) * t
    }
}

impl CurveValue for Vec3 {
    const ZERO: Self = [0.0; 3];

    fn lerp(a: Self, b: Self, t: f32) -> Self {
        [
            <f32 as CurveValue>::lerp(a[0], b[0], t),
            <f32 as CurveValue>::lerp(a[1], b[1], t),
            <f32 as CurveValue>::lerp(a[2], b[2], t),
        ]
    }
}

impl CurveValue for LinearColor {
    const ZERO: Self = Self::BLACK;

    fn lerp(a: Self, b: Self, t: f32) -> Self {
        Self::new(
            <f32 as CurveValue>::lerp(a.r, b.r, t),
            <f32 as CurveValue>::lerp(a.g, b.g, t),
            <f32 as CurveValue>::lerp(a.b, b.b, t),
            <f32 as CurveValue>::lerp(a.a, b.a, t),
        )
    }
}

/// Interpolation mode between two keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterpolationMode {
    /// Hold the key value until the next key
    Constant,
    /// Linear interpolation
    #[default]
    Linear,
}

/// A key on a [`KeyedCurve`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveKey<V> {
    /// Time in seconds
    pub time: f32,
    /// Value at this key
    pub value: V,
    /// Interpolation towards the next key
    pub interpolation: InterpolationMode,
}

impl<V> CurveKey<V> {
    /// Create a linear key
    pub fn new(time: f32, value: V) -> Self {
        Self {
            time,
            value,
            interpolation: InterpolationMode::Linear,
        }
    }

    /// Set interpolation mode
    pub fn with_interpolation(mut self, mode: InterpolationMode) -> Self {
        self.interpolation = mode;
        self
    }
}

/// A sampling function `f(time) -> value` over a finite domain
pub trait CurveSource<V>: fmt::Debug {
    /// Sample at `time`. Callers clamp `time` into [`CurveSource::time_range`] first.
    fn sample(&self, time: f32) -> V;

    /// Domain of the curve, `None` when it has no data
    fn time_range(&self) -> Option<(f32, f32)>;
}

/// Shared scalar curve
pub type ScalarCurve = Rc<dyn CurveSource<f32>>;
/// Shared vector curve
pub type VectorCurve = Rc<dyn CurveSource<Vec3>>;
/// Shared color curve
pub type ColorCurve = Rc<dyn CurveSource<LinearColor>>;

/// Piecewise curve through sorted keys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyedCurve<V> {
    keys: Vec<CurveKey<V>>,
}

impl<V: CurveValue> KeyedCurve<V> {
    /// Build from keys in any order
    pub fn from_keys(keys: impl IntoIterator<Item = CurveKey<V>>) -> Self {
        let mut keys: Vec<_> = keys.into_iter().filter(|k| k.time.is_finite()).collect();
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    /// Build a linear curve through `(time, value)` points
    pub fn linear(points: impl IntoIterator<Item = (f32, V)>) -> Self {
        Self::from_keys(points.into_iter().map(|(time, value)| CurveKey::new(time, value)))
    }

    /// Single-key curve holding `value`
    pub fn constant(value: V) -> Self {
        Self::from_keys([CurveKey::new(0.0, value)])
    }

    /// Keys sorted by time
    pub fn keys(&self) -> &[CurveKey<V>] {
        &self.keys
    }

    /// Whether the curve has no keys
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<V: CurveValue> CurveSource<V> for KeyedCurve<V> {
    fn sample(&self, time: f32) -> V {
        let (Some(first), Some(last)) = (self.keys.first(), self.keys.last()) else {
            return V::ZERO;
        };

        // First key strictly after time; a key hit exactly starts its own segment
        match self.keys.iter().position(|k| k.time > time) {
            None => last.value,
            Some(0) => first.value,
            Some(idx) => {
                let a = &self.keys[idx - 1];
                let b = &self.keys[idx];
                let span = b.time - a.time;
                if span.abs() < f32::EPSILON {
                    return b.value;
                }
                match a.interpolation {
                    InterpolationMode::Constant => a.value,
                    InterpolationMode::Linear => V::lerp(a.value, b.value, (time - a.time) / span),
                }
            }
        }
    }

    fn time_range(&self) -> Option<(f32, f32)> {
        Some((self.keys.first()?.time, self.keys.last()?.time))
    }
}

/// Curve backed by a closure over an explicit domain
pub struct FnCurve<V> {
    range: (f32, f32),
    sampler: Box<dyn Fn(f32) -> V>,
}

impl<V> FnCurve<V> {
    /// Create a curve defined over `[start, end]`
    pub fn new(start: f32, end: f32, sampler: impl Fn(f32) -> V + 'static) -> Self {
        Self {
            range: (start.min(end), start.max(end)),
            sampler: Box::new(sampler),
        }
    }
}

impl<V> CurveSource<V> for FnCurve<V> {
    fn sample(&self, time: f32) -> V {
        (self.sampler)(time)
    }

    fn time_range(&self) -> Option<(f32, f32)> {
        Some(self.range)
    }
}

impl<V> fmt::Debug for FnCurve<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCurve").field("range", &self.range).finish_non_exhaustive()
    }
}

/// Trigger times of an event track, kept sorted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventCurve {
    triggers: Vec<f32>,
}

impl EventCurve {
    /// Build from trigger times in any order
    pub fn new(times: impl IntoIterator<Item = f32>) -> Self {
        let mut triggers: Vec<f32> = times.into_iter().filter(|t| t.is_finite()).collect();
        triggers.sort_by(f32::total_cmp);
        Self { triggers }
    }

    /// Trigger times in ascending order
    pub fn trigger_times(&self) -> &[f32] {
        &self.triggers
    }

    /// Latest trigger time
    pub fn last_trigger(&self) -> Option<f32> {
        self.triggers.last().copied()
    }

    /// Whether the curve has no triggers
    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }
}
