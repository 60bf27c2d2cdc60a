// SPDX-License-Identifier: MIT OR Apache-2.0
//! Track definitions and the track evaluator.

use crate::curve::{
    ColorCurve, CurveSource, CurveValue, EventCurve, LinearColor, ScalarCurve, Vec3, VectorCurve,
};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Kind of track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    /// Scalar value
    Scalar,
    /// 3D vector value
    Vector,
    /// Linear color value
    Color,
    /// Discrete triggers
    Event,
}

impl TrackKind {
    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Scalar => "Scalar",
            Self::Vector => "Vector",
            Self::Color => "Color",
            Self::Event => "Event",
        }
    }
}

/// Curve a track samples. `None` means the curve is absent.
#[derive(Debug, Clone)]
pub enum TrackCurve {
    /// Scalar curve
    Scalar(Option<ScalarCurve>),
    /// Vector curve
    Vector(Option<VectorCurve>),
    /// Color curve
    Color(Option<ColorCurve>),
    /// Trigger times
    Event(Option<Rc<EventCurve>>),
}

impl TrackCurve {
    /// Kind of track this curve feeds
    pub fn kind(&self) -> TrackKind {
        match self {
            Self::Scalar(_) => TrackKind::Scalar,
            Self::Vector(_) => TrackKind::Vector,
            Self::Color(_) => TrackKind::Color,
            Self::Event(_) => TrackKind::Event,
        }
    }

    /// Whether a curve is attached
    pub fn is_present(&self) -> bool {
        match self {
            Self::Scalar(c) => c.is_some(),
            Self::Vector(c) => c.is_some(),
            Self::Color(c) => c.is_some(),
            Self::Event(c) => c.is_some(),
        }
    }
}

/// Value produced by evaluating a continuous track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TrackValue {
    /// Scalar
    Scalar(f32),
    /// Vector
    Vector(Vec3),
    /// Color
    Color(LinearColor),
}

impl TrackValue {
    /// Get as scalar if possible
    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            Self::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as vector if possible
    pub fn as_vector(&self) -> Option<Vec3> {
        match self {
            Self::Vector(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as color if possible
    pub fn as_color(&self) -> Option<LinearColor> {
        match self {
            Self::Color(v) => Some(*v),
            _ => None,
        }
    }
}

/// A named track
#[derive(Debug, Clone)]
pub struct Track {
    /// Track name
    pub name: String,
    /// Sampled curve
    pub curve: TrackCurve,
}

impl Track {
    /// Create a scalar track
    pub fn scalar(name: impl Into<String>, curve: impl CurveSource<f32> + 'static) -> Self {
        Self {
            name: name.into(),
            curve: TrackCurve::Scalar(Some(Rc::new(curve))),
        }
    }

    /// Create a vector track
    pub fn vector(name: impl Into<String>, curve: impl CurveSource<Vec3> + 'static) -> Self {
        Self {
            name: name.into(),
            curve: TrackCurve::Vector(Some(Rc::new(curve))),
        }
    }

    /// Create a color track
    pub fn color(name: impl Into<String>, curve: impl CurveSource<LinearColor> + 'static) -> Self {
        Self {
            name: name.into(),
            curve: TrackCurve::Color(Some(Rc::new(curve))),
        }
    }

    /// Create an event track
    pub fn event(name: impl Into<String>, curve: EventCurve) -> Self {
        Self {
            name: name.into(),
            curve: TrackCurve::Event(Some(Rc::new(curve))),
        }
    }

    /// Kind of this track
    pub fn kind(&self) -> TrackKind {
        self.curve.kind()
    }

    /// Trigger times; empty for continuous tracks
    pub fn trigger_times(&self) -> &[f32] {
        match &self.curve {
            TrackCurve::Event(Some(curve)) => curve.trigger_times(),
            _ => &[],
        }
    }

    /// Latest trigger time of an event track
    pub fn last_trigger(&self) -> Option<f32> {
        match &self.curve {
            TrackCurve::Event(Some(curve)) => curve.last_trigger(),
            _ => None,
        }
    }

    /// Evaluate at `time`; see [`evaluate`]
    pub fn evaluate(&self, time: f32) -> Option<TrackValue> {
        evaluate(self, time)
    }
}

/// Evaluate a continuous track at `time`.
///
/// Time is clamped into the curve's domain, so values never extrapolate past
/// the first or last key. An absent curve yields the zero value of its kind
/// (`0.0`, `[0.0; 3]` or [`LinearColor::BLACK`]). Event tracks return `None`.
pub fn evaluate(track: &Track, time: f32) -> Option<TrackValue> {
    match &track.curve {
        TrackCurve::Scalar(curve) => {
            Some(TrackValue::Scalar(sample_clamped(curve.as_deref(), time)))
        }
        TrackCurve::Vector(curve) => {
            Some(TrackValue::Vector(sample_clamped(curve.as_deref(), time)))
        }
        TrackCurve::Color(curve) => Some(TrackValue::Color(sample_clamped(curve.as_deref(), time))),
        TrackCurve::Event(_) => None,
    }
}

/// Sample a curve with `time` clamped into its domain
pub fn sample_clamped<V: CurveValue>(curve: Option<&dyn CurveSource<V>>, time: f32) -> V {
    let Some(curve) = curve else {
        return V::ZERO;
    };
    let Some((start, end)) = curve.time_range() else {
        return V::ZERO;
    };

    let time = if time.is_nan() { start } else { time.clamp(start, end) };
    curve.sample(time)
}
