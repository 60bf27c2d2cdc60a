// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-object timeline runtime.
//!
//! This crate advances named timelines owned by world objects:
//! - Scalar, vector and color curve tracks
//! - Event tracks with directional trigger crossing
//! - Update, Finished, value and event notification channels
//! - One instance per (owner, timeline name), with deferred autoplay
//!
//! ## Architecture
//!
//! The runtime is built on:
//! - An [`ObjectTable`] of owners and listener targets, addressed by
//!   generational handles
//! - Capability tables resolving listener functions by name at bind time
//! - A [`TimelineInstance`] state machine per owner and name
//! - An [`InstanceRegistry`] owning every instance
//! - A [`TickScheduler`] stepping playing instances once per frame

pub mod binding;
pub mod config;
pub mod curve;
pub mod definition;
pub mod error;
pub mod object;
pub mod registry;
pub mod replication;
pub mod scheduler;
pub mod timeline;
pub mod track;
pub mod trigger;

pub use binding::{
    BindOutcome, BindingKey, Callback, CapabilityTable, Channel, ListenerError, ListenerFault,
    ListenerRegistry, ListenerResult, NotifyContext, Payload, PlaybackRequest, Signature,
};
pub use config::{ClockConfig, ConfigError, RuntimeConfig};
pub use curve::{
    ColorCurve, CurveKey, CurveSource, CurveValue, EventCurve, FnCurve, InterpolationMode,
    KeyedCurve, LinearColor, ScalarCurve, Vec3, VectorCurve,
};
pub use definition::{TimelineBindingEntry, TimelineDefinition, TimelineLibrary};
pub use error::{Result, TimelineError};
pub use object::{LivenessToken, ObjectHandle, ObjectTable};
pub use registry::{InstanceKey, InstanceRegistry};
pub use replication::ReplicatedTimeline;
pub use scheduler::{FrameTime, InstanceFault, TickReport, TickScheduler};
pub use timeline::{
    LengthMode, PlaybackState, StepReport, TimelineId, TimelineInstance, DEFAULT_LENGTH,
};
pub use track::{evaluate, Track, TrackCurve, TrackKind, TrackValue};
pub use trigger::{DetectorState, Direction, TriggerDetector};
