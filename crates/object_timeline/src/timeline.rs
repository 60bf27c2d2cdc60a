// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline instance: the per-owner playback state machine.
//!
//! An instance owns its tracks, one trigger detector per event track and the
//! listener bindings of every channel. Each step it moves the cursor, then
//! notifies in a fixed order: track values, event crossings, Update, and
//! Finished when a non-looping playback reached an end this step.

use crate::binding::{
    BindOutcome, Channel, ListenerFault, ListenerRegistry, NotifyContext, Payload, PlaybackRequest,
};
use crate::curve::{ColorCurve, EventCurve, LinearColor, ScalarCurve, Vec3, VectorCurve};
use crate::definition::TimelineDefinition;
use crate::error::{Result, TimelineError};
use crate::object::{ObjectHandle, ObjectTable};
use crate::track::{Track, TrackCurve, TrackKind, TrackValue};
use crate::trigger::{DetectorState, Direction, TriggerDetector};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use uuid::Uuid;

/// Length of a timeline that was not given one
pub const DEFAULT_LENGTH: f32 = 5.0;

/// Unique identifier for a timeline instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimelineId(pub Uuid);

impl TimelineId {
    /// Create a new random timeline ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TimelineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TimelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Not advancing
    #[default]
    Stopped,
    /// Cursor increases each step
    PlayingForward,
    /// Cursor decreases each step
    PlayingBackward,
}

/// How the timeline length is determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LengthMode {
    /// Stored constant
    #[default]
    Explicit,
    /// Latest trigger time across all event tracks
    LastTrigger,
}

#[derive(Debug)]
struct TrackSlot {
    track: Track,
    detector: TriggerDetector,
}

impl TrackSlot {
    fn new(track: Track) -> Self {
        Self {
            track,
            detector: TriggerDetector::new(),
        }
    }
}

/// What happened during one evaluated step
#[derive(Debug, Default)]
pub struct StepReport {
    /// Cursor after the step
    pub position: f32,
    /// Event tracks that fired, in track order
    pub fired: Vec<String>,
    /// Whether Finished was notified
    pub finished: bool,
    /// Listener errors raised during the step
    pub faults: Vec<ListenerFault>,
}

impl StepReport {
    /// Report for a step that evaluated nothing
    pub fn idle(position: f32) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

/// A playing (or stopped) timeline bound to one owner
#[derive(Debug)]
pub struct TimelineInstance {
    id: TimelineId,
    name: String,
    owner: ObjectHandle,
    tracks: IndexMap<String, TrackSlot>,
    position: f32,
    direction: Direction,
    playing: bool,
    length: f32,
    explicit_length: f32,
    length_mode: LengthMode,
    looping: bool,
    play_rate: f32,
    ignore_time_dilation: bool,
    replicated: bool,
    pending_autoplay: bool,
    bindings: ListenerRegistry,
}

impl TimelineInstance {
    /// Create an empty, stopped timeline
    pub fn new(name: impl Into<String>, owner: ObjectHandle) -> Self {
        Self {
            id: TimelineId::new(),
            name: name.into(),
            owner,
            tracks: IndexMap::new(),
            position: 0.0,
            direction: Direction::Forward,
            playing: false,
            length: DEFAULT_LENGTH,
            explicit_length: DEFAULT_LENGTH,
            length_mode: LengthMode::Explicit,
            looping: false,
            play_rate: 1.0,
            ignore_time_dilation: false,
            replicated: false,
            pending_autoplay: false,
            bindings: ListenerRegistry::new(),
        }
    }

    /// Construct an inert instance from an authored definition.
    ///
    /// Autoplay is only recorded here; call [`TimelineInstance::activate`]
    /// once every listener is bound.
    pub fn from_definition(definition: &TimelineDefinition, owner: ObjectHandle) -> Self {
        let mut instance = Self::new(definition.name.clone(), owner);
        for track in &definition.tracks {
            instance
                .tracks
                .insert(track.name.clone(), TrackSlot::new(track.clone()));
        }
        instance.explicit_length = definition.length.max(0.0);
        instance.length_mode = definition.length_mode;
        instance.looping = definition.looping;
        instance.set_play_rate(definition.play_rate);
        instance.ignore_time_dilation = definition.ignore_time_dilation;
        instance.replicated = definition.replicated;
        instance.pending_autoplay = definition.autoplay;
        instance.resolve_length();
        instance
    }

    /// Second construction phase: start deferred autoplay.
    ///
    /// Detectors are primed at the cursor so a trigger sitting on the start
    /// position fires on the first step. Returns whether playback started.
    pub fn activate(&mut self) -> bool {
        if !std::mem::take(&mut self.pending_autoplay) {
            return false;
        }

        tracing::info!(timeline = %self.name, owner = %self.owner, "Autoplaying timeline");
        self.prime_detectors();
        self.play();
        true
    }

    /// Whether autoplay is waiting for [`TimelineInstance::activate`]
    pub fn is_pending_autoplay(&self) -> bool {
        self.pending_autoplay
    }

    // --- Playback -------------------------------------------------------

    /// Play forward from the current cursor
    pub fn play(&mut self) {
        self.direction = Direction::Forward;
        self.playing = true;
    }

    /// Jump to the start and play forward
    pub fn play_from_start(&mut self) {
        self.position = 0.0;
        self.prime_detectors();
        self.play();
    }

    /// Play backward from the current cursor
    pub fn reverse(&mut self) {
        self.direction = Direction::Backward;
        self.playing = true;
    }

    /// Jump to the end and play backward
    pub fn reverse_from_end(&mut self) {
        self.position = self.length;
        self.prime_detectors();
        self.reverse();
    }

    /// Stop advancing; the cursor stays where it is
    pub fn stop(&mut self) {
        self.playing = false;
    }

    /// Move the cursor to `position`, clamped to `[0, length]`.
    ///
    /// Event detection only runs with `fire_events`; value and Update
    /// notifications only with `fire_update`. Play state is unchanged and
    /// detectors are left alone when `fire_events` is false.
    pub fn set_position(
        &mut self,
        position: f32,
        fire_events: bool,
        fire_update: bool,
    ) -> StepReport {
        self.position = self.clamp_to_length(position);
        self.dispatch(fire_update, fire_events, false)
    }

    /// Cursor change coming from an input control; fires events and Update
    pub fn set_new_time(&mut self, time: f32) -> StepReport {
        self.set_position(time, true, true)
    }

    /// Advance by `delta` seconds of world time and notify listeners.
    ///
    /// Does nothing while stopped.
    pub fn advance(&mut self, delta: f32) -> StepReport {
        if !self.playing || !delta.is_finite() {
            return StepReport::idle(self.position);
        }

        let mut position = self.position + delta * self.play_rate * self.direction.sign();
        if !position.is_finite() {
            return StepReport::idle(self.position);
        }
        let mut finished = false;

        if self.looping {
            if self.length <= 0.0 {
                position = 0.0;
            } else if position > self.length || position < 0.0 {
                // Keep the overshoot so stepping stays uniform across the wrap
                position = position.rem_euclid(self.length);
            }
        } else if position > self.length {
            position = self.length;
            finished = true;
        } else if position < 0.0 {
            position = 0.0;
            finished = true;
        }

        if finished {
            self.playing = false;
            tracing::debug!(
                timeline = %self.name,
                owner = %self.owner,
                position,
                "Timeline finished"
            );
        }

        self.position = position;
        self.dispatch(true, true, finished)
    }

    fn dispatch(&mut self, fire_values: bool, fire_events: bool, finished: bool) -> StepReport {
        let position = self.position;
        let direction = self.direction;
        let mut report = StepReport::idle(position);

        let ctx = NotifyContext::new(&self.name, self.owner, position, direction, &self.bindings);

        if fire_values {
            for slot in self.tracks.values() {
                let name = slot.track.name.as_str();
                let faults = match slot.track.evaluate(position) {
                    Some(TrackValue::Scalar(v)) => {
                        self.bindings.notify(&ctx, &Channel::Scalar, Payload::Scalar(name, v))
                    }
                    Some(TrackValue::Vector(v)) => {
                        self.bindings.notify(&ctx, &Channel::Vector, Payload::Vector(name, v))
                    }
                    Some(TrackValue::Color(v)) => {
                        self.bindings.notify(&ctx, &Channel::Color, Payload::Color(name, v))
                    }
                    None => continue,
                };
                report.faults.extend(faults);
            }
        }

        if fire_events {
            for slot in self.tracks.values_mut() {
                let TrackCurve::Event(Some(curve)) = &slot.track.curve else {
                    continue;
                };
                if slot
                    .detector
                    .observe(position, direction, curve.trigger_times())
                    .is_none()
                {
                    continue;
                }

                let channel = Channel::event(slot.track.name.clone());
                report
                    .faults
                    .extend(self.bindings.notify(&ctx, &channel, Payload::Signal));
                report.fired.push(slot.track.name.clone());
            }
        }

        if fire_values {
            report
                .faults
                .extend(self.bindings.notify(&ctx, &Channel::Update, Payload::Signal));
        }

        if finished {
            report
                .faults
                .extend(self.bindings.notify(&ctx, &Channel::Finished, Payload::Signal));
            report.finished = true;
        }

        for fault in &report.faults {
            tracing::debug!(timeline = %self.name, "{fault}");
        }

        for request in ctx.into_requests() {
            self.apply_request(request);
        }

        report
    }

    fn apply_request(&mut self, request: PlaybackRequest) {
        match request {
            PlaybackRequest::Play => self.play(),
            PlaybackRequest::PlayFromStart => self.play_from_start(),
            PlaybackRequest::Reverse => self.reverse(),
            PlaybackRequest::ReverseFromEnd => self.reverse_from_end(),
            PlaybackRequest::Stop => self.stop(),
        }
    }

    fn prime_detectors(&mut self) {
        let position = self.position;
        for slot in self.tracks.values_mut() {
            if slot.track.kind() == TrackKind::Event {
                slot.detector.prime(position);
            }
        }
    }

    fn clamp_to_length(&self, position: f32) -> f32 {
        if position.is_nan() {
            0.0
        } else {
            position.clamp(0.0, self.length)
        }
    }

    /// Adopt play state and direction without priming detectors
    pub(crate) fn restore_playback(&mut self, playing: bool, direction: Direction) {
        self.playing = playing;
        self.direction = direction;
    }

    /// Place the cursor without evaluating anything
    pub(crate) fn place_cursor(&mut self, position: f32) {
        self.position = self.clamp_to_length(position);
    }

    // --- Tracks ---------------------------------------------------------

    /// Add or replace a track; a replaced track's detector is reset
    pub fn add_track(&mut self, track: Track) {
        self.tracks.insert(track.name.clone(), TrackSlot::new(track));
        self.resolve_length();
    }

    /// Remove a track
    pub fn remove_track(&mut self, name: &str) -> Option<Track> {
        let slot = self.tracks.shift_remove(name)?;
        self.resolve_length();
        Some(slot.track)
    }

    /// Set the curve of a scalar track, creating the track if needed
    pub fn set_scalar_curve(&mut self, name: &str, curve: Option<ScalarCurve>) {
        self.set_curve(name, TrackCurve::Scalar(curve));
    }

    /// Set the curve of a vector track, creating the track if needed
    pub fn set_vector_curve(&mut self, name: &str, curve: Option<VectorCurve>) {
        self.set_curve(name, TrackCurve::Vector(curve));
    }

    /// Set the curve of a color track, creating the track if needed
    pub fn set_color_curve(&mut self, name: &str, curve: Option<ColorCurve>) {
        self.set_curve(name, TrackCurve::Color(curve));
    }

    /// Set the triggers of an event track, creating the track if needed.
    ///
    /// The track's detector needs a new baseline afterwards.
    pub fn set_event_curve(&mut self, name: &str, curve: Option<EventCurve>) {
        self.set_curve(name, TrackCurve::Event(curve.map(Rc::new)));
    }

    /// Register an event track with its triggers
    pub fn register_event_track(&mut self, name: &str, curve: EventCurve) {
        self.set_event_curve(name, Some(curve));
    }

    fn set_curve(&mut self, name: &str, curve: TrackCurve) {
        match self.tracks.get_mut(name) {
            Some(slot) => {
                if slot.track.kind() != curve.kind() {
                    tracing::debug!(
                        timeline = %self.name,
                        track = name,
                        from = slot.track.kind().name(),
                        to = curve.kind().name(),
                        "Replacing track with a different kind"
                    );
                }
                slot.track.curve = curve;
                slot.detector.reset();
            }
            None => {
                let track = Track {
                    name: name.to_owned(),
                    curve,
                };
                self.tracks.insert(name.to_owned(), TrackSlot::new(track));
            }
        }
        self.resolve_length();
    }

    /// Get a track
    pub fn track(&self, name: &str) -> Option<&Track> {
        self.tracks.get(name).map(|slot| &slot.track)
    }

    /// Tracks in insertion order
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values().map(|slot| &slot.track)
    }

    /// Number of tracks
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Detector memory of an event track
    pub fn detector_state(&self, track: &str) -> Option<DetectorState> {
        self.tracks
            .get(track)
            .filter(|slot| slot.track.kind() == TrackKind::Event)
            .map(|slot| slot.detector.state())
    }

    /// Scalar curve of a track
    pub fn scalar_curve(&self, name: &str) -> Option<ScalarCurve> {
        match &self.track(name)?.curve {
            TrackCurve::Scalar(curve) => curve.clone(),
            _ => None,
        }
    }

    /// Vector curve of a track
    pub fn vector_curve(&self, name: &str) -> Option<VectorCurve> {
        match &self.track(name)?.curve {
            TrackCurve::Vector(curve) => curve.clone(),
            _ => None,
        }
    }

    /// Color curve of a track
    pub fn color_curve(&self, name: &str) -> Option<ColorCurve> {
        match &self.track(name)?.curve {
            TrackCurve::Color(curve) => curve.clone(),
            _ => None,
        }
    }

    /// Triggers of an event track
    pub fn event_curve(&self, name: &str) -> Option<&EventCurve> {
        match &self.track(name)?.curve {
            TrackCurve::Event(curve) => curve.as_deref(),
            _ => None,
        }
    }

    /// Sample a continuous track at `time`
    pub fn sample(&self, track: &str, time: f32) -> Result<TrackValue> {
        self.track(track)
            .and_then(|t| t.evaluate(time))
            .ok_or_else(|| TimelineError::TrackNotFound {
                timeline: self.name.clone(),
                track: track.to_owned(),
            })
    }

    /// Value of a continuous track at the cursor
    pub fn value(&self, track: &str) -> Option<TrackValue> {
        self.sample(track, self.position).ok()
    }

    /// Scalar value at the cursor
    pub fn scalar_value(&self, track: &str) -> Option<f32> {
        self.value(track)?.as_scalar()
    }

    /// Vector value at the cursor
    pub fn vector_value(&self, track: &str) -> Option<Vec3> {
        self.value(track)?.as_vector()
    }

    /// Color value at the cursor
    pub fn color_value(&self, track: &str) -> Option<LinearColor> {
        self.value(track)?.as_color()
    }

    // --- Parameters -----------------------------------------------------

    fn resolve_length(&mut self) {
        self.length = match self.length_mode {
            LengthMode::Explicit => self.explicit_length,
            LengthMode::LastTrigger => self
                .tracks
                .values()
                .filter_map(|slot| slot.track.last_trigger())
                .fold(0.0, f32::max),
        };
        self.position = self.clamp_to_length(self.position);
    }

    /// Set the explicit length
    pub fn set_length(&mut self, length: f32) {
        self.explicit_length = length.max(0.0);
        self.resolve_length();
    }

    /// Set the length mode
    pub fn set_length_mode(&mut self, mode: LengthMode) {
        self.length_mode = mode;
        self.resolve_length();
    }

    /// Set looping
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Set the play rate multiplier.
    ///
    /// Non-finite rates are ignored and the current rate is kept.
    pub fn set_play_rate(&mut self, rate: f32) {
        if !rate.is_finite() {
            tracing::warn!(timeline = %self.name, rate, "Ignoring non-finite play rate");
            return;
        }
        self.play_rate = rate;
    }

    /// Use the undilated clock when ticking
    pub fn set_ignore_time_dilation(&mut self, ignore: bool) {
        self.ignore_time_dilation = ignore;
    }

    // --- Queries --------------------------------------------------------

    /// Instance ID
    pub fn id(&self) -> TimelineId {
        self.id
    }

    /// Timeline name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owner
    pub fn owner(&self) -> ObjectHandle {
        self.owner
    }

    /// Cursor position
    pub fn position(&self) -> f32 {
        self.position
    }

    /// Resolved length
    pub fn length(&self) -> f32 {
        self.length
    }

    /// Length mode
    pub fn length_mode(&self) -> LengthMode {
        self.length_mode
    }

    /// Length in world seconds at the current play rate
    pub fn scaled_length(&self) -> f32 {
        self.length / self.play_rate
    }

    /// Play rate multiplier
    pub fn play_rate(&self) -> f32 {
        self.play_rate
    }

    /// Whether playback wraps at the ends
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Whether the undilated clock drives this timeline
    pub fn ignores_time_dilation(&self) -> bool {
        self.ignore_time_dilation
    }

    /// Whether the cursor is replicated to remote peers
    pub fn is_replicated(&self) -> bool {
        self.replicated
    }

    /// Direction of the last (or current) playback
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Whether the cursor advances each step
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Whether the direction is backward
    pub fn is_reversing(&self) -> bool {
        !self.direction.is_forward()
    }

    /// Current state
    pub fn state(&self) -> PlaybackState {
        match (self.playing, self.direction) {
            (false, _) => PlaybackState::Stopped,
            (true, Direction::Forward) => PlaybackState::PlayingForward,
            (true, Direction::Backward) => PlaybackState::PlayingBackward,
        }
    }

    // --- Listeners ------------------------------------------------------

    /// Listener bindings of this instance
    pub fn bindings(&self) -> &ListenerRegistry {
        &self.bindings
    }

    /// Subscribe `target.function` to `channel`
    pub fn bind(
        &self,
        objects: &ObjectTable,
        channel: Channel,
        target: ObjectHandle,
        function: &str,
    ) -> BindOutcome {
        self.bindings.bind(objects, channel, target, function)
    }

    /// Subscribe to Update
    pub fn bind_update(
        &self,
        objects: &ObjectTable,
        target: ObjectHandle,
        function: &str,
    ) -> BindOutcome {
        self.bind(objects, Channel::Update, target, function)
    }

    /// Subscribe to Finished
    pub fn bind_finished(
        &self,
        objects: &ObjectTable,
        target: ObjectHandle,
        function: &str,
    ) -> BindOutcome {
        self.bind(objects, Channel::Finished, target, function)
    }

    /// Subscribe to crossings of an event track
    pub fn bind_event(
        &self,
        objects: &ObjectTable,
        track: &str,
        target: ObjectHandle,
        function: &str,
    ) -> BindOutcome {
        self.bind(objects, Channel::event(track), target, function)
    }

    /// Remove every subscription of `target`
    pub fn unbind_all(&self, target: ObjectHandle) -> usize {
        self.bindings.unbind_all(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{CapabilityTable, ListenerError};
    use crate::curve::KeyedCurve;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    type Log = Rc<RefCell<Vec<String>>>;

    fn push(log: &Log, entry: impl Into<String>) {
        log.borrow_mut().push(entry.into());
    }

    /// Owner with Update, Finished and Click listeners that log their calls
    fn setup() -> (ObjectTable, ObjectHandle, Log) {
        let log = Log::default();
        let (a, b, c, d) = (log.clone(), log.clone(), log.clone(), log.clone());
        let caps = CapabilityTable::new()
            .with_signal("OnUpdate", move |ctx| {
                push(&a, format!("update@{:.2}", ctx.position()));
                Ok(())
            })
            .with_signal("OnFinished", move |_| {
                push(&b, "finished");
                Ok(())
            })
            .with_signal("OnClick", move |_| {
                push(&c, "click");
                Ok(())
            })
            .with_scalar("OnValue", move |_, track, value| {
                push(&d, format!("{track}={value:.2}"));
                Ok(())
            });

        let mut objects = ObjectTable::new();
        let owner = objects.spawn("Door", caps);
        (objects, owner, log)
    }

    fn timeline(owner: ObjectHandle, length: f32) -> TimelineInstance {
        let mut instance = TimelineInstance::new("Swing", owner);
        instance.set_length(length);
        instance
    }

    #[test]
    fn test_defaults() {
        let owner = ObjectTable::new().spawn("Door", CapabilityTable::new());
        let instance = TimelineInstance::new("Swing", owner);
        assert_eq!(instance.length(), DEFAULT_LENGTH);
        assert_eq!(instance.play_rate(), 1.0);
        assert_eq!(instance.state(), PlaybackState::Stopped);
        assert!(!instance.is_pending_autoplay());
    }

    #[test]
    fn test_state_transitions() {
        let (_, owner, _) = setup();
        let mut instance = timeline(owner, 2.0);
        instance.set_position(1.0, false, false);

        instance.play();
        assert_eq!(instance.state(), PlaybackState::PlayingForward);
        instance.reverse();
        assert_eq!(instance.state(), PlaybackState::PlayingBackward);
        assert_eq!(instance.position(), 1.0);
        instance.stop();
        assert_eq!(instance.state(), PlaybackState::Stopped);
        assert!(instance.is_reversing());

        instance.play_from_start();
        assert_eq!(instance.position(), 0.0);
        instance.reverse_from_end();
        assert_eq!(instance.position(), 2.0);
        assert_eq!(instance.state(), PlaybackState::PlayingBackward);
    }

    #[test]
    fn test_overshoot_clamps_then_finishes() {
        let (objects, owner, log) = setup();
        let mut instance = timeline(owner, 1.0);
        instance.bind_update(&objects, owner, "OnUpdate");
        instance.bind_finished(&objects, owner, "OnFinished");

        instance.set_position(0.9, false, false);
        instance.play();
        let report = instance.advance(0.4);

        assert_eq!(instance.position(), 1.0);
        assert!(report.finished);
        assert_eq!(instance.state(), PlaybackState::Stopped);
        assert_eq!(*log.borrow(), vec!["update@1.00".to_owned(), "finished".to_owned()]);

        // No further auto-advance
        let report = instance.advance(0.4);
        assert!(!report.finished);
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn test_backward_finishes_at_zero() {
        let (objects, owner, log) = setup();
        let mut instance = timeline(owner, 1.0);
        instance.bind_finished(&objects, owner, "OnFinished");
        instance.set_position(0.2, false, false);
        instance.reverse();

        assert!(!instance.advance(0.1).finished);
        assert!(instance.advance(0.5).finished);
        assert_eq!(instance.position(), 0.0);
        assert_eq!(*log.borrow(), vec!["finished".to_owned()]);
    }

    #[test]
    fn test_looping_wraps_with_remainder() {
        let (objects, owner, log) = setup();
        let mut instance = timeline(owner, 1.0);
        instance.bind_finished(&objects, owner, "OnFinished");
        instance.set_looping(true);
        instance.set_position(0.75, false, false);
        instance.play();

        instance.advance(0.5);
        assert!((instance.position() - 0.25).abs() < 1e-6);
        assert!(instance.is_playing());

        instance.reverse();
        instance.advance(0.5);
        assert!((instance.position() - 0.75).abs() < 1e-6);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_play_rate_scales_delta() {
        let (_, owner, _) = setup();
        let mut instance = timeline(owner, 4.0);
        instance.set_play_rate(2.0);
        assert_eq!(instance.scaled_length(), 2.0);
        instance.play();
        instance.advance(0.5);
        assert_eq!(instance.position(), 1.0);
    }

    #[test]
    fn test_non_finite_play_rate_keeps_cursor_in_range() {
        let (_, owner, _) = setup();
        let mut instance = timeline(owner, 1.0);
        instance.set_play_rate(1.5);
        instance.set_play_rate(f32::NAN);
        instance.set_play_rate(f32::INFINITY);
        assert_eq!(instance.play_rate(), 1.5);

        instance.play();
        instance.advance(0.2);
        assert!((instance.position() - 0.3).abs() < 1e-6);
        assert!(instance.is_playing());
    }

    #[test]
    fn test_definition_with_non_finite_rate_uses_default() {
        let (_, owner, _) = setup();
        let definition = TimelineDefinition::new("Open").with_play_rate(f32::NAN);
        let instance = TimelineInstance::from_definition(&definition, owner);
        assert_eq!(instance.play_rate(), 1.0);
    }

    #[test]
    fn test_values_notify_before_update() {
        let (objects, owner, log) = setup();
        let mut instance = timeline(owner, 1.0);
        instance.add_track(Track::scalar("Angle", KeyedCurve::linear([(0.0, 0.0), (1.0, 90.0)])));
        instance.bind(&objects, Channel::Scalar, owner, "OnValue");
        instance.bind_update(&objects, owner, "OnUpdate");

        instance.play();
        instance.advance(0.5);
        assert_eq!(*log.borrow(), vec!["Angle=45.00".to_owned(), "update@0.50".to_owned()]);
        assert_eq!(instance.scalar_value("Angle"), Some(45.0));
    }

    #[test]
    fn test_set_position_without_events_keeps_detector() {
        let (objects, owner, log) = setup();
        let mut instance = timeline(owner, 1.0);
        instance.register_event_track("Click", EventCurve::new([0.5]));
        instance.bind_event(&objects, "Click", owner, "OnClick");
        instance.bind_update(&objects, owner, "OnUpdate");

        instance.set_position(0.1, true, false);
        let baseline = instance.detector_state("Click");
        assert_eq!(baseline, Some(DetectorState::Baselined(0.1)));

        let report = instance.set_position(0.9, false, true);
        assert!(report.fired.is_empty());
        assert_eq!(instance.detector_state("Click"), baseline);
        assert_eq!(*log.borrow(), vec!["update@0.90".to_owned()]);
    }

    #[test]
    fn test_set_position_without_events_keeps_unbaselined_detector() {
        let (objects, owner, log) = setup();
        let mut instance = timeline(owner, 1.0);
        instance.register_event_track("Click", EventCurve::new([0.5]));
        instance.bind_event(&objects, "Click", owner, "OnClick");
        assert_eq!(instance.detector_state("Click"), Some(DetectorState::Unbaselined));

        let report = instance.set_position(0.9, false, true);
        assert!(report.fired.is_empty());
        assert_eq!(instance.detector_state("Click"), Some(DetectorState::Unbaselined));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_set_position_without_events_keeps_primed_detector() {
        let (objects, owner, log) = setup();
        let mut instance = timeline(owner, 1.0);
        instance.register_event_track("Click", EventCurve::new([0.0]));
        instance.bind_event(&objects, "Click", owner, "OnClick");
        instance.play_from_start();
        assert_eq!(instance.detector_state("Click"), Some(DetectorState::Primed(0.0)));

        let report = instance.set_position(0.6, false, false);
        assert!(report.fired.is_empty());
        assert_eq!(instance.detector_state("Click"), Some(DetectorState::Primed(0.0)));
        assert!(log.borrow().is_empty());
        assert!(instance.is_playing());
    }

    #[test]
    fn test_set_new_time_fires_events() {
        let (objects, owner, log) = setup();
        let mut instance = timeline(owner, 1.0);
        instance.register_event_track("Click", EventCurve::new([0.5]));
        instance.bind_event(&objects, "Click", owner, "OnClick");

        instance.set_new_time(0.2);
        let report = instance.set_new_time(0.6);
        assert_eq!(report.fired, vec!["Click".to_owned()]);
        assert_eq!(*log.borrow(), vec!["click".to_owned()]);
        assert!(!instance.is_playing());
    }

    #[test]
    fn test_curve_swap_resets_detector() {
        let (_, owner, _) = setup();
        let mut instance = timeline(owner, 1.0);
        instance.register_event_track("Click", EventCurve::new([0.5]));
        instance.set_new_time(0.2);
        assert!(matches!(instance.detector_state("Click"), Some(DetectorState::Baselined(_))));

        instance.set_event_curve("Click", Some(EventCurve::new([0.3])));
        assert_eq!(instance.detector_state("Click"), Some(DetectorState::Unbaselined));
        // First observation after the swap only baselines
        assert!(instance.set_new_time(0.6).fired.is_empty());
    }

    #[test]
    fn test_last_trigger_length_mode() {
        let (_, owner, _) = setup();
        let mut instance = timeline(owner, 5.0);
        instance.set_position(4.0, false, false);
        instance.register_event_track("A", EventCurve::new([0.5, 1.5]));
        instance.register_event_track("B", EventCurve::new([2.5]));

        instance.set_length_mode(LengthMode::LastTrigger);
        assert_eq!(instance.length(), 2.5);
        assert_eq!(instance.position(), 2.5);

        instance.remove_track("B");
        assert_eq!(instance.length(), 1.5);

        instance.set_length_mode(LengthMode::Explicit);
        assert_eq!(instance.length(), 5.0);
    }

    #[test]
    fn test_absent_curve_notifies_zero() {
        let (objects, owner, log) = setup();
        let mut instance = timeline(owner, 1.0);
        instance.set_scalar_curve("Glow", None);
        instance.bind(&objects, Channel::Scalar, owner, "OnValue");

        instance.set_position(0.5, false, true);
        assert_eq!(*log.borrow(), vec!["Glow=0.00".to_owned()]);
        assert!(instance.scalar_curve("Glow").is_none());
    }

    #[test]
    fn test_sample_unknown_track_errors() {
        let (_, owner, _) = setup();
        let mut instance = timeline(owner, 1.0);
        instance.register_event_track("Click", EventCurve::new([0.5]));

        assert!(matches!(instance.sample("Nope", 0.0), Err(TimelineError::TrackNotFound { .. })));
        assert!(instance.sample("Click", 0.0).is_err());
    }

    #[test]
    fn test_listener_stop_request_applies_after_step() {
        let log = Log::default();
        let seen = log.clone();
        let mut objects = ObjectTable::new();
        let owner = objects.spawn(
            "Door",
            CapabilityTable::new()
                .with_signal("Halt", |ctx| {
                    ctx.stop();
                    Ok(())
                })
                .with_signal("Watch", move |ctx| {
                    push(&seen, format!("watch@{:.1}", ctx.position()));
                    Ok(())
                }),
        );
        let mut instance = timeline(owner, 1.0);
        instance.bind_update(&objects, owner, "Halt");
        instance.bind_update(&objects, owner, "Watch");

        instance.play();
        instance.advance(0.5);
        // Both listeners ran in the step that requested the stop
        assert_eq!(*log.borrow(), vec!["watch@0.5".to_owned()]);
        assert!(!instance.is_playing());
    }

    #[test]
    fn test_fault_does_not_abort_step() {
        let (mut objects, owner, log) = setup();
        let broken = objects.spawn(
            "Broken",
            CapabilityTable::new().with_signal("Fail", |_| Err(ListenerError::new("nope"))),
        );
        let mut instance = timeline(owner, 1.0);
        instance.bind_update(&objects, broken, "Fail");
        instance.bind_update(&objects, owner, "OnUpdate");

        instance.play();
        let report = instance.advance(0.25);
        assert_eq!(report.faults.len(), 1);
        assert_eq!(*log.borrow(), vec!["update@0.25".to_owned()]);
    }
}
