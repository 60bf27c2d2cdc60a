// SPDX-License-Identifier: MIT OR Apache-2.0
//! Listener bindings for timeline notifications.
//!
//! A listener target exposes a [`CapabilityTable`] mapping function names to
//! typed callbacks. Binding resolves a name against that table once; the
//! resulting subscription is keyed by (target, function) per [`Channel`] so
//! repeated binds are no-ops.
//!
//! Bindings never own their target. Each one carries a [`LivenessToken`]
//! checked right before invocation; a dead target is dropped instead of called.

use crate::curve::{LinearColor, Vec3};
use crate::object::{LivenessToken, ObjectHandle, ObjectTable};
use crate::trigger::Direction;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Notification stream with its own listener set
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Fired after every evaluated step
    Update,
    /// Fired when non-looping playback reaches an end
    Finished,
    /// Scalar track values, `(track, value)`
    Scalar,
    /// Vector track values, `(track, value)`
    Vector,
    /// Color track values, `(track, value)`
    Color,
    /// Crossings of the named event track
    Event(String),
}

impl Channel {
    /// Channel for an event track
    pub fn event(track: impl Into<String>) -> Self {
        Self::Event(track.into())
    }

    /// Callback signature listeners on this channel must have
    pub fn signature(&self) -> Signature {
        match self {
            Self::Update | Self::Finished | Self::Event(_) => Signature::Signal,
            Self::Scalar => Signature::Scalar,
            Self::Vector => Signature::Vector,
            Self::Color => Signature::Color,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Update => f.write_str("Update"),
            Self::Finished => f.write_str("Finished"),
            Self::Scalar => f.write_str("Scalar"),
            Self::Vector => f.write_str("Vector"),
            Self::Color => f.write_str("Color"),
            Self::Event(track) => write!(f, "Event({track})"),
        }
    }
}

/// Callback shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signature {
    /// No arguments
    Signal,
    /// Track name and scalar
    Scalar,
    /// Track name and vector
    Vector,
    /// Track name and color
    Color,
}

/// Error raised by a listener
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ListenerError(pub String);

impl ListenerError {
    /// Create from a message
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Result of a listener invocation
pub type ListenerResult = Result<(), ListenerError>;

type SignalFn = dyn Fn(&NotifyContext<'_>) -> ListenerResult;
type ScalarFn = dyn Fn(&NotifyContext<'_>, &str, f32) -> ListenerResult;
type VectorFn = dyn Fn(&NotifyContext<'_>, &str, Vec3) -> ListenerResult;
type ColorFn = dyn Fn(&NotifyContext<'_>, &str, LinearColor) -> ListenerResult;

/// A typed listener callback
#[derive(Clone)]
pub enum Callback {
    /// No-argument callback (Update, Finished, event tracks)
    Signal(Rc<SignalFn>),
    /// Scalar value callback
    Scalar(Rc<ScalarFn>),
    /// Vector value callback
    Vector(Rc<VectorFn>),
    /// Color value callback
    Color(Rc<ColorFn>),
}

impl Callback {
    /// Shape of this callback
    pub fn signature(&self) -> Signature {
        match self {
            Self::Signal(_) => Signature::Signal,
            Self::Scalar(_) => Signature::Scalar,
            Self::Vector(_) => Signature::Vector,
            Self::Color(_) => Signature::Color,
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback::{:?}", self.signature())
    }
}

/// Functions a target exposes to timelines, by name
#[derive(Clone, Default)]
pub struct CapabilityTable {
    functions: IndexMap<String, Callback>,
}

impl CapabilityTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a no-argument function
    pub fn with_signal(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&NotifyContext<'_>) -> ListenerResult + 'static,
    ) -> Self {
        self.insert(name, Callback::Signal(Rc::new(f)));
        self
    }

    /// Add a scalar value function
    pub fn with_scalar(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&NotifyContext<'_>, &str, f32) -> ListenerResult + 'static,
    ) -> Self {
        self.insert(name, Callback::Scalar(Rc::new(f)));
        self
    }

    /// Add a vector value function
    pub fn with_vector(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&NotifyContext<'_>, &str, Vec3) -> ListenerResult + 'static,
    ) -> Self {
        self.insert(name, Callback::Vector(Rc::new(f)));
        self
    }

    /// Add a color value function
    pub fn with_color(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&NotifyContext<'_>, &str, LinearColor) -> ListenerResult + 'static,
    ) -> Self {
        self.insert(name, Callback::Color(Rc::new(f)));
        self
    }

    /// Insert or replace a function
    pub fn insert(&mut self, name: impl Into<String>, callback: Callback) {
        self.functions.insert(name.into(), callback);
    }

    /// Look up a function
    pub fn resolve(&self, name: &str) -> Option<&Callback> {
        self.functions.get(name)
    }

    /// Whether a function exists
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Function names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Number of functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for CapabilityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.functions.keys()).finish()
    }
}

/// Identity of a subscription within a channel
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingKey {
    /// Listener target
    pub target: ObjectHandle,
    /// Function name on the target
    pub function: String,
}

/// Outcome of [`ListenerRegistry::bind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// New subscription created
    Bound,
    /// Same (target, function) already bound on the channel
    AlreadyBound,
    /// Target no longer exists
    TargetNotAlive,
    /// Target has no function with that name
    FunctionNotFound,
    /// Function exists but cannot receive this channel's arguments
    SignatureMismatch,
}

impl BindOutcome {
    /// Whether the pair is subscribed after the call
    pub fn is_bound(&self) -> bool {
        matches!(self, Self::Bound | Self::AlreadyBound)
    }
}

/// Arguments delivered with a notification
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload<'a> {
    /// No arguments
    Signal,
    /// Scalar track value
    Scalar(&'a str, f32),
    /// Vector track value
    Vector(&'a str, Vec3),
    /// Color track value
    Color(&'a str, LinearColor),
}

/// A listener that returned an error during notification
#[derive(Debug, Clone, thiserror::Error)]
#[error("listener {function} on {target} failed on {channel}: {error}")]
pub struct ListenerFault {
    /// Listener target
    pub target: ObjectHandle,
    /// Function name
    pub function: String,
    /// Channel being notified
    pub channel: Channel,
    /// Error returned by the listener
    #[source]
    pub error: ListenerError,
}

/// Deferred playback request issued by a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackRequest {
    /// Play forward from the current cursor
    Play,
    /// Play forward from the start
    PlayFromStart,
    /// Play backward from the current cursor
    Reverse,
    /// Play backward from the end
    ReverseFromEnd,
    /// Stop
    Stop,
}

/// View of the notifying timeline handed to every callback.
///
/// Unbinding takes effect immediately, including for the remainder of the
/// notification in progress. Playback requests are queued and applied once
/// every notification of the current step has been delivered.
pub struct NotifyContext<'a> {
    timeline: &'a str,
    owner: ObjectHandle,
    position: f32,
    direction: Direction,
    bindings: &'a ListenerRegistry,
    requests: RefCell<Vec<PlaybackRequest>>,
}

impl<'a> NotifyContext<'a> {
    pub(crate) fn new(
        timeline: &'a str,
        owner: ObjectHandle,
        position: f32,
        direction: Direction,
        bindings: &'a ListenerRegistry,
    ) -> Self {
        Self {
            timeline,
            owner,
            position,
            direction,
            bindings,
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Name of the notifying timeline
    pub fn timeline(&self) -> &str {
        self.timeline
    }

    /// Owner of the notifying timeline
    pub fn owner(&self) -> ObjectHandle {
        self.owner
    }

    /// Cursor position for this step
    pub fn position(&self) -> f32 {
        self.position
    }

    /// Playback direction for this step
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Remove one subscription from the notifying timeline
    pub fn unbind(&self, channel: &Channel, target: ObjectHandle, function: &str) -> bool {
        self.bindings.unbind(channel, target, function)
    }

    /// Remove every subscription of `target` from the notifying timeline
    pub fn unbind_all(&self, target: ObjectHandle) -> usize {
        self.bindings.unbind_all(target)
    }

    /// Queue a playback request for after this step
    pub fn request(&self, request: PlaybackRequest) {
        self.requests.borrow_mut().push(request);
    }

    /// Queue [`PlaybackRequest::Play`]
    pub fn play(&self) {
        self.request(PlaybackRequest::Play);
    }

    /// Queue [`PlaybackRequest::PlayFromStart`]
    pub fn play_from_start(&self) {
        self.request(PlaybackRequest::PlayFromStart);
    }

    /// Queue [`PlaybackRequest::Reverse`]
    pub fn reverse(&self) {
        self.request(PlaybackRequest::Reverse);
    }

    /// Queue [`PlaybackRequest::ReverseFromEnd`]
    pub fn reverse_from_end(&self) {
        self.request(PlaybackRequest::ReverseFromEnd);
    }

    /// Queue a stop for after this step
    pub fn stop(&self) {
        self.request(PlaybackRequest::Stop);
    }

    pub(crate) fn into_requests(self) -> Vec<PlaybackRequest> {
        self.requests.into_inner()
    }
}

struct Binding {
    key: BindingKey,
    callback: Callback,
    liveness: LivenessToken,
    active: Cell<bool>,
}

impl Binding {
    fn invoke(&self, ctx: &NotifyContext<'_>, payload: Payload<'_>) -> ListenerResult {
        match (&self.callback, payload) {
            (Callback::Signal(f), Payload::Signal) => f(ctx),
            (Callback::Scalar(f), Payload::Scalar(track, value)) => f(ctx, track, value),
            (Callback::Vector(f), Payload::Vector(track, value)) => f(ctx, track, value),
            (Callback::Color(f), Payload::Color(track, value)) => f(ctx, track, value),
            // Signatures are checked at bind time
            _ => Ok(()),
        }
    }
}

/// Per-timeline subscriptions, partitioned by channel.
///
/// Uses interior mutability so listeners can unbind through a
/// [`NotifyContext`] while a notification is being delivered.
#[derive(Default)]
pub struct ListenerRegistry {
    channels: RefCell<IndexMap<Channel, Vec<Rc<Binding>>>>,
}

impl ListenerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `target.function` to `channel`.
    ///
    /// Binding an already bound pair is a no-op. Unknown or mismatched
    /// functions are skipped and logged, never treated as errors.
    pub fn bind(
        &self,
        objects: &ObjectTable,
        channel: Channel,
        target: ObjectHandle,
        function: &str,
    ) -> BindOutcome {
        if self.is_bound(&channel, target, function) {
            return BindOutcome::AlreadyBound;
        }

        if !objects.is_alive(target) {
            tracing::debug!(object = %target, function, %channel, "Skipping bind to dead target");
            return BindOutcome::TargetNotAlive;
        }

        let Some((callback, liveness)) = objects.resolve(target, function) else {
            tracing::debug!(object = %target, function, %channel, "Listener function not found");
            return BindOutcome::FunctionNotFound;
        };

        if callback.signature() != channel.signature() {
            tracing::debug!(
                object = %target,
                function,
                %channel,
                expected = ?channel.signature(),
                found = ?callback.signature(),
                "Listener signature mismatch"
            );
            return BindOutcome::SignatureMismatch;
        }

        let binding = Rc::new(Binding {
            key: BindingKey {
                target,
                function: function.to_owned(),
            },
            callback,
            liveness,
            active: Cell::new(true),
        });
        self.channels.borrow_mut().entry(channel).or_default().push(binding);
        BindOutcome::Bound
    }

    /// Whether `target.function` is subscribed to `channel`
    pub fn is_bound(&self, channel: &Channel, target: ObjectHandle, function: &str) -> bool {
        self.channels.borrow().get(channel).is_some_and(|bindings| {
            bindings
                .iter()
                .any(|b| b.active.get() && b.key.target == target && b.key.function == function)
        })
    }

    /// Remove one subscription
    pub fn unbind(&self, channel: &Channel, target: ObjectHandle, function: &str) -> bool {
        let mut channels = self.channels.borrow_mut();
        let Some(bindings) = channels.get_mut(channel) else {
            return false;
        };

        let before = bindings.len();
        bindings.retain(|b| {
            let matches = b.key.target == target && b.key.function == function;
            if matches {
                b.active.set(false);
            }
            !matches
        });
        before != bindings.len()
    }

    /// Remove every subscription of `target` on every channel
    pub fn unbind_all(&self, target: ObjectHandle) -> usize {
        let mut removed = 0;
        for bindings in self.channels.borrow_mut().values_mut() {
            bindings.retain(|b| {
                let matches = b.key.target == target;
                if matches {
                    b.active.set(false);
                    removed += 1;
                }
                !matches
            });
        }
        removed
    }

    /// Remove every subscription
    pub fn clear(&self) {
        for bindings in self.channels.borrow_mut().values() {
            for binding in bindings {
                binding.active.set(false);
            }
        }
        self.channels.borrow_mut().clear();
    }

    /// Number of subscriptions on `channel` whose target is still alive
    pub fn binding_count(&self, channel: &Channel) -> usize {
        self.channels.borrow().get(channel).map_or(0, |bindings| {
            bindings
                .iter()
                .filter(|b| b.active.get() && b.liveness.is_alive())
                .count()
        })
    }

    /// Subscriptions on `channel` in binding order
    pub fn keys(&self, channel: &Channel) -> Vec<BindingKey> {
        self.channels
            .borrow()
            .get(channel)
            .map(|bindings| bindings.iter().map(|b| b.key.clone()).collect())
            .unwrap_or_default()
    }

    /// Total subscriptions across all channels
    pub fn len(&self) -> usize {
        self.channels.borrow().values().map(Vec::len).sum()
    }

    /// Whether there are no subscriptions
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every listener on `channel` in binding order.
    ///
    /// Listeners removed while the notification is in flight are skipped.
    /// Dead targets are unbound instead of invoked. Listener errors do not
    /// stop delivery; they are returned to the caller.
    pub fn notify(
        &self,
        ctx: &NotifyContext<'_>,
        channel: &Channel,
        payload: Payload<'_>,
    ) -> Vec<ListenerFault> {
        let snapshot: Vec<Rc<Binding>> = match self.channels.borrow().get(channel) {
            Some(bindings) => bindings.clone(),
            None => return Vec::new(),
        };

        let mut faults = Vec::new();
        let mut pruned = false;

        for binding in &snapshot {
            if !binding.active.get() {
                continue;
            }
            if !binding.liveness.is_alive() {
                tracing::debug!(
                    object = %binding.key.target,
                    function = %binding.key.function,
                    %channel,
                    "Dropping binding to destroyed listener"
                );
                binding.active.set(false);
                pruned = true;
                continue;
            }

            if let Err(error) = binding.invoke(ctx, payload) {
                faults.push(ListenerFault {
                    target: binding.key.target,
                    function: binding.key.function.clone(),
                    channel: channel.clone(),
                    error,
                });
            }
        }

        if pruned {
            if let Some(bindings) = self.channels.borrow_mut().get_mut(channel) {
                bindings.retain(|b| b.active.get());
            }
        }

        faults
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channels = self.channels.borrow();
        let mut map = f.debug_map();
        for (channel, bindings) in channels.iter() {
            let keys: Vec<_> = bindings.iter().map(|b| &b.key).collect();
            map.entry(channel, &keys);
        }
        map.finish()
    }
}
