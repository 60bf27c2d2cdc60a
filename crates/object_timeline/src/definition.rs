// SPDX-License-Identifier: MIT OR Apache-2.0
//! Authored timeline definitions and per-class binding tables.
//!
//! A [`TimelineLibrary`] is what the surrounding system hands the instance
//! registry: for every owner class, the timelines it can create and the
//! listener functions its authored graphs declared for them.

use crate::timeline::{LengthMode, DEFAULT_LENGTH};
use crate::track::Track;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Read-only template an instance is constructed from
#[derive(Debug, Clone)]
pub struct TimelineDefinition {
    /// Timeline name, unique per owner class
    pub name: String,
    /// Tracks in evaluation order
    pub tracks: Vec<Track>,
    /// Explicit length
    pub length: f32,
    /// How length is resolved
    pub length_mode: LengthMode,
    /// Wrap at the ends instead of finishing
    pub looping: bool,
    /// Start playing once construction completes
    pub autoplay: bool,
    /// Cursor is replicated to remote peers
    pub replicated: bool,
    /// Tick with the undilated clock
    pub ignore_time_dilation: bool,
    /// Initial play rate
    pub play_rate: f32,
}

impl TimelineDefinition {
    /// Create an empty definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tracks: Vec::new(),
            length: DEFAULT_LENGTH,
            length_mode: LengthMode::Explicit,
            looping: false,
            autoplay: false,
            replicated: false,
            ignore_time_dilation: false,
            play_rate: 1.0,
        }
    }

    /// Add a track
    pub fn with_track(mut self, track: Track) -> Self {
        self.tracks.push(track);
        self
    }

    /// Set explicit length
    pub fn with_length(mut self, length: f32) -> Self {
        self.length = length;
        self
    }

    /// Set length mode
    pub fn with_length_mode(mut self, mode: LengthMode) -> Self {
        self.length_mode = mode;
        self
    }

    /// Set play rate
    pub fn with_play_rate(mut self, rate: f32) -> Self {
        self.play_rate = rate;
        self
    }

    /// Set looping
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Set autoplay
    pub fn autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = autoplay;
        self
    }

    /// Set replication
    pub fn replicated(mut self, replicated: bool) -> Self {
        self.replicated = replicated;
        self
    }

    /// Set whether time dilation is ignored
    pub fn ignore_time_dilation(mut self, ignore: bool) -> Self {
        self.ignore_time_dilation = ignore;
        self
    }
}

/// Listener functions an owner class declares for one of its timelines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineBindingEntry {
    /// Timeline name
    pub timeline: String,
    /// Function bound to Update
    pub update_function: Option<String>,
    /// Function bound to Finished
    pub finished_function: Option<String>,
    /// Event track name to function
    pub event_functions: IndexMap<String, String>,
}

impl TimelineBindingEntry {
    /// Create an entry with no functions
    pub fn new(timeline: impl Into<String>) -> Self {
        Self {
            timeline: timeline.into(),
            ..Self::default()
        }
    }

    /// Set the Update function
    pub fn with_update(mut self, function: impl Into<String>) -> Self {
        self.update_function = Some(function.into());
        self
    }

    /// Set the Finished function
    pub fn with_finished(mut self, function: impl Into<String>) -> Self {
        self.finished_function = Some(function.into());
        self
    }

    /// Add an event track function
    pub fn with_event(mut self, track: impl Into<String>, function: impl Into<String>) -> Self {
        self.event_functions.insert(track.into(), function.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
struct ClassTimelines {
    definitions: IndexMap<String, TimelineDefinition>,
    bindings: IndexMap<String, TimelineBindingEntry>,
}

/// Timeline definitions and binding tables, grouped by owner class
#[derive(Debug, Clone, Default)]
pub struct TimelineLibrary {
    classes: IndexMap<String, ClassTimelines>,
}

impl TimelineLibrary {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition for `class`, replacing one with the same name
    pub fn define(&mut self, class: impl Into<String>, definition: TimelineDefinition) {
        self.classes
            .entry(class.into())
            .or_default()
            .definitions
            .insert(definition.name.clone(), definition);
    }

    /// Register a binding entry for `class`, replacing one for the same timeline
    pub fn declare_bindings(&mut self, class: impl Into<String>, entry: TimelineBindingEntry) {
        self.classes
            .entry(class.into())
            .or_default()
            .bindings
            .insert(entry.timeline.clone(), entry);
    }

    /// Builder form of [`TimelineLibrary::define`]
    pub fn with_definition(
        mut self,
        class: impl Into<String>,
        definition: TimelineDefinition,
    ) -> Self {
        self.define(class, definition);
        self
    }

    /// Builder form of [`TimelineLibrary::declare_bindings`]
    pub fn with_bindings(mut self, class: impl Into<String>, entry: TimelineBindingEntry) -> Self {
        self.declare_bindings(class, entry);
        self
    }

    /// Definition of `name` for `class`
    pub fn definition(&self, class: &str, name: &str) -> Option<&TimelineDefinition> {
        self.classes.get(class)?.definitions.get(name)
    }

    /// Binding entry of `timeline` for `class`
    pub fn binding_entry(&self, class: &str, timeline: &str) -> Option<&TimelineBindingEntry> {
        self.classes.get(class)?.bindings.get(timeline)
    }

    /// Every binding entry declared for `class`
    pub fn binding_entries(&self, class: &str) -> impl Iterator<Item = &TimelineBindingEntry> {
        self.classes
            .get(class)
            .into_iter()
            .flat_map(|c| c.bindings.values())
    }

    /// Timeline names defined for `class`
    pub fn timeline_names(&self, class: &str) -> impl Iterator<Item = &str> {
        self.classes
            .get(class)
            .into_iter()
            .flat_map(|c| c.definitions.keys().map(String::as_str))
    }

    /// Parse binding entries from RON text and declare them for `class`
    pub fn declare_bindings_ron(
        &mut self,
        class: &str,
        text: &str,
    ) -> Result<usize, ron::error::SpannedError> {
        let entries: Vec<TimelineBindingEntry> = ron::from_str(text)?;
        let count = entries.len();
        for entry in entries {
            self.declare_bindings(class, entry);
        }
        Ok(count)
    }
}
