// SPDX-License-Identifier: MIT OR Apache-2.0
//! Object identity and liveness for timeline owners and listener targets.
//!
//! Objects are owned by the surrounding world through an [`ObjectTable`].
//! Timelines only ever hold an [`ObjectHandle`] (identity) and a
//! [`LivenessToken`] (non-owning), so despawning an object never leaves a
//! timeline pointing at freed state.

use crate::binding::{Callback, CapabilityTable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::{Rc, Weak};

/// Generational handle to an object in an [`ObjectTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectHandle {
    index: u32,
    generation: u32,
}

impl ObjectHandle {
    /// Slot index
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Slot generation at the time the handle was issued
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Non-owning liveness probe for an object.
///
/// Holding a token never keeps the object alive.
#[derive(Debug, Clone)]
pub struct LivenessToken(Weak<()>);

impl LivenessToken {
    /// Whether the object the token was issued for still exists
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

struct ObjectEntry {
    class: String,
    capabilities: CapabilityTable,
    anchor: Rc<()>,
}

struct ObjectSlot {
    generation: u32,
    entry: Option<ObjectEntry>,
}

/// Arena of live objects that can own timelines or receive notifications
#[derive(Default)]
pub struct ObjectTable {
    slots: Vec<ObjectSlot>,
    free_list: Vec<u32>,
}

impl ObjectTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn an object of `class` exposing `capabilities`
    pub fn spawn(
        &mut self,
        class: impl Into<String>,
        capabilities: CapabilityTable,
    ) -> ObjectHandle {
        let entry = ObjectEntry {
            class: class.into(),
            capabilities,
            anchor: Rc::new(()),
        };

        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            ObjectHandle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(ObjectSlot {
                generation: 0,
                entry: Some(entry),
            });
            ObjectHandle {
                index,
                generation: 0,
            }
        }
    }

    /// Destroy an object.
    ///
    /// Returns false if the handle was already stale.
    pub fn despawn(&mut self, handle: ObjectHandle) -> bool {
        let Some(slot) = self.slots.get_mut(handle.index as usize) else {
            return false;
        };
        if slot.generation != handle.generation || slot.entry.is_none() {
            return false;
        }

        slot.entry = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index);
        true
    }

    fn entry(&self, handle: ObjectHandle) -> Option<&ObjectEntry> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    /// Whether `handle` refers to a live object
    pub fn is_alive(&self, handle: ObjectHandle) -> bool {
        self.entry(handle).is_some()
    }

    /// Class name the object was spawned with
    pub fn class_of(&self, handle: ObjectHandle) -> Option<&str> {
        self.entry(handle).map(|e| e.class.as_str())
    }

    /// Capability table of a live object
    pub fn capabilities(&self, handle: ObjectHandle) -> Option<&CapabilityTable> {
        self.entry(handle).map(|e| &e.capabilities)
    }

    /// Mutable capability table of a live object
    pub fn capabilities_mut(&mut self, handle: ObjectHandle) -> Option<&mut CapabilityTable> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_mut().map(|e| &mut e.capabilities)
    }

    /// Liveness token for a live object
    pub fn liveness(&self, handle: ObjectHandle) -> Option<LivenessToken> {
        self.entry(handle)
            .map(|e| LivenessToken(Rc::downgrade(&e.anchor)))
    }

    /// Resolve a function on a live object into a callback plus its liveness token
    pub fn resolve(
        &self,
        handle: ObjectHandle,
        function: &str,
    ) -> Option<(Callback, LivenessToken)> {
        let entry = self.entry(handle)?;
        let callback = entry.capabilities.resolve(function)?.clone();
        Some((callback, LivenessToken(Rc::downgrade(&entry.anchor))))
    }

    /// Number of live objects
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.entry.is_some()).count()
    }

    /// Whether no objects are alive
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ObjectTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectTable")
            .field("live", &self.len())
            .field("slots", &self.slots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_and_despawn() {
        let mut objects = ObjectTable::new();
        let door = objects.spawn("Door", CapabilityTable::new());

        assert!(objects.is_alive(door));
        assert_eq!(objects.class_of(door), Some("Door"));

        assert!(objects.despawn(door));
        assert!(!objects.is_alive(door));
        assert!(!objects.despawn(door));
        assert!(objects.is_empty());
    }

    #[test]
    fn test_reused_slot_does_not_alias() {
        let mut objects = ObjectTable::new();
        let first = objects.spawn("Door", CapabilityTable::new());
        objects.despawn(first);

        let second = objects.spawn("Lamp", CapabilityTable::new());
        assert_eq!(first.index(), second.index());
        assert_ne!(first, second);
        assert!(!objects.is_alive(first));
        assert_eq!(objects.class_of(second), Some("Lamp"));
    }

    #[test]
    fn test_liveness_token_dies_with_object() {
        let mut objects = ObjectTable::new();
        let lamp = objects.spawn("Lamp", CapabilityTable::new());
        let token = objects.liveness(lamp).unwrap();

        assert!(token.is_alive());
        objects.despawn(lamp);
        assert!(!token.is_alive());
    }

    #[test]
    fn test_resolve_missing_function() {
        let mut objects = ObjectTable::new();
        let lamp = objects.spawn(
            "Lamp",
            CapabilityTable::new().with_signal("OnUpdate", |_| Ok(())),
        );

        assert!(objects.resolve(lamp, "OnUpdate").is_some());
        assert!(objects.resolve(lamp, "OnFinished").is_none());
    }
}
