// SPDX-License-Identifier: MIT OR Apache-2.0
//! Instance registry: one timeline instance per (owner, name).
//!
//! The registry exclusively owns every [`TimelineInstance`]. Entries live
//! until they are removed explicitly or swept after their owner despawns.

use crate::binding::BindOutcome;
use crate::definition::{TimelineBindingEntry, TimelineLibrary};
use crate::error::{Result, TimelineError};
use crate::object::{ObjectHandle, ObjectTable};
use crate::timeline::TimelineInstance;
use indexmap::map::Entry;
use indexmap::IndexMap;
use std::fmt;

/// Composite key of a registry entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    /// Owning object
    pub owner: ObjectHandle,
    /// Timeline name
    pub name: String,
}

impl InstanceKey {
    /// Create a key
    pub fn new(owner: ObjectHandle, name: impl Into<String>) -> Self {
        Self {
            owner,
            name: name.into(),
        }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Owner of every timeline instance
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    library: TimelineLibrary,
    instances: IndexMap<InstanceKey, TimelineInstance>,
}

impl InstanceRegistry {
    /// Create a registry drawing definitions from `library`
    pub fn new(library: TimelineLibrary) -> Self {
        Self {
            library,
            instances: IndexMap::new(),
        }
    }

    /// Definitions and binding tables
    pub fn library(&self) -> &TimelineLibrary {
        &self.library
    }

    /// Mutable definitions and binding tables; affects future creations only
    pub fn library_mut(&mut self) -> &mut TimelineLibrary {
        &mut self.library
    }

    /// Look up or create the `name` timeline of `owner`.
    ///
    /// Returns `None` when the timeline is unavailable; the reason is logged.
    pub fn get_or_create(
        &mut self,
        objects: &ObjectTable,
        owner: ObjectHandle,
        name: &str,
        update_function: Option<&str>,
        finished_function: Option<&str>,
    ) -> Option<&mut TimelineInstance> {
        match self.try_get_or_create(objects, owner, name, update_function, finished_function) {
            Ok(instance) => Some(instance),
            Err(err) => {
                tracing::warn!("Timeline unavailable: {err}");
                None
            }
        }
    }

    /// Look up or create the `name` timeline of `owner`.
    ///
    /// An existing instance only gets the given Update/Finished functions
    /// bound (idempotently). A new one is built inert from the owner class's
    /// definition, receives those functions and the class's declared event
    /// listeners, and only then is activated so autoplay cannot run ahead of
    /// any binding.
    pub fn try_get_or_create(
        &mut self,
        objects: &ObjectTable,
        owner: ObjectHandle,
        name: &str,
        update_function: Option<&str>,
        finished_function: Option<&str>,
    ) -> Result<&mut TimelineInstance> {
        match self.instances.entry(InstanceKey::new(owner, name)) {
            Entry::Occupied(entry) => {
                let instance = entry.into_mut();
                bind_owner_functions(instance, objects, owner, update_function, finished_function);
                Ok(instance)
            }
            Entry::Vacant(entry) => {
                let class = objects
                    .class_of(owner)
                    .ok_or(TimelineError::OwnerNotAlive(owner))?;
                let definition = self.library.definition(class, name).ok_or_else(|| {
                    TimelineError::DefinitionNotFound {
                        class: class.to_owned(),
                        name: name.to_owned(),
                    }
                })?;

                let mut instance = TimelineInstance::from_definition(definition, owner);
                bind_owner_functions(&instance, objects, owner, update_function, finished_function);
                if let Some(declared) = self.library.binding_entry(class, name) {
                    bind_event_functions(&instance, objects, owner, declared);
                }
                instance.activate();

                tracing::info!(
                    timeline = name,
                    %owner,
                    class,
                    id = %instance.id(),
                    "Created timeline instance"
                );
                Ok(entry.insert(instance))
            }
        }
    }

    /// Get an instance
    pub fn get(&self, owner: ObjectHandle, name: &str) -> Option<&TimelineInstance> {
        self.instances.get(&InstanceKey::new(owner, name))
    }

    /// Get a mutable instance
    pub fn get_mut(&mut self, owner: ObjectHandle, name: &str) -> Option<&mut TimelineInstance> {
        self.instances.get_mut(&InstanceKey::new(owner, name))
    }

    /// Whether an instance exists
    pub fn contains(&self, owner: ObjectHandle, name: &str) -> bool {
        self.instances.contains_key(&InstanceKey::new(owner, name))
    }

    /// Remove every binding of `owner` from its `name` timeline.
    ///
    /// The instance itself is kept. Returns the number of bindings removed.
    pub fn unbind_all(&self, owner: ObjectHandle, name: &str) -> usize {
        self.get(owner, name)
            .map_or(0, |instance| instance.unbind_all(owner))
    }

    /// Remove every binding of `owner` from all of its timelines
    pub fn unbind_dynamic(&self, owner: ObjectHandle) -> usize {
        self.instances
            .iter()
            .filter(|(key, _)| key.owner == owner)
            .map(|(_, instance)| instance.unbind_all(owner))
            .sum()
    }

    /// Remove every binding of `target` from every instance
    pub fn unbind_target(&self, target: ObjectHandle) -> usize {
        self.instances
            .values()
            .map(|instance| instance.unbind_all(target))
            .sum()
    }

    /// Bind every function the owner's class declares on the owner's
    /// existing timelines. Returns the number of new bindings.
    pub fn bind_dynamic(&self, objects: &ObjectTable, owner: ObjectHandle) -> usize {
        let Some(class) = objects.class_of(owner) else {
            return 0;
        };

        let mut bound = 0;
        for declared in self.library.binding_entries(class) {
            let Some(instance) = self.get(owner, &declared.timeline) else {
                continue;
            };
            bound += bind_owner_functions(
                instance,
                objects,
                owner,
                declared.update_function.as_deref(),
                declared.finished_function.as_deref(),
            );
            bound += bind_event_functions(instance, objects, owner, declared);
        }
        bound
    }

    /// Destroy one instance together with its bindings and detector state
    pub fn remove_instance(&mut self, owner: ObjectHandle, name: &str) -> Option<TimelineInstance> {
        self.instances.shift_remove(&InstanceKey::new(owner, name))
    }

    /// Destroy every instance of `owner`
    pub fn remove_owner(&mut self, owner: ObjectHandle) -> usize {
        let before = self.instances.len();
        self.instances.retain(|key, _| key.owner != owner);
        before - self.instances.len()
    }

    /// Destroy every instance whose owner no longer exists
    pub fn sweep(&mut self, objects: &ObjectTable) -> Vec<InstanceKey> {
        let mut swept = Vec::new();
        self.instances.retain(|key, _| {
            let alive = objects.is_alive(key.owner);
            if !alive {
                swept.push(key.clone());
            }
            alive
        });

        for key in &swept {
            tracing::debug!("Swept timeline {key}: owner destroyed");
        }
        swept
    }

    /// Iterate over instances in creation order
    pub fn iter(&self) -> impl Iterator<Item = (&InstanceKey, &TimelineInstance)> {
        self.instances.iter()
    }

    /// Iterate mutably over instances in creation order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&InstanceKey, &mut TimelineInstance)> {
        self.instances.iter_mut()
    }

    /// Number of instances
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether there are no instances
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

fn count_bound(outcome: BindOutcome) -> usize {
    usize::from(outcome == BindOutcome::Bound)
}

fn bind_owner_functions(
    instance: &TimelineInstance,
    objects: &ObjectTable,
    owner: ObjectHandle,
    update_function: Option<&str>,
    finished_function: Option<&str>,
) -> usize {
    let mut bound = 0;
    if let Some(function) = update_function {
        bound += count_bound(instance.bind_update(objects, owner, function));
    }
    if let Some(function) = finished_function {
        bound += count_bound(instance.bind_finished(objects, owner, function));
    }
    bound
}

fn bind_event_functions(
    instance: &TimelineInstance,
    objects: &ObjectTable,
    owner: ObjectHandle,
    declared: &TimelineBindingEntry,
) -> usize {
    declared
        .event_functions
        .iter()
        .map(|(track, function)| count_bound(instance.bind_event(objects, track, owner, function)))
        .sum()
}
