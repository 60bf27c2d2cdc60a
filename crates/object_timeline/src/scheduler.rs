// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-step driver for every playing timeline.

use crate::binding::ListenerFault;
use crate::config::{ClockConfig, RuntimeConfig};
use crate::object::ObjectTable;
use crate::registry::{InstanceKey, InstanceRegistry};
use crate::timeline::TimelineInstance;

/// Clock values for one step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTime {
    /// World delta, after time dilation
    pub delta: f32,
    /// Real delta, before time dilation
    pub undilated_delta: f32,
}

impl FrameTime {
    /// Create from both deltas
    pub fn new(delta: f32, undilated_delta: f32) -> Self {
        Self {
            delta,
            undilated_delta,
        }
    }

    /// Step without time dilation
    pub fn uniform(delta: f32) -> Self {
        Self::new(delta, delta)
    }

    /// Step where world time runs at `dilation` times real time
    pub fn dilated(undilated_delta: f32, dilation: f32) -> Self {
        Self::new(undilated_delta * dilation, undilated_delta)
    }
}

/// A listener fault attributed to the instance it happened in
#[derive(Debug, thiserror::Error)]
#[error("{key}: {fault}")]
pub struct InstanceFault {
    /// Instance that was stepping
    pub key: InstanceKey,
    /// What went wrong
    #[source]
    pub fault: ListenerFault,
}

/// Summary of one [`TickScheduler::tick`]
#[derive(Debug, Default)]
pub struct TickReport {
    /// Step counter
    pub frame: u64,
    /// Instances advanced this step
    pub ticked: usize,
    /// Instances that finished this step
    pub finished: Vec<InstanceKey>,
    /// Instances removed because their owner was gone
    pub swept: Vec<InstanceKey>,
    /// Listener faults, per instance
    pub faults: Vec<InstanceFault>,
}

/// Drives playing instances once per simulation step
#[derive(Debug, Clone, Default)]
pub struct TickScheduler {
    clock: ClockConfig,
    frame: u64,
}

impl TickScheduler {
    /// Create with clock bounds
    pub fn new(clock: ClockConfig) -> Self {
        Self { clock, frame: 0 }
    }

    /// Create from runtime settings
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(config.clock)
    }

    /// Clock bounds
    pub fn clock(&self) -> &ClockConfig {
        &self.clock
    }

    /// Steps taken so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Delta `instance` advances by this step
    pub fn delta_for(&self, instance: &TimelineInstance, time: FrameTime) -> f32 {
        if instance.ignores_time_dilation() {
            self.clock.clamp_undilated(time.undilated_delta)
        } else {
            time.delta
        }
    }

    /// Run one step.
    ///
    /// Instances of despawned owners are removed first. Then every playing
    /// instance advances in registry order; stopped ones are skipped. A
    /// failing listener is reported and the step carries on.
    pub fn tick(
        &mut self,
        registry: &mut InstanceRegistry,
        objects: &ObjectTable,
        time: FrameTime,
    ) -> TickReport {
        self.frame += 1;
        let mut report = TickReport {
            frame: self.frame,
            swept: registry.sweep(objects),
            ..TickReport::default()
        };

        for (key, instance) in registry.iter_mut() {
            if !instance.is_playing() {
                continue;
            }

            let delta = self.delta_for(instance, time);
            let step = instance.advance(delta);
            report.ticked += 1;

            if step.finished {
                report.finished.push(key.clone());
            }
            for fault in step.faults {
                tracing::warn!("Listener fault in {key}: {fault}");
                report.faults.push(InstanceFault {
                    key: key.clone(),
                    fault,
                });
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{CapabilityTable, ListenerError};
    use crate::definition::{TimelineDefinition, TimelineLibrary};
    use crate::object::ObjectHandle;
    use pretty_assertions::assert_eq;

    fn world() -> (ObjectTable, ObjectHandle, InstanceRegistry) {
        let library = TimelineLibrary::new()
            .with_definition(
                "Door",
                TimelineDefinition::new("Open").with_length(1.0).autoplay(true),
            )
            .with_definition(
                "Door",
                TimelineDefinition::new("Slow")
                    .with_length(1.0)
                    .ignore_time_dilation(true)
                    .autoplay(true),
            )
            .with_definition("Door", TimelineDefinition::new("Idle"));
        let mut objects = ObjectTable::new();
        let door = objects.spawn(
            "Door",
            CapabilityTable::new().with_signal("Fail", |_| Err(ListenerError::new("jammed"))),
        );
        (objects, door, InstanceRegistry::new(library))
    }

    #[test]
    fn test_only_playing_instances_tick() {
        let (objects, door, mut registry) = world();
        registry.get_or_create(&objects, door, "Open", None, None);
        registry.get_or_create(&objects, door, "Idle", None, None);

        let mut scheduler = TickScheduler::default();
        let report = scheduler.tick(&mut registry, &objects, FrameTime::uniform(0.25));
        assert_eq!(report.frame, 1);
        assert_eq!(report.ticked, 1);
        assert_eq!(registry.get(door, "Open").map(|i| i.position()), Some(0.25));
        assert_eq!(registry.get(door, "Idle").map(|i| i.position()), Some(0.0));
    }

    #[test]
    fn test_ignore_dilation_uses_clamped_real_time() {
        let (objects, door, mut registry) = world();
        registry.get_or_create(&objects, door, "Open", None, None);
        registry.get_or_create(&objects, door, "Slow", None, None);

        let mut scheduler = TickScheduler::default();
        // World runs at a tenth of real time; real delta exceeds the clamp
        scheduler.tick(&mut registry, &objects, FrameTime::dilated(0.5, 0.1));

        assert_eq!(registry.get(door, "Open").map(|i| i.position()), Some(0.05));
        assert_eq!(registry.get(door, "Slow").map(|i| i.position()), Some(0.4));
    }

    #[test]
    fn test_finished_and_swept_are_reported() {
        let (mut objects, door, mut registry) = world();
        registry.get_or_create(&objects, door, "Open", None, None);

        let mut scheduler = TickScheduler::default();
        let report = scheduler.tick(&mut registry, &objects, FrameTime::uniform(2.0));
        assert_eq!(report.finished, vec![InstanceKey::new(door, "Open")]);

        objects.despawn(door);
        let report = scheduler.tick(&mut registry, &objects, FrameTime::uniform(0.1));
        assert_eq!(report.swept, vec![InstanceKey::new(door, "Open")]);
        assert_eq!(report.ticked, 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_faults_are_attributed() {
        let (objects, door, mut registry) = world();
        registry.get_or_create(&objects, door, "Open", Some("Fail"), None);
        registry.get_or_create(&objects, door, "Slow", None, None);

        let mut scheduler = TickScheduler::default();
        let report = scheduler.tick(&mut registry, &objects, FrameTime::uniform(0.1));
        assert_eq!(report.ticked, 2);
        assert_eq!(report.faults.len(), 1);
        assert_eq!(report.faults[0].key, InstanceKey::new(door, "Open"));
        assert_eq!(
            report.faults[0].to_string(),
            format!("{door}/Open: listener Fail on {door} failed on Update: jammed")
        );
    }
}
