// SPDX-License-Identifier: MIT OR Apache-2.0
//! Demo world: a door that swings open, then closes once.

use object_timeline::{
    CapabilityTable, Channel, EventCurve, InstanceRegistry, KeyedCurve, LinearColor, ObjectHandle,
    ObjectTable, TimelineBindingEntry, TimelineDefinition, TimelineLibrary, Track,
};
use std::cell::Cell;
use std::rc::Rc;

/// Class name of the demo owner
pub const DOOR_CLASS: &str = "Door";
/// Timeline the demo plays
pub const OPEN_TIMELINE: &str = "Open";

/// Objects and timelines of the demo
pub struct DemoWorld {
    pub objects: ObjectTable,
    pub registry: InstanceRegistry,
    pub door: ObjectHandle,
}

impl DemoWorld {
    pub fn new() -> Self {
        let mut objects = ObjectTable::new();
        let door = objects.spawn(DOOR_CLASS, door_capabilities());
        let lamp = objects.spawn("Lamp", lamp_capabilities());

        let library = TimelineLibrary::new()
            .with_definition(DOOR_CLASS, open_timeline())
            .with_bindings(
                DOOR_CLASS,
                TimelineBindingEntry::new(OPEN_TIMELINE)
                    .with_event("Creak", "PlayCreak")
                    .with_event("Latch", "Latch"),
            );

        let mut registry = InstanceRegistry::new(library);
        if let Some(instance) = registry.get_or_create(
            &objects,
            door,
            OPEN_TIMELINE,
            Some("OnSwing"),
            Some("OnSwingFinished"),
        ) {
            instance.bind(&objects, Channel::Scalar, door, "SetAngle");
            instance.bind(&objects, Channel::Color, lamp, "SetColor");
        }

        Self {
            objects,
            registry,
            door,
        }
    }

    /// Whether any timeline is still playing
    pub fn is_playing(&self) -> bool {
        self.registry.iter().any(|(_, instance)| instance.is_playing())
    }
}

impl Default for DemoWorld {
    fn default() -> Self {
        Self::new()
    }
}

fn open_timeline() -> TimelineDefinition {
    TimelineDefinition::new(OPEN_TIMELINE)
        .with_length(2.0)
        .with_track(Track::scalar(
            "Angle",
            KeyedCurve::linear([(0.0, 0.0), (1.5, 95.0), (2.0, 90.0)]),
        ))
        .with_track(Track::vector(
            "Offset",
            KeyedCurve::linear([(0.0, [0.0, 0.0, 0.0]), (2.0, [0.0, 0.0, 0.1])]),
        ))
        .with_track(Track::color(
            "Light",
            KeyedCurve::linear([
                (0.0, LinearColor::BLACK),
                (2.0, LinearColor::new(1.0, 0.8, 0.5, 1.0)),
            ]),
        ))
        .with_track(Track::event("Creak", EventCurve::new([0.0, 0.6])))
        .with_track(Track::event("Latch", EventCurve::new([2.0])))
        .autoplay(true)
}

fn door_capabilities() -> CapabilityTable {
    let closed_once = Rc::new(Cell::new(false));
    CapabilityTable::new()
        .with_signal("OnSwing", |ctx| {
            tracing::trace!("{} update at {:.3}", ctx.timeline(), ctx.position());
            Ok(())
        })
        .with_signal("OnSwingFinished", move |ctx| {
            tracing::info!(
                "{} finished at {:.3} ({:?})",
                ctx.timeline(),
                ctx.position(),
                ctx.direction()
            );
            if !closed_once.replace(true) {
                ctx.reverse_from_end();
            }
            Ok(())
        })
        .with_signal("PlayCreak", |ctx| {
            tracing::info!("Creak at {:.3}", ctx.position());
            Ok(())
        })
        .with_signal("Latch", |ctx| {
            tracing::info!("Latch at {:.3}", ctx.position());
            Ok(())
        })
        .with_scalar("SetAngle", |_, track, value| {
            tracing::debug!("{track} = {value:.2}");
            Ok(())
        })
}

fn lamp_capabilities() -> CapabilityTable {
    CapabilityTable::new().with_color("SetColor", |_, track, color| {
        tracing::debug!(
            "{track} = ({:.2}, {:.2}, {:.2}, {:.2})",
            color.r,
            color.g,
            color.b,
            color.a
        );
        Ok(())
    })
}
