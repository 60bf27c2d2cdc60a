// SPDX-License-Identifier: MIT OR Apache-2.0
//! Replicated playback state and the policy for adopting it.
//!
//! Transport is not handled here; payloads are plain bincode bytes.

use crate::error::{Result, TimelineError};
use crate::timeline::{StepReport, TimelineInstance};
use crate::trigger::Direction;
use serde::{Deserialize, Serialize};

/// Authoritative playback state pushed to remote peers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReplicatedTimeline {
    /// Cursor position
    pub position: f32,
    /// Whether the cursor advances
    pub playing: bool,
    /// Playback direction
    pub direction: Direction,
    /// Play rate multiplier
    pub play_rate: f32,
    /// Loop flag
    pub looping: bool,
}

impl ReplicatedTimeline {
    /// Encode for the transport
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a transport payload
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

impl TimelineInstance {
    /// Capture the replicated state
    pub fn snapshot(&self) -> ReplicatedTimeline {
        ReplicatedTimeline {
            position: self.position(),
            playing: self.is_playing(),
            direction: self.direction(),
            play_rate: self.play_rate(),
            looping: self.is_looping(),
        }
    }

    /// Adopt authoritative state from the transport.
    ///
    /// A stopped instance snaps to a changed position without firing events
    /// but still notifies values and Update. A playing instance takes the
    /// position silently and keeps stepping from there.
    pub fn apply_replicated(&mut self, state: &ReplicatedTimeline) -> Result<StepReport> {
        if !self.is_replicated() {
            return Err(TimelineError::NotReplicated(self.name().to_owned()));
        }

        self.set_looping(state.looping);
        self.set_play_rate(state.play_rate);
        self.restore_playback(state.playing, state.direction);

        if self.is_playing() {
            self.place_cursor(state.position);
            return Ok(StepReport::idle(self.position()));
        }

        if self.position() != state.position {
            tracing::debug!(
                timeline = self.name(),
                from = self.position(),
                to = state.position,
                "Adopting replicated position"
            );
            return Ok(self.set_position(state.position, false, true));
        }

        Ok(StepReport::idle(self.position()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::CapabilityTable;
    use crate::curve::EventCurve;
    use crate::definition::TimelineDefinition;
    use crate::object::ObjectTable;
    use crate::trigger::DetectorState;
    use std::cell::Cell;
    use std::rc::Rc;

    fn replicated_door(updates: &Rc<Cell<u32>>) -> (ObjectTable, TimelineInstance) {
        let counter = Rc::clone(updates);
        let mut objects = ObjectTable::new();
        let door = objects.spawn(
            "Door",
            CapabilityTable::new().with_signal("OnUpdate", move |_| {
                counter.set(counter.get() + 1);
                Ok(())
            }),
        );
        let definition = TimelineDefinition::new("Open").with_length(2.0).replicated(true);
        let mut instance = TimelineInstance::from_definition(&definition, door);
        instance.register_event_track("Creak", EventCurve::new([1.0]));
        instance.bind_update(&objects, door, "OnUpdate");
        (objects, instance)
    }

    #[test]
    fn test_stopped_instance_snaps_without_events() {
        let updates = Rc::new(Cell::new(0));
        let (_objects, mut instance) = replicated_door(&updates);
        instance.set_new_time(0.5);
        let baseline = instance.detector_state("Creak");
        updates.set(0);

        let state = ReplicatedTimeline {
            position: 1.5,
            ..instance.snapshot()
        };
        let report = instance.apply_replicated(&state).unwrap();

        assert_eq!(instance.position(), 1.5);
        assert!(report.fired.is_empty());
        assert_eq!(updates.get(), 1);
        assert_eq!(instance.detector_state("Creak"), baseline);
        assert_eq!(baseline, Some(DetectorState::Baselined(0.5)));
    }

    #[test]
    fn test_unchanged_position_is_quiet() {
        let updates = Rc::new(Cell::new(0));
        let (_objects, mut instance) = replicated_door(&updates);
        let state = instance.snapshot();
        instance.apply_replicated(&state).unwrap();
        assert_eq!(updates.get(), 0);
    }

    #[test]
    fn test_playing_state_is_adopted_silently() {
        let updates = Rc::new(Cell::new(0));
        let (_objects, mut instance) = replicated_door(&updates);
        let state = ReplicatedTimeline {
            position: 1.25,
            playing: true,
            direction: Direction::Backward,
            play_rate: 2.0,
            looping: true,
        };
        instance.apply_replicated(&state).unwrap();

        assert_eq!(instance.snapshot(), state);
        assert_eq!(updates.get(), 0);
    }

    #[test]
    fn test_non_finite_rate_from_transport_is_ignored() {
        let updates = Rc::new(Cell::new(0));
        let (_objects, mut instance) = replicated_door(&updates);
        let state = ReplicatedTimeline {
            position: 0.2,
            playing: true,
            direction: Direction::Forward,
            play_rate: f32::NAN,
            looping: false,
        };
        instance.apply_replicated(&state).unwrap();
        assert_eq!(instance.play_rate(), 1.0);

        instance.advance(0.1);
        assert!((instance.position() - 0.3).abs() < 1e-6);
        assert!((0.0..=instance.length()).contains(&instance.position()));
    }

    #[test]
    fn test_payload_survives_transport() {
        let state = ReplicatedTimeline {
            position: 0.75,
            playing: false,
            direction: Direction::Backward,
            play_rate: 1.0,
            looping: false,
        };
        let bytes = state.encode().unwrap();
        assert_eq!(ReplicatedTimeline::decode(&bytes).unwrap(), state);
        assert!(matches!(ReplicatedTimeline::decode(&bytes[..3]), Err(TimelineError::Codec(_))));
    }

    #[test]
    fn test_non_replicated_instance_rejects_state() {
        let mut objects = ObjectTable::new();
        let door = objects.spawn("Door", CapabilityTable::new());
        let mut instance = TimelineInstance::new("Open", door);
        let state = instance.snapshot();
        assert!(matches!(
            instance.apply_replicated(&state),
            Err(TimelineError::NotReplicated(_))
        ));
    }
}
