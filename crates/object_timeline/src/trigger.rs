// SPDX-License-Identifier: MIT OR Apache-2.0
//! Directional trigger-crossing detection for event tracks.
//!
//! A detector remembers the cursor position seen on the previous step. Until
//! it has seen one (after creation or a curve swap) it cannot know what was
//! crossed, so its first observation only records a baseline.
//!
//! At most one trigger is reported per step: the first crossed trigger in
//! ascending time order. Closely spaced triggers inside one large step are
//! therefore coalesced.

use serde::{Deserialize, Serialize};

/// Playback direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Cursor increases
    #[default]
    Forward,
    /// Cursor decreases
    Backward,
}

impl Direction {
    /// `1.0` forward, `-1.0` backward
    pub fn sign(self) -> f32 {
        match self {
            Self::Forward => 1.0,
            Self::Backward => -1.0,
        }
    }

    /// Whether this is [`Direction::Forward`]
    pub fn is_forward(self) -> bool {
        self == Self::Forward
    }
}

/// Detector memory
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DetectorState {
    /// No previous position; the next observation only records one
    #[default]
    Unbaselined,
    /// Previous position is known and the next observation also includes a
    /// trigger sitting exactly on it. Set when playback is started from a
    /// position rather than arriving at it.
    Primed(f32),
    /// Previous position is known
    Baselined(f32),
}

/// Per-event-track crossing detector
#[derive(Debug, Clone, Default)]
pub struct TriggerDetector {
    state: DetectorState,
}

impl TriggerDetector {
    /// Create an unbaselined detector
    pub fn new() -> Self {
        Self::default()
    }

    /// Current memory
    pub fn state(&self) -> DetectorState {
        self.state
    }

    /// Whether a previous position is known
    pub fn has_baseline(&self) -> bool {
        !matches!(self.state, DetectorState::Unbaselined)
    }

    /// Forget the previous position
    pub fn reset(&mut self) {
        self.state = DetectorState::Unbaselined;
    }

    /// Record `position` as the previous position, including it in the next crossing test
    pub fn prime(&mut self, position: f32) {
        self.state = DetectorState::Primed(position);
    }

    /// Observe the cursor at `position` and report the trigger crossed since
    /// the previous observation, if any
    pub fn observe(
        &mut self,
        position: f32,
        direction: Direction,
        triggers: &[f32],
    ) -> Option<f32> {
        match std::mem::replace(&mut self.state, DetectorState::Baselined(position)) {
            DetectorState::Unbaselined => None,
            DetectorState::Baselined(previous) => {
                first_crossed(triggers, previous, position, direction)
            }
            DetectorState::Primed(previous) => {
                first_reached(triggers, previous, position, direction)
            }
        }
    }
}

/// First trigger crossed moving from `from` to `to`.
///
/// Forward fires `t` when `from < t <= to`; backward when `to <= t < from`.
pub fn first_crossed(triggers: &[f32], from: f32, to: f32, direction: Direction) -> Option<f32> {
    triggers.iter().copied().find(|&t| match direction {
        Direction::Forward => from < t && t <= to,
        Direction::Backward => to <= t && t < from,
    })
}

fn first_reached(triggers: &[f32], from: f32, to: f32, direction: Direction) -> Option<f32> {
    triggers.iter().copied().find(|&t| match direction {
        Direction::Forward => from <= t && t <= to,
        Direction::Backward => to <= t && t <= from,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const TRIGGERS: &[f32] = &[0.25, 0.5, 0.75];

    #[test]
    fn test_first_observation_only_baselines() {
        let mut detector = TriggerDetector::new();
        // Large jump across every trigger still must not fire.
        assert_eq!(detector.observe(1.0, Direction::Forward, TRIGGERS), None);
        assert_eq!(detector.state(), DetectorState::Baselined(1.0));
    }

    #[test_case(0.2, 0.25, Direction::Forward, Some(0.25) ; "forward lands on trigger")]
    #[test_case(0.25, 0.3, Direction::Forward, None ; "forward leaves trigger")]
    #[test_case(0.3, 0.8, Direction::Forward, Some(0.5) ; "forward reports first only")]
    #[test_case(0.8, 0.75, Direction::Backward, Some(0.75) ; "backward lands on trigger")]
    #[test_case(0.75, 0.7, Direction::Backward, None ; "backward leaves trigger")]
    #[test_case(0.9, 0.1, Direction::Backward, Some(0.25) ; "backward reports lowest time first")]
    #[test_case(0.1, 0.2, Direction::Forward, None ; "nothing crossed")]
    #[test_case(0.6, 0.4, Direction::Forward, None ; "wrong direction")]
    fn test_crossing(from: f32, to: f32, direction: Direction, expected: Option<f32>) {
        assert_eq!(first_crossed(TRIGGERS, from, to, direction), expected);
    }

    #[test]
    fn test_forward_fires_exactly_once() {
        let mut detector = TriggerDetector::new();
        let mut fired = Vec::new();
        for step in 0..=10 {
            let position = step as f32 * 0.1;
            if let Some(t) = detector.observe(position, Direction::Forward, &[0.45]) {
                fired.push(t);
            }
        }
        assert_eq!(fired, vec![0.45]);
    }

    #[test]
    fn test_backward_fires_exactly_once() {
        let mut detector = TriggerDetector::new();
        let mut fired = 0;
        for step in (0..=10).rev() {
            let position = step as f32 * 0.1;
            if detector.observe(position, Direction::Backward, &[0.45]).is_some() {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);
    }

    #[test]
    fn test_reset_requires_new_baseline() {
        let mut detector = TriggerDetector::new();
        detector.observe(0.1, Direction::Forward, TRIGGERS);
        detector.reset();
        assert!(!detector.has_baseline());
        assert_eq!(detector.observe(0.3, Direction::Forward, TRIGGERS), None);
        assert_eq!(detector.observe(0.6, Direction::Forward, TRIGGERS), Some(0.5));
    }

    #[test]
    fn test_primed_includes_start_position() {
        let mut detector = TriggerDetector::new();
        detector.prime(0.0);
        assert_eq!(detector.observe(0.1, Direction::Forward, &[0.0]), Some(0.0));
        assert_eq!(detector.observe(0.2, Direction::Forward, &[0.0]), None);
    }

    #[test]
    fn test_direction_reversal() {
        let mut detector = TriggerDetector::new();
        detector.observe(0.4, Direction::Forward, TRIGGERS);
        assert_eq!(detector.observe(0.6, Direction::Forward, TRIGGERS), Some(0.5));
        // Turning around re-crosses the same trigger from the other side.
        assert_eq!(detector.observe(0.45, Direction::Backward, TRIGGERS), Some(0.5));
    }
}
