//! Gesture scoring: continuous [0, 1] measures per hand that the controller
//! state maps onto buttons and axes.

use std::ops::Index;

use leap_hand_common::device::HandSide;
use nalgebra::Vector3;

use crate::frame::{Frame, Hand};
use crate::math::checked_unit;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GestureName {
    /// "T" formed with the other hand.
    Timeout,
    FlatHandPalmTowards,
    TriggerFinger,
    LowerFist,
    Thumbpress,
    TouchpadAxisX,
    TouchpadAxisY,
}

impl GestureName {
    pub const COUNT: usize = 7;

    pub const ALL: [GestureName; Self::COUNT] = [
        GestureName::Timeout,
        GestureName::FlatHandPalmTowards,
        GestureName::TriggerFinger,
        GestureName::LowerFist,
        GestureName::Thumbpress,
        GestureName::TouchpadAxisX,
        GestureName::TouchpadAxisY,
    ];
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GestureScores([f32; GestureName::COUNT]);

impl GestureScores {
    /// Sets `gesture`, clamping into [0, 1]. NaN becomes 0.
    pub fn set(&mut self, gesture: GestureName, score: f32) {
        self.0[gesture as usize] = if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 1.0)
        };
    }

    pub fn with(mut self, gesture: GestureName, score: f32) -> Self {
        self.set(gesture, score);
        self
    }
}

impl Index<GestureName> for GestureScores {
    type Output = f32;

    fn index(&self, gesture: GestureName) -> &f32 {
        &self.0[gesture as usize]
    }
}

pub trait GestureScorer: Send {
    /// Scores for the hand of `side`, or `None` when the frame has no such hand.
    fn match_gestures(&self, frame: &Frame, side: HandSide) -> Option<GestureScores>;
}

/// Heuristic scorer working from palm geometry and the sensor's grab and pinch
/// strengths.
///
/// Sensor axes are those of a head-mounted sensor: +Y points away from the
/// wearer, -Z points up.
#[derive(Clone, Copy, Debug)]
pub struct PalmGestureScorer {
    /// Palm distance (mm) at which the "T" score fades to zero.
    pub timeout_reach: f32,
}

impl Default for PalmGestureScorer {
    fn default() -> Self {
        Self {
            timeout_reach: 150.0,
        }
    }
}

impl PalmGestureScorer {
    fn timeout_score(&self, hand: &Hand, direction: &Vector3<f32>, other: &Hand) -> f32 {
        let Some(other_direction) = checked_unit(&other.direction) else {
            return 0.0;
        };
        let perpendicular = 1.0 - direction.dot(&other_direction).abs();
        let distance = (hand.palm_position - other.palm_position).norm();
        let proximity = (1.0 - distance / self.timeout_reach).max(0.0);
        perpendicular * proximity
    }
}

impl GestureScorer for PalmGestureScorer {
    fn match_gestures(&self, frame: &Frame, side: HandSide) -> Option<GestureScores> {
        let hand = frame.hand(side)?;
        let direction = checked_unit(&hand.direction)?;
        let normal = checked_unit(&hand.normal)?;

        let grab = hand.grab_strength.clamp(0.0, 1.0);
        let pinch = hand.pinch_strength.clamp(0.0, 1.0);
        let facing_wearer = (-normal.y).max(0.0);

        let timeout = frame
            .hand(side.other())
            .map(|other| self.timeout_score(hand, &direction, other))
            .unwrap_or(0.0);

        let mut scores = GestureScores::default();
        scores.set(GestureName::Timeout, timeout);
        scores.set(GestureName::FlatHandPalmTowards, (1.0 - grab) * facing_wearer);
        scores.set(GestureName::TriggerFinger, pinch);
        scores.set(GestureName::LowerFist, grab);
        scores.set(GestureName::Thumbpress, grab * pinch);
        scores.set(GestureName::TouchpadAxisX, 0.5 + 0.5 * normal.x);
        scores.set(GestureName::TouchpadAxisY, 0.5 - 0.5 * direction.z);
        Some(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand(side: HandSide) -> Hand {
        Hand {
            id: 0,
            side,
            valid: true,
            palm_position: Vector3::new(0.0, 200.0, 0.0),
            palm_velocity: Vector3::zeros(),
            direction: Vector3::new(0.0, 1.0, 0.0),
            normal: Vector3::new(0.0, 0.0, 1.0),
            grab_strength: 0.0,
            pinch_strength: 0.0,
        }
    }

    #[test]
    fn test_scores_are_clamped() {
        let scores = GestureScores::default()
            .with(GestureName::TriggerFinger, 1.5)
            .with(GestureName::LowerFist, -0.5)
            .with(GestureName::Thumbpress, f32::NAN);
        assert_eq!(scores[GestureName::TriggerFinger], 1.0);
        assert_eq!(scores[GestureName::LowerFist], 0.0);
        assert_eq!(scores[GestureName::Thumbpress], 0.0);
    }

    #[test]
    fn test_no_hand_no_scores() {
        let scorer = PalmGestureScorer::default();
        let frame = Frame {
            id: 1,
            hands: vec![hand(HandSide::Right)],
        };
        assert!(scorer.match_gestures(&frame, HandSide::Left).is_none());
        assert!(scorer.match_gestures(&frame, HandSide::Right).is_some());
    }

    #[test]
    fn test_degenerate_hand_is_not_matched() {
        let mut degenerate = hand(HandSide::Left);
        degenerate.normal = Vector3::zeros();
        let frame = Frame {
            id: 1,
            hands: vec![degenerate],
        };
        assert!(PalmGestureScorer::default()
            .match_gestures(&frame, HandSide::Left)
            .is_none());
    }

    #[test]
    fn test_strengths_drive_trigger_grip_and_thumb() {
        let mut h = hand(HandSide::Left);
        h.pinch_strength = 0.6;
        h.grab_strength = 0.5;
        let frame = Frame {
            id: 1,
            hands: vec![h],
        };
        let scores = PalmGestureScorer::default()
            .match_gestures(&frame, HandSide::Left)
            .unwrap();
        assert_eq!(scores[GestureName::TriggerFinger], 0.6);
        assert_eq!(scores[GestureName::LowerFist], 0.5);
        assert!((scores[GestureName::Thumbpress] - 0.3).abs() < 1.0e-6);
        assert_eq!(scores[GestureName::Timeout], 0.0);
    }

    #[test]
    fn test_open_palm_towards_wearer() {
        let mut h = hand(HandSide::Right);
        h.normal = Vector3::new(0.0, -1.0, 0.0);
        h.direction = Vector3::new(0.0, 0.0, -1.0);
        let frame = Frame {
            id: 1,
            hands: vec![h],
        };
        let scores = PalmGestureScorer::default()
            .match_gestures(&frame, HandSide::Right)
            .unwrap();
        assert_eq!(scores[GestureName::FlatHandPalmTowards], 1.0);
        assert_eq!(scores[GestureName::TouchpadAxisX], 0.5);
        assert_eq!(scores[GestureName::TouchpadAxisY], 1.0);
    }

    #[test]
    fn test_timeout_needs_close_perpendicular_hands() {
        let left = hand(HandSide::Left);
        let mut right = hand(HandSide::Right);
        right.direction = Vector3::new(1.0, 0.0, 0.0);
        right.palm_position = Vector3::new(0.0, 200.0, -30.0);
        let frame = Frame {
            id: 1,
            hands: vec![left.clone(), right.clone()],
        };
        let scorer = PalmGestureScorer::default();
        let close = scorer.match_gestures(&frame, HandSide::Left).unwrap();
        assert!((close[GestureName::Timeout] - 0.8).abs() < 1.0e-5);

        right.palm_position = Vector3::new(0.0, 200.0, -300.0);
        let frame = Frame {
            id: 2,
            hands: vec![left, right],
        };
        let far = scorer.match_gestures(&frame, HandSide::Left).unwrap();
        assert_eq!(far[GestureName::Timeout], 0.0);
    }
}
