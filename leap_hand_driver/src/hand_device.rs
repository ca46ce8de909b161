//! One virtual controller driven by one tracked hand.

use std::sync::Arc;

use leap_hand_common::config::{DriverConfig, FeatureFlags};
use leap_hand_common::device::{DeviceId, DeviceProperties, HandSide};
use leap_hand_common::events::{Pose, TrackingResult, VENDOR_EVENT_REALIGN};
use nalgebra::{Matrix3, UnitQuaternion, Vector3};
use tracing::{debug, info, trace, warn};

use crate::controller::ControllerState;
use crate::frame::{Frame, Hand};
use crate::gesture::GestureScorer;
use crate::host::DriverHost;
use crate::math::{apply_grip_offset, checked_unit, is_rotation, rotation_from_basis};

/// Millimeters to meters.
const SENSOR_SCALE: f32 = 0.001;

/// Drops the controller origin from the palm to roughly the wrist.
const WRIST_DROP: f32 = 0.15;

/// Motion derived from one hand in one frame, before it is committed to the pose.
#[derive(Clone, Copy, Debug)]
struct HandMotion {
    position: Vector3<f32>,
    velocity: Vector3<f32>,
    rotation: UnitQuaternion<f32>,
}

pub struct TrackedHandDevice {
    side: HandSide,
    device_id: Option<DeviceId>,
    properties: DeviceProperties,
    features: FeatureFlags,
    /// Radians, already mirrored for this side.
    grip_offset: Vector3<f32>,
    world_rotation: UnitQuaternion<f32>,
    world_translation: Vector3<f32>,
    pose: Pose,
    controller_state: ControllerState,
    host: Arc<dyn DriverHost>,
}

impl TrackedHandDevice {
    pub fn new(side: HandSide, config: &DriverConfig, host: Arc<dyn DriverHost>) -> Self {
        let offset = config.grip_offset.for_side(side);
        let grip_offset = Vector3::new(offset.x, offset.y, offset.z).map(f32::to_radians);
        info!("Creating {} hand device with grip offset {:?} deg", side, offset);
        Self {
            side,
            device_id: None,
            properties: DeviceProperties::for_hand(side, config.render_model(side)),
            features: config.features,
            grip_offset,
            world_rotation: UnitQuaternion::identity(),
            world_translation: Vector3::zeros(),
            pose: Pose::default(),
            controller_state: ControllerState::default(),
            host,
        }
    }

    pub fn device_id(&self) -> Option<DeviceId> {
        self.device_id
    }

    pub fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    pub fn controller_state(&self) -> &ControllerState {
        &self.controller_state
    }

    pub fn features(&self) -> &FeatureFlags {
        &self.features
    }

    /// Takes effect on the next matched frame.
    pub fn set_features(&mut self, features: FeatureFlags) {
        debug!("{} hand features now {:?}", self.side, features);
        self.features = features;
    }

    pub fn activate(&mut self, id: DeviceId) {
        info!("Activate: {} is device {}", self.properties.serial_number, id);
        self.device_id = Some(id);
    }

    pub fn deactivate(&mut self) {
        if let Some(id) = self.device_id.take() {
            info!("Deactivate: {} was device {}", self.properties.serial_number, id);
        }
    }

    /// Replaces the world-from-driver transform. `rotation` rows are the basis
    /// of the driver frame in world coordinates.
    ///
    /// A matrix that is not a proper rotation, or a non-finite translation, is
    /// ignored and the previous transform kept.
    pub fn realign(&mut self, rotation: &Matrix3<f32>, translation: Vector3<f32>) {
        if !is_rotation(rotation) || !translation.iter().all(|c| c.is_finite()) {
            warn!(
                "{} hand ignoring realign to {:?}, {:?}",
                self.side, rotation, translation
            );
            return;
        }
        self.world_rotation = rotation_from_basis(rotation);
        self.world_translation = translation;
        debug!(
            "{} hand realigned: rotation {:?}, translation {:?}",
            self.side, self.world_rotation, self.world_translation
        );
    }

    /// Asks the host side to run a realignment.
    pub fn request_realignment(&self) {
        if let Some(id) = self.device_id {
            self.host.vendor_specific_event(id, VENDOR_EVENT_REALIGN);
        }
    }

    pub fn set_as_disconnected(&mut self) {
        let Some(id) = self.device_id else {
            return;
        };
        info!("{} hand disconnected", self.side);
        self.pose.connected = false;
        self.host.publish_pose(id, &self.pose);
    }

    pub fn update(&mut self, frame: &Frame, scorer: &dyn GestureScorer) {
        self.update_tracking_state(frame);
        self.update_controller_state(frame, scorer);
    }

    /// Refreshes the pose from `frame` and publishes it, whether or not the hand
    /// was found. A lost hand keeps its last position and rotation.
    pub fn update_tracking_state(&mut self, frame: &Frame) {
        match frame.hand(self.side).and_then(|hand| self.hand_motion(hand)) {
            Some(motion) => {
                self.pose.world_from_driver_rotation = self.world_rotation;
                self.pose.world_from_driver_translation = self.world_translation;
                self.pose.position = motion.position;
                self.pose.velocity = motion.velocity;
                self.pose.rotation = motion.rotation;
                self.pose.result = TrackingResult::RunningOk;
                self.pose.valid = true;
            }
            None => {
                self.pose.result = TrackingResult::RunningOutOfRange;
                self.pose.valid = false;
            }
        }

        if !self.pose.connected {
            self.pose.connected = true;
        }

        match self.device_id {
            Some(id) => self.host.publish_pose(id, &self.pose),
            None => trace!("{} hand not active, pose not published", self.side),
        }
    }

    /// Infers buttons and axes from the gesture scores of this hand and reports
    /// every transition. Nothing changes when the scorer finds no hand.
    pub fn update_controller_state(&mut self, frame: &Frame, scorer: &dyn GestureScorer) {
        let Some(scores) = scorer.match_gestures(frame, self.side) else {
            return;
        };
        let next = self.controller_state.next(&scores, &self.features);

        if let Some(id) = self.device_id {
            for (button, kind) in self.controller_state.button_transitions(&next) {
                trace!("{} hand {:?} {:?}", self.side, button, kind);
                self.host.notify_button_event(id, button, kind);
            }
            for (axis, value) in self.controller_state.axis_changes(&next, &self.features) {
                self.host.notify_axis_event(id, axis, value);
            }
        }

        self.controller_state = next;
    }

    fn hand_motion(&self, hand: &Hand) -> Option<HandMotion> {
        let (Some(direction), Some(normal)) =
            (checked_unit(&hand.direction), checked_unit(&hand.normal))
        else {
            warn!("{} hand has degenerate direction or normal", self.side);
            return None;
        };
        let Some(side) = checked_unit(&direction.cross(&normal)) else {
            warn!("{} hand direction is parallel to its normal", self.side);
            return None;
        };

        let p = &hand.palm_position;
        let position = Vector3::new(
            -SENSOR_SCALE * p.x,
            -SENSOR_SCALE * p.z,
            -SENSOR_SCALE * p.y - WRIST_DROP,
        );
        let v = &hand.palm_velocity;
        let velocity = Vector3::new(
            -SENSOR_SCALE * v.x,
            -SENSOR_SCALE * v.z,
            -SENSOR_SCALE * v.y,
        );
        if !position.iter().chain(velocity.iter()).all(|c| c.is_finite()) {
            warn!("{} hand has non-finite palm data", self.side);
            return None;
        }

        let rotation = apply_grip_offset(
            rotation_from_basis(&hand_basis(self.side, &direction, &normal, &side)),
            &self.grip_offset,
        );

        Some(HandMotion {
            position,
            velocity,
            rotation,
        })
    }
}

/// Rows of the controller frame for a hand, with sensor Y and Z swapped.
///
/// The left hand flips the normal and the right hand flips the side axis, which
/// keeps both bases right-handed after the swap.
fn hand_basis(
    hand_side: HandSide,
    direction: &Vector3<f32>,
    normal: &Vector3<f32>,
    side: &Vector3<f32>,
) -> Matrix3<f32> {
    let (n, s) = match hand_side {
        HandSide::Left => (-normal, *side),
        HandSide::Right => (*normal, -side),
    };
    let d = direction;
    Matrix3::new(
        n.x, n.z, n.y, //
        s.x, s.z, s.y, //
        d.x, d.z, d.y,
    )
}
