use nalgebra::{UnitQuaternion, Vector3};

use crate::device::{DeviceId, DeviceProperties};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TrackingResult {
    #[default]
    Uninitialized,
    RunningOk,
    RunningOutOfRange,
}

/// Host-facing pose record of one tracked hand.
///
/// Angular velocity and both accelerations stay zero: the sensor reports neither.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub world_from_driver_rotation: UnitQuaternion<f32>,
    pub world_from_driver_translation: Vector3<f32>,
    pub driver_from_head_rotation: UnitQuaternion<f32>,
    pub driver_from_head_translation: Vector3<f32>,
    /// Meters, driver space.
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub velocity: Vector3<f32>,
    pub acceleration: Vector3<f32>,
    pub angular_velocity: Vector3<f32>,
    pub angular_acceleration: Vector3<f32>,
    /// Seconds.
    pub pose_time_offset: f32,
    pub will_drift_in_yaw: bool,
    pub should_apply_head_model: bool,
    pub result: TrackingResult,
    pub valid: bool,
    pub connected: bool,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            world_from_driver_rotation: UnitQuaternion::identity(),
            world_from_driver_translation: Vector3::zeros(),
            driver_from_head_rotation: UnitQuaternion::identity(),
            driver_from_head_translation: Vector3::zeros(),
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            velocity: Vector3::zeros(),
            acceleration: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            angular_acceleration: Vector3::zeros(),
            pose_time_offset: -0.016,
            will_drift_in_yaw: false,
            should_apply_head_model: false,
            result: TrackingResult::Uninitialized,
            valid: false,
            connected: false,
        }
    }
}

/// Button identifiers understood by the host. The discriminant is the bit index
/// used in [`ButtonMask`].
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ButtonId {
    System = 0,
    ApplicationMenu = 1,
    Grip = 2,
    Touchpad = 32,
    Trigger = 33,
}

impl ButtonId {
    /// Ascending bit order.
    pub const ALL: [ButtonId; 5] = [
        ButtonId::System,
        ButtonId::ApplicationMenu,
        ButtonId::Grip,
        ButtonId::Touchpad,
        ButtonId::Trigger,
    ];

    pub fn mask(self) -> ButtonMask {
        match self {
            ButtonId::System => ButtonMask::SYSTEM,
            ButtonId::ApplicationMenu => ButtonMask::APPLICATION_MENU,
            ButtonId::Grip => ButtonMask::GRIP,
            ButtonId::Touchpad => ButtonMask::TOUCHPAD,
            ButtonId::Trigger => ButtonMask::TRIGGER,
        }
    }
}

bitflags::bitflags! {
    /// Host button bitmap, one bit per [`ButtonId`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ButtonMask: u64 {
        const SYSTEM           = 1 << 0;
        const APPLICATION_MENU = 1 << 1;
        const GRIP             = 1 << 2;
        const TOUCHPAD         = 1 << 32;
        const TRIGGER          = 1 << 33;
    }
}

impl Default for ButtonMask {
    fn default() -> Self {
        Self::empty()
    }
}

impl ButtonMask {
    /// Buttons whose bit is set, in ascending bit order.
    pub fn buttons(self) -> impl Iterator<Item = ButtonId> {
        ButtonId::ALL
            .into_iter()
            .filter(move |button| self.contains(button.mask()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ButtonEventKind {
    Touched,
    Pressed,
    Unpressed,
    Untouched,
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct ControllerAxis {
    pub x: f32,
    pub y: f32,
}

impl ControllerAxis {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Vendor-specific event code asking the control panel to start a realign.
pub const VENDOR_EVENT_REALIGN: u32 = 0;

#[derive(Clone, Debug, PartialEq)]
pub enum HostEvent {
    DeviceAdded(DeviceId, DeviceProperties),
    PoseUpdated(DeviceId, Pose),
    Button(DeviceId, ButtonId, ButtonEventKind),
    Axis(DeviceId, u32, ControllerAxis),
    VendorSpecific(DeviceId, u32),
}
