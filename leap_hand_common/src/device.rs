use std::fmt;

use serde::{Deserialize, Serialize};

use crate::events::{ButtonId, ButtonMask};

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandSide {
    Left,
    Right,
}

impl HandSide {
    pub fn other(self) -> Self {
        match self {
            HandSide::Left => HandSide::Right,
            HandSide::Right => HandSide::Left,
        }
    }

    pub fn serial_number(self) -> &'static str {
        match self {
            HandSide::Left => "LEAP0_Lefthand",
            HandSide::Right => "LEAP0_Righthand",
        }
    }
}

impl fmt::Display for HandSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandSide::Left => f.write_str("left"),
            HandSide::Right => f.write_str("right"),
        }
    }
}

/// Runtime identity the host assigns to a tracked device once it has been added.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub u32);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AxisType {
    Joystick,
    Trigger,
}

/// Static properties registered with the host when a device is added.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceProperties {
    pub serial_number: String,
    pub render_model: String,
    pub manufacturer: String,
    pub model_number: String,
    pub firmware_revision: u64,
    pub hardware_revision: u64,
    pub axis_types: [AxisType; 2],
    pub supported_buttons: ButtonMask,
}

impl DeviceProperties {
    pub fn for_hand(side: HandSide, render_model: impl Into<String>) -> Self {
        Self {
            serial_number: side.serial_number().to_owned(),
            render_model: render_model.into(),
            manufacturer: "LeapMotion".to_owned(),
            model_number: "Controller".to_owned(),
            firmware_revision: 1,
            hardware_revision: 1,
            axis_types: [AxisType::Joystick, AxisType::Trigger],
            supported_buttons: ButtonId::ALL
                .into_iter()
                .fold(ButtonMask::empty(), |mask, button| mask | button.mask()),
        }
    }
}
