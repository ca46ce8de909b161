use std::path::{Path, PathBuf};

use app_dirs2::{get_app_root, AppDataType, AppInfo};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::device::HandSide;

pub const APP_INFO: AppInfo = AppInfo {
    name: "leap_hand",
    author: "leap_hand",
};

const CONFIG_FILE_NAME: &str = "driver_config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config directory unavailable: {0}")]
    AppDirs(#[from] app_dirs2::AppDirsError),
    #[error("config I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("config is not valid json5: {0}")]
    Json5(#[from] json5::Error),
}

/// Which gestures are allowed to drive which virtual controller inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub menu: bool,
    pub application_menu: bool,
    pub trigger: bool,
    pub grip: bool,
    pub touchpad: bool,
    pub touchpad_touch: bool,
    pub touchpad_press: bool,
    pub touchpad_axes: bool,
}

impl FeatureFlags {
    pub fn all_enabled() -> Self {
        Self {
            menu: true,
            application_menu: true,
            trigger: true,
            grip: true,
            touchpad: true,
            touchpad_touch: true,
            touchpad_press: true,
            touchpad_axes: true,
        }
    }

    pub fn all_disabled() -> Self {
        Self {
            menu: false,
            application_menu: false,
            trigger: false,
            grip: false,
            touchpad: false,
            touchpad_touch: false,
            touchpad_press: false,
            touchpad_axes: false,
        }
    }

    /// Touchpad position is only reported while the pad, pad touch and pad axes are all on.
    pub fn touchpad_axes_reported(&self) -> bool {
        self.touchpad && self.touchpad_touch && self.touchpad_axes
    }
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self::all_enabled()
    }
}

/// Static grip rotation, in degrees, as configured for the left hand.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GripOffset {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl GripOffset {
    /// The right hand mirrors the left: X is shared, Y and Z flip sign.
    pub fn for_side(self, side: HandSide) -> Self {
        match side {
            HandSide::Left => self,
            HandSide::Right => Self {
                x: self.x,
                y: -self.y,
                z: -self.z,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub features: FeatureFlags,
    pub grip_offset: GripOffset,
    pub render_model_left: String,
    pub render_model_right: String,
    pub poll_rate_hz: f32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            features: FeatureFlags::default(),
            grip_offset: GripOffset::default(),
            render_model_left: "vr_controller_vive_1_5".to_owned(),
            render_model_right: "vr_controller_vive_1_5".to_owned(),
            poll_rate_hz: 90.0,
        }
    }
}

impl DriverConfig {
    pub fn from_json5_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(json5::from_str(contents)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        tracing::info!("Loading driver config from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_json5_str(&contents)
    }

    pub fn render_model(&self, side: HandSide) -> &str {
        match side {
            HandSide::Left => &self.render_model_left,
            HandSide::Right => &self.render_model_right,
        }
    }
}

fn driver_config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = get_app_root(AppDataType::UserConfig, &APP_INFO)?;
    Ok(config_dir.join(CONFIG_FILE_NAME))
}

pub fn driver_config() -> Result<DriverConfig, ConfigError> {
    let path = driver_config_path()?;

    if path.exists() {
        DriverConfig::load(&path)
    } else {
        tracing::warn!("Driver config file not found, using default values");
        Ok(Default::default())
    }
}

pub fn driver_config_save(config: &DriverConfig) -> Result<(), ConfigError> {
    let path = driver_config_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(&path, json5::to_string(config)?)?;
    Ok(())
}
