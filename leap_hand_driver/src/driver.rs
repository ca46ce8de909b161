use std::sync::Arc;

use leap_hand_common::config::{DriverConfig, FeatureFlags};
use leap_hand_common::device::HandSide;
use nalgebra::{Matrix3, Vector3};
use tracing::{debug, info, warn};

use crate::debug_request::{parse_debug_request, DebugRequest, DebugRequestError};
use crate::frame::{Frame, FrameSource};
use crate::gesture::GestureScorer;
use crate::hand_device::TrackedHandDevice;
use crate::host::DriverHost;
use crate::DriverMessage;

/// Both hand devices plus the sensor they are fed from.
pub struct HandDriver {
    left: TrackedHandDevice,
    right: TrackedHandDevice,
    source: Box<dyn FrameSource>,
    scorer: Box<dyn GestureScorer>,
    last_frame: Option<Frame>,
    sensor_connected: bool,
}

impl HandDriver {
    /// Creates both devices and registers them with `host`.
    pub fn new(
        config: &DriverConfig,
        source: Box<dyn FrameSource>,
        scorer: Box<dyn GestureScorer>,
        host: Arc<dyn DriverHost>,
    ) -> Self {
        let mut left = TrackedHandDevice::new(HandSide::Left, config, host.clone());
        let mut right = TrackedHandDevice::new(HandSide::Right, config, host.clone());
        for device in [&mut left, &mut right] {
            let id = host.device_added(device.properties());
            device.activate(id);
        }
        Self {
            left,
            right,
            source,
            scorer,
            last_frame: None,
            sensor_connected: false,
        }
    }

    pub fn device(&self, side: HandSide) -> &TrackedHandDevice {
        match side {
            HandSide::Left => &self.left,
            HandSide::Right => &self.right,
        }
    }

    pub fn sensor_connected(&self) -> bool {
        self.sensor_connected
    }

    /// One polling step: pick up the newest frame and update left, then right.
    ///
    /// Without a new frame the previous one is reused. Nothing is published
    /// before the first frame arrives.
    pub fn run_frame(&mut self) {
        let frame = self.source.acquire_latest_frame();
        let connected = self.source.is_connected();

        if connected != self.sensor_connected {
            self.sensor_connected = connected;
            if connected {
                info!("Sensor connected");
            } else {
                warn!("Sensor disconnected");
                self.left.set_as_disconnected();
                self.right.set_as_disconnected();
            }
        }

        if let Some(frame) = frame {
            self.last_frame = Some(frame);
        }
        if !connected {
            return;
        }
        let Some(frame) = &self.last_frame else {
            return;
        };
        self.left.update(frame, self.scorer.as_ref());
        self.right.update(frame, self.scorer.as_ref());
    }

    pub fn realign(&mut self, rotation: &Matrix3<f32>, translation: Vector3<f32>) {
        info!("Realigning coordinates");
        self.left.realign(rotation, translation);
        self.right.realign(rotation, translation);
    }

    pub fn request_realignment(&self) {
        debug!("Requesting realignment");
        self.left.request_realignment();
        self.right.request_realignment();
    }

    pub fn set_features(&mut self, features: FeatureFlags) {
        self.left.set_features(features);
        self.right.set_features(features);
    }

    pub fn handle_debug_request(&mut self, request: &str) -> Result<(), DebugRequestError> {
        match parse_debug_request(request) {
            Ok(DebugRequest::RealignCoordinates {
                rotation,
                translation,
            }) => {
                self.realign(
                    &DebugRequest::rotation_matrix(&rotation),
                    DebugRequest::translation_vector(&translation),
                );
                Ok(())
            }
            Err(e) => {
                warn!("Rejected debug request {:?}: {}", request, e);
                Err(e)
            }
        }
    }

    pub fn handle_message(&mut self, message: DriverMessage) {
        match message {
            DriverMessage::Realign {
                rotation,
                translation,
            } => self.realign(&rotation, translation),
            DriverMessage::DebugRequest(request) => {
                // already logged
                let _ = self.handle_debug_request(&request);
            }
            DriverMessage::RequestRealignment => self.request_realignment(),
            DriverMessage::SetFeatures(features) => self.set_features(features),
        }
    }

    pub fn shutdown(&mut self) {
        info!("Shutting down hand devices");
        self.left.deactivate();
        self.right.deactivate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{ChannelFrameSource, Hand};
    use crate::gesture::PalmGestureScorer;
    use crate::host::tests::drain;
    use crate::host::BroadcastHost;
    use leap_hand_common::device::DeviceId;
    use leap_hand_common::events::{HostEvent, TrackingResult, VENDOR_EVENT_REALIGN};
    use nalgebra::UnitQuaternion;
    use tokio::sync::{broadcast, mpsc};

    fn driver() -> (
        HandDriver,
        mpsc::Sender<Frame>,
        broadcast::Receiver<HostEvent>,
    ) {
        let (sender, receiver) = broadcast::channel(1024);
        let (frames, source) = ChannelFrameSource::new(16);
        let driver = HandDriver::new(
            &DriverConfig::default(),
            Box::new(source),
            Box::new(PalmGestureScorer::default()),
            Arc::new(BroadcastHost::new(sender)),
        );
        (driver, frames, receiver)
    }

    fn both_hands() -> Frame {
        let hand = |side| Hand {
            id: 0,
            side,
            valid: true,
            palm_position: Vector3::new(0.0, 180.0, 0.0),
            palm_velocity: Vector3::zeros(),
            direction: Vector3::new(0.0, 0.0, -1.0),
            normal: Vector3::new(0.0, -1.0, 0.0),
            grab_strength: 0.0,
            pinch_strength: 0.0,
        };
        Frame {
            id: 1,
            hands: vec![hand(HandSide::Left), hand(HandSide::Right)],
        }
    }

    fn pose_updates(events: &[HostEvent]) -> Vec<(DeviceId, bool, bool)> {
        events
            .iter()
            .filter_map(|e| match e {
                HostEvent::PoseUpdated(id, pose) => Some((*id, pose.valid, pose.connected)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_registers_both_hands() {
        let (driver, _frames, mut rx) = driver();
        let events = drain(&mut rx);
        assert!(matches!(&events[..], [
            HostEvent::DeviceAdded(DeviceId(0), l),
            HostEvent::DeviceAdded(DeviceId(1), r),
        ] if l.serial_number == "LEAP0_Lefthand" && r.serial_number == "LEAP0_Righthand"));
        assert_eq!(driver.device(HandSide::Left).device_id(), Some(DeviceId(0)));
        assert_eq!(driver.device(HandSide::Right).device_id(), Some(DeviceId(1)));
    }

    #[test]
    fn test_nothing_published_before_first_frame() {
        let (mut driver, _frames, mut rx) = driver();
        drain(&mut rx);
        driver.run_frame();
        driver.run_frame();
        assert!(driver.sensor_connected());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_updates_left_then_right_and_reuses_frame() {
        let (mut driver, frames, mut rx) = driver();
        drain(&mut rx);
        frames.try_send(both_hands()).unwrap();

        driver.run_frame();
        driver.run_frame();

        assert_eq!(
            pose_updates(&drain(&mut rx)),
            vec![
                (DeviceId(0), true, true),
                (DeviceId(1), true, true),
                (DeviceId(0), true, true),
                (DeviceId(1), true, true),
            ]
        );
        assert_eq!(
            driver.device(HandSide::Right).pose().result,
            TrackingResult::RunningOk
        );
    }

    #[test]
    fn test_sensor_disconnect_reported_once() {
        let (mut driver, frames, mut rx) = driver();
        frames.try_send(both_hands()).unwrap();
        driver.run_frame();
        drain(&mut rx);

        drop(frames);
        driver.run_frame();
        driver.run_frame();

        assert!(!driver.sensor_connected());
        assert_eq!(
            pose_updates(&drain(&mut rx)),
            vec![(DeviceId(0), true, false), (DeviceId(1), true, false)]
        );
    }

    #[test]
    fn test_debug_request_realigns_both_hands() {
        let (mut driver, frames, mut rx) = driver();
        driver
            .handle_debug_request("leap:realign_coordinates 0 1 0 0  -1 0 0 0  0 0 1 2")
            .unwrap();
        assert!(driver.handle_debug_request("leap:nope").is_err());

        frames.try_send(both_hands()).unwrap();
        driver.run_frame();
        drain(&mut rx);

        let expected =
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f32::consts::FRAC_PI_2);
        for side in [HandSide::Left, HandSide::Right] {
            let pose = driver.device(side).pose();
            let dot = pose.world_from_driver_rotation.coords.dot(&expected.coords);
            assert!(dot.abs() > 1.0 - 1.0e-5);
            assert_eq!(
                pose.world_from_driver_translation,
                Vector3::new(0.0, 0.0, 2.0)
            );
        }
    }

    #[test]
    fn test_bad_realign_keeps_poses_finite() {
        let (mut driver, frames, mut rx) = driver();
        assert_eq!(
            driver.handle_debug_request("leap:realign_coordinates NaN 0 0 0 0 1 0 0 0 0 1 0"),
            Err(DebugRequestError::InvalidNumber {
                index: 0,
                value: "NaN".to_owned()
            })
        );
        driver.handle_message(DriverMessage::Realign {
            rotation: Matrix3::from_diagonal_element(f32::NAN),
            translation: Vector3::zeros(),
        });
        driver.handle_message(DriverMessage::Realign {
            rotation: Matrix3::identity(),
            translation: Vector3::new(f32::INFINITY, 0.0, 0.0),
        });

        frames.try_send(both_hands()).unwrap();
        driver.run_frame();

        for event in drain(&mut rx) {
            if let HostEvent::PoseUpdated(_, pose) = event {
                assert!(pose.valid);
                assert_eq!(pose.world_from_driver_rotation, UnitQuaternion::identity());
                assert_eq!(pose.world_from_driver_translation, Vector3::zeros());
            }
        }
    }

    #[test]
    fn test_messages_and_shutdown() {
        let (mut driver, _frames, mut rx) = driver();
        drain(&mut rx);
        driver.handle_message(DriverMessage::RequestRealignment);
        driver.handle_message(DriverMessage::SetFeatures(FeatureFlags::all_disabled()));
        assert_eq!(
            drain(&mut rx),
            vec![
                HostEvent::VendorSpecific(DeviceId(0), VENDOR_EVENT_REALIGN),
                HostEvent::VendorSpecific(DeviceId(1), VENDOR_EVENT_REALIGN),
            ]
        );
        assert_eq!(
            *driver.device(HandSide::Left).features(),
            FeatureFlags::all_disabled()
        );

        driver.shutdown();
        driver.request_realignment();
        assert!(drain(&mut rx).is_empty());
        assert_eq!(driver.device(HandSide::Left).device_id(), None);
    }
}
