use std::sync::atomic::{AtomicU32, Ordering};

use leap_hand_common::device::{DeviceId, DeviceProperties};
use leap_hand_common::events::{ButtonEventKind, ButtonId, ControllerAxis, HostEvent, Pose};
use tokio::sync::broadcast;

/// The head-mounted-display runtime the driver reports into.
///
/// Every call is fire-and-forget.
pub trait DriverHost: Send + Sync {
    /// Registers a device and returns the identity the host assigned to it.
    fn device_added(&self, properties: &DeviceProperties) -> DeviceId;

    fn publish_pose(&self, device: DeviceId, pose: &Pose);

    fn notify_button_event(&self, device: DeviceId, button: ButtonId, kind: ButtonEventKind);

    fn notify_axis_event(&self, device: DeviceId, axis: u32, value: ControllerAxis);

    fn vendor_specific_event(&self, device: DeviceId, code: u32);
}

/// Host that republishes every call as a [`HostEvent`] on a broadcast channel.
pub struct BroadcastHost {
    sender: broadcast::Sender<HostEvent>,
    next_id: AtomicU32,
}

impl BroadcastHost {
    pub fn new(sender: broadcast::Sender<HostEvent>) -> Self {
        Self {
            sender,
            next_id: AtomicU32::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.sender.subscribe()
    }

    fn send(&self, event: HostEvent) {
        // no subscribers is fine
        let _ = self.sender.send(event);
    }
}

impl DriverHost for BroadcastHost {
    fn device_added(&self, properties: &DeviceProperties) -> DeviceId {
        let id = DeviceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.send(HostEvent::DeviceAdded(id, properties.clone()));
        id
    }

    fn publish_pose(&self, device: DeviceId, pose: &Pose) {
        self.send(HostEvent::PoseUpdated(device, *pose));
    }

    fn notify_button_event(&self, device: DeviceId, button: ButtonId, kind: ButtonEventKind) {
        self.send(HostEvent::Button(device, button, kind));
    }

    fn notify_axis_event(&self, device: DeviceId, axis: u32, value: ControllerAxis) {
        self.send(HostEvent::Axis(device, axis, value));
    }

    fn vendor_specific_event(&self, device: DeviceId, code: u32) {
        self.send(HostEvent::VendorSpecific(device, code));
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use leap_hand_common::device::HandSide;

    /// Everything published so far, in order.
    pub(crate) fn drain(receiver: &mut broadcast::Receiver<HostEvent>) -> Vec<HostEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_ids_are_sequential() {
        let (sender, _) = broadcast::channel(16);
        let host = BroadcastHost::new(sender);
        let mut receiver = host.subscribe();
        let left = host.device_added(&DeviceProperties::for_hand(HandSide::Left, "l"));
        let right = host.device_added(&DeviceProperties::for_hand(HandSide::Right, "r"));
        assert_eq!(left, DeviceId(0));
        assert_eq!(right, DeviceId(1));
        let events = drain(&mut receiver);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[1],
            HostEvent::DeviceAdded(DeviceId(1), p) if p.render_model == "r"
        ));
    }

    #[test]
    fn test_send_without_subscribers() {
        let (sender, receiver) = broadcast::channel(4);
        drop(receiver);
        let host = BroadcastHost::new(sender);
        host.vendor_specific_event(DeviceId(0), 0);
    }
}
