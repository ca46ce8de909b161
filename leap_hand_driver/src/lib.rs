mod controller;
mod debug_request;
mod driver;
mod frame;
mod gesture;
mod hand_device;
mod host;
mod math;

use std::ops::RangeInclusive;
use std::time::Duration;

use anyhow::Context;
use futures::StreamExt;
use leap_hand_common::config::FeatureFlags;
use nalgebra::{Matrix3, Vector3};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub use controller::{ControllerState, AXIS_TOUCHPAD, AXIS_TRIGGER};
pub use debug_request::{parse_debug_request, DebugRequest, DebugRequestError};
pub use driver::HandDriver;
pub use frame::{ChannelFrameSource, Frame, FrameSource, Hand, ReplayFrameSource};
pub use gesture::{GestureName, GestureScorer, GestureScores, PalmGestureScorer};
pub use hand_device::TrackedHandDevice;
pub use host::{BroadcastHost, DriverHost};
pub use math::rotation_from_basis;

/// Accepted range for the polling rate.
pub const POLL_RATE_HZ: RangeInclusive<f32> = 1.0..=1000.0;

/// Requests marshaled onto the polling task.
#[derive(Clone, Debug)]
pub enum DriverMessage {
    Realign {
        rotation: Matrix3<f32>,
        translation: Vector3<f32>,
    },
    DebugRequest(String),
    RequestRealignment,
    SetFeatures(FeatureFlags),
}

/// Polls `driver` at `poll_rate_hz` until `cancel_token` fires, applying control
/// messages between frames. Both devices are deactivated on exit.
pub async fn run_driver(
    mut driver: HandDriver,
    control_rx: mpsc::Receiver<DriverMessage>,
    cancel_token: CancellationToken,
    poll_rate_hz: f32,
) -> anyhow::Result<()> {
    anyhow::ensure!(
        POLL_RATE_HZ.contains(&poll_rate_hz),
        "poll rate must be within {:?} Hz, got {poll_rate_hz}",
        POLL_RATE_HZ
    );
    let period = Duration::try_from_secs_f32(1.0 / poll_rate_hz)
        .with_context(|| format!("invalid poll period for {poll_rate_hz} Hz"))?;
    anyhow::ensure!(!period.is_zero(), "poll period rounds to zero");

    let mut ticks = tokio::time::interval(period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut control_stream = tokio_stream::wrappers::ReceiverStream::new(control_rx).fuse();

    info!("Driver loop running at {} Hz", poll_rate_hz);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("Driver loop cancelled");
                break;
            }
            _ = ticks.tick() => driver.run_frame(),
            Some(message) = control_stream.next() => {
                debug!("Control message {:?}", message);
                driver.handle_message(message);
            }
        }
    }

    driver.shutdown();
    Ok(())
}
