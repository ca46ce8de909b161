//! Sensor frames and the sources that hand them to the polling loop.

use std::collections::VecDeque;
use std::path::Path;

use anyhow::{Context, Result};
use leap_hand_common::device::HandSide;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, info};

/// One hand as reported by the sensor, in sensor-native units and axes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hand {
    #[serde(default)]
    pub id: u32,
    pub side: HandSide,
    #[serde(default = "default_valid")]
    pub valid: bool,
    /// Millimeters.
    pub palm_position: Vector3<f32>,
    /// Millimeters per second.
    #[serde(default = "zero_velocity")]
    pub palm_velocity: Vector3<f32>,
    /// From the palm towards the fingers.
    pub direction: Vector3<f32>,
    /// Out of the palm.
    pub normal: Vector3<f32>,
    /// 0 open hand, 1 fist.
    #[serde(default)]
    pub grab_strength: f32,
    /// 0 apart, 1 thumb and index touching.
    #[serde(default)]
    pub pinch_strength: f32,
}

fn default_valid() -> bool {
    true
}

fn zero_velocity() -> Vector3<f32> {
    Vector3::zeros()
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub hands: Vec<Hand>,
}

impl Frame {
    /// First valid hand of `side`; later duplicates are ignored.
    pub fn hand(&self, side: HandSide) -> Option<&Hand> {
        self.hands.iter().find(|h| h.valid && h.side == side)
    }
}

/// Anything the driver can poll for the newest sensor frame.
pub trait FrameSource: Send {
    fn is_connected(&self) -> bool;

    /// Newest frame since the previous call, without blocking.
    fn acquire_latest_frame(&mut self) -> Option<Frame>;
}

/// Frames pushed by a background acquisition task or thread.
pub struct ChannelFrameSource {
    receiver: mpsc::Receiver<Frame>,
    connected: bool,
}

impl ChannelFrameSource {
    pub fn new(capacity: usize) -> (mpsc::Sender<Frame>, Self) {
        let (sender, receiver) = mpsc::channel(capacity);
        (
            sender,
            Self {
                receiver,
                connected: true,
            },
        )
    }
}

impl FrameSource for ChannelFrameSource {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn acquire_latest_frame(&mut self) -> Option<Frame> {
        let mut latest = None;
        loop {
            match self.receiver.try_recv() {
                Ok(frame) => latest = Some(frame),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.connected {
                        info!("Frame channel closed, sensor considered disconnected");
                    }
                    self.connected = false;
                    break;
                }
            }
        }
        latest
    }
}

/// Plays back frames recorded as JSON lines, one frame per poll.
pub struct ReplayFrameSource {
    frames: Vec<Frame>,
    pending: VecDeque<Frame>,
    looping: bool,
    exhausted: bool,
}

impl ReplayFrameSource {
    pub fn new(frames: Vec<Frame>, looping: bool) -> Self {
        Self {
            pending: frames.iter().cloned().collect(),
            frames,
            looping,
            exhausted: false,
        }
    }

    pub fn from_json_lines(contents: &str, looping: bool) -> Result<Self> {
        let frames = contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str::<Frame>(line)
                    .with_context(|| format!("Invalid frame on line {}", i + 1))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(frames, looping))
    }

    pub fn open(path: &Path, looping: bool) -> Result<Self> {
        info!("Loading replay frames from {}", path.display());
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let source = Self::from_json_lines(&contents, looping)?;
        debug!("Loaded {} replay frames", source.frames.len());
        Ok(source)
    }
}

impl FrameSource for ReplayFrameSource {
    /// Connected until a poll finds nothing left to play.
    fn is_connected(&self) -> bool {
        !self.exhausted
    }

    fn acquire_latest_frame(&mut self) -> Option<Frame> {
        if self.pending.is_empty() && self.looping {
            self.pending.extend(self.frames.iter().cloned());
        }
        let frame = self.pending.pop_front();
        if frame.is_none() && !self.exhausted {
            info!("Replay finished");
            self.exhausted = true;
        }
        frame
    }
}
