use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use leap_hand_common::config::{driver_config, driver_config_save, DriverConfig};
use leap_hand_common::events::HostEvent;
use leap_hand_driver::{
    run_driver, BroadcastHost, ChannelFrameSource, DriverMessage, FrameSource, HandDriver,
    PalmGestureScorer, ReplayFrameSource,
};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Default, PartialEq)]
#[command(name = "leap_hand", about = "Leap Motion hands as virtual motion controllers")]
struct Args {
    /// Driver config file (default: the per-user driver_config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Recorded frames to play back, one JSON frame per line
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Restart the replay when it runs out
    #[arg(long = "loop")]
    looping: bool,

    /// Write the loaded config back to the per-user config dir
    #[arg(long)]
    save_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_env_var("RUST_LOG")
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => DriverConfig::load(path)?,
        None => driver_config()?,
    };
    if args.save_config {
        driver_config_save(&config)?;
        tracing::info!("Saved driver config");
    }

    let cancel_token = CancellationToken::new();
    tokio::spawn({
        let cancel_token = cancel_token.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for ctrl-c: {}", e);
            }
            cancel_token.cancel();
        }
    });

    // Held until exit so an idle sensor stays connected.
    let mut _idle_frames = None;
    let source: Box<dyn FrameSource> = match &args.replay {
        Some(path) => Box::new(ReplayFrameSource::open(path, args.looping)?),
        None => {
            tracing::info!("No replay given, waiting for frames that never come");
            let (sender, source) = ChannelFrameSource::new(4);
            _idle_frames = Some(sender);
            Box::new(source)
        }
    };

    let (event_sender, event_receiver) = broadcast::channel(256);
    let host = Arc::new(BroadcastHost::new(event_sender));
    tokio::spawn(log_host_events(event_receiver));

    let driver = HandDriver::new(
        &config,
        source,
        Box::new(PalmGestureScorer::default()),
        host,
    );

    let (control_tx, control_rx) = mpsc::channel(16);
    std::thread::spawn(move || forward_debug_requests(control_tx));

    let result = run_driver(driver, control_rx, cancel_token, config.poll_rate_hz).await;
    tracing::info!("Driver exited with: {:?}", result);
    result
}

async fn log_host_events(mut receiver: broadcast::Receiver<HostEvent>) {
    loop {
        match receiver.recv().await {
            Ok(HostEvent::PoseUpdated(id, pose)) => {
                tracing::trace!(
                    "Pose {}: {:?} at {:?}",
                    id,
                    pose.result,
                    pose.position
                );
            }
            Ok(event) => tracing::debug!("{:?}", event),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("Event logger skipped {} events", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Each stdin line is handed to the driver as a debug request.
fn forward_debug_requests(control_tx: mpsc::Sender<DriverMessage>) {
    for line in std::io::stdin().lock().lines() {
        match line {
            Ok(line) if line.trim().is_empty() => {}
            Ok(line) => {
                if control_tx
                    .blocking_send(DriverMessage::DebugRequest(line))
                    .is_err()
                {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!("Failed to read stdin: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("leap_hand").chain(list.iter().copied()))
    }

    #[test]
    fn test_no_arguments() {
        assert_eq!(args(&[]).unwrap(), Args::default());
    }

    #[test]
    fn test_all_arguments() {
        let parsed = args(&[
            "--replay",
            "frames.jsonl",
            "--loop",
            "--config",
            "cfg.json",
            "--save-config",
        ])
        .unwrap();
        assert_eq!(
            parsed,
            Args {
                config: Some("cfg.json".into()),
                replay: Some("frames.jsonl".into()),
                looping: true,
                save_config: true,
            }
        );
    }

    #[test]
    fn test_command_is_well_formed() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn test_loop_flag_alone() {
        let parsed = args(&["--loop"]).unwrap();
        assert!(parsed.looping);
        assert_eq!(parsed.replay, None);
    }

    #[test]
    fn test_bad_arguments() {
        assert!(args(&["--replay"]).is_err());
        assert!(args(&["--verbose"]).is_err());
    }
}
