//! Grab frames from a screen or window chosen through the desktop portal.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::builder::{PossibleValuesParser, TypedValueParser};
use clap::{value_parser, Arg, ArgAction, Command};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wcap_engine::{CaptureConfig, CaptureType, SystemCapture};

fn command() -> Command {
    Command::new("wcap-grab")
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("type")
                .short('t')
                .long("type")
                .value_parser(
                    PossibleValuesParser::new(CaptureType::ALL.map(CaptureType::name))
                        .try_map(|name| name.parse::<CaptureType>()),
                )
                .default_value(CaptureType::default().name())
                .help("Kind of source offered in the portal dialog"),
        )
        .arg(
            Arg::new("frames")
                .short('n')
                .long("frames")
                .value_parser(value_parser!(u64))
                .default_value("30")
                .help("Number of frames to pull"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_parser(value_parser!(PathBuf))
                .help("JSON capture configuration"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_parser(value_parser!(u64))
                .help("Seconds to wait for each portal response, 0 waits forever"),
        )
        .arg(
            Arg::new("stats")
                .long("stats")
                .action(ArgAction::SetTrue)
                .help("Print capture statistics as JSON when done"),
        )
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wcap=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let matches = command().get_matches();

    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => CaptureConfig::from_json_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => CaptureConfig::default(),
    };
    if let Some(&secs) = matches.get_one::<u64>("timeout") {
        config.negotiation_timeout_secs = (secs > 0).then_some(secs);
    }

    let capture_type = matches
        .get_one::<CaptureType>("type")
        .copied()
        .unwrap_or_default();
    let frames = matches.get_one::<u64>("frames").copied().unwrap_or(30);

    let mut capture = SystemCapture::new(config);
    let source = capture
        .try_select_source(capture_type)
        .context("failed to select a capture source")?;
    info!(%source, "Capturing {} frames", frames);

    for _ in 0..frames {
        let started = Instant::now();
        match capture.next_frame() {
            Ok(frame) => {
                info!(
                    sequence = frame.sequence,
                    width = frame.width,
                    height = frame.height,
                    decision = ?frame.decision,
                    elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                    "Frame"
                );
            }
            Err(e) if e.is_stream_ended() => {
                warn!("Stream ended");
                break;
            }
            Err(e) => warn!("Frame failed: {}", e),
        }
    }
    let stats = capture.stats();
    capture.stop();

    if matches.get_flag("stats") {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }

    Ok(())
}
