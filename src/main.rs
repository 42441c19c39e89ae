//! Camera Scanner CLI
//!
//! Command-line demonstration of the scanner lifecycle running against
//! mock devices and a mock camera.

use camera_scanner::{
    capture::{FileConfig, Frame, FrameSource, MockCamera, MockDevices, VideoDevice},
    decode::{
        parse_formats, DecodeError, DecodeHints, DecodedResult, FrameDecoder, PollingDecoderFactory,
    },
    lifecycle::ScannerLifecycle,
    metrics::{MetricsRegistry, MetricsSnapshot},
    BarcodeFormat,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast::error::RecvError, Notify};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "camera-scanner", version, about = "Continuous camera barcode scanning demo")]
struct Args {
    /// TOML configuration file with [scanner] and [metrics] tables.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Frames the mock camera delivers before it is unplugged.
    #[arg(long, default_value_t = 30)]
    frames: u64,

    /// Skip the autostart sequence and select a device by hand.
    #[arg(long)]
    no_autostart: bool,

    /// Comma-separated barcode formats, e.g. QR_CODE,EAN_13.
    #[arg(long, value_delimiter = ',')]
    formats: Vec<String>,

    #[arg(long)]
    try_harder: bool,

    /// Serve Prometheus metrics on this port.
    #[cfg(feature = "metrics")]
    #[arg(long)]
    metrics_port: Option<u16>,
}

/// Pretends every tenth frame carries a symbol.
struct DemoDecoder;

impl FrameDecoder for DemoDecoder {
    fn decode(&self, frame: &Frame, hints: &DecodeHints) -> Result<DecodedResult, DecodeError> {
        if frame.sequence() % 10 != 0 || !frame.is_complete() {
            return Err(DecodeError::not_found());
        }
        let format = hints
            .possible_formats
            .first()
            .copied()
            .unwrap_or(BarcodeFormat::QrCode);
        Ok(DecodedResult::new(format!("DEMO-{:04}", frame.sequence()), format))
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    info!("Camera Scanner v{}", camera_scanner::VERSION);
    info!("This is a demonstration using mock camera input");

    let file_config = match &args.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    let mut config = file_config.scanner;
    if args.no_autostart {
        config.autostart = false;
    }
    if !args.formats.is_empty() {
        config.formats = parse_formats(args.formats.as_slice())?;
    }
    config.try_harder |= args.try_harder;

    let devices = Arc::new(MockDevices::with_devices(vec![
        VideoDevice::new("front-0", "Front Camera"),
        VideoDevice::new("back-0", "Back Camera"),
    ]));
    let frames = args.frames;
    let decoders = Arc::new(PollingDecoderFactory::new(
        Arc::new(move || Box::new(MockCamera::failing_after(frames)) as Box<dyn FrameSource>),
        Arc::new(DemoDecoder),
    ));

    let autostart = config.autostart;
    let mut scanner = ScannerLifecycle::new(config, devices.clone(), decoders)?;
    let events = Arc::clone(scanner.events());
    let mut successes = events.scan_success.subscribe();
    let mut faults = events.scan_error.subscribe();

    let metrics = MetricsRegistry::new()?;
    #[cfg(feature = "metrics")]
    let metrics_state = match args.metrics_port.unwrap_or(file_config.metrics.port) {
        0 => None,
        port => {
            use camera_scanner::metrics::{MetricsServer, MetricsServerConfig};
            let server = MetricsServer::new(MetricsServerConfig::with_port(port), MetricsRegistry::new()?);
            let state = server.state();
            tokio::spawn(async move {
                if let Err(e) = server.run().await {
                    warn!("Metrics server stopped: {}", e);
                }
            });
            Some(state)
        }
    };

    let shutdown = Arc::new(Notify::new());
    let signal = Arc::clone(&shutdown);
    ctrlc::set_handler(move || signal.notify_one())?;

    scanner.init().await?;
    if !autostart {
        scanner.request_permission().await;
        let listed = scanner.update_video_input_devices().await?;
        if let Some(device) = listed.last().cloned() {
            info!("Selecting {} by hand", device.label);
            scanner.set_device(Some(device)).await;
        }
    }

    if !scanner.is_scanning() {
        warn!("No scan session running, nothing to do");
    }

    let mut scanned = 0u64;
    while scanner.is_scanning() {
        tokio::select! {
            _ = shutdown.notified() => {
                info!("Interrupted, shutting down");
                break;
            }
            result = successes.recv() => match result {
                Ok(text) => {
                    scanned += 1;
                    println!("Scanned: {}", text);
                }
                Err(RecvError::Lagged(skipped)) => warn!("Dropped {} results", skipped),
                Err(RecvError::Closed) => break,
            },
            fault = faults.recv() => {
                if let Ok(fault) = fault {
                    warn!("Scanning ended: {}", fault);
                }
                break;
            }
        }

        let snapshot = MetricsSnapshot::from_lifecycle(&scanner);
        metrics.update(&snapshot);
        #[cfg(feature = "metrics")]
        publish(&metrics_state, snapshot).await;
    }

    let stats = scanner.stats().snapshot();
    scanner.shutdown();
    tracing::debug!("Final metrics:\n{}", metrics.encode()?);
    info!(
        "Done. {} scanned, {} misses, {} faults, {} open streams",
        scanned,
        stats.misses,
        stats.faults,
        devices.open_streams()
    );
    Ok(())
}

#[cfg(feature = "metrics")]
async fn publish(
    state: &Option<camera_scanner::metrics::SharedMetricsState>,
    snapshot: MetricsSnapshot,
) {
    if let Some(state) = state {
        state.write().await.update(snapshot);
    }
}
