//! CCTV Motion CLI
//!
//! Command-line interface for running the motion detector. Frames come
//! from the synthetic scene generator; disturbances can be scripted to
//! watch calibration and detection behave end to end.

use cctv_motion::{
    capture::{Resolution, SourceSession, SyntheticScene, SyntheticSource},
    detection::Monitor,
    metrics::MetricsRegistry,
    recording::{LogRecorder, Recorder, RecorderError, SequenceRecorder},
    MonitorConfig, StopSignal,
};
use clap::{Args, Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "cctv-motion", version, about = "Adaptive-threshold motion detection")]
struct Cli {
    /// TOML configuration file; command-line flags override its values.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Calibrate, then watch for motion.
    Monitor(MonitorArgs),
    /// Run calibration only and print the report.
    Calibrate(CalibrateArgs),
}

#[derive(Args)]
struct CalibrationArgs {
    /// Detector resolution, WIDTHxHEIGHT.
    #[arg(long, short, value_name = "WxH")]
    resolution: Option<Resolution>,

    /// Frames pulled during calibration.
    #[arg(long)]
    samples: Option<usize>,

    /// Safety multiplier applied to the peak calibration score.
    #[arg(long)]
    multiplier: Option<f64>,

    /// Pause between calibration frames in milliseconds.
    #[arg(long, value_name = "MS")]
    calibration_interval_ms: Option<u64>,
}

#[derive(Args)]
struct SceneArgs {
    /// Seed for the synthetic sensor noise.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Maximum per-sample noise deviation.
    #[arg(long, default_value_t = 2)]
    noise: u8,

    /// Frame sequence numbers that contain a disturbance.
    #[arg(long, value_delimiter = ',', value_name = "SEQ,...")]
    motion_at: Vec<u64>,

    /// Stop producing frames after this many.
    #[arg(long)]
    frame_limit: Option<u64>,
}

#[derive(Args)]
struct MonitorArgs {
    #[command(flatten)]
    calibration: CalibrationArgs,

    #[command(flatten)]
    scene: SceneArgs,

    /// Use a fixed threshold instead of calibrating.
    #[arg(long)]
    threshold: Option<f64>,

    /// Detection frames to process.
    #[arg(long, short = 'n', conflicts_with = "continuous")]
    iterations: Option<u64>,

    /// Run until interrupted.
    #[arg(long)]
    continuous: bool,

    /// Pause between detection frames in milliseconds.
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,

    /// Recalibrate after this many motion events.
    #[arg(long, value_name = "EVENTS")]
    recalibrate_after: Option<u32>,

    /// Metrics server port (0 disables it).
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Take a snapshot burst per motion event (see `[output]`).
    #[arg(long)]
    snapshots: bool,

    /// Print the final metrics in Prometheus text format.
    #[arg(long)]
    print_metrics: bool,
}

#[derive(Args)]
struct CalibrateArgs {
    #[command(flatten)]
    calibration: CalibrationArgs,

    #[command(flatten)]
    scene: SceneArgs,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    info!("CCTV motion detector v{}", cctv_motion::VERSION);

    let result = match cli.command {
        Command::Monitor(args) => monitor(cli.config, args),
        Command::Calibrate(args) => calibrate(cli.config, args),
    };

    if let Err(e) = result {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<PathBuf>, args: &CalibrationArgs) -> Result<MonitorConfig, Box<dyn Error>> {
    let mut config = match path {
        Some(path) => MonitorConfig::from_file(path)?,
        None => MonitorConfig::default(),
    };

    if let Some(resolution) = args.resolution {
        config.capture.resolution = resolution;
    }
    if let Some(samples) = args.samples {
        config.calibration.samples = samples;
    }
    if let Some(multiplier) = args.multiplier {
        config.calibration.multiplier = multiplier;
    }
    if let Some(interval) = args.calibration_interval_ms {
        config.calibration.interval_ms = interval;
    }
    Ok(config)
}

fn scene(args: &SceneArgs) -> SyntheticScene {
    let mut scene = SyntheticScene {
        seed: args.seed,
        noise: args.noise,
        frame_limit: args.frame_limit,
        ..Default::default()
    };
    scene.disturbances.extend(args.motion_at.iter().copied());
    scene
}

fn calibrate(path: Option<PathBuf>, args: CalibrateArgs) -> Result<(), Box<dyn Error>> {
    let mut config = load_config(path, &args.calibration)?;
    config.calibration.fixed_threshold = None;
    config.validate()?;

    let mut camera = SyntheticSource::new(scene(&args.scene));
    let mut session = SourceSession::open(&mut camera, &config.capture)?;
    let bounds = config.calibration.bounds;
    let monitor = Monitor::new(config, LogRecorder::new());
    let result = monitor.calibrate(&mut *session)?;

    println!("min:       {:.2}", result.min());
    println!("mean:      {:.2}", result.mean());
    println!("max:       {:.2}", result.max());
    println!("threshold: {:.2}", result.threshold());
    for warning in result.warnings(&bounds) {
        println!("warning:   {}", warning);
    }
    Ok(())
}

fn monitor(path: Option<PathBuf>, args: MonitorArgs) -> Result<(), Box<dyn Error>> {
    let mut config = load_config(path, &args.calibration)?;
    if args.threshold.is_some() {
        config.calibration.fixed_threshold = args.threshold;
    }
    if let Some(iterations) = args.iterations {
        config.run.continuous = false;
        config.run.iterations = iterations;
    }
    if args.continuous {
        config.run.continuous = true;
    }
    if let Some(interval) = args.interval_ms {
        config.run.frame_interval_ms = interval;
    }
    if args.recalibrate_after.is_some() {
        config.calibration.recalibrate_after_events = args.recalibrate_after;
    }
    if let Some(port) = args.metrics_port {
        config.output.metrics_port = port;
    }
    config.validate()?;

    let stop = StopSignal::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        warn!("Interrupt received, stopping after the current frame");
        handler_stop.stop();
    })?;

    let registry = MetricsRegistry::new()?;
    if config.output.metrics_port != 0 {
        spawn_metrics_server(registry.clone(), &config, stop.clone());
    }

    let mut camera = SyntheticSource::new(scene(&args.scene));
    let mut session = SourceSession::open(&mut camera, &config.capture)?;

    let recorder: Box<dyn Recorder> = if args.snapshots {
        let sink = |name: &str| -> Result<(), RecorderError> {
            info!(snapshot = name, "Snapshot taken");
            Ok(())
        };
        Box::new(SequenceRecorder::from_config(sink, &config))
    } else {
        Box::new(LogRecorder::new())
    };
    info!(recorder = recorder.name(), "Recorder ready");

    let mut monitor = Monitor::new(config, recorder)
        .with_stop_signal(stop)
        .with_metrics(registry.clone());
    let summary = monitor.run(&mut *session)?;

    info!(
        "Processed {} frames: {} motion events, {} artifacts",
        summary.frames, summary.events, summary.artifacts
    );

    if args.print_metrics {
        print!("{}", registry.encode()?);
    }
    Ok(())
}

#[cfg(feature = "metrics")]
fn spawn_metrics_server(registry: MetricsRegistry, config: &MonitorConfig, stop: StopSignal) {
    use cctv_motion::metrics::{MetricsServer, MetricsServerConfig};

    let server = MetricsServer::new(MetricsServerConfig::from_output(&config.output), registry);
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("Failed to start metrics runtime: {}", e);
                return;
            }
        };
        if let Err(e) = runtime.block_on(server.serve_until(stop)) {
            error!("Metrics server stopped: {}", e);
        }
    });
}

#[cfg(not(feature = "metrics"))]
fn spawn_metrics_server(_registry: MetricsRegistry, config: &MonitorConfig, _stop: StopSignal) {
    tracing::debug!(
        port = config.output.metrics_port,
        "Built without the metrics feature; server not started"
    );
}
