//! CLI entry point for hexapod_telemetry.
//!
//! Subcommands:
//! - `monitor`: read the robot's serial port and print one line per leg sample
//! - `replay`: the same for a captured log file (or `-` for stdin)
//! - `frames`: run ingestion and emit skeleton frames at the configured update rate
//! - `check-config`: load and validate a configuration file
//! - `init-config`: write the default configuration
//!
//! # Usage
//! ```bash
//! hexapod_telemetry --config config.yaml monitor --port /dev/ttyUSB0
//! hexapod_telemetry replay capture.log
//! hexapod_telemetry frames --input demo --pattern wave --output status
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use hexapod_telemetry::config::HexapodConfig;
use hexapod_telemetry::data::SampleBuffer;
use hexapod_telemetry::demo::{GaitGenerator, GaitParams, GaitPattern};
use hexapod_telemetry::error::ConfigError;
use hexapod_telemetry::frame::FrameAssembler;
use hexapod_telemetry::geometry::RobotGeometry;
use hexapod_telemetry::ingest::{DemoTransport, LineTransport, ReaderTransport, StreamIngestor};
use hexapod_telemetry::logging::{self, OutputFormat, TracingConfig};
use hexapod_telemetry::report::format_sample;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "hexapod_telemetry")]
#[command(about = "Hexapod robot telemetry monitor and skeleton reconstruction", long_about = None)]
struct Cli {
    /// Configuration file (.yaml/.yml or .toml)
    #[arg(long, short, global = true, default_value = "config.yaml")]
    config: PathBuf,

    /// Override application.log_level
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format: pretty, compact or json
    #[arg(long, global = true, default_value = "pretty")]
    log_format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print parsed samples from the robot's serial port
    Monitor {
        /// Override serial.port
        #[arg(long)]
        port: Option<String>,

        /// Override serial.baudrate
        #[arg(long)]
        baud: Option<u32>,
    },

    /// Print parsed samples from a captured log ("-" reads stdin)
    Replay {
        /// Log file
        file: PathBuf,
    },

    /// Emit skeleton frames at visualization.update_rate
    Frames {
        /// "serial", "demo", a log file path, or "-" for stdin
        #[arg(long, default_value = "serial")]
        input: String,

        /// Gait pattern for the demo input
        #[arg(long, default_value = "tripod")]
        pattern: GaitPattern,

        /// Frame output
        #[arg(long, value_enum, default_value = "status")]
        output: FrameOutput,

        /// Stop after this many frames
        #[arg(long)]
        max_frames: Option<u64>,
    },

    /// Load and validate the configuration file
    CheckConfig,

    /// Write the default configuration
    InitConfig {
        /// Output path; format follows the extension
        #[arg(default_value = "config_default.yaml")]
        path: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FrameOutput {
    /// One status line per frame
    Status,
    /// Scene description, then one JSON object per frame
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::InitConfig { path } = &cli.command {
        HexapodConfig::write_default(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Default configuration created at: {}", path.display());
        return Ok(());
    }

    let allow_default = matches!(&cli.command, Commands::Frames { input, .. } if input == "demo");
    let config = load_config(&cli.config, allow_default)?;
    init_logging(&cli, &config)?;

    let geometry = Arc::new(config.robot_geometry()?);

    match cli.command {
        Commands::Monitor { port, baud } => {
            let mut serial = config.serial.clone();
            if let Some(port) = port {
                serial.port = port;
            }
            if let Some(baud) = baud {
                serial.baudrate = baud;
            }
            let transport = open_serial(&serial).await?;
            print_samples(transport, &geometry).await
        }
        Commands::Replay { file } => {
            let transport = open_reader(&file).await?;
            print_samples(transport, &geometry).await
        }
        Commands::Frames {
            input,
            pattern,
            output,
            max_frames,
        } => {
            let transport: Box<dyn LineTransport> = match input.as_str() {
                "serial" => open_serial(&config.serial).await?,
                "demo" => Box::new(DemoTransport::realtime(GaitGenerator::new(
                    Arc::clone(&geometry),
                    pattern,
                    GaitParams::default(),
                ))),
                path => open_reader(Path::new(path)).await?,
            };
            run_frames(&config, geometry, transport, output, max_frames).await
        }
        Commands::CheckConfig => {
            print_config_summary(&cli.config, &config, &geometry);
            Ok(())
        }
        Commands::InitConfig { .. } => Ok(()),
    }
}

fn load_config(path: &Path, allow_default: bool) -> Result<HexapodConfig> {
    match HexapodConfig::load_from(path) {
        Ok(config) => Ok(config),
        Err(ConfigError::NotFound(_)) if allow_default => {
            eprintln!(
                "Configuration file {} not found, using built-in defaults",
                path.display()
            );
            Ok(HexapodConfig::default_config())
        }
        Err(e) => Err(e).with_context(|| format!("Invalid configuration {}", path.display())),
    }
}

fn init_logging(cli: &Cli, config: &HexapodConfig) -> Result<()> {
    let mut tracing_config = TracingConfig::from_config(config).map_err(anyhow::Error::msg)?;
    if let Some(level) = &cli.log_level {
        tracing_config.level = logging::parse_log_level(level).map_err(anyhow::Error::msg)?;
    }
    logging::init(tracing_config.with_format(cli.log_format)).map_err(anyhow::Error::msg)
}

#[cfg(feature = "serial")]
async fn open_serial(
    serial: &hexapod_telemetry::config::SerialConfig,
) -> Result<Box<dyn LineTransport>> {
    use hexapod_telemetry::ingest::SerialTransportBuilder;

    hexapod_telemetry::validation::is_standard_baud_rate(serial.baudrate)
        .map_err(anyhow::Error::msg)?;
    let transport = SerialTransportBuilder::from_config(serial).open().await?;
    Ok(Box::new(transport))
}

#[cfg(not(feature = "serial"))]
async fn open_serial(
    _serial: &hexapod_telemetry::config::SerialConfig,
) -> Result<Box<dyn LineTransport>> {
    Err(hexapod_telemetry::TelemetryError::SerialFeatureDisabled.into())
}

async fn open_reader(path: &Path) -> Result<Box<dyn LineTransport>> {
    if path == Path::new("-") {
        return Ok(Box::new(ReaderTransport::stdin()));
    }
    let transport = ReaderTransport::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(Box::new(transport))
}

/// Console monitor: every valid line is printed as it arrives.
async fn print_samples(mut transport: Box<dyn LineTransport>, geometry: &RobotGeometry) -> Result<()> {
    let ingestor = StreamIngestor::new(Arc::new(SampleBuffer::default()));
    info!(source = %transport.describe(), "Monitoring. Press Ctrl+C to stop");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),
            line = transport.next_line() => match line {
                Ok(Some(line)) => {
                    if let Ok(sample) = ingestor.ingest_line(&line) {
                        println!("{}", format_sample(&sample, Some(geometry.leg(sample.leg_index))));
                    }
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            },
        }
    };

    if let Err(e) = transport.close().await {
        warn!(error = %e, "Failed to close transport");
    }
    let stats = ingestor.stats().snapshot();
    eprintln!(
        "Lines: {} | Valid: {} | Malformed: {} | Truncated: {} | Invalid leg: {}",
        stats.lines_total, stats.valid, stats.malformed, stats.truncated, stats.invalid_index
    );
    Ok(result?)
}

async fn run_frames(
    config: &HexapodConfig,
    geometry: Arc<RobotGeometry>,
    transport: Box<dyn LineTransport>,
    output: FrameOutput,
    max_frames: Option<u64>,
) -> Result<()> {
    let buffer = Arc::new(SampleBuffer::new(config.visualization.buffer_size));
    let ingestor = StreamIngestor::new(Arc::clone(&buffer));
    let handle = ingestor.spawn(transport);

    let mut assembler = FrameAssembler::from_config(config, geometry, buffer)
        .with_stats(Arc::clone(ingestor.stats()));

    if let FrameOutput::Json = output {
        println!("{}", serde_json::to_string(&assembler.scene(&config.visualization))?);
    }

    let mut ticker = tokio::time::interval(config.visualization.frame_interval());
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut emitted = 0u64;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                debug!("Interrupted");
                break;
            }
            _ = ticker.tick() => {
                // sample before emitting so the last frame after end of stream is complete
                let finished = handle.is_finished();
                let frame = assembler.assemble();
                match output {
                    FrameOutput::Status => println!("{}", frame.status_line()),
                    FrameOutput::Json => println!("{}", serde_json::to_string(&frame)?),
                }
                emitted += 1;
                if finished || max_frames.is_some_and(|max| emitted >= max) {
                    break;
                }
            }
        }
    }

    let exit = handle.stop().await?;
    info!(?exit, stats = ?ingestor.stats().snapshot(), frames = emitted, "Stopped");
    Ok(())
}

fn print_config_summary(path: &Path, config: &HexapodConfig, geometry: &RobotGeometry) {
    println!("Configuration {} is valid", path.display());
    println!(
        "Serial: {} @ {} baud, timeout {:.2}s",
        config.serial.port, config.serial.baudrate, config.serial.timeout_secs
    );
    let body = &geometry.body;
    println!(
        "Body: {:.3} x {:.3} x {:.3} m",
        body.length, body.width, body.height
    );
    for (leg, g) in geometry.iter() {
        let p = &g.mount_position;
        println!(
            "Leg {leg} {:<13} pos=({:6.3}, {:6.3}, {:6.3}) rot={:6.3}rad ({:6.1}°) links={:?} reach={:.3}m",
            format!("({})", g.name),
            p.x,
            p.y,
            p.z,
            g.mount_rotation,
            g.mount_rotation.to_degrees(),
            g.link_lengths.configured(),
            g.link_lengths.reach()
        );
    }
    println!(
        "Frames: {} Hz, history {} samples, smoothing {}",
        config.visualization.update_rate,
        config.visualization.buffer_size,
        if config.data.enable_smoothing {
            format!("{} samples", config.data.smoothing_window)
        } else {
            "off".to_string()
        }
    );
}
