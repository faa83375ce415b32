//! Flower Power driver - diagnostics entry point
//!
//! The driver library is embedded by a hub process that owns the BLE stack.
//! This binary exercises the parts that need no radio: calibration loading,
//! payload decoding and configuration resolution.

use anyhow::Context;
use clap::{Parser, Subcommand};
use flowerpower_driver::{
    calibration::CalibrationSet, services::SensorPolicy, DriverConfig, DriverError, SensorDecoder,
    SensorKind,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Flower Power driver configuration
#[derive(Parser, Debug)]
#[command(name = "flowerpower-driver")]
#[command(about = "Parrot Flower Power BLE driver diagnostics")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// TOML configuration file
    #[arg(long, global = true, env = "FLOWERPOWER_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load every calibration table and report its size
    CheckTables,
    /// Decode a raw characteristic payload
    Decode {
        /// Sensor kind: sunlight, moisture or temperature
        #[arg(short, long)]
        kind: SensorKind,

        /// Payload as hex, e.g. 2c01
        #[arg(short, long)]
        payload: String,
    },
    /// Print the effective configuration
    ShowConfig,
}

impl Cli {
    /// Initialize logging based on debug flag
    fn initialize_logging(&self) {
        let filter = if self.debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

fn check_tables(config: &DriverConfig) -> anyhow::Result<()> {
    let tables = CalibrationSet::load(&config.calibration)?;
    for kind in SensorKind::ALL {
        let table = tables.table(kind);
        let (low, high) = table.key_range().unwrap_or_default();
        println!(
            "{:<12} {:>6} entries  keys {}..={}  ({})",
            kind,
            table.len(),
            low,
            high,
            config.calibration.path_for(kind).display()
        );
    }
    Ok(())
}

/// Decode a hex payload into a one-line report
fn decode(config: &DriverConfig, kind: SensorKind, payload: &str) -> anyhow::Result<String> {
    let bytes = hex::decode(payload.trim()).context("payload must be hex encoded")?;
    let tables = CalibrationSet::load(&config.calibration)?;
    let decoder = SensorDecoder::new(tables, config.gatt.payload_offset);

    let raw = decoder.decode_raw(kind, &bytes)?;
    let key = SensorPolicy::for_kind(kind).key(raw.raw_value);
    let value = decoder.calibrate(raw)?;

    Ok(format!("{kind}: raw {} -> key {key} -> {value}", raw.raw_value))
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = DriverConfig::load(cli.config.as_deref())?;
    info!("Using calibration data from {}", config.calibration.data_dir.display());

    match &cli.command {
        Command::CheckTables => check_tables(&config),
        Command::Decode { kind, payload } => {
            println!("{}", decode(&config, *kind, payload)?);
            Ok(())
        }
        Command::ShowConfig => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// Exit status for a failed command: 2 when the driver could not run at all
fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<DriverError>() {
        Some(e) if e.is_fatal() => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    cli.initialize_logging();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<DriverError>() {
                Some(driver_err) => error!("{} [{}]", driver_err, driver_err.category()),
                None => error!("{:#}", e),
            }
            exit_code_for(&e)
        }
    }
}
