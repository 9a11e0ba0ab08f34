//! tap-teamcity command-line application
//!
//! Reads TAP output (standard input by default), converts it with the
//! tap-teamcity library and writes TeamCity service messages (standard output
//! by default). Exits with status 1 when any assertion failed.
//!
//! Diagnostics are logged to standard error so standard output carries
//! nothing but service messages.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tap_teamcity::{transform, ReporterConfig};

mod config;

/// Convert TAP test output into TeamCity service messages
#[derive(Parser, Debug)]
#[command(name = "tap-teamcity")]
#[command(about = "Convert TAP test output into TeamCity service messages", long_about = None)]
#[command(version)]
struct Args {
    /// Read TAP from this file instead of standard input
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Write service messages to this file instead of standard output
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Path to configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Size of each block read from the input
    #[arg(long, value_name = "BYTES")]
    buffer_size: Option<usize>,

    /// Report captureStandardOutput='false' on started tests
    #[arg(long)]
    no_capture_output: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all logging except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<ExitCode> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::debug!("tap-teamcity CLI v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Using tap-teamcity library v{}", tap_teamcity::VERSION);

    let reporter = reporter_config(&args)?;
    let input = open_input(args.input.as_ref())?;
    let output = open_output(args.output.as_ref())?;

    let outcome = transform(input, output, &reporter).context("Failed to convert TAP stream")?;
    log::info!("{}", outcome.summary);

    if outcome.failed {
        log::info!("At least one assertion failed");
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Merge the config file (if any) with command line overrides
fn reporter_config(args: &Args) -> Result<ReporterConfig> {
    let mut reporter = match &args.config {
        Some(path) => {
            log::debug!("Loading configuration from: {:?}", path);
            config::load_config(path)?.reporter
        }
        None => ReporterConfig::default(),
    };

    if let Some(size) = args.buffer_size {
        reporter = reporter.with_read_buffer_size(size);
    }
    if args.no_capture_output {
        reporter = reporter.with_capture_standard_output(false);
    }

    reporter.validate().context("Invalid command line options")?;
    Ok(reporter)
}

fn open_input(path: Option<&PathBuf>) -> Result<Box<dyn Read>> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open input file: {:?}", path))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(io::stdin().lock())),
    }
}

fn open_output(path: Option<&PathBuf>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {:?}", path))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(io::stdout().lock())),
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
