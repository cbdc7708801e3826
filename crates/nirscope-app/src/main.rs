//! Nirscope Application
//!
//! Command-line front end for functional near-infrared recordings: inspect a
//! recording container or synthesize one for testing.
//!
//! # Usage
//!
//! ```bash
//! # Summarize a recording
//! nirscope info session.nrc
//!
//! # Generate a synthetic two-channel recording
//! nirscope synth out.nrc --channels 4 --samples 512 --rate 7.8
//! ```

use std::f64::consts::TAU;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use nirscope_recording::container::{Dataset, Group};
use nirscope_recording::Recording;

/// Nirscope Application
#[derive(Parser, Debug)]
#[command(name = "nirscope")]
#[command(author, version, about = "Functional near-infrared recording toolkit", long_about = None)]
struct Cli {
    /// Logging verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load a recording and print its summary
    Info {
        /// Recording container file
        file: PathBuf,

        /// Also list every measurement channel
        #[arg(long)]
        channels: bool,
    },

    /// Write a synthetic recording container
    Synth {
        /// Output file
        output: PathBuf,

        /// Number of measurement channels (one source-detector pair each)
        #[arg(short, long, default_value = "2")]
        channels: u32,

        /// Samples per channel
        #[arg(short, long, default_value = "256")]
        samples: usize,

        /// Sampling rate in Hz
        #[arg(short, long, default_value = "7.8")]
        rate: f64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("nirscope v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Info { file, channels } => run_info(&file, channels),
        Commands::Synth {
            output,
            channels,
            samples,
            rate,
        } => run_synth(&output, channels, samples, rate),
    }
}

fn run_info(file: &Path, list_channels: bool) -> anyhow::Result<()> {
    let recording = Recording::load(file)?;

    for (key, value) in recording.metadata() {
        info!(tag = key, %value, "metadata");
    }

    if list_channels {
        for channel in recording.channels() {
            info!(
                id = channel.id,
                source = channel.source_id,
                detector = channel.detector_id,
                wavelength = channel.wavelength.label(),
                series = channel.data_index,
                "channel"
            );
        }
    }

    Ok(())
}

fn run_synth(output: &Path, channels: u32, samples: usize, rate: f64) -> anyhow::Result<()> {
    anyhow::ensure!(channels > 0, "at least one channel required");
    anyhow::ensure!(samples >= 2, "at least two samples required");
    anyhow::ensure!(rate > 0.0, "sampling rate must be positive");

    let mut meta = Group::new("metaDataTags");
    meta.add_dataset("SubjectID", Dataset::Text("synthetic".into()));
    meta.add_dataset("SourceTool", Dataset::Text("nirscope synth".into()));

    // One source-detector pair per channel, laid out on a line
    let pair_count = channels as usize;
    let mut source_pos_2d = Vec::with_capacity(pair_count * 2);
    let mut detector_pos_2d = Vec::with_capacity(pair_count * 2);
    let mut source_pos_3d = Vec::with_capacity(pair_count * 3);
    let mut detector_pos_3d = Vec::with_capacity(pair_count * 3);
    for pair in 0..pair_count {
        let x = pair as f64 * 3.0;
        source_pos_2d.extend([x, 0.0]);
        detector_pos_2d.extend([x + 1.5, 0.0]);
        source_pos_3d.extend([x, 0.0, 8.0]);
        detector_pos_3d.extend([x + 1.5, 0.0, 8.0]);
    }

    let mut probe = Group::new("probe");
    probe.add_dataset("wavelengths", Dataset::I32Vector(vec![760, 850]));
    probe.add_dataset(
        "sourcePos2D",
        Dataset::F64Matrix {
            rows: pair_count,
            cols: 2,
            values: source_pos_2d,
        },
    );
    probe.add_dataset(
        "detectorPos2D",
        Dataset::F64Matrix {
            rows: pair_count,
            cols: 2,
            values: detector_pos_2d,
        },
    );
    probe.add_dataset(
        "sourcePos3D",
        Dataset::F64Matrix {
            rows: pair_count,
            cols: 3,
            values: source_pos_3d,
        },
    );
    probe.add_dataset(
        "detectorPos3D",
        Dataset::F64Matrix {
            rows: pair_count,
            cols: 3,
            values: detector_pos_3d,
        },
    );

    let dt = 1.0 / rate;
    let time: Vec<f64> = (0..samples).map(|s| s as f64 * dt).collect();

    // Slow sinusoidal intensity drift per channel, sample-major
    let mut values = Vec::with_capacity(samples * pair_count);
    for t in &time {
        for c in 0..pair_count {
            let phase = c as f64 * 0.7;
            let drift = 0.02 * (TAU * 0.05 * t + phase).sin();
            values.push(1.0 + drift);
        }
    }

    let mut data = Group::new("data1");
    data.add_dataset("time", Dataset::F64Vector(time));
    data.add_dataset(
        "dataTimeSeries",
        Dataset::F64Matrix {
            rows: samples,
            cols: pair_count,
            values,
        },
    );
    for c in 0..channels {
        let mut list = Group::new(format!("measurementList{}", c + 1));
        list.add_dataset("dataType", Dataset::I32Vector(vec![1]));
        list.add_dataset("dataTypeIndex", Dataset::I32Vector(vec![1]));
        list.add_dataset("dataTypeLabel", Dataset::Text("raw".into()));
        list.add_dataset("sourceIndex", Dataset::I32Vector(vec![c as i32 + 1]));
        list.add_dataset("detectorIndex", Dataset::I32Vector(vec![c as i32 + 1]));
        list.add_dataset("wavelengthIndex", Dataset::I32Vector(vec![1 + c as i32 % 2]));
        data.add_group(list);
    }

    let mut nirs = Group::new("nirs");
    nirs.add_group(meta);
    nirs.add_group(probe);
    nirs.add_group(data);
    let mut root = Group::new("root");
    root.add_group(nirs);

    root.save(output)?;
    info!(
        path = %output.display(),
        channels,
        samples,
        rate,
        "synthetic recording written"
    );
    Ok(())
}
