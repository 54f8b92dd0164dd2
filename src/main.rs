use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facecode::{config, detect, label, report, storage, MismatchCategory};
use facecode_vision::Pipeline;
use log::info;

#[derive(Parser)]
#[command(name = "facecode")]
#[command(
    version,
    about = "Compare detected face codings of video clips against hand codings"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare a detected coding against a hand coding and write a report
    Compare {
        /// Detected coding (JSON)
        #[arg(short, long)]
        detected: PathBuf,
        /// Hand coding (JSON, must declare num_frames)
        #[arg(short, long)]
        actual: PathBuf,
        /// Report file, replaced on every run
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Convert a hand-coding text file into a JSON coding
    Convert {
        /// Hand-coding file with `<code> <start> <end>` lines
        input: PathBuf,
        /// Destination JSON file
        output: PathBuf,
    },
    /// Run the face detector over a directory of frames
    Detect {
        /// Directory of numbered frame images
        frames: PathBuf,
        /// Destination JSON file for the detected coding
        output: PathBuf,
        /// Minimum detection score (overrides config)
        #[arg(short, long)]
        threshold: Option<f32>,
        /// Save copies of the frames with detections outlined here
        #[arg(long, value_name = "DIR")]
        draw_boxes: Option<PathBuf>,
    },
    /// Open config file in editor
    Config,
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compare {
            detected,
            actual,
            output,
        } => compare(&detected, &actual, &output),
        Commands::Convert { input, output } => convert(&input, &output),
        Commands::Detect {
            frames,
            output,
            threshold,
            draw_boxes,
        } => {
            let cfg = config::load_config(None)?;
            run_detection(&cfg, &frames, &output, threshold, draw_boxes.as_deref())
        }
        Commands::Config => open_config(),
    }
}

fn compare(detected: &Path, actual: &Path, output: &Path) -> Result<()> {
    info!(
        "Comparing {} against {}",
        detected.display(),
        actual.display()
    );

    let result = report::compare_files(detected, actual, output)
        .with_context(|| format!("comparing {} with {}", detected.display(), actual.display()))?;

    for run in result.runs() {
        info!("{}", report::run_line(run));
    }
    for category in MismatchCategory::MISMATCHES {
        let frames = result.frames_in(category);
        if frames > 0 {
            info!("{}: {} frame(s)", category, frames);
        }
    }
    info!(
        "Mismatch in {} out of {} frames, accuracy {:.4}",
        result.mismatch_count(),
        result.total_frames(),
        result.accuracy()
    );
    info!("Report written to {}", output.display());
    Ok(())
}

fn convert(input: &Path, output: &Path) -> Result<()> {
    let seq = label::read_coding_file(input)
        .with_context(|| format!("reading hand coding {}", input.display()))?;

    match seq.total_frames() {
        Some(total) => info!(
            "{}: {} coded frame(s) out of {}",
            input.display(),
            seq.coded_frames(),
            total
        ),
        None => log::warn!("{} has no `end` line; it cannot serve as a hand coding", input.display()),
    }

    storage::save_sequence(output, &seq)
        .with_context(|| format!("writing {}", output.display()))?;
    info!("✓ Coding written to {}", output.display());
    Ok(())
}

fn run_detection(
    cfg: &config::Config,
    frames: &Path,
    output: &Path,
    threshold: Option<f32>,
    boxes_dir: Option<&Path>,
) -> Result<()> {
    let score_threshold = threshold.unwrap_or(cfg.score_threshold);
    info!(
        "Loading detector {} (score threshold {:.2})",
        cfg.detector_model.display(),
        score_threshold
    );

    let mut pipeline = Pipeline::new(&cfg.detector_model, score_threshold, cfg.nms_threshold)
        .context("Failed to initialize face detection pipeline")?;

    let seq = detect::detect_sequence(&mut pipeline, frames, boxes_dir)?;
    storage::save_sequence(output, &seq)
        .with_context(|| format!("writing {}", output.display()))?;

    info!(
        "✓ {} frame(s) with faces written to {}",
        seq.coded_frames(),
        output.display()
    );
    Ok(())
}

fn open_config() -> Result<()> {
    let config_path = config::CONFIG_PATH.as_path();
    if !config_path.exists() {
        config::save_config(&config::Config::default(), Some(config_path))
            .context("Failed to write default config")?;
    }
    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    info!("Opening config file: {:?}", config_path);

    let status = std::process::Command::new(editor)
        .arg(config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        anyhow::bail!("Editor exited with non-zero status");
    }

    Ok(())
}
