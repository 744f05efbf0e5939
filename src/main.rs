mod clips;
mod dataset;
mod extractor;
mod manifest;
mod progress;
mod sampling;
mod util;

use anyhow::{bail, Context, Result};
use clap::Parser;
use dataset::{DatasetConfig, DatasetMode};
use extractor::TranscodeConfig;
use progress::{format_duration, DatasetSummary, ProgressConfig, ProgressMode};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "clipset",
    version,
    about = "Build a frame-interpolation dataset: videos -> ffmpeg frames -> 12-frame clips -> train/test/validation"
)]
struct Cli {
    /// Directory containing the ffmpeg executable.
    #[arg(long)]
    ffmpeg_dir: PathBuf,

    /// Dataset mode: custom (random split) or adobe240fps (fixed lists).
    #[arg(long, value_enum, default_value_t = DatasetMode::Custom)]
    dataset: DatasetMode,

    /// Folder containing the input videos.
    #[arg(long)]
    videos_folder: PathBuf,

    /// Output dataset folder (train/test/validation are recreated inside).
    #[arg(long)]
    dataset_folder: PathBuf,

    /// Output image width.
    #[arg(long, default_value_t = 640)]
    img_width: u32,

    /// Output image height.
    #[arg(long, default_value_t = 360)]
    img_height: u32,

    /// Train/test percentages for the custom dataset, e.g. "90,10".
    #[arg(long, default_value = "90,10", value_parser = parse_split)]
    train_test_split: TrainTestSplit,

    /// Directory holding test_list.txt and train_list.txt (adobe240fps mode).
    #[arg(long, default_value = "data/adobe240fps")]
    list_dir: PathBuf,

    /// RNG seed; the same seed and inputs reproduce the same splits.
    #[arg(long)]
    seed: Option<u64>,

    /// Progress display mode: auto (TTY-aware), rich, plain, quiet.
    #[arg(long, value_enum, default_value_t = ProgressMode::Auto)]
    progress: ProgressMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TrainTestSplit {
    train: u32,
    test: u32,
}

fn parse_split(raw: &str) -> Result<TrainTestSplit> {
    let parts = raw
        .trim_matches(|c: char| c == '(' || c == ')')
        .split(',')
        .map(|p| p.trim().parse::<u32>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("split must be two integers like 90,10, got '{}'", raw))?;
    let [train, test] = parts[..] else {
        bail!("split must have exactly two values (train,test), got '{}'", raw);
    };
    if train > 100 || test > 100 || train + test != 100 {
        bail!("train and test percentages must each be 0..=100 and sum to 100");
    }
    Ok(TrainTestSplit { train, test })
}

fn validate_size(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        bail!("image width and height must be > 0");
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    validate_size(cli.img_width, cli.img_height)?;

    let transcode = TranscodeConfig {
        ffmpeg_dir: cli.ffmpeg_dir,
        width: cli.img_width,
        height: cli.img_height,
    };
    util::ensure_ffmpeg_available(&transcode.ffmpeg()).context("ffmpeg not usable")?;

    let config = DatasetConfig {
        mode: cli.dataset,
        videos_folder: cli.videos_folder,
        dataset_folder: cli.dataset_folder,
        train_pct: cli.train_test_split.train,
        test_pct: cli.train_test_split.test,
        list_dir: cli.list_dir,
        seed: cli.seed,
    };

    let summary = dataset::build_dataset(&config, &transcode, ProgressConfig::new(cli.progress))?;
    print_dataset_summary(&summary);
    Ok(())
}

fn print_dataset_summary(summary: &DatasetSummary) {
    println!(
        "Dataset summary: output={} mode={} seed={} duration={} videos={} (test={} train={}) failed={} train_clips={} test_clips={} validation_clips={} discarded_frames={} warnings={}",
        summary.dataset_dir.display(),
        summary.mode,
        summary.seed,
        format_duration(summary.elapsed),
        summary.processed_videos,
        summary.test_videos,
        summary.train_videos,
        summary.failed_videos.len(),
        summary.train_clips,
        summary.test_clips,
        summary.validation_clips,
        summary.discarded_frames,
        summary.warning_count,
    );
    for video in &summary.failed_videos {
        println!("  failed: {}", video);
    }
    for warning in &summary.warnings {
        println!("  warning: {}", warning);
    }
}
