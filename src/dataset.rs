use crate::clips::{self, ClipReport, CLIP_SIZE};
use crate::extractor::{self, ExtractReport, TranscodeConfig};
use crate::manifest::{Manifest, SplitCounts};
use crate::progress::{DatasetSummary, ProgressConfig, ProgressHandle, ProgressReporter};
use crate::sampling::{self, IndexSampler, SeededSampler, ValidationSize};
use crate::util;

use anyhow::{Context, Result};
use clap::ValueEnum;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Upper bound on validation clips in either mode.
pub const MAX_VALIDATION_CLIPS: usize = 100;

pub const TEST_LIST: &str = "test_list.txt";
pub const TRAIN_LIST: &str = "train_list.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DatasetMode {
    /// Random train/test split over every file in the videos folder.
    Custom,
    /// Fixed test/train lists read from the list directory.
    #[value(name = "adobe240fps")]
    Adobe240fps,
}

impl DatasetMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DatasetMode::Custom => "custom",
            DatasetMode::Adobe240fps => "adobe240fps",
        }
    }

    fn validation_size(self) -> ValidationSize {
        match self {
            DatasetMode::Custom => ValidationSize::Fraction {
                cap: MAX_VALIDATION_CLIPS,
            },
            DatasetMode::Adobe240fps => ValidationSize::Fixed(MAX_VALIDATION_CLIPS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatasetConfig {
    pub mode: DatasetMode,
    pub videos_folder: PathBuf,
    pub dataset_folder: PathBuf,
    /// Train/test percentages (custom mode); only the test share drives sampling.
    pub train_pct: u32,
    pub test_pct: u32,
    pub list_dir: PathBuf,
    pub seed: Option<u64>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            mode: DatasetMode::Custom,
            videos_folder: PathBuf::new(),
            dataset_folder: PathBuf::new(),
            train_pct: 90,
            test_pct: 10,
            list_dir: PathBuf::from("data/adobe240fps"),
            seed: None,
        }
    }
}

/// Output directories under the dataset root.
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    pub root: PathBuf,
    pub extracted: PathBuf,
    pub train: PathBuf,
    pub test: PathBuf,
    pub validation: PathBuf,
}

impl DatasetLayout {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            extracted: root.join("extracted"),
            train: root.join("train"),
            test: root.join("test"),
            validation: root.join("validation"),
        }
    }

    /// Creates the root if needed and empties the four working directories.
    pub fn reset(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("create dataset dir {}", self.root.display()))?;
        for dir in [&self.extracted, &self.train, &self.test, &self.validation] {
            util::reset_dir(dir)?;
        }
        Ok(())
    }
}

/// One video name per line; blank lines (including the trailing one) are skipped.
pub fn read_video_list(path: &Path) -> Result<Vec<OsString>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read video list {}", path.display()))?;
    Ok(parse_video_list(&text)
        .into_iter()
        .map(OsString::from)
        .collect())
}

fn parse_video_list(text: &str) -> Vec<String> {
    text.lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Regular files in the videos folder, sorted by name.
pub fn list_videos(videos_folder: &Path) -> Result<Vec<OsString>> {
    util::list_file_names(videos_folder)
        .with_context(|| format!("list videos in {}", videos_folder.display()))
}

/// Extracts `videos` into the scratch dir and regroups them into `destination`.
fn build_split(
    videos: &[OsString],
    videos_folder: &Path,
    scratch: &Path,
    destination: &Path,
    transcode: &TranscodeConfig,
    progress: &ProgressHandle,
) -> Result<(ExtractReport, ClipReport)> {
    let extract = extractor::extract_frames(videos, videos_folder, scratch, transcode, progress)?;
    progress.set_current(format!("clips -> {}", destination.display()));
    let clip_report = clips::create_clips(scratch, destination)?;
    progress.clear_current(None);
    progress.log(format!(
        "{}: {} clips from {} of {} videos ({} frames discarded)",
        destination.display(),
        clip_report.clips,
        extract.extracted.len(),
        clip_report.sources,
        clip_report.frames_discarded
    ));
    Ok((extract, clip_report))
}

/// Moves randomly chosen test clips into validation and returns their names.
pub fn move_to_validation(
    layout: &DatasetLayout,
    size: ValidationSize,
    sampler: &mut dyn IndexSampler,
) -> Result<Vec<String>> {
    let test_clips = util::list_clip_dirs(&layout.test)?;
    let picked = sampling::pick_validation(&test_clips, size, sampler);
    for name in &picked {
        util::move_path(&layout.test.join(name), &layout.validation.join(name))?;
    }
    Ok(picked)
}

pub fn build_dataset(
    config: &DatasetConfig,
    transcode: &TranscodeConfig,
    progress_cfg: ProgressConfig,
) -> Result<DatasetSummary> {
    let mut sampler = match config.seed {
        Some(seed) => SeededSampler::new(seed),
        None => SeededSampler::from_entropy_seed(),
    };

    let layout = DatasetLayout::new(&config.dataset_folder);
    layout.reset()?;

    let (test_videos, train_videos) = match config.mode {
        DatasetMode::Custom => {
            let videos = list_videos(&config.videos_folder)?;
            eprintln!(
                "Split plan: videos={} train={}% test={}%",
                videos.len(),
                config.train_pct,
                config.test_pct
            );
            let split = sampling::split_videos(&videos, config.test_pct, &mut sampler);
            (split.test, split.train)
        }
        DatasetMode::Adobe240fps => (
            read_video_list(&config.list_dir.join(TEST_LIST))?,
            read_video_list(&config.list_dir.join(TRAIN_LIST))?,
        ),
    };

    let reporter = ProgressReporter::new(
        "dataset",
        (test_videos.len() + train_videos.len()) as u64,
        progress_cfg,
    );
    let progress = reporter.handle();
    progress.log(format!(
        "mode={} seed={} test_videos={} train_videos={}",
        config.mode.as_str(),
        sampler.seed(),
        test_videos.len(),
        train_videos.len()
    ));

    progress.set_stage("test: extract + clip");
    let (test_extract, test_clips) = build_split(
        &test_videos,
        &config.videos_folder,
        &layout.extracted,
        &layout.test,
        transcode,
        &progress,
    )?;

    progress.set_stage("train: extract + clip");
    let (train_extract, train_clips) = build_split(
        &train_videos,
        &config.videos_folder,
        &layout.extracted,
        &layout.train,
        transcode,
        &progress,
    )?;

    progress.set_stage("validation: select");
    let size = config.mode.validation_size();
    if let ValidationSize::Fixed(want) = size {
        if test_clips.clips < want {
            progress.warn(format!(
                "only {} test clips; moving all of them to validation instead of {}",
                test_clips.clips, want
            ));
        }
    }
    let validation = move_to_validation(&layout, size, &mut sampler)?;

    std::fs::remove_dir_all(&layout.extracted)
        .with_context(|| format!("remove {}", layout.extracted.display()))?;

    let splits = SplitCounts {
        train: train_clips.clips,
        test: test_clips.clips - validation.len(),
        validation: validation.len(),
    };
    let failed_videos = util::display_names(
        &test_extract
            .failed
            .iter()
            .chain(&train_extract.failed)
            .cloned()
            .collect::<Vec<_>>(),
    );

    Manifest {
        version: 1,
        created_utc_unix: SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64,
        mode: config.mode.as_str().to_string(),
        seed: sampler.seed(),
        frame_w: transcode.width,
        frame_h: transcode.height,
        clip_size: CLIP_SIZE,
        test_videos: util::display_names(&test_videos),
        train_videos: util::display_names(&train_videos),
        failed_videos: failed_videos.clone(),
        splits,
        validation_clips: validation,
    }
    .write(&layout.root)?;

    let outcome = reporter.finish(format!(
        "train={} test={} validation={}",
        splits.train, splits.test, splits.validation
    ));

    Ok(DatasetSummary {
        dataset_dir: layout.root,
        mode: config.mode.as_str().to_string(),
        seed: sampler.seed(),
        test_videos: test_videos.len(),
        train_videos: train_videos.len(),
        failed_videos,
        processed_videos: outcome.processed_videos,
        train_clips: splits.train,
        test_clips: splits.test,
        validation_clips: splits.validation,
        discarded_frames: test_clips.frames_discarded + train_clips.frames_discarded,
        elapsed: outcome.elapsed,
        warning_count: outcome.warning_count,
        warnings: outcome.warnings,
    })
}
