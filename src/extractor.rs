use crate::progress::ProgressHandle;
use crate::util;

use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::ffi::OsString;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::JoinHandle;

/// Frames are written as `%09d.jpg`, starting at 1.
pub const FRAME_PATTERN: &str = "%09d.jpg";

const STDERR_TAIL_LINES: usize = 8;

#[derive(Debug, Clone)]
pub struct TranscodeConfig {
    pub ffmpeg_dir: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_dir: PathBuf::new(),
            width: 640,
            height: 360,
        }
    }
}

impl TranscodeConfig {
    pub fn ffmpeg(&self) -> PathBuf {
        util::transcoder_path(&self.ffmpeg_dir)
    }

    /// Full argument list for one video, in the order ffmpeg receives it.
    pub fn frame_args(&self, input: &Path, frame_dir: &Path) -> Vec<OsString> {
        vec![
            "-i".into(),
            input.as_os_str().to_owned(),
            "-c:v".into(),
            "mjpeg".into(),
            "-vf".into(),
            format!("scale={}:{}", self.width, self.height).into(),
            "-vsync".into(),
            "vfr".into(),
            "-qscale:v".into(),
            "2".into(),
            frame_dir.join(FRAME_PATTERN).into_os_string(),
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExtractReport {
    pub extracted: Vec<OsString>,
    pub failed: Vec<OsString>,
}

/// Runs the transcoder once per video, writing frames to
/// `output_dir/<basename>/`. A non-zero exit is logged and skipped; failing to
/// create the frame directory or to spawn the transcoder aborts.
pub fn extract_frames(
    videos: &[OsString],
    input_dir: &Path,
    output_dir: &Path,
    config: &TranscodeConfig,
    progress: &ProgressHandle,
) -> Result<ExtractReport> {
    let ffmpeg = config.ffmpeg();
    let mut report = ExtractReport::default();

    for video in videos.iter().filter(|v| !v.to_string_lossy().trim().is_empty()) {
        let shown = video.to_string_lossy();
        let frame_dir = output_dir.join(util::video_basename(video));
        std::fs::create_dir(&frame_dir)
            .with_context(|| format!("create frame dir {}", frame_dir.display()))?;

        let args = config.frame_args(&input_dir.join(video), &frame_dir);
        progress.set_current(format!("transcode {}", shown));
        progress.log(format!(
            "{} {}",
            ffmpeg.display(),
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        ));

        let mut child = Command::new(&ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn {} for {}", ffmpeg.display(), shown))?;

        let stderr_handle = child.stderr.take().map(spawn_stderr_collector);
        let status = child
            .wait()
            .with_context(|| format!("wait for {} on {}", ffmpeg.display(), shown))?;
        let stderr_lines = stderr_handle
            .and_then(|h| h.join().ok())
            .unwrap_or_default();

        if status.success() {
            report.extracted.push(video.clone());
            progress.clear_current(None);
        } else {
            let tail = if stderr_lines.is_empty() {
                "<no ffmpeg stderr>".to_string()
            } else {
                stderr_lines.join(" | ")
            };
            progress.warn(format!(
                "error converting file: {} status={} stderr_tail={}",
                shown, status, tail
            ));
            progress.clear_current(Some("failed"));
            report.failed.push(video.clone());
        }
        progress.inc_videos(1);
    }

    Ok(report)
}

fn spawn_stderr_collector(stderr: impl Read + Send + 'static) -> JoinHandle<Vec<String>> {
    std::thread::spawn(move || {
        let mut lines = VecDeque::new();
        let mut reader = BufReader::new(stderr);
        let mut line = String::new();

        loop {
            line.clear();
            let read = reader.read_line(&mut line).unwrap_or(0);
            if read == 0 {
                break;
            }
            let cleaned = line.trim().to_string();
            if cleaned.is_empty() {
                continue;
            }
            lines.push_back(cleaned);
            if lines.len() > STDERR_TAIL_LINES {
                lines.pop_front();
            }
        }

        lines.into_iter().collect::<Vec<_>>()
    })
}
