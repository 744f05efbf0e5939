use clap::ValueEnum;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const MAX_STORED_WARNINGS: usize = 32;
const TICK: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lower")]
pub enum ProgressMode {
    Auto,
    Rich,
    Plain,
    Quiet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedProgressMode {
    Rich,
    Plain,
    Quiet,
}

impl ProgressMode {
    fn resolve(self, stderr_is_tty: bool) -> ResolvedProgressMode {
        match self {
            ProgressMode::Auto if stderr_is_tty => ResolvedProgressMode::Rich,
            ProgressMode::Auto | ProgressMode::Plain => ResolvedProgressMode::Plain,
            ProgressMode::Rich => ResolvedProgressMode::Rich,
            ProgressMode::Quiet => ResolvedProgressMode::Quiet,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProgressConfig {
    pub mode: ProgressMode,
    /// Transcoding a long video can legitimately take minutes.
    pub idle_threshold: Duration,
    pub plain_interval: Duration,
    tty_override: Option<bool>,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            mode: ProgressMode::Auto,
            idle_threshold: Duration::from_secs(300),
            plain_interval: Duration::from_secs(5),
            tty_override: None,
        }
    }
}

impl ProgressConfig {
    pub fn new(mode: ProgressMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub fn with_tty_override(mut self, is_tty: bool) -> Self {
        self.tty_override = Some(is_tty);
        self
    }

    pub fn resolve_mode(self) -> ResolvedProgressMode {
        let is_tty = self
            .tty_override
            .unwrap_or_else(|| std::io::stderr().is_terminal());
        self.mode.resolve(is_tty)
    }
}

/// What `main` prints once the dataset is built.
#[derive(Debug, Clone)]
pub struct DatasetSummary {
    pub dataset_dir: PathBuf,
    pub mode: String,
    pub seed: u64,
    pub test_videos: usize,
    pub train_videos: usize,
    pub failed_videos: Vec<String>,
    pub processed_videos: u64,
    pub train_clips: usize,
    pub test_clips: usize,
    pub validation_clips: usize,
    pub discarded_frames: usize,
    pub elapsed: Duration,
    pub warning_count: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ProgressOutcome {
    pub elapsed: Duration,
    pub processed_videos: u64,
    /// Every warning raised, including ones no longer in `warnings`.
    pub warning_count: usize,
    /// The most recent warnings, oldest first.
    pub warnings: Vec<String>,
}

/// Point-in-time view of the counters, rendered without holding the lock.
#[derive(Debug, Clone)]
struct Snapshot {
    stage: String,
    videos_done: u64,
    videos_total: u64,
    elapsed: Duration,
    per_video: Option<Duration>,
    eta: Option<Duration>,
    current: Option<String>,
}

#[derive(Debug)]
struct Counters {
    started: Instant,
    stage: String,
    videos_total: u64,
    videos_done: u64,
    current: Option<String>,
    last_video_done: Instant,
    last_plain_line: Instant,
    last_idle_warn: Option<Instant>,
    warnings_seen: usize,
    recent_warnings: Vec<String>,
}

impl Counters {
    fn snapshot(&self) -> Snapshot {
        let elapsed = self.started.elapsed();
        let per_video = average_per_video(self.videos_done, elapsed);
        Snapshot {
            stage: self.stage.clone(),
            videos_done: self.videos_done,
            videos_total: self.videos_total,
            elapsed,
            per_video,
            eta: compute_eta(self.videos_total, self.videos_done, per_video),
            current: self.current.clone(),
        }
    }

    fn record_warning(&mut self, message: &str) {
        self.warnings_seen += 1;
        if self.recent_warnings.len() >= MAX_STORED_WARNINGS {
            self.recent_warnings.remove(0);
        }
        self.recent_warnings.push(message.to_string());
    }

    fn outcome(&self) -> ProgressOutcome {
        ProgressOutcome {
            elapsed: self.started.elapsed(),
            processed_videos: self.videos_done,
            warning_count: self.warnings_seen,
            warnings: self.recent_warnings.clone(),
        }
    }
}

/// Two spinner rows under one bar: the stage, and the video or step in flight.
struct RichUi {
    overall: ProgressBar,
    stage: ProgressBar,
    current: ProgressBar,
}

impl RichUi {
    fn new(label: &str, total_videos: u64) -> Self {
        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(total_videos.max(1)));
        overall.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] {wide_bar:.cyan/blue} {pos}/{len} videos | {msg}",
            )
            .expect("valid progress template"),
        );
        overall.set_message(format!("{} starting", label));

        let spinner = |template: &str| {
            let pb = multi.add(ProgressBar::new_spinner());
            pb.set_style(
                ProgressStyle::with_template(template)
                    .expect("valid spinner template")
                    .tick_chars("|/-\\ "),
            );
            pb.enable_steady_tick(Duration::from_millis(120));
            pb
        };
        let stage = spinner("{spinner:.yellow} {msg}");
        let current = spinner("{spinner:.magenta} {msg}");

        Self {
            overall,
            stage,
            current,
        }
    }

    fn render(&self, snap: &Snapshot) {
        let len = snap.videos_total.max(1);
        self.overall.set_length(len);
        self.overall.set_position(snap.videos_done.min(len));
        self.overall.set_message(format!(
            "per_video={} ETA={}",
            format_eta(snap.per_video),
            format_eta(snap.eta),
        ));
        self.stage.set_message(format!(
            "{} | elapsed {}",
            snap.stage,
            format_duration(snap.elapsed)
        ));
        self.current
            .set_message(snap.current.clone().unwrap_or_default());
    }

    fn finish(&self, snap: &Snapshot, final_message: Option<String>) {
        self.overall.finish_with_message(format!(
            "videos={} / {} elapsed={}",
            snap.videos_done,
            snap.videos_total,
            format_duration(snap.elapsed),
        ));
        match final_message {
            Some(msg) => self.stage.finish_with_message(msg),
            None => self.stage.finish_and_clear(),
        }
        self.current.finish_and_clear();
    }
}

struct Shared {
    label: String,
    mode: ResolvedProgressMode,
    idle_threshold: Duration,
    plain_interval: Duration,
    counters: Mutex<Counters>,
    rich: Option<RichUi>,
    stop: AtomicBool,
    finished: AtomicBool,
}

impl Shared {
    fn update(&self, force_plain: bool, f: impl FnOnce(&mut Counters)) {
        let snap = {
            let mut counters = self.counters.lock().unwrap();
            f(&mut counters);
            counters.snapshot()
        };
        self.render(&snap, force_plain);
    }

    fn render(&self, snap: &Snapshot, force_plain: bool) {
        match (self.mode, &self.rich) {
            (ResolvedProgressMode::Rich, Some(rich)) => rich.render(snap),
            (ResolvedProgressMode::Plain, _) if force_plain => self.plain_line(snap),
            _ => {}
        }
    }

    fn plain_line(&self, snap: &Snapshot) {
        let pct = if snap.videos_total == 0 {
            0.0
        } else {
            snap.videos_done as f64 * 100.0 / snap.videos_total as f64
        };
        eprintln!(
            "[PROGRESS] {} elapsed={} stage={} videos={} / {} ({:.1}%) ETA={} active={}",
            self.label,
            format_duration(snap.elapsed),
            snap.stage,
            snap.videos_done,
            snap.videos_total,
            pct,
            format_eta(snap.eta),
            snap.current.as_deref().unwrap_or("-"),
        );
    }

    fn emit(&self, level: &str, message: &str) {
        let line = format!("[{}] {}: {}", level, self.label, message);
        match (self.mode, &self.rich) {
            (ResolvedProgressMode::Quiet, _) => {}
            (ResolvedProgressMode::Rich, Some(rich)) => rich.stage.println(line),
            _ => eprintln!("{}", line),
        }
    }

    /// Runs on the ticker thread: periodic plain lines and the idle watchdog.
    fn tick(&self) {
        if self.mode == ResolvedProgressMode::Quiet {
            return;
        }
        let now = Instant::now();
        let (snap, plain_due, idle) = {
            let mut c = self.counters.lock().unwrap();

            let plain_due = now.duration_since(c.last_plain_line) >= self.plain_interval;
            if plain_due {
                c.last_plain_line = now;
            }

            let idle = if idle_warning_due(
                now,
                c.last_video_done,
                c.last_idle_warn,
                self.idle_threshold,
                c.videos_done,
                c.videos_total,
            ) {
                c.last_idle_warn = Some(now);
                let msg = format!(
                    "IDLE WARNING: no video finished for {}s (stage={}, active={})",
                    now.duration_since(c.last_video_done).as_secs(),
                    c.stage,
                    c.current.as_deref().unwrap_or("-")
                );
                c.record_warning(&msg);
                Some(msg)
            } else {
                None
            };
            (c.snapshot(), plain_due, idle)
        };

        self.render(&snap, plain_due);
        if let Some(msg) = idle {
            self.emit("WARN", &msg);
        }
    }

    fn finish(&self, final_message: Option<String>) -> ProgressOutcome {
        let (snap, outcome) = {
            let c = self.counters.lock().unwrap();
            (c.snapshot(), c.outcome())
        };
        if self.finished.swap(true, Ordering::Relaxed) {
            return outcome;
        }

        match (self.mode, &self.rich) {
            (ResolvedProgressMode::Rich, Some(rich)) => rich.finish(&snap, final_message),
            (ResolvedProgressMode::Plain, _) => {
                self.plain_line(&snap);
                if let Some(msg) = final_message {
                    eprintln!("[DONE] {}: {}", self.label, msg);
                }
            }
            _ => {}
        }
        outcome
    }
}

/// Cloneable handle passed into the pipeline stages.
#[derive(Clone)]
pub struct ProgressHandle {
    shared: Arc<Shared>,
}

impl ProgressHandle {
    pub fn set_stage(&self, stage: impl Into<String>) {
        let stage = stage.into();
        self.shared.update(true, |c| c.stage = stage);
    }

    /// Marks videos as done (transcoded or failed).
    pub fn inc_videos(&self, delta: u64) {
        if delta == 0 {
            return;
        }
        self.shared.update(false, |c| {
            c.videos_done = c.videos_done.saturating_add(delta);
            if c.videos_total > 0 {
                c.videos_done = c.videos_done.min(c.videos_total);
            }
            c.last_video_done = Instant::now();
        });
    }

    /// Names the step in flight, e.g. the video being transcoded.
    pub fn set_current(&self, what: impl Into<String>) {
        let what = what.into();
        self.shared.update(false, |c| c.current = Some(what));
    }

    /// Clears the step in flight; a rich display keeps `final_status` on screen.
    pub fn clear_current(&self, final_status: Option<&str>) {
        self.shared.update(false, |c| c.current = None);
        if let (Some(rich), Some(status)) = (&self.shared.rich, final_status) {
            rich.current.set_message(status.to_string());
        }
    }

    pub fn log(&self, message: impl Into<String>) {
        self.shared.emit("INFO", &message.into());
    }

    /// Emits a warning and keeps it for the final outcome.
    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        self.shared
            .counters
            .lock()
            .unwrap()
            .record_warning(&message);
        self.shared.emit("WARN", &message);
    }
}

/// Owns the ticker thread; dropping it without `finish` still stops the display.
pub struct ProgressReporter {
    handle: ProgressHandle,
    ticker: Option<JoinHandle<()>>,
}

impl ProgressReporter {
    pub fn new(label: impl Into<String>, total_videos: u64, config: ProgressConfig) -> Self {
        let label = label.into();
        let mode = config.resolve_mode();
        let now = Instant::now();

        let rich = (mode == ResolvedProgressMode::Rich).then(|| RichUi::new(&label, total_videos));
        let shared = Arc::new(Shared {
            label,
            mode,
            idle_threshold: config.idle_threshold,
            plain_interval: config.plain_interval,
            counters: Mutex::new(Counters {
                started: now,
                stage: "starting".to_string(),
                videos_total: total_videos,
                videos_done: 0,
                current: None,
                last_video_done: now,
                last_plain_line: now,
                last_idle_warn: None,
                warnings_seen: 0,
                recent_warnings: Vec::new(),
            }),
            rich,
            stop: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        });

        let ticker_shared = Arc::clone(&shared);
        let ticker = thread::spawn(move || {
            while !ticker_shared.stop.load(Ordering::Relaxed) {
                thread::sleep(TICK);
                ticker_shared.tick();
            }
        });

        let handle = ProgressHandle { shared };
        handle.set_stage("starting");
        Self {
            handle,
            ticker: Some(ticker),
        }
    }

    pub fn handle(&self) -> ProgressHandle {
        self.handle.clone()
    }

    pub fn finish(mut self, final_message: impl Into<String>) -> ProgressOutcome {
        self.stop_ticker();
        self.handle.shared.finish(Some(final_message.into()))
    }

    fn stop_ticker(&mut self) {
        self.handle.shared.stop.store(true, Ordering::Relaxed);
        if let Some(join) = self.ticker.take() {
            let _ = join.join();
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.stop_ticker();
        let _ = self.handle.shared.finish(None);
    }
}

fn average_per_video(done: u64, elapsed: Duration) -> Option<Duration> {
    if done == 0 {
        return None;
    }
    Some(elapsed / done.min(u32::MAX as u64) as u32)
}

fn compute_eta(total: u64, done: u64, per_video: Option<Duration>) -> Option<Duration> {
    let per_video = per_video?;
    if done >= total {
        return None;
    }
    let remaining = (total - done).min(u32::MAX as u64) as u32;
    Some(per_video.saturating_mul(remaining))
}

fn idle_warning_due(
    now: Instant,
    last_video_done: Instant,
    last_idle_warn: Option<Instant>,
    idle_threshold: Duration,
    done: u64,
    total: u64,
) -> bool {
    if total > 0 && done >= total {
        return false;
    }
    if now.duration_since(last_video_done) < idle_threshold {
        return false;
    }
    last_idle_warn.map_or(true, |last| now.duration_since(last) >= idle_threshold)
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{:02}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

fn format_eta(eta: Option<Duration>) -> String {
    eta.map(format_duration)
        .unwrap_or_else(|| "--:--".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_resolution_respects_tty_override() {
        let cfg_tty = ProgressConfig::new(ProgressMode::Auto).with_tty_override(true);
        assert_eq!(cfg_tty.resolve_mode(), ResolvedProgressMode::Rich);

        let cfg_not_tty = ProgressConfig::new(ProgressMode::Auto).with_tty_override(false);
        assert_eq!(cfg_not_tty.resolve_mode(), ResolvedProgressMode::Plain);

        let cfg_quiet = ProgressConfig::new(ProgressMode::Quiet).with_tty_override(true);
        assert_eq!(cfg_quiet.resolve_mode(), ResolvedProgressMode::Quiet);
    }

    #[test]
    fn eta_scales_with_remaining_videos() {
        let eta = compute_eta(10, 4, Some(Duration::from_secs(5))).expect("eta should exist");
        assert_eq!(eta.as_secs(), 30);

        assert!(compute_eta(4, 4, Some(Duration::from_secs(5))).is_none());
        assert!(compute_eta(10, 0, None).is_none());
    }

    #[test]
    fn idle_warning_triggers_at_boundary() {
        let now = Instant::now();
        let threshold = Duration::from_secs(30);
        assert!(idle_warning_due(now + threshold, now, None, threshold, 1, 10));

        // Already warned recently.
        assert!(!idle_warning_due(
            now + threshold,
            now,
            Some(now + Duration::from_secs(10)),
            threshold,
            1,
            10
        ));

        // Nothing left to wait for.
        assert!(!idle_warning_due(now + threshold, now, None, threshold, 10, 10));
    }

    #[test]
    fn durations_format_as_clock() {
        assert_eq!(format_duration(Duration::from_secs(75)), "01:15");
        assert_eq!(format_duration(Duration::from_secs(3_725)), "01:02:05");
        assert_eq!(format_eta(None), "--:--");
    }

    #[test]
    fn warnings_are_kept_in_outcome() {
        let reporter = ProgressReporter::new("test", 2, ProgressConfig::new(ProgressMode::Quiet));
        let handle = reporter.handle();
        handle.set_current("a.mp4");
        handle.warn("transcode failed for a.mp4");
        handle.clear_current(Some("failed"));
        handle.inc_videos(1);
        let outcome = reporter.finish("done");
        assert_eq!(outcome.processed_videos, 1);
        assert_eq!(outcome.warning_count, 1);
        assert!(outcome.warnings[0].contains("a.mp4"));
    }

    #[test]
    fn warning_count_outlives_the_stored_window() {
        let reporter = ProgressReporter::new("test", 0, ProgressConfig::new(ProgressMode::Quiet));
        let handle = reporter.handle();
        let raised = MAX_STORED_WARNINGS + 8;
        for i in 0..raised {
            handle.warn(format!("w{}", i));
        }
        let outcome = reporter.finish("done");
        assert_eq!(outcome.warning_count, raised);
        assert_eq!(outcome.warnings.len(), MAX_STORED_WARNINGS);
        assert_eq!(outcome.warnings[0], "w8");
        assert_eq!(outcome.warnings.last().map(String::as_str), Some("w39"));
    }
}
