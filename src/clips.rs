use crate::util;

use anyhow::{Context, Result};
use std::path::Path;

/// Frames per clip.
pub const CLIP_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClipReport {
    pub clips: usize,
    pub frames_used: usize,
    pub frames_discarded: usize,
    pub sources: usize,
}

/// Number of complete clips a directory of `frames` frames yields.
pub fn clips_for(frames: usize) -> usize {
    frames / CLIP_SIZE
}

/// Regroups every frame directory under `root` into numbered clip
/// directories under `destination`, then deletes the frame directory.
///
/// Clip numbers start at 0 and keep counting across frame directories.
/// Frames that don't fill a whole clip are dropped with their directory.
pub fn create_clips(root: &Path, destination: &Path) -> Result<ClipReport> {
    let mut report = ClipReport::default();
    let mut next_clip = 0usize;

    for source in util::list_dir_names(root)? {
        let source_dir = root.join(&source);
        let frames = util::list_file_names(&source_dir)?;

        let full = clips_for(frames.len());
        for clip in frames.chunks_exact(CLIP_SIZE).take(full) {
            let dir = destination.join(next_clip.to_string());
            std::fs::create_dir(&dir)
                .with_context(|| format!("create clip dir {}", dir.display()))?;
            for frame in clip {
                util::move_path(&source_dir.join(frame), &dir.join(frame))?;
            }
            next_clip += 1;
        }

        let used = full * CLIP_SIZE;
        report.clips += full;
        report.frames_used += used;
        report.frames_discarded += frames.len() - used;
        report.sources += 1;
        std::fs::remove_dir_all(&source_dir)
            .with_context(|| format!("remove frame dir {}", source_dir.display()))?;
    }

    Ok(report)
}
