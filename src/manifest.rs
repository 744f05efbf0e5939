use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Record of one dataset build, written next to the split directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u16,
    pub created_utc_unix: i64,
    pub mode: String, // "custom" or "adobe240fps"
    pub seed: u64,

    pub frame_w: u32,
    pub frame_h: u32,
    pub clip_size: usize,

    pub test_videos: Vec<String>,
    pub train_videos: Vec<String>,
    pub failed_videos: Vec<String>,

    pub splits: SplitCounts,
    pub validation_clips: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitCounts {
    pub train: usize,
    pub test: usize,
    pub validation: usize,
}

impl Manifest {
    pub fn write(&self, dataset_dir: &Path) -> Result<()> {
        let path = dataset_dir.join(MANIFEST_FILE);
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(&path, json).with_context(|| format!("write {}", path.display()))
    }

    #[cfg(test)]
    pub fn read(dataset_dir: &Path) -> Result<Self> {
        let path = dataset_dir.join(MANIFEST_FILE);
        let bytes = std::fs::read(&path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn manifest_survives_disk() {
        let tmp = TempDir::new().expect("tempdir");
        let m = Manifest {
            version: 1,
            created_utc_unix: 1_700_000_000,
            mode: "custom".to_string(),
            seed: 42,
            frame_w: 640,
            frame_h: 360,
            clip_size: 12,
            test_videos: vec!["a.mp4".to_string()],
            train_videos: vec!["b.mp4".to_string(), "c.mp4".to_string()],
            failed_videos: vec![],
            splits: SplitCounts {
                train: 10,
                test: 4,
                validation: 1,
            },
            validation_clips: vec!["3".to_string()],
        };
        m.write(tmp.path()).expect("write");

        let back = Manifest::read(tmp.path()).expect("read");
        assert_eq!(back.seed, 42);
        assert_eq!(back.splits, m.splits);
        assert_eq!(back.train_videos, m.train_videos);
    }
}
