use anyhow::{bail, Context, Result};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

pub fn transcoder_path(ffmpeg_dir: &Path) -> PathBuf {
    ffmpeg_dir.join("ffmpeg")
}

pub fn ensure_ffmpeg_available(ffmpeg: &Path) -> Result<()> {
    let out = Command::new(ffmpeg)
        .arg("-version")
        .output()
        .with_context(|| format!("failed to run {} -version", ffmpeg.display()))?;
    if !out.status.success() {
        bail!(
            "{} exists but returned non-zero on -version",
            ffmpeg.display()
        );
    }
    Ok(())
}

/// File name without its final extension ("clip.tar.mp4" -> "clip.tar").
pub fn video_basename(video: &OsStr) -> OsString {
    Path::new(video)
        .file_stem()
        .unwrap_or(video)
        .to_os_string()
}

/// Deletes `dir` if present, then creates it empty.
pub fn reset_dir(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("remove {}", dir.display())),
    }
    std::fs::create_dir(dir).with_context(|| format!("create {}", dir.display()))
}

/// Names of the direct children of `dir` accepted by `keep`, sorted. Names
/// are kept as the OS returned them so they can be joined back onto `dir`.
fn list_names(dir: &Path, keep: impl Fn(&std::fs::FileType) -> bool) -> Result<Vec<OsString>> {
    let mut v = vec![];
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let e = entry.with_context(|| format!("list {}", dir.display()))?;
        if keep(&e.file_type()) {
            v.push(e.file_name().to_os_string());
        }
    }
    v.sort();
    Ok(v)
}

pub fn list_file_names(dir: &Path) -> Result<Vec<OsString>> {
    list_names(dir, |t| t.is_file())
}

pub fn list_dir_names(dir: &Path) -> Result<Vec<OsString>> {
    list_names(dir, |t| t.is_dir())
}

/// Lossy rendering of `names` for logs and the manifest.
pub fn display_names(names: &[OsString]) -> Vec<String> {
    names
        .iter()
        .map(|n| n.to_string_lossy().into_owned())
        .collect()
}

/// Clip directory names in numeric order; non-numeric names sort last by name.
/// Clip dirs are created with decimal names, so non-UTF-8 entries are skipped.
pub fn list_clip_dirs(dir: &Path) -> Result<Vec<String>> {
    let mut names = list_dir_names(dir)?
        .into_iter()
        .filter_map(|n| n.into_string().ok())
        .collect::<Vec<_>>();
    names.sort_by(|a, b| match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    });
    Ok(names)
}

pub fn move_path(from: &Path, to: &Path) -> Result<()> {
    if to.exists() {
        bail!("move target already exists: {}", to.display());
    }
    std::fs::rename(from, to)
        .with_context(|| format!("move {} -> {}", from.display(), to.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn basename_strips_last_extension_only() {
        assert_eq!(video_basename(OsStr::new("IMG_0001.mov")), "IMG_0001");
        assert_eq!(video_basename(OsStr::new("a.b.mp4")), "a.b");
        assert_eq!(video_basename(OsStr::new("noext")), "noext");
    }

    #[test]
    fn reset_dir_clears_existing_content() {
        let tmp = TempDir::new().expect("tempdir");
        let dir = tmp.path().join("train");
        std::fs::create_dir_all(dir.join("0")).expect("mkdir");
        std::fs::write(dir.join("0/000000001.jpg"), b"x").expect("write");

        reset_dir(&dir).expect("reset");
        assert!(dir.is_dir());
        assert!(list_dir_names(&dir).expect("list").is_empty());

        let fresh = tmp.path().join("fresh");
        reset_dir(&fresh).expect("reset missing dir");
        assert!(fresh.is_dir());
    }

    #[test]
    fn clip_dirs_sort_numerically() {
        let tmp = TempDir::new().expect("tempdir");
        for name in ["10", "2", "0", "1"] {
            std::fs::create_dir(tmp.path().join(name)).expect("mkdir");
        }
        std::fs::write(tmp.path().join("stray.txt"), b"").expect("write");
        assert_eq!(
            list_clip_dirs(tmp.path()).expect("list"),
            vec!["0", "1", "2", "10"]
        );
        assert_eq!(
            list_file_names(tmp.path()).expect("list"),
            vec!["stray.txt"]
        );
    }

    #[test]
    fn move_refuses_to_overwrite() {
        let tmp = TempDir::new().expect("tempdir");
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        std::fs::create_dir(&a).expect("mkdir");
        std::fs::create_dir(&b).expect("mkdir");
        assert!(move_path(&a, &b).is_err());
        std::fs::remove_dir(&b).expect("rmdir");
        move_path(&a, &b).expect("move");
        assert!(b.is_dir() && !a.exists());
    }

    #[cfg(unix)]
    #[test]
    fn listing_keeps_non_utf8_names_intact() {
        use std::os::unix::ffi::OsStrExt;

        let tmp = TempDir::new().expect("tempdir");
        let raw = OsStr::from_bytes(b"caf\xe9.mp4");
        std::fs::write(tmp.path().join(raw), b"24").expect("write");

        let names = list_file_names(tmp.path()).expect("list");
        assert_eq!(names, vec![raw.to_os_string()]);
        assert!(tmp.path().join(&names[0]).is_file());
        assert_eq!(video_basename(&names[0]).as_bytes(), b"caf\xe9");
        assert_eq!(display_names(&names), vec!["caf\u{FFFD}.mp4"]);
    }
}
