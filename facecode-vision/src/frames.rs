//! Extracted video frames on disk.
//!
//! Frames are image files whose stem ends in `_<index>`, e.g.
//! `shakespeare_clip1_0042.png`. Anything else in the directory is skipped.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const FRAME_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameFile {
    pub index: u32,
    pub path: PathBuf,
}

/// Frame index encoded in the file name, if this looks like a frame image.
pub fn frame_index(path: &Path) -> Option<u32> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if !FRAME_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.rsplit('_').next()?.parse().ok()
}

/// Lists the frame images in `dir`, ordered by index.
///
/// Files sharing an index are all kept, ordered by path, with a warning.
pub fn list_frames(dir: &Path) -> Result<Vec<FrameFile>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("reading frame directory {}", dir.display()))?;

    let mut frames = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("listing {}", dir.display()))?
            .path();
        if !path.is_file() {
            continue;
        }
        match frame_index(&path) {
            Some(index) => frames.push(FrameFile { index, path }),
            None => log::warn!("skipping {}: not a numbered frame image", path.display()),
        }
    }
    frames.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.path.cmp(&b.path)));
    for pair in frames.windows(2) {
        if pair[0].index == pair[1].index {
            log::warn!(
                "frame {} appears more than once: {} and {}",
                pair[0].index,
                pair[0].path.display(),
                pair[1].path.display()
            );
        }
    }
    Ok(frames)
}
