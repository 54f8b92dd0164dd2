//! Per-frame face codings and the hand-coding file format.
//!
//! A hand-coding file holds one triple per line:
//!
//! ```text
//! f   1   120
//! ff  121 180
//! f   181 400
//! end 1   612
//! ```
//!
//! `f` marks every frame of the inclusive range as showing a single face,
//! `ff` as showing several faces. `end` records the clip length from its
//! last field. Frames never mentioned are coded as having no face.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

/// Coding of a single video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrameLabel {
    #[default]
    Absent,
    SingleFace,
    MultipleFaces,
}

impl FrameLabel {
    /// Textual code used by coding files. `Absent` frames are simply left out.
    pub fn code(self) -> Option<&'static str> {
        match self {
            FrameLabel::Absent => None,
            FrameLabel::SingleFace => Some("f"),
            FrameLabel::MultipleFaces => Some("ff"),
        }
    }

    pub fn from_code(code: &str) -> Result<Self> {
        match code {
            "f" => Ok(FrameLabel::SingleFace),
            "ff" => Ok(FrameLabel::MultipleFaces),
            other => Err(Error::invalid(format!("unrecognized face code {other:?}"))),
        }
    }
}

impl fmt::Display for FrameLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FrameLabel::Absent => "absent",
            FrameLabel::SingleFace => "single face",
            FrameLabel::MultipleFaces => "multiple faces",
        };
        f.write_str(s)
    }
}

/// Frame number to label mapping, 1-based. Missing frames are `Absent`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSequence {
    labels: BTreeMap<u32, FrameLabel>,
    total_frames: Option<u32>,
}

impl LabelSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_total_frames(total_frames: u32) -> Self {
        Self {
            labels: BTreeMap::new(),
            total_frames: Some(total_frames),
        }
    }

    /// Label of `frame`, `Absent` when it was never coded.
    pub fn get(&self, frame: u32) -> FrameLabel {
        self.labels.get(&frame).copied().unwrap_or_default()
    }

    /// Sets the label of `frame`. Frame numbers start at 1.
    pub fn set(&mut self, frame: u32, label: FrameLabel) -> Result<()> {
        if frame == 0 {
            return Err(Error::invalid("frame numbers start at 1"));
        }
        if label == FrameLabel::Absent {
            self.labels.remove(&frame);
        } else {
            self.labels.insert(frame, label);
        }
        Ok(())
    }

    pub fn total_frames(&self) -> Option<u32> {
        self.total_frames
    }

    pub fn set_total_frames(&mut self, total_frames: u32) {
        self.total_frames = Some(total_frames);
    }

    /// Coded (non-absent) frames in increasing frame order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, FrameLabel)> + '_ {
        self.labels.iter().map(|(&frame, &label)| (frame, label))
    }

    /// Number of frames carrying a face code.
    pub fn coded_frames(&self) -> usize {
        self.labels.len()
    }
}

/// Parses the contents of a hand-coding file.
pub fn parse_coding(text: &str) -> Result<LabelSequence> {
    let mut seq = LabelSequence::new();

    for (line_no, line) in text.lines().enumerate() {
        let line_no = line_no + 1;
        let words: Vec<&str> = line.split_whitespace().collect();
        let &[code, start, end] = words.as_slice() else {
            if !words.is_empty() {
                log::debug!("line {line_no}: skipping {line:?}, not a coding triple");
            }
            continue;
        };

        let end = parse_frame(end, line_no)?;
        if code == "end" {
            seq.set_total_frames(end);
            continue;
        }

        let label =
            FrameLabel::from_code(code).map_err(|e| Error::invalid(format!("line {line_no}: {e}")))?;
        let start = parse_frame(start, line_no)?;
        if start == 0 {
            return Err(Error::invalid(format!(
                "line {line_no}: frame numbers start at 1"
            )));
        }
        if start > end {
            return Err(Error::invalid(format!(
                "line {line_no}: range {start}-{end} is reversed"
            )));
        }
        for frame in start..=end {
            seq.set(frame, label)?;
        }
    }

    Ok(seq)
}

/// Reads and parses a hand-coding file.
pub fn read_coding_file(path: &Path) -> Result<LabelSequence> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::not_found(path, e))?;
    parse_coding(&text)
}

fn parse_frame(word: &str, line_no: usize) -> Result<u32> {
    word.parse()
        .map_err(|_| Error::invalid(format!("line {line_no}: {word:?} is not a frame number")))
}
