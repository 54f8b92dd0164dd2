//! Frame-by-frame comparison of a detected coding against a hand coding.
//!
//! Frames are scanned in increasing order. Each frame gets a
//! [`MismatchCategory`], and consecutive frames of the same non-correct
//! category are folded into one [`Run`] by a [`RunAccumulator`].

use std::fmt;

use crate::error::{Error, Result};
use crate::label::{FrameLabel, LabelSequence};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MismatchCategory {
    Correct,
    /// Detected a single face where the hand coding has none.
    FalseSingleDetection,
    /// Detected several faces where the hand coding has none or one.
    FalseMultipleDetection,
    /// Detected nothing where the hand coding has a single face.
    MissedSingleFace,
    /// Detected nothing, or only one face, where the hand coding has several.
    MissedMultipleFaces,
}

impl MismatchCategory {
    pub const MISMATCHES: [MismatchCategory; 4] = [
        MismatchCategory::MissedSingleFace,
        MismatchCategory::MissedMultipleFaces,
        MismatchCategory::FalseSingleDetection,
        MismatchCategory::FalseMultipleDetection,
    ];

    pub fn is_mismatch(self) -> bool {
        self != MismatchCategory::Correct
    }

    /// Report wording. `Correct` frames are never reported.
    pub fn message(self) -> Option<&'static str> {
        match self {
            MismatchCategory::Correct => None,
            MismatchCategory::FalseSingleDetection => Some("face falsely detected"),
            MismatchCategory::FalseMultipleDetection => Some("multiple faces falsely detected"),
            MismatchCategory::MissedSingleFace => Some("face not detected"),
            MismatchCategory::MissedMultipleFaces => Some("multiple faces not detected"),
        }
    }
}

impl fmt::Display for MismatchCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message().unwrap_or("correct"))
    }
}

/// Classifies one frame.
///
/// When both sides see faces but disagree on how many, an overcount is a
/// false multiple detection and an undercount a missed multiple-face frame.
pub fn classify_frame(actual: FrameLabel, detected: FrameLabel) -> MismatchCategory {
    use FrameLabel::*;
    use MismatchCategory::*;

    match (actual, detected) {
        (Absent, Absent) | (SingleFace, SingleFace) | (MultipleFaces, MultipleFaces) => Correct,
        (Absent, SingleFace) => FalseSingleDetection,
        (Absent, MultipleFaces) | (SingleFace, MultipleFaces) => FalseMultipleDetection,
        (SingleFace, Absent) => MissedSingleFace,
        (MultipleFaces, Absent) | (MultipleFaces, SingleFace) => MissedMultipleFaces,
    }
}

/// Inclusive range of frame numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    start: u32,
    end: u32,
}

impl Interval {
    pub fn new(start: u32, end: u32) -> Result<Self> {
        if start == 0 || start > end {
            return Err(Error::invalid(format!("bad frame interval {start}-{end}")));
        }
        Ok(Self { start, end })
    }

    fn single(frame: u32) -> Self {
        Self {
            start: frame,
            end: frame,
        }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }
}

/// Maximal stretch of frames sharing one mismatch category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    pub interval: Interval,
    pub category: MismatchCategory,
}

/// Scan state: the run still being extended, if any.
///
/// Frames must be pushed in strictly increasing order.
#[derive(Debug, Default)]
pub struct RunAccumulator {
    open: Option<Run>,
}

impl RunAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the category of `frame`, returning the run it closed, if any.
    pub fn push(&mut self, frame: u32, category: MismatchCategory) -> Option<Run> {
        if let Some(run) = self.open.as_mut() {
            if run.category == category && frame == run.interval.end + 1 {
                run.interval.end = frame;
                return None;
            }
        }

        let closed = self.open.take();
        if category.is_mismatch() {
            self.open = Some(Run {
                interval: Interval::single(frame),
                category,
            });
        }
        closed
    }

    /// Ends the scan, returning the run that was still open.
    pub fn finish(self) -> Option<Run> {
        self.open
    }
}

/// Outcome of comparing one detected coding against its hand coding.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    runs: Vec<Run>,
    mismatch_count: u32,
    total_frames: u32,
}

impl Report {
    /// Runs in frame order.
    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    pub fn mismatch_count(&self) -> u32 {
        self.mismatch_count
    }

    pub fn total_frames(&self) -> u32 {
        self.total_frames
    }

    /// Fraction of frames where both codings agree.
    pub fn accuracy(&self) -> f64 {
        f64::from(self.total_frames - self.mismatch_count) / f64::from(self.total_frames)
    }

    /// Number of frames classified as `category`.
    pub fn frames_in(&self, category: MismatchCategory) -> u32 {
        if category == MismatchCategory::Correct {
            return self.total_frames - self.mismatch_count;
        }
        self.runs
            .iter()
            .filter(|run| run.category == category)
            .map(|run| run.interval.len())
            .sum()
    }
}

/// Compares `detected` against the hand coding `actual`.
///
/// The clip length comes from `actual` and must be at least one frame.
pub fn classify(detected: &LabelSequence, actual: &LabelSequence) -> Result<Report> {
    let total_frames = actual
        .total_frames()
        .ok_or_else(|| Error::invalid("hand coding does not declare a frame count"))?;
    if total_frames < 1 {
        return Err(Error::invalid("hand coding declares zero frames"));
    }

    let mut acc = RunAccumulator::new();
    let mut runs = Vec::new();
    let mut mismatch_count = 0;

    for frame in 1..=total_frames {
        let category = classify_frame(actual.get(frame), detected.get(frame));
        if category.is_mismatch() {
            mismatch_count += 1;
        }
        runs.extend(acc.push(frame, category));
    }
    runs.extend(acc.finish());

    Ok(Report {
        runs,
        mismatch_count,
        total_frames,
    })
}
