//! Builds the detected coding of a clip from per-frame face detections.

use std::path::Path;

use anyhow::{Context, Result};
use facecode_vision::{FrameDetections, Pipeline};

use crate::label::{FrameLabel, LabelSequence};

pub fn label_for_count(faces: usize) -> FrameLabel {
    match faces {
        0 => FrameLabel::Absent,
        1 => FrameLabel::SingleFace,
        _ => FrameLabel::MultipleFaces,
    }
}

/// Codes each frame by how many faces were found on it.
///
/// The result carries no frame count; the hand coding supplies it.
pub fn to_sequence(frames: &[FrameDetections]) -> LabelSequence {
    let mut seq = LabelSequence::new();
    for frame in frames {
        let label = label_for_count(frame.detections.len());
        if frame.index == 0 {
            if label != FrameLabel::Absent {
                log::warn!("skipping frame 0: frame numbers start at 1");
            }
            continue;
        }
        if let Err(err) = seq.set(frame.index, label) {
            log::warn!("skipping frame {}: {err}", frame.index);
        }
    }
    seq
}

/// Runs the detector over the frames in `frames_dir`.
pub fn detect_sequence(
    pipeline: &mut Pipeline,
    frames_dir: &Path,
    boxes_dir: Option<&Path>,
) -> Result<LabelSequence> {
    let frames = pipeline
        .scan(frames_dir, boxes_dir)
        .with_context(|| format!("detecting faces in {}", frames_dir.display()))?;
    Ok(to_sequence(&frames))
}

#[cfg(test)]
mod tests {
    use super::*;
    use facecode_vision::Detection;

    fn frame(index: u32, faces: usize) -> FrameDetections {
        FrameDetections {
            index,
            detections: vec![
                Detection {
                    bbox: [0.0, 0.0, 10.0, 10.0],
                    landmarks: [5.0; 10],
                    score: 0.9,
                };
                faces
            ],
        }
    }

    #[test]
    fn test_label_for_count() {
        assert_eq!(label_for_count(0), FrameLabel::Absent);
        assert_eq!(label_for_count(1), FrameLabel::SingleFace);
        assert_eq!(label_for_count(2), FrameLabel::MultipleFaces);
        assert_eq!(label_for_count(7), FrameLabel::MultipleFaces);
    }

    #[test]
    fn test_to_sequence() {
        let seq = to_sequence(&[frame(0, 1), frame(1, 1), frame(2, 0), frame(3, 3)]);
        assert_eq!(seq.total_frames(), None);
        assert_eq!(seq.coded_frames(), 2);
        assert_eq!(seq.get(1), FrameLabel::SingleFace);
        assert_eq!(seq.get(2), FrameLabel::Absent);
        assert_eq!(seq.get(3), FrameLabel::MultipleFaces);
    }

    #[test]
    fn test_to_sequence_drops_frame_zero() {
        let empty = to_sequence(&[frame(0, 0), frame(1, 0)]);
        assert_eq!(empty.coded_frames(), 0);

        let seq = to_sequence(&[frame(0, 2), frame(1, 0), frame(2, 1)]);
        assert_eq!(seq.coded_frames(), 1);
        assert_eq!(seq.get(0), FrameLabel::Absent);
        assert_eq!(seq.get(2), FrameLabel::SingleFace);
    }
}
