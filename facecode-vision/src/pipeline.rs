use anyhow::{Context, Result};
use image::DynamicImage;
use log::{debug, info};
use ort::session::Session;
use std::path::{Path, PathBuf};

use crate::face::{self, Detection};
use crate::frames;

/// Detections found on one frame.
#[derive(Debug, Clone)]
pub struct FrameDetections {
    pub index: u32,
    pub detections: Vec<Detection>,
}

/// Where the outlined copy of `frame` is written: same file name, inside `out`.
pub fn boxed_path(out: &Path, frame: &Path) -> PathBuf {
    match frame.file_name() {
        Some(name) => out.join(name),
        None => out.join(frame),
    }
}

/// Face detection over a directory of extracted frames.
pub struct Pipeline {
    pub detector: Session,
    pub score_threshold: f32,
    pub nms_threshold: f32,
}

impl Pipeline {
    pub fn new(model: &Path, score_threshold: f32, nms_threshold: f32) -> Result<Self> {
        Ok(Self {
            detector: crate::model::detector_session(model)?,
            score_threshold,
            nms_threshold,
        })
    }

    pub fn detect(&mut self, img: &DynamicImage) -> Result<Vec<Detection>> {
        face::detect_faces(
            &mut self.detector,
            img,
            self.score_threshold,
            self.nms_threshold,
        )
    }

    /// Runs detection on every frame in `dir`.
    ///
    /// With `boxes_dir` set, a copy of each frame with its detections
    /// outlined is saved there under the frame's own file name.
    pub fn scan(&mut self, dir: &Path, boxes_dir: Option<&Path>) -> Result<Vec<FrameDetections>> {
        let frames = frames::list_frames(dir)?;
        if let Some(out) = boxes_dir {
            std::fs::create_dir_all(out)
                .with_context(|| format!("creating {}", out.display()))?;
        }

        info!("Beginning face detection for {}...", dir.display());

        let mut results = Vec::with_capacity(frames.len());
        for frame in frames {
            let img = image::open(&frame.path)
                .with_context(|| format!("reading frame {}", frame.path.display()))?;
            let detections = self
                .detect(&img)
                .with_context(|| format!("detecting faces in {}", frame.path.display()))?;
            debug!("frame {}: {} face(s)", frame.index, detections.len());

            if let Some(out) = boxes_dir {
                let mut boxed = img.to_rgb8();
                face::draw_boxes(&mut boxed, &detections, 2);
                let target = boxed_path(out, &frame.path);
                boxed
                    .save(&target)
                    .with_context(|| format!("writing {}", target.display()))?;
            }

            results.push(FrameDetections {
                index: frame.index,
                detections,
            });
        }

        info!("Finished face detection for {}.", dir.display());
        Ok(results)
    }
}
