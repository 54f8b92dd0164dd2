//! YuNet output decoding.
//!
//! YuNet is an anchor-free detector. For each stride (8, 16, 32) it emits
//! `cls` and `obj` scores of shape `[1, H*W, 1]`, box deltas `[1, H*W, 4]`
//! and landmark deltas `[1, H*W, 10]`, in the order
//! `cls_8, cls_16, cls_32, obj_8, ..., bbox_8, ..., kps_8, ...`.
//!
//! A box at grid cell (i, j) decodes as
//! cx = (j + dx) * stride, cy = (i + dy) * stride,
//! w = exp(dw) * stride, h = exp(dh) * stride.
//! Each of the five landmarks decodes like the box center.

use anyhow::Result;
use ndarray::Array2;

pub const STRIDES: [usize; 3] = [8, 16, 32];

const CLS: usize = 0;
const OBJ: usize = 3;
const BBOX: usize = 6;
const KPS: usize = 9;

/// Box in input-canvas coordinates normalized to [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub bbox: [f32; 4], // x, y, w, h
    pub landmarks: [f32; 10], // x1, y1, ..., x5, y5
    pub score: f32,
}

/// Per-stride score, box and landmark tensors.
#[derive(Debug)]
pub struct YunetOutputs {
    pub scores: Vec<Array2<f32>>,
    pub boxes: Vec<Array2<f32>>,
    pub landmarks: Vec<Array2<f32>>,
}

fn grid_cells(input_size: usize, stride: usize) -> usize {
    (input_size / stride) * (input_size / stride)
}

fn parse_group(
    outputs: &[(&[i64], &[f32])],
    first: usize,
    width: usize,
    name: &str,
    input_size: usize,
) -> Result<Vec<Array2<f32>>> {
    STRIDES
        .iter()
        .enumerate()
        .map(|(scale, &stride)| -> Result<Array2<f32>> {
            let idx = first + scale;
            let expected = grid_cells(input_size, stride);
            let (shape, data) = outputs
                .get(idx)
                .ok_or_else(|| anyhow::anyhow!("Missing {} output at index {}", name, idx))?;
            if shape.len() != 3 || shape[0] != 1 || shape[2] != width as i64 {
                anyhow::bail!(
                    "Unexpected {} shape at index {}: {:?}, expected [1, {}, {}]",
                    name,
                    idx,
                    shape,
                    expected,
                    width
                );
            }
            if shape[1] as usize != expected {
                anyhow::bail!(
                    "Expected {} locations for {} at index {}, got {}",
                    expected,
                    name,
                    idx,
                    shape[1]
                );
            }
            Ok(Array2::from_shape_vec((expected, width), data.to_vec())?)
        })
        .collect()
}

/// Splits the twelve raw YuNet outputs into combined scores, boxes and
/// landmarks.
///
/// The score for each cell is `sqrt(cls * obj)` with both clamped to [0, 1].
pub fn parse_outputs(outputs: &[(&[i64], &[f32])], input_size: usize) -> Result<YunetOutputs> {
    let cls = parse_group(outputs, CLS, 1, "cls", input_size)?;
    let obj = parse_group(outputs, OBJ, 1, "obj", input_size)?;
    let boxes = parse_group(outputs, BBOX, 4, "bbox", input_size)?;
    let landmarks = parse_group(outputs, KPS, 10, "kps", input_size)?;

    let scores = cls
        .into_iter()
        .zip(obj.iter())
        .map(|(cls, obj)| {
            let mut combined = cls * obj;
            combined.mapv_inplace(|x| x.clamp(0.0, 1.0).sqrt());
            combined
        })
        .collect();

    Ok(YunetOutputs {
        scores,
        boxes,
        landmarks,
    })
}

/// Decodes every cell whose score reaches `score_threshold`.
pub fn decode(
    outputs: &YunetOutputs,
    score_threshold: f32,
    input_size: usize,
) -> Result<Vec<RawDetection>> {
    let mut detections = Vec::new();
    let size = input_size as f32;

    for (scale, &stride) in STRIDES.iter().enumerate() {
        let scores = &outputs.scores[scale];
        let boxes = &outputs.boxes[scale];
        let landmarks = &outputs.landmarks[scale];
        let side = input_size / stride;

        if scores.nrows() != side * side
            || boxes.nrows() != side * side
            || landmarks.nrows() != side * side
        {
            anyhow::bail!(
                "Expected {} cells for stride {}, got {} scores, {} boxes and {} landmarks",
                side * side,
                stride,
                scores.nrows(),
                boxes.nrows(),
                landmarks.nrows()
            );
        }

        let s = stride as f32;
        for i in 0..side {
            for j in 0..side {
                let idx = i * side + j;
                let score = scores[[idx, 0]];
                if score < score_threshold {
                    continue;
                }

                let cx = (j as f32 + boxes[[idx, 0]]) * s / size;
                let cy = (i as f32 + boxes[[idx, 1]]) * s / size;
                let w = boxes[[idx, 2]].exp() * s / size;
                let h = boxes[[idx, 3]].exp() * s / size;

                let mut lms = [0.0f32; 10];
                for k in 0..5 {
                    lms[k * 2] = (j as f32 + landmarks[[idx, k * 2]]) * s / size;
                    lms[k * 2 + 1] = (i as f32 + landmarks[[idx, k * 2 + 1]]) * s / size;
                }

                detections.push(RawDetection {
                    bbox: [cx - w / 2.0, cy - h / 2.0, w, h],
                    landmarks: lms,
                    score,
                });
            }
        }
    }

    Ok(detections)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zeros(rows: usize, cols: usize) -> Array2<f32> {
        Array2::zeros((rows, cols))
    }

    #[test]
    fn test_decode_grid_based() {
        let input_size = 640;
        let mut scores: Vec<_> = STRIDES
            .iter()
            .map(|&s| zeros(grid_cells(input_size, s), 1))
            .collect();
        let mut boxes: Vec<_> = STRIDES
            .iter()
            .map(|&s| zeros(grid_cells(input_size, s), 4))
            .collect();
        let landmarks: Vec<_> = STRIDES
            .iter()
            .map(|&s| zeros(grid_cells(input_size, s), 10))
            .collect();

        // One face on the stride-32 grid at cell (10, 10).
        let idx = 10 * 20 + 10;
        scores[2][[idx, 0]] = 0.9;
        boxes[2][[idx, 0]] = 0.5;
        boxes[2][[idx, 1]] = 0.3;
        boxes[2][[idx, 2]] = 4.0f32.ln();
        boxes[2][[idx, 3]] = 4.0f32.ln();

        let outputs = YunetOutputs {
            scores,
            boxes,
            landmarks,
        };
        let detections = decode(&outputs, 0.5, input_size).unwrap();
        assert_eq!(detections.len(), 1);

        // cx = 10.5 * 32 / 640 = 0.525, cy = 10.3 * 32 / 640 = 0.515,
        // w = h = exp(ln 4) * 32 / 640 = 0.2
        let det = &detections[0];
        assert!((det.bbox[0] - 0.425).abs() < 1e-5);
        assert!((det.bbox[1] - 0.415).abs() < 1e-5);
        assert!((det.bbox[2] - 0.2).abs() < 1e-5);
        assert!((det.bbox[3] - 0.2).abs() < 1e-5);
        assert!((det.score - 0.9).abs() < 1e-5);
        // Landmarks with zero offset sit on the cell corner: 10 * 32 / 640
        for v in det.landmarks {
            assert!((v - 0.5).abs() < 1e-5);
        }
    }

    #[test]
    fn test_decode_box_size_is_exponential() {
        let input_size = 640;
        let scores: Vec<_> = STRIDES
            .iter()
            .map(|&s| Array2::from_elem((grid_cells(input_size, s), 1), 0.9))
            .collect();
        let boxes: Vec<_> = STRIDES
            .iter()
            .map(|&s| zeros(grid_cells(input_size, s), 4))
            .collect();
        let landmarks: Vec<_> = STRIDES
            .iter()
            .map(|&s| zeros(grid_cells(input_size, s), 10))
            .collect();

        // dw = dh = 0 is a face exactly one stride wide, not a zero-size box.
        let outputs = YunetOutputs {
            scores,
            boxes,
            landmarks,
        };
        let detections = decode(&outputs, 0.5, input_size).unwrap();
        let first = &detections[0];
        assert!((first.bbox[2] - 8.0 / 640.0).abs() < 1e-6);
        assert!((first.bbox[3] - 8.0 / 640.0).abs() < 1e-6);
        assert!(detections.iter().all(|d| d.bbox[2] > 0.0 && d.bbox[3] > 0.0));
    }

    #[test]
    fn test_parse_outputs_combines_scores() {
        let input_size = 64;
        let mut shapes = Vec::new();
        let mut data = Vec::new();
        for (width, fill) in [(1usize, 0.25f32), (1, 1.0), (4, 1.0), (10, 0.75)] {
            for &stride in &STRIDES {
                let cells = grid_cells(input_size, stride);
                shapes.push(vec![1i64, cells as i64, width as i64]);
                data.push(vec![fill; cells * width]);
            }
        }
        let raw: Vec<(&[i64], &[f32])> = shapes
            .iter()
            .zip(data.iter())
            .map(|(s, d)| (s.as_slice(), d.as_slice()))
            .collect();

        let parsed = parse_outputs(&raw, input_size).unwrap();
        assert_eq!(parsed.scores.len(), 3);
        assert_eq!(parsed.scores[0].nrows(), 64);
        // sqrt(0.25 * 1.0)
        assert!((parsed.scores[1][[0, 0]] - 0.5).abs() < 1e-6);
        assert_eq!(parsed.boxes[2][[0, 3]], 1.0);
        assert_eq!(parsed.landmarks.len(), 3);
        assert_eq!(parsed.landmarks[0].ncols(), 10);
        assert_eq!(parsed.landmarks[1][[0, 9]], 0.75);
    }

    #[test]
    fn test_parse_outputs_rejects_wrong_shape() {
        let shape = [1i64, 3, 1];
        let data = [0.0f32; 3];
        let raw = vec![(&shape[..], &data[..]); 12];
        assert!(parse_outputs(&raw, 640).is_err());
        assert!(parse_outputs(&raw[..2], 640).is_err());
    }
}
