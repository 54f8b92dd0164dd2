use crate::yunet;
use anyhow::Result;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::Array4;
use ort::{session::Session, value::Value};

/// YuNet runs on a fixed 640x640 canvas.
pub const INPUT_SIZE: u32 = 640;

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const LANDMARK_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Face found by the detector, in source image pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: [f32; 4], // x, y, w, h
    pub landmarks: [f32; 10], // eyes, nose tip, mouth corners as x, y pairs
    pub score: f32,
}

/// Where the source image sits on the square detector canvas.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    offset_x: u32,
    offset_y: u32,
}

fn letterbox(img: &DynamicImage) -> (RgbImage, Letterbox) {
    let (width, height) = img.dimensions();
    let scale = INPUT_SIZE as f32 / width.max(height) as f32;
    let new_width = ((width as f32 * scale) as u32).clamp(1, INPUT_SIZE);
    let new_height = ((height as f32 * scale) as u32).clamp(1, INPUT_SIZE);

    let resized = img
        .resize_exact(new_width, new_height, image::imageops::FilterType::Triangle)
        .to_rgb8();

    let mut canvas = RgbImage::new(INPUT_SIZE, INPUT_SIZE);
    let offset_x = (INPUT_SIZE - new_width) / 2;
    let offset_y = (INPUT_SIZE - new_height) / 2;
    image::imageops::overlay(&mut canvas, &resized, offset_x as i64, offset_y as i64);

    (
        canvas,
        Letterbox {
            scale,
            offset_x,
            offset_y,
        },
    )
}

/// Planar BGR tensor with values in [0, 255].
fn to_bgr_planes(canvas: &RgbImage) -> Result<Array4<f32>> {
    let side = INPUT_SIZE as usize;
    let plane = side * side;
    let mut data = vec![0.0f32; 3 * plane];
    for (i, px) in canvas.pixels().enumerate() {
        data[i] = px[2] as f32;
        data[plane + i] = px[1] as f32;
        data[2 * plane + i] = px[0] as f32;
    }
    Ok(Array4::from_shape_vec((1, 3, side, side), data)?)
}

/// Detect faces in an image using the YuNet detector.
pub fn detect_faces(
    session: &mut Session,
    img: &DynamicImage,
    score_threshold: f32,
    nms_threshold: f32,
) -> Result<Vec<Detection>> {
    let (canvas, lb) = letterbox(img);
    let input_tensor = Value::from_array(to_bgr_planes(&canvas)?)?;
    let outputs = session.run(ort::inputs![input_tensor])?;

    let mut output_data: Vec<(Vec<i64>, Vec<f32>)> = Vec::new();
    for (_name, output) in outputs.iter() {
        let (shape, data) = output.try_extract_tensor::<f32>()?;
        output_data.push((shape.iter().copied().collect(), data.to_vec()));
    }
    let output_refs: Vec<(&[i64], &[f32])> = output_data
        .iter()
        .map(|(s, d)| (s.as_slice(), d.as_slice()))
        .collect();

    let parsed = yunet::parse_outputs(&output_refs, INPUT_SIZE as usize)?;
    let raw = yunet::decode(&parsed, score_threshold, INPUT_SIZE as usize)?;

    let size = INPUT_SIZE as f32;
    let mut detections: Vec<Detection> = raw
        .into_iter()
        .map(|d| {
            let mut landmarks = [0.0f32; 10];
            for (k, point) in d.landmarks.chunks_exact(2).enumerate() {
                landmarks[k * 2] = (point[0] * size - lb.offset_x as f32) / lb.scale;
                landmarks[k * 2 + 1] = (point[1] * size - lb.offset_y as f32) / lb.scale;
            }
            Detection {
                bbox: [
                    (d.bbox[0] * size - lb.offset_x as f32) / lb.scale,
                    (d.bbox[1] * size - lb.offset_y as f32) / lb.scale,
                    d.bbox[2] * size / lb.scale,
                    d.bbox[3] * size / lb.scale,
                ],
                landmarks,
                score: d.score,
            }
        })
        .collect();

    if nms_threshold < 1.0 {
        detections = nms(&detections, nms_threshold);
    }

    Ok(detections)
}

/// Apply non-maximum suppression to remove overlapping detections
pub fn nms(detections: &[Detection], iou_threshold: f32) -> Vec<Detection> {
    let mut sorted = detections.to_vec();
    sorted.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<Detection> = Vec::new();
    for candidate in sorted {
        if keep
            .iter()
            .all(|kept| compute_iou(&kept.bbox, &candidate.bbox) <= iou_threshold)
        {
            keep.push(candidate);
        }
    }
    keep
}

fn compute_iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = (a[0] + a[2]).min(b[0] + b[2]);
    let y2 = (a[1] + a[3]).min(b[1] + b[3]);

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let inter = (x2 - x1) * (y2 - y1);
    let area_a = a[2] * a[3];
    let area_b = b[2] * b[3];
    inter / (area_a + area_b - inter)
}

/// Outline every detection with a red rectangle `thickness` pixels wide
/// and mark its landmarks with green dots.
///
/// Boxes are clipped to the image; landmarks outside it are skipped.
pub fn draw_boxes(img: &mut RgbImage, detections: &[Detection], thickness: u32) {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return;
    }
    let clip_x = |v: f32| (v.round().max(0.0) as u32).min(width - 1);
    let clip_y = |v: f32| (v.round().max(0.0) as u32).min(height - 1);

    for det in detections {
        let [x, y, w, h] = det.bbox;
        if x + w < 0.0 || y + h < 0.0 || x >= width as f32 || y >= height as f32 {
            continue;
        }
        let (x0, y0) = (clip_x(x), clip_y(y));
        let (x1, y1) = (clip_x(x + w), clip_y(y + h));

        for t in 0..thickness {
            for px in x0..=x1 {
                img.put_pixel(px, (y0 + t).min(y1), BOX_COLOR);
                img.put_pixel(px, y1.saturating_sub(t).max(y0), BOX_COLOR);
            }
            for py in y0..=y1 {
                img.put_pixel((x0 + t).min(x1), py, BOX_COLOR);
                img.put_pixel(x1.saturating_sub(t).max(x0), py, BOX_COLOR);
            }
        }
    }

    for det in detections {
        for point in det.landmarks.chunks_exact(2) {
            let (x, y) = (point[0].round(), point[1].round());
            if x < 0.0 || y < 0.0 || x >= width as f32 || y >= height as f32 {
                continue;
            }
            let (cx, cy) = (x as u32, y as u32);
            for py in cy.saturating_sub(1)..=(cy + 1).min(height - 1) {
                for px in cx.saturating_sub(1)..=(cx + 1).min(width - 1) {
                    img.put_pixel(px, py, LANDMARK_COLOR);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(bbox: [f32; 4], score: f32) -> Detection {
        Detection {
            bbox,
            landmarks: [0.0; 10],
            score,
        }
    }

    #[test]
    fn test_iou() {
        let a = [10.0, 10.0, 20.0, 20.0];
        let b = [15.0, 15.0, 20.0, 20.0];
        let iou = compute_iou(&a, &b);
        assert!(iou > 0.0 && iou < 1.0);

        let c = [100.0, 100.0, 10.0, 10.0];
        assert_eq!(compute_iou(&a, &c), 0.0);
    }

    #[test]
    fn test_nms() {
        let detections = vec![
            det([12.0, 12.0, 20.0, 20.0], 0.8),
            det([10.0, 10.0, 20.0, 20.0], 0.9),
            det([100.0, 100.0, 20.0, 20.0], 0.85),
        ];

        let result = nms(&detections, 0.3);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].score, 0.9);
        assert_eq!(result[1].score, 0.85);
    }

    #[test]
    fn test_letterbox_keeps_aspect_ratio() {
        let img = DynamicImage::new_rgb8(1280, 640);
        let (canvas, lb) = letterbox(&img);
        assert_eq!(canvas.dimensions(), (INPUT_SIZE, INPUT_SIZE));
        assert_eq!(lb.scale, 0.5);
        assert_eq!(lb.offset_x, 0);
        assert_eq!(lb.offset_y, 160);
    }

    #[test]
    fn test_bgr_planes() {
        let mut canvas = RgbImage::new(INPUT_SIZE, INPUT_SIZE);
        canvas.put_pixel(1, 0, Rgb([10, 20, 30]));
        let tensor = to_bgr_planes(&canvas).unwrap();
        assert_eq!(tensor[[0, 0, 0, 1]], 30.0);
        assert_eq!(tensor[[0, 1, 0, 1]], 20.0);
        assert_eq!(tensor[[0, 2, 0, 1]], 10.0);
    }

    #[test]
    fn test_draw_boxes_outlines_and_clips() {
        let mut img = RgbImage::new(50, 50);
        draw_boxes(
            &mut img,
            &[det([10.0, 10.0, 20.0, 20.0], 0.9), det([40.0, 40.0, 30.0, 30.0], 0.7)],
            2,
        );

        assert_eq!(*img.get_pixel(10, 10), BOX_COLOR);
        assert_eq!(*img.get_pixel(11, 20), BOX_COLOR);
        assert_eq!(*img.get_pixel(30, 30), BOX_COLOR);
        assert_eq!(*img.get_pixel(20, 20), Rgb([0, 0, 0]));
        assert_eq!(*img.get_pixel(49, 49), BOX_COLOR);
    }

    #[test]
    fn test_draw_boxes_marks_landmarks() {
        let mut img = RgbImage::new(50, 50);
        let face = Detection {
            bbox: [10.0, 10.0, 30.0, 30.0],
            landmarks: [18.0, 20.0, 32.0, 20.0, 25.0, 26.0, 19.0, 32.0, 31.0, 32.0],
            score: 0.9,
        };
        let outside = Detection {
            landmarks: [-5.0, 60.0, 70.0, 5.0, 25.0, 4.0, 0.0, 0.0, 0.0, 0.0],
            ..face.clone()
        };
        draw_boxes(&mut img, &[face, outside], 1);

        assert_eq!(*img.get_pixel(18, 20), LANDMARK_COLOR);
        assert_eq!(*img.get_pixel(19, 21), LANDMARK_COLOR);
        assert_eq!(*img.get_pixel(25, 26), LANDMARK_COLOR);
        assert_eq!(*img.get_pixel(31, 32), LANDMARK_COLOR);
        assert_eq!(*img.get_pixel(25, 4), LANDMARK_COLOR);
        assert_eq!(*img.get_pixel(0, 0), LANDMARK_COLOR);
        assert_eq!(*img.get_pixel(25, 15), Rgb([0, 0, 0]));
    }
}
