use crate::error::Error;
use crate::models::classify_types::{BoundingBox, Detection};
use image::{DynamicImage, RgbaImage};
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;

/// Margin kept around an extracted region.
const EXTRACT_PADDING: u32 = 20;
/// Detections smaller than this many pixels per side are discarded.
const MIN_OBJECT_SIZE: f32 = 10.0;
const MIN_DETECTION_SCORE: f32 = 0.3;

/// A detection that survived validation, ready for extraction or removal.
#[derive(Debug, Clone, Serialize)]
pub struct DetectedObject {
    pub label: String,
    pub confidence: f32,
    pub bounding_box: BoundingBox,
    pub area: f32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectionStats {
    pub total_objects: usize,
    pub average_confidence: f32,
    pub object_types: HashMap<String, usize>,
    pub high_confidence_objects: usize,
}

/// Validate raw detections for extraction: drop tiny boxes and low scores,
/// round coordinates to whole pixels, sort by confidence.
pub fn filter_detections(detections: Vec<Detection>) -> Vec<DetectedObject> {
    let mut objects: Vec<DetectedObject> = detections
        .into_iter()
        .filter(|d| {
            d.bounding_box.width >= MIN_OBJECT_SIZE
                && d.bounding_box.height >= MIN_OBJECT_SIZE
                && d.score >= MIN_DETECTION_SCORE
        })
        .map(|d| {
            let bounding_box = BoundingBox {
                x: d.bounding_box.x.round(),
                y: d.bounding_box.y.round(),
                width: d.bounding_box.width.round(),
                height: d.bounding_box.height.round(),
            };
            DetectedObject {
                label: d.label,
                confidence: d.score,
                area: bounding_box.area(),
                bounding_box,
            }
        })
        .collect();

    objects.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    objects
}

/// Crop a detected region out of the image with a fixed margin. The output
/// is always `bbox + 2 * padding` in size; where the margin falls outside
/// the image, the pixels stay transparent.
pub fn extract_object(
    image: &DynamicImage,
    bounding_box: &BoundingBox,
) -> Result<DynamicImage, Error> {
    if image.width() == 0 || image.height() == 0 {
        return Err(Error::InvalidInput("no image supplied".to_string()));
    }
    if bounding_box.width < 1.0 || bounding_box.height < 1.0 {
        return Err(Error::InvalidInput("empty bounding box".to_string()));
    }

    let out_w = bounding_box.width as u32 + 2 * EXTRACT_PADDING;
    let out_h = bounding_box.height as u32 + 2 * EXTRACT_PADDING;
    let origin_x = bounding_box.x as i64 - EXTRACT_PADDING as i64;
    let origin_y = bounding_box.y as i64 - EXTRACT_PADDING as i64;

    let src = image.to_rgba8();
    let mut out = RgbaImage::new(out_w, out_h);
    for y in 0..out_h {
        for x in 0..out_w {
            let sx = origin_x + x as i64;
            let sy = origin_y + y as i64;
            if sx >= 0 && sx < image.width() as i64 && sy >= 0 && sy < image.height() as i64 {
                out.put_pixel(x, y, *src.get_pixel(sx as u32, sy as u32));
            }
        }
    }

    Ok(DynamicImage::ImageRgba8(out))
}

/// Remove regions from the image with naive inpainting: each masked pixel is
/// replaced by the average of surrounding out-of-box samples on a coarse
/// grid, plus a little noise for texture.
pub fn remove_objects(
    image: &DynamicImage,
    boxes: &[BoundingBox],
) -> Result<DynamicImage, Error> {
    if image.width() == 0 || image.height() == 0 {
        return Err(Error::InvalidInput("no image supplied".to_string()));
    }
    if boxes.is_empty() {
        return Err(Error::InvalidInput("no objects to remove".to_string()));
    }

    let width = image.width() as i64;
    let height = image.height() as i64;
    let mut rgba = image.to_rgba8();
    let mut rng = rand::rng();

    for bbox in boxes {
        let x0 = bbox.x as i64;
        let y0 = bbox.y as i64;
        let x1 = (bbox.x + bbox.width) as i64;
        let y1 = (bbox.y + bbox.height) as i64;

        for y in y0.max(0)..y1.min(height) {
            for x in x0.max(0)..x1.min(width) {
                let mut sum = [0u64; 3];
                let mut samples = 0u64;

                let mut dy = -10i64;
                while dy <= 10 {
                    let mut dx = -10i64;
                    while dx <= 10 {
                        let sx = x + dx;
                        let sy = y + dy;
                        let inside_image = sx >= 0 && sx < width && sy >= 0 && sy < height;
                        let inside_box = sx >= x0 && sx < x1 && sy >= y0 && sy < y1;
                        if inside_image && !inside_box {
                            let p = rgba.get_pixel(sx as u32, sy as u32);
                            sum[0] += p[0] as u64;
                            sum[1] += p[1] as u64;
                            sum[2] += p[2] as u64;
                            samples += 1;
                        }
                        dx += 5;
                    }
                    dy += 5;
                }

                if samples > 0 {
                    let noise: f32 = (rng.random::<f32>() - 0.5) * 20.0;
                    let p = rgba.get_pixel_mut(x as u32, y as u32);
                    for c in 0..3 {
                        let avg = (sum[c] / samples) as f32;
                        p[c] = (avg + noise).clamp(0.0, 255.0) as u8;
                    }
                    p[3] = 255;
                }
            }
        }
    }

    Ok(DynamicImage::ImageRgba8(rgba))
}

pub fn detection_stats(objects: &[DetectedObject]) -> DetectionStats {
    if objects.is_empty() {
        return DetectionStats::default();
    }

    let mut stats = DetectionStats {
        total_objects: objects.len(),
        ..Default::default()
    };

    let mut total_confidence = 0.0;
    for object in objects {
        total_confidence += object.confidence;
        if object.confidence > 0.5 {
            stats.high_confidence_objects += 1;
        }
        *stats.object_types.entry(object.label.clone()).or_insert(0) += 1;
    }
    stats.average_confidence = total_confidence / objects.len() as f32;
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn detection(label: &str, score: f32, x: f32, y: f32, w: f32, h: f32) -> Detection {
        Detection {
            label: label.to_string(),
            score,
            bounding_box: BoundingBox {
                x,
                y,
                width: w,
                height: h,
            },
        }
    }

    #[test]
    fn filtering_drops_tiny_and_weak_detections() {
        let objects = filter_detections(vec![
            detection("dog", 0.9, 10.0, 10.0, 50.0, 50.0),
            detection("speck", 0.9, 0.0, 0.0, 4.0, 4.0),
            detection("ghost", 0.1, 10.0, 10.0, 50.0, 50.0),
            detection("cat", 0.95, 5.0, 5.0, 30.0, 30.0),
        ]);
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].label, "cat");
        assert_eq!(objects[1].label, "dog");
        assert!((objects[0].area - 900.0).abs() < 1e-3);
    }

    #[test]
    fn extraction_keeps_padded_size_everywhere() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            200,
            200,
            Rgba([10, 20, 30, 255]),
        ));
        let bbox = BoundingBox {
            x: 50.0,
            y: 50.0,
            width: 40.0,
            height: 40.0,
        };
        let crop = extract_object(&img, &bbox).unwrap().to_rgba8();
        assert_eq!(crop.dimensions(), (80, 80));
        assert_eq!(crop.get_pixel(0, 0)[3], 255);
        assert_eq!(crop.get_pixel(79, 79)[3], 255);

        // a box at the far corner keeps its full output size; the part of
        // the margin past the image edge stays transparent
        let bbox = BoundingBox {
            x: 170.0,
            y: 170.0,
            width: 40.0,
            height: 40.0,
        };
        let crop = extract_object(&img, &bbox).unwrap().to_rgba8();
        assert_eq!(crop.dimensions(), (80, 80));
        assert_eq!(crop.get_pixel(10, 10)[3], 255); // maps to (160, 160)
        assert_eq!(crop.get_pixel(79, 79)[3], 0); // maps past (229, 229)
    }

    #[test]
    fn empty_bounding_box_is_invalid() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([0; 4])));
        let bbox = BoundingBox {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
        };
        assert!(matches!(
            extract_object(&img, &bbox),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn removal_fills_masked_region_from_surroundings() {
        // white image with a black square in the middle
        let img = RgbaImage::from_fn(60, 60, |x, y| {
            if (25..35).contains(&x) && (25..35).contains(&y) {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        let bbox = BoundingBox {
            x: 25.0,
            y: 25.0,
            width: 10.0,
            height: 10.0,
        };
        let result = remove_objects(&DynamicImage::ImageRgba8(img), &[bbox])
            .unwrap()
            .to_rgba8();

        // the black center should now be bright, pulled from white neighbors
        let center = result.get_pixel(30, 30);
        assert!(center[0] > 150);
        assert_eq!(center[3], 255);
        // pixels outside the box are untouched
        assert_eq!(result.get_pixel(5, 5)[0], 255);
    }

    #[test]
    fn removing_nothing_is_invalid_input() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([0; 4])));
        assert!(matches!(
            remove_objects(&img, &[]),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn stats_summarize_objects() {
        let objects = filter_detections(vec![
            detection("dog", 0.9, 0.0, 0.0, 20.0, 20.0),
            detection("dog", 0.4, 0.0, 0.0, 20.0, 20.0),
            detection("cat", 0.8, 0.0, 0.0, 20.0, 20.0),
        ]);
        let stats = detection_stats(&objects);
        assert_eq!(stats.total_objects, 3);
        assert_eq!(stats.high_confidence_objects, 2);
        assert_eq!(stats.object_types["dog"], 2);
        let expected = (0.9 + 0.4 + 0.8) / 3.0;
        assert!((stats.average_confidence - expected).abs() < 1e-6);
    }
}
