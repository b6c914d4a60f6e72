use crate::error::Error;
use crate::models::classify_types::{BoundingBox, Detection};
use image::DynamicImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;

const CROP_PCT: f32 = 0.875;

// ImageNet normalization constants, shared by both models
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Side length of the square detector input.
pub const DETECT_SIZE: u32 = 640;

/// Build the NCHW classifier tensor: resize the shortest edge to
/// `crop_size / 0.875`, center crop, normalize with ImageNet statistics.
pub fn preprocess_classify(img: &DynamicImage, crop_size: u32) -> Result<Array4<f32>, Error> {
    let resize_size = (crop_size as f32 / CROP_PCT).ceil() as u32;
    let (w, h) = (img.width(), img.height());
    if w == 0 || h == 0 {
        return Err(Error::InvalidInput("image has no pixels".to_string()));
    }

    let (new_w, new_h) = if w < h {
        (
            resize_size,
            ((h as f32 / w as f32) * resize_size as f32).round() as u32,
        )
    } else {
        (
            ((w as f32 / h as f32) * resize_size as f32).round() as u32,
            resize_size,
        )
    };
    let resized = img.resize_exact(new_w, new_h, image::imageops::FilterType::Triangle);

    let crop_x = (new_w.saturating_sub(crop_size)) / 2;
    let crop_y = (new_h.saturating_sub(crop_size)) / 2;
    let cropped = resized.crop_imm(crop_x, crop_y, crop_size, crop_size);

    normalized_tensor(&cropped.to_rgb8(), crop_size)
}

/// Build the detector tensor at a fixed square size, remembering nothing:
/// box rescaling back to source pixels happens in [`run_detector`].
pub fn preprocess_detect(img: &DynamicImage) -> Result<Array4<f32>, Error> {
    if img.width() == 0 || img.height() == 0 {
        return Err(Error::InvalidInput("image has no pixels".to_string()));
    }
    let resized = img.resize_exact(DETECT_SIZE, DETECT_SIZE, image::imageops::FilterType::Triangle);
    normalized_tensor(&resized.to_rgb8(), DETECT_SIZE)
}

fn normalized_tensor(rgb: &image::RgbImage, size: u32) -> Result<Array4<f32>, Error> {
    let hw = (size * size) as usize;
    let mut data = vec![0f32; 3 * hw];
    for (i, pixel) in rgb.as_raw().chunks_exact(3).enumerate() {
        for c in 0..3 {
            data[c * hw + i] = (pixel[c] as f32 / 255.0 - MEAN[c]) / STD[c];
        }
    }

    Array4::from_shape_vec((1, 3, size as usize, size as usize), data)
        .map_err(|e| Error::Inference(format!("failed to shape input tensor: {}", e)))
}

/// Run the classifier session and return the top-k (label, probability)
/// pairs, highest probability first.
pub fn run_classifier(
    session: &mut Session,
    input: Array4<f32>,
    labels: &[String],
    top_k: usize,
) -> Result<Vec<(String, f32)>, Error> {
    let input_name = session.inputs()[0].name().to_string();
    let input_tensor = Value::from_array(input)
        .map_err(|e| Error::Inference(format!("failed to create input tensor: {}", e)))?;

    let outputs = session
        .run(ort::inputs![input_name.as_str() => input_tensor])
        .map_err(|e| Error::Inference(format!("classifier run failed: {}", e)))?;

    let output_value = outputs
        .values()
        .next()
        .ok_or_else(|| Error::Inference("classifier produced no outputs".to_string()))?;
    let (_, logits) = output_value
        .try_extract_tensor::<f32>()
        .map_err(|e| Error::Inference(format!("failed to extract logits: {}", e)))?;

    let probabilities = softmax(logits);
    let mut indexed: Vec<(usize, f32)> = probabilities.into_iter().enumerate().collect();
    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let top_k = top_k.min(indexed.len());
    Ok(indexed[..top_k]
        .iter()
        .map(|&(idx, prob)| {
            let label = labels
                .get(idx)
                .cloned()
                .unwrap_or_else(|| format!("class_{}", idx));
            (label, prob)
        })
        .collect())
}

/// Run the DETR-style detector session. Each query row gets a softmax over
/// its class logits; the trailing no-object column is excluded from the
/// argmax, `N/A` placeholder labels are dropped, and boxes are rescaled
/// from normalized (cx, cy, w, h) to pixel (x, y, w, h) of the source image.
pub fn run_detector(
    session: &mut Session,
    input: Array4<f32>,
    labels: &[String],
    min_score: f32,
    source_width: u32,
    source_height: u32,
) -> Result<Vec<Detection>, Error> {
    let input_name = session.inputs()[0].name().to_string();
    let input_tensor = Value::from_array(input)
        .map_err(|e| Error::Inference(format!("failed to create input tensor: {}", e)))?;

    let outputs = session
        .run(ort::inputs![input_name.as_str() => input_tensor])
        .map_err(|e| Error::Inference(format!("detector run failed: {}", e)))?;

    let mut values = outputs.values();
    let logits_value = values
        .next()
        .ok_or_else(|| Error::Inference("detector produced no outputs".to_string()))?;
    let boxes_value = values
        .next()
        .ok_or_else(|| Error::Inference("detector produced no box output".to_string()))?;

    let (logits_shape, logits) = logits_value
        .try_extract_tensor::<f32>()
        .map_err(|e| Error::Inference(format!("failed to extract detector logits: {}", e)))?;
    let (_, boxes) = boxes_value
        .try_extract_tensor::<f32>()
        .map_err(|e| Error::Inference(format!("failed to extract detector boxes: {}", e)))?;

    if logits_shape.len() != 3 {
        return Err(Error::Inference(format!(
            "unexpected detector logits rank {}",
            logits_shape.len()
        )));
    }
    let queries = logits_shape[1] as usize;
    let classes = logits_shape[2] as usize;

    let mut detections = Vec::new();
    for q in 0..queries {
        let row = &logits[q * classes..(q + 1) * classes];
        let probs = softmax(row);

        // Last column is the no-object class.
        let mut best_idx = 0;
        let mut best_score = f32::NEG_INFINITY;
        for (idx, &p) in probs[..classes - 1].iter().enumerate() {
            if p > best_score {
                best_score = p;
                best_idx = idx;
            }
        }
        if best_score < min_score {
            continue;
        }

        let label = match labels.get(best_idx) {
            Some(l) if l != "N/A" => l.clone(),
            Some(_) => continue,
            None => format!("class_{}", best_idx),
        };

        let b = &boxes[q * 4..q * 4 + 4];
        detections.push(Detection {
            label,
            score: best_score,
            bounding_box: convert_box(b[0], b[1], b[2], b[3], source_width, source_height),
        });
    }

    detections.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(detections)
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max_logit = logits.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp_sum: f32 = logits.iter().map(|&x| (x - max_logit).exp()).sum();
    logits
        .iter()
        .map(|&x| (x - max_logit).exp() / exp_sum)
        .collect()
}

/// Normalized center box to pixel corner box, clamped to the image.
fn convert_box(cx: f32, cy: f32, w: f32, h: f32, width: u32, height: u32) -> BoundingBox {
    let width = width as f32;
    let height = height as f32;
    let x = ((cx - w / 2.0) * width).clamp(0.0, width);
    let y = ((cy - h / 2.0) * height).clamp(0.0, height);
    BoundingBox {
        x,
        y,
        width: (w * width).clamp(0.0, width - x),
        height: (h * height).clamp(0.0, height - y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn classify_tensor_shape_and_normalization() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            300,
            300,
            Rgba([255, 255, 255, 255]),
        ));
        let tensor = preprocess_classify(&img, 224).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 224, 224]);
        // white pixel, red channel: (1.0 - 0.485) / 0.229
        let expected = (1.0 - MEAN[0]) / STD[0];
        assert!((tensor[[0, 0, 0, 0]] - expected).abs() < 1e-5);
    }

    #[test]
    fn empty_image_is_invalid_input() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(0, 0));
        assert!(matches!(
            preprocess_classify(&img, 224),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            preprocess_detect(&img),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn box_conversion_scales_and_clamps() {
        let bbox = convert_box(0.5, 0.5, 0.4, 0.2, 100, 200);
        assert!((bbox.x - 30.0).abs() < 1e-4);
        assert!((bbox.y - 80.0).abs() < 1e-4);
        assert!((bbox.width - 40.0).abs() < 1e-4);
        assert!((bbox.height - 40.0).abs() < 1e-4);

        // box center near the right edge clamps inside the image
        let bbox = convert_box(1.0, 0.5, 0.5, 0.5, 100, 100);
        assert!(bbox.x + bbox.width <= 100.0 + 1e-4);
    }
}
