//! Deterministic image variants for the ensemble passes.
//!
//! The same input always yields byte-identical variants, so classification
//! over perturbations is reproducible. Filter parameters follow CSS filter
//! semantics (multiplier of 1.0 is a no-op) applied in order: contrast,
//! brightness, saturation, hue rotation.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};

const CLASSIFY_SIZE: u32 = 224;
const LARGE_SIZE: u32 = 299;

/// One deterministically transformed copy of the input image.
pub struct ImageVariant {
    pub name: &'static str,
    pub image: DynamicImage,
}

/// Filtered copies: contrast/brightness/saturation tweaks at fixed
/// parameters plus one upscaled pass.
pub fn preprocess_variants(img: &DynamicImage) -> Vec<ImageVariant> {
    vec![
        ImageVariant {
            name: "enhanced",
            image: apply_filter(img, CLASSIFY_SIZE, 1.2, 1.1, 1.2, 0),
        },
        ImageVariant {
            name: "soft",
            image: apply_filter(img, CLASSIFY_SIZE, 0.9, 0.95, 0.9, 0),
        },
        ImageVariant {
            name: "large",
            image: apply_filter(img, LARGE_SIZE, 1.0, 1.0, 1.0, 0),
        },
        ImageVariant {
            name: "vivid",
            image: apply_filter(img, CLASSIFY_SIZE, 1.3, 1.0, 1.4, 5),
        },
    ]
}

/// Geometric augmentations: identity, small-angle rotations and a
/// horizontal flip, all at classification resolution.
pub fn augmented_variants(img: &DynamicImage) -> Vec<ImageVariant> {
    let base = img.resize_exact(CLASSIFY_SIZE, CLASSIFY_SIZE, FilterType::Triangle);
    vec![
        ImageVariant {
            name: "original",
            image: base.clone(),
        },
        ImageVariant {
            name: "rotated_-3",
            image: rotate_about_center(&base, -3.0),
        },
        ImageVariant {
            name: "rotated_3",
            image: rotate_about_center(&base, 3.0),
        },
        ImageVariant {
            name: "flipped",
            image: base.fliph(),
        },
    ]
}

fn apply_filter(
    img: &DynamicImage,
    size: u32,
    contrast: f32,
    brightness: f32,
    saturation: f32,
    hue_degrees: i32,
) -> DynamicImage {
    let resized = img.resize_exact(size, size, FilterType::Triangle);
    let mut rgba = resized.to_rgba8();

    for pixel in rgba.pixels_mut() {
        let mut channels = [0f32; 3];
        for (i, channel) in channels.iter_mut().enumerate() {
            let v = pixel[i] as f32 / 255.0;
            *channel = ((v - 0.5) * contrast + 0.5) * brightness;
        }

        // Rec. 709 luma; saturation scales the distance from gray.
        let luma = 0.2126 * channels[0] + 0.7152 * channels[1] + 0.0722 * channels[2];
        for (i, channel) in channels.iter().enumerate() {
            let v = luma + (channel - luma) * saturation;
            pixel[i] = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        }
    }

    let filtered = DynamicImage::ImageRgba8(rgba);
    if hue_degrees != 0 {
        filtered.huerotate(hue_degrees)
    } else {
        filtered
    }
}

/// Rotate about the image center with bilinear sampling. Pixels that map
/// outside the source stay transparent, like a canvas cleared before draw.
fn rotate_about_center(img: &DynamicImage, degrees: f32) -> DynamicImage {
    let (w, h) = img.dimensions();
    let src = img.to_rgba8();
    let mut out = RgbaImage::new(w, h);

    let theta = degrees.to_radians();
    let (sin, cos) = theta.sin_cos();
    let cx = w as f32 / 2.0;
    let cy = h as f32 / 2.0;

    for y in 0..h {
        for x in 0..w {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            // Inverse mapping: where does this output pixel come from.
            let sx = cos * dx + sin * dy + cx - 0.5;
            let sy = -sin * dx + cos * dy + cy - 0.5;

            if sx >= 0.0 && sy >= 0.0 && sx <= (w - 1) as f32 && sy <= (h - 1) as f32 {
                out.put_pixel(x, y, bilinear(&src, sx, sy));
            }
        }
    }

    DynamicImage::ImageRgba8(out)
}

fn bilinear(src: &RgbaImage, x: f32, y: f32) -> Rgba<u8> {
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(src.width() - 1);
    let y1 = (y0 + 1).min(src.height() - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = src.get_pixel(x0, y0);
    let p10 = src.get_pixel(x1, y0);
    let p01 = src.get_pixel(x0, y1);
    let p11 = src.get_pixel(x1, y1);

    let mut blended = [0u8; 4];
    for i in 0..4 {
        let top = p00[i] as f32 * (1.0 - fx) + p10[i] as f32 * fx;
        let bottom = p01[i] as f32 * (1.0 - fx) + p11[i] as f32 * fx;
        blended[i] = (top * (1.0 - fy) + bottom * fy).round() as u8;
    }
    Rgba(blended)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard(size: u32) -> DynamicImage {
        let img = RgbaImage::from_fn(size, size, |x, y| {
            if (x / 8 + y / 8) % 2 == 0 {
                Rgba([220, 40, 40, 255])
            } else {
                Rgba([40, 40, 220, 255])
            }
        });
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn variant_names_and_sizes_are_fixed() {
        let img = checkerboard(64);
        let filtered = preprocess_variants(&img);
        let names: Vec<&str> = filtered.iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["enhanced", "soft", "large", "vivid"]);
        assert_eq!(filtered[0].image.width(), 224);
        assert_eq!(filtered[2].image.width(), 299);

        let augmented = augmented_variants(&img);
        let names: Vec<&str> = augmented.iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["original", "rotated_-3", "rotated_3", "flipped"]);
        for variant in &augmented {
            assert_eq!(variant.image.width(), 224);
            assert_eq!(variant.image.height(), 224);
        }
    }

    #[test]
    fn variants_are_deterministic() {
        let img = checkerboard(64);
        let a = preprocess_variants(&img);
        let b = preprocess_variants(&img);
        for (va, vb) in a.iter().zip(b.iter()) {
            assert_eq!(va.image.to_rgba8().as_raw(), vb.image.to_rgba8().as_raw());
        }
        let a = augmented_variants(&img);
        let b = augmented_variants(&img);
        for (va, vb) in a.iter().zip(b.iter()) {
            assert_eq!(va.image.to_rgba8().as_raw(), vb.image.to_rgba8().as_raw());
        }
    }

    #[test]
    fn identity_filter_changes_nothing() {
        let img = checkerboard(224);
        let filtered = apply_filter(&img, 224, 1.0, 1.0, 1.0, 0);
        assert_eq!(
            filtered.to_rgba8().as_raw(),
            img.resize_exact(224, 224, FilterType::Triangle)
                .to_rgba8()
                .as_raw()
        );
    }

    #[test]
    fn contrast_spreads_channels() {
        let gray = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            16,
            16,
            Rgba([100, 100, 100, 255]),
        ));
        let boosted = apply_filter(&gray, 16, 1.2, 1.0, 1.0, 0).to_rgba8();
        // 100/255 is below mid-gray, so more contrast pushes it darker
        assert!(boosted.get_pixel(8, 8)[0] < 100);
    }

    #[test]
    fn zero_rotation_is_identity() {
        let img = checkerboard(32);
        let rotated = rotate_about_center(&img, 0.0);
        assert_eq!(rotated.to_rgba8().as_raw(), img.to_rgba8().as_raw());
    }

    #[test]
    fn flip_mirrors_pixels() {
        let mut img = RgbaImage::from_pixel(4, 1, Rgba([0, 0, 0, 255]));
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        let flipped = DynamicImage::ImageRgba8(img).fliph().to_rgba8();
        assert_eq!(flipped.get_pixel(3, 0)[0], 255);
        assert_eq!(flipped.get_pixel(0, 0)[0], 0);
    }
}
