use crate::error::Error;
use crate::models::color_types::{
    ColorDistribution, ColorPalette, ColorReport, ColorStats, DominantColor, Hsl, Rgb,
};
use image::DynamicImage;
use lab::Lab;
use std::collections::HashMap;

/// Quantization step for bucketing sampled pixels.
const QUANT_STEP: u8 = 5;
/// Sampling aims at roughly this many pixels regardless of image size.
const TARGET_SAMPLES: u32 = 50_000;
/// Number of dominant colors reported.
const MAX_DOMINANT: usize = 15;
/// Lab distance beyond which no palette name is considered close enough and
/// the color is described from its HSL properties instead.
const NAME_DISTANCE_CUTOFF: f32 = 25.0;

struct NamedColor {
    name: &'static str,
    rgb: [u8; 3],
}

const NAMED_COLORS: &[NamedColor] = &[
    // Reds
    NamedColor { name: "Crimson Red", rgb: [220, 20, 60] },
    NamedColor { name: "Fire Red", rgb: [255, 0, 0] },
    NamedColor { name: "Dark Red", rgb: [139, 0, 0] },
    NamedColor { name: "Brick Red", rgb: [178, 34, 34] },
    NamedColor { name: "Maroon", rgb: [128, 0, 0] },
    NamedColor { name: "Cherry Red", rgb: [222, 49, 99] },
    NamedColor { name: "Rose Red", rgb: [255, 102, 102] },
    // Pinks
    NamedColor { name: "Hot Pink", rgb: [255, 105, 180] },
    NamedColor { name: "Light Pink", rgb: [255, 182, 193] },
    NamedColor { name: "Deep Pink", rgb: [255, 20, 147] },
    NamedColor { name: "Pink", rgb: [255, 192, 203] },
    NamedColor { name: "Magenta", rgb: [255, 0, 255] },
    // Oranges
    NamedColor { name: "Orange", rgb: [255, 165, 0] },
    NamedColor { name: "Dark Orange", rgb: [255, 140, 0] },
    NamedColor { name: "Peach", rgb: [255, 218, 185] },
    NamedColor { name: "Coral", rgb: [255, 127, 80] },
    NamedColor { name: "Tangerine", rgb: [255, 163, 67] },
    // Yellows
    NamedColor { name: "Yellow", rgb: [255, 255, 0] },
    NamedColor { name: "Light Yellow", rgb: [255, 255, 224] },
    NamedColor { name: "Golden Yellow", rgb: [255, 215, 0] },
    NamedColor { name: "Pale Yellow", rgb: [255, 255, 153] },
    NamedColor { name: "Cream", rgb: [255, 253, 208] },
    // Greens
    NamedColor { name: "Green", rgb: [0, 255, 0] },
    NamedColor { name: "Dark Green", rgb: [0, 100, 0] },
    NamedColor { name: "Light Green", rgb: [144, 238, 144] },
    NamedColor { name: "Forest Green", rgb: [34, 139, 34] },
    NamedColor { name: "Lime Green", rgb: [50, 205, 50] },
    NamedColor { name: "Olive Green", rgb: [128, 128, 0] },
    NamedColor { name: "Mint Green", rgb: [152, 251, 152] },
    NamedColor { name: "Sage Green", rgb: [159, 174, 134] },
    NamedColor { name: "Emerald Green", rgb: [80, 200, 120] },
    // Blues
    NamedColor { name: "Blue", rgb: [0, 0, 255] },
    NamedColor { name: "Light Blue", rgb: [173, 216, 230] },
    NamedColor { name: "Dark Blue", rgb: [0, 0, 139] },
    NamedColor { name: "Sky Blue", rgb: [135, 206, 235] },
    NamedColor { name: "Navy Blue", rgb: [0, 0, 128] },
    NamedColor { name: "Royal Blue", rgb: [65, 105, 225] },
    NamedColor { name: "Turquoise", rgb: [64, 224, 208] },
    NamedColor { name: "Cyan", rgb: [0, 255, 255] },
    NamedColor { name: "Teal", rgb: [0, 128, 128] },
    NamedColor { name: "Steel Blue", rgb: [70, 130, 180] },
    // Purples
    NamedColor { name: "Purple", rgb: [128, 0, 128] },
    NamedColor { name: "Dark Purple", rgb: [75, 0, 130] },
    NamedColor { name: "Violet", rgb: [238, 130, 238] },
    NamedColor { name: "Lavender", rgb: [230, 230, 250] },
    NamedColor { name: "Plum", rgb: [221, 160, 221] },
    // Browns
    NamedColor { name: "Brown", rgb: [165, 42, 42] },
    NamedColor { name: "Light Brown", rgb: [205, 133, 63] },
    NamedColor { name: "Dark Brown", rgb: [101, 67, 33] },
    NamedColor { name: "Tan", rgb: [210, 180, 140] },
    NamedColor { name: "Beige", rgb: [245, 245, 220] },
    NamedColor { name: "Chocolate", rgb: [210, 105, 30] },
    NamedColor { name: "Coffee Brown", rgb: [111, 78, 55] },
    NamedColor { name: "Camel", rgb: [193, 154, 107] },
    // Grays
    NamedColor { name: "White", rgb: [255, 255, 255] },
    NamedColor { name: "Light Gray", rgb: [211, 211, 211] },
    NamedColor { name: "Gray", rgb: [128, 128, 128] },
    NamedColor { name: "Dark Gray", rgb: [105, 105, 105] },
    NamedColor { name: "Charcoal", rgb: [54, 69, 79] },
    NamedColor { name: "Silver", rgb: [192, 192, 192] },
    NamedColor { name: "Black", rgb: [0, 0, 0] },
    // Special colors
    NamedColor { name: "Bronze", rgb: [205, 127, 50] },
    NamedColor { name: "Copper", rgb: [184, 115, 51] },
    NamedColor { name: "Khaki", rgb: [240, 230, 140] },
    NamedColor { name: "Ivory", rgb: [255, 255, 240] },
    NamedColor { name: "Off White", rgb: [248, 248, 255] },
];

/// Full color analysis of an image: dominant colors with names, palette
/// buckets, distribution summary and statistics.
pub fn analyze_colors(image: &DynamicImage) -> Result<ColorReport, Error> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(Error::InvalidInput("image has no pixels".to_string()));
    }

    let rgba = image.to_rgba8();
    let total_pixels = width as u64 * height as u64;
    let sample_rate = (total_pixels / TARGET_SAMPLES as u64).max(1) as usize;

    let mut counts: HashMap<[u8; 3], u64> = HashMap::new();
    for pixel in rgba.pixels().step_by(sample_rate) {
        let [r, g, b, a] = pixel.0;
        if a > 128 {
            counts
                .entry([quantize(r), quantize(g), quantize(b)])
                .and_modify(|c| *c += 1)
                .or_insert(1);
        }
    }
    if counts.is_empty() {
        return Err(Error::InvalidInput(
            "image is fully transparent".to_string(),
        ));
    }

    // Deterministic order: count descending, channel values break ties.
    let mut sorted: Vec<([u8; 3], u64)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted.truncate(MAX_DOMINANT);

    let sampled = (total_pixels / sample_rate as u64).max(1) as f32;
    let dominant_colors: Vec<DominantColor> = sorted
        .into_iter()
        .map(|([r, g, b], count)| DominantColor {
            rgb: Rgb { r, g, b },
            hex: format!("#{:02x}{:02x}{:02x}", r, g, b),
            hsl: rgb_to_hsl(r, g, b),
            percentage: count as f32 / sampled * 100.0,
            name: color_name(r, g, b),
        })
        .collect();

    let color_palette = build_palette(&dominant_colors);
    let color_distribution = analyze_distribution(&dominant_colors);
    let color_stats = ColorStats {
        total_colors: dominant_colors.len(),
        most_dominant: dominant_colors[0].clone(),
        color_harmony: analyze_harmony(&dominant_colors),
        contrast_ratio: contrast_ratio(&dominant_colors),
        color_scheme: identify_scheme(&dominant_colors),
    };

    Ok(ColorReport {
        dominant_colors,
        color_palette,
        color_distribution,
        color_stats,
        original_dimensions: (width, height),
    })
}

fn quantize(v: u8) -> u8 {
    v / QUANT_STEP * QUANT_STEP
}

fn is_warm(h: u16) -> bool {
    h <= 60 || h >= 300
}

fn is_cool(h: u16) -> bool {
    (180..=240).contains(&h)
}

fn build_palette(colors: &[DominantColor]) -> ColorPalette {
    let mut palette = ColorPalette::default();
    for color in colors {
        let Hsl { h, s, l } = color.hsl;
        if is_warm(h) {
            palette.warm.push(color.clone());
        } else if is_cool(h) {
            palette.cool.push(color.clone());
        } else {
            palette.neutral.push(color.clone());
        }

        if s > 50 && l > 20 && l < 80 {
            palette.vibrant.push(color.clone());
        } else {
            palette.muted.push(color.clone());
        }
    }
    palette
}

fn analyze_distribution(colors: &[DominantColor]) -> ColorDistribution {
    let mut total_saturation = 0.0;
    let mut total_lightness = 0.0;
    let mut warm = 0usize;
    let mut cool = 0usize;

    for color in colors {
        total_saturation += color.hsl.s as f32;
        total_lightness += color.hsl.l as f32;
        if is_warm(color.hsl.h) {
            warm += 1;
        } else if is_cool(color.hsl.h) {
            cool += 1;
        }
    }

    let n = colors.len() as f32;
    let average_saturation = total_saturation / n;
    let average_lightness = total_lightness / n;

    ColorDistribution {
        average_saturation,
        average_lightness,
        warm_color_ratio: warm as f32 / n,
        cool_color_ratio: cool as f32 / n,
        color_temperature: if warm > cool {
            "warm"
        } else if cool > warm {
            "cool"
        } else {
            "balanced"
        }
        .to_string(),
        vibrancy: if average_saturation > 50.0 {
            "vibrant"
        } else if average_saturation > 25.0 {
            "moderate"
        } else {
            "muted"
        }
        .to_string(),
        brightness: if average_lightness > 60.0 {
            "bright"
        } else if average_lightness > 40.0 {
            "medium"
        } else {
            "dark"
        }
        .to_string(),
    }
}

fn analyze_harmony(colors: &[DominantColor]) -> String {
    if colors.len() < 2 {
        return "monochromatic".to_string();
    }
    let mut hues: Vec<f32> = colors.iter().map(|c| c.hsl.h as f32).collect();
    hues.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let diffs: Vec<f32> = hues.windows(2).map(|pair| pair[1] - pair[0]).collect();
    let avg = diffs.iter().sum::<f32>() / diffs.len() as f32;

    if avg < 30.0 {
        "monochromatic"
    } else if avg < 60.0 {
        "analogous"
    } else if avg > 120.0 {
        "complementary"
    } else {
        "triadic"
    }
    .to_string()
}

fn contrast_ratio(colors: &[DominantColor]) -> f32 {
    if colors.len() < 2 {
        return 1.0;
    }
    let mut lightness: Vec<f32> = colors.iter().map(|c| c.hsl.l as f32).collect();
    lightness.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let darkest = lightness[0];
    let lightest = lightness[lightness.len() - 1];
    (lightest + 5.0) / (darkest + 5.0)
}

fn identify_scheme(colors: &[DominantColor]) -> String {
    let hues: Vec<f32> = colors.iter().map(|c| c.hsl.h as f32).collect();
    let avg_saturation =
        colors.iter().map(|c| c.hsl.s as f32).sum::<f32>() / colors.len() as f32;

    if avg_saturation < 20.0 {
        return "monochromatic".to_string();
    }
    if hues.iter().all(|h| (h - hues[0]).abs() < 30.0) {
        return "monochromatic".to_string();
    }
    if hues.iter().any(|h| (h - hues[0]).abs() > 150.0) {
        return "complementary".to_string();
    }
    "analogous".to_string()
}

/// Nearest named color by perceptual (Lab) distance, falling back to an
/// HSL-derived description when nothing in the palette is close.
pub fn color_name(r: u8, g: u8, b: u8) -> String {
    let target = Lab::from_rgb(&[r, g, b]);
    let mut min_distance = f32::MAX;
    let mut closest = "Unknown Color";

    for named in NAMED_COLORS {
        let lab = Lab::from_rgb(&named.rgb);
        let dl = target.l - lab.l;
        let da = target.a - lab.a;
        let db = target.b - lab.b;
        let distance = (dl * dl + da * da + db * db).sqrt();
        if distance < min_distance {
            min_distance = distance;
            closest = named.name;
        }
    }

    if min_distance > NAME_DISTANCE_CUTOFF {
        return describe_color(r, g, b);
    }
    closest.to_string()
}

/// Describe a color from its HSL properties when no named color is close.
fn describe_color(r: u8, g: u8, b: u8) -> String {
    let Hsl { h, s, l } = rgb_to_hsl(r, g, b);
    let mut description = String::new();

    if l > 80 {
        description.push_str("Very Light ");
    } else if l > 60 {
        description.push_str("Light ");
    } else if l < 20 {
        description.push_str("Very Dark ");
    } else if l < 40 {
        description.push_str("Dark ");
    }

    if s < 20 {
        description.push_str("Grayish ");
    } else if s > 80 {
        description.push_str("Vivid ");
    } else if s > 60 {
        description.push_str("Bright ");
    }

    description.push_str(match h {
        0..=14 => "Red",
        15..=44 => "Orange",
        45..=74 => "Yellow",
        75..=149 => "Green",
        150..=209 => "Cyan",
        210..=269 => "Blue",
        270..=329 => "Purple",
        _ => "Red",
    });

    description.trim().to_string()
}

pub fn rgb_to_hsl(r: u8, g: u8, b: u8) -> Hsl {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if (max - min).abs() < f32::EPSILON {
        return Hsl {
            h: 0,
            s: 0,
            l: (l * 100.0).round() as u8,
        };
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };

    let h = if (max - r).abs() < f32::EPSILON {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if (max - g).abs() < f32::EPSILON {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    } / 6.0;

    Hsl {
        h: (h * 360.0).round() as u16,
        s: (s * 100.0).round() as u8,
        l: (l * 100.0).round() as u8,
    }
}
