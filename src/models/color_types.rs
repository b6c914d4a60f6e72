use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Hue in degrees, saturation and lightness in percent (rounded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Hsl {
    pub h: u16,
    pub s: u8,
    pub l: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct DominantColor {
    pub rgb: Rgb,
    pub hex: String,
    pub hsl: Hsl,
    /// Share of sampled pixels in percent.
    pub percentage: f32,
    pub name: String,
}

/// Dominant colors bucketed by temperature and vibrancy. A color can appear
/// in one temperature bucket and one vibrancy bucket at the same time.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ColorPalette {
    pub warm: Vec<DominantColor>,
    pub cool: Vec<DominantColor>,
    pub neutral: Vec<DominantColor>,
    pub vibrant: Vec<DominantColor>,
    pub muted: Vec<DominantColor>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColorDistribution {
    pub average_saturation: f32,
    pub average_lightness: f32,
    pub warm_color_ratio: f32,
    pub cool_color_ratio: f32,
    pub color_temperature: String,
    pub vibrancy: String,
    pub brightness: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColorStats {
    pub total_colors: usize,
    pub most_dominant: DominantColor,
    pub color_harmony: String,
    pub contrast_ratio: f32,
    pub color_scheme: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColorReport {
    pub dominant_colors: Vec<DominantColor>,
    pub color_palette: ColorPalette,
    pub color_distribution: ColorDistribution,
    pub color_stats: ColorStats,
    pub original_dimensions: (u32, u32),
}
