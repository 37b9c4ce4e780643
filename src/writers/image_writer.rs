use image::{ImageFormat, Rgb, RgbImage};
use ndarray::Array2;
use std::path::Path;
use tracing::debug;

use crate::error::{ProcessingError, Result};
use crate::models::{CompositeGrid, GridDefinition};

/// Background for undefined cells.
pub const UNDEFINED_COLOR: Rgb<u8> = Rgb([0xDE, 0xDE, 0xDE]);

const SCALE_BAR_COLOR: Rgb<u8> = Rgb([0x20, 0x20, 0x20]);
const BAND_COLOR: Rgb<u8> = Rgb([0xFF, 0xFF, 0xFF]);

/// Height in pixels of the colour legend and scale bar bands.
const BAND_HEIGHT: u32 = 8;

// Dark blue to yellow, low to high.
const RAMP: [[u8; 3]; 5] = [
    [68, 1, 84],
    [59, 82, 139],
    [33, 145, 140],
    [94, 201, 98],
    [253, 231, 37],
];

/// Everything a renderer needs to draw one composite.
///
/// `unit`, `description` and `scale_bar_m` are metadata: [`PngRenderer`]
/// draws no text and reports them in its log event only.
#[derive(Debug, Clone)]
pub struct RenderRequest<'a> {
    pub values: &'a Array2<f32>,
    pub grid: GridDefinition,
    pub value_range: (f32, f32),
    pub unit: &'a str,
    pub description: &'a str,
    /// Ground length in metres of the unlabelled scale bar, which always
    /// spans one degree of longitude.
    pub scale_bar_m: f64,
}

impl<'a> RenderRequest<'a> {
    pub fn for_composite(composite: &'a CompositeGrid, scale_bar_m: f64) -> Self {
        Self {
            values: &composite.values,
            grid: composite.definition,
            value_range: composite.pollutant.value_range(),
            unit: composite.pollutant.units(),
            description: composite.pollutant.description(),
            scale_bar_m,
        }
    }
}

pub trait Renderer: Send + Sync {
    fn render(&self, request: &RenderRequest<'_>, path: &Path) -> Result<()>;
}

/// Colour-ramped, north-up PNG with a legend band and a one-degree scale bar.
#[derive(Debug, Clone)]
pub struct PngRenderer {
    pixels_per_cell: u32,
}

impl PngRenderer {
    pub fn new(pixels_per_cell: u32) -> Self {
        Self {
            pixels_per_cell: pixels_per_cell.max(1),
        }
    }

    fn map_height(&self, grid: &GridDefinition) -> u32 {
        grid.rows as u32 * self.pixels_per_cell
    }

    /// Width in pixels of one degree of longitude, capped to the image.
    pub fn scale_bar_pixels(&self, grid: &GridDefinition) -> u32 {
        let width = grid.cols as u32 * self.pixels_per_cell;
        let per_degree = (self.pixels_per_cell as f64 / grid.lon_step).round() as u32;
        per_degree.clamp(1, width.max(1))
    }

    /// Draw the composite into an in-memory image.
    pub fn draw(&self, request: &RenderRequest<'_>) -> Result<RgbImage> {
        let (rows, cols) = request.values.dim();
        if (rows, cols) != request.grid.shape() || rows == 0 || cols == 0 {
            return Err(ProcessingError::InvalidFormat(format!(
                "cannot draw {}x{} values on a {}x{} grid",
                rows, cols, request.grid.rows, request.grid.cols
            )));
        }

        let ppc = self.pixels_per_cell;
        let width = cols as u32 * ppc;
        let map_height = self.map_height(&request.grid);
        let mut img = RgbImage::from_pixel(width, map_height + 2 * BAND_HEIGHT, BAND_COLOR);

        for ((row, col), &value) in request.values.indexed_iter() {
            let color = if value.is_nan() {
                UNDEFINED_COLOR
            } else {
                ramp_color(normalize(value, request.value_range))
            };
            // Row 0 is the southern edge, so it lands at the bottom of the map.
            let y0 = (rows - 1 - row) as u32 * ppc;
            let x0 = col as u32 * ppc;
            for dy in 0..ppc {
                for dx in 0..ppc {
                    img.put_pixel(x0 + dx, y0 + dy, color);
                }
            }
        }

        for x in 0..width {
            let t = if width > 1 {
                x as f32 / (width - 1) as f32
            } else {
                0.0
            };
            let color = ramp_color(t);
            for y in map_height..map_height + BAND_HEIGHT {
                img.put_pixel(x, y, color);
            }
        }

        let bar = self.scale_bar_pixels(&request.grid);
        let bar_top = map_height + BAND_HEIGHT + BAND_HEIGHT / 4;
        for x in 0..bar {
            for y in bar_top..bar_top + BAND_HEIGHT / 2 {
                img.put_pixel(x, y, SCALE_BAR_COLOR);
            }
        }

        Ok(img)
    }
}

impl Renderer for PngRenderer {
    fn render(&self, request: &RenderRequest<'_>, path: &Path) -> Result<()> {
        let render_error = |reason: String| ProcessingError::Render {
            path: path.to_path_buf(),
            reason,
        };

        let img = self.draw(request).map_err(|e| render_error(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        img.save_with_format(path, ImageFormat::Png)
            .map_err(|e| render_error(e.to_string()))?;

        debug!(
            path = %path.display(),
            description = request.description,
            unit = request.unit,
            min = request.value_range.0,
            max = request.value_range.1,
            scale_bar_km = request.scale_bar_m / 1000.0,
            "rendered composite"
        );
        Ok(())
    }
}

/// Position of `value` inside `range`, clamped to [0, 1].
pub fn normalize(value: f32, (min, max): (f32, f32)) -> f32 {
    if max <= min {
        return 0.0;
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

fn interpolate(a: [u8; 3], b: [u8; 3], t: f32) -> [u8; 3] {
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    [mix(a[0], b[0]), mix(a[1], b[1]), mix(a[2], b[2])]
}

pub fn ramp_color(t: f32) -> Rgb<u8> {
    let t = t.clamp(0.0, 1.0);
    let segments = (RAMP.len() - 1) as f32;
    let scaled = t * segments;
    let i = (scaled.floor() as usize).min(RAMP.len() - 2);
    Rgb(interpolate(RAMP[i], RAMP[i + 1], scaled - i as f32))
}
