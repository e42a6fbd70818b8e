// Bar chart of the derived percent, one bar per province.

use image::imageops::rotate270;
use image::{GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use log::{debug, warn};
use rusttype::{point, Font, Scale};
use snafu::prelude::*;

use crate::report::*;

/// Fonts tried, in order, when no font is configured.
const FALLBACK_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([220, 220, 220]);

const MARGIN_LEFT: u32 = 80;
const MARGIN_RIGHT: u32 = 20;
const MARGIN_TOP: u32 = 50;
const MARGIN_BOTTOM: u32 = 170;
const TICKS: u32 = 5;

pub struct ChartSettings {
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub axis_label: String,
    pub bar_color: Rgb<u8>,
    /// Without a font the chart only has bars, axes and grid lines.
    pub font: Option<Font<'static>>,
}

impl ChartSettings {
    pub fn new(template: &ReportTemplate, font: Option<Font<'static>>) -> ChartSettings {
        ChartSettings {
            width: 800,
            height: 600,
            title: template.chart_title.clone(),
            axis_label: template.chart_axis_label.clone(),
            bar_color: Rgb([76, 175, 80]),
            font,
        }
    }
}

fn parse_font(bytes: Vec<u8>, path: &str) -> ReportResult<Font<'static>> {
    Font::try_from_vec(bytes).context(InvalidFontSnafu { path })
}

/// Loads the configured font, or the first usable system font.
pub fn load_font(configured: Option<&Path>) -> ReportResult<Option<Font<'static>>> {
    if let Some(p) = configured {
        let path = p.display().to_string();
        let bytes = fs::read(p).context(ReadingFontSnafu { path: path.clone() })?;
        return parse_font(bytes, &path).map(Some);
    }
    for candidate in FALLBACK_FONTS {
        if let Ok(bytes) = fs::read(candidate) {
            if let Ok(font) = parse_font(bytes, candidate) {
                debug!("load_font: using {}", candidate);
                return Ok(Some(font));
            }
        }
    }
    warn!("No font found for the chart labels, drawing the chart without text");
    Ok(None)
}

/// The top of the y axis and the distance between two grid lines.
fn y_scale(max_value: f64) -> (f64, f64) {
    if max_value <= 0.0 || !max_value.is_finite() {
        return (1.0, 1.0 / TICKS as f64);
    }
    let raw = max_value * 1.05 / TICKS as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let normalized = raw / magnitude;
    let step = [1.0, 2.0, 2.5, 5.0, 10.0]
        .iter()
        .find(|m| **m >= normalized)
        .map(|m| m * magnitude)
        .unwrap_or(10.0 * magnitude);
    (step * TICKS as f64, step)
}

fn fill_rect(img: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    for y in y0.max(0)..y1.min(h) {
        for x in x0.max(0)..x1.min(w) {
            img.put_pixel(x as u32, y as u32, color);
        }
    }
}

/// Renders `text` as a coverage mask, one byte per pixel.
fn rasterize_text(font: &Font, text: &str, size: f32) -> GrayImage {
    let scale = Scale::uniform(size);
    let v_metrics = font.v_metrics(scale);
    let glyphs: Vec<_> = font.layout(text, scale, point(1.0, v_metrics.ascent)).collect();
    let width = glyphs
        .iter()
        .rev()
        .find_map(|g| g.pixel_bounding_box().map(|bb| bb.max.x))
        .unwrap_or(0)
        .max(0) as u32
        + 2;
    let height = (v_metrics.ascent - v_metrics.descent).ceil() as u32 + 2;
    let mut mask = GrayImage::new(width, height);
    for g in glyphs.iter() {
        if let Some(bb) = g.pixel_bounding_box() {
            g.draw(|gx, gy, v| {
                let x = gx as i32 + bb.min.x;
                let y = gy as i32 + bb.min.y;
                if x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height {
                    let c = (v * 255.0).round().min(255.0) as u8;
                    let prev = mask.get_pixel(x as u32, y as u32).0[0];
                    mask.put_pixel(x as u32, y as u32, Luma([prev.max(c)]));
                }
            });
        }
    }
    mask
}

/// Blends `color` into the image through the mask, with the mask's top-left at (x, y).
fn blit_mask(img: &mut RgbImage, mask: &GrayImage, x: i64, y: i64, color: Rgb<u8>) {
    for (mx, my, m) in mask.enumerate_pixels() {
        let px = x + mx as i64;
        let py = y + my as i64;
        let a = m.0[0] as u32;
        if a == 0 || px < 0 || py < 0 || px >= img.width() as i64 || py >= img.height() as i64 {
            continue;
        }
        let bg = img.get_pixel(px as u32, py as u32).0;
        let mut out = [0u8; 3];
        for i in 0..3 {
            out[i] = ((bg[i] as u32 * (255 - a) + color.0[i] as u32 * a) / 255) as u8;
        }
        img.put_pixel(px as u32, py as u32, Rgb(out));
    }
}

/// Draws the chart in memory. The same table and settings always give the same image.
pub fn draw_chart(table: &SummaryTable, settings: &ChartSettings) -> RgbImage {
    let (width, height) = (settings.width, settings.height);
    let mut img = RgbImage::from_pixel(width, height, BACKGROUND);

    let left = MARGIN_LEFT as i64;
    let top = MARGIN_TOP as i64;
    let right = width.saturating_sub(MARGIN_RIGHT) as i64;
    let bottom = height.saturating_sub(MARGIN_BOTTOM) as i64;
    let plot_h = (bottom - top).max(1) as f64;

    let max_value = table
        .iter()
        .map(|r| r.derived_percent)
        .fold(0.0_f64, f64::max);
    let (y_top, step) = y_scale(max_value);
    debug!("draw_chart: max {} axis top {} step {}", max_value, y_top, step);
    let to_y = |v: f64| bottom - (v / y_top * plot_h).round() as i64;

    // Grid lines and tick labels
    for k in 0..=TICKS {
        let v = step * k as f64;
        let y = to_y(v);
        if k > 0 {
            fill_rect(&mut img, left, y, right, y + 1, GRID);
        }
        if let Some(font) = settings.font.as_ref() {
            let mask = rasterize_text(font, &format!("{:.2}", v), 13.0);
            let x = left - 6 - mask.width() as i64;
            blit_mask(&mut img, &mask, x, y - mask.height() as i64 / 2, AXIS);
        }
    }

    // Bars
    let n = table.len().max(1) as f64;
    let slot = (right - left) as f64 / n;
    let bar_w = (slot * 0.6).max(1.0);
    for (idx, row) in table.iter().enumerate() {
        let x0 = left as f64 + idx as f64 * slot + (slot - bar_w) / 2.0;
        let x0 = x0.round() as i64;
        let x1 = x0 + bar_w.round() as i64;
        let y0 = to_y(row.derived_percent.max(0.0));
        fill_rect(&mut img, x0, y0, x1, bottom, settings.bar_color);

        if let Some(font) = settings.font.as_ref() {
            let label = rotate270(&rasterize_text(font, &row.province, 13.0));
            let cx = (x0 + x1) / 2;
            blit_mask(
                &mut img,
                &label,
                cx - label.width() as i64 / 2,
                bottom + 6,
                AXIS,
            );
        }
    }

    // Axes
    fill_rect(&mut img, left - 1, top, left, bottom + 1, AXIS);
    fill_rect(&mut img, left - 1, bottom, right, bottom + 1, AXIS);

    if let Some(font) = settings.font.as_ref() {
        let title = rasterize_text(font, &settings.title, 17.0);
        let x = (width as i64 - title.width() as i64) / 2;
        blit_mask(&mut img, &title, x, 14, AXIS);

        let axis_label = rotate270(&rasterize_text(font, &settings.axis_label, 13.0));
        let y = top + ((bottom - top) - axis_label.height() as i64) / 2;
        blit_mask(&mut img, &axis_label, 6, y, AXIS);
    }
    img
}

/// Draws the chart and saves it as a PNG file, replacing any existing file.
pub fn render_chart(table: &SummaryTable, settings: &ChartSettings, path: &Path) -> ReportResult<()> {
    let img = draw_chart(table, settings);
    img.save_with_format(path, ImageFormat::Png)
        .context(RenderingChartSnafu {
            path: path.display().to_string(),
        })?;
    Ok(())
}
