// THEORY:
// The `visualizer` renders the human-facing evidence for an analysis: the
// combined binary mask, the translucent overlay on the original image, and
// the diameter/shape-factor histograms. It is the only module in the crate
// with side effects, and those side effects are confined to writing image
// files into one configured output directory.
//
// Key architectural principles:
// 1.  **Per-artifact isolation**: each of the three images is rendered and
//     saved independently. A failure produces a diagnostic note for that
//     artifact and leaves the other two untouched, so numeric results can
//     always ship even when a rendering step goes wrong.
// 2.  **Collision-free filenames**: output names combine the source image's
//     base name with a random suffix, so concurrent analyses of same-named
//     uploads never overwrite each other in the shared directory.
// 3.  **Filenames, not paths**: callers receive bare filenames and resolve
//     them to URLs or absolute paths themselves. The visualizer knows
//     nothing about how its output is served.

use std::fs;
use std::path::{Path, PathBuf};

use image::{GrayImage, Luma, Rgb, RgbImage, imageops};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use log::warn;
use uuid::Uuid;

use crate::core_modules::mask::RawMask;

/// Color blended over detected regions in the overlay image.
const HIGHLIGHT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

const HISTOGRAM_BINS: usize = 30;
const PANEL_WIDTH: u32 = 600;
const PANEL_HEIGHT: u32 = 450;
const PANEL_MARGIN: u32 = 40;
const BACKGROUND_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const BAR_EDGE_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
/// Bar fills for the two panels, diameter first.
const DIAMETER_BAR_COLOR: Rgb<u8> = Rgb([31, 119, 180]);
const SHAPE_BAR_COLOR: Rgb<u8> = Rgb([255, 127, 14]);

/// The outcome of one visualization pass. Every artifact is independently
/// present or absent; `notes` explains each absence.
#[derive(Debug, Clone, Default)]
pub struct ArtifactSet {
    /// Filename of the combined binary mask image.
    pub mask_image: Option<String>,
    /// Filename of the overlay on the original image.
    pub overlay_image: Option<String>,
    /// Filename of the two-panel histogram image.
    pub histogram_image: Option<String>,
    /// One diagnostic line per failed artifact.
    pub notes: Vec<String>,
}

/// Renders analysis artifacts into a configured output directory.
pub struct Visualizer {
    output_dir: PathBuf,
}

impl Visualizer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Renders and writes the three artifacts for one analysis.
    ///
    /// `masks` are the deduplicated masks at the processing resolution,
    /// `diameters` and `shape_factors` the per-object measurements, and
    /// `source_name` the uploaded file's name, used to derive output names.
    pub fn render(
        &self,
        masks: &[RawMask],
        diameters: &[f64],
        shape_factors: &[f64],
        original: &RgbImage,
        processing_resolution: (u32, u32),
        source_name: &str,
    ) -> ArtifactSet {
        let base = file_stem_of(source_name);
        let suffix = unique_suffix();
        let mut artifacts = ArtifactSet::default();

        if let Err(err) = fs::create_dir_all(&self.output_dir) {
            warn!(
                "could not create output directory '{}': {err}",
                self.output_dir.display()
            );
        }

        let combined = combined_mask(masks, processing_resolution);

        let mask_name = format!("{base}_mask_{suffix}.png");
        match self.store(&mask_name, |path| combined.save(path)) {
            Ok(name) => artifacts.mask_image = Some(name),
            Err(err) => {
                warn!("binary mask artifact failed: {err}");
                artifacts.notes.push(format!("mask image failed: {err}"));
            }
        }

        let overlay = overlay_on_original(&combined, original);
        let overlay_name = format!("{base}_result_{suffix}.png");
        match self.store(&overlay_name, |path| overlay.save(path)) {
            Ok(name) => artifacts.overlay_image = Some(name),
            Err(err) => {
                warn!("overlay artifact failed: {err}");
                artifacts.notes.push(format!("overlay image failed: {err}"));
            }
        }

        let histogram = render_histograms(diameters, shape_factors);
        let histogram_name = format!("{base}_hist_{suffix}.png");
        match self.store(&histogram_name, |path| histogram.save(path)) {
            Ok(name) => artifacts.histogram_image = Some(name),
            Err(err) => {
                warn!("histogram artifact failed: {err}");
                artifacts
                    .notes
                    .push(format!("histogram image failed: {err}"));
            }
        }

        artifacts
    }

    fn store(
        &self,
        filename: &str,
        save: impl FnOnce(&Path) -> image::ImageResult<()>,
    ) -> Result<String, image::ImageError> {
        let path = self.output_dir.join(filename);
        save(&path)?;
        Ok(filename.to_string())
    }
}

/// Union of all member masks at the processing resolution, covered pixels
/// at maximum intensity.
fn combined_mask(masks: &[RawMask], (width, height): (u32, u32)) -> GrayImage {
    let mut combined = GrayImage::new(width, height);
    for mask in masks {
        let (mask_width, mask_height) = mask.grid.dimensions();
        for y in 0..mask_height.min(height) {
            for x in 0..mask_width.min(width) {
                if mask.grid.get(x, y) {
                    combined.put_pixel(x, y, Luma([255]));
                }
            }
        }
    }
    combined
}

/// The combined mask upscaled to the original resolution and blended over
/// the original image at 50% opacity wherever the mask is set.
fn overlay_on_original(combined: &GrayImage, original: &RgbImage) -> RgbImage {
    let (width, height) = original.dimensions();
    let upscaled = imageops::resize(combined, width, height, imageops::FilterType::Nearest);

    let mut overlay = original.clone();
    for (x, y, pixel) in overlay.enumerate_pixels_mut() {
        if upscaled.get_pixel(x, y)[0] > 0 {
            for channel in 0..3 {
                let blended =
                    (u16::from(pixel[channel]) + u16::from(HIGHLIGHT_COLOR[channel])) / 2;
                pixel[channel] = blended as u8;
            }
        }
    }
    overlay
}

/// One image with two side-by-side histogram panels: diameter distribution
/// on the left, shape-factor distribution on the right.
fn render_histograms(diameters: &[f64], shape_factors: &[f64]) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(PANEL_WIDTH * 2, PANEL_HEIGHT, BACKGROUND_COLOR);
    draw_histogram_panel(&mut canvas, 0, diameters, DIAMETER_BAR_COLOR);
    draw_histogram_panel(&mut canvas, PANEL_WIDTH, shape_factors, SHAPE_BAR_COLOR);
    canvas
}

fn draw_histogram_panel(canvas: &mut RgbImage, x_offset: u32, values: &[f64], bar_color: Rgb<u8>) {
    let plot_left = x_offset + PANEL_MARGIN;
    let plot_right = x_offset + PANEL_WIDTH - PANEL_MARGIN;
    let plot_top = PANEL_MARGIN;
    let plot_bottom = PANEL_HEIGHT - PANEL_MARGIN;

    draw_line_segment_mut(
        canvas,
        (plot_left as f32, plot_bottom as f32),
        (plot_right as f32, plot_bottom as f32),
        AXIS_COLOR,
    );
    draw_line_segment_mut(
        canvas,
        (plot_left as f32, plot_top as f32),
        (plot_left as f32, plot_bottom as f32),
        AXIS_COLOR,
    );

    // An empty distribution leaves the panel blank rather than failing.
    let Some(counts) = bin_values(values, HISTOGRAM_BINS) else {
        return;
    };
    let Some(&max_count) = counts.iter().max() else {
        return;
    };
    if max_count == 0 {
        return;
    }

    let plot_height = plot_bottom - plot_top;
    let bar_width = ((plot_right - plot_left) / HISTOGRAM_BINS as u32).max(1);
    for (bin, &count) in counts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let bar_height =
            ((count as f64 / max_count as f64) * f64::from(plot_height)).round() as u32;
        let bar_height = bar_height.max(1);
        let x = plot_left + bin as u32 * bar_width;
        let y = plot_bottom - bar_height;
        let bar = Rect::at(x as i32, y as i32).of_size(bar_width, bar_height);
        draw_filled_rect_mut(canvas, bar, bar_color);
        draw_hollow_rect_mut(canvas, bar, BAR_EDGE_COLOR);
    }
}

/// Bins `values` into equal-width buckets over their observed range.
/// Returns `None` for an empty input. A single repeated value collapses
/// into the first bucket.
fn bin_values(values: &[f64], bins: usize) -> Option<Vec<usize>> {
    if values.is_empty() || bins == 0 {
        return None;
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = if max > min { max - min } else { 1.0 };

    let mut counts = vec![0usize; bins];
    for &value in values {
        let bin = (((value - min) / span) * bins as f64) as usize;
        counts[bin.min(bins - 1)] += 1;
    }
    Some(counts)
}

fn file_stem_of(source_name: &str) -> String {
    Path::new(source_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("image")
        .to_string()
}

/// Eight random hex characters, enough to keep concurrent analyses of
/// same-named uploads from colliding.
fn unique_suffix() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    hex[..8].to_string()
}
