// THEORY:
// The `mask` module defines the data vocabulary shared by every stage of the
// analysis pipeline. A `RawMask` is a "dumb" data container: one candidate
// object reported by the segmentation capability, carried unchanged through
// filtering and suppression until measurement. It has no behavior beyond
// cheap accessors; all analysis logic lives in the downstream modules.
//
// Key architectural principles:
// 1.  **Fixed processing resolution**: every `MaskGrid` in a batch is sized
//     to the resolution the capability was invoked at. Only the measurement
//     and overlay steps ever leave that resolution.
// 2.  **Immutability after production**: once the capability hands a
//     `RawMask` to the pipeline, nothing mutates it. Stages consume and
//     reorder masks but never edit pixels, areas, or confidences.

use image::GrayImage;

/// A boolean pixel grid marking the pixels that belong to one detected object.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskGrid {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

impl MaskGrid {
    /// Creates an empty (all-false) grid of the given dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![false; (width as usize) * (height as usize)],
        }
    }

    /// Creates a grid by evaluating `f(x, y)` for every cell.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut grid = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let value = f(x, y);
                grid.data[(y * width + x) as usize] = value;
            }
        }
        grid
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        self.data[(y * self.width + x) as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        self.data[(y * self.width + x) as usize] = value;
    }

    /// The number of set pixels, i.e. the mask's area in px².
    pub fn set_pixel_count(&self) -> u64 {
        self.data.iter().filter(|&&set| set).count() as u64
    }

    /// The number of pixels set in both grids. Grids of mismatched
    /// dimensions compare only the shared prefix, which callers avoid by
    /// keeping every mask at the processing resolution.
    pub fn intersection_count(&self, other: &MaskGrid) -> u64 {
        self.data
            .iter()
            .zip(other.data.iter())
            .filter(|&(&a, &b)| a && b)
            .count() as u64
    }

    /// Renders the grid as a grayscale image with set pixels at `on` and
    /// background at zero.
    pub fn to_gray(&self, on: u8) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            image::Luma([if self.get(x, y) { on } else { 0 }])
        })
    }
}

/// One candidate object as reported by the segmentation capability.
#[derive(Debug, Clone)]
pub struct RawMask {
    /// The segmented region at the processing resolution.
    pub grid: MaskGrid,
    /// Pixel area as reported by the capability, when it reports one.
    pub area: Option<u64>,
    /// Stability/confidence score in [0, 1] ranking mask quality.
    pub confidence: f64,
}

impl RawMask {
    pub fn new(grid: MaskGrid, confidence: f64) -> Self {
        Self {
            grid,
            area: None,
            confidence,
        }
    }

    pub fn with_area(grid: MaskGrid, area: u64, confidence: f64) -> Self {
        Self {
            grid,
            area: Some(area),
            confidence,
        }
    }

    /// The reported area, or the set-pixel count when none was reported.
    pub fn area_px(&self) -> u64 {
        self.area.unwrap_or_else(|| self.grid.set_pixel_count())
    }
}
