// THEORY:
// The `geometry` module is the pure-math foundation of the measurement
// layer. Every function here is stateless and side-effect free: disk
// equivalence, the Blaschke shape factor, resolution rescaling, and contour
// arc length. Keeping these as free functions lets the morphology analyzer
// read as a plain composition of well-tested primitives.

use image::{GrayImage, imageops};
use imageproc::contours::{Contour, find_contours};
use std::f64::consts::PI;

use crate::core_modules::mask::MaskGrid;

/// The diameter of a disk whose area equals `area_px`.
pub fn equivalent_diameter(area_px: f64) -> f64 {
    (4.0 * area_px / PI).sqrt()
}

/// The Blaschke shape factor `4π·area / perimeter²`.
///
/// 1.0 for a perfect disk, lower for irregular or elongated shapes, and 0
/// for a degenerate mask with no measurable perimeter.
pub fn shape_factor(area_px: f64, perimeter_px: f64) -> f64 {
    if perimeter_px > 0.0 {
        (4.0 * PI * area_px) / (perimeter_px * perimeter_px)
    } else {
        0.0
    }
}

/// Rescales a binary mask to the given dimensions with nearest-neighbor
/// interpolation, keeping the result strictly two-valued (0 or 255).
pub fn upscale_nearest(grid: &MaskGrid, width: u32, height: u32) -> GrayImage {
    if grid.width() == 0 || grid.height() == 0 {
        return GrayImage::new(width, height);
    }
    imageops::resize(&grid.to_gray(255), width, height, imageops::FilterType::Nearest)
}

/// The closed arc length of a single contour: the sum of Euclidean
/// distances between consecutive points, including the segment closing the
/// loop from the last point back to the first.
pub fn contour_perimeter(contour: &Contour<i32>) -> f64 {
    contour
        .points
        .iter()
        .zip(contour.points.iter().cycle().skip(1))
        .map(|(p1, p2)| {
            let dx = f64::from(p2.x - p1.x);
            let dy = f64::from(p2.y - p1.y);
            dx.hypot(dy)
        })
        .sum()
}

/// The summed arc length of all external contours of the foreground in
/// `image`. Holes are excluded; disjoint regions all contribute.
pub fn external_perimeter(image: &GrayImage) -> f64 {
    find_contours::<i32>(image)
        .iter()
        .filter(|contour| contour.parent.is_none())
        .map(contour_perimeter)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() < tolerance,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn equivalent_diameter_matches_disk_area() {
        assert_close(equivalent_diameter(100.0), 11.2838, 1e-4);
        assert_close(equivalent_diameter(0.0), 0.0, 1e-12);
    }

    #[test]
    fn shape_factor_is_one_for_a_perfect_disk() {
        let radius = 3.0_f64;
        let area = PI * radius * radius;
        let perimeter = 2.0 * PI * radius;
        assert_close(shape_factor(area, perimeter), 1.0, 1e-12);
    }

    #[test]
    fn shape_factor_is_zero_without_a_perimeter() {
        assert_close(shape_factor(10.0, 0.0), 0.0, 1e-12);
    }

    #[test]
    fn upscale_nearest_replicates_blocks() {
        let grid = MaskGrid::from_fn(2, 2, |x, y| x == 0 && y == 0);
        let scaled = upscale_nearest(&grid, 4, 4);

        let white = scaled.pixels().filter(|p| p[0] == 255).count();
        assert_eq!(white, 4);
        assert_eq!(scaled.get_pixel(0, 0)[0], 255);
        assert_eq!(scaled.get_pixel(1, 1)[0], 255);
        assert_eq!(scaled.get_pixel(3, 3)[0], 0);
    }

    #[test]
    fn upscale_nearest_of_empty_grid_is_blank() {
        let scaled = upscale_nearest(&MaskGrid::new(0, 0), 4, 4);
        assert!(scaled.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn external_perimeter_of_a_square_block() {
        // A 4x4 filled block: the boundary chain visits 12 pixels with unit
        // steps, so the closed arc length is 12.
        let mut image = GrayImage::new(8, 8);
        for y in 2..6 {
            for x in 2..6 {
                image.put_pixel(x, y, image::Luma([255]));
            }
        }
        assert_close(external_perimeter(&image), 12.0, 1e-9);
    }

    #[test]
    fn external_perimeter_sums_disjoint_regions() {
        let mut image = GrayImage::new(16, 8);
        for y in 2..6 {
            for x in 2..6 {
                image.put_pixel(x, y, image::Luma([255]));
                image.put_pixel(x + 8, y, image::Luma([255]));
            }
        }
        assert_close(external_perimeter(&image), 24.0, 1e-9);
    }

    #[test]
    fn external_perimeter_ignores_holes() {
        // A 6x6 ring with a 2x2 hole: only the outer border counts.
        let mut image = GrayImage::new(10, 10);
        for y in 2..8 {
            for x in 2..8 {
                if (4..6).contains(&x) && (4..6).contains(&y) {
                    continue;
                }
                image.put_pixel(x, y, image::Luma([255]));
            }
        }
        assert_close(external_perimeter(&image), 20.0, 1e-9);
    }
}
