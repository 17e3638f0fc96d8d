// THEORY:
// The `morphology` module turns a deduplicated mask set into numbers. It is
// the measurement layer of the pipeline: one `ObjectMeasurement` per mask,
// plus the aggregate statistics that describe the whole population of
// detected dots.
//
// Key architectural principles:
// 1.  **Two resolutions, one definition**: areas and diameters are taken at
//     the processing resolution the masks live at, while each perimeter is
//     measured on the mask upscaled to the original image resolution. The
//     shape factor combines the processing-resolution area with the
//     original-resolution perimeter, preserving the historical definition
//     this analysis has always used.
// 2.  **Order-independent reduction**: each mask is measured on its own and
//     the aggregates are plain reductions over the measurement list, so the
//     report never depends on mask ordering.
// 3.  **Total function**: an empty mask set is a valid input and produces a
//     zeroed report rather than an error.

use crate::core_modules::geometry;
use crate::core_modules::mask::RawMask;

/// Derived measurements for a single detected object.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectMeasurement {
    /// Mask area in px² at the processing resolution.
    pub area_px: f64,
    /// Diameter of a disk with the same area, in pixels.
    pub equivalent_diameter_px: f64,
    /// Blaschke shape factor: 1.0 for a perfect disk, 0 for a degenerate
    /// mask.
    pub shape_factor: f64,
}

/// Aggregate morphology statistics over a deduplicated mask set.
#[derive(Debug, Clone)]
pub struct MorphologyReport {
    pub measurements: Vec<ObjectMeasurement>,
    /// Number of detected objects.
    pub count: usize,
    /// Objects per pixel of the original image, 0 when the image is empty.
    pub density_per_pixel: f64,
    /// Arithmetic mean of the equivalent diameters, 0 when no objects.
    pub average_diameter_px: f64,
    /// Population variance of the equivalent diameters, 0 when no objects.
    pub diameter_variance: f64,
}

impl MorphologyReport {
    pub fn diameters(&self) -> Vec<f64> {
        self.measurements
            .iter()
            .map(|m| m.equivalent_diameter_px)
            .collect()
    }

    pub fn shape_factors(&self) -> Vec<f64> {
        self.measurements.iter().map(|m| m.shape_factor).collect()
    }
}

/// Measures every mask and reduces the results into a [`MorphologyReport`].
///
/// `original_width`/`original_height` are the dimensions of the source image
/// before resampling; they drive the density denominator and the resolution
/// each perimeter is measured at.
pub fn analyze(masks: &[RawMask], original_width: u32, original_height: u32) -> MorphologyReport {
    let mut measurements = Vec::with_capacity(masks.len());

    for mask in masks {
        let area_px = mask.area_px() as f64;
        let equivalent_diameter_px = geometry::equivalent_diameter(area_px);

        let perimeter_px = if original_width == 0 || original_height == 0 {
            0.0
        } else {
            let upscaled = geometry::upscale_nearest(&mask.grid, original_width, original_height);
            geometry::external_perimeter(&upscaled)
        };
        let shape_factor = geometry::shape_factor(area_px, perimeter_px);

        measurements.push(ObjectMeasurement {
            area_px,
            equivalent_diameter_px,
            shape_factor,
        });
    }

    let count = measurements.len();
    let image_pixels = f64::from(original_width) * f64::from(original_height);
    let density_per_pixel = if image_pixels > 0.0 {
        count as f64 / image_pixels
    } else {
        0.0
    };

    let (average_diameter_px, diameter_variance) = if count > 0 {
        let diameters: Vec<f64> = measurements
            .iter()
            .map(|m| m.equivalent_diameter_px)
            .collect();
        let mean = diameters.iter().sum::<f64>() / count as f64;
        let variance = diameters
            .iter()
            .map(|d| (d - mean) * (d - mean))
            .sum::<f64>()
            / count as f64;
        (mean, variance)
    } else {
        (0.0, 0.0)
    };

    MorphologyReport {
        measurements,
        count,
        density_per_pixel,
        average_diameter_px,
        diameter_variance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::mask::MaskGrid;
    use std::f64::consts::PI;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() < tolerance,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn empty_input_yields_zeroed_aggregates() {
        let report = analyze(&[], 100, 100);
        assert_eq!(report.count, 0);
        assert_eq!(report.density_per_pixel, 0.0);
        assert_eq!(report.average_diameter_px, 0.0);
        assert_eq!(report.diameter_variance, 0.0);
        assert!(report.measurements.is_empty());
    }

    #[test]
    fn zero_area_image_yields_zero_density() {
        let mask = RawMask::with_area(MaskGrid::new(8, 8), 10, 0.5);
        let report = analyze(&[mask], 0, 0);
        assert_eq!(report.count, 1);
        assert_eq!(report.density_per_pixel, 0.0);
    }

    #[test]
    fn diameter_for_area_fifty() {
        let mask = RawMask::with_area(MaskGrid::new(8, 8), 50, 0.9);
        let report = analyze(&[mask], 8, 8);
        assert_close(report.average_diameter_px, 7.98, 0.005);
    }

    #[test]
    fn square_block_measurement_at_matched_resolution() {
        // A 4x4 block measured at the grid's own resolution: area 16 and a
        // boundary chain of length 12.
        let grid = MaskGrid::from_fn(8, 8, |x, y| (2..6).contains(&x) && (2..6).contains(&y));
        let mask = RawMask::new(grid, 0.9);
        let report = analyze(&[mask], 8, 8);

        let measurement = &report.measurements[0];
        assert_close(measurement.area_px, 16.0, 1e-12);
        assert_close(measurement.equivalent_diameter_px, (64.0 / PI).sqrt(), 1e-9);
        assert_close(measurement.shape_factor, 4.0 * PI * 16.0 / 144.0, 1e-9);
        assert_close(report.density_per_pixel, 1.0 / 64.0, 1e-12);
    }

    #[test]
    fn perimeter_is_measured_on_the_upscaled_mask() {
        // Doubling the resolution doubles the block's boundary chain, which
        // shrinks the shape factor because the area term stays at the
        // processing resolution.
        let grid = MaskGrid::from_fn(8, 8, |x, y| (2..6).contains(&x) && (2..6).contains(&y));
        let mask = RawMask::new(grid, 0.9);

        let matched = analyze(std::slice::from_ref(&mask), 8, 8);
        let doubled = analyze(&[mask], 16, 16);

        let expected_doubled = 4.0 * PI * 16.0 / (28.0 * 28.0);
        assert_close(doubled.measurements[0].shape_factor, expected_doubled, 1e-9);
        assert!(doubled.measurements[0].shape_factor < matched.measurements[0].shape_factor);
    }

    #[test]
    fn aggregates_over_two_objects() {
        let a = RawMask::with_area(MaskGrid::new(8, 8), 100, 0.9);
        let b = RawMask::with_area(MaskGrid::new(8, 8), 400, 0.8);
        let report = analyze(&[a, b], 10, 10);

        let d1 = geometry::equivalent_diameter(100.0);
        let d2 = geometry::equivalent_diameter(400.0);
        let mean = (d1 + d2) / 2.0;
        let variance = ((d1 - mean).powi(2) + (d2 - mean).powi(2)) / 2.0;

        assert_eq!(report.count, 2);
        assert_close(report.density_per_pixel, 0.02, 1e-12);
        assert_close(report.average_diameter_px, mean, 1e-9);
        assert_close(report.diameter_variance, variance, 1e-9);
    }
}
