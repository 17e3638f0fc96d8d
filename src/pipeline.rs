// THEORY:
// The `pipeline` module is the final, top-level API for the analysis
// engine. It encapsulates the full architectural stack into a single,
// easy-to-use interface: hand it an image path, receive a structured
// analysis record. The pipeline owns the fixed processing resolution, the
// injected segmentation capability, and the wiring between every
// downstream stage.
//
// Stage order for one call: resample the original image to the processing
// resolution, invoke the capability, filter oversized masks, suppress
// duplicates, measure morphology at the original resolution, render the
// visualization artifacts, and assemble the result record. When the
// capability never loaded, the call short-circuits to a clearly marked
// placeholder result instead of failing, so downstream consumers can tell
// a missing model apart from a broken call.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::imageops;
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::core_modules::capability::{CapabilityHandle, CapabilityStatus, MaskGenerator};
use crate::core_modules::deduplicator::{self, OverlapStrategy};
use crate::core_modules::mask_filter;
use crate::core_modules::morphology;
use crate::core_modules::visualizer::Visualizer;
use crate::error::AnalysisError;

/// Configuration for the AnalysisPipeline, allowing for tunable behavior.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Width of the fixed resolution the capability operates at.
    pub processing_width: u32,
    /// Height of the fixed resolution the capability operates at.
    pub processing_height: u32,
    /// Masks with an area above this ceiling (in px² at the processing
    /// resolution) are discarded before deduplication.
    pub max_mask_area_px: u64,
    /// Two masks whose intersection exceeds this fraction of the smaller
    /// mask's area are considered duplicates.
    pub overlap_threshold: f64,
    /// Directory the visualization artifacts are written into.
    pub output_dir: PathBuf,
    /// Range the placeholder object count is drawn from when the
    /// capability is unavailable.
    pub placeholder_count_range: RangeInclusive<u32>,
    /// Fixed seed for the placeholder count, for deterministic tests.
    pub placeholder_seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            processing_width: 512,
            processing_height: 512,
            max_mask_area_px: 10_000,
            overlap_threshold: 0.5,
            output_dir: PathBuf::from("uploads"),
            placeholder_count_range: 100..=1000,
            placeholder_seed: None,
        }
    }
}

/// The structured record returned by one analysis call.
///
/// Statistics fields are `None` only on the degraded placeholder path, so
/// consumers can distinguish real measurements from the fallback. Image
/// fields are `None` for any artifact that failed to render, with the
/// reason in `note`.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    /// Number of detected dots, or a placeholder value when the
    /// capability is unavailable.
    #[serde(rename = "quantumDotCount")]
    pub quantum_dot_count: u64,
    /// Detections per pixel of the original image.
    pub density_per_pixel: Option<f64>,
    /// Mean equivalent diameter in pixels.
    pub average_diameter_px: Option<f64>,
    /// Population variance of the equivalent diameters.
    pub diameter_variance: Option<f64>,
    /// Filename of the overlay rendered on the original image.
    pub result_image: Option<String>,
    /// Filename of the combined binary mask image.
    pub mask_image: Option<String>,
    /// Filename of the two-panel histogram image.
    pub histogram_image: Option<String>,
    /// Diagnostic note for the degraded path or failed artifacts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// The main, top-level struct for the analysis engine.
pub struct AnalysisPipeline {
    config: PipelineConfig,
    capability: CapabilityHandle,
    overlap_strategy: Option<Box<dyn OverlapStrategy>>,
    visualizer: Visualizer,
    placeholder_rng: Mutex<StdRng>,
}

impl AnalysisPipeline {
    /// Creates a pipeline with no segmentation capability attached. Every
    /// analysis call returns the degraded placeholder result until
    /// [`attach_capability`](Self::attach_capability) succeeds.
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_handle(config, CapabilityHandle::unavailable("capability not initialized"))
    }

    /// Creates a pipeline around an already loaded segmentation capability.
    pub fn with_capability(config: PipelineConfig, generator: Box<dyn MaskGenerator>) -> Self {
        Self::with_handle(config, CapabilityHandle::available(generator))
    }

    fn with_handle(config: PipelineConfig, capability: CapabilityHandle) -> Self {
        let placeholder_rng = match config.placeholder_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let visualizer = Visualizer::new(config.output_dir.clone());
        Self {
            config,
            capability,
            overlap_strategy: None,
            visualizer,
            placeholder_rng: Mutex::new(placeholder_rng),
        }
    }

    /// Attaches the capability if none is attached yet and reports the
    /// resulting status. Attachment is one-shot; see [`CapabilityHandle`].
    pub fn attach_capability(&mut self, generator: Box<dyn MaskGenerator>) -> CapabilityStatus {
        self.capability.attach(generator)
    }

    /// The capability's current load status, queryable without running an
    /// analysis.
    pub fn capability_status(&self) -> CapabilityStatus {
        self.capability.status()
    }

    /// Replaces the built-in suppression algorithm with an external
    /// overlap-removal strategy. The built-in algorithm remains the
    /// fallback whenever the strategy fails.
    pub fn set_overlap_strategy(&mut self, strategy: Box<dyn OverlapStrategy>) {
        self.overlap_strategy = Some(strategy);
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Analyzes one image and returns the structured result record.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::ImageLoad`] when the input cannot be read
    /// and [`AnalysisError::Inference`] when the loaded capability fails on
    /// this image. An unavailable capability is not an error; it produces
    /// the placeholder result.
    pub fn analyze(&self, image_path: &Path) -> Result<AnalysisResult, AnalysisError> {
        let Some(generator) = self.capability.generator() else {
            let reason = self
                .capability
                .load_error()
                .unwrap_or("unknown")
                .to_string();
            return Ok(self.placeholder_result(&reason));
        };

        // Stage 1: Load & Resample
        let original = image::open(image_path)
            .map_err(|source| AnalysisError::ImageLoad {
                path: image_path.to_path_buf(),
                source,
            })?
            .to_rgb8();
        let (original_width, original_height) = original.dimensions();
        let resized = imageops::resize(
            &original,
            self.config.processing_width,
            self.config.processing_height,
            imageops::FilterType::Triangle,
        );

        // Stage 2: Mask Generation
        let mut raw_masks = generator.generate(&resized)?;
        let generated = raw_masks.len();
        let expected = (self.config.processing_width, self.config.processing_height);
        raw_masks.retain(|mask| mask.grid.dimensions() == expected);
        if raw_masks.len() < generated {
            warn!(
                "dropped {} mask(s) not at the {}x{} processing resolution",
                generated - raw_masks.len(),
                expected.0,
                expected.1
            );
        }

        // Stage 3: Area Filtering
        let filtered = mask_filter::filter_by_area(raw_masks, self.config.max_mask_area_px);
        debug!("area filter kept {}/{} masks", filtered.len(), generated);

        // Stage 4: Deduplication
        let deduplicated = deduplicator::deduplicate(
            filtered,
            self.config.overlap_threshold,
            self.overlap_strategy.as_deref(),
        );
        debug!("{} masks after suppression", deduplicated.len());

        // Stage 5: Morphology
        let report = morphology::analyze(&deduplicated, original_width, original_height);

        // Stage 6: Visualization
        let source_name = image_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let artifacts = self.visualizer.render(
            &deduplicated,
            &report.diameters(),
            &report.shape_factors(),
            &original,
            expected,
            &source_name,
        );

        // Stage 7: Result Assembly
        let note = if artifacts.notes.is_empty() {
            None
        } else {
            Some(artifacts.notes.join("; "))
        };
        Ok(AnalysisResult {
            quantum_dot_count: report.count as u64,
            density_per_pixel: Some(report.density_per_pixel),
            average_diameter_px: Some(report.average_diameter_px),
            diameter_variance: Some(report.diameter_variance),
            result_image: artifacts.overlay_image,
            mask_image: artifacts.mask_image,
            histogram_image: artifacts.histogram_image,
            note,
        })
    }

    /// The degraded result returned while the capability is unavailable:
    /// a placeholder count and null statistics, annotated with the reason.
    fn placeholder_result(&self, reason: &str) -> AnalysisResult {
        warn!("segmentation capability unavailable: {reason}");
        let count = {
            let mut rng = self.placeholder_rng.lock().unwrap();
            rng.random_range(self.config.placeholder_count_range.clone())
        };
        AnalysisResult {
            quantum_dot_count: u64::from(count),
            density_per_pixel: None,
            average_diameter_px: None,
            diameter_variance: None,
            result_image: None,
            mask_image: None,
            histogram_image: None,
            note: Some(format!("model not loaded: {reason}")),
        }
    }
}
